#![allow(dead_code)]

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::Value;
use std::io::{self, Write};
use std::net::TcpListener;
use std::sync::Arc;

#[derive(Clone)]
struct StubState {
    reply: StatusCode,
    received: Arc<Mutex<Vec<Value>>>,
}

/// Status collector stub serving `POST /api/build/status` on a random port
pub struct CollectorStub {
    pub base_url: String,
    received: Arc<Mutex<Vec<Value>>>,
}

impl CollectorStub {
    pub fn start(reply: StatusCode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();

        let received = Arc::new(Mutex::new(Vec::new()));
        let state = StubState {
            reply,
            received: received.clone(),
        };

        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(async move {
                let app = Router::new()
                    .route("/api/build/status", post(record))
                    .with_state(state);
                axum::Server::from_tcp(listener)
                    .unwrap()
                    .serve(app.into_make_service())
                    .await
                    .unwrap();
            });
        });

        Self {
            base_url: format!("http://{}", addr),
            received,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/api/build/status", self.base_url)
    }

    pub fn received(&self) -> Vec<Value> {
        self.received.lock().clone()
    }
}

async fn record(State(state): State<StubState>, Json(body): Json<Value>) -> StatusCode {
    state.received.lock().push(body);
    state.reply
}

/// Writer handing its bytes to the test after being boxed away
#[derive(Clone, Default)]
pub struct SharedBuffer(pub Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
