use crate::error::{HeraldError, Result};
use crate::status::BuildUpdateMessage;
use parking_lot::Mutex;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::io::{self, Write};
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP seam of the delivery client
pub trait Transport: Send + Sync {
    /// POST a JSON body and return the response status code
    fn post_json(&self, url: &str, body: Vec<u8>) -> Result<u16>;
}

/// Blocking reqwest transport with a bounded request timeout
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HeraldError::Config {
                reason: format!("cannot build HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn post_json(&self, url: &str, body: Vec<u8>) -> Result<u16> {
        let resp = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .map_err(|e| HeraldError::Delivery {
                endpoint: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(resp.status().as_u16())
    }
}

/// Best-effort sender of status envelopes. `deliver` never fails: problems
/// are logged as warnings and the build carries on.
pub struct DeliveryClient {
    endpoint: Option<String>,
    debug: bool,
    transport: Box<dyn Transport>,
    debug_output: Mutex<Box<dyn Write + Send>>,
}

impl DeliveryClient {
    pub fn new(endpoint: Option<String>, debug: bool, transport: Box<dyn Transport>) -> Self {
        Self {
            endpoint,
            debug,
            transport,
            debug_output: Mutex::new(Box::new(io::stdout())),
        }
    }

    pub fn with_transport(mut self, transport: Box<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    /// Redirect debug-mode output away from stdout
    pub fn with_debug_output(mut self, output: Box<dyn Write + Send>) -> Self {
        self.debug_output = Mutex::new(output);
        self
    }

    pub fn deliver(&self, message: &BuildUpdateMessage<'_>) {
        if self.debug {
            let mut out = self.debug_output.lock();
            let written = writeln!(out, "{}", message.status.host_information).and_then(|_| out.flush());
            if let Err(e) = written {
                warn!(error = %e, "Writing host information failed");
            }
            return;
        }

        let Some(endpoint) = self.endpoint.as_deref() else {
            debug!("No status endpoint configured; skipping delivery");
            return;
        };
        if message.access_token.is_none() {
            debug!(endpoint = %endpoint, "No access token configured; skipping delivery");
            return;
        }

        match self.post(endpoint, message) {
            Ok(()) => debug!(
                endpoint = %endpoint,
                reason = ?message.update_reason,
                "Build status reported"
            ),
            Err(e) => warn!(
                error = %e,
                "Reporting build status to {} failed",
                endpoint
            ),
        }
    }

    fn post(&self, endpoint: &str, message: &BuildUpdateMessage<'_>) -> Result<()> {
        let body = serde_json::to_vec(message)?;
        let status = self.transport.post_json(endpoint, body)?;
        if status != 200 {
            return Err(HeraldError::Delivery {
                endpoint: endpoint.to_string(),
                reason: format!("unexpected HTTP status {}", status),
            });
        }
        Ok(())
    }
}
