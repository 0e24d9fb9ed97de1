//! Structured logging and log capture for herald

use crate::constants::DEFAULT_LOG_FILTER;
use parking_lot::Mutex;
use std::fmt;
use std::io;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    fmt::{self as tracing_fmt, format::FmtSpan},
    layer::{Context, Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

/// Initialize structured logging with optional JSON output.
///
/// Warning and error messages are additionally recorded into `capture`.
pub fn init_logging(json_output: bool, capture: &LogCapture) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let registry = Registry::default().with(env_filter).with(capture.layer());

    if json_output {
        // JSON output for structured logging aggregation
        registry
            .with(
                tracing_fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(io::stderr),
            )
            .try_init()?;
    } else {
        // Pretty console output
        registry
            .with(
                tracing_fmt::layer()
                    .with_writer(io::stderr)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()?;
    }

    Ok(())
}

/// In-memory record of the warning and error messages of one build run.
///
/// Cloning shares the underlying buffer, so the handle given to the
/// notifier sees everything the installed layer records.
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    messages: Arc<Mutex<Vec<String>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// A subscriber layer feeding this capture
    pub fn layer(&self) -> CaptureLayer {
        CaptureLayer {
            messages: self.messages.clone(),
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    /// Captured message texts joined by newlines
    pub fn joined(&self) -> String {
        self.messages.lock().join("\n")
    }

    /// Discard everything captured so far
    pub fn clear(&self) {
        self.messages.lock().clear();
    }
}

pub struct CaptureLayer {
    messages: Arc<Mutex<Vec<String>>>,
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        // More verbose levels compare greater
        if *event.metadata().level() > Level::WARN {
            return;
        }

        let mut visitor = MessageVisitor(None);
        event.record(&mut visitor);
        if let Some(message) = visitor.0 {
            self.messages.lock().push(message);
        }
    }
}

struct MessageVisitor(Option<String>);

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.0 = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = Some(format!("{:?}", value));
        }
    }
}
