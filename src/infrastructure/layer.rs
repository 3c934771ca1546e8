//! Tracing integration layer.
//!
//! Provides a `tracing_subscriber::Layer` that forwards `tracing` events to
//! an [`ErrorLogger`]. The active span scope becomes the call chain, so an
//! error raised inside nested spans is notified with a stack of the spans
//! it happened in.
//!
//! ```rust,no_run
//! use alert_throttle::{ErrorLogger, ErrorLoggerLayer, LoggerConfig};
//! use std::sync::Arc;
//! use tracing_subscriber::prelude::*;
//!
//! let logger = Arc::new(ErrorLogger::new(LoggerConfig::new("/var/log/app")).unwrap());
//!
//! tracing_subscriber::registry()
//!     .with(ErrorLoggerLayer::new(logger))
//!     .init();
//!
//! tracing::error!(target: "shop", order_id = 42, "payment capture failed");
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::application::logger::ErrorLogger;
use crate::domain::event::{ErrorEvent, ExceptionDetails, Severity, StackFrame};
use crate::infrastructure::visitor::FieldVisitor;

/// Target prefix of this crate's own diagnostics. Never forwarded.
const OWN_TARGET: &str = "alert_throttle";

/// Builder for constructing an `ErrorLoggerLayer`.
#[derive(Debug)]
pub struct ErrorLoggerLayerBuilder {
    logger: Arc<ErrorLogger>,
    min_level: Level,
    exempt_targets: BTreeSet<String>,
}

impl ErrorLoggerLayerBuilder {
    /// Forward events at `level` and above. Defaults to `WARN`.
    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    /// Never forward events whose target is one of `targets`.
    pub fn with_exempt_targets(mut self, targets: Vec<String>) -> Self {
        self.exempt_targets = targets.into_iter().collect();
        self
    }

    pub fn build(self) -> ErrorLoggerLayer {
        ErrorLoggerLayer {
            logger: self.logger,
            min_level: self.min_level,
            exempt_targets: Arc::new(self.exempt_targets),
        }
    }
}

/// Layer forwarding `tracing` events to an [`ErrorLogger`].
#[derive(Debug, Clone)]
pub struct ErrorLoggerLayer {
    logger: Arc<ErrorLogger>,
    min_level: Level,
    exempt_targets: Arc<BTreeSet<String>>,
}

impl ErrorLoggerLayer {
    /// Layer forwarding `WARN` and `ERROR` events.
    pub fn new(logger: Arc<ErrorLogger>) -> Self {
        Self::builder(logger).build()
    }

    pub fn builder(logger: Arc<ErrorLogger>) -> ErrorLoggerLayerBuilder {
        ErrorLoggerLayerBuilder {
            logger,
            min_level: Level::WARN,
            exempt_targets: BTreeSet::new(),
        }
    }

    pub fn logger(&self) -> &Arc<ErrorLogger> {
        &self.logger
    }

    fn forwards(&self, level: &Level, target: &str) -> bool {
        *level <= self.min_level
            && !is_own_target(target)
            && !self.exempt_targets.contains(target)
    }
}

fn is_own_target(target: &str) -> bool {
    target
        .strip_prefix(OWN_TARGET)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

fn severity_of(level: &Level) -> Severity {
    match *level {
        Level::ERROR => Severity::Error,
        Level::WARN => Severity::Warning,
        _ => Severity::Info,
    }
}

/// Frames for the span scope of the current event, innermost first.
fn span_frames<S>(event: &tracing::Event<'_>, ctx: &Context<'_, S>) -> Vec<StackFrame>
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    let Some(scope) = ctx.event_scope(event) else {
        return Vec::new();
    };
    scope
        .map(|span| {
            let meta = span.metadata();
            StackFrame::new(
                meta.file().unwrap_or("<unknown>"),
                meta.line().unwrap_or(0),
                meta.name(),
            )
            .with_class(meta.target())
        })
        .collect()
}

impl<S> Layer<S> for ErrorLoggerLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_event(&self, event: &tracing::Event<'_>, ctx: Context<'_, S>) {
        let meta = event.metadata();
        if !self.forwards(meta.level(), meta.target()) {
            return;
        }

        let mut visitor = FieldVisitor::new();
        event.record(&mut visitor);
        let has_error = visitor.has_error();
        let text = visitor.into_text();
        let frames = span_frames(event, &ctx);

        let error_event = if frames.is_empty() && !has_error {
            ErrorEvent::Message(text)
        } else {
            ErrorEvent::Exception(
                ExceptionDetails::new(
                    meta.target(),
                    text,
                    meta.file().unwrap_or("<unknown>"),
                    meta.line().unwrap_or(0),
                )
                .with_trace(frames),
            )
        };

        if let Err(e) = self.logger.log(&error_event, severity_of(meta.level())) {
            tracing::warn!(target: "alert_throttle", error = %e, "failed to forward event");
        }
    }
}
