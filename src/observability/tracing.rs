//! Span reporting for request admission.
//!
//! # Responsibilities
//! - Start a span per admitted request, keyed by request ID
//! - Record span events (queued, accepted, completed, rejected, timed out)
//! - Attach counter attributes when the request leaves the controller
//!
//! # Design Decisions
//! - The controller only sees the [`Reporter`] trait, so tests and other
//!   tracing backends can be swapped in
//! - [`TracingReporter`] maps spans onto `tracing` spans; attributes that the
//!   span did not declare are dropped by `tracing`

use std::fmt;

use tracing::field::Empty;

use crate::http::RequestId;

/// Attribute value attached to a span or span event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Int(i64),
    Str(String),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Int(v) => write!(f, "{}", v),
            AttributeValue::Str(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub key: &'static str,
    pub value: AttributeValue,
}

impl Attribute {
    /// Integer attribute; values beyond `i64::MAX` saturate.
    pub fn int<V: TryInto<i64>>(key: &'static str, value: V) -> Self {
        Self {
            key,
            value: AttributeValue::Int(value.try_into().unwrap_or(i64::MAX)),
        }
    }

    pub fn str(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            value: AttributeValue::Str(value.into()),
        }
    }
}

/// Span factory handed to the admission controller.
pub trait Reporter: Send + Sync {
    fn start_span(&self, name: &'static str, request_id: &RequestId) -> Box<dyn SpanRecorder>;
}

/// A live span. Ends when dropped.
pub trait SpanRecorder: Send {
    fn add_event(&mut self, name: &'static str, attributes: &[Attribute]);
    fn set_attributes(&mut self, attributes: &[Attribute]);
}

/// Reporter backed by the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn start_span(&self, name: &'static str, request_id: &RequestId) -> Box<dyn SpanRecorder> {
        let span = tracing::info_span!(
            "admission",
            operation = name,
            request_id = %request_id,
            running = Empty,
            in_flight = Empty,
            rejected = Empty,
            timed_out = Empty,
            status = Empty,
        );
        Box::new(TracingSpan { span })
    }
}

struct TracingSpan {
    span: tracing::Span,
}

impl SpanRecorder for TracingSpan {
    fn add_event(&mut self, name: &'static str, attributes: &[Attribute]) {
        tracing::debug!(
            parent: &self.span,
            event = name,
            attributes = %DisplayAttributes(attributes),
            "span event"
        );
    }

    fn set_attributes(&mut self, attributes: &[Attribute]) {
        for attribute in attributes {
            match &attribute.value {
                AttributeValue::Int(v) => {
                    self.span.record(attribute.key, *v);
                }
                AttributeValue::Str(s) => {
                    self.span.record(attribute.key, s.as_str());
                }
            }
        }
    }
}

struct DisplayAttributes<'a>(&'a [Attribute]);

impl fmt::Display for DisplayAttributes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, attribute) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}={}", attribute.key, attribute.value)?;
        }
        Ok(())
    }
}

/// Reporter that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn start_span(&self, _name: &'static str, _request_id: &RequestId) -> Box<dyn SpanRecorder> {
        Box::new(NoopSpan)
    }
}

struct NoopSpan;

impl SpanRecorder for NoopSpan {
    fn add_event(&mut self, _name: &'static str, _attributes: &[Attribute]) {}
    fn set_attributes(&mut self, _attributes: &[Attribute]) {}
}
