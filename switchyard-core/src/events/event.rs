//! Routed, time-stamped message exchanged between fleet components.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EventError;
use crate::time::{canonical_key, TimestampSource};

/// Default processing deadline for events that do not carry one.
pub const DEFAULT_MAX_PROCESSING_TIME: f64 = 20.0;

/// Error code attached to replies synthesized for events that exceeded their deadline.
pub const TIMEOUT_ERROR_CODE: i64 = 408;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// Outcome tag carried by a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    Error,
    TestFailed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventResult {
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl EventResult {
    pub fn success() -> Self {
        Self {
            outcome: Outcome::Success,
            error_code: None,
            error_message: None,
        }
    }

    pub fn failure(code: Option<i64>, message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Failure,
            error_code: code,
            error_message: Some(message.into()),
        }
    }

    pub fn error(code: Option<i64>, message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Error,
            error_code: code,
            error_message: Some(message.into()),
        }
    }

    /// Failure result for an event whose processing deadline elapsed.
    pub fn timeout(limit_seconds: f64) -> Self {
        Self::failure(
            Some(TIMEOUT_ERROR_CODE),
            format!("processing exceeded {limit_seconds:.3}s"),
        )
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

/// Network peer an event is addressed to. Used as the send-side grouping key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Destination {
    pub address: String,
    pub port: u16,
}

impl Destination {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Identity and address of one side of an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub id: String,
    pub address: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(id: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            port,
        }
    }
}

/// Unified message type. The field set is also the JSON wire format.
///
/// Routing fields default to empty so that a body missing them decodes and is
/// then refused by [`Event::validate`] with the name of the missing field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub source_id: String,
    #[serde(default)]
    pub source_address: String,
    #[serde(default)]
    pub source_port: u16,
    #[serde(default)]
    pub destination_id: String,
    #[serde(default)]
    pub destination_address: String,
    #[serde(default)]
    pub destination_port: u16,
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Recipient must resolve asynchronously and reply.
    #[serde(default)]
    pub to_be_processed: bool,
    #[serde(default)]
    pub is_processing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// Seconds the recipient may spend before the request counts as failed.
    #[serde(default = "default_max_processing_time")]
    pub maximum_processing_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<EventResult>,
    #[serde(default = "stamp_now")]
    pub timestamp: DateTime<Utc>,
}

fn default_max_processing_time() -> f64 {
    DEFAULT_MAX_PROCESSING_TIME
}

fn stamp_now() -> DateTime<Utc> {
    TimestampSource::global().next()
}

impl Event {
    /// Creates a fire-and-forget event stamped with a fresh, process-unique timestamp.
    pub fn new(
        source: Endpoint,
        destination: Endpoint,
        event_type: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            source_id: source.id,
            source_address: source.address,
            source_port: source.port,
            destination_id: destination.id,
            destination_address: destination.address,
            destination_port: destination.port,
            event_type: event_type.into(),
            payload,
            correlation_id: None,
            to_be_processed: false,
            is_processing: false,
            priority: None,
            maximum_processing_time: DEFAULT_MAX_PROCESSING_TIME,
            result: None,
            timestamp: stamp_now(),
        }
    }

    /// Marks the event as a request the recipient must resolve and answer.
    pub fn expecting_reply(mut self) -> Self {
        self.to_be_processed = true;
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_max_processing_time(mut self, seconds: f64) -> Self {
        self.maximum_processing_time = seconds;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_result(mut self, result: EventResult) -> Self {
        self.result = Some(result);
        self
    }

    /// Pool key: canonical string form of the timestamp.
    pub fn key(&self) -> String {
        canonical_key(&self.timestamp)
    }

    pub fn destination(&self) -> Destination {
        Destination::new(self.destination_address.clone(), self.destination_port)
    }

    pub fn source(&self) -> Destination {
        Destination::new(self.source_address.clone(), self.source_port)
    }

    /// Builds the answer to this event: routing reversed, correlation carried over
    /// (or the request key when the request had none), fresh timestamp.
    pub fn reply(&self, result: EventResult) -> Event {
        Event {
            source_id: self.destination_id.clone(),
            source_address: self.destination_address.clone(),
            source_port: self.destination_port,
            destination_id: self.source_id.clone(),
            destination_address: self.source_address.clone(),
            destination_port: self.source_port,
            event_type: self.event_type.clone(),
            payload: Value::Null,
            correlation_id: Some(self.correlation_id.clone().unwrap_or_else(|| self.key())),
            to_be_processed: false,
            is_processing: false,
            priority: self.priority,
            maximum_processing_time: DEFAULT_MAX_PROCESSING_TIME,
            result: Some(result),
            timestamp: stamp_now(),
        }
    }

    /// Failure reply for a request that outlived `limit_seconds`.
    pub fn timeout_reply(&self, limit_seconds: f64) -> Event {
        self.reply(EventResult::timeout(limit_seconds))
    }

    /// Checks the routing fields the accept path relies on.
    pub fn validate(&self) -> Result<(), EventError> {
        let required = [
            ("source_id", &self.source_id),
            ("source_address", &self.source_address),
            ("destination_address", &self.destination_address),
            ("event_type", &self.event_type),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(EventError::MissingField(field));
            }
        }
        if self.source_port == 0 {
            return Err(EventError::MissingField("source_port"));
        }
        if self.destination_port == 0 {
            return Err(EventError::MissingField("destination_port"));
        }
        if !self.maximum_processing_time.is_finite() || self.maximum_processing_time <= 0.0 {
            return Err(EventError::InvalidField {
                field: "maximum_processing_time",
                reason: format!("must be a positive number, got {}", self.maximum_processing_time),
            });
        }
        Ok(())
    }

    /// Decodes and validates an inbound body.
    pub fn from_json(body: &[u8]) -> Result<Event, EventError> {
        let event: Event = serde_json::from_slice(body)?;
        event.validate()?;
        Ok(event)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, EventError> {
        Ok(serde_json::to_vec(self)?)
    }
}
