//! Outbound delivery seam and an in-memory implementation.

use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use switchyard_core::{Destination, Event};

use crate::error::TransportError;

/// Sends one event to `destination_address:destination_port`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(&self, event: &Event) -> Result<(), TransportError>;
}

/// Record of one successful loopback delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub destination: Destination,
    pub event: Event,
    /// Size of the encoded body.
    pub bytes: usize,
}

/// Transport that records deliveries in memory.
///
/// Failures are injected with a seeded probability, or forced for specific
/// destinations with [`LoopbackTransport::fail_destination`].
#[derive(Debug)]
pub struct LoopbackTransport {
    failure_rate: f64,
    rng: Mutex<StdRng>,
    unreachable: Mutex<HashSet<Destination>>,
    delivered: Mutex<Vec<Delivery>>,
}

impl LoopbackTransport {
    /// Transport that never fails.
    pub fn reliable() -> Self {
        Self::with_failure_rate(0.0, 0)
    }

    /// `failure_rate` is clamped to `0.0..=1.0`.
    pub fn with_failure_rate(failure_rate: f64, seed: u64) -> Self {
        Self {
            failure_rate: failure_rate.clamp(0.0, 1.0),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            unreachable: Mutex::new(HashSet::new()),
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_destination(&self, destination: Destination) {
        self.unreachable.lock().insert(destination);
    }

    pub fn restore_destination(&self, destination: &Destination) {
        self.unreachable.lock().remove(destination);
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.delivered.lock().clone()
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered.lock().len()
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::reliable()
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn deliver(&self, event: &Event) -> Result<(), TransportError> {
        let destination = event.destination();
        if self.unreachable.lock().contains(&destination) {
            return Err(TransportError::Unreachable(destination.to_string()));
        }
        if self.failure_rate > 0.0 && self.rng.lock().random_bool(self.failure_rate) {
            return Err(TransportError::Refused {
                destination: destination.to_string(),
                reason: "injected failure".into(),
            });
        }

        let body = event.to_json()?;
        trace!(%destination, bytes = body.len(), "Loopback delivery");
        self.delivered.lock().push(Delivery {
            destination,
            event: event.clone(),
            bytes: body.len(),
        });
        Ok(())
    }
}
