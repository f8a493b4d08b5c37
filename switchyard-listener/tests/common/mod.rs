#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use switchyard_config::SwitchyardConfig;
use switchyard_core::{Endpoint, Event, EventResult};
use switchyard_listener::{AnalyzeOutcome, HookError, ListenerHooks};

/// Replies to requests, defers `slow` requests, fails on `broken` ones.
#[derive(Default)]
pub struct ScriptedHooks {
    pub calls: Mutex<Vec<&'static str>>,
    pub fail_starting_once: AtomicBool,
    pub fail_stopping: AtomicBool,
}

impl ScriptedHooks {
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    fn record(&self, name: &'static str) {
        self.calls.lock().push(name);
    }
}

#[async_trait]
impl ListenerHooks for ScriptedHooks {
    async fn on_initializing(&self) -> Result<(), HookError> {
        self.record("initializing");
        Ok(())
    }

    async fn on_starting(&self) -> Result<(), HookError> {
        self.record("starting");
        if self.fail_starting_once.swap(false, Ordering::SeqCst) {
            return Err(HookError::new("camera not ready"));
        }
        Ok(())
    }

    async fn on_stopping(&self) -> Result<(), HookError> {
        self.record("stopping");
        if self.fail_stopping.load(Ordering::SeqCst) {
            return Err(HookError::new("flush failed"));
        }
        Ok(())
    }

    async fn on_stopped(&self) -> Result<(), HookError> {
        self.record("stopped");
        Ok(())
    }

    async fn analyze(&self, event: &Event) -> Result<AnalyzeOutcome, HookError> {
        match event.event_type.as_str() {
            "broken" => Err(HookError::new("cannot parse payload")),
            "slow" => Ok(AnalyzeOutcome::Defer),
            _ if event.to_be_processed => Ok(AnalyzeOutcome::Reply(EventResult::success())),
            _ => Ok(AnalyzeOutcome::Done),
        }
    }
}

pub fn fast_config() -> SwitchyardConfig {
    let mut config = SwitchyardConfig::default();
    config.listener.poll_interval_ms = 1;
    config.listener.sweep_interval_ms = 10;
    config.listener.local_check_interval_ms = 10;
    config
}

pub fn request(event_type: &str, source_port: u16) -> Event {
    Event::new(
        Endpoint::new("camera-1", "10.0.0.5", source_port),
        Endpoint::new("switchyard", "127.0.0.1", 8080),
        event_type,
        json!({"frame": 1}),
    )
    .expecting_reply()
}

pub fn notice(source_port: u16) -> Event {
    Event::new(
        Endpoint::new("camera-1", "10.0.0.5", source_port),
        Endpoint::new("switchyard", "127.0.0.1", 8080),
        "notice",
        json!(null),
    )
}

/// Polls `condition` until it holds or two seconds pass.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within 2s");
}

pub fn hooks() -> Arc<ScriptedHooks> {
    Arc::new(ScriptedHooks::default())
}
