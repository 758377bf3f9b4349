//! Client channel (§2 component 11 / §6): bidirectional push of logs,
//! screenshots, and status to an observing client; inbound task/stop/
//! confirmation messages. Built on `event-bus`'s broadcast-backed
//! `InMemoryBus` — non-blocking, best-effort if the client is
//! disconnected (§5).
#![allow(dead_code)]

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use soulbrowser_event_bus::{Event, EventBus, InMemoryBus};
use tokio::sync::broadcast;

use crate::planner::PlanningLogger;

const CHANNEL_CAPACITY: usize = 512;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    Observe,
    Decide,
    Act,
    Verify,
    Navigate,
    Planning,
    Synthesis,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Started,
    Running,
    Paused,
    Completed,
    Error,
    Stopped,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PauseKind {
    AskUser,
    Confirm,
}

/// Inbound client messages (all JSON framed, §6).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum InboundMessage {
    Task {
        task: String,
        #[serde(default)]
        #[serde(rename = "sessionId")]
        session_id: Option<String>,
    },
    Stop {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    Confirmation {
        #[serde(rename = "sessionId")]
        session_id: String,
        approved: bool,
        #[serde(default)]
        #[serde(rename = "actionId")]
        action_id: Option<String>,
    },
}

/// Outbound events (§6).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum OutboundEvent {
    Log {
        step: u64,
        phase: Phase,
        message: String,
        timestamp: String,
        #[serde(default)]
        error: Option<String>,
    },
    Screenshot {
        #[serde(rename = "sessionId")]
        session_id: String,
        step: u64,
        #[serde(rename = "screenshotPath")]
        screenshot_path: String,
        #[serde(default)]
        observation: Option<String>,
        #[serde(default)]
        regions: Option<serde_json::Value>,
    },
    Status {
        #[serde(rename = "sessionId")]
        session_id: String,
        status: SessionStatus,
        #[serde(default)]
        message: Option<String>,
        #[serde(rename = "pendingAction", default)]
        pending_action: Option<serde_json::Value>,
        #[serde(rename = "pauseKind", default)]
        pause_kind: Option<PauseKind>,
    },
    Error {
        message: String,
    },
}

impl Event for OutboundEvent {}

/// Owned by a session but visible to any other listener subscribed to
/// the same bus (§9: avoided via session-id lookup, not a back-pointer).
#[derive(Clone)]
pub struct ClientChannel {
    session_id: String,
    bus: Arc<InMemoryBus<OutboundEvent>>,
    step_counter: Arc<std::sync::atomic::AtomicU64>,
}

impl ClientChannel {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            bus: InMemoryBus::new(CHANNEL_CAPACITY),
            step_counter: Arc::new(std::sync::atomic::AtomicU64::new(0)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OutboundEvent> {
        self.bus.subscribe()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn set_step(&self, step: u64) {
        self.step_counter.store(step, std::sync::atomic::Ordering::SeqCst);
    }

    fn current_step(&self) -> u64 {
        self.step_counter.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Best-effort: a disconnected client simply has no active
    /// subscriber, so `publish` erroring is not propagated.
    pub async fn log(&self, phase: Phase, message: impl Into<String>) {
        let _ = self
            .bus
            .publish(OutboundEvent::Log {
                step: self.current_step(),
                phase,
                message: message.into(),
                timestamp: chrono::Utc::now().to_rfc3339(),
                error: None,
            })
            .await;
    }

    pub async fn log_error(&self, phase: Phase, message: impl Into<String>, error: impl Into<String>) {
        let _ = self
            .bus
            .publish(OutboundEvent::Log {
                step: self.current_step(),
                phase,
                message: message.into(),
                timestamp: chrono::Utc::now().to_rfc3339(),
                error: Some(error.into()),
            })
            .await;
    }

    pub async fn screenshot(&self, step: u64, screenshot_path: impl Into<String>) {
        let _ = self
            .bus
            .publish(OutboundEvent::Screenshot {
                session_id: self.session_id.clone(),
                step,
                screenshot_path: screenshot_path.into(),
                observation: None,
                regions: None,
            })
            .await;
    }

    pub async fn status(&self, status: SessionStatus, message: Option<String>) {
        let _ = self
            .bus
            .publish(OutboundEvent::Status {
                session_id: self.session_id.clone(),
                status,
                message,
                pending_action: None,
                pause_kind: None,
            })
            .await;
    }

    pub async fn paused(&self, pause_kind: PauseKind, message: Option<String>, pending_action: Option<serde_json::Value>) {
        let _ = self
            .bus
            .publish(OutboundEvent::Status {
                session_id: self.session_id.clone(),
                status: SessionStatus::Paused,
                message,
                pending_action,
                pause_kind: Some(pause_kind),
            })
            .await;
    }

    pub async fn error(&self, message: impl Into<String>) {
        let _ = self.bus.publish(OutboundEvent::Error { message: message.into() }).await;
    }
}

/// Adapts a [`ClientChannel`] to the [`PlanningLogger`] trait so the
/// planner and scout can emit PLANNING-phase logs without depending on
/// the channel module directly.
pub struct ChannelPlanningLogger<'a> {
    channel: &'a ClientChannel,
    handle: tokio::runtime::Handle,
}

impl<'a> ChannelPlanningLogger<'a> {
    pub fn new(channel: &'a ClientChannel) -> Self {
        Self {
            channel,
            handle: tokio::runtime::Handle::current(),
        }
    }
}

impl<'a> PlanningLogger for ChannelPlanningLogger<'a> {
    fn log(&self, message: &str) {
        let channel = self.channel.clone();
        let message = message.to_string();
        self.handle.spawn(async move {
            channel.log(Phase::Planning, message).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publishes_are_received_by_subscriber() {
        let channel = ClientChannel::new("session-1");
        let mut rx = channel.subscribe();
        channel.log(Phase::Observe, "scanning page").await;
        let event = rx.recv().await.expect("event received");
        match event {
            OutboundEvent::Log { message, phase, .. } => {
                assert_eq!(message, "scanning page");
                assert_eq!(phase, Phase::Observe);
            }
            _ => panic!("expected log event"),
        }
    }

    #[test]
    fn inbound_task_message_parses() {
        let raw = r#"{"type":"task","data":{"task":"do a thing"}}"#;
        let msg: InboundMessage = serde_json::from_str(raw).expect("parses");
        match msg {
            InboundMessage::Task { task, session_id } => {
                assert_eq!(task, "do a thing");
                assert!(session_id.is_none());
            }
            _ => panic!("expected task message"),
        }
    }

    #[test]
    fn inbound_confirmation_message_parses() {
        let raw = r#"{"type":"confirmation","data":{"sessionId":"s1","approved":true}}"#;
        let msg: InboundMessage = serde_json::from_str(raw).expect("parses");
        assert!(matches!(msg, InboundMessage::Confirmation { approved: true, .. }));
    }
}
