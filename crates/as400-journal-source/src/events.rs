//! Change events and event sinks
//!
//! The engine writes an ordered stream of [`ChangeEvent`]s to a single
//! [`EventSink`]. Within a poll cycle the events of one table precede those
//! of the next, and the state commit is always the last event of the cycle.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::state::JobState;

/// A unit of the replicated event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ChangeEvent {
    /// A row was inserted or updated; carries every declared property.
    Upsert {
        #[serde(rename = "dataJson")]
        data_json: String,
    },
    /// A row was deleted; carries the key properties captured at its last
    /// upsert.
    Delete {
        #[serde(rename = "dataJson")]
        data_json: String,
    },
    /// The job state to resume from after every preceding event.
    StateCommit {
        #[serde(rename = "stateJson")]
        state_json: String,
    },
}

impl ChangeEvent {
    pub fn upsert(data: &Map<String, Value>) -> Self {
        Self::Upsert {
            data_json: Value::Object(data.clone()).to_string(),
        }
    }

    pub fn delete(keys: &Map<String, Value>) -> Self {
        Self::Delete {
            data_json: Value::Object(keys.clone()).to_string(),
        }
    }

    pub fn state_commit(state: &JobState) -> crate::Result<Self> {
        Ok(Self::StateCommit {
            state_json: state.to_json()?,
        })
    }

    /// Short name of the event kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Upsert { .. } => "upsert",
            Self::Delete { .. } => "delete",
            Self::StateCommit { .. } => "stateCommit",
        }
    }

    pub fn is_state_commit(&self) -> bool {
        matches!(self, Self::StateCommit { .. })
    }

    /// Parsed payload of an upsert or delete.
    pub fn data(&self) -> Option<Value> {
        match self {
            Self::Upsert { data_json } | Self::Delete { data_json } => {
                serde_json::from_str(data_json).ok()
            }
            Self::StateCommit { .. } => None,
        }
    }

    /// Parsed job state of a state commit.
    pub fn job_state(&self) -> Option<JobState> {
        match self {
            Self::StateCommit { state_json } => JobState::from_json(state_json).ok(),
            _ => None,
        }
    }
}

/// Downstream consumer of the event stream.
#[async_trait]
pub trait EventSink: Send {
    /// Write one event. Events must be delivered in the order written.
    async fn write(&mut self, event: ChangeEvent) -> Result<()>;

    /// Flush buffered events.
    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Collects events in memory.
#[async_trait]
impl EventSink for Vec<ChangeEvent> {
    async fn write(&mut self, event: ChangeEvent) -> Result<()> {
        self.push(event);
        Ok(())
    }
}

/// Forwards events over a tokio channel.
pub struct ChannelSink {
    tx: mpsc::Sender<ChangeEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<ChangeEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink and the receiving end of its channel.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ChangeEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn write(&mut self, event: ChangeEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| anyhow::anyhow!("event receiver dropped"))
    }
}

/// Writes one JSON object per line.
pub struct JsonlSink<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> JsonlSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> EventSink for JsonlSink<W> {
    async fn write(&mut self, event: ChangeEvent) -> Result<()> {
        let mut line = serde_json::to_vec(&event)?;
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_event_serialization() {
        let event = ChangeEvent::delete(&map(json!({"ID": 5})));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({"action": "delete", "dataJson": "{\"ID\":5}"})
        );
        assert_eq!(event.data(), Some(json!({"ID": 5})));
        assert_eq!(event.kind(), "delete");
    }

    #[test]
    fn test_state_commit_carries_state() {
        let mut state = JobState::default();
        state.record_max_sequence("J_N", 3);
        let event = ChangeEvent::state_commit(&state).unwrap();
        assert!(event.is_state_commit());
        assert_eq!(event.job_state(), Some(state));
        assert_eq!(event.data(), None);
    }

    #[tokio::test]
    async fn test_jsonl_sink_writes_lines() {
        let mut sink = JsonlSink::new(Vec::new());
        sink.write(ChangeEvent::upsert(&map(json!({"A": "x"}))))
            .await
            .unwrap();
        sink.write(ChangeEvent::delete(&map(json!({"A": "x"}))))
            .await
            .unwrap();
        sink.flush().await.unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<ChangeEvent> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].kind(), "upsert");
        assert_eq!(lines[1].kind(), "delete");
    }

    #[tokio::test]
    async fn test_channel_sink_fails_without_receiver() {
        let (mut sink, rx) = ChannelSink::channel(4);
        sink.write(ChangeEvent::upsert(&Map::new())).await.unwrap();
        drop(rx);
        assert!(sink.write(ChangeEvent::upsert(&Map::new())).await.is_err());
    }
}
