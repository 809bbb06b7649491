//! Events of a streamed round and the channel they travel through.

use crate::error::RuntimeError;
use gm_core::{Deltas, RoundDocument};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Progress message for the client's console.
    Log { content: String },
    /// Attribute changes applied for one actor.
    Delta { data: Deltas },
    /// An actor's logic chain, prefixed with its label.
    Thought { content: String },
    NarrativeBegin {
        #[serde(rename = "streamId")]
        stream_id: String,
        actor: String,
    },
    Token {
        content: String,
        #[serde(rename = "streamId")]
        stream_id: String,
    },
    /// A directive chosen by an AI actor.
    Player { text: String },
    /// Always the last event of a stream.
    Done {
        state: Box<RoundDocument>,
        event_summary: String,
        /// Net change over the whole round.
        deltas: Deltas,
        persisted: bool,
    },
}

impl StreamEvent {
    pub fn log(content: impl Into<String>) -> Self {
        StreamEvent::Log {
            content: content.into(),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, StreamEvent::Done { .. })
    }
}

/// Sending half of a round's event stream.
#[derive(Clone, Debug)]
pub struct EventSink {
    tx: mpsc::Sender<StreamEvent>,
}

impl EventSink {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<StreamEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Fails once the receiving side is gone.
    pub async fn emit(&self, event: StreamEvent) -> Result<(), RuntimeError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| RuntimeError::Disconnected)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn events_use_client_field_names() {
        let begin = StreamEvent::NarrativeBegin {
            stream_id: "2-ceo".into(),
            actor: "CEO".into(),
        };
        assert_eq!(
            serde_json::to_value(&begin).unwrap(),
            json!({"type": "narrative_begin", "streamId": "2-ceo", "actor": "CEO"})
        );
        let mut data = Deltas::new();
        data.insert("cash".into(), -100);
        assert_eq!(
            serde_json::to_value(StreamEvent::Delta { data }).unwrap(),
            json!({"type": "delta", "data": {"cash": -100}})
        );
    }

    #[tokio::test]
    async fn emit_fails_after_receiver_drops() {
        let (sink, mut rx) = EventSink::channel(4);
        sink.emit(StreamEvent::log("hello")).await.unwrap();
        assert_eq!(rx.recv().await, Some(StreamEvent::log("hello")));
        drop(rx);
        assert!(sink.is_closed());
        assert!(matches!(
            sink.emit(StreamEvent::log("lost")).await,
            Err(RuntimeError::Disconnected)
        ));
    }
}
