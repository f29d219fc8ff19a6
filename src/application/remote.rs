// src/application/remote.rs
use crate::domain::DomainError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// Actions this crate sends to the remote automation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    AddNotes,
    Version,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::AddNotes => "addNotes",
            Action::Version => "version",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The request never produced a usable response body.
    #[error("{0}")]
    Transport(String),
    /// The response was malformed or carried an error.
    #[error("{0}")]
    Protocol(String),
}

impl From<RemoteError> for DomainError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::Transport(msg) => DomainError::Transport(msg),
            RemoteError::Protocol(msg) => DomainError::Protocol(msg),
        }
    }
}

/// A client for the remote automation endpoint.
pub trait RemoteInvoker {
    fn invoke(&self, action: Action, params: Value) -> Result<Value, RemoteError>;
}

impl<T: RemoteInvoker + ?Sized> RemoteInvoker for &T {
    fn invoke(&self, action: Action, params: Value) -> Result<Value, RemoteError> {
        (**self).invoke(action, params)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOutcome {
    Delivered(Value),
    TransportFailure(String),
    ProtocolFailure(String),
}

impl From<Result<Value, RemoteError>> for RemoteOutcome {
    fn from(result: Result<Value, RemoteError>) -> Self {
        match result {
            Ok(value) => RemoteOutcome::Delivered(value),
            Err(RemoteError::Transport(msg)) => RemoteOutcome::TransportFailure(msg),
            Err(RemoteError::Protocol(msg)) => RemoteOutcome::ProtocolFailure(msg),
        }
    }
}

/// Per-note result of a batch submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NoteOutcome {
    Added(i64),
    Failed(String),
}

impl From<Result<i64, DomainError>> for NoteOutcome {
    fn from(result: Result<i64, DomainError>) -> Self {
        match result {
            Ok(id) => NoteOutcome::Added(id),
            Err(e) => NoteOutcome::Failed(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchStrategy {
    Remote(Vec<NoteOutcome>),
    LocalFallback { reason: String },
}

/// Keep the remote result when it is a well-formed per-note list for the
/// whole batch, otherwise fall back to local processing.
///
/// A delivered result of the wrong shape also falls back, so notes the remote
/// did insert may be added a second time; the raw result is logged.
pub fn choose_strategy(outcome: RemoteOutcome, batch_size: usize) -> BatchStrategy {
    let result = match outcome {
        RemoteOutcome::Delivered(result) => result,
        RemoteOutcome::TransportFailure(reason) | RemoteOutcome::ProtocolFailure(reason) => {
            return BatchStrategy::LocalFallback { reason };
        }
    };

    let reason = match Vec::<Option<i64>>::deserialize(&result) {
        Ok(ids) if ids.len() == batch_size => {
            return BatchStrategy::Remote(
                ids.into_iter()
                    .map(|id| match id {
                        Some(id) => NoteOutcome::Added(id),
                        None => NoteOutcome::Failed(
                            "note was not added by the remote service".to_string(),
                        ),
                    })
                    .collect(),
            );
        }
        Ok(ids) => format!(
            "remote returned {} results for {} notes",
            ids.len(),
            batch_size
        ),
        Err(e) => format!("unexpected addNotes result: {}", e),
    };
    warn!(%result, %reason, "Discarding delivered remote result");
    BatchStrategy::LocalFallback { reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn given_id_list_when_choosing_strategy_then_keeps_remote_outcomes() {
        let outcome = RemoteOutcome::Delivered(json!([1, null, 3]));

        let strategy = choose_strategy(outcome, 3);

        match strategy {
            BatchStrategy::Remote(outcomes) => {
                assert_eq!(outcomes[0], NoteOutcome::Added(1));
                assert!(matches!(outcomes[1], NoteOutcome::Failed(_)));
                assert_eq!(outcomes[2], NoteOutcome::Added(3));
            }
            other => panic!("Expected remote strategy, got {:?}", other),
        }
    }

    #[test]
    fn given_transport_failure_when_choosing_strategy_then_falls_back_locally() {
        let outcome = RemoteOutcome::TransportFailure("connection refused".to_string());

        let strategy = choose_strategy(outcome, 2);

        assert_eq!(
            strategy,
            BatchStrategy::LocalFallback {
                reason: "connection refused".to_string()
            }
        );
    }

    #[test]
    fn given_protocol_failure_when_choosing_strategy_then_falls_back_locally() {
        let outcome = RemoteOutcome::from(Err(RemoteError::Protocol("collection is not available".to_string())));

        let strategy = choose_strategy(outcome, 1);

        assert!(matches!(strategy, BatchStrategy::LocalFallback { .. }));
    }

    #[test]
    fn given_wrong_result_length_when_choosing_strategy_then_falls_back_locally() {
        let strategy = choose_strategy(RemoteOutcome::Delivered(json!([1])), 2);

        assert_eq!(
            strategy,
            BatchStrategy::LocalFallback {
                reason: "remote returned 1 results for 2 notes".to_string()
            }
        );
    }

    #[test]
    fn given_non_list_result_when_choosing_strategy_then_falls_back_locally() {
        let strategy = choose_strategy(RemoteOutcome::Delivered(json!({"ids": [1]})), 1);

        assert!(matches!(strategy, BatchStrategy::LocalFallback { .. }));
    }

    #[test]
    fn given_outcomes_when_serializing_then_uses_tagged_camel_case() {
        let json = serde_json::to_value(vec![
            NoteOutcome::Added(7),
            NoteOutcome::Failed("boom".to_string()),
        ])
        .unwrap();

        assert_eq!(json, json!([{"added": 7}, {"failed": "boom"}]));
    }
}
