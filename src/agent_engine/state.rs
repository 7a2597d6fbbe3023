use serde::{Deserialize, Serialize};

/// Lifecycle states of the agent during one chat turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AgentState {
    Idle,
    Reasoning { depth: u32 },
    Acting { depth: u32 },
    Executing { actions: usize },
    Done { outcome: TurnOutcome },
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TurnOutcome {
    /// The action batch ran to the end.
    Executed { executed: usize, skipped: usize },
    /// An action failed; the rest of the batch was abandoned.
    ExecutionAborted { error: String },
    /// A JSON array was found but could not be decoded.
    ParseFailed,
    /// The model produced the same reply twice in a row.
    Repeated,
    /// No JSON array after the maximum number of attempts.
    DepthExceeded,
    /// A model call failed.
    Failed { error: String },
}
