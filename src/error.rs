//! Error types for the airline agents

use thiserror::Error;

/// Result type alias for the airline agents
pub type Result<T> = std::result::Result<T, AgentsError>;

/// Main error type for the airline agents
#[derive(Debug, Error)]
pub enum AgentsError {
    /// Missing or malformed configuration; fatal at startup
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// An input guardrail tripped; the turn was aborted before any agent ran
    #[error("Input guardrail triggered ({guardrail}): {reasoning}")]
    InputGuardrailTriggered { guardrail: String, reasoning: String },

    /// A tool was called while the session context lacked a required field
    #[error("Tool precondition failed: {tool} requires {missing}")]
    ToolPreconditionFailed { tool: String, missing: String },

    /// The model supplied arguments a tool could not decode
    #[error("Invalid arguments for {tool}: {message}")]
    ToolArguments { tool: String, message: String },

    /// Tool execution error
    #[error("Tool execution error: {message}")]
    ToolExecutionError { message: String },

    /// A handoff along an edge the graph does not declare
    #[error("Handoff error: {message}")]
    HandoffError { message: String },

    /// No agent registered under the requested id
    #[error("Unknown agent: {name}")]
    UnknownAgent { name: String },

    /// Model behavior error
    #[error("Model behavior error: {message}")]
    ModelBehaviorError { message: String },

    /// The agent loop made more model calls than allowed within one turn
    #[error("Maximum steps exceeded: {max_steps}")]
    MaxStepsExceeded { max_steps: usize },

    /// Error from the OpenAI-compatible API
    #[error("OpenAI API error: {0}")]
    OpenAIError(#[from] async_openai::error::OpenAIError),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl AgentsError {
    /// True for guardrail blocks, which callers surface as "request blocked"
    /// rather than as a failure.
    pub fn is_tripwire(&self) -> bool {
        matches!(self, Self::InputGuardrailTriggered { .. })
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub(crate) fn precondition(tool: &str, missing: &str) -> Self {
        Self::ToolPreconditionFailed {
            tool: tool.to_string(),
            missing: missing.to_string(),
        }
    }
}
