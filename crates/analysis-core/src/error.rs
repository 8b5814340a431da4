use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Data provider error: {0}")]
    DataProvider(String),

    #[error("Agent {agent} failed: {reason}")]
    AgentFailed { agent: String, reason: String },

    #[error("Agent {agent} timed out after {secs}s")]
    Timeout { agent: String, secs: u64 },

    #[error("No agents available for analysis")]
    NoAgents,

    #[error("All agents failed to produce results for {0}")]
    AllAgentsFailed(String),

    #[error("Invalid weights: {0}")]
    InvalidWeights(String),

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),
}
