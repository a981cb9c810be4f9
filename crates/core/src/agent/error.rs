use std::time::Duration;

use search_agent_model::ModelProviderError;

/// Why an agent run ended without an answer.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The model didn't give a final answer within the iteration budget.
    #[error("agent stopped after {0} iterations without a final answer")]
    IterationLimit(usize),
    /// The model kept replying in a format that couldn't be parsed.
    #[error("could not parse model output after {retries} retries: {reason}")]
    MalformedOutput {
        /// The reason of the last parse error.
        reason: String,
        /// How many corrections were attempted.
        retries: usize,
    },
    /// The model request failed, after retrying if possible.
    #[error("model request failed: {0}")]
    Model(Box<dyn ModelProviderError>),
    /// The run took longer than allowed.
    #[error("agent stopped after exceeding the time limit of {0:?}")]
    Timeout(Duration),
}
