use std::time::Duration;

use crate::RetryPolicy;

/// Limits and options of agent runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AgentConfig {
    /// Model requests per run, corrections included.
    pub max_iterations: usize,
    /// Unparsable replies tolerated per run before giving up.
    pub max_parse_retries: usize,
    /// Wall-clock bound of a run. `None` means unbounded.
    pub max_execution_time: Option<Duration>,
    /// Whether model replies are streamed.
    pub stream: bool,
    /// How failed model requests are retried.
    pub retry: RetryPolicy,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            max_parse_retries: 3,
            max_execution_time: Some(Duration::from_secs(120)),
            stream: true,
            retry: RetryPolicy::default(),
        }
    }
}
