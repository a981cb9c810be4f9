use search_agent_model::ModelFinishReason;
use serde::{Deserialize, Serialize};

/// The preset response for an assistant step.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Text pieces streamed one by one.
    pub deltas: Vec<String>,
    /// Reported after the last delta.
    pub finish_reason: ModelFinishReason,
    /// If set, the request will fail in the first `failures` attempts.
    /// `Some(0)` means the request will fail infinitely.
    #[serde(default)]
    pub failures: Option<u64>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` that streams the given pieces.
    #[inline]
    pub fn with_deltas<S: Into<String>>(
        deltas: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            deltas: deltas.into_iter().map(Into::into).collect(),
            finish_reason: ModelFinishReason::Stop,
            failures: None,
        }
    }

    /// Creates a `PresetResponse` that streams `text` line by line, the
    /// way a real model tends to flush its output.
    pub fn with_text(text: &str) -> Self {
        Self::with_deltas(text.split_inclusive('\n'))
    }

    /// Sets failure times before a successful response. `0` means the
    /// response will always be a failure.
    #[inline]
    pub fn with_failures(mut self, failures: u64) -> Self {
        self.failures = Some(failures);
        self
    }

    /// Reports that the output was cut by the token limit.
    #[inline]
    pub fn truncated(mut self) -> Self {
        self.finish_reason = ModelFinishReason::Length;
        self
    }

    pub(crate) fn should_fail(&self, attempt: u64) -> bool {
        match self.failures {
            None => false,
            Some(0) => true,
            Some(failures) => attempt < failures,
        }
    }
}
