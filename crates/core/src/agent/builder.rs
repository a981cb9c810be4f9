use search_agent_model::ModelProvider;

use super::{Agent, AgentConfig};
use crate::model_client::{ModelClient, RetryPolicy};
use crate::tool::Registry;

/// [`Agent`] builder.
pub struct AgentBuilder {
    pub(crate) model_client: ModelClient,
    pub(crate) registry: Registry,
    pub(crate) config: AgentConfig,
}

impl AgentBuilder {
    /// Creates a new builder with the specified model provider, no tools
    /// and the default configuration.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider, RetryPolicy::default()),
            registry: Registry::default(),
            config: AgentConfig::default(),
        }
    }

    /// Sets the tools the model can call.
    #[inline]
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    /// Replaces the configuration.
    #[inline]
    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the agent.
    #[inline]
    pub fn build(self) -> Agent {
        Agent::from_builder(self)
    }
}
