use std::sync::Arc;

use tracing::Instrument;

use crate::tool::object::{ToolObject, ToolObjectImpl};
use crate::tool::{DEFAULT_MAX_CHARS, Error, Tool, ToolResult, truncate_chars};

/// The name and description of a registered tool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolDescriptor {
    /// The name the model uses to call the tool.
    pub name: String,
    /// When the tool should be used.
    pub description: String,
    /// The result bound in characters.
    pub max_chars: usize,
}

/// The text fed back to the model after a tool call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Observation {
    /// The result, or `Error: <reason>`.
    pub text: String,
    /// Whether the text describes a failure instead of a result.
    pub failed: bool,
}

/// A builder for [`Registry`].
#[derive(Default)]
pub struct RegistryBuilder {
    tools: Vec<Arc<dyn ToolObject>>,
}

impl RegistryBuilder {
    /// Adds a tool. A tool registered later replaces an earlier one with
    /// the same name, keeping the earlier position.
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        let tool: Arc<dyn ToolObject> = Arc::new(ToolObjectImpl(tool));
        match self.tools.iter_mut().find(|t| t.name() == tool.name()) {
            Some(slot) => {
                warn!("tool `{}` registered twice", tool.name());
                *slot = tool;
            }
            None => self.tools.push(tool),
        }
        self
    }

    /// Freezes the tool set.
    #[inline]
    pub fn build(self) -> Registry {
        Registry {
            tools: self.tools.into(),
        }
    }
}

/// A fixed set of tools the model can call.
///
/// Cloning a registry is cheap, the tools are shared.
#[derive(Clone, Default)]
pub struct Registry {
    tools: Arc<[Arc<dyn ToolObject>]>,
}

impl Registry {
    /// Creates an empty [`RegistryBuilder`].
    #[inline]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Returns the descriptors of all tools in registration order.
    pub fn definitions(&self) -> Vec<ToolDescriptor> {
        self.tools
            .iter()
            .map(|tool| ToolDescriptor {
                name: tool.name().to_owned(),
                description: tool.description().to_owned(),
                max_chars: tool.max_chars(),
            })
            .collect()
    }

    /// Returns the tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.name()).collect()
    }

    /// Returns `true` if no tool is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    fn get(&self, name: &str) -> Option<&Arc<dyn ToolObject>> {
        self.tools.iter().find(|tool| tool.name() == name)
    }

    /// Calls a tool and returns its result, truncated to the tool's bound.
    ///
    /// The query is trimmed first; an empty query never reaches the tool.
    pub async fn invoke(&self, name: &str, query: &str) -> ToolResult {
        let Some(tool) = self.get(name) else {
            warn!("tool not found: {name}");
            let reason = format!(
                "{name} is not a valid tool, try one of [{}].",
                self.names().join(", ")
            );
            return Err(Error::not_found().with_reason(reason));
        };

        let query = query.trim();
        if query.is_empty() {
            return Err(Error::invalid_input()
                .with_reason(format!("{name} needs a non-empty query")));
        }

        let max_chars = tool.max_chars();
        let span = debug_span!("tool invoke", tool = name);
        async move {
            debug!("invoking with query: {query:?}");
            let output = tool.execute(query.to_owned()).await?;
            let truncated = truncate_chars(&output, max_chars);
            if truncated.len() < output.len() {
                trace!("truncated {} bytes of output", output.len() - truncated.len());
            }
            Ok(truncated.to_owned())
        }
        .instrument(span)
        .await
    }

    /// Calls a tool and renders the outcome as an observation, failures
    /// included. The text never exceeds the tool's bound.
    pub async fn render(&self, name: &str, query: &str) -> Observation {
        let max_chars = self
            .get(name)
            .map(|tool| tool.max_chars())
            .unwrap_or(DEFAULT_MAX_CHARS);
        match self.invoke(name, query).await {
            Ok(text) => Observation {
                text,
                failed: false,
            },
            Err(err) => {
                debug!("tool `{name}` failed: {err}");
                let text = format!("Error: {}", err.reason());
                Observation {
                    text: truncate_chars(&text, max_chars).to_owned(),
                    failed: true,
                }
            }
        }
    }
}
