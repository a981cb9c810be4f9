use std::pin::Pin;

use super::{Tool, ToolResult};

pub(crate) type BoxedToolFuture = Pin<Box<dyn Future<Output = ToolResult> + Send>>;

pub(crate) trait ToolObject: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn max_chars(&self) -> usize;

    fn execute(&self, query: String) -> BoxedToolFuture;
}

pub(crate) struct ToolObjectImpl<T: Tool>(pub T);

impl<T: Tool> ToolObject for ToolObjectImpl<T> {
    #[inline]
    fn name(&self) -> &str {
        self.0.name()
    }

    #[inline]
    fn description(&self) -> &str {
        self.0.description()
    }

    #[inline]
    fn max_chars(&self) -> usize {
        self.0.max_chars()
    }

    #[inline]
    fn execute(&self, query: String) -> BoxedToolFuture {
        Box::pin(self.0.execute(query))
    }
}
