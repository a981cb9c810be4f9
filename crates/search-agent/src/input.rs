//! Line input shared by the key prompt and the chat loop.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;

type BoxedReader = Box<dyn AsyncBufRead + Send + Unpin>;

/// A buffered line source. Clones read from the same buffer, so no input
/// is lost when several readers take turns.
#[derive(Clone)]
pub struct LineReader {
    reader: Arc<Mutex<BoxedReader>>,
}

impl LineReader {
    /// Wraps a buffered reader.
    pub fn new<R: AsyncBufRead + Send + Unpin + 'static>(reader: R) -> Self {
        Self {
            reader: Arc::new(Mutex::new(Box::new(reader))),
        }
    }

    /// Reads lines from the process's standard input.
    #[inline]
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }

    /// Returns the next line with its line ending, or `None` at the end of
    /// the input. Read errors are logged and end the input too.
    pub async fn read_line(&self) -> Option<String> {
        let mut reader = self.reader.lock().await;
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) => None,
            Ok(_) => Some(line),
            Err(err) => {
                error!("error reading input: {err}");
                None
            }
        }
    }
}
