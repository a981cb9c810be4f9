use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ChunksError(ChunksError),
    InvalidPayload,
}

/// A type for reading the `data` of server-sent events from a chunk
/// stream.
///
/// Comment lines and fields other than `data` are skipped. Multiple
/// `data` lines of one event are joined with a line feed.
pub struct Sse {
    buf: Vec<u8>,
    chunks: Chunks,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: Vec::new(),
            chunks,
        }
    }

    pub async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            // Drain complete events that are already buffered.
            while let Some(block) = self.take_block() {
                if let Some(data) = parse_block(&block)? {
                    return Ok(Some(data));
                }
            }

            let Some(bytes) =
                self.chunks.next_chunk().await.map_err(Error::ChunksError)?
            else {
                // An unterminated trailing event is dropped.
                return Ok(None);
            };
            self.buf.extend_from_slice(&bytes);
        }
    }

    /// Removes one event block (without its terminator) from the buffer.
    fn take_block(&mut self) -> Option<Vec<u8>> {
        let (end, terminator_len) = find_terminator(&self.buf)?;
        let block = self.buf[..end].to_vec();
        self.buf.drain(..end + terminator_len);
        Some(block)
    }
}

// event       = *( comment / field ) end-of-line
// end-of-line = ( cr lf / cr / lf )
//
// Only `lf lf` and `cr lf cr lf` are accepted as event terminators.
fn find_terminator(buf: &[u8]) -> Option<(usize, usize)> {
    let lf = buf.windows(2).position(|w| w == b"\n\n").map(|i| (i, 2));
    let crlf = buf
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn parse_block(block: &[u8]) -> Result<Option<String>, Error> {
    let Ok(text) = str::from_utf8(block) else {
        return Err(Error::InvalidPayload);
    };

    let mut data: Option<String> = None;
    for line in text.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => {
                (field, value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line, ""),
        };
        if field != "data" {
            continue;
        }
        match &mut data {
            Some(data) => {
                data.push('\n');
                data.push_str(value);
            }
            None => data = Some(value.to_owned()),
        }
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn sse_from(chunks: &[&'static [u8]]) -> Sse {
        Sse::new(Chunks::from_vec_deque(
            chunks.iter().copied().map(Bytes::from_static).collect(),
        ))
    }

    #[tokio::test]
    async fn test_normal_events() {
        let mut sse = sse_from(&[b"data: hello\n\n", b"data: bye\n\n"]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "hello");
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "bye");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_split_across_chunks() {
        let mut sse = sse_from(&[b"data:", b" hel", b"lo\n", b"\n"]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "hello");
        assert_eq!(sse.next_event().await.unwrap(), None);

        // A multi-byte character split by the transport.
        let mut sse = sse_from(&[b"data: caf\xc3", b"\xa9\n\n"]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "caf\u{e9}");
    }

    #[tokio::test]
    async fn test_comments_and_other_fields() {
        let mut sse = sse_from(&[
            b": ping\n\n",
            b"event: message\r\nid: 7\r\ndata: first\r\ndata: second\r\n\r\n",
        ]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "first\nsecond");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_data() {
        let mut sse = sse_from(&[b"data: \xff\xfe\n\n"]);
        assert_eq!(sse.next_event().await.unwrap_err(), Error::InvalidPayload);

        let mut sse = sse_from(&[b"xxxxxx\n"]);
        assert_eq!(sse.next_event().await.unwrap(), None);

        let mut sse = sse_from(&[b"data: hello\n", b"data: bye\n"]);
        assert_eq!(sse.next_event().await.unwrap(), None);
    }
}
