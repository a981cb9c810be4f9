use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures_util::future::BoxFuture;
use pin_project_lite::pin_project;
use search_agent_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
};

use crate::Error;
use crate::io::Sse;
use crate::proto::{self, ChatCompletion, ChatCompletionChunk};

struct StreamState {
    sse: Sse,
    id: Option<String>,
    // Events decoded from one chunk are handed out one at a time.
    pending: VecDeque<ModelResponseEvent>,
    completed: bool,
}

type NextEvent = Result<(Option<ModelResponseEvent>, StreamState), Error>;

pin_project! {
    pub struct OpenAIResponse {
        next_event_fut: Option<BoxFuture<'static, NextEvent>>,
        buffered: VecDeque<ModelResponseEvent>,
    }
}

impl OpenAIResponse {
    /// Creates a response that decodes chunks from a server-sent event
    /// stream as they arrive.
    pub fn from_sse(sse: Sse) -> Self {
        let state = StreamState {
            sse,
            id: None,
            pending: VecDeque::new(),
            completed: false,
        };
        Self {
            next_event_fut: Some(Box::pin(next_event(state))),
            buffered: VecDeque::new(),
        }
    }

    /// Creates a response from a complete, non-streamed completion.
    pub fn from_completion(completion: ChatCompletion) -> Self {
        let mut buffered = VecDeque::with_capacity(2);
        let choice = completion.choices.into_iter().next();
        let (content, reason) = match choice {
            Some(choice) => (choice.message.content, choice.finish_reason),
            None => (None, None),
        };
        if let Some(content) = content.filter(|c| !c.is_empty()) {
            buffered.push_back(ModelResponseEvent::MessageDelta(content));
        }
        let reason = reason
            .as_deref()
            .map(proto::finish_reason)
            .unwrap_or(ModelFinishReason::Stop);
        buffered.push_back(ModelResponseEvent::Completed(reason));
        Self {
            next_event_fut: None,
            buffered,
        }
    }
}

impl ModelResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        if let Some(event) = this.buffered.pop_front() {
            return Poll::Ready(Ok(Some(event)));
        }
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };

        let (event, state) = match ready!(next_event_fut.as_mut().poll(cx)) {
            Ok((Some(event), state)) => (event, state),
            Ok((None, _)) => {
                *this.next_event_fut = None;
                return Poll::Ready(Ok(None));
            }
            Err(err) => {
                *this.next_event_fut = None;
                return Poll::Ready(Err(err));
            }
        };

        // The stream may still have more data, prepare the next pull.
        *this.next_event_fut = Some(Box::pin(next_event(state)));
        Poll::Ready(Ok(Some(event)))
    }
}

async fn next_event(mut state: StreamState) -> NextEvent {
    loop {
        if let Some(event) = state.pending.pop_front() {
            return Ok((Some(event), state));
        }
        if state.completed {
            return Ok((None, state));
        }

        let data = match state.sse.next_event().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                // Some servers close the stream without a finish reason.
                state.completed = true;
                return Ok((
                    Some(ModelResponseEvent::Completed(ModelFinishReason::Stop)),
                    state,
                ));
            }
            Err(err) => {
                return Err(Error::new(
                    format!("broken event stream: {err:?}"),
                    ErrorKind::Unavailable,
                ));
            }
        };
        trace!("got sse event: {data}");
        if data == "[DONE]" {
            state.completed = true;
            return Ok((
                Some(ModelResponseEvent::Completed(ModelFinishReason::Stop)),
                state,
            ));
        }

        let chunk = serde_json::from_str::<ChatCompletionChunk>(&data)
            .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;
        if state.id.get_or_insert_with(|| chunk.id.clone()) != &chunk.id {
            return Err(Error::new("chunk id mismatch", ErrorKind::Other));
        }

        // Usage-only chunks carry no choice.
        let Some(choice) = chunk.choices.into_iter().next() else {
            continue;
        };
        if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
            state
                .pending
                .push_back(ModelResponseEvent::MessageDelta(content));
        }
        if let Some(reason) = choice.finish_reason {
            state.completed = true;
            state.pending.push_back(ModelResponseEvent::Completed(
                proto::finish_reason(&reason),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use bytes::Bytes;

    use super::*;
    use crate::io::Chunks;

    async fn collect(
        resp: OpenAIResponse,
    ) -> Result<Vec<ModelResponseEvent>, Error> {
        let mut resp = pin!(resp);
        let mut events = vec![];
        while let Some(event) =
            poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await?
        {
            events.push(event);
        }
        // Exhausted responses keep returning `None`.
        assert!(matches!(
            poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await,
            Ok(None)
        ));
        Ok(events)
    }

    fn sse_from(body: &'static [u8]) -> Sse {
        Sse::new(Chunks::from_vec_deque(
            vec![Bytes::from_static(body)].into(),
        ))
    }

    #[tokio::test]
    async fn test_stream_events() {
        let sse = sse_from(include_bytes!("../fixtures/stream_response.txt"));
        let events = collect(OpenAIResponse::from_sse(sse)).await.unwrap();

        let text: String = events
            .iter()
            .filter_map(|event| match event {
                ModelResponseEvent::MessageDelta(delta) => Some(delta.as_str()),
                ModelResponseEvent::Completed(_) => None,
            })
            .collect();
        assert_eq!(
            text,
            "Thought: I should search arxiv.\nAction: arxiv\nAction Input: transformer efficiency"
        );
        // Exactly one completion, and it comes last.
        assert_eq!(
            events.last(),
            Some(&ModelResponseEvent::Completed(ModelFinishReason::Stop))
        );
        let completions = events
            .iter()
            .filter(|event| matches!(event, ModelResponseEvent::Completed(_)))
            .count();
        assert_eq!(completions, 1);
    }

    #[tokio::test]
    async fn test_stream_without_finish_reason() {
        let sse = sse_from(
            b"data: {\"id\":\"a\",\"choices\":[{\"delta\":{\"content\":\"Hi\"},\"finish_reason\":null}]}\n\n",
        );
        let events = collect(OpenAIResponse::from_sse(sse)).await.unwrap();
        assert_eq!(
            events,
            vec![
                ModelResponseEvent::MessageDelta("Hi".to_owned()),
                ModelResponseEvent::Completed(ModelFinishReason::Stop),
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_id_mismatch() {
        let sse = sse_from(
            b"data: {\"id\":\"a\",\"choices\":[{\"delta\":{\"content\":\"Hi\"},\"finish_reason\":null}]}\n\n\
              data: {\"id\":\"b\",\"choices\":[{\"delta\":{\"content\":\"!\"},\"finish_reason\":null}]}\n\n",
        );
        let err = collect(OpenAIResponse::from_sse(sse)).await.unwrap_err();
        assert_eq!(err.message(), "chunk id mismatch");
    }

    #[tokio::test]
    async fn test_completion() {
        let completion: ChatCompletion = serde_json::from_str(
            r#"{"id":"c","choices":[{"index":0,"message":{"role":"assistant","content":"Final Answer: 42"},"finish_reason":"length"}]}"#,
        )
        .unwrap();
        let events =
            collect(OpenAIResponse::from_completion(completion)).await.unwrap();
        assert_eq!(
            events,
            vec![
                ModelResponseEvent::MessageDelta("Final Answer: 42".to_owned()),
                ModelResponseEvent::Completed(ModelFinishReason::Length),
            ]
        );
    }
}
