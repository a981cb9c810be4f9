use std::future::ready;
use std::time::Duration;

use search_agent_model::{ErrorKind, ModelMessage};
use search_agent_test_model::{PresetResponse, TestModelProvider};

use crate::conversation::Conversation;
use crate::tool::{Error as ToolError, Registry, Tool, ToolResult};
use crate::{
    AgentBuilder, AgentConfig, AgentError, AgentEvent, EventReceiver,
    event_channel,
};

const ABSTRACT: &str = "Published: 2024-05-02\nTitle: Efficient Transformers\nAuthors: A. Author\nSummary: We survey methods that make transformers cheaper to train and run.";

struct FakeArxiv;

impl Tool for FakeArxiv {
    fn name(&self) -> &str {
        "arxiv"
    }

    fn description(&self) -> &str {
        "finds research papers"
    }

    fn execute(
        &self,
        _query: String,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        ready(Ok(ABSTRACT.to_owned()))
    }
}

struct Unreachable;

impl Tool for Unreachable {
    fn name(&self) -> &str {
        "Search"
    }

    fn description(&self) -> &str {
        "searches the web"
    }

    fn execute(
        &self,
        _query: String,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        ready(Err(ToolError::execution_error().with_reason("network is down")))
    }
}

fn registry() -> Registry {
    Registry::builder()
        .with_tool(Unreachable)
        .with_tool(FakeArxiv)
        .build()
}

fn drain(rx: &mut EventReceiver) -> Vec<AgentEvent> {
    let mut events = vec![];
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn without_deltas(events: Vec<AgentEvent>) -> Vec<AgentEvent> {
    events
        .into_iter()
        .filter(|event| !matches!(event, AgentEvent::MessageDelta(_)))
        .collect()
}

#[tokio::test]
async fn test_tool_call_then_answer() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_exchange(PresetResponse::with_text(
        "Thought: I should search arxiv.\nAction: arxiv\nAction Input: transformer efficiency",
    ));
    model_provider.add_exchange(PresetResponse::with_text(
        "Thought: I now know the final answer\nFinal Answer: The latest paper is \"Efficient Transformers\".",
    ));

    let agent = AgentBuilder::with_model_provider(model_provider.clone())
        .with_registry(registry())
        .build();
    let (tx, mut rx) = event_channel();
    let answer = agent
        .run(
            "What is the latest paper on transformer efficiency?",
            &Conversation::new(),
            &tx,
        )
        .await
        .unwrap();
    assert_eq!(answer, "The latest paper is \"Efficient Transformers\".");

    let events = drain(&mut rx);
    let deltas: String = events
        .iter()
        .filter_map(|event| match event {
            AgentEvent::MessageDelta(delta) => Some(delta.as_str()),
            _ => None,
        })
        .collect();
    assert!(deltas.starts_with("Thought: I should search arxiv.\n"));

    let output = ABSTRACT.chars().take(200).collect::<String>();
    assert_eq!(
        without_deltas(events),
        vec![
            AgentEvent::Thought("I should search arxiv.".to_owned()),
            AgentEvent::ToolCall {
                tool: "arxiv".to_owned(),
                input: "transformer efficiency".to_owned(),
            },
            AgentEvent::ToolResult {
                tool: "arxiv".to_owned(),
                output: output.clone(),
                failed: false,
            },
            AgentEvent::Thought("I now know the final answer".to_owned()),
            AgentEvent::FinalAnswer(answer.clone()),
        ]
    );

    // The observation is replayed after the first reply.
    let requests = model_provider.recorded_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[1].messages[1],
        ModelMessage::Assistant(
            "Thought: I should search arxiv.\nAction: arxiv\nAction Input: transformer efficiency"
                .to_owned()
        )
    );
    assert_eq!(
        requests[1].messages[2],
        ModelMessage::User(format!("Observation: {output}"))
    );
}

#[tokio::test]
async fn test_request_layout() {
    let mut model_provider = TestModelProvider::default();
    // The exchange already in the history.
    model_provider.add_exchange(PresetResponse::with_text("unused"));
    model_provider
        .add_exchange(PresetResponse::with_text("Final Answer: In 1965."));

    let mut history = Conversation::new();
    history.push_exchange("Who wrote Dune?", "Frank Herbert.");

    let agent = AgentBuilder::with_model_provider(model_provider.clone())
        .with_registry(registry())
        .build();
    let answer = agent
        .run("When was it published?", &history, &Default::default())
        .await
        .unwrap();
    assert_eq!(answer, "In 1965.");

    let requests = model_provider.recorded_requests();
    let req = &requests[0];
    assert_eq!(
        req.messages,
        vec![
            ModelMessage::User("Who wrote Dune?".to_owned()),
            ModelMessage::Assistant("Frank Herbert.".to_owned()),
            ModelMessage::User("When was it published?".to_owned()),
        ]
    );
    assert_eq!(req.stop, vec!["\nObservation:".to_owned()]);
    assert!(req.stream);
    let instruction = req.instruction.as_deref().unwrap();
    assert_eq!(instruction, agent.instruction());
    assert!(instruction.contains("Search: searches the web"));
    assert!(instruction.contains("[Search, arxiv]"));
}

#[tokio::test]
async fn test_failing_tool_stays_in_budget() {
    let config = AgentConfig {
        max_iterations: 4,
        ..Default::default()
    };

    let mut model_provider = TestModelProvider::default();
    for _ in 0..config.max_iterations {
        model_provider.add_exchange(PresetResponse::with_text(
            "Thought: try the web.\nAction: Search\nAction Input: weather in Paris",
        ));
    }

    let agent = AgentBuilder::with_model_provider(model_provider.clone())
        .with_registry(registry())
        .with_config(config)
        .build();
    let (tx, mut rx) = event_channel();
    let err = agent
        .run("What's the weather in Paris?", &Conversation::new(), &tx)
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::IterationLimit(4)));
    assert_eq!(model_provider.recorded_requests().len(), 4);

    let failures = drain(&mut rx)
        .into_iter()
        .filter(|event| {
            matches!(
                event,
                AgentEvent::ToolResult { failed: true, output, .. }
                    if output == "Error: network is down"
            )
        })
        .count();
    assert_eq!(failures, 4);
}

#[tokio::test]
async fn test_answer_after_failing_tool() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_exchange(PresetResponse::with_text(
        "Action: Search\nAction Input: weather in Paris",
    ));
    model_provider.add_exchange(PresetResponse::with_text(
        "Thought: the tool is broken.\nFinal Answer: I couldn't look it up.",
    ));

    let agent = AgentBuilder::with_model_provider(model_provider.clone())
        .with_registry(registry())
        .build();
    let answer = agent
        .run("Weather?", &Conversation::new(), &Default::default())
        .await
        .unwrap();
    assert_eq!(answer, "I couldn't look it up.");

    let requests = model_provider.recorded_requests();
    assert_eq!(
        requests[1].messages[2],
        ModelMessage::User("Observation: Error: network is down".to_owned())
    );
}

#[tokio::test]
async fn test_unknown_tool_is_observed() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_exchange(PresetResponse::with_text(
        "Action: calculator\nAction Input: 2 + 2",
    ));
    model_provider.add_exchange(PresetResponse::with_text("Final Answer: 4"));

    let agent = AgentBuilder::with_model_provider(model_provider.clone())
        .with_registry(registry())
        .build();
    let (tx, mut rx) = event_channel();
    agent
        .run("2 + 2?", &Conversation::new(), &tx)
        .await
        .unwrap();

    let events = without_deltas(drain(&mut rx));
    let AgentEvent::ToolResult { output, failed, .. } = &events[1] else {
        panic!("unexpected event: {:?}", events[1]);
    };
    assert!(failed);
    assert!(output.contains("[Search, arxiv]"));
}

#[tokio::test]
async fn test_parse_error_recovery() {
    let mut model_provider = TestModelProvider::default();
    model_provider
        .add_exchange(PresetResponse::with_text("I think the answer is 4."));
    model_provider.add_exchange(PresetResponse::with_text(
        "Thought: I now know the final answer\nFinal Answer: 4",
    ));

    let agent = AgentBuilder::with_model_provider(model_provider.clone())
        .with_registry(registry())
        .build();
    let (tx, mut rx) = event_channel();
    let answer = agent
        .run("2 + 2?", &Conversation::new(), &tx)
        .await
        .unwrap();
    assert_eq!(answer, "4");

    let events = without_deltas(drain(&mut rx));
    assert_eq!(
        events[0],
        AgentEvent::ParseError {
            reason: "Missing 'Action:' after 'Thought:'".to_owned()
        }
    );

    let requests = model_provider.recorded_requests();
    let ModelMessage::User(correction) = &requests[1].messages[2] else {
        panic!("expected a correction");
    };
    assert!(correction.starts_with("Observation: Invalid Format:"));
}

#[tokio::test]
async fn test_parse_retries_exhausted() {
    let mut model_provider = TestModelProvider::default();
    for _ in 0..4 {
        model_provider.add_exchange(PresetResponse::with_text(
            "Thought: search it\nAction: Search",
        ));
    }

    let agent = AgentBuilder::with_model_provider(model_provider.clone())
        .with_registry(registry())
        .build();
    let err = agent
        .run("Anything?", &Conversation::new(), &Default::default())
        .await
        .unwrap_err();
    let AgentError::MalformedOutput { reason, retries } = err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(reason, "Missing 'Action Input:' after 'Action:'");
    assert_eq!(retries, 3);
    assert_eq!(model_provider.recorded_requests().len(), 4);
}

#[tokio::test]
async fn test_model_error() {
    // Nothing scripted, so every request fails with a permanent error.
    let model_provider = TestModelProvider::default();
    let agent = AgentBuilder::with_model_provider(model_provider).build();
    let err = agent
        .run("Hi", &Conversation::new(), &Default::default())
        .await
        .unwrap_err();
    let AgentError::Model(err) = err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(err.kind(), ErrorKind::Other);
}

#[tokio::test(start_paused = true)]
async fn test_transient_model_failure_is_retried() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_exchange(
        PresetResponse::with_text("Final Answer: back online").with_failures(2),
    );

    let agent = AgentBuilder::with_model_provider(model_provider.clone()).build();
    let answer = agent
        .run("Hi", &Conversation::new(), &Default::default())
        .await
        .unwrap();
    assert_eq!(answer, "back online");
    assert_eq!(model_provider.recorded_requests().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_timeout() {
    let mut model_provider = TestModelProvider::default();
    model_provider.set_delay(Duration::from_secs(5));
    model_provider.add_exchange(PresetResponse::with_deltas([
        "Thought: ", "slow ", "thinking\n", "Final Answer: too late",
    ]));

    let config = AgentConfig {
        max_execution_time: Some(Duration::from_secs(8)),
        ..Default::default()
    };
    let agent = AgentBuilder::with_model_provider(model_provider)
        .with_config(config)
        .build();
    let (tx, mut rx) = event_channel();
    let err = agent
        .run("Hi", &Conversation::new(), &tx)
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::Timeout(limit) if limit.as_secs() == 8));

    // The deltas that made it before the deadline were still reported.
    let events = drain(&mut rx);
    assert!(!events.is_empty());
    assert!(
        events
            .iter()
            .all(|event| matches!(event, AgentEvent::MessageDelta(_)))
    );
}

#[tokio::test]
async fn test_replay_is_deterministic() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_exchange(PresetResponse::with_text("unused"));
    model_provider.add_exchange(PresetResponse::with_text(
        "Action: arxiv\nAction Input: 'transformer efficiency'",
    ));
    model_provider.add_exchange(PresetResponse::with_text(
        "Final Answer: Efficient Transformers (2024).",
    ));

    let mut history = Conversation::new();
    history.push_exchange("Hi", "Hi! I'm a search bot.");

    let agent = AgentBuilder::with_model_provider(model_provider.clone())
        .with_registry(registry())
        .build();

    let mut answers = vec![];
    let mut event_logs = vec![];
    for _ in 0..2 {
        let (tx, mut rx) = event_channel();
        answers.push(
            agent
                .run("Latest paper on transformer efficiency?", &history, &tx)
                .await
                .unwrap(),
        );
        event_logs.push(drain(&mut rx));
    }
    assert_eq!(answers[0], "Efficient Transformers (2024).");
    assert_eq!(answers[0], answers[1]);
    assert_eq!(event_logs[0], event_logs[1]);

    let requests = model_provider.recorded_requests();
    assert_eq!(requests.len(), 4);
    assert_eq!(requests[0], requests[2]);
    assert_eq!(requests[1], requests[3]);
}
