//! A terminal chat with the search agent.

#[macro_use]
extern crate tracing;

use std::io::Write as _;
use std::path::PathBuf;
use std::pin::pin;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use search_agent::core::{AgentBuilder, AgentConfig, AgentEvent, event_channel};
use search_agent::credentials::{
    ConfigurationError, Credentials, DEFAULT_KEYS, EnvSecrets, FileSecrets,
    GROQ_API_KEY, HF_TOKEN, LANGCHAIN_API_KEY, Resolver, TerminalPrompter,
    default_secrets_path,
};
use search_agent::input::LineReader;
use search_agent::renderer::TranscriptRenderer;
use search_agent::tools::{LookupOptions, default_registry};
use search_agent::{GREETING, PLACEHOLDER_ANSWER, Session};
use search_agent_openai_model::{
    DEFAULT_BASE_URL, DEFAULT_MODEL, OpenAIConfigBuilder, OpenAIProvider,
};
use tokio::select;
use tokio::time::interval;

/// Chat with an AI search assistant that looks things up on the web,
/// Wikipedia and Arxiv.
#[derive(Debug, Parser)]
#[command(name = "search-agent", version)]
struct Args {
    /// TOML file with GROQ_API_KEY (and optionally HF_TOKEN).
    /// Defaults to `search-agent/secrets.toml` in the config directory.
    #[arg(long, value_name = "PATH")]
    secrets: Option<PathBuf>,

    /// The model to chat with.
    #[arg(long, env = "SEARCH_AGENT_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// The OpenAI-compatible API endpoint.
    #[arg(long, env = "SEARCH_AGENT_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Model replies per question before giving up.
    #[arg(long, default_value_t = 15)]
    max_iterations: usize,

    /// Unparsable model replies tolerated per question.
    #[arg(long, default_value_t = 3)]
    max_parse_retries: usize,

    /// Time limit per question in seconds, 0 for none.
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,

    /// Wait for complete model replies instead of streaming them.
    #[arg(long)]
    no_stream: bool,

    /// Never ask for missing keys on the terminal.
    #[arg(long)]
    no_prompt: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    debug!("starting with {args:?}");

    let input = LineReader::stdin();
    let credentials = match resolve_credentials(&args, &input).await {
        Ok(credentials) => credentials,
        Err(err) => {
            eprintln!("{} {err}", "error:".bright_red().bold());
            return ExitCode::from(2);
        }
    };
    debug!("resolved credentials: {credentials:?}");
    if credentials.contains(HF_TOKEN) {
        debug!("{HF_TOKEN} is set but not used by any tool");
    }
    if credentials.contains(LANGCHAIN_API_KEY) {
        debug!("{LANGCHAIN_API_KEY} is set but no telemetry is sent");
    }
    let Some(api_key) = credentials.get(GROQ_API_KEY) else {
        return ExitCode::from(2);
    };

    let config = OpenAIConfigBuilder::with_api_key(api_key)
        .with_model(args.model.as_str())
        .with_base_url(args.base_url.as_str())
        .build();
    let model_provider = OpenAIProvider::new(config);

    let agent_config = AgentConfig {
        max_iterations: args.max_iterations,
        max_parse_retries: args.max_parse_retries,
        max_execution_time: (args.timeout_secs > 0)
            .then(|| Duration::from_secs(args.timeout_secs)),
        stream: !args.no_stream,
        ..Default::default()
    };
    let agent = AgentBuilder::with_model_provider(model_provider)
        .with_registry(default_registry(LookupOptions::default()))
        .with_config(agent_config)
        .build();
    let mut session = Session::new(agent);

    chat(&mut session, &input).await;
    ExitCode::SUCCESS
}

async fn resolve_credentials(
    args: &Args,
    input: &LineReader,
) -> Result<Credentials, ConfigurationError> {
    let file = match &args.secrets {
        Some(path) => FileSecrets::load(path)?,
        None => match default_secrets_path() {
            Some(path) => FileSecrets::load_if_exists(&path)?,
            None => FileSecrets::default(),
        },
    };
    let mut resolver = Resolver::new().with_store(file).with_store(EnvSecrets);
    if !args.no_prompt {
        let prompter = TerminalPrompter::new(input.clone());
        resolver = resolver.with_prompter(prompter);
    }
    resolver.resolve(&DEFAULT_KEYS).await
}

async fn chat(session: &mut Session, input: &LineReader) {
    let mut renderer = TranscriptRenderer::new(std::io::stdout());
    if let Err(err) = renderer.render_greeting(GREETING) {
        error!("failed to write output: {err}");
        return;
    }

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    loop {
        print!("> ");
        if std::io::stdout().flush().is_err() {
            break;
        }

        let Some(line) = input.read_line().await else {
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }

        let progress_bar = ProgressBar::new_spinner();
        progress_bar.set_style(progress_style.clone());
        progress_bar.set_message("🤔 Thinking...");

        let mut show = |event: AgentEvent| {
            if matches!(event, AgentEvent::MessageDelta(_)) {
                let _ = renderer.render(&event);
                progress_bar.set_message(format!(
                    "🤔 Thinking... ({} chars)",
                    renderer.streamed_chars()
                ));
                return;
            }
            let written = progress_bar.suspend(|| renderer.render(&event));
            if let Err(err) = written {
                error!("failed to write output: {err}");
            }
            progress_bar.set_message("🤔 Thinking...");
        };

        let (event_tx, mut event_rx) = event_channel();
        let result = {
            let mut run = pin!(session.send_message(message, &event_tx));
            let mut ticker = interval(Duration::from_millis(100));
            loop {
                select! {
                    result = &mut run => break result,
                    Some(event) = event_rx.recv() => show(event),
                    _ = ticker.tick() => progress_bar.tick(),
                }
            }
        };
        while let Ok(event) = event_rx.try_recv() {
            show(event);
        }
        progress_bar.finish_and_clear();

        if let Err(err) = result {
            if let Err(err) = renderer.render_failure(PLACEHOLDER_ANSWER, &err) {
                error!("failed to write output: {err}");
            }
        }
        println!();
    }
}
