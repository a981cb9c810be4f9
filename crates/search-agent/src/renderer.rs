//! Writes the transcript of agent runs to a terminal.

use std::fmt::Display;
use std::io::{self, Write};

use owo_colors::{OwoColorize, Style};
use search_agent_core::AgentEvent;

const BAR_CHAR: &str = "▎";

/// Renders agent events as they arrive, one block of lines per event.
///
/// Message deltas are not printed; the model reply is shown through the
/// thought, tool call and answer events parsed from it. The renderer only
/// counts the streamed characters so a progress indicator can show them.
pub struct TranscriptRenderer<W> {
    out: W,
    styled: bool,
    streamed_chars: usize,
}

impl<W: Write> TranscriptRenderer<W> {
    /// Creates a renderer that writes colored output.
    #[inline]
    pub fn new(out: W) -> Self {
        Self {
            out,
            styled: true,
            streamed_chars: 0,
        }
    }

    /// Creates a renderer that writes plain text.
    #[inline]
    pub fn plain(out: W) -> Self {
        Self {
            out,
            styled: false,
            streamed_chars: 0,
        }
    }

    /// Returns the characters streamed since the last printed event.
    #[inline]
    pub fn streamed_chars(&self) -> usize {
        self.streamed_chars
    }

    /// Consumes the renderer and returns the writer.
    #[inline]
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Renders one event.
    pub fn render(&mut self, event: &AgentEvent) -> io::Result<()> {
        if let AgentEvent::MessageDelta(delta) = event {
            self.streamed_chars += delta.chars().count();
            return Ok(());
        }
        self.streamed_chars = 0;

        match event {
            AgentEvent::MessageDelta(_) => Ok(()),
            AgentEvent::Thought(thought) => self.write_block(
                Style::new().bright_black(),
                "💭",
                thought,
                Style::new().dimmed(),
            ),
            AgentEvent::ToolCall { tool, input } => self.write_block(
                Style::new().bright_yellow(),
                "🔧",
                &format!("{tool}: {input}"),
                Style::new().yellow(),
            ),
            AgentEvent::ToolResult { output, failed, .. } => {
                if *failed {
                    self.write_block(
                        Style::new().bright_red(),
                        "⚠️",
                        output,
                        Style::new().red(),
                    )
                } else {
                    self.write_block(
                        Style::new().bright_yellow(),
                        "📄",
                        output,
                        Style::new().dimmed(),
                    )
                }
            }
            AgentEvent::ParseError { reason } => self.write_block(
                Style::new().bright_red(),
                "⚠️",
                &format!("Couldn't understand the model: {reason}"),
                Style::new().yellow(),
            ),
            AgentEvent::FinalAnswer(answer) => self.write_block(
                Style::new().bright_cyan(),
                "🤖",
                answer,
                Style::new().bright_white(),
            ),
        }
    }

    /// Renders the assistant's greeting.
    pub fn render_greeting(&mut self, greeting: &str) -> io::Result<()> {
        self.write_block(
            Style::new().bright_cyan(),
            "🤖",
            greeting,
            Style::new().bright_white(),
        )
    }

    /// Renders the reply shown when a run fails, with the cause.
    pub fn render_failure(
        &mut self,
        placeholder: &str,
        cause: &dyn Display,
    ) -> io::Result<()> {
        self.streamed_chars = 0;
        self.write_block(
            Style::new().bright_red(),
            "🤖",
            &format!("{placeholder} ({cause})"),
            Style::new().red(),
        )
    }

    fn write_block(
        &mut self,
        bar: Style,
        marker: &str,
        text: &str,
        style: Style,
    ) -> io::Result<()> {
        let mut lines: Vec<&str> = text.lines().collect();
        if lines.is_empty() {
            lines.push("");
        }
        for (idx, line) in lines.into_iter().enumerate() {
            let marker = if idx == 0 { marker } else { "  " };
            if self.styled {
                writeln!(
                    self.out,
                    "{}{marker} {}",
                    BAR_CHAR.style(bar),
                    line.style(style)
                )?;
            } else {
                writeln!(self.out, "{BAR_CHAR}{marker} {line}")?;
            }
        }
        self.out.flush()
    }
}
