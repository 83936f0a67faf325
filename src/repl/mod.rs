//! The interactive conversation loop.
//!
//! Reads one line, hands it to a [`Responder`], prints the reply, repeats.
//! Turns are strictly sequential: the next prompt is only shown once the
//! previous reply (or failure) has been printed.

mod input;

use std::future::Future;
use std::io::Write;
use std::pin::pin;

use futures_util::FutureExt;
use tracing::{debug, info, warn};

use crate::error::ReplError;
use crate::responder::Responder;

pub use input::{BufReadReader, ChannelReader, LineReader, ReadEvent, TerminalReader};

pub const PROMPT: &str = "You: ";
pub const EXIT_TOKENS: [&str; 3] = ["exit", "quit", "bye"];

const FAREWELL: &str = "\nAgent: Goodbye! Thanks for chatting!\n";
const INTERRUPTED: &str = "\n\nInterrupted by user...\n";

/// How one raw input line is handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Exit,
    /// Blank input; re-prompt without a turn.
    Skip,
    /// Trimmed text to send to the responder.
    Message(String),
}

impl Command {
    pub fn parse(raw: &str) -> Self {
        let text = raw.trim();
        if text.is_empty() {
            return Self::Skip;
        }

        let lowered = text.to_lowercase();
        if EXIT_TOKENS.contains(&lowered.as_str()) {
            Self::Exit
        } else {
            Self::Message(text.to_string())
        }
    }
}

/// Why the loop stopped. Every variant is a normal termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    ExitCommand,
    Interrupted,
    EndOfInput,
    InputFailed,
}

pub struct ConversationLoop<R, W> {
    reader: R,
    out: W,
}

impl<R: LineReader, W: Write> ConversationLoop<R, W> {
    pub fn new(reader: R, out: W) -> Self {
        Self { reader, out }
    }

    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.out)
    }

    /// Runs until an exit token, end of input, an input failure, or
    /// `interrupt` resolving. A responder failure ends only the current turn.
    ///
    /// Only writing to the console can make this return `Err`.
    pub async fn run<P, I>(
        &mut self,
        responder: &mut P,
        interrupt: I,
    ) -> Result<LoopExit, ReplError>
    where
        P: Responder + ?Sized,
        I: Future<Output = ()>,
    {
        let mut interrupt = pin!(interrupt);

        loop {
            let read = self.reader.read_line(PROMPT);
            // An interrupt raised while blocked on input wins over whatever was read.
            if interrupt.as_mut().now_or_never().is_some() {
                return self.stop(LoopExit::Interrupted);
            }

            let raw = match read {
                Ok(ReadEvent::Line(raw)) => raw,
                Ok(ReadEvent::Interrupted) => return self.stop(LoopExit::Interrupted),
                Ok(ReadEvent::Eof) => return self.stop(LoopExit::EndOfInput),
                Err(err) => {
                    warn!(error = %err, "reading operator input failed");
                    write!(self.out, "\nError reading input: {err}\n")?;
                    return self.stop(LoopExit::InputFailed);
                }
            };

            let text = match Command::parse(&raw) {
                Command::Exit => return self.stop(LoopExit::ExitCommand),
                Command::Skip => continue,
                Command::Message(text) => text,
            };

            debug!(chars = text.chars().count(), "dispatching turn");
            let reply = tokio::select! {
                biased;
                _ = &mut interrupt => return self.stop(LoopExit::Interrupted),
                reply = responder.respond(&text) => reply,
            };

            match reply {
                Ok(reply) => write!(self.out, "\nAgent: {reply}\n\n")?,
                Err(err) => {
                    warn!(error = %err, "turn failed");
                    write!(self.out, "\nError processing request: {err}\n\n")?;
                }
            }
            self.out.flush()?;
        }
    }

    fn stop(&mut self, exit: LoopExit) -> Result<LoopExit, ReplError> {
        let notice = match exit {
            LoopExit::Interrupted => INTERRUPTED,
            LoopExit::ExitCommand | LoopExit::EndOfInput => FAREWELL,
            // already reported by the caller
            LoopExit::InputFailed => "",
        };
        self.out.write_all(notice.as_bytes())?;
        self.out.flush()?;
        info!(?exit, "conversation loop finished");
        Ok(exit)
    }
}
