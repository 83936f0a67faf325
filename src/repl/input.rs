//! Blocking line sources for the conversation loop.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

use crate::error::ReplError;

/// What one blocking read produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadEvent {
    /// A submitted line, untrimmed.
    Line(String),
    /// Ctrl+C while the operator was typing.
    Interrupted,
    /// Ctrl+D or a closed input stream.
    Eof,
}

pub trait LineReader {
    fn read_line(&mut self, prompt: &str) -> Result<ReadEvent, ReplError>;
}

impl<T: LineReader + ?Sized> LineReader for &mut T {
    fn read_line(&mut self, prompt: &str) -> Result<ReadEvent, ReplError> {
        (**self).read_line(prompt)
    }
}

/// Interactive terminal input with line editing and in-memory history.
pub struct TerminalReader {
    editor: DefaultEditor,
}

impl TerminalReader {
    pub fn new() -> Result<Self, ReplError> {
        let editor = DefaultEditor::new().map_err(|err| ReplError::Editor(err.to_string()))?;
        Ok(Self { editor })
    }
}

impl LineReader for TerminalReader {
    fn read_line(&mut self, prompt: &str) -> Result<ReadEvent, ReplError> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    if let Err(err) = self.editor.add_history_entry(line.as_str()) {
                        debug!(error = %err, "line not added to edit history");
                    }
                }
                Ok(ReadEvent::Line(line))
            }
            Err(ReadlineError::Interrupted) => Ok(ReadEvent::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadEvent::Eof),
            Err(ReadlineError::Io(err)) => Err(ReplError::Io(err)),
            Err(err) => Err(ReplError::Editor(err.to_string())),
        }
    }
}

/// Plain buffered input, for piped stdin and tests. The prompt is written
/// to `echo` before each read.
pub struct BufReadReader<R, W> {
    input: R,
    echo: W,
}

impl<R: BufRead, W: Write> BufReadReader<R, W> {
    pub fn new(input: R, echo: W) -> Self {
        Self { input, echo }
    }

    pub fn into_echo(self) -> W {
        self.echo
    }
}

impl<R: BufRead, W: Write> LineReader for BufReadReader<R, W> {
    fn read_line(&mut self, prompt: &str) -> Result<ReadEvent, ReplError> {
        write!(self.echo, "{prompt}")?;
        self.echo.flush()?;

        let mut line = String::new();
        if BufRead::read_line(&mut self.input, &mut line)? == 0 {
            return Ok(ReadEvent::Eof);
        }
        Ok(ReadEvent::Line(line))
    }
}

const INTERRUPT_POLL: Duration = Duration::from_millis(50);

/// Buffered input read on a background thread, so a pending read can be
/// abandoned when `interrupted` is raised. Used for piped stdin, where no
/// line editor is around to turn Ctrl+C into [`ReadEvent::Interrupted`].
pub struct ChannelReader<W> {
    lines: Receiver<io::Result<String>>,
    echo: W,
    interrupted: Arc<AtomicBool>,
}

impl<W: Write> ChannelReader<W> {
    pub fn spawn<R>(input: R, echo: W, interrupted: Arc<AtomicBool>) -> Self
    where
        R: BufRead + Send + 'static,
    {
        let (tx, lines) = mpsc::channel();
        thread::spawn(move || {
            let mut input = input;
            loop {
                let mut line = String::new();
                let read = match BufRead::read_line(&mut input, &mut line) {
                    Ok(0) => break,
                    Ok(_) => Ok(line),
                    Err(err) => Err(err),
                };
                let failed = read.is_err();
                if tx.send(read).is_err() || failed {
                    break;
                }
            }
        });
        Self {
            lines,
            echo,
            interrupted,
        }
    }
}

impl<W: Write> LineReader for ChannelReader<W> {
    fn read_line(&mut self, prompt: &str) -> Result<ReadEvent, ReplError> {
        write!(self.echo, "{prompt}")?;
        self.echo.flush()?;

        loop {
            if self.interrupted.load(Ordering::SeqCst) {
                return Ok(ReadEvent::Interrupted);
            }
            match self.lines.recv_timeout(INTERRUPT_POLL) {
                Ok(Ok(line)) => return Ok(ReadEvent::Line(line)),
                Ok(Err(err)) => return Err(ReplError::Io(err)),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Ok(ReadEvent::Eof),
            }
        }
    }
}
