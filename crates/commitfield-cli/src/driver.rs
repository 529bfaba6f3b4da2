//! Line-based terminal driver.
//!
//! Implements [`Driver`] over a line reader and a writer. Commands come in one
//! per line; the transcript goes out as plain text. A render only prints what
//! changed: new transcript lines are appended when the previous transcript is
//! a prefix of the new one, otherwise the whole screen is printed again.

use std::{
    io::{self, Stdout, Write},
    time::Duration,
};

use chrono::FixedOffset;
use commitfield_app::{App, AppEvent, Driver, Panel, Scroll};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::{
    command::{self, Command, HELP, InputContext},
    render::{self, Screen},
};

/// How long `poll_event` waits for a line.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Driver reading commands from `R` and writing the transcript to `W`.
pub struct StdioDriver<R, W> {
    lines: Lines<R>,
    out: W,
    offset: FixedOffset,
    context: InputContext,
    shown: Vec<String>,
    connection: Option<&'static str>,
    status: Option<String>,
    eof: bool,
}

impl StdioDriver<BufReader<Stdin>, Stdout> {
    /// Driver on the process stdin and stdout.
    pub fn stdio(offset: FixedOffset) -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), io::stdout(), offset)
    }
}

impl<R, W> StdioDriver<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: Write + Send,
{
    /// Driver over `input` and `out`, showing times in `offset`.
    pub fn new(input: R, out: W, offset: FixedOffset) -> Self {
        Self {
            lines: input.lines(),
            out,
            offset,
            context: InputContext::default(),
            shown: Vec::new(),
            connection: None,
            status: None,
            eof: false,
        }
    }

    /// Writer, for inspecting captured output.
    pub fn out(&self) -> &W {
        &self.out
    }

    fn line_event(&mut self, line: &str) -> io::Result<Option<AppEvent>> {
        match command::parse(line) {
            Some(Command::Help) => {
                writeln!(self.out, "{HELP}")?;
                self.out.flush()?;
                Ok(None)
            },
            Some(command) => Ok(command.into_event(self.context)),
            None => Ok(None),
        }
    }

    fn print(&mut self, screen: Screen) -> io::Result<()> {
        if screen.lines.starts_with(&self.shown) {
            for line in &screen.lines[self.shown.len()..] {
                writeln!(self.out, "{line}")?;
            }
        } else {
            writeln!(self.out)?;
            for line in &screen.lines {
                writeln!(self.out, "{line}")?;
            }
        }
        self.shown = screen.lines;

        if self.connection != Some(screen.connection) {
            writeln!(self.out, "* {}", screen.connection)?;
            self.connection = Some(screen.connection);
        }
        if let Some(status) = &screen.status
            && screen.status != self.status
        {
            writeln!(self.out, "* {status}")?;
        }
        self.status = screen.status;
        self.out.flush()
    }
}

impl<R, W> Driver for StdioDriver<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: Write + Send,
{
    type Error = io::Error;

    async fn poll_event(&mut self) -> Result<Option<AppEvent>, Self::Error> {
        if self.eof {
            return Ok(Some(AppEvent::Quit));
        }

        tokio::select! {
            line = self.lines.next_line() => match line? {
                Some(line) => self.line_event(&line),
                None => {
                    tracing::debug!("input closed");
                    self.eof = true;
                    Ok(Some(AppEvent::Quit))
                },
            },
            () = tokio::time::sleep(POLL_INTERVAL) => Ok(None),
        }
    }

    fn render(&mut self, app: &App) -> Result<(), Self::Error> {
        self.context = InputContext {
            room_open: app.room().is_some() && app.panel() == Panel::Chat,
            prompt_open: app.rooms().prompt().is_some(),
        };
        self.print(render::screen(app, self.offset))
    }

    fn alert(&mut self, message: &str) -> Result<(), Self::Error> {
        writeln!(self.out, "! {message}")?;
        self.out.flush()
    }

    fn confirm(&mut self, prompt: &str) -> Result<(), Self::Error> {
        writeln!(self.out, "? {prompt} (/yes, /no)")?;
        self.out.flush()
    }

    fn scroll(&mut self, scroll: Scroll) -> Result<(), Self::Error> {
        match scroll {
            Scroll::ToBottom => Ok(()),
            Scroll::RestoreAnchor { added } => {
                tracing::debug!(added, "older messages prepended");
                Ok(())
            },
        }
    }

    fn stop(&mut self) {
        let _ = self.out.flush();
    }
}
