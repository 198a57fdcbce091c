//! Consumer-facing handle: the engine thread, the lookahead stack, and
//! cancellation.

use std::io::Read;

use crossbeam::channel::{bounded, Receiver, Sender};
use munch_dfa::{AutomatonFamily, RuleId};
use tracing::trace;

use crate::engine::{Engine, Envelope, NestedEvents};
use crate::error::ScanError;
use crate::event::ScanEvent;

/// One recorded event at a lookahead level. A `rule` of `None` means end of
/// stream.
struct Frame {
    rule: Option<RuleId>,
    text: String,
    line: u32,
    column: u32,
}

/// Configures and spawns a [`Scanner`].
#[must_use]
pub struct ScannerBuilder {
    family: AutomatonFamily,
    line: u32,
    column: u32,
    nested_events: NestedEvents,
}

impl ScannerBuilder {
    /// Zero-based line of the first input symbol. Defaults to 0.
    pub fn start_line(mut self, line: u32) -> Self {
        self.line = line;
        self
    }

    /// Zero-based column of the first input symbol. Defaults to 0.
    pub fn start_column(mut self, column: u32) -> Self {
        self.column = column;
        self
    }

    /// Whether nested re-scans surface their events on the main channel.
    /// Defaults to [`NestedEvents::Discard`].
    pub fn nested_events(mut self, mode: NestedEvents) -> Self {
        self.nested_events = mode;
        self
    }

    /// Start the engine thread over `reader` and return the handle.
    pub fn spawn<R: Read + Send + 'static>(self, reader: R) -> Scanner {
        // Rendezvous channel: the engine computes at most one event ahead of
        // the consumer and parks until it is taken.
        let (event_tx, event_rx) = bounded(0);
        let (stop_tx, stop_rx) = bounded(1);
        let engine = Engine::new(self.family, event_tx, stop_rx, self.nested_events);
        let (line, column) = (self.line, self.column);
        // Detached on purpose: the engine exits when the scan ends, when
        // stop is raised, or when this handle (and its channel ends) drops.
        drop(std::thread::spawn(move || engine.run(reader, line, column)));
        Scanner {
            events: event_rx,
            stop: stop_tx,
            stack: Vec::new(),
            start_line: line,
            start_column: column,
            done: false,
        }
    }
}

/// Pull-based token cursor over a running scan.
///
/// Events are consumed through a stack of lookahead levels. Level 0 is the
/// committed position; [`advance`] at the current deepest level pulls a fresh
/// event from the engine, while shallower levels replay what was already
/// recorded there. [`pop`] discards the deepest level, so the next `advance`
/// one level up re-reads its recorded event before pulling fresh input again.
///
/// Dropping the scanner mid-scan releases the engine: its next send fails
/// and the thread exits.
///
/// [`advance`]: Scanner::advance
/// [`pop`]: Scanner::pop
pub struct Scanner {
    events: Receiver<Envelope>,
    stop: Sender<()>,
    stack: Vec<Frame>,
    start_line: u32,
    start_column: u32,
    done: bool,
}

impl Scanner {
    /// Spawn a scanner with default settings over `reader`.
    pub fn spawn<R: Read + Send + 'static>(family: AutomatonFamily, reader: R) -> Self {
        Self::builder(family).spawn(reader)
    }

    /// Start configuring a scanner for `family`.
    pub fn builder(family: AutomatonFamily) -> ScannerBuilder {
        ScannerBuilder {
            family,
            line: 0,
            column: 0,
            nested_events: NestedEvents::default(),
        }
    }

    /// Advance the cursor at `level`.
    ///
    /// Opens the level if it is one past the deepest. At the deepest level
    /// this pulls the next event from the engine; at a shallower level it
    /// returns the event already recorded there. Returns the matched rule, or
    /// `None` at end of stream (and on every call after it).
    ///
    /// # Panics
    ///
    /// Panics when `level` skips past the deepest open level; levels open
    /// contiguously.
    pub fn advance(&mut self, level: usize) -> Result<Option<RuleId>, ScanError> {
        assert!(
            level <= self.stack.len(),
            "lookahead level {level} skips past deepest open level {}",
            self.stack.len()
        );
        if level == self.stack.len() {
            // Open a fresh level at the position the previous one reached.
            let (line, column) = self
                .stack
                .last()
                .map_or((self.start_line, self.start_column), |f| (f.line, f.column));
            self.stack.push(Frame {
                rule: None,
                text: String::new(),
                line,
                column,
            });
        }
        if level + 1 == self.stack.len() && !self.done {
            let frame = match self.events.recv() {
                Ok(Ok(ScanEvent::Token(event))) => {
                    trace!(rule = event.rule.index(), level, "pulled token");
                    Frame {
                        rule: Some(event.rule),
                        text: event.text,
                        line: event.line,
                        column: event.column,
                    }
                }
                Ok(Ok(ScanEvent::End { line, column })) => {
                    trace!(line, column, "pulled end of stream");
                    self.done = true;
                    Frame {
                        rule: None,
                        text: String::new(),
                        line,
                        column,
                    }
                }
                Ok(Err(err)) => {
                    self.done = true;
                    return Err(err);
                }
                Err(_) => {
                    self.done = true;
                    return Err(ScanError::Disconnected);
                }
            };
            self.stack[level] = frame;
        } else if level + 1 == self.stack.len() {
            // Past end of stream: the deepest level stays pinned there.
            let (line, column) = (self.stack[level].line, self.stack[level].column);
            self.stack[level] = Frame {
                rule: None,
                text: String::new(),
                line,
                column,
            };
        }
        Ok(self.stack[level].rule)
    }

    /// Discard the deepest lookahead level.
    ///
    /// The next [`advance`](Scanner::advance) at the level above re-reads the
    /// event recorded there, so speculative lookahead rewinds cleanly.
    ///
    /// # Panics
    ///
    /// Panics when no level is open.
    pub fn pop(&mut self) {
        let popped = self.stack.pop();
        assert!(popped.is_some(), "pop with no open lookahead level");
    }

    /// Matched text at the deepest level; empty before the first advance and
    /// at end of stream.
    pub fn text(&self) -> &str {
        self.stack.last().map_or("", |f| f.text.as_str())
    }

    /// Zero-based line of the event at the deepest level.
    pub fn line(&self) -> u32 {
        self.stack.last().map_or(self.start_line, |f| f.line)
    }

    /// Zero-based column of the event at the deepest level.
    pub fn column(&self) -> u32 {
        self.stack.last().map_or(self.start_column, |f| f.column)
    }

    /// Request cancellation. Non-blocking and idempotent.
    ///
    /// At most one event already committed to the channel may still arrive;
    /// after that the engine exits without an end-of-stream marker, so a
    /// later [`advance`](Scanner::advance) reports
    /// [`ScanError::Disconnected`].
    pub fn stop(&self) {
        let _ = self.stop.try_send(());
    }
}
