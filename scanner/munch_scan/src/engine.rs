//! Parallel DFA simulation over a streaming character source.
//!
//! One simulation *branch* per rule advances in lockstep over a shared
//! buffer of not-yet-claimed symbols. A branch with no transition dies; when
//! every branch is dead the engine resolves the attempt: emit the best match
//! (maximal munch, lowest rule index on ties), or skip one symbol if nothing
//! matched, then restart at the new position. Start-jump chains are folded in
//! once at scan start, end-jump chains once input is exhausted, both guarded
//! against cycles.
//!
//! The engine owns all simulation state. It talks to the consumer only
//! through the event channel and observes the stop signal at every send
//! attempt, so cancellation cannot deadlock on a full channel.

use std::collections::VecDeque;
use std::io::Read;

use crossbeam::channel::{Receiver, Sender};
use crossbeam::select;
use munch_dfa::{AutomatonFamily, RuleId, StateId};
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::error::ScanError;
use crate::event::{MatchEvent, ScanEvent};
use crate::source::CharSource;

/// What to do with events produced while re-scanning a matched lexeme with
/// its rule's nested family.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NestedEvents {
    /// Run the nested scan but drop its events.
    #[default]
    Discard,
    /// Forward nested events inline on the main channel, after the enclosing
    /// token, in source order.
    Surface,
}

/// Message on the event channel: an event, or the terminal failure.
pub(crate) type Envelope = Result<ScanEvent, ScanError>;

/// How one `scan` invocation ended.
enum Outcome {
    /// Input exhausted; final position after the last consumed symbol.
    Finished { line: u32, column: u32 },
    /// Stop observed, consumer gone, or a fatal error already delivered.
    Aborted,
}

/// A character feed for one `scan` invocation: the streaming source for the
/// top-level scan, an in-memory lexeme for nested re-scans.
trait Symbols {
    fn next_symbol(&mut self) -> Result<Option<char>, ScanError>;
}

impl<R: Read> Symbols for CharSource<R> {
    fn next_symbol(&mut self) -> Result<Option<char>, ScanError> {
        self.next_char()
    }
}

struct TextSymbols<'a>(std::str::Chars<'a>);

impl Symbols for TextSymbols<'_> {
    fn next_symbol(&mut self) -> Result<Option<char>, ScanError> {
        Ok(self.0.next())
    }
}

/// Update position accounting for one consumed symbol.
fn advance_symbol(line: &mut u32, column: &mut u32, symbol: char) {
    if symbol == '\n' {
        *line += 1;
        *column = 0;
    } else {
        *column += 1;
    }
}

/// Update position accounting for a whole consumed lexeme.
///
/// Newlines are counted with `memchr`; the column restarts after the last
/// newline. Counts are in symbols, not bytes.
#[allow(
    clippy::cast_possible_truncation,
    reason = "line and symbol counts are bounded by the u32 source length"
)]
fn advance_text(line: &mut u32, column: &mut u32, text: &str) {
    let bytes = text.as_bytes();
    let newlines = memchr::memchr_iter(b'\n', bytes).count();
    if newlines == 0 {
        *column += text.chars().count() as u32;
    } else {
        *line += newlines as u32;
        if let Some(last) = memchr::memrchr(b'\n', bytes) {
            *column = text[last + 1..].chars().count() as u32;
        }
    }
}

/// The best match recorded during one attempt.
#[derive(Clone, Copy)]
struct Best {
    rule: RuleId,
    /// Number of symbols the match covers.
    len: usize,
}

/// One live branch of the parallel simulation.
#[derive(Clone, Copy)]
struct Branch {
    rule: RuleId,
    state: StateId,
}

/// Live state of one matching attempt: the branch set and the best match.
///
/// Owned exclusively by the engine; reset between tokens via [`restart`].
///
/// [`restart`]: Simulation::restart
struct Simulation<'f> {
    family: &'f AutomatonFamily,
    branches: SmallVec<[Branch; 8]>,
    best: Option<Best>,
}

impl<'f> Simulation<'f> {
    fn new(family: &'f AutomatonFamily) -> Self {
        Self {
            family,
            branches: SmallVec::new(),
            best: None,
        }
    }

    /// Record `(rule, state)` as the best match when it is accepting and
    /// either covers more input than the current best or ties it with a
    /// lower rule index.
    fn check_accept(&mut self, rule: RuleId, state: StateId, consumed: usize) {
        let family = self.family;
        if !family.rule(rule).is_accepting(state) {
            return;
        }
        // Within one attempt `consumed` only grows, so the recorded best
        // never covers more input than the current position.
        let improves = match self.best {
            None => true,
            Some(best) => best.len < consumed || best.rule > rule,
        };
        if improves {
            self.best = Some(Best {
                rule,
                len: consumed,
            });
        }
    }

    /// Seed the branch set for the start of the scan: one branch per rule at
    /// state 0, plus every state reachable over start-jump chains. Cycle
    /// guarded; acceptance checked after each jump (a start anchor can match
    /// zero symbols).
    fn prime_start_anchors(&mut self) {
        let family = self.family;
        for (rule_id, rule) in family.iter() {
            let mut visited = vec![false; rule.state_count()];
            let mut state: StateId = 0;
            loop {
                self.branches.push(Branch {
                    rule: rule_id,
                    state,
                });
                visited[state as usize] = true;
                match rule.start_jump(state) {
                    Some(next) if !visited[next as usize] => {
                        state = next;
                        self.check_accept(rule_id, state, 0);
                    }
                    _ => break,
                }
            }
        }
    }

    /// Reset for the next token: one branch per rule at state 0. Start
    /// anchors are not re-folded — they bind to the start of the scan.
    fn restart(&mut self) {
        let family = self.family;
        self.branches.clear();
        self.branches
            .extend(family.iter().map(|(rule, _)| Branch { rule, state: 0 }));
        self.best = None;
    }

    /// Advance every live branch over one symbol; branches with no
    /// transition die.
    fn step(&mut self, symbol: char, consumed: usize) {
        let family = self.family;
        let branches = std::mem::take(&mut self.branches);
        for branch in branches {
            let Some(next) = family.rule(branch.rule).step(branch.state, symbol) else {
                continue;
            };
            self.branches.push(Branch {
                rule: branch.rule,
                state: next,
            });
            self.check_accept(branch.rule, next, consumed);
        }
    }

    /// Input is exhausted: fold every live branch's end-jump chain, checking
    /// acceptance at each step, then retire all branches.
    ///
    /// Every branch gets its full chain — end-anchored acceptance must obey
    /// the same priority rule as ordinary acceptance, so no early exit.
    fn end_pass(&mut self, consumed: usize) {
        let family = self.family;
        let branches = std::mem::take(&mut self.branches);
        for branch in branches {
            let rule = family.rule(branch.rule);
            let mut visited = vec![false; rule.state_count()];
            let mut state = branch.state;
            loop {
                visited[state as usize] = true;
                match rule.end_jump(state) {
                    Some(next) if !visited[next as usize] => {
                        state = next;
                        self.check_accept(branch.rule, state, consumed);
                    }
                    _ => break,
                }
            }
        }
    }

    fn is_stuck(&self) -> bool {
        self.branches.is_empty()
    }

    fn take_best(&mut self) -> Option<Best> {
        self.best.take()
    }
}

/// The scan engine: owns the family and the channel endpoints, runs the
/// simulation loop on its own thread.
pub(crate) struct Engine {
    family: AutomatonFamily,
    events: Sender<Envelope>,
    stop: Receiver<()>,
    nested_events: NestedEvents,
}

impl Engine {
    pub(crate) fn new(
        family: AutomatonFamily,
        events: Sender<Envelope>,
        stop: Receiver<()>,
        nested_events: NestedEvents,
    ) -> Self {
        Self {
            family,
            events,
            stop,
            nested_events,
        }
    }

    /// Scan `reader` to exhaustion, cancellation, or failure.
    ///
    /// Sends match events in source order followed by exactly one
    /// end-of-stream marker; on failure the error is the terminal message
    /// instead. Never sends anything after a stop is observed.
    pub(crate) fn run<R: Read>(&self, reader: R, line: u32, column: u32) {
        debug!(rules = self.family.len(), line, column, "scan started");
        let mut source = CharSource::new(reader);
        match self.scan(&self.family, &mut source, line, column, true) {
            Outcome::Finished { line, column } => {
                if self.deliver(Ok(ScanEvent::End { line, column })) {
                    debug!(line, column, "scan finished");
                }
            }
            Outcome::Aborted => debug!("scan aborted"),
        }
    }

    /// One full pass of `family` over `source`. Recurses (synchronously) for
    /// nested families; only the outermost invocation reports `Finished` to
    /// `run`, which then sends the end-of-stream marker.
    fn scan(
        &self,
        family: &AutomatonFamily,
        source: &mut dyn Symbols,
        mut line: u32,
        mut column: u32,
        emit: bool,
    ) -> Outcome {
        let mut sim = Simulation::new(family);
        sim.prime_start_anchors();

        // Symbols pulled from the source but not yet claimed by a token.
        let mut buf: VecDeque<char> = VecDeque::new();
        // Symbols of `buf` consumed by the current attempt.
        let mut consumed = 0usize;
        let mut at_eof = false;

        loop {
            // Feed one symbol to every branch in lockstep; pull from the
            // source only once the buffer is fully consumed. After EOF the
            // end-jump pass retires the remaining branches.
            if consumed < buf.len() {
                let symbol = buf[consumed];
                consumed += 1;
                sim.step(symbol, consumed);
            } else if !at_eof {
                match source.next_symbol() {
                    Ok(Some(symbol)) => {
                        buf.push_back(symbol);
                        consumed += 1;
                        sim.step(symbol, consumed);
                    }
                    Ok(None) => {
                        at_eof = true;
                        continue;
                    }
                    Err(err) => {
                        self.deliver(Err(err));
                        return Outcome::Aborted;
                    }
                }
            } else {
                sim.end_pass(consumed);
            }

            if !sim.is_stuck() {
                continue;
            }

            // All branches dead: resolve to a match, a skip, or termination.
            match sim.take_best() {
                None => {
                    let Some(skipped) = buf.pop_front() else {
                        // Truly out of input.
                        return Outcome::Finished { line, column };
                    };
                    trace!(symbol = %skipped.escape_debug(), line, column, "skipped unmatched symbol");
                    advance_symbol(&mut line, &mut column, skipped);
                }
                Some(best) => {
                    let text: String = buf.drain(..best.len).collect();
                    trace!(
                        rule = best.rule.index(),
                        len = best.len,
                        line,
                        column,
                        "match"
                    );
                    if emit {
                        let event = ScanEvent::Token(MatchEvent {
                            rule: best.rule,
                            text: text.clone(),
                            line,
                            column,
                        });
                        if !self.deliver(Ok(event)) {
                            return Outcome::Aborted;
                        }
                    }
                    if let Some(nested) = family.rule(best.rule).nested() {
                        // Synchronous re-scan of the matched text, starting
                        // at the token's own position.
                        let surface = emit && self.nested_events == NestedEvents::Surface;
                        let mut lexeme = TextSymbols(text.chars());
                        if let Outcome::Aborted =
                            self.scan(nested, &mut lexeme, line, column, surface)
                        {
                            return Outcome::Aborted;
                        }
                    }
                    advance_text(&mut line, &mut column, &text);
                    if at_eof && buf.is_empty() {
                        return Outcome::Finished { line, column };
                    }
                }
            }
            consumed = 0;
            sim.restart();
        }
    }

    /// Hand one message to the consumer, or observe the stop signal.
    ///
    /// The stop check comes first and never blocks, so cancellation is seen
    /// even when the consumer is not pulling. Returns `false` when the scan
    /// must end: stop raised, or the consumer dropped its channel end.
    fn deliver(&self, message: Envelope) -> bool {
        if self.stop.try_recv().is_ok() {
            debug!("stop observed before send");
            return false;
        }
        select! {
            send(self.events, message) -> res => res.is_ok(),
            recv(self.stop) -> _ => {
                debug!("stop observed at send");
                false
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crossbeam::channel::{bounded, unbounded};
    use munch_dfa::{patterns, Automaton};
    use pretty_assertions::assert_eq;

    /// Run the engine synchronously over `input` with an unbounded channel
    /// and return every event it produced.
    fn run_collect(family: AutomatonFamily, input: &str) -> Vec<ScanEvent> {
        let (tx, rx) = unbounded();
        let (_stop_tx, stop_rx) = bounded(1);
        let engine = Engine::new(family, tx, stop_rx, NestedEvents::Discard);
        engine.run(input.as_bytes(), 0, 0);
        drop(engine);
        rx.try_iter().map(Result::unwrap).collect()
    }

    fn token(rule: u32, text: &str, line: u32, column: u32) -> ScanEvent {
        ScanEvent::Token(MatchEvent {
            rule: RuleId::new(rule),
            text: text.to_owned(),
            line,
            column,
        })
    }

    fn ident() -> Automaton {
        patterns::word(
            |c| c.is_ascii_alphabetic() || c == '_',
            |c| c.is_ascii_alphanumeric() || c == '_',
        )
    }

    // === Position accounting ===

    #[test]
    fn advance_symbol_tracks_newlines() {
        let (mut line, mut column) = (0, 3);
        advance_symbol(&mut line, &mut column, 'x');
        assert_eq!((line, column), (0, 4));
        advance_symbol(&mut line, &mut column, '\n');
        assert_eq!((line, column), (1, 0));
    }

    #[test]
    fn advance_text_without_newline_adds_symbol_count() {
        let (mut line, mut column) = (2, 5);
        advance_text(&mut line, &mut column, "héllo");
        assert_eq!((line, column), (2, 10));
    }

    #[test]
    fn advance_text_restarts_column_after_last_newline() {
        let (mut line, mut column) = (0, 7);
        advance_text(&mut line, &mut column, "a\nbb\nccc");
        assert_eq!((line, column), (2, 3));
    }

    #[test]
    fn advance_text_trailing_newline_resets_column() {
        let (mut line, mut column) = (0, 7);
        advance_text(&mut line, &mut column, "ab\n");
        assert_eq!((line, column), (1, 0));
    }

    // === Matching ===

    #[test]
    fn maximal_munch_prefers_longest() {
        let family =
            AutomatonFamily::new(vec![patterns::literal("if"), ident()]).unwrap();
        let events = run_collect(family, "ifx");
        assert_eq!(
            events,
            vec![token(1, "ifx", 0, 0), ScanEvent::End { line: 0, column: 3 }]
        );
    }

    #[test]
    fn tie_break_prefers_lower_rule_index() {
        let family =
            AutomatonFamily::new(vec![patterns::literal("if"), ident()]).unwrap();
        let events = run_collect(family, "if");
        assert_eq!(
            events,
            vec![token(0, "if", 0, 0), ScanEvent::End { line: 0, column: 2 }]
        );
    }

    #[test]
    fn declaration_order_decides_ties_regardless_of_shape() {
        // Same two rules, reversed: the identifier now wins the tie.
        let family =
            AutomatonFamily::new(vec![ident(), patterns::literal("if")]).unwrap();
        let events = run_collect(family, "if");
        assert_eq!(
            events,
            vec![token(0, "if", 0, 0), ScanEvent::End { line: 0, column: 2 }]
        );
    }

    #[test]
    fn unmatched_symbols_are_skipped_without_events() {
        let family = AutomatonFamily::new(vec![ident()]).unwrap();
        let events = run_collect(family, "?!ab?cd!");
        assert_eq!(
            events,
            vec![
                token(0, "ab", 0, 2),
                token(0, "cd", 0, 5),
                ScanEvent::End { line: 0, column: 8 },
            ]
        );
    }

    #[test]
    fn all_unmatched_input_terminates() {
        let family = AutomatonFamily::new(vec![patterns::literal("zz")]).unwrap();
        let events = run_collect(family, "????");
        assert_eq!(events, vec![ScanEvent::End { line: 0, column: 4 }]);
    }

    #[test]
    fn empty_input_yields_only_end_marker() {
        let family = AutomatonFamily::new(vec![ident()]).unwrap();
        let events = run_collect(family, "");
        assert_eq!(events, vec![ScanEvent::End { line: 0, column: 0 }]);
    }

    #[test]
    fn match_event_positions_follow_newlines() {
        let family = AutomatonFamily::new(vec![ident(), patterns::class(|c| c == '\n')])
            .unwrap();
        let events = run_collect(family, "ab\ncd");
        assert_eq!(
            events,
            vec![
                token(0, "ab", 0, 0),
                token(1, "\n", 0, 2),
                token(0, "cd", 1, 0),
                ScanEvent::End { line: 1, column: 2 },
            ]
        );
    }

    #[test]
    fn residue_after_last_match_is_still_consumed() {
        // "ifx" lookahead dies at EOF while "if" was already best; the
        // trailing "x" must still be scanned, not dropped.
        let family = AutomatonFamily::new(vec![
            patterns::literal("if"),
            patterns::literal("ifxy"),
        ])
        .unwrap();
        let events = run_collect(family, "ifx");
        assert_eq!(
            events,
            vec![token(0, "if", 0, 0), ScanEvent::End { line: 0, column: 3 }]
        );
    }

    // === Anchors ===

    /// `end` followed by an end-of-input anchor.
    fn end_anchored() -> AutomatonFamily {
        let rule = Automaton::builder(5)
            .transition(0, |c| (c == 'e').then_some(1))
            .transition(1, |c| (c == 'n').then_some(2))
            .transition(2, |c| (c == 'd').then_some(3))
            .end_jump(3, 4)
            .accept(4)
            .build()
            .unwrap();
        AutomatonFamily::new(vec![rule]).unwrap()
    }

    #[test]
    fn end_anchored_rule_matches_at_eof() {
        let events = run_collect(end_anchored(), "end");
        assert_eq!(
            events,
            vec![token(0, "end", 0, 0), ScanEvent::End { line: 0, column: 3 }]
        );
    }

    #[test]
    fn end_anchored_rule_rejects_trailing_input() {
        let events = run_collect(end_anchored(), "endx");
        assert_eq!(events, vec![ScanEvent::End { line: 0, column: 4 }]);
    }

    #[test]
    fn start_anchored_rule_matches_only_at_scan_start() {
        let start_anchored = Automaton::builder(3)
            .start_jump(0, 1)
            .transition(1, |c| (c == 'a').then_some(2))
            .accept(2)
            .build()
            .unwrap();
        let family = AutomatonFamily::new(vec![start_anchored]).unwrap();
        let events = run_collect(family, "aa");
        assert_eq!(
            events,
            vec![token(0, "a", 0, 0), ScanEvent::End { line: 0, column: 2 }]
        );
    }

    #[test]
    fn start_anchor_can_accept_zero_symbols() {
        let marker = Automaton::builder(2)
            .start_jump(0, 1)
            .accept(1)
            .build()
            .unwrap();
        let family = AutomatonFamily::new(vec![marker]).unwrap();
        let events = run_collect(family, "x");
        assert_eq!(
            events,
            vec![token(0, "", 0, 0), ScanEvent::End { line: 0, column: 1 }]
        );
    }

    // === Nested families ===

    fn nested_family() -> AutomatonFamily {
        let inner = AutomatonFamily::new(vec![
            patterns::class_plus(|c| c.is_ascii_digit()),
            patterns::class_plus(|c| c.is_ascii_alphabetic()),
        ])
        .unwrap();
        let outer = Automaton::builder(2)
            .transition(0, |c| c.is_ascii_alphanumeric().then_some(1))
            .transition(1, |c| c.is_ascii_alphanumeric().then_some(1))
            .accept(1)
            .nested(inner)
            .build()
            .unwrap();
        AutomatonFamily::new(vec![outer]).unwrap()
    }

    #[test]
    fn nested_events_discarded_by_default() {
        let events = run_collect(nested_family(), "ab12");
        assert_eq!(
            events,
            vec![token(0, "ab12", 0, 0), ScanEvent::End { line: 0, column: 4 }]
        );
    }

    #[test]
    fn nested_events_surfaced_when_configured() {
        let (tx, rx) = unbounded();
        let (_stop_tx, stop_rx) = bounded(1);
        let engine = Engine::new(nested_family(), tx, stop_rx, NestedEvents::Surface);
        engine.run("ab12".as_bytes(), 0, 0);
        drop(engine);
        let events: Vec<ScanEvent> = rx.try_iter().map(Result::unwrap).collect();
        assert_eq!(
            events,
            vec![
                token(0, "ab12", 0, 0),
                // Nested matches re-scan the lexeme from its own position.
                token(1, "ab", 0, 0),
                token(0, "12", 0, 2),
                ScanEvent::End { line: 0, column: 4 },
            ]
        );
    }

    // === Failure delivery ===

    #[test]
    fn invalid_utf8_is_terminal() {
        let (tx, rx) = unbounded();
        let (_stop_tx, stop_rx) = bounded(1);
        let family = AutomatonFamily::new(vec![ident()]).unwrap();
        let engine = Engine::new(family, tx, stop_rx, NestedEvents::Discard);
        engine.run(&[b'a', b'b', 0xC3][..], 0, 0);
        drop(engine);
        let messages: Vec<Envelope> = rx.try_iter().collect();
        // The failure aborts before "ab" resolves to a match.
        assert_eq!(messages.len(), 1);
        assert!(matches!(
            messages[0],
            Err(ScanError::InvalidUtf8 { offset: 2 })
        ));
    }

    #[test]
    fn pending_stop_suppresses_delivery() {
        let (tx, rx) = unbounded();
        let (stop_tx, stop_rx) = bounded(1);
        stop_tx.send(()).unwrap();
        let family = AutomatonFamily::new(vec![ident()]).unwrap();
        let engine = Engine::new(family, tx, stop_rx, NestedEvents::Discard);
        engine.run("ab cd".as_bytes(), 0, 0);
        drop(engine);
        assert_eq!(rx.try_iter().count(), 0);
    }
}
