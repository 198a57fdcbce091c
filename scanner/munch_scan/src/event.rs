//! Events produced by the scan engine.

use munch_dfa::RuleId;

/// One classified lexeme: the rule that matched, the matched text, and the
/// line/column of the first matched symbol.
///
/// Lines and columns are zero-based. A column counts symbols since the last
/// newline; the newline itself is the last symbol of its line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchEvent {
    /// Index of the matching rule in the caller-supplied family order.
    pub rule: RuleId,
    /// The matched text.
    pub text: String,
    /// Zero-based line of the first matched symbol.
    pub line: u32,
    /// Zero-based column of the first matched symbol.
    pub column: u32,
}

/// A message on the event channel.
///
/// A scan delivers zero or more `Token` events followed by exactly one `End`
/// marker — unless it is cancelled (no further events) or fails (a terminal
/// [`ScanError`](crate::ScanError) instead).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanEvent {
    /// A rule matched.
    Token(MatchEvent),
    /// The source is exhausted; no further events follow.
    End {
        /// Line after consuming the entire source.
        line: u32,
        /// Column after consuming the entire source.
        column: u32,
    },
}
