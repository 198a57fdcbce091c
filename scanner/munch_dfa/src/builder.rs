//! Fluent construction of automaton tables with invariant checking.
//!
//! The builder records table entries as they are supplied and validates
//! ranges immediately; the first violation is remembered and reported by
//! [`AutomatonBuilder::build`]. This keeps the call sites fluent while still
//! guaranteeing that every [`Automaton`] in existence has well-formed tables.

use thiserror::Error;

use crate::automaton::{Automaton, AutomatonFamily, StateId, Transition};

/// Invariant violation detected while assembling an automaton or family.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BuildError {
    /// An automaton must have at least one state (state `0` is initial).
    #[error("automaton must have at least one state")]
    NoStates,
    /// A family must contain at least one rule.
    #[error("automaton family must contain at least one rule")]
    EmptyFamily,
    /// A state index supplied to the builder is outside `0..state_count`.
    #[error("state {state} is out of range (automaton has {count} states)")]
    StateOutOfRange {
        /// The offending state index.
        state: StateId,
        /// The declared state count.
        count: usize,
    },
}

/// Builder for one [`Automaton`].
///
/// Created via [`Automaton::builder`]. States not given a transition keep the
/// dead default (`|_| None`); states not marked accepting reject; jumps
/// default to `None`.
pub struct AutomatonBuilder {
    accepting: Vec<bool>,
    transitions: Vec<Transition>,
    start_jumps: Vec<Option<StateId>>,
    end_jumps: Vec<Option<StateId>>,
    nested: Option<AutomatonFamily>,
    /// First invariant violation seen, reported by `build()`.
    error: Option<BuildError>,
}

impl AutomatonBuilder {
    pub(crate) fn new(state_count: usize) -> Self {
        let mut transitions: Vec<Transition> = Vec::with_capacity(state_count);
        for _ in 0..state_count {
            transitions.push(Box::new(|_| None));
        }
        Self {
            accepting: vec![false; state_count],
            transitions,
            start_jumps: vec![None; state_count],
            end_jumps: vec![None; state_count],
            nested: None,
            error: if state_count == 0 {
                Some(BuildError::NoStates)
            } else {
                None
            },
        }
    }

    fn check(&mut self, state: StateId) -> bool {
        let in_range = (state as usize) < self.accepting.len();
        if !in_range && self.error.is_none() {
            self.error = Some(BuildError::StateOutOfRange {
                state,
                count: self.accepting.len(),
            });
        }
        in_range
    }

    /// Mark `state` as accepting.
    #[must_use]
    pub fn accept(mut self, state: StateId) -> Self {
        if self.check(state) {
            self.accepting[state as usize] = true;
        }
        self
    }

    /// Install the transition function for `state`.
    ///
    /// The function's returned targets are checked lazily at simulation time
    /// only via indexing; suppliers are expected to return states of this
    /// automaton. Out-of-range *source* states are a [`BuildError`].
    #[must_use]
    pub fn transition(
        mut self,
        state: StateId,
        next: impl Fn(char) -> Option<StateId> + Send + Sync + 'static,
    ) -> Self {
        if self.check(state) {
            self.transitions[state as usize] = Box::new(next);
        }
        self
    }

    /// Install a start jump: a pseudo-transition folded in before the first
    /// real input symbol (input anchors).
    #[must_use]
    pub fn start_jump(mut self, from: StateId, to: StateId) -> Self {
        if self.check(from) && self.check(to) {
            self.start_jumps[from as usize] = Some(to);
        }
        self
    }

    /// Install an end jump: a pseudo-transition folded in once input is
    /// exhausted (end anchors).
    #[must_use]
    pub fn end_jump(mut self, from: StateId, to: StateId) -> Self {
        if self.check(from) && self.check(to) {
            self.end_jumps[from as usize] = Some(to);
        }
        self
    }

    /// Attach a nested family: the engine re-scans this rule's matched text
    /// with it after each match.
    #[must_use]
    pub fn nested(mut self, family: AutomatonFamily) -> Self {
        self.nested = Some(family);
        self
    }

    /// Finish, reporting the first invariant violation if any occurred.
    pub fn build(self) -> Result<Automaton, BuildError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(Automaton::from_tables(
            self.accepting,
            self.transitions,
            self.start_jumps,
            self.end_jumps,
            self.nested,
        ))
    }
}
