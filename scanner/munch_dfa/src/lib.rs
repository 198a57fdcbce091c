//! Automaton data model for the munch scanning engine.
//!
//! This crate is standalone: it defines the compiled shape of a lexical rule
//! ([`Automaton`]), the priority-ordered collection the engine simulates in
//! parallel ([`AutomatonFamily`]), and ergonomic constructors for common rule
//! shapes ([`patterns`]). It contains no simulation logic — the runtime lives
//! in `munch_scan`, and rule-set generators can target this crate without
//! pulling the engine in.
//!
//! # Model
//!
//! An automaton is a DFA over `char` with dense `u32` state ids, state `0`
//! always initial. Besides the ordinary transition function it carries two
//! pseudo-transition tables: *start jumps*, folded in before any input is
//! consumed (line/input anchors), and *end jumps*, folded in once input is
//! exhausted (end anchors). "No transition" is `None`; a branch with no
//! transition dies.

mod automaton;
mod builder;
pub mod patterns;

pub use automaton::{Automaton, AutomatonFamily, RuleId, StateId, Transition};
pub use builder::{AutomatonBuilder, BuildError};
