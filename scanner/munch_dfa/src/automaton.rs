//! Compiled automaton tables and the priority-ordered family.
//!
//! The tables mirror the shape emitted by offline rule compilers: one
//! acceptance flag, one transition function, one start jump and one end jump
//! per state. Construction goes through [`AutomatonBuilder`] which enforces
//! the table invariants; everything here assumes they hold.
//!
//! [`AutomatonBuilder`]: crate::AutomatonBuilder

use crate::builder::{AutomatonBuilder, BuildError};

/// Dense state index within one automaton. State `0` is always initial.
pub type StateId = u32;

/// Index of a rule within its [`AutomatonFamily`].
///
/// Lower index = higher priority on equal-length matches. The value is opaque
/// to the engine; the embedding driver maps it to its own token kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuleId(u32);

impl RuleId {
    /// Wrap a raw rule index.
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// The raw index into the family's rule order.
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Per-state transition function: the next state for an input symbol, or
/// `None` when the branch dies.
///
/// One boxed function per state, matching the generated-table shape the
/// engine was designed around.
pub type Transition = Box<dyn Fn(char) -> Option<StateId> + Send + Sync>;

/// A single deterministic finite automaton compiled from one lexical rule.
///
/// # Invariants
///
/// All four tables have exactly `state_count()` entries, every transition and
/// jump target is in range, and `state_count() >= 1`. Guaranteed by
/// [`AutomatonBuilder::build`](crate::AutomatonBuilder::build) and by the
/// [`patterns`](crate::patterns) constructors.
pub struct Automaton {
    /// Acceptance flag per state.
    accepting: Vec<bool>,
    /// Transition function per state.
    transitions: Vec<Transition>,
    /// Pseudo-transition taken before any input is consumed (anchors).
    start_jumps: Vec<Option<StateId>>,
    /// Pseudo-transition taken once input is exhausted (end anchors).
    end_jumps: Vec<Option<StateId>>,
    /// Secondary family used to re-tokenize this rule's matched text.
    nested: Option<AutomatonFamily>,
}

impl Automaton {
    /// Start building an automaton with `state_count` states.
    pub fn builder(state_count: usize) -> AutomatonBuilder {
        AutomatonBuilder::new(state_count)
    }

    /// Assemble an automaton from validated tables.
    ///
    /// Callers must uphold the type-level invariants; the builder and the
    /// pattern constructors are the only callers.
    pub(crate) fn from_tables(
        accepting: Vec<bool>,
        transitions: Vec<Transition>,
        start_jumps: Vec<Option<StateId>>,
        end_jumps: Vec<Option<StateId>>,
        nested: Option<AutomatonFamily>,
    ) -> Self {
        debug_assert!(!accepting.is_empty());
        debug_assert_eq!(accepting.len(), transitions.len());
        debug_assert_eq!(accepting.len(), start_jumps.len());
        debug_assert_eq!(accepting.len(), end_jumps.len());
        Self {
            accepting,
            transitions,
            start_jumps,
            end_jumps,
            nested,
        }
    }

    /// Number of states. Always at least 1.
    pub fn state_count(&self) -> usize {
        self.accepting.len()
    }

    /// Whether `state` is accepting.
    #[inline]
    pub fn is_accepting(&self, state: StateId) -> bool {
        self.accepting[state as usize]
    }

    /// Apply the transition function for `state` to one input symbol.
    #[inline]
    pub fn step(&self, state: StateId, symbol: char) -> Option<StateId> {
        (self.transitions[state as usize])(symbol)
    }

    /// The start jump out of `state`, if any.
    #[inline]
    pub fn start_jump(&self, state: StateId) -> Option<StateId> {
        self.start_jumps[state as usize]
    }

    /// The end jump out of `state`, if any.
    #[inline]
    pub fn end_jump(&self, state: StateId) -> Option<StateId> {
        self.end_jumps[state as usize]
    }

    /// The nested family used to re-scan this rule's matched text, if any.
    pub fn nested(&self) -> Option<&AutomatonFamily> {
        self.nested.as_ref()
    }
}

impl std::fmt::Debug for Automaton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Automaton")
            .field("state_count", &self.state_count())
            .field("accepting", &self.accepting)
            .field("start_jumps", &self.start_jumps)
            .field("end_jumps", &self.end_jumps)
            .field("nested", &self.nested.as_ref().map(AutomatonFamily::len))
            .finish_non_exhaustive()
    }
}

/// An ordered, non-empty collection of automatons — one per lexical rule.
///
/// Order defines tie-break priority: on equal-length matches the rule with
/// the lower index wins.
#[derive(Debug)]
pub struct AutomatonFamily {
    rules: Vec<Automaton>,
}

impl AutomatonFamily {
    /// Create a family from rules in priority order.
    ///
    /// Fails with [`BuildError::EmptyFamily`] when `rules` is empty.
    pub fn new(rules: Vec<Automaton>) -> Result<Self, BuildError> {
        if rules.is_empty() {
            return Err(BuildError::EmptyFamily);
        }
        Ok(Self { rules })
    }

    /// Number of rules in the family. Always at least 1.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Always `false`; present for API completeness.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Look up a rule by id.
    ///
    /// # Panics
    ///
    /// Panics when `id` does not refer to a rule of this family — ids are
    /// only meaningful against the family that produced them.
    pub fn rule(&self, id: RuleId) -> &Automaton {
        &self.rules[id.index() as usize]
    }

    /// Iterate rules in priority order, paired with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (RuleId, &Automaton)> {
        self.rules.iter().enumerate().map(|(i, rule)| {
            // Family sizes are bounded by the number of lexical rules, far
            // below u32::MAX.
            #[allow(clippy::cast_possible_truncation)]
            (RuleId::new(i as u32), rule)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn single_char(c: char) -> Automaton {
        crate::patterns::class(move |x| x == c)
    }

    // === RuleId ===

    #[test]
    fn rule_id_roundtrip() {
        let id = RuleId::new(7);
        assert_eq!(id.index(), 7);
    }

    #[test]
    fn rule_id_orders_by_index() {
        assert!(RuleId::new(0) < RuleId::new(1));
    }

    // === Automaton accessors ===

    #[test]
    fn step_follows_transition() {
        let a = single_char('x');
        assert_eq!(a.step(0, 'x'), Some(1));
        assert_eq!(a.step(0, 'y'), None);
    }

    #[test]
    fn acceptance_flags() {
        let a = single_char('x');
        assert!(!a.is_accepting(0));
        assert!(a.is_accepting(1));
    }

    #[test]
    fn jumps_default_to_none() {
        let a = single_char('x');
        assert_eq!(a.start_jump(0), None);
        assert_eq!(a.end_jump(1), None);
    }

    #[test]
    fn nested_absent_by_default() {
        let a = single_char('x');
        assert!(a.nested().is_none());
    }

    // === Family ===

    #[test]
    fn empty_family_rejected() {
        assert_eq!(
            AutomatonFamily::new(Vec::new()).unwrap_err(),
            BuildError::EmptyFamily
        );
    }

    #[test]
    fn family_preserves_rule_order() {
        let family =
            AutomatonFamily::new(vec![single_char('a'), single_char('b')]).unwrap();
        assert_eq!(family.len(), 2);
        assert_eq!(family.rule(RuleId::new(0)).step(0, 'a'), Some(1));
        assert_eq!(family.rule(RuleId::new(1)).step(0, 'b'), Some(1));
    }

    #[test]
    fn iter_yields_ids_in_priority_order() {
        let family =
            AutomatonFamily::new(vec![single_char('a'), single_char('b')]).unwrap();
        let ids: Vec<u32> = family.iter().map(|(id, _)| id.index()).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn family_is_never_empty() {
        let family = AutomatonFamily::new(vec![single_char('a')]).unwrap();
        assert!(!family.is_empty());
    }
}
