//! Constructors for common rule shapes.
//!
//! Production rule sets are compiled to tables offline; these helpers cover
//! the shapes that keep coming up in drivers and test fixtures: exact
//! literals, single-symbol classes, and identifier-like words. Each builds
//! its tables directly, so the results are valid by construction.

use crate::automaton::{Automaton, StateId, Transition};

fn dead() -> Transition {
    Box::new(|_| None)
}

/// An automaton accepting exactly `text`.
///
/// A chain of `text.chars().count() + 1` states; only the full literal is
/// accepted. An empty literal yields a single accepting initial state, which
/// matches the empty string — generally not useful inside a family, but
/// well-formed.
pub fn literal(text: &str) -> Automaton {
    let symbols: Vec<char> = text.chars().collect();
    let count = symbols.len() + 1;

    let mut accepting = vec![false; count];
    accepting[count - 1] = true;

    let mut transitions: Vec<Transition> = Vec::with_capacity(count);
    for (i, c) in symbols.into_iter().enumerate() {
        // Chain lengths are bounded by the literal's length.
        #[allow(clippy::cast_possible_truncation)]
        let target = (i + 1) as StateId;
        transitions.push(Box::new(move |x| (x == c).then_some(target)));
    }
    transitions.push(dead());

    Automaton::from_tables(
        accepting,
        transitions,
        vec![None; count],
        vec![None; count],
        None,
    )
}

/// An automaton accepting exactly one symbol satisfying `pred`.
pub fn class(pred: impl Fn(char) -> bool + Send + Sync + 'static) -> Automaton {
    Automaton::from_tables(
        vec![false, true],
        vec![Box::new(move |c| pred(c).then_some(1)), dead()],
        vec![None, None],
        vec![None, None],
        None,
    )
}

/// An automaton accepting one or more symbols satisfying `pred`.
pub fn class_plus(pred: impl Fn(char) -> bool + Send + Sync + 'static) -> Automaton {
    let pred = std::sync::Arc::new(pred);
    let enter = std::sync::Arc::clone(&pred);
    Automaton::from_tables(
        vec![false, true],
        vec![
            Box::new(move |c| enter(c).then_some(1)),
            Box::new(move |c| pred(c).then_some(1)),
        ],
        vec![None, None],
        vec![None, None],
        None,
    )
}

/// An automaton accepting one `first` symbol followed by zero or more `rest`
/// symbols — the identifier shape.
pub fn word(
    first: impl Fn(char) -> bool + Send + Sync + 'static,
    rest: impl Fn(char) -> bool + Send + Sync + 'static,
) -> Automaton {
    Automaton::from_tables(
        vec![false, true],
        vec![
            Box::new(move |c| first(c).then_some(1)),
            Box::new(move |c| rest(c).then_some(1)),
        ],
        vec![None, None],
        vec![None, None],
        None,
    )
}
