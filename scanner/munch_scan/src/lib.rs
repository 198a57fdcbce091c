//! Streaming scan engine for the munch scanning engine.
//!
//! Drives an [`AutomatonFamily`](munch_dfa::AutomatonFamily) against a byte
//! source, producing match events in source order: maximal-munch matching
//! with first-declared-rule tie-breaks, multi-level lookahead, nested
//! re-scanning, and cooperative cancellation.
//!
//! # Architecture
//!
//! The engine runs on its own thread, decoupled from the consumer by a
//! rendezvous channel. [`Scanner`] is the consumer-facing handle: its
//! [`advance`](Scanner::advance) is the only blocking operation, pulling the
//! next event at a given lookahead level. A one-shot stop channel lets the
//! consumer cancel a scan before end of input; the engine checks it at every
//! send attempt, so cancellation is observed even when nobody is pulling.
//!
//! ```no_run
//! use munch_dfa::{patterns, AutomatonFamily};
//! use munch_scan::Scanner;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let family = AutomatonFamily::new(vec![
//!     patterns::literal("if"),
//!     patterns::word(|c| c.is_ascii_alphabetic(), |c| c.is_ascii_alphanumeric()),
//!     patterns::class(|c| c == ' ' || c == '\t'),
//! ])?;
//!
//! let mut scanner = Scanner::spawn(family, "if x".as_bytes());
//! while let Some(rule) = scanner.advance(0)? {
//!     println!("{}: {:?}", rule.index(), scanner.text());
//! }
//! # Ok(())
//! # }
//! ```

mod engine;
mod error;
mod event;
mod scanner;
mod source;

pub use engine::NestedEvents;
pub use error::ScanError;
pub use event::{MatchEvent, ScanEvent};
pub use scanner::{Scanner, ScannerBuilder};
