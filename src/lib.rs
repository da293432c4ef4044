#![doc(test(attr(allow(unused_variables), deny(warnings))))]
#![warn(missing_docs)]
#![allow(clippy::len_without_is_empty)]

//! # `matchspy`
//!
//! Match-time statistics for a search engine.
//!
//! A *match spy* is handed every document accepted by the ranking pass of a
//! query. It builds frequency tallies over document values
//! ([`ValueCountSpy`](spy::ValueCountSpy)) or term prefixes
//! ([`TermCountSpy`](spy::TermCountSpy)), and can ship its partial state
//! across the network so that a coordinator merges the results of every
//! shard of a distributed index.
//!
//! ```rust
//! use matchspy::document::MemoryDocument;
//! use matchspy::spy::{MatchSpy, ValueCountSpy};
//!
//! # fn main() -> matchspy::Result<()> {
//! let mut template = ValueCountSpy::default();
//! template.add_slot(0, false);
//!
//! let mut doc = MemoryDocument::new();
//! doc.add_value(0, b"red".to_vec());
//!
//! // each shard observes its own matches...
//! let mut shard_spy = template.box_clone()?;
//! shard_spy.observe(&doc, 1.0);
//! shard_spy.observe(&doc, 1.0);
//! let payload = shard_spy.serialize_results()?;
//!
//! // ...and the coordinator merges them.
//! let mut merged = template.clone_config();
//! merged.merge_results(&payload)?;
//! merged.merge_results(&payload)?;
//! assert_eq!(merged.total(), 4);
//! let top = merged.top_values(0, 10);
//! assert_eq!(top[0].value(), b"red");
//! assert_eq!(top[0].frequency(), 4);
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate log;

pub mod document;
mod error;
pub mod spy;

pub use common;

pub use crate::error::{DataCorruption, SpyError};

/// Result type for every fallible operation of the crate.
pub type Result<T> = std::result::Result<T, SpyError>;

/// Number of a value slot within a document.
pub type ValueSlot = u32;

/// Weight assigned to a match by the ranking pass.
pub type Weight = f64;

/// Within-document frequency of a term.
pub type TermFreq = u32;

/// Position of a term occurrence within a document.
pub type TermPos = u32;

/// Number of documents or occurrences counted by a spy.
pub type DocCount = u64;
