/*!
Defines the match spies: collectors that watch every document accepted by
the ranking pass of a query and tally statistics about them.

Spies are built for distributed search. A typical run looks like this:

- the coordinator configures a *template* spy
  (e.g. [`ValueCountSpy::add_slot`]),
- every shard gets its own copy, either through [`MatchSpy::box_clone`]
  in process, or through [`MatchSpy::serialize_config`] followed by
  [`MatchSpy::reconstruct`] on the other side of the network,
- the query engine calls [`MatchSpy::observe`] once per match,
- each shard ships [`MatchSpy::serialize_results`] back,
- the coordinator folds every payload into one spy with
  [`MatchSpy::merge_results`].

Merging is a pointwise sum of tallies, so shard payloads may be merged in
any order, including as they arrive.

Once all payloads are merged, results are read with
[`ValueCountSpy::top_values`], [`TermCountSpy::top_terms`] or turned into
numeric facets with [`CategorySelectSpy::build_numeric_ranges`].
*/

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use downcast_rs::impl_downcast;

use crate::document::Document;
use crate::{DocCount, SpyError, Weight};

mod category_select_spy;
mod config;
mod multiple_spy;
mod registry;
mod string_list;
mod tally;
mod term_count_spy;
mod top_k;
mod value_count_spy;

#[cfg(test)]
mod tests;

pub use self::category_select_spy::{
    build_numeric_ranges, score_categorisation, CategoryKey, CategorySelectSpy,
    RANGE_LOWER_BOUND_NUM_BYTES,
};
pub use self::config::{SlotConfig, SpyConfig, TermCountConfig, ValueCountConfig};
pub use self::multiple_spy::MultipleSpy;
pub use self::registry::SpyRegistry;
pub use self::string_list::{StringListIterator, StringListSerializer};
pub use self::term_count_spy::TermCountSpy;
pub use self::top_k::{get_most_frequent_items, StringAndFrequency};
pub use self::value_count_spy::ValueCountSpy;

/// Occurrence count of every observed key.
///
/// Keys are raw byte strings: document values, or term suffixes.
pub type Tally = BTreeMap<Vec<u8>, DocCount>;

/// A match spy observes every matching document of a query.
///
/// Only [`observe`](MatchSpy::observe) is mandatory. The other methods
/// make the spy usable in distributed searches; their default
/// implementation fails with [`SpyError::Unsupported`], which is fine for
/// spies that never leave the process.
///
/// Observation requires exclusive access: a spy instance belongs to one
/// query execution at a time. Running several executions in parallel is
/// done on independent clones.
pub trait MatchSpy: downcast_rs::Downcast + Send + fmt::Debug {
    /// Registers one matching document.
    fn observe(&mut self, doc: &dyn Document, weight: Weight);

    /// Returns a new spy with the same configuration and no accumulated
    /// results.
    fn box_clone(&self) -> crate::Result<Box<dyn MatchSpy>> {
        Err(SpyError::unsupported("box_clone"))
    }

    /// Stable name identifying the concrete spy type.
    ///
    /// It is the key used by [`SpyRegistry`] to reconstruct remote spies.
    fn name(&self) -> crate::Result<&str> {
        Err(SpyError::unsupported("name"))
    }

    /// Encodes the configuration of the spy, without any result.
    fn serialize_config(&self) -> crate::Result<Vec<u8>> {
        Err(SpyError::unsupported("serialize_config"))
    }

    /// Builds a configured spy from the output of
    /// [`serialize_config`](MatchSpy::serialize_config).
    ///
    /// `self` acts as a prototype and is left untouched.
    fn reconstruct(
        &self,
        _config: &[u8],
        _registry: &SpyRegistry,
    ) -> crate::Result<Box<dyn MatchSpy>> {
        Err(SpyError::unsupported("reconstruct"))
    }

    /// Encodes the results accumulated so far.
    fn serialize_results(&self) -> crate::Result<Vec<u8>> {
        Err(SpyError::unsupported("serialize_results"))
    }

    /// Adds the results encoded by a peer's
    /// [`serialize_results`](MatchSpy::serialize_results) to this spy.
    ///
    /// On error, the accumulated results are left unchanged.
    fn merge_results(&mut self, _payload: &[u8]) -> crate::Result<()> {
        Err(SpyError::unsupported("merge_results"))
    }

    /// Human readable description of the spy.
    fn description(&self) -> String {
        "MatchSpy()".to_string()
    }
}

impl_downcast!(MatchSpy);

/// Typed reference to a spy added to a [`MultipleSpy`].
///
/// Returned by [`MultipleSpy::add_spy`], it gives back the concrete
/// spy once the multiple spy has been observed or merged into.
pub struct SpyHandle<S: MatchSpy> {
    pos: usize,
    _phantom: PhantomData<fn() -> S>,
}

impl<S: MatchSpy> Clone for SpyHandle<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: MatchSpy> Copy for SpyHandle<S> {}

impl<S: MatchSpy> fmt::Debug for SpyHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpyHandle").field("pos", &self.pos).finish()
    }
}

impl<S: MatchSpy> SpyHandle<S> {
    pub(crate) fn new(pos: usize) -> SpyHandle<S> {
        SpyHandle {
            pos,
            _phantom: PhantomData,
        }
    }

    /// Position of the spy within its [`MultipleSpy`].
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Returns the spy, or `None` if `multiple_spy` holds a spy of another
    /// type at this position.
    pub fn get<'a>(&self, multiple_spy: &'a MultipleSpy) -> Option<&'a S> {
        multiple_spy.spy(self.pos)?.downcast_ref::<S>()
    }

    /// Mutable version of [`SpyHandle::get`].
    pub fn get_mut<'a>(&self, multiple_spy: &'a mut MultipleSpy) -> Option<&'a mut S> {
        multiple_spy.spy_mut(self.pos)?.downcast_mut::<S>()
    }
}
