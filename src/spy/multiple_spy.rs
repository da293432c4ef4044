use common::serialize_bytes;
use itertools::Itertools;

use super::string_list::read_length_prefixed;
use super::tally::corrupted;
use super::{MatchSpy, SpyHandle, SpyRegistry};
use crate::document::Document;
use crate::{DataCorruption, SpyError, Weight};

/// Deepest nesting of `MultipleSpy` configs accepted by `reconstruct`.
const MAX_NESTING_DEPTH: usize = 32;

/// Merges `chunk` into a copy of `spy` holding the same results, leaving
/// `spy` untouched. Returns `None` if `spy` cannot be copied that way.
fn stage_merge(spy: &dyn MatchSpy, chunk: &[u8]) -> crate::Result<Option<Box<dyn MatchSpy>>> {
    let copy = spy.box_clone().and_then(|mut copy| {
        copy.merge_results(&spy.serialize_results()?)?;
        Ok(copy)
    });
    match copy {
        Ok(mut staged) => {
            staged.merge_results(chunk)?;
            Ok(Some(staged))
        }
        Err(SpyError::Unsupported { .. }) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Runs several spies over the same matches.
///
/// Members are kept in insertion order. Serialized results are a list of
/// chunks, one per member, matched to the members by position: the
/// results of a `MultipleSpy` can only be merged into a `MultipleSpy`
/// holding the same kinds of spies in the same order.
///
/// ```rust
/// use matchspy::document::MemoryDocument;
/// use matchspy::spy::{MatchSpy, MultipleSpy, TermCountSpy, ValueCountSpy};
///
/// let mut multiple_spy = MultipleSpy::new();
/// let colors = multiple_spy.add_spy(ValueCountSpy::for_slot(0));
/// let tags = multiple_spy.add_spy(TermCountSpy::for_prefix("T"));
///
/// let mut doc = MemoryDocument::new();
/// doc.add_value(0, b"red".to_vec());
/// doc.add_term("Tnew", 1).unwrap();
/// multiple_spy.observe(&doc, 1.0);
///
/// assert_eq!(colors.get(&multiple_spy).unwrap().total(), 1);
/// assert_eq!(tags.get(&multiple_spy).unwrap().terms_seen(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MultipleSpy {
    spies: Vec<Box<dyn MatchSpy>>,
}

impl MultipleSpy {
    /// Name under which the spy is known to a [`SpyRegistry`].
    pub const NAME: &'static str = "MultipleSpy";

    /// Creates an empty `MultipleSpy`.
    pub fn new() -> MultipleSpy {
        MultipleSpy::default()
    }

    /// Appends a spy and returns a handle to get it back.
    pub fn add_spy<S: MatchSpy>(&mut self, spy: S) -> SpyHandle<S> {
        let pos = self.spies.len();
        self.spies.push(Box::new(spy));
        SpyHandle::new(pos)
    }

    /// Appends an already boxed spy and returns its position.
    pub fn push(&mut self, spy: Box<dyn MatchSpy>) -> usize {
        self.spies.push(spy);
        self.spies.len() - 1
    }

    /// Number of member spies.
    pub fn len(&self) -> usize {
        self.spies.len()
    }

    /// Returns true iff there is no member spy.
    pub fn is_empty(&self) -> bool {
        self.spies.is_empty()
    }

    /// Member spy at position `pos`.
    pub fn spy(&self, pos: usize) -> Option<&(dyn MatchSpy + 'static)> {
        self.spies.get(pos).map(|spy| spy.as_ref())
    }

    /// Mutable version of [`MultipleSpy::spy`].
    pub fn spy_mut(&mut self, pos: usize) -> Option<&mut (dyn MatchSpy + 'static)> {
        self.spies.get_mut(pos).map(|spy| spy.as_mut())
    }

    /// Member spies, in order.
    pub fn spies(&self) -> impl Iterator<Item = &(dyn MatchSpy + 'static)> + '_ {
        self.spies.iter().map(|spy| spy.as_ref())
    }

    fn from_config(
        config: &[u8],
        registry: &SpyRegistry,
        depth: usize,
    ) -> crate::Result<MultipleSpy> {
        if depth > MAX_NESTING_DEPTH {
            return Err(DataCorruption::new(
                Self::NAME,
                format!("Spies nested deeper than {} levels", MAX_NESTING_DEPTH),
            )
            .into());
        }
        let mut cursor = config;
        let mut multiple_spy = MultipleSpy::new();
        while !cursor.is_empty() {
            let name = read_length_prefixed(&mut cursor).map_err(corrupted(Self::NAME))?;
            let name = std::str::from_utf8(name).map_err(|_| {
                DataCorruption::new(Self::NAME, "Spy name is not valid UTF-8".to_string())
            })?;
            let prototype = registry
                .get(name)
                .ok_or_else(|| SpyError::UnknownSpyType(name.to_string()))?;
            let spy_config = read_length_prefixed(&mut cursor).map_err(corrupted(Self::NAME))?;
            if prototype.is::<MultipleSpy>() {
                let nested = MultipleSpy::from_config(spy_config, registry, depth + 1)?;
                multiple_spy.push(Box::new(nested));
            } else {
                multiple_spy.push(prototype.reconstruct(spy_config, registry)?);
            }
        }
        Ok(multiple_spy)
    }

    fn split_chunks<'a>(&self, payload: &'a [u8]) -> crate::Result<Vec<&'a [u8]>> {
        let mut cursor = payload;
        let mut chunks = Vec::with_capacity(self.spies.len());
        while !cursor.is_empty() {
            if chunks.len() == self.spies.len() {
                warn!(
                    "{} bytes left after the results of {} spies",
                    cursor.len(),
                    self.spies.len()
                );
                return Err(DataCorruption::new(
                    Self::NAME,
                    format!("Trailing bytes after {} spy results", self.spies.len()),
                )
                .into());
            }
            let chunk = read_length_prefixed(&mut cursor).map_err(corrupted(Self::NAME))?;
            chunks.push(chunk);
        }
        if chunks.len() != self.spies.len() {
            warn!(
                "Got results for {} spies, expected {}",
                chunks.len(),
                self.spies.len()
            );
            return Err(DataCorruption::new(
                Self::NAME,
                format!(
                    "Expected results for {} spies, got {}",
                    self.spies.len(),
                    chunks.len()
                ),
            )
            .into());
        }
        Ok(chunks)
    }
}

impl MatchSpy for MultipleSpy {
    fn observe(&mut self, doc: &dyn Document, weight: Weight) {
        for spy in &mut self.spies {
            spy.observe(doc, weight);
        }
    }

    fn box_clone(&self) -> crate::Result<Box<dyn MatchSpy>> {
        let spies = self
            .spies
            .iter()
            .map(|spy| spy.box_clone())
            .collect::<crate::Result<Vec<_>>>()?;
        Ok(Box::new(MultipleSpy { spies }))
    }

    fn name(&self) -> crate::Result<&str> {
        Ok(Self::NAME)
    }

    fn serialize_config(&self) -> crate::Result<Vec<u8>> {
        let mut config = Vec::new();
        for spy in &self.spies {
            serialize_bytes(spy.name()?.as_bytes(), &mut config)?;
            serialize_bytes(&spy.serialize_config()?, &mut config)?;
        }
        Ok(config)
    }

    fn reconstruct(
        &self,
        config: &[u8],
        registry: &SpyRegistry,
    ) -> crate::Result<Box<dyn MatchSpy>> {
        debug!("{}::reconstruct ({} bytes)", Self::NAME, config.len());
        Ok(Box::new(MultipleSpy::from_config(config, registry, 1)?))
    }

    fn serialize_results(&self) -> crate::Result<Vec<u8>> {
        let mut results = Vec::new();
        for spy in &self.spies {
            serialize_bytes(&spy.serialize_results()?, &mut results)?;
        }
        Ok(results)
    }

    /// Merges every chunk into the member at the same position.
    ///
    /// Each chunk is first merged into a copy of its member, rebuilt from
    /// the member's own results. Members are replaced by their merged
    /// copies only once every chunk was accepted, so a rejected payload
    /// modifies no member. Members that cannot be copied are merged into
    /// directly, after the others were checked.
    fn merge_results(&mut self, payload: &[u8]) -> crate::Result<()> {
        debug!("{}::merge_results ({} bytes)", Self::NAME, payload.len());
        let chunks = self.split_chunks(payload)?;
        let staged_spies = self
            .spies
            .iter()
            .zip(&chunks)
            .map(|(spy, chunk)| stage_merge(spy.as_ref(), chunk))
            .collect::<crate::Result<Vec<_>>>()?;
        for ((spy, chunk), staged) in self.spies.iter_mut().zip(chunks).zip(staged_spies) {
            match staged {
                Some(staged) => *spy = staged,
                None => spy.merge_results(chunk)?,
            }
        }
        Ok(())
    }

    fn description(&self) -> String {
        format!(
            "{}({})",
            Self::NAME,
            self.spies.iter().map(|spy| spy.description()).join(", ")
        )
    }
}
