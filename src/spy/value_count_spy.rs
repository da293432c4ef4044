use std::collections::BTreeMap;

use common::serialize_vint_u64;

use super::string_list::StringListIterator;
use super::tally::{
    add_to_tally, checked_count_add, commit_tally, corrupted, deserialize_tally, read_vint,
    serialize_tally, stage_tally, StagedCounts, TallyEntries,
};
use super::{get_most_frequent_items, MatchSpy, SpyRegistry, StringAndFrequency, Tally};
use crate::document::Document;
use crate::{DataCorruption, DocCount, ValueSlot, Weight};

const SINGLE_VALUED_FLAG: u8 = b'0';
const MULTI_VALUED_FLAG: u8 = b'1';

#[derive(Debug, Default, PartialEq)]
struct SlotTally {
    multi_valued: bool,
    tally: Tally,
}

/// Counts the occurrences of every distinct value stored in the watched
/// slots of the matching documents.
///
/// A slot can be declared multi-valued, in which case its value is decoded
/// as a list written by
/// [`StringListSerializer`](super::StringListSerializer) and every item
/// of the list is counted.
///
/// Empty values are never counted: they mean the slot is not set.
///
/// ```rust
/// use matchspy::document::MemoryDocument;
/// use matchspy::spy::{MatchSpy, ValueCountSpy};
///
/// let mut spy = ValueCountSpy::default();
/// spy.add_slot(0, false);
/// spy.add_slot(1, true);
///
/// let mut doc = MemoryDocument::new();
/// doc.add_value(0, b"fiction".to_vec());
/// doc.add_multi_value(1, ["en", "fr"]);
/// spy.observe(&doc, 1.0);
/// spy.observe(&MemoryDocument::new(), 1.0);
///
/// assert_eq!(spy.total(), 2);
/// let top = spy.top_values(1, 10);
/// let languages: Vec<(&str, u64)> = top
///     .iter()
///     .map(|item| (item.value_str().unwrap(), item.frequency()))
///     .collect();
/// assert_eq!(languages, vec![("en", 1), ("fr", 1)]);
/// ```
#[derive(Debug, Default)]
pub struct ValueCountSpy {
    total: DocCount,
    slots: BTreeMap<ValueSlot, SlotTally>,
}

/// Results decoded from a peer, applied only once fully decoded.
struct ValueCountResults<'a> {
    total: DocCount,
    slots: Vec<(ValueSlot, TallyEntries<'a>)>,
}

fn decode_slot(slot: u64) -> std::io::Result<ValueSlot> {
    ValueSlot::try_from(slot).map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Value slot {} out of range", slot),
        )
    })
}

/// State reached by merging decoded results, checked for overflow.
struct StagedValueCounts<'a> {
    total: DocCount,
    slots: BTreeMap<ValueSlot, StagedCounts<'a>>,
}

impl ValueCountResults<'_> {
    fn decode(mut cursor: &[u8]) -> std::io::Result<ValueCountResults<'_>> {
        let total = read_vint(&mut cursor)?;
        let mut slots = Vec::new();
        while !cursor.is_empty() {
            let slot = decode_slot(read_vint(&mut cursor)?)?;
            let entries = deserialize_tally(&mut cursor)?;
            slots.push((slot, entries));
        }
        Ok(ValueCountResults { total, slots })
    }
}

impl ValueCountSpy {
    /// Name under which the spy is known to a [`SpyRegistry`].
    pub const NAME: &'static str = "ValueCountSpy";

    /// Creates a spy watching no slot.
    pub fn new() -> ValueCountSpy {
        ValueCountSpy::default()
    }

    /// Creates a spy watching a single-valued slot.
    pub fn for_slot(slot: ValueSlot) -> ValueCountSpy {
        let mut spy = ValueCountSpy::default();
        spy.add_slot(slot, false);
        spy
    }

    /// Builds a spy from the output of
    /// [`serialize_config`](MatchSpy::serialize_config).
    pub fn from_config(config: &[u8]) -> crate::Result<ValueCountSpy> {
        let mut cursor = config;
        let mut spy = ValueCountSpy::default();
        while !cursor.is_empty() {
            let slot = read_vint(&mut cursor)
                .and_then(decode_slot)
                .map_err(corrupted(Self::NAME))?;
            let multi_valued = match cursor.split_first() {
                Some((&SINGLE_VALUED_FLAG, rest)) => {
                    cursor = rest;
                    false
                }
                Some((&MULTI_VALUED_FLAG, rest)) => {
                    cursor = rest;
                    true
                }
                _ => {
                    return Err(DataCorruption::new(
                        Self::NAME,
                        "Expected '0' or '1' to indicate multivalues status".to_string(),
                    )
                    .into());
                }
            };
            spy.add_slot(slot, multi_valued);
        }
        Ok(spy)
    }

    /// Watches `slot`. If `multi_valued` is true, the slot value is decoded
    /// as a list of values.
    ///
    /// Adding a slot twice keeps its tally and updates the multi-valued flag.
    pub fn add_slot(&mut self, slot: ValueSlot, multi_valued: bool) {
        self.slots.entry(slot).or_default().multi_valued = multi_valued;
    }

    /// Returns a spy with the same configuration and empty results.
    pub fn clone_config(&self) -> ValueCountSpy {
        let mut spy = ValueCountSpy::default();
        for (&slot, slot_tally) in &self.slots {
            spy.add_slot(slot, slot_tally.multi_valued);
        }
        spy
    }

    /// Number of documents observed, including those merged from peers.
    pub fn total(&self) -> DocCount {
        self.total
    }

    /// Watched slots, in increasing order.
    pub fn slots(&self) -> impl Iterator<Item = ValueSlot> + '_ {
        self.slots.keys().copied()
    }

    /// Returns true iff `slot` is watched and multi-valued.
    pub fn is_multi_valued(&self, slot: ValueSlot) -> bool {
        self.slots
            .get(&slot)
            .map(|slot_tally| slot_tally.multi_valued)
            .unwrap_or(false)
    }

    /// The tally of `slot`, or `None` if the slot is not watched.
    pub fn values(&self, slot: ValueSlot) -> Option<&Tally> {
        self.slots.get(&slot).map(|slot_tally| &slot_tally.tally)
    }

    pub(crate) fn values_mut(&mut self, slot: ValueSlot) -> Option<&mut Tally> {
        self.slots.get_mut(&slot).map(|slot_tally| &mut slot_tally.tally)
    }

    /// Returns the `max_values` most frequent values of `slot`.
    ///
    /// See [`get_most_frequent_items`] for the ordering.
    pub fn top_values(&self, slot: ValueSlot, max_values: usize) -> Vec<StringAndFrequency> {
        match self.values(slot) {
            Some(tally) => get_most_frequent_items(tally, max_values),
            None => Vec::new(),
        }
    }

    fn stage<'a>(&self, results: ValueCountResults<'a>) -> std::io::Result<StagedValueCounts<'a>> {
        let total = checked_count_add(self.total, results.total)?;
        let mut slots: BTreeMap<ValueSlot, StagedCounts<'a>> = BTreeMap::new();
        for (slot, entries) in results.slots {
            stage_tally(slots.entry(slot).or_default(), self.values(slot), entries)?;
        }
        Ok(StagedValueCounts { total, slots })
    }

    fn commit(&mut self, staged: StagedValueCounts<'_>) {
        self.total = staged.total;
        for (slot, counts) in staged.slots {
            commit_tally(&mut self.slots.entry(slot).or_default().tally, counts);
        }
    }
}

impl MatchSpy for ValueCountSpy {
    fn observe(&mut self, doc: &dyn Document, _weight: Weight) {
        self.total = self.total.saturating_add(1);
        for (&slot, slot_tally) in self.slots.iter_mut() {
            let value = doc.value(slot);
            if !slot_tally.multi_valued {
                if !value.is_empty() {
                    add_to_tally(&mut slot_tally.tally, &value, 1);
                }
                continue;
            }
            for item in StringListIterator::new(&value) {
                match item {
                    Ok(item) if item.is_empty() => {}
                    Ok(item) => add_to_tally(&mut slot_tally.tally, item, 1),
                    Err(err) => {
                        warn!("Ignoring rest of malformed value list in slot {}: {}", slot, err);
                    }
                }
            }
        }
    }

    fn box_clone(&self) -> crate::Result<Box<dyn MatchSpy>> {
        Ok(Box::new(self.clone_config()))
    }

    fn name(&self) -> crate::Result<&str> {
        Ok(Self::NAME)
    }

    fn serialize_config(&self) -> crate::Result<Vec<u8>> {
        let mut config = Vec::new();
        for (&slot, slot_tally) in &self.slots {
            serialize_vint_u64(u64::from(slot), &mut config);
            config.push(if slot_tally.multi_valued {
                MULTI_VALUED_FLAG
            } else {
                SINGLE_VALUED_FLAG
            });
        }
        Ok(config)
    }

    fn reconstruct(
        &self,
        config: &[u8],
        _registry: &SpyRegistry,
    ) -> crate::Result<Box<dyn MatchSpy>> {
        debug!("{}::reconstruct ({} bytes)", Self::NAME, config.len());
        Ok(Box::new(ValueCountSpy::from_config(config)?))
    }

    fn serialize_results(&self) -> crate::Result<Vec<u8>> {
        let mut results = Vec::new();
        serialize_vint_u64(self.total, &mut results);
        for (&slot, slot_tally) in &self.slots {
            serialize_vint_u64(u64::from(slot), &mut results);
            serialize_tally(&slot_tally.tally, &mut results);
        }
        Ok(results)
    }

    fn merge_results(&mut self, payload: &[u8]) -> crate::Result<()> {
        debug!("{}::merge_results ({} bytes)", Self::NAME, payload.len());
        let staged = ValueCountResults::decode(payload)
            .and_then(|results| self.stage(results))
            .map_err(corrupted(Self::NAME))?;
        self.commit(staged);
        Ok(())
    }

    fn description(&self) -> String {
        format!(
            "{}({} docs seen, looking in {} slots)",
            Self::NAME,
            self.total,
            self.slots.len()
        )
    }
}
