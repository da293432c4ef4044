//! Turns the raw numeric tallies of a [`ValueCountSpy`] into a handful of
//! ranges suitable for faceted navigation.
//!
//! The keys of the tally are expected to be
//! [`sortable_serialize`](common::sortable_serialize) encodings. Once
//! bucketed, a key is either:
//! - the empty string, counting the documents where the slot is not set,
//! - the encoding of a single value,
//! - the encoding of the lower bound padded with zeros to
//!   [`RANGE_LOWER_BOUND_NUM_BYTES`] bytes, followed by the encoding of the
//!   upper bound.
//!
//! [`CategoryKey::parse`] decodes these keys.

use std::collections::BTreeMap;

use common::{sortable_serialize, sortable_unserialize, SORTABLE_NUM_BYTES};

use super::{MatchSpy, SpyRegistry, StringAndFrequency, Tally, ValueCountSpy};
use crate::document::Document;
use crate::{DataCorruption, DocCount, SpyError, ValueSlot, Weight};

/// Width of the lower bound of a range key, padding included.
pub const RANGE_LOWER_BOUND_NUM_BYTES: usize = 9;

const RANGE_KEY_NUM_BYTES: usize = RANGE_LOWER_BOUND_NUM_BYTES + SORTABLE_NUM_BYTES;

fn sqr(val: f64) -> f64 {
    val * val
}

/// Scores how well `tally` splits `total` documents into
/// `desired_num_categories` categories. Lower is better.
///
/// The score is the normalized variance of the category sizes around the
/// ideal size, the documents missing from the tally counting as one extra
/// category. A bias of `0.01` per squared category of difference between
/// the desired and the actual number of categories is added.
///
/// A non-positive `desired_num_categories` stands for the actual number of
/// categories. Returns `0.0` if no document was seen.
pub fn score_categorisation(total: DocCount, tally: &Tally, desired_num_categories: f64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let num_categories = tally.len() as f64;
    let mut desired_num_categories = desired_num_categories;
    if desired_num_categories <= 0.0 {
        desired_num_categories = num_categories.max(1.0);
    }
    let avg = total as f64 / desired_num_categories;

    let mut total_unset = total;
    let mut score = 0.0;
    for &count in tally.values() {
        total_unset = total_unset.saturating_sub(count);
        score += sqr(count as f64 - avg);
    }
    if total_unset > 0 {
        score += sqr(total_unset as f64 - avg);
    }
    score /= sqr(total as f64);
    score + 0.01 * sqr(desired_num_categories - num_categories)
}

#[derive(Debug)]
struct Bucket {
    count: DocCount,
    min: f64,
    max: f64,
}

impl Default for Bucket {
    fn default() -> Bucket {
        Bucket {
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl Bucket {
    fn update(&mut self, count: DocCount, value: f64) {
        self.count = self.count.saturating_add(count);
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    fn key(&self) -> Vec<u8> {
        let mut key = sortable_serialize(self.min).to_vec();
        if self.min != self.max {
            key.resize(RANGE_LOWER_BOUND_NUM_BYTES, 0u8);
            key.extend_from_slice(&sortable_serialize(self.max));
        }
        key
    }
}

/// Assigns every value of the histogram to the bucket of width `unit`
/// containing it. Only non-empty buckets are materialized.
fn fill_buckets(histogram: &[(f64, DocCount)], lo: f64, unit: f64) -> BTreeMap<i64, Bucket> {
    let mut buckets: BTreeMap<i64, Bucket> = BTreeMap::new();
    if !unit.is_finite() {
        let bucket = buckets.entry(0).or_default();
        for &(value, count) in histogram {
            bucket.update(count, value);
        }
        return buckets;
    }
    let mut start = (lo / unit).floor() * unit;
    // floating point rounding, e.g. lo = 11.95 with unit = 0.01
    if start > lo {
        start = lo;
    }
    for &(value, count) in histogram {
        let bucket_id = ((value - start) / unit).floor() as i64;
        buckets.entry(bucket_id).or_default().update(count, value);
    }
    buckets
}

/// Collapses a tally of sortable-encoded numbers into at most `max_ranges`
/// ranges, plus the bucket of unset documents.
///
/// `total` is the number of documents observed: the documents not
/// accounted for in `tally` are kept under the empty key.
///
/// The bucket width starts at a power of ten sized so that about
/// `max_ranges` buckets span the values, and widens alternately by a
/// factor 2 and 2.5 until few enough buckets are used.
///
/// Returns `Ok(None)` if the tally holds no value, or if all its values are
/// equal. Non finite values are counted as unset. Fails with
/// [`SpyError::DataCorruption`] if the counts of the tally add up past
/// `u64::MAX`.
pub fn build_numeric_ranges(
    total: DocCount,
    tally: &Tally,
    max_ranges: usize,
) -> crate::Result<Option<Tally>> {
    if max_ranges == 0 {
        return Err(SpyError::InvalidArgument(
            "max_ranges must be at least 1".to_string(),
        ));
    }
    let mut histogram: Vec<(f64, DocCount)> = Vec::with_capacity(tally.len());
    let mut total_set: DocCount = 0;
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for (key, &count) in tally {
        if key.is_empty() || count == 0 {
            continue;
        }
        let value = sortable_unserialize(key);
        if !value.is_finite() {
            continue;
        }
        lo = lo.min(value);
        hi = hi.max(value);
        histogram.push((value, count));
        total_set = total_set.checked_add(count).ok_or_else(|| {
            DataCorruption::comment_only(format!(
                "Numeric tally counts overflow past {}",
                total_set
            ))
        })?;
    }
    if total_set == 0 {
        debug!("No numeric value set, not building ranges");
        return Ok(None);
    }
    if lo == hi {
        debug!("All {} values are equal, not building ranges", total_set);
        return Ok(None);
    }

    let size_by = lo.abs().max(hi.abs());
    let mut unit = 10f64.powf(((size_by / max_ranges as f64).log10() - 0.2).floor());
    let mut scale_by_2 = true;
    let buckets = loop {
        let buckets = fill_buckets(&histogram, lo, unit);
        if buckets.len() <= max_ranges {
            break buckets;
        }
        unit *= if scale_by_2 { 2.0 } else { 2.5 };
        scale_by_2 = !scale_by_2;
    };
    debug!(
        "Built {} ranges of width {} over [{}, {}]",
        buckets.len(),
        unit,
        lo,
        hi
    );

    let mut ranges: Tally = buckets
        .values()
        .map(|bucket| (bucket.key(), bucket.count))
        .collect();
    let total_unset = total.saturating_sub(total_set);
    if total_unset > 0 {
        ranges.insert(Vec::new(), total_unset);
    }
    Ok(Some(ranges))
}

/// Decoded key of a tally bucketed by [`build_numeric_ranges`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CategoryKey {
    /// Documents where the slot is not set.
    Unset,
    /// A single value.
    Value(f64),
    /// An inclusive range of values.
    Range(f64, f64),
}

impl CategoryKey {
    /// Decodes a key produced by [`build_numeric_ranges`].
    pub fn parse(key: &[u8]) -> crate::Result<CategoryKey> {
        match key.len() {
            0 => Ok(CategoryKey::Unset),
            SORTABLE_NUM_BYTES => Ok(CategoryKey::Value(sortable_unserialize(key))),
            RANGE_KEY_NUM_BYTES => {
                let (lower, upper) = key.split_at(RANGE_LOWER_BOUND_NUM_BYTES);
                Ok(CategoryKey::Range(
                    sortable_unserialize(lower),
                    sortable_unserialize(upper),
                ))
            }
            num_bytes => Err(DataCorruption::comment_only(format!(
                "A category key is 0, {} or {} bytes long, got {}",
                SORTABLE_NUM_BYTES, RANGE_KEY_NUM_BYTES, num_bytes
            ))
            .into()),
        }
    }
}

/// A [`ValueCountSpy`] whose tallies can be scored and turned into numeric
/// ranges once every result has been merged.
///
/// ```rust
/// use matchspy::common::sortable_serialize;
/// use matchspy::document::MemoryDocument;
/// use matchspy::spy::{CategoryKey, CategorySelectSpy, MatchSpy};
///
/// # fn main() -> matchspy::Result<()> {
/// let mut spy = CategorySelectSpy::for_slot(0);
/// for price in [1.0, 2.0, 2.0, 100.0] {
///     let mut doc = MemoryDocument::new();
///     doc.add_value(0, sortable_serialize(price).to_vec());
///     spy.observe(&doc, 1.0);
/// }
/// assert!(spy.build_numeric_ranges(0, 2)?);
/// let ranges = spy
///     .values(0)
///     .unwrap()
///     .iter()
///     .map(|(key, &count)| CategoryKey::parse(key).map(|category| (category, count)))
///     .collect::<matchspy::Result<Vec<_>>>()?;
/// assert_eq!(
///     ranges,
///     vec![
///         (CategoryKey::Range(1.0, 2.0), 3),
///         (CategoryKey::Value(100.0), 1),
///     ]
/// );
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct CategorySelectSpy {
    value_count: ValueCountSpy,
}

impl From<ValueCountSpy> for CategorySelectSpy {
    fn from(value_count: ValueCountSpy) -> CategorySelectSpy {
        CategorySelectSpy { value_count }
    }
}

impl CategorySelectSpy {
    /// Name under which the spy is known to a [`SpyRegistry`].
    pub const NAME: &'static str = "CategorySelectSpy";

    /// Creates a spy watching no slot.
    pub fn new() -> CategorySelectSpy {
        CategorySelectSpy::default()
    }

    /// Creates a spy watching a single-valued slot.
    pub fn for_slot(slot: ValueSlot) -> CategorySelectSpy {
        CategorySelectSpy::from(ValueCountSpy::for_slot(slot))
    }

    /// See [`ValueCountSpy::add_slot`].
    pub fn add_slot(&mut self, slot: ValueSlot, multi_valued: bool) {
        self.value_count.add_slot(slot, multi_valued);
    }

    /// The underlying value counts.
    pub fn value_count(&self) -> &ValueCountSpy {
        &self.value_count
    }

    /// Number of documents observed, including those merged from peers.
    pub fn total(&self) -> DocCount {
        self.value_count.total()
    }

    /// The tally of `slot`, or `None` if the slot is not watched.
    pub fn values(&self, slot: ValueSlot) -> Option<&Tally> {
        self.value_count.values(slot)
    }

    /// Returns the `max_values` most frequent values of `slot`.
    pub fn top_values(&self, slot: ValueSlot, max_values: usize) -> Vec<StringAndFrequency> {
        self.value_count.top_values(slot, max_values)
    }

    /// Scores the current categories of `slot`. See [`score_categorisation`].
    ///
    /// An unwatched slot is scored as if no document had it set.
    pub fn score_categorisation(&self, slot: ValueSlot, desired_num_categories: f64) -> f64 {
        let total = self.total();
        match self.values(slot) {
            Some(tally) => score_categorisation(total, tally, desired_num_categories),
            None => score_categorisation(total, &Tally::new(), desired_num_categories),
        }
    }

    /// Replaces the tally of `slot` by at most `max_ranges` ranges. See
    /// [`build_numeric_ranges`].
    ///
    /// Returns `Ok(false)`, leaving the tally untouched, if no range could
    /// be built. The tally must not have been bucketed already.
    pub fn build_numeric_ranges(
        &mut self,
        slot: ValueSlot,
        max_ranges: usize,
    ) -> crate::Result<bool> {
        let total = self.total();
        let tally = self.value_count.values_mut(slot).ok_or_else(|| {
            SpyError::InvalidArgument(format!("Value slot {} is not watched", slot))
        })?;
        match build_numeric_ranges(total, tally, max_ranges)? {
            Some(ranges) => {
                *tally = ranges;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl MatchSpy for CategorySelectSpy {
    fn observe(&mut self, doc: &dyn Document, weight: Weight) {
        self.value_count.observe(doc, weight);
    }

    fn box_clone(&self) -> crate::Result<Box<dyn MatchSpy>> {
        Ok(Box::new(CategorySelectSpy::from(
            self.value_count.clone_config(),
        )))
    }

    fn name(&self) -> crate::Result<&str> {
        Ok(Self::NAME)
    }

    fn serialize_config(&self) -> crate::Result<Vec<u8>> {
        self.value_count.serialize_config()
    }

    fn reconstruct(
        &self,
        config: &[u8],
        _registry: &SpyRegistry,
    ) -> crate::Result<Box<dyn MatchSpy>> {
        debug!("{}::reconstruct ({} bytes)", Self::NAME, config.len());
        let value_count = ValueCountSpy::from_config(config)?;
        Ok(Box::new(CategorySelectSpy::from(value_count)))
    }

    fn serialize_results(&self) -> crate::Result<Vec<u8>> {
        self.value_count.serialize_results()
    }

    fn merge_results(&mut self, payload: &[u8]) -> crate::Result<()> {
        self.value_count.merge_results(payload)
    }

    fn description(&self) -> String {
        format!("{}({})", Self::NAME, self.value_count.description())
    }
}
