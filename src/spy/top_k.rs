use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;

use serde::{Serialize, Serializer};

use super::Tally;
use crate::DocCount;

/// A key of a [`Tally`] together with its count.
///
/// Ordering follows display order: highest frequency first, and on equal
/// frequency, the smallest value first. Sorting a `Vec<StringAndFrequency>`
/// therefore yields the most frequent items first, deterministically.
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
pub struct StringAndFrequency {
    #[serde(serialize_with = "serialize_lossy")]
    value: Vec<u8>,
    frequency: DocCount,
}

fn serialize_lossy<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(value))
}

impl StringAndFrequency {
    /// Creates a new pair.
    pub fn new(value: Vec<u8>, frequency: DocCount) -> StringAndFrequency {
        StringAndFrequency { value, frequency }
    }

    /// The tallied key.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// The key as text, if it is valid UTF-8.
    pub fn value_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.value).ok()
    }

    /// Number of occurrences of the key.
    pub fn frequency(&self) -> DocCount {
        self.frequency
    }

    /// Returns true iff `(frequency, value)` ranks strictly before `self`.
    fn is_outranked_by(&self, frequency: DocCount, value: &[u8]) -> bool {
        self.frequency
            .cmp(&frequency)
            .then_with(|| value.cmp(&self.value))
            == Ordering::Less
    }
}

impl fmt::Debug for StringAndFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:?}, {})",
            String::from_utf8_lossy(&self.value),
            self.frequency
        )
    }
}

impl PartialOrd for StringAndFrequency {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StringAndFrequency {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .frequency
            .cmp(&self.frequency)
            .then_with(|| self.value.cmp(&other.value))
    }
}

/// Returns the `max_items` most frequent items of `items`, most frequent
/// first, ties broken by increasing value.
///
/// Items are first gathered in a plain vector. Only when that vector
/// would hold more than `max_items` is it turned into a binary heap, which
/// then evicts the worst item on every insertion.
pub fn get_most_frequent_items(items: &Tally, max_items: usize) -> Vec<StringAndFrequency> {
    // Rust heap is a max-heap: the worst item sits at the top.
    let mut heap: Option<BinaryHeap<StringAndFrequency>> = None;
    let mut result: Vec<StringAndFrequency> = Vec::with_capacity(max_items.min(items.len()) + 1);

    for (value, &frequency) in items {
        if let Some(heap) = heap.as_mut() {
            if let Some(mut worst) = heap.peek_mut() {
                if worst.is_outranked_by(frequency, value) {
                    *worst = StringAndFrequency::new(value.clone(), frequency);
                }
                // the heap gets reconstructed when `worst` is dropped.
            }
            continue;
        }
        result.push(StringAndFrequency::new(value.clone(), frequency));
        if result.len() > max_items {
            let mut new_heap = BinaryHeap::from(std::mem::take(&mut result));
            new_heap.pop();
            heap = Some(new_heap);
        }
    }

    match heap {
        Some(heap) => heap.into_sorted_vec(),
        None => {
            result.sort();
            result
        }
    }
}
