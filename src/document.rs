//! Documents as seen by the match spies.
//!
//! The query engine owns the real documents. Spies only need two things
//! from them, captured by the [`Document`] trait: the stored value at a
//! slot, and the sorted term list starting from a given prefix.
//!
//! [`MemoryDocument`] is a plain in-memory implementation.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;

use crate::spy::StringListSerializer;
use crate::{SpyError, TermFreq, TermPos, ValueSlot};

/// Accessor over one matched document.
pub trait Document {
    /// Returns the value stored at `slot`, or an empty byte string if the
    /// slot is not set.
    fn value(&self, slot: ValueSlot) -> Cow<'_, [u8]>;

    /// Returns the terms of the document that are greater or equal to
    /// `lower_bound`, in increasing byte order, together with their
    /// within-document frequency.
    fn terms_from<'a>(
        &'a self,
        lower_bound: &[u8],
    ) -> Box<dyn Iterator<Item = (&'a [u8], TermFreq)> + 'a>;
}

/// A term of a [`MemoryDocument`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DocumentTerm {
    wdf: TermFreq,
    // sorted, no duplicates
    positions: Vec<TermPos>,
}

impl DocumentTerm {
    /// Within-document frequency.
    pub fn wdf(&self) -> TermFreq {
        self.wdf
    }

    /// Positions at which the term occurs, in increasing order.
    pub fn positions(&self) -> &[TermPos] {
        &self.positions
    }

    fn add_position(&mut self, pos: TermPos) {
        if let Err(insert_at) = self.positions.binary_search(&pos) {
            self.positions.insert(insert_at, pos);
        }
    }

    fn remove_position(&mut self, pos: TermPos) -> bool {
        match self.positions.binary_search(&pos) {
            Ok(idx) => {
                self.positions.remove(idx);
                true
            }
            Err(_) => false,
        }
    }
}

/// Document held entirely in memory.
///
/// ```rust
/// use matchspy::document::{Document, MemoryDocument};
///
/// # fn main() -> matchspy::Result<()> {
/// let mut doc = MemoryDocument::new();
/// doc.add_value(3, b"blue".to_vec());
/// doc.add_posting("XCOLORblue", 1, 1)?;
/// doc.add_term("hello", 2)?;
///
/// assert_eq!(&doc.value(3)[..], b"blue");
/// assert!(doc.value(4).is_empty());
/// let terms: Vec<&[u8]> = doc.terms_from(b"X").map(|(term, _)| term).collect();
/// assert_eq!(terms, vec![&b"XCOLORblue"[..], &b"hello"[..]]);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryDocument {
    data: Vec<u8>,
    values: BTreeMap<ValueSlot, Vec<u8>>,
    terms: BTreeMap<Vec<u8>, DocumentTerm>,
}

fn check_term_name(term: &[u8]) -> crate::Result<()> {
    if term.is_empty() {
        return Err(SpyError::InvalidArgument(
            "Empty termnames aren't allowed.".to_string(),
        ));
    }
    Ok(())
}

fn missing_term(term: &[u8]) -> SpyError {
    SpyError::InvalidArgument(format!(
        "Term `{}` is not present in document",
        String::from_utf8_lossy(term)
    ))
}

impl MemoryDocument {
    /// Creates an empty document.
    pub fn new() -> MemoryDocument {
        MemoryDocument::default()
    }

    /// Opaque data attached to the document.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Replaces the opaque data attached to the document.
    pub fn set_data(&mut self, data: Vec<u8>) {
        self.data = data;
    }

    /// Sets the value stored at `slot`.
    ///
    /// Storing an empty value is the same as removing it: an empty value
    /// means "not set".
    pub fn add_value(&mut self, slot: ValueSlot, value: Vec<u8>) {
        if value.is_empty() {
            self.values.remove(&slot);
        } else {
            self.values.insert(slot, value);
        }
    }

    /// Stores a list of values at `slot`, encoded with
    /// [`StringListSerializer`].
    pub fn add_multi_value<I>(&mut self, slot: ValueSlot, items: I)
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let serializer: StringListSerializer = items.into_iter().collect();
        self.add_value(slot, serializer.into_bytes());
    }

    /// Removes the value stored at `slot`.
    ///
    /// Fails if the slot holds no value.
    pub fn remove_value(&mut self, slot: ValueSlot) -> crate::Result<()> {
        self.values.remove(&slot).map(|_| ()).ok_or_else(|| {
            SpyError::InvalidArgument(format!("Value slot {} is not set in document", slot))
        })
    }

    /// Removes every value.
    pub fn clear_values(&mut self) {
        self.values.clear();
    }

    /// Number of slots holding a value.
    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    /// Iterates over the `(slot, value)` pairs, by increasing slot.
    pub fn values(&self) -> impl Iterator<Item = (ValueSlot, &[u8])> + '_ {
        self.values
            .iter()
            .map(|(slot, value)| (*slot, value.as_slice()))
    }

    /// Adds an occurrence of `term` at position `pos`, increasing its
    /// within-document frequency by `wdf_inc`.
    pub fn add_posting(
        &mut self,
        term: impl AsRef<[u8]>,
        pos: TermPos,
        wdf_inc: TermFreq,
    ) -> crate::Result<()> {
        let term = term.as_ref();
        check_term_name(term)?;
        let doc_term = self.terms.entry(term.to_vec()).or_default();
        doc_term.add_position(pos);
        doc_term.wdf += wdf_inc;
        Ok(())
    }

    /// Adds `term` without positional information, increasing its
    /// within-document frequency by `wdf_inc`.
    pub fn add_term(&mut self, term: impl AsRef<[u8]>, wdf_inc: TermFreq) -> crate::Result<()> {
        let term = term.as_ref();
        check_term_name(term)?;
        self.terms.entry(term.to_vec()).or_default().wdf += wdf_inc;
        Ok(())
    }

    /// Removes the occurrence of `term` at `pos`, decreasing its
    /// within-document frequency by `wdf_dec`.
    ///
    /// The term itself stays in the document, even without any position left.
    pub fn remove_posting(
        &mut self,
        term: impl AsRef<[u8]>,
        pos: TermPos,
        wdf_dec: TermFreq,
    ) -> crate::Result<()> {
        let term = term.as_ref();
        check_term_name(term)?;
        let doc_term = self.terms.get_mut(term).ok_or_else(|| missing_term(term))?;
        if !doc_term.remove_position(pos) {
            return Err(SpyError::InvalidArgument(format!(
                "Position `{}` not in list, can't remove",
                pos
            )));
        }
        doc_term.wdf = doc_term.wdf.saturating_sub(wdf_dec);
        Ok(())
    }

    /// Removes `term` and all of its positions.
    pub fn remove_term(&mut self, term: impl AsRef<[u8]>) -> crate::Result<()> {
        let term = term.as_ref();
        self.terms
            .remove(term)
            .map(|_| ())
            .ok_or_else(|| missing_term(term))
    }

    /// Removes every term.
    pub fn clear_terms(&mut self) {
        self.terms.clear();
    }

    /// Number of distinct terms.
    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// Returns the term entry for `term`, if present.
    pub fn term(&self, term: impl AsRef<[u8]>) -> Option<&DocumentTerm> {
        self.terms.get(term.as_ref())
    }

    /// Iterates over the terms in increasing byte order.
    pub fn terms(&self) -> impl Iterator<Item = (&[u8], &DocumentTerm)> + '_ {
        self.terms
            .iter()
            .map(|(term, doc_term)| (term.as_slice(), doc_term))
    }
}

impl Document for MemoryDocument {
    fn value(&self, slot: ValueSlot) -> Cow<'_, [u8]> {
        match self.values.get(&slot) {
            Some(value) => Cow::Borrowed(value.as_slice()),
            None => Cow::Borrowed(&[]),
        }
    }

    fn terms_from<'a>(
        &'a self,
        lower_bound: &[u8],
    ) -> Box<dyn Iterator<Item = (&'a [u8], TermFreq)> + 'a> {
        let range = self
            .terms
            .range::<[u8], _>((Bound::Included(lower_bound), Bound::Unbounded));
        Box::new(range.map(|(term, doc_term)| (term.as_slice(), doc_term.wdf)))
    }
}

impl fmt::Display for MemoryDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MemoryDocument(data={:?}, {} values, {} terms)",
            String::from_utf8_lossy(&self.data),
            self.values.len(),
            self.terms.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{Document, MemoryDocument};
    use crate::spy::StringListIterator;
    use crate::SpyError;

    #[test]
    fn test_value_unset_is_empty() {
        let mut doc = MemoryDocument::new();
        assert!(doc.value(0).is_empty());
        doc.add_value(0, b"a".to_vec());
        assert_eq!(&doc.value(0)[..], b"a");
        doc.add_value(0, Vec::new());
        assert!(doc.value(0).is_empty());
        assert_eq!(doc.value_count(), 0);
    }

    #[test]
    fn test_remove_missing_value() {
        let mut doc = MemoryDocument::new();
        assert!(matches!(
            doc.remove_value(2),
            Err(SpyError::InvalidArgument(_))
        ));
        doc.add_value(2, b"x".to_vec());
        assert!(doc.remove_value(2).is_ok());
        assert!(doc.value(2).is_empty());
    }

    #[test]
    fn test_multi_value() {
        let mut doc = MemoryDocument::new();
        doc.add_multi_value(1, ["red", "", "blue"]);
        let value = doc.value(1);
        let items: Vec<&[u8]> = StringListIterator::new(&value)
            .collect::<crate::Result<_>>()
            .unwrap();
        assert_eq!(items, vec![&b"red"[..], &b""[..], &b"blue"[..]]);
    }

    #[test]
    fn test_postings() -> crate::Result<()> {
        let mut doc = MemoryDocument::new();
        doc.add_posting("foo", 3, 1)?;
        doc.add_posting("foo", 1, 1)?;
        doc.add_posting("foo", 3, 1)?;
        let term = doc.term("foo").unwrap();
        assert_eq!(term.wdf(), 3);
        assert_eq!(term.positions(), &[1, 3]);
        doc.remove_posting("foo", 3, 1)?;
        assert_eq!(doc.term("foo").unwrap().positions(), &[1]);
        assert!(doc.remove_posting("foo", 3, 1).is_err());
        assert!(doc.remove_posting("bar", 1, 1).is_err());
        Ok(())
    }

    #[test]
    fn test_empty_term_rejected() {
        let mut doc = MemoryDocument::new();
        assert!(matches!(
            doc.add_term("", 1),
            Err(SpyError::InvalidArgument(_))
        ));
        assert!(doc.add_posting("", 0, 1).is_err());
    }

    #[test]
    fn test_remove_term() -> crate::Result<()> {
        let mut doc = MemoryDocument::new();
        doc.add_term("foo", 1)?;
        doc.remove_term("foo")?;
        assert_eq!(doc.term_count(), 0);
        assert!(doc.remove_term("foo").is_err());
        Ok(())
    }

    #[test]
    fn test_terms_from() -> crate::Result<()> {
        let mut doc = MemoryDocument::new();
        for term in ["XYZa", "ABC", "XYZfoo", "XY", "Z"] {
            doc.add_term(term, 1)?;
        }
        let terms: Vec<&[u8]> = doc.terms_from(b"XYZ").map(|(term, _)| term).collect();
        assert_eq!(terms, vec![&b"XYZa"[..], &b"XYZfoo"[..], &b"Z"[..]]);
        Ok(())
    }

    #[test]
    fn test_display() -> crate::Result<()> {
        let mut doc = MemoryDocument::new();
        doc.set_data(b"hello".to_vec());
        doc.add_value(0, b"v".to_vec());
        doc.add_term("t", 1)?;
        assert_eq!(
            doc.to_string(),
            "MemoryDocument(data=\"hello\", 1 values, 1 terms)"
        );
        Ok(())
    }
}
