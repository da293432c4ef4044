use std::collections::BTreeMap;

use common::{serialize_bytes, serialize_vint_u64};

use super::string_list::read_length_prefixed;
use super::tally::{
    add_to_tally, checked_count_add, commit_tally, corrupted, deserialize_tally, read_vint,
    serialize_tally, stage_tally, StagedCounts, TallyEntries,
};
use super::{get_most_frequent_items, MatchSpy, SpyRegistry, StringAndFrequency, Tally};
use crate::document::Document;
use crate::{DocCount, Weight};

/// Counts the terms of the matching documents that start with one of the
/// watched prefixes.
///
/// The tally of a prefix is keyed by the remainder of the term once the
/// prefix is stripped. Terms equal to the prefix are ignored, and so are
/// terms whose first character after the prefix is an ASCII uppercase
/// letter: such terms are reserved for internal use (e.g. `XCOLORred`
/// under the prefix `X`) and do not make meaningful facets.
///
/// ```rust
/// use matchspy::document::MemoryDocument;
/// use matchspy::spy::{MatchSpy, TermCountSpy};
///
/// # fn main() -> matchspy::Result<()> {
/// let mut spy = TermCountSpy::for_prefix("XYZ");
/// let mut doc = MemoryDocument::new();
/// doc.add_term("XYZfoo", 1)?;
/// doc.add_term("XYZAoo", 1)?;
/// spy.observe(&doc, 1.0);
///
/// let top = spy.top_terms("XYZ", 10);
/// assert_eq!(top.len(), 1);
/// assert_eq!(top[0].value(), b"foo");
/// assert_eq!(spy.terms_seen(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct TermCountSpy {
    documents_seen: DocCount,
    terms_seen: DocCount,
    prefixes: BTreeMap<Vec<u8>, Tally>,
}

struct TermCountResults<'a> {
    documents_seen: DocCount,
    terms_seen: DocCount,
    prefixes: Vec<(&'a [u8], TallyEntries<'a>)>,
}

struct StagedTermCounts<'a> {
    documents_seen: DocCount,
    terms_seen: DocCount,
    prefixes: BTreeMap<&'a [u8], StagedCounts<'a>>,
}

impl TermCountResults<'_> {
    fn decode(mut cursor: &[u8]) -> std::io::Result<TermCountResults<'_>> {
        let documents_seen = read_vint(&mut cursor)?;
        let terms_seen = read_vint(&mut cursor)?;
        let mut prefixes = Vec::new();
        while !cursor.is_empty() {
            let prefix = read_length_prefixed(&mut cursor)?;
            let entries = deserialize_tally(&mut cursor)?;
            prefixes.push((prefix, entries));
        }
        Ok(TermCountResults {
            documents_seen,
            terms_seen,
            prefixes,
        })
    }
}

/// Returns the part of `term` to tally under `prefix`, if any.
fn facet_suffix<'a>(term: &'a [u8], prefix: &[u8]) -> Option<&'a [u8]> {
    let suffix = term.strip_prefix(prefix)?;
    match suffix.first() {
        Some(first_char) if !first_char.is_ascii_uppercase() => Some(suffix),
        _ => None,
    }
}

impl TermCountSpy {
    /// Name under which the spy is known to a [`SpyRegistry`].
    pub const NAME: &'static str = "TermCountSpy";

    /// Creates a spy watching no prefix.
    pub fn new() -> TermCountSpy {
        TermCountSpy::default()
    }

    /// Creates a spy watching a single prefix.
    pub fn for_prefix(prefix: impl AsRef<[u8]>) -> TermCountSpy {
        let mut spy = TermCountSpy::default();
        spy.add_prefix(prefix);
        spy
    }

    /// Builds a spy from the output of
    /// [`serialize_config`](MatchSpy::serialize_config).
    pub fn from_config(config: &[u8]) -> crate::Result<TermCountSpy> {
        let mut cursor = config;
        let mut spy = TermCountSpy::default();
        while !cursor.is_empty() {
            let prefix = read_length_prefixed(&mut cursor).map_err(corrupted(Self::NAME))?;
            spy.add_prefix(prefix);
        }
        Ok(spy)
    }

    /// Watches the terms starting with `prefix`. Adding a prefix twice has
    /// no effect.
    pub fn add_prefix(&mut self, prefix: impl AsRef<[u8]>) {
        let prefix = prefix.as_ref();
        if !self.prefixes.contains_key(prefix) {
            self.prefixes.insert(prefix.to_vec(), Tally::new());
        }
    }

    /// Returns a spy with the same configuration and empty results.
    pub fn clone_config(&self) -> TermCountSpy {
        let mut spy = TermCountSpy::default();
        for prefix in self.prefixes.keys() {
            spy.add_prefix(prefix);
        }
        spy
    }

    /// Number of documents observed, including those merged from peers.
    pub fn documents_seen(&self) -> DocCount {
        self.documents_seen
    }

    /// Number of term occurrences tallied, over all prefixes.
    pub fn terms_seen(&self) -> DocCount {
        self.terms_seen
    }

    /// Watched prefixes, in increasing byte order.
    pub fn prefixes(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.prefixes.keys().map(Vec::as_slice)
    }

    /// The tally of `prefix`, keyed by term suffix, or `None` if the
    /// prefix is not watched.
    pub fn terms(&self, prefix: impl AsRef<[u8]>) -> Option<&Tally> {
        self.prefixes.get(prefix.as_ref())
    }

    /// Returns the `max_terms` most frequent suffixes of `prefix`.
    ///
    /// See [`get_most_frequent_items`] for the ordering.
    pub fn top_terms(&self, prefix: impl AsRef<[u8]>, max_terms: usize) -> Vec<StringAndFrequency> {
        match self.terms(prefix) {
            Some(tally) => get_most_frequent_items(tally, max_terms),
            None => Vec::new(),
        }
    }

    fn stage<'a>(&self, results: TermCountResults<'a>) -> std::io::Result<StagedTermCounts<'a>> {
        let documents_seen = checked_count_add(self.documents_seen, results.documents_seen)?;
        let terms_seen = checked_count_add(self.terms_seen, results.terms_seen)?;
        let mut prefixes: BTreeMap<&'a [u8], StagedCounts<'a>> = BTreeMap::new();
        for (prefix, entries) in results.prefixes {
            stage_tally(prefixes.entry(prefix).or_default(), self.terms(prefix), entries)?;
        }
        Ok(StagedTermCounts {
            documents_seen,
            terms_seen,
            prefixes,
        })
    }

    fn commit(&mut self, staged: StagedTermCounts<'_>) {
        self.documents_seen = staged.documents_seen;
        self.terms_seen = staged.terms_seen;
        for (prefix, counts) in staged.prefixes {
            self.add_prefix(prefix);
            if let Some(tally) = self.prefixes.get_mut(prefix) {
                commit_tally(tally, counts);
            }
        }
    }
}

impl MatchSpy for TermCountSpy {
    fn observe(&mut self, doc: &dyn Document, _weight: Weight) {
        self.documents_seen = self.documents_seen.saturating_add(1);
        for (prefix, tally) in self.prefixes.iter_mut() {
            for (term, _wdf) in doc.terms_from(prefix) {
                if !term.starts_with(prefix) {
                    break;
                }
                if let Some(suffix) = facet_suffix(term, prefix) {
                    add_to_tally(tally, suffix, 1);
                    self.terms_seen = self.terms_seen.saturating_add(1);
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
        for prefix in self.prefixes.keys() {
            serialize_bytes(prefix, &mut config)?;
        }
        Ok(config)
    }

    fn reconstruct(
        &self,
        config: &[u8],
        _registry: &SpyRegistry,
    ) -> crate::Result<Box<dyn MatchSpy>> {
        debug!("{}::reconstruct ({} bytes)", Self::NAME, config.len());
        Ok(Box::new(TermCountSpy::from_config(config)?))
    }

    fn serialize_results(&self) -> crate::Result<Vec<u8>> {
        let mut results = Vec::new();
        serialize_vint_u64(self.documents_seen, &mut results);
        serialize_vint_u64(self.terms_seen, &mut results);
        for (prefix, tally) in &self.prefixes {
            serialize_bytes(prefix, &mut results)?;
            serialize_tally(tally, &mut results);
        }
        Ok(results)
    }

    fn merge_results(&mut self, payload: &[u8]) -> crate::Result<()> {
        debug!("{}::merge_results ({} bytes)", Self::NAME, payload.len());
        let staged = TermCountResults::decode(payload)
            .and_then(|results| self.stage(results))
            .map_err(corrupted(Self::NAME))?;
        self.commit(staged);
        Ok(())
    }

    fn description(&self) -> String {
        format!(
            "{}({} docs seen, {} terms seen, looking in {} prefixes)",
            Self::NAME,
            self.documents_seen,
            self.terms_seen,
            self.prefixes.len()
        )
    }
}
