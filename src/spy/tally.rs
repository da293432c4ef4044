//! Wire encoding of tallies, shared by every counting spy.
//!
//! A tally is written as its number of entries followed by one
//! `(key length, key bytes, count)` triple per entry, every integer being
//! a [`VInt`](common::VInt).

use std::collections::BTreeMap;
use std::io;

use common::{serialize_vint_u64, BinarySerializable, VInt};

use super::string_list::read_length_prefixed;
use super::Tally;
use crate::{DataCorruption, DocCount, SpyError};

/// Entries decoded from a payload, borrowing their keys from it.
pub(crate) type TallyEntries<'a> = Vec<(&'a [u8], DocCount)>;

/// Counts a tally will hold once a payload is merged, for the keys the
/// payload touches.
pub(crate) type StagedCounts<'a> = BTreeMap<&'a [u8], DocCount>;

// Bounds the capacity reserved from an entry count read on the wire.
const MAX_PREALLOCATED_ENTRIES: usize = 1_024;

pub(crate) fn add_to_tally(tally: &mut Tally, key: &[u8], count: DocCount) {
    if let Some(existing) = tally.get_mut(key) {
        *existing = existing.saturating_add(count);
    } else {
        tally.insert(key.to_vec(), count);
    }
}

pub(crate) fn checked_count_add(left: DocCount, right: DocCount) -> io::Result<DocCount> {
    left.checked_add(right).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Count overflow adding {} to {}", right, left),
        )
    })
}

pub(crate) fn serialize_tally(tally: &Tally, output: &mut Vec<u8>) {
    serialize_vint_u64(tally.len() as u64, output);
    for (key, &count) in tally {
        serialize_vint_u64(key.len() as u64, output);
        output.extend_from_slice(key);
        serialize_vint_u64(count, output);
    }
}

pub(crate) fn deserialize_tally<'a>(cursor: &mut &'a [u8]) -> io::Result<TallyEntries<'a>> {
    let num_entries = read_vint(cursor)?;
    let mut entries = Vec::with_capacity((num_entries as usize).min(MAX_PREALLOCATED_ENTRIES));
    for _ in 0..num_entries {
        let key = read_length_prefixed(cursor)?;
        let count = read_vint(cursor)?;
        entries.push((key, count));
    }
    Ok(entries)
}

/// Adds `entries` on top of `tally` into `staged`, without touching
/// `tally`. Fails if any count overflows.
pub(crate) fn stage_tally<'a>(
    staged: &mut StagedCounts<'a>,
    tally: Option<&Tally>,
    entries: TallyEntries<'a>,
) -> io::Result<()> {
    for (key, count) in entries {
        let current = match staged.get(key) {
            Some(&current) => current,
            None => tally.and_then(|tally| tally.get(key)).copied().unwrap_or(0),
        };
        staged.insert(key, checked_count_add(current, count)?);
    }
    Ok(())
}

pub(crate) fn commit_tally(tally: &mut Tally, staged: StagedCounts<'_>) {
    for (key, count) in staged {
        if let Some(existing) = tally.get_mut(key) {
            *existing = count;
        } else {
            tally.insert(key.to_vec(), count);
        }
    }
}

pub(crate) fn read_vint(cursor: &mut &[u8]) -> io::Result<u64> {
    VInt::deserialize_u64(cursor)
}

/// Wraps a decoding error into a [`SpyError::DataCorruption`] naming the spy.
pub(crate) fn corrupted(spy_name: &'static str) -> impl Fn(io::Error) -> SpyError {
    move |io_error| DataCorruption::new(spy_name, io_error.to_string()).into()
}

#[cfg(test)]
mod tests {
    use maplit::btreemap;

    use super::{
        add_to_tally, commit_tally, deserialize_tally, serialize_tally, stage_tally,
        StagedCounts,
    };
    use crate::spy::Tally;

    #[test]
    fn test_tally_encoding() {
        let tally: Tally = btreemap! {
            b"ab".to_vec() => 3,
            b"c".to_vec() => 200,
        };
        let mut buffer = Vec::new();
        serialize_tally(&tally, &mut buffer);
        assert_eq!(
            buffer,
            vec![130, 130, b'a', b'b', 131, 129, b'c', 72, 129]
        );
        let mut cursor = &buffer[..];
        let entries = deserialize_tally(&mut cursor).unwrap();
        assert!(cursor.is_empty());
        assert_eq!(entries, vec![(&b"ab"[..], 3), (&b"c"[..], 200)]);
    }

    #[test]
    fn test_staged_tally_adds_counts() {
        let mut tally: Tally = btreemap! { b"a".to_vec() => 1 };
        let mut staged = StagedCounts::new();
        stage_tally(
            &mut staged,
            Some(&tally),
            vec![(&b"a"[..], 2), (&b"b"[..], 5), (&b"a"[..], 1)],
        )
        .unwrap();
        assert_eq!(tally, btreemap! { b"a".to_vec() => 1 });
        commit_tally(&mut tally, staged);
        add_to_tally(&mut tally, b"b", 1);
        assert_eq!(
            tally,
            btreemap! { b"a".to_vec() => 4, b"b".to_vec() => 6 }
        );
    }

    #[test]
    fn test_staged_tally_overflow() {
        let tally: Tally = btreemap! { b"a".to_vec() => 1 };
        let mut staged = StagedCounts::new();
        assert!(stage_tally(&mut staged, Some(&tally), vec![(&b"a"[..], u64::MAX)]).is_err());
        // the overflow can also come from a key repeated in the payload
        let mut staged = StagedCounts::new();
        let entries = vec![(&b"b"[..], u64::MAX), (&b"b"[..], 1)];
        assert!(stage_tally(&mut staged, Some(&tally), entries).is_err());
    }

    #[test]
    fn test_add_to_tally_saturates() {
        let mut tally: Tally = btreemap! { b"a".to_vec() => u64::MAX };
        add_to_tally(&mut tally, b"a", 1);
        assert_eq!(tally, btreemap! { b"a".to_vec() => u64::MAX });
    }

    #[test]
    fn test_deserialize_truncated_tally() {
        let tally: Tally = btreemap! { b"abc".to_vec() => 1 };
        let mut buffer = Vec::new();
        serialize_tally(&tally, &mut buffer);
        for len in 0..buffer.len() {
            let mut cursor = &buffer[..len];
            assert!(deserialize_tally(&mut cursor).is_err());
        }
    }
}
