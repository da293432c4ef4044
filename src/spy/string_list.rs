use std::io;

use common::{serialize_vint_u64, BinarySerializable, VInt};

/// Builds the length-prefixed encoding of a list of byte strings.
///
/// Each item is written as its length, encoded as a [`VInt`], followed by
/// its raw bytes. The encoding of an empty list is the empty byte string.
///
/// ```rust
/// use matchspy::spy::{StringListIterator, StringListSerializer};
///
/// let serialized: StringListSerializer = ["red", "green"].iter().collect();
/// let bytes = serialized.into_bytes();
/// let items: Vec<&[u8]> = StringListIterator::new(&bytes)
///     .collect::<matchspy::Result<_>>()
///     .unwrap();
/// assert_eq!(items, vec![&b"red"[..], &b"green"[..]]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StringListSerializer {
    buffer: Vec<u8>,
}

impl StringListSerializer {
    /// Appends one item to the list.
    pub fn append(&mut self, value: &[u8]) {
        serialize_vint_u64(value.len() as u64, &mut self.buffer);
        self.buffer.extend_from_slice(value);
    }

    /// The encoding of the items appended so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the serializer and returns the encoding.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

impl<T: AsRef<[u8]>> FromIterator<T> for StringListSerializer {
    fn from_iter<I: IntoIterator<Item = T>>(items: I) -> StringListSerializer {
        let mut serializer = StringListSerializer::default();
        for item in items {
            serializer.append(item.as_ref());
        }
        serializer
    }
}

/// Reads back a list written by [`StringListSerializer`].
///
/// Items borrow from the encoded buffer. A truncated or malformed
/// encoding yields one error, after which the iterator is exhausted.
#[derive(Clone, Debug)]
pub struct StringListIterator<'a> {
    remaining: &'a [u8],
    failed: bool,
}

impl<'a> StringListIterator<'a> {
    /// Creates an iterator over the items of `serialized`.
    pub fn new(serialized: &'a [u8]) -> StringListIterator<'a> {
        StringListIterator {
            remaining: serialized,
            failed: false,
        }
    }
}

impl<'a> Iterator for StringListIterator<'a> {
    type Item = crate::Result<&'a [u8]>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining.is_empty() {
            return None;
        }
        match read_length_prefixed(&mut self.remaining) {
            Ok(item) => Some(Ok(item)),
            Err(io_error) => {
                self.failed = true;
                Some(Err(io_error.into()))
            }
        }
    }
}

/// Reads a `(VInt length, raw bytes)` pair from the front of `cursor`
/// without copying the bytes.
pub(crate) fn read_length_prefixed<'a>(cursor: &mut &'a [u8]) -> io::Result<&'a [u8]> {
    let num_bytes = VInt::deserialize(cursor)?.val();
    if (cursor.len() as u64) < num_bytes {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "Item announced {} bytes, only {} available",
                num_bytes,
                cursor.len()
            ),
        ));
    }
    let remaining: &'a [u8] = *cursor;
    let (item, rest) = remaining.split_at(num_bytes as usize);
    *cursor = rest;
    Ok(item)
}
