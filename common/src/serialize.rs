use std::io;
use std::io::{Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};

use crate::VInt;

/// Upper bound on the capacity reserved from a decoded length.
///
/// Lengths come from the wire and cannot be trusted before the
/// corresponding bytes have actually been read.
const MAX_PREALLOCATED_ITEMS: usize = 4_096;

pub trait BinarySerializable: Sized {
    fn serialize<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()>;
    fn deserialize<R: Read>(reader: &mut R) -> io::Result<Self>;
}

impl BinarySerializable for () {
    fn serialize<W: Write + ?Sized>(&self, _: &mut W) -> io::Result<()> {
        Ok(())
    }
    fn deserialize<R: Read>(_: &mut R) -> io::Result<Self> {
        Ok(())
    }
}

impl<T: BinarySerializable> BinarySerializable for Vec<T> {
    fn serialize<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        VInt(self.len() as u64).serialize(writer)?;
        for it in self {
            it.serialize(writer)?;
        }
        Ok(())
    }
    fn deserialize<R: Read>(reader: &mut R) -> io::Result<Vec<T>> {
        let num_items = VInt::deserialize(reader)?.val();
        let capacity = (num_items as usize).min(MAX_PREALLOCATED_ITEMS);
        let mut items: Vec<T> = Vec::with_capacity(capacity);
        for _ in 0..num_items {
            let item = T::deserialize(reader)?;
            items.push(item);
        }
        Ok(items)
    }
}

impl<Left: BinarySerializable, Right: BinarySerializable> BinarySerializable for (Left, Right) {
    fn serialize<W: Write + ?Sized>(&self, write: &mut W) -> io::Result<()> {
        self.0.serialize(write)?;
        self.1.serialize(write)
    }
    fn deserialize<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok((Left::deserialize(reader)?, Right::deserialize(reader)?))
    }
}

impl BinarySerializable for u8 {
    fn serialize<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u8(*self)
    }
    fn deserialize<R: Read>(reader: &mut R) -> io::Result<u8> {
        reader.read_u8()
    }
}

impl BinarySerializable for String {
    fn serialize<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        serialize_bytes(self.as_bytes(), writer)
    }

    fn deserialize<R: Read>(reader: &mut R) -> io::Result<String> {
        let data = deserialize_bytes(reader)?;
        String::from_utf8(data).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }
}

/// Writes `data` as `(VInt length, raw bytes)`.
pub fn serialize_bytes<W: Write + ?Sized>(data: &[u8], writer: &mut W) -> io::Result<()> {
    VInt(data.len() as u64).serialize(writer)?;
    writer.write_all(data)
}

/// Reads a byte string written by [`serialize_bytes`].
///
/// Fails with `UnexpectedEof` if the reader holds fewer bytes than announced.
pub fn deserialize_bytes<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let num_bytes = VInt::deserialize(reader)?.val();
    let mut data = Vec::with_capacity((num_bytes as usize).min(MAX_PREALLOCATED_ITEMS));
    reader.take(num_bytes).read_to_end(&mut data)?;
    if data.len() as u64 != num_bytes {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "Byte string announced {} bytes, only {} available",
                num_bytes,
                data.len()
            ),
        ));
    }
    Ok(data)
}
