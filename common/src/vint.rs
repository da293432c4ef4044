use std::io;
use std::io::{Read, Write};

use super::BinarySerializable;

/// Wrapper over a `u64` that serializes as a variable int.
///
/// Each byte carries 7 bits of payload, least significant group first.
/// The last byte of an encoding has its highest bit set.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct VInt(pub u64);

const STOP_BIT: u8 = 128;

/// Longest possible encoding of a `u64`.
const MAX_VINT_NUM_BYTES: usize = 10;

/// Appends the variable int encoding of `val` to `output`.
pub fn serialize_vint_u64(val: u64, output: &mut Vec<u8>) {
    let mut buffer = [0u8; MAX_VINT_NUM_BYTES];
    let num_bytes = VInt(val).serialize_into(&mut buffer);
    output.extend_from_slice(&buffer[..num_bytes]);
}

impl VInt {
    pub fn val(&self) -> u64 {
        self.0
    }

    pub fn deserialize_u64<R: Read>(reader: &mut R) -> io::Result<u64> {
        VInt::deserialize(reader).map(|vint| vint.0)
    }

    pub fn serialize_into_vec(&self, output: &mut Vec<u8>) {
        serialize_vint_u64(self.0, output);
    }

    /// Writes the encoding into `buffer` and returns the number of bytes used.
    pub fn serialize_into(&self, buffer: &mut [u8; MAX_VINT_NUM_BYTES]) -> usize {
        let mut remaining = self.0;
        for (i, b) in buffer.iter_mut().enumerate() {
            let next_byte: u8 = (remaining % 128u64) as u8;
            remaining /= 128u64;
            if remaining == 0u64 {
                *b = next_byte | STOP_BIT;
                return i + 1;
            } else {
                *b = next_byte;
            }
        }
        unreachable!();
    }
}

impl BinarySerializable for VInt {
    fn serialize<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        let mut buffer = [0u8; MAX_VINT_NUM_BYTES];
        let num_bytes = self.serialize_into(&mut buffer);
        writer.write_all(&buffer[0..num_bytes])
    }

    fn deserialize<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut bytes = reader.bytes();
        let mut result = 0u64;
        let mut shift = 0u64;
        loop {
            match bytes.next() {
                Some(Ok(b)) => {
                    if shift >= 64 || u64::from(b % 128u8) > (u64::MAX >> shift) {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            "VInt does not fit in a u64",
                        ));
                    }
                    result |= u64::from(b % 128u8) << shift;
                    if b >= STOP_BIT {
                        return Ok(VInt(result));
                    }
                    shift += 7;
                }
                Some(Err(io_error)) => return Err(io_error),
                None => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "Reach end of buffer while reading VInt",
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {

    use super::{serialize_vint_u64, VInt};
    use crate::BinarySerializable;

    fn aux_test_vint(val: u64) {
        let mut v = [14u8; 10];
        let num_bytes = VInt(val).serialize_into(&mut v);
        for el in &v[num_bytes..10] {
            assert_eq!(el, &14u8);
        }
        assert!(num_bytes > 0);
        if num_bytes < 10 {
            assert!(1u64 << (7 * num_bytes) > val);
        }
        if num_bytes > 1 {
            assert!(1u64 << (7 * (num_bytes - 1)) <= val);
        }
        let serdeser_val = VInt::deserialize(&mut &v[..]).unwrap();
        assert_eq!(val, serdeser_val.0);
    }

    #[test]
    fn test_vint() {
        aux_test_vint(0);
        aux_test_vint(1);
        aux_test_vint(5);
        aux_test_vint(u64::MAX);
        for i in 1..9 {
            let power_of_128 = 1u64 << (7 * i);
            aux_test_vint(power_of_128 - 1u64);
            aux_test_vint(power_of_128);
            aux_test_vint(power_of_128 + 1u64);
        }
        aux_test_vint(10);
    }

    #[test]
    fn test_vint_num_bytes() {
        let mut buffer = Vec::new();
        serialize_vint_u64(127, &mut buffer);
        assert_eq!(buffer.len(), 1);
        serialize_vint_u64(128, &mut buffer);
        assert_eq!(buffer.len(), 3);
        serialize_vint_u64(16_384, &mut buffer);
        assert_eq!(buffer.len(), 6);
    }

    #[test]
    fn test_vint_truncated() {
        let mut buffer = Vec::new();
        VInt(1_000_000).serialize_into_vec(&mut buffer);
        buffer.pop();
        assert!(VInt::deserialize(&mut &buffer[..]).is_err());
        assert!(VInt::deserialize(&mut &b""[..]).is_err());
    }

    #[test]
    fn test_vint_overlong() {
        // eleven continuation bytes can never describe a u64
        let buffer = [0u8; 11];
        assert!(VInt::deserialize(&mut &buffer[..]).is_err());
    }

    #[test]
    fn test_vint_tenth_byte_overflow() {
        let mut buffer = [0x7fu8; 10];
        buffer[9] = 0x81;
        assert_eq!(VInt::deserialize(&mut &buffer[..]).unwrap().0, u64::MAX);
        buffer[9] = 0x82;
        assert!(VInt::deserialize(&mut &buffer[..]).is_err());
        buffer[9] = 0xff;
        assert!(VInt::deserialize(&mut &buffer[..]).is_err());
    }
}
