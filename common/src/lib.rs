//! Wire primitives shared by the `matchspy` crate.
//!
//! - [`VInt`]: the variable-length integer used for every length and counter.
//! - [`BinarySerializable`]: length-prefixed encoding of byte strings and lists.
//! - the sortable numeric codec, turning `f64` into byte strings whose
//!   lexicographic order matches numeric order.

mod serialize;
mod vint;

pub use serialize::{deserialize_bytes, serialize_bytes, BinarySerializable};
pub use vint::{serialize_vint_u64, VInt};

const HIGHEST_BIT_64: u64 = 1 << 63;

/// Number of bytes of a [`sortable_serialize`] encoding.
pub const SORTABLE_NUM_BYTES: usize = 8;

/// Maps a `f64` to `u64`
///
/// Maps `f64` to `u64` in a monotonic manner, so that bytes lexical order is preserved.
///
/// This is more suited than simply casting (`val as u64`)
/// which would truncate the result
///
/// # Reference
///
/// Daniel Lemire's [blog post](https://lemire.me/blog/2020/12/14/converting-floating-point-numbers-to-integers-while-preserving-order/)
/// explains the mapping in a clear manner.
///
/// # See also
/// The reverse mapping is [`u64_to_f64()`].
#[inline]
pub fn f64_to_u64(val: f64) -> u64 {
    let bits = val.to_bits();
    if val.is_sign_positive() {
        bits ^ HIGHEST_BIT_64
    } else {
        !bits
    }
}

/// Reverse the mapping given by [`f64_to_u64()`].
#[inline]
pub fn u64_to_f64(val: u64) -> f64 {
    f64::from_bits(if val & HIGHEST_BIT_64 != 0 {
        val ^ HIGHEST_BIT_64
    } else {
        !val
    })
}

/// Encodes a `f64` as a byte string such that comparing two encodings
/// byte-wise gives the same result as comparing the numbers.
#[inline]
pub fn sortable_serialize(val: f64) -> [u8; SORTABLE_NUM_BYTES] {
    f64_to_u64(val).to_be_bytes()
}

/// Reverse the mapping given by [`sortable_serialize()`].
///
/// Only the first [`SORTABLE_NUM_BYTES`] bytes are read. A shorter input is
/// right-padded with zeros, which keeps the decoding monotonic.
pub fn sortable_unserialize(bytes: &[u8]) -> f64 {
    let mut buffer = [0u8; SORTABLE_NUM_BYTES];
    let num_bytes = bytes.len().min(SORTABLE_NUM_BYTES);
    buffer[..num_bytes].copy_from_slice(&bytes[..num_bytes]);
    u64_to_f64(u64::from_be_bytes(buffer))
}

#[cfg(test)]
pub mod test {
    use std::cmp::Ordering;

    use proptest::prelude::*;

    use super::{f64_to_u64, sortable_serialize, sortable_unserialize, u64_to_f64};

    fn test_f64_converter_helper(val: f64) {
        assert_eq!(u64_to_f64(f64_to_u64(val)).total_cmp(&val), Ordering::Equal);
    }

    proptest! {
        #[test]
        fn test_f64_converter_monotonicity_proptest((left, right) in (proptest::num::f64::ANY, proptest::num::f64::ANY)) {
            test_f64_converter_helper(left);
            test_f64_converter_helper(right);

            let left_u64 = f64_to_u64(left);
            let right_u64 = f64_to_u64(right);

            assert_eq!(left_u64.cmp(&right_u64),  left.total_cmp(&right));
        }

        #[test]
        fn test_sortable_bytes_order_proptest((left, right) in (proptest::num::f64::NORMAL, proptest::num::f64::NORMAL)) {
            let left_bytes = sortable_serialize(left);
            let right_bytes = sortable_serialize(right);
            assert_eq!(left_bytes.cmp(&right_bytes), left.total_cmp(&right));
            assert_eq!(sortable_unserialize(&left_bytes), left);
        }
    }

    #[test]
    fn test_f64_converter() {
        test_f64_converter_helper(f64::INFINITY);
        test_f64_converter_helper(f64::NEG_INFINITY);
        test_f64_converter_helper(0.0);
        test_f64_converter_helper(-0.0);
        test_f64_converter_helper(1.0);
        test_f64_converter_helper(-1.0);
    }

    #[test]
    fn test_f64_order() {
        assert!(f64_to_u64(1.5) > f64_to_u64(1.0)); // same exponent, different mantissa
        assert!(f64_to_u64(2.0) > f64_to_u64(1.0)); // same mantissa, different exponent
        assert!(f64_to_u64(2.0) > f64_to_u64(1.5)); // different exponent and mantissa
        assert!(f64_to_u64(1.0) > f64_to_u64(-1.0)); // pos > neg
        assert!(f64_to_u64(-1.5) < f64_to_u64(-1.0));
        assert!(f64_to_u64(-2.0) < f64_to_u64(1.0));
        assert!(f64_to_u64(-2.0) < f64_to_u64(-1.5));
    }

    #[test]
    fn test_sortable_unserialize_short_input() {
        let encoded = sortable_serialize(12.5);
        assert_eq!(sortable_unserialize(&encoded[..]), 12.5);
        // trailing bytes beyond the encoding are ignored
        let mut padded = encoded.to_vec();
        padded.push(0u8);
        assert_eq!(sortable_unserialize(&padded), 12.5);
        // truncation keeps the order
        assert!(sortable_unserialize(&encoded[..4]) <= 12.5);
    }
}
