//! Packs and unpacks integer fields of arbitrary width into byte buffers.
//!
//! Bits are numbered MSB-first across the whole buffer: bit 0 is the most significant bit of
//! byte 0, bit 8 the most significant bit of byte 1. Multi-byte fields are big-endian, which is
//! the byte order used by UDS and OBD-II.

use thiserror::Error;

const MAX_FIELD_WIDTH: usize = 64;

#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum Error {
    #[error("Bit field out of range (offset {offset}, width {bit_count}, {available} bits)")]
    OutOfRange {
        offset: usize,
        bit_count: usize,
        available: usize,
    },
    #[error("Invalid Bit Field Width {0}")]
    InvalidWidth(usize),
    #[error("Value 0x{value:x} does not fit in {bit_count} bits")]
    ValueTooLarge { value: u64, bit_count: usize },
}

fn check_bounds(buffer_len: usize, offset: usize, bit_count: usize) -> Result<(), Error> {
    if bit_count == 0 || bit_count > MAX_FIELD_WIDTH {
        return Err(Error::InvalidWidth(bit_count));
    }

    let available = buffer_len * 8;
    if offset + bit_count > available {
        return Err(Error::OutOfRange {
            offset,
            bit_count,
            available,
        });
    }

    Ok(())
}

/// Splits the bit range into runs that stay within one byte. Yields `(byte_index, shift, num_bits)`
/// where `shift` is the distance of the run's lowest bit from bit 0 (LSB) of that byte.
fn spans(offset: usize, bit_count: usize) -> impl Iterator<Item = (usize, u8, usize)> {
    let end = offset + bit_count;
    let mut bit = offset;

    std::iter::from_fn(move || {
        if bit >= end {
            return None;
        }

        let bit_in_byte = bit % 8;
        let num_bits = std::cmp::min(8 - bit_in_byte, end - bit);
        let shift = (8 - bit_in_byte - num_bits) as u8;
        let span = (bit / 8, shift, num_bits);

        bit += num_bits;
        Some(span)
    })
}

fn mask(num_bits: usize) -> u8 {
    ((1u16 << num_bits) - 1) as u8
}

/// Read `bit_count` bits starting at `offset` as an unsigned integer.
pub fn get_bit_field(source: &[u8], offset: usize, bit_count: usize) -> Result<u64, Error> {
    check_bounds(source.len(), offset, bit_count)?;

    let value = spans(offset, bit_count).fold(0u64, |acc, (byte_index, shift, num_bits)| {
        let bits = (source[byte_index] >> shift) & mask(num_bits);
        (acc << num_bits) | bits as u64
    });

    Ok(value)
}

/// Write `value` into `bit_count` bits starting at `offset`. Bits outside the field are preserved.
pub fn set_bit_field(
    dest: &mut [u8],
    value: u64,
    offset: usize,
    bit_count: usize,
) -> Result<(), Error> {
    check_bounds(dest.len(), offset, bit_count)?;

    if bit_count < MAX_FIELD_WIDTH && value >> bit_count != 0 {
        return Err(Error::ValueTooLarge { value, bit_count });
    }

    let mut remaining = bit_count;
    for (byte_index, shift, num_bits) in spans(offset, bit_count) {
        remaining -= num_bits;
        let m = mask(num_bits);
        let bits = (value >> remaining) as u8 & m;

        dest[byte_index] &= !(m << shift);
        dest[byte_index] |= bits << shift;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_whole_bytes() {
        let data = [0x12, 0x34, 0x56, 0x78];
        assert_eq!(get_bit_field(&data, 0, 8), Ok(0x12));
        assert_eq!(get_bit_field(&data, 8, 16), Ok(0x3456));
        assert_eq!(get_bit_field(&data, 0, 32), Ok(0x12345678));
    }

    #[test]
    fn get_sub_byte_fields() {
        let data = [0b1001_0110, 0xff];
        assert_eq!(get_bit_field(&data, 0, 2), Ok(0b10));
        assert_eq!(get_bit_field(&data, 2, 14), Ok(0x16ff));
        assert_eq!(get_bit_field(&data, 4, 4), Ok(0b0110));
        assert_eq!(get_bit_field(&data, 7, 2), Ok(0b01));
    }

    #[test]
    fn set_preserves_neighbours() {
        let mut data = [0xff, 0xff];
        set_bit_field(&mut data, 0, 4, 6).unwrap();
        assert_eq!(data, [0xf0, 0x3f]);

        set_bit_field(&mut data, 0b101, 5, 3).unwrap();
        assert_eq!(data, [0xf5, 0x3f]);
    }

    #[test]
    fn set_then_get() {
        let mut data = [0u8; 4];
        set_bit_field(&mut data, 0x22, 0, 8).unwrap();
        set_bit_field(&mut data, 0xf190, 8, 16).unwrap();
        assert_eq!(data, [0x22, 0xf1, 0x90, 0x00]);
        assert_eq!(get_bit_field(&data, 8, 16), Ok(0xf190));
    }

    #[test]
    fn rejects_out_of_range() {
        let data = [0u8; 2];
        assert_eq!(
            get_bit_field(&data, 10, 8),
            Err(Error::OutOfRange {
                offset: 10,
                bit_count: 8,
                available: 16
            })
        );
        assert_eq!(get_bit_field(&data, 0, 0), Err(Error::InvalidWidth(0)));
    }

    #[test]
    fn rejects_wide_values() {
        let mut data = [0u8; 2];
        assert_eq!(
            set_bit_field(&mut data, 0x100, 0, 8),
            Err(Error::ValueTooLarge {
                value: 0x100,
                bit_count: 8
            })
        );
        assert_eq!(data, [0, 0]);
    }
}
