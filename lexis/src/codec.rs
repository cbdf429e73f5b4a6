//! Variable-byte integer codec
//!
//! Each number is written as 7-bit groups, most significant group first.
//! The final byte of a number carries the stop flag (high bit set), so a
//! buffer is simply the concatenation of its encoded numbers.

use thiserror::Error;

const STOP: u8 = 0x80;
const PAYLOAD: u8 = 0x7f;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("Truncated varbyte buffer: {0} trailing byte(s) without stop flag")]
    Truncated(usize),
    #[error("Varbyte number at byte {0} overflows 64 bits")]
    Overflow(usize),
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Append one number to `out`.
pub fn encode_into(value: u64, out: &mut Vec<u8>) {
    let mut groups = [0u8; 10];
    let mut n = 0;
    let mut rest = value;
    loop {
        groups[n] = (rest as u8) & PAYLOAD;
        n += 1;
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }
    for i in (1..n).rev() {
        out.push(groups[i]);
    }
    out.push(groups[0] | STOP);
}

pub fn encode(values: &[u64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 2);
    for &value in values {
        encode_into(value, &mut out);
    }
    out
}

pub fn decode(bytes: &[u8]) -> CodecResult<Vec<u64>> {
    let mut out = Vec::new();
    let mut current: u64 = 0;
    let mut pending = 0usize;

    for (i, &byte) in bytes.iter().enumerate() {
        if current > (u64::MAX >> 7) {
            return Err(CodecError::Overflow(i));
        }
        current = (current << 7) | u64::from(byte & PAYLOAD);
        pending += 1;
        if byte & STOP != 0 {
            out.push(current);
            current = 0;
            pending = 0;
        }
    }

    if pending > 0 {
        return Err(CodecError::Truncated(pending));
    }
    Ok(out)
}

/// Encode a single number on its own.
pub fn encode_one(value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(2);
    encode_into(value, &mut out);
    out
}

/// Decode a buffer expected to hold exactly one number.
pub fn decode_one(bytes: &[u8]) -> CodecResult<Option<u64>> {
    Ok(decode(bytes)?.first().copied())
}
