//! Binary codec for SSTable records and index metadata.
//!
//! Records are length-prefixed with unsigned varints (little-endian
//! base-128 continuation encoding, at most 10 bytes each); index metadata
//! uses fixed-width little-endian integers. The codec obeys the
//! round-trip law `decode_record(encode_record(k, v)) == (k, v)` for
//! every valid key and value.

use byteorder::{ByteOrder, LittleEndian};

use crate::SstError;

/// Byte length of the fixed trailer: `[seq: u64][count: u32][len: u32]`.
pub const TRAILER_BYTES: u64 = 16;

/// Longest possible uvarint encoding of a u64.
const MAX_UVARINT_BYTES: usize = 10;

/// Appends the uvarint encoding of `x` to `buf`.
pub(crate) fn put_uvarint(buf: &mut Vec<u8>, mut x: u64) {
    while x >= 0x80 {
        buf.push((x as u8) | 0x80);
        x >>= 7;
    }
    buf.push(x as u8);
}

/// Decodes a uvarint from the front of `buf`, returning the value and the
/// number of bytes consumed.
pub(crate) fn get_uvarint(buf: &[u8]) -> Result<(u64, usize), SstError> {
    let mut x = 0u64;
    let mut shift = 0u32;
    for (i, &b) in buf.iter().enumerate() {
        if i >= MAX_UVARINT_BYTES {
            return Err(SstError::Corrupt("uvarint overflows u64".into()));
        }
        if b < 0x80 {
            if i == MAX_UVARINT_BYTES - 1 && b > 1 {
                return Err(SstError::Corrupt("uvarint overflows u64".into()));
            }
            return Ok((x | (u64::from(b) << shift), i + 1));
        }
        x |= u64::from(b & 0x7f) << shift;
        shift += 7;
    }
    Err(SstError::Corrupt("truncated uvarint".into()))
}

/// Appends one encoded record to `buf` and returns the number of bytes
/// written: `[key_len: uvarint][val_len: uvarint][key][value]`.
pub(crate) fn put_record(buf: &mut Vec<u8>, key: &[u8], value: &[u8]) -> usize {
    let start = buf.len();
    put_uvarint(buf, key.len() as u64);
    put_uvarint(buf, value.len() as u64);
    buf.extend_from_slice(key);
    buf.extend_from_slice(value);
    buf.len() - start
}

/// Encodes one record into a fresh buffer.
#[must_use]
pub fn encode_record(key: &[u8], value: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(key.len() + value.len() + 4);
    put_record(&mut buf, key, value);
    buf
}

/// Decodes one record from the front of `buf`, returning `(key, value)`
/// slices and the number of bytes consumed.
///
/// Fails with [`SstError::Corrupt`] on truncated input or when a declared
/// length exceeds the remaining bytes.
pub fn decode_record(buf: &[u8]) -> Result<(&[u8], &[u8], usize), SstError> {
    let (key_len, n) = get_uvarint(buf)?;
    let mut pos = n;
    let (val_len, n) = get_uvarint(&buf[pos..])?;
    pos += n;

    let key_len = usize::try_from(key_len)
        .map_err(|_| SstError::Corrupt("record key length overflows usize".into()))?;
    let val_len = usize::try_from(val_len)
        .map_err(|_| SstError::Corrupt("record value length overflows usize".into()))?;

    let remaining = buf.len() - pos;
    let need = key_len
        .checked_add(val_len)
        .ok_or_else(|| SstError::Corrupt("record length overflows usize".into()))?;
    if need > remaining {
        return Err(SstError::Corrupt(format!(
            "truncated record: need {} bytes, have {}",
            need, remaining
        )));
    }

    let key = &buf[pos..pos + key_len];
    let value = &buf[pos + key_len..pos + key_len + val_len];
    Ok((key, value, pos + key_len + val_len))
}

/// Decodes a fixed 4-byte little-endian integer.
pub(crate) fn get_u32(buf: &[u8]) -> Result<u32, SstError> {
    if buf.len() < 4 {
        return Err(SstError::Corrupt("truncated u32".into()));
    }
    Ok(LittleEndian::read_u32(buf))
}

/// Decodes a fixed 8-byte little-endian integer.
pub(crate) fn get_u64(buf: &[u8]) -> Result<u64, SstError> {
    if buf.len() < 8 {
        return Err(SstError::Corrupt("truncated u64".into()));
    }
    Ok(LittleEndian::read_u64(buf))
}
