//! Recovery of numeric database ids from opaque GraphQL node ids.
//!
//! GitHub has issued two token formats:
//!
//! * legacy: standard base64 of `"<len>:<Type><digits>"`, e.g.
//!   `MDQ6VXNlcjU4MzIzMQ==` → `04:User583231`
//! * current: `<PREFIX>_<base64url>` where the payload is a msgpack array whose
//!   last element is the database id, e.g. `CR_kwDO...`
//!
//! Anything else hashes to a stable id with bit 62 set, which keeps it out of
//! the range real database ids occupy.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

const HASH_MARKER: u64 = 1 << 62;

/// Decode `token` into a numeric id, falling back to [`stable_hash`].
pub fn decode_node_id(token: &str) -> u64 {
    decode_legacy(token)
        .or_else(|| decode_prefixed(token))
        .unwrap_or_else(|| stable_hash(token))
}

/// Deterministic 63-bit id for tokens that carry no recoverable number.
pub fn stable_hash(token: &str) -> u64 {
    let digest = Sha256::digest(token.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(bytes) & (HASH_MARKER - 1)) | HASH_MARKER
}

pub fn is_hashed_id(id: u64) -> bool {
    id & HASH_MARKER != 0 && id < (1 << 63)
}

fn decode_legacy(token: &str) -> Option<u64> {
    let bytes = STANDARD
        .decode(token)
        .or_else(|_| STANDARD_NO_PAD.decode(token))
        .ok()?;
    let text = String::from_utf8(bytes).ok()?;
    let (_, type_and_id) = text.split_once(':')?;
    let digits_start = type_and_id
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    // Require a type name in front of the digits.
    if digits_start == 0 {
        return None;
    }
    type_and_id[digits_start..].parse().ok()
}

fn decode_prefixed(token: &str) -> Option<u64> {
    let (prefix, payload) = token.split_once('_')?;
    if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))
        .ok()?;
    last_msgpack_integer(&bytes)
}

/// Walk a msgpack fixarray and return its final element if it is an unsigned
/// integer.
fn last_msgpack_integer(bytes: &[u8]) -> Option<u64> {
    let (&header, mut rest) = bytes.split_first()?;
    if !(0x90..=0x9f).contains(&header) {
        return None;
    }
    let len = usize::from(header & 0x0f);
    if len == 0 {
        return None;
    }

    let mut last = None;
    for _ in 0..len {
        let (value, tail) = read_msgpack_value(rest)?;
        last = value;
        rest = tail;
    }
    if !rest.is_empty() {
        return None;
    }
    last
}

/// Returns `(Some(int) | None for non-integers, remaining bytes)`.
fn read_msgpack_value(bytes: &[u8]) -> Option<(Option<u64>, &[u8])> {
    let (&tag, rest) = bytes.split_first()?;
    match tag {
        0x00..=0x7f => Some((Some(u64::from(tag)), rest)),
        0xcc => read_uint(rest, 1),
        0xcd => read_uint(rest, 2),
        0xce => read_uint(rest, 4),
        0xcf => read_uint(rest, 8),
        0xa0..=0xbf => skip(rest, usize::from(tag & 0x1f)),
        0xd9 => {
            let (&len, rest) = rest.split_first()?;
            skip(rest, usize::from(len))
        }
        0xc4 => {
            let (&len, rest) = rest.split_first()?;
            skip(rest, usize::from(len))
        }
        _ => None,
    }
}

fn read_uint(bytes: &[u8], width: usize) -> Option<(Option<u64>, &[u8])> {
    if bytes.len() < width {
        return None;
    }
    let (head, tail) = bytes.split_at(width);
    let value = head.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
    Some((Some(value), tail))
}

fn skip(bytes: &[u8], len: usize) -> Option<(Option<u64>, &[u8])> {
    if bytes.len() < len {
        return None;
    }
    Some((None, &bytes[len..]))
}
