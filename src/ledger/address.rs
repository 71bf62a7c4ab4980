// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account address validation and encoding.
//!
//! An account is `<prefix><body>` where the 60-character body is the 256-bit
//! public key (52 characters, with 4 leading pad bits) followed by an 8-character
//! checksum, both in Nano's base32 alphabet. The checksum is the 5-byte BLAKE2b
//! digest of the key with its byte order reversed.
//!
//! Everything here is pure and allocation-light; it is called from the socket
//! hub, the RPC layer and the submission pipeline without any locking.

use blake2::{digest::consts::U5, Blake2b, Digest};
use serde::{Deserialize, Serialize};

/// Nano's base32 alphabet (no `0`, `2`, `l`, `v`).
const ALPHABET: &[u8; 32] = b"13456789abcdefghijkmnopqrstuwxyz";

/// Body length after the prefix: 52 key characters + 8 checksum characters.
const BODY_LEN: usize = 60;
const KEY_CHARS: usize = 52;

/// `1111` pads the key to 280 bits so it decodes on a byte boundary.
const KEY_PADDING: &str = "1111";
const PADDING_BYTES: usize = 3;

type Blake2b40 = Blake2b<U5>;

/// Currency deployment the gateway is serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CurrencyMode {
    #[default]
    Nano,
    Banano,
}

impl CurrencyMode {
    /// Prefixes accepted in this mode, canonical prefix first.
    pub fn prefixes(self) -> &'static [&'static str] {
        match self {
            CurrencyMode::Nano => &["nano_", "xrb_"],
            CurrencyMode::Banano => &["ban_"],
        }
    }

    pub fn canonical_prefix(self) -> &'static str {
        self.prefixes()[0]
    }

    /// Prefix used for price-cache keys.
    pub fn price_prefix(self) -> &'static str {
        match self {
            CurrencyMode::Nano => "nano",
            CurrencyMode::Banano => "banano",
        }
    }

    pub fn is_banano(self) -> bool {
        self == CurrencyMode::Banano
    }
}

/// Why an address was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("unrecognized address prefix")]
    InvalidPrefix,

    #[error("address body must be 60 characters, got {0}")]
    InvalidLength(usize),

    #[error("invalid character {0:?} in address")]
    InvalidCharacter(char),

    #[error("address key padding is not zero")]
    InvalidPadding,

    #[error("address checksum mismatch")]
    InvalidChecksum,
}

/// Returns true if `address` is a well-formed account for `mode`.
pub fn validate(address: &str, mode: CurrencyMode) -> bool {
    to_public_key_for(address, mode).is_ok()
}

/// Extract the public key from an address carrying any recognized prefix.
pub fn to_public_key(address: &str) -> Result<[u8; 32], AddressError> {
    let body = [CurrencyMode::Nano, CurrencyMode::Banano]
        .iter()
        .flat_map(|mode| mode.prefixes())
        .find_map(|prefix| address.strip_prefix(prefix))
        .ok_or(AddressError::InvalidPrefix)?;
    decode_body(body)
}

/// Extract the public key, rejecting prefixes that don't belong to `mode`.
pub fn to_public_key_for(address: &str, mode: CurrencyMode) -> Result<[u8; 32], AddressError> {
    let body = strip_mode_prefix(address, mode).ok_or(AddressError::InvalidPrefix)?;
    decode_body(body)
}

/// Encode a public key as an account string with the given prefix.
pub fn encode_account(public_key: &[u8; 32], prefix: &str) -> String {
    let mut padded = [0u8; PADDING_BYTES + 32];
    padded[PADDING_BYTES..].copy_from_slice(public_key);
    let key = encode_base32(&padded);

    let mut out = String::with_capacity(prefix.len() + BODY_LEN);
    out.push_str(prefix);
    out.push_str(&key[KEY_PADDING.len()..]);
    out.push_str(&encode_base32(&checksum(public_key)));
    out
}

/// Rewrite legacy prefixes (`xrb_`) to the mode's canonical prefix.
///
/// Addresses that don't carry a recognized prefix for `mode` come back unchanged.
pub fn normalize(address: &str, mode: CurrencyMode) -> String {
    match strip_mode_prefix(address, mode) {
        Some(body) => format!("{}{}", mode.canonical_prefix(), body),
        None => address.to_string(),
    }
}

fn strip_mode_prefix(address: &str, mode: CurrencyMode) -> Option<&str> {
    mode.prefixes()
        .iter()
        .find_map(|prefix| address.strip_prefix(prefix))
}

fn decode_body(body: &str) -> Result<[u8; 32], AddressError> {
    if body.len() != BODY_LEN {
        return Err(AddressError::InvalidLength(body.len()));
    }
    if !body.is_ascii() {
        let bad = body.chars().find(|c| !c.is_ascii()).unwrap_or('?');
        return Err(AddressError::InvalidCharacter(bad));
    }

    let (key_part, checksum_part) = body.split_at(KEY_CHARS);
    let padded = decode_base32(&format!("{KEY_PADDING}{key_part}"))?;

    // The first body character may only carry the key's top bit ('1' or '3').
    if padded[..PADDING_BYTES].iter().any(|b| *b != 0) {
        return Err(AddressError::InvalidPadding);
    }

    let mut key = [0u8; 32];
    key.copy_from_slice(&padded[PADDING_BYTES..]);

    let expected = decode_base32(checksum_part)?;
    if expected[..] != checksum(&key)[..] {
        return Err(AddressError::InvalidChecksum);
    }
    Ok(key)
}

/// 5-byte BLAKE2b digest of the key, byte order reversed.
fn checksum(public_key: &[u8; 32]) -> [u8; 5] {
    let digest = Blake2b40::digest(public_key);
    let mut out = [0u8; 5];
    for (dst, src) in out.iter_mut().zip(digest.iter().rev()) {
        *dst = *src;
    }
    out
}

fn symbol_value(c: u8) -> Option<u8> {
    ALPHABET.iter().position(|s| *s == c).map(|p| p as u8)
}

/// Decode a string whose length is a multiple of 8 characters (40 bits).
fn decode_base32(input: &str) -> Result<Vec<u8>, AddressError> {
    let mut out = Vec::with_capacity(input.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;

    for c in input.bytes() {
        let value = symbol_value(c).ok_or(AddressError::InvalidCharacter(c as char))?;
        buffer = (buffer << 5) | u32::from(value);
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
            buffer &= (1 << bits) - 1;
        }
    }
    Ok(out)
}

/// Encode bytes whose bit length is a multiple of 5.
fn encode_base32(input: &[u8]) -> String {
    let mut out = String::with_capacity(input.len() * 8 / 5 + 1);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;

    for byte in input {
        buffer = (buffer << 8) | u32::from(*byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
        buffer &= (1 << bits) - 1;
    }
    if bits > 0 {
        out.push(ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}
