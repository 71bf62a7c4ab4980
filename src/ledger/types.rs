// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger data types shared by the relay, hub and submission pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::address::CurrencyMode;

/// All-zero 32-byte hash, as the node prints it.
pub const ZERO_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Raw units per whole NANO (10^30).
pub const RAW_PER_NANO: u128 = 1_000_000_000_000_000_000_000_000_000_000;

/// Raw units per whole BANANO (10^29).
pub const RAW_PER_BANANO: u128 = 100_000_000_000_000_000_000_000_000_000;

/// True for `"0"`, the 64-zero hash, or any other non-empty run of zeros.
pub fn is_zero_hash(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b == b'0')
}

/// Block classification reported by the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum Subtype {
    Send,
    Receive,
    Change,
    Open,
    Epoch,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Subtype {
    pub fn as_str(self) -> &'static str {
        match self {
            Subtype::Send => "send",
            Subtype::Receive => "receive",
            Subtype::Change => "change",
            Subtype::Open => "open",
            Subtype::Epoch => "epoch",
            Subtype::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Subtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses only the subtypes a wallet may submit with a block.
impl FromStr for Subtype {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "send" => Ok(Subtype::Send),
            "receive" => Ok(Subtype::Receive),
            "change" => Ok(Subtype::Change),
            "open" => Ok(Subtype::Open),
            other => Err(other.to_string()),
        }
    }
}

/// A state block in the node's JSON form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StateBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub account: String,
    pub previous: String,
    #[serde(default)]
    pub representative: String,
    #[serde(default)]
    pub balance: String,
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_as_account: Option<String>,
    #[serde(default)]
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work: Option<String>,
}

impl StateBlock {
    /// A block only counts as carrying work when the value is non-empty.
    pub fn has_work(&self) -> bool {
        self.work.as_deref().is_some_and(|w| !w.trim().is_empty())
    }

    pub fn opens_account(&self) -> bool {
        is_zero_hash(&self.previous)
    }
}

/// Block body inside a confirmation event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
pub struct ConfirmationBlock {
    #[serde(rename = "type", default)]
    pub block_type: String,
    #[serde(default)]
    pub account: String,
    #[serde(default)]
    pub previous: String,
    #[serde(default)]
    pub representative: String,
    #[serde(default)]
    pub balance: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub link_as_account: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub work: String,
    #[serde(default)]
    pub subtype: Subtype,
}

/// Normalized confirmation of a block, as relayed from the node stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ConfirmationEvent {
    pub account: String,
    #[serde(default)]
    pub amount: String,
    pub hash: String,
    pub block: ConfirmationBlock,
}

impl ConfirmationEvent {
    pub fn subtype(&self) -> Subtype {
        self.block.subtype
    }

    /// The receiving account of a send (the link interpreted as an account).
    pub fn destination(&self) -> Option<&str> {
        let dest = self.block.link_as_account.as_str();
        (!dest.is_empty()).then_some(dest)
    }
}

/// Format a raw amount in whole units, truncated to 6 decimal places for NANO
/// and 2 for BANANO.
pub fn format_raw(raw: u128, mode: CurrencyMode) -> String {
    let (divisor, places) = match mode {
        CurrencyMode::Nano => (RAW_PER_NANO, 6),
        CurrencyMode::Banano => (RAW_PER_BANANO, 2),
    };
    let precision = 10u128.pow(places);
    let units = raw / (divisor / precision);
    let (whole, fraction) = (units / precision, units % precision);

    if fraction == 0 {
        return whole.to_string();
    }
    let fraction = format!("{:0>width$}", fraction, width = places as usize);
    format!("{}.{}", whole, fraction.trim_end_matches('0'))
}
