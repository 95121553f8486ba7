//! Wire shapes returned by `GET {base}/users/{address}` and by the local
//! fallback files. Upstream mixes numbers and strings freely, so every
//! numeric field is captured as a [`LooseNumber`] and left for the
//! normalizer to interpret.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// A JSON value that may arrive either as a number or as a string.
///
/// Integers are kept as integers so values above 2^53 survive
/// deserialization untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LooseNumber {
    Text(String),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
}

impl Default for LooseNumber {
    fn default() -> Self {
        LooseNumber::Unsigned(0)
    }
}

impl LooseNumber {
    /// Decimal text of the value, borrowing when it already is text.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            LooseNumber::Text(text) => Cow::Borrowed(text.trim()),
            LooseNumber::Unsigned(value) => Cow::Owned(value.to_string()),
            LooseNumber::Signed(value) => Cow::Owned(value.to_string()),
            LooseNumber::Float(value) => Cow::Owned(value.to_string()),
        }
    }

    /// Lossy floating-point view; unparsable text yields `0.0`.
    pub fn as_f64(&self) -> f64 {
        let value = match self {
            LooseNumber::Text(text) => text.trim().parse::<f64>().unwrap_or(0.0),
            LooseNumber::Unsigned(value) => *value as f64,
            LooseNumber::Signed(value) => *value as f64,
            LooseNumber::Float(value) => *value,
        };
        if value.is_finite() {
            value
        } else {
            0.0
        }
    }
}

/// Participant-level snapshot as reported upstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSnapshot {
    #[serde(default)]
    pub authorised: LooseNumber,
    #[serde(default)]
    pub lastshare: LooseNumber,
    #[serde(default)]
    pub workers: LooseNumber,
    #[serde(default)]
    pub shares: LooseNumber,
    #[serde(default)]
    pub bestshare: LooseNumber,
    #[serde(default)]
    pub bestever: LooseNumber,
    #[serde(default)]
    pub hashrate1m: LooseNumber,
    #[serde(default)]
    pub hashrate5m: LooseNumber,
    #[serde(default)]
    pub hashrate1hr: LooseNumber,
    #[serde(default)]
    pub hashrate1d: LooseNumber,
    #[serde(default)]
    pub hashrate7d: LooseNumber,
    #[serde(default)]
    pub worker: Vec<RawWorker>,
}

/// One device entry under a participant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawWorker {
    #[serde(default)]
    pub workername: String,
    #[serde(default)]
    pub useragent: Option<String>,
    #[serde(default)]
    pub lastshare: LooseNumber,
    #[serde(default)]
    pub shares: LooseNumber,
    #[serde(default)]
    pub bestshare: LooseNumber,
    #[serde(default)]
    pub bestever: LooseNumber,
    #[serde(default)]
    pub hashrate1m: LooseNumber,
    #[serde(default)]
    pub hashrate5m: LooseNumber,
    #[serde(default)]
    pub hashrate1hr: LooseNumber,
    #[serde(default)]
    pub hashrate1d: LooseNumber,
    #[serde(default)]
    pub hashrate7d: LooseNumber,
    #[serde(default)]
    pub started: Option<LooseNumber>,
}
