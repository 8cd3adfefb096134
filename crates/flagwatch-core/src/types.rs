//! Domain types shared by the store, dispatcher, source and poller.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid category name '{0}': use letters, digits, '_', '-' or '.', not starting with '.'")]
pub struct InvalidCategoryName(pub String);

/// A named channel of updates, e.g. `messages` or `presence`.
///
/// Always holds a name accepted by
/// [`flagwatch_config::is_valid_category_name`], which keeps it safe to use
/// as a file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidCategoryName> {
        let name = name.into();
        if flagwatch_config::is_valid_category_name(&name) {
            Ok(Self(name))
        } else {
            Err(InvalidCategoryName(name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl AsRef<str> for Category {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Category {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl FromStr for Category {
    type Err = InvalidCategoryName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Category::new(name).map_err(serde::de::Error::custom)
    }
}

/// Opaque "newest data already seen" marker for a category.
///
/// Either a timestamp or a sequence id; only its ordering matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Watermark(i64);

impl Watermark {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> i64 {
        self.0
    }
}

impl From<i64> for Watermark {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Per-category update value reported by the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Indicator {
    Flag(bool),
    Count(u64),
}

impl Indicator {
    /// `true`, or a count above zero.
    pub fn is_set(self) -> bool {
        match self {
            Indicator::Flag(flag) => flag,
            Indicator::Count(count) => count > 0,
        }
    }

    fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(flag) => Some(Indicator::Flag(*flag)),
            serde_json::Value::Number(n) => n.as_u64().map(Indicator::Count),
            _ => None,
        }
    }
}

impl From<bool> for Indicator {
    fn from(flag: bool) -> Self {
        Indicator::Flag(flag)
    }
}

impl From<u64> for Indicator {
    fn from(count: u64) -> Self {
        Indicator::Count(count)
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Indicator::Flag(flag) => write!(f, "{flag}"),
            Indicator::Count(count) => write!(f, "{count}"),
        }
    }
}

/// What a single poll asks the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRequest {
    pub categories: Vec<Category>,
    /// Only categories with a stored watermark appear here.
    pub watermarks: BTreeMap<Category, Watermark>,
    pub now: DateTime<Utc>,
}

/// What the status endpoint answered.
///
/// Keys are left as raw strings: the endpoint may report categories this
/// poller was not configured for, and those are filtered out by the poller.
/// Values that are neither a boolean nor a non-negative integer are dropped
/// while decoding, so they read as "no update".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StatusResponse {
    #[serde(default, deserialize_with = "lenient_indicators")]
    pub updates: BTreeMap<String, Indicator>,
    #[serde(default, deserialize_with = "lenient_watermarks")]
    pub watermarks: BTreeMap<String, Watermark>,
}

impl StatusResponse {
    pub fn with_update(mut self, category: &str, indicator: impl Into<Indicator>) -> Self {
        self.updates.insert(category.to_string(), indicator.into());
        self
    }

    pub fn with_watermark(mut self, category: &str, watermark: i64) -> Self {
        self.watermarks
            .insert(category.to_string(), Watermark::new(watermark));
        self
    }

    /// Indicator for `category`, or `None` when the endpoint did not mention it.
    pub fn indicator(&self, category: &str) -> Option<Indicator> {
        self.updates.get(category).copied()
    }

    /// Drop every key not in `categories`, returning the dropped names.
    pub fn retain_categories(&mut self, categories: &[Category]) -> Vec<String> {
        let known = |name: &str| categories.iter().any(|c| c.as_str() == name);
        let mut dropped: Vec<String> = self
            .updates
            .keys()
            .chain(self.watermarks.keys())
            .filter(|name| !known(name))
            .cloned()
            .collect();
        dropped.sort();
        dropped.dedup();

        self.updates.retain(|name, _| known(name));
        self.watermarks.retain(|name, _| known(name));
        dropped
    }
}

fn lenient_indicators<'de, D>(deserializer: D) -> Result<BTreeMap<String, Indicator>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, serde_json::Value>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(name, value)| match Indicator::from_json(&value) {
            Some(indicator) => Some((name, indicator)),
            None => {
                debug!(
                    event = "core.response.indicator_ignored",
                    category = %name,
                    value = %value,
                );
                None
            }
        })
        .collect())
}

fn lenient_watermarks<'de, D>(deserializer: D) -> Result<BTreeMap<String, Watermark>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, serde_json::Value>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(name, value)| {
            // Some endpoints send timestamps as strings
            let parsed = match &value {
                serde_json::Value::Number(n) => n.as_i64(),
                serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            match parsed {
                Some(v) => Some((name, Watermark::new(v))),
                None => {
                    debug!(
                        event = "core.response.watermark_ignored",
                        category = %name,
                        value = %value,
                    );
                    None
                }
            }
        })
        .collect())
}
