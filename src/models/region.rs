//! Region codes and the immutable catalog of regions shown on the index page

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::TenkiError;

/// Regions listed when the configuration does not provide its own
pub const BUILTIN_REGIONS: [(u32, &str); 3] = [(120000, "千葉"), (130000, "東京"), (140000, "神奈川")];

/// JMA forecast area code
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionCode(u32);

impl RegionCode {
    #[must_use]
    pub const fn new(code: u32) -> Self {
        Self(code)
    }

    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Path of the detail page for this code
    #[must_use]
    pub fn detail_href(self) -> String {
        format!("/weather/{}", self.0)
    }
}

impl fmt::Display for RegionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RegionCode {
    type Err = TenkiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TenkiError::validation(format!(
                "region code must be numeric, got '{s}'"
            )));
        }
        s.parse::<u32>()
            .map(Self)
            .map_err(|_| TenkiError::validation(format!("region code out of range: {s}")))
    }
}

/// One catalog entry as written in the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionEntry {
    pub code: RegionCode,
    pub name: String,
}

/// A navigable link on the index page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionLink {
    pub code: RegionCode,
    pub name: String,
    pub label: String,
    pub href: String,
}

/// Fixed code → name mapping, built once at start-up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionCatalog {
    regions: BTreeMap<RegionCode, String>,
}

impl RegionCatalog {
    /// Build a catalog from configured entries.
    ///
    /// Later duplicates replace earlier ones; the configuration layer rejects
    /// duplicates before this point.
    pub fn new<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = RegionEntry>,
    {
        Self {
            regions: entries.into_iter().map(|e| (e.code, e.name)).collect(),
        }
    }

    #[must_use]
    pub fn builtin() -> Self {
        Self::new(builtin_entries())
    }

    #[must_use]
    pub fn name(&self, code: RegionCode) -> Option<&str> {
        self.regions.get(&code).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn codes(&self) -> impl Iterator<Item = RegionCode> + '_ {
        self.regions.keys().copied()
    }

    /// One link per region, in ascending code order
    #[must_use]
    pub fn links(&self) -> Vec<RegionLink> {
        self.regions
            .iter()
            .map(|(code, name)| RegionLink {
                code: *code,
                name: name.clone(),
                label: format!("{name}の天気"),
                href: code.detail_href(),
            })
            .collect()
    }
}

#[must_use]
pub fn builtin_entries() -> Vec<RegionEntry> {
    BUILTIN_REGIONS
        .iter()
        .map(|(code, name)| RegionEntry {
            code: RegionCode::new(*code),
            name: (*name).to_string(),
        })
        .collect()
}
