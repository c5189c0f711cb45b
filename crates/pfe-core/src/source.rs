//! # Filter Source: Provenance of Every Mutation
//!
//! Each mutating action stamps the state with the origin of the edit.
//! The tag is also used to break ties when a conflict must pick one of two
//! dimensions to clear: the dimension last written by the lower-precedence
//! source gives way.
//!
//! Precedence, highest first: `manual > chart > preset > url > search`.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PfeError;

/// Origin of a filter edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterSource {
    /// Direct user input in a filter form.
    #[default]
    Manual,
    /// A click or selection on a chart.
    Chart,
    /// The free-text search box.
    Search,
    /// A named preset applied from the catalog.
    Preset,
    /// Address-bar query parameters.
    Url,
}

impl FilterSource {
    /// All sources, highest precedence first.
    pub fn all() -> &'static [FilterSource] {
        &[
            Self::Manual,
            Self::Chart,
            Self::Preset,
            Self::Url,
            Self::Search,
        ]
    }

    /// Tie-break rank. Higher wins.
    pub fn precedence(&self) -> u8 {
        match self {
            Self::Manual => 5,
            Self::Chart => 4,
            Self::Preset => 3,
            Self::Url => 2,
            Self::Search => 1,
        }
    }

    /// Lowercase wire identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Chart => "chart",
            Self::Search => "search",
            Self::Preset => "preset",
            Self::Url => "url",
        }
    }
}

impl std::fmt::Display for FilterSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterSource {
    type Err = PfeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "chart" => Ok(Self::Chart),
            "search" => Ok(Self::Search),
            "preset" => Ok(Self::Preset),
            "url" => Ok(Self::Url),
            other => Err(PfeError::UnknownSource(other.to_string())),
        }
    }
}
