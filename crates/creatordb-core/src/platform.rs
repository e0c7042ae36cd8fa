use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// The external platforms the harvester knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    #[serde(alias = "tik_tok")]
    TikTok,
    #[serde(alias = "you_tube")]
    YouTube,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Instagram, Platform::TikTok, Platform::YouTube];

    /// Lowercase identifier used in storage and on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Instagram => "instagram",
            Platform::TikTok => "tiktok",
            Platform::YouTube => "youtube",
        }
    }

    /// Guess the platform from a profile URL's host.
    #[must_use]
    pub fn from_url(url: &str) -> Option<Self> {
        let lower = url.to_ascii_lowercase();
        if lower.contains("instagram.com") || lower.contains("instagr.am") {
            Some(Platform::Instagram)
        } else if lower.contains("tiktok.com") {
            Some(Platform::TikTok)
        } else if lower.contains("youtube.com") || lower.contains("youtu.be") {
            Some(Platform::YouTube)
        } else {
            None
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "instagram" | "ig" => Ok(Platform::Instagram),
            "tiktok" | "tt" => Ok(Platform::TikTok),
            "youtube" | "yt" => Ok(Platform::YouTube),
            other => Err(CoreError::UnknownPlatform(other.to_string())),
        }
    }
}
