//! Request and response envelope for a single harvest.
//!
//! The response is always "200-shaped": failures are carried in `success`,
//! `warning` and `code`, never as an error status.

use serde::{Deserialize, Serialize};

use crate::{HarvestResult, Platform};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestRequest {
    /// Caller-side account reference, stored alongside the aggregates.
    #[serde(default)]
    pub account_id: Option<String>,
    /// Required unless it can be inferred from `profile_url`.
    #[serde(default)]
    pub platform: Option<Platform>,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub profile_url: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default = "default_true")]
    pub fetch_content: bool,
    #[serde(default)]
    pub resume_from_cursor: bool,
}

impl HarvestRequest {
    #[must_use]
    pub fn for_handle(platform: Platform, handle: impl Into<String>) -> Self {
        Self {
            account_id: None,
            platform: Some(platform),
            handle: Some(handle.into()),
            profile_url: None,
            channel_id: None,
            fetch_content: true,
            resume_from_cursor: false,
        }
    }

    /// The raw account reference: handle, then profile URL, then channel id.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        [&self.handle, &self.profile_url, &self.channel_id]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .map(str::trim)
            .find(|v| !v.is_empty())
    }

    /// Explicit platform, or the one implied by `profile_url`/`handle`.
    #[must_use]
    pub fn platform(&self) -> Option<Platform> {
        self.platform.or_else(|| {
            self.target().and_then(Platform::from_url).or_else(|| {
                self.channel_id
                    .as_deref()
                    .filter(|c| c.starts_with("UC"))
                    .map(|_| Platform::YouTube)
            })
        })
    }
}

/// Machine-readable reason attached to a degraded or failed harvest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCode {
    /// Upstream answered 429; the caller should back off.
    RateLimited,
    NotFound,
    NoData,
    DeadlineExceeded,
    /// Some data was gathered but a later step failed.
    Partial,
    /// The account could not be mapped to a platform id.
    Unresolved,
    InvalidRequest,
}

impl WarningCode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WarningCode::RateLimited => "rate_limited",
            WarningCode::NotFound => "not_found",
            WarningCode::NoData => "no_data",
            WarningCode::DeadlineExceeded => "deadline_exceeded",
            WarningCode::Partial => "partial",
            WarningCode::Unresolved => "unresolved",
            WarningCode::InvalidRequest => "invalid_request",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestResponse {
    pub success: bool,
    pub data: HarvestResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<WarningCode>,
}

impl HarvestResponse {
    /// A `success:false` response with an empty result.
    #[must_use]
    pub fn failed(handle: &str, code: WarningCode, warning: impl Into<String>) -> Self {
        let warning = warning.into();
        let mut data = HarvestResult::empty(handle);
        data.warnings.push(warning.clone());
        Self {
            success: false,
            data,
            warning: Some(warning),
            code: Some(code),
        }
    }
}
