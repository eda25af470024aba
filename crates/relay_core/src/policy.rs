use std::fmt;

use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Item;

/// Per-destination eligibility rules. Re-read from configuration on every
/// dispatch attempt, so nothing here is cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchPolicy {
    pub enabled: bool,
    /// Case-insensitive pattern the title must match.
    pub title_pattern: String,
    /// Case-insensitive pattern the title must not match; empty disables it.
    pub title_negative_pattern: String,
    /// Maximum item age in seconds; `None` or `0` is unbounded.
    pub max_age_secs: Option<u64>,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            title_pattern: ".+".to_string(),
            title_negative_pattern: String::new(),
            max_age_secs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    TitleNotIncluded,
    TitleExcluded,
    TooOld { age_secs: i64, max_age_secs: u64 },
    AlreadyDelivered,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Disabled => write!(f, "destination disabled"),
            SkipReason::TitleNotIncluded => write!(f, "title does not match include pattern"),
            SkipReason::TitleExcluded => write!(f, "title matches exclude pattern"),
            SkipReason::TooOld {
                age_secs,
                max_age_secs,
            } => write!(f, "too old ({age_secs}s > {max_age_secs}s)"),
            SkipReason::AlreadyDelivered => write!(f, "already delivered"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyVerdict {
    Eligible,
    Skip(SkipReason),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("invalid title pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

impl DispatchPolicy {
    /// Evaluate enable flag, title filters and age, in that order.
    pub fn evaluate(&self, item: &Item, now: DateTime<Utc>) -> Result<PolicyVerdict, PolicyError> {
        if !self.enabled {
            return Ok(PolicyVerdict::Skip(SkipReason::Disabled));
        }

        if !compile(&self.title_pattern)?.is_match(&item.title) {
            return Ok(PolicyVerdict::Skip(SkipReason::TitleNotIncluded));
        }
        if !self.title_negative_pattern.is_empty()
            && compile(&self.title_negative_pattern)?.is_match(&item.title)
        {
            return Ok(PolicyVerdict::Skip(SkipReason::TitleExcluded));
        }

        if let Some(max_age_secs) = self.max_age_secs.filter(|secs| *secs > 0) {
            let age_secs = (now - item.published_at).num_seconds();
            if age_secs > 0 && age_secs as u64 > max_age_secs {
                return Ok(PolicyVerdict::Skip(SkipReason::TooOld {
                    age_secs,
                    max_age_secs,
                }));
            }
        }

        Ok(PolicyVerdict::Eligible)
    }
}

fn compile(pattern: &str) -> Result<Regex, PolicyError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|err| PolicyError::InvalidPattern {
            pattern: pattern.to_string(),
            message: err.to_string(),
        })
}
