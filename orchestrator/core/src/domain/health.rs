// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Freshness check for the swarm state cache.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Default staleness threshold: five minutes without a poll cycle.
pub const DEFAULT_STALENESS_THRESHOLD: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Health {
    Healthy {
        last_polled: DateTime<Utc>,
        age: chrono::Duration,
    },
    NeverPolled,
    Stale {
        last_polled: DateTime<Utc>,
        age: chrono::Duration,
    },
}

impl Health {
    /// Judge freshness of `last_polled` as seen at `now`.
    pub fn evaluate(last_polled: Option<DateTime<Utc>>, now: DateTime<Utc>, threshold: Duration) -> Self {
        let Some(last_polled) = last_polled else {
            return Health::NeverPolled;
        };
        let age = now.signed_duration_since(last_polled);
        match chrono::Duration::from_std(threshold) {
            Ok(limit) if age > limit => Health::Stale { last_polled, age },
            _ => Health::Healthy { last_polled, age },
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, Health::Healthy { .. })
    }

    /// Operator-facing reason for an unhealthy result.
    pub fn detail(&self) -> Option<&'static str> {
        match self {
            Health::Healthy { .. } => None,
            Health::NeverPolled => Some("store never polled"),
            Health::Stale { .. } => Some("store last poll exceeded staleness threshold"),
        }
    }
}
