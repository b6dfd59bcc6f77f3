// Copyright 2024 Contributors to the appattest project.
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};

/// Source of the current instant, injected wherever real time is consulted
pub trait IClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// 1970-01-01T00:00:00Z
pub fn unix_epoch() -> DateTime<Utc> {
    DateTime::<Utc>::default()
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl IClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at a given instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl IClock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
