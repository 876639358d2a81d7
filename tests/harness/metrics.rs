// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Outcome tallies for abuse simulation runs.

use axum::http::StatusCode;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Collects response codes during a simulated attack.
#[derive(Debug, Default)]
pub struct AttackMetrics {
    start_time: Option<Instant>,
    end_time: Option<Instant>,
    outcomes: HashMap<u16, usize>,
}

impl AttackMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
    }

    pub fn finish(&mut self) {
        self.end_time = Some(Instant::now());
    }

    pub fn record(&mut self, status: StatusCode) {
        *self.outcomes.entry(status.as_u16()).or_insert(0) += 1;
    }

    pub fn total(&self) -> usize {
        self.outcomes.values().sum()
    }

    pub fn count(&self, status: StatusCode) -> usize {
        self.outcomes.get(&status.as_u16()).copied().unwrap_or(0)
    }

    pub fn duration(&self) -> Duration {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => end.duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }
}

impl fmt::Display for AttackMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "requests: {} in {:?}", self.total(), self.duration())?;
        let mut codes: Vec<_> = self.outcomes.iter().collect();
        codes.sort();
        for (code, count) in codes {
            writeln!(f, "  {}: {}", code, count)?;
        }
        Ok(())
    }
}
