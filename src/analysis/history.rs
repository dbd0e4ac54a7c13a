//! Bounded ring of recent analysis results

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use uuid::Uuid;

use super::features::FeatureBundle;
use super::signal::TradingSignal;

/// Results kept by default
pub const HISTORY_CAPACITY: usize = 100;

/// Everything one analysis cycle produced
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub id: Uuid,
    /// Timestamp of the latest bar in the analyzed window
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub features: FeatureBundle,
    pub summary: String,
    pub prompt: String,
    /// Raw model reply; empty when the backend failed
    pub response: String,
    pub signal: TradingSignal,
}

/// Append-only history, oldest evicted first
#[derive(Debug, Clone)]
pub struct AnalysisHistory {
    entries: VecDeque<AnalysisResult>,
    capacity: usize,
}

impl Default for AnalysisHistory {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl AnalysisHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, result: AnalysisResult) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(result);
    }

    pub fn latest(&self) -> Option<&AnalysisResult> {
        self.entries.back()
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &AnalysisResult> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
