//! Bar ingestion: CSV files, synthetic random walks, rolling window

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use std::collections::VecDeque;
use std::io::Read;
use std::path::Path;

use crate::types::{validate_window, Bar};

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Load `timestamp,open,high,low,close,volume` rows with RFC 3339 timestamps
pub fn load_csv(path: &Path) -> Result<Vec<Bar>> {
    let file = std::fs::File::open(path).with_context(|| format!("Failed to open file: {:?}", path))?;
    read_csv(file).with_context(|| format!("Failed to load bars from {:?}", path))
}

pub fn read_csv<R: Read>(reader: R) -> Result<Vec<Bar>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut bars = Vec::new();

    for (line, result) in csv_reader.deserialize().enumerate() {
        let row: CsvRow = result.with_context(|| format!("Failed to parse CSV row {}", line + 1))?;

        let timestamp = DateTime::parse_from_rfc3339(&row.timestamp)
            .with_context(|| format!("Failed to parse timestamp: {}", row.timestamp))?
            .with_timezone(&Utc);

        bars.push(Bar::new(timestamp, row.open, row.high, row.low, row.close, row.volume));
    }

    validate_window(&bars)?;
    tracing::debug!("Loaded {} bars", bars.len());
    Ok(bars)
}

/// Seeded random-walk bar generator for paper runs
#[derive(Debug, Clone)]
pub struct RandomWalk {
    rng: StdRng,
    price: f64,
    time: DateTime<Utc>,
    /// Max close-to-close step in points
    step: f64,
    /// Typical bar volume
    base_volume: f64,
    interval: Duration,
}

impl RandomWalk {
    pub fn new(seed: u64, start_price: f64, start_time: DateTime<Utc>) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            price: start_price,
            time: start_time,
            step: 8.0,
            base_volume: 500.0,
            interval: Duration::minutes(1),
        }
    }

    /// Round to the 0.25 tick
    fn tick(price: f64) -> f64 {
        (price * 4.0).round() / 4.0
    }
}

impl Iterator for RandomWalk {
    type Item = Bar;

    fn next(&mut self) -> Option<Bar> {
        let open = Self::tick(self.price);
        let close = Self::tick((open + self.rng.gen_range(-self.step..=self.step)).max(1.0));
        let high = Self::tick(open.max(close) + self.rng.gen_range(0.0..self.step / 2.0));
        let low = Self::tick((open.min(close) - self.rng.gen_range(0.0..self.step / 2.0)).max(0.25));

        // Occasional heavy bars so spikes and thrusts show up
        let surge = if self.rng.gen_bool(0.05) { 4.0 } else { 1.0 };
        let volume = (self.base_volume * surge * self.rng.gen_range(0.5..1.5)).round();

        let bar = Bar::new(self.time, open, high.max(open.max(close)), low.min(open.min(close)), close, volume);
        self.price = close;
        self.time = self.time + self.interval;
        Some(bar)
    }
}

/// Last `capacity` bars, oldest evicted first
#[derive(Debug, Clone)]
pub struct RollingWindow {
    bars: VecDeque<Bar>,
    capacity: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            bars: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, bar: Bar) {
        if self.bars.len() == self.capacity {
            self.bars.pop_front();
        }
        self.bars.push_back(bar);
    }

    /// Contiguous view of the window, oldest first
    pub fn as_slice(&mut self) -> &[Bar] {
        self.bars.make_contiguous()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}
