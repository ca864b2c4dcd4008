//! Per-second rates from cumulative OS counters
//!
//! The OS only exposes running totals (bytes received/sent since boot or
//! since the interface came up). `RateSampler` keeps the previous reading
//! per counter name and turns each new reading into a rate:
//! - first reading of a name is a baseline and reports zero
//! - a counter lower than its previous reading (reset, wraparound) reports
//!   zero for that interval and becomes the new baseline
//! - names missing from a reading are forgotten

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Raw cumulative counters for one interface
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterReading {
    pub bytes_recv: u64,
    pub bytes_sent: u64,
}

impl CounterReading {
    pub fn new(bytes_recv: u64, bytes_sent: u64) -> Self {
        Self { bytes_recv, bytes_sent }
    }
}

/// Derived throughput for one interface
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceRate {
    pub rx_per_sec: f64,
    pub tx_per_sec: f64,
    pub bytes_recv: u64,
    pub bytes_sent: u64,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    reading: CounterReading,
    taken_at: f64,
    rate: InterfaceRate,
}

/// Converts successive counter readings into per-second rates.
///
/// There is no internal timer: callers decide when to call [`RateSampler::update`].
#[derive(Debug, Default)]
pub struct RateSampler {
    samples: HashMap<String, Sample>,
}

impl RateSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a reading taken "now" (wall clock).
    pub fn update(&mut self, counters: &HashMap<String, CounterReading>) -> BTreeMap<String, InterfaceRate> {
        self.update_at(counters, unix_now_secs())
    }

    /// Feed a reading taken at `now` (seconds since epoch).
    pub fn update_at(
        &mut self,
        counters: &HashMap<String, CounterReading>,
        now: f64,
    ) -> BTreeMap<String, InterfaceRate> {
        // Interfaces that disappeared lose their baseline
        self.samples.retain(|name, _| counters.contains_key(name));

        let mut rates = BTreeMap::new();
        for (name, reading) in counters {
            let rate = match self.samples.get(name) {
                None => InterfaceRate {
                    rx_per_sec: 0.0,
                    tx_per_sec: 0.0,
                    bytes_recv: reading.bytes_recv,
                    bytes_sent: reading.bytes_sent,
                },
                Some(prev) => Self::rate_between(prev, reading, now),
            };

            self.samples.insert(
                name.clone(),
                Sample { reading: *reading, taken_at: now, rate },
            );
            rates.insert(name.clone(), rate);
        }
        rates
    }

    /// Number of interfaces with a stored baseline
    pub fn tracked(&self) -> usize {
        self.samples.len()
    }

    fn rate_between(prev: &Sample, reading: &CounterReading, now: f64) -> InterfaceRate {
        let dt = now - prev.taken_at;
        if dt <= 0.0 {
            return InterfaceRate {
                bytes_recv: reading.bytes_recv,
                bytes_sent: reading.bytes_sent,
                ..prev.rate
            };
        }

        // saturating_sub clamps a counter reset to a zero rate
        let rx = reading.bytes_recv.saturating_sub(prev.reading.bytes_recv);
        let tx = reading.bytes_sent.saturating_sub(prev.reading.bytes_sent);
        InterfaceRate {
            rx_per_sec: rx as f64 / dt,
            tx_per_sec: tx as f64 / dt,
            bytes_recv: reading.bytes_recv,
            bytes_sent: reading.bytes_sent,
        }
    }
}

/// Wall clock as fractional seconds since the Unix epoch
pub fn unix_now_secs() -> f64 {
    let now = chrono::Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
}
