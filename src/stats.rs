//! Run traces: terminal outputs recorded tick by tick.

use crate::network::TerminalOutputs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Terminal outputs for one tick
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TickRecord {
    /// Tick number, starting at 1
    pub tick: u64,
    /// Sink name -> summed output, sorted by name
    pub outputs: BTreeMap<String, Vec<f64>>,
}

impl TickRecord {
    pub fn new(tick: u64, outputs: &TerminalOutputs) -> Self {
        Self {
            tick,
            outputs: outputs.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }

    /// Format the record as a one-line summary
    pub fn summary(&self) -> String {
        let outputs: Vec<String> = self
            .outputs
            .iter()
            .map(|(name, values)| {
                let values: Vec<String> = values.iter().map(|v| format!("{:+.4}", v)).collect();
                format!("{}=[{}]", name, values.join(", "))
            })
            .collect();
        format!("T:{:6} | {}", self.tick, outputs.join(" | "))
    }
}

/// Historical trace of a run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RunHistory {
    /// Recording interval
    pub interval: u64,
    /// All recorded ticks
    pub records: Vec<TickRecord>,
}

impl RunHistory {
    /// Create new history with recording interval
    pub fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
            records: Vec::new(),
        }
    }

    pub fn should_record(&self, tick: u64) -> bool {
        tick % self.interval == 0
    }

    /// Record the tick if it falls on the interval
    pub fn record(&mut self, tick: u64, outputs: &TerminalOutputs) -> bool {
        if self.should_record(tick) {
            self.records.push(TickRecord::new(tick, outputs));
            true
        } else {
            false
        }
    }

    pub fn latest(&self) -> Option<&TickRecord> {
        self.records.last()
    }

    /// One channel of one sink over time
    pub fn series(&self, sink: &str, channel: usize) -> Vec<(u64, f64)> {
        self.records
            .iter()
            .filter_map(|r| r.outputs.get(sink).and_then(|v| v.get(channel)).map(|&v| (r.tick, v)))
            .collect()
    }

    /// Per-channel mean of a sink over the recorded ticks
    pub fn mean(&self, sink: &str) -> Option<Vec<f64>> {
        let mut rows = self.records.iter().filter_map(|r| r.outputs.get(sink));
        let first = rows.next()?;
        let mut sum = first.clone();
        let mut count = 1usize;
        for row in rows {
            sum.iter_mut().zip(row).for_each(|(s, v)| *s += v);
            count += 1;
        }
        Some(sum.into_iter().map(|s| s / count as f64).collect())
    }

    /// Save history to file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    /// Load history from file
    pub fn load(path: &str) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outputs(left: f64, right: f64) -> TerminalOutputs {
        let mut outputs = TerminalOutputs::new();
        outputs.insert("left".to_string(), vec![left]);
        outputs.insert("right".to_string(), vec![right]);
        outputs
    }

    #[test]
    fn test_records_on_interval() {
        let mut history = RunHistory::new(5);
        for tick in 1..=20 {
            history.record(tick, &outputs(tick as f64, 0.0));
        }

        let series = history.series("left", 0);
        assert_eq!(series.len(), 4);
        assert_eq!(series[0], (5, 5.0));
        assert_eq!(series[3], (20, 20.0));
        assert_eq!(history.mean("left"), Some(vec![12.5]));
        assert_eq!(history.mean("missing"), None);
    }

    #[test]
    fn test_summary_is_sorted_by_sink() {
        let record = TickRecord::new(3, &outputs(0.5, -1.0));
        assert_eq!(record.summary(), "T:     3 | left=[+0.5000] | right=[-1.0000]");
    }

    #[test]
    fn test_history_json_roundtrip() {
        let temp_path = "/tmp/test_evonet_history.json";
        let mut history = RunHistory::new(1);
        history.record(1, &outputs(1.0, 2.0));
        history.save(temp_path).unwrap();

        let loaded = RunHistory::load(temp_path).unwrap();
        assert_eq!(loaded.records, history.records);
        std::fs::remove_file(temp_path).ok();
    }
}
