//! Sensor feed adapters.
//!
//! A feed is written by a driver thread and read once per tick by the
//! control loop. Reads never block on a missing observation: before the
//! first publish a feed reports a zero vector at timestamp 0.

use crate::network::SensorInputs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Most recent observation of a fixed-width sensor
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub values: Vec<f64>,
    /// Seconds, as stamped by the driver
    pub timestamp: f64,
}

impl SensorReading {
    pub fn zeros(width: usize) -> Self {
        Self {
            values: vec![0.0; width],
            timestamp: 0.0,
        }
    }
}

/// Thread-safe source of the latest reading
pub trait SensorFeed: Send + Sync {
    fn latest(&self) -> SensorReading;

    fn width(&self) -> usize;
}

/// Clonable handle onto one sensor's latest reading
#[derive(Debug)]
pub struct SharedSensor(Arc<RwLock<SensorReading>>);

impl SharedSensor {
    pub fn new(width: usize) -> Self {
        Self(Arc::new(RwLock::new(SensorReading::zeros(width))))
    }

    /// Replace the whole reading; widths other than the sensor's are dropped
    pub fn publish(&self, values: Vec<f64>, timestamp: f64) -> bool {
        let mut reading = self.0.write().unwrap_or_else(PoisonError::into_inner);
        if values.len() != reading.values.len() {
            log::warn!(
                "dropping sensor reading with {} values, sensor has {}",
                values.len(),
                reading.values.len()
            );
            return false;
        }
        *reading = SensorReading { values, timestamp };
        true
    }

    /// Update one channel, as rangers that report a beam per message do
    pub fn publish_channel(&self, index: usize, value: f64, timestamp: f64) -> bool {
        let mut reading = self.0.write().unwrap_or_else(PoisonError::into_inner);
        match reading.values.get_mut(index) {
            Some(slot) => {
                *slot = value;
                reading.timestamp = timestamp;
                true
            }
            None => {
                log::warn!("dropping value for sensor channel {} out of range", index);
                false
            }
        }
    }
}

impl Clone for SharedSensor {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl SensorFeed for SharedSensor {
    fn latest(&self) -> SensorReading {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn width(&self) -> usize {
        self.0.read().unwrap_or_else(PoisonError::into_inner).values.len()
    }
}

/// Tag -> feed registry feeding the executor
#[derive(Default)]
pub struct SensorHub {
    feeds: BTreeMap<String, Box<dyn SensorFeed>>,
}

impl SensorHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a feed under a sensor tag or input layer name
    pub fn register(&mut self, tag: impl Into<String>, feed: impl SensorFeed + 'static) {
        self.feeds.insert(tag.into(), Box::new(feed));
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.feeds.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }

    /// One immutable snapshot of every feed for the next tick
    pub fn snapshot(&self) -> SensorInputs {
        self.feeds
            .iter()
            .map(|(tag, feed)| (tag.clone(), feed.latest().values))
            .collect()
    }
}

impl std::fmt::Debug for SensorHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorHub").field("tags", &self.feeds.keys().collect::<Vec<_>>()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_default_reading_is_zero() {
        let sensor = SharedSensor::new(3);
        assert_eq!(sensor.latest(), SensorReading::zeros(3));
        assert_eq!(sensor.width(), 3);
    }

    #[test]
    fn test_publish_and_channel_updates() {
        let sensor = SharedSensor::new(2);
        assert!(sensor.publish(vec![1.0, 2.0], 0.5));
        assert!(sensor.publish_channel(1, 7.0, 0.75));
        assert_eq!(sensor.latest().values, vec![1.0, 7.0]);
        assert_eq!(sensor.latest().timestamp, 0.75);

        assert!(!sensor.publish(vec![1.0], 1.0));
        assert!(!sensor.publish_channel(5, 1.0, 1.0));
        assert_eq!(sensor.latest().values, vec![1.0, 7.0]);
    }

    #[test]
    fn test_driver_thread_publishes() {
        let sensor = SharedSensor::new(8);
        let driver = sensor.clone();
        let handle = thread::spawn(move || {
            for beam in 0..8 {
                driver.publish_channel(beam, beam as f64, beam as f64 * 0.1);
            }
        });
        handle.join().unwrap();

        let reading = sensor.latest();
        assert_eq!(reading.values[7], 7.0);
        assert!((reading.timestamp - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_hub_snapshot() {
        let infrared = SharedSensor::new(2);
        let mut hub = SensorHub::new();
        hub.register("infrared", infrared.clone());
        hub.register("bumper", SharedSensor::new(1));

        infrared.publish(vec![0.3, 0.4], 1.0);
        let snapshot = hub.snapshot();
        assert_eq!(snapshot["infrared"], vec![0.3, 0.4]);
        assert_eq!(snapshot["bumper"], vec![0.0]);
        assert_eq!(hub.tags().collect::<Vec<_>>(), vec!["bumper", "infrared"]);
    }
}
