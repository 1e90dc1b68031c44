//! Running statistics for a single scalar metric.

use serde::{Deserialize, Serialize};

/// Unit label attached to a [`Measurement`].
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    #[default]
    Kilobytes,
    Bytes,
    Pages,
    Percent,
    Count,
}

/// Converts a byte count into the value recorded by a [`Unit::Kilobytes`]
/// measurement. The fractional part is kept.
pub fn bytes_to_kb(bytes: u64) -> f64 {
    bytes as f64 / 1024.0
}

/// Accumulates count, min, max, sum and last value of a metric over one
/// collection session.
///
/// `record` is O(1). Until the first sample arrives (`count == 0`) the
/// min/max/avg/last values are undefined and reported as `None` by
/// [`Measurement::snapshot`].
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Measurement {
    unit: Unit,
    count: u64,
    min: f64,
    max: f64,
    sum: f64,
    last: f64,
}

/// Immutable view over a [`Measurement`].
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct MeasurementSnapshot {
    pub unit: Unit,
    pub count: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: Option<f64>,
    pub last: Option<f64>,
}

impl Default for Measurement {
    fn default() -> Self {
        Self::new(Unit::default())
    }
}

impl Measurement {
    pub fn new(unit: Unit) -> Self {
        Self {
            unit,
            count: 0,
            min: 0.0,
            max: 0.0,
            sum: 0.0,
            last: 0.0,
        }
    }

    /// Adds one sample.
    pub fn record(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
    }

    /// Clears every statistic; the unit label is kept.
    pub fn reset(&mut self) {
        *self = Self::new(self.unit);
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Sum of every recorded sample.
    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn snapshot(&self) -> MeasurementSnapshot {
        if self.count == 0 {
            return MeasurementSnapshot {
                unit: self.unit,
                count: 0,
                min: None,
                max: None,
                avg: None,
                last: None,
            };
        }

        MeasurementSnapshot {
            unit: self.unit,
            count: self.count,
            min: Some(self.min),
            max: Some(self.max),
            avg: Some(self.sum / self.count as f64),
            last: Some(self.last),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_measurement() {
        let m = Measurement::new(Unit::Pages);
        let snap = m.snapshot();
        assert_eq!(snap.count, 0);
        assert_eq!(snap.unit, Unit::Pages);
        assert!(snap.min.is_none());
        assert!(snap.max.is_none());
        assert!(snap.avg.is_none());
        assert!(snap.last.is_none());
    }

    #[test]
    fn test_record_statistics() {
        let mut m = Measurement::new(Unit::Kilobytes);
        let values = [42.0, 7.0, 19.0, 100.0, 7.5];
        for v in values {
            m.record(v);
        }

        let snap = m.snapshot();
        assert_eq!(snap.count, values.len() as u64);
        assert_eq!(snap.min, Some(7.0));
        assert_eq!(snap.max, Some(100.0));
        assert_eq!(snap.last, Some(7.5));

        let mean = values.iter().sum::<f64>() / values.len() as f64;
        assert!((snap.avg.unwrap() - mean).abs() < 1e-9);
        assert!((m.sum() - 175.5).abs() < 1e-9);
    }

    #[test]
    fn test_record_single_negative_value() {
        let mut m = Measurement::default();
        m.record(-3.0);
        let snap = m.snapshot();
        assert_eq!(snap.min, Some(-3.0));
        assert_eq!(snap.max, Some(-3.0));
        assert_eq!(snap.avg, Some(-3.0));
    }

    #[test]
    fn test_bytes_to_kb_keeps_fraction() {
        assert_eq!(bytes_to_kb(73400320), 71680.0);
        assert_eq!(bytes_to_kb(1536), 1.5);
        assert_eq!(bytes_to_kb(0), 0.0);
    }

    #[test]
    fn test_reset_keeps_unit() {
        let mut m = Measurement::new(Unit::Percent);
        m.record(12.5);
        m.record(13.5);
        m.reset();

        assert!(m.is_empty());
        assert_eq!(m.unit(), Unit::Percent);
        assert_eq!(m.sum(), 0.0);

        m.record(1.0);
        assert_eq!(m.snapshot().min, Some(1.0));
    }
}
