//! Accelerometer sample and recording types.

use serde::{Deserialize, Serialize};

/// One accelerometer reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccelSample {
    /// Milliseconds since the recording device's epoch
    pub timestamp_ms: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl AccelSample {
    pub fn new(timestamp_ms: i64, x: f64, y: f64, z: f64) -> Self {
        Self {
            timestamp_ms,
            x,
            y,
            z,
        }
    }

    /// Parse a formatted `timestamp,ax,ay,az` line.
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.split(',').map(str::trim);
        let timestamp_ms = fields.next()?.parse().ok()?;
        let x = fields.next()?.parse().ok()?;
        let y = fields.next()?.parse().ok()?;
        let z = fields.next()?.parse().ok()?;
        if fields.next().is_some() {
            return None;
        }
        Some(Self::new(timestamp_ms, x, y, z))
    }
}

/// A single labelled recording session, samples sorted by timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    /// File name the recording was loaded from
    pub source: String,
    /// Activity label
    pub label: String,
    pub samples: Vec<AccelSample>,
}

impl Recording {
    /// Build a recording; samples are sorted by timestamp.
    pub fn new(
        source: impl Into<String>,
        label: impl Into<String>,
        mut samples: Vec<AccelSample>,
    ) -> Self {
        samples.sort_by_key(|s| s.timestamp_ms);
        Self {
            source: source.into(),
            label: label.into(),
            samples,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Time covered by the recording in milliseconds.
    pub fn span_ms(&self) -> i64 {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => last.timestamp_ms - first.timestamp_ms,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_parsing() {
        let s = AccelSample::parse("1000, 0.5,-1.25, 9.81").unwrap();
        assert_eq!(s, AccelSample::new(1000, 0.5, -1.25, 9.81));

        assert!(AccelSample::parse("1000,0.5,1.0").is_none());
        assert!(AccelSample::parse("1000,0.5,1.0,2.0,3.0").is_none());
        assert!(AccelSample::parse("abc,0.5,1.0,2.0").is_none());
    }

    #[test]
    fn test_recording_sorts_samples() {
        let rec = Recording::new(
            "r.csv",
            "walking",
            vec![
                AccelSample::new(300, 0.0, 0.0, 0.0),
                AccelSample::new(100, 0.0, 0.0, 0.0),
                AccelSample::new(200, 0.0, 0.0, 0.0),
            ],
        );
        let ts: Vec<i64> = rec.samples.iter().map(|s| s.timestamp_ms).collect();
        assert_eq!(ts, vec![100, 200, 300]);
        assert_eq!(rec.span_ms(), 200);
    }
}
