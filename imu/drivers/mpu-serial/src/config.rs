use crate::history::WeightSchedule;
use imu_traits::{Float, ImuError};
use std::time::Duration;

pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_MARKERS: [&str; 2] = ["Gyro", "Accel"];

/// Tuning knobs for [`crate::MpuSerialReader`].
///
/// The smoothing schedule and gain are empirical; the defaults feel right
/// for a 60 Hz consumer loop fed by a ~100 Hz sensor.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    pub baud_rate: u32,
    /// Upper bound on a single line read.
    pub read_timeout: Duration,
    /// Pause after opening a candidate port before reading from it.
    pub settle_delay: Duration,
    /// Lines read from each candidate port during discovery.
    pub handshake_lines: usize,
    /// Substrings that identify the sensor during discovery.
    pub markers: Vec<String>,
    pub history_len: usize,
    pub weights: WeightSchedule,
    pub gain: Float,
    pub poll_interval: Duration,
    /// How long `stop()` waits for the polling thread.
    pub stop_timeout: Duration,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_millis(50),
            settle_delay: Duration::from_millis(50),
            handshake_lines: 4,
            markers: DEFAULT_MARKERS.iter().map(|m| m.to_string()).collect(),
            history_len: 8,
            weights: WeightSchedule::default(),
            gain: 1.8,
            poll_interval: Duration::from_millis(10),
            stop_timeout: Duration::from_millis(300),
        }
    }
}

impl ReaderConfig {
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn validate(&self) -> Result<(), ImuError> {
        if self.history_len == 0 {
            return Err(ImuError::ConfigurationError(
                "history_len must be at least 1".to_string(),
            ));
        }
        if self.handshake_lines == 0 {
            return Err(ImuError::ConfigurationError(
                "handshake_lines must be at least 1".to_string(),
            ));
        }
        if self.markers.is_empty() || self.markers.iter().any(|m| m.is_empty()) {
            return Err(ImuError::ConfigurationError(
                "at least one non-empty handshake marker is required".to_string(),
            ));
        }
        let WeightSchedule { start, end } = self.weights;
        if !(start.is_finite() && end.is_finite()) || start < 0.0 || end < 0.0 {
            return Err(ImuError::ConfigurationError(format!(
                "weights must be finite and non-negative, got {} -> {}",
                start, end
            )));
        }
        if start > end {
            return Err(ImuError::ConfigurationError(format!(
                "weights must not decrease with recency, got {} -> {}",
                start, end
            )));
        }
        if !self.gain.is_finite() {
            return Err(ImuError::ConfigurationError(format!(
                "gain must be finite, got {}",
                self.gain
            )));
        }
        Ok(())
    }

    /// True if `line` carries one of the handshake markers.
    pub fn is_handshake(&self, line: &str) -> bool {
        self.markers.iter().any(|m| line.contains(m.as_str()))
    }
}
