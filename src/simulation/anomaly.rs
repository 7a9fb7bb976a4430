use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::{Alert, Reading, Severity};

/// Deviation thresholds (°C, strict inequalities)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyThresholds {
    /// |measured - target| above this is anomalous
    pub warning_c: f64,
    /// |measured - target| above this is critical
    pub critical_c: f64,
}

impl Default for AnomalyThresholds {
    fn default() -> Self {
        Self {
            warning_c: 2.0,
            critical_c: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Normal,
    Warning,
    Critical,
}

impl Classification {
    pub fn is_anomalous(&self) -> bool {
        !matches!(self, Classification::Normal)
    }

    pub fn severity(&self) -> Option<Severity> {
        match self {
            Classification::Normal => None,
            Classification::Warning => Some(Severity::Warning),
            Classification::Critical => Some(Severity::Critical),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnomalyDetector {
    thresholds: AnomalyThresholds,
}

impl AnomalyDetector {
    pub fn new(thresholds: AnomalyThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> AnomalyThresholds {
        self.thresholds
    }

    pub fn classify(&self, measured_c: f64, target_c: f64) -> Classification {
        let deviation = (measured_c - target_c).abs();
        if deviation > self.thresholds.critical_c {
            Classification::Critical
        } else if deviation > self.thresholds.warning_c {
            Classification::Warning
        } else {
            Classification::Normal
        }
    }

    pub fn classify_reading(&self, reading: &Reading) -> Classification {
        self.classify(reading.temperature_c, reading.target_temperature_c)
    }

    /// Alert for an anomalous reading, `None` otherwise
    pub fn alert_for<R: Rng>(&self, reading: &Reading, rng: &mut R) -> Option<Alert> {
        if !reading.anomaly {
            return None;
        }
        self.classify_reading(reading)
            .severity()
            .map(|severity| Alert::from_reading(reading, severity, rng))
    }
}
