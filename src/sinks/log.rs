use async_trait::async_trait;
use tracing::{debug, warn};

use super::{AlertChannel, ReadingSink, SinkError};
use crate::domain::{Alert, Reading, Severity};

/// Writes every record as a structured tracing event. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl ReadingSink for LogSink {
    async fn emit(&self, reading: &Reading) -> Result<(), SinkError> {
        debug!(
            vehicle_id = %reading.vehicle_id,
            timestamp = %reading.timestamp.to_rfc3339(),
            temperature_c = reading.temperature_c,
            target_c = reading.target_temperature_c,
            humidity_percent = reading.humidity_percent,
            ambient_c = reading.environment.temperature_c,
            latitude = reading.location.latitude,
            longitude = reading.location.longitude,
            anomaly = reading.anomaly,
            confidence = reading.confidence,
            "reading"
        );
        Ok(())
    }
}

#[async_trait]
impl AlertChannel for LogSink {
    async fn dispatch(&self, alert: &Alert) -> Result<(), SinkError> {
        match alert.severity {
            Severity::Critical => warn!(
                alert_id = %alert.id,
                vehicle_id = %alert.vehicle_id,
                severity = %alert.severity,
                temperature_c = alert.temperature_c,
                target_c = alert.target_temperature_c,
                "CRITICAL: {}",
                alert.message
            ),
            Severity::Warning => warn!(
                alert_id = %alert.id,
                vehicle_id = %alert.vehicle_id,
                severity = %alert.severity,
                temperature_c = alert.temperature_c,
                target_c = alert.target_temperature_c,
                "{}",
                alert.message
            ),
        }
        Ok(())
    }
}
