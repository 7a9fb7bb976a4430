//! Alert dispatcher: stamps alerts and hands them to the notification channel.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

use crate::domain::Alert;
use crate::sinks::{AlertChannel, SinkError};

#[derive(Clone)]
pub struct AlertDispatcher {
    channel: Arc<dyn AlertChannel>,
}

impl AlertDispatcher {
    pub fn new(channel: Arc<dyn AlertChannel>) -> Self {
        Self { channel }
    }

    /// Stamp `created_at` with `now` if absent, then forward.
    ///
    /// `now` is the caller's clock; the engine passes simulated tick time so `created_at`
    /// never precedes the reading's timestamp. Channel failures are returned to the caller
    /// unchanged; the alert keeps its stamp so a retry or a history record sees the same value.
    pub async fn dispatch(
        &self,
        alert: &mut Alert,
        now: DateTime<Utc>,
    ) -> Result<(), SinkError> {
        if alert.created_at.is_none() {
            alert.created_at = Some(now);
        }
        self.channel.dispatch(alert).await?;
        debug!(alert_id = %alert.id, vehicle_id = %alert.vehicle_id, "alert dispatched");
        Ok(())
    }
}
