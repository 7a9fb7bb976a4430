use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{AlertChannel, ReadingSink, SinkError};
use crate::domain::{Alert, Reading};

/// Forwards records into a bounded in-process channel; waits for capacity.
#[derive(Debug, Clone)]
pub struct ChannelSink<T> {
    tx: mpsc::Sender<T>,
}

impl<T> ChannelSink<T> {
    pub fn new(tx: mpsc::Sender<T>) -> Self {
        Self { tx }
    }

    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<T>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ReadingSink for ChannelSink<Reading> {
    async fn emit(&self, reading: &Reading) -> Result<(), SinkError> {
        self.tx
            .send(reading.clone())
            .await
            .map_err(|_| SinkError::Unavailable("reading receiver dropped".into()))
    }
}

#[async_trait]
impl AlertChannel for ChannelSink<Alert> {
    async fn dispatch(&self, alert: &Alert) -> Result<(), SinkError> {
        self.tx
            .send(alert.clone())
            .await
            .map_err(|_| SinkError::Unavailable("alert receiver dropped".into()))
    }
}
