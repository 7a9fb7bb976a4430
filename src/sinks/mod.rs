//! Outbound boundaries: where readings and alerts leave the simulation core.
//!
//! Delivery is at-least-once; duplicate suppression belongs to the receiver.

pub mod channel;
pub mod log;
pub mod webhook;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::{Alert, Reading};

pub use channel::ChannelSink;
pub use log::LogSink;
pub use webhook::WebhookSink;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink unavailable: {0}")]
    Unavailable(String),
    #[error("sink rejected record: {0}")]
    Rejected(String),
    #[error("record could not be encoded: {0}")]
    Encode(String),
}

#[async_trait]
pub trait ReadingSink: Send + Sync {
    async fn emit(&self, reading: &Reading) -> Result<(), SinkError>;
}

#[async_trait]
pub trait AlertChannel: Send + Sync {
    async fn dispatch(&self, alert: &Alert) -> Result<(), SinkError>;
}

#[async_trait]
impl<S: ReadingSink + ?Sized> ReadingSink for Arc<S> {
    async fn emit(&self, reading: &Reading) -> Result<(), SinkError> {
        (**self).emit(reading).await
    }
}

#[async_trait]
impl<S: AlertChannel + ?Sized> AlertChannel for Arc<S> {
    async fn dispatch(&self, alert: &Alert) -> Result<(), SinkError> {
        (**self).dispatch(alert).await
    }
}
