//! The publish transport contract and the restart hook.
//!
//! The pipeline only ever needs "publish this payload on that topic" and
//! "reboot the device"; broker connection management, reconnect/backoff and
//! the reset mechanism all live behind these traits. The node's sole
//! top-level recovery strategy is the restart: it does not attempt
//! reconnect logic itself.

use log::info;

use crate::error::PublishError;

/// Narrow publish interface, decoupling the pipeline from any one broker
/// client.
pub trait Publisher {
    async fn publish(&mut self, topic: &str, payload: &str) -> Result<(), PublishError>;
}

/// Full device restart. On hardware this reboots and never returns; test
/// doubles record the request instead.
pub trait Restart {
    fn request_restart(&self);
}

/// Log-only publisher: exercises the whole pipeline without a broker.
pub struct LogPublisher;

impl Publisher for LogPublisher {
    async fn publish(&mut self, topic: &str, payload: &str) -> Result<(), PublishError> {
        info!("publish {}: {}", topic, payload);
        Ok(())
    }
}
