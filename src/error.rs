//! Error types shared across the pipeline.
//!
//! Bus errors are transient by definition: producers retry them a bounded
//! number of times and then substitute a sentinel reading, so they never
//! cross a task boundary. Publish errors are counted by the aggregator and
//! the battery monitor; crossing the configured threshold triggers a device
//! restart.

use core::fmt;

/// A failed bus transaction (I2C transfer, UART exchange, ADC read).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// Device did not acknowledge.
    Nack,
    /// No (complete) response within the transaction window.
    Timeout,
    /// Response received but malformed at the link level.
    Frame,
    /// Response structure or checksum invalid.
    Checksum,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusError::Nack => write!(f, "device did not acknowledge"),
            BusError::Timeout => write!(f, "transaction timed out"),
            BusError::Frame => write!(f, "malformed response"),
            BusError::Checksum => write!(f, "invalid response checksum"),
        }
    }
}

/// Outcome of a failed publish attempt on the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishError {
    /// Transport rejected or dropped the message.
    Transient,
    /// Transport outbox is full.
    QueueFull,
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::Transient => write!(f, "failed to publish to broker"),
            PublishError::QueueFull => write!(f, "publish outbox full"),
        }
    }
}
