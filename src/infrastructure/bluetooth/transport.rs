//! GATT transport seam.
//!
//! Discovery, pairing and handle resolution belong to whoever implements
//! [`GattTransport`]; the session only speaks in [`Characteristic`]s.

use crate::infrastructure::bluetooth::protocol::Characteristic;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport disconnected")]
    Disconnected,
    #[error("{operation} on {characteristic} characteristic failed: {reason}")]
    Gatt {
        characteristic: Characteristic,
        operation: &'static str,
        reason: String,
    },
}

impl TransportError {
    pub fn gatt(
        characteristic: Characteristic,
        operation: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::Gatt {
            characteristic,
            operation,
            reason: reason.into(),
        }
    }
}

/// Characteristic-level access to a connected device.
///
/// Writes resolve once the transport has acknowledged them.
#[async_trait]
pub trait GattTransport: Send + Sync {
    async fn read(&self, characteristic: Characteristic) -> Result<Vec<u8>, TransportError>;

    async fn write(
        &self,
        characteristic: Characteristic,
        value: &[u8],
    ) -> Result<(), TransportError>;

    /// Enable notifications; every value-changed event arrives on the receiver.
    async fn subscribe(
        &self,
        characteristic: Characteristic,
    ) -> Result<mpsc::UnboundedReceiver<Vec<u8>>, TransportError>;
}
