//! Bluetooth Module
//!
//! Talks to the Coyote over BLE characteristics.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      DeviceSession                        │
//! │  (connect, power writes, pattern retransmit, notifies)    │
//! └─────────────────────┬────────────────────────────────────┘
//!                       │
//!         ┌─────────────┴─────────────┐
//!         │                           │
//!         ▼                           ▼
//! ┌────────────────┐          ┌──────────────┐
//! │  GattTransport │          │   Protocol   │
//! │                │          │              │
//! │ - read/write   │          │ - UUIDs      │
//! │ - notify       │          │ - 3-byte     │
//! │ - loopback     │          │   codecs     │
//! └────────────────┘          └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Characteristic identifiers and payload codecs
//! - [`transport`] - The characteristic access seam implemented by the host
//! - [`loopback`] - In-memory transport for tests and demos
//! - [`session`] - Connection state machine and retransmit timer

pub mod loopback;
pub mod protocol;
pub mod session;
pub mod transport;

pub use session::{DeviceSession, SessionConfig, SessionError};
pub use transport::{GattTransport, TransportError};
