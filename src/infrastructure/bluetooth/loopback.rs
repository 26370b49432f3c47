//! In-memory stand-in for a paired Coyote.
//!
//! Keeps one value per characteristic, records every write, and lets callers
//! push notifications or make writes fail.

use crate::domain::models::{ActuatorPattern, PowerLevels};
use crate::infrastructure::bluetooth::protocol::{
    self, Characteristic, ConfigRegister,
};
use crate::infrastructure::bluetooth::transport::{GattTransport, TransportError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, Mutex};
use tracing::trace;

/// Initial register contents of a simulated device.
#[derive(Debug, Clone, Copy)]
pub struct LoopbackDevice {
    pub max_power: u16,
    pub power_step: u8,
    pub battery_level: u8,
    pub power: PowerLevels,
    pub pattern_a: ActuatorPattern,
    pub pattern_b: ActuatorPattern,
}

impl Default for LoopbackDevice {
    fn default() -> Self {
        Self {
            max_power: 2000,
            power_step: 7,
            battery_level: 100,
            power: PowerLevels::ZERO,
            pattern_a: ActuatorPattern::default(),
            pattern_b: ActuatorPattern::default(),
        }
    }
}

#[derive(Default)]
struct Registers {
    values: HashMap<Characteristic, Vec<u8>>,
    writes: Vec<(Characteristic, Vec<u8>)>,
    subscribers: HashMap<Characteristic, Vec<mpsc::UnboundedSender<Vec<u8>>>>,
}

pub struct LoopbackTransport {
    registers: Mutex<Registers>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl LoopbackTransport {
    pub fn new(device: LoopbackDevice) -> Self {
        let mut values = HashMap::new();
        values.insert(
            Characteristic::Config,
            protocol::encode_config(ConfigRegister {
                max_power: device.max_power,
                power_step: device.power_step,
            })
            .to_vec(),
        );
        values.insert(
            Characteristic::Power,
            protocol::encode_power(device.power).to_vec(),
        );
        values.insert(
            Characteristic::PatternA,
            protocol::encode_pattern(device.pattern_a).to_vec(),
        );
        values.insert(
            Characteristic::PatternB,
            protocol::encode_pattern(device.pattern_b).to_vec(),
        );
        values.insert(Characteristic::Battery, vec![device.battery_level]);

        Self {
            registers: Mutex::new(Registers {
                values,
                ..Default::default()
            }),
            fail_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
        }
    }

    /// Make every subsequent write fail until cleared.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent read fail until cleared.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// All acknowledged writes, oldest first.
    pub async fn writes(&self) -> Vec<(Characteristic, Vec<u8>)> {
        self.registers.lock().await.writes.clone()
    }

    pub async fn writes_to(&self, characteristic: Characteristic) -> Vec<Vec<u8>> {
        self.registers
            .lock()
            .await
            .writes
            .iter()
            .filter(|(c, _)| *c == characteristic)
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub async fn value(&self, characteristic: Characteristic) -> Option<Vec<u8>> {
        self.registers.lock().await.values.get(&characteristic).cloned()
    }

    /// Simulate a device-side change: store the value and notify subscribers.
    pub async fn notify(&self, characteristic: Characteristic, value: &[u8]) {
        let mut registers = self.registers.lock().await;
        registers.values.insert(characteristic, value.to_vec());
        if let Some(subscribers) = registers.subscribers.get_mut(&characteristic) {
            subscribers.retain(|tx| tx.send(value.to_vec()).is_ok());
        }
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new(LoopbackDevice::default())
    }
}

#[async_trait]
impl GattTransport for LoopbackTransport {
    async fn read(&self, characteristic: Characteristic) -> Result<Vec<u8>, TransportError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(TransportError::gatt(characteristic, "read", "injected failure"));
        }
        self.registers
            .lock()
            .await
            .values
            .get(&characteristic)
            .cloned()
            .ok_or_else(|| TransportError::gatt(characteristic, "read", "not readable"))
    }

    async fn write(
        &self,
        characteristic: Characteristic,
        value: &[u8],
    ) -> Result<(), TransportError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TransportError::gatt(characteristic, "write", "injected failure"));
        }
        trace!("loopback write {}: {:02X?}", characteristic, value);
        let mut registers = self.registers.lock().await;
        registers.values.insert(characteristic, value.to_vec());
        registers.writes.push((characteristic, value.to_vec()));
        Ok(())
    }

    async fn subscribe(
        &self,
        characteristic: Characteristic,
    ) -> Result<mpsc::UnboundedReceiver<Vec<u8>>, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.registers
            .lock()
            .await
            .subscribers
            .entry(characteristic)
            .or_default()
            .push(tx);
        Ok(rx)
    }
}
