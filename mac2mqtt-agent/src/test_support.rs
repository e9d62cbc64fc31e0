//! Shared test fixtures: the devkit recording sink wired into the agent's
//! publish seam, plus a scriptable host-controls fake.

use async_trait::async_trait;
use devkit::MockMqttClient;
use rumqttc::QoS;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::host::{BatteryStatus, HostControls, HostError};
use crate::mqtt::{MessageSink, SinkError};

#[async_trait]
impl MessageSink for MockMqttClient {
    async fn publish(&self, topic: &str, retain: bool, payload: Vec<u8>) -> Result<(), SinkError> {
        MockMqttClient::publish(self, topic, QoS::AtMostOnce, retain, payload)
            .await
            .expect("mock publish");
        Ok(())
    }

    async fn subscribe(&self, filter: &str) -> Result<(), SinkError> {
        MockMqttClient::subscribe(self, filter, QoS::AtMostOnce)
            .await
            .expect("mock subscribe");
        Ok(())
    }
}

/// A sink for components under test plus the mock handle for assertions.
pub fn recording_sink() -> (Arc<dyn MessageSink>, MockMqttClient) {
    let mock = MockMqttClient::new();
    (Arc::new(mock.clone()), mock)
}

/// Host controls with scriptable readings and recorded mutations. Readings
/// are independent of recorded writes on purpose: tests prove read-back
/// semantics by making the two disagree.
pub struct FakeHost {
    volume_reading: Mutex<u8>,
    muted_reading: Mutex<bool>,
    battery_reading: Mutex<BatteryStatus>,
    fail_reads: AtomicBool,
    battery_reads: AtomicUsize,
    set_volume_calls: Mutex<Vec<u8>>,
    set_muted_calls: Mutex<Vec<bool>>,
    sleeps: AtomicUsize,
    display_sleeps: AtomicUsize,
    shutdowns: AtomicUsize,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            volume_reading: Mutex::new(0),
            muted_reading: Mutex::new(false),
            battery_reading: Mutex::new(BatteryStatus {
                percent: 100,
                on_ac_power: false,
            }),
            fail_reads: AtomicBool::new(false),
            battery_reads: AtomicUsize::new(0),
            set_volume_calls: Mutex::new(Vec::new()),
            set_muted_calls: Mutex::new(Vec::new()),
            sleeps: AtomicUsize::new(0),
            display_sleeps: AtomicUsize::new(0),
            shutdowns: AtomicUsize::new(0),
        }
    }

    pub fn set_volume_reading(&self, level: u8) {
        *self.volume_reading.lock().unwrap() = level;
    }

    pub fn set_muted_reading(&self, muted: bool) {
        *self.muted_reading.lock().unwrap() = muted;
    }

    pub fn set_battery_reading(&self, status: BatteryStatus) {
        *self.battery_reading.lock().unwrap() = status;
    }

    /// Make every subsequent read fail, as when the OS utility is wedged.
    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub fn battery_reads(&self) -> usize {
        self.battery_reads.load(Ordering::SeqCst)
    }

    pub fn set_volume_calls(&self) -> Vec<u8> {
        self.set_volume_calls.lock().unwrap().clone()
    }

    pub fn set_muted_calls(&self) -> Vec<bool> {
        self.set_muted_calls.lock().unwrap().clone()
    }

    pub fn sleeps(&self) -> usize {
        self.sleeps.load(Ordering::SeqCst)
    }

    pub fn display_sleeps(&self) -> usize {
        self.display_sleeps.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    fn read_error(&self) -> Option<HostError> {
        self.fail_reads.load(Ordering::SeqCst).then(|| HostError::Parse {
            what: "scripted failure",
            output: String::new(),
        })
    }
}

#[async_trait]
impl HostControls for FakeHost {
    async fn volume(&self) -> Result<u8, HostError> {
        match self.read_error() {
            Some(e) => Err(e),
            None => Ok(*self.volume_reading.lock().unwrap()),
        }
    }

    async fn set_volume(&self, level: u8) -> Result<(), HostError> {
        self.set_volume_calls.lock().unwrap().push(level);
        Ok(())
    }

    async fn muted(&self) -> Result<bool, HostError> {
        match self.read_error() {
            Some(e) => Err(e),
            None => Ok(*self.muted_reading.lock().unwrap()),
        }
    }

    async fn set_muted(&self, muted: bool) -> Result<(), HostError> {
        self.set_muted_calls.lock().unwrap().push(muted);
        Ok(())
    }

    async fn battery(&self) -> Result<BatteryStatus, HostError> {
        self.battery_reads.fetch_add(1, Ordering::SeqCst);
        match self.read_error() {
            Some(e) => Err(e),
            None => Ok(*self.battery_reading.lock().unwrap()),
        }
    }

    async fn sleep(&self) -> Result<(), HostError> {
        self.sleeps.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn display_sleep(&self) -> Result<(), HostError> {
        self.display_sleeps.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), HostError> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
