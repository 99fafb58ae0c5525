// SPDX-License-Identifier: MIT
pub mod acquisition;
pub mod analyser;
pub mod recorder;
pub mod simulated;
pub mod transport;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use self::transport::{Resource, Transport};

/// An open instrument plus what configuring it established.
pub struct Connection {
    transport: Box<dyn Transport>,
    resource: Resource,
    frequency_axis: Option<Vec<f64>>,
}

impl Connection {
    #[must_use]
    pub fn new(transport: Box<dyn Transport>, resource: Resource) -> Self {
        Self {
            transport,
            resource,
            frequency_axis: None,
        }
    }

    pub fn transport(&mut self) -> &mut dyn Transport {
        self.transport.as_mut()
    }

    #[must_use]
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    #[must_use]
    pub fn frequency_axis(&self) -> Option<&[f64]> {
        self.frequency_axis.as_deref()
    }

    pub fn set_frequency_axis(&mut self, axis: Vec<f64>) {
        self.frequency_axis = Some(axis);
    }
}

/// The connection slot shared by control handlers and the acquisition
/// loop. Whoever holds the lock owns the instrument for that exchange.
pub type SharedConnection = Arc<Mutex<Option<Connection>>>;

pub(crate) fn lock_connection(connection: &SharedConnection) -> MutexGuard<'_, Option<Connection>> {
    connection.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Measuring and recording switches. Written only by control handlers on
/// the dispatcher thread; read by the acquisition loop each tick.
#[derive(Debug, Default)]
pub struct AcquisitionFlags {
    measuring: AtomicBool,
    recording: AtomicBool,
}

impl AcquisitionFlags {
    #[must_use]
    pub fn measuring(&self) -> bool {
        self.measuring.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    pub fn set_measuring(&self, on: bool) {
        self.measuring.store(on, Ordering::SeqCst);
    }

    pub fn set_recording(&self, on: bool) {
        self.recording.store(on, Ordering::SeqCst);
    }
}

/// `n` evenly spaced values from `start` to `stop` inclusive.
#[must_use]
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            #[allow(clippy::cast_precision_loss)]
            let step = (stop - start) / (n - 1) as f64;
            #[allow(clippy::cast_precision_loss)]
            let mut axis: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
            // land exactly on the end point
            axis[n - 1] = stop;
            axis
        }
    }
}
