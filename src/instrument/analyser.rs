// SPDX-License-Identifier: MIT
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail, ensure};

use super::acquisition::AcquisitionLoop;
use super::recorder::Recorder;
use super::transport::{self, Resource};
use super::{AcquisitionFlags, Connection, SharedConnection, linspace, lock_connection};
use crate::config::{SIMULATION, Settings};
use crate::dispatch::queue::TaskSender;
use crate::dispatch::surface::InstrumentControl;
use crate::dispatch::task::DisplayCommand;

const IO_TIMEOUT: Duration = Duration::from_secs(3);

/// Rigol DSA815 setup before the frequency range is applied.
const RESET_COMMANDS: &[&str] = &["*RST", "INIT:CONT OFF", "OUTP:STAT ON"];

/// Setup after the frequency range: bandwidths, detector, sweep timing,
/// linear auto-scaled display, peak-tracking marker 1 and a 1 Hz counter.
const SETUP_COMMANDS: &[&str] = &[
    "SENS:BAND:RES 1KHZ",
    "SENS:BAND:VID 1MHZ",
    "SENS:DET:FUNC RMS",
    "SENS:SWE:TIME:AUTO:RULES ACCURACY",
    "SENS:SWE:TIME:AUTO ON",
    "INIT:IMM; *WAI",
    "DISP:WIN:TRAC:Y:SCALe:SPACing LIN",
    "SENS:POWer:ASCale",
    "CALC:MARK1:STAT ON",
    "CALC:MARK1:CPEak:STATe ON",
    "CALC:MARK:FCOunt:STATe ON",
    "CALC:MARK:FCOunt:RESolution 1HZ",
];

const POINTS_QUERY: &str = ":SENSe:SWEep:POINts?";

/// Instrument-control surface for a swept spectrum analyser. Owns the
/// acquisition thread and joins it on close.
pub struct SpectrumAnalyser {
    connection: SharedConnection,
    flags: Arc<AcquisitionFlags>,
    sender: TaskSender,
    default_instrument: String,
    worker: Option<JoinHandle<()>>,
}

impl SpectrumAnalyser {
    /// Builds the control surface and its acquisition loop without starting
    /// the loop.
    #[must_use]
    pub fn new(settings: &Settings, sender: TaskSender) -> (Self, AcquisitionLoop) {
        let connection: SharedConnection = Arc::new(Mutex::new(None));
        let flags = Arc::new(AcquisitionFlags::default());
        let acquisition = AcquisitionLoop::new(
            Arc::clone(&connection),
            Arc::clone(&flags),
            sender.clone(),
            Recorder::new(&settings.data_folder, settings.snapshot_interval()),
            settings.poll_interval(),
        );
        let analyser = Self {
            connection,
            flags,
            sender,
            default_instrument: settings.instrument.clone(),
            worker: None,
        };
        (analyser, acquisition)
    }

    /// Builds the control surface and starts the acquisition thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn(settings: &Settings, sender: TaskSender) -> Result<Self> {
        let (mut analyser, acquisition) = Self::new(settings, sender);
        let handle = thread::Builder::new()
            .name("acquisition".into())
            .spawn(move || acquisition.run())
            .context("failed to spawn acquisition thread")?;
        analyser.worker = Some(handle);
        Ok(analyser)
    }

    /// Installs an open connection, closing whatever it replaces.
    pub fn attach(&mut self, connection: Connection) {
        let previous = lock_connection(&self.connection).replace(connection);
        if let Some(mut previous) = previous
            && let Err(err) = previous.transport().close()
        {
            log::warn!("closing {} failed: {err}", previous.resource());
        }
    }

    fn with_connection<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = lock_connection(&self.connection);
        let connection = guard
            .as_mut()
            .ok_or(transport::TransportError::NotConnected)?;
        f(connection)
    }
}

impl InstrumentControl for SpectrumAnalyser {
    fn connect(&mut self, target: &str) -> Result<()> {
        let resource: Resource = target.parse()?;
        log::info!("connecting to {resource}");
        let mut transport = transport::open(&resource, IO_TIMEOUT)
            .with_context(|| format!("could not connect to {resource}"))?;
        let idn = transport
            .query("*IDN?")
            .with_context(|| format!("{resource} did not identify itself"))?;
        self.attach(Connection::new(transport, resource));
        log::info!("connected to {idn}");
        self.sender.log(format!("Connected to {idn}"));
        Ok(())
    }

    fn configure(&mut self, start_hz: f64, stop_hz: f64) -> Result<()> {
        ensure!(
            start_hz.is_finite() && stop_hz.is_finite() && start_hz < stop_hz,
            "invalid frequency range {start_hz} Hz .. {stop_hz} Hz"
        );
        let points = self.with_connection(|connection| {
            let transport = connection.transport();
            for command in RESET_COMMANDS {
                transport.write(command)?;
            }
            transport.write(&format!("SENS:FREQ:START {start_hz}"))?;
            transport.write(&format!("SENS:FREQ:STOP {stop_hz}"))?;
            for command in SETUP_COMMANDS {
                transport.write(command)?;
            }
            let reply = transport.query(POINTS_QUERY)?;
            let points: usize = reply
                .trim()
                .parse()
                .with_context(|| format!("sweep point count '{}' is not a number", reply.trim()))?;
            if points < 2 {
                bail!("instrument reports {points} sweep points");
            }
            connection.set_frequency_axis(linspace(start_hz, stop_hz, points));
            connection.transport().write("INIT:CONT ON")?;
            Ok(points)
        })?;
        log::info!("configured {start_hz} Hz .. {stop_hz} Hz with {points} points");
        self.sender.log("Configuration complete.");
        Ok(())
    }

    fn run_raw_command(&mut self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        if text.ends_with('?') {
            self.sender.log("Querying instrument...");
            let response = self.with_connection(|c| Ok(c.transport().query(text)?))?;
            self.sender.log("Response received.");
            self.sender.log(response);
        } else {
            self.with_connection(|c| Ok(c.transport().write(text)?))?;
        }
        Ok(())
    }

    fn query_instruments(&mut self) -> Result<()> {
        let mut instruments = vec![self.default_instrument.clone()];
        if !instruments.iter().any(|i| i.eq_ignore_ascii_case(SIMULATION)) {
            instruments.push(SIMULATION.to_string());
        }
        instruments.retain(|i| !i.trim().is_empty());
        self.sender.send(DisplayCommand::SetInstrumentList { instruments });
        Ok(())
    }

    fn start_measuring(&mut self) -> Result<()> {
        self.flags.set_measuring(true);
        log::info!("measuring started");
        Ok(())
    }

    fn stop_measuring(&mut self) -> Result<()> {
        self.flags.set_measuring(false);
        log::info!("measuring stopped");
        Ok(())
    }

    fn start_recording(&mut self) -> Result<()> {
        self.flags.set_recording(true);
        log::info!("recording started");
        self.sender.log("Recording started.");
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<()> {
        self.flags.set_recording(false);
        log::info!("recording stopped");
        self.sender.log("Recording stopped.");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        log::info!("instrument asked to close");
        self.flags.set_measuring(false);
        self.sender.request_shutdown();
        let joined = match self.worker.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| anyhow!("acquisition thread panicked")),
            None => Ok(()),
        };

        let closed = match lock_connection(&self.connection).take() {
            Some(mut connection) => connection
                .transport()
                .close()
                .with_context(|| format!("failed to close {}", connection.resource())),
            None => Ok(()),
        };
        log::info!("instrument closed");
        joined.and(closed)
    }
}
