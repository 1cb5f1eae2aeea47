pub mod config;
pub mod fallback;
pub mod history;
pub mod line;
pub mod port;

pub use config::ReaderConfig;
pub use history::{History, WeightSchedule};
pub use imu_traits::{ConnectionState, Euler, ImuError, Reading, TiltReader, Vector2, Vector3};
pub use line::{parse_axis_line, parse_orientation_line};
pub use port::{LineSource, PortProvider, SerialLine, SystemPorts};

use log::{debug, error, info, trace, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

struct Worker<L> {
    running: Arc<RwLock<bool>>,
    handle: JoinHandle<L>,
}

/// Background reader for MPU boards that print `X:.. Y:.. Z:..` text lines.
///
/// The polling thread owns the serial handle while it runs and hands it
/// back on exit. Consumers only ever touch the history mutex, and only for
/// one append or one snapshot at a time. Every polling thread gets its own
/// history, so a thread detached by `stop()` cannot leak samples into the
/// next session.
pub struct MpuSerialReader<P: PortProvider = SystemPorts> {
    provider: P,
    config: ReaderConfig,
    state: RwLock<ConnectionState>,
    port_name: RwLock<Option<String>>,
    // Open port not yet handed to a polling thread.
    idle: Mutex<Option<P::Link>>,
    history: RwLock<Arc<Mutex<History<Reading>>>>,
    worker: Mutex<Option<Worker<P::Link>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn is_running(flag: &RwLock<bool>) -> bool {
    flag.read().map(|guard| *guard).unwrap_or(false)
}

impl MpuSerialReader<SystemPorts> {
    pub fn new() -> Self {
        MpuSerialReader::build(SystemPorts, ReaderConfig::default())
    }

    pub fn with_config(config: ReaderConfig) -> Result<Self, ImuError> {
        MpuSerialReader::with_provider(SystemPorts, config)
    }
}

impl Default for MpuSerialReader<SystemPorts> {
    fn default() -> Self {
        MpuSerialReader::new()
    }
}

impl<P: PortProvider> MpuSerialReader<P> {
    pub fn with_provider(provider: P, config: ReaderConfig) -> Result<Self, ImuError> {
        config.validate()?;
        Ok(MpuSerialReader::build(provider, config))
    }

    fn build(provider: P, config: ReaderConfig) -> Self {
        let history = RwLock::new(Arc::new(Mutex::new(History::new(config.history_len))));
        MpuSerialReader {
            provider,
            config,
            state: RwLock::new(ConnectionState::Disconnected),
            port_name: RwLock::new(None),
            idle: Mutex::new(None),
            history,
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    pub fn port_name(&self) -> Option<String> {
        self.port_name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.worker)
            .as_ref()
            .is_some_and(|w| is_running(&w.running) && !w.handle.is_finished())
    }

    fn current_history(&self) -> Arc<Mutex<History<Reading>>> {
        self.history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn history_len(&self) -> usize {
        lock(&self.current_history()).len()
    }

    /// Tries every available port and keeps the first one whose early
    /// output carries a handshake marker. Returns false, with no port left
    /// open, when none does; the caller is expected to fall back to another
    /// input source.
    pub fn discover_and_connect(&self) -> bool {
        if self.state() == ConnectionState::Connected {
            return true;
        }
        self.set_state(ConnectionState::Scanning);

        let ports = match self.provider.list_ports() {
            Ok(ports) => ports,
            Err(e) => {
                warn!("Failed to enumerate serial ports: {}", e);
                self.set_state(ConnectionState::Disconnected);
                return false;
            }
        };

        for name in ports {
            match self.try_handshake(&name) {
                Ok(Some(link)) => {
                    info!("MPU connected on {}", name);
                    self.attach(name, link);
                    return true;
                }
                Ok(None) => debug!("No handshake from {}", name),
                Err(e) => debug!("Skipping {}: {}", name, e),
            }
        }

        warn!("No serial port answered with {:?}", self.config.markers);
        self.set_state(ConnectionState::Disconnected);
        false
    }

    // The candidate is dropped, and so closed, on every path but a match.
    fn try_handshake(&self, name: &str) -> Result<Option<P::Link>, ImuError> {
        let mut link = self
            .provider
            .open(name, self.config.baud_rate, self.config.read_timeout)?;
        thread::sleep(self.config.settle_delay);

        for _ in 0..self.config.handshake_lines {
            if let Some(line) = link.read_line()? {
                trace!("{}: {}", name, line);
                if self.config.is_handshake(&line) {
                    return Ok(Some(link));
                }
            }
        }
        Ok(None)
    }

    /// Opens `port_name` directly, without the handshake.
    pub fn connect(&self, port_name: &str) -> Result<(), ImuError> {
        if self.state() == ConnectionState::Connected {
            return Err(ImuError::DeviceError(format!(
                "already connected to {}",
                self.port_name().unwrap_or_default()
            )));
        }

        let link = self
            .provider
            .open(port_name, self.config.baud_rate, self.config.read_timeout)
            .inspect_err(|_| self.set_state(ConnectionState::Disconnected))?;
        info!("MPU opened on {}", port_name);
        self.attach(port_name.to_string(), link);
        Ok(())
    }

    fn attach(&self, name: String, link: P::Link) {
        *lock(&self.idle) = Some(link);
        *self.port_name.write().unwrap_or_else(PoisonError::into_inner) = Some(name);
        self.set_state(ConnectionState::Connected);
    }

    /// Spawns the polling thread. Returns false when not connected; a second
    /// call while polling returns true without spawning another thread.
    pub fn start(&self) -> bool {
        if self.state() != ConnectionState::Connected {
            return false;
        }

        let mut worker = lock(&self.worker);
        if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            return true;
        }

        let Some(mut link) = lock(&self.idle).take() else {
            warn!("No open port to poll");
            return false;
        };

        let history = Arc::new(Mutex::new(History::new(self.config.history_len)));
        *self.history.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&history);
        let running = Arc::new(RwLock::new(true));
        let flag = Arc::clone(&running);
        let poll_interval = self.config.poll_interval;

        let spawned = thread::Builder::new()
            .name("mpu-serial-poll".to_string())
            .spawn(move || {
                while is_running(&flag) {
                    poll_once(&mut link, &history);
                    // Sleep for a short duration to prevent busy waiting
                    thread::sleep(poll_interval);
                }
                link
            });

        match spawned {
            Ok(handle) => {
                *worker = Some(Worker { running, handle });
                true
            }
            Err(e) => {
                error!("Failed to spawn polling thread: {}", e);
                self.set_state(ConnectionState::Disconnected);
                false
            }
        }
    }

    /// Stops polling, closes the port and resets to `Disconnected`.
    /// Safe to call at any time, any number of times.
    pub fn stop(&self) {
        let worker = lock(&self.worker).take();
        if let Some(Worker { running, handle }) = worker {
            *running.write().unwrap_or_else(PoisonError::into_inner) = false;

            let deadline = Instant::now() + self.config.stop_timeout;
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(2));
            }

            if handle.is_finished() {
                match handle.join() {
                    Ok(link) => drop(link),
                    Err(_) => warn!("Polling thread panicked"),
                }
            } else {
                warn!(
                    "Polling thread still busy after {:?}, detaching it",
                    self.config.stop_timeout
                );
            }
        }

        drop(lock(&self.idle).take());
        *self.port_name.write().unwrap_or_else(PoisonError::into_inner) = None;
        lock(&self.current_history()).clear();
        self.set_state(ConnectionState::Disconnected);
    }

    /// Weighted-smoothed tilt scaled by the configured gain. Zero when not
    /// connected or before the first reading.
    pub fn snapshot(&self) -> Reading {
        if self.state() != ConnectionState::Connected {
            return Reading::ZERO;
        }

        let history = self.current_history();
        let history = match history.lock() {
            Ok(history) => history,
            Err(e) => {
                error!("Failed to lock history: {}", e);
                return Reading::ZERO;
            }
        };
        history
            .weighted_mean(&self.config.weights)
            .map(|mean| mean.scale(self.config.gain))
            .unwrap_or(Reading::ZERO)
    }
}

/// One polling step: a bounded read, then parse and append. Read and parse
/// failures are expected on a noisy line and are dropped here on purpose.
pub(crate) fn poll_once<L: LineSource>(
    link: &mut L,
    history: &Mutex<History<Reading>>,
) -> Option<Reading> {
    let line = match link.read_line() {
        Ok(Some(line)) => line,
        Ok(None) => return None,
        Err(e) => {
            debug!("Transient read error: {}", e);
            return None;
        }
    };

    match parse_axis_line(&line) {
        Ok(reading) => {
            match history.lock() {
                Ok(mut history) => history.push(reading),
                Err(e) => error!("Failed to lock history: {}", e),
            }
            Some(reading)
        }
        Err(e) => {
            trace!("Discarding line: {}", e);
            None
        }
    }
}

impl<P: PortProvider> TiltReader for MpuSerialReader<P> {
    fn snapshot(&self) -> Reading {
        MpuSerialReader::snapshot(self)
    }

    fn state(&self) -> ConnectionState {
        MpuSerialReader::state(self)
    }

    fn stop(&self) {
        MpuSerialReader::stop(self)
    }
}

impl<P: PortProvider> Drop for MpuSerialReader<P> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub const READ_ERROR: &str = "<read error>";

    /// In-memory ports, each replaying a fixed list of lines.
    #[derive(Clone, Default)]
    pub struct ScriptedPorts {
        pub ports: Vec<(String, Vec<String>)>,
        pub unopenable: Vec<String>,
        /// Ports that stall this long before every read.
        pub slow: Vec<(String, Duration)>,
        pub open_handles: Arc<AtomicUsize>,
    }

    impl ScriptedPorts {
        pub fn with_port(mut self, name: &str, lines: &[&str]) -> Self {
            self.ports.push((
                name.to_string(),
                lines.iter().map(|l| l.to_string()).collect(),
            ));
            self
        }

        pub fn open_count(&self) -> usize {
            self.open_handles.load(Ordering::SeqCst)
        }
    }

    pub struct ScriptedLink {
        lines: VecDeque<String>,
        delay: Duration,
        open_handles: Arc<AtomicUsize>,
    }

    impl ScriptedLink {
        pub fn new(lines: &[&str]) -> Self {
            ScriptedLink {
                lines: lines.iter().map(|l| l.to_string()).collect(),
                delay: Duration::ZERO,
                open_handles: Arc::new(AtomicUsize::new(1)),
            }
        }
    }

    impl Drop for ScriptedLink {
        fn drop(&mut self) {
            self.open_handles.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl LineSource for ScriptedLink {
        fn read_line(&mut self) -> Result<Option<String>, ImuError> {
            thread::sleep(self.delay);
            match self.lines.pop_front() {
                Some(line) if line == READ_ERROR => {
                    Err(ImuError::ReadError("device went away".to_string()))
                }
                Some(line) => Ok(Some(line).filter(|l| !l.is_empty())),
                None => Ok(None),
            }
        }
    }

    impl PortProvider for ScriptedPorts {
        type Link = ScriptedLink;

        fn list_ports(&self) -> Result<Vec<String>, ImuError> {
            Ok(self.ports.iter().map(|(name, _)| name.clone()).collect())
        }

        fn open(
            &self,
            name: &str,
            _baud_rate: u32,
            _timeout: Duration,
        ) -> Result<ScriptedLink, ImuError> {
            if self.unopenable.iter().any(|n| n == name) {
                return Err(ImuError::DeviceError(format!("{} is busy", name)));
            }
            let (_, lines) = self
                .ports
                .iter()
                .find(|(n, _)| n == name)
                .ok_or_else(|| ImuError::DeviceError(format!("no such port {}", name)))?;
            let delay = self
                .slow
                .iter()
                .find(|(n, _)| n == name)
                .map_or(Duration::ZERO, |(_, d)| *d);
            self.open_handles.fetch_add(1, Ordering::SeqCst);
            Ok(ScriptedLink {
                lines: lines.iter().cloned().collect(),
                delay,
                open_handles: Arc::clone(&self.open_handles),
            })
        }
    }

    pub fn fast_config() -> ReaderConfig {
        ReaderConfig {
            settle_delay: Duration::ZERO,
            poll_interval: Duration::from_millis(1),
            stop_timeout: Duration::from_secs(1),
            ..Default::default()
        }
    }

    pub fn wait_for(cond: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        cond()
    }
}
