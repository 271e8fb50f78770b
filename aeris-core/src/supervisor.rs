//! System supervisor: setup phase, steady-state tick loop, operating modes
//!
//! The supervisor reconciles every independently-failing resource - radio
//! link, broker session, individual sensors, external fetch, RTC - into
//! one health model:
//!
//! - **Setup** is sequential and fail-fast. The link and the broker
//!   session are load-bearing: if either exhausts its retries the node
//!   logs critical, pauses so the log flushes, and restarts. Partial
//!   sensor failure is not fatal; it enters Degraded mode instead.
//! - **The tick loop** repairs in a fixed order each tick: sensor recovery
//!   sweep (rate-limited), link, broker session (+ re-subscribe; sessions
//!   are never assumed persistent), inbound drain, publish. Publish and
//!   poll failures never escalate past the tick boundary - they clear
//!   `broker_up` and the next tick repairs it.
//! - **Modes**: Normal ↔ Degraded tracks the fleet's recovery flag
//!   declaratively. Maintenance suspends publishing and recovery, drains
//!   commands at a tenth of the cadence, and exits only via `reboot`.
//!
//! All device state lives on this struct; nothing is global. Restart is a
//! request to the [`Platform`] plus a loop exit, so tests can observe it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{error, info, warn};

use crate::cache::WeatherCache;
use crate::command::Command;
use crate::errors::SetupError;
use crate::fleet::Fleet;
use crate::logfile::RotatingFile;
use crate::retry::{retry, RetryPolicy, Sleeper};
use crate::telemetry::TopicSet;
use crate::time::{TimeSource, Timestamp};
use crate::traits::{Broker, Link, Platform, Rtc, StatusLed, Updater};

/// Top-level operating mode of the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemMode {
    /// All subsystems healthy.
    Normal,
    /// At least one sensor is Failed; partial data is still published.
    Degraded,
    /// Publishing suspended; only inbound commands are serviced.
    Maintenance,
}

impl std::fmt::Display for SystemMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SystemMode::Normal => "normal",
            SystemMode::Degraded => "degraded",
            SystemMode::Maintenance => "maintenance",
        })
    }
}

/// Lines waiting to be mirrored to the status topic. Shared with the
/// logging sink, drained by the supervisor once per tick.
pub type StatusQueue = Arc<Mutex<VecDeque<String>>>;

/// Bound on queued status lines; oldest dropped first. Transports that
/// buffer a whole record must size for nine measurement channels plus
/// this many mirrored lines.
pub const STATUS_QUEUE_CAP: usize = 32;

/// Push a line onto a status queue, evicting the oldest when full.
pub fn push_status(queue: &StatusQueue, line: String) {
    if let Ok(mut q) = queue.lock() {
        if q.len() >= STATUS_QUEUE_CAP {
            q.pop_front();
        }
        q.push_back(line);
    }
}

/// Static supervisor configuration.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Steady-state loop interval.
    pub tick_interval: Duration,
    /// Retry policy for boot-time link/broker acquisition.
    pub setup_retry: RetryPolicy,
    /// Retry policy for in-loop reconnects.
    pub reconnect_retry: RetryPolicy,
    /// Minimum spacing between sensor recovery sweeps.
    pub recovery_cooldown: Duration,
    /// Base URL prefixed to `update` command filenames.
    pub update_base_url: String,
    /// How many log lines the `logs` command publishes.
    pub log_tail_lines: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(60),
            setup_retry: RetryPolicy::new(7, 15),
            reconnect_retry: RetryPolicy::new(7, 10),
            recovery_cooldown: Duration::from_secs(30 * 60),
            update_base_url: String::new(),
            log_tail_lines: 20,
        }
    }
}

/// Collaborators handed to the supervisor at construction.
pub struct SupervisorParts {
    /// Connectivity manager.
    pub link: Box<dyn Link>,
    /// Broker session manager.
    pub broker: Box<dyn Broker>,
    /// Device-level operations.
    pub platform: Box<dyn Platform>,
    /// Status LED, if one came up at boot (best effort).
    pub led: Option<Box<dyn StatusLed>>,
    /// Battery-backed clock.
    pub rtc: Box<dyn Rtc>,
    /// OTA updater.
    pub updater: Box<dyn Updater>,
    /// Clock used for cooldowns.
    pub clock: Box<dyn TimeSource>,
    /// Sleep seam (light-sleep on hardware, recorded in tests).
    pub sleeper: Box<dyn Sleeper>,
    /// Initialized sensor fleet.
    pub fleet: Fleet,
    /// External weather cache.
    pub cache: WeatherCache,
    /// Local rotating log, if file logging is configured.
    pub logfile: Option<RotatingFile>,
    /// Status lines to mirror to the broker.
    pub status_queue: StatusQueue,
}

/// The root orchestrator.
pub struct Supervisor {
    cfg: SupervisorConfig,
    topics: TopicSet,
    link: Box<dyn Link>,
    broker: Box<dyn Broker>,
    platform: Box<dyn Platform>,
    led: Option<Box<dyn StatusLed>>,
    rtc: Box<dyn Rtc>,
    updater: Box<dyn Updater>,
    clock: Box<dyn TimeSource>,
    sleeper: Box<dyn Sleeper>,
    fleet: Fleet,
    cache: WeatherCache,
    logfile: Option<RotatingFile>,
    status_queue: StatusQueue,
    mode: SystemMode,
    link_up: bool,
    broker_up: bool,
    last_recovery: Timestamp,
    tick_interval: Duration,
    restart_requested: bool,
}

impl Supervisor {
    /// Build a supervisor around its collaborators.
    pub fn new(cfg: SupervisorConfig, topics: TopicSet, parts: SupervisorParts) -> Self {
        let tick_interval = cfg.tick_interval;
        Self {
            cfg,
            topics,
            link: parts.link,
            broker: parts.broker,
            platform: parts.platform,
            led: parts.led,
            rtc: parts.rtc,
            updater: parts.updater,
            clock: parts.clock,
            sleeper: parts.sleeper,
            fleet: parts.fleet,
            cache: parts.cache,
            logfile: parts.logfile,
            status_queue: parts.status_queue,
            mode: SystemMode::Normal,
            link_up: false,
            broker_up: false,
            last_recovery: 0,
            tick_interval,
            restart_requested: false,
        }
    }

    /// Current operating mode.
    pub fn mode(&self) -> SystemMode {
        self.mode
    }

    /// Whether a device restart has been requested.
    pub fn restart_requested(&self) -> bool {
        self.restart_requested
    }

    /// Interval the next steady-state sleep will use.
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Whether the broker session is currently believed usable. This flag
    /// is the single source of truth; every failing call site clears it.
    pub fn broker_up(&self) -> bool {
        self.broker_up
    }

    /// Run setup then the steady-state loop until a restart is requested.
    pub fn start(&mut self) {
        if let Err(e) = self.setup() {
            self.fatal(e);
            return;
        }
        self.run();
    }

    /// Boot-time acquisition of every subsystem, sequential and
    /// fail-fast. Exhaustion on the link or the broker is fatal; partial
    /// sensor failure only degrades.
    pub fn setup(&mut self) -> Result<(), SetupError> {
        info!("aeris v{} starting setup", crate::VERSION);
        self.platform.disable_access_point();

        let link = self.link.as_mut();
        let sleeper = self.sleeper.as_mut();
        retry("wifi link", &self.cfg.setup_retry, sleeper, || {
            link.connect()
        })
        .map_err(|e| SetupError::LinkExhausted {
            attempts: e.attempts,
        })?;
        self.link_up = true;

        // Best effort: a dead RTC only costs us fallback timestamps.
        if let Err(e) = self.rtc.sync() {
            warn!("rtc sync failed during setup: {e}");
        }

        let broker = self.broker.as_mut();
        let sleeper = self.sleeper.as_mut();
        let command_topic = self.topics.command.as_str();
        retry("broker session", &self.cfg.setup_retry, sleeper, || {
            broker.connect()?;
            broker.subscribe(&[command_topic])
        })
        .map_err(|e| SetupError::BrokerExhausted {
            attempts: e.attempts,
        })?;
        self.broker_up = true;

        self.last_recovery = self.clock.now();
        self.refresh_mode();

        // One-time boot status, best effort.
        let cause = self.platform.reset_cause();
        let boot = vec![(
            self.topics.status.clone(),
            format!("INFO - restarted (aeris v{}), cause: {cause}", crate::VERSION),
        )];
        if let Err(e) = self.broker.publish(&boot) {
            warn!("boot status publish failed: {e}");
            self.broker_up = false;
        }
        info!("setup complete, mode {}", self.mode);
        Ok(())
    }

    /// Steady-state loop. Returns once a restart has been requested.
    pub fn run(&mut self) {
        while !self.restart_requested {
            self.tick();
            if self.restart_requested {
                break;
            }
            let interval = match self.mode {
                // Never spin hot in maintenance, but stay responsive
                // enough that a reboot command lands the same hour.
                SystemMode::Maintenance => self.tick_interval * 10,
                _ => self.tick_interval,
            };
            self.sleeper.sleep(interval);
        }
    }

    /// One loop iteration.
    pub fn tick(&mut self) {
        if self.mode == SystemMode::Maintenance {
            self.maintenance_tick();
            return;
        }

        // 1. Rate-limited recovery sweep for Failed sensors.
        let now = self.clock.now();
        let cooldown_ms = self.cfg.recovery_cooldown.as_millis() as u64;
        if self.fleet.recovery_needed() && now.saturating_sub(self.last_recovery) >= cooldown_ms {
            self.fleet.attempt_recovery();
            self.last_recovery = now;
        }

        // 2-3. Link, then broker session on top of it.
        if !self.ensure_connectivity() {
            return; // fatal path already taken
        }

        // 4. Drain inbound commands.
        self.drain_inbound();
        if self.restart_requested {
            return;
        }

        // Deferred RTC alarm work: the ISR only latched a flag.
        if self.rtc.take_alarm() {
            info!("rtc alarm fired; re-syncing clock");
            if let Err(e) = self.rtc.sync() {
                warn!("rtc re-sync failed: {e}");
            }
        }

        // 5. Sensors, then external cache, then aggregate and publish.
        // The order matters for freshness; aggregation reads both.
        let readings = self.fleet.read_all();
        let external = self.cache.tick();
        if self.broker_up {
            let mut record = self.topics.assemble(&readings, &external);
            // Drain only when a publish will actually be attempted, so
            // status lines queued during an outage reach the broker once
            // it recovers instead of vanishing with a dropped record.
            for line in self.drain_status() {
                record.push((self.topics.status.clone(), line));
            }
            if let Err(e) = self.broker.publish(&record) {
                // Repaired by next tick's reconnect-and-resubscribe.
                warn!("publish failed, marking broker down: {e}");
                self.broker_up = false;
            }
        }

        self.refresh_mode();
    }

    /// Maintenance: no publishing, no recovery, just command drain.
    fn maintenance_tick(&mut self) {
        if !self.ensure_connectivity() {
            return;
        }
        self.drain_inbound();
    }

    /// Steps 2-3 of the tick: link first, broker session second. Returns
    /// false when a fatal restart was triggered.
    fn ensure_connectivity(&mut self) -> bool {
        if !self.link.is_up() {
            warn!("wi-fi link is down");
            self.link_up = false;
            // A link drop invalidates the session even if the broker
            // object has not noticed yet.
            self.broker_up = false;

            let link = self.link.as_mut();
            let sleeper = self.sleeper.as_mut();
            match retry("wifi link", &self.cfg.reconnect_retry, sleeper, || {
                link.connect()
            }) {
                Ok(()) => self.link_up = true,
                Err(e) => {
                    self.fatal(SetupError::LinkExhausted {
                        attempts: e.attempts,
                    });
                    return false;
                }
            }
        } else {
            self.link_up = true;
        }

        if self.link_up && !self.broker_up {
            let broker = self.broker.as_mut();
            let sleeper = self.sleeper.as_mut();
            let command_topic = self.topics.command.as_str();
            match retry("broker session", &self.cfg.reconnect_retry, sleeper, || {
                broker.connect()?;
                // Sessions are not persistent; always re-subscribe.
                broker.subscribe(&[command_topic])
            }) {
                Ok(()) => self.broker_up = true,
                Err(e) => {
                    self.fatal(SetupError::BrokerExhausted {
                        attempts: e.attempts,
                    });
                    return false;
                }
            }
        }
        true
    }

    fn drain_inbound(&mut self) {
        if !self.broker_up {
            return;
        }
        let messages = match self.broker.poll_inbound() {
            Ok(messages) => messages,
            Err(e) => {
                // Any fault, timeout included, means connection presumed
                // lost; next tick reconnects and re-subscribes.
                warn!("inbound poll failed, marking broker down: {e}");
                self.broker_up = false;
                return;
            }
        };
        for (topic, payload) in messages {
            info!("received message on {topic}: {payload}");
            match Command::parse(&payload) {
                Ok(command) => self.dispatch(command),
                Err(e) => warn!("dropping inbound command: {e}"),
            }
            if self.restart_requested {
                return;
            }
        }
    }

    fn dispatch(&mut self, command: Command) {
        match command {
            Command::Reboot => {
                info!("reboot command received, restarting in 1s");
                // Ack directly; a queued line would never be flushed.
                let ack = vec![(
                    self.topics.status.clone(),
                    "INFO - reboot command received, restarting".to_string(),
                )];
                if let Err(e) = self.broker.publish(&ack) {
                    warn!("reboot ack publish failed: {e}");
                }
                self.sleeper.sleep(Duration::from_secs(1));
                self.platform.restart();
                self.restart_requested = true;
            }
            Command::Update { filename, checksum } => {
                let url = format!(
                    "{}/{}",
                    self.cfg.update_base_url.trim_end_matches('/'),
                    filename
                );
                info!("update command received for {filename}");
                if self
                    .updater
                    .download_and_replace(&url, &filename, checksum.as_deref())
                {
                    self.push_status(format!("INFO - update of {filename} succeeded"));
                } else {
                    self.push_status(format!("ERROR - update of {filename} failed"));
                }
            }
            Command::ToggleLed => {
                if let Some(led) = &mut self.led {
                    led.toggle();
                }
            }
            Command::ChangeInterval(seconds) => {
                info!("tick interval changed to {seconds}s");
                self.tick_interval = Duration::from_secs(seconds);
            }
            Command::SyncRtc => match self.rtc.sync() {
                Ok(()) => self.push_status("INFO - rtc synced".to_string()),
                Err(e) => self.push_status(format!("ERROR - rtc sync failed: {e}")),
            },
            Command::Config(map) => self.apply_config(map),
            Command::Logs => self.publish_log_tail(),
            Command::Maintenance => {
                self.push_status("WARNING - entering maintenance mode".to_string());
                self.mode = SystemMode::Maintenance;
            }
        }
    }

    fn apply_config(&mut self, map: serde_json::Map<String, serde_json::Value>) {
        for (key, value) in map {
            match (key.as_str(), value.as_u64()) {
                ("tick_interval", Some(seconds)) if seconds > 0 => {
                    self.tick_interval = Duration::from_secs(seconds);
                    info!("config: tick_interval={seconds}s");
                }
                ("max_failures", Some(n)) if n > 0 => {
                    self.fleet.set_max_failures(n as u32);
                    info!("config: max_failures={n}");
                }
                ("recovery_cooldown", Some(seconds)) => {
                    self.cfg.recovery_cooldown = Duration::from_secs(seconds);
                    info!("config: recovery_cooldown={seconds}s");
                }
                _ => warn!("config: ignoring unknown or malformed key {key:?}"),
            }
        }
    }

    fn publish_log_tail(&mut self) {
        let Some(logfile) = &self.logfile else {
            self.push_status("WARNING - no log file configured".to_string());
            return;
        };
        match logfile.tail(self.cfg.log_tail_lines) {
            Ok(lines) if lines.is_empty() => {
                self.push_status("INFO - log file is empty".to_string());
            }
            Ok(lines) => {
                for line in lines {
                    push_status(&self.status_queue, line);
                }
            }
            Err(e) => self.push_status(format!("ERROR - could not read log file: {e}")),
        }
    }

    fn refresh_mode(&mut self) {
        if self.mode == SystemMode::Maintenance {
            return;
        }
        let target = if self.fleet.recovery_needed() {
            SystemMode::Degraded
        } else {
            SystemMode::Normal
        };
        if target != self.mode {
            info!("mode change: {} -> {target}", self.mode);
            self.push_status(format!("WARNING - mode change: {} -> {target}", self.mode));
            if let Some(led) = &mut self.led {
                led.set(target == SystemMode::Degraded);
            }
            self.mode = target;
        }
    }

    /// Fatal path: critical log, pause so the line flushes, restart.
    fn fatal(&mut self, err: SetupError) {
        error!("critical: {err}; restarting the device");
        if let Some(logfile) = &self.logfile {
            let _ = logfile.append(&format!("CRITICAL - {err}; restarting the device"));
        }
        self.sleeper.sleep(self.cfg.setup_retry.escalation_sleep);
        self.platform.restart();
        self.restart_requested = true;
    }

    fn push_status(&self, line: String) {
        push_status(&self.status_queue, line);
    }

    fn drain_status(&mut self) -> Vec<String> {
        match self.status_queue.lock() {
            Ok(mut q) => q.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }
}
