//! Aeris node binary
//!
//! Loads the TOML config, installs the fan-out logger, wires the
//! connectors to the core supervisor, and hands over control. The
//! process exits when the supervisor requests a restart; a process
//! supervisor (systemd, runit) brings it back up, which is the host
//! equivalent of a device reset.

#![deny(unsafe_code)]

mod config;
mod logger;
mod platform;
mod sim;

use std::collections::VecDeque;
use std::env;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use log::{error, info};

use aeris_core::cache::WeatherCache;
use aeris_core::fleet::Fleet;
use aeris_core::logfile::RotatingFile;
use aeris_core::retry::StdSleeper;
use aeris_core::supervisor::{StatusQueue, Supervisor, SupervisorParts};
use aeris_core::telemetry::TopicSet;
use aeris_core::time::SystemClock;
use aeris_connectors::mqtt::MqttSession;
use aeris_connectors::ota::HttpUpdater;
use aeris_connectors::weather::OwmClient;
use aeris_connectors::wifi::{TcpProbe, WifiManager};

use config::NodeConfig;
use platform::{ConsoleLed, HostNic, StdPlatform, SystemRtc};

const DEFAULT_CONFIG_PATH: &str = "aeris.toml";

fn main() -> ExitCode {
    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = match NodeConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("aeris: {e}");
            return ExitCode::FAILURE;
        }
    };

    let logfile = config
        .logfile
        .as_ref()
        .map(|section| RotatingFile::new(&section.path, section.max_bytes, section.max_backups));
    let status: StatusQueue = Arc::new(Mutex::new(VecDeque::new()));
    if let Err(e) = logger::init(logfile.clone(), status.clone()) {
        eprintln!("aeris: could not install logger: {e}");
        return ExitCode::FAILURE;
    }

    info!("aeris v{} loading from {config_path}", aeris_core::VERSION);

    let topics = TopicSet::for_user(&config.node.user);
    let session = MqttSession::new(config.mqtt_credentials(), topics.command.clone());
    let link = WifiManager::new(
        Box::new(HostNic),
        Box::new(TcpProbe::default()),
        Box::new(StdSleeper),
        config.candidates(),
    );
    let weather = OwmClient::new(
        config.weather.api_key.clone(),
        config.weather.latitude,
        config.weather.longitude,
    );
    let fleet = Fleet::initialize_all(sim::fleet_configs(), config.sensors.max_failures);

    let parts = SupervisorParts {
        link: Box::new(link),
        broker: Box::new(session),
        platform: Box::new(StdPlatform),
        led: Some(Box::new(ConsoleLed::default())),
        rtc: Box::new(SystemRtc),
        updater: Box::new(HttpUpdater::new(config.update.target_dir.clone())),
        clock: Box::new(SystemClock),
        sleeper: Box::new(StdSleeper),
        fleet,
        cache: WeatherCache::new(Box::new(weather), config.weather.fetch_interval_ticks),
        logfile,
        status_queue: status,
    };

    let mut supervisor = Supervisor::new(config.supervisor(), topics, parts);
    supervisor.start();

    // Reached only when the platform restart did not terminate the
    // process itself.
    error!("supervisor stopped, exiting for restart");
    ExitCode::FAILURE
}
