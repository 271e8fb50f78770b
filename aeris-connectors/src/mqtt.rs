//! MQTT broker session
//!
//! A thin, synchronous session over `rumqttc`. The supervisor treats the
//! session as disposable: any fault on publish or poll marks it down and
//! the next tick builds a fresh one, so nothing here retries. The
//! connect path registers a retained last-will on the command topic so
//! the dashboard can tell an abnormal drop from a clean reboot.

use std::time::{Duration, Instant};

use log::{debug, info};
use rumqttc::{Client, Connection, Event, LastWill, MqttOptions, Packet, QoS};

use aeris_core::errors::BrokerError;
use aeris_core::traits::Broker;

/// How long connect waits for the CONNACK.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How long subscribe and publish wait for their acks.
const ACK_TIMEOUT: Duration = Duration::from_secs(10);

/// How long each inbound poll blocks before concluding nothing is queued.
const POLL_WINDOW: Duration = Duration::from_millis(500);

/// Request-channel depth handed to `Client::new`. Must exceed the
/// largest record one tick can publish (nine measurement channels plus a
/// full status queue), even though publishes are acked one at a time.
const REQUEST_CHANNEL_CAPACITY: usize = 64;

/// Broker endpoint and account.
#[derive(Debug, Clone)]
pub struct MqttCredentials {
    /// Broker hostname.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Account username.
    pub username: String,
    /// Account key or password.
    pub key: String,
    /// Client identifier presented at connect.
    pub client_id: String,
}

/// One broker session. Rebuilt from scratch on every `connect`.
pub struct MqttSession {
    creds: MqttCredentials,
    lwt_topic: String,
    session: Option<(Client, Connection)>,
    // Publishes that arrived while pumping for some other ack.
    inbox: Vec<(String, String)>,
}

impl MqttSession {
    /// Prepare a session manager. No network activity until `connect`.
    pub fn new(creds: MqttCredentials, lwt_topic: impl Into<String>) -> Self {
        Self {
            creds,
            lwt_topic: lwt_topic.into(),
            session: None,
            inbox: Vec::new(),
        }
    }

    fn options(&self) -> MqttOptions {
        let mut opts = MqttOptions::new(
            self.creds.client_id.clone(),
            self.creds.host.clone(),
            self.creds.port,
        );
        opts.set_credentials(self.creds.username.clone(), self.creds.key.clone());
        opts.set_keep_alive(Duration::from_secs(30));
        opts.set_last_will(LastWill::new(
            self.lwt_topic.clone(),
            "ERROR - connection lost unexpectedly",
            QoS::AtLeastOnce,
            true,
        ));
        opts
    }

    /// Pump the event loop until `stop` matches an incoming packet.
    /// Publishes seen along the way are buffered for the next poll.
    fn pump_until(
        &mut self,
        timeout: Duration,
        mut stop: impl FnMut(&Packet) -> bool,
    ) -> Result<(), String> {
        let Some((_, connection)) = &mut self.session else {
            return Err("no active session".to_string());
        };
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err("timed out waiting for broker ack".to_string());
            }
            match connection.recv_timeout(remaining) {
                Ok(Ok(Event::Incoming(packet))) => {
                    if let Packet::Publish(p) = &packet {
                        self.inbox.push((
                            p.topic.clone(),
                            String::from_utf8_lossy(&p.payload).into_owned(),
                        ));
                    }
                    if stop(&packet) {
                        return Ok(());
                    }
                }
                Ok(Ok(Event::Outgoing(_))) => {}
                Ok(Err(e)) => return Err(e.to_string()),
                Err(_) => return Err("timed out waiting for broker ack".to_string()),
            }
        }
    }
}

impl Broker for MqttSession {
    fn connect(&mut self) -> Result<(), BrokerError> {
        // Drop any previous session; its socket may be half-dead.
        self.session = None;
        self.inbox.clear();

        let (client, connection) = Client::new(self.options(), REQUEST_CHANNEL_CAPACITY);
        self.session = Some((client, connection));
        self.pump_until(CONNECT_TIMEOUT, |p| matches!(p, Packet::ConnAck(_)))
            .map_err(|e| {
                self.session = None;
                BrokerError::Connect(e)
            })?;
        info!("broker session established with {}", self.creds.host);
        Ok(())
    }

    fn subscribe(&mut self, topics: &[&str]) -> Result<(), BrokerError> {
        for topic in topics {
            let Some((client, _)) = &mut self.session else {
                return Err(BrokerError::Subscribe {
                    topic: topic.to_string(),
                    reason: "no active session".to_string(),
                });
            };
            client
                .subscribe(*topic, QoS::AtLeastOnce)
                .map_err(|e| BrokerError::Subscribe {
                    topic: topic.to_string(),
                    reason: e.to_string(),
                })?;
            self.pump_until(ACK_TIMEOUT, |p| matches!(p, Packet::SubAck(_)))
                .map_err(|e| BrokerError::Subscribe {
                    topic: topic.to_string(),
                    reason: e,
                })?;
            debug!("subscribed to {topic}");
        }
        Ok(())
    }

    fn publish(&mut self, record: &[(String, String)]) -> Result<(), BrokerError> {
        // One entry at a time, pumping the connection for its ack before
        // the next enqueue. Enqueueing the whole record up front would
        // wedge on the request channel once a record outgrows it.
        for (topic, payload) in record {
            let Some((client, _)) = &mut self.session else {
                return Err(BrokerError::Publish {
                    topic: topic.clone(),
                    reason: "no active session".to_string(),
                });
            };
            client
                .publish(topic.as_str(), QoS::AtLeastOnce, false, payload.as_bytes())
                .map_err(|e| BrokerError::Publish {
                    topic: topic.clone(),
                    reason: e.to_string(),
                })?;
            self.pump_until(ACK_TIMEOUT, |p| matches!(p, Packet::PubAck(_)))
                .map_err(|e| BrokerError::Publish {
                    topic: topic.clone(),
                    reason: e,
                })?;
        }
        Ok(())
    }

    fn poll_inbound(&mut self) -> Result<Vec<(String, String)>, BrokerError> {
        let mut out = std::mem::take(&mut self.inbox);
        let Some((_, connection)) = &mut self.session else {
            return Err(BrokerError::Inbound("no active session".to_string()));
        };
        let deadline = Instant::now() + POLL_WINDOW;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match connection.recv_timeout(remaining) {
                Ok(Ok(Event::Incoming(Packet::Publish(p)))) => {
                    out.push((
                        p.topic.clone(),
                        String::from_utf8_lossy(&p.payload).into_owned(),
                    ));
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return Err(BrokerError::Inbound(e.to_string())),
                Err(rumqttc::RecvTimeoutError::Timeout) => break,
                Err(e) => return Err(BrokerError::Inbound(format!("{e:?}"))),
            }
        }
        Ok(out)
    }
}
