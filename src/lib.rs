//! A device-side MQTT connector for feeds, parameters, file management and
//! firmware update. See the crate-level design notes in `DESIGN.md` for how
//! each module maps onto its responsibility.
//!
//! The connector owns no threads: every state transition happens inside a
//! call to [`WolkConnector::process`] or [`WolkConnector::publish`], driven
//! by the caller on whatever schedule it likes.

mod codec;
mod dispatcher;
mod error;
mod file_management;
mod firmware_update;
mod limits;
mod model;
mod mqtt;
mod packet;
mod queue;
mod transport;

pub use error::{ConnectorError, Result};
pub use file_management::{FileManagementHost, FileState};
pub use firmware_update::{FirmwareCheckpoint, FirmwareState, FirmwareUpdateHost};
pub use model::{Attribute, DeviceIdentity, Feed, FeedRegistration, FeedType, FileListEntry, Parameter};
pub use mqtt::InboundFrame;
pub use queue::{OutboundBackend, OutboundMessage, RingQueue};
pub use transport::Transport;

use file_management::FileEngine;
use firmware_update::FirmwareEngine;

/// Construction-time configuration for a [`WolkConnector`].
pub struct ConnectorConfig {
    pub identity: DeviceIdentity,
    /// Bytes of payload per file chunk, before the chunk-size cap in §4.4 is
    /// applied.
    pub chunk_size: usize,
    pub maximum_file_size: u64,
    /// Outbound ring queue byte budget.
    pub queue_capacity_bytes: usize,
    /// `true`: evict oldest on overflow. `false`: reject new pushes.
    pub queue_wrap: bool,
}

/// An event the connector surfaces to the caller out of an inbound platform
/// message that belongs to neither engine — see §4.6's feed/parameter/
/// details/error/time handlers. Returned from [`WolkConnector::process`]
/// rather than invoked as a callback, so the caller stays in control of its
/// own execution context (no callback is ever invoked off-thread; see §5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorEvent {
    ParametersUpdated(Vec<Parameter>),
    PlatformTime(i64),
    PlatformError(String),
    DetailsSynchronization(Vec<FeedRegistration>, Vec<Attribute>),
}

/// The connector context: everything owned by one logical caller (§3
/// Lifecycle, §5 single-threaded ownership). Generic over the transport so
/// tests can swap in an in-memory socket.
pub struct WolkConnector<T: Transport> {
    identity: DeviceIdentity,
    transport: transport::TransportAdapter<T>,
    outbound: RingQueue,
    file_engine: FileEngine,
    firmware_engine: FirmwareEngine,
    attributes: Vec<Attribute>,
    keepalive_accumulator_ms: u64,
    connected: bool,
    next_packet_id: u16,
}

impl<T: Transport> WolkConnector<T> {
    /// `init`: builds the connector context. `file_host` may be absent (the
    /// file management feature then reports `TRANSFER_PROTOCOL_DISABLED`);
    /// `firmware_host` is mandatory, matching §4.5.
    pub fn new(
        config: ConnectorConfig,
        transport: T,
        file_host: Option<Box<dyn FileManagementHost>>,
        firmware_host: Box<dyn firmware_update::FirmwareUpdateHost>,
    ) -> Result<Self> {
        if config.chunk_size <= 2 * limits::HASH_SIZE {
            return Err(ConnectorError::ChunkSizeTooSmall { min: 2 * limits::HASH_SIZE });
        }
        Ok(Self {
            identity: config.identity,
            transport: transport::TransportAdapter::new(transport),
            outbound: RingQueue::new(config.queue_capacity_bytes, config.queue_wrap),
            file_engine: FileEngine::new(file_host, config.maximum_file_size, config.chunk_size),
            firmware_engine: FirmwareEngine::new(firmware_host),
            attributes: Vec::new(),
            keepalive_accumulator_ms: 0,
            connected: false,
            next_packet_id: 1,
        })
    }

    pub fn file_state(&self) -> FileState {
        self.file_engine.state()
    }

    pub fn firmware_state(&self) -> FirmwareState {
        self.firmware_engine.state()
    }

    /// Sends MQTT CONNECT (with the Last Will described in §6) and
    /// subscribes to this device's inbound topic tree.
    pub fn connect(&mut self) -> Result<()> {
        let connect = mqtt::encode_connect(self.identity.key(), self.identity.password(), 60);
        self.transport.send_raw(&connect)?;

        let subscribe_topic = format!("p2d/{}/#", self.identity.key());
        let subscribe = mqtt::encode_subscribe(&subscribe_topic, self.next_packet_id());
        self.transport.send_raw(&subscribe)?;

        self.connected = true;
        self.keepalive_accumulator_ms = 0;
        log::info!("connected as {}", self.identity.key());
        Ok(())
    }

    /// Per §5, disconnect flushes no queued data and does not abort
    /// in-flight flows; the caller may call it at any time.
    pub fn disconnect(&mut self) -> Result<()> {
        if self.connected {
            let disconnect = mqtt::encode_disconnect();
            self.transport.send_raw(&disconnect)?;
        }
        self.connected = false;
        Ok(())
    }

    fn next_packet_id(&mut self) -> u16 {
        let id = self.next_packet_id;
        self.next_packet_id = self.next_packet_id.wrapping_add(1).max(1);
        id
    }

    /// The periodic tick, §4.7: keepalive, receive-and-dispatch, then both
    /// engines' own process step. Returns whatever platform-addressed events
    /// (not owned by either engine) the dispatch produced this tick.
    pub fn process(&mut self, tick_ms: u64) -> Result<Vec<ConnectorEvent>> {
        if !self.connected {
            return Err(ConnectorError::NotConnected);
        }

        self.keepalive_accumulator_ms += tick_ms;
        if self.keepalive_accumulator_ms >= limits::KEEPALIVE_INTERVAL_MS {
            log::trace!("keepalive interval elapsed, sending PINGREQ");
            self.transport.send_raw(&mqtt::encode_pingreq())?;
            self.keepalive_accumulator_ms = 0;
        }

        let mut events = Vec::new();

        if let Some(InboundFrame::Publish { topic, payload }) = self.transport.poll_frame()? {
            log::debug!("dispatching inbound publish on {topic}");
            let result = dispatcher::dispatch(
                self.identity.key(),
                &topic,
                &payload,
                &mut self.file_engine,
                &mut self.firmware_engine,
            );
            for msg in result.outbound {
                self.outbound.push(msg);
            }
            if let Some(parameters) = result.parameters {
                events.push(ConnectorEvent::ParametersUpdated(parameters));
            }
            if let Some(utc_ms) = result.platform_utc_ms {
                events.push(ConnectorEvent::PlatformTime(utc_ms));
            }
            if let Some(error) = result.platform_error {
                events.push(ConnectorEvent::PlatformError(error));
            }
            if let Some((feeds, attributes)) = result.details_synchronization {
                events.push(ConnectorEvent::DetailsSynchronization(feeds, attributes));
            }
        }

        for msg in dispatcher::process_engines(self.identity.key(), &mut self.file_engine, &mut self.firmware_engine) {
            self.outbound.push(msg);
        }

        Ok(events)
    }

    /// Drains the outbound queue in batches of up to
    /// [`limits::PUBLISH_BATCH_SIZE`]: peek, send, pop on success, stop on
    /// first transport failure (the failed message stays at the head).
    /// Returns the number of messages successfully sent.
    pub fn publish(&mut self) -> Result<usize> {
        if !self.connected {
            return Err(ConnectorError::NotConnected);
        }

        let mut sent = 0;
        for _ in 0..limits::PUBLISH_BATCH_SIZE {
            let Some(msg) = self.outbound.peek() else { break };
            let frame = mqtt::encode_publish(&msg.topic, &msg.payload);
            match self.transport.send_raw(&frame) {
                Ok(_) => {
                    self.outbound.pop();
                    sent += 1;
                }
                Err(e) => {
                    log::warn!("publish failed, message remains queued: {e}");
                    return Ok(sent);
                }
            }
        }
        Ok(sent)
    }

    /// Queues a single feed reading.
    pub fn add_feed(&mut self, feed: Feed) -> Result<()> {
        let (topic, payload) = codec::encode_feed_values(self.identity.key(), std::slice::from_ref(&feed));
        self.outbound.push(OutboundMessage::new(topic, payload)?);
        Ok(())
    }

    /// Queues a batch of feeds sharing one reference. Per §4.2's batching
    /// rule, a multi-element batch is only accepted if every entry shares the
    /// same reference and carries a distinct nonzero timestamp.
    pub fn add_feeds(&mut self, feeds: &[Feed]) -> Result<()> {
        if feeds.len() > limits::FEEDS_MAX_NUMBER {
            return Err(ConnectorError::MessageTooLarge);
        }
        if feeds.len() > 1 {
            let same_reference = feeds.windows(2).all(|w| w[0].reference == w[1].reference);
            let well_timed = feeds.iter().all(|f| f.utc_ms != 0 && f.has_plausible_timestamp());
            if !same_reference || !well_timed {
                return Err(ConnectorError::MessageTooLarge);
            }
        }
        let (topic, payload) = codec::encode_feed_values(self.identity.key(), feeds);
        self.outbound.push(OutboundMessage::new(topic, payload)?);
        Ok(())
    }

    /// Registers feed schemas with the platform (`feed_registration`).
    pub fn register_feed(&mut self, feeds: &[FeedRegistration]) -> Result<()> {
        let (topic, payload) = codec::encode_feed_registration(self.identity.key(), feeds);
        self.outbound.push(OutboundMessage::new(topic, payload)?);
        Ok(())
    }

    /// Removes previously registered feeds by reference (`feed_removal`).
    pub fn remove_feed(&mut self, references: &[String]) -> Result<()> {
        let (topic, payload) = codec::encode_feed_removal(self.identity.key(), references);
        self.outbound.push(OutboundMessage::new(topic, payload)?);
        Ok(())
    }

    /// Requests the platform's last known value for every registered feed
    /// (`pull_feed_values`).
    pub fn pull_feed_values(&mut self) -> Result<()> {
        let (topic, payload) = codec::encode_pull_feed_values(self.identity.key());
        self.outbound.push(OutboundMessage::new(topic, payload)?);
        Ok(())
    }

    /// Requests the platform resend its authoritative feed registrations and
    /// attributes (`details_synchronization`); the reply surfaces as
    /// [`ConnectorEvent::DetailsSynchronization`] from a later [`Self::process`].
    pub fn request_details_synchronization(&mut self) -> Result<()> {
        let (topic, payload) = codec::encode_details_synchronization_request(self.identity.key());
        self.outbound.push(OutboundMessage::new(topic, payload)?);
        Ok(())
    }

    /// Registers or updates an attribute. Per SPEC_FULL.md supplemental
    /// feature #2, re-registering an existing name updates its value in
    /// place rather than appending a duplicate.
    pub fn register_attribute(&mut self, attribute: Attribute) -> Result<()> {
        match self.attributes.iter_mut().find(|a| a.name == attribute.name) {
            Some(existing) => existing.value = attribute.value.clone(),
            None => self.attributes.push(attribute.clone()),
        }
        let (topic, payload) = codec::encode_attribute_registration(self.identity.key(), &attribute);
        self.outbound.push(OutboundMessage::new(topic, payload)?);
        Ok(())
    }

    /// Pushes the device's current parameter values to the platform.
    pub fn push_parameters(&mut self, parameters: &[Parameter]) -> Result<()> {
        let (topic, payload) = codec::encode_parameters_update(self.identity.key(), parameters);
        self.outbound.push(OutboundMessage::new(topic, payload)?);
        Ok(())
    }

    /// Requests the platform's current values for all parameters
    /// (SPEC_FULL.md supplemental feature #1).
    pub fn pull_parameters(&mut self) -> Result<()> {
        let (topic, payload) = codec::encode_parameters_pull(self.identity.key());
        self.outbound.push(OutboundMessage::new(topic, payload)?);
        Ok(())
    }

    /// Requests the platform's authoritative values for a named subset of
    /// parameters.
    pub fn synchronize_parameters(&mut self, names: &[String]) -> Result<()> {
        let (topic, payload) = codec::encode_parameters_synchronize(self.identity.key(), names);
        self.outbound.push(OutboundMessage::new(topic, payload)?);
        Ok(())
    }

    pub fn queue_len(&self) -> usize {
        self.outbound.len()
    }
}
