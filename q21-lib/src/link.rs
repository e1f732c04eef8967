use crate::codec::{self, CanFrame, Device, Header};
use crate::config::LinkConfig;
use crate::error::Q21Error;
use crate::transport::{CanTransport, ChannelCondition, ReceivedFrame, TransportStatus};
use std::thread;
use tracing::{debug, info, trace, warn};

/// A frame from the bound device together with its decoded identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFrame {
    pub frame: CanFrame,
    pub header: Header,
    pub timestamp_us: u64,
}

/// Exclusive owner of one adapter channel.
///
/// All calls block the calling thread: receives poll the adapter once per
/// tick up to the configured budget, and bus-off recovery sleeps between its
/// steps. One link must be driven from a single thread.
pub struct LinkManager<T: CanTransport> {
    transport: T,
    config: LinkConfig,
    bound: bool,
}

impl<T: CanTransport> LinkManager<T> {
    /// Take ownership of an available channel, initialize it at the protocol
    /// bit rate and set up the adapter trace file.
    pub fn bind(mut transport: T, config: LinkConfig) -> Result<Self, Q21Error> {
        let channel = transport.name().to_string();
        match transport.condition() {
            Ok(ChannelCondition::Available) => {}
            Ok(condition) => {
                debug!(%channel, ?condition, "Channel condition check failed");
                return Err(Q21Error::ChannelUnavailable { channel });
            }
            Err(status) => {
                debug!(%channel, %status, "Channel condition query failed");
                return Err(Q21Error::ChannelUnavailable { channel });
            }
        }

        let mut link = Self {
            transport,
            config,
            bound: true,
        };
        if let Err(e) = link.open() {
            link.release();
            return Err(e);
        }

        info!(%channel, bitrate = link.config.bitrate, "CAN channel initialized");
        Ok(link)
    }

    fn open(&mut self) -> Result<(), Q21Error> {
        self.transport
            .initialize(self.config.bitrate)
            .map_err(|status| Q21Error::Transport {
                operation: "initialize",
                status,
            })?;
        self.configure_trace()
    }

    fn configure_trace(&mut self) -> Result<(), Q21Error> {
        self.transport
            .configure_trace(&self.config.trace)
            .map_err(|status| Q21Error::Transport {
                operation: "configure trace",
                status,
            })
    }

    fn ensure_bound(&self) -> Result<(), Q21Error> {
        if self.bound { Ok(()) } else { Err(Q21Error::LinkReleased) }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// Send one host-to-device frame. `device = None` broadcasts with all
    /// address bits cleared.
    pub fn send(&mut self, device: Option<&Device>, message_type: u8, payload: &[u8; 8]) -> Result<(), Q21Error> {
        self.ensure_bound()?;
        let id = codec::encode(device, message_type);
        let frame = CanFrame::extended(id, payload)?;
        debug!(id = format!("{id:#010x}"), data = hex::encode(payload), "CAN write");

        match self.transport.write(&frame) {
            Ok(()) => Ok(()),
            Err(TransportStatus::BusOff) => self.recover_bus_off(&frame),
            Err(status) => Err(Q21Error::Transport {
                operation: "write",
                status,
            }),
        }
    }

    /// Re-initialize the channel and retry `frame` until one full cycle
    /// succeeds. A trace configuration failure aborts the recovery at once.
    fn recover_bus_off(&mut self, frame: &CanFrame) -> Result<(), Q21Error> {
        let attempts = self.config.recovery_attempts;
        warn!(channel = self.transport.name(), "Bus-off detected, re-initializing channel");

        for attempt in 1..=attempts {
            if let Err(status) = self.transport.uninitialize() {
                debug!(attempt, %status, "Bus-off recovery: uninitialize failed");
                continue;
            }
            thread::sleep(self.config.recovery_pause);

            if let Err(status) = self.transport.initialize(self.config.bitrate) {
                debug!(attempt, %status, "Bus-off recovery: initialize failed");
                continue;
            }
            thread::sleep(self.config.recovery_pause);

            self.configure_trace()?;

            match self.transport.write(frame) {
                Ok(()) => {
                    info!(attempt, "Recovered from bus-off");
                    return Ok(());
                }
                Err(status) => debug!(attempt, %status, "Bus-off recovery: write failed"),
            }
        }

        Err(Q21Error::BusOff { attempts })
    }

    /// Blocking receive of the next frame from the bus, whatever its origin.
    pub fn receive_raw(&mut self) -> Result<ReceivedFrame, Q21Error> {
        self.ensure_bound()?;
        let mut ticks = 0;

        loop {
            match self.transport.read() {
                Ok(received) => {
                    trace!(
                        id = format!("{:#010x}", received.frame.id),
                        data = hex::encode(&received.frame.data),
                        timestamp_us = received.timestamp_us,
                        "CAN read"
                    );
                    return Ok(received);
                }
                Err(TransportStatus::ReceiveQueueEmpty) => {
                    thread::sleep(self.config.poll_interval);
                    ticks += 1;
                    if ticks >= self.config.max_poll_ticks {
                        return Err(Q21Error::ReceiveTimeout { ticks });
                    }
                }
                Err(status @ (TransportStatus::BusLight | TransportStatus::BusHeavy)) => {
                    return Err(Q21Error::BusFault { status });
                }
                Err(status) => {
                    return Err(Q21Error::Transport {
                        operation: "read",
                        status,
                    });
                }
            }
        }
    }

    /// Single non-blocking read. `None` once the receive queue is drained.
    pub fn try_receive(&mut self) -> Result<Option<ReceivedFrame>, Q21Error> {
        self.ensure_bound()?;
        match self.transport.read() {
            Ok(received) => Ok(Some(received)),
            Err(TransportStatus::ReceiveQueueEmpty | TransportStatus::InvalidOperation) => Ok(None),
            Err(status @ (TransportStatus::BusLight | TransportStatus::BusHeavy)) => Err(Q21Error::BusFault { status }),
            Err(status) => Err(Q21Error::Transport {
                operation: "read",
                status,
            }),
        }
    }

    /// Wait for the next frame sent by `device`, silently dropping standard
    /// frames, unknown identifiers, host traffic and other devices' frames.
    pub fn receive_from_device(&mut self, device: &Device) -> Result<DeviceFrame, Q21Error> {
        loop {
            let ReceivedFrame { frame, timestamp_us } = self.receive_raw()?;

            if !frame.extended {
                continue;
            }

            let Some(header) = codec::decode(frame.id) else {
                continue;
            };

            if !header.is_from(device) {
                continue;
            }

            return Ok(DeviceFrame {
                frame,
                header,
                timestamp_us,
            });
        }
    }

    /// Flush the adapter's transmit and receive queues.
    pub fn reset_buffers(&mut self) -> Result<(), Q21Error> {
        self.ensure_bound()?;
        self.transport.reset().map_err(|status| Q21Error::Transport {
            operation: "reset",
            status,
        })
    }

    /// Give the channel back to the adapter. Calling it again is a no-op.
    pub fn release(&mut self) {
        if !self.bound {
            return;
        }

        if let Err(status) = self.transport.reset() {
            debug!(%status, "Reset during release failed");
        }
        if let Err(status) = self.transport.uninitialize() {
            debug!(%status, "Uninitialize during release failed");
        }
        self.bound = false;
        info!(channel = self.transport.name(), "CAN channel released");
    }
}

impl<T: CanTransport> Drop for LinkManager<T> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Keep the channels from `candidates` that are present and free right now.
pub fn online_channels<T, I>(candidates: I) -> Vec<T>
where
    T: CanTransport,
    I: IntoIterator<Item = T>,
{
    candidates
        .into_iter()
        .filter_map(|mut transport| match transport.condition() {
            Ok(ChannelCondition::Available) => Some(transport),
            _ => None,
        })
        .collect()
}
