//! Linux SocketCAN adapter.
//!
//! The kernel owns the bit rate (`ip link set can0 type can bitrate 500000`)
//! and has no trace file, so those calls only log. Bus-off surfaces as
//! `ENETDOWN` on write.

use crate::codec::CanFrame;
use crate::transport::{CanTransport, ChannelCondition, ReceivedFrame, TraceConfig, TransportStatus};
use bytes::Bytes;
use socketcan::{CanSocket, EmbeddedFrame, ExtendedId, Id, Socket, StandardId};
use std::io;
use std::time::Instant;
use tracing::{debug, info};

pub struct SocketCanTransport {
    interface: String,
    socket: Option<CanSocket>,
    epoch: Instant,
}

impl SocketCanTransport {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            socket: None,
            epoch: Instant::now(),
        }
    }

    fn socket(&self) -> Result<&CanSocket, TransportStatus> {
        self.socket.as_ref().ok_or(TransportStatus::InvalidOperation)
    }
}

fn io_status(e: &io::Error) -> TransportStatus {
    match e.kind() {
        io::ErrorKind::WouldBlock => TransportStatus::ReceiveQueueEmpty,
        io::ErrorKind::NetworkDown => TransportStatus::BusOff,
        _ => TransportStatus::Hardware(e.raw_os_error().unwrap_or(-1)),
    }
}

impl CanTransport for SocketCanTransport {
    fn name(&self) -> &str {
        &self.interface
    }

    fn condition(&mut self) -> Result<ChannelCondition, TransportStatus> {
        if self.socket.is_some() {
            return Ok(ChannelCondition::Occupied);
        }
        match CanSocket::open(&self.interface) {
            Ok(_) => Ok(ChannelCondition::Available),
            Err(e) => {
                debug!(interface = %self.interface, "Failed to open CAN socket: {}", e);
                Ok(ChannelCondition::Unavailable)
            }
        }
    }

    fn initialize(&mut self, bitrate: u32) -> Result<(), TransportStatus> {
        let socket = CanSocket::open(&self.interface).map_err(|e| io_status(&e))?;
        socket.set_nonblocking(true).map_err(|e| io_status(&e))?;
        info!(
            interface = %self.interface,
            bitrate,
            "CAN socket opened (bit rate is configured on the interface)"
        );
        self.socket = Some(socket);
        Ok(())
    }

    fn uninitialize(&mut self) -> Result<(), TransportStatus> {
        self.socket = None;
        Ok(())
    }

    fn configure_trace(&mut self, trace: &TraceConfig) -> Result<(), TransportStatus> {
        debug!(?trace, "SocketCAN has no adapter trace file, ignoring");
        Ok(())
    }

    fn write(&mut self, frame: &CanFrame) -> Result<(), TransportStatus> {
        let socket = self.socket()?;
        let id = if frame.extended {
            ExtendedId::new(frame.id).map(Id::Extended)
        } else {
            u16::try_from(frame.id).ok().and_then(StandardId::new).map(Id::Standard)
        }
        .ok_or(TransportStatus::InvalidOperation)?;
        let out = <socketcan::CanFrame as EmbeddedFrame>::new(id, &frame.data).ok_or(TransportStatus::InvalidOperation)?;
        socket.write_frame(&out).map_err(|e| io_status(&e))
    }

    fn read(&mut self) -> Result<ReceivedFrame, TransportStatus> {
        let socket = self.socket()?;
        let rx = socket.read_frame().map_err(|e| io_status(&e))?;
        let (id, extended) = match EmbeddedFrame::id(&rx) {
            Id::Extended(id) => (id.as_raw(), true),
            Id::Standard(id) => (u32::from(id.as_raw()), false),
        };
        Ok(ReceivedFrame {
            frame: CanFrame {
                id,
                extended,
                data: Bytes::copy_from_slice(EmbeddedFrame::data(&rx)),
            },
            timestamp_us: self.epoch.elapsed().as_micros() as u64,
        })
    }

    fn reset(&mut self) -> Result<(), TransportStatus> {
        let socket = self.socket()?;
        // receive side only: the socket offers no way to recall queued transmits
        while socket.read_frame().is_ok() {}
        Ok(())
    }
}
