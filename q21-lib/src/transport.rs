//! The CAN adapter as seen by the protocol layer.
//!
//! A transport wraps one adapter channel. The driver only needs a handful of
//! primitives: initialize/deinitialize the channel, write one frame, read one
//! frame (or learn that the queue is empty), tune the trace file and flush the
//! adapter queues. Everything above this trait is adapter-agnostic.

use crate::codec::CanFrame;
use crate::constants::TRACE_FILE_SIZE_MB;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Non-success outcome reported by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TransportStatus {
    /// Nothing to read right now.
    ReceiveQueueEmpty,
    /// The channel is not initialized or the call makes no sense in its state.
    InvalidOperation,
    /// An error counter reached the warning ("light") limit.
    BusLight,
    /// An error counter reached the passive ("heavy") limit.
    BusHeavy,
    /// The controller went bus-off and needs a re-initialization.
    BusOff,
    /// Adapter specific error code.
    Hardware(i32),
}

impl fmt::Display for TransportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportStatus::ReceiveQueueEmpty => write!(f, "receive queue is empty"),
            TransportStatus::InvalidOperation => write!(f, "invalid operation"),
            TransportStatus::BusLight => write!(f, "bus error counter reached the 'light' limit"),
            TransportStatus::BusHeavy => write!(f, "bus error counter reached the 'heavy' limit"),
            TransportStatus::BusOff => write!(f, "bus-off"),
            TransportStatus::Hardware(code) => write!(f, "adapter error code {code}"),
        }
    }
}

/// Plug&play state of an adapter channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelCondition {
    /// Present and free to use.
    Available,
    /// Present but owned by someone else.
    Occupied,
    /// Absent.
    Unavailable,
}

/// Adapter-side diagnostic trace file settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceConfig {
    pub max_size_mb: u32,
    pub single_file: bool,
    pub overwrite_existing: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            max_size_mb: TRACE_FILE_SIZE_MB,
            single_file: true,
            overwrite_existing: true,
        }
    }
}

/// A frame as delivered by the adapter, stamped with its arrival time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFrame {
    pub frame: CanFrame,
    /// Arrival time in microseconds, on the adapter's clock.
    pub timestamp_us: u64,
}

pub trait CanTransport {
    /// Human readable channel name, used in logs and errors.
    fn name(&self) -> &str;

    fn condition(&mut self) -> Result<ChannelCondition, TransportStatus>;

    fn initialize(&mut self, bitrate: u32) -> Result<(), TransportStatus>;

    fn uninitialize(&mut self) -> Result<(), TransportStatus>;

    fn configure_trace(&mut self, trace: &TraceConfig) -> Result<(), TransportStatus>;

    fn write(&mut self, frame: &CanFrame) -> Result<(), TransportStatus>;

    /// Non-blocking read of one frame; `ReceiveQueueEmpty` when nothing is pending.
    fn read(&mut self) -> Result<ReceivedFrame, TransportStatus>;

    /// Drop the frames waiting in the receive queue.
    ///
    /// Frames already handed over for transmission are not recalled.
    fn reset(&mut self) -> Result<(), TransportStatus>;
}
