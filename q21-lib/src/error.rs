use crate::codec::{DeviceType, MessageType};
use crate::transport::TransportStatus;
use thiserror::Error;

/// The primary error type for the `q21-lib` library.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Q21Error {
    #[error("CAN channel {channel} is not available")]
    ChannelUnavailable { channel: String },

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Bus error ({status}): is the device still on?")]
    BusFault { status: TransportStatus },

    #[error("Bus-off could not be recovered after {attempts} attempts")]
    BusOff { attempts: u32 },

    #[error("CAN read timeout: no matching frame within {ticks} polls")]
    ReceiveTimeout { ticks: u32 },

    #[error("No EEG device found")]
    NoDeviceFound,

    #[error("Unexpected number of data bytes for {message_type}: expected {expected}, got {actual}")]
    FramingError {
        message_type: MessageType,
        expected: usize,
        actual: usize,
    },

    #[error("CAN adapter error during {operation}: {status}")]
    Transport {
        operation: &'static str,
        status: TransportStatus,
    },

    #[error("{device_type} does not support {feature}")]
    Unsupported {
        device_type: DeviceType,
        feature: &'static str,
    },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Unknown identifier {id:#010x}")]
    UnknownIdentifier { id: u32 },

    #[error("CAN link has already been released")]
    LinkReleased,
}

impl Q21Error {
    /// True for the deadline expiry of a blocking receive.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Q21Error::ReceiveTimeout { .. })
    }

    /// Whether the session can keep going after this error.
    ///
    /// Only a timeout leaves the link bound; a retry may succeed once the
    /// device starts streaming. A protocol violation only surfaces from
    /// discovery, after the link has been released.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Q21Error::ReceiveTimeout { .. })
    }
}
