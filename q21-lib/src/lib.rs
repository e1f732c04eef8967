pub mod codec;
pub mod config;
pub mod constants;
pub mod directory;
pub mod error;
pub mod link;
pub mod mock;
pub mod profile;
pub mod sample;
pub mod sequencer;
pub mod session;
pub mod transport;

#[cfg(feature = "socketcan")]
pub mod socketcan_transport;

#[cfg(test)]
mod tests;

// Re-export the main types for easy access
pub use codec::{CanFrame, Device, DeviceType, Header, MessageType};
pub use config::LinkConfig;
pub use directory::DeviceDirectory;
pub use error::Q21Error;
pub use link::{LinkManager, online_channels};
pub use profile::{DeviceProfile, ScalingProfile};
pub use sample::{EegSample, EegSampleUv, ImpedanceSample};
pub use session::{BoundDevice, Q21Session, bind_first_eeg_device};
pub use transport::{CanTransport, ChannelCondition, TransportStatus};

#[cfg(feature = "socketcan")]
pub use socketcan_transport::SocketCanTransport;
