use crate::codec::{self, CanFrame, Device, MessageType};
use crate::error::Q21Error;
use crate::link::LinkManager;
use crate::transport::CanTransport;
use std::thread;
use tracing::{debug, info};

/// The Neurofield modules that answered a discovery query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceDirectory {
    devices: Vec<Device>,
}

impl DeviceDirectory {
    /// Broadcast a bus query, give every module the discovery window to
    /// answer, then drain the receive queue without blocking.
    ///
    /// Stream frames still in flight are skipped; any other unexpected
    /// frame aborts discovery. Duplicate announcements are kept.
    pub fn discover<T: CanTransport>(link: &mut LinkManager<T>) -> Result<Self, Q21Error> {
        info!("Sending CAN bus query...");
        link.send(None, MessageType::CANBusQuery.into(), &[0u8; 8])?;

        thread::sleep(link.config().discovery_window);

        let mut devices = Vec::new();
        while let Some(received) = link.try_receive()? {
            if let Some(device) = process_query_answer(&received.frame)? {
                debug!(%device, "Device answered query");
                devices.push(device);
            }
        }

        info!("Discovery complete, {} device(s) answered", devices.len());
        Ok(Self { devices })
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Devices that are EEG amplifiers, in discovery order.
    pub fn eeg_devices(&self) -> Vec<Device> {
        self.devices
            .iter()
            .filter(|device| device.device_type.is_eeg())
            .copied()
            .collect()
    }
}

impl From<Vec<Device>> for DeviceDirectory {
    fn from(devices: Vec<Device>) -> Self {
        Self { devices }
    }
}

/// Classify one frame drained after a discovery query.
///
/// `Ok(None)` means "ignore": unknown identifiers and stream traffic.
pub fn process_query_answer(frame: &CanFrame) -> Result<Option<Device>, Q21Error> {
    if !frame.extended {
        return Err(Q21Error::ProtocolViolation(
            "standard frame received during discovery. Is the EEG amplifier powered on?".to_string(),
        ));
    }

    let Some(header) = codec::decode(frame.id) else {
        return Ok(None);
    };

    if !header.slave_to_host {
        return Err(Q21Error::ProtocolViolation(format!(
            "frame {:#010x} is not a slave message",
            frame.id
        )));
    }

    if header.message_type.is_stream_message() {
        return Ok(None);
    }

    if header.message_type != MessageType::CANBusQuery {
        return Err(Q21Error::ProtocolViolation(format!(
            "expected a query answer, got {}",
            header.message_type
        )));
    }

    Ok(Some(Device::new(header.module_type, header.serial)))
}
