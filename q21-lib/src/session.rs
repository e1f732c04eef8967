use crate::codec::{Device, DeviceType};
use crate::config::LinkConfig;
use crate::constants::*;
use crate::directory::DeviceDirectory;
use crate::error::Q21Error;
use crate::link::LinkManager;
use crate::profile::{DeviceProfile, ScalingProfile};
use crate::sample::{EegSample, EegSampleUv, ImpedanceSample};
use crate::sequencer::{AdStream, ImpedanceStream, SampleSequencer};
use crate::transport::CanTransport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::{debug, info};

/// The EEG device a session talks to, fixed at bind time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundDevice {
    pub device: Device,
    pub profile: &'static DeviceProfile,
}

impl BoundDevice {
    pub fn device_type(&self) -> DeviceType {
        self.device.device_type
    }

    pub fn serial(&self) -> u8 {
        self.device.serial
    }

    pub fn scaling(&self) -> ScalingProfile {
        self.profile.scaling
    }

    pub fn impedance_enabled(&self) -> bool {
        self.profile.supports_impedance
    }
}

/// Discover the bus and pick the first EEG amplifier that answered.
///
/// Any failure releases the link before it is returned. On success the
/// second element lists every EEG device found, in discovery order.
pub fn bind_first_eeg_device<T: CanTransport>(
    link: &mut LinkManager<T>,
) -> Result<(BoundDevice, Vec<Device>), Q21Error> {
    let directory = match DeviceDirectory::discover(link) {
        Ok(directory) => directory,
        Err(e) => {
            link.release();
            return Err(e);
        }
    };

    let candidates: Vec<(Device, &'static DeviceProfile)> = directory
        .eeg_devices()
        .into_iter()
        .filter_map(|device| DeviceProfile::lookup(device.device_type).map(|profile| (device, profile)))
        .collect();

    let Some(&(device, profile)) = candidates.first() else {
        link.release();
        return Err(Q21Error::NoDeviceFound);
    };

    info!(%device, "Selected EEG device");
    Ok((
        BoundDevice { device, profile },
        candidates.into_iter().map(|(device, _)| device).collect(),
    ))
}

/// A bound link plus the EEG device selected on it.
pub struct Q21Session<T: CanTransport> {
    link: LinkManager<T>,
    bound: BoundDevice,
    eeg_devices: Vec<Device>,
}

impl<T: CanTransport> Q21Session<T> {
    /// Bind the channel, discover the bus and select the first EEG device.
    /// Takes about one discovery window to complete.
    pub fn connect(transport: T, config: LinkConfig) -> Result<Self, Q21Error> {
        let link = LinkManager::bind(transport, config)?;
        Self::from_link(link)
    }

    pub fn from_link(mut link: LinkManager<T>) -> Result<Self, Q21Error> {
        let (bound, eeg_devices) = bind_first_eeg_device(&mut link)?;
        Ok(Self {
            link,
            bound,
            eeg_devices,
        })
    }

    pub fn bound(&self) -> &BoundDevice {
        &self.bound
    }

    pub fn device(&self) -> Device {
        self.bound.device
    }

    pub fn device_type(&self) -> DeviceType {
        self.bound.device_type()
    }

    pub fn serial(&self) -> u8 {
        self.bound.serial()
    }

    /// True if the bound device can measure electrode impedance.
    pub fn impedance_enabled(&self) -> bool {
        self.bound.impedance_enabled()
    }

    /// Every EEG device that answered discovery on this interface.
    pub fn connected_eeg_devices(&self) -> &[Device] {
        &self.eeg_devices
    }

    /// EEG samples per second once streaming.
    pub fn sampling_rate(&self) -> f64 {
        NEUROFIELD_SAMPLING_RATE
    }

    pub fn link(&self) -> &LinkManager<T> {
        &self.link
    }

    fn send_control(&mut self, message_type: u8, payload: &[u8; 8]) -> Result<(), Q21Error> {
        let device = self.bound.device;
        self.link.send(Some(&device), message_type, payload)
    }

    pub fn switch_mode(&mut self, impedance: bool) -> Result<(), Q21Error> {
        if !self.bound.profile.supports_mode_switch {
            return Err(Q21Error::Unsupported {
                device_type: self.device_type(),
                feature: "switching between EEG and impedance measurement",
            });
        }

        let mut payload = [0u8; 8];
        if impedance {
            payload[0] = 1;
            payload[1] = 1;
        }
        info!(impedance, "Switching measurement mode");
        self.send_control(MSG_SWITCH_MODE, &payload)
    }

    pub fn switch_to_impedance_mode(&mut self) -> Result<(), Q21Error> {
        self.switch_mode(true)
    }

    pub fn switch_to_eeg_mode(&mut self) -> Result<(), Q21Error> {
        self.switch_mode(false)
    }

    /// Ask the device to stream `samples` AD samples.
    pub fn start_streaming(&mut self, samples: u32) -> Result<(), Q21Error> {
        let mut payload = [0u8; 8];
        payload[..4].copy_from_slice(&samples.to_be_bytes());
        debug!(samples, "Starting AD stream");
        self.send_control(MSG_START_STREAMING, &payload)
    }

    /// Start streaming for the default recording length (8 hours).
    pub fn start_receiving_eeg(&mut self) -> Result<(), Q21Error> {
        self.start_streaming(DEFAULT_STREAM_SAMPLES)
    }

    /// Stop streaming. The stop request is repeated, then the adapter queues
    /// are flushed once the bus has settled.
    pub fn abort_streaming(&mut self) -> Result<(), Q21Error> {
        for _ in 0..self.link.config().abort_repeats {
            self.send_control(MSG_ABORT, &[0u8; 8])?;
        }
        thread::sleep(self.link.config().abort_settle);
        self.link.reset_buffers()?;
        info!("Streaming aborted");
        Ok(())
    }

    /// Blink the front LED three times by requesting short bursts of samples.
    pub fn blink(&mut self) -> Result<(), Q21Error> {
        for round in 0..BLINK_ROUNDS {
            if round > 0 {
                thread::sleep(self.link.config().blink_pause);
            }
            self.start_streaming(BLINK_SAMPLES)?;
            for _ in 0..BLINK_SAMPLES {
                self.receive_eeg_sample_raw()?;
            }
        }
        Ok(())
    }

    /// Block until one full EEG sample has been reassembled.
    pub fn receive_eeg_sample_raw(&mut self) -> Result<EegSample, Q21Error> {
        let device = self.bound.device;
        let mut sequencer = SampleSequencer::<AdStream>::new();

        loop {
            let rx = self.link.receive_from_device(&device)?;
            let Some(done) = sequencer.feed(rx.header.message_type, &rx.frame.data, rx.timestamp_us)? else {
                continue;
            };

            let mut channels = [0i32; EEG_CHANNELS];
            for (stage, values) in done.slots.iter().enumerate() {
                channels[stage * 2..stage * 2 + 2].copy_from_slice(values);
            }
            return Ok(EegSample {
                channels,
                timestamp_us: done.timestamp_us,
            });
        }
    }

    /// One EEG sample in microvolts.
    pub fn receive_eeg_sample(&mut self) -> Result<EegSampleUv, Q21Error> {
        let raw = self.receive_eeg_sample_raw()?;
        Ok(self.bound.scaling().apply(&raw))
    }

    /// Block until every channel's impedance has arrived.
    ///
    /// `cancel` is checked before each receive. Once it is set the call
    /// returns immediately with `complete == false`.
    pub fn receive_impedance_sample(&mut self, cancel: Option<&AtomicBool>) -> Result<ImpedanceSample, Q21Error> {
        let device = self.bound.device;
        let mut sequencer = SampleSequencer::<ImpedanceStream>::new();

        loop {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                debug!(stage = sequencer.stage(), "Impedance read cancelled");
                return Ok(ImpedanceSample::from_pairs(sequencer.slots(), false));
            }

            let rx = self.link.receive_from_device(&device)?;
            if let Some(done) = sequencer.feed(rx.header.message_type, &rx.frame.data, rx.timestamp_us)? {
                return Ok(ImpedanceSample::from_pairs(&done.slots, true));
            }
        }
    }

    /// Release the interface. The session is unusable afterwards.
    pub fn release(&mut self) {
        self.link.release();
    }
}
