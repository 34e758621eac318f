// radio.rs — §6 Radio transport interface
//
// The SDR signal chain itself (O-QPSK modulation, PHY sync, sample I/O) is
// an external collaborator: this module defines the trait the core drives
// and the channel/frequency model shared by all three CLI binaries. A real
// implementation would drive a HackRF or PlutoSDR graph; `LoopbackRadio`
// below is a test double used by the injection controller's unit tests.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

pub const CHANNELS: [u8; 3] = [15, 20, 25];

#[derive(Debug, thiserror::Error)]
pub enum RadioError {
    #[error("unsupported channel {0}")]
    UnsupportedChannel(u8),
}

/// Selects the underlying SDR hardware backend. The backend itself (sample
/// rates, gains, IIO/osmosdr wiring) lives outside this core.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SdrDevice {
    HackRf,
    PlutoSdr,
}

/// Center frequency in Hz for a given 802.15.4 channel (§6).
pub fn center_freq_hz(channel: u8) -> u64 {
    1_000_000 * (2400 + 5 * (channel as i64 - 10)) as u64
}

/// The radio transport interface the core consumes. `transmit` enqueues one
/// MAC frame; it must never block on anything the observer does. Full-duplex
/// radios additionally support ACK-waiting in the injection controller
/// (§4.I) — signaled via `full_duplex()`.
pub trait RadioTransport: Send {
    fn start(&mut self) -> Result<(), RadioError>;
    fn stop(&mut self);
    fn wait(&mut self);
    fn transmit(&self, mac_frame: &[u8]);
    fn frequency_switch(&mut self) -> u8;
    fn channel(&self) -> u8;
    fn full_duplex(&self) -> bool;
}

/// Rotates through `CHANNELS` starting from the given channel.
pub struct ChannelRotation {
    current_index: usize,
}

impl ChannelRotation {
    pub fn new(initial_channel: u8) -> Result<Self, RadioError> {
        let current_index = CHANNELS
            .iter()
            .position(|&c| c == initial_channel)
            .ok_or(RadioError::UnsupportedChannel(initial_channel))?;
        Ok(Self { current_index })
    }

    pub fn current(&self) -> u8 {
        CHANNELS[self.current_index]
    }

    pub fn advance(&mut self) -> u8 {
        self.current_index = (self.current_index + 1) % CHANNELS.len();
        self.current()
    }
}

/// In-process loopback transport: every transmitted frame is immediately
/// delivered to `feed`, used to exercise the packet pump and injection
/// controller without a real radio.
pub struct LoopbackRadio {
    rotation: ChannelRotation,
    full_duplex: bool,
    inbound: Sender<Vec<u8>>,
    outbound: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl LoopbackRadio {
    pub fn new(initial_channel: u8, full_duplex: bool) -> Result<(Self, Receiver<Vec<u8>>), RadioError> {
        let (tx, rx) = mpsc::channel();
        let radio = Self {
            rotation: ChannelRotation::new(initial_channel)?,
            full_duplex,
            inbound: tx,
            outbound: Arc::new(Mutex::new(Vec::new())),
        };
        Ok((radio, rx))
    }

    pub fn transmitted_frames(&self) -> Vec<Vec<u8>> {
        self.outbound.lock().unwrap().clone()
    }

    /// Test hook: inject a frame as if received over the air (e.g. a
    /// simulated ACK).
    pub fn deliver(&self, frame: Vec<u8>) {
        let _ = self.inbound.send(frame);
    }
}

impl RadioTransport for LoopbackRadio {
    fn start(&mut self) -> Result<(), RadioError> {
        Ok(())
    }

    fn stop(&mut self) {}

    fn wait(&mut self) {}

    fn transmit(&self, mac_frame: &[u8]) {
        self.outbound.lock().unwrap().push(mac_frame.to_vec());
    }

    fn frequency_switch(&mut self) -> u8 {
        self.rotation.advance()
    }

    fn channel(&self) -> u8 {
        self.rotation.current()
    }

    fn full_duplex(&self) -> bool {
        self.full_duplex
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_frequencies_match_supported_channels() {
        assert_eq!(center_freq_hz(15), 2_425_000_000);
        assert_eq!(center_freq_hz(20), 2_450_000_000);
        assert_eq!(center_freq_hz(25), 2_475_000_000);
    }

    #[test]
    fn channel_rotation_cycles_through_all_three() {
        let mut rotation = ChannelRotation::new(15).unwrap();
        assert_eq!(rotation.advance(), 20);
        assert_eq!(rotation.advance(), 25);
        assert_eq!(rotation.advance(), 15);
    }

    #[test]
    fn unsupported_initial_channel_is_rejected() {
        assert!(ChannelRotation::new(11).is_err());
    }

    #[test]
    fn loopback_radio_records_transmitted_frames() {
        let (radio, _rx) = LoopbackRadio::new(15, true).unwrap();
        radio.transmit(&[1, 2, 3]);
        radio.transmit(&[4, 5]);
        assert_eq!(radio.transmitted_frames(), vec![vec![1, 2, 3], vec![4, 5]]);
    }
}
// EOF
