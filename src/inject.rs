// inject.rs — §4.I Injection controller
//
// Drives the transmit side: a command loop that packs a template
// `Rf4ceFrame`, wraps it in a MAC envelope, and hands it to the radio sink.
// In full-duplex mode it waits for an ACK observer to confirm each transmit,
// with bounded retry and channel-hop policy.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::linkconfig::LinkConfig;
use crate::mac;
use crate::pump::Processor;
use crate::radio::RadioTransport;
use crate::rf4ce::{FrameType, Rf4ceFrame};

const ACK_WAIT: Duration = Duration::from_millis(150);
const MAX_TX_RETRY: u32 = 10;
const MAX_FREQ_RETRY: u32 = 5;
const DEFAULT_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
#[error("transmit failed: no ACK after {max_freq_retry} channel hops × {max_tx_retry} retries")]
pub struct TransmitError {
    pub max_freq_retry: u32,
    pub max_tx_retry: u32,
}

/// Tracks the sequence number of the most recently observed ACK. Written by
/// the packet pump worker thread, read by the injection controller thread.
#[derive(Clone)]
pub struct AckProcessor {
    last_ack: Arc<AtomicI32>,
}

impl AckProcessor {
    pub fn new() -> Self {
        Self { last_ack: Arc::new(AtomicI32::new(-1)) }
    }

    pub fn last_ack(&self) -> i32 {
        self.last_ack.load(Ordering::Acquire)
    }
}

impl Default for AckProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for AckProcessor {
    fn process(&mut self, data: Vec<u8>) {
        match mac::parse_ack(&data) {
            Ok(Some(seqnum)) => self.last_ack.store(seqnum as i32, Ordering::Release),
            Ok(None) => {}
            Err(e) => log::warn!("ack processor: received invalid packet: {e}"),
        }
    }
}

/// One parsed driver verb (§4.I). `packet`'s argument is the raw bytes to
/// transmit as the RF4CE payload; everything else carries its typed value.
pub enum InjectorCmd {
    Packet(Vec<u8>),
    Profile(u8),
    Counter(u32),
    Delay(f64),
    Ciphered(bool),
    Help,
}

pub struct InjectionController<R: RadioTransport> {
    link_config: LinkConfig,
    radio: R,
    ack_processor: Option<AckProcessor>,
    frame: Rf4ceFrame,
    seqnum: u8,
    packet_delay: Duration,
}

impl<R: RadioTransport> InjectionController<R> {
    pub fn new(link_config: LinkConfig, radio: R, ack_processor: Option<AckProcessor>) -> Self {
        let mut frame = Rf4ceFrame::new(link_config.source, link_config.destination, FrameType::Data);
        frame.frame_counter = link_config.frame_counter;
        if let Some(key) = link_config.key {
            frame.frame_ciphered = true;
            frame.key = Some(key);
        }

        Self {
            link_config,
            radio,
            ack_processor,
            frame,
            seqnum: 0,
            packet_delay: DEFAULT_DELAY,
        }
    }

    pub fn frame_counter(&self) -> u32 {
        self.frame.frame_counter
    }

    /// Executes one driver verb. Returns `Ok(())` on success or
    /// `Err(TransmitError)` when a `packet` verb exhausts its retries — the
    /// controller logs and continues either way; the caller decides whether
    /// to treat this as fatal.
    pub fn execute(&mut self, cmd: InjectorCmd) -> Result<(), TransmitError> {
        match cmd {
            InjectorCmd::Packet(payload) => self.transmit(payload),
            InjectorCmd::Profile(profile) => {
                log::info!("set profile to 0x{profile:02x}");
                self.frame.profile_identifier = Some(profile);
                Ok(())
            }
            InjectorCmd::Counter(counter) => {
                log::info!("set counter to {counter}");
                self.frame.frame_counter = counter;
                Ok(())
            }
            InjectorCmd::Delay(seconds) => {
                log::info!("set delay to {seconds}");
                self.packet_delay = Duration::from_secs_f64(seconds.max(0.0));
                Ok(())
            }
            InjectorCmd::Ciphered(enable) => {
                if enable && self.link_config.key.is_none() {
                    log::warn!("no key provided, cannot send ciphered packets");
                } else {
                    self.frame.frame_ciphered = enable;
                }
                Ok(())
            }
            InjectorCmd::Help => {
                print_help();
                Ok(())
            }
        }
    }

    fn transmit(&mut self, payload: Vec<u8>) -> Result<(), TransmitError> {
        // Preserves the source behavior bit-exactly: `% 255` skips value
        // 255 and wraps to 0 after 254, rather than the full 8-bit range.
        self.seqnum = ((self.seqnum as u32 + 1) % 255) as u8;
        self.frame.frame_counter += 1;
        self.frame.payload = payload;

        let rf4ce_bytes = self.frame.pack().expect("template frame is well-formed");
        let envelope = mac::build_envelope(
            self.seqnum,
            self.link_config.dest_panid,
            self.link_config.source.short.unwrap_or(0),
            self.link_config.destination.short.unwrap_or(0),
            &rf4ce_bytes,
        );

        log::info!("transmitting {}", hex::encode(&envelope));

        let result = if self.radio.full_duplex() {
            self.ack_transmit(&envelope)
        } else {
            self.radio.transmit(&envelope);
            Ok(())
        };

        thread::sleep(self.packet_delay);
        result
    }

    fn ack_transmit(&mut self, envelope: &[u8]) -> Result<(), TransmitError> {
        let Some(ack_processor) = &self.ack_processor else {
            self.radio.transmit(envelope);
            return Ok(());
        };

        for _freq_retry in 0..MAX_FREQ_RETRY {
            for _tx_retry in 0..MAX_TX_RETRY {
                self.radio.transmit(envelope);
                thread::sleep(ACK_WAIT);
                if ack_processor.last_ack() == self.seqnum as i32 {
                    log::info!("ACK received");
                    return Ok(());
                }
                log::warn!("no ACK received, retrying");
            }
            log::warn!("switching frequency");
            self.radio.frequency_switch();
        }

        Err(TransmitError { max_freq_retry: MAX_FREQ_RETRY, max_tx_retry: MAX_TX_RETRY })
    }

    /// Graceful shutdown: persists the final frame counter.
    pub fn shutdown(mut self, path: impl AsRef<std::path::Path>) -> Result<(), crate::linkconfig::ConfigError> {
        self.link_config.frame_counter = self.frame.frame_counter;
        self.radio.stop();
        self.link_config.save(path)
    }
}

fn print_help() {
    println!(
        "Available commands:\n\n\
         \tcounter <value>      Set the frame counter value\n\
         \tdelay <value>        Minimum delay between packets (seconds)\n\
         \tciphered [0, 1]      Send ciphered payloads instead of cleartext\n\
         \tprofile <profile>    Select a profile number\n\
         \texit\n\n\
         Other inputs are treated as hex-encoded data to transmit."
    );
}

/// Parses one line of driver input into zero or more commands, mirroring
/// the original prompt loop: recognized verbs take their first
/// whitespace-separated argument; anything else is split on whitespace and
/// each token is hex-decoded into a `packet` command.
pub fn parse_line(line: &str) -> Result<Vec<InjectorCmd>, String> {
    let mut tokens = line.split_whitespace();
    let Some(verb) = tokens.next() else {
        return Ok(vec![]);
    };

    match verb {
        "profile" => {
            let arg = tokens.next().ok_or("malformed command")?;
            Ok(vec![InjectorCmd::Profile(parse_int(arg)? as u8)])
        }
        "counter" => {
            let arg = tokens.next().ok_or("malformed command")?;
            Ok(vec![InjectorCmd::Counter(parse_int(arg)?)])
        }
        "delay" => {
            let arg = tokens.next().ok_or("malformed command")?;
            let seconds: f64 = arg.parse().map_err(|_| "malformed command")?;
            Ok(vec![InjectorCmd::Delay(seconds)])
        }
        "ciphered" => {
            let arg = tokens.next().ok_or("malformed command")?;
            let n = parse_int(arg)?;
            if n != 0 && n != 1 {
                return Err("malformed command".to_string());
            }
            Ok(vec![InjectorCmd::Ciphered(n == 1)])
        }
        "help" => Ok(vec![InjectorCmd::Help]),
        "exit" => Err("exit".to_string()),
        _ => line
            .split_whitespace()
            .map(|token| hex::decode(token).map(InjectorCmd::Packet).map_err(|_| "malformed command".to_string()))
            .collect(),
    }
}

fn parse_int(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x") {
        u32::from_str_radix(hex, 16).map_err(|_| "malformed command".to_string())
    } else {
        s.parse().map_err(|_| "malformed command".to_string())
    }
}

// EOF
