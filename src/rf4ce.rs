// rf4ce.rs — §4.D RF4CE frame codec
//
// Packs/parses the RF4CE frame that rides inside an 802.15.4 MAC frame's
// payload. Dispatches by frame type (data/command/vendor) and, when the
// frame is ciphered, hands the plaintext/ciphertext through the CCM*
// transform in `ccm.rs`.

use std::fmt;

use crate::address::Node;
use crate::ccm::{AuthError, Ccm};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("unknown frame type")]
    UnknownFrameType,
    #[error("missing key")]
    MissingKey,
    #[error("frame too short ({0} bytes)")]
    TooShort(usize),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameType {
    Reserved = 0b00,
    Data = 0b01,
    Command = 0b10,
    Vendor = 0b11,
}

impl TryFrom<u8> for FrameType {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value & 0b11 {
            0b00 => Ok(FrameType::Reserved),
            0b01 => Ok(FrameType::Data),
            0b10 => Ok(FrameType::Command),
            0b11 => Ok(FrameType::Vendor),
            _ => unreachable!(),
        }
    }
}

/// Pairing response command (§4.D): identifies the start of a key seed
/// transmission and carries the newly allocated short addresses.
pub const COMMAND_PAIRING_RESPONSE: u8 = 0x04;
/// Key seed command (§4.D): one of 37 fragments combined into the link key.
pub const COMMAND_KEY_SEED: u8 = 0x06;

#[derive(Clone, Debug)]
pub struct Rf4ceFrame {
    pub source: Node,
    pub destination: Node,
    pub frame_type: FrameType,
    pub frame_ciphered: bool,
    pub protocol_version: u8,
    pub channel_designator: u8,
    pub frame_counter: u32,
    pub profile_identifier: Option<u8>,
    pub vendor_identifier: Option<u16>,
    pub command: Option<u8>,
    pub payload: Vec<u8>,
    pub key: Option<[u8; 16]>,
}

impl Rf4ceFrame {
    pub fn new(source: Node, destination: Node, frame_type: FrameType) -> Self {
        Self {
            source,
            destination,
            frame_type,
            frame_ciphered: false,
            protocol_version: 1,
            channel_designator: 0,
            frame_counter: 0,
            profile_identifier: None,
            vendor_identifier: None,
            command: None,
            payload: Vec::new(),
            key: None,
        }
    }

    /// Computes the frame-control byte (§4.D). Bit 5 is always set on
    /// transmit per spec.md §9 note 4 — its semantic is not exercised here
    /// and it is ignored entirely on parse.
    pub fn frame_control(&self) -> u8 {
        let mut fc = self.frame_type as u8 & 0b11;
        fc |= (self.frame_ciphered as u8) << 2;
        fc |= (self.protocol_version & 0b11) << 3;
        fc |= 1 << 5;
        fc |= (self.channel_designator & 0b11) << 6;
        fc
    }

    fn ccm(&self) -> Result<Ccm, ParseError> {
        let key = self.key.ok_or(ParseError::MissingKey)?;
        Ok(Ccm::new(&key, self.source.require_long(), self.destination.require_long()))
    }

    fn encode_body(&self, plaintext: &[u8]) -> Result<Vec<u8>, ParseError> {
        if self.frame_ciphered {
            let ccm = self.ccm()?;
            Ok(ccm.encrypt(plaintext, self.frame_control(), self.frame_counter))
        } else {
            Ok(plaintext.to_vec())
        }
    }

    fn decode_body(&self, raw: &[u8]) -> Result<Vec<u8>, ParseError> {
        if self.frame_ciphered {
            let ccm = self.ccm()?;
            Ok(ccm.decrypt(raw, self.frame_control(), self.frame_counter)?)
        } else {
            Ok(raw.to_vec())
        }
    }

    /// Packs this frame into the byte sequence carried as an 802.15.4 MAC
    /// payload: `frame_control(1) | frame_counter_LE(4) | body`.
    pub fn pack(&self) -> Result<Vec<u8>, ParseError> {
        let mut out = Vec::new();
        out.push(self.frame_control());
        out.extend_from_slice(&self.frame_counter.to_le_bytes());

        match self.frame_type {
            FrameType::Reserved => return Err(ParseError::UnknownFrameType),
            FrameType::Data => {
                out.push(self.profile_identifier.unwrap_or(0));
                out.extend(self.encode_body(&self.payload)?);
            }
            FrameType::Command => {
                let mut plaintext = Vec::with_capacity(1 + self.payload.len());
                plaintext.push(self.command.unwrap_or(0));
                plaintext.extend_from_slice(&self.payload);
                out.extend(self.encode_body(&plaintext)?);
            }
            FrameType::Vendor => {
                out.push(self.profile_identifier.unwrap_or(0));
                out.extend_from_slice(&self.vendor_identifier.unwrap_or(0).to_le_bytes());
                out.extend(self.encode_body(&self.payload)?);
            }
        }
        Ok(out)
    }

    /// Parses `data` (an RF4CE payload extracted from a MAC frame) given the
    /// already-resolved source/destination nodes and an optional key.
    pub fn parse(data: &[u8], source: Node, destination: Node, key: Option<[u8; 16]>) -> Result<Self, ParseError> {
        if data.len() < 5 {
            return Err(ParseError::TooShort(data.len()));
        }

        let frame_control = data[0];
        let frame_type = FrameType::try_from(frame_control)?;
        if frame_type == FrameType::Reserved {
            return Err(ParseError::UnknownFrameType);
        }

        let frame_ciphered = frame_control & (1 << 2) != 0;
        let protocol_version = (frame_control >> 3) & 0b11;
        let channel_designator = (frame_control >> 6) & 0b11;
        let frame_counter = u32::from_le_bytes([data[1], data[2], data[3], data[4]]);

        let mut frame = Rf4ceFrame {
            source,
            destination,
            frame_type,
            frame_ciphered,
            protocol_version,
            channel_designator,
            frame_counter,
            profile_identifier: None,
            vendor_identifier: None,
            command: None,
            payload: Vec::new(),
            key,
        };

        let rest = &data[5..];
        match frame_type {
            FrameType::Reserved => unreachable!(),
            FrameType::Data => {
                if rest.is_empty() {
                    return Err(ParseError::TooShort(data.len()));
                }
                frame.profile_identifier = Some(rest[0]);
                frame.payload = frame.decode_body(&rest[1..])?;
            }
            FrameType::Command => {
                let decoded = frame.decode_body(rest)?;
                if decoded.is_empty() {
                    return Err(ParseError::TooShort(data.len()));
                }
                frame.command = Some(decoded[0]);
                frame.payload = decoded[1..].to_vec();
            }
            FrameType::Vendor => {
                if rest.len() < 3 {
                    return Err(ParseError::TooShort(data.len()));
                }
                frame.profile_identifier = Some(rest[0]);
                frame.vendor_identifier = Some(u16::from_le_bytes([rest[1], rest[2]]));
                frame.payload = frame.decode_body(&rest[3..])?;
            }
        }

        Ok(frame)
    }
}

impl fmt::Display for Rf4ceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let type_desc = match self.frame_type {
            FrameType::Data => format!("DATA - profile:0x{:x}", self.profile_identifier.unwrap_or(0)),
            FrameType::Command => format!("COMMAND - cmd:0x{:x}", self.command.unwrap_or(0)),
            FrameType::Vendor => format!(
                "VENDOR - profile:0x{:x} - vendor:0x{:x}",
                self.profile_identifier.unwrap_or(0),
                self.vendor_identifier.unwrap_or(0)
            ),
            FrameType::Reserved => "RESERVED".to_string(),
        };
        write!(
            f,
            "({}) -> ({}) : [{} - counter:0x{:x}] : {}",
            self.source,
            self.destination,
            type_desc,
            self.frame_counter,
            hex::encode(&self.payload)
        )
    }
}

/// Pairing-response command payload (§4.D):
/// `status(1) | allocated_short_source_LE(2) | short_destination_LE(2) | ...`
pub fn parse_pairing_response(payload: &[u8]) -> Option<(u16, u16)> {
    if payload.len() < 5 {
        return None;
    }
    let allocated_short_source = u16::from_le_bytes([payload[1], payload[2]]);
    let short_destination = u16::from_le_bytes([payload[3], payload[4]]);
    Some((allocated_short_source, short_destination))
}

/// Key seed command payload (§4.D): `index(1) | seed_word(80 bytes)`.
pub fn parse_key_seed(payload: &[u8]) -> Option<(u8, &[u8])> {
    if payload.len() < 81 {
        return None;
    }
    Some((payload[0], &payload[1..81]))
}

// EOF
