// mac.rs — §4.E MAC envelope helper
//
// Wraps an RF4CE byte blob in a minimal IEEE 802.15.4 data frame: a 2-byte
// frame control field, sequence number, PAN ID, short/long addresses, the
// RF4CE payload, and a 2-byte FCS. Builds outbound envelopes with short
// addressing only (post-pairing steady state); parses inbound envelopes in
// either short or long addressing mode, since long addressing appears
// during pairing capture.

use crate::address::{LongAddress, Node};

const CRC: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_KERMIT);

#[derive(Debug, thiserror::Error)]
pub enum MacError {
    #[error("frame too short ({0} bytes)")]
    TooShort(usize),
    #[error("FCS validation failed")]
    BadFcs,
    #[error("unsupported addressing mode {0}")]
    UnsupportedAddrMode(u8),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameType {
    Beacon,
    Data,
    Ack,
    Command,
    Other(u8),
}

impl From<u8> for FrameType {
    fn from(value: u8) -> Self {
        match value & 0b111 {
            0 => FrameType::Beacon,
            1 => FrameType::Data,
            2 => FrameType::Ack,
            3 => FrameType::Command,
            other => FrameType::Other(other),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Addr {
    Short(u16),
    Long(u64),
}

/// A decoded 802.15.4 MAC frame, as read off the air (FCS already validated
/// and stripped).
#[derive(Clone, Debug)]
pub struct MacFrame {
    pub frame_type: FrameType,
    pub ack_requested: bool,
    pub seqnum: u8,
    pub dest_panid: Option<u16>,
    pub dest_addr: Option<Addr>,
    pub src_panid: Option<u16>,
    pub src_addr: Option<Addr>,
    pub payload: Vec<u8>,
}

impl MacFrame {
    pub fn dest_node(&self) -> Option<Node> {
        match self.dest_addr {
            Some(Addr::Short(s)) => Some(Node::from_short(s)),
            Some(Addr::Long(l)) => Some(Node::from_long(LongAddress(l))),
            None => None,
        }
    }

    pub fn src_node(&self) -> Option<Node> {
        match self.src_addr {
            Some(Addr::Short(s)) => Some(Node::from_short(s)),
            Some(Addr::Long(l)) => Some(Node::from_long(LongAddress(l))),
            None => None,
        }
    }
}

/// Builds the frame-control-field bytes for a data frame with short
/// addressing, PAN-ID compression on, ack requested.
fn data_fcf() -> [u8; 2] {
    let mut fcf: u16 = 0;
    fcf |= 0b001; // frame type = data
    fcf |= 1 << 5; // ack request
    fcf |= 1 << 6; // PAN ID compression
    fcf |= 0b10 << 10; // dest addressing mode = short
    fcf |= 0b10 << 14; // src addressing mode = short
    fcf.to_le_bytes()
}

/// Builds an outbound 802.15.4 data frame envelope: short addressing both
/// ways, PAN-ID compression, ack requested, as used post-pairing by the
/// injection controller. `seqnum` wraps per the caller's own policy; this
/// function writes whatever byte it is given.
pub fn build_envelope(seqnum: u8, dest_panid: u16, src_short: u16, dest_short: u16, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(9 + payload.len() + 2);
    out.extend_from_slice(&data_fcf());
    out.push(seqnum);
    out.extend_from_slice(&dest_panid.to_le_bytes());
    out.extend_from_slice(&dest_short.to_le_bytes());
    out.extend_from_slice(&src_short.to_le_bytes());
    out.extend_from_slice(payload);
    let fcs = CRC.checksum(&out);
    out.extend_from_slice(&fcs.to_le_bytes());
    out
}

/// Recomputes the FCS over all but the trailing 2 bytes and compares.
pub fn validate_fcs(data: &[u8]) -> bool {
    if data.len() < 2 {
        return false;
    }
    let (body, fcs) = data.split_at(data.len() - 2);
    let expected = CRC.checksum(body).to_le_bytes();
    expected == fcs
}

/// Parses a validated 802.15.4 frame (FCS bytes still present; stripped
/// internally). Supports short (mode 2) and long (mode 3) addressing with
/// PAN-ID compression either on or off.
pub fn parse(data: &[u8]) -> Result<MacFrame, MacError> {
    if !validate_fcs(data) {
        return Err(MacError::BadFcs);
    }
    let body = &data[..data.len() - 2];
    if body.len() < 3 {
        return Err(MacError::TooShort(body.len()));
    }

    let fcf = u16::from_le_bytes([body[0], body[1]]);
    let frame_type = FrameType::from((fcf & 0b111) as u8);
    let ack_requested = (fcf >> 5) & 1 != 0;
    let panid_compression = (fcf >> 6) & 1 != 0;
    let dest_mode = ((fcf >> 10) & 0b11) as u8;
    let src_mode = ((fcf >> 14) & 0b11) as u8;
    let seqnum = body[2];

    let mut cursor = 3usize;
    let mut dest_panid = None;
    let mut dest_addr = None;
    let mut src_panid = None;
    let mut src_addr = None;

    if dest_mode != 0 {
        dest_panid = Some(take_u16(body, &mut cursor)?);
        dest_addr = Some(take_addr(body, &mut cursor, dest_mode)?);
    }
    if src_mode != 0 {
        if panid_compression {
            src_panid = dest_panid;
        } else {
            src_panid = Some(take_u16(body, &mut cursor)?);
        }
        src_addr = Some(take_addr(body, &mut cursor, src_mode)?);
    }

    let payload = body.get(cursor..).unwrap_or(&[]).to_vec();

    Ok(MacFrame {
        frame_type,
        ack_requested,
        seqnum,
        dest_panid,
        dest_addr,
        src_panid,
        src_addr,
        payload,
    })
}

fn take_u16(body: &[u8], cursor: &mut usize) -> Result<u16, MacError> {
    let slice = body
        .get(*cursor..*cursor + 2)
        .ok_or(MacError::TooShort(body.len()))?;
    *cursor += 2;
    Ok(u16::from_le_bytes([slice[0], slice[1]]))
}

fn take_addr(body: &[u8], cursor: &mut usize, mode: u8) -> Result<Addr, MacError> {
    match mode {
        2 => {
            let slice = body
                .get(*cursor..*cursor + 2)
                .ok_or(MacError::TooShort(body.len()))?;
            *cursor += 2;
            Ok(Addr::Short(u16::from_le_bytes([slice[0], slice[1]])))
        }
        3 => {
            let slice = body
                .get(*cursor..*cursor + 8)
                .ok_or(MacError::TooShort(body.len()))?;
            *cursor += 8;
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(slice);
            Ok(Addr::Long(u64::from_le_bytes(bytes)))
        }
        other => Err(MacError::UnsupportedAddrMode(other)),
    }
}

/// Parses a received 802.15.4 frame and, if it is an ACK, returns its
/// sequence number. Returns `Ok(None)` for any non-ACK frame type rather
/// than treating "not an ACK" as an error.
pub fn parse_ack(data: &[u8]) -> Result<Option<u8>, MacError> {
    let frame = parse(data)?;
    if frame.frame_type != FrameType::Ack {
        return Ok(None);
    }
    Ok(Some(frame.seqnum))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fcs_round_trips() {
        let envelope = build_envelope(7, 0x1234, 0xAAAA, 0xBBBB, b"hello");
        assert!(validate_fcs(&envelope));
    }

    #[test]
    fn flipping_any_bit_fails_fcs() {
        let envelope = build_envelope(7, 0x1234, 0xAAAA, 0xBBBB, b"hello");
        for byte in 0..envelope.len() {
            for bit in 0..8u8 {
                let mut tampered = envelope.clone();
                tampered[byte] ^= 1 << bit;
                assert!(!validate_fcs(&tampered), "byte {byte} bit {bit} went undetected");
            }
        }
    }

    #[test]
    fn build_then_parse_recovers_short_addressing_fields() {
        let envelope = build_envelope(42, 0x1234, 0xAAAA, 0xBBBB, b"rf4ce-payload");
        let parsed = parse(&envelope).unwrap();

        assert_eq!(parsed.frame_type, FrameType::Data);
        assert!(parsed.ack_requested);
        assert_eq!(parsed.seqnum, 42);
        assert_eq!(parsed.dest_panid, Some(0x1234));
        assert_eq!(parsed.src_panid, Some(0x1234));
        assert_eq!(parsed.dest_addr, Some(Addr::Short(0xBBBB)));
        assert_eq!(parsed.src_addr, Some(Addr::Short(0xAAAA)));
        assert_eq!(parsed.payload, b"rf4ce-payload");
    }

    #[test]
    fn corrupted_frame_is_rejected_before_parsing_fields() {
        let mut envelope = build_envelope(1, 0x1234, 0xAAAA, 0xBBBB, b"x");
        let last = envelope.len() - 1;
        envelope[last] ^= 0xFF;
        assert!(matches!(parse(&envelope), Err(MacError::BadFcs)));
    }

    #[test]
    fn long_addressing_mode_parses_eui64_addresses() {
        let mut fcf: u16 = 0b001; // data
        fcf |= 0b11 << 10; // dest long
        fcf |= 0b11 << 14; // src long
        let mut body = Vec::new();
        body.extend_from_slice(&fcf.to_le_bytes());
        body.push(9); // seqnum
        body.extend_from_slice(&0x2222u16.to_le_bytes()); // dest panid
        body.extend_from_slice(&LongAddress::from_colon_hex("11:12:13:14:15:16:17:18").unwrap().to_wire_bytes());
        body.extend_from_slice(&0x2222u16.to_le_bytes()); // src panid (compression off in this vector)
        body.extend_from_slice(&LongAddress::from_colon_hex("01:02:03:04:05:06:07:08").unwrap().to_wire_bytes());
        body.extend_from_slice(b"pairing");
        let fcs = CRC.checksum(&body);
        body.extend_from_slice(&fcs.to_le_bytes());

        let parsed = parse(&body).unwrap();
        assert_eq!(
            parsed.src_addr,
            Some(Addr::Long(LongAddress::from_colon_hex("01:02:03:04:05:06:07:08").unwrap().0))
        );
        assert_eq!(parsed.payload, b"pairing");
    }

    #[test]
    fn parse_ack_extracts_seqnum_from_ack_frames_only() {
        let fcf: u16 = 0b010; // ack
        let mut ack_body = Vec::new();
        ack_body.extend_from_slice(&fcf.to_le_bytes());
        ack_body.push(42);
        let fcs = CRC.checksum(&ack_body);
        ack_body.extend_from_slice(&fcs.to_le_bytes());
        assert_eq!(parse_ack(&ack_body).unwrap(), Some(42));

        let data_envelope = build_envelope(1, 0x1234, 0xAAAA, 0xBBBB, b"x");
        assert_eq!(parse_ack(&data_envelope).unwrap(), None);
    }
}
// EOF
