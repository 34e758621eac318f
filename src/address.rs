// address.rs — §4.A Address & Node model
//
// A long address is stored as a u64 whose big-endian byte representation is
// the textual "aa:bb:cc:dd:ee:ff:00:11" grouping (MSB-first, as printed on a
// device). The wire form used by RF4CE/802.15.4 is little-endian — the
// textual representation reversed byte-wise — which, for a value stored this
// way, is exactly `u64::to_le_bytes`.

use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error("malformed long address {0:?}: expected 8 colon-separated hex octets")]
    MalformedLongAddress(String),
    #[error("node must have at least one of a long or short address")]
    NoAddress,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct LongAddress(pub u64);

impl LongAddress {
    pub fn from_colon_hex(s: &str) -> Result<Self, AddressError> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 8 {
            return Err(AddressError::MalformedLongAddress(s.to_string()));
        }
        let mut value: u64 = 0;
        for part in &parts {
            let byte = u8::from_str_radix(part, 16)
                .map_err(|_| AddressError::MalformedLongAddress(s.to_string()))?;
            value = (value << 8) | byte as u64;
        }
        Ok(Self(value))
    }

    pub fn to_colon_hex(self) -> String {
        let bytes = self.0.to_be_bytes();
        bytes
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(":")
    }

    /// Little-endian wire bytes (least-significant byte first).
    pub fn to_wire_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    pub fn from_wire_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_le_bytes(bytes))
    }
}

impl fmt::Debug for LongAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_colon_hex())
    }
}

impl fmt::Display for LongAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_colon_hex())
    }
}

/// A RF4CE participant: originator or target. At least one of `long`/`short`
/// must be populated; both are present post-pairing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Node {
    pub long: Option<LongAddress>,
    pub short: Option<u16>,
}

impl Node {
    pub fn new(long: Option<LongAddress>, short: Option<u16>) -> Result<Self, AddressError> {
        if long.is_none() && short.is_none() {
            return Err(AddressError::NoAddress);
        }
        Ok(Self { long, short })
    }

    pub fn from_long(long: LongAddress) -> Self {
        Self { long: Some(long), short: None }
    }

    pub fn from_short(short: u16) -> Self {
        Self { long: None, short: Some(short) }
    }

    /// The long address, for call sites (CCM*) that require one.
    ///
    /// RF4CE's CCM* transform is only ever invoked on frames exchanged
    /// between nodes already resolved to long addresses; spec.md §4.C treats
    /// a missing long address here as a caller contract violation rather
    /// than a typed error.
    pub fn require_long(&self) -> LongAddress {
        self.long.expect("CCM* requires a resolved long address")
    }

    pub fn short_hex(&self) -> Option<String> {
        self.short.map(|s| format!("0x{s:x}"))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.long, self.short) {
            (Some(long), Some(short)) => write!(f, "{long} - 0x{short:x}"),
            (Some(long), None) => write!(f, "{long}"),
            (None, Some(short)) => write!(f, "0x{short:x}"),
            (None, None) => write!(f, "<no address>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_address_round_trips_through_colon_hex() {
        let addr = LongAddress::from_colon_hex("aa:bb:cc:dd:ee:ff:00:11").unwrap();
        assert_eq!(addr.to_colon_hex(), "aa:bb:cc:dd:ee:ff:00:11");
    }

    #[test]
    fn wire_bytes_are_textual_representation_reversed() {
        let addr = LongAddress::from_colon_hex("01:02:03:04:05:06:07:08").unwrap();
        assert_eq!(addr.to_wire_bytes(), [0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn wire_bytes_round_trip() {
        let addr = LongAddress::from_colon_hex("11:12:13:14:15:16:17:18").unwrap();
        assert_eq!(LongAddress::from_wire_bytes(addr.to_wire_bytes()), addr);
    }

    #[test]
    fn short_address_renders_lowercase_hex() {
        let node = Node::from_short(0x1234);
        assert_eq!(node.short_hex().unwrap(), "0x1234");
    }

    #[test]
    fn node_requires_at_least_one_address() {
        assert!(Node::new(None, None).is_err());
        assert!(Node::new(None, Some(1)).is_ok());
    }

    #[test]
    fn malformed_long_address_is_rejected() {
        assert!(LongAddress::from_colon_hex("aa:bb").is_err());
        assert!(LongAddress::from_colon_hex("zz:bb:cc:dd:ee:ff:00:11").is_err());
    }
}
// EOF
