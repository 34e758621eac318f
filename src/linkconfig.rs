// linkconfig.rs — §4.B Link-config persistence
//
// `LinkConfig` is the only piece of state that survives across process
// invocations: the pairing observer writes it on success, the injection
// controller advances and re-persists `frame_counter` on shutdown. Stored as
// pretty-printed JSON, one whole-file replace per save.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::address::{AddressError, LongAddress, Node};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed address in configuration: {0}")]
    Address(#[from] AddressError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkConfig {
    pub source: Node,
    pub destination: Node,
    pub dest_panid: u16,
    pub key: Option<[u8; 16]>,
    pub frame_counter: u32,
}

/// On-disk shape (§4.B): addresses and PAN ID as hex strings, key as a
/// 32-char hex string, everything else plain JSON types.
#[derive(Serialize, Deserialize)]
struct LinkConfigSchema {
    full_source: String,
    short_source: String,
    full_destination: String,
    short_destination: String,
    dest_panid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(default)]
    frame_counter: u32,
}

impl LinkConfig {
    pub fn empty() -> Self {
        Self {
            source: Node::from_short(0),
            destination: Node::from_short(0),
            dest_panid: 0,
            key: None,
            frame_counter: 0,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let schema: LinkConfigSchema = serde_json::from_str(&raw)?;

        let source = Node::new(
            Some(LongAddress::from_colon_hex(&schema.full_source)?),
            Some(parse_hex_u16(&schema.short_source)),
        )?;
        let destination = Node::new(
            Some(LongAddress::from_colon_hex(&schema.full_destination)?),
            Some(parse_hex_u16(&schema.short_destination)),
        )?;
        let dest_panid = parse_hex_u16(&schema.dest_panid);
        let key = schema.key.as_deref().and_then(parse_key);

        Ok(Self {
            source,
            destination,
            dest_panid,
            key,
            frame_counter: schema.frame_counter,
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let schema = LinkConfigSchema {
            full_source: self.source.long.map(|l| l.to_colon_hex()).unwrap_or_default(),
            short_source: format!("0x{:x}", self.source.short.unwrap_or(0)),
            full_destination: self.destination.long.map(|l| l.to_colon_hex()).unwrap_or_default(),
            short_destination: format!("0x{:x}", self.destination.short.unwrap_or(0)),
            dest_panid: format!("0x{:x}", self.dest_panid),
            key: self.key.map(hex::encode),
            frame_counter: self.frame_counter,
        };

        // spec.md's JSON schema matches the original `json.dump(..., indent=4)`
        // (examples/original_source/rf4ce/linkconfig.py), not serde_json's
        // default 2-space pretty printer.
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut buf = Vec::new();
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        schema.serialize(&mut serializer)?;

        fs::write(path, buf)?;
        Ok(())
    }
}

fn parse_hex_u16(s: &str) -> u16 {
    let trimmed = s.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(trimmed, 16).unwrap_or(0)
}

fn parse_key(s: &str) -> Option<[u8; 16]> {
    let bytes = hex::decode(s).ok()?;
    if bytes.len() != 16 {
        return None;
    }
    let mut key = [0u8; 16];
    key.copy_from_slice(&bytes);
    Some(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn sample() -> LinkConfig {
        LinkConfig {
            source: Node::new(Some(LongAddress::from_colon_hex("01:02:03:04:05:06:07:08").unwrap()), Some(0xAAAA)).unwrap(),
            destination: Node::new(Some(LongAddress::from_colon_hex("11:12:13:14:15:16:17:18").unwrap()), Some(0xBBBB)).unwrap(),
            dest_panid: 0x1234,
            key: Some([0x42; 16]),
            frame_counter: 7,
        }
    }

    #[test]
    fn save_uses_four_space_indentation() {
        let file = NamedTempFile::new().unwrap();
        sample().save(file.path()).unwrap();

        let rendered = fs::read_to_string(file.path()).unwrap();
        let first_field_line = rendered.lines().nth(1).unwrap();
        assert!(first_field_line.starts_with("    \""), "expected 4-space indent, got {first_field_line:?}");
    }

    #[test]
    fn save_then_load_round_trips() {
        let file = NamedTempFile::new().unwrap();
        let config = sample();
        config.save(file.path()).unwrap();

        let loaded = LinkConfig::load(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_optional_fields_default() {
        let file = NamedTempFile::new().unwrap();
        fs::write(
            file.path(),
            r#"{
                "full_source": "01:02:03:04:05:06:07:08",
                "short_source": "0xaaaa",
                "full_destination": "11:12:13:14:15:16:17:18",
                "short_destination": "0xbbbb",
                "dest_panid": "0x1234"
            }"#,
        )
        .unwrap();

        let loaded = LinkConfig::load(file.path()).unwrap();
        assert_eq!(loaded.key, None);
        assert_eq!(loaded.frame_counter, 0);
    }

    #[test]
    fn malformed_json_is_a_typed_error() {
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), "{ not json").unwrap();
        assert!(matches!(LinkConfig::load(file.path()), Err(ConfigError::Json(_))));
    }

    #[test]
    fn malformed_address_is_a_typed_error() {
        let file = NamedTempFile::new().unwrap();
        fs::write(
            file.path(),
            r#"{
                "full_source": "not-an-address",
                "short_source": "0xaaaa",
                "full_destination": "11:12:13:14:15:16:17:18",
                "short_destination": "0xbbbb",
                "dest_panid": "0x1234"
            }"#,
        )
        .unwrap();
        assert!(matches!(LinkConfig::load(file.path()), Err(ConfigError::Address(_))));
    }
}
// EOF
