// lib.rs

pub use log::*;
pub use serde::{Deserialize, Serialize};

pub const FW_VERSION: &str = env!("CARGO_PKG_VERSION");

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] crate::linkconfig::ConfigError),
    #[error("parse error: {0}")]
    Parse(#[from] crate::rf4ce::ParseError),
    #[error("MAC frame error: {0}")]
    Mac(#[from] crate::mac::MacError),
    #[error("authentication error: {0}")]
    Auth(#[from] crate::ccm::AuthError),
    #[error("key recovery error: {0}")]
    KeyRecovery(#[from] crate::keyrecovery::KeyRecoveryError),
    #[error("transmit error: {0}")]
    Transmit(#[from] crate::inject::TransmitError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub mod address;
pub use address::*;

pub mod ccm;
pub use ccm::*;

pub mod rf4ce;
pub use rf4ce::*;

pub mod mac;
pub use mac::*;

pub mod linkconfig;
pub use linkconfig::*;

pub mod pump;
pub use pump::*;

pub mod radio;
pub use radio::*;

pub mod keyrecovery;
pub use keyrecovery::*;

pub mod sniffer;
pub use sniffer::*;

pub mod inject;
pub use inject::*;

// EOF
