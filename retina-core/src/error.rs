//! Errors that can escape the core (`spec.md` §7, C11).
//!
//! Only configuration loading can fail outward — the packet path never
//! returns an error to its caller (§7). Shaped after
//! `huginn-proxy-lib::error::ProxyError`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
