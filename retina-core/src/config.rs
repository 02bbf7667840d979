//! Load-time configuration (`spec.md` §6.4, C10).
//!
//! Modeled on `huginn-proxy-lib::config::loader::load_from_path`: read the
//! file, parse with `toml::from_str`, then run a validation pass. Every field
//! defaults to the value in the §6.4 table via `#[serde(default = ...)]`.

use crate::error::{CoreError, Result};
use serde::Deserialize;
use std::path::Path;

fn default_ct_map_size() -> u32 {
    262_144
}
fn default_syn_timeout() -> u32 {
    60
}
fn default_tcp_lifetime() -> u32 {
    360
}
fn default_nontcp_lifetime() -> u32 {
    60
}
fn default_time_wait_timeout() -> u32 {
    30
}
fn default_report_interval() -> u32 {
    30
}
fn default_sampling_rate() -> u32 {
    1
}
fn default_bypass_filter() -> bool {
    false
}
fn default_enable_metrics() -> bool {
    true
}
fn default_aggregation_level() -> AggregationLevel {
    AggregationLevel::High
}

/// `DATA_AGGREGATION_LEVEL` (`spec.md` §6.4): LOW always emits on gate
/// approval, HIGH respects the full suppression logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregationLevel {
    Low,
    High,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    #[serde(default = "default_ct_map_size")]
    pub ct_map_size: u32,
    #[serde(default = "default_syn_timeout")]
    pub syn_timeout: u32,
    #[serde(default = "default_tcp_lifetime")]
    pub tcp_lifetime: u32,
    #[serde(default = "default_nontcp_lifetime")]
    pub nontcp_lifetime: u32,
    #[serde(default = "default_time_wait_timeout")]
    pub time_wait_timeout: u32,
    #[serde(default = "default_report_interval")]
    pub report_interval: u32,
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: u32,
    #[serde(default = "default_bypass_filter")]
    pub bypass_filter: bool,
    #[serde(default = "default_enable_metrics")]
    pub enable_metrics: bool,
    #[serde(default = "default_aggregation_level")]
    pub data_aggregation_level: AggregationLevel,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            ct_map_size: default_ct_map_size(),
            syn_timeout: default_syn_timeout(),
            tcp_lifetime: default_tcp_lifetime(),
            nontcp_lifetime: default_nontcp_lifetime(),
            time_wait_timeout: default_time_wait_timeout(),
            report_interval: default_report_interval(),
            sampling_rate: default_sampling_rate(),
            bypass_filter: default_bypass_filter(),
            enable_metrics: default_enable_metrics(),
            data_aggregation_level: default_aggregation_level(),
        }
    }
}

fn validate_config(cfg: &CoreConfig) -> Result<()> {
    if cfg.ct_map_size == 0 {
        return Err(CoreError::Config("ct_map_size must be non-zero".into()));
    }
    if cfg.sampling_rate == 0 {
        return Err(CoreError::Config("sampling_rate must be >= 1".into()));
    }
    if cfg.syn_timeout == 0 || cfg.tcp_lifetime == 0 || cfg.nontcp_lifetime == 0 {
        return Err(CoreError::Config("timeouts must be non-zero".into()));
    }
    Ok(())
}

pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<CoreConfig> {
    let raw = std::fs::read_to_string(path)?;
    let cfg: CoreConfig = toml::from_str(&raw)?;
    validate_config(&cfg)?;
    Ok(cfg)
}
