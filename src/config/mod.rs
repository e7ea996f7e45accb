//! Configuration management for the companion
//!
//! Handles loading, parsing and validation of the YAML configuration file.
//! The configuration is read once at startup and never changes afterwards.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

use crate::platform;

/// Parameter number reserved for the pitch wheel
pub const PITCH_WHEEL_PARAMETER: u8 = 128;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: Settings,
    /// Source parameter number -> destination parameter number
    #[serde(default, alias = "ParameterRemapping")]
    pub parameter_remapping: BTreeMap<u8, u8>,
    #[serde(default, alias = "InvertParameters")]
    pub invert_parameters: InvertList,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub midi: MidiConfig,
}

/// Translation settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Parameter/volume messages per second before dropping kicks in (0 = unlimited)
    #[serde(default = "default_max_rate", alias = "MaxParameterMessageRate")]
    pub max_parameter_message_rate: u32,
    #[serde(default, alias = "RemapParameters")]
    pub remap_parameters: bool,
    #[serde(
        default,
        alias = "enable_additional_logging",
        alias = "EnableAdditionalLogging"
    )]
    pub verbose_logging: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_parameter_message_rate: default_max_rate(),
            remap_parameters: false,
            verbose_logging: false,
        }
    }
}

/// Parameters whose value is inverted, either as a YAML list or a
/// comma-separated string (`"7, 10"`)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum InvertList {
    List(Vec<i64>),
    Csv(String),
}

impl Default for InvertList {
    fn default() -> Self {
        InvertList::List(Vec::new())
    }
}

impl InvertList {
    fn tokens(&self) -> Vec<&str> {
        match self {
            InvertList::List(_) => Vec::new(),
            InvertList::Csv(text) => text
                .split(',')
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .collect(),
        }
    }

    /// Parsed entries; unparsable CSV tokens are skipped
    pub fn entries(&self) -> Vec<i64> {
        match self {
            InvertList::List(values) => values.clone(),
            InvertList::Csv(_) => self
                .tokens()
                .into_iter()
                .filter_map(|token| token.parse::<i64>().ok())
                .collect(),
        }
    }

    /// CSV tokens that are not integers
    pub fn invalid_tokens(&self) -> Vec<&str> {
        self.tokens()
            .into_iter()
            .filter(|token| token.parse::<i64>().is_err())
            .collect()
    }
}

/// Network endpoints for the OSC server and the discovery broadcast
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    #[serde(default = "default_osc_port")]
    pub osc_port: u16,
    #[serde(default = "default_broadcast_port")]
    pub broadcast_port: u16,
    #[serde(default = "default_broadcast_interval")]
    pub broadcast_interval_ms: u64,
    #[serde(default = "default_announce_prefix")]
    pub announce_prefix: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            osc_port: default_osc_port(),
            broadcast_port: default_broadcast_port(),
            broadcast_interval_ms: default_broadcast_interval(),
            announce_prefix: default_announce_prefix(),
        }
    }
}

/// MIDI output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MidiConfig {
    /// Output port name pattern (case-insensitive substring match)
    #[serde(default = "default_output_port")]
    pub output_port: String,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            output_port: default_output_port(),
        }
    }
}

/// Remap table and invert set in the form the translator consumes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterTransforms {
    pub remaps: HashMap<u8, u8>,
    pub inverted: BTreeSet<u8>,
}

impl ParameterTransforms {
    /// Destination of `number`, identity when no entry exists
    pub fn remap(&self, number: u8) -> u8 {
        self.remaps.get(&number).copied().unwrap_or(number)
    }

    pub fn is_inverted(&self, number: u8) -> bool {
        self.inverted.contains(&number)
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_yaml_str(&contents)
            .with_context(|| format!("Failed to load config: {}", path.display()))
    }

    /// Load configuration, falling back to defaults when the file does not exist
    pub async fn load_or_default(path: &Path) -> Result<Self> {
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            info!("No config file at {}, using default settings", path.display());
            Ok(Self::default())
        }
    }

    /// Parse and validate configuration from a YAML document
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        // An empty file is a valid "all defaults" config
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: AppConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?;

        for token in config.invert_parameters.invalid_tokens() {
            warn!("Ignoring invalid invert parameter entry '{}'", token);
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        for (&source, &destination) in &self.parameter_remapping {
            if source > 127 {
                anyhow::bail!("Remap source parameter {} is invalid (must be 0-127)", source);
            }
            if destination > PITCH_WHEEL_PARAMETER {
                anyhow::bail!(
                    "Remap target for parameter {} is {} (must be 0-127, or 128 for pitch wheel)",
                    source,
                    destination
                );
            }
        }

        for value in self.invert_parameters.entries() {
            if !(0..=PITCH_WHEEL_PARAMETER as i64).contains(&value) {
                anyhow::bail!(
                    "Invert parameter {} is invalid (must be 0-127, or 128 for pitch wheel)",
                    value
                );
            }
        }

        if self.network.osc_port == 0 {
            anyhow::bail!("network.osc_port cannot be 0");
        }
        if self.network.broadcast_port == 0 {
            anyhow::bail!("network.broadcast_port cannot be 0");
        }
        if self.network.broadcast_interval_ms < 100 {
            anyhow::bail!(
                "network.broadcast_interval_ms is {} (must be at least 100)",
                self.network.broadcast_interval_ms
            );
        }
        if self.network.announce_prefix.is_empty() {
            anyhow::bail!("network.announce_prefix cannot be empty");
        }

        if self.midi.output_port.trim().is_empty() {
            anyhow::bail!("midi.output_port cannot be empty");
        }

        Ok(())
    }

    /// Build the remap/invert tables used during translation
    pub fn parameter_transforms(&self) -> ParameterTransforms {
        ParameterTransforms {
            remaps: self
                .parameter_remapping
                .iter()
                .map(|(&source, &destination)| (source, destination))
                .collect(),
            inverted: self
                .invert_parameters
                .entries()
                .into_iter()
                .filter_map(|value| u8::try_from(value).ok())
                .filter(|value| *value <= PITCH_WHEEL_PARAMETER)
                .collect(),
        }
    }

    /// Log the effective translation settings (verbose mode only)
    pub fn log_summary(&self) {
        if !self.settings.verbose_logging {
            return;
        }

        if !self.parameter_remapping.is_empty() {
            let state = if self.settings.remap_parameters {
                "enabled"
            } else {
                "configured but disabled"
            };
            info!("Parameter remapping {}:", state);
            for (source, destination) in &self.parameter_remapping {
                info!("  {} -> {}", source, destination);
            }
        }

        let inverted = self.parameter_transforms().inverted;
        if !inverted.is_empty() {
            info!("Inverted parameters: {:?}", inverted);
        }

        if self.settings.max_parameter_message_rate > 0 {
            info!(
                "Max parameter rate: {}",
                self.settings.max_parameter_message_rate
            );
        }
    }
}

// Default value functions
fn default_max_rate() -> u32 {
    300
}

fn default_osc_port() -> u16 {
    9003
}

fn default_broadcast_port() -> u16 {
    9002
}

fn default_broadcast_interval() -> u64 {
    3000
}

fn default_announce_prefix() -> String {
    "VirtuosoCompanion".to_string()
}

fn default_output_port() -> String {
    platform::default_output_port().to_string()
}
