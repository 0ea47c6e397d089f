//! CLI configuration
//!
//! Read from `gpcard.toml` (or `--config`) and overridden by `GPCARD_*`
//! environment variables. A missing file yields the defaults.

use std::path::Path;

use eyre::WrapErr;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use gpcard_globalplatform::{
    ForceReloadPolicy, KeyCandidates, Keys, NamedKeys, SecurityLevel,
    constants::DEFAULT_BLOCK_SIZE,
    session::{DEFAULT_KEY, STATUS_KEY},
};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default configuration file name
pub const CONFIG_FILE: &str = "gpcard.toml";

/// Static key set tried during the handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySet {
    /// Label shown in logs
    pub name: String,
    /// 16-byte key as hex, used for ENC, MAC and DEK
    pub key: String,
}

/// Secure channel protection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Level {
    /// C-MAC only
    #[default]
    Mac,
    /// C-MAC and command encryption
    MacEnc,
}

impl From<Level> for SecurityLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::Mac => Self::Mac,
            Level::MacEnc => Self::MacEnc,
        }
    }
}

/// Handling of failed deletes during a forced reload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReloadPolicy {
    /// Stop at the first rejected delete
    #[default]
    Abort,
    /// Keep going
    BestEffort,
}

impl From<ReloadPolicy> for ForceReloadPolicy {
    fn from(policy: ReloadPolicy) -> Self {
        match policy {
            ReloadPolicy::Abort => Self::Abort,
            ReloadPolicy::BestEffort => Self::BestEffort,
        }
    }
}

/// `gpcard` settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Key sets in the order they are tried
    pub key_sets: Vec<KeySet>,
    pub security_level: Level,
    /// Delete existing instances and the package before loading
    pub force_reload: bool,
    pub reload_policy: ReloadPolicy,
    /// LOAD block size in bytes
    pub block_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            key_sets: vec![
                KeySet {
                    name: "status".into(),
                    key: hex::encode(STATUS_KEY),
                },
                KeySet {
                    name: "default".into(),
                    key: hex::encode(DEFAULT_KEY),
                },
            ],
            security_level: Level::Mac,
            force_reload: false,
            reload_policy: ReloadPolicy::Abort,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl Config {
    /// Layer defaults, the TOML file and `GPCARD_*` variables
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("GPCARD_"))
    }

    /// Load the configuration from `path`
    pub fn load(path: &Path) -> eyre::Result<Self> {
        Self::figment(path)
            .extract()
            .wrap_err_with(|| format!("invalid configuration in {}", path.display()))
    }

    /// Parse the key sets into handshake candidates
    pub fn key_candidates(&self) -> eyre::Result<KeyCandidates> {
        let candidates = self
            .key_sets
            .iter()
            .map(|set| {
                Keys::from_hex(&set.key)
                    .map(|keys| NamedKeys::new(&set.name, keys))
                    .wrap_err_with(|| format!("key set `{}`", set.name))
            })
            .collect::<eyre::Result<Vec<_>>>()?;

        if candidates.is_empty() {
            eyre::bail!("no key sets configured");
        }
        Ok(KeyCandidates::new(candidates))
    }

    /// LOAD block size, capped to what the security level can wrap
    pub fn effective_block_size(&self) -> usize {
        let max = SecurityLevel::from(self.security_level).max_block_size();
        if self.block_size > max {
            warn!(
                block_size = self.block_size,
                max,
                level = %SecurityLevel::from(self.security_level),
                "Block size too large for security level, capping"
            );
            return max;
        }
        self.block_size
    }

    /// Reload policy to apply, if reloading is enabled
    pub fn force_reload(&self, force: bool) -> Option<ForceReloadPolicy> {
        (force || self.force_reload).then_some(self.reload_policy.into())
    }
}
