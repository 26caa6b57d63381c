//! Server configuration module
//!
//! Parses and manages server configuration from YAML files.
//!
//! Uses serde_yaml for automatic parsing - just define the struct and serde
//! handles all the parsing, validation, and type conversion.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Maximum number of seeded accounts a config may carry.
pub const ACCOUNT_MAX: usize = 1024;

/// One account seeded into the login server's in-memory store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEntry {
    pub account: String,
    pub password: String,
    pub nickname: String,

    /// Grants the in-game admin flag on identification
    #[serde(default)]
    pub admin: bool,
}

/// Main server configuration
///
/// This struct is automatically parsed from YAML by serde.
/// Just add a field here, and serde handles the rest!
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    // ============================================
    // Login Server Configuration
    // ============================================
    /// Login server bind address
    pub login_ip: String,

    #[serde(default = "default_login_port")]
    pub login_port: u16,

    // ============================================
    // Game Server Configuration
    // ============================================
    /// Address advertised to clients after world selection
    pub game_ip: String,

    #[serde(default = "default_game_port")]
    pub game_port: u16,

    /// World listed by the login server
    #[serde(default = "default_world_id")]
    pub world_id: u16,

    #[serde(default = "default_world_name")]
    pub world_name: String,

    // ============================================
    // Protocol Settings
    // ============================================
    /// Required client protocol version
    #[serde(default = "default_version")]
    pub version: u16,

    /// Message of the day, pushed over system chat after login
    #[serde(default)]
    pub motd: String,

    // ============================================
    // Accounts
    // ============================================
    /// Accounts known to the login server. Persistence lives outside
    /// this process; these are seeded at startup.
    #[serde(default)]
    pub accounts: Vec<AccountEntry>,
}

// ============================================
// Default value functions
// These are called by serde when a field is missing
// ============================================

fn default_login_port() -> u16 {
    5555
}

fn default_game_port() -> u16 {
    5556
}

fn default_world_id() -> u16 {
    1
}

fn default_world_name() -> String {
    "Tarnis".to_string()
}

fn default_version() -> u16 {
    129
}

impl ServerConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: ServerConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML in {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from a YAML string
    ///
    /// Useful for testing
    pub fn from_str(contents: &str) -> Result<Self> {
        let config: ServerConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.login_ip.is_empty(), "login_ip cannot be empty");
        anyhow::ensure!(!self.game_ip.is_empty(), "game_ip cannot be empty");
        anyhow::ensure!(self.version > 0, "version must be non-zero");

        anyhow::ensure!(
            self.accounts.len() <= ACCOUNT_MAX,
            "Too many seeded accounts: {} (max {})",
            self.accounts.len(),
            ACCOUNT_MAX
        );

        for entry in &self.accounts {
            anyhow::ensure!(
                !entry.account.is_empty(),
                "seeded account with empty account name"
            );
        }

        Ok(())
    }

    /// Save configuration to a YAML file
    ///
    /// Useful for generating config templates or saving modified configs
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(&self).context("Failed to serialize config to YAML")?;

        fs::write(path.as_ref(), yaml)
            .with_context(|| format!("Failed to write config to {}", path.as_ref().display()))?;

        Ok(())
    }
}
