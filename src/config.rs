//! Bridge configuration
//!
//! Read once at startup from a TOML file and never re-read. Missing sections fall back to the
//! defaults below, so a partial file is enough to override single values.

use crate::dispatch::DispatchSettings;
use crate::handshake::HandshakeSettings;
use crate::transform::{AngularLimits, OutputVariant};
use color_eyre::eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = "gaze-bridge";
const CONFIG_FILE: &str = "config.toml";

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    pub output: OutputConfig,
    pub sink: SinkConfig,
    pub runtime: RuntimeConfig,
    pub angular: AngularLimits,
    pub native: NativeConfig,
    pub logging: LoggingConfig,
    pub dispatch: DispatchConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub variant: OutputVariant,
}

/// Receiver of the OSC messages
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SinkConfig {
    pub ip: IpAddr,
    pub port: u16,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 9000,
        }
    }
}

/// Tracker runtime service reached during the handshake
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    pub ip: IpAddr,
    pub send_port: u16,
    pub recv_port: u16,
    pub timeout_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            send_port: 2000,
            recv_port: 2001,
            timeout_ms: 5000,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct NativeConfig {
    pub library_path: PathBuf,
}

impl Default for NativeConfig {
    fn default() -> Self {
        Self {
            library_path: PathBuf::from("C:/Program Files/aGlass/aGlass_vr_api.dll"),
        }
    }
}

/// CSV recording of every tick
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    /// Defaults to a per-variant file name in the working directory
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DispatchConfig {
    pub interval_ms: u64,
    pub status_line: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            interval_ms: 20,
            status_line: true,
        }
    }
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.angular.max_yaw_deg > 0.0 && self.angular.max_pitch_deg > 0.0) {
            return Err(eyre!(
                "Angular limits must be positive, got yaw {} / pitch {}",
                self.angular.max_yaw_deg,
                self.angular.max_pitch_deg
            ));
        }
        if self.dispatch.interval_ms == 0 {
            return Err(eyre!("Dispatch interval must be at least 1 ms"));
        }
        if self.runtime.timeout_ms == 0 {
            return Err(eyre!("Handshake timeout must be at least 1 ms"));
        }
        Ok(())
    }

    pub fn sink_addr(&self) -> SocketAddr {
        SocketAddr::new(self.sink.ip, self.sink.port)
    }

    pub fn handshake_settings(&self) -> HandshakeSettings {
        HandshakeSettings {
            runtime_addr: SocketAddr::new(self.runtime.ip, self.runtime.send_port),
            recv_addr: SocketAddr::new(self.runtime.ip, self.runtime.recv_port),
            timeout: Duration::from_millis(self.runtime.timeout_ms),
        }
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            interval: Duration::from_millis(self.dispatch.interval_ms),
            status_line: self.dispatch.status_line,
        }
    }

    /// CSV path if recording is enabled.
    pub fn log_path(&self) -> Option<PathBuf> {
        if !self.logging.enabled {
            return None;
        }
        Some(self.logging.path.clone().unwrap_or_else(|| {
            PathBuf::from(match self.output.variant {
                OutputVariant::Angular => "vrc_osc_log.csv",
                OutputVariant::Bipolar => "vrcft_osc_log.csv",
            })
        }))
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;
        config.validate()?;
        debug!("Loaded config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| eyre!("Failed to serialize config: {}", e))?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| eyre!("Failed to write config file {}: {}", path.display(), e))?;
        Ok(())
    }

    /// Writes a default config file if none exists yet and returns its path.
    pub async fn ensure_default_config(path: &Path) -> Result<PathBuf> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?;
        if !exists {
            info!("No config at {}, writing defaults", path.display());
            Self::default().save(path).await?;
        }
        Ok(path.to_path_buf())
    }

    /// Loads the explicit path if given, else the per-user default location.
    pub async fn resolve(explicit: Option<PathBuf>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path,
            None => Self::ensure_default_config(&default_config_path()).await?,
        };
        info!("Using config file {}", path.display());
        Self::load(&path).await
    }
}

pub fn default_config_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| {
        warn!("Could not determine config directory, using current directory");
        PathBuf::from(".")
    });
    path.push(CONFIG_DIR);
    path.push(CONFIG_FILE);
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_runtime_setup() {
        let config = BridgeConfig::default();
        assert_eq!(config.sink_addr(), "127.0.0.1:9000".parse().unwrap());
        let handshake = config.handshake_settings();
        assert_eq!(handshake.runtime_addr, "127.0.0.1:2000".parse().unwrap());
        assert_eq!(handshake.recv_addr, "127.0.0.1:2001".parse().unwrap());
        assert_eq!(handshake.timeout, Duration::from_secs(5));
        assert_eq!(config.dispatch_settings().interval, Duration::from_millis(20));
        assert_eq!(config.angular, AngularLimits::default());
        assert_eq!(config.log_path(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn log_path_defaults_per_variant() {
        let mut config = BridgeConfig::default();
        config.logging.enabled = true;
        assert_eq!(config.log_path(), Some(PathBuf::from("vrc_osc_log.csv")));
        config.output.variant = OutputVariant::Bipolar;
        assert_eq!(config.log_path(), Some(PathBuf::from("vrcft_osc_log.csv")));
        config.logging.path = Some(PathBuf::from("custom.csv"));
        assert_eq!(config.log_path(), Some(PathBuf::from("custom.csv")));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config: BridgeConfig = toml::from_str(
            r#"
            [output]
            variant = "bipolar"

            [sink]
            port = 9100
            "#,
        )
        .unwrap();
        assert_eq!(config.output.variant, OutputVariant::Bipolar);
        assert_eq!(config.sink.port, 9100);
        assert_eq!(config.sink.ip, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.runtime, RuntimeConfig::default());
    }

    #[test]
    fn rejects_invalid_values() {
        let mut config = BridgeConfig::default();
        config.dispatch.interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::default();
        config.angular.max_pitch_deg = -1.0;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn default_file_is_written_and_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let written = BridgeConfig::ensure_default_config(&path).await.unwrap();
        assert!(written.exists());
        let loaded = BridgeConfig::load(&written).await.unwrap();
        assert_eq!(loaded, BridgeConfig::default());
    }
}
