//! CLI configuration loaded from a TOML file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use focas::{ConnectionTarget, DEFAULT_PORT};
use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Config {
    /// Controller to talk to.
    pub machine: MachineConfig,
    /// Program upload settings.
    pub upload: UploadConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Controller connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct MachineConfig {
    /// Host name or IPv4 address.
    pub host: String,
    /// FOCAS2 Ethernet port.
    pub port: u16,
    /// Timeout for connect and every later call, in milliseconds.
    pub timeout_ms: u64,
    /// Use the built-in simulated controller.
    pub simulate: bool,
    /// Log file for the vendor library. Empty means the cache directory.
    pub library_log: String,
    /// Vendor library log level.
    pub library_log_level: u16,
}

/// Program upload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct UploadConfig {
    /// Clean up uploaded text (strip NULs, trim, ensure `%` framing).
    pub normalize: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: DEFAULT_PORT,
            timeout_ms: 5000,
            simulate: false,
            library_log: String::new(),
            library_log_level: 0,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self { normalize: true }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl Config {
    /// `<config dir>/focas/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("focas").join("config.toml"))
    }

    /// Loads configuration from a TOML file. A missing file gives the
    /// defaults; an unreadable or invalid one is an error.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents)
                .with_context(|| format!("invalid config {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    /// The default configuration as TOML.
    pub fn default_toml() -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(&Self::default())
    }

    /// Writes the default configuration to `path`, creating parent dirs.
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = Self::default_toml().map_err(std::io::Error::other)?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, text)
    }

    /// Connection target from the `[machine]` section.
    pub fn target(&self) -> ConnectionTarget {
        ConnectionTarget::new(
            self.machine.host.clone(),
            self.machine.port,
            Duration::from_millis(self.machine.timeout_ms),
        )
    }

    /// Vendor library log path.
    #[cfg_attr(not(feature = "fwlib"), allow(dead_code))]
    pub fn library_log(&self) -> PathBuf {
        if self.machine.library_log.is_empty() {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("focas")
                .join("fwlib.log")
        } else {
            PathBuf::from(&self.machine.library_log)
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let text = Config::default_toml().unwrap();
        assert!(text.contains("[machine]"));
        assert!(text.contains("port = 8193"));
        assert!(text.contains("[logging]"));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg: Config = toml::from_str("[machine]\nhost = \"10.1.2.3\"\n").unwrap();
        assert_eq!(cfg.machine.host, "10.1.2.3");
        assert_eq!(cfg.machine.port, 8193);
        assert_eq!(cfg.machine.timeout_ms, 5000);
        assert!(cfg.upload.normalize);
        assert_eq!(cfg.logging.level, "warn");
    }

    #[test]
    fn write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        Config::write_default(&path).unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.machine.port, 8193);
        assert_eq!(cfg.target().timeout, Duration::from_secs(5));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(missing.machine.host, "127.0.0.1");
    }

    #[test]
    fn invalid_file_is_reported_to_caller() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "machine = 5").unwrap();
        let err = Config::load(&bad).unwrap_err();
        assert!(format!("{err:#}").contains("bad.toml"));
    }

    #[test]
    fn explicit_library_log() {
        let mut cfg = Config::default();
        cfg.machine.library_log = "/var/log/fwlib.log".into();
        assert_eq!(cfg.library_log(), PathBuf::from("/var/log/fwlib.log"));
    }
}
