//! Configuration file support for escom.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (ESCOM_*)
//! 3. Local config file (./escom.toml)
//! 4. Global config file (~/.config/escom/config.toml)
//!
//! ```toml
//! [connection]
//! serial = "/dev/ttyUSB0"
//! baud = 115200
//!
//! [target]
//! name = "mecrisp"
//! path = ".;./mcu;./lib"
//!
//! [timing]
//! idle_poll_ms = 50
//! reply_timeout_ms = 500
//! max_attempts = 12
//! ```

use directories::ProjectDirs;
use escom::{LinkTiming, SearchPath, TargetProfile};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Baud rate used when nothing else is configured.
pub const DEFAULT_BAUD: u32 = 9600;

/// Baud rates the terminal accepts.
pub const SUPPORTED_BAUD_RATES: [u32; 8] = [9600, 14400, 19200, 38400, 56000, 57600, 115200, 128000];

/// Name of the local configuration file.
const LOCAL_CONFIG: &str = "escom.toml";

/// Whether `baud` is one of [`SUPPORTED_BAUD_RATES`].
pub fn is_supported_baud(baud: u32) -> bool {
    SUPPORTED_BAUD_RATES.contains(&baud)
}

/// Parse a baud rate given on the command line.
pub fn parse_baud(s: &str) -> Result<u32, String> {
    let baud: u32 = s
        .trim()
        .parse()
        .map_err(|e| format!("Invalid baud rate '{s}': {e}"))?;
    if is_supported_baud(baud) {
        Ok(baud)
    } else {
        let rates: Vec<String> = SUPPORTED_BAUD_RATES
            .iter()
            .map(ToString::to_string)
            .collect();
        Err(format!("Unsupported baud rate {baud} (expected one of {})", rates.join(", ")))
    }
}

/// Connection configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Preferred serial port (e.g., "/dev/ttyUSB0" or "COM3").
    pub serial: Option<String>,
    /// Default baud rate.
    pub baud: Option<u32>,
}

/// Target configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Forth system on the other end ("stm8ef" or "mecrisp").
    pub name: Option<String>,
    /// `;`-separated search path for source and resource files.
    pub path: Option<String>,
}

/// Link timing configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Read timeout while idle-polling, in milliseconds.
    pub idle_poll_ms: Option<u64>,
    /// Read timeout while waiting for a reply, in milliseconds.
    pub reply_timeout_ms: Option<u64>,
    /// Read timeouts per reply before giving up.
    pub max_attempts: Option<usize>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection configuration.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Target configuration.
    #[serde(default)]
    pub target: TargetConfig,
    /// Timing configuration.
    #[serde(default)]
    pub timing: TimingConfig,
}

impl Config {
    /// Global file first, then `./escom.toml` on top of it.
    pub fn load() -> Self {
        let sources = Self::global_config_path()
            .into_iter()
            .chain([PathBuf::from(LOCAL_CONFIG)]);

        let mut config = Self::default();
        for path in sources {
            if let Some(layer) = Self::read_layer(&path) {
                debug!("Config layer {}", path.display());
                config.merge(layer);
            }
        }
        config
    }

    /// Load only the file named with `--config`.
    pub fn load_from_path(path: &Path) -> Self {
        Self::read_layer(path).unwrap_or_else(|| {
            warn!("Could not load config from {}, using defaults", path.display());
            Self::default()
        })
    }

    /// Parse one file. Missing files are silently absent, broken ones warn.
    fn read_layer(path: &Path) -> Option<Self> {
        if !path.is_file() {
            return None;
        }
        let text = fs::read_to_string(path)
            .inspect_err(|e| warn!("Cannot read {}: {e}", path.display()))
            .ok()?;
        toml::from_str(&text)
            .inspect_err(|e| warn!("Bad config file {}: {e}", path.display()))
            .ok()
    }

    /// Per-user configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "escom").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// `config.toml` inside [`Config::global_config_dir`].
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Values set in `layer` replace ours; unset ones leave ours alone.
    fn merge(&mut self, layer: Self) {
        fn overlay<T>(base: &mut Option<T>, top: Option<T>) {
            if top.is_some() {
                *base = top;
            }
        }

        overlay(&mut self.connection.serial, layer.connection.serial);
        overlay(&mut self.connection.baud, layer.connection.baud);
        overlay(&mut self.target.name, layer.target.name);
        overlay(&mut self.target.path, layer.target.path);
        overlay(&mut self.timing.idle_poll_ms, layer.timing.idle_poll_ms);
        overlay(&mut self.timing.reply_timeout_ms, layer.timing.reply_timeout_ms);
        overlay(&mut self.timing.max_attempts, layer.timing.max_attempts);
    }

    /// Configured baud rate, if it is a supported one.
    pub fn baud(&self) -> Option<u32> {
        let baud = self.connection.baud?;
        if is_supported_baud(baud) {
            Some(baud)
        } else {
            warn!("Ignoring unsupported baud rate {baud} from config, using default");
            None
        }
    }

    /// Configured target profile, if it names a known one.
    pub fn target(&self) -> Option<TargetProfile> {
        let name = self.target.name.as_deref()?;
        match name.parse() {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!("{e}, using default target");
                None
            },
        }
    }

    /// Configured search path.
    pub fn search_path(&self) -> Option<SearchPath> {
        self.target
            .path
            .as_deref()
            .map(SearchPath::parse)
    }

    /// Link timing with configured overrides applied.
    pub fn timing(&self) -> LinkTiming {
        let mut timing = LinkTiming::default();
        if let Some(ms) = self.timing.idle_poll_ms {
            timing.idle_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.timing.reply_timeout_ms {
            timing.reply_timeout = Duration::from_millis(ms);
        }
        match self.timing.max_attempts {
            Some(0) => warn!("max_attempts must be at least 1, using default"),
            Some(n) => timing.max_attempts = n,
            None => {},
        }
        timing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Default values ----

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.connection.serial.is_none());
        assert!(config.connection.baud.is_none());
        assert!(config.target.name.is_none());
        assert!(config.target.path.is_none());
        assert!(config.baud().is_none());
        assert!(config.target().is_none());
        assert_eq!(config.timing(), LinkTiming::default());
    }

    // ---- Baud rates ----

    #[test]
    fn test_parse_baud() {
        assert_eq!(parse_baud("9600"), Ok(9600));
        assert_eq!(parse_baud(" 115200 "), Ok(115200));
        assert!(parse_baud("921600").is_err());
        assert!(parse_baud("fast").is_err());
    }

    #[test]
    fn test_config_baud_rejects_unsupported() {
        let mut config = Config::default();
        config.connection.baud = Some(57600);
        assert_eq!(config.baud(), Some(57600));
        config.connection.baud = Some(250000);
        assert_eq!(config.baud(), None);
    }

    // ---- Config merge ----

    #[test]
    fn test_config_merge_overrides() {
        let mut base = Config::default();
        base.connection.serial = Some("/dev/ttyUSB0".to_string());
        base.connection.baud = Some(9600);

        let mut other = Config::default();
        other.connection.baud = Some(115200);
        other.target.name = Some("mecrisp".to_string());

        base.merge(other);
        assert_eq!(base.connection.serial.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(base.connection.baud, Some(115200));
        assert_eq!(base.target(), Some(TargetProfile::Mecrisp));
    }

    #[test]
    fn test_config_merge_does_not_overwrite_with_none() {
        let mut base = Config::default();
        base.target.path = Some("lib".to_string());
        base.timing.max_attempts = Some(3);

        base.merge(Config::default());
        assert_eq!(base.target.path.as_deref(), Some("lib"));
        assert_eq!(base.timing.max_attempts, Some(3));
    }

    // ---- TOML ----

    #[test]
    fn test_parse_full_toml() {
        let config: Config = toml::from_str(
            r#"
            [connection]
            serial = "COM5"
            baud = 19200

            [target]
            name = "Mecrisp"
            path = "src;lib"

            [timing]
            idle_poll_ms = 20
            reply_timeout_ms = 1000
            max_attempts = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.connection.serial.as_deref(), Some("COM5"));
        assert_eq!(config.baud(), Some(19200));
        assert_eq!(config.target(), Some(TargetProfile::Mecrisp));
        assert_eq!(
            config
                .search_path()
                .unwrap()
                .to_string(),
            "src;lib"
        );

        let timing = config.timing();
        assert_eq!(timing.idle_timeout, Duration::from_millis(20));
        assert_eq!(timing.reply_timeout, Duration::from_millis(1000));
        assert_eq!(timing.max_attempts, 4);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: Config = toml::from_str("[target]\nname = \"stm8ef\"\n").unwrap();
        assert!(config.connection.serial.is_none());
        assert_eq!(config.target(), Some(TargetProfile::Stm8ef));
    }

    #[test]
    fn test_unknown_target_falls_back() {
        let config: Config = toml::from_str("[target]\nname = \"gforth\"\n").unwrap();
        assert_eq!(config.target(), None);
    }

    #[test]
    fn test_zero_attempts_keeps_default() {
        let mut config = Config::default();
        config.timing.max_attempts = Some(0);
        assert_eq!(config.timing().max_attempts, LinkTiming::default().max_attempts);
    }

    // ---- Loading ----

    #[test]
    fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("escom.toml");
        fs::write(&path, "[connection]\nserial = \"/dev/ttyACM0\"\n").unwrap();

        let config = Config::load_from_path(&path);
        assert_eq!(config.connection.serial.as_deref(), Some("/dev/ttyACM0"));
    }

    #[test]
    fn test_load_from_path_invalid_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[connection\nserial = ").unwrap();

        let config = Config::load_from_path(&path);
        assert!(config.connection.serial.is_none());

        let missing = Config::load_from_path(&dir.path().join("missing.toml"));
        assert!(missing.connection.serial.is_none());
    }

    #[test]
    fn test_global_config_path_ends_with_config_toml() {
        if let Some(path) = Config::global_config_path() {
            assert!(path.ends_with("config.toml"));
        }
    }

    #[test]
    fn test_config_roundtrip_serialization() {
        let mut config = Config::default();
        config.connection.serial = Some("/dev/ttyUSB1".to_string());
        config.timing.reply_timeout_ms = Some(750);

        let text = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.connection.serial.as_deref(), Some("/dev/ttyUSB1"));
        assert_eq!(back.timing.reply_timeout_ms, Some(750));
    }
}
