use crate::error::SacError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Calls at or below this length are left out of filtered views.
pub const DEFAULT_DURATION_THRESHOLD_SECS: u64 = 5 * 60;

/// Top-level application configuration, loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub filter: FilterConfig,
    pub export: ExportConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    /// Load configuration from default path (~/.config/sac-dashboard/config.toml),
    /// falling back to defaults if the file doesn't exist.
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path. A file that is not valid
    /// TOML for this layout is reported as [`SacError::Config`].
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| SacError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Write current configuration to the default path.
    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;
        Ok(())
    }

    /// Default config file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sac-dashboard")
            .join("config.toml")
    }

    /// Data directory for exports and REPL history.
    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sac-dashboard")
    }

    /// Directory export files are written to.
    pub fn export_dir(&self) -> PathBuf {
        self.export
            .dir
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("exports"))
    }
}

/// Where the call dataset comes from. Sources are tried remote first, then
/// local, then a generated sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Remote CSV location (http/https).
    pub url: Option<String>,
    /// Local CSV file or workbook (`.xlsx`, `.xls`, `.ods`).
    pub local_path: Option<PathBuf>,
    /// Request timeout for the remote fetch, in seconds.
    pub timeout_secs: u64,
    /// Rows generated when every other source fails.
    pub synthetic_rows: usize,
    /// Seed for the generated sample.
    pub synthetic_seed: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: None,
            local_path: Some(PathBuf::from("DF.xlsx")),
            timeout_secs: 30,
            synthetic_rows: 60,
            synthetic_seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Only calls strictly longer than this count in filtered views.
    pub duration_threshold_secs: u64,
    /// Sentiments pre-selected in interactive mode. Empty selects all.
    pub default_sentiments: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            duration_threshold_secs: DEFAULT_DURATION_THRESHOLD_SECS,
            default_sentiments: Vec::new(),
        }
    }
}

impl FilterConfig {
    pub fn threshold(&self) -> Duration {
        Duration::from_secs(self.duration_threshold_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Export directory (None = data_dir/exports).
    pub dir: Option<PathBuf>,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Port.
    pub port: u16,
    /// Bearer token for authentication (None = no auth).
    pub auth_token: Option<String>,
    /// Enable CORS.
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8501,
            auth_token: None,
            cors: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("duration_threshold_secs = 300"));
        assert!(toml_str.contains("DF.xlsx"));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.source.synthetic_rows, config.source.synthetic_rows);
        assert_eq!(parsed.server.port, config.server.port);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [source]
            url = "https://example.com/sac.csv"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.source.url.as_deref(), Some("https://example.com/sac.csv"));
        assert_eq!(parsed.source.timeout_secs, 30);
        assert_eq!(parsed.filter.threshold(), Duration::from_secs(300));
    }

    #[test]
    fn test_export_dir_override() {
        let mut config = AppConfig::default();
        assert!(config.export_dir().ends_with("exports"));
        config.export.dir = Some(PathBuf::from("/tmp/sac"));
        assert_eq!(config.export_dir(), PathBuf::from("/tmp/sac"));
    }

    #[test]
    fn test_load_from_invalid_file_is_config_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[filter]\nduration_threshold_secs = \"five\"\n").unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();
        match err.downcast_ref::<SacError>() {
            Some(SacError::Config(msg)) => assert!(msg.contains("config.toml"), "got: {msg}"),
            other => panic!("expected a config error, got {other:?}"),
        }
    }
}
