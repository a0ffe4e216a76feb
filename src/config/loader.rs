use super::defaults::{MAX_LOADER_THREADS, MAX_SESSION_HOURS};
use super::types::Config;
use crate::error::{Result, UsageError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load the config, falling back to defaults when it cannot be read
    pub fn load() -> Config {
        Config::load().unwrap_or_else(|e| {
            warn!("Ignoring configuration: {}", e);
            Config::default()
        })
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Config> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| UsageError::io(path, e))?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Directory holding the config and log files (~/.claude/claude-usage/)
    pub fn config_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".claude").join("claude-usage"))
            .ok_or(UsageError::NoHomeDir)
    }

    pub fn log_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("claude-usage.log"))
    }
}

impl Config {
    /// Load configuration from default location; defaults when absent
    pub fn load() -> Result<Config> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            debug!("No config at {}, using defaults", config_path.display());
            return Ok(Config::default());
        }

        ConfigLoader::load_from_path(config_path)
    }

    /// Save configuration to default location
    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::config_path()?;
        self.save_to_path(&config_path)?;
        Ok(config_path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| UsageError::io(parent, e))?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| UsageError::io(path, e))?;
        Ok(())
    }

    /// Get the default config file path (~/.claude/claude-usage/config.toml)
    pub fn config_path() -> Result<PathBuf> {
        Ok(ConfigLoader::config_dir()?.join("config.toml"))
    }

    /// Create the default config unless one exists; true when a file was written
    pub fn init() -> Result<(PathBuf, bool)> {
        let config_path = Self::config_path()?;
        let created = Self::init_at(&config_path)?;
        Ok((config_path, created))
    }

    pub fn init_at(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        Config::default().save_to_path(path)?;
        Ok(true)
    }

    /// Validate configuration
    pub fn check(&self) -> Result<()> {
        if self.refresh_interval_secs == 0 {
            return Err(UsageError::InvalidConfig(
                "refresh_interval_secs must be positive".to_string(),
            ));
        }

        if !(1..=MAX_SESSION_HOURS).contains(&self.session_hours) {
            return Err(UsageError::InvalidConfig(format!(
                "session_hours must be between 1 and {}, got {}",
                MAX_SESSION_HOURS, self.session_hours
            )));
        }

        if let Some(threads) = self.loader_threads {
            if !(1..=MAX_LOADER_THREADS).contains(&threads) {
                return Err(UsageError::InvalidConfig(format!(
                    "loader_threads must be between 1 and {}, got {}",
                    MAX_LOADER_THREADS, threads
                )));
            }
        }

        if let Some(dir) = &self.data_dir {
            if !dir.exists() {
                return Err(UsageError::InvalidConfig(format!(
                    "data_dir {} does not exist",
                    dir.display()
                )));
            }
        }

        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Print configuration as TOML
    pub fn print(&self) -> Result<()> {
        println!("{}", self.to_toml()?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::ClaudePlan;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: Config = toml::from_str("plan = \"max5\"").unwrap();
        assert_eq!(config.plan, ClaudePlan::Max5);
        assert_eq!(config.refresh_interval_secs, 5);
        assert_eq!(config.session_hours, 5);
        assert!(!config.fetch_pricing);
        assert!(config.loader_threads.is_none());
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_unknown_plan_falls_back() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "plan = \"enterprise\"\n").unwrap();

        let config = tracing::subscriber::with_default(subscriber, || {
            ConfigLoader::load_from_path(&path).unwrap()
        });
        assert_eq!(config.plan, ClaudePlan::Pro);

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("WARN"));
        assert!(output.contains("enterprise"));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config {
            plan: ClaudePlan::Max20,
            refresh_interval_secs: 10,
            loader_threads: Some(4),
            ..Config::default()
        };
        config.save_to_path(&path).unwrap();

        let loaded = ConfigLoader::load_from_path(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_init_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        assert!(Config::init_at(&path).unwrap());
        fs::write(&path, "plan = \"max5\"\n").unwrap();
        assert!(!Config::init_at(&path).unwrap());
        assert_eq!(
            ConfigLoader::load_from_path(&path).unwrap().plan,
            ClaudePlan::Max5
        );
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "plan = [").unwrap();
        assert!(matches!(
            ConfigLoader::load_from_path(&path),
            Err(UsageError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_check() {
        assert!(Config::default().check().is_ok());

        let bad_refresh = Config {
            refresh_interval_secs: 0,
            ..Config::default()
        };
        assert!(bad_refresh.check().is_err());

        let zero_hours = Config {
            session_hours: 0,
            ..Config::default()
        };
        assert!(zero_hours.check().is_err());

        let year = Config {
            session_hours: MAX_SESSION_HOURS,
            ..Config::default()
        };
        assert!(year.check().is_ok());

        let overflowing_hours = Config {
            session_hours: u32::MAX,
            ..Config::default()
        };
        assert!(overflowing_hours.check().is_err());

        let bad_threads = Config {
            loader_threads: Some(65),
            ..Config::default()
        };
        assert!(bad_threads.check().is_err());

        let missing_dir = Config {
            data_dir: Some(PathBuf::from("/no/such/dir")),
            ..Config::default()
        };
        assert!(missing_dir.check().is_err());
    }

    #[test]
    fn test_to_toml_omits_unset_options() {
        let text = Config::default().to_toml().unwrap();
        assert!(text.contains("plan = \"pro\""));
        assert!(!text.contains("data_dir"));
        assert!(!text.contains("loader_threads"));
    }
}
