use crate::config::AppConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads application configuration by merging defaults, TOML, environment variables, and JSON.
    ///
    /// Nested keys are addressed with a double underscore, e.g.
    /// `APP_HEALTH__COOLDOWN_SECS=600`.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load() -> Result<AppConfig> {
        let config: AppConfig = Self::base()
            .merge(Toml::file("config/Config.toml"))
            .merge(Env::prefixed("APP_").split("__"))
            .join(Json::file("config/Config.json"))
            .extract()?;

        Ok(config)
    }

    /// Loads application configuration with a specific profile.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load_with_profile(profile: &str) -> Result<AppConfig> {
        let config: AppConfig = Self::base()
            .merge(Toml::file("config/Config.toml"))
            .merge(Toml::file(format!("config/Config.{profile}.toml")))
            .merge(Env::prefixed("APP_").split("__"))
            .join(Json::file("config/Config.json"))
            .extract()?;

        Ok(config)
    }

    /// Loads configuration from an explicit TOML file, still honouring `APP_` overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed.
    pub fn load_from(path: impl AsRef<Path>) -> Result<AppConfig> {
        let config: AppConfig = Self::base()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("APP_").split("__"))
            .extract()?;

        Ok(config)
    }

    fn base() -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrokerMode;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_overrides_selected_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[storage]
data_dir = "/tmp/governance"

[broker]
mode = "alpaca_paper"

[health]
cooldown_secs = 600

[scaler]
max_drawdown_pct = "12.5"
"#
        )
        .unwrap();

        let config = ConfigLoader::load_from(&path).unwrap();

        assert_eq!(config.storage.data_dir.to_str(), Some("/tmp/governance"));
        assert_eq!(config.broker.mode, BrokerMode::AlpacaPaper);
        assert_eq!(config.health.cooldown_secs, 600);
        assert_eq!(config.scaler.max_drawdown_pct, dec!(12.5));
        // Untouched fields keep their defaults
        assert_eq!(config.health.failure_threshold, 3);
        assert_eq!(config.alerts.max_entries, 100);
        assert_eq!(config.scaler.funding_days, 30);
    }

    #[test]
    fn test_load_from_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ConfigLoader::load_from(dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.health.max_attempts, 4);
        assert_eq!(config.broker.mode, BrokerMode::Paper);
    }
}
