//! Handles settings for the application. Configuration is read from an
//! optional `config/netspend.toml`, overlaid with `NETSPEND_*` environment
//! variables (`__` separates nested keys, e.g.
//! `NETSPEND_MATCHING__DATE_WINDOW_DAYS=15`).
use config::{Config, ConfigBuilder, ConfigError, Environment, File, builder::DefaultState};
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "config/netspend";

#[derive(Debug, Deserialize)]
pub struct App {
    pub level: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Database {
    Memory,
    Sqlite(String),
}

impl Database {
    pub fn url(&self) -> String {
        match self {
            Database::Memory => String::from("sqlite::memory:"),
            Database::Sqlite(path) => format!("sqlite:{path}?mode=rwc"),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Matching {
    pub date_window_days: i64,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    pub database: Database,
    pub matching: Matching,
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        Self::load(
            defaults()?
                .add_source(File::with_name(path).required(false))
                .add_source(
                    Environment::with_prefix("NETSPEND")
                        .prefix_separator("_")
                        .separator("__")
                        .try_parsing(true),
                ),
        )
    }

    fn load(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        builder.build()?.try_deserialize()
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("app.level", "info")?
        .set_default("database.sqlite", "./netspend.db")?
        .set_default("matching.date_window_days", 30)
}

#[cfg(test)]
mod tests {
    use config::FileFormat;

    use super::*;

    fn from_toml(toml: &str) -> Settings {
        let builder = defaults()
            .unwrap()
            .add_source(File::from_str(toml, FileFormat::Toml));
        Settings::load(builder).unwrap()
    }

    #[test]
    fn defaults_apply_without_a_file() {
        let settings = from_toml("");
        assert_eq!(settings.app.level, "info");
        assert_eq!(settings.matching.date_window_days, 30);
        assert_eq!(settings.database, Database::Sqlite("./netspend.db".to_string()));
    }

    #[test]
    fn file_overrides_defaults() {
        let settings = from_toml(
            r#"
            [app]
            level = "debug"

            [matching]
            date_window_days = 10
            "#,
        );
        assert_eq!(settings.app.level, "debug");
        assert_eq!(settings.matching.date_window_days, 10);
    }

    #[test]
    fn database_urls() {
        assert_eq!(Database::Memory.url(), "sqlite::memory:");
        assert_eq!(
            Database::Sqlite("/tmp/n.db".to_string()).url(),
            "sqlite:/tmp/n.db?mode=rwc"
        );
    }
}
