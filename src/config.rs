use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Result;
use crate::storage::StorageConfig;

/// Pipeline settings, layered from an optional TOML file and
/// `WEATHER_ETL_*` environment overrides. The storage backend is a pure
/// configuration switch; nothing else changes when it does.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    pub cities: Vec<String>,
    pub storage: StorageConfig,
    pub backup_dir: PathBuf,
}

impl Settings {
    /// Load settings. With an explicit path the file must exist; otherwise
    /// `weather-etl.toml` in the working directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("cities", vec!["London", "New York", "Tokyo"])?
            .set_default("storage.type", "csv")?
            .set_default("storage.path", "./data/weather_data.csv")?
            .set_default("backup_dir", "./backups")?;

        builder = match path {
            Some(path) => builder.add_source(config::File::from(path)),
            None => builder.add_source(config::File::with_name("weather-etl").required(false)),
        };
        builder = builder.add_source(
            config::Environment::with_prefix("WEATHER_ETL").separator("__"),
        );

        Ok(builder.build()?.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_without_config_file() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.cities, vec!["London", "New York", "Tokyo"]);
        assert_eq!(
            settings.storage,
            StorageConfig::Csv {
                path: PathBuf::from("./data/weather_data.csv")
            }
        );
        assert_eq!(settings.backup_dir, PathBuf::from("./backups"));
    }

    #[test]
    fn test_file_selects_backend() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            "cities = [\"Paris\"]\n\n[storage]\ntype = \"sqlite\"\npath = \"./data/weather.db\""
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.cities, vec!["Paris"]);
        assert_eq!(
            settings.storage,
            StorageConfig::Sqlite {
                path: PathBuf::from("./data/weather.db")
            }
        );
    }
}
