use std::fs;
use std::path::{Path, PathBuf};

use leaderboard_app::EngineConfig;
use serde::{Deserialize, Serialize};

const DEFAULT_PORT: u16 = 3845;
const DEFAULT_HOST: &str = "127.0.0.1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(flatten)]
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            engine: EngineConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: ServerConfig,
    pub file: PathBuf,
    pub created: bool,
}

/// Reads `file`, or writes the defaults there when it does not exist yet.
pub fn load_or_create(file: &Path) -> Result<ConfigLoad, String> {
    if file.exists() {
        let contents = fs::read_to_string(file)
            .map_err(|err| format!("read config {}: {}", file.display(), err))?;
        let config: ServerConfig = toml::from_str(&contents)
            .map_err(|err| format!("parse config {}: {}", file.display(), err))?;
        return Ok(ConfigLoad {
            config,
            file: file.to_path_buf(),
            created: false,
        });
    }

    if let Some(dir) = file.parent() {
        fs::create_dir_all(dir)
            .map_err(|err| format!("create config dir {}: {}", dir.display(), err))?;
    }
    let config = ServerConfig::default();
    let contents =
        toml::to_string_pretty(&config).map_err(|err| format!("serialize config: {}", err))?;
    fs::write(file, contents).map_err(|err| format!("write config {}: {}", file.display(), err))?;

    Ok(ConfigLoad {
        config,
        file: file.to_path_buf(),
        created: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_defaults_then_reads_them_back() {
        let dir = tempfile::tempdir().expect("temp dir");
        let file = dir.path().join("nested").join("leaderboard.toml");

        let created = load_or_create(&file).expect("create");
        assert!(created.created);
        assert_eq!(created.config, ServerConfig::default());

        let loaded = load_or_create(&file).expect("load");
        assert!(!loaded.created);
        assert_eq!(loaded.config, ServerConfig::default());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let file = dir.path().join("leaderboard.toml");
        fs::write(
            &file,
            "port = 9000\n\n[refresh]\nweek_secs = 600\n\n[retention]\nkeep_last_n = 5\n",
        )
        .expect("write");

        let loaded = load_or_create(&file).expect("load");
        assert_eq!(loaded.config.port, 9000);
        assert_eq!(loaded.config.host, "127.0.0.1");
        assert_eq!(loaded.config.engine.refresh.week_secs, 600);
        assert_eq!(loaded.config.engine.refresh.month_secs, 21_600);
        assert_eq!(loaded.config.engine.retention.keep_last_n, 5);
        assert_eq!(loaded.config.engine.query.max_page_size, 100);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let file = dir.path().join("leaderboard.toml");
        fs::write(&file, "port = \"eighty\"\n").expect("write");
        assert!(load_or_create(&file).is_err());
    }
}
