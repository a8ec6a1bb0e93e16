//! Daemon configuration file support

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Optional TOML configuration. Every field here has a CLI flag that takes
/// precedence when set.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub db: Option<PathBuf>,
    pub save_interval_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_full_config() {
        let config: FileConfig = toml::from_str(
            r#"
            bind = "127.0.0.1"
            port = 7000
            db = "/var/lib/scrawl/rooms.db"
            save_interval_secs = 15
            idle_timeout_secs = 600
            "#,
        )
        .unwrap();

        assert_eq!(config.bind.as_deref(), Some("127.0.0.1"));
        assert_eq!(config.port, Some(7000));
        assert_eq!(config.save_interval_secs, Some(15));
        assert_eq!(config.idle_timeout_secs, Some(600));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(toml::from_str::<FileConfig>("prot = 7000").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 7777").unwrap();

        let config = FileConfig::load(file.path()).unwrap();
        assert_eq!(config.port, Some(7777));
        assert!(config.bind.is_none());
    }
}
