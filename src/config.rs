use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8001";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub server_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_url: DEFAULT_SERVER_URL.to_string(),
        }
    }
}

/// The backend session cookie captured at login. The only durable state the
/// client keeps besides the config; everything else is fetched per view.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Session {
    pub cookie: String,
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", "dayglow").context("locating config directory")
}

pub fn config_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("config.yml"))
}

pub fn session_path() -> Result<PathBuf> {
    Ok(project_dirs()?.data_dir().join("session.yml"))
}

pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let data =
            fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
        let config: Config = serde_yaml::from_str(&data).context("parsing config file")?;
        Ok(config)
    } else {
        let config = Config::default();
        save_config(path, &config)?;
        Ok(config)
    }
}

pub fn save_config(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let serialized = serde_yaml::to_string(config).context("serializing config")?;
    fs::write(path, serialized).with_context(|| format!("writing {:?}", path))?;
    Ok(())
}

pub fn load_session(path: &Path) -> Result<Option<Session>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    let session: Session = serde_yaml::from_str(&data).context("parsing session file")?;
    Ok(Some(session))
}

pub fn save_session(path: &Path, session: &Session) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let serialized = serde_yaml::to_string(session).context("serializing session")?;
    fs::write(path, serialized).with_context(|| format!("writing {:?}", path))?;
    Ok(())
}

pub fn clear_session(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("removing {:?}", path))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_config_synthesizes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yml");

        let config = load_config(&path).unwrap();
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert!(path.exists());

        let reloaded = load_config(&path).unwrap();
        assert_eq!(reloaded.server_url, config.server_url);
    }

    #[test]
    fn config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");

        let config = Config {
            server_url: "http://calendar.local:9000".into(),
        };
        save_config(&path, &config).unwrap();
        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.server_url, "http://calendar.local:9000");
    }

    #[test]
    fn session_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.yml");

        assert!(load_session(&path).unwrap().is_none());

        let session = Session {
            cookie: "session=abc123".into(),
        };
        save_session(&path, &session).unwrap();
        let loaded = load_session(&path).unwrap().unwrap();
        assert_eq!(loaded.cookie, "session=abc123");

        clear_session(&path).unwrap();
        assert!(load_session(&path).unwrap().is_none());
        clear_session(&path).unwrap();
    }
}
