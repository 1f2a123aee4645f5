use std::env;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct ConfigFile {
    pub url: Option<String>,
    pub wordlist: Option<String>,
    pub mode: Option<String>,
    pub threads: Option<usize>,
    pub timeout: Option<u64>,
    pub user_agent: Option<String>,
    pub delay_ms: Option<u64>,
    pub verify_ssl: Option<bool>,
    pub auth: Option<String>,
    pub proxy: Option<String>,
    pub retries: Option<u32>,
    pub batch_size: Option<usize>,
    pub rate_max_requests: Option<usize>,
    pub rate_period_seconds: Option<u64>,
    pub cache_size: Option<usize>,
    pub history: Option<String>,
    pub no_color: Option<bool>,
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("USERPROFILE").map(PathBuf::from))
        .or_else(|| {
            let drive = env::var_os("HOMEDRIVE")?;
            let path = env::var_os("HOMEPATH")?;
            Some(PathBuf::from(drive).join(path))
        })
}

pub fn default_config_path() -> Option<PathBuf> {
    Some(home_dir()?.join(".dirbrute").join("config.yml"))
}

pub fn default_history_path() -> Option<PathBuf> {
    Some(home_dir()?.join(".dirbrute").join("history.json"))
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

pub fn expand_tilde_string(path: &str) -> String {
    expand_tilde(path).to_string_lossy().to_string()
}

pub fn load_config(path: &PathBuf, allow_missing: bool) -> Result<ConfigFile, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_yaml::from_str::<ConfigFile>(&contents)
            .map_err(|e| format!("failed to parse config '{}': {e}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && allow_missing => {
            Ok(ConfigFile::default())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("config file not found '{}'", path.display()))
        }
        Err(e) => Err(format!("failed to read config '{}': {e}", path.display())),
    }
}

fn default_config_yaml() -> String {
    r#"# dirbrute config
#
# Location (default):
#   ~/.dirbrute/config.yml

# Target
# url: https://example.com
# wordlist: ./wordlists/common.txt
# mode: directory   # or: subdomain

# Performance
threads: 10
timeout: 10
batch_size: 100
retries: 2
delay_ms: 0

# Rate limiting (both values required to enable)
# rate_max_requests: 50
# rate_period_seconds: 1

# Caching
cache_size: 1000

# HTTP (optional)
verify_ssl: true
# user_agent: "Mozilla/5.0 ..."
# proxy: http://127.0.0.1:8080
# auth: "user:pass"

# History
# history: ~/.dirbrute/history.json

# Output styling
no_color: false
"#
    .to_string()
}

pub fn ensure_default_config_file(path: &PathBuf) -> Result<(), String> {
    if path.exists() {
        return Ok(());
    }
    let parent = path
        .parent()
        .ok_or_else(|| format!("invalid config path '{}'", path.display()))?;
    std::fs::create_dir_all(parent).map_err(|e| {
        format!(
            "failed to create config directory '{}': {e}",
            parent.display()
        )
    })?;
    let contents = default_config_yaml();
    std::fs::write(path, contents)
        .map_err(|e| format!("failed to write config file '{}': {e}", path.display()))?;
    Ok(())
}
