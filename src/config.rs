use std::path::Path;

use serde::Deserialize;

/// Server configuration. Every field has a standalone-friendly default;
/// cluster mode switches on only when both `self` and `peers` are set.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub databases: usize,
    pub appendonly: bool,
    pub appendfilename: String,
    #[serde(rename = "self")]
    pub self_addr: String,
    pub peers: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind: "127.0.0.1".to_string(),
            port: 6379,
            databases: 16,
            appendonly: false,
            appendfilename: "appendonly.aof".to_string(),
            self_addr: String::new(),
            peers: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Config> {
        let text = std::fs::read_to_string(path)?;
        let config = toml::from_str(&text)?;
        Ok(config)
    }

    pub fn cluster_mode(&self) -> bool {
        !self.self_addr.is_empty() && !self.peers.is_empty()
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}
