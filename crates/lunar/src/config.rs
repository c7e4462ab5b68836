//! Daemon settings: an optional configuration file merged with command-line overrides
//!
//! The file is YAML. Since YAML is a superset of JSON, the older JSON layout
//! (`listen`, `auth`, `stmfhaEnabled`) is read as is.

use clap::ValueEnum;
use lunar_apiserver::server::DEFAULT_PORT;
use lunar_apiserver::{BasicCredentials, DEFAULT_PRIVATE_POOLS};
use lunar_core::DecodeRules;
use lunar_runtime::{SettlePolicy, StmfConfig};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory holding `{uuid}.status` files when none is configured
pub const DEFAULT_JOB_DIR: &str = "/tmp";

/// Which subsystem implementations the daemon drives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// zfs, stmfadm and itadm on this host
    #[default]
    Cli,
    /// In-memory subsystems, for development off-host
    Mock,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettleConfig {
    pub poll_interval_ms: u64,
    pub timeout_ms: u64,
}

impl Default for SettleConfig {
    fn default() -> Self {
        let policy = SettlePolicy::default();
        Self {
            poll_interval_ms: policy.poll_interval.as_millis() as u64,
            timeout_ms: policy.timeout.as_millis() as u64,
        }
    }
}

/// Contents of the configuration file; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// `address` or `address:port`
    pub listen: Option<String>,
    pub auth: Option<AuthConfig>,
    #[serde(alias = "stmfhaEnabled")]
    pub stmf_ha_enabled: bool,
    pub stmf_ha_admin: Option<String>,
    pub job_dir: Option<PathBuf>,
    pub private_pools: Option<Vec<String>>,
    pub settle: SettleConfig,
    pub decode: Option<DecodeRules>,
    pub backend: Option<Backend>,
}

impl FileConfig {
    pub fn load(path: &Path) -> miette::Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            miette::miette!("Failed to read configuration {}: {}", path.display(), e)
        })?;
        Self::parse(&text)
            .map_err(|e| miette::miette!("Invalid configuration {}: {}", path.display(), e))
    }

    pub fn parse(text: &str) -> Result<Self, serde_yaml::Error> {
        // an empty document is an empty configuration
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }
}

/// Command-line values that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub listen: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub job_dir: Option<PathBuf>,
    pub backend: Option<Backend>,
    pub stmf_ha_enabled: bool,
    pub private_pools: Vec<String>,
}

/// Fully resolved daemon settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub listen_addr: SocketAddr,
    pub auth: Option<BasicCredentials>,
    pub stmf: StmfConfig,
    pub job_dir: PathBuf,
    pub private_pools: Vec<String>,
    pub settle: SettlePolicy,
    pub decode: DecodeRules,
    pub backend: Backend,
}

impl Settings {
    pub fn resolve(file: FileConfig, overrides: Overrides) -> miette::Result<Self> {
        let listen = overrides.listen.or(file.listen);
        let listen_addr = match listen.as_deref() {
            Some(listen) => parse_listen(listen)?,
            None => SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
        };

        let file_auth = file.auth.unwrap_or_default();
        let username = overrides.username.unwrap_or(file_auth.username);
        let password = overrides.password.unwrap_or(file_auth.password);
        let auth = (!username.is_empty()).then_some(BasicCredentials { username, password });

        let mut stmf = StmfConfig {
            ha_enabled: overrides.stmf_ha_enabled || file.stmf_ha_enabled,
            ..StmfConfig::default()
        };
        if let Some(admin) = file.stmf_ha_admin {
            stmf.ha_admin = admin;
        }

        if file.settle.poll_interval_ms == 0 {
            return Err(miette::miette!(
                "settle.poll_interval_ms must be greater than zero"
            ));
        }
        let settle = SettlePolicy {
            poll_interval: Duration::from_millis(file.settle.poll_interval_ms),
            timeout: Duration::from_millis(file.settle.timeout_ms),
        };

        let private_pools = if overrides.private_pools.is_empty() {
            file.private_pools.unwrap_or_else(|| {
                DEFAULT_PRIVATE_POOLS.iter().map(|p| p.to_string()).collect()
            })
        } else {
            overrides.private_pools
        };

        Ok(Self {
            listen_addr,
            auth,
            stmf,
            job_dir: overrides
                .job_dir
                .or(file.job_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_JOB_DIR)),
            private_pools,
            settle,
            decode: file.decode.unwrap_or_default(),
            backend: overrides.backend.or(file.backend).unwrap_or_default(),
        })
    }
}

/// Accept `host:port` or a bare address, which gets the default port
pub fn parse_listen(listen: &str) -> miette::Result<SocketAddr> {
    if let Ok(addr) = listen.parse::<SocketAddr>() {
        return Ok(addr);
    }
    listen
        .parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, DEFAULT_PORT))
        .map_err(|e| miette::miette!("Invalid listen address '{}': {}", listen, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_listen() {
        assert_eq!(
            parse_listen("127.0.0.1").unwrap().to_string(),
            "127.0.0.1:10987"
        );
        assert_eq!(
            parse_listen("0.0.0.0:8080").unwrap().to_string(),
            "0.0.0.0:8080"
        );
        assert_eq!(parse_listen("::1").unwrap().to_string(), "[::1]:10987");
        assert!(parse_listen("storage-host").is_err());
    }

    #[test]
    fn test_legacy_json_layout() {
        let file = FileConfig::parse(
            r#"{"listen": "10.0.0.5", "auth": {"username": "admin", "password": "secret"}, "stmfhaEnabled": true}"#,
        )
        .unwrap();
        let settings = Settings::resolve(file, Overrides::default()).unwrap();

        assert_eq!(settings.listen_addr.to_string(), "10.0.0.5:10987");
        assert_eq!(
            settings.auth,
            Some(BasicCredentials {
                username: "admin".to_string(),
                password: "secret".to_string(),
            })
        );
        assert!(settings.stmf.ha_enabled);
        assert_eq!(settings.backend, Backend::Cli);
        assert_eq!(settings.job_dir, PathBuf::from(DEFAULT_JOB_DIR));
        assert_eq!(settings.private_pools, vec!["rpool", "zpool"]);
    }

    #[test]
    fn test_yaml_file_with_overrides() {
        let yaml = r#"
listen: "127.0.0.1:9000"
backend: mock
job_dir: /var/run/lunar
private_pools: [rpool]
settle:
  poll_interval_ms: 50
  timeout_ms: 2000
decode:
  empty_as_none: [clones, origin]
"#;
        let mut config = tempfile::NamedTempFile::new().unwrap();
        config.write_all(yaml.as_bytes()).unwrap();
        let file = FileConfig::load(config.path()).unwrap();

        let overrides = Overrides {
            listen: Some("0.0.0.0:9100".to_string()),
            username: Some("ops".to_string()),
            ..Default::default()
        };
        let settings = Settings::resolve(file, overrides).unwrap();

        assert_eq!(settings.listen_addr.to_string(), "0.0.0.0:9100");
        assert_eq!(settings.auth.unwrap().username, "ops");
        assert_eq!(settings.backend, Backend::Mock);
        assert_eq!(settings.job_dir, PathBuf::from("/var/run/lunar"));
        assert_eq!(settings.private_pools, vec!["rpool"]);
        assert_eq!(settings.settle.poll_interval, Duration::from_millis(50));
        assert_eq!(settings.settle.timeout, Duration::from_secs(2));
        assert_eq!(settings.decode.empty_as_none, vec!["clones", "origin"]);
    }

    #[test]
    fn test_defaults_and_rejections() {
        let settings = Settings::resolve(FileConfig::parse("").unwrap(), Overrides::default())
            .unwrap();
        assert_eq!(settings.listen_addr.to_string(), "127.0.0.1:10987");
        assert!(settings.auth.is_none());
        assert_eq!(settings.settle, SettlePolicy::default());
        assert_eq!(settings.decode, DecodeRules::default());

        assert!(FileConfig::parse("listen: 127.0.0.1\nport: 80\n").is_err());

        let file = FileConfig::parse("settle:\n  poll_interval_ms: 0\n").unwrap();
        assert!(Settings::resolve(file, Overrides::default()).is_err());
    }
}
