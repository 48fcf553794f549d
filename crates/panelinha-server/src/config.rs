use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use anyhow::{Context, Result};
use tracing::{info, warn};

pub const DEFAULT_SECRET_KEY: &str = "troque-essa-chave-por-uma-segura";

pub struct Config {
    pub host: String,
    pub port: u16,
    pub secret_key: String,
    pub db_path: PathBuf,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::load(|key| env::var(key).ok())
    }

    fn load(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let secret_key = var("SECRET_KEY").unwrap_or_else(|| {
            warn!("SECRET_KEY not set, using the built-in default. Do not run like this in production");
            DEFAULT_SECRET_KEY.to_string()
        });

        let database_url = try_load::<String>(&var, "DATABASE_URL", "panelinha.db")?;
        let max_upload_mb: usize = try_load(&var, "PANELINHA_MAX_UPLOAD_MB", "16")?;
        let max_upload_bytes = max_upload_mb
            .checked_mul(1024 * 1024)
            .with_context(|| format!("PANELINHA_MAX_UPLOAD_MB too large: {max_upload_mb}"))?;

        Ok(Self {
            host: try_load(&var, "PANELINHA_HOST", "0.0.0.0")?,
            port: try_load(&var, "PANELINHA_PORT", "5000")?,
            secret_key,
            db_path: sqlite_path(&database_url),
            upload_dir: try_load(&var, "PANELINHA_UPLOAD_DIR", "./uploads")?,
            max_upload_bytes,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn try_load<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("invalid {key} value '{raw}'"))
}

/// SQLAlchemy-style URLs: `sqlite:///rel/path` is relative, `sqlite:////abs`
/// absolute. A bare path is taken as is.
fn sqlite_path(url: &str) -> PathBuf {
    let path = url
        .strip_prefix("sqlite:///")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::load(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.addr(), "0.0.0.0:5000");
        assert_eq!(config.secret_key, DEFAULT_SECRET_KEY);
        assert_eq!(config.db_path, PathBuf::from("panelinha.db"));
        assert_eq!(config.upload_dir, PathBuf::from("./uploads"));
        assert_eq!(config.max_upload_bytes, 16 * 1024 * 1024);
    }

    #[test]
    fn overrides() {
        let config = load(&[
            ("SECRET_KEY", "s3cr3t"),
            ("DATABASE_URL", "sqlite:////var/lib/panelinha/app.db"),
            ("PANELINHA_PORT", "8080"),
            ("PANELINHA_MAX_UPLOAD_MB", "2"),
        ])
        .unwrap();
        assert_eq!(config.secret_key, "s3cr3t");
        assert_eq!(config.db_path, PathBuf::from("/var/lib/panelinha/app.db"));
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_upload_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn database_url_forms() {
        assert_eq!(sqlite_path("sqlite:///app.db"), PathBuf::from("app.db"));
        assert_eq!(sqlite_path("sqlite:///data/a.db"), PathBuf::from("data/a.db"));
        assert_eq!(sqlite_path("sqlite:////tmp/a.db"), PathBuf::from("/tmp/a.db"));
        assert_eq!(sqlite_path("sqlite:a.db"), PathBuf::from("a.db"));
        assert_eq!(sqlite_path("a.db"), PathBuf::from("a.db"));
    }

    #[test]
    fn oversized_upload_limit_is_an_error() {
        let huge = usize::MAX.to_string();
        assert!(load(&[("PANELINHA_MAX_UPLOAD_MB", huge.as_str())]).is_err());
    }

    #[test]
    fn bad_port_is_an_error() {
        assert!(load(&[("PANELINHA_PORT", "not-a-port")]).is_err());
    }
}
