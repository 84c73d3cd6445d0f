use anyhow::{Context, Result};
use clap::Parser;
use std::{env, str::FromStr};

use crate::services::object_service::DEFAULT_CHUNK_SIZE;

const DEFAULT_MAX_BODY_BYTES: usize = 256 * 1024 * 1024;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub namespace: String,
    pub collection_prefix: String,
    pub chunk_size: usize,
    pub verify_checksums: bool,
    pub max_body_bytes: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Chunked object store over SQLite")]
pub struct Args {
    /// Host to bind to (overrides CHUNK_STORE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides CHUNK_STORE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides CHUNK_STORE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Logical namespace for the collections (overrides CHUNK_STORE_NAMESPACE)
    #[arg(long)]
    pub namespace: Option<String>,

    /// Prefix for the manifest and chunk collections (overrides CHUNK_STORE_COLLECTION_PREFIX)
    #[arg(long)]
    pub collection_prefix: Option<String>,

    /// Chunk size in bytes for new objects (overrides CHUNK_STORE_CHUNK_SIZE)
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Verify MD5 of every object read (overrides CHUNK_STORE_VERIFY_CHECKSUMS)
    #[arg(long)]
    pub verify_checksums: Option<bool>,

    /// Largest accepted upload in bytes (overrides CHUNK_STORE_MAX_BODY_BYTES)
    #[arg(long)]
    pub max_body_bytes: Option<usize>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::resolve(Args::parse(), |name| env::var(name))
    }

    /// Merge `args` over values found through `lookup`, then defaults.
    pub fn resolve<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let string = |name: &str, default: &str| -> Result<String> {
            match lookup(name) {
                Ok(value) => Ok(value),
                Err(env::VarError::NotPresent) => Ok(default.to_string()),
                Err(err) => Err(err).with_context(|| format!("reading {}", name)),
            }
        };

        let cfg = Self {
            host: match args.host {
                Some(v) => v,
                None => string("CHUNK_STORE_HOST", "0.0.0.0")?,
            },
            port: match args.port {
                Some(v) => v,
                None => parse_var(&lookup, "CHUNK_STORE_PORT", 3000)?,
            },
            database_url: match args.database_url {
                Some(v) => v,
                None => string("CHUNK_STORE_DATABASE_URL", "sqlite://./data/chunk_store.db")?,
            },
            namespace: match args.namespace {
                Some(v) => v,
                None => string("CHUNK_STORE_NAMESPACE", "objects")?,
            },
            collection_prefix: match args.collection_prefix {
                Some(v) => v,
                None => string("CHUNK_STORE_COLLECTION_PREFIX", "fs_")?,
            },
            chunk_size: match args.chunk_size {
                Some(v) => v,
                None => parse_var(&lookup, "CHUNK_STORE_CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?,
            },
            verify_checksums: match args.verify_checksums {
                Some(v) => v,
                None => parse_var(&lookup, "CHUNK_STORE_VERIFY_CHECKSUMS", false)?,
            },
            max_body_bytes: match args.max_body_bytes {
                Some(v) => v,
                None => parse_var(&lookup, "CHUNK_STORE_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES)?,
            },
        };

        if cfg.chunk_size == 0 {
            anyhow::bail!("chunk size must be greater than zero");
        }
        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T, F>(lookup: &F, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Result<String, env::VarError>,
{
    match lookup(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Result<String, env::VarError> + use<> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned().ok_or(env::VarError::NotPresent)
    }

    #[test]
    fn defaults_apply_without_env_or_flags() {
        let cfg = AppConfig::resolve(Args::default(), lookup(&[])).unwrap();
        assert_eq!(cfg.addr(), "0.0.0.0:3000");
        assert_eq!(cfg.namespace, "objects");
        assert_eq!(cfg.collection_prefix, "fs_");
        assert_eq!(cfg.chunk_size, 8 * 1024 * 1024);
        assert!(!cfg.verify_checksums);
    }

    #[test]
    fn flags_override_environment() {
        let env = lookup(&[
            ("CHUNK_STORE_PORT", "9000"),
            ("CHUNK_STORE_CHUNK_SIZE", "1024"),
            ("CHUNK_STORE_VERIFY_CHECKSUMS", "true"),
            ("CHUNK_STORE_NAMESPACE", "media"),
        ]);
        let args = Args::parse_from(["chunk-store", "--port", "7000", "--namespace", "docs"]);
        let cfg = AppConfig::resolve(args, env).unwrap();
        assert_eq!(cfg.port, 7000);
        assert_eq!(cfg.namespace, "docs");
        assert_eq!(cfg.chunk_size, 1024);
        assert!(cfg.verify_checksums);
    }

    #[test]
    fn bad_numbers_are_reported() {
        let err = AppConfig::resolve(Args::default(), lookup(&[("CHUNK_STORE_PORT", "http")]))
            .unwrap_err();
        assert!(err.to_string().contains("CHUNK_STORE_PORT"));

        assert!(
            AppConfig::resolve(Args::default(), lookup(&[("CHUNK_STORE_CHUNK_SIZE", "0")]))
                .is_err()
        );
    }
}
