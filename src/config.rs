//! Server configuration from environment variables, with command-line flags taking
//! precedence.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};

pub const ENV_HTTP_PORT: &str = "EXPEDIENTES_HTTP_PORT";
pub const ENV_JWT_SECRET: &str = "EXPEDIENTES_JWT_SECRET";
pub const ENV_DATABASE_URL: &str = "EXPEDIENTES_DATABASE_URL";
pub const ENV_FILES_DIR: &str = "EXPEDIENTES_FILES_DIR";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "EXPEDIENTES_REQUEST_TIMEOUT_MS";
pub const ENV_READ_RETRIES: &str = "EXPEDIENTES_READ_RETRIES";
pub const ENV_REDACT_UPSTREAM: &str = "EXPEDIENTES_REDACT_UPSTREAM";
pub const ENV_ENFORCE_API_PERMISSIONS: &str = "EXPEDIENTES_ENFORCE_API_PERMISSIONS";
pub const ENV_DEV_ADMIN_PASSWORD: &str = "EXPEDIENTES_DEV_ADMIN_PASSWORD";

pub const USAGE: &str = "expedientes server\n\nUSAGE:\n  expedientes_server [--http-port N] [--database-url URL] [--files-dir PATH]\n\nOPTIONS:\n  --http-port N          HTTP port (env: EXPEDIENTES_HTTP_PORT, default 4000)\n  --database-url URL     PostgreSQL URL (env: EXPEDIENTES_DATABASE_URL). Without it an in-memory store is used.\n  --files-dir PATH       Upload directory (env: EXPEDIENTES_FILES_DIR, default uploads)\n\nENVIRONMENT:\n  EXPEDIENTES_JWT_SECRET               token signing secret (required)\n  EXPEDIENTES_REQUEST_TIMEOUT_MS       data-service call timeout, 0 disables (default 30000)\n  EXPEDIENTES_READ_RETRIES             extra attempts for idempotent reads (default 0)\n  EXPEDIENTES_REDACT_UPSTREAM          hide database error text from clients (default false)\n  EXPEDIENTES_ENFORCE_API_PERMISSIONS  check role permissions on API calls (default true)\n  EXPEDIENTES_DEV_ADMIN_PASSWORD       password of the seeded in-memory admin (default admin)\n";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_port: u16,
    pub jwt_secret: String,
    pub database_url: Option<String>,
    pub files_dir: PathBuf,
    pub request_timeout: Option<Duration>,
    pub read_retries: u32,
    pub redact_upstream: bool,
    pub enforce_api_permissions: bool,
    pub dev_admin_password: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 4000,
            jwt_secret: String::new(),
            database_url: None,
            files_dir: PathBuf::from("uploads"),
            request_timeout: Some(Duration::from_millis(30_000)),
            read_retries: 0,
            redact_upstream: false,
            enforce_api_permissions: true,
            dev_admin_password: "admin".to_string(),
        }
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        i += 1;
    }
    None
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

impl ServerConfig {
    pub fn from_env_and_args(args: &[String]) -> Result<Self> {
        Self::from_lookup(|k| env::var(k).ok(), args)
    }

    /// Build from an arbitrary variable lookup; used directly by tests.
    pub fn from_lookup<F>(lookup: F, args: &[String]) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = ServerConfig::default();

        if let Some(v) = arg_value(args, "--http-port").or_else(|| lookup(ENV_HTTP_PORT)) {
            cfg.http_port = match v.trim().parse() {
                Ok(p) => p,
                Err(_) => bail!("invalid http port: {:?}", v),
            };
        }
        cfg.jwt_secret = lookup(ENV_JWT_SECRET).unwrap_or_default();
        cfg.database_url = arg_value(args, "--database-url")
            .or_else(|| lookup(ENV_DATABASE_URL))
            .filter(|s| !s.trim().is_empty());
        if let Some(v) = arg_value(args, "--files-dir").or_else(|| lookup(ENV_FILES_DIR)) {
            cfg.files_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_REQUEST_TIMEOUT_MS) {
            let ms: u64 = match v.trim().parse() {
                Ok(ms) => ms,
                Err(_) => bail!("invalid {}: {:?}", ENV_REQUEST_TIMEOUT_MS, v),
            };
            cfg.request_timeout = if ms == 0 { None } else { Some(Duration::from_millis(ms)) };
        }
        if let Some(v) = lookup(ENV_READ_RETRIES) {
            cfg.read_retries = match v.trim().parse() {
                Ok(n) => n,
                Err(_) => bail!("invalid {}: {:?}", ENV_READ_RETRIES, v),
            };
        }
        if let Some(b) = lookup(ENV_REDACT_UPSTREAM).as_deref().and_then(parse_bool) {
            cfg.redact_upstream = b;
        }
        if let Some(b) = lookup(ENV_ENFORCE_API_PERMISSIONS).as_deref().and_then(parse_bool) {
            cfg.enforce_api_permissions = b;
        }
        if let Some(p) = lookup(ENV_DEV_ADMIN_PASSWORD).filter(|s| !s.is_empty()) {
            cfg.dev_admin_password = p;
        }
        Ok(cfg)
    }
}
