//! Configuration for Catalog API

use axum_helpers::JwtConfig;
use core_config::{
    AppInfo, ConfigError, FromEnv, app_info, env_or_default, env_parse, server::ServerConfig,
};
use database::postgres::PostgresConfig;
use std::path::PathBuf;

pub use core_config::Environment;

/// Where uploaded images live and how clients reach them
#[derive(Clone, Debug)]
pub struct MediaConfig {
    /// Directory uploaded files are written to
    pub root: PathBuf,
    /// URL prefix stored paths are served under
    pub url: String,
    /// Fallback origin for absolute URLs when a request carries no Host
    pub public_base_url: String,
    /// Build absolute URLs from `X-Forwarded-*`; only safe behind a proxy that sets them
    pub trust_forwarded_headers: bool,
}

impl MediaConfig {
    /// Reads `MEDIA_ROOT`, `MEDIA_URL`, `PUBLIC_BASE_URL` and `TRUST_FORWARDED_HEADERS`.
    ///
    /// `PUBLIC_BASE_URL` defaults to the local address of `server`.
    pub fn from_env_for(server: &ServerConfig) -> Result<Self, ConfigError> {
        let root = PathBuf::from(env_or_default("MEDIA_ROOT", "./media"));
        let url = env_or_default("MEDIA_URL", "/media");
        let public_base_url = env_or_default("PUBLIC_BASE_URL", &server.local_base_url());
        let trust_forwarded_headers = env_parse("TRUST_FORWARDED_HEADERS", "false")?;

        if url.is_empty() {
            return Err(ConfigError::ParseError {
                key: "MEDIA_URL".to_string(),
                details: "must not be empty".to_string(),
            });
        }

        Ok(Self {
            root,
            url: url.trim_end_matches('/').to_string(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            trust_forwarded_headers,
        })
    }

    /// Path prefix to mount the file server on; `None` when media lives on another origin
    pub fn serve_path(&self) -> Option<&str> {
        self.url.starts_with('/').then_some(self.url.as_str())
    }
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub database: PostgresConfig,
    pub jwt: JwtConfig,
    pub media: MediaConfig,
    pub server: ServerConfig,
    pub environment: Environment,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let database = PostgresConfig::from_env()?; // Required - will fail if not set
        let jwt = JwtConfig::from_env()?; // JWT_SECRET, at least 32 chars
        let server = ServerConfig::from_env()?; // Uses defaults: HOST=0.0.0.0, PORT=8080
        let media = MediaConfig::from_env_for(&server)?;

        Ok(Self {
            app: app_info!(),
            database,
            jwt,
            media,
            server,
            environment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> ServerConfig {
        ServerConfig::new("0.0.0.0".to_string(), 8080)
    }

    #[test]
    fn test_media_defaults() {
        let vars = ["MEDIA_ROOT", "MEDIA_URL", "PUBLIC_BASE_URL", "TRUST_FORWARDED_HEADERS"];
        temp_env::with_vars_unset(vars, || {
            let media = MediaConfig::from_env_for(&server()).unwrap();
            assert_eq!(media.root, PathBuf::from("./media"));
            assert_eq!(media.url, "/media");
            assert_eq!(media.public_base_url, "http://localhost:8080");
            assert_eq!(media.serve_path(), Some("/media"));
            assert!(!media.trust_forwarded_headers);
        });
    }

    #[test]
    fn test_trust_forwarded_headers_flag() {
        temp_env::with_var("TRUST_FORWARDED_HEADERS", Some("true"), || {
            assert!(MediaConfig::from_env_for(&server()).unwrap().trust_forwarded_headers);
        });
        temp_env::with_var("TRUST_FORWARDED_HEADERS", Some("yes please"), || {
            assert!(MediaConfig::from_env_for(&server()).is_err());
        });
    }

    #[test]
    fn test_media_trailing_slashes_trimmed() {
        temp_env::with_vars(
            [
                ("MEDIA_URL", Some("https://cdn.example.com/media/")),
                ("PUBLIC_BASE_URL", Some("https://shop.example.com/")),
            ],
            || {
                let media = MediaConfig::from_env_for(&server()).unwrap();
                assert_eq!(media.url, "https://cdn.example.com/media");
                assert_eq!(media.public_base_url, "https://shop.example.com");
                assert_eq!(media.serve_path(), None);
            },
        );
    }
}
