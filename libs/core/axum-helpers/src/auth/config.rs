use core_config::{ConfigError, FromEnv, env_required};

/// Shortest HS256 secret accepted for signing tokens
pub const MIN_SECRET_LENGTH: usize = 32;

/// Signing secret for bearer tokens, read from `JWT_SECRET`.
///
/// ```ignore
/// let config = JwtConfig::from_env()?;
/// // tests
/// let config = JwtConfig::new("a-development-secret-of-32-chars-min");
/// ```
#[derive(Clone, Debug)]
pub struct JwtConfig {
    pub secret: String,
}

impl JwtConfig {
    /// # Panics
    /// If `secret` is shorter than [`MIN_SECRET_LENGTH`].
    pub fn new(secret: impl Into<String>) -> Self {
        let secret = secret.into();
        assert!(
            secret.len() >= MIN_SECRET_LENGTH,
            "JWT secret must be at least {MIN_SECRET_LENGTH} characters"
        );
        Self { secret }
    }
}

impl FromEnv for JwtConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let secret = env_required("JWT_SECRET")?;
        if secret.len() < MIN_SECRET_LENGTH {
            return Err(ConfigError::ParseError {
                key: "JWT_SECRET".to_string(),
                details: format!(
                    "must be at least {MIN_SECRET_LENGTH} characters (got {}); try `openssl rand -base64 32`",
                    secret.len()
                ),
            });
        }
        Ok(Self { secret })
    }
}
