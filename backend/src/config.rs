use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a valid {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Server configuration read from the environment (and `.env`).
///
/// | Env Var                         | Default                        |
/// |---------------------------------|--------------------------------|
/// | `HOST`                          | `0.0.0.0`                      |
/// | `PORT`                          | `8081`                         |
/// | `FRONTEND_DIR`                  | `<manifest>/../frontend/dist`  |
/// | `UPLOAD_DIR`                    | `./data/uploads`               |
/// | `S3_BUCKET_NAME`                | unset (local storage)          |
/// | `JWT_SECRET`                    | unset (auth disabled)          |
/// | `DEV_TOKEN_USER`                | unset                          |
/// | `PROCESSING_TICK_MS`            | `1500`                         |
/// | `DAM_CATALOG_PATH`              | unset (built-in catalog)       |
/// | `CONNECTION_TEST_TIMEOUT_SECS`  | `5`                            |
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub frontend_dir: String,
    pub upload_dir: PathBuf,
    pub s3_bucket: Option<String>,
    pub jwt_secret: Option<String>,
    /// When set with `JWT_SECRET`, a token for this user id is logged at startup.
    pub dev_token_user: Option<String>,
    pub processing_tick: Duration,
    pub dam_catalog_path: Option<PathBuf>,
    pub connection_test_timeout: Duration,
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(
    name: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError> {
    match optional(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            expected,
            value,
        }),
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let frontend_dir = optional("FRONTEND_DIR").unwrap_or_else(|| {
            if let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") {
                format!("{}/../frontend/dist", manifest_dir)
            } else {
                "/usr/src/app/frontend/dist".to_string()
            }
        });

        Ok(Self {
            host: optional("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parsed("PORT", 8081, "u16")?,
            frontend_dir,
            upload_dir: optional("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/uploads")),
            s3_bucket: optional("S3_BUCKET_NAME"),
            jwt_secret: optional("JWT_SECRET"),
            dev_token_user: optional("DEV_TOKEN_USER"),
            processing_tick: Duration::from_millis(parsed("PROCESSING_TICK_MS", 1500, "u64")?),
            dam_catalog_path: optional("DAM_CATALOG_PATH").map(PathBuf::from),
            connection_test_timeout: Duration::from_secs(parsed(
                "CONNECTION_TEST_TIMEOUT_SECS",
                5,
                "u64",
            )?),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
