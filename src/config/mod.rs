//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "foglio";
const ENV_PREFIX: &str = "FOGLIO";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES: u64 = 16 * 1024 * 1024;
const DEFAULT_POSTS_PER_PAGE: u32 = 10;
const DEFAULT_ADMIN_PAGE_SIZE: u32 = 20;
const DEFAULT_SESSION_TTL_DAYS: u64 = 7;
const DEFAULT_BLOG_TITLE: &str = "A Quiet Blog";
const DEFAULT_BLOG_SUBTITLE: &str = "Thoughts, stories and ideas";
const DEFAULT_BLOG_AUTHOR: &str = "Anonymous";
const DEFAULT_ADMIN_USERNAME: &str = "admin";
const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
const MIN_SECRET_KEY_BYTES: usize = 32;

/// Development-only cookie key; flagged at startup so it never survives into
/// a real deployment unnoticed.
const DEV_SECRET_KEY: &str = "insecure-development-secret-key-change-me-now";

/// Command-line arguments for the foglio binary.
#[derive(Debug, Parser, Default)]
#[command(name = "foglio", version, about = "foglio blog server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "FOGLIO_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(long = "log-json", value_name = "BOOL")]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the uploads directory.
    #[arg(long = "uploads-directory", value_name = "PATH")]
    pub uploads_directory: Option<PathBuf>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub site: SiteSettings,
    pub auth: AuthSettings,
    pub uploads: UploadSettings,
    pub pagination: PaginationSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

/// Masthead values rendered on every public page.
#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub title: String,
    pub subtitle: String,
    pub author: String,
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub secret_key: String,
    pub seed_username: String,
    pub seed_password: String,
    pub session_ttl: Duration,
}

impl AuthSettings {
    pub fn uses_dev_secret(&self) -> bool {
        self.secret_key == DEV_SECRET_KEY
    }
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub directory: PathBuf,
    pub max_request_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct PaginationSettings {
    pub posts_per_page: NonZeroU32,
    pub admin_page_size: NonZeroU32,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_env_aliases();
    raw.apply_cli_overrides(cli);

    Settings::from_raw(raw)
}

/// Resolve configuration from the process arguments.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    site: RawSiteSettings,
    auth: RawAuthSettings,
    uploads: RawUploadSettings,
    pagination: RawPaginationSettings,
}

impl RawSettings {
    /// Honor the flat, conventional environment variables on top of the
    /// `FOGLIO__`-prefixed ones.
    fn apply_env_aliases(&mut self) {
        apply_env_alias("DATABASE_URL", &mut self.database.url);
        apply_env_alias("SECRET_KEY", &mut self.auth.secret_key);
        apply_env_alias("BLOG_TITLE", &mut self.site.title);
        apply_env_alias("BLOG_SUBTITLE", &mut self.site.subtitle);
        apply_env_alias("BLOG_AUTHOR", &mut self.site.author);
    }

    fn apply_cli_overrides(&mut self, cli: &CliArgs) {
        if let Some(host) = cli.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = cli.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = cli.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = cli.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = cli.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = cli.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(directory) = cli.uploads_directory.as_ref() {
            self.uploads.directory = Some(directory.clone());
        }
    }
}

fn apply_env_alias(name: &str, slot: &mut Option<String>) {
    if let Ok(value) = std::env::var(name) {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            *slot = Some(trimmed.to_string());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            site,
            auth,
            uploads,
            pagination,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            site: build_site_settings(site),
            auth: build_auth_settings(auth)?,
            uploads: build_upload_settings(uploads)?,
            pagination: build_pagination_settings(pagination)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let candidate = format!("{host}:{port}");
    let addr = candidate
        .parse()
        .map_err(|err| LoadError::invalid("server.addr", format!("invalid `{candidate}`: {err}")))?;

    Ok(ServerSettings { addr })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = NonZeroU32::new(max)
        .ok_or_else(|| LoadError::invalid("database.max_connections", "must be greater than zero"))?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_site_settings(site: RawSiteSettings) -> SiteSettings {
    SiteSettings {
        title: non_blank_or(site.title, DEFAULT_BLOG_TITLE),
        subtitle: non_blank_or(site.subtitle, DEFAULT_BLOG_SUBTITLE),
        author: non_blank_or(site.author, DEFAULT_BLOG_AUTHOR),
    }
}

fn build_auth_settings(auth: RawAuthSettings) -> Result<AuthSettings, LoadError> {
    let secret_key = non_blank_or(auth.secret_key, DEV_SECRET_KEY);
    if secret_key.len() < MIN_SECRET_KEY_BYTES {
        return Err(LoadError::invalid(
            "auth.secret_key",
            format!("must be at least {MIN_SECRET_KEY_BYTES} bytes"),
        ));
    }

    let ttl_days = auth.session_ttl_days.unwrap_or(DEFAULT_SESSION_TTL_DAYS);
    if ttl_days == 0 {
        return Err(LoadError::invalid(
            "auth.session_ttl_days",
            "must be greater than zero",
        ));
    }

    Ok(AuthSettings {
        secret_key,
        seed_username: non_blank_or(auth.username, DEFAULT_ADMIN_USERNAME),
        seed_password: non_blank_or(auth.password, DEFAULT_ADMIN_PASSWORD),
        session_ttl: Duration::from_secs(ttl_days * 24 * 60 * 60),
    })
}

fn build_upload_settings(uploads: RawUploadSettings) -> Result<UploadSettings, LoadError> {
    let directory = uploads
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR));

    let max_request_bytes = uploads
        .max_request_bytes
        .unwrap_or(DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES);
    if max_request_bytes == 0 {
        return Err(LoadError::invalid(
            "uploads.max_request_bytes",
            "must be greater than zero",
        ));
    }
    usize::try_from(max_request_bytes).map_err(|_| {
        LoadError::invalid(
            "uploads.max_request_bytes",
            "value exceeds supported range for usize",
        )
    })?;

    Ok(UploadSettings {
        directory,
        max_request_bytes,
    })
}

fn build_pagination_settings(
    pagination: RawPaginationSettings,
) -> Result<PaginationSettings, LoadError> {
    let posts_per_page = pagination.posts_per_page.unwrap_or(DEFAULT_POSTS_PER_PAGE);
    let admin_page_size = pagination.admin_page_size.unwrap_or(DEFAULT_ADMIN_PAGE_SIZE);

    Ok(PaginationSettings {
        posts_per_page: NonZeroU32::new(posts_per_page)
            .ok_or_else(|| LoadError::invalid("pagination.posts_per_page", "must be greater than zero"))?,
        admin_page_size: NonZeroU32::new(admin_page_size)
            .ok_or_else(|| LoadError::invalid("pagination.admin_page_size", "must be greater than zero"))?,
    })
}

fn non_blank_or(value: Option<String>, default: &str) -> String {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    title: Option<String>,
    subtitle: Option<String>,
    author: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAuthSettings {
    secret_key: Option<String>,
    username: Option<String>,
    password: Option<String>,
    session_ttl_days: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUploadSettings {
    directory: Option<PathBuf>,
    max_request_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPaginationSettings {
    posts_per_page: Option<u32>,
    admin_page_size: Option<u32>,
}
