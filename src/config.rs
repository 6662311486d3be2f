use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use directories::BaseDirs;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::auth::cognito::{region_from_pool_id, regional_endpoint};
use crate::auth::DEFAULT_MIN_PASSWORD_LENGTH;
use crate::error::AuthError;
use crate::query::DEFAULT_PAGE_SIZE;

const CONFIG_FILE_NAME: &str = "config.toml";
const SESSION_FILE_NAME: &str = "session.json";
const APP_NAME: &str = "contactdir";

pub const ENV_API_URL: &str = "CONTACTDIR_API_URL";
pub const ENV_AUTH_REGION: &str = "CONTACTDIR_AUTH_REGION";
pub const ENV_USER_POOL_ID: &str = "CONTACTDIR_USER_POOL_ID";
pub const ENV_CLIENT_ID: &str = "CONTACTDIR_CLIENT_ID";

#[derive(Debug, Clone)]
pub struct Config {
    pub config_path: PathBuf,
    /// Backend base URL, without a trailing `/`.
    pub api_url: String,
    pub page_size: u32,
    pub session_file: PathBuf,
    pub auth: AuthConfig,
    pub export: ExportConfig,
}

// =============================================================================
// Identity provider
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub region: Option<String>,
    pub user_pool_id: Option<String>,
    pub client_id: Option<String>,
    /// Explicit provider URL; takes precedence over the regional endpoint.
    pub endpoint: Option<String>,
    pub min_password_length: usize,
}

impl AuthConfig {
    /// Provider URL: the explicit endpoint, else the regional endpoint for
    /// `region`, else for the region named in `user_pool_id`.
    pub fn endpoint(&self) -> Result<String, AuthError> {
        if let Some(endpoint) = &self.endpoint {
            return Ok(endpoint.clone());
        }
        let region = self
            .region
            .as_deref()
            .or_else(|| self.user_pool_id.as_deref().and_then(region_from_pool_id))
            .ok_or(AuthError::NotConfigured("auth.region or auth.user_pool_id"))?;
        Ok(regional_endpoint(region))
    }

    pub fn client_id(&self) -> Result<&str, AuthError> {
        self.client_id
            .as_deref()
            .ok_or(AuthError::NotConfigured("auth.client_id"))
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct AuthFile {
    region: Option<String>,
    user_pool_id: Option<String>,
    client_id: Option<String>,
    endpoint: Option<String>,
    min_password_length: usize,
}

impl Default for AuthFile {
    fn default() -> Self {
        Self {
            region: None,
            user_pool_id: None,
            client_id: None,
            endpoint: None,
            min_password_length: DEFAULT_MIN_PASSWORD_LENGTH,
        }
    }
}

impl AuthFile {
    fn into_config(self, env: &dyn Fn(&str) -> Option<String>) -> AuthConfig {
        AuthConfig {
            region: non_empty(env(ENV_AUTH_REGION)).or_else(|| non_empty(self.region)),
            user_pool_id: non_empty(env(ENV_USER_POOL_ID)).or_else(|| non_empty(self.user_pool_id)),
            client_id: non_empty(env(ENV_CLIENT_ID)).or_else(|| non_empty(self.client_id)),
            endpoint: non_empty(self.endpoint),
            min_password_length: self.min_password_length,
        }
    }
}

// =============================================================================
// Export
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    pub directory: PathBuf,
    /// File name without extension.
    pub filename: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            filename: "contacts".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExportFile {
    directory: Option<String>,
    filename: Option<String>,
}

impl From<ExportFile> for ExportConfig {
    fn from(file: ExportFile) -> Self {
        let defaults = ExportConfig::default();
        Self {
            directory: file
                .directory
                .map(|dir| expand_tilde(Path::new(&dir)))
                .unwrap_or(defaults.directory),
            filename: non_empty(file.filename).unwrap_or(defaults.filename),
        }
    }
}

// =============================================================================
// File layout
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ConfigFile {
    api_url: Option<String>,
    page_size: u32,
    session_file: Option<String>,
    auth: AuthFile,
    export: ExportFile,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            api_url: None,
            page_size: DEFAULT_PAGE_SIZE,
            session_file: None,
            auth: AuthFile::default(),
            export: ExportFile::default(),
        }
    }
}

/// Expand ~ to home directory in paths
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = home::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn config_root() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine base directories")?;
    Ok(base.config_dir().join(APP_NAME))
}

fn default_session_file() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine base directories")?;
    Ok(base.data_dir().join(APP_NAME).join(SESSION_FILE_NAME))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_root()?.join(CONFIG_FILE_NAME))
}

/// Load from `path`, or from the default location when `None`, with
/// overrides taken from the process environment.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => config_path()?,
    };
    load_from(&path, &|key| std::env::var(key).ok())
}

pub fn load_from(path: &Path, env: &dyn Fn(&str) -> Option<String>) -> Result<Config> {
    if !path.exists() {
        bail!(
            "configuration file not found at {}. Run `contactdir init` to create one.",
            path.display()
        );
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read configuration file at {}", path.display()))?;

    let value: toml::Value = toml::from_str(&raw)
        .with_context(|| format!("failed to parse {} as TOML", path.display()))?;

    warn_unknown_keys(&value);

    let cfg_file: ConfigFile = value
        .try_into()
        .with_context(|| format!("failed to deserialize config from {}", path.display()))?;

    let api_url = non_empty(env(ENV_API_URL))
        .or_else(|| non_empty(cfg_file.api_url))
        .ok_or_else(|| {
            anyhow!(
                "`api_url` must be specified in configuration (or set {})",
                ENV_API_URL
            )
        })?;
    let api_url = api_url.trim_end_matches('/').to_string();

    if cfg_file.page_size == 0 {
        bail!("`page_size` must be at least 1");
    }

    let session_file = match cfg_file.session_file {
        Some(file) => expand_tilde(Path::new(&file)),
        None => default_session_file()?,
    };

    debug!(path = %path.display(), api_url = %api_url, "loaded configuration");

    Ok(Config {
        config_path: path.to_path_buf(),
        api_url,
        page_size: cfg_file.page_size,
        session_file,
        auth: cfg_file.auth.into_config(env),
        export: cfg_file.export.into(),
    })
}

/// Starter configuration written by `contactdir init`.
pub fn default_config_contents(api_url: Option<&str>) -> String {
    let api_line = match api_url {
        Some(url) => format!("api_url = \"{}\"", url.trim_end_matches('/')),
        None => "# api_url = \"https://directory.example.org/api\"".to_string(),
    };
    format!(
        r#"# contactdir configuration

{api_line}
page_size = {page_size}
# session_file = "~/.local/share/contactdir/session.json"

[auth]
# region = "us-east-1"
# user_pool_id = "us-east-1_XXXXXXXXX"
# client_id = "xxxxxxxxxxxxxxxxxxxxxxxxxx"
min_password_length = {min_password_length}

[export]
# directory = "~/Downloads"
filename = "contacts"
"#,
        api_line = api_line,
        page_size = DEFAULT_PAGE_SIZE,
        min_password_length = DEFAULT_MIN_PASSWORD_LENGTH,
    )
}

/// Write a starter config to `path`. An existing file is only replaced with
/// `force`.
pub fn write_default(path: &Path, api_url: Option<&str>, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "configuration file already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create config dir: {}", parent.display()))?;
        }
    }
    fs::write(path, default_config_contents(api_url))
        .with_context(|| format!("failed to write configuration file at {}", path.display()))?;
    Ok(())
}

// =============================================================================
// Unknown key warnings
// =============================================================================

fn warn_unknown_keys(value: &toml::Value) {
    let Some(table) = value.as_table() else {
        return;
    };

    let known = HashSet::from(["api_url", "page_size", "session_file", "auth", "export"]);
    for key in table.keys() {
        if !known.contains(key.as_str()) {
            warn!("unknown configuration key `{}`", key);
        }
    }

    if let Some(auth_val) = table.get("auth") {
        warn_unknown_in_section(
            auth_val,
            "auth",
            &["region", "user_pool_id", "client_id", "endpoint", "min_password_length"],
        );
    }

    if let Some(export_val) = table.get("export") {
        warn_unknown_in_section(export_val, "export", &["directory", "filename"]);
    }
}

fn warn_unknown_in_section(value: &toml::Value, section: &str, known: &[&str]) {
    let Some(table) = value.as_table() else {
        return;
    };
    let known_set: HashSet<&str> = known.iter().copied().collect();
    for key in table.keys() {
        if !known_set.contains(key.as_str()) {
            warn!("unknown {} entry `{}`", section, key);
        }
    }
}
