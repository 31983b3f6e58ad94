//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::CcfsyncConfig;
use super::secret::secret_string;
use crate::core::normalize::SourceKind;
use crate::domain::errors::ReconcileError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into CcfsyncConfig
/// 4. Applies environment variable overrides (CCFSYNC_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if:
/// - File cannot be read
/// - TOML parsing fails
/// - A referenced environment variable is not set
/// - Configuration validation fails
///
/// # Examples
///
/// ```no_run
/// use ccfsync::config::loader::load_config;
///
/// let config = load_config("ccfsync.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<CcfsyncConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ReconcileError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        ReconcileError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    let contents = substitute_env_vars(&contents)?;

    let mut config: CcfsyncConfig = toml::from_str(&contents)
        .map_err(|e| ReconcileError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        ReconcileError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are copied through untouched.
///
/// # Errors
///
/// Returns an error naming every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| ReconcileError::Configuration(format!("Invalid placeholder pattern: {e}")))?;
    let mut result = String::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{}}}", var_name);
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(ReconcileError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

fn parse_override<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        ReconcileError::Configuration(format!("Invalid value '{value}' for {name}"))
    })
}

/// Applies environment variable overrides using the CCFSYNC_* prefix
///
/// Environment variables follow the pattern: CCFSYNC_<SECTION>_<KEY>,
/// for example CCFSYNC_CRM_BASE_URL or CCFSYNC_SOURCES_INBOX_DIR.
fn apply_env_overrides(config: &mut CcfsyncConfig) -> Result<()> {
    // Application overrides
    if let Ok(val) = std::env::var("CCFSYNC_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Ok(val) = std::env::var("CCFSYNC_APPLICATION_DRY_RUN") {
        config.application.dry_run = val.parse().unwrap_or(false);
    }

    // CRM overrides
    if let Ok(val) = std::env::var("CCFSYNC_CRM_BASE_URL") {
        config.crm.base_url = val;
    }
    if let Ok(val) = std::env::var("CCFSYNC_CRM_ACCOUNTS_URL") {
        config.crm.accounts_url = val;
    }
    if let Ok(val) = std::env::var("CCFSYNC_CRM_CLIENT_ID") {
        config.crm.client_id = val;
    }
    if let Ok(val) = std::env::var("CCFSYNC_CRM_CLIENT_SECRET") {
        config.crm.client_secret = secret_string(val);
    }
    if let Ok(val) = std::env::var("CCFSYNC_CRM_REFRESH_TOKEN") {
        config.crm.refresh_token = secret_string(val);
    }
    if let Ok(val) = std::env::var("CCFSYNC_CRM_RECORDS_MODULE") {
        config.crm.records_module = val;
    }
    if let Ok(val) = std::env::var("CCFSYNC_CRM_TIMEOUT_SECONDS") {
        config.crm.timeout_seconds = parse_override("CCFSYNC_CRM_TIMEOUT_SECONDS", &val)?;
    }
    if let Ok(val) = std::env::var("CCFSYNC_CRM_PUSH_BATCH_SIZE") {
        config.crm.push_batch_size = parse_override("CCFSYNC_CRM_PUSH_BATCH_SIZE", &val)?;
    }
    if let Ok(val) = std::env::var("CCFSYNC_CRM_TLS_VERIFY") {
        config.crm.tls_verify = val.parse().unwrap_or(true);
    }

    // PostgreSQL overrides
    if let Ok(val) = std::env::var("CCFSYNC_POSTGRESQL_CONNECTION_STRING") {
        config.postgresql.connection_string = secret_string(val);
    }
    if let Ok(val) = std::env::var("CCFSYNC_POSTGRESQL_MAX_CONNECTIONS") {
        config.postgresql.max_connections =
            parse_override("CCFSYNC_POSTGRESQL_MAX_CONNECTIONS", &val)?;
    }
    if let Ok(val) = std::env::var("CCFSYNC_POSTGRESQL_SSL_MODE") {
        config.postgresql.ssl_mode = val;
    }

    // Source overrides
    if let Ok(val) = std::env::var("CCFSYNC_SOURCES_INBOX_DIR") {
        config.sources.inbox_dir = val;
    }
    if let Ok(val) = std::env::var("CCFSYNC_SOURCES_ORDER") {
        config.sources.order = val
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_override::<SourceKind>("CCFSYNC_SOURCES_ORDER", s))
            .collect::<Result<Vec<_>>>()?;
    }
    if let Ok(val) = std::env::var("CCFSYNC_SOURCES_MIN_COLLECTION_DATE") {
        config.sources.min_collection_date =
            parse_override("CCFSYNC_SOURCES_MIN_COLLECTION_DATE", &val)?;
    }
    if let Ok(val) = std::env::var("CCFSYNC_SOURCES_FUZZY_THRESHOLD") {
        config.sources.fuzzy_threshold = parse_override("CCFSYNC_SOURCES_FUZZY_THRESHOLD", &val)?;
    }

    // Pipeline overrides
    if let Ok(val) = std::env::var("CCFSYNC_PIPELINE_SITE_REQUIRED_CODE") {
        config.pipeline.site_required_code = val;
    }

    // Logging overrides
    if let Ok(val) = std::env::var("CCFSYNC_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("CCFSYNC_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
    if let Ok(val) = std::env::var("CCFSYNC_LOGGING_LOCAL_ROTATION") {
        config.logging.local_rotation = val;
    }

    Ok(())
}
