use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use axum::http::HeaderName;
use fincontrol_core::AppError;
use fincontrol_domain::{AUDIT_LOG_ENTITY, AuditPolicy, AuditedEntity, RedactionPolicy};
use tracing_subscriber::EnvFilter;

const DEFAULT_IDENTITY_HEADER: &str = "x-authenticated-user";

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub database_url: String,
    pub database_max_connections: u32,
    pub api_host: String,
    pub api_port: u16,
    pub identity_header: HeaderName,
    pub audit_policy: AuditPolicy,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let database_url = required_env("DATABASE_URL")?;
        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(10);

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3001);

        let identity_header = parse_identity_header(
            env::var("IDENTITY_HEADER")
                .unwrap_or_else(|_| DEFAULT_IDENTITY_HEADER.to_owned())
                .as_str(),
        )?;

        let audit_policy = parse_audit_policy(
            env::var("AUDIT_ENABLED").ok().as_deref(),
            env::var("AUDIT_ENTITIES").ok().as_deref(),
            env::var("AUDIT_REDACTED_FIELDS").ok().as_deref(),
        )?;

        Ok(Self {
            migrate_only,
            database_url,
            database_max_connections,
            api_host,
            api_port,
            identity_header,
            audit_policy,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn parse_identity_header(value: &str) -> Result<HeaderName, AppError> {
    HeaderName::from_str(value.trim())
        .map_err(|error| AppError::Validation(format!("invalid IDENTITY_HEADER '{value}': {error}")))
}

fn comma_list(value: &str) -> impl Iterator<Item = &str> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
}

/// Builds the capture policy from the raw `AUDIT_*` variables.
fn parse_audit_policy(
    enabled: Option<&str>,
    entities: Option<&str>,
    redacted_fields: Option<&str>,
) -> Result<AuditPolicy, AppError> {
    let enabled = match enabled.map(str::trim) {
        None | Some("") => true,
        Some(value) if value.eq_ignore_ascii_case("true") => true,
        Some(value) if value.eq_ignore_ascii_case("false") => false,
        Some(other) => {
            return Err(AppError::Validation(format!(
                "AUDIT_ENABLED must be 'true' or 'false', got '{other}'"
            )));
        }
    };

    let entities = match entities.filter(|value| !value.trim().is_empty()) {
        None => AuditedEntity::all().to_vec(),
        Some(value) => comma_list(value)
            .map(|name| {
                if name == AUDIT_LOG_ENTITY {
                    return Err(AppError::Validation(format!(
                        "AUDIT_ENTITIES must not include '{AUDIT_LOG_ENTITY}'"
                    )));
                }
                AuditedEntity::from_str(name)
            })
            .collect::<Result<Vec<_>, AppError>>()?,
    };

    let redaction = match redacted_fields.filter(|value| !value.trim().is_empty()) {
        None => RedactionPolicy::default(),
        Some(value) => RedactionPolicy::with_additional(comma_list(value)),
    };

    Ok(AuditPolicy::new(enabled, entities, redaction))
}
