use crate::{
    account::PgAccountStore,
    api,
    audit::{AuditSink, PgAuditSink, TracingAuditSink},
    cli::{commands::auth::AUDIT_SINK_LOG, telemetry},
    service::{bootstrap_administrator, AuthConfig, AuthService},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub frontend_url: String,
    pub jwt_secret: SecretString,
    pub token_ttl_seconds: i64,
    pub refresh_grace_seconds: i64,
    pub lockout_threshold: u32,
    pub lockout_duration_seconds: i64,
    pub store_timeout_seconds: u64,
    pub login_rate_limit: u32,
    pub audit_sink: String,
    pub bootstrap_admin: Option<(String, SecretString)>,
}

impl Args {
    fn auth_config(&self) -> AuthConfig {
        AuthConfig::new(self.jwt_secret.clone())
            .with_token_ttl_seconds(self.token_ttl_seconds)
            .with_refresh_grace_seconds(self.refresh_grace_seconds)
            .with_lockout_threshold(self.lockout_threshold)
            .with_lockout_duration_seconds(self.lockout_duration_seconds)
            .with_store_timeout_seconds(self.store_timeout_seconds)
            .with_login_rate_limit(self.login_rate_limit)
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let config = args.auth_config();

    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .acquire_timeout(config.store_timeout())
        .test_before_acquire(true)
        .connect(&args.dsn)
        .await
        .context("Failed to connect to database")?;

    info!(
        lockout_threshold = config.lockout_threshold(),
        lockout_minutes = config.lockout_duration().num_minutes(),
        "account store connected"
    );

    let audit: Arc<dyn AuditSink> = if args.audit_sink == AUDIT_SINK_LOG {
        Arc::new(TracingAuditSink)
    } else {
        Arc::new(PgAuditSink::new(pool.clone()))
    };

    let accounts = Arc::new(PgAccountStore::new(pool));

    if let Some((email, password)) = args.bootstrap_admin {
        bootstrap_administrator(&*accounts, &email, password)
            .await
            .context("Failed to bootstrap administrator account")?;
    }

    let service = AuthService::new(&config, accounts, audit);

    let result = api::new(args.port, &args.frontend_url, Arc::new(service)).await;

    telemetry::shutdown_tracer();

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn auth_config_follows_args() {
        let args = Args {
            port: 8080,
            dsn: "postgres://localhost/lms".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            jwt_secret: SecretString::from("s3cret".to_string()),
            token_ttl_seconds: 3600,
            refresh_grace_seconds: 300,
            lockout_threshold: 3,
            lockout_duration_seconds: 600,
            store_timeout_seconds: 2,
            login_rate_limit: 10,
            audit_sink: "postgres".to_string(),
            bootstrap_admin: None,
        };

        let config = args.auth_config();
        assert_eq!(config.jwt_secret().expose_secret(), "s3cret");
        assert_eq!(config.token_ttl().num_seconds(), 3600);
        assert_eq!(config.refresh_grace().num_seconds(), 300);
        assert_eq!(config.lockout_threshold(), 3);
        assert_eq!(config.lockout_duration().num_seconds(), 600);
        assert_eq!(config.store_timeout(), Duration::from_secs(2));
        assert_eq!(config.login_rate_limit(), 10);
    }
}
