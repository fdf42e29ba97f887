//! Maps parsed CLI arguments to the action the binary runs.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{auth, ARG_DSN, ARG_FRONTEND_URL, ARG_PORT};
use anyhow::{Context, Result};

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;
    let frontend_url = matches
        .get_one::<String>(ARG_FRONTEND_URL)
        .cloned()
        .unwrap_or_else(|| "http://localhost:3000".to_string());

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        frontend_url,
        jwt_secret: auth_opts.jwt_secret,
        token_ttl_seconds: auth_opts.token_ttl_seconds,
        refresh_grace_seconds: auth_opts.refresh_grace_seconds,
        lockout_threshold: auth_opts.lockout_threshold,
        lockout_duration_seconds: auth_opts.lockout_duration_seconds,
        store_timeout_seconds: auth_opts.store_timeout_seconds,
        login_rate_limit: auth_opts.login_rate_limit,
        audit_sink: auth_opts.audit_sink,
        bootstrap_admin: auth_opts.bootstrap_admin,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_action_carries_auth_options() {
        temp_env::with_vars(
            [
                ("LMS_AUTH_DSN", Some("postgres://user@localhost:5432/lms")),
                ("LMS_AUTH_JWT_SECRET", Some("s3cret")),
                ("LMS_AUTH_LOCKOUT_DURATION_SECONDS", Some("600")),
                ("LMS_AUTH_LOGIN_RATE_LIMIT", Some("20")),
                ("LMS_AUTH_PORT", None),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["lms-auth"]);
                let result = handler(&matches);
                assert!(result.is_ok());
                if let Ok(Action::Server(args)) = result {
                    assert_eq!(args.port, 8080);
                    assert_eq!(args.dsn, "postgres://user@localhost:5432/lms");
                    assert_eq!(args.lockout_threshold, 5);
                    assert_eq!(args.lockout_duration_seconds, 600);
                    assert_eq!(args.login_rate_limit, 20);
                }
            },
        );
    }

    #[test]
    fn blank_secret_is_rejected() {
        temp_env::with_vars(
            [
                ("LMS_AUTH_DSN", Some("postgres://user@localhost:5432/lms")),
                ("LMS_AUTH_JWT_SECRET", Some(" ")),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["lms-auth"]);
                let result = handler(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(err
                        .to_string()
                        .contains("missing required argument: --jwt-secret"));
                }
            },
        );
    }
}
