use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::{
    policy::{DEFAULT_LOCKOUT_DURATION_SECONDS, DEFAULT_LOCKOUT_THRESHOLD},
    service::MAX_WINDOW_SECONDS,
    token::DEFAULT_TOKEN_TTL_SECONDS,
};

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_TOKEN_TTL_SECONDS: &str = "token-ttl-seconds";
pub const ARG_REFRESH_GRACE_SECONDS: &str = "refresh-grace-seconds";
pub const ARG_LOCKOUT_THRESHOLD: &str = "lockout-threshold";
pub const ARG_LOCKOUT_DURATION_SECONDS: &str = "lockout-duration-seconds";
pub const ARG_STORE_TIMEOUT_SECONDS: &str = "store-timeout-seconds";
pub const ARG_LOGIN_RATE_LIMIT: &str = "login-rate-limit";
pub const ARG_AUDIT_SINK: &str = "audit-sink";
pub const ARG_BOOTSTRAP_ADMIN_EMAIL: &str = "bootstrap-admin-email";
pub const ARG_BOOTSTRAP_ADMIN_PASSWORD: &str = "bootstrap-admin-password";

pub const AUDIT_SINK_POSTGRES: &str = "postgres";
pub const AUDIT_SINK_LOG: &str = "log";

#[derive(Debug)]
pub struct Options {
    pub jwt_secret: SecretString,
    pub token_ttl_seconds: i64,
    pub refresh_grace_seconds: i64,
    pub lockout_threshold: u32,
    pub lockout_duration_seconds: i64,
    pub store_timeout_seconds: u64,
    pub login_rate_limit: u32,
    pub audit_sink: String,
    /// Administrator email and password to create at startup, if absent.
    pub bootstrap_admin: Option<(String, SecretString)>,
}

impl Options {
    /// Parse token and lockout arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the signing secret is missing or empty.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let jwt_secret = match matches.get_one::<String>(ARG_JWT_SECRET) {
            Some(value) if !value.trim().is_empty() => SecretString::from(value.clone()),
            _ => anyhow::bail!("missing required argument: --{ARG_JWT_SECRET}"),
        };

        Ok(Self {
            jwt_secret,
            token_ttl_seconds: matches
                .get_one::<i64>(ARG_TOKEN_TTL_SECONDS)
                .copied()
                .unwrap_or(DEFAULT_TOKEN_TTL_SECONDS),
            refresh_grace_seconds: matches
                .get_one::<i64>(ARG_REFRESH_GRACE_SECONDS)
                .copied()
                .unwrap_or(0),
            lockout_threshold: matches
                .get_one::<u32>(ARG_LOCKOUT_THRESHOLD)
                .copied()
                .unwrap_or(DEFAULT_LOCKOUT_THRESHOLD),
            lockout_duration_seconds: matches
                .get_one::<i64>(ARG_LOCKOUT_DURATION_SECONDS)
                .copied()
                .unwrap_or(DEFAULT_LOCKOUT_DURATION_SECONDS),
            store_timeout_seconds: matches
                .get_one::<u64>(ARG_STORE_TIMEOUT_SECONDS)
                .copied()
                .unwrap_or(5),
            login_rate_limit: matches
                .get_one::<u32>(ARG_LOGIN_RATE_LIMIT)
                .copied()
                .unwrap_or(0),
            audit_sink: matches
                .get_one::<String>(ARG_AUDIT_SINK)
                .cloned()
                .unwrap_or_else(|| AUDIT_SINK_POSTGRES.to_string()),
            bootstrap_admin: matches
                .get_one::<String>(ARG_BOOTSTRAP_ADMIN_EMAIL)
                .cloned()
                .zip(
                    matches
                        .get_one::<String>(ARG_BOOTSTRAP_ADMIN_PASSWORD)
                        .map(|password| SecretString::from(password.clone())),
                ),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    let command = with_lockout_args(command);
    with_bootstrap_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("Secret used to sign and verify access tokens (HS256)")
                .env("LMS_AUTH_JWT_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_TOKEN_TTL_SECONDS)
                .long(ARG_TOKEN_TTL_SECONDS)
                .help("Access token lifetime in seconds")
                .env("LMS_AUTH_TOKEN_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_WINDOW_SECONDS)),
        )
        .arg(
            Arg::new(ARG_REFRESH_GRACE_SECONDS)
                .long(ARG_REFRESH_GRACE_SECONDS)
                .help("How long after expiry a token may still be refreshed (0 disables)")
                .env("LMS_AUTH_REFRESH_GRACE_SECONDS")
                .default_value("0")
                .value_parser(clap::value_parser!(i64).range(0..=MAX_WINDOW_SECONDS)),
        )
}

fn with_lockout_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_LOCKOUT_THRESHOLD)
                .long(ARG_LOCKOUT_THRESHOLD)
                .help("Consecutive failed logins that lock an account")
                .env("LMS_AUTH_LOCKOUT_THRESHOLD")
                .default_value("5")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_LOCKOUT_DURATION_SECONDS)
                .long(ARG_LOCKOUT_DURATION_SECONDS)
                .help("How long a locked account stays locked, in seconds")
                .env("LMS_AUTH_LOCKOUT_DURATION_SECONDS")
                .default_value("1800")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_WINDOW_SECONDS)),
        )
        .arg(
            Arg::new(ARG_STORE_TIMEOUT_SECONDS)
                .long(ARG_STORE_TIMEOUT_SECONDS)
                .help("Upper bound for a single account store call, in seconds")
                .env("LMS_AUTH_STORE_TIMEOUT_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_LOGIN_RATE_LIMIT)
                .long(ARG_LOGIN_RATE_LIMIT)
                .help("Login attempts allowed per client address per minute (0 disables)")
                .env("LMS_AUTH_LOGIN_RATE_LIMIT")
                .default_value("0")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_AUDIT_SINK)
                .long(ARG_AUDIT_SINK)
                .help("Where audit events go: the audit_events table or the `audit` log target")
                .env("LMS_AUTH_AUDIT_SINK")
                .default_value(AUDIT_SINK_POSTGRES)
                .value_parser([AUDIT_SINK_POSTGRES, AUDIT_SINK_LOG]),
        )
}

fn with_bootstrap_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_BOOTSTRAP_ADMIN_EMAIL)
                .long(ARG_BOOTSTRAP_ADMIN_EMAIL)
                .help("Create an administrator with this email at startup unless it exists")
                .env("LMS_AUTH_BOOTSTRAP_ADMIN_EMAIL")
                .requires(ARG_BOOTSTRAP_ADMIN_PASSWORD),
        )
        .arg(
            Arg::new(ARG_BOOTSTRAP_ADMIN_PASSWORD)
                .long(ARG_BOOTSTRAP_ADMIN_PASSWORD)
                .help("Password for the bootstrap administrator")
                .env("LMS_AUTH_BOOTSTRAP_ADMIN_PASSWORD")
                .hide_env_values(true)
                .requires(ARG_BOOTSTRAP_ADMIN_EMAIL),
        )
}
