//! Pieces shared by the `drive-fetch` and `drive-query` binaries.

use crate::config::ClientConfig;
use crate::error::Error;

use clap::{Args, ValueEnum};
use std::process::ExitCode;
use tracing_subscriber::fmt;

/// AWS connection flags accepted by every binary.
#[derive(Args, Clone, Debug)]
pub struct AwsArgs {
    /// AWS region
    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    pub region: String,

    /// AWS access key ID
    #[arg(long, env = "AWS_ACCESS_KEY_ID")]
    pub access_key: Option<String>,

    /// AWS secret access key
    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// AWS session token for temporary credentials
    #[arg(long, env = "AWS_SESSION_TOKEN", hide_env_values = true)]
    pub session_token: Option<String>,

    /// AWS profile name
    #[arg(long, env = "AWS_PROFILE")]
    pub profile: Option<String>,

    /// Custom endpoint URL (for LocalStack)
    #[arg(long, env = "AWS_ENDPOINT_URL")]
    pub endpoint: Option<String>,

    /// Log level
    #[arg(long, value_enum, default_value = "warn")]
    pub log_level: LogLevel,
}

impl From<&AwsArgs> for ClientConfig {
    fn from(args: &AwsArgs) -> Self {
        let mut config = ClientConfig::default().with_region(&args.region);
        if let (Some(access_key), Some(secret_key)) = (&args.access_key, &args.secret_key) {
            config = config.with_credentials(access_key, secret_key);
            if let Some(session_token) = &args.session_token {
                config = config.with_session_token(session_token);
            }
        }
        if let Some(profile) = &args.profile {
            config = config.with_profile(profile);
        }
        if let Some(endpoint) = &args.endpoint {
            config = config.with_endpoint(endpoint);
        }
        config
    }
}

/// Log level argument.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum LogLevel {
    /// Trace level (most verbose)
    Trace,
    /// Debug level
    Debug,
    /// Info level
    Info,
    /// Warning level (default)
    Warn,
    /// Error level (least verbose)
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Install a fmt subscriber writing to stderr, leaving stdout for results.
pub fn init_logging(level: LogLevel) -> anyhow::Result<()> {
    let level: tracing::Level = level.into();
    fmt::Subscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!(error))
}

/// Print the diagnostic fields of `error` on stdout and pick the exit code.
pub fn report_error(error: &Error) -> ExitCode {
    println!("Request failed: {error}");
    for line in format_diagnostics(error) {
        println!("{line}");
    }
    ExitCode::from(error.exit_code())
}

fn format_diagnostics(error: &Error) -> Vec<String> {
    error
        .diagnostics()
        .into_iter()
        .map(|(label, value)| format!("  {label}: {value}"))
        .collect()
}

/// Format bytes as human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} bytes")
    }
}
