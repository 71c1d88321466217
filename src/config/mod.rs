//! Configuration management for the Mandrill emulator

use anyhow::{Context, Result};
use std::env;
use std::fmt;
use std::str::FromStr;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server host
    pub http_host: String,
    /// HTTP server port
    pub http_port: u16,
    /// Outbound SMTP configuration
    pub smtp: SmtpConfig,
    /// Display name used when a message carries no `from_name`
    pub default_from_name: String,
    /// Accepted API keys; empty means any key is accepted
    pub api_keys: Vec<String>,
    /// Debug mode: request/response body logging and request echo in template sends
    pub debug: bool,
    /// Scheduler configuration
    pub scheduler: SchedulerConfig,
    /// Logging configuration
    pub telemetry: TelemetryConfig,
}

/// Channel security used when talking to the SMTP endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmtpSecurity {
    /// Plain TCP, never upgraded
    #[default]
    None,
    /// Plain TCP, upgraded with STARTTLS when the server advertises it
    StartTls,
    /// TLS from the first byte (implicit TLS)
    Tls,
}

impl SmtpSecurity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::StartTls => "starttls",
            Self::Tls => "tls",
        }
    }
}

impl fmt::Display for SmtpSecurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SmtpSecurity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "starttls" => Ok(Self::StartTls),
            "tls" => Ok(Self::Tls),
            other => Err(format!("unknown SMTP security mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub security: SmtpSecurity,
    /// Accept any server certificate. Development convenience, off by default.
    pub insecure_tls: bool,
    pub timeout_secs: u64,
}

impl SmtpConfig {
    /// Credentials are used only when a username is configured
    pub fn credentials(&self) -> Option<(String, String)> {
        self.username
            .as_ref()
            .map(|user| (user.clone(), self.password.clone().unwrap_or_default()))
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1025,
            username: None,
            password: None,
            security: SmtpSecurity::None,
            insecure_tls: false,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Upper bound between two scans of the holding set
    pub tick_interval_ms: u64,
    /// Maximum number of scheduled deliveries running at once
    pub max_concurrent_sends: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            max_concurrent_sends: 16,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// "text" or "json"
    pub log_format: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let security = match env::var("SMTP_TLS") {
            Ok(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!("{}; falling back to plain SMTP", e);
                SmtpSecurity::None
            }),
            Err(_) => SmtpSecurity::None,
        };

        let debug = env::var("MANDRILL_DEBUG")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| env::var("DEBUG").ok())
            .map(|v| is_truthy(&v))
            .unwrap_or(false);

        Ok(Self {
            http_host: env::var("HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: non_empty_var("PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse()
                .context("Invalid PORT")?,
            smtp: SmtpConfig {
                host: non_empty_var("SMTP_HOST").unwrap_or_else(|| "localhost".to_string()),
                port: non_empty_var("SMTP_PORT")
                    .unwrap_or_else(|| "1025".to_string())
                    .parse()
                    .context("Invalid SMTP_PORT")?,
                username: non_empty_var("SMTP_USERNAME"),
                password: non_empty_var("SMTP_PASSWORD"),
                security,
                insecure_tls: env::var("SMTP_INSECURE_TLS")
                    .map(|s| s.trim().to_lowercase() == "true")
                    .unwrap_or(false),
                timeout_secs: non_empty_var("SMTP_TIMEOUT_SECS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            },
            default_from_name: non_empty_var("DEFAULT_FROM_NAME")
                .unwrap_or_else(|| "Mandrill Dev".to_string()),
            api_keys: env::var("MANDRILL_KEYS")
                .map(|s| parse_key_list(&s))
                .unwrap_or_default(),
            debug,
            scheduler: SchedulerConfig {
                tick_interval_ms: non_empty_var("SCHEDULER_TICK_MS")
                    .and_then(|s| s.parse().ok())
                    .filter(|ms| *ms > 0)
                    .unwrap_or(1000),
                max_concurrent_sends: non_empty_var("SCHEDULER_MAX_CONCURRENT_SENDS")
                    .and_then(|s| s.parse().ok())
                    .filter(|n| *n > 0)
                    .unwrap_or(16),
            },
            telemetry: TelemetryConfig {
                log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string()),
            },
        })
    }

    /// Get HTTP server address
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    /// Get SMTP endpoint address
    pub fn smtp_addr(&self) -> String {
        format!("{}:{}", self.smtp.host, self.smtp.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_host: "0.0.0.0".to_string(),
            http_port: 8080,
            smtp: SmtpConfig::default(),
            default_from_name: "Mandrill Dev".to_string(),
            api_keys: vec![],
            debug: false,
            scheduler: SchedulerConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Split a comma-separated key list, dropping blanks
pub fn parse_key_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect()
}

/// `1`, `true`, `yes` and `on` (any case) enable a flag
pub fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_config_addresses() {
        let config = Config {
            http_host: "127.0.0.1".to_string(),
            http_port: 9090,
            ..Config::default()
        };

        assert_eq!(config.http_addr(), "127.0.0.1:9090");
        assert_eq!(config.smtp_addr(), "localhost:1025");
    }

    #[test]
    fn test_smtp_security_parse() {
        assert_eq!("none".parse::<SmtpSecurity>().unwrap(), SmtpSecurity::None);
        assert_eq!("".parse::<SmtpSecurity>().unwrap(), SmtpSecurity::None);
        assert_eq!(
            "STARTTLS".parse::<SmtpSecurity>().unwrap(),
            SmtpSecurity::StartTls
        );
        assert_eq!(" tls ".parse::<SmtpSecurity>().unwrap(), SmtpSecurity::Tls);
        assert!("ssl".parse::<SmtpSecurity>().is_err());
    }

    #[test]
    fn test_smtp_security_display_roundtrip() {
        for mode in [SmtpSecurity::None, SmtpSecurity::StartTls, SmtpSecurity::Tls] {
            assert_eq!(mode.to_string().parse::<SmtpSecurity>().unwrap(), mode);
        }
    }

    #[test]
    fn test_smtp_defaults_are_safe() {
        let smtp = SmtpConfig::default();
        assert!(!smtp.insecure_tls);
        assert_eq!(smtp.security, SmtpSecurity::None);
        assert!(smtp.credentials().is_none());
    }

    #[test]
    fn test_credentials_require_username() {
        let smtp = SmtpConfig {
            password: Some("secret".to_string()),
            ..SmtpConfig::default()
        };
        assert!(smtp.credentials().is_none());

        let smtp = SmtpConfig {
            username: Some("user".to_string()),
            ..SmtpConfig::default()
        };
        assert_eq!(
            smtp.credentials(),
            Some(("user".to_string(), String::new()))
        );
    }

    #[test]
    fn test_parse_key_list() {
        assert_eq!(parse_key_list("a, b,,c "), vec!["a", "b", "c"]);
        assert!(parse_key_list("  ").is_empty());
    }

    #[rstest]
    #[case("1", true)]
    #[case("true", true)]
    #[case("YES", true)]
    #[case(" on ", true)]
    #[case("0", false)]
    #[case("false", false)]
    #[case("", false)]
    #[case("nope", false)]
    fn test_is_truthy(#[case] raw: &str, #[case] expected: bool) {
        assert_eq!(is_truthy(raw), expected);
    }

    #[test]
    fn test_scheduler_config_default() {
        let config = SchedulerConfig::default();
        assert_eq!(config.tick_interval_ms, 1000);
        assert_eq!(config.max_concurrent_sends, 16);
    }
}
