//! Runtime configuration
//!
//! Loaded from the process environment (optionally seeded from `.env`).
//! Credentials are read through `CredentialSource` so they can change
//! between calls in a long-lived process.

use crate::error::OrchestrationError;
use crate::Result;
use std::collections::HashMap;
use std::env;
use std::sync::RwLock;
use std::time::Duration;

pub const DEFAULT_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
pub const DEFAULT_SERVER_ERROR_WINDOW: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 5000;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(750);
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "dev" | "development" | "local" => Environment::Development,
            "test" | "testing" | "ci" => Environment::Test,
            _ => Environment::Production,
        }
    }

    pub fn allows_synthetic(&self) -> bool {
        matches!(self, Environment::Development | Environment::Test)
    }
}

/// Tuning constants for the cascade. Durations are policy, not invariants.
#[derive(Debug, Clone)]
pub struct CascadePolicy {
    pub rate_limit_window: Duration,
    pub server_error_window: Duration,
    pub max_message_chars: usize,
    /// Pause between attempts against the same provider
    pub retry_delay: Duration,
    pub overall_deadline: Option<Duration>,
}

impl Default for CascadePolicy {
    fn default() -> Self {
        Self {
            rate_limit_window: DEFAULT_RATE_LIMIT_WINDOW,
            server_error_window: DEFAULT_SERVER_ERROR_WINDOW,
            max_message_chars: DEFAULT_MAX_MESSAGE_CHARS,
            retry_delay: DEFAULT_RETRY_DELAY,
            overall_deadline: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub environment: Environment,
    pub synthetic_enabled: bool,
    pub policy: CascadePolicy,
    pub port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: Environment::Production,
            synthetic_enabled: false,
            policy: CascadePolicy::default(),
            port: DEFAULT_PORT,
        }
    }
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        let environment = env::var("APP_ENV")
            .or_else(|_| env::var("ENVIRONMENT"))
            .map(|v| Environment::parse(&v))
            .unwrap_or(Environment::Production);

        let synthetic_enabled = match env::var("ENABLE_SYNTHETIC_PROVIDER") {
            Ok(v) => parse_bool(&v)?,
            Err(_) => environment.allows_synthetic(),
        };

        let policy = CascadePolicy {
            rate_limit_window: env_secs("CASCADE_RATE_LIMIT_WINDOW_SECS")?
                .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW),
            server_error_window: env_secs("CASCADE_SERVER_ERROR_WINDOW_SECS")?
                .unwrap_or(DEFAULT_SERVER_ERROR_WINDOW),
            max_message_chars: env_parse::<usize>("CASCADE_MAX_MESSAGE_CHARS")?
                .unwrap_or(DEFAULT_MAX_MESSAGE_CHARS),
            retry_delay: env_parse::<u64>("CASCADE_RETRY_DELAY_MS")?
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_RETRY_DELAY),
            overall_deadline: env_secs("CASCADE_OVERALL_DEADLINE_SECS")?,
        };

        let port = match env::var("PORT").or_else(|_| env::var("API_PORT")) {
            Ok(v) => v.trim().parse().map_err(|_| {
                OrchestrationError::Config(format!("invalid port: {}", v))
            })?,
            Err(_) => DEFAULT_PORT,
        };

        Ok(Self {
            environment,
            synthetic_enabled,
            policy,
            port,
        })
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(v) if !v.trim().is_empty() => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| OrchestrationError::Config(format!("{} has invalid value: {}", name, v))),
        _ => Ok(None),
    }
}

fn env_secs(name: &str) -> Result<Option<Duration>> {
    Ok(env_parse::<u64>(name)?.map(Duration::from_secs))
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(OrchestrationError::Config(format!(
            "expected a boolean, got {}",
            other
        ))),
    }
}

//
// ================= Credentials =================
//

/// Source of provider secrets, consulted on every availability refresh.
pub trait CredentialSource: Send + Sync {
    fn lookup(&self, name: &str) -> Option<String>;

    /// A credential is present when it is set, non-blank and not a template placeholder.
    fn is_present(&self, name: &str) -> bool {
        self.lookup(name)
            .map(|v| is_usable_secret(&v))
            .unwrap_or(false)
    }
}

pub fn is_usable_secret(value: &str) -> bool {
    let v = value.trim();
    !v.is_empty() && !(v.starts_with("your_") && v.ends_with("_here"))
}

/// Reads credentials straight from the process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvCredentials;

impl CredentialSource for EnvCredentials {
    fn lookup(&self, name: &str) -> Option<String> {
        env::var(name).ok()
    }
}

/// In-memory credentials, swappable at runtime.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    values: RwLock<HashMap<String, String>>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, name: &str, value: &str) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&self, name: &str, value: &str) {
        if let Ok(mut values) = self.values.write() {
            values.insert(name.to_string(), value.to_string());
        }
    }

    pub fn remove(&self, name: &str) {
        if let Ok(mut values) = self.values.write() {
            values.remove(name);
        }
    }
}

impl CredentialSource for StaticCredentials {
    fn lookup(&self, name: &str) -> Option<String> {
        self.values.read().ok()?.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("development"), Environment::Development);
        assert_eq!(Environment::parse("TEST"), Environment::Test);
        assert_eq!(Environment::parse("prod"), Environment::Production);
        assert!(!Environment::Production.allows_synthetic());
        assert!(Environment::Development.allows_synthetic());
    }

    #[test]
    fn test_policy_defaults() {
        let policy = CascadePolicy::default();
        assert_eq!(policy.rate_limit_window, Duration::from_secs(60));
        assert_eq!(policy.server_error_window, Duration::from_secs(30));
        assert_eq!(policy.max_message_chars, 5000);
        assert!(policy.overall_deadline.is_none());
    }

    #[test]
    fn test_placeholder_secret_is_absent() {
        let creds = StaticCredentials::new()
            .with("GEMINI_API_KEY", "your_gemini_api_key_here")
            .with("GROQ_API_KEY", "   ")
            .with("OPENAI_API_KEY", "sk-live");

        assert!(!creds.is_present("GEMINI_API_KEY"));
        assert!(!creds.is_present("GROQ_API_KEY"));
        assert!(creds.is_present("OPENAI_API_KEY"));
        assert!(!creds.is_present("MISSING"));
    }

    #[test]
    fn test_static_credentials_can_change() {
        let creds = StaticCredentials::new().with("OPENAI_API_KEY", "sk-live");
        assert!(creds.is_present("OPENAI_API_KEY"));
        creds.remove("OPENAI_API_KEY");
        assert!(!creds.is_present("OPENAI_API_KEY"));
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("yes").unwrap());
        assert!(!parse_bool("0").unwrap());
        assert!(parse_bool("maybe").is_err());
    }
}
