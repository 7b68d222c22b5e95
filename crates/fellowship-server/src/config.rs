use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me", "secret"];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub storage_dir: PathBuf,
    pub public_url: String,
    pub email: Option<EmailConfig>,
    pub push: Option<PushConfig>,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct PushConfig {
    pub api_url: String,
    pub access_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads every `FELLOWSHIP_*` setting through `lookup`, applying
    /// defaults. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = get("FELLOWSHIP_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("FELLOWSHIP_JWT_SECRET is unset or still a placeholder");
        }

        let port = or("FELLOWSHIP_PORT", "3000")
            .parse()
            .context("FELLOWSHIP_PORT must be a port number")?;

        let email = get("FELLOWSHIP_EMAIL_API_KEY").map(|api_key| EmailConfig {
            api_url: or("FELLOWSHIP_EMAIL_API_URL", "https://api.resend.com"),
            api_key,
            from: or("FELLOWSHIP_EMAIL_FROM", "Fellowship <no-reply@localhost>"),
        });

        let push_enabled = match or("FELLOWSHIP_PUSH_ENABLED", "true").to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            other => bail!("FELLOWSHIP_PUSH_ENABLED must be true or false, got {:?}", other),
        };
        let push = push_enabled.then(|| PushConfig {
            api_url: or("FELLOWSHIP_PUSH_API_URL", "https://exp.host/--/api/v2"),
            access_token: get("FELLOWSHIP_PUSH_ACCESS_TOKEN"),
        });

        Ok(Self {
            host: or("FELLOWSHIP_HOST", "0.0.0.0"),
            port,
            db_path: or("FELLOWSHIP_DB_PATH", "fellowship.db").into(),
            jwt_secret,
            storage_dir: or("FELLOWSHIP_STORAGE_DIR", "./storage").into(),
            public_url: or("FELLOWSHIP_PUBLIC_URL", "http://localhost:3000")
                .trim_end_matches('/')
                .to_string(),
            email,
            push,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_with_only_a_secret() {
        let config = config(&[("FELLOWSHIP_JWT_SECRET", "s3cr3t-value")]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.db_path, PathBuf::from("fellowship.db"));
        assert_eq!(config.public_url, "http://localhost:3000");
        assert!(config.email.is_none());
        let push = config.push.unwrap();
        assert_eq!(push.api_url, "https://exp.host/--/api/v2");
        assert!(push.access_token.is_none());
    }

    #[test]
    fn placeholder_secrets_are_refused() {
        assert!(config(&[]).is_err());
        assert!(config(&[("FELLOWSHIP_JWT_SECRET", "dev-secret-change-me")]).is_err());
        assert!(config(&[("FELLOWSHIP_JWT_SECRET", "  ")]).is_err());
    }

    #[test]
    fn email_needs_an_api_key() {
        let config = config(&[
            ("FELLOWSHIP_JWT_SECRET", "s3cr3t-value"),
            ("FELLOWSHIP_EMAIL_API_KEY", "re_123"),
            ("FELLOWSHIP_EMAIL_FROM", "Grace Church <hello@grace.example>"),
        ])
        .unwrap();
        let email = config.email.unwrap();
        assert_eq!(email.api_url, "https://api.resend.com");
        assert_eq!(email.from, "Grace Church <hello@grace.example>");
    }

    #[test]
    fn push_can_be_switched_off() {
        let off = config(&[("FELLOWSHIP_JWT_SECRET", "s3cr3t-value"), ("FELLOWSHIP_PUSH_ENABLED", "false")]).unwrap();
        assert!(off.push.is_none());

        let bad = config(&[("FELLOWSHIP_JWT_SECRET", "s3cr3t-value"), ("FELLOWSHIP_PUSH_ENABLED", "maybe")]);
        assert!(bad.is_err());
    }

    #[test]
    fn bad_port_is_an_error() {
        assert!(config(&[("FELLOWSHIP_JWT_SECRET", "s3cr3t-value"), ("FELLOWSHIP_PORT", "http")]).is_err());
    }
}
