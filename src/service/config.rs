use std::{env, sync::Arc};

use crate::config::Config;

pub trait ConfigService: Send + Sync {
    fn port(&self) -> u16;
    fn values(&self) -> &Config;
}

pub struct ConfigServiceImpl {
    config: Arc<Config>,
}

impl ConfigServiceImpl {
    fn strip_wrapping_quotes(value: &str) -> &str {
        if value.len() >= 2 {
            let bytes = value.as_bytes();
            let first = bytes[0];
            let last = bytes[value.len() - 1];
            if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
                return &value[1..value.len() - 1];
            }
        }
        value
    }

    fn env_nonempty(key: &str) -> Option<String> {
        env::var(key).ok().and_then(|value| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return None;
            }
            let normalized = Self::strip_wrapping_quotes(trimmed).trim();
            if normalized.is_empty() {
                None
            } else {
                Some(normalized.to_string())
            }
        })
    }

    fn env_u16(key: &str) -> Option<u16> {
        Self::env_nonempty(key).and_then(|value| value.parse::<u16>().ok())
    }

    fn env_u64(key: &str) -> Option<u64> {
        Self::env_nonempty(key).and_then(|value| {
            value
                .parse::<u64>()
                .map_err(|err| tracing::warn!("ignoring invalid {key}: {err}"))
                .ok()
        })
    }

    fn env_bool(key: &str, default: bool) -> bool {
        Self::env_nonempty(key)
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(default)
    }

    pub fn new() -> Self {
        Self::from_config(Config {
            port: Self::env_u16("PORT").unwrap_or(3333),
            upstream_api_base: Self::env_nonempty("UPSTREAM_API_BASE")
                .unwrap_or_else(|| "http://localhost:5000/api".to_string()),
            upstream_timeout_seconds: Self::env_u64("UPSTREAM_TIMEOUT_SECONDS").unwrap_or(20),
            redis_url: Self::env_nonempty("REDIS_URL"),
            session_ttl_seconds: Self::env_u64("SESSION_TTL_SECONDS").unwrap_or(60 * 60 * 24 * 7),
            session_key_prefix: Self::env_nonempty("SESSION_KEY_PREFIX")
                .unwrap_or_else(|| "portal-api".to_string()),
            cookie_secure: Self::env_bool("COOKIE_SECURE", false),
            cookie_domain: Self::env_nonempty("COOKIE_DOMAIN"),
            checkout_ttl_seconds: Self::env_u64("CHECKOUT_TTL_SECONDS").unwrap_or(15 * 60),
            payment_gateway_key_id: Self::env_nonempty("PAYMENT_GATEWAY_KEY_ID"),
            media_upload_folder: Self::env_nonempty("MEDIA_UPLOAD_FOLDER")
                .unwrap_or_else(|| "matrimony".to_string()),
            cors_allowed_origin: Self::env_nonempty("CORS_ALLOWED_ORIGIN"),
        })
    }

    pub fn from_config(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl Default for ConfigServiceImpl {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigService for ConfigServiceImpl {
    fn port(&self) -> u16 {
        self.config.port
    }

    fn values(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapping_quotes_are_stripped() {
        assert_eq!(ConfigServiceImpl::strip_wrapping_quotes("\"abc\""), "abc");
        assert_eq!(ConfigServiceImpl::strip_wrapping_quotes("'abc'"), "abc");
        assert_eq!(ConfigServiceImpl::strip_wrapping_quotes("\"abc"), "\"abc");
        assert_eq!(ConfigServiceImpl::strip_wrapping_quotes("\""), "\"");
    }
}
