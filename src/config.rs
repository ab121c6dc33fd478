use std::{net::SocketAddr, time::Duration};

use dotenvy::dotenv;
use url::Url;

use crate::{error::ConfigError, session::PlaySettings};

pub const DEFAULT_LOG_LEVEL: &str = "error";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Webhook {
    pub url: Url,
    pub addr: SocketAddr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// `EnvFilter` directives, e.g. `info` or `rustquizplay=debug,sqlx=warn`.
    pub log_level: String,
    pub teloxide_token: String,
    /// Quizzes are served from memory when unset.
    pub database_url: Option<String>,
    pub webhook: Option<Webhook>,
    pub play: PlaySettings,
}

impl Config {
    /// Reads the process environment, after loading `.env` if there is one.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let teloxide_token = lookup("TELOXIDE_TOKEN")
            .filter(|token| !token.is_empty())
            .ok_or(ConfigError::Missing("TELOXIDE_TOKEN"))?;

        let webhook = match (lookup("NGROK_URL"), lookup("NGROK_ADDR")) {
            (Some(url), Some(addr)) => Some(Webhook {
                url: url.parse().map_err(|e: url::ParseError| ConfigError::Invalid {
                    name: "NGROK_URL",
                    reason: e.to_string(),
                })?,
                addr: addr
                    .parse()
                    .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                        name: "NGROK_ADDR",
                        reason: e.to_string(),
                    })?,
            }),
            _ => None,
        };

        let defaults = PlaySettings::default();
        let play = PlaySettings {
            reveal_delay: millis(&lookup, "REVEAL_DELAY_MS")?.unwrap_or(defaults.reveal_delay),
            completion_delay: millis(&lookup, "COMPLETION_DELAY_MS")?
                .unwrap_or(defaults.completion_delay),
        };

        Ok(Self {
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.into()),
            teloxide_token,
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            webhook,
            play,
        })
    }
}

fn millis(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    lookup(name)
        .map(|value| {
            value
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| ConfigError::Invalid {
                    name,
                    reason: e.to_string(),
                })
        })
        .transpose()
}
