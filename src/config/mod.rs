use dotenv::dotenv;
use std::env;
use std::str::FromStr;

const DEFAULT_AI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_AI_MODEL: &str = "gpt-4o";

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub open_ai_key: Option<String>,
    pub ai_api_url: String,
    pub ai_model: String,
    pub query_backend_url: Option<String>,
    pub backend_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 8080,
            open_ai_key: None,
            ai_api_url: DEFAULT_AI_API_URL.to_string(),
            ai_model: DEFAULT_AI_MODEL.to_string(),
            query_backend_url: None,
            backend_timeout_secs: 60,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();
        let defaults = Self::default();

        Self {
            server_port: parse_or("SERVER_PORT", defaults.server_port),
            open_ai_key: non_empty("OPENAI_API_KEY"),
            ai_api_url: non_empty("AI_API_URL").unwrap_or(defaults.ai_api_url),
            ai_model: non_empty("AI_MODEL").unwrap_or(defaults.ai_model),
            query_backend_url: non_empty("QUERY_BACKEND_URL"),
            backend_timeout_secs: parse_or("AI_TIMEOUT_SECS", defaults.backend_timeout_secs),
        }
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T: FromStr + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("{} has invalid value '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        env::set_var("SQLCHAT_TEST_PORT", "not-a-port");
        assert_eq!(parse_or("SQLCHAT_TEST_PORT", 8080u16), 8080);
        env::set_var("SQLCHAT_TEST_PORT", " 9000 ");
        assert_eq!(parse_or("SQLCHAT_TEST_PORT", 8080u16), 9000);
        assert_eq!(parse_or("SQLCHAT_TEST_UNSET_KEY", 5u64), 5);
    }

    #[test]
    fn blank_values_count_as_unset() {
        env::set_var("SQLCHAT_TEST_BLANK", "   ");
        assert_eq!(non_empty("SQLCHAT_TEST_BLANK"), None);
    }
}
