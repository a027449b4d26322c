//! Runtime settings from the environment (after `.env` is loaded).

use crate::error::SynthesisError;
use crate::store::DEFAULT_PG_SCHEMA;
use crate::synth::{PagingOptions, SynthesisOptions, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    /// Model manifest (JSON).
    pub model_path: PathBuf,
    /// PostgreSQL connection string; `None` serves from the in-process store.
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub request_timeout_secs: u64,
    /// Schema that holds entity tables.
    pub api_schema: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            model_path: PathBuf::from("demos/model.json"),
            database_url: None,
            bind_addr: "0.0.0.0:3000".into(),
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            request_timeout_secs: 30,
            api_schema: DEFAULT_PG_SCHEMA.into(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, SynthesisError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Same as [`Settings::from_env`] with an injectable source.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, SynthesisError> {
        let d = Settings::default();
        let s = Settings {
            model_path: get("MODEL_PATH").map(PathBuf::from).unwrap_or(d.model_path),
            database_url: get("DATABASE_URL").filter(|u| !u.trim().is_empty()),
            bind_addr: get("BIND_ADDR").unwrap_or(d.bind_addr),
            default_page_size: parsed(&get, "DEFAULT_PAGE_SIZE")?.unwrap_or(d.default_page_size),
            max_page_size: parsed(&get, "MAX_PAGE_SIZE")?.unwrap_or(d.max_page_size),
            request_timeout_secs: parsed(&get, "REQUEST_TIMEOUT_SECS")?.unwrap_or(d.request_timeout_secs),
            api_schema: get("API_SCHEMA").unwrap_or(d.api_schema),
        };
        if s.default_page_size == 0 || s.default_page_size > s.max_page_size {
            return Err(SynthesisError::Settings(format!(
                "DEFAULT_PAGE_SIZE must be between 1 and MAX_PAGE_SIZE ({})",
                s.max_page_size
            )));
        }
        Ok(s)
    }

    pub fn synthesis_options(&self) -> SynthesisOptions {
        SynthesisOptions {
            paging: PagingOptions {
                default_page_size: self.default_page_size,
                max_page_size: self.max_page_size,
                include_total_count: true,
            },
        }
    }
}

fn parsed<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, SynthesisError> {
    get(key)
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|_| SynthesisError::Settings(format!("{} is not a valid number: {}", key, v)))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let s = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.synthesis_options().paging, PagingOptions::default());
    }

    #[test]
    fn overrides_and_rejects_bad_numbers() {
        let s = Settings::from_lookup(lookup(&[("DEFAULT_PAGE_SIZE", "25"), ("DATABASE_URL", "postgres://x")])).unwrap();
        assert_eq!(s.default_page_size, 25);
        assert_eq!(s.database_url.as_deref(), Some("postgres://x"));
        assert!(Settings::from_lookup(lookup(&[("MAX_PAGE_SIZE", "lots")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("DEFAULT_PAGE_SIZE", "5000")])).is_err());
    }
}
