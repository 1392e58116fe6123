//! Runtime configuration
//!
//! Values come from the process environment (after `.env` is loaded by
//! `main`). Every setting has a default; malformed values fall back to it.

use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

use crate::view_state::MissingPricePolicy;

/// Registry origin used when nothing is configured
pub const DEFAULT_BASE_URL: &str = "https://irc.fda.gov.ir";

/// Search endpoint path on the registry origin
pub const DEFAULT_SEARCH_PATH: &str = "/nfi/Search";

/// Results requested per page
pub const DEFAULT_PAGE_SIZE: u32 = 12;

/// Asset cache eviction age
pub const DEFAULT_CACHE_MAX_AGE_DAYS: u64 = 30;

const ENV_BASE_URL: &str = "DRUG_SEARCH_BASE_URL";
const ENV_SEARCH_PATH: &str = "DRUG_SEARCH_ENDPOINT";
const ENV_PAGE_SIZE: &str = "DRUG_SEARCH_PAGE_SIZE";
const ENV_DATA_DIR: &str = "DRUG_SEARCH_DATA_DIR";
const ENV_GALLERY_DROP: &str = "DRUG_SEARCH_GALLERY_DROP_TRAILING";
const ENV_CACHE_MAX_AGE: &str = "DRUG_SEARCH_CACHE_MAX_AGE_DAYS";
const ENV_MISSING_PRICE: &str = "DRUG_SEARCH_MISSING_PRICE";

#[derive(Debug, Clone)]
pub struct Config {
    /// Registry origin without a trailing slash
    pub base_url: String,
    pub search_path: String,
    pub page_size: u32,
    /// Holds preferences, the log file and the asset cache
    pub data_dir: PathBuf,
    /// Drop the trailing "view all" gallery link
    pub gallery_drop_trailing: bool,
    pub cache_max_age_days: u64,
    /// Placement of unpriced records under a price sort
    pub missing_price: MissingPricePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            search_path: DEFAULT_SEARCH_PATH.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            data_dir: default_data_dir(),
            gallery_drop_trailing: true,
            cache_max_age_days: DEFAULT_CACHE_MAX_AGE_DAYS,
            missing_price: MissingPricePolicy::default(),
        }
    }
}

impl Config {
    /// Read configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let value = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let base_url = value(ENV_BASE_URL)
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or(defaults.base_url);

        let search_path = value(ENV_SEARCH_PATH)
            .map(|v| {
                if v.starts_with('/') {
                    v
                } else {
                    format!("/{}", v)
                }
            })
            .unwrap_or(defaults.search_path);

        let page_size = parse_or(value(ENV_PAGE_SIZE), ENV_PAGE_SIZE, defaults.page_size);
        let page_size = if page_size == 0 {
            warn!(key = ENV_PAGE_SIZE, "page size must be positive, using default");
            DEFAULT_PAGE_SIZE
        } else {
            page_size
        };

        let data_dir = value(ENV_DATA_DIR)
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let gallery_drop_trailing = match value(ENV_GALLERY_DROP).as_deref() {
            None => defaults.gallery_drop_trailing,
            Some(v) => parse_flag(v).unwrap_or_else(|| {
                warn!(key = ENV_GALLERY_DROP, value = v, "unrecognized flag, using default");
                defaults.gallery_drop_trailing
            }),
        };

        let cache_max_age_days = parse_or(
            value(ENV_CACHE_MAX_AGE),
            ENV_CACHE_MAX_AGE,
            defaults.cache_max_age_days,
        );

        let missing_price = match value(ENV_MISSING_PRICE).map(|v| v.to_ascii_lowercase()).as_deref() {
            None => defaults.missing_price,
            Some("zero") => MissingPricePolicy::AsZero,
            Some("last") => MissingPricePolicy::Last,
            Some(v) => {
                warn!(key = ENV_MISSING_PRICE, value = v, "expected zero or last, using default");
                defaults.missing_price
            }
        };

        Self {
            base_url,
            search_path,
            page_size,
            data_dir,
            gallery_drop_trailing,
            cache_max_age_days,
            missing_price,
        }
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.data_dir.join("preferences.json")
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("drug-search.log")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.data_dir.join("assets")
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("drug-search")
}

fn parse_or<T: FromStr + Copy>(raw: Option<String>, key: &str, default: T) -> T {
    match raw {
        None => default,
        Some(v) => v.parse().unwrap_or_else(|_| {
            warn!(key, value = %v, "malformed value, using default");
            default
        }),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
