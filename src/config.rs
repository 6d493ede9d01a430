use secrecy::SecretString;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use tracing::warn;

pub const DEFAULT_BASE_URL: &str = "https://apiv2.shiprocket.in/v1/external";
pub const DEFAULT_TRACKING_URL: &str = "https://shiprocket.co/tracking";
pub const DEFAULT_COURIER_PRIORITY: &[&str] = &["bluedart", "delhivery", "dtdc"];

const TOKEN_TTL_HOURS: RangeInclusive<u64> = 1..=8760;
const DUPLICATE_WINDOW_DAYS: RangeInclusive<i64> = 1..=365;
const DRAFT_TTL_HOURS: RangeInclusive<i64> = 1..=720;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub carrier_base_url: String,
    pub carrier_email: String,
    pub carrier_password: SecretString,
    /// Lifetime assumed for a freshly issued bearer token.
    pub token_ttl_hours: u64,
    pub products_file: PathBuf,
    pub courier_priority_file: PathBuf,
    pub courier_allow_list: Vec<String>,
    pub duplicate_window_days: i64,
    /// How long a duplicate-gated draft waits for confirmation.
    pub draft_ttl_hours: i64,
    pub channel_id: Option<String>,
    pub tracking_url_base: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            carrier_base_url: DEFAULT_BASE_URL.to_string(),
            carrier_email: String::new(),
            carrier_password: SecretString::from(String::new()),
            token_ttl_hours: 23,
            products_file: PathBuf::from("products.json"),
            courier_priority_file: PathBuf::from("courier_priority.json"),
            courier_allow_list: DEFAULT_COURIER_PRIORITY
                .iter()
                .map(|s| s.to_string())
                .collect(),
            duplicate_window_days: 7,
            draft_ttl_hours: 24,
            channel_id: None,
            tracking_url_base: DEFAULT_TRACKING_URL.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: parsed_var("PORT").unwrap_or(defaults.port),
            carrier_base_url: std::env::var("SHIPROCKET_BASE_URL")
                .unwrap_or(defaults.carrier_base_url),
            carrier_email: std::env::var("SHIPROCKET_EMAIL").unwrap_or_default(),
            carrier_password: SecretString::from(
                std::env::var("SHIPROCKET_PASSWORD").unwrap_or_default(),
            ),
            token_ttl_hours: ranged_var("TOKEN_TTL_HOURS", TOKEN_TTL_HOURS)
                .unwrap_or(defaults.token_ttl_hours),
            products_file: std::env::var("PRODUCTS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.products_file),
            courier_priority_file: std::env::var("COURIER_PRIORITY_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.courier_priority_file),
            courier_allow_list: std::env::var("COURIER_PRIORITY")
                .ok()
                .map(|raw| split_list(&raw))
                .filter(|list| !list.is_empty())
                .unwrap_or(defaults.courier_allow_list),
            duplicate_window_days: ranged_var("DUPLICATE_WINDOW_DAYS", DUPLICATE_WINDOW_DAYS)
                .unwrap_or(defaults.duplicate_window_days),
            draft_ttl_hours: ranged_var("DRAFT_TTL_HOURS", DRAFT_TTL_HOURS)
                .unwrap_or(defaults.draft_ttl_hours),
            channel_id: std::env::var("CUSTOM_CHANNEL_ID")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            tracking_url_base: std::env::var("TRACKING_URL_BASE")
                .unwrap_or(defaults.tracking_url_base),
        }
    }

    /// Token lifetime; out-of-range values use the default.
    pub fn token_ttl(&self) -> chrono::Duration {
        let hours = in_range(
            "token_ttl_hours",
            self.token_ttl_hours,
            TOKEN_TTL_HOURS,
            Self::default().token_ttl_hours,
        );
        chrono::Duration::hours(hours as i64)
    }

    pub fn duplicate_window(&self) -> chrono::Duration {
        let days = in_range(
            "duplicate_window_days",
            self.duplicate_window_days,
            DUPLICATE_WINDOW_DAYS,
            Self::default().duplicate_window_days,
        );
        chrono::Duration::days(days)
    }

    pub fn draft_ttl(&self) -> chrono::Duration {
        let hours = in_range(
            "draft_ttl_hours",
            self.draft_ttl_hours,
            DRAFT_TTL_HOURS,
            Self::default().draft_ttl_hours,
        );
        chrono::Duration::hours(hours)
    }
}

fn in_range<T>(name: &str, value: T, range: RangeInclusive<T>, default: T) -> T
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if range.contains(&value) {
        value
    } else {
        warn!(setting = name, %value, %default, "Setting out of range, using default");
        default
    }
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn ranged_var<T>(name: &str, range: RangeInclusive<T>) -> Option<T>
where
    T: std::str::FromStr + PartialOrd,
{
    parsed_var(name).filter(|v| range.contains(v))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
