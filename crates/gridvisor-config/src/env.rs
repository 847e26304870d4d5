//! Validation of the `KEY=value` environment file shared by every service.
//!
//! The file is parsed once; the resulting [`Environment`] is handed to each
//! launch explicitly instead of being exported into the supervisor's own
//! process environment.

use std::{collections::BTreeMap, fmt, path::Path, str::FromStr};

use crate::ConfigError;

pub const API_KEY: &str = "BINANCE_API_KEY";
pub const API_KEY_ALIAS: &str = "BINANCE_TRADE_KEY";
pub const API_SECRET: &str = "BINANCE_API_SECRET";
pub const API_SECRET_ALIAS: &str = "BINANCE_TRADE_SECRET";
pub const REGION: &str = "BINANCE_REGION";
pub const PAIR: &str = "PAIR";

const DECIMAL_KEYS: &[&str] = &[
    "GRID_LOW",
    "GRID_HIGH",
    "STEP_PCT",
    "BASE_ORDER_USD",
    "MAX_CYCLE_USD",
    "FEE_BUFFER",
];
const INTEGER_KEYS: &[&str] = &["POLL_SECONDS", "BINANCE_RECVWINDOW"];
const SENSITIVE_MARKERS: &[&str] = &["KEY", "SECRET", "TOKEN"];

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Region {
    Com,
    Us,
}

impl Region {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Region::Com => "com",
            Region::Us => "us",
        }
    }
}

impl FromStr for Region {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "com" => Ok(Region::Com),
            "us" => Ok(Region::Us),
            _ => Err(ConfigError::InvalidValue {
                key: REGION.to_owned(),
                value: s.to_owned(),
                expected: "one of `com`, `us`".to_owned(),
            }),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated, immutable key/value configuration for the child services.
#[derive(Clone, PartialEq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
    region: Region,
    pair: String,
}

impl Environment {
    /// Parse and validate an env file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file is missing, cannot be parsed, lacks a
    /// required key or carries an invalid value.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::MissingFile(path.to_path_buf()));
        }

        let vars = dotenvy::from_path_iter(path)?
            .collect::<Result<BTreeMap<String, String>, _>>()?;
        Self::from_vars(vars)
    }

    /// Validate an already parsed key/value map.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` for the first missing key or invalid value.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut vars: BTreeMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        require_any(&vars, &[API_KEY, API_KEY_ALIAS])?;
        require_any(&vars, &[API_SECRET, API_SECRET_ALIAS])?;
        let region: Region = require_any(&vars, &[REGION])?.parse()?;
        let pair = require_any(&vars, &[PAIR])?.trim().to_owned();
        if !pair.contains('/') {
            return Err(ConfigError::InvalidValue {
                key: PAIR.to_owned(),
                value: pair,
                expected: "a `BASE/QUOTE` pair such as `DOGE/USDT`".to_owned(),
            });
        }

        check_optional(&vars)?;

        vars.insert(REGION.to_owned(), region.as_str().to_owned());
        vars.insert(PAIR.to_owned(), pair.clone());

        Ok(Self { vars, region, pair })
    }

    #[must_use]
    pub fn region(&self) -> Region {
        self.region
    }

    #[must_use]
    pub fn pair(&self) -> &str {
        &self.pair
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Variables to pass to a child process.
    pub fn vars(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted: BTreeMap<&str, &str> = self
            .vars
            .iter()
            .map(|(k, v)| {
                let sensitive = SENSITIVE_MARKERS.iter().any(|m| k.contains(m));
                (k.as_str(), if sensitive { "<redacted>" } else { v.as_str() })
            })
            .collect();
        f.debug_struct("Environment")
            .field("region", &self.region)
            .field("pair", &self.pair)
            .field("vars", &redacted)
            .finish()
    }
}

fn non_empty<'a>(vars: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    vars.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

/// First non-empty value among `keys`; the error names the canonical key.
fn require_any<'a>(
    vars: &'a BTreeMap<String, String>,
    keys: &[&str],
) -> Result<&'a str, ConfigError> {
    keys.iter()
        .find_map(|key| non_empty(vars, key))
        .ok_or_else(|| ConfigError::MissingKey(keys[0].to_owned()))
}

fn invalid(key: &str, value: &str, expected: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_owned(),
        value: value.to_owned(),
        expected: expected.to_owned(),
    }
}

fn check_optional(vars: &BTreeMap<String, String>) -> Result<(), ConfigError> {
    for key in DECIMAL_KEYS {
        if let Some(value) = non_empty(vars, key) {
            match value.parse::<f64>() {
                Ok(v) if v.is_finite() && v >= 0.0 => {}
                _ => return Err(invalid(key, value, "a non-negative decimal number")),
            }
        }
    }

    for key in INTEGER_KEYS {
        if let Some(value) = non_empty(vars, key) {
            match value.parse::<u64>() {
                Ok(v) if v > 0 => {}
                _ => return Err(invalid(key, value, "a positive integer")),
            }
        }
    }

    if let Some(mode) = non_empty(vars, "MODE") {
        if !matches!(mode.to_ascii_uppercase().as_str(), "LIVE" | "PAPER") {
            return Err(invalid("MODE", mode, "one of `LIVE`, `PAPER`"));
        }
    }

    if let (Some(low), Some(high)) = (non_empty(vars, "GRID_LOW"), non_empty(vars, "GRID_HIGH"))
    {
        let (l, h) = (low.parse::<f64>(), high.parse::<f64>());
        if let (Ok(l), Ok(h)) = (l, h) {
            if l >= h {
                return Err(invalid("GRID_LOW", low, "a value below `GRID_HIGH`"));
            }
        }
    }

    match (
        non_empty(vars, "TELEGRAM_BOT_TOKEN"),
        non_empty(vars, "TELEGRAM_CHAT_ID"),
    ) {
        (Some(_), None) => Err(ConfigError::MissingKey("TELEGRAM_CHAT_ID".to_owned())),
        (None, Some(_)) => Err(ConfigError::MissingKey("TELEGRAM_BOT_TOKEN".to_owned())),
        _ => Ok(()),
    }
}
