//! Pipeline configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration that targets the live sources.

use fxpulse_core::domain::{normalize_code, CurrencyPair};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Root of the parquet stores.
    pub data_dir: PathBuf,
    /// Where rendered charts and exports land.
    pub assets_dir: PathBuf,
    /// Where published markdown pages land.
    pub site_dir: PathBuf,
    /// Optional directory whose `*.md` files override the built-in templates.
    pub template_dir: Option<PathBuf>,

    pub base_currency: String,
    /// Quote currencies; each becomes a `{base}{quote}` pair.
    pub currencies: Vec<String>,
    /// Subset of `currencies` drawn on the trend chart.
    pub trend_currencies: Vec<String>,

    pub initial_lookback_days: u32,
    pub max_event_days_per_run: u32,

    pub spike_z_threshold: f64,
    pub spike_top_events: usize,
    pub model_top_event_types: usize,
    /// Chronological share of rows held out for the per-currency models.
    pub test_fraction: f64,
    pub treemap_top_n: usize,

    /// Country names (as they appear in event locations) per currency.
    pub currency_countries: BTreeMap<String, Vec<String>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            assets_dir: PathBuf::from("assets"),
            site_dir: PathBuf::from("site"),
            template_dir: None,
            base_currency: "USD".into(),
            currencies: to_strings(DEFAULT_CURRENCIES),
            trend_currencies: to_strings(&["EUR", "GBP", "JPY", "INR"]),
            initial_lookback_days: 30,
            max_event_days_per_run: 31,
            spike_z_threshold: 2.0,
            spike_top_events: 3,
            model_top_event_types: 25,
            test_fraction: 0.2,
            treemap_top_n: 40,
            currency_countries: default_currency_countries(),
        }
    }
}

const DEFAULT_CURRENCIES: &[&str] = &[
    "EUR", "GBP", "JPY", "CAD", "AUD", "CHF", "CNY", "INR", "NZD", "SEK", "NOK", "DKK", "ZAR",
    "BRL", "MXN", "SGD", "HKD", "KRW", "TRY", "THB", "TWD", "RUB",
];

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_currency_countries() -> BTreeMap<String, Vec<String>> {
    let table: &[(&str, &[&str])] = &[
        (
            "EUR",
            &[
                "Austria", "Belgium", "Cyprus", "Estonia", "Finland", "France", "Germany",
                "Greece", "Ireland", "Italy", "Latvia", "Lithuania", "Luxembourg", "Malta",
                "Netherlands", "Portugal", "Slovakia", "Slovenia", "Spain",
            ],
        ),
        (
            "GBP",
            &["United Kingdom", "England", "Scotland", "Wales", "Northern Ireland", "UK"],
        ),
        ("JPY", &["Japan"]),
        ("CAD", &["Canada"]),
        ("AUD", &["Australia"]),
        ("CHF", &["Switzerland"]),
        ("CNY", &["China", "People's Republic of China"]),
        ("INR", &["India"]),
        ("NZD", &["New Zealand"]),
        ("SEK", &["Sweden"]),
        ("NOK", &["Norway"]),
        ("DKK", &["Denmark"]),
        ("ZAR", &["South Africa", "RSA"]),
        ("BRL", &["Brazil"]),
        ("MXN", &["Mexico"]),
        ("SGD", &["Singapore"]),
        ("HKD", &["Hong Kong"]),
        (
            "KRW",
            &["South Korea", "Korea, South", "Republic of Korea", "Korea"],
        ),
        ("TRY", &["Turkey", "Türkiye"]),
        ("THB", &["Thailand"]),
        ("TWD", &["Taiwan", "Chinese Taipei"]),
        ("RUB", &["Russia", "Russian Federation"]),
    ];
    table
        .iter()
        .map(|(cur, countries)| (cur.to_string(), to_strings(countries)))
        .collect()
}

impl PipelineConfig {
    /// Load and validate a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        normalize_code(&self.base_currency)
            .map_err(|e| ConfigError::Invalid(format!("base_currency: {e}")))?;
        if self.currencies.is_empty() {
            return invalid("currencies must not be empty".into());
        }
        for code in &self.currencies {
            normalize_code(code).map_err(|e| ConfigError::Invalid(format!("currencies: {e}")))?;
            if code.eq_ignore_ascii_case(&self.base_currency) {
                return invalid(format!("currency {code} is the base currency"));
            }
        }
        for code in &self.trend_currencies {
            if !self.currencies.iter().any(|c| c.eq_ignore_ascii_case(code)) {
                return invalid(format!("trend currency {code} is not in currencies"));
            }
        }
        for code in self.currency_countries.keys() {
            normalize_code(code)
                .map_err(|e| ConfigError::Invalid(format!("currency_countries: {e}")))?;
        }
        if self.initial_lookback_days == 0 {
            return invalid("initial_lookback_days must be > 0".into());
        }
        if self.max_event_days_per_run == 0 {
            return invalid("max_event_days_per_run must be > 0".into());
        }
        if self.spike_z_threshold.is_nan() || self.spike_z_threshold <= 0.0 {
            return invalid(format!(
                "spike_z_threshold must be > 0, got {}",
                self.spike_z_threshold
            ));
        }
        if self.spike_top_events == 0 || self.model_top_event_types == 0 || self.treemap_top_n == 0
        {
            return invalid(
                "spike_top_events, model_top_event_types and treemap_top_n must be > 0".into(),
            );
        }
        if self.test_fraction.is_nan() || self.test_fraction <= 0.0 || self.test_fraction >= 1.0 {
            return invalid(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            ));
        }
        Ok(())
    }

    /// One pair per configured quote currency, in config order.
    pub fn pairs(&self) -> Result<Vec<CurrencyPair>, ConfigError> {
        self.currencies
            .iter()
            .map(|quote| {
                CurrencyPair::new(&self.base_currency, quote)
                    .map_err(|e| ConfigError::Invalid(e.to_string()))
            })
            .collect()
    }

    /// `currency_countries` keyed by normalized ISO code.
    ///
    /// Keys differing only in case are merged. Invalid keys are rejected by
    /// `validate`, and skipped here.
    pub fn countries_by_currency(&self) -> BTreeMap<String, Vec<String>> {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (code, countries) in &self.currency_countries {
            let Ok(code) = normalize_code(code) else {
                continue;
            };
            let entry = map.entry(code).or_default();
            for country in countries {
                if !entry.contains(country) {
                    entry.push(country.clone());
                }
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.currencies.len(), 22);
        assert_eq!(config.pairs().unwrap()[0].to_string(), "USDEUR");
        assert_eq!(config.countries_by_currency()["INR"], ["India".to_string()]);
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config = PipelineConfig::from_toml(
            r#"
            data_dir = "/var/fxpulse/data"
            currencies = ["EUR", "JPY"]
            trend_currencies = ["JPY"]
            spike_z_threshold = 2.5
            "#,
        )
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/fxpulse/data"));
        assert_eq!(config.currencies, vec!["EUR", "JPY"]);
        assert_eq!(config.spike_z_threshold, 2.5);
        assert_eq!(config.test_fraction, 0.2);
    }

    #[test]
    fn rejects_trend_currency_outside_list() {
        let err = PipelineConfig::from_toml(
            r#"
            currencies = ["EUR"]
            trend_currencies = ["GBP"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_bad_values() {
        for toml in [
            "currencies = []",
            r#"currencies = ["EURO"]"#,
            "test_fraction = 1.0",
            "test_fraction = 0.0",
            "spike_z_threshold = -1.0",
            r#"base_currency = "US""#,
        ] {
            assert!(
                PipelineConfig::from_toml(toml).is_err(),
                "accepted invalid config: {toml}"
            );
        }
    }

    #[test]
    fn country_map_keys_are_case_insensitive() {
        let config = PipelineConfig::from_toml(
            r#"
            [currency_countries]
            inr = ["India"]
            Jpy = ["Japan"]
            "#,
        )
        .unwrap();
        let map = config.countries_by_currency();
        assert_eq!(map["INR"], ["India".to_string()]);
        assert_eq!(map["JPY"], ["Japan".to_string()]);

        assert!(PipelineConfig::from_toml("[currency_countries]\neuro = [\"France\"]").is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            PipelineConfig::from_toml("lookback = 5"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = PipelineConfig::from_file(Path::new("/nonexistent/pipeline.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
