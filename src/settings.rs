use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::source::RetryPolicy;
use crate::storage::Database;

pub const ENV_DB: &str = "HRKPI_DB";
pub const ENV_COMPANY_ID: &str = "HRKPI_COMPANY_ID";
pub const ENV_RETRY_ATTEMPTS: &str = "HRKPI_RETRY_ATTEMPTS";
pub const ENV_RETRY_BASE_MS: &str = "HRKPI_RETRY_BASE_MS";

/// `app_config` key holding the stored default company.
pub const CONFIG_DEFAULT_COMPANY: &str = "default_company_id";

/// Runtime settings, read from `HRKPI_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// `None` means the default `~/.hrkpi/hrkpi.db`.
    pub db_path: Option<PathBuf>,
    /// From `HRKPI_COMPANY_ID`. Ranks below `--company` and the stored
    /// `default_company_id` key; see `Hrkpi::resolve_company`.
    pub default_company_id: Option<i64>,
    pub retry: RetryPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: None,
            default_company_id: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup. Unset or empty keys keep
    /// their defaults; malformed values are a `Config` error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut settings = Self::default();

        if let Some(path) = get(ENV_DB) {
            settings.db_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = get(ENV_COMPANY_ID) {
            settings.default_company_id = Some(parse_company_id(ENV_COMPANY_ID, &raw)?);
        }
        if let Some(raw) = get(ENV_RETRY_ATTEMPTS) {
            settings.retry.max_attempts = parse::<u32>(ENV_RETRY_ATTEMPTS, &raw)?.max(1);
        }
        if let Some(raw) = get(ENV_RETRY_BASE_MS) {
            settings.retry.base_delay = Duration::from_millis(parse(ENV_RETRY_BASE_MS, &raw)?);
        }
        Ok(settings)
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.db_path {
            Some(p) => Ok(p.clone()),
            None => Database::default_path(),
        }
    }
}

/// A positive company id, or a `Config` error naming `key`.
pub(crate) fn parse_company_id(key: &str, raw: &str) -> Result<i64> {
    let id: i64 = parse(key, raw)?;
    if id <= 0 {
        return Err(Error::Config(format!("{key} must be positive, got {id}")));
    }
    Ok(id)
}

fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| Error::Config(format!("invalid {key} '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_defaults() {
        let s = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.default_company_id, None);
        assert_eq!(s.retry.max_attempts, 3);
        assert_eq!(s.retry.base_delay, Duration::from_millis(200));
    }

    #[test]
    fn test_overrides() {
        let s = Settings::from_lookup(lookup(&[
            (ENV_DB, "/tmp/kpi.db"),
            (ENV_COMPANY_ID, "42"),
            (ENV_RETRY_ATTEMPTS, "0"),
            (ENV_RETRY_BASE_MS, "50"),
        ]))
        .unwrap();
        assert_eq!(s.db_path().unwrap(), PathBuf::from("/tmp/kpi.db"));
        assert_eq!(s.default_company_id, Some(42));
        assert_eq!(s.retry.max_attempts, 1);
        assert_eq!(s.retry.base_delay, Duration::from_millis(50));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Settings::from_lookup(lookup(&[(ENV_COMPANY_ID, "abc")])),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Settings::from_lookup(lookup(&[(ENV_COMPANY_ID, "-1")])),
            Err(Error::Config(_))
        ));
        let s = Settings::from_lookup(lookup(&[(ENV_DB, "  ")])).unwrap();
        assert_eq!(s.db_path, None);
    }
}
