//! Controller configuration

use std::time::Duration;

use chrono::NaiveDate;
use taskflow_store::CacheConfig;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);
pub const DEFAULT_EVENT_CAPACITY: usize = 64;
pub const DEFAULT_FETCH_RETRIES: u32 = 3;
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Window over which reconciliation triggers are coalesced into one fetch
    pub debounce: Duration,
    /// Buffer of the controller's event channel
    pub event_capacity: usize,
    pub cache: CacheConfig,
    /// Extra attempts for a failed reconciliation fetch before giving up
    pub fetch_retries: u32,
    /// Day used for default date ranges and overdue checks. `None` means the local date.
    pub reference_day: Option<NaiveDate>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            cache: CacheConfig::default(),
            fetch_retries: DEFAULT_FETCH_RETRIES,
            reference_day: None,
        }
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_fetch_retries(mut self, retries: u32) -> Self {
        self.fetch_retries = retries;
        self
    }

    /// Wait before retry number `attempt` (1-based): the debounce window,
    /// doubled per attempt, capped at [`MAX_RETRY_DELAY`].
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(16);
        self.debounce.saturating_mul(factor).min(MAX_RETRY_DELAY)
    }

    pub fn with_reference_day(mut self, day: NaiveDate) -> Self {
        self.reference_day = Some(day);
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.reference_day
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    /// Load configuration from environment variables
    ///
    /// Reads `TASKFLOW_DEBOUNCE_MS`, `TASKFLOW_EVENT_CAPACITY`, `TASKFLOW_FETCH_RETRIES` and the cache variables
    /// understood by [`CacheConfig::from_env`].
    pub fn from_env() -> Self {
        let mut config = Self::new().with_cache(CacheConfig::from_env());

        if let Ok(ms) = std::env::var("TASKFLOW_DEBOUNCE_MS") {
            if let Ok(val) = ms.trim().parse::<u64>() {
                config.debounce = Duration::from_millis(val);
            }
        }

        if let Ok(capacity) = std::env::var("TASKFLOW_EVENT_CAPACITY") {
            if let Ok(val) = capacity.trim().parse::<usize>() {
                config = config.with_event_capacity(val);
            }
        }

        if let Ok(retries) = std::env::var("TASKFLOW_FETCH_RETRIES") {
            if let Ok(val) = retries.trim().parse::<u32>() {
                config.fetch_retries = val;
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::new();
        assert_eq!(config.debounce, Duration::from_millis(300));
        assert_eq!(config.event_capacity, 64);
        assert_eq!(config.fetch_retries, 3);
        assert!(config.reference_day.is_none());
    }

    #[test]
    fn test_retry_delay_doubles_up_to_cap() {
        let config = SyncConfig::new().with_debounce(Duration::from_millis(100));
        assert_eq!(config.retry_delay(1), Duration::from_millis(200));
        assert_eq!(config.retry_delay(2), Duration::from_millis(400));
        assert_eq!(config.retry_delay(10), MAX_RETRY_DELAY);
        assert_eq!(config.retry_delay(u32::MAX), MAX_RETRY_DELAY);
    }

    #[test]
    fn test_builder() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let config = SyncConfig::new()
            .with_debounce(Duration::from_millis(20))
            .with_event_capacity(0)
            .with_reference_day(day);
        assert_eq!(config.debounce, Duration::from_millis(20));
        assert_eq!(config.event_capacity, 1);
        assert_eq!(config.today(), day);
    }
}
