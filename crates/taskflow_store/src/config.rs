//! Cache configuration

use std::time::Duration;

use taskflow_core::Resource;

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub tasks_ttl: Duration,
    pub actions_ttl: Duration,
    pub dependencies_ttl: Duration,
    /// Entry count that triggers eviction
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            tasks_ttl: DEFAULT_TTL,
            actions_ttl: DEFAULT_TTL,
            dependencies_ttl: DEFAULT_TTL,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

fn env_secs(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same TTL for every resource.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.tasks_ttl = ttl;
        self.actions_ttl = ttl;
        self.dependencies_ttl = ttl;
        self
    }

    pub fn with_resource_ttl(mut self, resource: Resource, ttl: Duration) -> Self {
        match resource {
            Resource::Tasks => self.tasks_ttl = ttl,
            Resource::Actions => self.actions_ttl = ttl,
            Resource::Dependencies => self.dependencies_ttl = ttl,
        }
        self
    }

    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max.max(1);
        self
    }

    pub fn ttl_for(&self, resource: Resource) -> Duration {
        match resource {
            Resource::Tasks => self.tasks_ttl,
            Resource::Actions => self.actions_ttl,
            Resource::Dependencies => self.dependencies_ttl,
        }
    }

    /// Load configuration from environment variables
    ///
    /// Reads `TASKFLOW_CACHE_TTL_SECS`, then `TASKFLOW_CACHE_TTL_<RESOURCE>_SECS`
    /// (`TASKS`, `ACTIONS`, `DEPENDENCIES`) and `TASKFLOW_CACHE_MAX_ENTRIES`.
    /// Unparsable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(ttl) = env_secs("TASKFLOW_CACHE_TTL_SECS") {
            config = config.with_ttl(ttl);
        }

        for resource in Resource::ALL {
            let name = format!(
                "TASKFLOW_CACHE_TTL_{}_SECS",
                resource.as_str().to_uppercase()
            );
            if let Some(ttl) = env_secs(&name) {
                config = config.with_resource_ttl(resource, ttl);
            }
        }

        if let Ok(max) = std::env::var("TASKFLOW_CACHE_MAX_ENTRIES") {
            if let Ok(val) = max.trim().parse::<usize>() {
                config = config.with_max_entries(val);
            }
        }

        config
    }
}
