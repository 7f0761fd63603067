//! Per-characteristic status cache.

use serde::de::{self, Deserializer};
use serde::Deserialize;
use std::time::{Duration, Instant};

use crate::characteristic::Value;

/// How long a fetched status stays valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheTtl {
    /// Always query the device.
    #[default]
    Disabled,
    For(Duration),
    Infinite,
}

impl CacheTtl {
    pub fn from_millis(millis: i64) -> Self {
        match millis {
            0 => CacheTtl::Disabled,
            m if m < 0 => CacheTtl::Infinite,
            m => CacheTtl::For(Duration::from_millis(m as u64)),
        }
    }
}

impl<'de> Deserialize<'de> for CacheTtl {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Millis(i64),
            Keyword(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Millis(millis) => Ok(CacheTtl::from_millis(millis)),
            Raw::Keyword(keyword) if keyword.eq_ignore_ascii_case("infinite") => {
                Ok(CacheTtl::Infinite)
            }
            Raw::Keyword(other) => Err(de::Error::custom(format!(
                "statusCache must be milliseconds or \"infinite\", got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    value: Value,
    stored_at: Instant,
}

#[derive(Debug, Clone, Default)]
pub struct StatusCache {
    ttl: CacheTtl,
    entry: Option<CacheEntry>,
}

impl StatusCache {
    pub fn new(ttl: CacheTtl) -> Self {
        Self { ttl, entry: None }
    }

    pub fn ttl(&self) -> CacheTtl {
        self.ttl
    }

    /// Returns the cached value if it may be served without querying the device.
    pub fn fresh(&self, now: Instant) -> Option<Value> {
        let entry = self.entry?;
        match self.ttl {
            CacheTtl::Disabled => None,
            CacheTtl::Infinite => Some(entry.value),
            CacheTtl::For(ttl) => {
                (now.saturating_duration_since(entry.stored_at) < ttl).then_some(entry.value)
            }
        }
    }

    pub fn store(&mut self, value: Value, now: Instant) {
        if self.ttl == CacheTtl::Disabled {
            return;
        }
        self.entry = Some(CacheEntry {
            value,
            stored_at: now,
        });
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_cache_never_serves() {
        let now = Instant::now();
        let mut cache = StatusCache::new(CacheTtl::Disabled);
        cache.store(Value::Int(10), now);
        assert_eq!(cache.fresh(now), None);
    }

    #[test]
    fn timed_cache_expires() {
        let now = Instant::now();
        let mut cache = StatusCache::new(CacheTtl::For(Duration::from_millis(500)));
        assert_eq!(cache.fresh(now), None);
        cache.store(Value::Int(10), now);
        assert_eq!(cache.fresh(now + Duration::from_millis(499)), Some(Value::Int(10)));
        assert_eq!(cache.fresh(now + Duration::from_millis(500)), None);
    }

    #[test]
    fn infinite_cache_keeps_value() {
        let now = Instant::now();
        let mut cache = StatusCache::new(CacheTtl::Infinite);
        cache.store(Value::Bool(true), now);
        assert_eq!(
            cache.fresh(now + Duration::from_secs(86_400)),
            Some(Value::Bool(true))
        );
        cache.invalidate();
        assert_eq!(cache.fresh(now), None);
    }

    #[test]
    fn ttl_deserializes_from_millis_and_keyword() {
        let ttl: CacheTtl = serde_json::from_str("0").unwrap();
        assert_eq!(ttl, CacheTtl::Disabled);
        let ttl: CacheTtl = serde_json::from_str("1500").unwrap();
        assert_eq!(ttl, CacheTtl::For(Duration::from_millis(1500)));
        let ttl: CacheTtl = serde_json::from_str("-1").unwrap();
        assert_eq!(ttl, CacheTtl::Infinite);
        let ttl: CacheTtl = serde_json::from_str("\"Infinite\"").unwrap();
        assert_eq!(ttl, CacheTtl::Infinite);
        assert!(serde_json::from_str::<CacheTtl>("\"forever\"").is_err());
    }
}
