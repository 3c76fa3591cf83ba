//! Serialized values on top of [`TtlCache`].
//!
//! Handlers that cache heterogeneous payloads in one store keep them as JSON
//! strings. A value that fails to serialize or deserialize is never an error
//! for the caller: the write is skipped or the read is reported as a miss.

use crate::cache::TtlCache;
use crate::error::{CacheError, CacheResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::warn;

/// A cache holding JSON-encoded values.
pub type JsonCache = TtlCache<String>;

impl TtlCache<String> {
    /// Serialize `value` and store it under `key`.
    ///
    /// Serialization failures are logged and leave the cache untouched.
    pub fn set_json<T>(&self, key: impl Into<String>, value: &T)
    where
        T: Serialize + ?Sized,
    {
        let key = key.into();
        match encode(value) {
            Ok(encoded) => self.set(key, encoded),
            Err(e) => warn!(key = %key, error = %e, "Skipping cache write"),
        }
    }

    /// Return the decoded value for `key` if it is present and younger than `ttl`.
    ///
    /// An entry that no longer decodes as `T` is treated as a miss.
    pub fn get_json<T>(&self, key: &str, ttl: Duration) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let encoded = self.get_fresh(key, ttl)?;
        match decode(&encoded) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "Treating undecodable cache entry as a miss");
                None
            }
        }
    }
}

fn encode<T>(value: &T) -> CacheResult<String>
where
    T: Serialize + ?Sized,
{
    serde_json::to_string(value).map_err(CacheError::Serialization)
}

fn decode<T>(encoded: &str) -> CacheResult<T>
where
    T: DeserializeOwned,
{
    serde_json::from_str(encoded).map_err(CacheError::Deserialization)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serializer};
    use std::collections::HashMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct FileSummary {
        id: String,
        size: u64,
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("refused"))
        }
    }

    #[test]
    fn test_json_roundtrip() {
        let cache = JsonCache::new();
        let summary = FileSummary {
            id: "f1".to_string(),
            size: 2048,
        };

        cache.set_json("files:f1", &summary);
        let loaded: Option<FileSummary> = cache.get_json("files:f1", Duration::from_secs(60));
        assert_eq!(loaded, Some(summary));
    }

    #[test]
    fn test_serialization_failure_skips_write() {
        let cache = JsonCache::new();
        cache.set_json("bad", &Unserializable);
        assert!(cache.get("bad").is_none());
    }

    #[test]
    fn test_serialization_failure_keeps_previous_value() {
        let cache = JsonCache::new();
        cache.set_json("key", &1_u32);
        cache.set_json("key", &Unserializable);

        let value: Option<u32> = cache.get_json("key", Duration::from_secs(60));
        assert_eq!(value, Some(1));
    }

    #[test]
    fn test_type_mismatch_is_a_miss() {
        let cache = JsonCache::new();
        cache.set_json("alerts", &vec!["a", "b"]);

        let value: Option<HashMap<String, u32>> = cache.get_json("alerts", Duration::from_secs(60));
        assert!(value.is_none());
        // The entry itself stays in place
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_error_variants() {
        let err = decode::<u32>("not json").unwrap_err();
        assert!(matches!(err, CacheError::Deserialization(_)));

        let err = encode(&Unserializable).unwrap_err();
        assert!(matches!(err, CacheError::Serialization(_)));
    }
}
