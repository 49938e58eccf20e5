//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

use crate::crm::types::EntityKind;

/// Trait for entities that can be cached.
///
/// Implementors expose the opaque record id used as the map key and the
/// entity kind that names the cache segment the record lives in.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned {
  /// Opaque record identifier, unique within the entity kind
  fn id(&self) -> &str;

  /// Last modification timestamp
  fn updated_at(&self) -> DateTime<Utc>;

  /// Which cache segment this record belongs to
  fn kind() -> EntityKind;
}

/// Result of a read, including where the data came from.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the segment was last bulk-refreshed (if served from cache)
  pub refreshed_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Fresh data straight from the backend.
  pub fn from_backend(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Backend,
      refreshed_at: None,
    }
  }

  /// Data served from the in-memory cache without a backend call.
  pub fn from_cache(data: T, refreshed_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
      refreshed_at: Some(refreshed_at),
    }
  }

  pub fn is_from_cache(&self) -> bool {
    self.source == CacheSource::Cache
  }
}

/// Indicates where read data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// The backend was called and the segment rewritten
  Backend,
  /// Served from the in-memory map inside the freshness window
  Cache,
}
