//! Filtering, sorting, and async query state for list reads.
//!
//! Filters are a closed set of predicate kinds evaluated conjunctively by a
//! small interpreter over the [`Queryable`] trait, so adding a predicate
//! kind is a compile-checked change rather than a stringly-typed one.
//!
//! `Query<T>` is the consumer-facing piece: it encapsulates async data
//! fetching, loading states, and error handling, and refetches when the
//! entity kind it watches is invalidated.
//!
//! # Example
//!
//! ```ignore
//! let client = client.clone();
//! let mut query = Query::new(move || {
//!     let client = client.clone();
//!     async move {
//!         client
//!             .list_leads(&ListQuery::default())
//!             .await
//!             .map(|r| r.data)
//!             .map_err(|e| e.to_string())
//!     }
//! })
//! .for_kind(EntityKind::Leads);
//!
//! query.fetch();
//!
//! // In the event loop tick
//! if query.poll() {
//!     // State changed, re-render
//! }
//! ```

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::crm::types::EntityKind;
use crate::event::StoreEvent;

/// Exact-match filterable fields across entity kinds.
///
/// Not every kind carries every field; filtering on a field the kind lacks
/// fails the predicate for every record of that kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
  Status,
  Source,
  Stage,
  Kind,
  AssignedTo,
  AccountId,
  OpportunityId,
}

/// One filter predicate. A query's filters combine with AND.
#[derive(Debug, Clone)]
pub enum Filter {
  /// Case-insensitive substring match over the record's text fields
  Search(String),
  /// Exact match against a categorical or reference field
  Exact { field: Field, value: String },
  /// Inclusive range over `created_at`; open ends match everything
  CreatedBetween {
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
  },
}

/// Sortable keys across entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
  Name,
  CreatedAt,
  UpdatedAt,
  Value,
  Score,
  Probability,
  Total,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
  #[default]
  Ascending,
  Descending,
}

#[derive(Debug, Clone, Copy)]
pub struct SortSpec {
  pub key: SortKey,
  pub direction: SortDirection,
}

/// Filter set plus optional sort for a list read.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
  pub filters: Vec<Filter>,
  pub sort: Option<SortSpec>,
}

impl ListQuery {
  pub fn with_filter(mut self, filter: Filter) -> Self {
    self.filters.push(filter);
    self
  }

  pub fn with_sort(mut self, key: SortKey, direction: SortDirection) -> Self {
    self.sort = Some(SortSpec { key, direction });
    self
  }
}

/// A sort key's value for one record.
#[derive(Debug, Clone, Copy)]
pub enum SortValue<'a> {
  Text(&'a str),
  Number(f64),
  Time(DateTime<Utc>),
}

impl SortValue<'_> {
  fn compare(&self, other: &Self) -> Ordering {
    match (self, other) {
      (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
      (SortValue::Number(a), SortValue::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
      (SortValue::Time(a), SortValue::Time(b)) => a.cmp(b),
      // Mismatched kinds only occur across entity types; treat as equal
      _ => Ordering::Equal,
    }
  }
}

/// Trait records implement to be filterable and sortable.
pub trait Queryable {
  /// Text fields the free-text search runs over
  fn haystack(&self) -> Vec<&str>;

  /// Value of an exact-match field, or `None` if this kind lacks it
  fn field(&self, field: Field) -> Option<&str>;

  fn created_at(&self) -> DateTime<Utc>;

  /// Value of a sort key, or `None` if this kind lacks it
  fn sort_value(&self, key: SortKey) -> Option<SortValue<'_>>;
}

/// Apply a query to a list: AND all filters, then sort (stable).
pub fn apply<T: Queryable>(mut items: Vec<T>, query: &ListQuery) -> Vec<T> {
  items.retain(|item| query.filters.iter().all(|f| matches(item, f)));

  if let Some(sort) = query.sort {
    items.sort_by(|a, b| compare(a, b, sort));
  }

  items
}

fn matches<T: Queryable>(item: &T, filter: &Filter) -> bool {
  match filter {
    Filter::Search(needle) => {
      let needle = needle.to_lowercase();
      item
        .haystack()
        .iter()
        .any(|text| text.to_lowercase().contains(&needle))
    }
    Filter::Exact { field, value } => item.field(*field).map_or(false, |v| v == value),
    Filter::CreatedBetween { from, to } => {
      let at = item.created_at();
      from.map_or(true, |f| at >= f) && to.map_or(true, |t| at <= t)
    }
  }
}

fn compare<T: Queryable>(a: &T, b: &T, sort: SortSpec) -> Ordering {
  match (a.sort_value(sort.key), b.sort_value(sort.key)) {
    (Some(x), Some(y)) => {
      let ord = x.compare(&y);
      match sort.direction {
        SortDirection::Ascending => ord,
        SortDirection::Descending => ord.reverse(),
      }
    }
    // Records missing the key sort last regardless of direction
    (Some(_), None) => Ordering::Less,
    (None, Some(_)) => Ordering::Greater,
    (None, None) => Ordering::Equal,
  }
}

/// The state of a query
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Query has not been started
  Idle,
  /// Query is currently fetching data
  Loading,
  /// Query completed successfully
  Success(T),
  /// Query failed with an error
  Error(String),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

/// A boxed future that returns a Result<T, String>
type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send>>;

/// A factory function that creates futures for fetching data
type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<T> + Send + Sync>;

/// Async query for data fetching with state management.
///
/// `Query<T>` encapsulates:
/// - The fetching logic (via a closure)
/// - Loading/success/error states
/// - Async result handling via channels
/// - Stale time tracking and store-event-driven refetching
pub struct Query<T> {
  state: QueryState<T>,
  fetcher: FetcherFn<T>,
  receiver: Option<mpsc::UnboundedReceiver<Result<T, String>>>,
  fetched_at: Option<Instant>,
  stale_time: Duration,
  /// Entity kind this query watches for invalidation, if any
  kind: Option<EntityKind>,
}

impl<T: Send + 'static> Query<T> {
  /// Create a new query with the given fetcher function.
  ///
  /// The fetcher is a closure that returns a future. It will be called
  /// each time `fetch()` or `refetch()` is invoked.
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    Self {
      state: QueryState::Idle,
      fetcher: Box::new(move || Box::pin(fetcher())),
      receiver: None,
      fetched_at: None,
      stale_time: Duration::from_secs(60), // Default 1 minute
      kind: None,
    }
  }

  /// Set the stale time for this query.
  pub fn with_stale_time(mut self, duration: Duration) -> Self {
    self.stale_time = duration;
    self
  }

  /// Bind this query to an entity kind so [`Query::handle_event`] refetches
  /// when that kind is invalidated.
  pub fn for_kind(mut self, kind: EntityKind) -> Self {
    self.kind = Some(kind);
    self
  }

  /// Get the current state of the query.
  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  /// Get the data if the query succeeded.
  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn is_success(&self) -> bool {
    self.state.is_success()
  }

  pub fn is_error(&self) -> bool {
    self.state.is_error()
  }

  pub fn error(&self) -> Option<&str> {
    self.state.error()
  }

  /// Check if the data is stale (older than stale_time).
  pub fn is_stale(&self) -> bool {
    match &self.state {
      QueryState::Success(_) => self
        .fetched_at
        .map(|t| t.elapsed() > self.stale_time)
        .unwrap_or(true),
      _ => false,
    }
  }

  /// Start fetching data if not already loading.
  ///
  /// This is a no-op if the query is already loading.
  pub fn fetch(&mut self) {
    if self.state.is_loading() {
      return;
    }
    self.start_fetch();
  }

  /// Force a refetch, even if already loading or data exists.
  pub fn refetch(&mut self) {
    // Cancel any pending fetch by dropping the receiver
    self.receiver = None;
    self.start_fetch();
  }

  /// React to a store event: refetch when the watched kind is invalidated.
  ///
  /// Returns `true` if a refetch was started.
  pub fn handle_event(&mut self, event: &StoreEvent) -> bool {
    let relevant = match event {
      StoreEvent::Invalidated(kind) => self.kind == Some(*kind),
      StoreEvent::Cleared => self.kind.is_some(),
    };

    if relevant {
      self.refetch();
    }
    relevant
  }

  /// Poll for results from a pending fetch.
  ///
  /// Returns `true` if the state changed (data arrived or error occurred).
  /// Call this in your event loop tick handler.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    // Try to receive without blocking
    match receiver.try_recv() {
      Ok(Ok(data)) => {
        self.state = QueryState::Success(data);
        self.fetched_at = Some(Instant::now());
        self.receiver = None;
        true
      }
      Ok(Err(error)) => {
        self.state = QueryState::Error(error);
        self.receiver = None;
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        // Sender dropped without sending - treat as error
        self.state = QueryState::Error("Query was cancelled".to_string());
        self.receiver = None;
        true
      }
    }
  }

  /// Internal: start the fetch operation
  fn start_fetch(&mut self) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.state = QueryState::Loading;

    let future = (self.fetcher)();
    tokio::spawn(async move {
      let result = future.await;
      // Ignore send errors - receiver may have been dropped
      let _ = tx.send(result);
    });
  }
}

// Query is not Clone because the fetcher is boxed and receiver is owned.
// If you need to share a query, wrap it in Arc<Mutex<Query<T>>>.

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .field("fetched_at", &self.fetched_at)
      .field("stale_time", &self.stale_time)
      .field("kind", &self.kind)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  struct Item {
    name: &'static str,
    source: &'static str,
    created_at: DateTime<Utc>,
    score: Option<f64>,
  }

  impl Item {
    fn new(name: &'static str, source: &'static str) -> Self {
      Self {
        name,
        source,
        created_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        score: None,
      }
    }
  }

  impl Queryable for Item {
    fn haystack(&self) -> Vec<&str> {
      vec![self.name]
    }

    fn field(&self, field: Field) -> Option<&str> {
      match field {
        Field::Source => Some(self.source),
        _ => None,
      }
    }

    fn created_at(&self) -> DateTime<Utc> {
      self.created_at
    }

    fn sort_value(&self, key: SortKey) -> Option<SortValue<'_>> {
      match key {
        SortKey::Name => Some(SortValue::Text(self.name)),
        SortKey::CreatedAt => Some(SortValue::Time(self.created_at)),
        SortKey::Score => self.score.map(SortValue::Number),
        _ => None,
      }
    }
  }

  fn items() -> Vec<Item> {
    vec![Item::new("Foo", "web"), Item::new("Bar", "ads")]
  }

  #[test]
  fn search_filter_is_case_insensitive_substring() {
    let query = ListQuery::default().with_filter(Filter::Search("foo".into()));
    let result = apply(items(), &query);
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].name, "Foo");
  }

  #[test]
  fn exact_filter_matches_single_field() {
    let query = ListQuery::default().with_filter(Filter::Exact {
      field: Field::Source,
      value: "ads".into(),
    });
    let result = apply(items(), &query);
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].name, "Bar");
  }

  #[test]
  fn filters_combine_with_and() {
    let query = ListQuery::default()
      .with_filter(Filter::Search("foo".into()))
      .with_filter(Filter::Exact {
        field: Field::Source,
        value: "ads".into(),
      });
    assert!(apply(items(), &query).is_empty());
  }

  #[test]
  fn unknown_field_fails_every_predicate() {
    let query = ListQuery::default().with_filter(Filter::Exact {
      field: Field::Stage,
      value: "proposal".into(),
    });
    assert!(apply(items(), &query).is_empty());
  }

  #[test]
  fn date_range_is_inclusive_with_open_ends() {
    let mut list = items();
    list[0].created_at = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();

    let query = ListQuery::default().with_filter(Filter::CreatedBetween {
      from: Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()),
      to: None,
    });
    let result = apply(list, &query);
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].name, "Bar");
  }

  #[test]
  fn sort_descending_reverses_order() {
    let query = ListQuery::default().with_sort(SortKey::Name, SortDirection::Descending);
    let result = apply(items(), &query);
    assert_eq!(result[0].name, "Foo");
    assert_eq!(result[1].name, "Bar");
  }

  #[test]
  fn equal_keys_keep_input_order() {
    let mut list = items();
    list.push(Item::new("Baz", "web"));
    // All created_at values are equal; stable sort must not reorder
    let query = ListQuery::default().with_sort(SortKey::CreatedAt, SortDirection::Ascending);
    let result = apply(list, &query);
    let names: Vec<&str> = result.iter().map(|i| i.name).collect();
    assert_eq!(names, vec!["Foo", "Bar", "Baz"]);
  }

  #[test]
  fn records_missing_the_sort_key_go_last() {
    let mut list = items();
    list[1].score = Some(10.0);
    let query = ListQuery::default().with_sort(SortKey::Score, SortDirection::Descending);
    let result = apply(list, &query);
    assert_eq!(result[0].name, "Bar");
    assert_eq!(result[1].name, "Foo");
  }

  #[tokio::test]
  async fn test_query_success() {
    let mut query = Query::new(|| async { Ok::<_, String>(vec![1, 2, 3]) });

    assert!(matches!(query.state(), QueryState::Idle));

    query.fetch();
    assert!(query.is_loading());

    // Wait for the result
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert!(query.is_success());
    assert_eq!(query.data(), Some(&vec![1, 2, 3]));
  }

  #[tokio::test]
  async fn test_query_error() {
    let mut query: Query<i32> = Query::new(|| async { Err("Something went wrong".to_string()) });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert!(query.is_error());
    assert_eq!(query.error(), Some("Something went wrong"));
  }

  #[tokio::test]
  async fn test_query_stale() {
    let mut query = Query::new(|| async { Ok::<_, String>(42) }).with_stale_time(Duration::ZERO);

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.poll();

    // With zero stale time, should immediately be stale
    assert!(query.is_stale());
  }

  #[tokio::test]
  async fn test_fetch_while_loading_is_noop() {
    let mut query = Query::new(|| async {
      tokio::time::sleep(Duration::from_millis(100)).await;
      Ok::<_, String>(42)
    });

    query.fetch();
    assert!(query.is_loading());

    // Second fetch should be no-op
    query.fetch();
    assert!(query.is_loading());
  }

  #[tokio::test]
  async fn invalidation_event_triggers_refetch() {
    let counter = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
    let counter_clone = counter.clone();

    let mut query = Query::new(move || {
      let counter = counter_clone.clone();
      async move { Ok::<_, String>(counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst)) }
    })
    .for_kind(EntityKind::Leads);

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.poll();

    // Unrelated kind: ignored
    assert!(!query.handle_event(&StoreEvent::Invalidated(EntityKind::Accounts)));

    assert!(query.handle_event(&StoreEvent::Invalidated(EntityKind::Leads)));
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.poll();

    assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 2);
  }
}
