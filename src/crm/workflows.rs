//! Lead workflow conveniences built on the mutation layer.
//!
//! Each helper is a straight-line sequence of at most two awaited calls;
//! the final update carries the usual invalidation and change event.

use color_eyre::{eyre::eyre, Result};

use crate::cache::Storage;
use crate::crm::client::CrmClient;
use crate::crm::service::CrmBackend;
use crate::crm::types::{Lead, LeadPatch, LeadStatus};

impl<B: CrmBackend, S: Storage> CrmClient<B, S> {
  /// Move a lead to `qualified` unless it already is.
  ///
  /// The current status comes from the cached copy when present; otherwise
  /// one full-list fetch resolves it before the update.
  pub async fn qualify_lead(&self, id: &str) -> Result<Lead> {
    let current = match self.get_lead(id)? {
      Some(lead) => lead,
      None => self
        .backend()
        .fetch_leads()
        .await?
        .into_iter()
        .find(|l| l.id == id)
        .ok_or_else(|| eyre!("No lead with id {}", id))?,
    };

    if current.status == LeadStatus::Qualified {
      return Ok(current);
    }

    self
      .update_lead(id, LeadPatch::status(LeadStatus::Qualified))
      .await
  }

  /// Move a lead to `unqualified`.
  pub async fn disqualify_lead(&self, id: &str) -> Result<Lead> {
    self
      .update_lead(id, LeadPatch::status(LeadStatus::Unqualified))
      .await
  }

  /// Move a lead to `converted`.
  pub async fn convert_lead(&self, id: &str) -> Result<Lead> {
    self
      .update_lead(id, LeadPatch::status(LeadStatus::Converted))
      .await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{EntityStore, MemoryStorage};
  use crate::crm::service::testing::TestBackend;
  use crate::crm::types::LeadSource;
  use crate::query::ListQuery;

  fn client(backend: TestBackend) -> CrmClient<TestBackend, MemoryStorage> {
    let store = EntityStore::load(MemoryStorage::new()).unwrap();
    CrmClient::new(backend, store)
  }

  #[tokio::test]
  async fn qualify_updates_status_and_invalidates() {
    let backend = TestBackend::with_leads(vec![TestBackend::lead("l1", "Foo", LeadSource::Web)]);
    let client = client(backend);

    client.list_leads(&ListQuery::default()).await.unwrap();

    let lead = client.qualify_lead("l1").await.unwrap();
    assert_eq!(lead.status, LeadStatus::Qualified);

    // Segment was invalidated by the update
    let read = client.list_leads(&ListQuery::default()).await.unwrap();
    assert!(!read.is_from_cache());
  }

  #[tokio::test]
  async fn qualify_is_a_noop_for_qualified_leads() {
    let mut seeded = TestBackend::lead("l1", "Foo", LeadSource::Web);
    seeded.status = LeadStatus::Qualified;
    let backend = TestBackend::with_leads(vec![seeded]);
    let client = client(backend);

    client.list_leads(&ListQuery::default()).await.unwrap();
    let lead = client.qualify_lead("l1").await.unwrap();

    assert_eq!(lead.status, LeadStatus::Qualified);
    assert_eq!(client.backend().update_count(), 0);
  }

  #[tokio::test]
  async fn qualify_resolves_uncached_lead_via_fetch() {
    let backend = TestBackend::with_leads(vec![TestBackend::lead("l1", "Foo", LeadSource::Web)]);
    let client = client(backend);

    // Store never primed: the helper falls back to one list fetch
    let lead = client.qualify_lead("l1").await.unwrap();
    assert_eq!(lead.status, LeadStatus::Qualified);
    assert_eq!(client.backend().fetch_count(), 1);
    assert_eq!(client.backend().update_count(), 1);
  }

  #[tokio::test]
  async fn qualify_unknown_lead_errors() {
    let backend = TestBackend::with_leads(Vec::new());
    let client = client(backend);
    assert!(client.qualify_lead("missing").await.is_err());
  }

  #[tokio::test]
  async fn disqualify_and_convert_set_fixed_statuses() {
    let backend = TestBackend::with_leads(vec![
      TestBackend::lead("l1", "Foo", LeadSource::Web),
      TestBackend::lead("l2", "Bar", LeadSource::Ads),
    ]);
    let client = client(backend);

    let disqualified = client.disqualify_lead("l1").await.unwrap();
    assert_eq!(disqualified.status, LeadStatus::Unqualified);

    let converted = client.convert_lead("l2").await.unwrap();
    assert_eq!(converted.status, LeadStatus::Converted);
  }
}
