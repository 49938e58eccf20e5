//! Cached CRM client: the query/mutation layer over the entity store.
//!
//! Reads serve the in-memory map while the segment is inside its freshness
//! window and otherwise do a full-list fetch that rewrites the segment.
//! Writes go to the backend first; on success the response is written
//! through, the segment is invalidated, and subscribers are notified so
//! they refetch.

use chrono::{DateTime, Duration, Utc};
use color_eyre::Result;
use std::sync::Arc;
use tracing::debug;

use crate::cache::{CacheResult, EntityStore, Storage};
use crate::event::{EventBus, StoreEvent};
use crate::query::{self, ListQuery};

use super::service::CrmBackend;
use super::types::{
  Account, AccountDraft, AccountPatch, EntityKind, Lead, LeadDraft, LeadPatch, Opportunity,
  OpportunityDraft, OpportunityPatch, Quotation, QuotationDraft, QuotationPatch,
};

/// CRM client with transparent caching.
///
/// Wraps a [`CrmBackend`] and an [`EntityStore`], providing filtered and
/// sorted list reads plus write-through mutations with invalidation.
pub struct CrmClient<B: CrmBackend, S: Storage> {
  backend: B,
  store: Arc<EntityStore<S>>,
  events: Arc<EventBus>,
  /// How long a bulk refresh keeps a segment servable without a refetch
  stale_time: Duration,
}

impl<B: CrmBackend, S: Storage> CrmClient<B, S> {
  /// Create a new cached client over the given backend and store.
  pub fn new(backend: B, store: EntityStore<S>) -> Self {
    Self {
      backend,
      store: Arc::new(store),
      events: Arc::new(EventBus::new()),
      stale_time: Duration::minutes(5),
    }
  }

  /// Set the freshness window for cached reads.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  /// The underlying entity store.
  pub fn store(&self) -> &EntityStore<S> {
    &self.store
  }

  /// Subscribe to change notifications.
  pub fn subscribe(&self) -> tokio::sync::mpsc::UnboundedReceiver<StoreEvent> {
    self.events.subscribe()
  }

  /// Backend access for the workflow helpers.
  pub(crate) fn backend(&self) -> &B {
    &self.backend
  }

  /// The segment's refresh stamp, if the segment may be served from cache.
  fn fresh_stamp(&self, kind: EntityKind) -> Result<Option<DateTime<Utc>>> {
    if self.store.is_fresh(kind, self.stale_time)? {
      self.store.refreshed_at(kind)
    } else {
      Ok(None)
    }
  }

  /// Invalidate a segment and tell subscribers to refetch.
  fn mark_changed(&self, kind: EntityKind) -> Result<()> {
    self.store.invalidate(kind)?;
    self.events.emit(StoreEvent::Invalidated(kind));
    Ok(())
  }

  // Accounts

  pub async fn list_accounts(&self, query: &ListQuery) -> Result<CacheResult<Vec<Account>>> {
    if let Some(at) = self.fresh_stamp(EntityKind::Accounts)? {
      debug!(kind = "accounts", "serving list from cache");
      return Ok(CacheResult::from_cache(
        query::apply(self.store.accounts()?, query),
        at,
      ));
    }

    debug!(kind = "accounts", "cache stale or empty, fetching");
    let fresh = self.backend.fetch_accounts().await?;
    self.store.set_accounts(fresh.clone())?;
    Ok(CacheResult::from_backend(query::apply(fresh, query)))
  }

  pub async fn create_account(&self, draft: AccountDraft) -> Result<Account> {
    let account = self.backend.create_account(draft).await?;
    self.store.upsert_account(account.clone())?;
    self.mark_changed(EntityKind::Accounts)?;
    Ok(account)
  }

  pub async fn update_account(&self, id: &str, patch: AccountPatch) -> Result<Account> {
    let account = self.backend.update_account(id, patch).await?;
    self.store.upsert_account(account.clone())?;
    self.mark_changed(EntityKind::Accounts)?;
    Ok(account)
  }

  pub async fn delete_account(&self, id: &str) -> Result<()> {
    self.backend.delete_account(id).await?;
    self.store.remove_account(id)?;
    self.mark_changed(EntityKind::Accounts)
  }

  pub fn get_account(&self, id: &str) -> Result<Option<Account>> {
    self.store.get_account(id)
  }

  // Leads

  pub async fn list_leads(&self, query: &ListQuery) -> Result<CacheResult<Vec<Lead>>> {
    if let Some(at) = self.fresh_stamp(EntityKind::Leads)? {
      debug!(kind = "leads", "serving list from cache");
      return Ok(CacheResult::from_cache(
        query::apply(self.store.leads()?, query),
        at,
      ));
    }

    debug!(kind = "leads", "cache stale or empty, fetching");
    let fresh = self.backend.fetch_leads().await?;
    self.store.set_leads(fresh.clone())?;
    Ok(CacheResult::from_backend(query::apply(fresh, query)))
  }

  pub async fn create_lead(&self, draft: LeadDraft) -> Result<Lead> {
    let lead = self.backend.create_lead(draft).await?;
    self.store.upsert_lead(lead.clone())?;
    self.mark_changed(EntityKind::Leads)?;
    Ok(lead)
  }

  pub async fn update_lead(&self, id: &str, patch: LeadPatch) -> Result<Lead> {
    let lead = self.backend.update_lead(id, patch).await?;
    self.store.upsert_lead(lead.clone())?;
    self.mark_changed(EntityKind::Leads)?;
    Ok(lead)
  }

  pub async fn delete_lead(&self, id: &str) -> Result<()> {
    self.backend.delete_lead(id).await?;
    self.store.remove_lead(id)?;
    self.mark_changed(EntityKind::Leads)
  }

  pub fn get_lead(&self, id: &str) -> Result<Option<Lead>> {
    self.store.get_lead(id)
  }

  // Opportunities

  pub async fn list_opportunities(&self, query: &ListQuery) -> Result<CacheResult<Vec<Opportunity>>> {
    if let Some(at) = self.fresh_stamp(EntityKind::Opportunities)? {
      debug!(kind = "opportunities", "serving list from cache");
      return Ok(CacheResult::from_cache(
        query::apply(self.store.opportunities()?, query),
        at,
      ));
    }

    debug!(kind = "opportunities", "cache stale or empty, fetching");
    let fresh = self.backend.fetch_opportunities().await?;
    self.store.set_opportunities(fresh.clone())?;
    Ok(CacheResult::from_backend(query::apply(fresh, query)))
  }

  pub async fn create_opportunity(&self, draft: OpportunityDraft) -> Result<Opportunity> {
    let opportunity = self.backend.create_opportunity(draft).await?;
    self.store.upsert_opportunity(opportunity.clone())?;
    self.mark_changed(EntityKind::Opportunities)?;
    Ok(opportunity)
  }

  pub async fn update_opportunity(&self, id: &str, patch: OpportunityPatch) -> Result<Opportunity> {
    let opportunity = self.backend.update_opportunity(id, patch).await?;
    self.store.upsert_opportunity(opportunity.clone())?;
    self.mark_changed(EntityKind::Opportunities)?;
    Ok(opportunity)
  }

  pub async fn delete_opportunity(&self, id: &str) -> Result<()> {
    self.backend.delete_opportunity(id).await?;
    self.store.remove_opportunity(id)?;
    self.mark_changed(EntityKind::Opportunities)
  }

  pub fn get_opportunity(&self, id: &str) -> Result<Option<Opportunity>> {
    self.store.get_opportunity(id)
  }

  // Quotations

  pub async fn list_quotations(&self, query: &ListQuery) -> Result<CacheResult<Vec<Quotation>>> {
    if let Some(at) = self.fresh_stamp(EntityKind::Quotations)? {
      debug!(kind = "quotations", "serving list from cache");
      return Ok(CacheResult::from_cache(
        query::apply(self.store.quotations()?, query),
        at,
      ));
    }

    debug!(kind = "quotations", "cache stale or empty, fetching");
    let fresh = self.backend.fetch_quotations().await?;
    self.store.set_quotations(fresh.clone())?;
    Ok(CacheResult::from_backend(query::apply(fresh, query)))
  }

  pub async fn create_quotation(&self, draft: QuotationDraft) -> Result<Quotation> {
    let quotation = self.backend.create_quotation(draft).await?;
    self.store.upsert_quotation(quotation.clone())?;
    self.mark_changed(EntityKind::Quotations)?;
    Ok(quotation)
  }

  pub async fn update_quotation(&self, id: &str, patch: QuotationPatch) -> Result<Quotation> {
    let quotation = self.backend.update_quotation(id, patch).await?;
    self.store.upsert_quotation(quotation.clone())?;
    self.mark_changed(EntityKind::Quotations)?;
    Ok(quotation)
  }

  pub async fn delete_quotation(&self, id: &str) -> Result<()> {
    self.backend.delete_quotation(id).await?;
    self.store.remove_quotation(id)?;
    self.mark_changed(EntityKind::Quotations)
  }

  pub fn get_quotation(&self, id: &str) -> Result<Option<Quotation>> {
    self.store.get_quotation(id)
  }

  /// Reset every cached map and notify subscribers.
  pub fn clear(&self) -> Result<()> {
    self.store.clear()?;
    self.events.emit(StoreEvent::Cleared);
    Ok(())
  }
}
