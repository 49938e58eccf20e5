//! In-memory entity store mirrored to durable storage.
//!
//! One id-keyed map per entity kind plus a per-kind bulk-refresh stamp.
//! All mutations are synchronous; each one writes the full snapshot back
//! through the injected [`Storage`] before returning.

use chrono::{DateTime, Duration, Utc};
use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::storage::{Storage, StoreSnapshot};
use super::traits::Cacheable;
use crate::crm::types::{Account, EntityKind, Lead, Opportunity, Quotation};

/// Map state behind the store's lock.
#[derive(Default)]
struct StoreState {
  accounts: HashMap<String, Account>,
  leads: HashMap<String, Lead>,
  opportunities: HashMap<String, Opportunity>,
  quotations: HashMap<String, Quotation>,
  /// Last bulk refresh per kind; absent means never refreshed (or invalidated)
  refreshed_at: HashMap<EntityKind, DateTime<Utc>>,
}

/// Selects the map for an entity type inside [`StoreState`], so the map
/// operations are written once instead of per kind.
trait Segment<T: Cacheable> {
  fn map(&self) -> &HashMap<String, T>;
  fn map_mut(&mut self) -> &mut HashMap<String, T>;
}

impl Segment<Account> for StoreState {
  fn map(&self) -> &HashMap<String, Account> {
    &self.accounts
  }
  fn map_mut(&mut self) -> &mut HashMap<String, Account> {
    &mut self.accounts
  }
}

impl Segment<Lead> for StoreState {
  fn map(&self) -> &HashMap<String, Lead> {
    &self.leads
  }
  fn map_mut(&mut self) -> &mut HashMap<String, Lead> {
    &mut self.leads
  }
}

impl Segment<Opportunity> for StoreState {
  fn map(&self) -> &HashMap<String, Opportunity> {
    &self.opportunities
  }
  fn map_mut(&mut self) -> &mut HashMap<String, Opportunity> {
    &mut self.opportunities
  }
}

impl Segment<Quotation> for StoreState {
  fn map(&self) -> &HashMap<String, Quotation> {
    &self.quotations
  }
  fn map_mut(&mut self) -> &mut HashMap<String, Quotation> {
    &mut self.quotations
  }
}

impl StoreState {
  fn len_of(&self, kind: EntityKind) -> usize {
    match kind {
      EntityKind::Accounts => self.accounts.len(),
      EntityKind::Leads => self.leads.len(),
      EntityKind::Opportunities => self.opportunities.len(),
      EntityKind::Quotations => self.quotations.len(),
    }
  }

  fn snapshot(&self) -> StoreSnapshot {
    StoreSnapshot {
      accounts: self.accounts.values().cloned().collect(),
      leads: self.leads.values().cloned().collect(),
      opportunities: self.opportunities.values().cloned().collect(),
      quotations: self.quotations.values().cloned().collect(),
    }
  }

  fn restore(snapshot: StoreSnapshot) -> Self {
    Self {
      accounts: snapshot
        .accounts
        .into_iter()
        .map(|e| (e.id.clone(), e))
        .collect(),
      leads: snapshot
        .leads
        .into_iter()
        .map(|e| (e.id.clone(), e))
        .collect(),
      opportunities: snapshot
        .opportunities
        .into_iter()
        .map(|e| (e.id.clone(), e))
        .collect(),
      quotations: snapshot
        .quotations
        .into_iter()
        .map(|e| (e.id.clone(), e))
        .collect(),
      // Stamps are not persisted; every segment revalidates after a reload
      refreshed_at: HashMap::new(),
    }
  }
}

/// Entity store with an injected durable storage backend.
pub struct EntityStore<S: Storage> {
  state: Mutex<StoreState>,
  storage: S,
}

impl<S: Storage> EntityStore<S> {
  /// Create a store seeded from whatever the storage last saved.
  pub fn load(storage: S) -> Result<Self> {
    let state = match storage.load()? {
      Some(snapshot) => StoreState::restore(snapshot),
      None => StoreState::default(),
    };

    Ok(Self {
      state: Mutex::new(state),
      storage,
    })
  }

  fn state(&self) -> Result<MutexGuard<'_, StoreState>> {
    self.state.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  /// Mirror the current state to durable storage.
  fn persist(&self, state: &StoreState) -> Result<()> {
    self.storage.save(&state.snapshot())
  }

  fn upsert_inner<T>(&self, entity: T) -> Result<()>
  where
    T: Cacheable,
    StoreState: Segment<T>,
  {
    let mut state = self.state()?;
    <StoreState as Segment<T>>::map_mut(&mut state).insert(entity.id().to_string(), entity);
    self.persist(&state)
  }

  fn remove_inner<T>(&self, id: &str) -> Result<()>
  where
    T: Cacheable,
    StoreState: Segment<T>,
  {
    let mut state = self.state()?;
    <StoreState as Segment<T>>::map_mut(&mut state).remove(id);
    self.persist(&state)
  }

  fn set_all_inner<T>(&self, entities: Vec<T>) -> Result<()>
  where
    T: Cacheable,
    StoreState: Segment<T>,
  {
    let mut state = self.state()?;
    let map = <StoreState as Segment<T>>::map_mut(&mut state);
    map.clear();
    for entity in entities {
      map.insert(entity.id().to_string(), entity);
    }
    state.refreshed_at.insert(T::kind(), Utc::now());
    self.persist(&state)
  }

  fn get_inner<T>(&self, id: &str) -> Result<Option<T>>
  where
    T: Cacheable,
    StoreState: Segment<T>,
  {
    let state = self.state()?;
    Ok(<StoreState as Segment<T>>::map(&state).get(id).cloned())
  }

  fn all_inner<T>(&self) -> Result<Vec<T>>
  where
    T: Cacheable,
    StoreState: Segment<T>,
  {
    let state = self.state()?;
    Ok(<StoreState as Segment<T>>::map(&state).values().cloned().collect())
  }

  // Accounts

  /// Insert or replace one account.
  pub fn upsert_account(&self, account: Account) -> Result<()> {
    self.upsert_inner(account)
  }

  /// Remove one account by id. Unknown ids are a no-op.
  pub fn remove_account(&self, id: &str) -> Result<()> {
    self.remove_inner::<Account>(id)
  }

  /// Replace the whole account map and stamp the segment fresh.
  /// Previously cached ids not in the list are discarded.
  pub fn set_accounts(&self, accounts: Vec<Account>) -> Result<()> {
    self.set_all_inner(accounts)
  }

  pub fn get_account(&self, id: &str) -> Result<Option<Account>> {
    self.get_inner(id)
  }

  /// All cached accounts, in unspecified order.
  pub fn accounts(&self) -> Result<Vec<Account>> {
    self.all_inner()
  }

  // Leads

  pub fn upsert_lead(&self, lead: Lead) -> Result<()> {
    self.upsert_inner(lead)
  }

  pub fn remove_lead(&self, id: &str) -> Result<()> {
    self.remove_inner::<Lead>(id)
  }

  pub fn set_leads(&self, leads: Vec<Lead>) -> Result<()> {
    self.set_all_inner(leads)
  }

  pub fn get_lead(&self, id: &str) -> Result<Option<Lead>> {
    self.get_inner(id)
  }

  pub fn leads(&self) -> Result<Vec<Lead>> {
    self.all_inner()
  }

  // Opportunities

  pub fn upsert_opportunity(&self, opportunity: Opportunity) -> Result<()> {
    self.upsert_inner(opportunity)
  }

  pub fn remove_opportunity(&self, id: &str) -> Result<()> {
    self.remove_inner::<Opportunity>(id)
  }

  pub fn set_opportunities(&self, opportunities: Vec<Opportunity>) -> Result<()> {
    self.set_all_inner(opportunities)
  }

  pub fn get_opportunity(&self, id: &str) -> Result<Option<Opportunity>> {
    self.get_inner(id)
  }

  pub fn opportunities(&self) -> Result<Vec<Opportunity>> {
    self.all_inner()
  }

  // Quotations

  pub fn upsert_quotation(&self, quotation: Quotation) -> Result<()> {
    self.upsert_inner(quotation)
  }

  pub fn remove_quotation(&self, id: &str) -> Result<()> {
    self.remove_inner::<Quotation>(id)
  }

  pub fn set_quotations(&self, quotations: Vec<Quotation>) -> Result<()> {
    self.set_all_inner(quotations)
  }

  pub fn get_quotation(&self, id: &str) -> Result<Option<Quotation>> {
    self.get_inner(id)
  }

  pub fn quotations(&self) -> Result<Vec<Quotation>> {
    self.all_inner()
  }

  // Segment-level operations

  /// Drop the bulk-refresh stamp for a kind so the next read refetches.
  pub fn invalidate(&self, kind: EntityKind) -> Result<()> {
    let mut state = self.state()?;
    state.refreshed_at.remove(&kind);
    Ok(())
  }

  /// Reset every map and stamp to empty.
  pub fn clear(&self) -> Result<()> {
    let mut state = self.state()?;
    *state = StoreState::default();
    self.persist(&state)
  }

  /// When the kind was last bulk-refreshed, if ever.
  pub fn refreshed_at(&self, kind: EntityKind) -> Result<Option<DateTime<Utc>>> {
    let state = self.state()?;
    Ok(state.refreshed_at.get(&kind).copied())
  }

  /// Whether a read of `kind` may be served from the map without a fetch:
  /// refreshed within the window and the map is non-empty.
  pub fn is_fresh(&self, kind: EntityKind, stale_time: Duration) -> Result<bool> {
    let state = self.state()?;
    let fresh = match state.refreshed_at.get(&kind) {
      Some(at) => Utc::now() - *at < stale_time && state.len_of(kind) > 0,
      None => false,
    };
    Ok(fresh)
  }
}
