//! Backend service boundary and the in-process stub implementation.
//!
//! The cache layer only assumes the [`CrmBackend`] contract: full-list
//! fetches, and create/update/delete calls that resolve with the written
//! record or reject with an error. [`StubCrm`] simulates that backend with
//! an in-memory dataset and artificial latency.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use color_eyre::{eyre::eyre, Result};
use rand::Rng;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

use super::types::{
  Account, AccountDraft, AccountKind, AccountPatch, AccountStatus, Lead, LeadDraft, LeadPatch,
  LeadSource, LeadStatus, Opportunity, OpportunityDraft, OpportunityPatch, OpportunityStage,
  Quotation, QuotationDraft, QuotationPatch, QuotationStatus,
};

/// Async service contract the query/mutation layer is written against.
///
/// Every call resolves with the affected record(s) on success and rejects
/// with a plain error on failure; there is no richer error taxonomy.
#[async_trait]
pub trait CrmBackend: Send + Sync {
  async fn fetch_accounts(&self) -> Result<Vec<Account>>;
  async fn create_account(&self, draft: AccountDraft) -> Result<Account>;
  async fn update_account(&self, id: &str, patch: AccountPatch) -> Result<Account>;
  async fn delete_account(&self, id: &str) -> Result<()>;

  async fn fetch_leads(&self) -> Result<Vec<Lead>>;
  async fn create_lead(&self, draft: LeadDraft) -> Result<Lead>;
  async fn update_lead(&self, id: &str, patch: LeadPatch) -> Result<Lead>;
  async fn delete_lead(&self, id: &str) -> Result<()>;

  async fn fetch_opportunities(&self) -> Result<Vec<Opportunity>>;
  async fn create_opportunity(&self, draft: OpportunityDraft) -> Result<Opportunity>;
  async fn update_opportunity(&self, id: &str, patch: OpportunityPatch) -> Result<Opportunity>;
  async fn delete_opportunity(&self, id: &str) -> Result<()>;

  async fn fetch_quotations(&self) -> Result<Vec<Quotation>>;
  async fn create_quotation(&self, draft: QuotationDraft) -> Result<Quotation>;
  async fn update_quotation(&self, id: &str, patch: QuotationPatch) -> Result<Quotation>;
  async fn delete_quotation(&self, id: &str) -> Result<()>;
}

#[derive(Default)]
struct StubState {
  accounts: Vec<Account>,
  leads: Vec<Lead>,
  opportunities: Vec<Opportunity>,
  quotations: Vec<Quotation>,
  quotation_seq: u32,
}

/// Stub backend: in-memory dataset behind simulated network latency.
pub struct StubCrm {
  state: Mutex<StubState>,
  latency: Duration,
}

impl StubCrm {
  /// Empty backend with the given simulated latency per call.
  pub fn new(latency: Duration) -> Self {
    Self {
      state: Mutex::new(StubState::default()),
      latency,
    }
  }

  /// Backend pre-populated with a small plausible dataset.
  pub fn seeded(latency: Duration) -> Self {
    let stub = Self::new(latency);
    // Lock cannot be poisoned before the value is shared
    if let Ok(mut state) = stub.state.lock() {
      seed(&mut state);
    }
    stub
  }

  async fn simulate_latency(&self) {
    if !self.latency.is_zero() {
      tokio::time::sleep(self.latency).await;
    }
  }

  fn state(&self) -> Result<std::sync::MutexGuard<'_, StubState>> {
    self.state.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

/// Populate the stub with a handful of records per kind. Scores, values and
/// probabilities are randomized the way the simulated API's payloads were.
fn seed(state: &mut StubState) {
  let mut rng = rand::thread_rng();
  let now = Utc::now();

  let account_rows = [
    ("acc-1", "Northwind Traders", "ops@northwind.example", AccountKind::Customer),
    ("acc-2", "Globex Corporation", "sales@globex.example", AccountKind::Prospect),
    ("acc-3", "Initech", "hello@initech.example", AccountKind::Partner),
  ];
  for (i, (id, name, email, kind)) in account_rows.into_iter().enumerate() {
    state.accounts.push(Account {
      id: id.to_string(),
      name: name.to_string(),
      email: email.to_string(),
      phone: None,
      kind,
      status: AccountStatus::Active,
      created_at: now - ChronoDuration::days(60 - i as i64 * 10),
      updated_at: now - ChronoDuration::days(5),
    });
  }

  let lead_rows = [
    ("lead-1", "Ava Chen", "ava.chen@example.com", LeadSource::Web),
    ("lead-2", "Marcus Webb", "m.webb@example.com", LeadSource::Referral),
    ("lead-3", "Priya Natarajan", "priya.n@example.com", LeadSource::Ads),
    ("lead-4", "Jonas Keller", "j.keller@example.com", LeadSource::Event),
  ];
  for (i, (id, name, email, source)) in lead_rows.into_iter().enumerate() {
    state.leads.push(Lead {
      id: id.to_string(),
      name: name.to_string(),
      email: email.to_string(),
      phone: None,
      source,
      status: LeadStatus::New,
      score: Some(rng.gen_range(20..95)),
      assigned_to: None,
      notes: None,
      created_at: now - ChronoDuration::days(30 - i as i64 * 7),
      updated_at: now - ChronoDuration::days(2),
    });
  }

  let opportunity_rows = [
    ("opp-1", "Northwind platform renewal", "acc-1", OpportunityStage::Negotiation),
    ("opp-2", "Globex onboarding package", "acc-2", OpportunityStage::Proposal),
  ];
  for (id, title, account_id, stage) in opportunity_rows {
    state.opportunities.push(Opportunity {
      id: id.to_string(),
      title: title.to_string(),
      account_id: account_id.to_string(),
      value: rng.gen_range(5_000..80_000) as f64,
      stage,
      probability: rng.gen_range(20..80),
      expected_close_date: now + ChronoDuration::days(45),
      notes: None,
      created_at: now - ChronoDuration::days(20),
      updated_at: now - ChronoDuration::days(1),
    });
  }

  state.quotation_seq = 1;
  state.quotations.push(Quotation {
    id: "quo-1".to_string(),
    number: "Q-0001".to_string(),
    account_id: "acc-1".to_string(),
    opportunity_id: "opp-1".to_string(),
    total: 42_500.0,
    status: QuotationStatus::Sent,
    valid_until: now + ChronoDuration::days(30),
    notes: None,
    created_at: now - ChronoDuration::days(10),
    updated_at: now - ChronoDuration::days(10),
  });
}

#[async_trait]
impl CrmBackend for StubCrm {
  async fn fetch_accounts(&self) -> Result<Vec<Account>> {
    self.simulate_latency().await;
    Ok(self.state()?.accounts.clone())
  }

  async fn create_account(&self, draft: AccountDraft) -> Result<Account> {
    self.simulate_latency().await;
    let now = Utc::now();
    let account = Account {
      id: Uuid::new_v4().to_string(),
      name: draft.name,
      email: draft.email,
      phone: draft.phone,
      kind: draft.kind,
      status: draft.status,
      created_at: now,
      updated_at: now,
    };
    self.state()?.accounts.push(account.clone());
    Ok(account)
  }

  async fn update_account(&self, id: &str, patch: AccountPatch) -> Result<Account> {
    self.simulate_latency().await;
    let mut state = self.state()?;
    let account = state
      .accounts
      .iter_mut()
      .find(|a| a.id == id)
      .ok_or_else(|| eyre!("No account with id {}", id))?;

    if let Some(name) = patch.name {
      account.name = name;
    }
    if let Some(email) = patch.email {
      account.email = email;
    }
    if let Some(phone) = patch.phone {
      account.phone = phone;
    }
    if let Some(kind) = patch.kind {
      account.kind = kind;
    }
    if let Some(status) = patch.status {
      account.status = status;
    }
    account.updated_at = Utc::now();

    Ok(account.clone())
  }

  async fn delete_account(&self, id: &str) -> Result<()> {
    self.simulate_latency().await;
    let mut state = self.state()?;
    let before = state.accounts.len();
    state.accounts.retain(|a| a.id != id);
    if state.accounts.len() == before {
      return Err(eyre!("No account with id {}", id));
    }
    Ok(())
  }

  async fn fetch_leads(&self) -> Result<Vec<Lead>> {
    self.simulate_latency().await;
    Ok(self.state()?.leads.clone())
  }

  async fn create_lead(&self, draft: LeadDraft) -> Result<Lead> {
    self.simulate_latency().await;
    let now = Utc::now();
    let lead = Lead {
      id: Uuid::new_v4().to_string(),
      name: draft.name,
      email: draft.email,
      phone: draft.phone,
      source: draft.source,
      status: LeadStatus::New,
      score: None,
      assigned_to: draft.assigned_to,
      notes: draft.notes,
      created_at: now,
      updated_at: now,
    };
    self.state()?.leads.push(lead.clone());
    Ok(lead)
  }

  async fn update_lead(&self, id: &str, patch: LeadPatch) -> Result<Lead> {
    self.simulate_latency().await;
    let mut state = self.state()?;
    let lead = state
      .leads
      .iter_mut()
      .find(|l| l.id == id)
      .ok_or_else(|| eyre!("No lead with id {}", id))?;

    if let Some(name) = patch.name {
      lead.name = name;
    }
    if let Some(email) = patch.email {
      lead.email = email;
    }
    if let Some(phone) = patch.phone {
      lead.phone = phone;
    }
    if let Some(source) = patch.source {
      lead.source = source;
    }
    if let Some(status) = patch.status {
      lead.status = status;
    }
    if let Some(score) = patch.score {
      lead.score = score;
    }
    if let Some(assigned_to) = patch.assigned_to {
      lead.assigned_to = assigned_to;
    }
    if let Some(notes) = patch.notes {
      lead.notes = notes;
    }
    lead.updated_at = Utc::now();

    Ok(lead.clone())
  }

  async fn delete_lead(&self, id: &str) -> Result<()> {
    self.simulate_latency().await;
    let mut state = self.state()?;
    let before = state.leads.len();
    state.leads.retain(|l| l.id != id);
    if state.leads.len() == before {
      return Err(eyre!("No lead with id {}", id));
    }
    Ok(())
  }

  async fn fetch_opportunities(&self) -> Result<Vec<Opportunity>> {
    self.simulate_latency().await;
    Ok(self.state()?.opportunities.clone())
  }

  async fn create_opportunity(&self, draft: OpportunityDraft) -> Result<Opportunity> {
    self.simulate_latency().await;
    let now = Utc::now();
    let opportunity = Opportunity {
      id: Uuid::new_v4().to_string(),
      title: draft.title,
      account_id: draft.account_id,
      value: draft.value,
      stage: draft.stage,
      probability: draft.probability,
      expected_close_date: draft.expected_close_date,
      notes: draft.notes,
      created_at: now,
      updated_at: now,
    };
    self.state()?.opportunities.push(opportunity.clone());
    Ok(opportunity)
  }

  async fn update_opportunity(&self, id: &str, patch: OpportunityPatch) -> Result<Opportunity> {
    self.simulate_latency().await;
    let mut state = self.state()?;
    let opportunity = state
      .opportunities
      .iter_mut()
      .find(|o| o.id == id)
      .ok_or_else(|| eyre!("No opportunity with id {}", id))?;

    if let Some(title) = patch.title {
      opportunity.title = title;
    }
    if let Some(value) = patch.value {
      opportunity.value = value;
    }
    if let Some(stage) = patch.stage {
      opportunity.stage = stage;
    }
    if let Some(probability) = patch.probability {
      opportunity.probability = probability;
    }
    if let Some(expected_close_date) = patch.expected_close_date {
      opportunity.expected_close_date = expected_close_date;
    }
    if let Some(notes) = patch.notes {
      opportunity.notes = notes;
    }
    opportunity.updated_at = Utc::now();

    Ok(opportunity.clone())
  }

  async fn delete_opportunity(&self, id: &str) -> Result<()> {
    self.simulate_latency().await;
    let mut state = self.state()?;
    let before = state.opportunities.len();
    state.opportunities.retain(|o| o.id != id);
    if state.opportunities.len() == before {
      return Err(eyre!("No opportunity with id {}", id));
    }
    Ok(())
  }

  async fn fetch_quotations(&self) -> Result<Vec<Quotation>> {
    self.simulate_latency().await;
    Ok(self.state()?.quotations.clone())
  }

  async fn create_quotation(&self, draft: QuotationDraft) -> Result<Quotation> {
    self.simulate_latency().await;
    let now = Utc::now();
    let mut state = self.state()?;
    state.quotation_seq += 1;
    let quotation = Quotation {
      id: Uuid::new_v4().to_string(),
      number: format!("Q-{:04}", state.quotation_seq),
      account_id: draft.account_id,
      opportunity_id: draft.opportunity_id,
      total: draft.total,
      status: QuotationStatus::Draft,
      valid_until: draft.valid_until,
      notes: draft.notes,
      created_at: now,
      updated_at: now,
    };
    state.quotations.push(quotation.clone());
    Ok(quotation)
  }

  async fn update_quotation(&self, id: &str, patch: QuotationPatch) -> Result<Quotation> {
    self.simulate_latency().await;
    let mut state = self.state()?;
    let quotation = state
      .quotations
      .iter_mut()
      .find(|q| q.id == id)
      .ok_or_else(|| eyre!("No quotation with id {}", id))?;

    if let Some(total) = patch.total {
      quotation.total = total;
    }
    if let Some(status) = patch.status {
      quotation.status = status;
    }
    if let Some(valid_until) = patch.valid_until {
      quotation.valid_until = valid_until;
    }
    if let Some(notes) = patch.notes {
      quotation.notes = notes;
    }
    quotation.updated_at = Utc::now();

    Ok(quotation.clone())
  }

  async fn delete_quotation(&self, id: &str) -> Result<()> {
    self.simulate_latency().await;
    let mut state = self.state()?;
    let before = state.quotations.len();
    state.quotations.retain(|q| q.id != id);
    if state.quotations.len() == before {
      return Err(eyre!("No quotation with id {}", id));
    }
    Ok(())
  }
}

/// Lead-focused backend double for cache-behavior tests: counts calls and
/// can be switched to reject writes.
#[cfg(test)]
pub(crate) mod testing {
  use super::*;
  use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

  pub struct TestBackend {
    leads: Mutex<Vec<Lead>>,
    fetches: AtomicU32,
    updates: AtomicU32,
    fail_writes: AtomicBool,
  }

  impl TestBackend {
    pub fn with_leads(leads: Vec<Lead>) -> Self {
      Self {
        leads: Mutex::new(leads),
        fetches: AtomicU32::new(0),
        updates: AtomicU32::new(0),
        fail_writes: AtomicBool::new(false),
      }
    }

    pub fn lead(id: &str, name: &str, source: LeadSource) -> Lead {
      let now = Utc::now();
      Lead {
        id: id.to_string(),
        name: name.to_string(),
        email: format!("{}@example.com", id),
        phone: None,
        source,
        status: LeadStatus::New,
        score: None,
        assigned_to: None,
        notes: None,
        created_at: now,
        updated_at: now,
      }
    }

    pub fn draft(name: &str, source: LeadSource) -> LeadDraft {
      LeadDraft {
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        phone: None,
        source,
        assigned_to: None,
        notes: None,
      }
    }

    pub fn fetch_count(&self) -> u32 {
      self.fetches.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> u32 {
      self.updates.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self, fail: bool) {
      self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
      if self.fail_writes.load(Ordering::SeqCst) {
        return Err(eyre!("backend rejected the write"));
      }
      Ok(())
    }
  }

  #[async_trait]
  impl CrmBackend for TestBackend {
    async fn fetch_accounts(&self) -> Result<Vec<Account>> {
      Ok(Vec::new())
    }
    async fn create_account(&self, _draft: AccountDraft) -> Result<Account> {
      Err(eyre!("not part of this fixture"))
    }
    async fn update_account(&self, _id: &str, _patch: AccountPatch) -> Result<Account> {
      Err(eyre!("not part of this fixture"))
    }
    async fn delete_account(&self, _id: &str) -> Result<()> {
      Err(eyre!("not part of this fixture"))
    }

    async fn fetch_leads(&self) -> Result<Vec<Lead>> {
      self.fetches.fetch_add(1, Ordering::SeqCst);
      Ok(self.leads.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?.clone())
    }

    async fn create_lead(&self, draft: LeadDraft) -> Result<Lead> {
      self.check_writable()?;
      let now = Utc::now();
      let lead = Lead {
        id: Uuid::new_v4().to_string(),
        name: draft.name,
        email: draft.email,
        phone: draft.phone,
        source: draft.source,
        status: LeadStatus::New,
        score: None,
        assigned_to: draft.assigned_to,
        notes: draft.notes,
        created_at: now,
        updated_at: now,
      };
      self
        .leads
        .lock()
        .map_err(|e| eyre!("Lock poisoned: {}", e))?
        .push(lead.clone());
      Ok(lead)
    }

    async fn update_lead(&self, id: &str, patch: LeadPatch) -> Result<Lead> {
      self.check_writable()?;
      self.updates.fetch_add(1, Ordering::SeqCst);
      let mut leads = self.leads.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
      let lead = leads
        .iter_mut()
        .find(|l| l.id == id)
        .ok_or_else(|| eyre!("No lead with id {}", id))?;
      if let Some(status) = patch.status {
        lead.status = status;
      }
      if let Some(score) = patch.score {
        lead.score = score;
      }
      if let Some(notes) = patch.notes {
        lead.notes = notes;
      }
      lead.updated_at = Utc::now();
      Ok(lead.clone())
    }

    async fn delete_lead(&self, id: &str) -> Result<()> {
      self.check_writable()?;
      let mut leads = self.leads.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
      let before = leads.len();
      leads.retain(|l| l.id != id);
      if leads.len() == before {
        return Err(eyre!("No lead with id {}", id));
      }
      Ok(())
    }

    async fn fetch_opportunities(&self) -> Result<Vec<Opportunity>> {
      Ok(Vec::new())
    }
    async fn create_opportunity(&self, _draft: OpportunityDraft) -> Result<Opportunity> {
      Err(eyre!("not part of this fixture"))
    }
    async fn update_opportunity(&self, _id: &str, _patch: OpportunityPatch) -> Result<Opportunity> {
      Err(eyre!("not part of this fixture"))
    }
    async fn delete_opportunity(&self, _id: &str) -> Result<()> {
      Err(eyre!("not part of this fixture"))
    }

    async fn fetch_quotations(&self) -> Result<Vec<Quotation>> {
      Ok(Vec::new())
    }
    async fn create_quotation(&self, _draft: QuotationDraft) -> Result<Quotation> {
      Err(eyre!("not part of this fixture"))
    }
    async fn update_quotation(&self, _id: &str, _patch: QuotationPatch) -> Result<Quotation> {
      Err(eyre!("not part of this fixture"))
    }
    async fn delete_quotation(&self, _id: &str) -> Result<()> {
      Err(eyre!("not part of this fixture"))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn stub() -> StubCrm {
    StubCrm::seeded(Duration::ZERO)
  }

  #[tokio::test]
  async fn seeded_stub_serves_full_lists() {
    let stub = stub();
    assert_eq!(stub.fetch_accounts().await.unwrap().len(), 3);
    assert_eq!(stub.fetch_leads().await.unwrap().len(), 4);
    assert_eq!(stub.fetch_opportunities().await.unwrap().len(), 2);
    assert_eq!(stub.fetch_quotations().await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn create_lead_mints_id_and_defaults_status() {
    let stub = StubCrm::new(Duration::ZERO);
    let lead = stub
      .create_lead(LeadDraft {
        name: "Foo".into(),
        email: "foo@example.com".into(),
        phone: None,
        source: LeadSource::Web,
        assigned_to: None,
        notes: None,
      })
      .await
      .unwrap();

    assert!(!lead.id.is_empty());
    assert_eq!(lead.status, LeadStatus::New);
    assert_eq!(stub.fetch_leads().await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn update_lead_applies_patch_and_stamps_updated_at() {
    let stub = stub();
    let before = stub.fetch_leads().await.unwrap()[0].clone();

    let after = stub
      .update_lead(&before.id, LeadPatch::status(LeadStatus::Contacted))
      .await
      .unwrap();

    assert_eq!(after.status, LeadStatus::Contacted);
    assert_eq!(after.name, before.name);
    assert!(after.updated_at > before.updated_at);
  }

  #[tokio::test]
  async fn update_unknown_id_rejects() {
    let stub = stub();
    let err = stub
      .update_lead("missing", LeadPatch::default())
      .await
      .unwrap_err();
    assert!(err.to_string().contains("missing"));
  }

  #[tokio::test]
  async fn delete_removes_exactly_one_record() {
    let stub = stub();
    stub.delete_lead("lead-2").await.unwrap();

    let leads = stub.fetch_leads().await.unwrap();
    assert_eq!(leads.len(), 3);
    assert!(leads.iter().all(|l| l.id != "lead-2"));
  }

  #[tokio::test]
  async fn delete_unknown_id_rejects() {
    let stub = stub();
    assert!(stub.delete_quotation("missing").await.is_err());
  }

  #[tokio::test]
  async fn quotation_numbers_are_sequential() {
    let stub = stub();
    let draft = QuotationDraft {
      account_id: "acc-1".into(),
      opportunity_id: "opp-1".into(),
      total: 100.0,
      valid_until: Utc::now(),
      notes: None,
    };
    let a = stub.create_quotation(draft.clone()).await.unwrap();
    let b = stub.create_quotation(draft).await.unwrap();
    assert_eq!(a.number, "Q-0002");
    assert_eq!(b.number, "Q-0003");
  }
}
