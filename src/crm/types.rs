use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The four record categories the cache keeps a map for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
  Accounts,
  Leads,
  Opportunities,
  Quotations,
}

impl EntityKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      EntityKind::Accounts => "accounts",
      EntityKind::Leads => "leads",
      EntityKind::Opportunities => "opportunities",
      EntityKind::Quotations => "quotations",
    }
  }
}

impl std::fmt::Display for EntityKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
  Customer,
  Prospect,
  Partner,
}

impl AccountKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      AccountKind::Customer => "customer",
      AccountKind::Prospect => "prospect",
      AccountKind::Partner => "partner",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
  Active,
  Inactive,
}

impl AccountStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      AccountStatus::Active => "active",
      AccountStatus::Inactive => "inactive",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadSource {
  Web,
  Referral,
  Ads,
  Event,
  ColdCall,
}

impl LeadSource {
  pub fn as_str(&self) -> &'static str {
    match self {
      LeadSource::Web => "web",
      LeadSource::Referral => "referral",
      LeadSource::Ads => "ads",
      LeadSource::Event => "event",
      LeadSource::ColdCall => "cold_call",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
  New,
  Contacted,
  Qualified,
  Unqualified,
  Converted,
}

impl LeadStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      LeadStatus::New => "new",
      LeadStatus::Contacted => "contacted",
      LeadStatus::Qualified => "qualified",
      LeadStatus::Unqualified => "unqualified",
      LeadStatus::Converted => "converted",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityStage {
  Prospecting,
  Qualification,
  Proposal,
  Negotiation,
  ClosedWon,
  ClosedLost,
}

impl OpportunityStage {
  pub fn as_str(&self) -> &'static str {
    match self {
      OpportunityStage::Prospecting => "prospecting",
      OpportunityStage::Qualification => "qualification",
      OpportunityStage::Proposal => "proposal",
      OpportunityStage::Negotiation => "negotiation",
      OpportunityStage::ClosedWon => "closed_won",
      OpportunityStage::ClosedLost => "closed_lost",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
  Draft,
  Sent,
  Accepted,
  Rejected,
  Expired,
}

impl QuotationStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      QuotationStatus::Draft => "draft",
      QuotationStatus::Sent => "sent",
      QuotationStatus::Accepted => "accepted",
      QuotationStatus::Rejected => "rejected",
      QuotationStatus::Expired => "expired",
    }
  }
}

/// A company or organization the CRM tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
  pub id: String,
  pub name: String,
  pub email: String,
  pub phone: Option<String>,
  pub kind: AccountKind,
  pub status: AccountStatus,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// An unconverted sales contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
  pub id: String,
  pub name: String,
  pub email: String,
  pub phone: Option<String>,
  pub source: LeadSource,
  pub status: LeadStatus,
  /// Qualification score, 0-100
  pub score: Option<u32>,
  pub assigned_to: Option<String>,
  pub notes: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// A potential deal attached to an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
  pub id: String,
  pub title: String,
  /// References an Account id; not validated by the cache layer
  pub account_id: String,
  pub value: f64,
  pub stage: OpportunityStage,
  /// Win probability, 0-100
  pub probability: u32,
  pub expected_close_date: DateTime<Utc>,
  pub notes: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// A priced offer derived from an opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quotation {
  pub id: String,
  pub number: String,
  pub account_id: String,
  pub opportunity_id: String,
  pub total: f64,
  pub status: QuotationStatus,
  pub valid_until: DateTime<Utc>,
  pub notes: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating an account.
#[derive(Debug, Clone)]
pub struct AccountDraft {
  pub name: String,
  pub email: String,
  pub phone: Option<String>,
  pub kind: AccountKind,
  pub status: AccountStatus,
}

/// Fields accepted when creating a lead.
#[derive(Debug, Clone)]
pub struct LeadDraft {
  pub name: String,
  pub email: String,
  pub phone: Option<String>,
  pub source: LeadSource,
  pub assigned_to: Option<String>,
  pub notes: Option<String>,
}

/// Fields accepted when creating an opportunity.
#[derive(Debug, Clone)]
pub struct OpportunityDraft {
  pub title: String,
  pub account_id: String,
  pub value: f64,
  pub stage: OpportunityStage,
  pub probability: u32,
  pub expected_close_date: DateTime<Utc>,
  pub notes: Option<String>,
}

/// Fields accepted when creating a quotation.
#[derive(Debug, Clone)]
pub struct QuotationDraft {
  pub account_id: String,
  pub opportunity_id: String,
  pub total: f64,
  pub valid_until: DateTime<Utc>,
  pub notes: Option<String>,
}

/// Partial update for an account. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct AccountPatch {
  pub name: Option<String>,
  pub email: Option<String>,
  pub phone: Option<Option<String>>,
  pub kind: Option<AccountKind>,
  pub status: Option<AccountStatus>,
}

/// Partial update for a lead.
#[derive(Debug, Clone, Default)]
pub struct LeadPatch {
  pub name: Option<String>,
  pub email: Option<String>,
  pub phone: Option<Option<String>>,
  pub source: Option<LeadSource>,
  pub status: Option<LeadStatus>,
  pub score: Option<Option<u32>>,
  pub assigned_to: Option<Option<String>>,
  pub notes: Option<Option<String>>,
}

impl LeadPatch {
  /// Patch that only moves the lead to a new status.
  pub fn status(status: LeadStatus) -> Self {
    Self {
      status: Some(status),
      ..Self::default()
    }
  }
}

/// Partial update for an opportunity.
#[derive(Debug, Clone, Default)]
pub struct OpportunityPatch {
  pub title: Option<String>,
  pub value: Option<f64>,
  pub stage: Option<OpportunityStage>,
  pub probability: Option<u32>,
  pub expected_close_date: Option<DateTime<Utc>>,
  pub notes: Option<Option<String>>,
}

/// Partial update for a quotation.
#[derive(Debug, Clone, Default)]
pub struct QuotationPatch {
  pub total: Option<f64>,
  pub status: Option<QuotationStatus>,
  pub valid_until: Option<DateTime<Utc>>,
  pub notes: Option<Option<String>>,
}
