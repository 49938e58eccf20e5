//! Cache and query trait implementations for the CRM record types.

use chrono::{DateTime, Utc};

use crate::cache::Cacheable;
use crate::query::{Field, Queryable, SortKey, SortValue};

use super::types::{Account, EntityKind, Lead, Opportunity, Quotation};

// ============================================================================
// Cacheable implementations
// ============================================================================

impl Cacheable for Account {
  fn id(&self) -> &str {
    &self.id
  }

  fn updated_at(&self) -> DateTime<Utc> {
    self.updated_at
  }

  fn kind() -> EntityKind {
    EntityKind::Accounts
  }
}

impl Cacheable for Lead {
  fn id(&self) -> &str {
    &self.id
  }

  fn updated_at(&self) -> DateTime<Utc> {
    self.updated_at
  }

  fn kind() -> EntityKind {
    EntityKind::Leads
  }
}

impl Cacheable for Opportunity {
  fn id(&self) -> &str {
    &self.id
  }

  fn updated_at(&self) -> DateTime<Utc> {
    self.updated_at
  }

  fn kind() -> EntityKind {
    EntityKind::Opportunities
  }
}

impl Cacheable for Quotation {
  fn id(&self) -> &str {
    &self.id
  }

  fn updated_at(&self) -> DateTime<Utc> {
    self.updated_at
  }

  fn kind() -> EntityKind {
    EntityKind::Quotations
  }
}

// ============================================================================
// Queryable implementations
// ============================================================================

impl Queryable for Account {
  fn haystack(&self) -> Vec<&str> {
    vec![&self.name, &self.email]
  }

  fn field(&self, field: Field) -> Option<&str> {
    match field {
      Field::Status => Some(self.status.as_str()),
      Field::Kind => Some(self.kind.as_str()),
      _ => None,
    }
  }

  fn created_at(&self) -> DateTime<Utc> {
    self.created_at
  }

  fn sort_value(&self, key: SortKey) -> Option<SortValue<'_>> {
    match key {
      SortKey::Name => Some(SortValue::Text(&self.name)),
      SortKey::CreatedAt => Some(SortValue::Time(self.created_at)),
      SortKey::UpdatedAt => Some(SortValue::Time(self.updated_at)),
      _ => None,
    }
  }
}

impl Queryable for Lead {
  fn haystack(&self) -> Vec<&str> {
    vec![&self.name, &self.email]
  }

  fn field(&self, field: Field) -> Option<&str> {
    match field {
      Field::Status => Some(self.status.as_str()),
      Field::Source => Some(self.source.as_str()),
      Field::AssignedTo => self.assigned_to.as_deref(),
      _ => None,
    }
  }

  fn created_at(&self) -> DateTime<Utc> {
    self.created_at
  }

  fn sort_value(&self, key: SortKey) -> Option<SortValue<'_>> {
    match key {
      SortKey::Name => Some(SortValue::Text(&self.name)),
      SortKey::CreatedAt => Some(SortValue::Time(self.created_at)),
      SortKey::UpdatedAt => Some(SortValue::Time(self.updated_at)),
      SortKey::Score => self.score.map(|s| SortValue::Number(s as f64)),
      _ => None,
    }
  }
}

impl Queryable for Opportunity {
  fn haystack(&self) -> Vec<&str> {
    vec![&self.title]
  }

  fn field(&self, field: Field) -> Option<&str> {
    match field {
      Field::Stage => Some(self.stage.as_str()),
      Field::AccountId => Some(&self.account_id),
      _ => None,
    }
  }

  fn created_at(&self) -> DateTime<Utc> {
    self.created_at
  }

  fn sort_value(&self, key: SortKey) -> Option<SortValue<'_>> {
    match key {
      SortKey::Name => Some(SortValue::Text(&self.title)),
      SortKey::CreatedAt => Some(SortValue::Time(self.created_at)),
      SortKey::UpdatedAt => Some(SortValue::Time(self.updated_at)),
      SortKey::Value => Some(SortValue::Number(self.value)),
      SortKey::Probability => Some(SortValue::Number(self.probability as f64)),
      _ => None,
    }
  }
}

impl Queryable for Quotation {
  fn haystack(&self) -> Vec<&str> {
    vec![&self.number]
  }

  fn field(&self, field: Field) -> Option<&str> {
    match field {
      Field::Status => Some(self.status.as_str()),
      Field::AccountId => Some(&self.account_id),
      Field::OpportunityId => Some(&self.opportunity_id),
      _ => None,
    }
  }

  fn created_at(&self) -> DateTime<Utc> {
    self.created_at
  }

  fn sort_value(&self, key: SortKey) -> Option<SortValue<'_>> {
    match key {
      SortKey::Name => Some(SortValue::Text(&self.number)),
      SortKey::CreatedAt => Some(SortValue::Time(self.created_at)),
      SortKey::UpdatedAt => Some(SortValue::Time(self.updated_at)),
      SortKey::Total => Some(SortValue::Number(self.total)),
      _ => None,
    }
  }
}
