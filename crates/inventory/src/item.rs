use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, ItemId};

pub const NAME_MIN_CHARS: usize = 3;
pub const NAME_MAX_CHARS: usize = 255;
pub const DESCRIPTION_MAX_CHARS: usize = 1000;

/// A stock item as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub description: String,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User-supplied fields for a create or a full update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDraft {
    pub name: String,
    pub description: String,
    pub quantity: i64,
}

impl ItemDraft {
    pub fn new(name: impl Into<String>, description: impl Into<String>, quantity: i64) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            quantity,
        }
    }

    /// New items must start with stock on hand.
    pub fn validate_for_create(&self) -> DomainResult<()> {
        self.validate_text()?;
        if self.quantity <= 0 {
            return Err(DomainError::validation(format!(
                "quantity must be greater than zero, got {}",
                self.quantity
            )));
        }
        Ok(())
    }

    /// Updates may drain stock to zero but never below.
    pub fn validate_for_update(&self) -> DomainResult<()> {
        self.validate_text()?;
        if self.quantity < 0 {
            return Err(DomainError::validation(format!(
                "quantity must not be negative, got {}",
                self.quantity
            )));
        }
        Ok(())
    }

    fn validate_text(&self) -> DomainResult<()> {
        let name_len = self.name.chars().count();
        if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&name_len) {
            return Err(DomainError::validation(format!(
                "name must be between {NAME_MIN_CHARS} and {NAME_MAX_CHARS} characters, got {name_len}"
            )));
        }
        let description_len = self.description.chars().count();
        if description_len > DESCRIPTION_MAX_CHARS {
            return Err(DomainError::validation(format!(
                "description must be at most {DESCRIPTION_MAX_CHARS} characters, got {description_len}"
            )));
        }
        Ok(())
    }
}
