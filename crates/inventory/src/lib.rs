//! Inventory domain: items, drafts and the audit ledger's row types.
//!
//! Deterministic domain logic only (no IO, no HTTP, no storage).

pub mod history;
pub mod item;

pub use history::{ItemHistory, ItemSnapshot, Operation, UnknownOperation};
pub use item::{
    DESCRIPTION_MAX_CHARS, Item, ItemDraft, NAME_MAX_CHARS, NAME_MIN_CHARS,
};
