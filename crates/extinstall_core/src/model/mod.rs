//! Catalog domain models.
//!
//! # Responsibility
//! - Define data structures persisted by the extension catalog.
//! - Keep model-level invariants close to type definitions.
//!
//! # Invariants
//! - Models should remain serializable for manifest-cache and CLI output.
//! - Validation rules should be deterministic and side-effect free.

pub mod catalog;
pub mod extension;
