//! Quoting domain model.
//!
//! # Responsibility
//! - Define input shapes (`New*`) validated before any store write.
//! - Define stored row shapes returned by repositories.
//!
//! # Invariants
//! - Every row is identified by a stable UUID.
//! - Monetary fields are strictly positive; percentages stay in `[0, 100]`.

pub mod order;
pub mod quote;
pub mod receipt;
pub mod validation;
