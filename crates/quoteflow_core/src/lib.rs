//! Core data access for the QuoteFlow quoting back office.
//! This crate is the single source of truth for quote, order and receipt
//! invariants.

pub mod auth;
pub mod config;
pub mod db;
pub mod diagnostics;
pub mod logging;
pub mod model;
pub mod notify;
pub mod repo;
pub mod service;

pub use auth::{verify_auth_role, AuthError, AuthUser, Caller, Role, RoleVerification, Session};
pub use config::{load_config, ConfigError, QuoteFlowConfig};
pub use db::{open_db, open_db_in_memory, open_with_config, DbError};
pub use diagnostics::{run_all, NamedReport, SelfTestReport};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::order::{NewOrder, Order, OrderDetail, OrderStatus};
pub use model::quote::{AdjustmentType, NewItem, NewQuote, NewSpace, Quote, QuoteStatus};
pub use model::receipt::{NewReceipt, Receipt, ReceiptStatus};
pub use model::validation::{format_validation_errors, Schema, ValidationError};
pub use notify::{validate_form, LogNotifier, Notifier};
pub use repo::{RepoError, RepoResult};
pub use service::order_service::OrderService;
pub use service::quote_service::{CreateQuoteRequest, QuoteService};
pub use service::{ServiceError, ServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
