//! Store access self-tests.
//!
//! # Responsibility
//! - Exercise each collection's insert/select path end to end.
//! - Remove every row a self-test created.
//! - Report health as `SelfTestReport` instead of propagating errors.
//!
//! # Invariants
//! - Self-tests that write rows require an authenticated caller; read-only
//!   checks succeed on the absence of a store error alone.
//! - Store error text is reported verbatim for the step under test; any
//!   other failure reports `Test failed`.
//! - Intended for disposable stores (in-memory or scratch databases).

use crate::auth::{Caller, UserId};
use crate::model::order::NewOrder;
use crate::model::quote::{NewQuote, QuoteId};
use crate::model::receipt::{NewReceipt, ReceiptStatus};
use crate::repo::catalog_repo::{CatalogRepository, SqliteCatalogRepository};
use crate::repo::order_repo::{OrderRepository, SqliteOrderRepository};
use crate::repo::quote_repo::{QuoteRepository, SqliteQuoteRepository};
use crate::repo::receipt_repo::{ReceiptRepository, SqliteReceiptRepository};
use crate::repo::{Collection, RepoError};
use log::{debug, error, info, warn};
use rusqlite::Connection;
use serde::Serialize;

pub const NO_AUTHENTICATED_USER: &str = "No authenticated user";
pub const TEST_FAILED: &str = "Test failed";
pub const TEST_QUOTE_FAILED: &str = "Failed to create test quote";
pub const TEST_ORDER_FAILED: &str = "Failed to create test order";

const TEST_TOTAL: f64 = 1000.0;

/// Outcome of one self-test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelfTestReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SelfTestReport {
    pub fn passed() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }
}

/// Report tagged with the self-test that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedReport {
    pub name: &'static str,
    #[serde(flatten)]
    pub report: SelfTestReport,
}

type SelfTest = fn(&Connection, &Caller) -> SelfTestReport;

const SELF_TESTS: [(&str, SelfTest); 6] = [
    ("quote_insertion", test_quote_insertion),
    ("order_insertion", test_order_insertion),
    ("receipt_insertion", test_receipt_insertion),
    ("catalog_access", test_catalog_access),
    ("template_access", test_template_access),
    ("preset_values_access", test_preset_values_access),
];

/// Runs every self-test in a fixed order.
pub fn run_all(conn: &Connection, caller: &Caller) -> Vec<NamedReport> {
    SELF_TESTS
        .iter()
        .map(|&(name, test)| NamedReport {
            name,
            report: test(conn, caller),
        })
        .collect()
}

/// Inserts one quote and deletes it again.
pub fn test_quote_insertion(conn: &Connection, caller: &Caller) -> SelfTestReport {
    run("quote_insertion", caller, |owner| {
        let quotes = SqliteQuoteRepository::try_new(conn).map_err(unexpected)?;
        let quote = quotes
            .insert_quote(owner, &sample_quote())
            .map_err(verbatim)?;
        quotes.delete_quote(quote.id).map_err(unexpected)
    })
}

/// Inserts a parent quote and one order, then removes both.
pub fn test_order_insertion(conn: &Connection, caller: &Caller) -> SelfTestReport {
    run("order_insertion", caller, |owner| {
        let quotes = SqliteQuoteRepository::try_new(conn).map_err(unexpected)?;
        let orders = SqliteOrderRepository::try_new(conn).map_err(unexpected)?;

        let quote_id = create_parent_quote(&quotes, owner)?;
        let outcome = orders
            .insert_order(&NewOrder::for_quote(quote_id, TEST_TOTAL))
            .map_err(verbatim)
            .and_then(|order| orders.delete_order(order.id).map_err(unexpected));

        cleanup_quote(&quotes, quote_id, outcome)
    })
}

/// Inserts a parent quote, an order and one receipt, then removes all three.
pub fn test_receipt_insertion(conn: &Connection, caller: &Caller) -> SelfTestReport {
    run("receipt_insertion", caller, |owner| {
        let quotes = SqliteQuoteRepository::try_new(conn).map_err(unexpected)?;
        let orders = SqliteOrderRepository::try_new(conn).map_err(unexpected)?;
        let receipts = SqliteReceiptRepository::try_new(conn).map_err(unexpected)?;

        let quote_id = create_parent_quote(&quotes, owner)?;
        let order = match orders.insert_order(&NewOrder::for_quote(quote_id, TEST_TOTAL)) {
            Ok(order) => order,
            Err(err) => {
                error!(
                    "event=self_test module=diagnostics status=error step=parent_order error={err}"
                );
                return cleanup_quote(&quotes, quote_id, Err(TEST_ORDER_FAILED.to_string()));
            }
        };

        let receipt = NewReceipt {
            order_id: order.id,
            payment_percentage: 50.0,
            amount: TEST_TOTAL / 2.0,
            status: ReceiptStatus::Draft,
        };
        let inserted = receipts.insert_receipt(&receipt).map(|_| ()).map_err(verbatim);
        // Receipts cascade with their order.
        let outcome = inserted.and_then(|()| orders.delete_order(order.id).map_err(unexpected));

        cleanup_quote(&quotes, quote_id, outcome)
    })
}

/// Bounded read of the categories collection.
pub fn test_catalog_access(conn: &Connection, _caller: &Caller) -> SelfTestReport {
    run_read_only("catalog_access", || {
        let catalog = SqliteCatalogRepository::try_new(conn).map_err(unexpected)?;
        catalog
            .probe(Collection::Categories, 1)
            .map(|_| ())
            .map_err(verbatim)
    })
}

/// Single-row read of the template settings.
pub fn test_template_access(conn: &Connection, _caller: &Caller) -> SelfTestReport {
    run_read_only("template_access", || {
        let catalog = SqliteCatalogRepository::try_new(conn).map_err(unexpected)?;
        catalog
            .probe_single(Collection::TemplateSettings)
            .map_err(verbatim)
    })
}

/// Single-row read of the preset values.
pub fn test_preset_values_access(conn: &Connection, _caller: &Caller) -> SelfTestReport {
    run_read_only("preset_values_access", || {
        let catalog = SqliteCatalogRepository::try_new(conn).map_err(unexpected)?;
        catalog
            .probe_single(Collection::PresetValues)
            .map_err(verbatim)
    })
}

fn run(
    name: &str,
    caller: &Caller,
    body: impl FnOnce(UserId) -> Result<(), String>,
) -> SelfTestReport {
    let Ok(user) = caller.require_user() else {
        warn!(
            "event=self_test module=diagnostics status=rejected test={name} reason=unauthenticated"
        );
        return SelfTestReport::failed(NO_AUTHENTICATED_USER);
    };

    debug!("event=self_test module=diagnostics status=start test={name}");
    report(name, body(user.id))
}

fn run_read_only(name: &str, body: impl FnOnce() -> Result<(), String>) -> SelfTestReport {
    debug!("event=self_test module=diagnostics status=start test={name} read_only=true");
    report(name, body())
}

fn report(name: &str, outcome: Result<(), String>) -> SelfTestReport {
    match outcome {
        Ok(()) => {
            info!("event=self_test module=diagnostics status=ok test={name}");
            SelfTestReport::passed()
        }
        Err(message) => {
            warn!("event=self_test module=diagnostics status=failed test={name}");
            SelfTestReport::failed(message)
        }
    }
}

fn sample_quote() -> NewQuote {
    NewQuote {
        client_name: "Self-test client".to_string(),
        email: "self-test@example.com".to_string(),
        phone: "000-000-0000".to_string(),
        project_name: "Self-test project".to_string(),
        installation_address: "Self-test address".to_string(),
        status: Default::default(),
        total: TEST_TOTAL,
        adjustment: Default::default(),
    }
}

fn create_parent_quote(quotes: &impl QuoteRepository, owner: UserId) -> Result<QuoteId, String> {
    quotes
        .insert_quote(owner, &sample_quote())
        .map(|quote| quote.id)
        .map_err(|err| {
            error!(
                "event=self_test module=diagnostics status=error step=parent_quote error={err}"
            );
            TEST_QUOTE_FAILED.to_string()
        })
}

/// Deletes the parent quote; the first failure wins.
fn cleanup_quote(
    quotes: &impl QuoteRepository,
    quote_id: QuoteId,
    outcome: Result<(), String>,
) -> Result<(), String> {
    let cleanup = quotes.delete_quote(quote_id).map_err(unexpected);
    outcome.and(cleanup)
}

fn verbatim(err: RepoError) -> String {
    error!("event=self_test module=diagnostics status=error error={err}");
    err.to_string()
}

fn unexpected(err: RepoError) -> String {
    error!("event=self_test module=diagnostics status=error unexpected=true error={err}");
    TEST_FAILED.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthUser;
    use crate::db::open_db_in_memory;
    use uuid::Uuid;

    #[test]
    fn anonymous_caller_fails_only_writing_tests() {
        let conn = open_db_in_memory().unwrap();
        let reports = run_all(&conn, &Caller::Anonymous);
        assert_eq!(reports.len(), 6);
        for named in &reports[..3] {
            assert_eq!(named.report, SelfTestReport::failed(NO_AUTHENTICATED_USER));
        }
        for named in &reports[3..] {
            assert_eq!(named.report, SelfTestReport::passed(), "{}", named.name);
        }
    }

    #[test]
    fn report_serializes_without_error_on_success() {
        let json = serde_json::to_value(SelfTestReport::passed()).unwrap();
        assert_eq!(json, serde_json::json!({"success": true}));

        let json = serde_json::to_value(SelfTestReport::failed("boom")).unwrap();
        assert_eq!(json, serde_json::json!({"success": false, "error": "boom"}));
    }

    #[test]
    fn missing_template_row_is_reported() {
        let conn = open_db_in_memory().unwrap();
        conn.execute("DELETE FROM template_settings;", []).unwrap();
        let caller = Caller::from(AuthUser::new(Uuid::new_v4()).with_role("admin"));

        let report = test_template_access(&conn, &caller);
        assert!(!report.success);
        assert_eq!(
            report.error.as_deref(),
            Some("expected 1 row(s) from template_settings, got 0")
        );
    }
}
