//! Receipt repository contracts and SQLite implementation.
//!
//! # Invariants
//! - `sent_at` is stamped by the store clock on transition to `sent` and
//!   cleared on transition back to `draft`.

use crate::model::order::OrderId;
use crate::model::receipt::{NewReceipt, Receipt, ReceiptId, ReceiptStatus};
use crate::model::validation::{EnumField, Schema};
use crate::repo::{
    ensure_connection_ready, parse_enum, parse_uuid, Collection, RepoError, RepoResult,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const RECEIPT_SELECT_SQL: &str = "SELECT
    id,
    order_id,
    payment_percentage,
    amount,
    status,
    sent_at,
    created_at
FROM receipts";

/// Repository interface for payment receipts.
pub trait ReceiptRepository {
    fn insert_receipt(&self, receipt: &NewReceipt) -> RepoResult<Receipt>;
    fn get_receipt(&self, id: ReceiptId) -> RepoResult<Option<Receipt>>;
    /// Receipts of one order, oldest first.
    fn list_receipts(&self, order_id: OrderId) -> RepoResult<Vec<Receipt>>;
    /// Moves a receipt to `status` and returns the updated row.
    fn update_receipt_status(&self, id: ReceiptId, status: ReceiptStatus)
        -> RepoResult<Receipt>;
}

/// SQLite-backed receipt repository.
pub struct SqliteReceiptRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteReceiptRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &[Collection::Orders, Collection::Receipts])?;
        Ok(Self { conn })
    }
}

impl ReceiptRepository for SqliteReceiptRepository<'_> {
    fn insert_receipt(&self, receipt: &NewReceipt) -> RepoResult<Receipt> {
        receipt.validate()?;

        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO receipts (
                id,
                order_id,
                payment_percentage,
                amount,
                status,
                sent_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                CASE WHEN ?5 = 'sent' THEN strftime('%Y-%m-%dT%H:%M:%fZ', 'now') END
            );",
            params![
                id.to_string(),
                receipt.order_id.to_string(),
                receipt.payment_percentage,
                receipt.amount,
                receipt.status.as_str(),
            ],
        )?;

        load_receipt(self.conn, id)?.ok_or(RepoError::NotFound {
            collection: Collection::Receipts,
            id,
        })
    }

    fn get_receipt(&self, id: ReceiptId) -> RepoResult<Option<Receipt>> {
        load_receipt(self.conn, id)
    }

    fn list_receipts(&self, order_id: OrderId) -> RepoResult<Vec<Receipt>> {
        load_receipts_for_order(self.conn, order_id)
    }

    fn update_receipt_status(
        &self,
        id: ReceiptId,
        status: ReceiptStatus,
    ) -> RepoResult<Receipt> {
        let changed = match status {
            ReceiptStatus::Sent => self.conn.execute(
                "UPDATE receipts
                 SET status = ?2,
                     sent_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1;",
                params![id.to_string(), status.as_str()],
            )?,
            ReceiptStatus::Draft => self.conn.execute(
                "UPDATE receipts SET status = ?2, sent_at = NULL WHERE id = ?1;",
                params![id.to_string(), status.as_str()],
            )?,
        };
        if changed == 0 {
            return Err(RepoError::NotFound {
                collection: Collection::Receipts,
                id,
            });
        }

        load_receipt(self.conn, id)?.ok_or(RepoError::NotFound {
            collection: Collection::Receipts,
            id,
        })
    }
}

fn load_receipt(conn: &Connection, id: ReceiptId) -> RepoResult<Option<Receipt>> {
    let mut stmt = conn.prepare(&format!("{RECEIPT_SELECT_SQL} WHERE id = ?1;"))?;
    let row = stmt
        .query_row([id.to_string()], |row| Ok(parse_receipt_row(row)))
        .optional()?;
    row.transpose()
}

/// Loads all receipts of one order; shared with the order join.
pub(crate) fn load_receipts_for_order(
    conn: &Connection,
    order_id: OrderId,
) -> RepoResult<Vec<Receipt>> {
    let mut stmt = conn.prepare(&format!(
        "{RECEIPT_SELECT_SQL} WHERE order_id = ?1 ORDER BY created_at ASC, rowid ASC;"
    ))?;
    let mut rows = stmt.query([order_id.to_string()])?;
    let mut receipts = Vec::new();
    while let Some(row) = rows.next()? {
        receipts.push(parse_receipt_row(row)?);
    }
    Ok(receipts)
}

fn parse_receipt_row(row: &Row<'_>) -> RepoResult<Receipt> {
    let id_text: String = row.get("id")?;
    let order_text: String = row.get("order_id")?;
    let status_text: String = row.get("status")?;
    Ok(Receipt {
        id: parse_uuid(&id_text, "receipts.id")?,
        order_id: parse_uuid(&order_text, "receipts.order_id")?,
        payment_percentage: row.get("payment_percentage")?,
        amount: row.get("amount")?,
        status: parse_enum(&status_text, "receipts.status")?,
        sent_at: row.get("sent_at")?,
        created_at: row.get("created_at")?,
    })
}
