//! Order repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Insert orders derived from quotes.
//! - Read orders joined with their source quote and receipts.
//!
//! # Invariants
//! - Orders reference an existing quote; the store rejects dangling ids.
//! - Lists are newest first (`created_at DESC, rowid DESC`).
//! - Deleting an order cascades to its receipts.

use crate::model::order::{NewOrder, Order, OrderDetail, OrderId};
use crate::model::quote::Adjustment;
use crate::model::validation::{EnumField, Schema};
use crate::repo::quote_repo::load_quote;
use crate::repo::receipt_repo::load_receipts_for_order;
use crate::repo::{
    ensure_connection_ready, parse_enum, parse_uuid, Collection, RepoError, RepoResult,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const ORDER_SELECT_SQL: &str = "SELECT
    id,
    quote_id,
    status,
    total,
    adjustment_type,
    adjustment_percentage,
    adjusted_total,
    created_at,
    updated_at
FROM orders";

/// Repository interface for orders.
pub trait OrderRepository {
    fn insert_order(&self, order: &NewOrder) -> RepoResult<Order>;
    /// Order with its quote and receipts, or `None` when absent.
    fn get_order(&self, id: OrderId) -> RepoResult<Option<OrderDetail>>;
    fn list_orders(&self) -> RepoResult<Vec<OrderDetail>>;
    fn delete_order(&self, id: OrderId) -> RepoResult<()>;
}

/// SQLite-backed order repository.
pub struct SqliteOrderRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteOrderRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &[Collection::Quotes, Collection::Orders, Collection::Receipts],
        )?;
        Ok(Self { conn })
    }

    fn detail(&self, order: Order) -> RepoResult<OrderDetail> {
        let quote = load_quote(self.conn, order.quote_id)?;
        let receipts = load_receipts_for_order(self.conn, order.id)?;
        Ok(OrderDetail {
            order,
            quote,
            receipts,
        })
    }
}

impl OrderRepository for SqliteOrderRepository<'_> {
    fn insert_order(&self, order: &NewOrder) -> RepoResult<Order> {
        order.validate()?;

        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO orders (
                id,
                quote_id,
                status,
                total,
                adjustment_type,
                adjustment_percentage,
                adjusted_total
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                id.to_string(),
                order.quote_id.to_string(),
                order.status.as_str(),
                order.total,
                order.adjustment.adjustment_type.map(EnumField::as_str),
                order.adjustment.adjustment_percentage,
                order.adjustment.adjusted_total,
            ],
        )?;

        load_order(self.conn, id)?.ok_or(RepoError::NotFound {
            collection: Collection::Orders,
            id,
        })
    }

    fn get_order(&self, id: OrderId) -> RepoResult<Option<OrderDetail>> {
        match load_order(self.conn, id)? {
            Some(order) => self.detail(order).map(Some),
            None => Ok(None),
        }
    }

    fn list_orders(&self) -> RepoResult<Vec<OrderDetail>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ORDER_SELECT_SQL} ORDER BY created_at DESC, rowid DESC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut orders = Vec::new();
        while let Some(row) = rows.next()? {
            orders.push(parse_order_row(row)?);
        }

        orders.into_iter().map(|order| self.detail(order)).collect()
    }

    fn delete_order(&self, id: OrderId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM orders WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                collection: Collection::Orders,
                id,
            });
        }
        Ok(())
    }
}

fn load_order(conn: &Connection, id: OrderId) -> RepoResult<Option<Order>> {
    let mut stmt = conn.prepare(&format!("{ORDER_SELECT_SQL} WHERE id = ?1;"))?;
    let row = stmt
        .query_row([id.to_string()], |row| Ok(parse_order_row(row)))
        .optional()?;
    row.transpose()
}

fn parse_order_row(row: &Row<'_>) -> RepoResult<Order> {
    let id_text: String = row.get("id")?;
    let quote_text: String = row.get("quote_id")?;
    let status_text: String = row.get("status")?;
    let adjustment_type = match row.get::<_, Option<String>>("adjustment_type")? {
        Some(value) => Some(parse_enum(&value, "orders.adjustment_type")?),
        None => None,
    };

    Ok(Order {
        id: parse_uuid(&id_text, "orders.id")?,
        quote_id: parse_uuid(&quote_text, "orders.quote_id")?,
        status: parse_enum(&status_text, "orders.status")?,
        total: row.get("total")?,
        adjustment: Adjustment {
            adjustment_type,
            adjustment_percentage: row.get("adjustment_percentage")?,
            adjusted_total: row.get("adjusted_total")?,
        },
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
