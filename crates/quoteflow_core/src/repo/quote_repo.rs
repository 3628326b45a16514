//! Quote/space/item repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Insert and read quotes together with their nested spaces and items.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Inserts validate input before SQL and return the stored row.
//! - Spaces and items keep caller order through a zero-based `position`.
//! - Lists are newest first (`created_at DESC, rowid DESC`).

use crate::auth::UserId;
use crate::model::quote::{
    Adjustment, Item, NewItem, NewQuote, NewSpace, Quote, QuoteId, Space, SpaceId,
};
use crate::model::validation::{EnumField, Schema};
use crate::repo::{
    ensure_connection_ready, next_position, parse_enum, parse_uuid, Collection, RepoError,
    RepoResult,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const QUOTE_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    client_name,
    email,
    phone,
    project_name,
    installation_address,
    status,
    total,
    adjustment_type,
    adjustment_percentage,
    adjusted_total,
    created_at,
    updated_at
FROM quotes";

const SPACE_SELECT_SQL: &str = "SELECT id, quote_id, name, position, created_at FROM spaces";

const ITEM_SELECT_SQL: &str = "SELECT
    id,
    space_id,
    product_id,
    material,
    width,
    height,
    depth,
    price,
    position,
    created_at
FROM items";

/// Repository interface for quotes and their nested rows.
pub trait QuoteRepository {
    /// Inserts one quote owned by `owner` and returns the stored row.
    fn insert_quote(&self, owner: UserId, quote: &NewQuote) -> RepoResult<Quote>;
    /// Inserts one space under `quote_id`. Nested items are not written.
    fn insert_space(&self, quote_id: QuoteId, space: &NewSpace) -> RepoResult<Space>;
    /// Inserts one item under `space_id`.
    fn insert_item(&self, space_id: SpaceId, item: &NewItem) -> RepoResult<Item>;
    fn get_quote(&self, id: QuoteId) -> RepoResult<Option<Quote>>;
    fn list_quotes(&self) -> RepoResult<Vec<Quote>>;
    fn list_spaces(&self, quote_id: QuoteId) -> RepoResult<Vec<Space>>;
    fn list_items(&self, space_id: SpaceId) -> RepoResult<Vec<Item>>;
    /// Deletes one quote; spaces and items cascade.
    fn delete_quote(&self, id: QuoteId) -> RepoResult<()>;
}

/// SQLite-backed quote repository.
///
/// Accepts a plain connection or a transaction (through deref), which is how
/// the quote workflow groups its inserts.
pub struct SqliteQuoteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteQuoteRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &[Collection::Quotes, Collection::Spaces, Collection::Items],
        )?;
        Ok(Self { conn })
    }
}

impl QuoteRepository for SqliteQuoteRepository<'_> {
    fn insert_quote(&self, owner: UserId, quote: &NewQuote) -> RepoResult<Quote> {
        quote.validate()?;

        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO quotes (
                id,
                user_id,
                client_name,
                email,
                phone,
                project_name,
                installation_address,
                status,
                total,
                adjustment_type,
                adjustment_percentage,
                adjusted_total
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
            params![
                id.to_string(),
                owner.to_string(),
                quote.client_name.as_str(),
                quote.email.as_str(),
                quote.phone.as_str(),
                quote.project_name.as_str(),
                quote.installation_address.as_str(),
                quote.status.as_str(),
                quote.total,
                quote.adjustment.adjustment_type.map(EnumField::as_str),
                quote.adjustment.adjustment_percentage,
                quote.adjustment.adjusted_total,
            ],
        )?;

        load_quote(self.conn, id)?.ok_or(RepoError::NotFound {
            collection: Collection::Quotes,
            id,
        })
    }

    fn insert_space(&self, quote_id: QuoteId, space: &NewSpace) -> RepoResult<Space> {
        space.validate()?;

        let id = Uuid::new_v4();
        let position = next_position(self.conn, Collection::Spaces, "quote_id", quote_id)?;
        self.conn.execute(
            "INSERT INTO spaces (id, quote_id, name, position) VALUES (?1, ?2, ?3, ?4);",
            params![
                id.to_string(),
                quote_id.to_string(),
                space.name.as_str(),
                position
            ],
        )?;

        let mut stmt = self
            .conn
            .prepare(&format!("{SPACE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => parse_space_row(row),
            None => Err(RepoError::NotFound {
                collection: Collection::Spaces,
                id,
            }),
        }
    }

    fn insert_item(&self, space_id: SpaceId, item: &NewItem) -> RepoResult<Item> {
        item.validate()?;

        let id = Uuid::new_v4();
        let position = next_position(self.conn, Collection::Items, "space_id", space_id)?;
        self.conn.execute(
            "INSERT INTO items (
                id,
                space_id,
                product_id,
                material,
                width,
                height,
                depth,
                price,
                position
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                id.to_string(),
                space_id.to_string(),
                item.product_id.as_str(),
                item.material.as_str(),
                item.width,
                item.height,
                item.depth,
                item.price,
                position,
            ],
        )?;

        let mut stmt = self
            .conn
            .prepare(&format!("{ITEM_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => parse_item_row(row),
            None => Err(RepoError::NotFound {
                collection: Collection::Items,
                id,
            }),
        }
    }

    fn get_quote(&self, id: QuoteId) -> RepoResult<Option<Quote>> {
        load_quote(self.conn, id)
    }

    fn list_quotes(&self) -> RepoResult<Vec<Quote>> {
        let mut stmt = self.conn.prepare(&format!(
            "{QUOTE_SELECT_SQL} ORDER BY created_at DESC, rowid DESC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut quotes = Vec::new();
        while let Some(row) = rows.next()? {
            quotes.push(parse_quote_row(row)?);
        }
        Ok(quotes)
    }

    fn list_spaces(&self, quote_id: QuoteId) -> RepoResult<Vec<Space>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SPACE_SELECT_SQL} WHERE quote_id = ?1 ORDER BY position ASC;"
        ))?;
        let mut rows = stmt.query([quote_id.to_string()])?;
        let mut spaces = Vec::new();
        while let Some(row) = rows.next()? {
            spaces.push(parse_space_row(row)?);
        }
        Ok(spaces)
    }

    fn list_items(&self, space_id: SpaceId) -> RepoResult<Vec<Item>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ITEM_SELECT_SQL} WHERE space_id = ?1 ORDER BY position ASC;"
        ))?;
        let mut rows = stmt.query([space_id.to_string()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }
        Ok(items)
    }

    fn delete_quote(&self, id: QuoteId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM quotes WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                collection: Collection::Quotes,
                id,
            });
        }
        Ok(())
    }
}

/// Loads one quote row; shared with the order join.
pub(crate) fn load_quote(conn: &Connection, id: QuoteId) -> RepoResult<Option<Quote>> {
    let mut stmt = conn.prepare(&format!("{QUOTE_SELECT_SQL} WHERE id = ?1;"))?;
    let row = stmt
        .query_row([id.to_string()], |row| Ok(parse_quote_row(row)))
        .optional()?;
    row.transpose()
}

fn parse_quote_row(row: &Row<'_>) -> RepoResult<Quote> {
    let id_text: String = row.get("id")?;
    let user_text: String = row.get("user_id")?;
    let status_text: String = row.get("status")?;
    let adjustment_type = match row.get::<_, Option<String>>("adjustment_type")? {
        Some(value) => Some(parse_enum(&value, "quotes.adjustment_type")?),
        None => None,
    };

    Ok(Quote {
        id: parse_uuid(&id_text, "quotes.id")?,
        user_id: parse_uuid(&user_text, "quotes.user_id")?,
        client_name: row.get("client_name")?,
        email: row.get("email")?,
        phone: row.get("phone")?,
        project_name: row.get("project_name")?,
        installation_address: row.get("installation_address")?,
        status: parse_enum(&status_text, "quotes.status")?,
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

fn parse_space_row(row: &Row<'_>) -> RepoResult<Space> {
    let id_text: String = row.get("id")?;
    let quote_text: String = row.get("quote_id")?;
    Ok(Space {
        id: parse_uuid(&id_text, "spaces.id")?,
        quote_id: parse_uuid(&quote_text, "spaces.quote_id")?,
        name: row.get("name")?,
        position: row.get("position")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_item_row(row: &Row<'_>) -> RepoResult<Item> {
    let id_text: String = row.get("id")?;
    let space_text: String = row.get("space_id")?;
    Ok(Item {
        id: parse_uuid(&id_text, "items.id")?,
        space_id: parse_uuid(&space_text, "items.space_id")?,
        product_id: row.get("product_id")?,
        material: row.get("material")?,
        width: row.get("width")?,
        height: row.get("height")?,
        depth: row.get("depth")?,
        price: row.get("price")?,
        position: row.get("position")?,
        created_at: row.get("created_at")?,
    })
}
