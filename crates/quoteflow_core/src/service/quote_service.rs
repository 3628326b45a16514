//! Quote creation workflow and quote reads.
//!
//! # Responsibility
//! - Validate a quote with its nested spaces and items as one request.
//! - Write the quote tree in dependency order inside one store transaction.
//! - Read quotes back, alone or with their spaces and items.
//!
//! # Invariants
//! - The caller is authenticated before validation runs.
//! - A tree of N spaces with M_i items issues exactly `1 + N + sum(M_i)`
//!   inserts: quote, then each space followed by its items.
//! - Any failed insert rolls the whole tree back; no orphaned rows remain.

use crate::auth::{Caller, UserId};
use crate::model::quote::{Item, NewQuote, NewSpace, Quote, QuoteId, Space};
use crate::model::validation::{ObjectReader, Schema, ValidationError, ViolationSink};
use crate::repo::quote_repo::{QuoteRepository, SqliteQuoteRepository};
use crate::repo::{Collection, RepoError};
use crate::service::{
    require_user, ServiceError, ServiceResult, WorkflowStep, WorkflowStepError,
};
use log::{debug, error, info};
use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const CREATE_QUOTE: &str = "create quote";
const GET_QUOTE: &str = "get quote";
const LIST_QUOTES: &str = "list quotes";

/// Quote payload plus its ordered spaces, each with ordered items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateQuoteRequest {
    #[serde(flatten)]
    pub quote: NewQuote,
    #[serde(default)]
    pub spaces: Vec<NewSpace>,
}

impl CreateQuoteRequest {
    pub fn new(quote: NewQuote) -> Self {
        Self {
            quote,
            spaces: Vec::new(),
        }
    }

    pub fn with_space(mut self, space: NewSpace) -> Self {
        self.spaces.push(space);
        self
    }
}

impl Schema for CreateQuoteRequest {
    fn parse_at(value: &Value, path: &str) -> Result<Self, ValidationError> {
        // A non-object root is already a single violation from the quote parser.
        if !value.is_object() {
            return NewQuote::parse_at(value, path).map(Self::new);
        }

        let quote = NewQuote::parse_at(value, path);

        let mut reader = ObjectReader::new(value, path);
        let mut spaces = Vec::new();
        for (index, raw_space) in reader.optional_array("spaces").iter().enumerate() {
            let space_path = reader.path(&format!("spaces.{index}"));
            match NewSpace::parse_at(raw_space, &space_path) {
                Ok(space) => spaces.push(space),
                Err(err) => reader.absorb(err),
            }
        }

        match (quote, reader.finish()) {
            (Ok(quote), Ok(())) => Ok(Self { quote, spaces }),
            (Ok(_), Err(err)) | (Err(err), Ok(())) => Err(err),
            (Err(quote_err), Err(space_err)) => {
                let mut violations = quote_err.violations().to_vec();
                violations.extend_from_slice(space_err.violations());
                Err(ValidationError::new(violations))
            }
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let mut sink = ViolationSink::default();
        if let Err(err) = self.quote.validate() {
            sink.absorb("", err);
        }
        for (index, space) in self.spaces.iter().enumerate() {
            if let Err(err) = space.validate() {
                sink.absorb(&format!("spaces.{index}"), err);
            }
        }
        sink.finish()
    }
}

/// A [`CreateQuoteRequest`] that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedQuoteTree {
    request: CreateQuoteRequest,
}

impl ValidatedQuoteTree {
    pub fn quote(&self) -> &NewQuote {
        &self.request.quote
    }

    pub fn spaces(&self) -> &[NewSpace] {
        &self.request.spaces
    }

    pub fn item_count(&self) -> usize {
        self.request.spaces.iter().map(|space| space.items.len()).sum()
    }

    /// Number of inserts the workflow issues for this tree.
    pub fn insert_count(&self) -> usize {
        1 + self.request.spaces.len() + self.item_count()
    }
}

impl TryFrom<CreateQuoteRequest> for ValidatedQuoteTree {
    type Error = ValidationError;

    fn try_from(request: CreateQuoteRequest) -> Result<Self, Self::Error> {
        request.validate()?;
        Ok(Self { request })
    }
}

/// Writes the quote, then each space followed by its items.
///
/// Stops at the first failure and reports which step failed. Callers that
/// need all-or-nothing semantics run this inside a transaction.
pub fn write_quote_tree<R: QuoteRepository + ?Sized>(
    repo: &R,
    owner: UserId,
    tree: &ValidatedQuoteTree,
) -> Result<Quote, WorkflowStepError> {
    let quote = repo
        .insert_quote(owner, tree.quote())
        .map_err(|err| WorkflowStepError::new(WorkflowStep::InsertQuote, err))?;

    for (space_index, space) in tree.spaces().iter().enumerate() {
        let stored_space = repo.insert_space(quote.id, space).map_err(|err| {
            WorkflowStepError::new(WorkflowStep::InsertSpace { space: space_index }, err)
        })?;

        for (item_index, item) in space.items.iter().enumerate() {
            repo.insert_item(stored_space.id, item).map_err(|err| {
                WorkflowStepError::new(
                    WorkflowStep::InsertItem {
                        space: space_index,
                        item: item_index,
                    },
                    err,
                )
            })?;
        }
    }

    Ok(quote)
}

/// Space with its ordered items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceTree {
    #[serde(flatten)]
    pub space: Space,
    pub items: Vec<Item>,
}

/// Quote with its ordered spaces and items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteTree {
    #[serde(flatten)]
    pub quote: Quote,
    pub spaces: Vec<SpaceTree>,
}

/// Quote use-cases over one SQLite connection.
pub struct QuoteService<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> QuoteService<'conn> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }

    /// Creates a quote with its spaces and items as one unit.
    ///
    /// Returns only the created quote row.
    pub fn create_quote(
        &mut self,
        caller: &Caller,
        request: CreateQuoteRequest,
    ) -> ServiceResult<Quote> {
        let user = require_user(caller, "quote_create", CREATE_QUOTE)?;
        let owner = user.id;
        debug!(
            "event=quote_create module=service status=start user_id={} role={}",
            owner,
            user.role().unwrap_or("none")
        );

        let tree = ValidatedQuoteTree::try_from(request).map_err(|err| {
            error!(
                "event=quote_create module=service status=error reason=validation fields={}",
                err.fields().join(",")
            );
            ServiceError::Validation(err)
        })?;

        let quote = self
            .write_tree_atomically(owner, &tree)
            .map_err(|err| {
                error!(
                    "event=quote_create module=service status=error step={} error={}",
                    err.step, err.source
                );
                match err.source {
                    RepoError::Validation(violations) => ServiceError::Validation(violations),
                    _ => ServiceError::WorkflowStep {
                        operation: CREATE_QUOTE,
                        source: err,
                    },
                }
            })?;

        info!(
            "event=quote_create module=service status=ok quote_id={} spaces={} items={}",
            quote.id,
            tree.spaces().len(),
            tree.item_count()
        );
        Ok(quote)
    }

    fn write_tree_atomically(
        &mut self,
        owner: UserId,
        tree: &ValidatedQuoteTree,
    ) -> Result<Quote, WorkflowStepError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| WorkflowStepError::new(WorkflowStep::Begin, err))?;

        // Dropping `tx` on an early return rolls back every insert.
        let quote = {
            let repo = SqliteQuoteRepository::try_new(&tx)
                .map_err(|err| WorkflowStepError::new(WorkflowStep::Begin, err))?;
            write_quote_tree(&repo, owner, tree)?
        };

        tx.commit()
            .map_err(|err| WorkflowStepError::new(WorkflowStep::Commit, err))?;
        Ok(quote)
    }

    /// Gets one quote by id; a missing quote is a store failure.
    pub fn get_quote(&self, caller: &Caller, id: QuoteId) -> ServiceResult<Quote> {
        require_user(caller, "quote_get", GET_QUOTE)?;
        let repo = self.repo(GET_QUOTE)?;
        repo.get_quote(id)
            .and_then(|quote| {
                quote.ok_or(RepoError::NotFound {
                    collection: Collection::Quotes,
                    id,
                })
            })
            .map_err(|err| log_store_error("quote_get", GET_QUOTE, err))
    }

    /// Lists quotes, newest first.
    pub fn list_quotes(&self, caller: &Caller) -> ServiceResult<Vec<Quote>> {
        require_user(caller, "quote_list", LIST_QUOTES)?;
        let repo = self.repo(LIST_QUOTES)?;
        repo.list_quotes()
            .map_err(|err| log_store_error("quote_list", LIST_QUOTES, err))
    }

    /// Gets one quote with its spaces and items in stored order.
    pub fn get_quote_tree(&self, caller: &Caller, id: QuoteId) -> ServiceResult<QuoteTree> {
        let quote = self.get_quote(caller, id)?;
        let repo = self.repo(GET_QUOTE)?;

        let load = || -> Result<Vec<SpaceTree>, RepoError> {
            let mut spaces = Vec::new();
            for space in repo.list_spaces(id)? {
                let items = repo.list_items(space.id)?;
                spaces.push(SpaceTree { space, items });
            }
            Ok(spaces)
        };
        let spaces = load().map_err(|err| log_store_error("quote_get", GET_QUOTE, err))?;

        Ok(QuoteTree { quote, spaces })
    }

    fn repo(&self, operation: &'static str) -> ServiceResult<SqliteQuoteRepository<'_>> {
        SqliteQuoteRepository::try_new(&*self.conn)
            .map_err(|err| ServiceError::store(operation, err))
    }
}

fn log_store_error(event: &str, operation: &'static str, err: RepoError) -> ServiceError {
    error!("event={event} module=service status=error error={err}");
    ServiceError::store(operation, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn quote_json() -> Value {
        json!({
            "client_name": "Acme",
            "email": "buyer@acme.test",
            "phone": "555",
            "project_name": "Kitchen",
            "installation_address": "1 Main St",
            "total": 1200.0
        })
    }

    #[test]
    fn parses_nested_spaces_and_items() {
        let mut value = quote_json();
        value["spaces"] = json!([
            {"name": "Kitchen", "items": [
                {"product_id": "p1", "material": "oak", "width": 1, "height": 2, "depth": 3, "price": 10}
            ]},
            {"name": "Pantry"}
        ]);

        let request = CreateQuoteRequest::parse(&value).unwrap();
        assert_eq!(request.spaces.len(), 2);
        assert_eq!(request.spaces[0].items.len(), 1);
        assert!(request.spaces[1].items.is_empty());

        let tree = ValidatedQuoteTree::try_from(request).unwrap();
        assert_eq!(tree.insert_count(), 4);
    }

    #[test]
    fn nested_violations_carry_full_paths() {
        let mut value = quote_json();
        value["email"] = json!("bad-email");
        value["spaces"] = json!([
            {"name": "Kitchen", "items": [
                {"product_id": "p1", "material": "oak", "width": 1, "height": 2, "depth": 3, "price": 10},
                {"product_id": "p2", "material": "oak", "width": 1, "height": 2, "depth": 3, "price": 0}
            ]},
            {"name": ""}
        ]);

        let err = CreateQuoteRequest::parse(&value).unwrap_err();
        assert_eq!(
            err.fields(),
            vec!["email", "spaces.0.items.1.price", "spaces.1.name"]
        );
        assert_eq!(
            err.message_for("spaces.0.items.1.price"),
            Some("Price must be greater than 0")
        );
    }

    #[test]
    fn non_object_request_reports_one_violation() {
        let err = CreateQuoteRequest::parse(&json!("quote")).unwrap_err();
        assert_eq!(err.violations().len(), 1);
        assert_eq!(err.message_for(""), Some("Expected object, received string"));
    }

    #[test]
    fn typed_validation_prefixes_space_paths() {
        let quote = NewQuote::parse(&quote_json()).unwrap();
        let request = CreateQuoteRequest::new(quote).with_space(NewSpace::new(""));
        let err = ValidatedQuoteTree::try_from(request).unwrap_err();
        assert_eq!(err.fields(), vec!["spaces.0.name"]);
    }
}
