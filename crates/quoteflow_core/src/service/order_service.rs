//! Order and receipt use-case service.
//!
//! # Responsibility
//! - Create orders and receipts from validated input.
//! - Read orders joined with their quote and receipts.
//! - Move receipts between `draft` and `sent`.
//!
//! # Invariants
//! - Every operation requires an authenticated caller.
//! - Store failures are logged, then returned as `Failed to <operation>`.

use crate::auth::Caller;
use crate::model::order::{NewOrder, Order, OrderDetail, OrderId};
use crate::model::receipt::{NewReceipt, Receipt, ReceiptId, ReceiptStatus};
use crate::model::validation::{EnumField, Schema};
use crate::repo::order_repo::OrderRepository;
use crate::repo::receipt_repo::ReceiptRepository;
use crate::repo::{Collection, RepoError};
use crate::service::{require_user, ServiceError, ServiceResult};
use log::{error, info};

const CREATE_ORDER: &str = "create order";
const GET_ORDERS: &str = "get orders";
const GET_ORDER: &str = "get order";
const CREATE_RECEIPT: &str = "create receipt";
const UPDATE_RECEIPT_STATUS: &str = "update receipt status";

/// Order service facade over repository implementations.
pub struct OrderService<O: OrderRepository, R: ReceiptRepository> {
    orders: O,
    receipts: R,
}

impl<O: OrderRepository, R: ReceiptRepository> OrderService<O, R> {
    /// Creates a service using the provided repository implementations.
    pub fn new(orders: O, receipts: R) -> Self {
        Self { orders, receipts }
    }

    /// Creates one order derived from an existing quote.
    pub fn create_order(&self, caller: &Caller, order: &NewOrder) -> ServiceResult<Order> {
        require_user(caller, "order_create", CREATE_ORDER)?;
        validate("order_create", order)?;

        let created = self
            .orders
            .insert_order(order)
            .map_err(|err| log_store_error("order_create", CREATE_ORDER, err))?;
        info!(
            "event=order_create module=service status=ok order_id={} quote_id={}",
            created.id, created.quote_id
        );
        Ok(created)
    }

    /// Lists orders newest first, each with its quote and receipts.
    pub fn get_orders(&self, caller: &Caller) -> ServiceResult<Vec<OrderDetail>> {
        require_user(caller, "order_list", GET_ORDERS)?;
        self.orders
            .list_orders()
            .map_err(|err| log_store_error("order_list", GET_ORDERS, err))
    }

    /// Gets one order with its quote and receipts; a missing order fails.
    pub fn get_order_by_id(&self, caller: &Caller, id: OrderId) -> ServiceResult<OrderDetail> {
        require_user(caller, "order_get", GET_ORDER)?;
        self.orders
            .get_order(id)
            .and_then(|order| {
                order.ok_or(RepoError::NotFound {
                    collection: Collection::Orders,
                    id,
                })
            })
            .map_err(|err| log_store_error("order_get", GET_ORDER, err))
    }

    /// Creates one receipt for an existing order.
    pub fn create_receipt(&self, caller: &Caller, receipt: &NewReceipt) -> ServiceResult<Receipt> {
        require_user(caller, "receipt_create", CREATE_RECEIPT)?;
        validate("receipt_create", receipt)?;

        let created = self
            .receipts
            .insert_receipt(receipt)
            .map_err(|err| log_store_error("receipt_create", CREATE_RECEIPT, err))?;
        info!(
            "event=receipt_create module=service status=ok receipt_id={} order_id={}",
            created.id, created.order_id
        );
        Ok(created)
    }

    /// Moves a receipt to `status`; `sent` stamps `sent_at`, `draft` clears it.
    pub fn update_receipt_status(
        &self,
        caller: &Caller,
        id: ReceiptId,
        status: ReceiptStatus,
    ) -> ServiceResult<Receipt> {
        require_user(caller, "receipt_update", UPDATE_RECEIPT_STATUS)?;

        let updated = self
            .receipts
            .update_receipt_status(id, status)
            .map_err(|err| log_store_error("receipt_update", UPDATE_RECEIPT_STATUS, err))?;
        info!(
            "event=receipt_update module=service status=ok receipt_id={} receipt_status={}",
            updated.id,
            updated.status.as_str()
        );
        Ok(updated)
    }
}

fn validate(event: &str, input: &impl Schema) -> ServiceResult<()> {
    input.validate().map_err(|err| {
        error!(
            "event={event} module=service status=error reason=validation fields={}",
            err.fields().join(",")
        );
        ServiceError::Validation(err)
    })
}

fn log_store_error(event: &str, operation: &'static str, err: RepoError) -> ServiceError {
    error!("event={event} module=service status=error error={err}");
    ServiceError::store(operation, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthUser;
    use crate::repo::RepoResult;
    use std::cell::RefCell;
    use uuid::Uuid;

    /// Repository double that fails every call and records what reached it.
    #[derive(Default)]
    struct RejectingRepo {
        calls: RefCell<Vec<&'static str>>,
    }

    impl RejectingRepo {
        fn reject(&self, call: &'static str) -> RepoError {
            self.calls.borrow_mut().push(call);
            RepoError::InvalidData("store offline".to_string())
        }
    }

    impl OrderRepository for &RejectingRepo {
        fn insert_order(&self, _order: &NewOrder) -> RepoResult<Order> {
            Err(self.reject("insert_order"))
        }
        fn get_order(&self, _id: OrderId) -> RepoResult<Option<OrderDetail>> {
            Ok(None)
        }
        fn list_orders(&self) -> RepoResult<Vec<OrderDetail>> {
            Err(self.reject("list_orders"))
        }
        fn delete_order(&self, _id: OrderId) -> RepoResult<()> {
            Err(self.reject("delete_order"))
        }
    }

    impl ReceiptRepository for &RejectingRepo {
        fn insert_receipt(&self, _receipt: &NewReceipt) -> RepoResult<Receipt> {
            Err(self.reject("insert_receipt"))
        }
        fn get_receipt(&self, _id: ReceiptId) -> RepoResult<Option<Receipt>> {
            Ok(None)
        }
        fn list_receipts(&self, _order_id: OrderId) -> RepoResult<Vec<Receipt>> {
            Ok(Vec::new())
        }
        fn update_receipt_status(
            &self,
            _id: ReceiptId,
            _status: ReceiptStatus,
        ) -> RepoResult<Receipt> {
            Err(self.reject("update_receipt_status"))
        }
    }

    fn signed_in() -> Caller {
        Caller::from(AuthUser::new(Uuid::new_v4()).with_role("sales"))
    }

    #[test]
    fn anonymous_callers_never_reach_the_store() {
        let repo = RejectingRepo::default();
        let service = OrderService::new(&repo, &repo);
        let order = NewOrder::for_quote(Uuid::new_v4(), 100.0);

        let err = service.create_order(&Caller::Anonymous, &order).unwrap_err();
        assert_eq!(err.to_string(), "Failed to create order: User not authenticated");
        assert!(repo.calls.borrow().is_empty());
    }

    #[test]
    fn invalid_orders_never_reach_the_store() {
        let repo = RejectingRepo::default();
        let service = OrderService::new(&repo, &repo);
        let order = NewOrder::for_quote(Uuid::new_v4(), 0.0);

        let err = service.create_order(&signed_in(), &order).unwrap_err();
        assert_eq!(err.validation().unwrap().fields(), vec!["total"]);
        assert!(repo.calls.borrow().is_empty());
    }

    #[test]
    fn store_failures_are_wrapped_with_the_operation() {
        let repo = RejectingRepo::default();
        let service = OrderService::new(&repo, &repo);

        let err = service.get_orders(&signed_in()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to get orders: invalid persisted data: store offline"
        );
        assert_eq!(*repo.calls.borrow(), vec!["list_orders"]);
    }

    #[test]
    fn missing_order_is_reported_as_not_found() {
        let repo = RejectingRepo::default();
        let service = OrderService::new(&repo, &repo);
        let id = Uuid::new_v4();

        let err = service.get_order_by_id(&signed_in(), id).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Store {
                operation: "get order",
                source: RepoError::NotFound { .. },
            }
        ));
    }
}
