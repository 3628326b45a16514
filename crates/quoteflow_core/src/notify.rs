//! User-facing error notification sink.
//!
//! Form validation reports its violations here as `field: message` lines.

use crate::model::validation::Schema;
use log::warn;
use serde_json::Value;

/// Surfaces a human-readable error to whoever is driving the core.
pub trait Notifier {
    fn show_error(&self, message: &str);
}

/// Notifier that forwards messages to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn show_error(&self, message: &str) {
        warn!(
            "event=notify_error module=notify status=shown lines={}",
            message.lines().count()
        );
    }
}

/// Parses `value` as `T`; on failure, notifies every violation and returns `None`.
pub fn validate_form<T: Schema>(value: &Value, notifier: &impl Notifier) -> Option<T> {
    match T::parse(value) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            notifier.show_error(&err.to_string());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::receipt::NewReceipt;
    use serde_json::json;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingNotifier {
        messages: RefCell<Vec<String>>,
    }

    impl Notifier for RecordingNotifier {
        fn show_error(&self, message: &str) {
            self.messages.borrow_mut().push(message.to_string());
        }
    }

    #[test]
    fn valid_form_is_returned_without_notification() {
        let notifier = RecordingNotifier::default();
        let receipt: Option<NewReceipt> = validate_form(
            &json!({
                "order_id": "6f1c2b7e-8a4d-4f5e-9b3a-2c1d0e9f8a7b",
                "payment_percentage": 50,
                "amount": 500
            }),
            &notifier,
        );
        assert!(receipt.is_some());
        assert!(notifier.messages.borrow().is_empty());
    }

    #[test]
    fn log_notifier_backs_validate_form() {
        let valid: Option<NewReceipt> = validate_form(
            &json!({
                "order_id": "6f1c2b7e-8a4d-4f5e-9b3a-2c1d0e9f8a7b",
                "payment_percentage": 100,
                "amount": 1
            }),
            &LogNotifier,
        );
        assert!(valid.is_some());

        let invalid: Option<NewReceipt> = validate_form(&json!([]), &LogNotifier);
        assert!(invalid.is_none());
        LogNotifier.show_error("amount: Number must be greater than 0");
    }

    #[test]
    fn invalid_form_sends_one_joined_message() {
        let notifier = RecordingNotifier::default();
        let receipt: Option<NewReceipt> = validate_form(
            &json!({"order_id": "nope", "payment_percentage": 120, "amount": 0}),
            &notifier,
        );
        assert!(receipt.is_none());
        assert_eq!(
            *notifier.messages.borrow(),
            vec![
                "order_id: Invalid uuid\n\
                 payment_percentage: Number must be less than or equal to 100\n\
                 amount: Number must be greater than 0"
                    .to_string()
            ]
        );
    }
}
