//! Success-or-failure outcome of request and lifecycle handlers.

/// Outcome of a handler execution: either the handler completed successfully,
/// or it failed with a human-readable error message.
///
/// Used as the payload of service request handling and as the disconnection
/// reason carried by a [`Left`](crate::InputEvent::Left) input event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlingResult {
    possible_error_message: Option<String>,
}

impl HandlingResult {
    /// Handling was done successfully, no errors.
    pub fn success() -> Self {
        Self {
            possible_error_message: None,
        }
    }

    /// An error occurred during handler execution.
    pub fn failure(error_message: impl Into<String>) -> Self {
        Self {
            possible_error_message: Some(error_message.into()),
        }
    }

    /// `true` if the handler completed successfully.
    pub fn is_success(&self) -> bool {
        self.possible_error_message.is_none()
    }

    /// Message describing the error which happened during handler execution.
    ///
    /// # Panics
    ///
    /// Panics if the handler actually completed successfully.
    pub fn error_message(&self) -> &str {
        self.possible_error_message
            .as_deref()
            .expect("no error message available, handler completed successfully")
    }
}
