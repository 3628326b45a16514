//! Caller identity and role verification.
//!
//! # Responsibility
//! - Carry the caller identity explicitly into every write operation.
//! - Decide whether a session's role may use the quoting back office.
//!
//! # Invariants
//! - Only `admin` and `sales` roles verify.
//! - A failed session lookup never reveals the role in its result.

use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type UserId = Uuid;

pub const NO_ACTIVE_SESSION: &str = "No active session";
pub const INVALID_ROLE: &str = "Invalid or missing role";
pub const VERIFICATION_FAILED: &str = "Verification failed";

/// Back-office role allowed to work with quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Sales,
}

impl Role {
    pub const ALLOWED: [Role; 2] = [Role::Admin, Role::Sales];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Sales => "sales",
        }
    }

    /// Parses a metadata role. Unknown roles are rejected.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALLOWED
            .into_iter()
            .find(|role| role.as_str() == value)
    }
}

/// Free-form user metadata attached by the identity provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetadata {
    pub role: Option<String>,
}

/// Authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

impl AuthUser {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            email: None,
            user_metadata: UserMetadata::default(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.user_metadata.role = Some(role.into());
        self
    }

    /// Raw role string from metadata, if any.
    pub fn role(&self) -> Option<&str> {
        self.user_metadata.role.as_deref()
    }
}

/// Active session for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: AuthUser,
}

impl Session {
    pub fn new(user: AuthUser) -> Self {
        Self { user }
    }
}

/// Authentication failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No user is attached to the call.
    NotAuthenticated,
    /// The session provider itself failed.
    Session(String),
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAuthenticated => write!(f, "User not authenticated"),
            Self::Session(message) => write!(f, "session lookup failed: {message}"),
        }
    }
}

impl Error for AuthError {}

/// Identity passed explicitly into every operation that writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Anonymous,
    User(AuthUser),
}

impl Caller {
    /// Returns the authenticated user or `AuthError::NotAuthenticated`.
    pub fn require_user(&self) -> Result<&AuthUser, AuthError> {
        match self {
            Self::User(user) => Ok(user),
            Self::Anonymous => Err(AuthError::NotAuthenticated),
        }
    }
}

impl From<AuthUser> for Caller {
    fn from(value: AuthUser) -> Self {
        Self::User(value)
    }
}

impl From<&Session> for Caller {
    fn from(value: &Session) -> Self {
        Self::User(value.user.clone())
    }
}

/// Source of the current session for role checks.
pub trait SessionSource {
    fn current_session(&self) -> Result<Option<Session>, AuthError>;
}

impl SessionSource for Option<Session> {
    fn current_session(&self) -> Result<Option<Session>, AuthError> {
        Ok(self.clone())
    }
}

impl SessionSource for Session {
    fn current_session(&self) -> Result<Option<Session>, AuthError> {
        Ok(Some(self.clone()))
    }
}

/// Outcome of [`verify_auth_role`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleVerification {
    Verified(Role),
    Rejected(&'static str),
}

impl RoleVerification {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified(_))
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            Self::Verified(role) => Some(*role),
            Self::Rejected(_) => None,
        }
    }

    pub fn error(&self) -> Option<&'static str> {
        match self {
            Self::Verified(_) => None,
            Self::Rejected(message) => Some(message),
        }
    }
}

/// Checks that the current session carries an allowed back-office role.
pub fn verify_auth_role(source: &impl SessionSource) -> RoleVerification {
    let session = match source.current_session() {
        Ok(session) => session,
        Err(err) => {
            error!("event=auth_verify module=auth status=error error={err}");
            return RoleVerification::Rejected(VERIFICATION_FAILED);
        }
    };

    let Some(session) = session else {
        debug!("event=auth_verify module=auth status=rejected reason=no_session");
        return RoleVerification::Rejected(NO_ACTIVE_SESSION);
    };

    match session.user.role().and_then(Role::parse) {
        Some(role) => {
            debug!(
                "event=auth_verify module=auth status=ok role={}",
                role.as_str()
            );
            RoleVerification::Verified(role)
        }
        None => {
            debug!(
                "event=auth_verify module=auth status=rejected reason=invalid_role role={:?}",
                session.user.role()
            );
            RoleVerification::Rejected(INVALID_ROLE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSource;

    impl SessionSource for FailingSource {
        fn current_session(&self) -> Result<Option<Session>, AuthError> {
            Err(AuthError::Session("jwt expired".to_string()))
        }
    }

    fn session_with_role(role: &str) -> Session {
        Session::new(AuthUser::new(Uuid::new_v4()).with_role(role))
    }

    #[test]
    fn admin_and_sales_roles_verify() {
        let admin = verify_auth_role(&session_with_role("admin"));
        assert!(admin.is_verified());
        assert_eq!(admin.role(), Some(Role::Admin));

        let sales = verify_auth_role(&session_with_role("sales"));
        assert_eq!(sales, RoleVerification::Verified(Role::Sales));
    }

    #[test]
    fn guest_role_is_rejected() {
        let outcome = verify_auth_role(&session_with_role("guest"));
        assert!(!outcome.is_verified());
        assert_eq!(outcome.error(), Some("Invalid or missing role"));
    }

    #[test]
    fn missing_role_is_rejected() {
        let session = Session::new(AuthUser::new(Uuid::new_v4()));
        let outcome = verify_auth_role(&session);
        assert_eq!(outcome.error(), Some(INVALID_ROLE));
    }

    #[test]
    fn missing_session_is_rejected() {
        let outcome = verify_auth_role(&None::<Session>);
        assert!(!outcome.is_verified());
        assert_eq!(outcome.error(), Some("No active session"));
    }

    #[test]
    fn session_errors_hide_the_role() {
        let outcome = verify_auth_role(&FailingSource);
        assert_eq!(outcome, RoleVerification::Rejected(VERIFICATION_FAILED));
        assert_eq!(outcome.role(), None);
    }

    #[test]
    fn anonymous_caller_is_not_authenticated() {
        assert_eq!(
            Caller::Anonymous.require_user().unwrap_err(),
            AuthError::NotAuthenticated
        );
        let user = AuthUser::new(Uuid::new_v4());
        let caller = Caller::from(user.clone());
        assert_eq!(caller.require_user().unwrap(), &user);
    }
}
