//! Requestor identity and the administrative permission gate

use crate::error::{ListenerError, ListenerResult};
use bitflags::bitflags;

bitflags! {
    /// Capabilities held by a requestor
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u32 {
        /// May read listener definitions
        const VIEW = 0b0001;
        /// May create, update and delete listener definitions
        const ADMINISTER = 0b0010;
    }
}

/// The authenticated caller of an administrative operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requestor {
    pub username: String,
    pub capabilities: Capabilities,
}

impl Requestor {
    pub fn new(username: impl Into<String>, capabilities: Capabilities) -> Self {
        Self {
            username: username.into(),
            capabilities,
        }
    }

    /// A requestor holding every capability
    pub fn admin(username: impl Into<String>) -> Self {
        Self::new(username, Capabilities::all())
    }

    /// A requestor without administrative rights
    pub fn user(username: impl Into<String>) -> Self {
        Self::new(username, Capabilities::VIEW)
    }
}

/// Precondition checked before every listener operation.
pub trait PermissionGate: Send + Sync {
    /// Succeed only if `requestor` may manage listeners
    fn check_admin(&self, requestor: &Requestor) -> ListenerResult<()>;
}

/// Default gate: requires [`Capabilities::ADMINISTER`].
#[derive(Debug, Default, Clone, Copy)]
pub struct AdminGate;

impl PermissionGate for AdminGate {
    fn check_admin(&self, requestor: &Requestor) -> ListenerResult<()> {
        if requestor.capabilities.contains(Capabilities::ADMINISTER) {
            Ok(())
        } else {
            Err(ListenerError::PermissionDenied {
                user: requestor.username.clone(),
                capability: "ADMINISTER".to_string(),
            })
        }
    }
}
