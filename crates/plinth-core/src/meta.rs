//! Per-call invocation context.
//!
//! A [`CallMeta`] is constructed for every call and never persisted. It
//! carries where the call came from, the resolved actor (if any), and a
//! tracing id that follows the call through logs.

use serde::{Deserialize, Serialize};

/// Where a call originates. Server-internal calls bypass authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallOrigin {
    Server,
    External,
}

/// Closed role ladder. Higher roles satisfy lower requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Anonymous,
    Member,
    Editor,
    Admin,
}

impl Role {
    pub fn priority(&self) -> u8 {
        match self {
            Role::Anonymous => 0,
            Role::Member => 10,
            Role::Editor => 20,
            Role::Admin => 30,
        }
    }

    pub fn satisfies(&self, required: Role) -> bool {
        self.priority() >= required.priority()
    }
}

/// Resolved actor identity, produced by an external identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub actor_id: String,
    pub role: Role,
}

/// Call context handed to every `run` invocation.
#[derive(Debug, Clone)]
pub struct CallMeta {
    pub origin: CallOrigin,
    pub actor: Option<Actor>,
    pub trace_id: String,
}

impl CallMeta {
    /// Context for a server-internal call (trusted, no actor needed).
    pub fn server() -> Self {
        Self {
            origin: CallOrigin::Server,
            actor: None,
            trace_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Context for an externally triggered call.
    pub fn external(actor: Option<Actor>) -> Self {
        Self {
            origin: CallOrigin::External,
            actor,
            trace_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Effective role: the actor's, or `Anonymous` when unresolved.
    pub fn role(&self) -> Role {
        self.actor.as_ref().map(|actor| actor.role).unwrap_or(Role::Anonymous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ladder() {
        assert!(Role::Admin.satisfies(Role::Member));
        assert!(Role::Member.satisfies(Role::Member));
        assert!(!Role::Member.satisfies(Role::Admin));
        assert!(!Role::Anonymous.satisfies(Role::Member));
    }

    #[test]
    fn test_unresolved_actor_is_anonymous() {
        let meta = CallMeta::external(None);
        assert_eq!(meta.role(), Role::Anonymous);
        assert_eq!(meta.origin, CallOrigin::External);
        assert!(!meta.trace_id.is_empty());
    }

    #[test]
    fn test_each_call_gets_its_own_trace_id() {
        assert_ne!(CallMeta::server().trace_id, CallMeta::server().trace_id);
    }
}
