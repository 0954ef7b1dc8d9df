//! Route authorization against the effective permission set.

use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{Identity, Permission};
use crate::services::audit::{AuditEvent, AuditEventKind, AuditSink};
use crate::services::store::RoleDirectory;

/// Request metadata carried into denial audit events.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub path: String,
    pub method: String,
}

impl RequestMeta {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
        }
    }
}

/// Authorization decision. Denial is an outcome reported to the caller, not
/// an error; "not authenticated" is a separate, earlier failure owned by
/// token verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

pub struct PermissionGate {
    roles: Arc<dyn RoleDirectory>,
    audit: Arc<dyn AuditSink>,
}

impl PermissionGate {
    pub fn new(roles: Arc<dyn RoleDirectory>, audit: Arc<dyn AuditSink>) -> Self {
        Self { roles, audit }
    }

    /// Resolve an authenticated user into an identity with its effective
    /// permission set, recomputed from the role associations on every call
    /// so a role change takes effect on the next request.
    pub async fn resolve(&self, user_id: Uuid) -> Result<Identity, CoreError> {
        let permissions = self.roles.permissions_for_user(user_id).await?;
        Ok(Identity {
            user_id,
            permissions,
        })
    }

    /// Any-of check: one matching permission code is sufficient. Every
    /// denial is reported to the audit sink with the required set, the
    /// actual set and the request metadata.
    pub fn authorize(
        &self,
        identity: &Identity,
        required: &[Permission],
        request: &RequestMeta,
    ) -> Decision {
        if identity.permissions.contains_any(required) {
            return Decision::Allow;
        }

        tracing::warn!(
            user_id = %identity.user_id,
            path = %request.path,
            method = %request.method,
            "Permission denied"
        );

        let required_codes: Vec<&str> = required.iter().map(|p| p.as_str()).collect();
        self.audit.record(AuditEvent::new(
            AuditEventKind::PermissionDenied,
            Some(identity.user_id),
            json!({
                "required": required_codes,
                "actual": identity.permissions.codes(),
                "path": request.path,
                "method": request.method,
            }),
        ));

        Decision::Deny
    }
}
