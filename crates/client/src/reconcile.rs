//! Role permission reconciliation.
//!
//! Converges a role's permission set to a desired set with one add call per
//! missing permission and one remove call per extra permission. Calls are
//! issued concurrently and independently: a failure never blocks the others
//! and nothing is rolled back. Re-fetching and reconciling again is the way
//! to recover from a partial result.

use async_trait::async_trait;
use futures_util::future::join_all;
use thiserror::Error;

use usermgr_auth::{Permission, PermissionSet};
use usermgr_core::RoleId;

use crate::error::ApiError;

/// Permission mutation endpoints of a role.
#[async_trait]
pub trait RolePermissions: Send + Sync {
    async fn add_permission(&self, role_id: RoleId, permission: &Permission)
        -> Result<(), ApiError>;

    async fn remove_permission(
        &self,
        role_id: RoleId,
        permission: &Permission,
    ) -> Result<(), ApiError>;
}

/// `to_add = desired − current`, `to_remove = current − desired`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionDiff {
    pub to_add: PermissionSet,
    pub to_remove: PermissionSet,
}

impl PermissionDiff {
    pub fn between(current: &PermissionSet, desired: &PermissionSet) -> Self {
        Self {
            to_add: desired.difference(current).cloned().collect(),
            to_remove: current.difference(desired).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    pub fn len(&self) -> usize {
        self.to_add.len() + self.to_remove.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionOp {
    Add,
    Remove,
}

impl core::fmt::Display for PermissionOp {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PermissionOp::Add => f.write_str("add"),
            PermissionOp::Remove => f.write_str("remove"),
        }
    }
}

/// Calls that succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: PermissionSet,
    pub removed: PermissionSet,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedOperation {
    pub op: PermissionOp,
    pub permission: Permission,
    pub error: ApiError,
}

impl core::fmt::Display for FailedOperation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} {}: {}", self.op, self.permission, self.error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// The role could not be read or updated before diffing.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Some add/remove calls failed; `report` lists the ones that landed.
    #[error("role {role_id}: {} of {attempted} permission changes failed: {}", failures.len(), join_failures(failures))]
    Partial {
        role_id: RoleId,
        attempted: usize,
        report: ReconcileReport,
        failures: Vec<FailedOperation>,
    },
}

fn join_failures(failures: &[FailedOperation]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Converge `role_id` from `current` to `desired`.
///
/// Completes once every issued call has settled.
pub async fn reconcile<R>(
    api: &R,
    role_id: RoleId,
    current: &PermissionSet,
    desired: &PermissionSet,
) -> Result<ReconcileReport, ReconcileError>
where
    R: RolePermissions + ?Sized,
{
    let diff = PermissionDiff::between(current, desired);
    if diff.is_empty() {
        tracing::debug!(%role_id, "permissions already converged");
        return Ok(ReconcileReport::default());
    }

    tracing::info!(
        %role_id,
        add = diff.to_add.len(),
        remove = diff.to_remove.len(),
        "reconciling role permissions"
    );

    let ops = diff
        .to_add
        .iter()
        .map(|p| (PermissionOp::Add, p))
        .chain(diff.to_remove.iter().map(|p| (PermissionOp::Remove, p)));

    let outcomes = join_all(ops.map(|(op, permission)| async move {
        let result = match op {
            PermissionOp::Add => api.add_permission(role_id, permission).await,
            PermissionOp::Remove => api.remove_permission(role_id, permission).await,
        };
        (op, permission, result)
    }))
    .await;

    let mut report = ReconcileReport::default();
    let mut failures = Vec::new();
    for (op, permission, result) in outcomes {
        match (op, result) {
            (PermissionOp::Add, Ok(())) => {
                report.added.insert(permission.clone());
            }
            (PermissionOp::Remove, Ok(())) => {
                report.removed.insert(permission.clone());
            }
            (op, Err(error)) => {
                tracing::warn!(%role_id, %op, %permission, "permission change failed: {error}");
                failures.push(FailedOperation {
                    op,
                    permission: permission.clone(),
                    error,
                });
            }
        }
    }

    if failures.is_empty() {
        Ok(report)
    } else {
        Err(ReconcileError::Partial {
            role_id,
            attempted: diff.len(),
            report,
            failures,
        })
    }
}
