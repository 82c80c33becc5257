use async_trait::async_trait;

use usermgr_auth::{Permission, PermissionSet, Role};
use usermgr_core::RoleId;

use crate::dto::{CreateRole, UpdateRole};
use crate::error::ApiError;
use crate::gateway::{Gateway, RequestAttempt};
use crate::reconcile::{ReconcileError, ReconcileReport, RolePermissions, reconcile};
use crate::services::segment;

/// `/roles` resource.
#[derive(Debug, Clone)]
pub struct RoleService {
    gateway: Gateway,
}

impl RoleService {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    pub async fn list(&self) -> Result<Vec<Role>, ApiError> {
        self.gateway.execute_json(RequestAttempt::get("/roles")).await
    }

    pub async fn get(&self, role_id: RoleId) -> Result<Role, ApiError> {
        self.gateway
            .execute_json(RequestAttempt::get(format!("/roles/{role_id}")))
            .await
    }

    pub async fn create(&self, role: &CreateRole) -> Result<(), ApiError> {
        self.gateway
            .execute_unit(RequestAttempt::post("/roles").json(role)?)
            .await?;
        tracing::info!(name = %role.name, "role created");
        Ok(())
    }

    pub async fn update(&self, role_id: RoleId, role: &UpdateRole) -> Result<(), ApiError> {
        self.gateway
            .execute_unit(RequestAttempt::put(format!("/roles/{role_id}")).json(role)?)
            .await
    }

    pub async fn delete(&self, role_id: RoleId) -> Result<(), ApiError> {
        self.gateway
            .execute_unit(RequestAttempt::delete(format!("/roles/{role_id}")))
            .await?;
        tracing::info!(%role_id, "role deleted");
        Ok(())
    }

    /// Fetch the role's current permissions and converge them to `desired`.
    pub async fn set_permissions(
        &self,
        role_id: RoleId,
        desired: &PermissionSet,
    ) -> Result<ReconcileReport, ReconcileError> {
        let current = self.get(role_id).await?.permissions;
        reconcile(self, role_id, &current, desired).await
    }

    /// Edit-role flow: update name/description, then reconcile permissions
    /// against a fresh read of the role.
    pub async fn update_with_permissions(
        &self,
        role_id: RoleId,
        role: &UpdateRole,
        desired: &PermissionSet,
    ) -> Result<ReconcileReport, ReconcileError> {
        self.update(role_id, role).await?;
        self.set_permissions(role_id, desired).await
    }
}

#[async_trait]
impl RolePermissions for RoleService {
    async fn add_permission(
        &self,
        role_id: RoleId,
        permission: &Permission,
    ) -> Result<(), ApiError> {
        self.gateway
            .execute_unit(RequestAttempt::post(format!(
                "/roles/{role_id}/permissions/{}",
                segment(permission.as_str())
            )))
            .await
    }

    async fn remove_permission(
        &self,
        role_id: RoleId,
        permission: &Permission,
    ) -> Result<(), ApiError> {
        self.gateway
            .execute_unit(RequestAttempt::delete(format!(
                "/roles/{role_id}/permissions/{}",
                segment(permission.as_str())
            )))
            .await
    }
}
