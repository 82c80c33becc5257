use usermgr_auth::{PermissionSet, Role};
use usermgr_core::{Email, PhoneNumber, RoleId, UserId, ValueObject};

use crate::dto::{
    AddEmail, AddPhoneNumber, ChangePassword, RegisterUser, UpdatePersonalInfo, UserCollection,
    UserResponse,
};
use crate::error::ApiError;
use crate::gateway::{Gateway, RequestAttempt};
use crate::services::segment;

/// `/users` resource.
#[derive(Debug, Clone)]
pub struct UserService {
    gateway: Gateway,
}

impl UserService {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    pub async fn list(&self) -> Result<Vec<UserResponse>, ApiError> {
        let collection: UserCollection =
            self.gateway.execute_json(RequestAttempt::get("/users")).await?;
        Ok(collection.into_users())
    }

    pub async fn get(&self, user_id: UserId) -> Result<UserResponse, ApiError> {
        self.gateway
            .execute_json(RequestAttempt::get(format!("/users/{user_id}")))
            .await
    }

    pub async fn find_by_login(&self, login: &str) -> Result<UserResponse, ApiError> {
        self.gateway
            .execute_json(RequestAttempt::get("/users/search/by-login").query("login", login))
            .await
    }

    pub async fn find_by_email(&self, email: &Email) -> Result<UserResponse, ApiError> {
        self.gateway
            .execute_json(
                RequestAttempt::get("/users/search/by-email").query("email", email.as_str()),
            )
            .await
    }

    pub async fn register(&self, user: &RegisterUser) -> Result<UserResponse, ApiError> {
        let created: UserResponse = self
            .gateway
            .execute_json(RequestAttempt::post("/users").json(user)?)
            .await?;
        tracing::info!(user_id = %created.id, login = %created.login, "user registered");
        Ok(created)
    }

    pub async fn delete(&self, user_id: UserId) -> Result<(), ApiError> {
        self.gateway
            .execute_unit(RequestAttempt::delete(format!("/users/{user_id}")))
            .await?;
        tracing::info!(%user_id, "user deleted");
        Ok(())
    }

    pub async fn update_personal_info(
        &self,
        user_id: UserId,
        info: &UpdatePersonalInfo,
    ) -> Result<(), ApiError> {
        self.gateway
            .execute_unit(RequestAttempt::put(format!("/users/{user_id}/personal-info")).json(info)?)
            .await
    }

    pub async fn add_email(&self, user_id: UserId, email: Email) -> Result<(), ApiError> {
        let body = AddEmail { email };
        self.gateway
            .execute_unit(RequestAttempt::post(format!("/users/{user_id}/emails")).json(&body)?)
            .await
    }

    pub async fn remove_email(&self, user_id: UserId, email: &str) -> Result<(), ApiError> {
        self.gateway
            .execute_unit(RequestAttempt::delete(format!(
                "/users/{user_id}/emails/{}",
                segment(email)
            )))
            .await
    }

    pub async fn add_phone_number(
        &self,
        user_id: UserId,
        phone_number: PhoneNumber,
    ) -> Result<(), ApiError> {
        let body = AddPhoneNumber { phone_number };
        self.gateway
            .execute_unit(
                RequestAttempt::post(format!("/users/{user_id}/phone-numbers")).json(&body)?,
            )
            .await
    }

    pub async fn remove_phone_number(
        &self,
        user_id: UserId,
        phone_number: &str,
    ) -> Result<(), ApiError> {
        self.gateway
            .execute_unit(RequestAttempt::delete(format!(
                "/users/{user_id}/phone-numbers/{}",
                segment(phone_number)
            )))
            .await
    }

    pub async fn change_password(
        &self,
        user_id: UserId,
        change: &ChangePassword,
    ) -> Result<(), ApiError> {
        self.gateway
            .execute_unit(
                RequestAttempt::post(format!("/users/{user_id}/password/change")).json(change)?,
            )
            .await?;
        tracing::info!(%user_id, "password changed");
        Ok(())
    }

    /// Roles assigned to a user, as full role objects.
    pub async fn roles(&self, user_id: UserId) -> Result<Vec<Role>, ApiError> {
        self.gateway
            .execute_json(RequestAttempt::get(format!("/users/{user_id}/roles")))
            .await
    }

    /// Effective permissions of a user (union over their roles).
    pub async fn permissions(&self, user_id: UserId) -> Result<PermissionSet, ApiError> {
        self.gateway
            .execute_json(RequestAttempt::get(format!(
                "/users/{user_id}/roles/permissions"
            )))
            .await
    }

    pub async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), ApiError> {
        self.gateway
            .execute_unit(RequestAttempt::post(format!("/users/{user_id}/roles/{role_id}")))
            .await?;
        tracing::info!(%user_id, %role_id, "role assigned");
        Ok(())
    }

    pub async fn remove_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), ApiError> {
        self.gateway
            .execute_unit(RequestAttempt::delete(format!("/users/{user_id}/roles/{role_id}")))
            .await?;
        tracing::info!(%user_id, %role_id, "role removed");
        Ok(())
    }
}
