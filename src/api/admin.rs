//! Dashboard account management (admin role required server-side)

use reqwest::Method;
use serde_json::Value;

use super::transport::encode_path_segment;
use super::{decode, ApiClient, ApiError, CostClass};
use crate::data::{AdminUserList, AdminUserUpdate, AuthUser, NewAdminUser};

fn user_path(username: &str) -> String {
    format!("/auth/users/{}", encode_path_segment(username))
}

impl ApiClient {
    /// Every dashboard account (`GET /auth/users`)
    pub async fn list_admin_users(&self) -> Result<Vec<AuthUser>, ApiError> {
        let request = self.request(Method::GET, "/auth/users", CostClass::Standard);
        let list: AdminUserList = decode(self.send_json(request).await?)?;
        Ok(list.users)
    }

    /// Creates a dashboard account (`POST /auth/register`)
    pub async fn register_user(&self, user: &NewAdminUser) -> Result<Value, ApiError> {
        let request = self
            .request(Method::POST, "/auth/register", CostClass::Standard)
            .with_body(serde_json::to_value(user)?);
        let response = self.send_json(request).await?;
        tracing::info!(username = %user.username, role = %user.role, "dashboard user registered");
        Ok(response)
    }

    /// Changes the email, role or password of an account (`PUT /auth/users/:username`)
    pub async fn update_admin_user(&self, username: &str, update: &AdminUserUpdate) -> Result<Value, ApiError> {
        let request = self
            .request(Method::PUT, user_path(username), CostClass::Standard)
            .with_body(serde_json::to_value(update)?);
        let response = self.send_json(request).await?;
        tracing::info!(username, "dashboard user updated");
        Ok(response)
    }

    /// Removes an account (`DELETE /auth/users/:username`)
    pub async fn delete_admin_user(&self, username: &str) -> Result<Value, ApiError> {
        let request = self.request(Method::DELETE, user_path(username), CostClass::Standard);
        let response = self.send_json(request).await?;
        tracing::info!(username, "dashboard user deleted");
        Ok(response)
    }
}
