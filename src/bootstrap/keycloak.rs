// Copyright 2025 RustFS Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::{
    AccessToken, DecodeSnafu, Error, IdentityProvider, IdentityUser, RequestSnafu, TenantUser,
    check,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use snafu::ResultExt;
use tracing::debug;

const ADMIN_REALM: &str = "master";
const ADMIN_CLIENT: &str = "admin-cli";
const ADMIN_USER: &str = "admin";
const WORKSPACE_CLIENT: &str = "codeready-public";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: AccessToken,
}

/// Keycloak admin and token endpoints.
pub struct KeycloakClient {
    http: reqwest::Client,
    base_url: String,
    realm: String,
}

impl KeycloakClient {
    /// `base_url` is the server root including the `/auth` context path.
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, realm: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            realm: realm.into(),
        }
    }

    fn token_endpoint(&self, realm: &str) -> String {
        format!("{}/realms/{realm}/protocol/openid-connect/token", self.base_url)
    }

    fn users_endpoint(&self) -> String {
        format!("{}/admin/realms/{}/users", self.base_url, self.realm)
    }

    async fn password_grant(
        &self,
        realm: &str,
        client_id: &str,
        username: &str,
        password: &str,
    ) -> Result<AccessToken, Error> {
        let endpoint = self.token_endpoint(realm);
        let response = self
            .http
            .post(&endpoint)
            .form(&[
                ("grant_type", "password"),
                ("client_id", client_id),
                ("username", username),
                ("password", password),
            ])
            .send()
            .await
            .context(RequestSnafu { endpoint: &endpoint })?;
        let token: TokenResponse = check(&endpoint, response)
            .await?
            .json()
            .await
            .context(DecodeSnafu { endpoint: &endpoint })?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl IdentityProvider for KeycloakClient {
    async fn admin_token(&self, password: &str) -> Result<AccessToken, Error> {
        self.password_grant(ADMIN_REALM, ADMIN_CLIENT, ADMIN_USER, password)
            .await
    }

    async fn find_user(
        &self,
        admin: &AccessToken,
        username: &str,
    ) -> Result<Option<IdentityUser>, Error> {
        let endpoint = self.users_endpoint();
        let response = self
            .http
            .get(&endpoint)
            .bearer_auth(admin.secret())
            .query(&[("username", username), ("exact", "true")])
            .send()
            .await
            .context(RequestSnafu { endpoint: &endpoint })?;
        let users: Vec<IdentityUser> = check(&endpoint, response)
            .await?
            .json()
            .await
            .context(DecodeSnafu { endpoint: &endpoint })?;

        // the search is a prefix match on older servers
        Ok(users.into_iter().find(|u| u.username == username))
    }

    async fn create_user(&self, admin: &AccessToken, user: &TenantUser) -> Result<(), Error> {
        let endpoint = self.users_endpoint();
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(admin.secret())
            .json(&json!({
                "username": user.username,
                "email": user.email,
                "enabled": true,
                "emailVerified": true,
                "credentials": [{
                    "type": "password",
                    "value": user.password,
                    "temporary": false
                }]
            }))
            .send()
            .await
            .context(RequestSnafu { endpoint: &endpoint })?;

        if response.status() == StatusCode::CONFLICT {
            debug!(tenant = %user.username, "identity already exists");
            return Ok(());
        }
        check(&endpoint, response).await?;
        Ok(())
    }

    async fn update_email(
        &self,
        admin: &AccessToken,
        id: &str,
        email: &str,
    ) -> Result<(), Error> {
        let endpoint = format!("{}/{id}", self.users_endpoint());
        let response = self
            .http
            .put(&endpoint)
            .bearer_auth(admin.secret())
            .json(&json!({ "email": email }))
            .send()
            .await
            .context(RequestSnafu { endpoint: &endpoint })?;
        check(&endpoint, response).await?;
        Ok(())
    }

    async fn user_token(&self, username: &str, password: &str) -> Result<AccessToken, Error> {
        let realm = self.realm.clone();
        self.password_grant(&realm, WORKSPACE_CLIENT, username, password)
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints() {
        let client = KeycloakClient::new(
            reqwest::Client::new(),
            "https://keycloak-workspaces.apps.example.com/auth/",
            "codeready",
        );
        assert_eq!(
            client.token_endpoint(ADMIN_REALM),
            "https://keycloak-workspaces.apps.example.com/auth/realms/master/protocol/openid-connect/token"
        );
        assert_eq!(
            client.users_endpoint(),
            "https://keycloak-workspaces.apps.example.com/auth/admin/realms/codeready/users"
        );
    }

    #[test]
    fn test_token_response_decodes() {
        let token: TokenResponse =
            serde_json::from_str(r#"{"access_token":"abc","expires_in":60}"#).unwrap();
        assert_eq!(token.access_token.secret(), "abc");
    }
}
