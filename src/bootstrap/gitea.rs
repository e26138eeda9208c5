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

use super::{Error, GitService, RequestSnafu, TenantUser, check};
use async_trait::async_trait;
use reqwest::StatusCode;
use snafu::ResultExt;

/// Gitea user lookup and the public sign-up form.
pub struct GiteaClient {
    http: reqwest::Client,
    base_url: String,
}

impl GiteaClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }
}

#[async_trait]
impl GitService for GiteaClient {
    async fn user_exists(&self, username: &str) -> Result<bool, Error> {
        let endpoint = format!("{}/api/v1/users/{username}", self.base_url);
        let response = self
            .http
            .get(&endpoint)
            .send()
            .await
            .context(RequestSnafu { endpoint: &endpoint })?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check(&endpoint, response).await?;
        Ok(true)
    }

    async fn sign_up(&self, user: &TenantUser) -> Result<(), Error> {
        let endpoint = format!("{}/user/sign_up", self.base_url);
        let response = self
            .http
            .post(&endpoint)
            .form(&[
                ("user_name", user.username.as_str()),
                ("email", user.email.as_str()),
                ("password", user.password.as_str()),
                ("retype", user.password.as_str()),
            ])
            .send()
            .await
            .context(RequestSnafu { endpoint: &endpoint })?;
        check(&endpoint, response).await?;
        Ok(())
    }
}
