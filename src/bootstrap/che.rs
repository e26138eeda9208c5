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

use super::{AccessToken, DecodeSnafu, Error, RequestSnafu, Workspace, WorkspaceService, check};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use snafu::ResultExt;

/// Che workspace server REST API.
pub struct CheClient {
    http: reqwest::Client,
    base_url: String,
}

impl CheClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    fn workspace_endpoint(&self, path: &str) -> String {
        format!("{}/api/workspace/{path}", self.base_url)
    }
}

#[async_trait]
impl WorkspaceService for CheClient {
    async fn find_workspace(
        &self,
        token: &AccessToken,
        key: &str,
    ) -> Result<Option<Workspace>, Error> {
        let endpoint = self.workspace_endpoint(key);
        let response = self
            .http
            .get(&endpoint)
            .bearer_auth(token.secret())
            .send()
            .await
            .context(RequestSnafu { endpoint: &endpoint })?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let workspace = check(&endpoint, response)
            .await?
            .json()
            .await
            .context(DecodeSnafu { endpoint: &endpoint })?;
        Ok(Some(workspace))
    }

    async fn create_workspace(
        &self,
        token: &AccessToken,
        devfile: &Value,
    ) -> Result<Workspace, Error> {
        let endpoint = self.workspace_endpoint("devfile");
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(token.secret())
            .query(&[("start-after-create", "false")])
            .json(devfile)
            .send()
            .await
            .context(RequestSnafu { endpoint: &endpoint })?;
        check(&endpoint, response)
            .await?
            .json()
            .await
            .context(DecodeSnafu { endpoint: &endpoint })
    }

    async fn start_workspace(&self, token: &AccessToken, id: &str) -> Result<(), Error> {
        let endpoint = self.workspace_endpoint(&format!("{id}/runtime"));
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(token.secret())
            .send()
            .await
            .context(RequestSnafu { endpoint: &endpoint })?;
        check(&endpoint, response).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_endpoints() {
        let che = CheClient::new(reqwest::Client::new(), "https://codeready-workspaces.apps.example.com");
        assert_eq!(
            che.workspace_endpoint("user1:workshop"),
            "https://codeready-workspaces.apps.example.com/api/workspace/user1:workshop"
        );
    }

    #[test]
    fn test_workspace_decodes_with_extra_fields() {
        let workspace: Workspace = serde_json::from_str(
            r#"{"id":"workspacexyz","status":"STOPPED","namespace":"user1","devfile":{}}"#,
        )
        .unwrap();
        assert_eq!(workspace.id, "workspacexyz");
        assert!(!workspace.is_running());
    }
}
