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

//! External bootstrap steps that run after a feature's workloads are ready.
//!
//! The identity provider, workspace server and git server are reached over
//! HTTP through the traits below. Every tenant is bootstrapped on its own:
//! a failure is recorded in the [`BootstrapReport`] and the loop moves on to
//! the next tenant. Only a failure that affects every tenant (the admin
//! token) aborts the whole step.

mod che;
mod gitea;
mod keycloak;

pub use che::CheClient;
pub use gitea::GiteaClient;
pub use keycloak::KeycloakClient;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use snafu::Snafu;
use std::fmt;
use tracing::{debug, info, warn};

#[cfg(test)]
use mockall::automock;

const MAX_ERROR_BODY: usize = 256;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("request to {} failed: {}", endpoint, source))]
    Request {
        endpoint: String,
        source: reqwest::Error,
    },

    #[snafu(display("{} answered {}: {}", endpoint, status, body))]
    UnexpectedStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[snafu(display("cannot decode response from {}: {}", endpoint, source))]
    Decode {
        endpoint: String,
        source: reqwest::Error,
    },
}

impl Error {
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Request { .. } => true,
            Error::UnexpectedStatus { status, .. } => *status != 400 && *status != 401,
            Error::Decode { .. } => false,
        }
    }
}

/// Turns a non-2xx response into [`Error::UnexpectedStatus`].
pub(crate) async fn check(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    UnexpectedStatusSnafu {
        endpoint,
        status: status.as_u16(),
        body,
    }
    .fail()
}

/// A bearer token. Never logged and never kept past the pass that fetched it.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct IdentityUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Workspace {
    pub id: String,
    #[serde(default)]
    pub status: String,
}

impl Workspace {
    pub fn is_running(&self) -> bool {
        self.status == "RUNNING"
    }
}

/// A workshop user as seen by the external services.
#[derive(Clone, Debug, PartialEq)]
pub struct TenantUser {
    pub username: String,
    pub password: String,
    pub email: String,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Admin token from the master realm.
    async fn admin_token(&self, password: &str) -> Result<AccessToken, Error>;

    async fn find_user(
        &self,
        admin: &AccessToken,
        username: &str,
    ) -> Result<Option<IdentityUser>, Error>;

    /// Creates a user. A user that already exists counts as created.
    async fn create_user(&self, admin: &AccessToken, user: &TenantUser) -> Result<(), Error>;

    async fn update_email(&self, admin: &AccessToken, id: &str, email: &str)
    -> Result<(), Error>;

    /// Token for a workshop user in the workspace realm.
    async fn user_token(&self, username: &str, password: &str) -> Result<AccessToken, Error>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait WorkspaceService: Send + Sync {
    /// Looks a workspace up by `{namespace}:{name}`.
    async fn find_workspace(
        &self,
        token: &AccessToken,
        key: &str,
    ) -> Result<Option<Workspace>, Error>;

    async fn create_workspace(&self, token: &AccessToken, devfile: &Value)
    -> Result<Workspace, Error>;

    async fn start_workspace(&self, token: &AccessToken, id: &str) -> Result<(), Error>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait GitService: Send + Sync {
    async fn user_exists(&self, username: &str) -> Result<bool, Error>;

    async fn sign_up(&self, user: &TenantUser) -> Result<(), Error>;
}

/// Per-tenant results of one bootstrap run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BootstrapReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl BootstrapReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Records the result of one tenant. An undecodable response is not
    /// tenant specific and is handed back to the caller.
    fn record(
        &mut self,
        username: &str,
        result: Result<(), Error>,
        step: &str,
    ) -> Result<(), Error> {
        match result {
            Ok(()) => self.succeeded.push(username.to_owned()),
            Err(e @ Error::Decode { .. }) => return Err(e),
            Err(e) => {
                warn!(tenant = username, step, error = %e, "bootstrap failed");
                self.failed.push((username.to_owned(), e.to_string()));
            }
        }
        Ok(())
    }
}

/// Inputs of the workspace bootstrap.
#[derive(Clone, Debug)]
pub struct WorkspacePlan {
    pub users: Vec<TenantUser>,
    /// Identity records are provisioned only when this is set.
    pub provision_identities: bool,
    pub admin_password: Option<String>,
    pub workspace_name: String,
    /// Devfile template; `metadata.name` is overwritten per user.
    pub devfile: Value,
}

/// Makes sure every user has an identity, a workspace and that the
/// workspace is running.
pub async fn bootstrap_workspaces(
    identity: &dyn IdentityProvider,
    workspaces: &dyn WorkspaceService,
    plan: &WorkspacePlan,
) -> Result<BootstrapReport, Error> {
    let admin = match (&plan.admin_password, plan.provision_identities) {
        (Some(password), true) => Some(identity.admin_token(password).await?),
        _ => None,
    };

    let mut report = BootstrapReport::default();
    for user in &plan.users {
        let result = bootstrap_workspace(identity, workspaces, plan, admin.as_ref(), user).await;
        report.record(&user.username, result, "workspace")?;
    }
    Ok(report)
}

async fn bootstrap_workspace(
    identity: &dyn IdentityProvider,
    workspaces: &dyn WorkspaceService,
    plan: &WorkspacePlan,
    admin: Option<&AccessToken>,
    user: &TenantUser,
) -> Result<(), Error> {
    if let Some(admin) = admin {
        match identity.find_user(admin, &user.username).await? {
            None => {
                identity.create_user(admin, user).await?;
                info!(tenant = %user.username, "identity created");
            }
            Some(existing) if existing.email.as_deref() != Some(user.email.as_str()) => {
                identity.update_email(admin, &existing.id, &user.email).await?;
                debug!(tenant = %user.username, "identity email updated");
            }
            Some(_) => {}
        }
    }

    let token = identity.user_token(&user.username, &user.password).await?;

    let key = format!("{}:{}", user.username, plan.workspace_name);
    let workspace = match workspaces.find_workspace(&token, &key).await? {
        Some(workspace) => workspace,
        None => {
            let devfile = devfile_for(&plan.devfile, &plan.workspace_name);
            let created = workspaces.create_workspace(&token, &devfile).await?;
            info!(tenant = %user.username, workspace = %created.id, "workspace created");
            created
        }
    };

    if !workspace.is_running() {
        workspaces.start_workspace(&token, &workspace.id).await?;
        debug!(tenant = %user.username, workspace = %workspace.id, "workspace start requested");
    }
    Ok(())
}

fn devfile_for(template: &Value, name: &str) -> Value {
    let mut devfile = template.clone();
    if let Value::Object(map) = &mut devfile {
        let metadata = map
            .entry("metadata")
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        if let Value::Object(metadata) = metadata {
            metadata.remove("generateName");
            metadata.insert("name".to_owned(), Value::String(name.to_owned()));
        }
    }
    devfile
}

/// Creates a git account for every user that does not have one.
pub async fn sign_up_git_users(
    git: &dyn GitService,
    users: &[TenantUser],
) -> Result<BootstrapReport, Error> {
    let mut report = BootstrapReport::default();
    for user in users {
        let result = async {
            if !git.user_exists(&user.username).await? {
                git.sign_up(user).await?;
                info!(tenant = %user.username, "git account created");
            }
            Ok::<(), Error>(())
        }
        .await;
        report.record(&user.username, result, "git sign-up")?;
    }
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn users(n: u32) -> Vec<TenantUser> {
        (1..=n)
            .map(|id| TenantUser {
                username: format!("user{id}"),
                password: "openshift".to_string(),
                email: format!("user{id}@apps.workshop.example.com"),
            })
            .collect()
    }

    fn plan(n: u32) -> WorkspacePlan {
        WorkspacePlan {
            users: users(n),
            provision_identities: true,
            admin_password: Some("admin-pass".to_string()),
            workspace_name: "workshop".to_string(),
            devfile: json!({"apiVersion": "1.0.0", "metadata": {"generateName": "wksp-"}}),
        }
    }

    fn unavailable(endpoint: &str) -> Error {
        Error::UnexpectedStatus {
            endpoint: endpoint.to_string(),
            status: 503,
            body: String::new(),
        }
    }

    #[tokio::test]
    async fn test_failed_tenant_does_not_stop_the_others() {
        let mut identity = MockIdentityProvider::new();
        identity
            .expect_admin_token()
            .times(1)
            .returning(|_| Ok(AccessToken::new("admin")));
        identity.expect_find_user().returning(|_, username| {
            Ok(Some(IdentityUser {
                id: format!("id-{username}"),
                username: username.to_string(),
                email: Some(format!("{username}@apps.workshop.example.com")),
            }))
        });
        identity
            .expect_user_token()
            .returning(|username, _| Ok(AccessToken::new(format!("token-{username}"))));

        let mut workspaces = MockWorkspaceService::new();
        workspaces.expect_find_workspace().returning(|_, key| {
            if key == "user2:workshop" {
                Err(unavailable("/api/workspace/user2:workshop"))
            } else {
                Ok(Some(Workspace {
                    id: format!("ws-{key}"),
                    status: "RUNNING".to_string(),
                }))
            }
        });

        let report = bootstrap_workspaces(&identity, &workspaces, &plan(3))
            .await
            .unwrap();

        assert_eq!(report.succeeded, vec!["user1", "user3"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "user2");
        assert!(!report.is_complete());
    }

    #[tokio::test]
    async fn test_failed_identity_creation_is_isolated() {
        let mut identity = MockIdentityProvider::new();
        identity
            .expect_admin_token()
            .times(1)
            .returning(|_| Ok(AccessToken::new("admin")));
        identity.expect_find_user().returning(|_, _| Ok(None));
        identity.expect_create_user().times(3).returning(|_, user| {
            if user.username == "user2" {
                Err(Error::UnexpectedStatus {
                    endpoint: "/admin/realms/codeready/users".to_string(),
                    status: 500,
                    body: String::new(),
                })
            } else {
                Ok(())
            }
        });
        identity
            .expect_user_token()
            .withf(|username, _| username != "user2")
            .times(2)
            .returning(|username, _| Ok(AccessToken::new(format!("token-{username}"))));

        let mut workspaces = MockWorkspaceService::new();
        workspaces
            .expect_find_workspace()
            .withf(|token, key| {
                (key == "user1:workshop" && token.secret() == "token-user1")
                    || (key == "user3:workshop" && token.secret() == "token-user3")
            })
            .times(2)
            .returning(|_, _| Ok(None));
        workspaces
            .expect_create_workspace()
            .times(2)
            .returning(|token, _| {
                Ok(Workspace {
                    id: format!("ws-{}", token.secret()),
                    status: "RUNNING".to_string(),
                })
            });

        let report = bootstrap_workspaces(&identity, &workspaces, &plan(3))
            .await
            .unwrap();

        assert_eq!(report.succeeded, vec!["user1", "user3"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "user2");
    }

    /// Serves one request with a 200 and `body`, returning the base URL.
    fn serve_once(body: &'static str) -> String {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = [0u8; 4096];
            let _ = stream.read(&mut request);
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\
                 content-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_undecodable_response_fails_the_whole_run() {
        let mut identity = MockIdentityProvider::new();
        identity
            .expect_user_token()
            .times(1)
            .returning(|_, _| Ok(AccessToken::new("user")));
        let http = reqwest::Client::builder().no_proxy().build().unwrap();
        let workspaces = CheClient::new(http, serve_once("not json"));

        let mut plan = plan(2);
        plan.provision_identities = false;
        let err = bootstrap_workspaces(&identity, &workspaces, &plan)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Decode { .. }), "{err}");
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_missing_user_and_workspace_are_created_and_started() {
        let mut identity = MockIdentityProvider::new();
        identity
            .expect_admin_token()
            .withf(|password| password == "admin-pass")
            .returning(|_| Ok(AccessToken::new("admin")));
        identity.expect_find_user().returning(|_, _| Ok(None));
        identity
            .expect_create_user()
            .times(1)
            .returning(|_, _| Ok(()));
        identity.expect_update_email().never();
        identity
            .expect_user_token()
            .withf(|username, password| username == "user1" && password == "openshift")
            .returning(|_, _| Ok(AccessToken::new("user")));

        let mut workspaces = MockWorkspaceService::new();
        workspaces.expect_find_workspace().returning(|_, _| Ok(None));
        workspaces
            .expect_create_workspace()
            .withf(|_, devfile| {
                devfile["metadata"] == json!({"name": "workshop"}) && devfile["apiVersion"] == "1.0.0"
            })
            .times(1)
            .returning(|_, _| {
                Ok(Workspace {
                    id: "workspace123".to_string(),
                    status: "STOPPED".to_string(),
                })
            });
        workspaces
            .expect_start_workspace()
            .withf(|_, id| id == "workspace123")
            .times(1)
            .returning(|_, _| Ok(()));

        let report = bootstrap_workspaces(&identity, &workspaces, &plan(1))
            .await
            .unwrap();
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn test_stale_email_is_updated() {
        let mut identity = MockIdentityProvider::new();
        identity
            .expect_admin_token()
            .returning(|_| Ok(AccessToken::new("admin")));
        identity.expect_find_user().returning(|_, _| {
            Ok(Some(IdentityUser {
                id: "id-1".to_string(),
                username: "user1".to_string(),
                email: Some("old@example.com".to_string()),
            }))
        });
        identity
            .expect_update_email()
            .withf(|_, id, email| id == "id-1" && email == "user1@apps.workshop.example.com")
            .times(1)
            .returning(|_, _, _| Ok(()));
        identity
            .expect_user_token()
            .returning(|_, _| Ok(AccessToken::new("user")));

        let mut workspaces = MockWorkspaceService::new();
        workspaces.expect_find_workspace().returning(|_, _| {
            Ok(Some(Workspace {
                id: "w".to_string(),
                status: "RUNNING".to_string(),
            }))
        });
        workspaces.expect_start_workspace().never();

        let report = bootstrap_workspaces(&identity, &workspaces, &plan(1))
            .await
            .unwrap();
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn test_admin_token_failure_aborts_the_step() {
        let mut identity = MockIdentityProvider::new();
        identity
            .expect_admin_token()
            .returning(|_| Err(unavailable("/realms/master/protocol/openid-connect/token")));
        identity.expect_user_token().never();
        let workspaces = MockWorkspaceService::new();

        let err = bootstrap_workspaces(&identity, &workspaces, &plan(2))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_identity_provisioning_can_be_skipped() {
        let mut identity = MockIdentityProvider::new();
        identity.expect_admin_token().never();
        identity.expect_find_user().never();
        identity
            .expect_user_token()
            .returning(|_, _| Ok(AccessToken::new("user")));
        let mut workspaces = MockWorkspaceService::new();
        workspaces.expect_find_workspace().returning(|_, _| {
            Ok(Some(Workspace {
                id: "w".to_string(),
                status: "RUNNING".to_string(),
            }))
        });

        let mut plan = plan(2);
        plan.provision_identities = false;
        let report = bootstrap_workspaces(&identity, &workspaces, &plan)
            .await
            .unwrap();
        assert_eq!(report.succeeded.len(), 2);
    }

    #[tokio::test]
    async fn test_git_sign_up_only_for_missing_users() {
        let mut git = MockGitService::new();
        git.expect_user_exists()
            .returning(|username| Ok(username == "user1"));
        git.expect_sign_up()
            .withf(|user| user.username == "user2")
            .times(1)
            .returning(|_| Ok(()));

        let report = sign_up_git_users(&git, &users(2)).await.unwrap();
        assert_eq!(report.succeeded, vec!["user1", "user2"]);
    }

    #[tokio::test]
    async fn test_git_sign_up_failure_is_isolated() {
        let mut git = MockGitService::new();
        git.expect_user_exists().returning(|_| Ok(false));
        git.expect_sign_up().returning(|user| {
            if user.username == "user1" {
                Err(unavailable("/user/sign_up"))
            } else {
                Ok(())
            }
        });

        let report = sign_up_git_users(&git, &users(3)).await.unwrap();
        assert_eq!(report.succeeded, vec!["user2", "user3"]);
        assert_eq!(report.failed[0].0, "user1");
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = AccessToken::new("eyJhbGciOi");
        assert_eq!(format!("{token:?}"), "AccessToken(<redacted>)");
    }
}
