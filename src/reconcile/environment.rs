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

use super::Error;
use crate::components::codeready;
use crate::context::Context;
use crate::types::error::{DecodeSnafu, MissingEnvironmentSnafu};
use crate::types::resource::{CustomKind, ResourceKind};
use crate::types::v1alpha1::feature::{Feature, FeatureToggle};
use crate::types::v1alpha1::workshop::Workshop;
use k8s_openapi::api::core::v1::Secret;
use serde_json::Value;
use snafu::ResultExt;
use tracing::debug;

/// Cluster-wide ingress configuration; `spec.domain` is the apps suffix.
pub const INGRESS_CONFIG: CustomKind = CustomKind {
    group: "config.openshift.io",
    version: "v1",
    kind: "Ingress",
    plural: "ingresses",
    namespaced: false,
};

const IDENTITY_SECRET: &str = "che-identity-secret";

/// Facts about the cluster, resolved once per pass.
#[derive(Clone, Debug, PartialEq)]
pub struct Environment {
    pub api_url: String,
    pub console_url: String,
    pub apps_hostname_suffix: String,
    pub admin_password: Option<String>,
}

impl Environment {
    /// Host the router assigns to a route without an explicit host.
    pub fn route_host(&self, name: &str, namespace: &str) -> String {
        format!("{name}-{namespace}.{}", self.apps_hostname_suffix)
    }

    pub fn route_url(&self, name: &str, namespace: &str) -> String {
        format!("https://{}", self.route_host(name, namespace))
    }
}

/// The immutable input of one reconcile pass.
#[derive(Clone, Debug)]
pub struct Specification {
    pub workshop: Workshop,
    pub namespace: String,
    pub user_count: u32,
    pub environment: Environment,
}

impl Specification {
    pub fn enabled(&self, feature: Feature) -> Option<&FeatureToggle> {
        self.workshop.enabled(feature)
    }

    pub fn username(&self, id: u32) -> String {
        self.workshop.username(id)
    }

    pub fn usernames(&self) -> impl Iterator<Item = String> + '_ {
        (1..=self.user_count).map(|id| self.username(id))
    }
}

pub async fn resolve(ctx: &Context, workshop: Workshop) -> Result<Specification, Error> {
    let namespace = workshop.namespace()?;
    let overrides = workshop.spec.environment.clone().unwrap_or_default();

    let apps_hostname_suffix = match overrides.apps_hostname_suffix {
        Some(suffix) => suffix,
        None => discover_apps_domain(ctx).await?,
    };
    let console_url = overrides
        .console_url
        .unwrap_or_else(|| format!("https://console-openshift-console.{apps_hostname_suffix}"));
    let api_url = overrides.api_url.unwrap_or_else(|| ctx.cluster.api_url());

    let admin_password = if workshop.enabled(Feature::CodeReadyWorkspaces).is_some() {
        match workshop.code_ready_settings().admin_password {
            Some(password) => Some(password),
            None => identity_password(ctx).await?,
        }
    } else {
        None
    };

    let user_count = workshop.desired_user_count();
    Ok(Specification {
        workshop,
        namespace,
        user_count,
        environment: Environment {
            api_url,
            console_url,
            apps_hostname_suffix,
            admin_password,
        },
    })
}

async fn discover_apps_domain(ctx: &Context) -> Result<String, Error> {
    let ingress = ctx
        .cluster
        .get(ResourceKind::Custom(INGRESS_CONFIG), None, "cluster")
        .await?;
    let domain = ingress.and_then(|i| {
        i.data
            .pointer("/spec/domain")
            .and_then(Value::as_str)
            .map(str::to_owned)
    });

    match domain {
        Some(domain) => Ok(domain),
        None => MissingEnvironmentSnafu {
            fact: "appsHostnameSuffix",
            message: "ingresses.config.openshift.io/cluster has no spec.domain",
        }
        .fail()
        .map_err(Error::from),
    }
}

/// Admin password generated by the workspace operator. Absent until the
/// operator has created its identity secret.
async fn identity_password(ctx: &Context) -> Result<Option<String>, Error> {
    let Some(object) = ctx
        .cluster
        .get(ResourceKind::Secret, Some(codeready::NAMESPACE), IDENTITY_SECRET)
        .await?
    else {
        debug!(secret = IDENTITY_SECRET, "identity secret not created yet");
        return Ok(None);
    };

    let value = serde_json::to_value(&object).context(DecodeSnafu {
        what: format!("secret '{IDENTITY_SECRET}'"),
    })?;
    let secret: Secret = serde_json::from_value(value).context(DecodeSnafu {
        what: format!("secret '{IDENTITY_SECRET}'"),
    })?;

    Ok(secret
        .data
        .and_then(|data| data.get("password").cloned())
        .and_then(|password| String::from_utf8(password.0).ok()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::tests::{FakeCluster, TEST_APPS_SUFFIX, create_test_workshop, test_context};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_overrides_win() {
        let ctx = test_context(Arc::new(FakeCluster::new()));
        let spec = resolve(&ctx, create_test_workshop(2, &[])).await.unwrap();

        assert_eq!(spec.environment.apps_hostname_suffix, TEST_APPS_SUFFIX);
        assert_eq!(
            spec.environment.console_url,
            format!("https://console-openshift-console.{TEST_APPS_SUFFIX}")
        );
        assert_eq!(spec.environment.api_url, "https://api.workshop.example.com:6443");
        assert_eq!(spec.environment.admin_password, None);
        assert_eq!(spec.usernames().collect::<Vec<_>>(), vec!["user1", "user2"]);
    }

    #[tokio::test]
    async fn test_apps_domain_discovered_from_ingress_config() {
        let cluster = Arc::new(FakeCluster::new());
        cluster.insert(
            ResourceKind::Custom(INGRESS_CONFIG),
            json!({
                "apiVersion": "config.openshift.io/v1",
                "kind": "Ingress",
                "metadata": {"name": "cluster"},
                "spec": {"domain": "apps.lab.example.org"}
            }),
        );
        let ctx = test_context(cluster);
        let mut workshop = create_test_workshop(1, &[]);
        workshop.spec.environment = None;

        let spec = resolve(&ctx, workshop).await.unwrap();
        assert_eq!(spec.environment.apps_hostname_suffix, "apps.lab.example.org");
        assert_eq!(
            spec.environment.route_host("gitea", "workshop-gitea"),
            "gitea-workshop-gitea.apps.lab.example.org"
        );
    }

    #[tokio::test]
    async fn test_missing_apps_domain_is_fatal() {
        let ctx = test_context(Arc::new(FakeCluster::new()));
        let mut workshop = create_test_workshop(1, &[]);
        workshop.spec.environment = None;

        let err = resolve(&ctx, workshop).await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_admin_password_read_from_identity_secret() {
        let cluster = Arc::new(FakeCluster::new());
        cluster.insert(
            ResourceKind::Secret,
            json!({
                "apiVersion": "v1",
                "kind": "Secret",
                "metadata": {"name": IDENTITY_SECRET, "namespace": codeready::NAMESPACE},
                "data": {"password": "czNjcjN0"}
            }),
        );
        let ctx = test_context(cluster);

        let workshop = create_test_workshop(1, &[Feature::CodeReadyWorkspaces]);
        let spec = resolve(&ctx, workshop).await.unwrap();
        assert_eq!(spec.environment.admin_password.as_deref(), Some("s3cr3t"));
    }
}
