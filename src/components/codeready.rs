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

//! CodeReady Workspaces: operator, CheCluster, and what the per-user
//! workspace bootstrap needs to reach it.

use super::builders::{namespace, operator_group, subscription};
use crate::bootstrap::{TenantUser, WorkspacePlan};
use crate::reconcile::component::ComponentPlan;
use crate::reconcile::environment::Specification;
use crate::types;
use crate::types::error::InvalidDevfileSnafu;
use crate::types::resource::{CustomKind, ResourceDescriptor, ResourceKind, WorkloadRef};
use crate::types::v1alpha1::feature::FeatureToggle;
use serde_json::{Value, json};
use snafu::ResultExt;

pub const NAMESPACE: &str = "workspaces";
const PACKAGE: &str = "codeready-workspaces";
const DEFAULT_CHANNEL: &str = "latest";
const CHE_CLUSTER: &str = "codeready-workspaces";
const SERVER: &str = "codeready";
const IDENTITY_SERVER: &str = "keycloak";

const CHE_CLUSTER_KIND: CustomKind = CustomKind {
    group: "org.eclipse.che",
    version: "v1",
    kind: "CheCluster",
    plural: "checlusters",
    namespaced: true,
};

pub fn plan(spec: &Specification, toggle: &FeatureToggle) -> ComponentPlan {
    let settings = spec.workshop.code_ready_settings();
    let (subscription, approval) = subscription(NAMESPACE, PACKAGE, toggle.channel_or(DEFAULT_CHANNEL));

    let mut workloads = vec![WorkloadRef::deployment(NAMESPACE, SERVER)];
    if !settings.disable_sso {
        workloads.insert(0, WorkloadRef::deployment(NAMESPACE, IDENTITY_SERVER));
    }

    ComponentPlan {
        prerequisites: vec![
            namespace(NAMESPACE),
            operator_group(NAMESPACE, PACKAGE, &[NAMESPACE]),
            subscription,
        ],
        subscriptions: vec![approval],
        operators: vec![WorkloadRef::deployment(NAMESPACE, "codeready-operator")],
        instances: vec![che_cluster(settings.disable_sso)],
        workloads,
        ..Default::default()
    }
}

fn che_cluster(disable_sso: bool) -> ResourceDescriptor {
    ResourceDescriptor::namespaced(
        ResourceKind::Custom(CHE_CLUSTER_KIND),
        NAMESPACE,
        CHE_CLUSTER,
        json!({
            "spec": {
                "server": {
                    "cheFlavor": "codeready",
                    "tlsSupport": true,
                    "selfSignedCert": false,
                    "customCheProperties": {
                        "CHE_LIMITS_USER_WORKSPACES_RUN_COUNT": "1",
                        "CHE_INFRA_KUBERNETES_NAMESPACE_DEFAULT": "<username>-codeready"
                    }
                },
                "database": {"externalDb": false},
                "auth": {
                    "openShiftoAuth": disable_sso,
                    "identityProviderAdminUserName": "admin"
                },
                "storage": {"pvcStrategy": "per-workspace", "pvcClaimSize": "1Gi"}
            }
        }),
    )
    .compare("/spec/auth/openShiftoAuth")
}

pub fn server_url(spec: &Specification) -> String {
    spec.environment.route_url(SERVER, NAMESPACE)
}

/// Identity provider root, including its `/auth` context path.
pub fn identity_url(spec: &Specification) -> String {
    format!("{}/auth", spec.environment.route_url(IDENTITY_SERVER, NAMESPACE))
}

/// Everything the workspace bootstrap needs for this pass.
pub fn workspace_plan(spec: &Specification) -> Result<WorkspacePlan, types::error::Error> {
    let settings = spec.workshop.code_ready_settings();
    let devfile = match &settings.devfile {
        Some(source) => parse_devfile(source)?,
        None => default_devfile(),
    };

    Ok(WorkspacePlan {
        users: spec
            .usernames()
            .map(|username| TenantUser {
                email: format!("{username}@{}", spec.environment.apps_hostname_suffix),
                password: spec.workshop.spec.user.password.clone(),
                username,
            })
            .collect(),
        provision_identities: !settings.disable_sso,
        admin_password: spec.environment.admin_password.clone(),
        workspace_name: settings.workspace_name().to_owned(),
        devfile,
    })
}

/// Accepts YAML or JSON; JSON is valid YAML.
fn parse_devfile(source: &str) -> Result<Value, types::error::Error> {
    serde_yaml_ng::from_str(source).context(InvalidDevfileSnafu)
}

fn default_devfile() -> Value {
    json!({
        "apiVersion": "1.0.0",
        "metadata": {"name": "workshop"},
        "components": [
            {
                "type": "chePlugin",
                "id": "redhat/vscode-openshift-connector/latest"
            },
            {
                "type": "dockerimage",
                "alias": "cli",
                "image": "registry.redhat.io/codeready-workspaces/plugin-java11-rhel8:latest",
                "memoryLimit": "1Gi",
                "mountSources": true
            }
        ]
    })
}
