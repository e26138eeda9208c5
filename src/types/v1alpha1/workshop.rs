// Copyright 2025 RustFS Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::types;
use crate::types::error::NoNamespaceSnafu;
use crate::types::v1alpha1::feature::{Feature, FeatureToggle};
use kube::{CustomResource, KubeSchema, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use snafu::OptionExt;

const DEFAULT_USER_PREFIX: &str = "user";
const DEFAULT_USER_PASSWORD: &str = "openshift";
const DEFAULT_WORKSPACE_NAME: &str = "workshop";
const DEFAULT_WORKSPACE_REALM: &str = "codeready";

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, KubeSchema, Default)]
#[kube(
    group = "workshop.openshiftlabs.io",
    version = "v1alpha1",
    kind = "Workshop",
    namespaced,
    status = "crate::types::v1alpha1::status::Status",
    shortname = "ws",
    plural = "workshops",
    singular = "workshop",
    printcolumn = r#"{"name":"Users", "type":"integer", "jsonPath":".spec.user.number"}"#,
    printcolumn = r#"{"name":"Bundles", "type":"integer", "jsonPath":".status.tenantBundles"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#,
    crates(serde_json = "k8s_openapi::serde_json")
)]
#[serde(rename_all = "camelCase")]
pub struct WorkshopSpec {
    #[serde(default)]
    pub user: UserSpec,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<FeatureToggle>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<EnvironmentOverrides>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_ready_workspaces: Option<CodeReadySettings>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSpec {
    /// Desired number of workshop users. Negative values are treated as 0.
    #[serde(default)]
    pub number: i32,

    /// Password shared by every workshop user
    #[serde(default = "default_user_password")]
    pub password: String,

    /// Username prefix; user `n` is named `{prefix}{n}`
    #[serde(default = "default_user_prefix")]
    pub prefix: String,
}

impl Default for UserSpec {
    fn default() -> Self {
        Self {
            number: 0,
            password: default_user_password(),
            prefix: default_user_prefix(),
        }
    }
}

fn default_user_password() -> String {
    DEFAULT_USER_PASSWORD.to_owned()
}

fn default_user_prefix() -> String {
    DEFAULT_USER_PREFIX.to_owned()
}

/// Cluster facts normally discovered at reconcile time.
/// Any field set here wins over discovery.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apps_hostname_suffix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CodeReadySettings {
    /// Skip identity-provider user provisioning; users log in through the
    /// cluster OAuth server instead.
    #[serde(default)]
    pub disable_sso: bool,

    /// Identity-provider admin password. Read from the identity secret when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_name: Option<String>,

    /// Devfile (YAML or JSON) each user's workspace is created from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devfile: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,
}

impl CodeReadySettings {
    pub fn workspace_name(&self) -> &str {
        self.workspace_name
            .as_deref()
            .unwrap_or(DEFAULT_WORKSPACE_NAME)
    }

    pub fn realm(&self) -> &str {
        self.realm.as_deref().unwrap_or(DEFAULT_WORKSPACE_REALM)
    }
}

impl Workshop {
    pub fn namespace(&self) -> Result<String, types::error::Error> {
        ResourceExt::namespace(self).context(NoNamespaceSnafu)
    }

    pub fn name(&self) -> String {
        ResourceExt::name_any(self)
    }

    /// Desired user count, clamped at zero.
    pub fn desired_user_count(&self) -> u32 {
        u32::try_from(self.spec.user.number).unwrap_or(0)
    }

    pub fn username(&self, id: u32) -> String {
        format!("{}{}", self.spec.user.prefix, id)
    }

    pub fn feature(&self, feature: Feature) -> Option<&FeatureToggle> {
        self.spec.features.iter().find(|t| t.name == feature)
    }

    /// The toggle for `feature` if it is present and enabled.
    pub fn enabled(&self, feature: Feature) -> Option<&FeatureToggle> {
        self.feature(feature).filter(|t| t.enabled)
    }

    pub fn code_ready_settings(&self) -> CodeReadySettings {
        self.spec.code_ready_workspaces.clone().unwrap_or_default()
    }
}
