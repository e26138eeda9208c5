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

//! Installable workshop features

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// A feature the operator knows how to install.
///
/// The declaration order is the installation order: a feature may rely on
/// anything declared before it.
#[derive(
    Deserialize,
    Serialize,
    Clone,
    Copy,
    Debug,
    JsonSchema,
    Display,
    EnumIter,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Feature {
    /// Shared collaborative editor
    Etherpad,

    /// Git server, plus one git account per user
    Gitea,

    /// Artifact repository
    Nexus,

    /// OpenShift Pipelines operator
    Pipelines,

    /// OpenShift Serverless operator and a KnativeServing instance
    Serverless,

    /// Service Mesh operators, control plane and member roll
    ServiceMesh,

    /// CodeReady Workspaces, plus one running workspace per user
    CodeReadyWorkspaces,

    /// Per-user lab guide
    Guide,
}

impl Feature {
    /// Features that finish with an external bootstrap step after their
    /// resources are ready.
    pub fn has_bootstrap(&self) -> bool {
        matches!(self, Feature::Gitea | Feature::CodeReadyWorkspaces)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeatureToggle {
    pub name: Feature,

    #[serde(default)]
    pub enabled: bool,

    /// Image reference for features that run a workload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Subscription channel for operator-backed features
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

impl FeatureToggle {
    pub fn image_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.image.as_deref().unwrap_or(default)
    }

    pub fn channel_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.channel.as_deref().unwrap_or(default)
    }
}
