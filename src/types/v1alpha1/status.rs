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

pub mod component;

use crate::types::v1alpha1::feature::Feature;
use component::ComponentStatus;
use kube::KubeSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Deserialize, Serialize, Clone, Debug, KubeSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    /// Install progress keyed by feature name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub components: BTreeMap<String, ComponentStatus>,

    /// Number of tenant bundles that exist after the last pass
    #[serde(default)]
    pub tenant_bundles: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

impl Status {
    pub fn component(&self, feature: Feature) -> ComponentStatus {
        self.components
            .get(&feature.to_string())
            .copied()
            .unwrap_or_default()
    }

    /// Moves `feature` forward to `to`. Returns whether anything changed.
    ///
    /// A request to move backwards is ignored, so an `Installed` feature
    /// stays `Installed` whatever later passes observe.
    pub fn advance(&mut self, feature: Feature, to: ComponentStatus) -> bool {
        let current = self.components.entry(feature.to_string()).or_default();
        if to > *current {
            *current = to;
            true
        } else {
            false
        }
    }

    /// Equality that ignores bookkeeping fields, used to skip no-op writes.
    pub fn same_progress(&self, other: &Status) -> bool {
        self.components == other.components
            && self.tenant_bundles == other.tenant_bundles
            && self.observed_generation == other.observed_generation
    }
}
