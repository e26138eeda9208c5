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

use super::builders::{GLOBAL_OPERATORS_NAMESPACE, subscription};
use crate::reconcile::component::ComponentPlan;
use crate::types::resource::WorkloadRef;
use crate::types::v1alpha1::feature::FeatureToggle;

const PACKAGE: &str = "openshift-pipelines-operator-rh";
const DEFAULT_CHANNEL: &str = "latest";
const OPERATOR: &str = "openshift-pipelines-operator";

/// The operator installs its own instance; nothing else to create.
pub fn plan(toggle: &FeatureToggle) -> ComponentPlan {
    let (subscription, approval) = subscription(
        GLOBAL_OPERATORS_NAMESPACE,
        PACKAGE,
        toggle.channel_or(DEFAULT_CHANNEL),
    );

    ComponentPlan {
        prerequisites: vec![subscription],
        subscriptions: vec![approval],
        operators: vec![WorkloadRef::deployment(GLOBAL_OPERATORS_NAMESPACE, OPERATOR)],
        ..Default::default()
    }
}
