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

use super::builders::{namespace, operator_group, subscription};
use crate::reconcile::component::ComponentPlan;
use crate::types::resource::{CustomKind, ResourceDescriptor, ResourceKind, WorkloadRef};
use crate::types::v1alpha1::feature::FeatureToggle;
use serde_json::json;

const OPERATOR_NAMESPACE: &str = "openshift-serverless";
const SERVING_NAMESPACE: &str = "knative-serving";
const PACKAGE: &str = "serverless-operator";
const DEFAULT_CHANNEL: &str = "stable";

const KNATIVE_SERVING: CustomKind = CustomKind {
    group: "operator.knative.dev",
    version: "v1beta1",
    kind: "KnativeServing",
    plural: "knativeservings",
    namespaced: true,
};

pub fn plan(toggle: &FeatureToggle) -> ComponentPlan {
    let (subscription, approval) = subscription(
        OPERATOR_NAMESPACE,
        PACKAGE,
        toggle.channel_or(DEFAULT_CHANNEL),
    );

    ComponentPlan {
        prerequisites: vec![
            namespace(OPERATOR_NAMESPACE),
            operator_group(OPERATOR_NAMESPACE, "serverless-operators", &[]),
            subscription,
        ],
        subscriptions: vec![approval],
        operators: vec![WorkloadRef::deployment(OPERATOR_NAMESPACE, "knative-operator")],
        instances: vec![
            namespace(SERVING_NAMESPACE),
            ResourceDescriptor::namespaced(
                ResourceKind::Custom(KNATIVE_SERVING),
                SERVING_NAMESPACE,
                SERVING_NAMESPACE,
                json!({ "spec": { "high-availability": { "replicas": 1 } } }),
            ),
        ],
        workloads: vec![WorkloadRef::deployment(SERVING_NAMESPACE, "controller")],
        ..Default::default()
    }
}
