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

//! Service Mesh operators, one control plane, and a member roll that lists
//! every tenant namespace.

use super::builders::{GLOBAL_OPERATORS_NAMESPACE, namespace, subscription};
use crate::reconcile::component::ComponentPlan;
use crate::reconcile::environment::Specification;
use crate::types::resource::{CustomKind, ResourceDescriptor, ResourceKind, WorkloadRef};
use crate::types::v1alpha1::feature::FeatureToggle;
use serde_json::json;

const CONTROL_PLANE_NAMESPACE: &str = "istio-system";
const CONTROL_PLANE: &str = "basic";
const MEMBER_ROLL: &str = "default";
const DEFAULT_CHANNEL: &str = "stable";
const DEFAULT_VERSION: &str = "v2.2";

/// Packages in install order, with the operator deployment each one runs.
const OPERATORS: [(&str, &str); 4] = [
    ("elasticsearch-operator", "elasticsearch-operator"),
    ("jaeger-product", "jaeger-operator"),
    ("kiali-ossm", "kiali-operator"),
    ("servicemeshoperator", "istio-operator"),
];

const CONTROL_PLANE_KIND: CustomKind = CustomKind {
    group: "maistra.io",
    version: "v2",
    kind: "ServiceMeshControlPlane",
    plural: "servicemeshcontrolplanes",
    namespaced: true,
};

const MEMBER_ROLL_KIND: CustomKind = CustomKind {
    group: "maistra.io",
    version: "v1",
    kind: "ServiceMeshMemberRoll",
    plural: "servicemeshmemberrolls",
    namespaced: true,
};

pub fn plan(spec: &Specification, toggle: &FeatureToggle) -> ComponentPlan {
    let channel = toggle.channel_or(DEFAULT_CHANNEL);
    let mut plan = ComponentPlan {
        prerequisites: vec![namespace(CONTROL_PLANE_NAMESPACE)],
        ..Default::default()
    };
    for (package, deployment) in OPERATORS {
        let (subscription, approval) = subscription(GLOBAL_OPERATORS_NAMESPACE, package, channel);
        plan.prerequisites.push(subscription);
        plan.subscriptions.push(approval);
        plan.operators
            .push(WorkloadRef::deployment(GLOBAL_OPERATORS_NAMESPACE, deployment));
    }

    plan.instances = vec![control_plane(), member_roll(spec)];
    plan.workloads = vec![WorkloadRef::deployment(
        CONTROL_PLANE_NAMESPACE,
        &format!("istiod-{CONTROL_PLANE}"),
    )];
    plan
}

fn control_plane() -> ResourceDescriptor {
    ResourceDescriptor::namespaced(
        ResourceKind::Custom(CONTROL_PLANE_KIND),
        CONTROL_PLANE_NAMESPACE,
        CONTROL_PLANE,
        json!({
            "spec": {
                "version": DEFAULT_VERSION,
                "tracing": {"type": "Jaeger", "sampling": 10000},
                "addons": {
                    "jaeger": {"install": {"storage": {"type": "Memory"}}},
                    "kiali": {"enabled": true},
                    "grafana": {"enabled": true}
                }
            }
        }),
    )
}

/// Member roll over the current tenant namespaces; compared so it follows
/// the user count.
fn member_roll(spec: &Specification) -> ResourceDescriptor {
    let members = spec.usernames().collect::<Vec<_>>();
    ResourceDescriptor::namespaced(
        ResourceKind::Custom(MEMBER_ROLL_KIND),
        CONTROL_PLANE_NAMESPACE,
        MEMBER_ROLL,
        json!({ "spec": { "members": members } }),
    )
    .compare("/spec/members")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::reconcile::environment;
    use crate::tests::{FakeCluster, create_test_workshop, test_context};
    use crate::types::v1alpha1::feature::Feature;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_member_roll_lists_every_tenant() {
        let ctx = test_context(Arc::new(FakeCluster::new()));
        let workshop = create_test_workshop(3, &[Feature::ServiceMesh]);
        let spec = environment::resolve(&ctx, workshop).await.unwrap();
        let toggle = spec.enabled(Feature::ServiceMesh).unwrap().clone();

        let plan = plan(&spec, &toggle);

        assert_eq!(plan.subscriptions.len(), 4);
        assert_eq!(plan.operators.len(), 4);
        let roll = &plan.instances[1];
        assert_eq!(roll.body["spec"]["members"], json!(["user1", "user2", "user3"]));
        assert_eq!(roll.compared, vec!["/spec/members"]);
        for resource in plan.prerequisites.iter().chain(&plan.instances) {
            resource.validate().unwrap();
        }
    }
}
