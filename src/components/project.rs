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

//! The per-user project every tenant gets, whatever features are enabled.

use super::builders::{PART_OF_LABEL, PART_OF, encode, namespace};
use crate::reconcile::component::{ComponentPlan, TenantTemplate};
use crate::reconcile::environment::Specification;
use crate::types::resource::{ResourceDescriptor, ResourceKind, TenantBundle};
use k8s_openapi::api::rbac::v1 as rbacv1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use serde_json::json;

const ADMIN_BINDING: &str = "workshop-admin";
const INGRESS_POLICY: &str = "allow-workshop-ingress";
const INGRESS_GROUP_LABEL: &str = "network.openshift.io/policy-group";

pub fn plan(spec: &Specification) -> ComponentPlan {
    ComponentPlan {
        tenants: Some(template(spec)),
        ..Default::default()
    }
}

pub fn template(spec: &Specification) -> TenantTemplate {
    let prefix = spec.workshop.spec.user.prefix.clone();
    Box::new(move |id| bundle(id, &format!("{prefix}{id}")))
}

fn bundle(id: u32, username: &str) -> TenantBundle {
    TenantBundle {
        id,
        resources: vec![
            namespace(username),
            admin_binding(username),
            ingress_policy(username),
        ],
    }
}

fn admin_binding(username: &str) -> ResourceDescriptor {
    let binding = rbacv1::RoleBinding {
        metadata: metav1::ObjectMeta {
            name: Some(ADMIN_BINDING.to_owned()),
            namespace: Some(username.to_owned()),
            ..Default::default()
        },
        subjects: Some(vec![rbacv1::Subject {
            api_group: Some("rbac.authorization.k8s.io".to_owned()),
            kind: "User".to_owned(),
            name: username.to_owned(),
            ..Default::default()
        }]),
        role_ref: rbacv1::RoleRef {
            api_group: "rbac.authorization.k8s.io".to_owned(),
            kind: "ClusterRole".to_owned(),
            name: "admin".to_owned(),
        },
    };
    encode(ResourceKind::RoleBinding, Some(username), ADMIN_BINDING, &binding)
        .compare("/subjects")
}

/// Lets the router and the shared workshop namespaces reach the tenant.
fn ingress_policy(username: &str) -> ResourceDescriptor {
    ResourceDescriptor::namespaced(
        ResourceKind::NetworkPolicy,
        username,
        INGRESS_POLICY,
        json!({
            "spec": {
                "podSelector": {},
                "policyTypes": ["Ingress"],
                "ingress": [{
                    "from": [
                        {"podSelector": {}},
                        {"namespaceSelector": {"matchLabels": {INGRESS_GROUP_LABEL: "ingress"}}},
                        {"namespaceSelector": {"matchLabels": {PART_OF_LABEL: PART_OF}}}
                    ]
                }]
            }
        }),
    )
    .compare("/spec/ingress")
}
