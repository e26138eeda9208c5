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

//! Descriptors for the resources the operator converges.

use crate::types;
use crate::types::error::{DecodeSnafu, InvalidDescriptorSnafu};
use kube::api::DynamicObject;
use kube::core::GroupVersionKind;
use kube::discovery::ApiResource;
use serde_json::{Map, Value};
use snafu::ResultExt;
use std::fmt;

pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY: &str = "workshop-operator";

/// A custom resource kind known at compile time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CustomKind {
    pub group: &'static str,
    pub version: &'static str,
    pub kind: &'static str,
    pub plural: &'static str,
    pub namespaced: bool,
}

/// Every kind of object the operator reads or writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    Namespace,
    Deployment,
    Service,
    Secret,
    ServiceAccount,
    Route,
    RoleBinding,
    NetworkPolicy,
    OperatorGroup,
    Subscription,
    InstallPlan,
    SecurityContextConstraints,
    Workshop,
    Custom(CustomKind),
}

impl ResourceKind {
    fn coordinates(&self) -> (&'static str, &'static str, &'static str, &'static str) {
        match self {
            ResourceKind::Namespace => ("", "v1", "Namespace", "namespaces"),
            ResourceKind::Deployment => ("apps", "v1", "Deployment", "deployments"),
            ResourceKind::Service => ("", "v1", "Service", "services"),
            ResourceKind::Secret => ("", "v1", "Secret", "secrets"),
            ResourceKind::ServiceAccount => ("", "v1", "ServiceAccount", "serviceaccounts"),
            ResourceKind::Route => ("route.openshift.io", "v1", "Route", "routes"),
            ResourceKind::RoleBinding => (
                "rbac.authorization.k8s.io",
                "v1",
                "RoleBinding",
                "rolebindings",
            ),
            ResourceKind::NetworkPolicy => (
                "networking.k8s.io",
                "v1",
                "NetworkPolicy",
                "networkpolicies",
            ),
            ResourceKind::OperatorGroup => {
                ("operators.coreos.com", "v1", "OperatorGroup", "operatorgroups")
            }
            ResourceKind::Subscription => (
                "operators.coreos.com",
                "v1alpha1",
                "Subscription",
                "subscriptions",
            ),
            ResourceKind::InstallPlan => (
                "operators.coreos.com",
                "v1alpha1",
                "InstallPlan",
                "installplans",
            ),
            ResourceKind::SecurityContextConstraints => (
                "security.openshift.io",
                "v1",
                "SecurityContextConstraints",
                "securitycontextconstraints",
            ),
            ResourceKind::Workshop => (
                "workshop.openshiftlabs.io",
                "v1alpha1",
                "Workshop",
                "workshops",
            ),
            ResourceKind::Custom(c) => (c.group, c.version, c.kind, c.plural),
        }
    }

    pub fn api_resource(&self) -> ApiResource {
        let (group, version, kind, plural) = self.coordinates();
        ApiResource::from_gvk_with_plural(&GroupVersionKind::gvk(group, version, kind), plural)
    }

    pub fn api_version(&self) -> String {
        let (group, version, _, _) = self.coordinates();
        if group.is_empty() {
            version.to_owned()
        } else {
            format!("{group}/{version}")
        }
    }

    pub fn kind(&self) -> &'static str {
        self.coordinates().2
    }

    pub fn is_namespaced(&self) -> bool {
        match self {
            ResourceKind::Namespace | ResourceKind::SecurityContextConstraints => false,
            ResourceKind::Custom(c) => c.namespaced,
            _ => true,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// Desired state of one object.
///
/// `compared` lists the JSON pointers the converger checks against the live
/// object. Fields outside that list are only written on create, so
/// server-defaulted fields never cause an update.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,
    pub namespace: Option<String>,
    pub name: String,
    pub body: Value,
    pub compared: Vec<&'static str>,
}

impl ResourceDescriptor {
    /// Builds a descriptor, filling in `apiVersion`, `kind`, name, namespace and
    /// the managed-by label where the body does not already carry them.
    pub fn new(kind: ResourceKind, namespace: Option<&str>, name: &str, body: Value) -> Self {
        let mut body = body;
        if let Value::Object(map) = &mut body {
            map.entry("apiVersion")
                .or_insert_with(|| Value::String(kind.api_version()));
            map.entry("kind")
                .or_insert_with(|| Value::String(kind.kind().to_owned()));

            let metadata = map
                .entry("metadata")
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(meta) = metadata {
                meta.insert("name".to_owned(), Value::String(name.to_owned()));
                if let Some(ns) = namespace {
                    meta.insert("namespace".to_owned(), Value::String(ns.to_owned()));
                }
                let labels = meta
                    .entry("labels")
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(labels) = labels {
                    labels
                        .entry(MANAGED_BY_LABEL)
                        .or_insert_with(|| Value::String(MANAGED_BY.to_owned()));
                }
            }
        }

        Self {
            kind,
            namespace: namespace.map(str::to_owned),
            name: name.to_owned(),
            body,
            compared: Vec::new(),
        }
    }

    pub fn namespaced(kind: ResourceKind, namespace: &str, name: &str, body: Value) -> Self {
        Self::new(kind, Some(namespace), name, body)
    }

    pub fn cluster(kind: ResourceKind, name: &str, body: Value) -> Self {
        Self::new(kind, None, name, body)
    }

    /// Adds a JSON pointer to the fields compared against the live object.
    pub fn compare(mut self, pointer: &'static str) -> Self {
        self.compared.push(pointer);
        self
    }

    pub fn validate(&self) -> Result<(), types::error::Error> {
        let fail = |reason: String| {
            InvalidDescriptorSnafu {
                kind: self.kind.to_string(),
                name: self.name.clone(),
                reason,
            }
            .fail()
        };

        if !is_dns_name(&self.name) {
            return fail("name must be a lowercase DNS name".to_owned());
        }
        match (&self.namespace, self.kind.is_namespaced()) {
            (None, true) => return fail("namespaced kind requires a namespace".to_owned()),
            (Some(_), false) => return fail("cluster-scoped kind takes no namespace".to_owned()),
            (Some(ns), true) if !is_dns_name(ns) => {
                return fail(format!("invalid namespace '{ns}'"));
            }
            _ => {}
        }

        let Value::Object(map) = &self.body else {
            return fail("body must be a JSON object".to_owned());
        };
        if map.get("apiVersion").and_then(Value::as_str) != Some(self.kind.api_version().as_str())
        {
            return fail(format!("apiVersion must be '{}'", self.kind.api_version()));
        }
        if map.get("kind").and_then(Value::as_str) != Some(self.kind.kind()) {
            return fail(format!("kind must be '{}'", self.kind.kind()));
        }
        for pointer in &self.compared {
            if !pointer.starts_with('/') {
                return fail(format!("compared field '{pointer}' is not a JSON pointer"));
            }
        }

        Ok(())
    }

    pub fn to_object(&self) -> Result<DynamicObject, types::error::Error> {
        serde_json::from_value(self.body.clone()).context(DecodeSnafu {
            what: format!("{} '{}'", self.kind, self.name),
        })
    }
}

fn is_dns_name(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 253
        && s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
        && s.starts_with(|c: char| c.is_ascii_alphanumeric())
        && s.ends_with(|c: char| c.is_ascii_alphanumeric())
}

/// A workload whose ready replicas gate further progress.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkloadRef {
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
    pub min_ready: i64,
}

impl WorkloadRef {
    pub fn deployment(namespace: &str, name: &str) -> Self {
        Self {
            kind: ResourceKind::Deployment,
            namespace: namespace.to_owned(),
            name: name.to_owned(),
            min_ready: 1,
        }
    }
}

/// The resources that belong to one tenant.
///
/// The first resource is the anchor: it is created first, deleted last, and
/// its presence is what decides whether the bundle exists.
#[derive(Clone, Debug, PartialEq)]
pub struct TenantBundle {
    pub id: u32,
    pub resources: Vec<ResourceDescriptor>,
}

impl TenantBundle {
    pub fn anchor(&self) -> Option<&ResourceDescriptor> {
        self.resources.first()
    }
}
