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

//! Shared builders for the objects most features install.

use crate::reconcile::component::SubscriptionRef;
use crate::reconcile::environment::Environment;
use crate::types::resource::{ResourceDescriptor, ResourceKind, WorkloadRef};
use k8s_openapi::api::apps::v1 as appsv1;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use k8s_openapi::apimachinery::pkg::util::intstr;
use serde::Serialize;
use serde_json::json;
#[cfg(test)]
use serde_json::Value;
use std::collections::BTreeMap;

pub const PART_OF_LABEL: &str = "app.kubernetes.io/part-of";
pub const PART_OF: &str = "workshop";
pub const APP_LABEL: &str = "app.kubernetes.io/name";

const CATALOG_SOURCE: &str = "redhat-operators";
const CATALOG_NAMESPACE: &str = "openshift-marketplace";

/// Namespace that already carries a cluster-wide OperatorGroup.
pub const GLOBAL_OPERATORS_NAMESPACE: &str = "openshift-operators";

pub(crate) fn encode<T: Serialize>(
    kind: ResourceKind,
    namespace: Option<&str>,
    name: &str,
    object: &T,
) -> ResourceDescriptor {
    // a body that fails to encode is left null and rejected by validation
    let body = serde_json::to_value(object).unwrap_or_default();
    ResourceDescriptor::new(kind, namespace, name, body)
}

pub fn part_of_labels() -> BTreeMap<String, String> {
    BTreeMap::from([(PART_OF_LABEL.to_owned(), PART_OF.to_owned())])
}

pub fn app_labels(app: &str) -> BTreeMap<String, String> {
    let mut labels = part_of_labels();
    labels.insert(APP_LABEL.to_owned(), app.to_owned());
    labels
}

pub fn namespace(name: &str) -> ResourceDescriptor {
    let namespace = corev1::Namespace {
        metadata: metav1::ObjectMeta {
            name: Some(name.to_owned()),
            labels: Some(part_of_labels()),
            ..Default::default()
        },
        ..Default::default()
    };
    encode(ResourceKind::Namespace, None, name, &namespace)
}

pub fn service_account(namespace: &str, name: &str) -> ResourceDescriptor {
    let account = corev1::ServiceAccount {
        metadata: metav1::ObjectMeta {
            name: Some(name.to_owned()),
            namespace: Some(namespace.to_owned()),
            labels: Some(part_of_labels()),
            ..Default::default()
        },
        ..Default::default()
    };
    encode(ResourceKind::ServiceAccount, Some(namespace), name, &account)
}

/// A single-container web application exposed through a route.
#[derive(Clone, Debug)]
pub struct App<'a> {
    pub namespace: &'a str,
    pub name: &'a str,
    pub image: String,
    pub port: i32,
    pub env: Vec<(&'static str, String)>,
    pub service_account: Option<&'a str>,
}

impl App<'_> {
    pub fn deployment(&self) -> ResourceDescriptor {
        let labels = app_labels(self.name);
        let env = self
            .env
            .iter()
            .map(|(name, value)| corev1::EnvVar {
                name: (*name).to_owned(),
                value: Some(value.clone()),
                ..Default::default()
            })
            .collect::<Vec<_>>();

        let deployment = appsv1::Deployment {
            metadata: metav1::ObjectMeta {
                name: Some(self.name.to_owned()),
                namespace: Some(self.namespace.to_owned()),
                labels: Some(labels.clone()),
                ..Default::default()
            },
            spec: Some(appsv1::DeploymentSpec {
                replicas: Some(1),
                selector: metav1::LabelSelector {
                    match_labels: Some(labels.clone()),
                    ..Default::default()
                },
                template: corev1::PodTemplateSpec {
                    metadata: Some(metav1::ObjectMeta {
                        labels: Some(labels),
                        ..Default::default()
                    }),
                    spec: Some(corev1::PodSpec {
                        service_account_name: self.service_account.map(str::to_owned),
                        containers: vec![corev1::Container {
                            name: self.name.to_owned(),
                            image: Some(self.image.clone()),
                            ports: Some(vec![corev1::ContainerPort {
                                container_port: self.port,
                                name: Some("http".to_owned()),
                                ..Default::default()
                            }]),
                            env: (!env.is_empty()).then_some(env),
                            readiness_probe: Some(corev1::Probe {
                                tcp_socket: Some(corev1::TCPSocketAction {
                                    port: intstr::IntOrString::Int(self.port),
                                    ..Default::default()
                                }),
                                initial_delay_seconds: Some(5),
                                ..Default::default()
                            }),
                            ..Default::default()
                        }],
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        };

        encode(ResourceKind::Deployment, Some(self.namespace), self.name, &deployment)
            .compare("/spec/template/spec/containers/0/image")
            .compare("/spec/template/spec/containers/0/env")
    }

    pub fn service(&self) -> ResourceDescriptor {
        let service = corev1::Service {
            metadata: metav1::ObjectMeta {
                name: Some(self.name.to_owned()),
                namespace: Some(self.namespace.to_owned()),
                labels: Some(app_labels(self.name)),
                ..Default::default()
            },
            spec: Some(corev1::ServiceSpec {
                type_: Some("ClusterIP".to_owned()),
                selector: Some(app_labels(self.name)),
                ports: Some(vec![corev1::ServicePort {
                    port: self.port,
                    target_port: Some(intstr::IntOrString::Int(self.port)),
                    name: Some("http".to_owned()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };
        encode(ResourceKind::Service, Some(self.namespace), self.name, &service)
    }

    pub fn route(&self, env: &Environment) -> ResourceDescriptor {
        route(env, self.namespace, self.name, self.name)
    }

    pub fn workload(&self) -> WorkloadRef {
        WorkloadRef::deployment(self.namespace, self.name)
    }

    /// Deployment, service and route, in that order.
    pub fn resources(&self, env: &Environment) -> Vec<ResourceDescriptor> {
        vec![self.deployment(), self.service(), self.route(env)]
    }
}

/// Edge-terminated route to the `http` port of `service`.
pub fn route(env: &Environment, namespace: &str, name: &str, service: &str) -> ResourceDescriptor {
    ResourceDescriptor::namespaced(
        ResourceKind::Route,
        namespace,
        name,
        json!({
            "spec": {
                "host": env.route_host(name, namespace),
                "to": {"kind": "Service", "name": service, "weight": 100},
                "port": {"targetPort": "http"},
                "tls": {
                    "termination": "edge",
                    "insecureEdgeTerminationPolicy": "Redirect"
                }
            }
        }),
    )
    .compare("/spec/host")
    .compare("/spec/to")
}

/// OperatorGroup targeting `targets`, or every namespace when empty.
pub fn operator_group(namespace: &str, name: &str, targets: &[&str]) -> ResourceDescriptor {
    let spec = if targets.is_empty() {
        json!({})
    } else {
        json!({ "targetNamespaces": targets })
    };
    ResourceDescriptor::namespaced(
        ResourceKind::OperatorGroup,
        namespace,
        name,
        json!({ "spec": spec }),
    )
}

/// An OLM subscription with manual install plan approval.
pub fn subscription(
    namespace: &str,
    package: &str,
    channel: &str,
) -> (ResourceDescriptor, SubscriptionRef) {
    let descriptor = ResourceDescriptor::namespaced(
        ResourceKind::Subscription,
        namespace,
        package,
        json!({
            "spec": {
                "channel": channel,
                "name": package,
                "source": CATALOG_SOURCE,
                "sourceNamespace": CATALOG_NAMESPACE,
                "installPlanApproval": "Manual"
            }
        }),
    )
    .compare("/spec/channel");
    let reference = SubscriptionRef {
        namespace: namespace.to_owned(),
        name: package.to_owned(),
    };
    (descriptor, reference)
}

#[cfg(test)]
pub fn string_at<'a>(descriptor: &'a ResourceDescriptor, pointer: &str) -> Option<&'a str> {
    descriptor.body.pointer(pointer).and_then(Value::as_str)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn env() -> Environment {
        Environment {
            api_url: "https://api.example.com:6443".to_string(),
            console_url: "https://console-openshift-console.apps.example.com".to_string(),
            apps_hostname_suffix: "apps.example.com".to_string(),
            admin_password: None,
        }
    }

    fn etherpad() -> App<'static> {
        App {
            namespace: "workshop-etherpad",
            name: "etherpad",
            image: "etherpad/etherpad:1.8.18".to_string(),
            port: 9001,
            env: vec![("TITLE", "Workshop".to_string())],
            service_account: None,
        }
    }

    #[test]
    fn test_app_resources_are_valid() {
        for resource in etherpad().resources(&env()) {
            resource.validate().unwrap();
            assert_eq!(resource.namespace.as_deref(), Some("workshop-etherpad"));
        }
    }

    #[test]
    fn test_deployment_compares_image_and_env() {
        let d = etherpad().deployment();
        assert_eq!(
            string_at(&d, "/spec/template/spec/containers/0/image"),
            Some("etherpad/etherpad:1.8.18")
        );
        assert_eq!(
            d.body.pointer("/spec/template/spec/containers/0/env/0/name"),
            Some(&json!("TITLE"))
        );
        assert!(d.compared.contains(&"/spec/template/spec/containers/0/image"));
        assert_eq!(
            d.body["spec"]["selector"]["matchLabels"][APP_LABEL],
            "etherpad"
        );
    }

    #[test]
    fn test_route_host_follows_router_convention() {
        let r = etherpad().route(&env());
        assert_eq!(
            string_at(&r, "/spec/host"),
            Some("etherpad-workshop-etherpad.apps.example.com")
        );
    }

    #[test]
    fn test_subscription_is_manual() {
        let (d, reference) = subscription(GLOBAL_OPERATORS_NAMESPACE, "servicemeshoperator", "stable");
        d.validate().unwrap();
        assert_eq!(string_at(&d, "/spec/installPlanApproval"), Some("Manual"));
        assert_eq!(reference.name, "servicemeshoperator");
    }
}
