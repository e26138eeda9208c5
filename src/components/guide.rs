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

//! One lab guide per tenant, pre-filled with that tenant's coordinates.

use super::builders::{App, namespace};
use crate::reconcile::component::{ComponentPlan, TenantTemplate};
use crate::reconcile::environment::Specification;
use crate::types::resource::{TenantBundle, WorkloadRef};
use crate::types::v1alpha1::feature::FeatureToggle;

pub const NAMESPACE: &str = "workshop-guides";
const DEFAULT_IMAGE: &str = "quay.io/openshiftlabs/workshopper:1.0";

pub fn plan(spec: &Specification, toggle: &FeatureToggle) -> ComponentPlan {
    ComponentPlan {
        prerequisites: vec![namespace(NAMESPACE)],
        tenants: Some(template(spec, toggle)),
        workloads: spec
            .usernames()
            .map(|username| WorkloadRef::deployment(NAMESPACE, &guide_name(&username)))
            .collect(),
        ..Default::default()
    }
}

fn guide_name(username: &str) -> String {
    format!("guide-{username}")
}

fn template(spec: &Specification, toggle: &FeatureToggle) -> TenantTemplate {
    let prefix = spec.workshop.spec.user.prefix.clone();
    let image = toggle.image_or(DEFAULT_IMAGE).to_owned();
    let env = spec.environment.clone();

    Box::new(move |id| {
        let username = format!("{prefix}{id}");
        let name = guide_name(&username);
        let app = App {
            namespace: NAMESPACE,
            name: &name,
            image: image.clone(),
            port: 8080,
            env: vec![
                ("WORKSHOP_USER", username.clone()),
                ("USER_NAMESPACE", username.clone()),
                ("CONSOLE_URL", env.console_url.clone()),
                ("MASTER_URL", env.api_url.clone()),
                ("APPS_HOSTNAME_SUFFIX", env.apps_hostname_suffix.clone()),
            ],
            service_account: None,
        };
        TenantBundle {
            id,
            resources: app.resources(&env),
        }
    })
}
