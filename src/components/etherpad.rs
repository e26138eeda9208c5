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

use super::builders::{App, namespace};
use crate::reconcile::component::ComponentPlan;
use crate::reconcile::environment::Specification;
use crate::types::v1alpha1::feature::FeatureToggle;

pub const NAMESPACE: &str = "workshop-etherpad";
const NAME: &str = "etherpad";
const DEFAULT_IMAGE: &str = "docker.io/etherpad/etherpad:1.8.18";

pub fn plan(spec: &Specification, toggle: &FeatureToggle) -> ComponentPlan {
    let app = App {
        namespace: NAMESPACE,
        name: NAME,
        image: toggle.image_or(DEFAULT_IMAGE).to_owned(),
        port: 9001,
        env: vec![
            ("TITLE", format!("{} notes", spec.workshop.name())),
            ("DEFAULT_PAD_TEXT", "Welcome to the workshop!".to_owned()),
        ],
        service_account: None,
    };

    ComponentPlan {
        prerequisites: vec![namespace(NAMESPACE)],
        instances: app.resources(&spec.environment),
        workloads: vec![app.workload()],
        ..Default::default()
    }
}
