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

use super::builders::{App, namespace, service_account};
use crate::bootstrap::TenantUser;
use crate::reconcile::component::{ComponentPlan, PolicyUser};
use crate::reconcile::environment::Specification;
use crate::types::v1alpha1::feature::FeatureToggle;

pub const NAMESPACE: &str = "workshop-gitea";
const NAME: &str = "gitea";
const DEFAULT_IMAGE: &str = "docker.io/gitea/gitea:1.17.3";
const POLICY: &str = "anyuid";

pub fn plan(spec: &Specification, toggle: &FeatureToggle) -> ComponentPlan {
    let root_url = spec.environment.route_url(NAME, NAMESPACE);
    let app = App {
        namespace: NAMESPACE,
        name: NAME,
        image: toggle.image_or(DEFAULT_IMAGE).to_owned(),
        port: 3000,
        env: vec![
            ("GITEA__server__ROOT_URL", root_url),
            ("GITEA__database__DB_TYPE", "sqlite3".to_owned()),
            ("GITEA__security__INSTALL_LOCK", "true".to_owned()),
            ("GITEA__service__DISABLE_REGISTRATION", "false".to_owned()),
            ("GITEA__service__REQUIRE_SIGNIN_VIEW", "false".to_owned()),
        ],
        service_account: Some(NAME),
    };

    let mut instances = vec![service_account(NAMESPACE, NAME)];
    instances.extend(app.resources(&spec.environment));

    ComponentPlan {
        prerequisites: vec![namespace(NAMESPACE)],
        instances,
        policy_users: vec![PolicyUser {
            policy: POLICY.to_owned(),
            user: format!("system:serviceaccount:{NAMESPACE}:{NAME}"),
        }],
        workloads: vec![app.workload()],
        ..Default::default()
    }
}

/// Root URL of the git server.
pub fn base_url(spec: &Specification) -> String {
    spec.environment.route_url(NAME, NAMESPACE)
}

/// Git accounts to sign up, one per tenant.
pub fn users(spec: &Specification) -> Vec<TenantUser> {
    spec.usernames()
        .map(|username| TenantUser {
            email: format!("{username}@{}", spec.environment.apps_hostname_suffix),
            password: spec.workshop.spec.user.password.clone(),
            username,
        })
        .collect()
}
