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

use crate::bootstrap::{self, CheClient, GiteaClient, KeycloakClient};
use crate::cluster;
use crate::components::{self, codeready, gitea};
use crate::context::Context;
use crate::types;
use crate::types::error::DecodeSnafu;
use crate::types::resource::ResourceKind;
use crate::types::v1alpha1::feature::Feature;
use crate::types::v1alpha1::status::Status;
use crate::types::v1alpha1::status::component::ComponentStatus;
use crate::types::v1alpha1::workshop::Workshop;
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use snafu::{ResultExt, Snafu};
use std::sync::Arc;
use std::time::Duration;
use strum::IntoEnumIterator;
use tracing::{debug, error, info, warn};

/// Result of a step that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Requeue(Duration),
}

/// Returns early from the enclosing step unless `$step` is `Continue`.
macro_rules! proceed {
    ($step:expr) => {
        match $step {
            $crate::reconcile::Outcome::Continue => {}
            requeue => return Ok(requeue),
        }
    };
}

pub mod component;
pub mod converge;
pub mod environment;
pub mod fanout;
pub mod readiness;

use component::Progress;
use environment::Specification;

#[derive(Snafu, Debug)]
pub enum Error {
    #[snafu(transparent)]
    Cluster { source: cluster::Error },

    #[snafu(transparent)]
    Types { source: types::error::Error },

    #[snafu(transparent)]
    Bootstrap { source: bootstrap::Error },
}

impl Error {
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Cluster { source } => source.is_transient(),
            Error::Types { .. } => false,
            Error::Bootstrap { source } => source.is_transient(),
        }
    }
}

fn object_key(workshop: &Workshop) -> String {
    format!(
        "{}/{}",
        workshop.namespace().unwrap_or_default(),
        workshop.name()
    )
}

pub async fn reconcile_workshop(workshop: Arc<Workshop>, ctx: Arc<Context>) -> Result<Action, Error> {
    let ns = workshop.namespace()?;
    let name = workshop.name();
    let key = object_key(&workshop);

    let Some(latest) = ctx
        .cluster
        .get(ResourceKind::Workshop, Some(&ns), &name)
        .await?
    else {
        debug!(workshop = %key, "workshop no longer exists");
        ctx.clear_failures(&key);
        return Ok(Action::await_change());
    };
    let latest: Workshop = serde_json::to_value(&latest)
        .and_then(serde_json::from_value)
        .context(DecodeSnafu {
            what: format!("workshop '{key}'"),
        })?;

    if latest.metadata.deletion_timestamp.is_some() {
        debug!(
            workshop = %key,
            "workshop is being deleted, deletion_timestamp is {:?}",
            latest.metadata.deletion_timestamp
        );
        ctx.clear_failures(&key);
        return Ok(Action::await_change());
    }

    match run_pass(&ctx, latest).await {
        Ok(Outcome::Continue) => {
            ctx.clear_failures(&key);
            info!(workshop = %key, "workshop converged");
            Ok(Action::requeue(ctx.settings.resync_interval))
        }
        Ok(Outcome::Requeue(delay)) => {
            ctx.clear_failures(&key);
            debug!(workshop = %key, ?delay, "pass incomplete, requeueing");
            Ok(Action::requeue(delay))
        }
        Err(e) if e.is_transient() => {
            warn!(workshop = %key, error = %e, "transient failure, requeueing");
            Ok(Action::requeue(ctx.settings.transient_requeue))
        }
        Err(e) => {
            ctx.record(&workshop, EventType::Warning, "ReconcileFailed", &e.to_string())
                .await;
            Err(e)
        }
    }
}

/// Backoff for errors `reconcile_workshop` could not turn into a requeue.
pub fn error_policy(workshop: Arc<Workshop>, error: &Error, ctx: Arc<Context>) -> Action {
    let key = object_key(&workshop);
    if error.is_transient() {
        warn!(workshop = %key, "reconcile failed: {}", error);
        return Action::requeue(ctx.settings.transient_requeue);
    }

    let failures = ctx.note_failure(&key);
    let delay = ctx.settings.error_backoff_for(failures);
    error!(workshop = %key, failures, ?delay, "reconcile failed: {}", error);
    Action::requeue(delay)
}

/// One pass: resolve the environment, run every step, write status once.
async fn run_pass(ctx: &Context, workshop: Workshop) -> Result<Outcome, Error> {
    let spec = environment::resolve(ctx, workshop).await?;
    let previous = spec.workshop.status.clone().unwrap_or_default();
    let mut status = previous.clone();

    let outcome = run_steps(ctx, &spec, &mut status).await;

    status.observed_generation = spec.workshop.metadata.generation;
    if !status.same_progress(&previous) {
        status.last_transition_time = Some(chrono::Utc::now().to_rfc3339());
        if let Err(e) = persist_status(ctx, &spec, &status).await {
            // a step error takes precedence over a failed status write
            return Err(outcome.err().unwrap_or(e));
        }
    }
    outcome
}

async fn persist_status(ctx: &Context, spec: &Specification, status: &Status) -> Result<(), Error> {
    let value = serde_json::to_value(status).context(DecodeSnafu {
        what: "workshop status",
    })?;
    ctx.cluster
        .patch_status(
            ResourceKind::Workshop,
            Some(&spec.namespace),
            &spec.workshop.name(),
            value,
        )
        .await?;
    Ok(())
}

async fn run_steps(ctx: &Context, spec: &Specification, status: &mut Status) -> Result<Outcome, Error> {
    for feature in Feature::iter() {
        if spec.enabled(feature).is_some() {
            status.advance(feature, ComponentStatus::Scheduled);
        }
    }

    let mut progress = Progress::default();
    let outcome = component::install(ctx, spec, &components::project::plan(spec), &mut progress).await;
    if let Some(report) = &progress.tenants {
        status.tenant_bundles = i32::try_from(report.applied.len()).unwrap_or(i32::MAX);
    }
    proceed!(outcome?);

    for feature in Feature::iter() {
        let Some(toggle) = spec.enabled(feature) else {
            continue;
        };
        let plan = components::plan(feature, spec, toggle);
        let mut progress = Progress::default();
        let outcome = component::install(ctx, spec, &plan, &mut progress).await;
        if progress.applied {
            status.advance(feature, ComponentStatus::InProgress);
        }
        proceed!(outcome?);

        if !feature.has_bootstrap() {
            mark_installed(ctx, spec, status, feature).await;
        }
    }

    for feature in Feature::iter().filter(Feature::has_bootstrap) {
        if spec.enabled(feature).is_none() {
            continue;
        }
        proceed!(run_bootstrap(ctx, spec, feature).await?);
        mark_installed(ctx, spec, status, feature).await;
    }

    Ok(Outcome::Continue)
}

async fn mark_installed(ctx: &Context, spec: &Specification, status: &mut Status, feature: Feature) {
    if status.advance(feature, ComponentStatus::Installed) {
        info!(workshop = %spec.workshop.name(), %feature, "feature installed");
        ctx.record(
            &spec.workshop,
            EventType::Normal,
            "Installed",
            &format!("{feature} installed"),
        )
        .await;
    }
}

async fn run_bootstrap(ctx: &Context, spec: &Specification, feature: Feature) -> Result<Outcome, Error> {
    let report = match feature {
        Feature::Gitea => {
            let git = GiteaClient::new(ctx.http.clone(), gitea::base_url(spec));
            bootstrap::sign_up_git_users(&git, &gitea::users(spec)).await?
        }
        Feature::CodeReadyWorkspaces => {
            let plan = codeready::workspace_plan(spec)?;
            if plan.provision_identities && plan.admin_password.is_none() {
                debug!("identity admin password not available yet");
                return Ok(Outcome::Requeue(ctx.settings.not_ready_requeue));
            }
            let settings = spec.workshop.code_ready_settings();
            let identity = KeycloakClient::new(
                ctx.http.clone(),
                codeready::identity_url(spec),
                settings.realm(),
            );
            let workspaces = CheClient::new(ctx.http.clone(), codeready::server_url(spec));
            bootstrap::bootstrap_workspaces(&identity, &workspaces, &plan).await?
        }
        _ => return Ok(Outcome::Continue),
    };

    if report.is_complete() {
        return Ok(Outcome::Continue);
    }

    let failed = report
        .failed
        .iter()
        .map(|(user, _)| user.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    ctx.record(
        &spec.workshop,
        EventType::Warning,
        "BootstrapIncomplete",
        &format!("{feature} bootstrap failed for {failed}"),
    )
    .await;
    Ok(Outcome::Requeue(ctx.settings.transient_requeue))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::components::etherpad;
    use crate::tests::{FakeCluster, create_test_workshop, test_context};

    fn etherpad_status(cluster: &FakeCluster) -> Status {
        let value = cluster
            .object(ResourceKind::Workshop, Some(crate::tests::TEST_NAMESPACE), "workshop")
            .unwrap();
        serde_json::from_value(value["status"].clone()).unwrap()
    }

    fn set_users(cluster: &FakeCluster, users: i32) {
        cluster.modify(
            ResourceKind::Workshop,
            Some(crate::tests::TEST_NAMESPACE),
            "workshop",
            |v| {
                v["spec"]["user"]["number"] = serde_json::json!(users);
                v["metadata"]["generation"] = serde_json::json!(2);
            },
        );
    }

    #[tokio::test]
    async fn test_users_and_etherpad_scenario() {
        let cluster = Arc::new(FakeCluster::new());
        let workshop = create_test_workshop(3, &[Feature::Etherpad]);
        cluster.seed_workshop(&workshop);
        let ctx = Arc::new(test_context(cluster.clone()));
        let workshop = Arc::new(workshop);

        // pass 1: bundles created, etherpad waits for its deployment
        let action = reconcile_workshop(workshop.clone(), ctx.clone()).await.unwrap();
        assert_eq!(action, Action::requeue(ctx.settings.not_ready_requeue));
        assert_eq!(cluster.names(ResourceKind::Namespace).len(), 4);
        for user in ["user1", "user2", "user3"] {
            assert!(cluster.exists(ResourceKind::Namespace, None, user));
        }
        let status = etherpad_status(&cluster);
        assert_eq!(status.tenant_bundles, 3);
        assert_eq!(status.component(Feature::Etherpad), ComponentStatus::InProgress);

        // pass 2: deployment ready
        cluster.set_ready_replicas(etherpad::NAMESPACE, "etherpad", 1);
        let action = reconcile_workshop(workshop.clone(), ctx.clone()).await.unwrap();
        assert_eq!(action, Action::requeue(ctx.settings.resync_interval));
        assert_eq!(
            etherpad_status(&cluster).component(Feature::Etherpad),
            ComponentStatus::Installed
        );
        let user1 = cluster.object(ResourceKind::Namespace, None, "user1").unwrap();

        // pass 3: scale down to one user
        set_users(&cluster, 1);
        reconcile_workshop(workshop.clone(), ctx.clone()).await.unwrap();
        assert!(cluster.exists(ResourceKind::Namespace, None, "user1"));
        assert!(!cluster.exists(ResourceKind::Namespace, None, "user2"));
        assert!(!cluster.exists(ResourceKind::Namespace, None, "user3"));
        assert_eq!(
            cluster.object(ResourceKind::Namespace, None, "user1").unwrap()["metadata"]
                ["resourceVersion"],
            user1["metadata"]["resourceVersion"]
        );
        let status = etherpad_status(&cluster);
        assert_eq!(status.tenant_bundles, 1);
        assert_eq!(status.observed_generation, Some(2));
        assert_eq!(status.component(Feature::Etherpad), ComponentStatus::Installed);
        assert!(cluster.events().iter().any(|(reason, _)| reason == "Installed"));
    }

    #[tokio::test]
    async fn test_converged_pass_does_not_rewrite_status() {
        let cluster = Arc::new(FakeCluster::new());
        let workshop = create_test_workshop(1, &[]);
        cluster.seed_workshop(&workshop);
        let ctx = Arc::new(test_context(cluster.clone()));
        let workshop = Arc::new(workshop);

        reconcile_workshop(workshop.clone(), ctx.clone()).await.unwrap();
        let first = etherpad_status(&cluster);
        reconcile_workshop(workshop.clone(), ctx.clone()).await.unwrap();

        assert_eq!(etherpad_status(&cluster), first);
    }

    #[tokio::test]
    async fn test_disabled_feature_creates_nothing() {
        let cluster = Arc::new(FakeCluster::new());
        let mut workshop = create_test_workshop(1, &[Feature::Nexus]);
        workshop.spec.features[0].enabled = false;
        cluster.seed_workshop(&workshop);
        let ctx = Arc::new(test_context(cluster.clone()));

        let action = reconcile_workshop(Arc::new(workshop), ctx.clone()).await.unwrap();

        assert_eq!(action, Action::requeue(ctx.settings.resync_interval));
        assert_eq!(cluster.names(ResourceKind::Namespace), vec!["user1"]);
        assert_eq!(
            etherpad_status(&cluster).component(Feature::Nexus),
            ComponentStatus::NotScheduled
        );
    }

    #[tokio::test]
    async fn test_deleted_workshop_awaits_change() {
        let cluster = Arc::new(FakeCluster::new());
        let workshop = create_test_workshop(2, &[]);
        cluster.seed_workshop(&workshop);
        cluster.modify(
            ResourceKind::Workshop,
            Some(crate::tests::TEST_NAMESPACE),
            "workshop",
            |v| v["metadata"]["deletionTimestamp"] = serde_json::json!("2026-01-01T00:00:00Z"),
        );
        let ctx = Arc::new(test_context(cluster.clone()));

        let action = reconcile_workshop(Arc::new(workshop), ctx).await.unwrap();
        assert_eq!(action, Action::await_change());
        assert!(cluster.names(ResourceKind::Namespace).is_empty());
    }

    #[tokio::test]
    async fn test_transient_failure_becomes_requeue() {
        let cluster = Arc::new(FakeCluster::new());
        let workshop = create_test_workshop(2, &[]);
        cluster.seed_workshop(&workshop);
        cluster.fail_on("user2");
        let ctx = Arc::new(test_context(cluster.clone()));

        let action = reconcile_workshop(Arc::new(workshop), ctx.clone()).await.unwrap();
        assert_eq!(action, Action::requeue(ctx.settings.transient_requeue));
        assert!(cluster.exists(ResourceKind::Namespace, None, "user1"));
    }

    #[tokio::test]
    async fn test_fatal_error_backs_off_per_object() {
        let cluster = Arc::new(FakeCluster::new());
        let mut workshop = create_test_workshop(1, &[]);
        workshop.spec.user.prefix = "User_".to_string();
        cluster.seed_workshop(&workshop);
        let ctx = Arc::new(test_context(cluster.clone()));
        let workshop = Arc::new(workshop);

        let err = reconcile_workshop(workshop.clone(), ctx.clone())
            .await
            .unwrap_err();
        assert!(!err.is_transient());
        assert!(cluster.events().iter().any(|(reason, _)| reason == "ReconcileFailed"));

        let first = error_policy(workshop.clone(), &err, ctx.clone());
        let second = error_policy(workshop.clone(), &err, ctx.clone());
        assert_eq!(first, Action::requeue(Duration::from_secs(5)));
        assert_eq!(second, Action::requeue(Duration::from_secs(10)));
    }

    #[tokio::test]
    async fn test_removed_workshop_forgets_its_backoff() {
        let cluster = Arc::new(FakeCluster::new());
        let mut workshop = create_test_workshop(1, &[]);
        workshop.spec.user.prefix = "User_".to_string();
        cluster.seed_workshop(&workshop);
        let ctx = Arc::new(test_context(cluster.clone()));
        let workshop = Arc::new(workshop);

        let err = reconcile_workshop(workshop.clone(), ctx.clone())
            .await
            .unwrap_err();
        error_policy(workshop.clone(), &err, ctx.clone());
        error_policy(workshop.clone(), &err, ctx.clone());

        ctx.cluster
            .delete(ResourceKind::Workshop, Some(crate::tests::TEST_NAMESPACE), "workshop")
            .await
            .unwrap();
        let action = reconcile_workshop(workshop.clone(), ctx.clone()).await.unwrap();
        assert_eq!(action, Action::await_change());

        // a recreated workshop starts from the base delay again
        let again = error_policy(workshop, &err, ctx);
        assert_eq!(again, Action::requeue(Duration::from_secs(5)));
    }
}
