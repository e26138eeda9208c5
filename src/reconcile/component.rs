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

use super::converge::{self, EnsureOutcome};
use super::environment::Specification;
use super::fanout::{self, FanOutReport};
use super::readiness::{self, Readiness};
use super::{Error, Outcome};
use crate::context::Context;
use crate::types::resource::{ResourceDescriptor, ResourceKind, TenantBundle, WorkloadRef};
use kube::runtime::events::EventType;
use serde_json::{Value, json};
use tracing::{debug, info};

pub type TenantTemplate = Box<dyn Fn(u32) -> TenantBundle + Send + Sync>;

/// An OLM subscription whose install plan the operator approves.
#[derive(Clone, Debug, PartialEq)]
pub struct SubscriptionRef {
    pub namespace: String,
    pub name: String,
}

/// A user to add to a shared SecurityContextConstraints.
#[derive(Clone, Debug, PartialEq)]
pub struct PolicyUser {
    pub policy: String,
    pub user: String,
}

/// Everything one feature installs, in installation order.
#[derive(Default)]
pub struct ComponentPlan {
    pub prerequisites: Vec<ResourceDescriptor>,
    pub subscriptions: Vec<SubscriptionRef>,
    pub operators: Vec<WorkloadRef>,
    pub instances: Vec<ResourceDescriptor>,
    pub policy_users: Vec<PolicyUser>,
    pub tenants: Option<TenantTemplate>,
    pub workloads: Vec<WorkloadRef>,
}

/// What one install call did, for status bookkeeping.
#[derive(Debug, Default)]
pub struct Progress {
    /// At least one object was written or confirmed this pass.
    pub applied: bool,
    pub tenants: Option<FanOutReport>,
}

/// Drives one plan through its stages. Any stage that is not ready
/// short-circuits with a requeue; the next pass starts over and finds the
/// earlier stages already converged.
pub async fn install(
    ctx: &Context,
    spec: &Specification,
    plan: &ComponentPlan,
    progress: &mut Progress,
) -> Result<Outcome, Error> {
    for resource in &plan.prerequisites {
        converge::ensure(ctx, resource).await?;
        progress.applied = true;
    }

    for subscription in &plan.subscriptions {
        proceed!(approve_install_plan(ctx, subscription).await?);
    }

    for operator in &plan.operators {
        proceed!(gate(ctx, spec, operator).await?);
    }

    for resource in &plan.instances {
        converge::ensure(ctx, resource).await?;
        progress.applied = true;
    }

    for grant in &plan.policy_users {
        converge::ensure_policy_user(ctx, &grant.policy, &grant.user).await?;
    }

    if let Some(template) = &plan.tenants {
        let report = fanout::converge(ctx, template, spec.user_count).await?;
        for id in &report.created {
            ctx.record(
                &spec.workshop,
                EventType::Normal,
                "TenantCreated",
                &format!("tenant bundle for {} created", spec.username(*id)),
            )
            .await;
        }
        for id in &report.removed {
            ctx.record(
                &spec.workshop,
                EventType::Normal,
                "TenantRemoved",
                &format!("tenant bundle for {} removed", spec.username(*id)),
            )
            .await;
        }
        progress.applied = true;
        progress.tenants = Some(report);
    }

    for workload in &plan.workloads {
        proceed!(gate(ctx, spec, workload).await?);
    }

    Ok(Outcome::Continue)
}

async fn gate(ctx: &Context, spec: &Specification, workload: &WorkloadRef) -> Result<Outcome, Error> {
    match readiness::wait_ready(ctx, workload).await? {
        Readiness::Ready => Ok(Outcome::Continue),
        Readiness::NotYetReady {
            requeue_after,
            diagnostics,
        } => {
            ctx.record(
                &spec.workshop,
                EventType::Warning,
                "NotReady",
                &format!(
                    "{}/{} not ready: {}",
                    workload.namespace,
                    workload.name,
                    diagnostics.summary()
                ),
            )
            .await;
            Ok(Outcome::Requeue(requeue_after))
        }
    }
}

/// Approves the install plan the subscription points at, once.
///
/// Requeues while OLM has not produced the plan yet. An already approved
/// plan is left alone.
pub async fn approve_install_plan(
    ctx: &Context,
    subscription: &SubscriptionRef,
) -> Result<Outcome, Error> {
    let not_ready = Outcome::Requeue(ctx.settings.not_ready_requeue);

    let Some(live) = ctx
        .cluster
        .get(
            ResourceKind::Subscription,
            Some(&subscription.namespace),
            &subscription.name,
        )
        .await?
    else {
        return Ok(not_ready);
    };

    let plan_ref = live
        .data
        .pointer("/status/installPlanRef")
        .or_else(|| live.data.pointer("/status/installplan"));
    let Some(plan_name) = plan_ref
        .and_then(|r| r.get("name"))
        .and_then(Value::as_str)
    else {
        debug!(subscription = %subscription.name, "install plan not created yet");
        return Ok(not_ready);
    };
    let plan_namespace = plan_ref
        .and_then(|r| r.get("namespace"))
        .and_then(Value::as_str)
        .unwrap_or(&subscription.namespace);

    let outcome = converge::update_existing(
        ctx,
        ResourceKind::InstallPlan,
        Some(plan_namespace),
        plan_name,
        |plan| {
            if plan.data.pointer("/spec/approved") == Some(&Value::Bool(true)) {
                return Ok(false);
            }
            match plan.data.get_mut("spec") {
                Some(Value::Object(spec)) => {
                    spec.insert("approved".to_owned(), Value::Bool(true));
                }
                _ => plan.data["spec"] = json!({ "approved": true }),
            }
            Ok(true)
        },
    )
    .await?;

    match outcome {
        None => Ok(not_ready),
        Some(EnsureOutcome::Updated) => {
            info!(
                subscription = %subscription.name,
                install_plan = plan_name,
                "install plan approved"
            );
            Ok(Outcome::Continue)
        }
        Some(_) => Ok(Outcome::Continue),
    }
}
