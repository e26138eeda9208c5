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

//! Per-tenant bundles keyed by dense ids `1..=n`.

use super::Error;
use super::converge::{self, EnsureOutcome};
use crate::context::Context;
use crate::types::resource::TenantBundle;
use tracing::{debug, info};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FanOutReport {
    /// Ids whose bundle was converged this pass.
    pub applied: Vec<u32>,
    /// Ids whose bundle was newly created this pass.
    pub created: Vec<u32>,
    /// Ids whose bundle was deleted this pass.
    pub removed: Vec<u32>,
}

/// Brings the set of tenant bundles to exactly `1..=desired`.
///
/// Bundles up to `desired` are ensured in ascending order. Above that, ids
/// are probed upward through their anchor until the first one that does not
/// exist; every bundle found on the way is deleted in reverse resource order.
/// Ids are never reused with gaps, so the first missing anchor is the end.
/// The first failure aborts the pass; everything is safe to re-run.
pub async fn converge<F>(ctx: &Context, template: F, desired: u32) -> Result<FanOutReport, Error>
where
    F: Fn(u32) -> TenantBundle,
{
    let mut report = FanOutReport::default();

    for id in 1..=desired {
        let bundle = template(id);
        let mut created = false;
        for (index, resource) in bundle.resources.iter().enumerate() {
            let outcome = converge::ensure(ctx, resource).await?;
            if index == 0 && outcome == EnsureOutcome::Created {
                created = true;
            }
        }
        if created {
            info!(tenant = id, "tenant bundle created");
            report.created.push(id);
        }
        report.applied.push(id);
    }

    let mut id = desired.saturating_add(1);
    loop {
        let bundle = template(id);
        let Some(anchor) = bundle.anchor() else {
            break;
        };

        let live = ctx
            .cluster
            .get(anchor.kind, anchor.namespace.as_deref(), &anchor.name)
            .await?;
        match live {
            None => break,
            Some(live) if live.metadata.deletion_timestamp.is_some() => {
                debug!(tenant = id, "tenant bundle already terminating");
            }
            Some(_) => {
                remove(ctx, &bundle).await?;
                info!(tenant = id, "tenant bundle removed");
                report.removed.push(id);
            }
        }

        id = match id.checked_add(1) {
            Some(next) => next,
            None => break,
        };
    }

    Ok(report)
}

async fn remove(ctx: &Context, bundle: &TenantBundle) -> Result<(), Error> {
    for resource in bundle.resources.iter().rev() {
        converge::delete(ctx, resource).await?;
    }
    Ok(())
}
