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

use super::Error;
use crate::context::Context;
use crate::types::resource::WorkloadRef;
use futures::{StreamExt, future};
use serde_json::Value;
use std::time::Duration;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum Readiness {
    Ready,
    NotYetReady {
        requeue_after: Duration,
        diagnostics: Diagnostics,
    },
}

/// What the cluster says about a workload that did not come up in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    pub events: Vec<String>,
    pub log_tail: Option<String>,
}

impl Diagnostics {
    /// One line suitable for an event note.
    pub fn summary(&self) -> String {
        match self.events.last() {
            Some(event) => event.clone(),
            None => "no recent events".to_owned(),
        }
    }
}

/// Waits until `workload` reports at least `min_ready` ready replicas.
///
/// Change notifications for the workload are merged with a fixed-interval
/// poll so a missed notification only costs one poll period. The whole wait
/// is bounded by the configured readiness timeout; running out of time is
/// not an error, the caller requeues. Only a failing read is an error.
pub async fn wait_ready(ctx: &Context, workload: &WorkloadRef) -> Result<Readiness, Error> {
    if ready_replicas(ctx, workload).await? >= workload.min_ready {
        return Ok(Readiness::Ready);
    }

    debug!(
        kind = %workload.kind,
        namespace = %workload.namespace,
        name = %workload.name,
        "waiting for workload"
    );

    // A failing watch is dropped at its first error; the poll carries the wait.
    let changes = ctx
        .cluster
        .watch(workload.kind, Some(&workload.namespace), &workload.name)
        .await?
        .take_while(|change| {
            if let Err(e) = change {
                debug!(name = %workload.name, error = %e, "watch interrupted, polling only");
            }
            future::ready(change.is_ok())
        })
        .map(|_| ());
    let ticks =
        IntervalStream::new(tokio::time::interval(ctx.settings.readiness_poll)).map(|_| ());
    let mut triggers = futures::stream::select(changes, ticks);

    let wait = async {
        while triggers.next().await.is_some() {
            if ready_replicas(ctx, workload).await? >= workload.min_ready {
                return Ok::<bool, Error>(true);
            }
        }
        Ok(false)
    };

    match tokio::time::timeout(ctx.settings.readiness_timeout, wait).await {
        Ok(Ok(true)) => {
            info!(namespace = %workload.namespace, name = %workload.name, "workload ready");
            Ok(Readiness::Ready)
        }
        Ok(Err(e)) => Err(e),
        Ok(Ok(false)) | Err(_) => {
            let diagnostics = diagnose(ctx, workload).await;
            warn!(
                namespace = %workload.namespace,
                name = %workload.name,
                events = ?diagnostics.events,
                log_tail = diagnostics.log_tail.as_deref().unwrap_or_default(),
                "workload not ready"
            );
            Ok(Readiness::NotYetReady {
                requeue_after: ctx.settings.not_ready_requeue,
                diagnostics,
            })
        }
    }
}

async fn ready_replicas(ctx: &Context, workload: &WorkloadRef) -> Result<i64, Error> {
    let live = ctx
        .cluster
        .get(workload.kind, Some(&workload.namespace), &workload.name)
        .await?;
    Ok(live
        .and_then(|o| o.data.pointer("/status/readyReplicas").and_then(Value::as_i64))
        .unwrap_or(0))
}

/// Best effort: a failing read here never hides the not-ready result.
async fn diagnose(ctx: &Context, workload: &WorkloadRef) -> Diagnostics {
    let events = ctx
        .cluster
        .recent_events(&workload.namespace, &workload.name)
        .await
        .unwrap_or_else(|e| {
            debug!(error = %e, "cannot list events");
            Vec::new()
        });

    let selector = match ctx
        .cluster
        .get(workload.kind, Some(&workload.namespace), &workload.name)
        .await
    {
        Ok(Some(live)) => label_selector(&live.data),
        _ => None,
    };
    let log_tail = match selector {
        Some(selector) => ctx
            .cluster
            .first_pod_log_tail(&workload.namespace, &selector, ctx.settings.log_tail_lines)
            .await
            .unwrap_or_else(|e| {
                debug!(error = %e, "cannot read pod logs");
                None
            }),
        None => None,
    };

    Diagnostics { events, log_tail }
}

fn label_selector(data: &Value) -> Option<String> {
    let labels = data.pointer("/spec/selector/matchLabels")?.as_object()?;
    let selector = labels
        .iter()
        .filter_map(|(k, v)| v.as_str().map(|v| format!("{k}={v}")))
        .collect::<Vec<_>>()
        .join(",");
    (!selector.is_empty()).then_some(selector)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::tests::{FakeCluster, test_context, test_settings};
    use crate::types::resource::ResourceKind;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Instant;

    fn seed_deployment(cluster: &FakeCluster, ready: i64) {
        cluster.insert(
            ResourceKind::Deployment,
            json!({
                "apiVersion": "apps/v1",
                "kind": "Deployment",
                "metadata": {"name": "nexus", "namespace": "workshop-nexus"},
                "spec": {"selector": {"matchLabels": {"app": "nexus"}}},
                "status": {"readyReplicas": ready}
            }),
        );
    }

    #[tokio::test]
    async fn test_ready_workload_returns_immediately() {
        let cluster = Arc::new(FakeCluster::new());
        seed_deployment(&cluster, 1);
        let ctx = test_context(cluster);

        let readiness = wait_ready(&ctx, &WorkloadRef::deployment("workshop-nexus", "nexus"))
            .await
            .unwrap();
        assert_eq!(readiness, Readiness::Ready);
    }

    #[tokio::test]
    async fn test_becomes_ready_while_waiting() {
        let cluster = Arc::new(FakeCluster::new());
        seed_deployment(&cluster, 0);
        let settings = crate::config::Settings {
            readiness_timeout: Duration::from_secs(5),
            ..test_settings()
        };
        let ctx = crate::context::Context::new(cluster.clone(), settings).unwrap();

        let flip = {
            let cluster = cluster.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                cluster.set_ready_replicas("workshop-nexus", "nexus", 1);
            })
        };

        let readiness = wait_ready(&ctx, &WorkloadRef::deployment("workshop-nexus", "nexus"))
            .await
            .unwrap();
        flip.await.unwrap();
        assert_eq!(readiness, Readiness::Ready);
    }

    #[tokio::test]
    async fn test_failing_watch_falls_back_to_polling() {
        let cluster = Arc::new(FakeCluster::new());
        seed_deployment(&cluster, 0);
        cluster.break_watches();
        let settings = crate::config::Settings {
            readiness_timeout: Duration::from_secs(5),
            ..test_settings()
        };
        let ctx = crate::context::Context::new(cluster.clone(), settings).unwrap();

        let flip = {
            let cluster = cluster.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                cluster.set_ready_replicas("workshop-nexus", "nexus", 1);
            })
        };

        let readiness = wait_ready(&ctx, &WorkloadRef::deployment("workshop-nexus", "nexus"))
            .await
            .unwrap();
        flip.await.unwrap();

        assert_eq!(readiness, Readiness::Ready);
        assert_eq!(cluster.watch_error_count(), 1);
    }

    #[tokio::test]
    async fn test_never_ready_is_bounded_and_diagnosed() {
        let cluster = Arc::new(FakeCluster::new());
        seed_deployment(&cluster, 0);
        let ctx = test_context(cluster);

        let started = Instant::now();
        let readiness = wait_ready(&ctx, &WorkloadRef::deployment("workshop-nexus", "nexus"))
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        match readiness {
            Readiness::NotYetReady {
                requeue_after,
                diagnostics,
            } => {
                assert_eq!(requeue_after, Duration::from_secs(15));
                assert!(!diagnostics.events.is_empty());
            }
            other => panic!("expected NotYetReady, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_workload_is_not_ready() {
        let ctx = test_context(Arc::new(FakeCluster::new()));
        let readiness = wait_ready(&ctx, &WorkloadRef::deployment("workshop-nexus", "nexus"))
            .await
            .unwrap();
        assert!(matches!(readiness, Readiness::NotYetReady { .. }));
    }

    #[tokio::test]
    async fn test_failing_read_is_an_error() {
        let cluster = Arc::new(FakeCluster::new());
        cluster.fail_on("nexus");
        let ctx = test_context(cluster);

        let err = wait_ready(&ctx, &WorkloadRef::deployment("workshop-nexus", "nexus"))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_label_selector_joins_match_labels() {
        let data = json!({"spec": {"selector": {"matchLabels": {"app": "gitea", "tier": "web"}}}});
        assert_eq!(label_selector(&data).as_deref(), Some("app=gitea,tier=web"));
        assert_eq!(label_selector(&json!({})), None);
    }
}
