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

use crate::cluster::ClusterClient;
use crate::config::Settings;
use crate::types::v1alpha1::workshop::Workshop;
use kube::Resource;
use kube::runtime::events::EventType;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Shared state handed to every reconcile pass.
pub struct Context {
    pub(crate) cluster: Arc<dyn ClusterClient>,
    pub(crate) http: reqwest::Client,
    pub(crate) settings: Settings,
    failures: Mutex<HashMap<String, u32>>,
}

impl Context {
    pub fn new(cluster: Arc<dyn ClusterClient>, settings: Settings) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(settings.http_timeout)
            .danger_accept_invalid_certs(settings.insecure_routes)
            .build()?;

        Ok(Self {
            cluster,
            http,
            settings,
            failures: Mutex::new(HashMap::new()),
        })
    }

    /// send event
    ///
    /// Event delivery is best effort: a failure is logged and never fails the pass.
    pub async fn record(
        &self,
        workshop: &Workshop,
        event_type: EventType,
        reason: &str,
        message: &str,
    ) {
        let regarding = workshop.object_ref(&());
        if let Err(e) = self
            .cluster
            .publish_event(&regarding, event_type, reason, message)
            .await
        {
            warn!(workshop = %workshop.name(), reason, "failed to record event: {}", e);
        }
    }

    /// Counts one more consecutive fatal error for `key`, returning the new count.
    pub(crate) fn note_failure(&self, key: &str) -> u32 {
        let mut failures = match self.failures.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let count = failures.entry(key.to_owned()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    pub(crate) fn clear_failures(&self, key: &str) {
        let mut failures = match self.failures.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        failures.remove(key);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use crate::tests::{FakeCluster, test_context};
    use kube::runtime::events::EventType;
    use std::sync::Arc;

    #[test]
    fn test_failure_counter_resets() {
        let ctx = test_context(Arc::new(FakeCluster::new()));
        assert_eq!(ctx.note_failure("ns/a"), 1);
        assert_eq!(ctx.note_failure("ns/a"), 2);
        assert_eq!(ctx.note_failure("ns/b"), 1);

        ctx.clear_failures("ns/a");
        assert_eq!(ctx.note_failure("ns/a"), 1);
    }

    #[tokio::test]
    async fn test_record_publishes_to_cluster() {
        let cluster = Arc::new(FakeCluster::new());
        let ctx = test_context(cluster.clone());
        let workshop = crate::tests::create_test_workshop(1, &[]);

        ctx.record(&workshop, EventType::Normal, "TenantCreated", "user1 created")
            .await;

        assert_eq!(
            cluster.events(),
            vec![("TenantCreated".to_string(), "user1 created".to_string())]
        );
    }
}
