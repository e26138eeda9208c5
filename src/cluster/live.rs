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

use super::{ClusterClient, Error, KubeSnafu, RecordSnafu, WatchSnafu};
use crate::types::resource::ResourceKind;
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use k8s_openapi::api::core::v1 as corev1;
use kube::api::{
    Api, DeleteParams, DynamicObject, ListParams, LogParams, Patch, PatchParams, PostParams,
};
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::runtime::{WatchStreamExt, watcher};
use kube::{Client, ResourceExt};
use serde_json::json;
use snafu::ResultExt;
use snafu::futures::TryFutureExt;

const CONTROLLER_NAME: &str = "workshop-operator";

pub struct LiveCluster {
    client: Client,
    recorder: Recorder,
    api_url: String,
}

impl LiveCluster {
    pub fn new(client: Client, api_url: String) -> Self {
        let reporter = Reporter {
            controller: CONTROLLER_NAME.into(),
            instance: std::env::var("HOSTNAME").ok(),
        };

        let recorder = Recorder::new(client.clone(), reporter);
        Self {
            client,
            recorder,
            api_url,
        }
    }

    fn api(&self, kind: ResourceKind, namespace: Option<&str>) -> Api<DynamicObject> {
        let ar = kind.api_resource();
        match namespace {
            Some(ns) if kind.is_namespaced() => {
                Api::namespaced_with(self.client.clone(), ns, &ar)
            }
            _ => Api::all_with(self.client.clone(), &ar),
        }
    }
}

/// Sorts a kube error into the taxonomy the reconciler works with.
fn classify(kind: ResourceKind, name: &str, error: kube::Error) -> Error {
    match error {
        kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
            Error::AlreadyExists {
                kind: kind.to_string(),
                name: name.to_owned(),
            }
        }
        kube::Error::Api(ae) if ae.code == 409 => Error::Conflict {
            kind: kind.to_string(),
            name: name.to_owned(),
        },
        kube::Error::Api(ae) if ae.code == 429 || ae.code >= 500 => Error::Unavailable {
            message: ae.message.clone(),
        },
        kube::Error::Api(ae) if (400..500).contains(&ae.code) => Error::Rejected {
            kind: kind.to_string(),
            name: name.to_owned(),
            message: ae.message.clone(),
        },
        source => Error::Kube { source },
    }
}

fn is_not_found(error: &kube::Error) -> bool {
    matches!(error, kube::Error::Api(ae) if ae.code == 404)
}

#[async_trait]
impl ClusterClient for LiveCluster {
    async fn create(
        &self,
        kind: ResourceKind,
        object: &DynamicObject,
    ) -> Result<DynamicObject, Error> {
        let name = object.name_any();
        self.api(kind, object.metadata.namespace.as_deref())
            .create(&PostParams::default(), object)
            .await
            .map_err(|e| classify(kind, &name, e))
    }

    async fn get(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<DynamicObject>, Error> {
        match self.api(kind, namespace).get(name).await {
            Ok(obj) => Ok(Some(obj)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(classify(kind, name, e)),
        }
    }

    async fn replace(
        &self,
        kind: ResourceKind,
        object: &DynamicObject,
    ) -> Result<DynamicObject, Error> {
        let name = object.name_any();
        self.api(kind, object.metadata.namespace.as_deref())
            .replace(&name, &PostParams::default(), object)
            .await
            .map_err(|e| classify(kind, &name, e))
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<bool, Error> {
        match self
            .api(kind, namespace)
            .delete(name, &DeleteParams::background())
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(classify(kind, name, e)),
        }
    }

    async fn patch_status(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
        status: serde_json::Value,
    ) -> Result<(), Error> {
        let patch = json!({ "status": status });
        self.api(kind, namespace)
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| classify(kind, name, e))?;
        Ok(())
    }

    async fn watch(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<BoxStream<'static, Result<(), Error>>, Error> {
        let config = watcher::Config::default().fields(&format!("metadata.name={name}"));
        let stream = watcher(self.api(kind, namespace), config)
            .default_backoff()
            .map(|event| event.map(|_| ()).context(WatchSnafu))
            .boxed();
        Ok(stream)
    }

    async fn recent_events(&self, namespace: &str, name: &str) -> Result<Vec<String>, Error> {
        let api: Api<corev1::Event> = Api::namespaced(self.client.clone(), namespace);
        let mut events = api
            .list(&ListParams::default().fields(&format!("involvedObject.name={name}")))
            .context(KubeSnafu)
            .await?
            .items;
        events.sort_by(|a, b| a.last_timestamp.cmp(&b.last_timestamp));

        Ok(events
            .into_iter()
            .map(|e| {
                format!(
                    "{}: {}",
                    e.reason.unwrap_or_default(),
                    e.message.unwrap_or_default()
                )
            })
            .collect())
    }

    async fn first_pod_log_tail(
        &self,
        namespace: &str,
        selector: &str,
        lines: i64,
    ) -> Result<Option<String>, Error> {
        let pods: Api<corev1::Pod> = Api::namespaced(self.client.clone(), namespace);
        let list = pods
            .list(&ListParams::default().labels(selector))
            .context(KubeSnafu)
            .await?;
        let Some(pod) = list.items.first() else {
            return Ok(None);
        };

        let params = LogParams {
            tail_lines: Some(lines),
            ..Default::default()
        };
        let logs = pods
            .logs(&pod.name_any(), &params)
            .context(KubeSnafu)
            .await?;
        Ok(Some(logs))
    }

    async fn publish_event(
        &self,
        regarding: &corev1::ObjectReference,
        event_type: EventType,
        reason: &str,
        note: &str,
    ) -> Result<(), Error> {
        self.recorder
            .publish(
                &Event {
                    type_: event_type,
                    reason: reason.to_owned(),
                    note: Some(note.into()),
                    action: "Reconcile".into(),
                    secondary: None,
                },
                regarding,
            )
            .context(RecordSnafu)
            .await
    }

    fn api_url(&self) -> String {
        self.api_url.clone()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::Status;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(Status::failure("rejected", reason).with_code(code).boxed())
    }

    #[test]
    fn test_create_collision_is_already_exists() {
        let error = classify(ResourceKind::Namespace, "user1", api_error(409, "AlreadyExists"));
        assert!(matches!(error, Error::AlreadyExists { ref name, .. } if name == "user1"));
        assert!(!error.is_transient());
    }

    #[test]
    fn test_stale_write_is_a_transient_conflict() {
        let error = classify(ResourceKind::Deployment, "nexus", api_error(409, "Conflict"));
        assert!(matches!(error, Error::Conflict { .. }));
        assert!(error.is_transient());
    }

    #[test]
    fn test_throttling_and_server_errors_are_unavailable() {
        for code in [429, 500, 503] {
            let error = classify(ResourceKind::Route, "guide", api_error(code, "TooManyRequests"));
            assert!(matches!(error, Error::Unavailable { .. }), "{code}");
            assert!(error.is_transient());
        }
    }

    #[test]
    fn test_other_client_errors_are_fatal() {
        for (code, reason) in [(403, "Forbidden"), (422, "Invalid"), (400, "BadRequest")] {
            let error = classify(
                ResourceKind::RoleBinding,
                "workshop-admin",
                api_error(code, reason),
            );
            assert!(matches!(error, Error::Rejected { .. }), "{code}");
            assert!(!error.is_transient());
        }
    }

    #[test]
    fn test_only_404_is_not_found() {
        assert!(is_not_found(&api_error(404, "NotFound")));
        assert!(!is_not_found(&api_error(409, "AlreadyExists")));
        assert!(!is_not_found(&api_error(403, "Forbidden")));
    }
}
