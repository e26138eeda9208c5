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

//! Cluster access used by the reconciler.
//!
//! Everything goes through [`ClusterClient`] so the engine can be driven by
//! an in-memory cluster in tests. [`LiveCluster`] is the kube-rs backed
//! implementation used in production.

mod live;

pub use live::LiveCluster;

use crate::types::resource::ResourceKind;
use async_trait::async_trait;
use futures::stream::BoxStream;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::api::DynamicObject;
use kube::runtime::events::EventType;
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("{} '{}' already exists", kind, name))]
    AlreadyExists { kind: String, name: String },

    #[snafu(display("{} '{}' was modified concurrently", kind, name))]
    Conflict { kind: String, name: String },

    #[snafu(display("{} '{}' rejected by the API server: {}", kind, name, message))]
    Rejected {
        kind: String,
        name: String,
        message: String,
    },

    #[snafu(display("API server unavailable: {}", message))]
    Unavailable { message: String },

    #[snafu(display("Kubernetes API error: {}", source))]
    Kube { source: kube::Error },

    #[snafu(display("watch error: {}", source))]
    Watch {
        source: kube::runtime::watcher::Error,
    },

    #[snafu(display("record event error: {}", source))]
    Record { source: kube::Error },

    #[snafu(display("cannot encode {}: {}", what, source))]
    Serde {
        what: String,
        source: serde_json::Error,
    },
}

impl Error {
    /// Whether retrying the same call later can succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Conflict { .. }
            | Error::Unavailable { .. }
            | Error::Kube { .. }
            | Error::Watch { .. }
            | Error::Record { .. } => true,
            Error::AlreadyExists { .. } | Error::Rejected { .. } | Error::Serde { .. } => false,
        }
    }
}

/// The operations the reconciler needs from the cluster.
///
/// Not-found is never an error here: `get` returns `None` and `delete`
/// returns `false`.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Creates an object. Fails with [`Error::AlreadyExists`] if it exists.
    async fn create(&self, kind: ResourceKind, object: &DynamicObject)
    -> Result<DynamicObject, Error>;

    async fn get(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<DynamicObject>, Error>;

    /// Replaces an object. The object's resourceVersion makes this a
    /// conditional write; a stale version fails with [`Error::Conflict`].
    async fn replace(
        &self,
        kind: ResourceKind,
        object: &DynamicObject,
    ) -> Result<DynamicObject, Error>;

    /// Deletes an object. Returns whether it existed.
    async fn delete(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<bool, Error>;

    async fn patch_status(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
        status: serde_json::Value,
    ) -> Result<(), Error>;

    /// A stream that yields once per change to the named object.
    async fn watch(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<BoxStream<'static, Result<(), Error>>, Error>;

    /// Recent events about an object, oldest first, as `reason: message`.
    async fn recent_events(&self, namespace: &str, name: &str) -> Result<Vec<String>, Error>;

    /// The last `lines` log lines of the first pod matching `selector`.
    async fn first_pod_log_tail(
        &self,
        namespace: &str,
        selector: &str,
        lines: i64,
    ) -> Result<Option<String>, Error>;

    async fn publish_event(
        &self,
        regarding: &ObjectReference,
        event_type: EventType,
        reason: &str,
        note: &str,
    ) -> Result<(), Error>;

    /// URL of the API server this client talks to.
    fn api_url(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let conflict = Error::Conflict {
            kind: "SecurityContextConstraints".into(),
            name: "anyuid".into(),
        };
        assert!(conflict.is_transient());

        let rejected = Error::Rejected {
            kind: "Deployment".into(),
            name: "etherpad".into(),
            message: "spec.replicas: Invalid value".into(),
        };
        assert!(!rejected.is_transient());

        let unavailable = Error::Unavailable {
            message: "etcdserver: leader changed".into(),
        };
        assert!(unavailable.is_transient());
    }
}
