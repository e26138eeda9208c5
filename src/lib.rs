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

use crate::cluster::LiveCluster;
use crate::config::OperatorConfig;
use crate::context::Context;
use crate::reconcile::{error_policy, reconcile_workshop};
use crate::types::v1alpha1::workshop::Workshop;
use futures::StreamExt;
use kube::CustomResourceExt;
use kube::runtime::{Controller, watcher};
use kube::{Api, Client};
use shadow_rs::shadow;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

shadow!(build);

pub mod bootstrap;
pub mod cluster;
pub mod components;
pub mod config;
mod context;
pub mod reconcile;
pub mod types;


pub async fn run(config: OperatorConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_level(true)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    info!(
        version = build::PKG_VERSION,
        commit = build::SHORT_COMMIT,
        built = build::BUILD_TIME,
        "starting workshop operator"
    );

    let kube_config = kube::Config::infer().await?;
    let api_url = kube_config.cluster_url.to_string();
    let client = Client::try_from(kube_config)?;
    let workshops = Api::<Workshop>::all(client.clone());

    let cluster = LiveCluster::new(client, api_url);
    let context = Context::new(Arc::new(cluster), config.settings())?;

    Controller::new(workshops, watcher::Config::default())
        .run(reconcile_workshop, error_policy, Arc::new(context))
        .for_each(|res| async move {
            match res {
                Ok((workshop, _)) => info!("reconciled successful, object{:?}", workshop.name),
                Err(e) => warn!("reconcile failed: {}", e),
            }
        })
        .await;

    Ok(())
}

pub async fn crd(file: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer: Pin<Box<dyn AsyncWrite + Send>> = if let Some(file) = file {
        Box::pin(
            tokio::fs::OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(file)
                .await?,
        )
    } else {
        Box::pin(tokio::io::stdout())
    };

    writer
        .write_all(serde_yaml_ng::to_string(&Workshop::crd())?.as_bytes())
        .await?;
    writer.flush().await?;

    Ok(())
}
