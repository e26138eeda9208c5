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

//! Idempotent create-or-update of single objects.

use super::Error;
use crate::cluster;
use crate::context::Context;
use crate::types::error::{DecodeSnafu, InvalidDescriptorSnafu, MissingEnvironmentSnafu};
use crate::types::resource::{ResourceDescriptor, ResourceKind};
use kube::api::DynamicObject;
use serde_json::Value;
use snafu::ResultExt;
use strum::Display;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum EnsureOutcome {
    Created,
    Unchanged,
    Updated,
}

/// Makes sure `desired` exists and its compared fields match the live object.
///
/// Create is attempted first; "already exists" switches to the update path,
/// which only touches the descriptor's compared fields on the freshly read
/// object. Calling this twice with the same descriptor yields `Created`
/// then `Unchanged`.
pub async fn ensure(ctx: &Context, desired: &ResourceDescriptor) -> Result<EnsureOutcome, Error> {
    desired.validate()?;
    let object = desired.to_object()?;

    match ctx.cluster.create(desired.kind, &object).await {
        Ok(_) => {
            info!(
                kind = %desired.kind,
                namespace = desired.namespace.as_deref().unwrap_or_default(),
                name = %desired.name,
                "created"
            );
            return Ok(EnsureOutcome::Created);
        }
        Err(cluster::Error::AlreadyExists { .. }) => {}
        Err(e) => return Err(e.into()),
    }

    if desired.compared.is_empty() {
        return Ok(EnsureOutcome::Unchanged);
    }

    let outcome = update_existing(
        ctx,
        desired.kind,
        desired.namespace.as_deref(),
        &desired.name,
        |live| {
            let mut value = serde_json::to_value(&*live).context(DecodeSnafu {
                what: format!("live {} '{}'", desired.kind, desired.name),
            })?;

            let drift = drifted_fields(&desired.body, &value, &desired.compared);
            if drift.is_empty() {
                return Ok(false);
            }
            for pointer in &drift {
                let wanted = desired.body.pointer(pointer).cloned().unwrap_or(Value::Null);
                if !set_pointer(&mut value, pointer, wanted) {
                    return InvalidDescriptorSnafu {
                        kind: desired.kind.to_string(),
                        name: desired.name.clone(),
                        reason: format!("cannot write '{pointer}' onto the live object"),
                    }
                    .fail()
                    .map_err(Error::from);
                }
            }
            debug!(kind = %desired.kind, name = %desired.name, fields = ?drift, "drift detected");

            *live = serde_json::from_value(value).context(DecodeSnafu {
                what: format!("updated {} '{}'", desired.kind, desired.name),
            })?;
            Ok(true)
        },
    )
    .await?;

    match outcome {
        Some(outcome) => {
            if outcome == EnsureOutcome::Updated {
                info!(
                    kind = %desired.kind,
                    namespace = desired.namespace.as_deref().unwrap_or_default(),
                    name = %desired.name,
                    "updated"
                );
            }
            Ok(outcome)
        }
        // deleted between create and read; the next pass creates it again
        None => Err(cluster::Error::Conflict {
            kind: desired.kind.to_string(),
            name: desired.name.clone(),
        }
        .into()),
    }
}

/// Deletes the object `desired` describes. Returns whether it existed.
pub async fn delete(ctx: &Context, desired: &ResourceDescriptor) -> Result<bool, Error> {
    let existed = ctx
        .cluster
        .delete(desired.kind, desired.namespace.as_deref(), &desired.name)
        .await?;
    if existed {
        info!(
            kind = %desired.kind,
            namespace = desired.namespace.as_deref().unwrap_or_default(),
            name = %desired.name,
            "deleted"
        );
    }
    Ok(existed)
}

/// Read-modify-write with optimistic concurrency.
///
/// `mutate` edits the freshly read object and reports whether it changed
/// anything. The write carries the read's resourceVersion; a conflict
/// re-reads and retries up to the configured attempt count. Returns `None`
/// when the object does not exist.
pub async fn update_existing<F>(
    ctx: &Context,
    kind: ResourceKind,
    namespace: Option<&str>,
    name: &str,
    mut mutate: F,
) -> Result<Option<EnsureOutcome>, Error>
where
    F: FnMut(&mut DynamicObject) -> Result<bool, Error>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;

        let Some(mut live) = ctx.cluster.get(kind, namespace, name).await? else {
            return Ok(None);
        };
        if !mutate(&mut live)? {
            return Ok(Some(EnsureOutcome::Unchanged));
        }

        match ctx.cluster.replace(kind, &live).await {
            Ok(_) => return Ok(Some(EnsureOutcome::Updated)),
            Err(cluster::Error::Conflict { .. }) if attempt < ctx.settings.conflict_retries => {
                debug!(%kind, name, attempt, "write conflict, re-reading");
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Adds `user` to the `users` list of a cluster-wide SecurityContextConstraints.
///
/// The policy is shared by every workshop, so concurrent passes may race on
/// it; the conditional write in [`update_existing`] sorts that out.
pub async fn ensure_policy_user(
    ctx: &Context,
    policy: &str,
    user: &str,
) -> Result<EnsureOutcome, Error> {
    let outcome = update_existing(
        ctx,
        ResourceKind::SecurityContextConstraints,
        None,
        policy,
        |scc| {
            let Value::Object(data) = &mut scc.data else {
                return Ok(false);
            };
            let users = data
                .entry("users")
                .or_insert_with(|| Value::Array(Vec::new()));
            if users.is_null() {
                *users = Value::Array(Vec::new());
            }
            let Value::Array(users) = users else {
                return Ok(false);
            };
            if users.iter().any(|u| u.as_str() == Some(user)) {
                return Ok(false);
            }
            users.push(Value::String(user.to_owned()));
            Ok(true)
        },
    )
    .await?;

    match outcome {
        Some(outcome) => {
            if outcome == EnsureOutcome::Updated {
                info!(policy, user, "granted security context constraints");
            }
            Ok(outcome)
        }
        None => MissingEnvironmentSnafu {
            fact: format!("securitycontextconstraints/{policy}"),
            message: "policy does not exist",
        }
        .fail()
        .map_err(Error::from),
    }
}

/// Compared pointers whose desired value differs from the live one.
/// Pointers absent from the desired body are not compared.
fn drifted_fields(desired: &Value, live: &Value, pointers: &[&'static str]) -> Vec<&'static str> {
    pointers
        .iter()
        .copied()
        .filter(|p| match desired.pointer(p) {
            Some(wanted) => live.pointer(p) != Some(wanted),
            None => false,
        })
        .collect()
}

/// Writes `value` at a JSON pointer, creating intermediate objects.
/// Returns false when the pointer walks through something that is not a
/// container, or indexes past the end of an array.
fn set_pointer(target: &mut Value, pointer: &str, value: Value) -> bool {
    let tokens: Vec<String> = pointer
        .split('/')
        .skip(1)
        .map(|t| t.replace("~1", "/").replace("~0", "~"))
        .collect();
    let Some((last, parents)) = tokens.split_last() else {
        *target = value;
        return true;
    };

    let mut current = target;
    for token in parents {
        current = match current {
            Value::Object(map) => map
                .entry(token.clone())
                .or_insert_with(|| Value::Object(serde_json::Map::new())),
            Value::Array(items) => match token.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                Some(item) => item,
                None => return false,
            },
            Value::Null => {
                *current = Value::Object(serde_json::Map::new());
                match current {
                    Value::Object(map) => map
                        .entry(token.clone())
                        .or_insert_with(|| Value::Object(serde_json::Map::new())),
                    _ => return false,
                }
            }
            _ => return false,
        };
    }

    match current {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            true
        }
        Value::Array(items) => match last.parse::<usize>() {
            Ok(i) if i < items.len() => {
                items[i] = value;
                true
            }
            Ok(i) if i == items.len() => {
                items.push(value);
                true
            }
            _ => false,
        },
        _ => false,
    }
}
