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

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::Display;

/// Install progress of a single feature.
///
/// Variants are declared in progress order so `Ord` matches how far a
/// feature got. Status only ever moves forward.
#[derive(
    Deserialize,
    Serialize,
    Clone,
    Copy,
    Debug,
    JsonSchema,
    Display,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
)]
pub enum ComponentStatus {
    #[default]
    #[strum(to_string = "NotScheduled")]
    NotScheduled,

    #[strum(to_string = "Scheduled")]
    Scheduled,

    #[strum(to_string = "InProgress")]
    InProgress,

    #[strum(to_string = "Installed")]
    Installed,
}
