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

//! Per-feature install plans.
//!
//! Each module turns the pass's [`Specification`] into a [`ComponentPlan`];
//! the reconciler does the rest.

pub mod builders;
pub mod codeready;
pub mod etherpad;
pub mod gitea;
pub mod guide;
pub mod nexus;
pub mod pipelines;
pub mod project;
pub mod serverless;
pub mod servicemesh;

use crate::reconcile::component::ComponentPlan;
use crate::reconcile::environment::Specification;
use crate::types::v1alpha1::feature::{Feature, FeatureToggle};

pub fn plan(feature: Feature, spec: &Specification, toggle: &FeatureToggle) -> ComponentPlan {
    match feature {
        Feature::Etherpad => etherpad::plan(spec, toggle),
        Feature::Gitea => gitea::plan(spec, toggle),
        Feature::Nexus => nexus::plan(spec, toggle),
        Feature::Pipelines => pipelines::plan(toggle),
        Feature::Serverless => serverless::plan(toggle),
        Feature::ServiceMesh => servicemesh::plan(spec, toggle),
        Feature::CodeReadyWorkspaces => codeready::plan(spec, toggle),
        Feature::Guide => guide::plan(spec, toggle),
    }
}
