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

use snafu::Snafu;

/// Errors caused by malformed input. None of these go away by retrying.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("object has no namespace associated"))]
    NoNamespace,

    #[snafu(display("invalid {} descriptor '{}': {}", kind, name, reason))]
    InvalidDescriptor {
        kind: String,
        name: String,
        reason: String,
    },

    #[snafu(display("cannot decode {}: {}", what, source))]
    Decode {
        what: String,
        source: serde_json::Error,
    },

    #[snafu(display("invalid devfile template: {}", source))]
    InvalidDevfile { source: serde_yaml_ng::Error },

    #[snafu(display("cannot resolve environment fact '{}': {}", fact, message))]
    MissingEnvironment { fact: String, message: String },
}
