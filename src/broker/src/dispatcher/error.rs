// Copyright 2022 Singularity Data
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use petrel_common::error::PetrelError;
use thiserror::Error;

/// Errors surfaced by the dispatch path. Every variant names the request it
/// belongs to; partial results are never returned alongside one.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// A specific server failed to take or execute its part of the query.
    #[error("server {server} failed to process request {request_id}: {source}")]
    Server {
        request_id: u64,
        server: String,
        source: PetrelError,
    },

    /// The explain path saw a server-error metadata entry.
    #[error("explain of request {request_id} failed on server {server}: {message}")]
    Explain {
        request_id: u64,
        server: String,
        message: String,
    },

    /// The shared wall-clock deadline expired.
    #[error("request {request_id} timed out during {phase}")]
    Timeout { request_id: u64, phase: &'static str },

    /// The reduce stream was terminated by an error block.
    #[error("request {request_id} aborted by upstream workers: {errors:?}")]
    Reduce {
        request_id: u64,
        errors: Vec<String>,
    },

    /// A structural precondition did not hold; a planner or programmer bug.
    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error(transparent)]
    Internal(#[from] PetrelError),
}

impl DispatchError {
    /// Stable kind name, used where errors are reported as structured data.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Server { .. } => "DispatchError",
            Self::Explain { .. } => "ExplainError",
            Self::Timeout { .. } => "TimeoutError",
            Self::Reduce { .. } => "ReduceError",
            Self::Invariant(_) => "InvariantError",
            Self::Internal(e) => e.kind(),
        }
    }
}

pub type DispatchResult<T> = std::result::Result<T, DispatchError>;
