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

use std::collections::BTreeMap;

use itertools::Itertools;
use petrel_common::util::Deadline;
use petrel_pb::plan::{StageMetadata, StagePlan};
use petrel_pb::task_service::QueryRequest;

use crate::dispatcher::error::{DispatchError, DispatchResult};
use crate::dispatcher::plan::{DispatchablePlanFragment, ServerInstance};
use crate::dispatcher::serialize::SerializedStagePlan;

pub const PROTOCOL_VERSION: u32 = 1;

/// Request and response metadata keys shared with the workers.
pub mod metadata_keys {
    pub const REQUEST_ID: &str = "requestId";
    pub const TIMEOUT_MS: &str = "timeoutMs";
    /// Response metadata: present iff the server failed the request.
    pub const STATUS_ERROR: &str = "STATUS_ERROR";

    pub const LANGUAGE: &str = "language";
    pub const START_TIME_SECONDS: &str = "startTimeSeconds";
    pub const WINDOW_SECONDS: &str = "windowSeconds";
    pub const NUM_ELEMENTS: &str = "numElements";
    pub const ERROR_TYPE: &str = "ERROR_TYPE";
    pub const ERROR_MESSAGE: &str = "ERROR_MESSAGE";
}

/// Build the metadata map attached to every request of one dispatch. User
/// options override configured defaults; the reserved keys override both.
pub(crate) fn build_request_metadata(
    request_id: u64,
    deadline: Deadline,
    default_options: &BTreeMap<String, String>,
    query_options: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut metadata = default_options.clone();
    metadata.extend(
        query_options
            .iter()
            .map(|(k, v)| (k.clone(), v.clone())),
    );
    metadata.insert(
        metadata_keys::REQUEST_ID.to_string(),
        request_id.to_string(),
    );
    metadata.insert(
        metadata_keys::TIMEOUT_MS.to_string(),
        deadline.remaining_ms().to_string(),
    );
    metadata
}

/// Project the stage list down to the given server: only stages it
/// participates in, each with only its own workers, numbered 1-based in
/// original stage order.
pub(crate) fn assemble_query_request(
    server: &ServerInstance,
    stages: &[DispatchablePlanFragment],
    serialized: &[SerializedStagePlan],
    metadata: &BTreeMap<String, String>,
) -> DispatchResult<QueryRequest> {
    let mut stage_plans = Vec::new();
    for (index, (stage, serialized_stage)) in stages.iter().zip_eq(serialized).enumerate() {
        let worker_ids = match stage.workers_on(server) {
            Some(worker_ids) => worker_ids,
            None => continue,
        };
        let worker_metadata = worker_ids
            .iter()
            .map(|id| {
                stage
                    .worker_metadata
                    .get(*id as usize)
                    .map(|worker| worker.to_protobuf())
                    .ok_or_else(|| {
                        DispatchError::Invariant(format!(
                            "worker id {} out of range for stage {} ({} workers)",
                            id,
                            index + 1,
                            stage.worker_metadata.len()
                        ))
                    })
            })
            .collect::<DispatchResult<Vec<_>>>()?;
        stage_plans.push(StagePlan {
            root: serialized_stage.root.clone(),
            stage_metadata: Some(StageMetadata {
                stage_id: index as u32 + 1,
                worker_metadata,
                custom_property: serialized_stage.custom_properties.clone(),
            }),
        });
    }
    Ok(QueryRequest {
        version: PROTOCOL_VERSION,
        stage_plans,
        metadata: metadata.clone(),
    })
}
