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

use bytes::Bytes;
use petrel_pb::task_service::TimeSeriesQueryRequest;
use petrel_rpc_client::TimeSeriesClientPool;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::dispatcher::plan::{encode_segment_list_key, TimeSeriesDispatchPlan};
use crate::dispatcher::request::metadata_keys::{
    ERROR_MESSAGE, ERROR_TYPE, LANGUAGE, NUM_ELEMENTS, REQUEST_ID, START_TIME_SECONDS,
    WINDOW_SECONDS,
};
use petrel_common::util::Deadline;

const RESPONSE_QUEUE_CAPACITY: usize = 10;

/// The broker response shape for time-series queries. Also what a worker's
/// JSON payload parses into.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesBrokerResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(rename = "errorType", default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(rename = "errorMessage", default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl TimeSeriesBrokerResponse {
    pub fn error(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            error_type: Some(error_type.into()),
            error_message: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == "error"
    }
}

/// Single-server dispatch: ship the serialized plan, wait for the one
/// response, and translate every outcome into a broker response instead of
/// an error.
pub(crate) async fn submit_and_get(
    pool: &TimeSeriesClientPool,
    request_id: u64,
    plan: &TimeSeriesDispatchPlan,
    deadline: Deadline,
) -> TimeSeriesBrokerResponse {
    let mut metadata = BTreeMap::new();
    metadata.insert(LANGUAGE.to_string(), plan.language.clone());
    metadata.insert(
        START_TIME_SECONDS.to_string(),
        plan.start_time_seconds.to_string(),
    );
    metadata.insert(WINDOW_SECONDS.to_string(), plan.window_seconds.to_string());
    metadata.insert(NUM_ELEMENTS.to_string(), plan.num_elements.to_string());
    metadata.insert(REQUEST_ID.to_string(), request_id.to_string());
    for (plan_id, segments) in &plan.segments_by_plan {
        metadata.insert(encode_segment_list_key(plan_id), segments.join(","));
    }
    let request = TimeSeriesQueryRequest {
        dispatch_plan: Bytes::from(plan.serialized_plan.clone().into_bytes()),
        metadata,
    };

    let (tx, mut rx) = mpsc::channel(RESPONSE_QUEUE_CAPACITY);
    match pool.get(&plan.server.host, plan.server.query_port).await {
        Ok(client) => {
            let remaining = deadline.remaining();
            tokio::spawn(async move {
                let _ = tx.send(client.submit(request, remaining).await).await;
            });
        }
        Err(e) => {
            let _ = tx.send(Err(e)).await;
        }
    }

    let response = match tokio::time::timeout(deadline.remaining(), rx.recv()).await {
        Err(_) | Ok(None) => {
            return TimeSeriesBrokerResponse::error(
                "TimeoutException",
                "Timed out waiting for response",
            )
        }
        Ok(Some(Err(e))) => return TimeSeriesBrokerResponse::error(e.kind(), e.to_string()),
        Ok(Some(Ok(response))) => response,
    };

    if let Some(message) = response.metadata.get(ERROR_MESSAGE) {
        let error_type = response
            .metadata
            .get(ERROR_TYPE)
            .cloned()
            .unwrap_or_else(|| "unknown error-type".to_string());
        return TimeSeriesBrokerResponse::error(error_type, message.clone());
    }

    match serde_json::from_slice(&response.payload) {
        Ok(parsed) => parsed,
        Err(e) => TimeSeriesBrokerResponse::error(
            "ProtocolError",
            format!("failed to parse response payload: {}", e),
        ),
    }
}
