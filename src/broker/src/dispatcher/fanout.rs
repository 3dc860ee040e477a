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

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::time::Duration;

use petrel_common::error::Result;
use petrel_common::util::Deadline;
use petrel_pb::task_service::QueryRequest;
use petrel_rpc_client::{QueryClient, QueryClientPool};
use tokio::sync::mpsc;

use crate::dispatcher::error::{DispatchError, DispatchResult};
use crate::dispatcher::plan::{DispatchablePlanFragment, ServerInstance};
use crate::dispatcher::request::assemble_query_request;
use crate::dispatcher::serialize::SerializedStagePlan;

/// Completion of one per-server RPC, tagged with its origin.
struct AsyncResponse<R> {
    server: ServerInstance,
    result: Result<R>,
}

/// Dispatch one request per participating server and drain the responses.
///
/// Each RPC runs on its own task and reports through a channel whose
/// capacity equals the number of servers, so producers never block. The
/// drain is a single cooperative receiver: the `consumer` runs serially, in
/// arrival order, and needs no locking. The first error aborts the drain;
/// later responses are discarded when the receiver drops. Workers that
/// already took the request are stopped through the cancel path, not here.
pub(crate) async fn fan_out<R, S, Fut, C>(
    pool: &QueryClientPool,
    request_id: u64,
    stages: &[DispatchablePlanFragment],
    serialized: &[SerializedStagePlan],
    servers: &HashSet<ServerInstance>,
    metadata: &BTreeMap<String, String>,
    deadline: Deadline,
    sender: S,
    mut consumer: C,
) -> DispatchResult<()>
where
    R: Send + 'static,
    S: Fn(QueryClient, QueryRequest, Duration) -> Fut,
    Fut: Future<Output = Result<R>> + Send + 'static,
    C: FnMut(&ServerInstance, R) -> DispatchResult<()>,
{
    let (tx, mut rx) = mpsc::channel(servers.len().max(1));
    for server in servers {
        let request = assemble_query_request(server, stages, serialized, metadata)?;
        let tx = tx.clone();
        let server = server.clone();
        match pool.get(&server.host, server.query_port).await {
            Ok(client) => {
                let rpc = sender(client, request, deadline.remaining());
                tokio::spawn(async move {
                    let result = rpc.await;
                    let _ = tx.send(AsyncResponse { server, result }).await;
                });
            }
            Err(e) => {
                let _ = tx.send(AsyncResponse { server, result: Err(e) }).await;
            }
        }
    }
    drop(tx);

    let mut successes = 0;
    while successes < servers.len() {
        let response = match tokio::time::timeout(deadline.remaining(), rx.recv()).await {
            Ok(Some(response)) => response,
            Ok(None) => {
                return Err(DispatchError::Invariant(format!(
                    "response channel closed after {} of {} responses",
                    successes,
                    servers.len()
                )))
            }
            Err(_) => {
                return Err(DispatchError::Timeout {
                    request_id,
                    phase: "dispatch",
                })
            }
        };
        match response.result {
            Ok(value) => {
                consumer(&response.server, value)?;
                successes += 1;
            }
            Err(e) => {
                return Err(DispatchError::Server {
                    request_id,
                    server: response.server.to_string(),
                    source: e,
                })
            }
        }
    }
    Ok(())
}
