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

use std::collections::HashSet;

use bytes::Bytes;
use petrel_common::util::Deadline;
use petrel_pb::plan::StageProperties;
use prost::Message;

use crate::dispatcher::error::{DispatchError, DispatchResult};
use crate::dispatcher::plan::{DispatchablePlanFragment, ServerInstance};

/// Wire form of one stage, shared by every per-server request assembly.
#[derive(Clone, Debug)]
pub struct SerializedStagePlan {
    pub root: Bytes,
    pub custom_properties: Bytes,
}

impl SerializedStagePlan {
    /// Pure: the fragment's maps are ordered, so identical fragments encode
    /// to identical bytes.
    pub fn new(fragment: &DispatchablePlanFragment) -> Self {
        let root = Bytes::from(fragment.root.encode_to_vec());
        let properties = StageProperties {
            properties: fragment.custom_properties.clone(),
        };
        let custom_properties = Bytes::from(properties.encode_to_vec());
        Self {
            root,
            custom_properties,
        }
    }
}

/// Runs plan serialization off the dispatch task. Serializing a deep plan is
/// CPU-bound, so the cost hides behind the longest fragment instead of
/// summing on the caller.
pub(crate) struct StageSerializer {
    runtime: Option<tokio::runtime::Runtime>,
}

impl StageSerializer {
    pub fn new(worker_threads: usize) -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .thread_name("petrel-plan-serializer")
            .build()
            .expect("failed to build plan serializer runtime");
        Self {
            runtime: Some(runtime),
        }
    }

    /// Serialize every stage in parallel and wait in stage order, each wait
    /// bounded by the remaining deadline. Also accumulates the union of
    /// participating servers into `servers`, before any fan-out concurrency
    /// starts consuming it.
    pub async fn serialize_stages(
        &self,
        request_id: u64,
        stages: &[DispatchablePlanFragment],
        deadline: Deadline,
        servers: &mut HashSet<ServerInstance>,
    ) -> DispatchResult<Vec<SerializedStagePlan>> {
        let runtime = match &self.runtime {
            Some(runtime) => runtime,
            None => {
                return Err(DispatchError::Invariant(
                    "stage serializer is shut down".to_string(),
                ))
            }
        };

        let mut handles = Vec::with_capacity(stages.len());
        for stage in stages {
            servers.extend(stage.servers().cloned());
            let fragment = stage.clone();
            handles.push(runtime.spawn(async move { SerializedStagePlan::new(&fragment) }));
        }

        let mut serialized = Vec::with_capacity(handles.len());
        for i in 0..handles.len() {
            if deadline.is_expired() {
                for handle in &handles[i..] {
                    handle.abort();
                }
                return Err(DispatchError::Timeout {
                    request_id,
                    phase: "plan serialization",
                });
            }
            let joined = tokio::time::timeout(deadline.remaining(), &mut handles[i]).await;
            match joined {
                Ok(Ok(plan)) => serialized.push(plan),
                Ok(Err(e)) => {
                    return Err(DispatchError::Invariant(format!(
                        "stage serialization task died: {}",
                        e
                    )))
                }
                Err(_) => {
                    for handle in &handles[i..] {
                        handle.abort();
                    }
                    return Err(DispatchError::Timeout {
                        request_id,
                        phase: "plan serialization",
                    });
                }
            }
        }
        Ok(serialized)
    }

    pub fn shutdown(mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl Drop for StageSerializer {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use petrel_pb::plan::plan_node::NodeBody;
    use petrel_pb::plan::{PlanNode, TableScanNode};

    use super::*;

    fn scan_fragment(servers: &[ServerInstance]) -> DispatchablePlanFragment {
        let root = PlanNode {
            children: vec![],
            node_body: Some(NodeBody::TableScan(TableScanNode {
                table: "lineitem".to_string(),
                columns: vec!["v1".to_string(), "v2".to_string()],
            })),
        };
        let mut custom_properties = BTreeMap::new();
        custom_properties.insert("tableType".to_string(), "OFFLINE".to_string());
        DispatchablePlanFragment {
            root,
            server_workers: servers
                .iter()
                .enumerate()
                .map(|(i, s)| (s.clone(), vec![i as u32]))
                .collect(),
            worker_metadata: vec![],
            custom_properties,
        }
    }

    #[tokio::test]
    async fn test_serialize_accumulates_server_union() {
        let s1 = ServerInstance::new("worker-1", 8842, 9842);
        let s2 = ServerInstance::new("worker-2", 8842, 9842);
        let stages = vec![
            scan_fragment(&[s1.clone()]),
            scan_fragment(&[s1.clone(), s2.clone()]),
        ];

        let serializer = StageSerializer::new(2);
        let mut servers = HashSet::new();
        let serialized = serializer
            .serialize_stages(1, &stages, Deadline::after_ms(1_000), &mut servers)
            .await
            .unwrap();

        assert_eq!(serialized.len(), 2);
        assert_eq!(servers, HashSet::from([s1, s2]));
        serializer.shutdown();
    }

    #[tokio::test]
    async fn test_serialization_is_deterministic() {
        let server = ServerInstance::new("worker-1", 8842, 9842);
        let stages = vec![scan_fragment(&[server])];

        let serializer = StageSerializer::new(2);
        let mut first = HashSet::new();
        let a = serializer
            .serialize_stages(1, &stages, Deadline::after_ms(1_000), &mut first)
            .await
            .unwrap();
        let mut second = HashSet::new();
        let b = serializer
            .serialize_stages(2, &stages, Deadline::after_ms(1_000), &mut second)
            .await
            .unwrap();

        assert_eq!(a[0].root, b[0].root);
        assert_eq!(a[0].custom_properties, b[0].custom_properties);
        serializer.shutdown();
    }

    #[tokio::test]
    async fn test_expired_deadline_times_out() {
        let server = ServerInstance::new("worker-1", 8842, 9842);
        let stages = vec![scan_fragment(&[server])];

        let serializer = StageSerializer::new(2);
        let mut servers = HashSet::new();
        let res = serializer
            .serialize_stages(7, &stages, Deadline::after_ms(0), &mut servers)
            .await;
        assert!(matches!(
            res,
            Err(DispatchError::Timeout {
                request_id: 7,
                phase: "plan serialization"
            })
        ));
        serializer.shutdown();
    }
}
