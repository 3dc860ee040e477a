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

pub mod error;
mod fanout;
pub mod plan;
mod reduce;
mod request;
mod serialize;
mod time_series;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

pub use error::{DispatchError, DispatchResult};
use petrel_common::config::DispatcherConfig;
use petrel_common::error::ErrorCode::{InternalError, ProtocolError};
use petrel_common::types::ScalarCmpRegistry;
use petrel_common::util::Deadline;
use petrel_pb::plan::PlanNode;
use petrel_pb::task_service::{ExplainResponse, QueryResponse};
use petrel_rpc_client::{QueryClientPool, TimeSeriesClientPool};
use prost::Message;
pub use reduce::{QueryResult, ResultTable};
pub use request::{metadata_keys, PROTOCOL_VERSION};
pub use serialize::SerializedStagePlan;
pub use time_series::TimeSeriesBrokerResponse;
use tracing::warn;

use crate::dispatcher::fanout::fan_out;
use crate::dispatcher::plan::{
    DispatchablePlanFragment, DispatchableSubPlan, ServerInstance, TimeSeriesDispatchPlan,
};
use crate::dispatcher::request::build_request_metadata;
use crate::dispatcher::serialize::StageSerializer;
use crate::mailbox::MailboxService;

/// Broker-side dispatcher for partitioned query plans.
///
/// Owns the process-wide resources of the dispatch path: both endpoint
/// client pools and the plan-serializer worker pool. Constructed once and
/// released in [`QueryDispatcher::shutdown`]; per-request state never
/// outlives its invocation.
pub struct QueryDispatcher {
    config: DispatcherConfig,
    query_client_pool: Arc<QueryClientPool>,
    time_series_client_pool: Arc<TimeSeriesClientPool>,
    mailbox: Arc<dyn MailboxService>,
    serializer: StageSerializer,
    cmp_registry: ScalarCmpRegistry,
}

impl QueryDispatcher {
    pub fn new(
        config: DispatcherConfig,
        mailbox: Arc<dyn MailboxService>,
        query_client_pool: Arc<QueryClientPool>,
        time_series_client_pool: Arc<TimeSeriesClientPool>,
    ) -> Self {
        let serializer = StageSerializer::new(config.serializer_threads());
        Self {
            config,
            query_client_pool,
            time_series_client_pool,
            mailbox,
            serializer,
            cmp_registry: ScalarCmpRegistry::new(),
        }
    }

    /// Dispatch stages 1..N to their workers, then run the local reduce
    /// stage until end-of-stream. On any failure the participating workers
    /// are told to stop, best-effort, before the error propagates.
    pub async fn submit_and_reduce(
        &self,
        request_id: u64,
        sub_plan: &DispatchableSubPlan,
        timeout_ms: u64,
        query_options: &BTreeMap<String, String>,
    ) -> DispatchResult<QueryResult> {
        let deadline = Deadline::after_ms(timeout_ms);
        match self
            .submit_and_reduce_inner(request_id, sub_plan, deadline, query_options)
            .await
        {
            Ok(result) => Ok(result),
            Err(e) => {
                self.cancel_workers(request_id, sub_plan.remote_stages());
                Err(e)
            }
        }
    }

    async fn submit_and_reduce_inner(
        &self,
        request_id: u64,
        sub_plan: &DispatchableSubPlan,
        deadline: Deadline,
        query_options: &BTreeMap<String, String>,
    ) -> DispatchResult<QueryResult> {
        let remote_stages = sub_plan.remote_stages();
        let mut servers = HashSet::new();
        let serialized = self
            .serializer
            .serialize_stages(request_id, remote_stages, deadline, &mut servers)
            .await?;
        let metadata = build_request_metadata(
            request_id,
            deadline,
            &self.config.default_query_options,
            query_options,
        );

        fan_out(
            &self.query_client_pool,
            request_id,
            remote_stages,
            &serialized,
            &servers,
            &metadata,
            deadline,
            |client, request, timeout| async move { client.submit(request, timeout).await },
            |server, response: QueryResponse| {
                if let Some(message) = response.metadata.get(metadata_keys::STATUS_ERROR) {
                    return Err(DispatchError::Server {
                        request_id,
                        server: server.to_string(),
                        source: InternalError(message.clone()).into(),
                    });
                }
                Ok(())
            },
        )
        .await?;

        reduce::run_reduce(
            &self.mailbox,
            &self.cmp_registry,
            request_id,
            sub_plan,
            query_options,
            deadline,
        )
        .await
    }

    /// Collect the serialized plan trees a single stage expands to on each
    /// of its servers. The stage is shipped as `stage_id = 1` whatever its
    /// original index was.
    pub async fn explain(
        &self,
        request_id: u64,
        fragment: &DispatchablePlanFragment,
        timeout_ms: u64,
        query_options: &BTreeMap<String, String>,
    ) -> DispatchResult<Vec<PlanNode>> {
        let deadline = Deadline::after_ms(timeout_ms);
        let stages = std::slice::from_ref(fragment);
        match self
            .explain_inner(request_id, stages, deadline, query_options)
            .await
        {
            Ok(plans) => Ok(plans),
            Err(e) => {
                self.cancel_workers(request_id, stages);
                Err(e)
            }
        }
    }

    async fn explain_inner(
        &self,
        request_id: u64,
        stages: &[DispatchablePlanFragment],
        deadline: Deadline,
        query_options: &BTreeMap<String, String>,
    ) -> DispatchResult<Vec<PlanNode>> {
        let mut servers = HashSet::new();
        let serialized = self
            .serializer
            .serialize_stages(request_id, stages, deadline, &mut servers)
            .await?;
        let metadata = build_request_metadata(
            request_id,
            deadline,
            &self.config.default_query_options,
            query_options,
        );

        let mut plans = Vec::new();
        fan_out(
            &self.query_client_pool,
            request_id,
            stages,
            &serialized,
            &servers,
            &metadata,
            deadline,
            |client, request, timeout| async move { client.explain(request, timeout).await },
            |server, responses: Vec<ExplainResponse>| {
                for response in responses {
                    if let Some(message) = response.metadata.get(metadata_keys::STATUS_ERROR) {
                        return Err(DispatchError::Explain {
                            request_id,
                            server: server.to_string(),
                            message: message.clone(),
                        });
                    }
                    for stage_plan in response.stage_plans {
                        let node = PlanNode::decode(stage_plan.root.clone()).map_err(|e| {
                            DispatchError::Internal(
                                ProtocolError(format!(
                                    "undecodable plan node from server {}: {}",
                                    server, e
                                ))
                                .into(),
                            )
                        })?;
                        plans.push(node);
                    }
                }
                Ok(())
            },
        )
        .await?;
        Ok(plans)
    }

    /// Time-series dispatch. Failures come back as structured error
    /// responses, never as `Err`.
    pub async fn submit_and_get(
        &self,
        request_id: u64,
        plan: &TimeSeriesDispatchPlan,
        timeout_ms: u64,
    ) -> TimeSeriesBrokerResponse {
        time_series::submit_and_get(
            &self.time_series_client_pool,
            request_id,
            plan,
            Deadline::after_ms(timeout_ms),
        )
        .await
    }

    /// Release every process-wide resource owned by the dispatcher.
    pub async fn shutdown(self) {
        self.query_client_pool.shutdown_all().await;
        self.time_series_client_pool.shutdown_all().await;
        self.mailbox.shutdown().await;
        self.serializer.shutdown();
    }

    /// Fire-and-forget cancel on every server participating in any of the
    /// given stages. Nothing is awaited and nothing propagates; each failure
    /// is only logged.
    fn cancel_workers(&self, request_id: u64, stages: &[DispatchablePlanFragment]) {
        let mut servers: HashSet<ServerInstance> = HashSet::new();
        for stage in stages {
            servers.extend(stage.servers().cloned());
        }
        for server in servers {
            let pool = self.query_client_pool.clone();
            tokio::spawn(async move {
                match pool.get(&server.host, server.query_port).await {
                    Ok(client) => {
                        if let Err(e) = client.cancel(request_id).await {
                            warn!(
                                "failed to cancel request {} on server {}: {}",
                                request_id, server, e
                            );
                        }
                    }
                    Err(e) => {
                        warn!(
                            "failed to reach server {} to cancel request {}: {}",
                            server, request_id, e
                        );
                    }
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use petrel_common::block::{DataBlock, Row};
    use petrel_common::error::Result;
    use petrel_common::stats::{MultiStageStats, StageStats, EMITTED_ROWS};
    use petrel_common::types::{DataType, ScalarImpl};
    use petrel_pb::common::Field as PbField;
    use petrel_pb::plan::plan_node::NodeBody;
    use petrel_pb::plan::{AggregateNode, MailboxReceiveNode, TableScanNode};
    use petrel_pb::task_service::QueryRequest;
    use petrel_rpc_client::{ClientFactory, QueryClient, QueryClientInner, TimeSeriesClient};

    use super::plan::{ResultField, WorkerMetadata};
    use super::*;
    use crate::mailbox::{BlockStream, BoxedBlockStream, ReceiveExecutionContext};

    #[derive(Clone, Copy)]
    enum SubmitBehavior {
        Succeed,
        Fail(&'static str),
        Hang,
    }

    #[derive(Default)]
    struct MockCluster {
        behaviors: Mutex<HashMap<String, SubmitBehavior>>,
        submits: Mutex<Vec<(String, QueryRequest)>>,
        cancels: Mutex<Vec<(String, u64)>>,
        refuse_dial: Mutex<HashSet<String>>,
    }

    impl MockCluster {
        fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn set_behavior(&self, host: &str, behavior: SubmitBehavior) {
            self.behaviors.lock().insert(host.to_string(), behavior);
        }

        fn behavior(&self, host: &str) -> SubmitBehavior {
            self.behaviors
                .lock()
                .get(host)
                .copied()
                .unwrap_or(SubmitBehavior::Succeed)
        }

        fn cancelled_hosts(&self) -> HashSet<String> {
            self.cancels.lock().iter().map(|(h, _)| h.clone()).collect()
        }

        async fn wait_for_cancels(&self, expected: usize) {
            for _ in 0..200 {
                if self.cancels.lock().len() >= expected {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            panic!(
                "expected {} cancels, saw {:?}",
                expected,
                self.cancels.lock()
            );
        }
    }

    struct MockQueryInner {
        host: String,
        cluster: Arc<MockCluster>,
    }

    #[async_trait]
    impl QueryClientInner for MockQueryInner {
        async fn submit(
            &self,
            request: QueryRequest,
            _timeout: Duration,
        ) -> Result<QueryResponse> {
            self.cluster
                .submits
                .lock()
                .push((self.host.clone(), request));
            match self.cluster.behavior(&self.host) {
                SubmitBehavior::Succeed => Ok(QueryResponse::default()),
                SubmitBehavior::Fail(message) => {
                    let mut metadata = BTreeMap::new();
                    metadata.insert(
                        metadata_keys::STATUS_ERROR.to_string(),
                        message.to_string(),
                    );
                    Ok(QueryResponse { metadata })
                }
                SubmitBehavior::Hang => futures::future::pending().await,
            }
        }

        async fn explain(
            &self,
            request: QueryRequest,
            _timeout: Duration,
        ) -> Result<Vec<ExplainResponse>> {
            match self.cluster.behavior(&self.host) {
                SubmitBehavior::Succeed => Ok(vec![ExplainResponse {
                    stage_plans: request.stage_plans,
                    metadata: BTreeMap::new(),
                }]),
                SubmitBehavior::Fail(message) => {
                    let mut metadata = BTreeMap::new();
                    metadata.insert(
                        metadata_keys::STATUS_ERROR.to_string(),
                        message.to_string(),
                    );
                    Ok(vec![ExplainResponse {
                        stage_plans: vec![],
                        metadata,
                    }])
                }
                SubmitBehavior::Hang => futures::future::pending().await,
            }
        }

        async fn cancel(&self, request_id: u64) -> Result<()> {
            self.cluster
                .cancels
                .lock()
                .push((self.host.clone(), request_id));
            Ok(())
        }
    }

    struct MockQueryFactory {
        cluster: Arc<MockCluster>,
    }

    #[async_trait]
    impl ClientFactory<QueryClient> for MockQueryFactory {
        async fn connect(&self, host: &str, _port: u16) -> Result<QueryClient> {
            if self.cluster.refuse_dial.lock().contains(host) {
                return Err(InternalError(format!("{} unreachable", host)).into());
            }
            Ok(QueryClient::mock(MockQueryInner {
                host: host.to_string(),
                cluster: self.cluster.clone(),
            }))
        }
    }

    struct UnusedTimeSeriesFactory;

    #[async_trait]
    impl ClientFactory<TimeSeriesClient> for UnusedTimeSeriesFactory {
        async fn connect(&self, host: &str, _port: u16) -> Result<TimeSeriesClient> {
            Err(InternalError(format!("unexpected time-series dial to {}", host)).into())
        }
    }

    struct MockMailbox {
        blocks: Mutex<Option<Vec<DataBlock>>>,
    }

    impl MockMailbox {
        fn with_blocks(blocks: Vec<DataBlock>) -> Arc<dyn MailboxService> {
            Arc::new(Self {
                blocks: Mutex::new(Some(blocks)),
            })
        }
    }

    #[async_trait]
    impl MailboxService for MockMailbox {
        async fn open_receive(&self, _ctx: ReceiveExecutionContext) -> Result<BoxedBlockStream> {
            let blocks = self.blocks.lock().take().expect("receive opened twice");
            Ok(Box::new(MockBlockStream {
                blocks: blocks.into_iter(),
            }))
        }

        async fn shutdown(&self) {}
    }

    struct MockBlockStream {
        blocks: std::vec::IntoIter<DataBlock>,
    }

    #[async_trait]
    impl BlockStream for MockBlockStream {
        async fn next_block(&mut self) -> Result<DataBlock> {
            match self.blocks.next() {
                Some(block) => Ok(block),
                None => futures::future::pending().await,
            }
        }
    }

    fn server(n: u32) -> ServerInstance {
        ServerInstance::new(format!("worker-{}", n), 8842, 9842)
    }

    fn remote_fragment(root: NodeBody, servers: &[ServerInstance]) -> DispatchablePlanFragment {
        let worker_metadata = servers
            .iter()
            .enumerate()
            .map(|(i, s)| WorkerMetadata {
                server: s.clone(),
                worker_id: i as u32,
                custom_properties: BTreeMap::new(),
            })
            .collect::<Vec<_>>();
        DispatchablePlanFragment {
            root: PlanNode {
                children: vec![],
                node_body: Some(root),
            },
            server_workers: servers
                .iter()
                .enumerate()
                .map(|(i, s)| (s.clone(), vec![i as u32]))
                .collect(),
            worker_metadata,
            custom_properties: BTreeMap::new(),
        }
    }

    fn reduce_fragment() -> DispatchablePlanFragment {
        DispatchablePlanFragment {
            root: PlanNode {
                children: vec![],
                node_body: Some(NodeBody::MailboxReceive(MailboxReceiveNode {
                    sender_stage_id: 1,
                    fields: vec![
                        PbField {
                            name: "v1".to_string(),
                            data_type: DataType::Int64.to_protobuf() as i32,
                        },
                        PbField {
                            name: "v2".to_string(),
                            data_type: DataType::Varchar.to_protobuf() as i32,
                        },
                    ],
                    sort_keys: vec![],
                })),
            },
            server_workers: HashMap::new(),
            worker_metadata: vec![WorkerMetadata {
                server: ServerInstance::new("broker-1", 8000, 9000),
                worker_id: 0,
                custom_properties: BTreeMap::new(),
            }],
            custom_properties: BTreeMap::new(),
        }
    }

    /// Two remote stages, both on all given servers.
    fn three_stage_plan(servers: &[ServerInstance]) -> DispatchableSubPlan {
        DispatchableSubPlan {
            stages: vec![
                reduce_fragment(),
                remote_fragment(
                    NodeBody::Aggregate(AggregateNode {
                        group_keys: vec![0],
                        aggregations: vec!["count(*)".to_string()],
                    }),
                    servers,
                ),
                remote_fragment(
                    NodeBody::TableScan(TableScanNode {
                        table: "lineitem".to_string(),
                        columns: vec!["v1".to_string(), "v2".to_string()],
                    }),
                    servers,
                ),
            ],
            result_fields: vec![
                ResultField {
                    index: 0,
                    name: "v1".to_string(),
                },
                ResultField {
                    index: 1,
                    name: "v2".to_string(),
                },
            ],
        }
    }

    fn result_blocks() -> Vec<DataBlock> {
        let mut upstream1 = StageStats::default();
        upstream1.set(EMITTED_ROWS, 2);
        let mut upstream2 = StageStats::default();
        upstream2.set(EMITTED_ROWS, 5);
        vec![
            DataBlock::Rows(vec![
                Row::new(vec![
                    Some(ScalarImpl::Int64(1)),
                    Some(ScalarImpl::Utf8("a".to_string())),
                ]),
                Row::new(vec![
                    Some(ScalarImpl::Int64(2)),
                    Some(ScalarImpl::Utf8("b".to_string())),
                ]),
            ]),
            DataBlock::SuccessEos(Box::new(MultiStageStats::new(
                0,
                StageStats::default(),
                vec![upstream1, upstream2],
            ))),
        ]
    }

    fn dispatcher(cluster: &Arc<MockCluster>, blocks: Vec<DataBlock>) -> QueryDispatcher {
        QueryDispatcher::new(
            DispatcherConfig::default(),
            MockMailbox::with_blocks(blocks),
            Arc::new(QueryClientPool::new(Arc::new(MockQueryFactory {
                cluster: cluster.clone(),
            }))),
            Arc::new(TimeSeriesClientPool::new(Arc::new(UnusedTimeSeriesFactory))),
        )
    }

    #[tokio::test]
    async fn test_submit_and_reduce_happy_path() {
        let cluster = MockCluster::new();
        let servers = vec![server(1), server(2), server(3)];
        let sub_plan = three_stage_plan(&servers);
        let dispatcher = dispatcher(&cluster, result_blocks());

        let result = dispatcher
            .submit_and_reduce(17, &sub_plan, 1_000, &BTreeMap::new())
            .await
            .unwrap();

        assert_eq!(result.result_table.rows.len(), 2);
        assert_eq!(
            result.result_table.rows[0],
            Row::new(vec![
                Some(ScalarImpl::Int64(1)),
                Some(ScalarImpl::Utf8("a".to_string())),
            ])
        );
        assert_eq!(result.per_stage_stats.len(), 3);
        assert_eq!(result.per_stage_stats[1].get(EMITTED_ROWS), Some(2));
        assert_eq!(result.per_stage_stats[2].get(EMITTED_ROWS), Some(5));

        // Every server saw one request carrying both remote stages, 1-based.
        let submits = cluster.submits.lock();
        assert_eq!(submits.len(), 3);
        for (_, request) in submits.iter() {
            let stage_ids = request
                .stage_plans
                .iter()
                .map(|p| p.stage_metadata.as_ref().unwrap().stage_id)
                .collect::<Vec<_>>();
            assert_eq!(stage_ids, vec![1, 2]);
            assert_eq!(request.metadata[metadata_keys::REQUEST_ID], "17");
            let timeout_ms: u64 = request.metadata[metadata_keys::TIMEOUT_MS].parse().unwrap();
            assert!(timeout_ms <= 1_000);
        }
        assert!(cluster.cancels.lock().is_empty());
    }

    #[tokio::test]
    async fn test_server_error_cancels_all_participants() {
        let cluster = MockCluster::new();
        cluster.set_behavior("worker-2", SubmitBehavior::Fail("broken"));
        let servers = vec![server(1), server(2), server(3)];
        let sub_plan = three_stage_plan(&servers);
        let dispatcher = dispatcher(&cluster, result_blocks());

        let res = dispatcher
            .submit_and_reduce(18, &sub_plan, 1_000, &BTreeMap::new())
            .await;

        assert_matches!(res, Err(DispatchError::Server { request_id: 18, server, source }) => {
            assert!(server.contains("worker-2"), "got {}", server);
            assert!(source.to_string().contains("broken"));
        });
        cluster.wait_for_cancels(3).await;
        assert_eq!(
            cluster.cancelled_hosts(),
            HashSet::from([
                "worker-1".to_string(),
                "worker-2".to_string(),
                "worker-3".to_string(),
            ])
        );
    }

    #[tokio::test]
    async fn test_no_response_times_out_and_cancels() {
        let cluster = MockCluster::new();
        for host in ["worker-1", "worker-2", "worker-3"] {
            cluster.set_behavior(host, SubmitBehavior::Hang);
        }
        let servers = vec![server(1), server(2), server(3)];
        let sub_plan = three_stage_plan(&servers);
        let dispatcher = dispatcher(&cluster, result_blocks());

        let res = dispatcher
            .submit_and_reduce(19, &sub_plan, 200, &BTreeMap::new())
            .await;

        assert_matches!(
            res,
            Err(DispatchError::Timeout {
                request_id: 19,
                phase: "dispatch",
            })
        );
        cluster.wait_for_cancels(3).await;
        assert_eq!(cluster.cancelled_hosts().len(), 3);
    }

    #[tokio::test]
    async fn test_reduce_error_block_cancels_workers() {
        let cluster = MockCluster::new();
        let servers = vec![server(1), server(2), server(3)];
        let sub_plan = three_stage_plan(&servers);
        let dispatcher = dispatcher(
            &cluster,
            vec![DataBlock::ErrorEos(vec!["shard-7 OOM".to_string()])],
        );

        let res = dispatcher
            .submit_and_reduce(20, &sub_plan, 1_000, &BTreeMap::new())
            .await;

        assert_matches!(res, Err(DispatchError::Reduce { errors, .. }) => {
            assert_eq!(errors, vec!["shard-7 OOM".to_string()]);
        });
        cluster.wait_for_cancels(3).await;
        assert_eq!(cluster.cancelled_hosts().len(), 3);
    }

    #[tokio::test]
    async fn test_unreachable_server_fails_dispatch() {
        let cluster = MockCluster::new();
        cluster
            .refuse_dial
            .lock()
            .insert("worker-3".to_string());
        let servers = vec![server(1), server(2), server(3)];
        let sub_plan = three_stage_plan(&servers);
        let dispatcher = dispatcher(&cluster, result_blocks());

        let res = dispatcher
            .submit_and_reduce(21, &sub_plan, 1_000, &BTreeMap::new())
            .await;

        assert_matches!(res, Err(DispatchError::Server { server, .. }) => {
            assert!(server.contains("worker-3"), "got {}", server);
        });
    }

    #[tokio::test]
    async fn test_explain_decodes_fragment_roots() {
        let cluster = MockCluster::new();
        let servers = vec![server(1), server(2)];
        let fragment = remote_fragment(
            NodeBody::TableScan(TableScanNode {
                table: "lineitem".to_string(),
                columns: vec!["v1".to_string()],
            }),
            &servers,
        );
        let dispatcher = dispatcher(&cluster, vec![]);

        let plans = dispatcher
            .explain(22, &fragment, 1_000, &BTreeMap::new())
            .await
            .unwrap();

        assert_eq!(plans.len(), 2);
        for plan in &plans {
            assert_eq!(plan, &fragment.root);
        }
        assert!(cluster.cancels.lock().is_empty());
    }

    #[tokio::test]
    async fn test_explain_server_error_is_fatal() {
        let cluster = MockCluster::new();
        cluster.set_behavior("worker-2", SubmitBehavior::Fail("unparsable fragment"));
        let servers = vec![server(1), server(2)];
        let fragment = remote_fragment(
            NodeBody::TableScan(TableScanNode {
                table: "lineitem".to_string(),
                columns: vec![],
            }),
            &servers,
        );
        let dispatcher = dispatcher(&cluster, vec![]);

        let res = dispatcher.explain(23, &fragment, 1_000, &BTreeMap::new()).await;

        assert_matches!(res, Err(DispatchError::Explain { server, message, .. }) => {
            assert!(server.contains("worker-2"));
            assert_eq!(message, "unparsable fragment");
        });
        cluster.wait_for_cancels(2).await;
        assert_eq!(
            cluster.cancelled_hosts(),
            HashSet::from(["worker-1".to_string(), "worker-2".to_string()])
        );
    }

    #[tokio::test]
    async fn test_shutdown_releases_clients() {
        let cluster = MockCluster::new();
        let servers = vec![server(1), server(2), server(3)];
        let sub_plan = three_stage_plan(&servers);
        let dispatcher = dispatcher(&cluster, result_blocks());

        dispatcher
            .submit_and_reduce(24, &sub_plan, 1_000, &BTreeMap::new())
            .await
            .unwrap();
        dispatcher.shutdown().await;
    }
}
