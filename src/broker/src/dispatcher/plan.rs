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

use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter};

use petrel_pb::common::HostAddress;
use petrel_pb::plan::{PlanNode, WorkerMetadata as PbWorkerMetadata};

/// One worker server as addressed by the dispatcher. The query port carries
/// the RPC services; the mailbox port is where stages exchange data.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ServerInstance {
    pub host: String,
    pub query_port: u16,
    pub mailbox_port: u16,
}

impl ServerInstance {
    pub fn new(host: impl Into<String>, query_port: u16, mailbox_port: u16) -> Self {
        Self {
            host: host.into(),
            query_port,
            mailbox_port,
        }
    }
}

impl Display for ServerInstance {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.query_port)
    }
}

/// A logical execution slot of one stage: where it runs plus stage-local
/// routing properties.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkerMetadata {
    pub server: ServerInstance,
    pub worker_id: u32,
    pub custom_properties: BTreeMap<String, String>,
}

impl WorkerMetadata {
    /// Wire form. Workers reach each other through mailboxes, so the address
    /// carries the mailbox port.
    pub fn to_protobuf(&self) -> PbWorkerMetadata {
        PbWorkerMetadata {
            address: Some(HostAddress {
                host: self.server.host.clone(),
                port: self.server.mailbox_port as i32,
            }),
            worker_id: self.worker_id,
            custom_property: self.custom_properties.clone(),
        }
    }
}

/// One column of the query result: which source column it reads and the name
/// it is exposed under.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultField {
    pub index: usize,
    pub name: String,
}

/// One fragment of a partitioned plan, pinned to a set of workers.
#[derive(Clone, Debug)]
pub struct DispatchablePlanFragment {
    pub root: PlanNode,
    /// Which logical workers on each server execute this stage.
    pub server_workers: HashMap<ServerInstance, Vec<u32>>,
    /// All workers of the stage, indexed by worker id.
    pub worker_metadata: Vec<WorkerMetadata>,
    pub custom_properties: BTreeMap<String, String>,
}

impl DispatchablePlanFragment {
    pub fn servers(&self) -> impl Iterator<Item = &ServerInstance> {
        self.server_workers.keys()
    }

    /// Worker ids assigned to `server`, or `None` if the server does not
    /// participate in this stage.
    pub fn workers_on(&self, server: &ServerInstance) -> Option<&[u32]> {
        self.server_workers.get(server).map(|ids| ids.as_slice())
    }
}

/// A fully planned query: stage 0 is the broker-local reduce stage, stages
/// 1..N run remotely.
#[derive(Clone, Debug)]
pub struct DispatchableSubPlan {
    pub stages: Vec<DispatchablePlanFragment>,
    /// Ordered projection from the reduce stage's schema to the result table.
    pub result_fields: Vec<ResultField>,
}

impl DispatchableSubPlan {
    pub fn remote_stages(&self) -> &[DispatchablePlanFragment] {
        self.stages.get(1..).unwrap_or(&[])
    }
}

/// A planned time-series query, addressed to a single server.
#[derive(Clone, Debug)]
pub struct TimeSeriesDispatchPlan {
    pub language: String,
    pub start_time_seconds: u64,
    pub window_seconds: u64,
    pub num_elements: u64,
    /// UTF-8 serialized plan, shipped verbatim as the request payload.
    pub serialized_plan: String,
    pub server: ServerInstance,
    /// Segments to read, per plan fragment id.
    pub segments_by_plan: BTreeMap<String, Vec<String>>,
}

/// Metadata key naming the segment list of one plan fragment.
pub fn encode_segment_list_key(plan_id: &str) -> String {
    format!("segmentList:{}", plan_id)
}
