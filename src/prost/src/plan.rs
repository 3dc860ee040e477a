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

/// One node of a stage-plan fragment. The node set is closed; the reduce
/// stage special-cases `MailboxReceive` as its root.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PlanNode {
    #[prost(message, repeated, tag = "1")]
    pub children: ::prost::alloc::vec::Vec<PlanNode>,
    #[prost(oneof = "plan_node::NodeBody", tags = "2, 3, 4, 5, 6, 7, 8")]
    pub node_body: ::core::option::Option<plan_node::NodeBody>,
}

/// Nested message and enum types in `PlanNode`.
pub mod plan_node {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum NodeBody {
        #[prost(message, tag = "2")]
        MailboxReceive(super::MailboxReceiveNode),
        #[prost(message, tag = "3")]
        MailboxSend(super::MailboxSendNode),
        #[prost(message, tag = "4")]
        Project(super::ProjectNode),
        #[prost(message, tag = "5")]
        Filter(super::FilterNode),
        #[prost(message, tag = "6")]
        Aggregate(super::AggregateNode),
        #[prost(message, tag = "7")]
        Sort(super::SortNode),
        #[prost(message, tag = "8")]
        TableScan(super::TableScanNode),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SortKey {
    #[prost(uint32, tag = "1")]
    pub column: u32,
    #[prost(bool, tag = "2")]
    pub descending: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MailboxReceiveNode {
    #[prost(uint32, tag = "1")]
    pub sender_stage_id: u32,
    /// Schema of the blocks this mailbox delivers.
    #[prost(message, repeated, tag = "2")]
    pub fields: ::prost::alloc::vec::Vec<super::common::Field>,
    /// When non-empty, the receiver applies this final ordering.
    #[prost(message, repeated, tag = "3")]
    pub sort_keys: ::prost::alloc::vec::Vec<SortKey>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MailboxSendNode {
    #[prost(uint32, tag = "1")]
    pub receiver_stage_id: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProjectNode {
    #[prost(uint32, repeated, tag = "1")]
    pub column_indices: ::prost::alloc::vec::Vec<u32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FilterNode {
    /// Textual expression; evaluated on the worker, opaque to the broker.
    #[prost(string, tag = "1")]
    pub expression: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AggregateNode {
    #[prost(uint32, repeated, tag = "1")]
    pub group_keys: ::prost::alloc::vec::Vec<u32>,
    #[prost(string, repeated, tag = "2")]
    pub aggregations: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SortNode {
    #[prost(message, repeated, tag = "1")]
    pub sort_keys: ::prost::alloc::vec::Vec<SortKey>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TableScanNode {
    #[prost(string, tag = "1")]
    pub table: ::prost::alloc::string::String,
    #[prost(string, repeated, tag = "2")]
    pub columns: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}

/// Opaque per-stage key/value properties, serialized separately from the
/// plan tree so both can be prepared in parallel.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StageProperties {
    #[prost(btree_map = "string, string", tag = "1")]
    pub properties: ::prost::alloc::collections::BTreeMap<
        ::prost::alloc::string::String,
        ::prost::alloc::string::String,
    >,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WorkerMetadata {
    #[prost(message, optional, tag = "1")]
    pub address: ::core::option::Option<super::common::HostAddress>,
    #[prost(uint32, tag = "2")]
    pub worker_id: u32,
    #[prost(btree_map = "string, string", tag = "3")]
    pub custom_property: ::prost::alloc::collections::BTreeMap<
        ::prost::alloc::string::String,
        ::prost::alloc::string::String,
    >,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StageMetadata {
    /// 1-based position of the stage in the submitted plan.
    #[prost(uint32, tag = "1")]
    pub stage_id: u32,
    /// Only the workers assigned to the addressed server.
    #[prost(message, repeated, tag = "2")]
    pub worker_metadata: ::prost::alloc::vec::Vec<WorkerMetadata>,
    /// Encoded [`StageProperties`].
    #[prost(bytes = "bytes", tag = "3")]
    pub custom_property: ::prost::bytes::Bytes,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StagePlan {
    /// Encoded [`PlanNode`] tree.
    #[prost(bytes = "bytes", tag = "1")]
    pub root: ::prost::bytes::Bytes,
    #[prost(message, optional, tag = "2")]
    pub stage_metadata: ::core::option::Option<StageMetadata>,
}
