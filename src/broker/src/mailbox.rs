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

use async_trait::async_trait;
use petrel_common::block::DataBlock;
use petrel_common::error::Result;
use petrel_common::util::Deadline;

use crate::dispatcher::plan::WorkerMetadata;

/// Everything the mailbox layer needs to bind the stage-0 receive operator
/// for one query.
pub struct ReceiveExecutionContext {
    pub request_id: u64,
    pub deadline: Deadline,
    pub query_options: BTreeMap<String, String>,
    /// Custom properties of the reduce stage.
    pub custom_properties: BTreeMap<String, String>,
    /// The single broker-side worker of the reduce stage.
    pub worker: WorkerMetadata,
    /// Parent span for the receive operator's tracing.
    pub span: tracing::Span,
}

/// The mailbox collaborator. The dispatcher only ever opens receive
/// operators for stage 0; workers talk to each other's mailboxes directly.
#[async_trait]
pub trait MailboxService: Send + Sync + 'static {
    async fn open_receive(&self, ctx: ReceiveExecutionContext) -> Result<BoxedBlockStream>;

    /// Release listener resources. Called once, from dispatcher shutdown.
    async fn shutdown(&self);
}

pub type BoxedBlockStream = Box<dyn BlockStream>;

#[async_trait]
pub trait BlockStream: Send {
    /// The next block from upstream. May block up to the context deadline.
    async fn next_block(&mut self) -> Result<DataBlock>;
}
