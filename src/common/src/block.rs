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

use crate::stats::MultiStageStats;
use crate::types::Datum;

/// One row of boxed values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row(pub Vec<Datum>);

impl Row {
    pub fn new(values: Vec<Datum>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[Datum] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A batch delivered through a mailbox. The stream is terminated by exactly
/// one of the end-of-stream variants.
#[derive(Debug)]
pub enum DataBlock {
    /// Raw rows in the upstream stage's output schema.
    Rows(Vec<Row>),
    /// Successful end of stream, carrying the accumulated per-stage stats.
    SuccessEos(Box<MultiStageStats>),
    /// The stream was aborted upstream; carries worker-reported messages.
    ErrorEos(Vec<String>),
}

impl DataBlock {
    pub fn is_eos(&self) -> bool {
        matches!(self, Self::SuccessEos(_) | Self::ErrorEos(_))
    }
}
