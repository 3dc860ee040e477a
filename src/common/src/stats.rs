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

use serde::Serialize;

pub const EXECUTION_TIME_MS: &str = "executionTimeMs";
pub const EMITTED_ROWS: &str = "emittedRows";

/// Counters for one stage of a query.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StageStats {
    entries: BTreeMap<String, i64>,
}

impl StageStats {
    pub fn set(&mut self, key: &str, value: i64) {
        self.entries.insert(key.to_string(), value);
    }

    pub fn add(&mut self, key: &str, delta: i64) {
        *self.entries.entry(key.to_string()).or_insert(0) += delta;
    }

    pub fn get(&self, key: &str) -> Option<i64> {
        self.entries.get(key).copied()
    }

    pub fn merge(&mut self, other: &StageStats) {
        for (key, value) in &other.entries {
            self.add(key, *value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Stats for the whole multi-stage query as streamed to the reduce stage.
/// `upstream[i]` holds stage `i + 1`; the current (reduce) stage is tracked
/// separately because it is still open while upstream stages have closed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MultiStageStats {
    pub current_stage_id: u32,
    pub current: StageStats,
    upstream: Vec<StageStats>,
}

impl MultiStageStats {
    pub fn new(current_stage_id: u32, current: StageStats, upstream: Vec<StageStats>) -> Self {
        Self {
            current_stage_id,
            current,
            upstream,
        }
    }

    pub fn max_stage_id(&self) -> u32 {
        self.upstream.len() as u32
    }

    /// Stats for a remote stage, `1 <= stage_id <= max_stage_id`.
    pub fn upstream_stats(&self, stage_id: u32) -> Option<&StageStats> {
        if stage_id == 0 {
            return None;
        }
        self.upstream.get(stage_id as usize - 1)
    }
}
