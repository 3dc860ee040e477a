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
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ErrorCode::ConfigError;
use crate::error::Result;

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct BrokerConfig {
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Wall-clock budget applied to a submission when the caller does not
    /// provide one.
    #[serde(default = "default::query_timeout_ms")]
    pub query_timeout_ms: u64,

    /// The plan-serializer worker pool is sized `multiplier * num_cpus`.
    #[serde(default = "default::serializer_threads_per_core")]
    pub serializer_threads_per_core: usize,

    /// Options attached to every request. User-supplied query options
    /// override these; reserved keys (request id, timeout) override both.
    #[serde(default)]
    pub default_query_options: BTreeMap<String, String>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        toml::from_str("").unwrap()
    }
}

impl DispatcherConfig {
    pub fn serializer_threads(&self) -> usize {
        self.serializer_threads_per_core * num_cpus::get()
    }
}

impl BrokerConfig {
    /// Load a config from a TOML file. Missing sections fall back to their
    /// defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError(e.into()))?;
        let config = toml::from_str(&raw).map_err(|e| ConfigError(e.into()))?;
        Ok(config)
    }
}

mod default {
    pub fn query_timeout_ms() -> u64 {
        10_000
    }

    pub fn serializer_threads_per_core() -> usize {
        2
    }
}
