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

use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

use thiserror::Error;

/// Low-level error classification shared by all crates in the workspace.
#[derive(Error, Debug)]
pub enum ErrorCode {
    #[error("internal error: {0}")]
    InternalError(String),
    #[error("protocol error: {0}")]
    ProtocolError(String),
    #[error("rpc error: {0}")]
    RpcError(#[source] anyhow::Error),
    #[error("connection error: {0}")]
    ConnectionError(#[source] anyhow::Error),
    #[error("timeout: {0}")]
    TimeoutError(String),
    #[error("config error: {0}")]
    ConfigError(#[source] anyhow::Error),
}

/// Cheaply clonable wrapper around [`ErrorCode`]. Cloning shares the inner
/// code, so errors can be fanned out to several waiters.
#[derive(Clone)]
pub struct PetrelError {
    inner: Arc<ErrorCode>,
}

impl ErrorCode {
    /// Stable kind name, used where errors are reported as structured data.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InternalError(_) => "InternalError",
            Self::ProtocolError(_) => "ProtocolError",
            Self::RpcError(_) => "RpcError",
            Self::ConnectionError(_) => "ConnectionError",
            Self::TimeoutError(_) => "TimeoutError",
            Self::ConfigError(_) => "ConfigError",
        }
    }
}

impl PetrelError {
    pub fn inner(&self) -> &ErrorCode {
        &self.inner
    }

    pub fn kind(&self) -> &'static str {
        self.inner.kind()
    }
}

impl From<ErrorCode> for PetrelError {
    fn from(code: ErrorCode) -> Self {
        Self {
            inner: Arc::new(code),
        }
    }
}

impl Display for PetrelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl Debug for PetrelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.inner)
    }
}

impl std::error::Error for PetrelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

pub type Result<T> = std::result::Result<T, PetrelError>;
