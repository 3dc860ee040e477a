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

use std::fmt::{Display, Formatter};

use petrel_pb::common::DataTypeKind;
use serde::{Deserialize, Serialize};

use crate::error::ErrorCode::InternalError;
use crate::error::Result;

mod cmp;
mod externalize;

pub use cmp::ScalarCmpRegistry;
pub use externalize::float_display;

/// Column data types understood by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Int32,
    Int64,
    Float32,
    Float64,
    Varchar,
    Bytea,
    Timestamp,
}

impl DataType {
    pub fn from_protobuf(kind: DataTypeKind) -> Result<Self> {
        let data_type = match kind {
            DataTypeKind::Boolean => Self::Boolean,
            DataTypeKind::Int32 => Self::Int32,
            DataTypeKind::Int64 => Self::Int64,
            DataTypeKind::Float32 => Self::Float32,
            DataTypeKind::Float64 => Self::Float64,
            DataTypeKind::Varchar => Self::Varchar,
            DataTypeKind::Bytea => Self::Bytea,
            DataTypeKind::Timestamp => Self::Timestamp,
            DataTypeKind::Unspecified => {
                return Err(InternalError("unspecified data type".to_string()).into())
            }
        };
        Ok(data_type)
    }

    pub fn to_protobuf(&self) -> DataTypeKind {
        match self {
            Self::Boolean => DataTypeKind::Boolean,
            Self::Int32 => DataTypeKind::Int32,
            Self::Int64 => DataTypeKind::Int64,
            Self::Float32 => DataTypeKind::Float32,
            Self::Float64 => DataTypeKind::Float64,
            Self::Varchar => DataTypeKind::Varchar,
            Self::Bytea => DataTypeKind::Bytea,
            Self::Timestamp => DataTypeKind::Timestamp,
        }
    }
}

/// Owned scalar value. `Timestamp` is milliseconds since the unix epoch.
#[derive(Clone, Debug, PartialEq)]
pub enum ScalarImpl {
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Utf8(String),
    Bytes(Vec<u8>),
    Timestamp(i64),
}

pub type Datum = Option<ScalarImpl>;

impl Display for ScalarImpl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int32(v) => write!(f, "{}", v),
            Self::Int64(v) => write!(f, "{}", v),
            Self::Float32(v) => write!(f, "{}", float_display(*v)),
            Self::Float64(v) => write!(f, "{}", float_display(*v)),
            Self::Utf8(v) => write!(f, "{}", v),
            Self::Bytes(v) => {
                for b in v {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
            Self::Timestamp(v) => write!(f, "{}", externalize::timestamp_display(*v)),
        }
    }
}
