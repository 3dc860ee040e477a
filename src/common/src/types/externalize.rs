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

use chrono::NaiveDateTime;
use num_traits::Float;

use super::{DataType, ScalarImpl};
use crate::error::ErrorCode::InternalError;
use crate::error::Result;

impl DataType {
    /// Convert an engine-internal scalar into the public representation of
    /// this column type. Numeric values are widened to their canonical
    /// external width; a value the type cannot carry is an error.
    pub fn to_external(&self, scalar: ScalarImpl) -> Result<ScalarImpl> {
        let converted = match (self, scalar) {
            (Self::Boolean, s @ ScalarImpl::Bool(_)) => s,
            (Self::Int32, s @ ScalarImpl::Int32(_)) => s,
            (Self::Int64, s @ ScalarImpl::Int64(_)) => s,
            (Self::Int64, ScalarImpl::Int32(v)) => ScalarImpl::Int64(v as i64),
            (Self::Float32, ScalarImpl::Float32(v)) => ScalarImpl::Float64(v as f64),
            (Self::Float32, s @ ScalarImpl::Float64(_)) => s,
            (Self::Float64, s @ ScalarImpl::Float64(_)) => s,
            (Self::Float64, ScalarImpl::Float32(v)) => ScalarImpl::Float64(v as f64),
            (Self::Varchar, s @ ScalarImpl::Utf8(_)) => s,
            (Self::Bytea, s @ ScalarImpl::Bytes(_)) => s,
            (Self::Timestamp, s @ ScalarImpl::Timestamp(_)) => s,
            (Self::Timestamp, ScalarImpl::Int64(v)) => ScalarImpl::Timestamp(v),
            (ty, scalar) => {
                return Err(
                    InternalError(format!("cannot externalize {:?} as {:?}", scalar, ty)).into(),
                )
            }
        };
        Ok(converted)
    }

    /// Apply the final display normalization to an already-external value.
    /// Binary columns render as lowercase hex, timestamps as their calendar
    /// form; everything else passes through.
    pub fn format(&self, scalar: ScalarImpl) -> ScalarImpl {
        match (self, scalar) {
            (Self::Bytea, s @ ScalarImpl::Bytes(_)) => ScalarImpl::Utf8(s.to_string()),
            (Self::Timestamp, ScalarImpl::Timestamp(v)) => {
                ScalarImpl::Utf8(timestamp_display(v))
            }
            (_, s) => s,
        }
    }
}

/// Format floats with the canonical `NaN` / `Infinity` spellings.
pub fn float_display<T: Float + ToString>(v: T) -> String {
    if v.is_infinite() {
        if v.is_sign_positive() {
            "Infinity"
        } else {
            "-Infinity"
        }
        .to_string()
    } else if v.is_nan() {
        "NaN".to_string()
    } else {
        v.to_string()
    }
}

pub(super) fn timestamp_display(epoch_millis: i64) -> String {
    match NaiveDateTime::from_timestamp_opt(
        epoch_millis.div_euclid(1000),
        (epoch_millis.rem_euclid(1000) * 1_000_000) as u32,
    ) {
        Some(ts) => ts.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        None => epoch_millis.to_string(),
    }
}
