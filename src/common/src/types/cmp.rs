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

use std::cmp::Ordering;
use std::collections::HashMap;

use super::{DataType, Datum, ScalarImpl};

type ScalarCompare = fn(&ScalarImpl, &ScalarImpl) -> Ordering;

/// Total-order comparison functions keyed by column type. Built explicitly
/// at dispatcher construction; there is no process-start registration.
pub struct ScalarCmpRegistry {
    cmps: HashMap<DataType, ScalarCompare>,
}

impl Default for ScalarCmpRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ScalarCmpRegistry {
    pub fn new() -> Self {
        let mut cmps: HashMap<DataType, ScalarCompare> = HashMap::new();
        cmps.insert(DataType::Boolean, cmp_bool);
        cmps.insert(DataType::Int32, cmp_int);
        cmps.insert(DataType::Int64, cmp_int);
        // Float columns are externalized to f64 before any comparison runs.
        cmps.insert(DataType::Float32, cmp_float);
        cmps.insert(DataType::Float64, cmp_float);
        cmps.insert(DataType::Varchar, cmp_utf8);
        cmps.insert(DataType::Bytea, cmp_utf8);
        cmps.insert(DataType::Timestamp, cmp_utf8);
        Self { cmps }
    }

    /// Compare two datums of the given column type, nulls first.
    pub fn compare(&self, data_type: DataType, lhs: &Datum, rhs: &Datum) -> Ordering {
        match (lhs, rhs) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(l), Some(r)) => match self.cmps.get(&data_type) {
                Some(cmp) => cmp(l, r),
                None => Ordering::Equal,
            },
        }
    }
}

fn cmp_bool(lhs: &ScalarImpl, rhs: &ScalarImpl) -> Ordering {
    match (lhs, rhs) {
        (ScalarImpl::Bool(l), ScalarImpl::Bool(r)) => l.cmp(r),
        _ => Ordering::Equal,
    }
}

fn cmp_int(lhs: &ScalarImpl, rhs: &ScalarImpl) -> Ordering {
    match (as_i64(lhs), as_i64(rhs)) {
        (Some(l), Some(r)) => l.cmp(&r),
        _ => Ordering::Equal,
    }
}

fn cmp_float(lhs: &ScalarImpl, rhs: &ScalarImpl) -> Ordering {
    match (as_f64(lhs), as_f64(rhs)) {
        (Some(l), Some(r)) => l.total_cmp(&r),
        _ => Ordering::Equal,
    }
}

// `Bytea` and `Timestamp` cells have been formatted to strings by the time
// they are compared, so they share the utf8 comparator.
fn cmp_utf8(lhs: &ScalarImpl, rhs: &ScalarImpl) -> Ordering {
    match (lhs, rhs) {
        (ScalarImpl::Utf8(l), ScalarImpl::Utf8(r)) => l.cmp(r),
        _ => Ordering::Equal,
    }
}

fn as_i64(scalar: &ScalarImpl) -> Option<i64> {
    match scalar {
        ScalarImpl::Int32(v) => Some(*v as i64),
        ScalarImpl::Int64(v) => Some(*v),
        ScalarImpl::Timestamp(v) => Some(*v),
        _ => None,
    }
}

fn as_f64(scalar: &ScalarImpl) -> Option<f64> {
    match scalar {
        ScalarImpl::Float32(v) => Some(*v as f64),
        ScalarImpl::Float64(v) => Some(*v),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nulls_first() {
        let registry = ScalarCmpRegistry::new();
        assert_eq!(
            registry.compare(DataType::Int64, &None, &Some(ScalarImpl::Int64(1))),
            Ordering::Less
        );
        assert_eq!(
            registry.compare(DataType::Int64, &Some(ScalarImpl::Int64(1)), &None),
            Ordering::Greater
        );
        assert_eq!(registry.compare(DataType::Int64, &None, &None), Ordering::Equal);
    }

    #[test]
    fn test_every_type_has_a_comparator() {
        let registry = ScalarCmpRegistry::new();
        for ty in [
            DataType::Boolean,
            DataType::Int32,
            DataType::Int64,
            DataType::Float32,
            DataType::Float64,
            DataType::Varchar,
            DataType::Bytea,
            DataType::Timestamp,
        ] {
            assert!(registry.cmps.contains_key(&ty), "missing comparator: {:?}", ty);
        }
    }

    #[test]
    fn test_float_total_order() {
        let registry = ScalarCmpRegistry::new();
        assert_eq!(
            registry.compare(
                DataType::Float64,
                &Some(ScalarImpl::Float64(f64::NAN)),
                &Some(ScalarImpl::Float64(f64::INFINITY)),
            ),
            Ordering::Greater
        );
        assert_eq!(
            registry.compare(
                DataType::Float32,
                &Some(ScalarImpl::Float64(1.0)),
                &Some(ScalarImpl::Float64(2.0)),
            ),
            Ordering::Less
        );
    }

    #[test]
    fn test_mixed_int_widths() {
        let registry = ScalarCmpRegistry::new();
        assert_eq!(
            registry.compare(
                DataType::Int64,
                &Some(ScalarImpl::Int32(3)),
                &Some(ScalarImpl::Int64(4)),
            ),
            Ordering::Less
        );
    }
}
