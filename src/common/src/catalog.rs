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

use petrel_pb::common::{DataTypeKind, Field as PbField};

use crate::error::Result;
use crate::types::DataType;

/// The field in the schema of a result table.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub data_type: DataType,
    pub name: String,
}

impl Field {
    pub fn with_name(data_type: DataType, name: impl Into<String>) -> Self {
        Self {
            data_type,
            name: name.into(),
        }
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn from_protobuf(field: &PbField) -> Result<Self> {
        let kind = DataTypeKind::from_i32(field.data_type).unwrap_or(DataTypeKind::Unspecified);
        Ok(Self {
            data_type: DataType::from_protobuf(kind)?,
            name: field.name.clone(),
        })
    }
}

/// The schema of a result table.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn data_types(&self) -> Vec<DataType> {
        self.fields.iter().map(|f| f.data_type).collect()
    }
}
