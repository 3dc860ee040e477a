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
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use itertools::Itertools;
use petrel_common::block::{DataBlock, Row};
use petrel_common::catalog::{Field, Schema};
use petrel_common::stats::{StageStats, EMITTED_ROWS, EXECUTION_TIME_MS};
use petrel_common::types::ScalarCmpRegistry;
use petrel_common::util::Deadline;
use petrel_pb::plan::plan_node::NodeBody;
use petrel_pb::plan::{MailboxReceiveNode, SortKey};

use crate::dispatcher::error::{DispatchError, DispatchResult};
use crate::dispatcher::plan::{DispatchableSubPlan, ResultField};
use crate::mailbox::{MailboxService, ReceiveExecutionContext};

/// The tabular result of a query.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultTable {
    pub schema: Schema,
    pub rows: Vec<Row>,
}

/// What `submit_and_reduce` hands back to the caller.
#[derive(Clone, Debug)]
pub struct QueryResult {
    pub result_table: ResultTable,
    /// Index 0 is the local reduce stage, index i > 0 the stats streamed
    /// from remote stage i.
    pub per_stage_stats: Vec<StageStats>,
    pub broker_reduce_time_ms: u64,
}

/// Open the stage-0 receive operator, drain blocks to end-of-stream, and
/// assemble the externalized result table plus per-stage stats.
pub(crate) async fn run_reduce(
    mailbox: &Arc<dyn MailboxService>,
    cmp_registry: &ScalarCmpRegistry,
    request_id: u64,
    sub_plan: &DispatchableSubPlan,
    query_options: &BTreeMap<String, String>,
    deadline: Deadline,
) -> DispatchResult<QueryResult> {
    let start = Instant::now();

    let reduce_stage = sub_plan
        .stages
        .first()
        .ok_or_else(|| DispatchError::Invariant("sub-plan has no stages".to_string()))?;
    let receive = match &reduce_stage.root.node_body {
        Some(NodeBody::MailboxReceive(node)) => node,
        _ => {
            return Err(DispatchError::Invariant(
                "reduce stage root is not a mailbox receive".to_string(),
            ))
        }
    };
    if reduce_stage.worker_metadata.len() != 1 {
        return Err(DispatchError::Invariant(format!(
            "reduce stage must have exactly one worker, got {}",
            reduce_stage.worker_metadata.len()
        )));
    }

    let schema = project_schema(receive, &sub_plan.result_fields)?;

    let ctx = ReceiveExecutionContext {
        request_id,
        deadline,
        query_options: query_options.clone(),
        custom_properties: reduce_stage.custom_properties.clone(),
        worker: reduce_stage.worker_metadata[0].clone(),
        span: tracing::Span::current(),
    };
    let mut stream = mailbox.open_receive(ctx).await.map_err(DispatchError::from)?;

    let mut rows = Vec::new();
    let stats = loop {
        let block = tokio::time::timeout(deadline.remaining(), stream.next_block())
            .await
            .map_err(|_| DispatchError::Timeout {
                request_id,
                phase: "reduce",
            })?
            .map_err(DispatchError::from)?;
        match block {
            DataBlock::Rows(raw_rows) => {
                for raw in raw_rows {
                    rows.push(project_row(&schema, &sub_plan.result_fields, raw)?);
                }
            }
            DataBlock::ErrorEos(errors) => {
                return Err(DispatchError::Reduce { request_id, errors })
            }
            DataBlock::SuccessEos(stats) => break *stats,
        }
    };

    if stats.current_stage_id != 0 {
        return Err(DispatchError::Invariant(format!(
            "reduce stream delivered stats for stage {}, expected stage 0",
            stats.current_stage_id
        )));
    }

    if !receive.sort_keys.is_empty() {
        sort_rows(&mut rows, &schema, &receive.sort_keys, cmp_registry)?;
    }

    let broker_reduce_time_ms = start.elapsed().as_millis() as u64;
    let mut per_stage_stats = Vec::with_capacity(stats.max_stage_id() as usize + 1);
    let mut reduce_stats = stats.current.clone();
    reduce_stats.set(EXECUTION_TIME_MS, broker_reduce_time_ms as i64);
    reduce_stats.set(EMITTED_ROWS, rows.len() as i64);
    per_stage_stats.push(reduce_stats);
    for stage_id in 1..=stats.max_stage_id() {
        let stage_stats = stats.upstream_stats(stage_id).cloned().ok_or_else(|| {
            DispatchError::Invariant(format!("missing stats for stage {}", stage_id))
        })?;
        per_stage_stats.push(stage_stats);
    }

    Ok(QueryResult {
        result_table: ResultTable { schema, rows },
        per_stage_stats,
        broker_reduce_time_ms,
    })
}

/// Output schema: one field per result field, named by the projection and
/// typed by the source column it reads.
fn project_schema(
    receive: &MailboxReceiveNode,
    result_fields: &[ResultField],
) -> DispatchResult<Schema> {
    let source_fields = receive
        .fields
        .iter()
        .map(|field| Field::from_protobuf(field).map_err(DispatchError::from))
        .collect::<DispatchResult<Vec<_>>>()?;

    let mut fields = Vec::with_capacity(result_fields.len());
    for result_field in result_fields {
        let source_field = source_fields.get(result_field.index).ok_or_else(|| {
            DispatchError::Invariant(format!(
                "result field {} reads column {} but the source schema has {} columns",
                result_field.name,
                result_field.index,
                source_fields.len()
            ))
        })?;
        fields.push(Field::with_name(
            source_field.data_type,
            result_field.name.clone(),
        ));
    }
    Ok(Schema::new(fields))
}

fn project_row(
    schema: &Schema,
    result_fields: &[ResultField],
    raw: Row,
) -> DispatchResult<Row> {
    let mut values = Vec::with_capacity(result_fields.len());
    for (field, result_field) in schema.fields().iter().zip_eq(result_fields) {
        let datum = raw.values().get(result_field.index).cloned().ok_or_else(|| {
            DispatchError::Invariant(format!(
                "raw row has {} columns, result field {} reads column {}",
                raw.len(),
                result_field.name,
                result_field.index
            ))
        })?;
        let value = match datum {
            None => None,
            Some(scalar) => {
                let external = field
                    .data_type
                    .to_external(scalar)
                    .map_err(DispatchError::from)?;
                Some(field.data_type.format(external))
            }
        };
        values.push(value);
    }
    Ok(Row::new(values))
}

/// Final ordering of the externalized rows, nulls first.
fn sort_rows(
    rows: &mut [Row],
    schema: &Schema,
    sort_keys: &[SortKey],
    cmp_registry: &ScalarCmpRegistry,
) -> DispatchResult<()> {
    for key in sort_keys {
        if key.column as usize >= schema.len() {
            return Err(DispatchError::Invariant(format!(
                "sort key column {} out of range for schema of {} columns",
                key.column,
                schema.len()
            )));
        }
    }
    rows.sort_by(|lhs, rhs| {
        for key in sort_keys {
            let column = key.column as usize;
            let data_type = schema.fields[column].data_type;
            let ordering =
                cmp_registry.compare(data_type, &lhs.values()[column], &rhs.values()[column]);
            let ordering = if key.descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    Ok(())
}
