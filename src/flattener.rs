use std::sync::Arc;

use arrow::array::*;
use arrow::compute::{cast, take};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;

use crate::error::{ExtractError, Result};
use crate::schema::{self, DOI, FUNDING, GRID_ID, PMCID, PMID};

/// Explodes the `funding` list into one row per acknowledgment.
///
/// Every output row carries its parent's `doi`, `pmid` and `pmcid` plus the
/// acknowledgment's `grid_id`. Records whose `funding` is null or empty
/// produce no rows.
pub fn flatten(batch: &RecordBatch) -> Result<RecordBatch> {
    let funding = column(batch, FUNDING)?;

    let (parents, grid_ids) = match funding.data_type() {
        DataType::Null => (
            UInt32Array::from(Vec::<u32>::new()),
            StringArray::from(Vec::<Option<&str>>::new()),
        ),
        DataType::List(_) => explode(funding.as_list::<i32>())?,
        DataType::LargeList(_) => explode(funding.as_list::<i64>())?,
        other => {
            return Err(ExtractError::UnexpectedType {
                column: FUNDING.to_string(),
                found: other.to_string(),
            })
        }
    };

    let mut columns: Vec<ArrayRef> = Vec::with_capacity(4);
    for name in [DOI, PMID, PMCID] {
        let parent_values = as_utf8(column(batch, name)?)?;
        columns.push(take(parent_values.as_ref(), &parents, None)?);
    }
    columns.push(Arc::new(grid_ids));

    Ok(RecordBatch::try_new(schema::flattened_schema(), columns)?)
}

/// Parent row index and `grid_id` for every acknowledgment, in list order.
fn explode<O: OffsetSizeTrait>(
    funding: &GenericListArray<O>,
) -> Result<(UInt32Array, StringArray)> {
    let acknowledgments = funding.values();
    let structs = acknowledgments
        .as_struct_opt()
        .ok_or_else(|| ExtractError::UnexpectedType {
            column: FUNDING.to_string(),
            found: funding.data_type().to_string(),
        })?;

    // Structs without the field behave as if every grid_id were null.
    let grid_values = match structs.column_by_name(GRID_ID) {
        Some(values) => Some(as_utf8(values)?),
        None => None,
    };
    let grid_strings = grid_values.as_ref().map(|values| values.as_string::<i32>());

    let offsets = funding.value_offsets();
    let mut parents = UInt32Builder::new();
    let mut grid_ids = StringBuilder::new();

    for row in 0..funding.len() {
        if funding.is_null(row) {
            continue;
        }
        let start = offsets[row].as_usize();
        let end = offsets[row + 1].as_usize();

        for idx in start..end {
            parents.append_value(row as u32);
            match grid_strings {
                Some(values) if structs.is_valid(idx) && values.is_valid(idx) => {
                    grid_ids.append_value(values.value(idx))
                }
                _ => grid_ids.append_null(),
            }
        }
    }

    Ok((parents.finish(), grid_ids.finish()))
}

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| ExtractError::MissingColumn {
            column: name.to_string(),
            context: "partition batch".to_string(),
        })
}

/// Identifier columns are compared as strings whatever their stored type.
pub(crate) fn as_utf8(values: &ArrayRef) -> Result<ArrayRef> {
    match values.data_type() {
        DataType::Utf8 => Ok(values.clone()),
        _ => Ok(cast(values.as_ref(), &DataType::Utf8)?),
    }
}
