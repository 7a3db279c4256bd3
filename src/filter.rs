use arrow::array::*;
use arrow::compute::kernels::cmp::eq;
use arrow::compute::{and, filter_record_batch, is_not_null};
use arrow::record_batch::RecordBatch;

use crate::error::{ExtractError, Result};
use crate::flattener::as_utf8;
use crate::schema::{self, GRID_ID, OUTPUT_COLUMNS, PMID};

/// Keeps rows funded by `target_org_id` that also carry a `pmid`, projected
/// to `doi, grid_id, pmid, pmcid`.
///
/// A null `grid_id` never matches.
pub fn filter_and_project(rows: &RecordBatch, target_org_id: &str) -> Result<RecordBatch> {
    let grid_ids = as_utf8(column(rows, GRID_ID)?)?;
    let funded_by_target = eq(&grid_ids, &StringArray::new_scalar(target_org_id))?;
    let has_pmid = is_not_null(column(rows, PMID)?.as_ref())?;
    let mask = and(&funded_by_target, &has_pmid)?;

    let kept = filter_record_batch(rows, &mask)?;
    project(&kept)
}

fn project(batch: &RecordBatch) -> Result<RecordBatch> {
    let mut columns = Vec::with_capacity(OUTPUT_COLUMNS.len());
    for name in OUTPUT_COLUMNS {
        columns.push(as_utf8(column(batch, name)?)?);
    }
    Ok(RecordBatch::try_new(schema::output_schema(), columns)?)
}

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| ExtractError::MissingColumn {
            column: name.to_string(),
            context: "flattened batch".to_string(),
        })
}
