//! Row-shaped views of the corpus and of the extracted table.
//!
//! The pipeline itself works on Arrow batches and never calls into this
//! module. These structs and conversions are helpers for tests and for
//! inspecting an extracted table: building partition-shaped input batches
//! and reading output rows back.

use std::sync::Arc;

use arrow::array::*;
use arrow::buffer::{NullBuffer, OffsetBuffer};
use arrow::datatypes::*;
use arrow::record_batch::RecordBatch;

use crate::error::{ExtractError, Result};
use crate::schema::{DOI, FUNDING, GRID_ID, OUTPUT_COLUMNS, PMCID, PMID};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FundingAcknowledgment {
    pub grid_id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublicationRecord {
    pub doi: Option<String>,
    pub funding: Option<Vec<FundingAcknowledgment>>,
    pub pmid: Option<String>,
    pub pmcid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRow {
    pub doi: Option<String>,
    pub grid_id: Option<String>,
    pub pmid: Option<String>,
    pub pmcid: Option<String>,
}

/// Builds a partition-shaped batch: `doi`, `funding: List<Struct<grid_id, name>>`,
/// `pmid`, `pmcid`.
pub fn to_arrow(records: &[PublicationRecord]) -> Result<RecordBatch> {
    let acknowledgment_fields = Fields::from(vec![
        Field::new(GRID_ID, DataType::Utf8, true),
        Field::new("name", DataType::Utf8, true),
    ]);

    let mut offsets = Vec::with_capacity(records.len() + 1);
    let mut list_valid = Vec::with_capacity(records.len());
    let mut grid_ids: Vec<Option<&str>> = Vec::new();
    let mut names: Vec<Option<&str>> = Vec::new();

    offsets.push(0i32);
    for rec in records {
        if let Some(funding) = &rec.funding {
            for ack in funding {
                grid_ids.push(ack.grid_id.as_deref());
                names.push(ack.name.as_deref());
            }
        }
        list_valid.push(rec.funding.is_some());
        offsets.push(grid_ids.len() as i32);
    }

    let acknowledgments = StructArray::try_new(
        acknowledgment_fields.clone(),
        vec![
            Arc::new(StringArray::from(grid_ids)) as ArrayRef,
            Arc::new(StringArray::from(names)) as ArrayRef,
        ],
        None,
    )?;

    let item = Arc::new(Field::new("item", DataType::Struct(acknowledgment_fields), true));
    let funding = ListArray::try_new(
        item,
        OffsetBuffer::new(offsets.into()),
        Arc::new(acknowledgments),
        Some(NullBuffer::from(list_valid)),
    )?;

    macro_rules! build_string {
        ($name:ident) => {{
            let mut b = StringBuilder::with_capacity(records.len(), records.len() * 16);
            for r in records {
                b.append_option(r.$name.as_deref());
            }
            Arc::new(b.finish()) as ArrayRef
        }};
    }

    let schema = Arc::new(Schema::new(vec![
        Field::new(DOI, DataType::Utf8, true),
        Field::new(FUNDING, funding.data_type().clone(), true),
        Field::new(PMID, DataType::Utf8, true),
        Field::new(PMCID, DataType::Utf8, true),
    ]));

    Ok(RecordBatch::try_new(
        schema,
        vec![
            build_string!(doi),
            Arc::new(funding) as ArrayRef,
            build_string!(pmid),
            build_string!(pmcid),
        ],
    )?)
}

/// Reads an extracted batch back into rows.
pub fn output_rows(batch: &RecordBatch) -> Result<Vec<OutputRow>> {
    let mut columns = Vec::with_capacity(OUTPUT_COLUMNS.len());
    for name in OUTPUT_COLUMNS {
        let column = batch
            .column_by_name(name)
            .ok_or_else(|| ExtractError::MissingColumn {
                column: name.to_string(),
                context: "extracted batch".to_string(),
            })?;
        let strings = column
            .as_string_opt::<i32>()
            .ok_or_else(|| ExtractError::UnexpectedType {
                column: name.to_string(),
                found: column.data_type().to_string(),
            })?;
        columns.push(strings);
    }

    let value = |col: &StringArray, i: usize| col.is_valid(i).then(|| col.value(i).to_string());

    Ok((0..batch.num_rows())
        .map(|i| OutputRow {
            doi: value(columns[0], i),
            grid_id: value(columns[1], i),
            pmid: value(columns[2], i),
            pmcid: value(columns[3], i),
        })
        .collect())
}
