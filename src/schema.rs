use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};

pub const DOI: &str = "doi";
pub const FUNDING: &str = "funding";
pub const PMID: &str = "pmid";
pub const PMCID: &str = "pmcid";
pub const GRID_ID: &str = "grid_id";

/// Columns pruned out of every partition read.
pub const INPUT_COLUMNS: [&str; 4] = [DOI, FUNDING, PMID, PMCID];

/// Column order of the extracted table.
pub const OUTPUT_COLUMNS: [&str; 4] = [DOI, GRID_ID, PMID, PMCID];

pub fn flattened_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(DOI, DataType::Utf8, true),
        Field::new(PMID, DataType::Utf8, true),
        Field::new(PMCID, DataType::Utf8, true),
        Field::new(GRID_ID, DataType::Utf8, true),
    ]))
}

pub fn output_schema() -> SchemaRef {
    Arc::new(Schema::new(
        OUTPUT_COLUMNS
            .iter()
            .map(|name| Field::new(*name, DataType::Utf8, true))
            .collect::<Vec<_>>(),
    ))
}
