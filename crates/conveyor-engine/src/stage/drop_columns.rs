//! Column-removal transform.

use std::collections::HashSet;

use conveyor_types::error::StageError;
use conveyor_types::params::StageParams;

use super::Transformer;
use crate::dataset::Dataset;

/// Removes the named columns, preserving the order of the rest.
///
/// Params: `columns` (required), a column name or list of names. Naming a
/// column the dataset does not have is a data error.
#[derive(Debug, Clone, Copy, Default)]
pub struct DropColumns;

fn requested_columns(params: &StageParams) -> Result<Vec<String>, StageError> {
    params
        .optional_str_list("columns")?
        .ok_or_else(|| StageError::missing_param("columns"))
}

impl Transformer for DropColumns {
    fn name(&self) -> &'static str {
        "drop_columns"
    }

    fn validate(&self, params: &StageParams) -> Result<(), StageError> {
        requested_columns(params).map(|_| ())
    }

    fn transform(&self, data: Dataset, params: &StageParams) -> Result<Dataset, StageError> {
        let to_drop = requested_columns(params)?;
        let schema = data.schema();

        let missing: Vec<&str> = to_drop
            .iter()
            .filter(|name| schema.index_of(name).is_err())
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(StageError::data(
                "COLUMN_NOT_FOUND",
                format!("column(s) not found: {}", missing.join(", ")),
            )
            .with_details(serde_json::json!({ "available": data.column_names() })));
        }

        let to_drop: HashSet<&str> = to_drop.iter().map(String::as_str).collect();
        let keep: Vec<usize> = schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(_, field)| !to_drop.contains(field.name().as_str()))
            .map(|(idx, _)| idx)
            .collect();

        tracing::info!(
            dropped = to_drop.len(),
            remaining = keep.len(),
            "Dropping columns"
        );
        data.project(&keep)
    }
}
