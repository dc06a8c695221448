//! In-flight tabular data passed between pipeline stages.

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use conveyor_types::error::StageError;

/// A schema plus the record batches that conform to it.
///
/// This is the data handle a [`PipelineRun`](crate::run::PipelineRun) owns
/// between stages. Transforms take it by value and hand back a new one.
#[derive(Debug, Clone)]
pub struct Dataset {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl Dataset {
    /// # Errors
    ///
    /// Returns a schema error if any batch disagrees with `schema`.
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Result<Self, StageError> {
        if let Some(pos) = batches.iter().position(|b| b.schema() != schema) {
            return Err(StageError::schema(
                "SCHEMA_MISMATCH",
                format!("batch {pos} does not match the dataset schema"),
            ));
        }
        Ok(Self { schema, batches })
    }

    #[must_use]
    pub fn empty(schema: SchemaRef) -> Self {
        Self {
            schema,
            batches: Vec::new(),
        }
    }

    #[must_use]
    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    #[must_use]
    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    #[must_use]
    pub fn into_batches(self) -> Vec<RecordBatch> {
        self.batches
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.schema.fields().len()
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.schema
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// Keep only the columns at `indices`, in that order.
    ///
    /// # Errors
    ///
    /// Returns a schema error if an index is out of range.
    pub fn project(&self, indices: &[usize]) -> Result<Self, StageError> {
        let schema = self
            .schema
            .project(indices)
            .map_err(|e| StageError::schema("PROJECTION_FAILED", e.to_string()))?;
        let batches = self
            .batches
            .iter()
            .map(|b| b.project(indices))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StageError::schema("PROJECTION_FAILED", e.to_string()))?;
        Ok(Self {
            schema: std::sync::Arc::new(schema),
            batches,
        })
    }
}
