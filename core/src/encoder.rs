//! Category encoder: one-hot indicator blocks for nominal columns,
//! numeric columns passed through unchanged.
//!
//! Output layout (stable): one block per designated categorical column,
//! in schema order, each block's categories sorted; then every numeric
//! feature in schema order. A category not seen at fit time encodes as
//! an all-zero block, and so does a missing category.

use crate::{
    error::{PipelineError, PipelineResult},
    features::{FeatureFrame, FeatureRecord},
    matrix::Matrix,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBlock {
    pub column:     String,
    /// Position of the column in `FeatureRecord::categorical`.
    pub position:   usize,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEncoder {
    blocks:      Vec<CategoryBlock>,
    passthrough: Vec<String>,
    output:      Vec<String>,
}

impl CategoryEncoder {
    /// Fit on `frame`, expanding each column in `designated`.
    ///
    /// Every categorical feature of the frame must be designated: a raw
    /// string is never allowed to reach the numeric model input.
    pub fn fit(frame: &FeatureFrame, designated: &[String]) -> PipelineResult<Self> {
        if frame.is_empty() {
            return Err(PipelineError::Config(
                "cannot fit category encoder on an empty frame".into(),
            ));
        }
        if designated.is_empty() {
            return Err(PipelineError::Config(
                "category encoder needs at least one designated column".into(),
            ));
        }

        let categorical = frame.schema.categorical_features();
        for name in designated {
            if !categorical.contains(&name.as_str()) {
                return Err(PipelineError::Config(format!(
                    "designated categorical column '{name}' is not a categorical feature of the frame"
                )));
            }
        }
        if let Some(undesignated) = categorical.iter().find(|c| !designated.iter().any(|d| d == *c)) {
            return Err(PipelineError::Config(format!(
                "categorical column '{undesignated}' is not designated for encoding"
            )));
        }

        let blocks: Vec<CategoryBlock> = categorical.iter()
            .enumerate()
            .map(|(position, column)| {
                let seen: BTreeSet<&str> = frame.records.iter()
                    .filter_map(|r| r.categorical[position].as_deref())
                    .collect();
                CategoryBlock {
                    column: column.to_string(),
                    position,
                    categories: seen.into_iter().map(str::to_string).collect(),
                }
            })
            .collect();

        for block in &blocks {
            if block.categories.is_empty() {
                log::warn!(
                    "encode: column '{}' has no observed categories; it will always encode as zeros",
                    block.column
                );
            }
        }

        let passthrough: Vec<String> = frame.schema.numeric_features()
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut output = Vec::new();
        for block in &blocks {
            output.extend(block.categories.iter().map(|c| format!("{}={}", block.column, c)));
        }
        output.extend(passthrough.iter().cloned());

        log::debug!(
            "encode: fitted {} categorical block(s), {} passthrough column(s), width={}",
            blocks.len(), passthrough.len(), output.len()
        );

        Ok(Self { blocks, passthrough, output })
    }

    /// Names of the encoded columns, in output order.
    pub fn feature_names(&self) -> &[String] {
        &self.output
    }

    pub fn width(&self) -> usize {
        self.output.len()
    }

    /// Blocks sit at positions 0..n in order with strictly ascending
    /// categories, and the output names are exactly the block indicators
    /// followed by the passthrough columns.
    pub(crate) fn is_consistent(&self) -> bool {
        let layout_ok = self.blocks.iter().enumerate().all(|(i, block)| {
            block.position == i && block.categories.windows(2).all(|w| w[0] < w[1])
        });
        let expected = self.blocks.iter()
            .flat_map(|b| b.categories.iter().map(move |c| format!("{}={}", b.column, c)))
            .chain(self.passthrough.iter().cloned());
        layout_ok && expected.eq(self.output.iter().cloned())
    }

    /// Encode a whole frame. The frame must carry the columns this
    /// encoder was fitted on, in the same positions.
    pub fn transform(&self, frame: &FeatureFrame) -> PipelineResult<Matrix> {
        self.check_layout(frame)?;
        let mut m = Matrix::with_cols(self.width());
        let mut buf = Vec::with_capacity(self.width());
        for record in &frame.records {
            self.encode_into(record, &mut buf);
            m.push_row(&buf);
        }
        Ok(m)
    }

    /// Encode one record. Deterministic: same record, same vector.
    pub fn transform_record(&self, record: &FeatureRecord) -> Vec<f64> {
        let mut buf = Vec::with_capacity(self.width());
        self.encode_into(record, &mut buf);
        buf
    }

    fn encode_into(&self, record: &FeatureRecord, buf: &mut Vec<f64>) {
        buf.clear();
        for block in &self.blocks {
            let value = record.categorical.get(block.position).and_then(|v| v.as_deref());
            let hit = value.and_then(|v| block.categories.binary_search_by(|c| c.as_str().cmp(v)).ok());
            buf.extend((0..block.categories.len()).map(|i| if Some(i) == hit { 1.0 } else { 0.0 }));
        }
        buf.extend_from_slice(&record.numeric);
    }

    fn check_layout(&self, frame: &FeatureFrame) -> PipelineResult<()> {
        let categorical = frame.schema.categorical_features();
        for block in &self.blocks {
            if categorical.get(block.position) != Some(&block.column.as_str()) {
                return Err(PipelineError::SchemaMismatch(format!(
                    "encoder expects categorical column '{}' at position {}",
                    block.column, block.position
                )));
            }
        }
        if categorical.len() != self.blocks.len() {
            return Err(PipelineError::SchemaMismatch(format!(
                "encoder was fitted on {} categorical column(s), frame has {}",
                self.blocks.len(), categorical.len()
            )));
        }
        let numeric = frame.schema.numeric_features();
        if numeric != self.passthrough.iter().map(String::as_str).collect::<Vec<_>>() {
            return Err(PipelineError::SchemaMismatch(format!(
                "encoder passthrough columns {:?} differ from frame numeric columns {:?}",
                self.passthrough, numeric
            )));
        }
        Ok(())
    }
}
