//! Per-batch summary for external display: how many faces, and how the
//! first face's expressions rank.

use serde::Serialize;

use crate::detection::domain::detection::DetectionBatch;
use crate::detection::domain::expression::Expression;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AggregateStats {
    pub face_count: usize,
    pub dominant_expression: Option<Expression>,
    /// First face's expressions, most likely first.
    pub expression_ranking: Vec<(Expression, f32)>,
}

/// Summarize a batch. Only the first detection contributes expressions.
pub fn aggregate(batch: &DetectionBatch) -> AggregateStats {
    let expression_ranking = batch
        .first()
        .map(|d| d.expressions.ranked())
        .unwrap_or_default();
    AggregateStats {
        face_count: batch.len(),
        dominant_expression: expression_ranking.first().map(|(e, _)| *e),
        expression_ranking,
    }
}
