use std::collections::BTreeMap;

use crate::models::job::JobStatus;
use crate::models::moderation::{
    Category, CategoryResult, MediaModerationResult, SafetyStatus, VisualSafetyReport, CATEGORY_TABLE,
};
use crate::services::scoring::{self, SAFE_THRESHOLD};

pub const NO_DATA_EXPLANATION: &str = "No valid data available";

pub const SPOOF_REVIEW_EXPLANATION: &str =
    "Potential spoof or manipulated content detected. Manual review recommended.";

/// Combine per-media results into one report.
///
/// Each category's score is the mean of the present per-media scores. The
/// overall score is the mean of the present aggregated category scores.
pub fn aggregate(results: &[MediaModerationResult]) -> VisualSafetyReport {
    let mut categories = BTreeMap::new();

    for mapping in CATEGORY_TABLE {
        let scores: Vec<f64> = results
            .iter()
            .filter_map(|media| media.categories.get(&mapping.category))
            .filter_map(|result| result.score())
            .collect();

        categories.insert(mapping.category, aggregate_category(mapping.category, &scores));
    }

    let present: Vec<f64> = categories.values().filter_map(|result| result.score()).collect();

    VisualSafetyReport {
        categories,
        overall_visual_score: mean(&present),
    }
}

fn aggregate_category(category: Category, scores: &[f64]) -> CategoryResult {
    let Some(avg) = mean(scores) else {
        return CategoryResult::absent().with_explanation(NO_DATA_EXPLANATION);
    };

    let result = CategoryResult::scored(avg);
    if category == Category::SpoofFake && avg < SAFE_THRESHOLD {
        result.with_explanation(SPOOF_REVIEW_EXPLANATION)
    } else {
        result
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(scoring::round2(values.iter().sum::<f64>() / values.len() as f64))
}

/// Terminal job status implied by a report.
///
/// Any Unsafe category fails the job; otherwise any Warning yields
/// COMPLETED_WITH_WARNINGS.
pub fn terminal_status(report: &VisualSafetyReport) -> JobStatus {
    let statuses: Vec<SafetyStatus> = report.statuses().collect();

    if statuses.contains(&SafetyStatus::Unsafe) {
        JobStatus::Failed
    } else if statuses.contains(&SafetyStatus::Warning) {
        JobStatus::CompletedWithWarnings
    } else {
        JobStatus::Completed
    }
}
