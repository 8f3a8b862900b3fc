use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::services::scoring;

/// Safety dimensions scored independently for every image.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Category {
    AdultContent,
    Violence,
    Weapons,
    Medical,
    SpoofFake,
}

/// Maps a business category to the model key used in the scorer's payload.
#[derive(Debug, Clone, Copy)]
pub struct CategoryMapping {
    pub category: Category,
    pub scorer_model: &'static str,
}

/// Fixed category table. New categories are added here and in [`Category`].
pub const CATEGORY_TABLE: [CategoryMapping; 5] = [
    CategoryMapping { category: Category::AdultContent, scorer_model: "nudity" },
    CategoryMapping { category: Category::Violence, scorer_model: "violence" },
    CategoryMapping { category: Category::Weapons, scorer_model: "weapon" },
    CategoryMapping { category: Category::Medical, scorer_model: "medical" },
    CategoryMapping { category: Category::SpoofFake, scorer_model: "spoof" },
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Display)]
pub enum SafetyStatus {
    Safe,
    Warning,
    Unsafe,
}

/// Score, status and optional explanation for one category.
///
/// Built through the constructors only, so a status is present exactly when a
/// score is, and always derived from it. Deserialization goes through the same
/// constructors and rejects a stored status that disagrees with its score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "CategoryResultRecord")]
pub struct CategoryResult {
    score: Option<f64>,
    status: Option<SafetyStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    explanation: Option<String>,
}

impl CategoryResult {
    pub fn scored(score: f64) -> Self {
        Self {
            score: Some(score),
            status: Some(scoring::status_of(score)),
            explanation: None,
        }
    }

    pub fn absent() -> Self {
        Self {
            score: None,
            status: None,
            explanation: None,
        }
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    pub fn score(&self) -> Option<f64> {
        self.score
    }

    pub fn status(&self) -> Option<SafetyStatus> {
        self.status
    }

    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }
}

/// Wire shape of [`CategoryResult`], checked before it becomes one.
#[derive(Deserialize)]
struct CategoryResultRecord {
    score: Option<f64>,
    status: Option<SafetyStatus>,
    #[serde(default)]
    explanation: Option<String>,
}

impl TryFrom<CategoryResultRecord> for CategoryResult {
    type Error = String;

    fn try_from(record: CategoryResultRecord) -> Result<Self, Self::Error> {
        let result = match record.score {
            Some(score) => CategoryResult::scored(score),
            None => CategoryResult::absent(),
        };
        if record.status != result.status {
            return Err(format!(
                "status {:?} does not match score {:?}",
                record.status, record.score
            ));
        }
        Ok(match record.explanation {
            Some(explanation) => result.with_explanation(explanation),
            None => result,
        })
    }
}

/// Moderation results for a single media item. Errors are item-scoped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaModerationResult {
    pub media_id: String,
    pub categories: BTreeMap<Category, CategoryResult>,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Aggregated visual safety report across all analyzed media.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisualSafetyReport {
    pub categories: BTreeMap<Category, CategoryResult>,
    pub overall_visual_score: Option<f64>,
}

impl VisualSafetyReport {
    pub fn statuses(&self) -> impl Iterator<Item = SafetyStatus> + '_ {
        self.categories.values().filter_map(CategoryResult::status)
    }
}
