use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::models::moderation::{CategoryResult, MediaModerationResult, CATEGORY_TABLE};
use crate::models::request::MediaItem;
use crate::services::scoring;
use crate::services::sightengine::ModerationScorer;

/// Analyze one media item.
///
/// Never fails: a scorer failure becomes one item-level error with no
/// categories, and a malformed category becomes an absent result plus a
/// `"<category>: <cause>"` error while the other categories are still scored.
pub async fn process_media(scorer: &dyn ModerationScorer, media: &MediaItem) -> MediaModerationResult {
    let mut categories = BTreeMap::new();
    let mut errors = Vec::new();

    match scorer.analyze_image(&media.url).await {
        Ok(payload) => {
            for mapping in CATEGORY_TABLE {
                let scored = scoring::extract_signals(&payload, mapping.scorer_model)
                    .and_then(|signals| scoring::category_score(&signals));

                match scored {
                    Ok(score) => {
                        categories.insert(mapping.category, CategoryResult::scored(score));
                    }
                    Err(e) => {
                        warn!(
                            media_id = %media.media_id,
                            category = %mapping.category,
                            error = %e,
                            "Category could not be scored"
                        );
                        categories.insert(mapping.category, CategoryResult::absent());
                        errors.push(format!("{}: {}", mapping.category, e));
                    }
                }
            }
            metrics::counter!("content_analysis_media_processed_total", "outcome" => "scored")
                .increment(1);
        }
        Err(e) => {
            warn!(media_id = %media.media_id, error = %e, "Moderation scorer call failed");
            errors.push(e.to_string());
            metrics::counter!("content_analysis_media_processed_total", "outcome" => "failed")
                .increment(1);
        }
    }

    debug!(
        media_id = %media.media_id,
        categories = categories.len(),
        errors = errors.len(),
        "Media item processed"
    );

    MediaModerationResult {
        media_id: media.media_id.clone(),
        categories,
        errors,
    }
}
