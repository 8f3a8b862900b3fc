//! Request and scorer-payload fixtures shared by the integration tests

use content_analysis_hw::models::request::{ContentAnalysisRequest, MediaItem, MediaKind, PostItem};
use serde_json::{json, Value};

pub const CAMPAIGN_ID: &str = "cmp_456";
pub const CREATOR_ID: &str = "tiktok_creator";

/// URL the scripted scorer keys on for a media id.
pub fn media_url(media_id: &str) -> String {
    format!("https://cdn.example.com/media/{media_id}.jpg")
}

pub fn image(media_id: &str) -> MediaItem {
    MediaItem {
        media_id: media_id.to_string(),
        kind: MediaKind::Image,
        url: media_url(media_id),
    }
}

pub fn video(media_id: &str) -> MediaItem {
    MediaItem {
        media_id: media_id.to_string(),
        kind: MediaKind::Video,
        url: format!("https://cdn.example.com/media/{media_id}.mp4"),
    }
}

/// A request with one post per entry in `posts`.
pub fn request(posts: Vec<Vec<MediaItem>>) -> ContentAnalysisRequest {
    ContentAnalysisRequest {
        campaign_id: CAMPAIGN_ID.to_string(),
        creator_id: CREATOR_ID.to_string(),
        posts: posts
            .into_iter()
            .enumerate()
            .map(|(i, media)| PostItem {
                post_id: format!("post_{i}"),
                media,
            })
            .collect(),
    }
}

/// Scorer payload with the same risk for every sub-signal.
pub fn uniform_payload(risk: f64) -> Value {
    json!({
        "status": "success",
        "nudity": {"sexual_activity": risk, "suggestive": risk / 2.0},
        "violence": {"violence": risk},
        "weapon": {"firearm": risk, "knife": 0.0},
        "medical": {"gore": risk},
        "spoof": {"fake": risk},
    })
}

/// Low-risk payload except for the spoof model.
pub fn spoofed_payload(base_risk: f64, spoof_risk: f64) -> Value {
    let mut payload = uniform_payload(base_risk);
    payload["spoof"] = json!({"fake": spoof_risk});
    payload
}
