use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::Display;

/// Kind of a media item attached to a post.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MediaKind {
    Image,
    /// Accepted but not analyzed until frame extraction exists.
    Video,
}

/// Single media unit belonging to a post.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct MediaItem {
    #[garde(length(min = 1, max = 200))]
    pub media_id: String,

    #[serde(rename = "type")]
    #[garde(skip)]
    pub kind: MediaKind,

    #[garde(url, custom(http_scheme))]
    pub url: String,
}

/// Social media post containing one or more media items.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct PostItem {
    #[garde(length(min = 1, max = 200))]
    pub post_id: String,

    #[garde(length(min = 1), dive)]
    pub media: Vec<MediaItem>,
}

/// Payload submitted to start a content analysis job.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ContentAnalysisRequest {
    #[garde(length(min = 1, max = 200))]
    pub campaign_id: String,

    #[garde(length(min = 1, max = 200))]
    pub creator_id: String,

    #[garde(length(min = 1), dive)]
    pub posts: Vec<PostItem>,
}

impl ContentAnalysisRequest {
    /// Image items across all posts, in submission order.
    pub fn image_items(&self) -> impl Iterator<Item = &MediaItem> {
        self.posts
            .iter()
            .flat_map(|post| post.media.iter())
            .filter(|media| media.kind == MediaKind::Image)
    }
}

fn http_scheme(value: &str, _ctx: &()) -> garde::Result {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(garde::Error::new("media url must use http or https"))
    }
}
