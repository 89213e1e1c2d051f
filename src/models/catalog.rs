use serde::{Deserialize, Serialize};

use super::{Segment, SegmentPreview};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    #[serde(default)]
    pub segment_count: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryDetail {
    pub category: Category,
    pub top_segments: Vec<SegmentPreview>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Channel {
    pub id: String,
    pub youtube_channel_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub custom_url: Option<String>,
    pub subscriber_count: Option<String>,
    #[serde(default)]
    pub segment_count: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub segment: Segment,
    pub search_score: Option<f64>,
}

/// Query for the hybrid search endpoint. `page`/`limit` follow the same
/// conventions as every other paged call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub category: Option<String>,
    pub min_relevance: Option<u8>,
    pub page: u32,
    pub limit: u32,
}

/// Filters for the public segment listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentListing {
    pub page: u32,
    pub limit: u32,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub min_relevance: Option<u8>,
}

impl SearchQuery {
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            category: None,
            min_relevance: None,
            page: 1,
            limit: 20,
        }
    }
}
