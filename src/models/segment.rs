use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoRef {
    pub youtube_id: String,
    pub title: Option<String>,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelRef {
    pub id: Option<String>,
    pub name: String,
    pub thumbnail_url: Option<String>,
}

/// A bounded clip inside a source video, in the single shape the rest of the
/// client works with. Built from wire records by `api::wire::RawSegment`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub key_takeaways: Vec<String>,
    pub start_time: f64,
    pub end_time: f64,
    pub relevance_score: Option<f64>,
    pub view_count: u64,
    pub video: VideoRef,
    pub channel: Option<ChannelRef>,
    pub categories: Vec<String>,
    pub saved: bool,
}

impl Segment {
    pub fn youtube_id(&self) -> &str {
        &self.video.youtube_id
    }

    pub fn duration_secs(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Link to the clip on YouTube, starting at the segment offset.
    pub fn watch_url(&self) -> String {
        format!(
            "https://www.youtube.com/watch?v={}&t={}s",
            self.video.youtube_id,
            self.start_time.floor() as u64
        )
    }

    pub fn thumbnail_url(&self) -> String {
        self.video.thumbnail_url.clone().unwrap_or_else(|| {
            format!(
                "https://i.ytimg.com/vi/{}/hqdefault.jpg",
                self.video.youtube_id
            )
        })
    }
}

/// Reduced segment record returned by listing endpoints that do not carry
/// the full clip (category highlights, watch history).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SegmentPreview {
    pub id: String,
    pub title: String,
    pub summary: Option<String>,
    pub youtube_id: Option<String>,
    pub thumbnail_url: Option<String>,
    pub start_time: Option<f64>,
    pub relevance_score: Option<f64>,
    pub channel_name: Option<String>,
}

#[cfg(test)]
pub(crate) fn sample_segment(id: &str, start: f64, end: f64) -> Segment {
    Segment {
        id: id.to_string(),
        title: format!("Segment {id}"),
        summary: String::new(),
        key_takeaways: Vec::new(),
        start_time: start,
        end_time: end,
        relevance_score: None,
        view_count: 0,
        video: VideoRef {
            youtube_id: format!("yt-{id}"),
            title: None,
            thumbnail_url: None,
        },
        channel: None,
        categories: Vec::new(),
        saved: false,
    }
}
