//! Response shapes as the backend sends them, and the one-time normalisation
//! into the canonical models.
//!
//! Different endpoints describe the same segment with different field names
//! (`title` vs `generated_title`, nested `video.youtube_id` vs flattened
//! `video_youtube_id`/`youtube_id`, ...). Everything is accepted here and
//! nothing past this module needs to know about it.

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use log::warn;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::{
    Category, Channel, ChannelRef, HistoryEntry, Interest, LearningPath, LearningPathDetail,
    Lesson, LessonCompletion, NextLessonSuggestion, SavedSegment, SearchHit, Segment,
    SegmentPreview, VideoRef,
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawVideo {
    pub youtube_id: Option<String>,
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawChannel {
    pub id: Option<String>,
    pub name: Option<String>,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSegment {
    pub id: Option<String>,
    pub title: Option<String>,
    pub generated_title: Option<String>,
    pub summary: Option<String>,
    pub summary_text: Option<String>,
    pub key_takeaways: Option<Vec<String>>,
    pub relevance_score: Option<f64>,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub view_count: Option<u64>,
    pub video: Option<RawVideo>,
    pub channel: Option<RawChannel>,
    pub categories: Vec<String>,
    pub youtube_id: Option<String>,
    pub video_youtube_id: Option<String>,
    pub thumbnail_url: Option<String>,
    pub video_thumbnail_url: Option<String>,
    pub channel_name: Option<String>,
    pub search_score: Option<f64>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl RawSegment {
    fn resolved_title(&self) -> Option<String> {
        non_empty(self.title.clone()).or_else(|| non_empty(self.generated_title.clone()))
    }

    fn resolved_summary(&self) -> Option<String> {
        non_empty(self.summary.clone()).or_else(|| non_empty(self.summary_text.clone()))
    }

    fn resolved_youtube_id(&self) -> Option<String> {
        self.video
            .as_ref()
            .and_then(|v| non_empty(v.youtube_id.clone()))
            .or_else(|| non_empty(self.video_youtube_id.clone()))
            .or_else(|| non_empty(self.youtube_id.clone()))
    }

    fn resolved_thumbnail(&self) -> Option<String> {
        self.video
            .as_ref()
            .and_then(|v| non_empty(v.thumbnail_url.clone()))
            .or_else(|| non_empty(self.video_thumbnail_url.clone()))
            .or_else(|| non_empty(self.thumbnail_url.clone()))
    }

    fn resolved_channel(&self) -> Option<ChannelRef> {
        match &self.channel {
            Some(channel) => Some(ChannelRef {
                id: non_empty(channel.id.clone()),
                name: non_empty(channel.name.clone())
                    .or_else(|| non_empty(self.channel_name.clone()))
                    .unwrap_or_else(|| "Unknown".to_string()),
                thumbnail_url: non_empty(channel.thumbnail_url.clone()),
            }),
            None => non_empty(self.channel_name.clone()).map(|name| ChannelRef {
                id: None,
                name,
                thumbnail_url: None,
            }),
        }
    }

    pub fn normalize(self) -> Result<Segment> {
        let id = non_empty(self.id.clone()).ok_or_else(|| anyhow!("segment without id"))?;
        let youtube_id = self
            .resolved_youtube_id()
            .ok_or_else(|| anyhow!("segment {id} has no video id"))?;
        let (start_time, end_time) = match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => (start, end),
            _ => bail!("segment {id} has no time range"),
        };
        if !(start_time >= 0.0 && end_time > start_time) {
            bail!("segment {id} has invalid time range {start_time}..{end_time}");
        }

        let title = self.resolved_title().unwrap_or_else(|| "Untitled".to_string());
        let summary = self.resolved_summary().unwrap_or_default();
        let thumbnail_url = self.resolved_thumbnail();
        let channel = self.resolved_channel();
        let video_title = self
            .video
            .as_ref()
            .and_then(|v| non_empty(v.title.clone()).or_else(|| non_empty(v.original_title.clone())));

        Ok(Segment {
            id,
            title,
            summary,
            key_takeaways: self.key_takeaways.unwrap_or_default(),
            start_time,
            end_time,
            relevance_score: self.relevance_score,
            view_count: self.view_count.unwrap_or(0),
            video: VideoRef {
                youtube_id,
                title: video_title,
                thumbnail_url,
            },
            channel,
            categories: self.categories,
            saved: false,
        })
    }

    pub fn preview(self) -> Result<SegmentPreview> {
        let id = non_empty(self.id.clone()).ok_or_else(|| anyhow!("segment without id"))?;
        Ok(SegmentPreview {
            title: self.resolved_title().unwrap_or_else(|| "Untitled".to_string()),
            summary: self.resolved_summary(),
            youtube_id: self.resolved_youtube_id(),
            thumbnail_url: self.resolved_thumbnail(),
            start_time: self.start_time,
            relevance_score: self.relevance_score,
            channel_name: self.resolved_channel().map(|c| c.name),
            id,
        })
    }
}

/// Normalises a list of wire segments, dropping (and logging) records that do
/// not describe a playable clip. Order is preserved.
pub fn normalize_segments(raw: Vec<RawSegment>, source: &str) -> Vec<Segment> {
    raw.into_iter()
        .filter_map(|segment| match segment.normalize() {
            Ok(segment) => Some(segment),
            Err(err) => {
                warn!("Dropping segment from {source}: {err}");
                None
            }
        })
        .collect()
}

fn normalize_previews(raw: Vec<RawSegment>, source: &str) -> Vec<SegmentPreview> {
    raw.into_iter()
        .filter_map(|segment| match segment.preview() {
            Ok(preview) => Some(preview),
            Err(err) => {
                warn!("Dropping segment preview from {source}: {err}");
                None
            }
        })
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct FeedEnvelope {
    #[serde(default)]
    pub results: Vec<RawSegment>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryDetailEnvelope {
    #[serde(flatten)]
    pub category: Category,
    #[serde(default)]
    pub top_segments: Vec<RawSegment>,
}

impl CategoryDetailEnvelope {
    pub fn into_top_segments(self, source: &str) -> (Category, Vec<SegmentPreview>) {
        (self.category, normalize_previews(self.top_segments, source))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Pagination {
    pub total: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct CategorySegmentsEnvelope {
    pub category: Category,
    #[serde(default)]
    pub segments: Vec<RawSegment>,
    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize)]
pub struct ChannelSegmentsEnvelope {
    pub channel: Channel,
    #[serde(default)]
    pub segments: Vec<RawSegment>,
    pub total: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct SearchEnvelope {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub results: Vec<RawSegment>,
}

impl SearchEnvelope {
    pub fn into_hits(self, source: &str) -> Vec<SearchHit> {
        self.results
            .into_iter()
            .filter_map(|raw| {
                let score = raw.search_score;
                match raw.normalize() {
                    Ok(segment) => Some(SearchHit {
                        segment,
                        search_score: score,
                    }),
                    Err(err) => {
                        warn!("Dropping search hit from {source}: {err}");
                        None
                    }
                }
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct SuggestionsEnvelope {
    #[serde(default)]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawSaved {
    pub segment: RawSegment,
    #[serde(default, deserialize_with = "crate::models::timestamp::optional")]
    pub saved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct SavedEnvelope {
    #[serde(default)]
    pub saved: Vec<RawSaved>,
}

impl SavedEnvelope {
    pub fn into_saved(self, source: &str) -> Vec<SavedSegment> {
        self.saved
            .into_iter()
            .filter_map(|entry| match entry.segment.normalize() {
                Ok(mut segment) => {
                    segment.saved = true;
                    Some(SavedSegment {
                        segment,
                        saved_at: entry.saved_at,
                    })
                }
                Err(err) => {
                    warn!("Dropping saved segment from {source}: {err}");
                    None
                }
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct RawHistory {
    pub id: String,
    pub segment: RawSegment,
    #[serde(default, deserialize_with = "crate::models::timestamp::optional")]
    pub watched_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub watch_duration: Option<u64>,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Deserialize)]
pub struct HistoryEnvelope {
    #[serde(default)]
    pub history: Vec<RawHistory>,
}

impl HistoryEnvelope {
    pub fn into_entries(self, source: &str) -> Vec<HistoryEntry> {
        self.history
            .into_iter()
            .filter_map(|entry| match entry.segment.preview() {
                Ok(segment) => Some(HistoryEntry {
                    id: entry.id,
                    segment,
                    watched_at: entry.watched_at,
                    watch_duration_secs: entry.watch_duration.unwrap_or(0),
                    completed: entry.completed,
                }),
                Err(err) => {
                    warn!("Dropping history entry from {source}: {err}");
                    None
                }
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct InterestsEnvelope {
    #[serde(default)]
    pub interests: Vec<Interest>,
}

#[derive(Debug, Deserialize)]
pub struct StatusEnvelope {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct LearningPathListEnvelope {
    #[serde(default)]
    pub paths: Vec<LearningPath>,
}

#[derive(Debug, Deserialize)]
pub struct RawLesson {
    pub id: Uuid,
    pub order: u32,
    pub title: String,
    pub description: Option<String>,
    pub learning_objective: Option<String>,
    pub context_notes: Option<String>,
    #[serde(default)]
    pub key_concepts: Option<Vec<String>>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default, deserialize_with = "crate::models::timestamp::optional")]
    pub completed_at: Option<DateTime<Utc>>,
    pub segment: Option<RawSegment>,
}

impl RawLesson {
    pub fn into_lesson(self) -> Lesson {
        let segment = self.segment.and_then(|raw| match raw.normalize() {
            Ok(segment) => Some(segment),
            Err(err) => {
                warn!("Lesson {} has an unplayable segment: {err}", self.id);
                None
            }
        });

        Lesson {
            id: self.id,
            order: self.order,
            title: self.title,
            description: self.description,
            learning_objective: self.learning_objective,
            context_notes: self.context_notes,
            key_concepts: self.key_concepts.unwrap_or_default(),
            is_completed: self.is_completed,
            is_locked: self.is_locked,
            completed_at: self.completed_at,
            segment,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RawPathDetail {
    #[serde(flatten)]
    pub path: LearningPath,
    #[serde(default)]
    pub lessons: Vec<RawLesson>,
}

impl From<RawPathDetail> for LearningPathDetail {
    fn from(raw: RawPathDetail) -> Self {
        let mut lessons: Vec<Lesson> = raw.lessons.into_iter().map(RawLesson::into_lesson).collect();
        lessons.sort_by_key(|lesson| lesson.order);
        LearningPathDetail {
            path: raw.path,
            lessons,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RawLessonCompletion {
    pub lesson: RawLesson,
    pub next_suggestion: Option<NextLessonSuggestion>,
    #[serde(default)]
    pub path_completed: bool,
}

impl From<RawLessonCompletion> for LessonCompletion {
    fn from(raw: RawLessonCompletion) -> Self {
        LessonCompletion {
            lesson: raw.lesson.into_lesson(),
            next_suggestion: raw.next_suggestion,
            path_completed: raw.path_completed,
        }
    }
}
