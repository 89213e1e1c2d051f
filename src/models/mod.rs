pub mod catalog;
pub mod feed;
pub mod learning_path;
pub mod segment;
pub mod timestamp;
pub mod user;

pub use catalog::{Category, CategoryDetail, Channel, SearchHit, SearchQuery, SegmentListing};
pub use feed::FeedType;
pub use learning_path::{
    LearningPath, LearningPathDetail, Lesson, LessonCompletion, NextLessonSuggestion, PathStatus,
    SkillAssessment, SkillGapAnalysis, SuggestedSkill,
};
pub use segment::{ChannelRef, Segment, SegmentPreview, VideoRef};
pub use user::{
    AuthSession, Credentials, HistoryEntry, Interest, ProfileUpdate, Registration, SavedSegment,
    User, ViewRecord,
};

#[cfg(test)]
pub(crate) use segment::sample_segment;
