use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Segment;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PathStatus {
    Draft,
    Active,
    Paused,
    Completed,
}

impl PathStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathStatus::Draft => "draft",
            PathStatus::Active => "active",
            PathStatus::Paused => "paused",
            PathStatus::Completed => "completed",
        }
    }
}

impl Default for PathStatus {
    fn default() -> Self {
        PathStatus::Draft
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkillGapAnalysis {
    pub current_level: String,
    pub target_level: String,
    pub gap_description: String,
    #[serde(default)]
    pub key_areas_to_improve: Vec<String>,
    pub estimated_learning_hours: f64,
    pub recommended_approach: String,
}

/// What the user wants to learn; sent both to create a path and to preview
/// the skill-gap analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillAssessment {
    pub target_skill: String,
    pub current_level: String,
    pub target_level: String,
    #[serde(default)]
    pub goals: Vec<String>,
    pub time_commitment_hours: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningPath {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub target_skill: String,
    pub current_level: Option<String>,
    pub target_level: Option<String>,
    /// Stored free-form by the backend; the typed form is only returned by
    /// the analyze endpoint.
    pub skill_gap_analysis: Option<serde_json::Value>,
    #[serde(default)]
    pub learning_objectives: Option<Vec<String>>,
    pub estimated_hours: Option<f64>,
    #[serde(default)]
    pub status: PathStatus,
    #[serde(default)]
    pub progress_percentage: f64,
    #[serde(default)]
    pub completed_lessons: u32,
    #[serde(default)]
    pub total_lessons: u32,
    #[serde(default, deserialize_with = "crate::models::timestamp::optional")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "crate::models::timestamp::optional")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "crate::models::timestamp::optional")]
    pub last_activity_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "crate::models::timestamp::optional")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Lesson {
    pub id: Uuid,
    pub order: u32,
    pub title: String,
    pub description: Option<String>,
    pub learning_objective: Option<String>,
    pub context_notes: Option<String>,
    pub key_concepts: Vec<String>,
    pub is_completed: bool,
    pub is_locked: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub segment: Option<Segment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LearningPathDetail {
    pub path: LearningPath,
    pub lessons: Vec<Lesson>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NextLessonSuggestion {
    pub segment_id: String,
    pub reason: String,
    pub relevance_score: f64,
    pub connects_to_previous: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LessonCompletion {
    pub lesson: Lesson,
    pub next_suggestion: Option<NextLessonSuggestion>,
    pub path_completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuggestedSkill {
    pub skill: String,
    pub category_id: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    #[serde(default)]
    pub available_lessons: u32,
    #[serde(default)]
    pub is_interest: bool,
}
