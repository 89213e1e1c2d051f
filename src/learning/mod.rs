#[cfg(feature = "desktop")]
pub mod commands;

use std::future::Future;

use chrono::Utc;
use log::info;
use serde::Serialize;
use uuid::Uuid;

use crate::api::{ApiClient, ApiError};
use crate::models::{
    LearningPath, LearningPathDetail, Lesson, LessonCompletion, NextLessonSuggestion, PathStatus,
};

/// Calls a learning path session makes against the backend.
pub trait LearningBackend: Send + Sync {
    fn complete_lesson(
        &self,
        path_id: Uuid,
        lesson_id: Uuid,
    ) -> impl Future<Output = Result<LessonCompletion, ApiError>> + Send;

    fn update_path_status(
        &self,
        path_id: Uuid,
        status: PathStatus,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}

impl LearningBackend for ApiClient {
    async fn complete_lesson(
        &self,
        path_id: Uuid,
        lesson_id: Uuid,
    ) -> Result<LessonCompletion, ApiError> {
        ApiClient::complete_lesson(self, path_id, lesson_id).await
    }

    async fn update_path_status(&self, path_id: Uuid, status: PathStatus) -> Result<(), ApiError> {
        ApiClient::update_path_status(self, path_id, status).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PathProgress {
    pub completed: u32,
    pub total: u32,
    pub percentage: f64,
}

/// One learning path as the path page sees it. Progress is derived from the
/// lesson list rather than trusted from the server counters.
#[derive(Debug, Clone, Serialize)]
pub struct LearningPathSession {
    detail: LearningPathDetail,
    next_suggestion: Option<NextLessonSuggestion>,
}

impl LearningPathSession {
    pub fn new(mut detail: LearningPathDetail) -> Self {
        detail.lessons.sort_by_key(|lesson| lesson.order);
        let mut session = Self {
            detail,
            next_suggestion: None,
        };
        session.recompute_progress();
        session
    }

    pub async fn open(api: &ApiClient, path_id: Uuid) -> Result<Self, ApiError> {
        Ok(Self::new(api.learning_path(path_id).await?))
    }

    pub fn path(&self) -> &LearningPath {
        &self.detail.path
    }

    pub fn lessons(&self) -> &[Lesson] {
        &self.detail.lessons
    }

    pub fn next_suggestion(&self) -> Option<&NextLessonSuggestion> {
        self.next_suggestion.as_ref()
    }

    /// First lesson that is unlocked and not yet done.
    pub fn current_lesson(&self) -> Option<&Lesson> {
        self.detail
            .lessons
            .iter()
            .find(|lesson| !lesson.is_locked && !lesson.is_completed)
    }

    pub fn progress(&self) -> PathProgress {
        PathProgress {
            completed: self.detail.path.completed_lessons,
            total: self.detail.path.total_lessons,
            percentage: self.detail.path.progress_percentage,
        }
    }

    pub async fn complete_lesson<B: LearningBackend>(
        &mut self,
        backend: &B,
        lesson_id: Uuid,
    ) -> Result<LessonCompletion, ApiError> {
        let lesson = self
            .detail
            .lessons
            .iter()
            .find(|lesson| lesson.id == lesson_id)
            .ok_or_else(|| {
                ApiError::InvalidRequest(format!("lesson {lesson_id} is not part of this path"))
            })?;
        if lesson.is_locked {
            return Err(ApiError::InvalidRequest(format!("lesson {lesson_id} is locked")));
        }
        if lesson.is_completed {
            return Err(ApiError::InvalidRequest(format!(
                "lesson {lesson_id} is already completed"
            )));
        }

        let completion = backend.complete_lesson(self.detail.path.id, lesson_id).await?;
        self.apply_completion(&completion);
        Ok(completion)
    }

    pub fn apply_completion(&mut self, completion: &LessonCompletion) {
        let now = Utc::now();
        let mut updated = completion.lesson.clone();
        updated.is_completed = true;
        updated.is_locked = false;
        updated.completed_at.get_or_insert(now);

        let lessons = &mut self.detail.lessons;
        match lessons.iter_mut().find(|lesson| lesson.id == updated.id) {
            Some(existing) => {
                if updated.segment.is_none() {
                    updated.segment = existing.segment.take();
                }
                *existing = updated.clone();
            }
            None => {
                lessons.push(updated.clone());
                lessons.sort_by_key(|lesson| lesson.order);
            }
        }
        let next_order = updated.order.checked_add(1);
        if let Some(next) = lessons
            .iter_mut()
            .find(|lesson| Some(lesson.order) == next_order)
        {
            next.is_locked = false;
        }

        self.next_suggestion = completion.next_suggestion.clone();
        self.recompute_progress();

        let path = &mut self.detail.path;
        path.last_activity_at = Some(now);
        let all_done = path.total_lessons > 0 && path.completed_lessons >= path.total_lessons;
        if completion.path_completed || all_done {
            info!("Learning path {} completed", path.id);
            path.status = PathStatus::Completed;
            path.completed_at.get_or_insert(now);
            self.next_suggestion = None;
        }
    }

    /// Pauses or resumes the path. Completed paths keep their status.
    pub async fn set_status<B: LearningBackend>(
        &mut self,
        backend: &B,
        status: PathStatus,
    ) -> Result<(), ApiError> {
        if self.detail.path.status == PathStatus::Completed {
            return Err(ApiError::InvalidRequest(
                "cannot change the status of a completed path".into(),
            ));
        }
        if !matches!(status, PathStatus::Active | PathStatus::Paused) {
            return Err(ApiError::InvalidRequest(format!(
                "status must be active or paused, not {}",
                status.as_str()
            )));
        }

        backend.update_path_status(self.detail.path.id, status).await?;
        let path = &mut self.detail.path;
        path.status = status;
        if status == PathStatus::Active {
            path.started_at.get_or_insert_with(Utc::now);
        }
        Ok(())
    }

    fn recompute_progress(&mut self) {
        let lessons = &self.detail.lessons;
        if lessons.is_empty() {
            return;
        }
        let total = lessons.len() as u32;
        let completed = lessons.iter().filter(|lesson| lesson.is_completed).count() as u32;
        let path = &mut self.detail.path;
        path.total_lessons = total;
        path.completed_lessons = completed;
        path.progress_percentage = f64::from(completed) / f64::from(total) * 100.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeBackend {
        path_completed: bool,
        statuses: Mutex<Vec<PathStatus>>,
    }

    impl LearningBackend for FakeBackend {
        async fn complete_lesson(
            &self,
            _path_id: Uuid,
            lesson_id: Uuid,
        ) -> Result<LessonCompletion, ApiError> {
            Ok(LessonCompletion {
                lesson: lesson(lesson_id, 0, false, true),
                next_suggestion: (!self.path_completed).then(|| NextLessonSuggestion {
                    segment_id: "seg-next".into(),
                    reason: "builds on framing".into(),
                    relevance_score: 0.9,
                    connects_to_previous: "same negotiation".into(),
                }),
                path_completed: self.path_completed,
            })
        }

        async fn update_path_status(&self, _path_id: Uuid, status: PathStatus) -> Result<(), ApiError> {
            self.statuses.lock().unwrap().push(status);
            Ok(())
        }
    }

    fn lesson(id: Uuid, order: u32, locked: bool, completed: bool) -> Lesson {
        Lesson {
            id,
            order,
            title: format!("Lesson {order}"),
            description: None,
            learning_objective: None,
            context_notes: None,
            key_concepts: Vec::new(),
            is_completed: completed,
            is_locked: locked,
            completed_at: None,
            segment: None,
        }
    }

    fn path_with(lessons: Vec<Lesson>) -> LearningPathDetail {
        let path: LearningPath = serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4(),
            "title": "Negotiation",
            "description": null,
            "target_skill": "negotiation",
            "current_level": "beginner",
            "target_level": "intermediate",
            "skill_gap_analysis": null,
            "estimated_hours": 3.5,
            "status": "active",
            "progress_percentage": 0.0,
            "completed_lessons": 0,
            "total_lessons": 0,
            "created_at": "2024-04-01T09:30:00"
        }))
        .unwrap();
        LearningPathDetail { path, lessons }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn completing_a_lesson_unlocks_the_next() {
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let mut session = LearningPathSession::new(path_with(vec![
            lesson(ids[2], 2, true, false),
            lesson(ids[0], 0, false, false),
            lesson(ids[1], 1, true, false),
        ]));
        assert_eq!(session.current_lesson().map(|l| l.id), Some(ids[0]));
        assert_eq!(session.progress().total, 3);

        let backend = FakeBackend::default();
        let locked = session.complete_lesson(&backend, ids[1]).await.unwrap_err();
        assert!(matches!(locked, ApiError::InvalidRequest(_)));

        session.complete_lesson(&backend, ids[0]).await.unwrap();
        assert_eq!(session.current_lesson().map(|l| l.id), Some(ids[1]));
        let progress = session.progress();
        assert_eq!(progress.completed, 1);
        assert!((progress.percentage - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(
            session.next_suggestion().map(|s| s.segment_id.as_str()),
            Some("seg-next")
        );
        assert!(session.lessons()[2].is_locked);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn finishing_the_last_lesson_completes_the_path() {
        let id = Uuid::new_v4();
        let mut session = LearningPathSession::new(path_with(vec![lesson(id, 0, false, false)]));
        let backend = FakeBackend {
            path_completed: true,
            ..Default::default()
        };

        session.complete_lesson(&backend, id).await.unwrap();
        assert_eq!(session.path().status, PathStatus::Completed);
        assert!(session.path().completed_at.is_some());
        assert_eq!(session.progress().percentage, 100.0);
        assert!(session.current_lesson().is_none());

        let err = session.set_status(&backend, PathStatus::Paused).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
        assert!(backend.statuses.lock().unwrap().is_empty());
    }

    #[test]
    fn completion_at_the_highest_order_unlocks_nothing() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut session = LearningPathSession::new(path_with(vec![
            lesson(a, u32::MAX - 1, false, false),
            lesson(b, u32::MAX, true, false),
        ]));
        let completion = |id, order| LessonCompletion {
            lesson: lesson(id, order, false, true),
            next_suggestion: None,
            path_completed: false,
        };

        session.apply_completion(&completion(a, u32::MAX - 1));
        assert!(!session.lessons()[1].is_locked);

        session.apply_completion(&completion(b, u32::MAX));
        assert_eq!(session.progress().completed, 2);
        assert_eq!(session.path().status, PathStatus::Completed);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn only_active_and_paused_are_accepted() {
        let mut session = LearningPathSession::new(path_with(Vec::new()));
        let backend = FakeBackend::default();

        session.set_status(&backend, PathStatus::Paused).await.unwrap();
        assert_eq!(session.path().status, PathStatus::Paused);
        assert!(session.set_status(&backend, PathStatus::Draft).await.is_err());
        assert_eq!(*backend.statuses.lock().unwrap(), vec![PathStatus::Paused]);
    }
}
