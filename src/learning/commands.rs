use serde::Serialize;
use tauri::{AppHandle, State};
use uuid::Uuid;

use super::{LearningPathSession, PathProgress};
use crate::{
    api::{redirect_for, ApiError},
    events::{emit, AUTH_CHANGED},
    models::{LearningPath, Lesson, NextLessonSuggestion, PathStatus},
    AppState,
};

/// What the path page renders.
#[derive(Serialize)]
pub struct LearningPathView {
    path: LearningPath,
    lessons: Vec<Lesson>,
    progress: PathProgress,
    current_lesson_id: Option<Uuid>,
    next_suggestion: Option<NextLessonSuggestion>,
}

impl From<&LearningPathSession> for LearningPathView {
    fn from(session: &LearningPathSession) -> Self {
        Self {
            path: session.path().clone(),
            lessons: session.lessons().to_vec(),
            progress: session.progress(),
            current_lesson_id: session.current_lesson().map(|lesson| lesson.id),
            next_suggestion: session.next_suggestion().cloned(),
        }
    }
}

fn surface(app: &AppHandle, path_id: Uuid, err: ApiError) -> String {
    let return_path = format!("/learning-paths/{path_id}");
    if let Some(redirect) = redirect_for(&err, &return_path) {
        emit(
            app,
            AUTH_CHANGED,
            &serde_json::json!({ "user": null, "redirect": redirect }),
        );
    }
    err.to_string()
}

#[tauri::command]
pub async fn open_learning_path(
    app: AppHandle,
    state: State<'_, AppState>,
    path_id: Uuid,
) -> Result<LearningPathView, String> {
    let session = LearningPathSession::open(&state.api, path_id)
        .await
        .map_err(|e| surface(&app, path_id, e))?;
    let view = LearningPathView::from(&session);
    *state.learning.lock().await = Some(session);
    Ok(view)
}

#[tauri::command]
pub async fn get_learning_path_session(
    state: State<'_, AppState>,
) -> Result<Option<LearningPathView>, String> {
    Ok(state.learning.lock().await.as_ref().map(LearningPathView::from))
}

#[tauri::command]
pub async fn complete_lesson(
    app: AppHandle,
    state: State<'_, AppState>,
    lesson_id: Uuid,
) -> Result<LearningPathView, String> {
    let mut guard = state.learning.lock().await;
    let session = guard
        .as_mut()
        .ok_or_else(|| "no learning path is open".to_string())?;
    let path_id = session.path().id;
    session
        .complete_lesson(&state.api, lesson_id)
        .await
        .map_err(|e| surface(&app, path_id, e))?;
    Ok(LearningPathView::from(&*session))
}

#[tauri::command]
pub async fn set_learning_path_status(
    app: AppHandle,
    state: State<'_, AppState>,
    status: PathStatus,
) -> Result<LearningPathView, String> {
    let mut guard = state.learning.lock().await;
    let session = guard
        .as_mut()
        .ok_or_else(|| "no learning path is open".to_string())?;
    let path_id = session.path().id;
    session
        .set_status(&state.api, status)
        .await
        .map_err(|e| surface(&app, path_id, e))?;
    Ok(LearningPathView::from(&*session))
}

#[tauri::command]
pub async fn close_learning_path(state: State<'_, AppState>) -> Result<(), String> {
    state.learning.lock().await.take();
    Ok(())
}
