use serde::Serialize;
use tauri::{AppHandle, State};
use uuid::Uuid;

use super::{redirect_for, ApiError};
use crate::{
    events::{emit, AUTH_CHANGED},
    models::{
        AuthSession, Category, CategoryDetail, Channel, Credentials, HistoryEntry, Interest,
        LearningPath, LearningPathDetail, PathStatus, ProfileUpdate, Registration, SavedSegment,
        SearchHit, SearchQuery, Segment, SegmentListing, SkillAssessment, SkillGapAnalysis,
        SuggestedSkill, User, ViewRecord,
    },
    pagination::Page,
    AppState,
};

#[derive(Serialize, Clone)]
struct AuthChangedEvent {
    user: Option<User>,
    /// Login route to navigate to when a protected page lost its session.
    redirect: Option<String>,
}

/// Error string for the webview. A 401 additionally tells the page where to
/// send the user.
fn protected<'a>(app: &'a AppHandle, return_path: &'a str) -> impl FnOnce(ApiError) -> String + 'a {
    move |err| {
        if let Some(redirect) = redirect_for(&err, return_path) {
            emit(
                app,
                AUTH_CHANGED,
                &AuthChangedEvent {
                    user: None,
                    redirect: Some(redirect),
                },
            );
        }
        err.to_string()
    }
}

// Auth

#[tauri::command]
pub async fn login(
    app: AppHandle,
    state: State<'_, AppState>,
    email: String,
    password: String,
) -> Result<AuthSession, String> {
    let session = state
        .api
        .login(&Credentials { email, password })
        .await
        .map_err(|e| e.to_string())?;
    emit(
        &app,
        AUTH_CHANGED,
        &AuthChangedEvent {
            user: Some(session.user.clone()),
            redirect: None,
        },
    );
    Ok(session)
}

#[tauri::command]
pub async fn register(
    app: AppHandle,
    state: State<'_, AppState>,
    registration: Registration,
) -> Result<AuthSession, String> {
    let session = state
        .api
        .register(&registration)
        .await
        .map_err(|e| e.to_string())?;
    emit(
        &app,
        AUTH_CHANGED,
        &AuthChangedEvent {
            user: Some(session.user.clone()),
            redirect: None,
        },
    );
    Ok(session)
}

#[tauri::command]
pub async fn logout(app: AppHandle, state: State<'_, AppState>) -> Result<(), String> {
    state.api.logout().await.map_err(|e| e.to_string())?;
    emit(
        &app,
        AUTH_CHANGED,
        &AuthChangedEvent {
            user: None,
            redirect: None,
        },
    );
    Ok(())
}

/// User cached at the last login, available before `/users/me` answers.
#[tauri::command]
pub async fn cached_user(state: State<'_, AppState>) -> Result<Option<User>, String> {
    if state.api.storage().token().await.map_err(|e| e.to_string())?.is_none() {
        return Ok(None);
    }
    state
        .api
        .storage()
        .cached_user()
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn current_user(
    app: AppHandle,
    state: State<'_, AppState>,
    return_path: String,
) -> Result<User, String> {
    state.api.me().await.map_err(protected(&app, &return_path))
}

#[tauri::command]
pub async fn update_profile(
    app: AppHandle,
    state: State<'_, AppState>,
    update: ProfileUpdate,
    return_path: String,
) -> Result<User, String> {
    let user = state
        .api
        .update_profile(&update)
        .await
        .map_err(protected(&app, &return_path))?;
    emit(
        &app,
        AUTH_CHANGED,
        &AuthChangedEvent {
            user: Some(user.clone()),
            redirect: None,
        },
    );
    Ok(user)
}

// Catalog

#[tauri::command]
pub async fn list_segments(
    state: State<'_, AppState>,
    listing: SegmentListing,
) -> Result<Page<Segment>, String> {
    state
        .api
        .list_segments(&listing)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn get_segment(state: State<'_, AppState>, segment_id: String) -> Result<Segment, String> {
    state
        .api
        .segment(&segment_id)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn get_related_segments(
    state: State<'_, AppState>,
    segment_id: String,
    limit: Option<u32>,
) -> Result<Vec<Segment>, String> {
    state
        .api
        .related_segments(&segment_id, limit.unwrap_or(10))
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn get_categories(state: State<'_, AppState>) -> Result<Vec<Category>, String> {
    state.api.categories().await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn get_category(state: State<'_, AppState>, slug: String) -> Result<CategoryDetail, String> {
    state.api.category(&slug).await.map_err(|e| e.to_string())
}

#[derive(Serialize)]
pub struct CategoryPage {
    category: Category,
    page: Page<Segment>,
}

#[tauri::command]
pub async fn get_category_segments(
    state: State<'_, AppState>,
    slug: String,
    page: u32,
    limit: Option<u32>,
) -> Result<CategoryPage, String> {
    let limit = limit.unwrap_or_else(|| state.settings.client().feed_page_size);
    let (category, page) = state
        .api
        .category_segments(&slug, page, limit)
        .await
        .map_err(|e| e.to_string())?;
    Ok(CategoryPage { category, page })
}

#[derive(Serialize)]
pub struct ChannelPage {
    channel: Channel,
    page: Page<Segment>,
}

#[tauri::command]
pub async fn get_channel_segments(
    state: State<'_, AppState>,
    channel_id: String,
    page: u32,
    limit: Option<u32>,
) -> Result<ChannelPage, String> {
    let limit = limit.unwrap_or_else(|| state.settings.client().feed_page_size);
    let (channel, page) = state
        .api
        .channel_segments(&channel_id, page, limit)
        .await
        .map_err(|e| e.to_string())?;
    Ok(ChannelPage { channel, page })
}

#[tauri::command]
pub async fn get_channel(state: State<'_, AppState>, channel_id: String) -> Result<Channel, String> {
    state
        .api
        .channel(&channel_id)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn search(state: State<'_, AppState>, query: SearchQuery) -> Result<Page<SearchHit>, String> {
    state.api.search(&query).await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn search_suggestions(
    state: State<'_, AppState>,
    q: String,
    limit: Option<u32>,
) -> Result<Vec<String>, String> {
    state
        .api
        .search_suggestions(&q, limit.unwrap_or(5))
        .await
        .map_err(|e| e.to_string())
}

// Signed-in user

#[tauri::command]
pub async fn get_interests(
    app: AppHandle,
    state: State<'_, AppState>,
    return_path: String,
) -> Result<Vec<Interest>, String> {
    state
        .api
        .interests()
        .await
        .map_err(protected(&app, &return_path))
}

#[tauri::command]
pub async fn set_interests(
    app: AppHandle,
    state: State<'_, AppState>,
    category_slugs: Vec<String>,
    return_path: String,
) -> Result<(), String> {
    state
        .api
        .set_interests(&category_slugs)
        .await
        .map_err(protected(&app, &return_path))
}

#[tauri::command]
pub async fn get_saved_segments(
    app: AppHandle,
    state: State<'_, AppState>,
    page: u32,
    limit: Option<u32>,
    return_path: String,
) -> Result<Page<SavedSegment>, String> {
    let limit = limit.unwrap_or_else(|| state.settings.client().feed_page_size);
    state
        .api
        .saved_segments(page, limit)
        .await
        .map_err(protected(&app, &return_path))
}

#[tauri::command]
pub async fn get_history(
    app: AppHandle,
    state: State<'_, AppState>,
    page: u32,
    limit: Option<u32>,
    return_path: String,
) -> Result<Page<HistoryEntry>, String> {
    let limit = limit.unwrap_or_else(|| state.settings.client().feed_page_size);
    state
        .api
        .history(page, limit)
        .await
        .map_err(protected(&app, &return_path))
}

/// View recording is best effort; failures are logged and not surfaced.
#[tauri::command]
pub async fn record_view(state: State<'_, AppState>, view: ViewRecord) -> Result<(), String> {
    if let Err(err) = state.api.record_view(&view).await {
        log::warn!("Failed to record view of {}: {err}", view.segment_id);
    }
    Ok(())
}

// Learning paths

#[tauri::command]
pub async fn create_learning_path(
    app: AppHandle,
    state: State<'_, AppState>,
    assessment: SkillAssessment,
    return_path: String,
) -> Result<LearningPathDetail, String> {
    state
        .api
        .create_learning_path(&assessment)
        .await
        .map_err(protected(&app, &return_path))
}

#[tauri::command]
pub async fn list_learning_paths(
    app: AppHandle,
    state: State<'_, AppState>,
    status: Option<PathStatus>,
    return_path: String,
) -> Result<Vec<LearningPath>, String> {
    state
        .api
        .learning_paths(status)
        .await
        .map_err(protected(&app, &return_path))
}

#[tauri::command]
pub async fn delete_learning_path(
    app: AppHandle,
    state: State<'_, AppState>,
    path_id: Uuid,
    return_path: String,
) -> Result<(), String> {
    state
        .api
        .delete_learning_path(path_id)
        .await
        .map_err(protected(&app, &return_path))
}

#[tauri::command]
pub async fn analyze_skill_gap(
    app: AppHandle,
    state: State<'_, AppState>,
    assessment: SkillAssessment,
    return_path: String,
) -> Result<SkillGapAnalysis, String> {
    state
        .api
        .analyze_skill_gap(&assessment)
        .await
        .map_err(protected(&app, &return_path))
}

#[tauri::command]
pub async fn get_suggested_skills(
    app: AppHandle,
    state: State<'_, AppState>,
    return_path: String,
) -> Result<Vec<SuggestedSkill>, String> {
    state
        .api
        .suggested_skills()
        .await
        .map_err(protected(&app, &return_path))
}
