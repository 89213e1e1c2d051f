use std::time::Instant;

use tauri::{AppHandle, State};
use tauri_plugin_opener::OpenerExt;

use super::{FeedInput, FeedSnapshot};
use crate::{
    models::FeedType,
    player::{PlayerEnvelope, PlayerEvent},
    AppState,
};

#[tauri::command]
pub async fn get_feed_state(state: State<'_, AppState>) -> Result<FeedSnapshot, String> {
    Ok(state.feed.snapshot().await)
}

#[tauri::command]
pub async fn switch_feed(
    state: State<'_, AppState>,
    feed_type: FeedType,
) -> Result<FeedSnapshot, String> {
    Ok(state.feed.switch_feed(feed_type).await)
}

#[tauri::command]
pub async fn open_category_feed(
    state: State<'_, AppState>,
    feed_type: FeedType,
    category: Option<String>,
) -> Result<FeedSnapshot, String> {
    Ok(state.feed.open_feed(feed_type, category).await)
}

#[tauri::command]
pub async fn feed_advance(state: State<'_, AppState>) -> Result<FeedSnapshot, String> {
    Ok(state.feed.advance().await)
}

#[tauri::command]
pub async fn feed_retreat(state: State<'_, AppState>) -> Result<FeedSnapshot, String> {
    Ok(state.feed.retreat().await)
}

#[tauri::command]
pub async fn feed_input(state: State<'_, AppState>, input: FeedInput) -> Result<FeedSnapshot, String> {
    Ok(state.feed.handle_input(input, Instant::now()).await)
}

#[tauri::command]
pub async fn retry_feed(state: State<'_, AppState>) -> Result<FeedSnapshot, String> {
    Ok(state.feed.retry().await)
}

#[tauri::command]
pub async fn toggle_mute(state: State<'_, AppState>) -> Result<FeedSnapshot, String> {
    Ok(state.feed.toggle_mute().await)
}

#[tauri::command]
pub async fn toggle_saved(state: State<'_, AppState>, segment_id: String) -> Result<bool, String> {
    state
        .feed
        .toggle_saved(&segment_id)
        .await
        .map_err(|e| format!("{e:#}"))
}

/// Queues a callback from the embedded player; applied by the player event
/// loop in arrival order.
#[tauri::command]
pub async fn player_event(
    state: State<'_, AppState>,
    binding: u64,
    event: PlayerEvent,
) -> Result<(), String> {
    state
        .feed
        .player_sender()
        .await
        .send(PlayerEnvelope { binding, event })
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn player_script_loaded(state: State<'_, AppState>) -> Result<FeedSnapshot, String> {
    Ok(state.feed.script_loaded().await)
}

#[tauri::command]
pub async fn player_script_failed(
    state: State<'_, AppState>,
    reason: String,
) -> Result<FeedSnapshot, String> {
    Ok(state.feed.script_failed(&reason).await)
}

#[tauri::command]
pub async fn open_segment_on_youtube(
    app: AppHandle,
    state: State<'_, AppState>,
    segment_id: String,
) -> Result<(), String> {
    let snapshot = state.feed.snapshot().await;
    let url = match snapshot.items.iter().find(|s| s.id == segment_id) {
        Some(segment) => segment.watch_url(),
        None => state
            .api
            .segment(&segment_id)
            .await
            .map_err(|e| e.to_string())?
            .watch_url(),
    };
    app.opener()
        .open_url(url, None::<&str>)
        .map_err(|e| e.to_string())
}
