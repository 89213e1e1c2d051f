pub mod api;
pub mod events;
pub mod feed;
pub mod learning;
pub mod models;
pub mod pagination;
pub mod player;
pub mod settings;
pub mod storage;
pub mod utils;

#[cfg(feature = "desktop")]
pub(crate) use desktop::AppState;
#[cfg(feature = "desktop")]
pub use desktop::run;

#[cfg(feature = "desktop")]
mod desktop {
    use std::sync::Arc;
    use std::time::Duration;

    use tauri::{Manager, State};
    use tokio::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    use crate::{
        api::{
            commands::{
                analyze_skill_gap, cached_user, create_learning_path, current_user,
                delete_learning_path, get_categories, get_category, get_category_segments,
                get_channel, get_channel_segments, get_history, get_interests,
                get_related_segments, get_saved_segments, get_segment, get_suggested_skills,
                list_learning_paths, list_segments, login, logout, record_view, register, search,
                search_suggestions, set_interests, update_profile,
            },
            ApiClient,
        },
        events::EventSink,
        feed::{
            commands::{
                feed_advance, feed_input, feed_retreat, get_feed_state, open_category_feed,
                open_segment_on_youtube, player_event, player_script_failed, player_script_loaded, retry_feed, switch_feed,
                toggle_mute, toggle_saved,
            },
            FeedController,
        },
        learning::{
            commands::{
                close_learning_path, complete_lesson, get_learning_path_session,
                open_learning_path, set_learning_path_status,
            },
            LearningPathSession,
        },
        models::FeedType,
        player::WebviewPlayerFactory,
        settings::{ClientSettings, SettingsStore},
        storage::LocalStorage,
    };

    const PLAYER_POLL_INTERVAL: Duration = Duration::from_secs(1);

    pub(crate) struct AppState {
        pub(crate) api: ApiClient,
        pub(crate) feed: FeedController<ApiClient>,
        pub(crate) settings: SettingsStore,
        pub(crate) learning: Mutex<Option<LearningPathSession>>,
        player_events: CancellationToken,
    }

    #[tauri::command]
    fn get_client_settings(state: State<AppState>) -> Result<ClientSettings, String> {
        Ok(state.settings.client())
    }

    /// Persists new settings. Connection and feed sizing changes apply on the
    /// next launch.
    #[tauri::command]
    fn set_client_settings(settings: ClientSettings, state: State<AppState>) -> Result<(), String> {
        state.settings.update(settings).map_err(|e| e.to_string())
    }

    #[cfg_attr(mobile, tauri::mobile_entry_point)]
    pub fn run() {
        // Initialize logging (reads RUST_LOG env var)
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();

        log::info!("BizSkill starting up...");

        let result = tauri::Builder::default()
            .plugin(tauri_plugin_opener::init())
            .setup(|app| {
                let result = (|| -> anyhow::Result<()> {
                    let app_data_dir = app
                        .path()
                        .app_data_dir()
                        .map_err(|err| anyhow::anyhow!(err))?;
                    std::fs::create_dir_all(&app_data_dir)?;

                    let settings_store = SettingsStore::new(app_data_dir.join("settings.json"))?;
                    let settings = settings_store.client();

                    let storage = LocalStorage::new(app_data_dir.join("bizskill.sqlite3"))?;
                    let api = ApiClient::new(
                        &settings.api_base_url,
                        settings.request_timeout(),
                        storage,
                    )?;
                    log::info!("Using API at {}", api.api_root());

                    let sink: Arc<dyn EventSink> = Arc::new(app.handle().clone());
                    let factory = Arc::new(WebviewPlayerFactory::new(sink.clone()));
                    let (feed, player_rx) =
                        FeedController::new(Arc::new(api.clone()), factory, sink, &settings);

                    let player_events = CancellationToken::new();
                    tauri::async_runtime::spawn(feed.clone().run_player_events(
                        player_rx,
                        player_events.clone(),
                        PLAYER_POLL_INTERVAL,
                    ));

                    let initial = feed.clone();
                    tauri::async_runtime::spawn(async move {
                        initial.switch_feed(FeedType::default()).await;
                    });

                    app.manage(AppState {
                        api,
                        feed,
                        settings: settings_store,
                        learning: Mutex::new(None),
                        player_events,
                    });

                    Ok(())
                })();

                result.map_err(|err| err.into())
            })
            .invoke_handler(tauri::generate_handler![
                // Feed
                get_feed_state,
                switch_feed,
                open_category_feed,
                feed_advance,
                feed_retreat,
                feed_input,
                retry_feed,
                toggle_mute,
                toggle_saved,
                player_event,
                player_script_loaded,
                player_script_failed,
                open_segment_on_youtube,
                // Auth and account
                login,
                register,
                logout,
                cached_user,
                current_user,
                update_profile,
                get_interests,
                set_interests,
                get_saved_segments,
                get_history,
                record_view,
                // Catalog
                get_segment,
                list_segments,
                get_related_segments,
                get_categories,
                get_category,
                get_category_segments,
                get_channel,
                get_channel_segments,
                search,
                search_suggestions,
                // Learning paths
                create_learning_path,
                list_learning_paths,
                delete_learning_path,
                analyze_skill_gap,
                get_suggested_skills,
                open_learning_path,
                get_learning_path_session,
                complete_lesson,
                set_learning_path_status,
                close_learning_path,
                // Settings
                get_client_settings,
                set_client_settings,
            ])
            .build(tauri::generate_context!());

        let app = match result {
            Ok(app) => app,
            Err(err) => {
                log::error!("Failed to start BizSkill: {err}");
                std::process::exit(1);
            }
        };

        app.run(|handle, event| {
            if let tauri::RunEvent::Exit = event {
                if let Some(state) = handle.try_state::<AppState>() {
                    state.player_events.cancel();
                }
            }
        });
    }
}
