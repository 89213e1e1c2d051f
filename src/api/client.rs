use std::time::Duration;

use anyhow::{anyhow, Context};
use log::{debug, warn};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use url::Url;
use uuid::Uuid;

use super::error::{extract_detail, ApiError};
use super::wire::{
    normalize_segments, CategoryDetailEnvelope, CategorySegmentsEnvelope,
    ChannelSegmentsEnvelope, FeedEnvelope, HistoryEnvelope, InterestsEnvelope,
    LearningPathListEnvelope, RawLesson, RawLessonCompletion, RawPathDetail, RawSegment,
    SavedEnvelope, SearchEnvelope, StatusEnvelope, SuggestionsEnvelope,
};
use crate::models::{
    AuthSession, Category, CategoryDetail, Channel, Credentials, FeedType, HistoryEntry,
    Interest, LearningPath, LearningPathDetail, Lesson, LessonCompletion, PathStatus,
    ProfileUpdate, Registration, SavedSegment, SearchHit, SearchQuery, Segment, SegmentListing,
    SkillAssessment,
    SkillGapAnalysis, SuggestedSkill, User, ViewRecord,
};
use crate::pagination::{offset, Page};
use crate::storage::LocalStorage;

const API_PREFIX: [&str; 2] = ["api", "v1"];
const USER_AGENT: &str = concat!("bizskill/", env!("CARGO_PKG_VERSION"));
const MIN_QUERY_LEN: usize = 2;

type Query = Vec<(&'static str, String)>;

/// Typed client for the BizSkill REST API. Every call is a single request
/// with no retries; the bearer token is read from [`LocalStorage`] per call
/// and dropped from it when the server answers 401.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    api_root: Url,
    storage: LocalStorage,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration, storage: LocalStorage) -> anyhow::Result<Self> {
        let mut api_root =
            Url::parse(base_url).with_context(|| format!("invalid API base URL {base_url}"))?;
        api_root
            .path_segments_mut()
            .map_err(|_| anyhow!("API base URL {base_url} cannot carry a path"))?
            .pop_if_empty()
            .extend(API_PREFIX);

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("failed to build API HTTP client")?;

        Ok(Self {
            http,
            api_root,
            storage,
        })
    }

    pub fn api_root(&self) -> &Url {
        &self.api_root
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let root = &self.api_root;
        let mut url = root.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidRequest(format!("cannot build path on {root}")))?
            .extend(segments);
        Ok(url)
    }

    async fn prepare(
        &self,
        method: Method,
        segments: &[&str],
    ) -> Result<(String, RequestBuilder), ApiError> {
        let url = self.endpoint(segments)?;
        let path = format!("/{}", segments.join("/"));
        let mut builder = self.http.request(method, url);
        if let Some(token) = self.storage.token().await? {
            builder = builder.bearer_auth(token);
        }
        Ok((path, builder))
    }

    async fn dispatch(&self, path: &str, builder: RequestBuilder) -> Result<String, ApiError> {
        let transport = |source| ApiError::Transport {
            path: path.to_string(),
            source,
        };
        let response = builder.send().await.map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        debug!("{path} -> {status}");

        match status {
            StatusCode::UNAUTHORIZED => {
                if let Err(err) = self.storage.clear_token().await {
                    warn!("Failed to clear rejected token: {err:#}");
                }
                Err(ApiError::Unauthorized)
            }
            StatusCode::NOT_FOUND => Err(ApiError::NotFound {
                path: path.to_string(),
            }),
            status if !status.is_success() => Err(ApiError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                detail: extract_detail(&body),
            }),
            _ => Ok(body),
        }
    }

    fn decode<T: DeserializeOwned>(path: &str, body: &str) -> Result<T, ApiError> {
        serde_json::from_str(body).map_err(|source| ApiError::Decode {
            path: path.to_string(),
            source,
        })
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str], query: Query) -> Result<T, ApiError> {
        let (path, builder) = self.prepare(Method::GET, segments).await?;
        let body = self.dispatch(&path, builder.query(&query)).await?;
        Self::decode(&path, &body)
    }

    async fn send_json<B, T>(&self, method: Method, segments: &[&str], payload: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let (path, builder) = self.prepare(method, segments).await?;
        let body = self.dispatch(&path, builder.json(payload)).await?;
        Self::decode(&path, &body)
    }

    /// For calls whose response body carries nothing the client needs.
    async fn send_empty(&self, method: Method, segments: &[&str], query: Query) -> Result<(), ApiError> {
        let (path, builder) = self.prepare(method, segments).await?;
        self.dispatch(&path, builder.query(&query)).await?;
        Ok(())
    }

    fn normalize_one(path: &str, raw: RawSegment) -> Result<Segment, ApiError> {
        raw.normalize().map_err(|err| ApiError::Malformed {
            path: path.to_string(),
            reason: err.to_string(),
        })
    }

    // Segments

    /// One page of the short-form feed, optionally narrowed to a category
    /// slug.
    pub async fn feed(
        &self,
        feed_type: FeedType,
        category: Option<&str>,
        page: u32,
        limit: u32,
    ) -> Result<Page<Segment>, ApiError> {
        let mut query = vec![
            ("type", feed_type.wire_value().to_string()),
            ("page", page.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(category) = category.filter(|c| !c.is_empty()) {
            query.push(("category", category.to_string()));
        }
        let envelope: FeedEnvelope = self.get(&["segments", "feed"], query).await?;
        let received = envelope.results.len();
        let items = normalize_segments(envelope.results, "/segments/feed");
        Ok(Page::received(items, received, page, limit))
    }

    /// Public segment listing, best rated first.
    pub async fn list_segments(&self, listing: &SegmentListing) -> Result<Page<Segment>, ApiError> {
        let mut query = vec![
            ("skip", offset(listing.page, listing.limit).to_string()),
            ("limit", listing.limit.to_string()),
        ];
        if let Some(category) = listing.category.as_deref().filter(|c| !c.is_empty()) {
            query.push(("category", category.to_string()));
        }
        if let Some(min_relevance) = listing.min_relevance {
            query.push(("min_relevance", min_relevance.clamp(1, 10).to_string()));
        }
        let raw: Vec<RawSegment> = self.get(&["segments"], query).await?;
        let received = raw.len();
        let items = normalize_segments(raw, "/segments");
        Ok(Page::received(items, received, listing.page, listing.limit))
    }

    pub async fn segment(&self, id: &str) -> Result<Segment, ApiError> {
        let raw: RawSegment = self.get(&["segments", id], Vec::new()).await?;
        Self::normalize_one(&format!("/segments/{id}"), raw)
    }

    pub async fn related_segments(&self, id: &str, limit: u32) -> Result<Vec<Segment>, ApiError> {
        let raw: Vec<RawSegment> = self
            .get(&["segments", id, "related"], vec![("limit", limit.to_string())])
            .await?;
        Ok(normalize_segments(raw, "/segments/related"))
    }

    // Categories and channels

    pub async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        self.get(&["categories"], Vec::new()).await
    }

    pub async fn category(&self, slug: &str) -> Result<CategoryDetail, ApiError> {
        let envelope: CategoryDetailEnvelope = self.get(&["categories", slug], Vec::new()).await?;
        let (category, top_segments) = envelope.into_top_segments("/categories");
        Ok(CategoryDetail {
            category,
            top_segments,
        })
    }

    pub async fn category_segments(
        &self,
        slug: &str,
        page: u32,
        limit: u32,
    ) -> Result<(Category, Page<Segment>), ApiError> {
        let query = vec![("page", page.to_string()), ("limit", limit.to_string())];
        let envelope: CategorySegmentsEnvelope =
            self.get(&["categories", slug, "segments"], query).await?;
        let received = envelope.segments.len();
        let items = normalize_segments(envelope.segments, "/categories/segments");
        let page = Page::received(items, received, page, limit).with_total(envelope.pagination.total);
        Ok((envelope.category, page))
    }

    pub async fn channel(&self, id: &str) -> Result<Channel, ApiError> {
        self.get(&["channels", id], Vec::new()).await
    }

    pub async fn channel_segments(
        &self,
        id: &str,
        page: u32,
        limit: u32,
    ) -> Result<(Channel, Page<Segment>), ApiError> {
        let query = vec![("page", page.to_string()), ("limit", limit.to_string())];
        let envelope: ChannelSegmentsEnvelope = self.get(&["channels", id, "segments"], query).await?;
        let received = envelope.segments.len();
        let items = normalize_segments(envelope.segments, "/channels/segments");
        let page = Page::received(items, received, page, limit).with_total(envelope.total);
        Ok((envelope.channel, page))
    }

    // Search

    pub async fn search(&self, query: &SearchQuery) -> Result<Page<SearchHit>, ApiError> {
        let q = query.q.trim();
        if q.chars().count() < MIN_QUERY_LEN {
            return Err(ApiError::InvalidRequest(format!(
                "search query must be at least {MIN_QUERY_LEN} characters"
            )));
        }

        let mut params = vec![
            ("q", q.to_string()),
            ("page", query.page.to_string()),
            ("limit", query.limit.to_string()),
        ];
        if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty()) {
            params.push(("category", category.to_string()));
        }
        if let Some(min_relevance) = query.min_relevance {
            params.push(("min_relevance", min_relevance.clamp(1, 10).to_string()));
        }

        let envelope: SearchEnvelope = self.get(&["search"], params).await?;
        let (total, received) = (envelope.total, envelope.results.len());
        let hits = envelope.into_hits("/search");
        Ok(Page::received(hits, received, query.page, query.limit).with_total(total))
    }

    pub async fn search_suggestions(&self, q: &str, limit: u32) -> Result<Vec<String>, ApiError> {
        let q = q.trim();
        if q.chars().count() < MIN_QUERY_LEN {
            return Err(ApiError::InvalidRequest(format!(
                "suggestions need at least {MIN_QUERY_LEN} characters"
            )));
        }
        let query = vec![("q", q.to_string()), ("limit", limit.to_string())];
        let envelope: SuggestionsEnvelope = self.get(&["search", "suggestions"], query).await?;
        Ok(envelope.suggestions)
    }

    // Auth

    pub async fn login(&self, credentials: &Credentials) -> Result<AuthSession, ApiError> {
        let session: AuthSession = self
            .send_json(Method::POST, &["auth", "login"], credentials)
            .await?;
        self.storage.store_session(&session).await?;
        Ok(session)
    }

    pub async fn register(&self, registration: &Registration) -> Result<AuthSession, ApiError> {
        let session: AuthSession = self
            .send_json(Method::POST, &["auth", "register"], registration)
            .await?;
        self.storage.store_session(&session).await?;
        Ok(session)
    }

    /// The server side is informational only; the local session is dropped
    /// whatever it answers.
    pub async fn logout(&self) -> Result<(), ApiError> {
        if let Err(err) = self.send_empty(Method::POST, &["auth", "logout"], Vec::new()).await {
            warn!("Logout request failed: {err}");
        }
        self.storage.clear_session().await?;
        Ok(())
    }

    // Users

    pub async fn me(&self) -> Result<User, ApiError> {
        let user: User = self.get(&["users", "me"], Vec::new()).await?;
        if let Err(err) = self.storage.cache_user(&user).await {
            warn!("Failed to cache current user: {err:#}");
        }
        Ok(user)
    }

    /// Changes the fields that are set and returns the refreshed user.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ApiError> {
        let mut query = Query::new();
        if let Some(full_name) = &update.full_name {
            query.push(("full_name", full_name.clone()));
        }
        if let Some(avatar_url) = &update.avatar_url {
            query.push(("avatar_url", avatar_url.clone()));
        }
        if query.is_empty() {
            return Err(ApiError::InvalidRequest("profile update has no changes".into()));
        }
        self.send_empty(Method::PUT, &["users", "me"], query).await?;
        self.me().await
    }

    pub async fn interests(&self) -> Result<Vec<Interest>, ApiError> {
        let envelope: InterestsEnvelope = self.get(&["users", "interests"], Vec::new()).await?;
        Ok(envelope.interests)
    }

    pub async fn set_interests(&self, category_slugs: &[String]) -> Result<(), ApiError> {
        let _: StatusEnvelope = self
            .send_json(Method::POST, &["users", "interests"], category_slugs)
            .await?;
        Ok(())
    }

    pub async fn save_segment(&self, segment_id: &str) -> Result<(), ApiError> {
        self.send_empty(Method::POST, &["users", "me", "saved", segment_id], Vec::new())
            .await
    }

    pub async fn unsave_segment(&self, segment_id: &str) -> Result<(), ApiError> {
        self.send_empty(Method::DELETE, &["users", "me", "saved", segment_id], Vec::new())
            .await
    }

    pub async fn saved_segments(&self, page: u32, limit: u32) -> Result<Page<SavedSegment>, ApiError> {
        let query = vec![
            ("skip", offset(page, limit).to_string()),
            ("limit", limit.to_string()),
        ];
        let envelope: SavedEnvelope = self.get(&["users", "me", "saved"], query).await?;
        let received = envelope.saved.len();
        Ok(Page::received(envelope.into_saved("/users/me/saved"), received, page, limit))
    }

    pub async fn history(&self, page: u32, limit: u32) -> Result<Page<HistoryEntry>, ApiError> {
        let query = vec![
            ("skip", offset(page, limit).to_string()),
            ("limit", limit.to_string()),
        ];
        let envelope: HistoryEnvelope = self.get(&["users", "me", "history"], query).await?;
        let received = envelope.history.len();
        Ok(Page::received(envelope.into_entries("/users/me/history"), received, page, limit))
    }

    pub async fn record_view(&self, view: &ViewRecord) -> Result<(), ApiError> {
        let _: StatusEnvelope = self
            .send_json(Method::POST, &["users", "me", "history"], view)
            .await?;
        Ok(())
    }

    // Learning paths

    pub async fn create_learning_path(&self, request: &SkillAssessment) -> Result<LearningPathDetail, ApiError> {
        let raw: RawPathDetail = self
            .send_json(Method::POST, &["learning-paths", ""], request)
            .await?;
        Ok(raw.into())
    }

    pub async fn learning_paths(&self, status: Option<PathStatus>) -> Result<Vec<LearningPath>, ApiError> {
        let query = status
            .map(|status| vec![("status_filter", status.as_str().to_string())])
            .unwrap_or_default();
        let envelope: LearningPathListEnvelope = self.get(&["learning-paths", ""], query).await?;
        Ok(envelope.paths)
    }

    pub async fn learning_path(&self, id: Uuid) -> Result<LearningPathDetail, ApiError> {
        let id = id.to_string();
        let raw: RawPathDetail = self.get(&["learning-paths", &id], Vec::new()).await?;
        Ok(raw.into())
    }

    pub async fn delete_learning_path(&self, id: Uuid) -> Result<(), ApiError> {
        let id = id.to_string();
        self.send_empty(Method::DELETE, &["learning-paths", &id], Vec::new())
            .await
    }

    /// Only `active` and `paused` are accepted by the server.
    pub async fn update_path_status(&self, id: Uuid, status: PathStatus) -> Result<(), ApiError> {
        if !matches!(status, PathStatus::Active | PathStatus::Paused) {
            return Err(ApiError::InvalidRequest(format!(
                "cannot set learning path status to {}",
                status.as_str()
            )));
        }
        let id = id.to_string();
        self.send_empty(
            Method::PATCH,
            &["learning-paths", &id, "status"],
            vec![("new_status", status.as_str().to_string())],
        )
        .await
    }

    pub async fn lesson(&self, path_id: Uuid, lesson_id: Uuid) -> Result<Lesson, ApiError> {
        let (path_id, lesson_id) = (path_id.to_string(), lesson_id.to_string());
        let raw: RawLesson = self
            .get(&["learning-paths", &path_id, "lessons", &lesson_id], Vec::new())
            .await?;
        Ok(raw.into_lesson())
    }

    pub async fn complete_lesson(&self, path_id: Uuid, lesson_id: Uuid) -> Result<LessonCompletion, ApiError> {
        let (path_id, lesson_id) = (path_id.to_string(), lesson_id.to_string());
        let (path, builder) = self
            .prepare(
                Method::POST,
                &["learning-paths", &path_id, "lessons", &lesson_id, "complete"],
            )
            .await?;
        let body = self.dispatch(&path, builder).await?;
        let raw: RawLessonCompletion = Self::decode(&path, &body)?;
        Ok(raw.into())
    }

    pub async fn analyze_skill_gap(&self, request: &SkillAssessment) -> Result<SkillGapAnalysis, ApiError> {
        self.send_json(Method::POST, &["learning-paths", "analyze-skill-gap"], request)
            .await
    }

    pub async fn suggested_skills(&self) -> Result<Vec<SuggestedSkill>, ApiError> {
        self.get(&["learning-paths", "suggested-skills"], Vec::new())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path, Query as AxumQuery},
        http::{HeaderMap, StatusCode as AxumStatus},
        routing::{get, post},
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use tempfile::TempDir;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client(base: &str) -> (ApiClient, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("storage.sqlite3")).unwrap();
        let client = ApiClient::new(base, Duration::from_secs(5), storage).unwrap();
        (client, dir)
    }

    fn bearer(headers: &HeaderMap) -> Option<String> {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    #[tokio::test(flavor = "current_thread")]
    async fn feed_sends_wire_type_and_normalizes() {
        let router = Router::new().route(
            "/api/v1/segments/feed",
            get(|AxumQuery(params): AxumQuery<HashMap<String, String>>| async move {
                assert_eq!(params.get("type").map(String::as_str), Some("random"));
                assert_eq!(params.get("page").map(String::as_str), Some("2"));
                Json(json!({
                    "type": "random", "page": 2, "limit": 20,
                    "results": [
                        {"id": "a", "title": "A", "start_time": 0, "end_time": 30,
                         "video": {"youtube_id": "ya"}},
                        {"id": "bad", "title": "B", "start_time": 5, "end_time": 5,
                         "video": {"youtube_id": "yb"}}
                    ]
                }))
            }),
        );
        let base = serve(router).await;
        let (client, _dir) = client(&base);

        let page = client.feed(FeedType::Recommended, None, 2, 20).await.unwrap();
        assert_eq!(page.page, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].youtube_id(), "ya");
        assert!(!page.has_more);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn full_page_keeps_paging_after_dropping_bad_records() {
        let router = Router::new().route(
            "/api/v1/segments/feed",
            get(|AxumQuery(params): AxumQuery<HashMap<String, String>>| async move {
                assert_eq!(params.get("category").map(String::as_str), Some("leadership"));
                let results: Vec<Value> = (0..20)
                    .map(|i| {
                        let end = if i == 7 { 5 } else { 30 };
                        json!({"id": format!("s{i}"), "title": "T", "start_time": 5,
                               "end_time": end, "video": {"youtube_id": format!("y{i}")}})
                    })
                    .collect();
                Json(json!({"type": "trending", "page": 1, "limit": 20, "results": results}))
            }),
        );
        let base = serve(router).await;
        let (client, _dir) = client(&base);

        let page = client
            .feed(FeedType::Trending, Some("leadership"), 1, 20)
            .await
            .unwrap();
        assert_eq!(page.items.len(), 19);
        assert!(page.has_more);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn segment_listing_pages_by_offset() {
        let router = Router::new().route(
            "/api/v1/segments",
            get(|AxumQuery(params): AxumQuery<HashMap<String, String>>| async move {
                assert_eq!(params.get("skip").map(String::as_str), Some("10"));
                assert_eq!(params.get("limit").map(String::as_str), Some("10"));
                assert_eq!(params.get("min_relevance").map(String::as_str), Some("10"));
                assert!(!params.contains_key("category"));
                Json(json!([
                    {"id": "a", "generated_title": "A", "summary_text": "about a",
                     "start_time": 0, "end_time": 30,
                     "video": {"youtube_id": "ya", "original_title": "Video A"},
                     "categories": ["sales"]}
                ]))
            }),
        );
        let base = serve(router).await;
        let (client, _dir) = client(&base);

        let listing = SegmentListing {
            page: 2,
            limit: 10,
            category: Some(String::new()),
            min_relevance: Some(42),
        };
        let page = client.list_segments(&listing).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].title, "A");
        assert!(!page.has_more);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn profile_update_refreshes_the_cached_user() {
        let router = Router::new().route(
            "/api/v1/users/me",
            get(|| async {
                Json(json!({"id": "8a6e0804-2bd0-4672-b79d-d97027f9071a",
                            "email": "ada@example.com", "full_name": "Ada L."}))
            })
            .put(|AxumQuery(params): AxumQuery<HashMap<String, String>>| async move {
                assert_eq!(params.get("full_name").map(String::as_str), Some("Ada L."));
                assert!(!params.contains_key("avatar_url"));
                Json(json!({"status": "updated"}))
            }),
        );
        let base = serve(router).await;
        let (client, _dir) = client(&base);

        let err = client.update_profile(&ProfileUpdate::default()).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));

        let update = ProfileUpdate {
            full_name: Some("Ada L.".into()),
            avatar_url: None,
        };
        let user = client.update_profile(&update).await.unwrap();
        assert_eq!(user.full_name.as_deref(), Some("Ada L."));
        let cached = client.storage().cached_user().await.unwrap().unwrap();
        assert_eq!(cached, user);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn login_persists_token_and_attaches_it_afterwards() {
        let router = Router::new()
            .route(
                "/api/v1/auth/login",
                post(|Json(body): Json<Value>| async move {
                    assert_eq!(body["email"], "ada@example.com");
                    Json(json!({
                        "access_token": "tok-1", "token_type": "bearer",
                        "user": {"id": "8a6e0804-2bd0-4672-b79d-d97027f9071a",
                                 "email": "ada@example.com", "full_name": "Ada",
                                 "avatar_url": null, "is_active": true,
                                 "created_at": "2024-03-01T12:00:00.123456"}
                    }))
                }),
            )
            .route(
                "/api/v1/users/me/saved/:id",
                post(|Path(id): Path<String>, headers: HeaderMap| async move {
                    assert_eq!(id, "seg-1");
                    assert_eq!(bearer(&headers).as_deref(), Some("Bearer tok-1"));
                    Json(json!({"status": "saved"}))
                }),
            );
        let base = serve(router).await;
        let (client, _dir) = client(&base);

        let session = client
            .login(&Credentials {
                email: "ada@example.com".into(),
                password: "secret".into(),
            })
            .await
            .unwrap();
        assert!(session.user.created_at.is_some());
        assert_eq!(client.storage().token().await.unwrap().as_deref(), Some("tok-1"));

        client.save_segment("seg-1").await.unwrap();
    }

    #[tokio::test(flavor = "current_thread")]
    async fn unauthorized_clears_the_stored_token() {
        let router = Router::new().route(
            "/api/v1/users/me",
            get(|| async { (AxumStatus::UNAUTHORIZED, Json(json!({"detail": "expired"}))) }),
        );
        let base = serve(router).await;
        let (client, _dir) = client(&base);
        client.storage().set_item("token", "stale").await.unwrap();

        let err = client.me().await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(client.storage().token().await.unwrap(), None);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn status_errors_carry_the_server_detail() {
        let router = Router::new().route(
            "/api/v1/auth/register",
            post(|| async {
                (
                    AxumStatus::BAD_REQUEST,
                    Json(json!({"detail": "Email already registered"})),
                )
            }),
        );
        let base = serve(router).await;
        let (client, _dir) = client(&base);

        let err = client
            .register(&Registration {
                email: "ada@example.com".into(),
                password: "secret".into(),
                full_name: None,
            })
            .await
            .unwrap_err();
        match err {
            ApiError::Status { status, detail, .. } => {
                assert_eq!(status, 400);
                assert_eq!(detail, "Email already registered");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn missing_routes_map_to_not_found() {
        let base = serve(Router::new()).await;
        let (client, _dir) = client(&base);
        let err = client.segment("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn logout_clears_session_even_when_the_server_fails() {
        let router = Router::new().route(
            "/api/v1/auth/logout",
            post(|| async { AxumStatus::INTERNAL_SERVER_ERROR }),
        );
        let base = serve(router).await;
        let (client, _dir) = client(&base);
        client.storage().set_item("token", "tok").await.unwrap();

        client.logout().await.unwrap();
        assert_eq!(client.storage().token().await.unwrap(), None);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn local_validation_skips_the_request() {
        let base = serve(Router::new()).await;
        let (client, _dir) = client(&base);

        let err = client.search(&SearchQuery::new(" a ")).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));

        let err = client
            .update_path_status(Uuid::new_v4(), PathStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[test]
    fn base_url_gains_the_api_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("s.sqlite3")).unwrap();
        let client =
            ApiClient::new("http://localhost:8000/", Duration::from_secs(1), storage).unwrap();
        assert_eq!(client.api_root().as_str(), "http://localhost:8000/api/v1");
        let url = client.endpoint(&["learning-paths", ""]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/v1/learning-paths/");
    }

    #[test]
    fn base_url_without_a_path_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("s.sqlite3")).unwrap();
        assert!(ApiClient::new("mailto:ops@example.com", Duration::from_secs(1), storage).is_err());
    }
}
