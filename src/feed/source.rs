use std::future::Future;

use crate::api::{ApiClient, ApiError};
use crate::models::{FeedType, Segment};
use crate::pagination::Page;

/// What the feed controller needs from the backend.
pub trait FeedSource: Send + Sync + 'static {
    fn fetch_feed(
        &self,
        feed_type: FeedType,
        category: Option<&str>,
        page: u32,
        limit: u32,
    ) -> impl Future<Output = Result<Page<Segment>, ApiError>> + Send;

    fn set_saved(
        &self,
        segment_id: &str,
        saved: bool,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}

impl FeedSource for ApiClient {
    async fn fetch_feed(
        &self,
        feed_type: FeedType,
        category: Option<&str>,
        page: u32,
        limit: u32,
    ) -> Result<Page<Segment>, ApiError> {
        self.feed(feed_type, category, page, limit).await
    }

    async fn set_saved(&self, segment_id: &str, saved: bool) -> Result<(), ApiError> {
        if saved {
            self.save_segment(segment_id).await
        } else {
            self.unsave_segment(segment_id).await
        }
    }
}
