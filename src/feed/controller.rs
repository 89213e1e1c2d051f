use std::{sync::Arc, time::Duration, time::Instant};

use anyhow::{anyhow, Result};
use log::{info, warn};
use serde::Serialize;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use super::input::{FeedInput, InputState, Navigation};
use super::source::FeedSource;
use crate::events::{emit, EventSink, FEED_STATE_CHANGED};
use crate::models::{FeedType, Segment};
use crate::pagination::{PageRequest, PagedList};
use crate::player::{
    DeckSnapshot, PlayerDeck, PlayerEnvelope, PlayerFactory, PlayerIntent,
};
use crate::settings::ClientSettings;

#[derive(Debug, Clone, Serialize)]
pub struct FeedSnapshot {
    pub feed_type: FeedType,
    pub category: Option<String>,
    pub session: u64,
    pub items: Vec<Segment>,
    pub active_index: Option<usize>,
    pub has_more: bool,
    pub loading: bool,
    pub muted: bool,
    pub error: Option<String>,
    pub player: DeckSnapshot,
}

/// Ordering plus optional category slug; results for any other scope are
/// stale.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct FeedScope {
    feed_type: FeedType,
    category: Option<String>,
}

struct FeedState {
    scope: FeedScope,
    list: PagedList<Segment>,
    active: Option<usize>,
    muted: bool,
    input: InputState,
}

impl FeedState {
    fn clamp_step(&self, navigation: Navigation) -> Option<usize> {
        let last = self.list.len().checked_sub(1)?;
        let current = self.active.unwrap_or(0).min(last);
        Some(match navigation {
            Navigation::Advance => current.saturating_add(1).min(last),
            Navigation::Retreat => current.saturating_sub(1),
        })
    }
}

/// Drives the short-form feed page: owns the loaded segments, the active
/// index and the shared mute flag, and keeps the player deck in step.
pub struct FeedController<S: FeedSource> {
    source: Arc<S>,
    state: Arc<Mutex<FeedState>>,
    deck: Arc<Mutex<PlayerDeck>>,
    sink: Arc<dyn EventSink>,
    lookahead: Arc<Mutex<Option<JoinHandle<()>>>>,
    lookahead_threshold: usize,
}

impl<S: FeedSource> Clone for FeedController<S> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            state: self.state.clone(),
            deck: self.deck.clone(),
            sink: self.sink.clone(),
            lookahead: self.lookahead.clone(),
            lookahead_threshold: self.lookahead_threshold,
        }
    }
}

impl<S: FeedSource> FeedController<S> {
    /// Returns the controller and the receiving end of the player event
    /// queue, to be drained by [`FeedController::run_player_events`].
    pub fn new(
        source: Arc<S>,
        factory: Arc<dyn PlayerFactory>,
        sink: Arc<dyn EventSink>,
        settings: &ClientSettings,
    ) -> (Self, mpsc::UnboundedReceiver<PlayerEnvelope>) {
        let (deck, events) = PlayerDeck::new(factory, settings.retain_radius, settings.start_muted);
        let state = FeedState {
            scope: FeedScope::default(),
            list: PagedList::new(settings.feed_page_size),
            active: None,
            muted: settings.start_muted,
            input: InputState::new(settings),
        };

        let controller = Self {
            source,
            state: Arc::new(Mutex::new(state)),
            deck: Arc::new(Mutex::new(deck)),
            sink,
            lookahead: Arc::new(Mutex::new(None)),
            lookahead_threshold: settings.lookahead_threshold,
        };
        (controller, events)
    }

    /// Queue for player callbacks coming from the front end.
    pub async fn player_sender(&self) -> mpsc::UnboundedSender<PlayerEnvelope> {
        self.deck.lock().await.sender()
    }

    pub async fn snapshot(&self) -> FeedSnapshot {
        let state = self.state.lock().await;
        let deck = self.deck.lock().await;
        Self::build_snapshot(&state, &deck)
    }

    fn build_snapshot(state: &FeedState, deck: &PlayerDeck) -> FeedSnapshot {
        FeedSnapshot {
            feed_type: state.scope.feed_type,
            category: state.scope.category.clone(),
            session: state.list.generation(),
            items: state.list.items().to_vec(),
            active_index: state.active,
            has_more: state.list.has_more(),
            loading: state.list.is_loading(),
            muted: state.muted,
            error: state.list.error().map(str::to_string),
            player: deck.snapshot(),
        }
    }

    fn publish(&self, snapshot: &FeedSnapshot) {
        emit(self.sink.as_ref(), FEED_STATE_CHANGED, snapshot);
    }

    /// Syncs the deck with the current window and emits the new state. Must be
    /// called with the state lock held.
    async fn commit(&self, state: &FeedState) -> FeedSnapshot {
        let mut deck = self.deck.lock().await;
        deck.set_muted(state.muted);
        deck.sync(state.list.items(), state.active);
        let snapshot = Self::build_snapshot(state, &deck);
        drop(deck);
        self.publish(&snapshot);
        snapshot
    }

    /// Starts a new session for `feed_type` across all categories and loads
    /// its first page.
    pub async fn switch_feed(&self, feed_type: FeedType) -> FeedSnapshot {
        self.open_feed(feed_type, None).await
    }

    /// Starts a new session for `feed_type` narrowed to `category` (a slug)
    /// and loads its first page.
    pub async fn open_feed(&self, feed_type: FeedType, category: Option<String>) -> FeedSnapshot {
        let scope = FeedScope {
            feed_type,
            category: category.filter(|c| !c.is_empty()),
        };
        let request = {
            let mut state = self.state.lock().await;
            state.scope = scope.clone();
            state.active = None;
            let request = state.list.restart();
            self.commit(&state).await;
            request
        };
        info!(
            "Loading {} feed in {} (session {})",
            feed_type.wire_value(),
            scope.category.as_deref().unwrap_or("all categories"),
            request.generation
        );

        self.load_page(scope, request).await;
        self.snapshot().await
    }

    async fn load_page(&self, scope: FeedScope, request: PageRequest) {
        let result = self
            .source
            .fetch_feed(scope.feed_type, scope.category.as_deref(), request.page, request.limit)
            .await
            .map_err(|err| {
                warn!("Feed page {} failed: {err}", request.page);
                err.to_string()
            });

        let mut state = self.state.lock().await;
        if state.scope != scope || !state.list.complete(request, result) {
            info!(
                "Discarding stale {} page {} (session {})",
                scope.feed_type.wire_value(),
                request.page,
                request.generation
            );
            return;
        }

        if state.list.is_empty() {
            state.active = None;
        } else if request.page == 1 || state.active.is_none() {
            state.active = Some(state.active.unwrap_or(0));
        }
        self.commit(&state).await;
    }

    fn spawn_fetch(&self, scope: FeedScope, request: PageRequest) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            controller.load_page(scope, request).await;
        })
    }

    async fn store_lookahead(&self, handle: JoinHandle<()>) {
        let mut guard = self.lookahead.lock().await;
        if let Some(previous) = guard.replace(handle) {
            if !previous.is_finished() {
                info!("Previous page fetch still running; its result will be checked on arrival");
            }
        }
    }

    /// Waits for the most recent background page fetch, if any.
    pub async fn settle(&self) {
        let handle = self.lookahead.lock().await.take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!("Page fetch task failed: {err}");
            }
        }
    }

    pub async fn advance(&self) -> FeedSnapshot {
        self.step(Navigation::Advance).await
    }

    pub async fn retreat(&self) -> FeedSnapshot {
        self.step(Navigation::Retreat).await
    }

    async fn step(&self, navigation: Navigation) -> FeedSnapshot {
        let (snapshot, fetch) = {
            let mut state = self.state.lock().await;
            let Some(next) = state.clamp_step(navigation) else {
                let deck = self.deck.lock().await;
                return Self::build_snapshot(&state, &deck);
            };
            state.active = Some(next);

            let near_end = next.saturating_add(self.lookahead_threshold) >= state.list.len();
            let fetch = if navigation == Navigation::Advance && near_end {
                let scope = state.scope.clone();
                state.list.next_request().map(|req| (scope, req))
            } else {
                None
            };
            (self.commit(&state).await, fetch)
        };

        if let Some((scope, request)) = fetch {
            info!("Prefetching {} page {}", scope.feed_type.wire_value(), request.page);
            let handle = self.spawn_fetch(scope, request);
            self.store_lookahead(handle).await;
            return self.snapshot().await;
        }
        snapshot
    }

    pub async fn handle_input(&self, input: FeedInput, now: Instant) -> FeedSnapshot {
        let navigation = self.state.lock().await.input.translate(&input, now);
        match navigation {
            Some(navigation) => self.step(navigation).await,
            None => self.snapshot().await,
        }
    }

    pub async fn toggle_mute(&self) -> FeedSnapshot {
        let mut state = self.state.lock().await;
        state.muted = !state.muted;
        self.commit(&state).await
    }

    /// Flips the saved flag right away and reverts it if the server refuses.
    pub async fn toggle_saved(&self, segment_id: &str) -> Result<bool> {
        let saved = {
            let mut state = self.state.lock().await;
            let current = state
                .list
                .items()
                .iter()
                .find(|s| s.id == segment_id)
                .map(|s| s.saved)
                .ok_or_else(|| anyhow!("segment {segment_id} is not in the feed"))?;
            let saved = !current;
            set_saved_flag(state.list.items_mut(), segment_id, saved);
            self.commit(&state).await;
            saved
        };

        match self.source.set_saved(segment_id, saved).await {
            Ok(()) => Ok(saved),
            Err(err) => {
                warn!("Reverting saved flag for {segment_id}: {err}");
                let mut state = self.state.lock().await;
                set_saved_flag(state.list.items_mut(), segment_id, !saved);
                self.commit(&state).await;
                Err(anyhow::Error::new(err).context("failed to update saved segments"))
            }
        }
    }

    /// Re-issues the page whose fetch failed.
    pub async fn retry(&self) -> FeedSnapshot {
        let pending = {
            let mut state = self.state.lock().await;
            let request = state.list.retry();
            if request.is_some() {
                self.commit(&state).await;
            }
            let scope = state.scope.clone();
            request.map(|req| (scope, req))
        };
        if let Some((scope, request)) = pending {
            self.load_page(scope, request).await;
        }
        self.snapshot().await
    }

    pub async fn script_loaded(&self) -> FeedSnapshot {
        self.deck.lock().await.script_loaded();
        self.snapshot_and_publish().await
    }

    pub async fn script_failed(&self, reason: &str) -> FeedSnapshot {
        self.deck.lock().await.script_failed(reason);
        self.snapshot_and_publish().await
    }

    async fn snapshot_and_publish(&self) -> FeedSnapshot {
        let snapshot = self.snapshot().await;
        self.publish(&snapshot);
        snapshot
    }

    /// Applies one player callback. Mute requests from a card come back here
    /// because the controller is the only writer of the mute flag.
    pub async fn player_event(&self, envelope: PlayerEnvelope) {
        let intent = self.deck.lock().await.dispatch(envelope);
        if let Some(PlayerIntent::ToggleMute) = intent {
            self.toggle_mute().await;
        }
    }

    /// Drains the player event queue and polls player positions until
    /// cancelled.
    pub async fn run_player_events(
        self,
        mut events: mpsc::UnboundedReceiver<PlayerEnvelope>,
        cancel: CancellationToken,
        poll_every: Duration,
    ) {
        let mut ticker = time::interval(poll_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                envelope = events.recv() => match envelope {
                    Some(envelope) => self.player_event(envelope).await,
                    None => break,
                },
                _ = ticker.tick() => self.deck.lock().await.tick(),
            }
        }

        self.deck.lock().await.clear();
        info!("Player event loop stopped");
    }
}

fn set_saved_flag(items: &mut [Segment], segment_id: &str, saved: bool) {
    for item in items.iter_mut().filter(|s| s.id == segment_id) {
        item.saved = saved;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingSink;
    use crate::feed::source::fake::FakeFeed;
    use crate::player::fake::{Call, FakeFactory};
    use crate::player::PlayerEvent;

    struct Harness {
        controller: FeedController<FakeFeed>,
        feed: Arc<FakeFeed>,
        factory: FakeFactory,
        sink: RecordingSink,
        _events: mpsc::UnboundedReceiver<PlayerEnvelope>,
    }

    fn harness(feed: FakeFeed) -> Harness {
        harness_with(feed, &ClientSettings::default())
    }

    fn harness_with(feed: FakeFeed, settings: &ClientSettings) -> Harness {
        let feed = Arc::new(feed);
        let factory = FakeFactory::default();
        let sink = RecordingSink::default();
        let (controller, events) = FeedController::new(
            feed.clone(),
            Arc::new(factory.clone()),
            Arc::new(sink.clone()),
            settings,
        );
        Harness {
            controller,
            feed,
            factory,
            sink,
            _events: events,
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn cursor_is_clamped_to_the_list() {
        let h = harness(FakeFeed::default().with_page(FeedType::Trending, 1, 3));
        let snapshot = h.controller.switch_feed(FeedType::Trending).await;
        assert_eq!(snapshot.active_index, Some(0));
        assert!(!snapshot.has_more);

        assert_eq!(h.controller.retreat().await.active_index, Some(0));
        for _ in 0..5 {
            h.controller.advance().await;
        }
        assert_eq!(h.controller.snapshot().await.active_index, Some(2));
        assert_eq!(h.controller.retreat().await.active_index, Some(1));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn empty_feed_has_no_active_index() {
        let h = harness(FakeFeed::default());
        let snapshot = h.controller.switch_feed(FeedType::Latest).await;
        assert_eq!(snapshot.active_index, None);
        assert!(!snapshot.has_more);
        assert_eq!(h.controller.advance().await.active_index, None);
        assert_eq!(h.feed.calls(FeedType::Latest, 2), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn one_lookahead_per_page_boundary() {
        let h = harness(
            FakeFeed::default()
                .with_page(FeedType::Trending, 1, 20)
                .with_page(FeedType::Trending, 2, 20),
        );
        h.controller.switch_feed(FeedType::Trending).await;

        for _ in 0..18 {
            h.controller.advance().await;
        }
        h.controller.settle().await;
        assert_eq!(h.feed.calls(FeedType::Trending, 2), 1);

        for _ in 0..2 {
            h.controller.advance().await;
        }
        h.controller.settle().await;
        let snapshot = h.controller.snapshot().await;
        assert_eq!(h.feed.calls(FeedType::Trending, 2), 1);
        assert_eq!(snapshot.items.len(), 40);
        assert_eq!(snapshot.active_index, Some(20));
        assert!(snapshot.has_more);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn short_page_stops_pagination() {
        let h = harness(FakeFeed::default().with_page(FeedType::Trending, 1, 19));
        let snapshot = h.controller.switch_feed(FeedType::Trending).await;
        assert!(!snapshot.has_more);
        for _ in 0..19 {
            h.controller.advance().await;
        }
        h.controller.settle().await;
        assert_eq!(h.feed.calls(FeedType::Trending, 2), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn superseded_feed_results_are_discarded() {
        let h = harness(
            FakeFeed::default()
                .with_page(FeedType::Trending, 1, 20)
                .with_page(FeedType::Latest, 1, 5),
        );
        let gate = h.feed.hold(FeedType::Trending, 1);

        let controller = h.controller.clone();
        let slow = tokio::spawn(async move { controller.switch_feed(FeedType::Trending).await });
        while h.feed.calls(FeedType::Trending, 1) == 0 {
            tokio::task::yield_now().await;
        }

        h.controller.switch_feed(FeedType::Latest).await;
        gate.notify_one();
        slow.await.unwrap();

        let snapshot = h.controller.snapshot().await;
        assert_eq!(snapshot.feed_type, FeedType::Latest);
        assert_eq!(snapshot.items.len(), 5);
        assert!(snapshot.items.iter().all(|s| s.id.starts_with("latest-")));
        assert_eq!(snapshot.active_index, Some(0));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn category_scope_follows_the_session() {
        let h = harness(
            FakeFeed::default()
                .with_page(FeedType::Trending, 1, 20)
                .with_page(FeedType::Trending, 2, 3),
        );
        let snapshot = h
            .controller
            .open_feed(FeedType::Trending, Some("leadership".into()))
            .await;
        assert_eq!(snapshot.category.as_deref(), Some("leadership"));

        for _ in 0..17 {
            h.controller.advance().await;
        }
        h.controller.settle().await;
        let snapshot = h.controller.switch_feed(FeedType::Trending).await;
        assert_eq!(snapshot.category, None);
        assert_eq!(
            *h.feed.categories.lock().unwrap(),
            vec![Some("leadership".to_string()), Some("leadership".to_string()), None]
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn oversized_lookahead_prefetches_without_overflow() {
        let settings = ClientSettings {
            lookahead_threshold: usize::MAX,
            ..ClientSettings::default()
        };
        let h = harness_with(
            FakeFeed::default()
                .with_page(FeedType::Latest, 1, 20)
                .with_page(FeedType::Latest, 2, 20),
            &settings,
        );
        h.controller.switch_feed(FeedType::Latest).await;
        h.controller.advance().await;
        h.controller.settle().await;
        assert_eq!(h.feed.calls(FeedType::Latest, 2), 1);
        assert_eq!(h.controller.snapshot().await.items.len(), 40);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failed_save_is_reverted() {
        let h = harness(FakeFeed::default().with_page(FeedType::Trending, 1, 2));
        h.controller.switch_feed(FeedType::Trending).await;
        let id = "trending-1-0";

        assert!(h.controller.toggle_saved(id).await.unwrap());
        assert!(h.controller.snapshot().await.items[0].saved);

        *h.feed.fail_saves.lock().unwrap() = true;
        assert!(h.controller.toggle_saved(id).await.is_err());
        assert!(h.controller.snapshot().await.items[0].saved);
        assert_eq!(
            *h.feed.saves.lock().unwrap(),
            vec![(id.to_string(), true), (id.to_string(), false)]
        );

        assert!(h.controller.toggle_saved("missing").await.is_err());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failed_page_surfaces_an_error_and_retries() {
        let h = harness(FakeFeed::default().with_page(FeedType::Trending, 1, 4));
        h.feed.fail_page(FeedType::Trending, 1, 1);

        let snapshot = h.controller.switch_feed(FeedType::Trending).await;
        assert!(snapshot.error.is_some());
        assert!(snapshot.items.is_empty());

        let snapshot = h.controller.retry().await;
        assert!(snapshot.error.is_none());
        assert_eq!(snapshot.items.len(), 4);
        assert_eq!(snapshot.active_index, Some(0));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn wheel_input_respects_the_cooldown() {
        let h = harness(FakeFeed::default().with_page(FeedType::Trending, 1, 5));
        h.controller.switch_feed(FeedType::Trending).await;
        let t0 = Instant::now();
        let wheel = |delta_y| FeedInput::Wheel { delta_y };

        let s = h.controller.handle_input(wheel(120.0), t0).await;
        assert_eq!(s.active_index, Some(1));
        let s = h
            .controller
            .handle_input(wheel(120.0), t0 + Duration::from_millis(300))
            .await;
        assert_eq!(s.active_index, Some(1));
        let s = h
            .controller
            .handle_input(wheel(120.0), t0 + Duration::from_millis(600))
            .await;
        assert_eq!(s.active_index, Some(2));

        let key = FeedInput::Key { key: "k".into() };
        assert_eq!(h.controller.handle_input(key, t0).await.active_index, Some(1));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn mute_before_any_player_is_ready_reaches_the_next_one() {
        let h = harness(FakeFeed::default().with_page(FeedType::Trending, 1, 3));
        h.controller.switch_feed(FeedType::Trending).await;
        let snapshot = h.controller.toggle_mute().await;
        assert!(!snapshot.muted);
        assert_eq!(h.factory.total_calls(), 0);

        h.controller.script_loaded().await;
        let active = h.controller.snapshot().await.player.bindings[0].id;
        h.controller
            .player_event(PlayerEnvelope {
                binding: active,
                event: PlayerEvent::Ready,
            })
            .await;
        assert_eq!(
            h.factory.calls_for(&format!("player-{active}")),
            vec![Call::Unmute, Call::Seek(10.0), Call::Play]
        );

        h.controller
            .player_event(PlayerEnvelope {
                binding: active,
                event: PlayerEvent::MuteToggle,
            })
            .await;
        assert!(h.controller.snapshot().await.muted);
        assert_eq!(
            h.factory.calls_for(&format!("player-{active}")).last(),
            Some(&Call::Mute)
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn state_changes_are_published() {
        let h = harness(FakeFeed::default().with_page(FeedType::Recommended, 1, 2));
        h.controller.switch_feed(FeedType::Recommended).await;
        h.controller.advance().await;

        let published = h.sink.named(FEED_STATE_CHANGED);
        let last = published.last().unwrap();
        assert_eq!(last["feed_type"], "recommended");
        assert_eq!(last["active_index"], 1);
        assert_eq!(last["items"][0]["id"], "random-1-0");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn event_loop_stops_on_cancel_and_unmounts_players() {
        let h = harness(FakeFeed::default().with_page(FeedType::Trending, 1, 3));
        let (controller, events) = (h.controller.clone(), h._events);
        controller.script_loaded().await;
        controller.switch_feed(FeedType::Trending).await;
        let sender = controller.player_sender().await;
        let active = controller.snapshot().await.player.bindings[0].id;

        let cancel = CancellationToken::new();
        let pump = tokio::spawn(controller.clone().run_player_events(
            events,
            cancel.clone(),
            Duration::from_millis(50),
        ));
        sender
            .send(PlayerEnvelope {
                binding: active,
                event: PlayerEvent::Ready,
            })
            .unwrap();
        while h.factory.calls_for(&format!("player-{active}")).is_empty() {
            tokio::task::yield_now().await;
        }

        cancel.cancel();
        pump.await.unwrap();
        assert!(controller.snapshot().await.player.bindings.is_empty());
        assert_eq!(
            h.factory.calls_for(&format!("player-{active}")).last(),
            Some(&Call::Destroy)
        );
    }
}
