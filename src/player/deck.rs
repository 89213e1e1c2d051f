use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::binding::{BindingId, BindingSnapshot, PlayerBinding, PlayerIntent};
use super::instance::{PlayerEvent, PlayerFactory};
use crate::models::Segment;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptStatus {
    Pending,
    Loaded,
    Failed,
}

/// A player callback addressed to one binding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerEnvelope {
    pub binding: BindingId,
    pub event: PlayerEvent,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeckSnapshot {
    pub script: ScriptStatus,
    pub muted: bool,
    pub bindings: Vec<BindingSnapshot>,
}

/// All player bindings of one feed: the cards within `retain_radius` of the
/// active index. Bindings outside the window are destroyed.
pub struct PlayerDeck {
    factory: Arc<dyn PlayerFactory>,
    script: ScriptStatus,
    script_error: Option<String>,
    bindings: BTreeMap<BindingId, PlayerBinding>,
    next_id: BindingId,
    retain_radius: usize,
    muted: bool,
    events: mpsc::UnboundedSender<PlayerEnvelope>,
}

impl PlayerDeck {
    pub fn new(
        factory: Arc<dyn PlayerFactory>,
        retain_radius: usize,
        muted: bool,
    ) -> (Self, mpsc::UnboundedReceiver<PlayerEnvelope>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let deck = Self {
            factory,
            script: ScriptStatus::Pending,
            script_error: None,
            bindings: BTreeMap::new(),
            next_id: 1,
            retain_radius,
            muted,
            events,
        };
        (deck, receiver)
    }

    /// Handle for queueing callbacks from outside the deck.
    pub fn sender(&self) -> mpsc::UnboundedSender<PlayerEnvelope> {
        self.events.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn binding(&self, id: BindingId) -> Option<&PlayerBinding> {
        self.bindings.get(&id)
    }

    pub fn binding_for_slot(&self, slot: usize) -> Option<&PlayerBinding> {
        self.bindings.values().find(|b| b.slot() == slot)
    }

    /// Mounts bindings for the window around `active` and unmounts the rest.
    /// A binding survives as long as its slot still holds the same segment.
    pub fn sync(&mut self, items: &[Segment], active: Option<usize>) {
        let window = match active {
            Some(index) if index < items.len() => {
                let first = index.saturating_sub(self.retain_radius);
                let last = index.saturating_add(self.retain_radius).min(items.len() - 1);
                first..=last
            }
            _ => {
                self.clear();
                return;
            }
        };

        let stale: Vec<BindingId> = self
            .bindings
            .values()
            .filter(|b| {
                !window.contains(&b.slot())
                    || items.get(b.slot()).map(|s| s.id.as_str()) != Some(b.segment_id())
            })
            .map(|b| b.id())
            .collect();
        for id in stale {
            self.unmount(id);
        }

        for slot in window {
            if self.binding_for_slot(slot).is_none() {
                self.mount(slot, &items[slot]);
            }
        }

        for binding in self.bindings.values_mut() {
            binding.set_active(Some(binding.slot()) == active);
        }
    }

    fn mount(&mut self, slot: usize, segment: &Segment) {
        let id = self.next_id;
        self.next_id += 1;
        let mut binding = PlayerBinding::new(id, slot, segment, self.muted);
        match self.script {
            ScriptStatus::Loaded => binding.attach(self.factory.as_ref()),
            ScriptStatus::Failed => binding.fail(self.script_failure()),
            ScriptStatus::Pending => {}
        }
        log_debug!("Mounted binding {id} for segment {} at slot {slot}", segment.id);
        self.bindings.insert(id, binding);
    }

    fn unmount(&mut self, id: BindingId) {
        if let Some(mut binding) = self.bindings.remove(&id) {
            log_debug!("Unmounting binding {id} for segment {}", binding.segment_id());
            binding.destroy();
        }
    }

    /// Destroys every binding, e.g. when the feed type changes.
    pub fn clear(&mut self) {
        let ids: Vec<BindingId> = self.bindings.keys().copied().collect();
        for id in ids {
            self.unmount(id);
        }
    }

    pub fn script_loaded(&mut self) {
        if self.script == ScriptStatus::Loaded {
            return;
        }
        log_info!("Player script loaded, attaching {} bindings", self.bindings.len());
        self.script = ScriptStatus::Loaded;
        self.script_error = None;
        let factory = self.factory.clone();
        for binding in self.bindings.values_mut() {
            binding.attach(factory.as_ref());
        }
    }

    pub fn script_failed(&mut self, reason: &str) {
        log_warn!("Player script failed to load: {reason}");
        self.script = ScriptStatus::Failed;
        self.script_error = Some(reason.to_string());
        let failure = self.script_failure();
        for binding in self.bindings.values_mut() {
            if !binding.has_instance() {
                binding.fail(failure.clone());
            }
        }
    }

    fn script_failure(&self) -> String {
        match &self.script_error {
            Some(reason) => format!("player script unavailable: {reason}"),
            None => "player script unavailable".to_string(),
        }
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        for binding in self.bindings.values_mut() {
            binding.set_muted(muted);
        }
    }

    /// Routes one callback to its binding. Callbacks for bindings that are
    /// already gone are dropped.
    pub fn dispatch(&mut self, envelope: PlayerEnvelope) -> Option<PlayerIntent> {
        match self.bindings.get_mut(&envelope.binding) {
            Some(binding) => binding.handle(envelope.event),
            None => {
                log_debug!(
                    "Dropping {:?} for unmounted binding {}",
                    envelope.event,
                    envelope.binding
                );
                None
            }
        }
    }

    pub fn tick(&mut self) {
        for binding in self.bindings.values_mut() {
            binding.tick();
        }
    }

    pub fn snapshot(&self) -> DeckSnapshot {
        DeckSnapshot {
            script: self.script,
            muted: self.muted,
            bindings: self.bindings.values().map(PlayerBinding::snapshot).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sample_segment;
    use crate::player::binding::BindingState;
    use crate::player::instance::fake::{Call, FakeFactory};

    fn feed(n: usize) -> Vec<Segment> {
        (0..n)
            .map(|i| sample_segment(&format!("s{i}"), 10.0, 40.0))
            .collect()
    }

    fn slots(deck: &PlayerDeck) -> Vec<usize> {
        let mut slots: Vec<usize> = deck.snapshot().bindings.iter().map(|b| b.slot).collect();
        slots.sort_unstable();
        slots
    }

    #[test]
    fn window_follows_the_active_index() {
        let factory = FakeFactory::default();
        let (mut deck, _rx) = PlayerDeck::new(Arc::new(factory.clone()), 1, true);
        deck.script_loaded();
        let items = feed(5);

        deck.sync(&items, Some(0));
        assert_eq!(slots(&deck), vec![0, 1]);
        let first = deck.binding_for_slot(0).unwrap().id();

        deck.sync(&items, Some(2));
        assert_eq!(slots(&deck), vec![1, 2, 3]);
        assert!(deck.binding(first).is_none());
        assert_eq!(
            factory.calls_for(&format!("player-{first}")),
            vec![Call::Destroy]
        );

        let active: Vec<usize> = deck
            .snapshot()
            .bindings
            .iter()
            .filter(|b| b.active)
            .map(|b| b.slot)
            .collect();
        assert_eq!(active, vec![2]);

        deck.sync(&[], None);
        assert!(deck.is_empty());
    }

    #[test]
    fn huge_radius_keeps_the_whole_feed_mounted() {
        let factory = FakeFactory::default();
        let (mut deck, _rx) = PlayerDeck::new(Arc::new(factory), usize::MAX, true);
        deck.sync(&feed(4), Some(2));
        assert_eq!(slots(&deck), vec![0, 1, 2, 3]);
    }

    #[test]
    fn refused_player_becomes_a_placeholder() {
        let factory = FakeFactory {
            refuse: true,
            ..FakeFactory::default()
        };
        let (mut deck, _rx) = PlayerDeck::new(Arc::new(factory.clone()), 1, true);
        deck.script_loaded();
        deck.sync(&feed(2), Some(0));

        let binding = deck.binding_for_slot(0).unwrap();
        assert!(matches!(binding.state(), BindingState::Failed(_)));
        assert!(!binding.has_instance());
        assert_eq!(factory.total_calls(), 0);
    }

    #[test]
    fn bindings_mounted_before_the_script_attach_when_it_loads() {
        let factory = FakeFactory::default();
        let (mut deck, _rx) = PlayerDeck::new(Arc::new(factory.clone()), 1, true);
        deck.sync(&feed(3), Some(0));
        assert!(deck.snapshot().bindings.iter().all(|b| b.state == BindingState::Uninitialized));
        assert_eq!(factory.total_calls(), 0);

        deck.script_loaded();
        let id = deck.binding_for_slot(0).unwrap().id();
        deck.dispatch(PlayerEnvelope {
            binding: id,
            event: PlayerEvent::Ready,
        });
        assert_eq!(
            factory.calls_for(&format!("player-{id}")),
            vec![Call::Mute, Call::Seek(10.0), Call::Play]
        );
    }

    #[test]
    fn script_failure_leaves_placeholders() {
        let factory = FakeFactory::default();
        let (mut deck, _rx) = PlayerDeck::new(Arc::new(factory.clone()), 1, true);
        deck.sync(&feed(3), Some(1));
        deck.script_failed("network error");

        let snapshot = deck.snapshot();
        assert_eq!(snapshot.script, ScriptStatus::Failed);
        assert_eq!(snapshot.bindings.len(), 3);
        assert!(snapshot
            .bindings
            .iter()
            .all(|b| matches!(b.state, BindingState::Failed(_))));

        deck.sync(&feed(4), Some(2));
        let mounted = deck.binding_for_slot(3).unwrap();
        assert!(matches!(mounted.state(), BindingState::Failed(_)));
        assert_eq!(factory.total_calls(), 0);
    }

    #[test]
    fn late_events_for_unmounted_bindings_are_dropped() {
        let factory = FakeFactory::default();
        let (mut deck, _rx) = PlayerDeck::new(Arc::new(factory.clone()), 0, true);
        deck.script_loaded();
        let items = feed(3);
        deck.sync(&items, Some(0));
        let gone = deck.binding_for_slot(0).unwrap().id();
        deck.sync(&items, Some(1));

        let before = factory.total_calls();
        assert!(deck
            .dispatch(PlayerEnvelope {
                binding: gone,
                event: PlayerEvent::Ready,
            })
            .is_none());
        assert_eq!(factory.total_calls(), before);
    }

    #[test]
    fn mute_reaches_only_the_ready_active_binding() {
        let factory = FakeFactory::default();
        let (mut deck, _rx) = PlayerDeck::new(Arc::new(factory.clone()), 1, true);
        deck.script_loaded();
        deck.sync(&feed(3), Some(1));
        let active = deck.binding_for_slot(1).unwrap().id();
        let neighbour = deck.binding_for_slot(2).unwrap().id();

        deck.set_muted(false);
        assert_eq!(factory.total_calls(), 0);

        for id in [active, neighbour] {
            deck.dispatch(PlayerEnvelope {
                binding: id,
                event: PlayerEvent::Ready,
            });
        }
        deck.set_muted(true);

        assert_eq!(
            factory.calls_for(&format!("player-{active}")),
            vec![Call::Unmute, Call::Seek(10.0), Call::Play, Call::Mute]
        );
        assert_eq!(
            factory.calls_for(&format!("player-{neighbour}")),
            vec![Call::Unmute]
        );
    }
}
