//! The optimistic cart store.
//!
//! Single source of truth for what the user currently believes the cart
//! contains, reconciled against the backend. Mutations apply to local state
//! immediately for instant feedback; quantity changes are debounced per line
//! before the gateway sees them, removals go out right away. Every gateway
//! response is a full snapshot that replaces local state wholesale.
//!
//! Responses apply in completion order, not request order. Busy markers and
//! pending optimistic targets live outside the snapshot, so a replacement
//! cannot strand an in-flight flag, and a line the user is still editing
//! keeps showing the latest input even when an older response lands first.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

use tidepool_core::{CartSnapshot, CurrencyCode, LineId, VariantId};

use crate::config::CartSyncConfig;
use crate::debounce::Debouncer;
use crate::error::CartError;
use crate::gateway::RemoteCartGateway;

/// Notification emitted by the store for its host UI.
///
/// The host reads the snapshot via [`CartStore::snapshot`] and uses these to
/// know when to re-render and when to show a one-shot failure notice.
#[derive(Debug)]
pub enum CartEvent {
    /// The snapshot changed: an optimistic edit, an accepted reconciliation,
    /// a rollback, or a clear.
    SnapshotChanged,
    /// A mutation failed and local state was restored. Emitted exactly once
    /// per failure. `item_id` is absent for add failures (the line never
    /// existed locally).
    MutationFailed {
        item_id: Option<LineId>,
        error: CartError,
    },
}

/// In-flight mutation marker for one line.
///
/// A line has at most one marker; scheduling a removal overwrites a pending
/// update marker, never the other way around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Busy {
    Updating,
    Deleting,
}

/// Mutable store state, guarded by one mutex and never held across an await.
struct CartState {
    /// What the UI currently shows, including optimistic edits.
    local: CartSnapshot,
    /// Last snapshot accepted from the gateway; rollback source. Totals are
    /// only ever taken from here, never from optimistic local quantities.
    authoritative: CartSnapshot,
    /// In-flight mutation markers, keyed by line.
    busy: HashMap<LineId, Busy>,
    /// Latest optimistic quantity per line whose reconciliation has not
    /// settled. Re-stamped onto `local` whenever a snapshot is accepted, so
    /// an older response cannot clobber a newer edit.
    pending_target: HashMap<LineId, u32>,
    /// Bumped by [`CartStore::clear_cart`]; a response issued under an older
    /// epoch is discarded on arrival.
    epoch: u64,
}

/// Optimistic cart store. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    gateway: Arc<dyn RemoteCartGateway>,
    debouncer: Debouncer<LineId>,
    config: CartSyncConfig,
    state: Mutex<CartState>,
    events: mpsc::UnboundedSender<CartEvent>,
}

impl CartStore {
    /// Create a store bound to a gateway, plus the event stream for the host
    /// UI. The store starts empty; call [`fetch_cart`](Self::fetch_cart) to
    /// populate it.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn RemoteCartGateway>,
        config: CartSyncConfig,
    ) -> (Self, mpsc::UnboundedReceiver<CartEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let store = Self {
            inner: Arc::new(StoreInner {
                gateway,
                debouncer: Debouncer::new(),
                config,
                state: Mutex::new(CartState {
                    local: CartSnapshot::empty(CurrencyCode::default()),
                    authoritative: CartSnapshot::empty(CurrencyCode::default()),
                    busy: HashMap::new(),
                    pending_target: HashMap::new(),
                    epoch: 0,
                }),
                events,
            }),
        };
        (store, receiver)
    }

    /// Current snapshot with busy flags stamped onto the lines.
    ///
    /// The view layer only reads this; it never mutates cart state directly.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        let state = self.lock_state();
        let mut snapshot = state.local.clone();
        for item in &mut snapshot.items {
            match state.busy.get(&item.id) {
                Some(Busy::Updating) => item.is_updating = true,
                Some(Busy::Deleting) => item.is_deleting = true,
                None => {}
            }
        }
        snapshot
    }

    /// Replace the snapshot with the gateway's authoritative cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Fetch`] on failure; the previous snapshot is
    /// retained, never silently cleared.
    #[instrument(skip(self))]
    pub async fn fetch_cart(&self) -> Result<(), CartError> {
        let epoch = self.lock_state().epoch;
        match self.inner.gateway.fetch().await {
            Ok(snapshot) => {
                self.accept_snapshot(epoch, snapshot);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "cart fetch failed, keeping previous snapshot");
                Err(CartError::Fetch(err))
            }
        }
    }

    /// Change a line's quantity with optimistic local feedback.
    ///
    /// The local quantity (and display subtotal) updates immediately and the
    /// line is marked updating; the gateway call is debounced so a burst of
    /// changes within the quiet window sends only the last value. Success
    /// and failure of the deferred reconciliation surface on the event
    /// stream.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidQuantity`] for quantity 0 and
    /// [`CartError::UnknownItem`] for a line not in the snapshot; neither
    /// reaches the network.
    #[instrument(skip(self), fields(item = %item_id))]
    pub fn set_quantity(&self, item_id: &LineId, quantity: u32) -> Result<(), CartError> {
        if quantity < 1 {
            return Err(CartError::InvalidQuantity(quantity));
        }

        {
            let mut state = self.lock_state();
            if state.busy.get(item_id) == Some(&Busy::Deleting) {
                // Removal in flight supersedes; the line is going away.
                debug!("ignoring quantity change during removal");
                return Ok(());
            }
            let Some(item) = state.local.line_mut(item_id) else {
                return Err(CartError::UnknownItem(item_id.clone()));
            };
            item.quantity = quantity;
            // Display-only; the cart totals stay authoritative until the
            // gateway confirms.
            item.subtotal = item.unit_price.times(quantity);
            state.busy.insert(item_id.clone(), Busy::Updating);
            state.pending_target.insert(item_id.clone(), quantity);
        }
        self.emit(CartEvent::SnapshotChanged);

        let store = self.clone();
        let id = item_id.clone();
        self.inner.debouncer.schedule(
            item_id.clone(),
            quantity,
            self.inner.config.debounce_delay,
            move |target| async move {
                store.reconcile_quantity(id, target).await;
            },
        );
        Ok(())
    }

    /// Remove a line from the cart.
    ///
    /// Issued immediately, no debounce: removal is a discrete, rare action
    /// where immediacy of intent matters more than coalescing. Any pending
    /// quantity timer for the line is invalidated first so a stale update
    /// cannot fire after (or racing with) the removal.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::UnknownItem`] for a line not in the snapshot,
    /// [`CartError::MutationRejected`] or [`CartError::Network`] if the
    /// gateway fails; the line then remains with its flag cleared.
    #[instrument(skip(self), fields(item = %item_id))]
    pub async fn remove_item(&self, item_id: &LineId) -> Result<(), CartError> {
        {
            let mut state = self.lock_state();
            if state.local.line(item_id).is_none() {
                return Err(CartError::UnknownItem(item_id.clone()));
            }
            state.busy.insert(item_id.clone(), Busy::Deleting);
            state.pending_target.remove(item_id);
        }
        self.inner.debouncer.cancel(item_id);
        self.emit(CartEvent::SnapshotChanged);

        let epoch = self.lock_state().epoch;
        match self.inner.gateway.remove(item_id).await {
            Ok(snapshot) => {
                self.lock_state().busy.remove(item_id);
                self.accept_snapshot(epoch, snapshot);
                Ok(())
            }
            Err(err) => {
                let error = CartError::from_mutation(err);
                warn!(error = %error, "removal failed, line retained");
                {
                    let mut state = self.lock_state();
                    if state.busy.get(item_id) == Some(&Busy::Deleting) {
                        state.busy.remove(item_id);
                    }
                }
                self.emit(CartEvent::SnapshotChanged);
                self.emit(CartEvent::MutationFailed {
                    item_id: Some(item_id.clone()),
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    /// Add a product variant to the cart, immediately.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidQuantity`] for quantity 0, otherwise the
    /// mapped gateway failure. No optimistic line is inserted; the line
    /// appears when the gateway's snapshot is accepted.
    #[instrument(skip(self), fields(variant = %variant_id))]
    pub async fn add_item(&self, variant_id: &VariantId, quantity: u32) -> Result<(), CartError> {
        if quantity < 1 {
            return Err(CartError::InvalidQuantity(quantity));
        }

        let epoch = self.lock_state().epoch;
        match self.inner.gateway.add(variant_id, quantity).await {
            Ok(snapshot) => {
                self.accept_snapshot(epoch, snapshot);
                Ok(())
            }
            Err(err) => {
                let error = CartError::from_mutation(err);
                warn!(error = %error, "add to cart failed");
                self.emit(CartEvent::MutationFailed {
                    item_id: None,
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    /// Reset local state to an empty cart without calling the gateway.
    ///
    /// Used after an external event (e.g. checkout) has already emptied the
    /// cart server-side. Pending debounces are invalidated and busy markers
    /// dropped.
    #[instrument(skip(self))]
    pub fn clear_cart(&self) {
        self.inner.debouncer.cancel_all();
        {
            let mut state = self.lock_state();
            let currency = state.local.total_amount.currency_code;
            state.local = CartSnapshot::empty(currency);
            state.authoritative = CartSnapshot::empty(currency);
            state.busy.clear();
            state.pending_target.clear();
            // Responses still in flight belong to the cart that was cleared;
            // the epoch bump makes them dead on arrival.
            state.epoch += 1;
        }
        self.emit(CartEvent::SnapshotChanged);
    }

    /// Deferred gateway call for a debounced quantity change.
    async fn reconcile_quantity(&self, item_id: LineId, quantity: u32) {
        debug!(item = %item_id, quantity, "sending debounced quantity change");
        let epoch = self.lock_state().epoch;
        let outcome = self.inner.gateway.set_quantity(&item_id, quantity).await;

        // A newer edit made while this call was in flight still owns the
        // updating marker and the displayed value, whether its timer is
        // still pending or its own request is already out. Its resolution
        // settles line state, not this one. A cleared cart supersedes too.
        let superseded = self.inner.debouncer.is_pending(&item_id) || {
            let state = self.lock_state();
            state.epoch != epoch || state.pending_target.get(&item_id) != Some(&quantity)
        };

        match outcome {
            Ok(snapshot) => {
                if !superseded {
                    let mut state = self.lock_state();
                    // A removal that started while this call was in flight
                    // owns the marker now; leave it for that path to clear.
                    if state.busy.get(&item_id) == Some(&Busy::Updating) {
                        state.busy.remove(&item_id);
                        state.pending_target.remove(&item_id);
                    }
                }
                self.accept_snapshot(epoch, snapshot);
            }
            Err(err) => {
                let error = CartError::from_mutation(err);
                warn!(item = %item_id, error = %error, "quantity change failed, rolling back");
                if !superseded {
                    self.rollback_quantity(&item_id);
                }
                self.emit(CartEvent::MutationFailed {
                    item_id: Some(item_id),
                    error,
                });
            }
        }
    }

    /// Accept an authoritative snapshot from the gateway.
    ///
    /// Replaces both the local and the rollback snapshot wholesale; totals
    /// are recomputed from the accepted lines. Busy markers for lines the
    /// backend no longer reports are dropped so nothing stays stuck, and
    /// lines with an unsettled edit get their optimistic quantity stamped
    /// back so the display keeps the user's latest input. A snapshot issued
    /// before the cart was cleared is discarded.
    fn accept_snapshot(&self, epoch: u64, mut snapshot: CartSnapshot) {
        snapshot.recompute_totals();
        {
            let mut state = self.lock_state();
            if state.epoch != epoch {
                debug!("discarding response issued before the cart was cleared");
                return;
            }
            state.busy.retain(|id, _| snapshot.line(id).is_some());
            state
                .pending_target
                .retain(|id, _| snapshot.line(id).is_some());
            state.local = snapshot.clone();
            state.authoritative = snapshot;

            let targets: Vec<(LineId, u32)> = state
                .pending_target
                .iter()
                .map(|(id, target)| (id.clone(), *target))
                .collect();
            for (id, target) in targets {
                if let Some(item) = state.local.line_mut(&id) {
                    item.quantity = target;
                    item.subtotal = item.unit_price.times(target);
                }
            }
        }
        self.emit(CartEvent::SnapshotChanged);
    }

    /// Snap a line back to its last authoritative value after a failed
    /// quantity change, clearing its updating marker.
    fn rollback_quantity(&self, item_id: &LineId) {
        {
            let mut state = self.lock_state();
            if state.busy.get(item_id) == Some(&Busy::Updating) {
                state.busy.remove(item_id);
                state.pending_target.remove(item_id);
            }
            let confirmed = state
                .authoritative
                .line(item_id)
                .map(|line| (line.quantity, line.subtotal));
            if let Some((quantity, subtotal)) = confirmed {
                if let Some(item) = state.local.line_mut(item_id) {
                    item.quantity = quantity;
                    item.subtotal = subtotal;
                }
            }
        }
        self.emit(CartEvent::SnapshotChanged);
    }

    fn lock_state(&self) -> MutexGuard<'_, CartState> {
        self.inner.state.lock().expect("cart state poisoned")
    }

    fn emit(&self, event: CartEvent) {
        if self.inner.events.send(event).is_err() {
            debug!("cart event receiver dropped");
        }
    }
}
