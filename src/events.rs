use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 64;

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Entry<T> {
    id: u64,
    active: Arc<AtomicBool>,
    listener: Listener<T>,
}

type Entries<T> = Mutex<Vec<Entry<T>>>;

struct Dispatch<T> {
    delivering: bool,
    backlog: VecDeque<T>,
}

/// Clears the delivering flag even if a listener panics.
struct DeliveringGuard<'a, T> {
    dispatch: &'a RefCell<Dispatch<T>>,
}

impl<T> Drop for DeliveringGuard<'_, T> {
    fn drop(&mut self) {
        let mut dispatch = self.dispatch.borrow_mut();
        dispatch.delivering = false;
        dispatch.backlog.clear();
    }
}

/// Synchronous multicast fan-out.
///
/// `publish` calls every registered listener on the caller's thread, in
/// registration order, before returning. Dispatch is serialized across
/// threads by a re-entrant lock. A listener may publish on the same bus:
/// the nested event is queued and delivered after the current pass, so
/// every listener sees events in publish order. Every event is also
/// forwarded to a `tokio::sync::broadcast` channel for async observers.
///
/// A [latest-only](EventBus::latest_only) bus carries state snapshots: a
/// nested publish replaces whatever is waiting, and the pass in progress
/// stops before any remaining listener is handed the outdated event.
pub struct EventBus<T> {
    entries: Arc<Entries<T>>,
    next_id: AtomicU64,
    latest_only: bool,
    dispatch: ReentrantMutex<RefCell<Dispatch<T>>>,
    tx: broadcast::Sender<T>,
}

/// Handle returned by [`EventBus::subscribe`].
///
/// Dropping the handle keeps the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[must_use = "dropping a Subscription does not unsubscribe; keep it to call unsubscribe()"]
pub struct Subscription {
    active: Arc<AtomicBool>,
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.active.store(false, Ordering::Release);
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Token that lets a listener unsubscribe itself from inside its own
    /// invocation, where the `Subscription` is not reachable.
    pub fn cancel_token(&self) -> CancelToken {
        CancelToken {
            active: Arc::clone(&self.active),
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

/// Deactivates a listener without removing its slot; the slot is pruned on
/// the next publish.
#[derive(Debug, Clone)]
pub struct CancelToken {
    active: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn cancel(&self) {
        self.active.store(false, Ordering::Release);
    }
}

impl<T> EventBus<T>
where
    T: Clone + Send + 'static,
{
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(0),
            latest_only: false,
            dispatch: ReentrantMutex::new(RefCell::new(Dispatch {
                delivering: false,
                backlog: VecDeque::new(),
            })),
            tx,
        }
    }

    /// Only the newest event matters; superseded events are not delivered to
    /// listeners that have not seen them yet.
    #[must_use]
    pub fn latest_only(mut self) -> Self {
        self.latest_only = true;
        self
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let _dispatch = self.dispatch.lock();
        self.register(Arc::new(listener))
    }

    /// Registers `listener` and, inside the same dispatch section, hands it
    /// the event produced by `replay` (if any). No other publish can slip
    /// between registration and replay.
    pub fn subscribe_with_replay<F, R>(&self, listener: F, replay: R) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
        R: FnOnce() -> Option<T>,
    {
        let _dispatch = self.dispatch.lock();
        let listener: Listener<T> = Arc::new(listener);
        let subscription = self.register(Arc::clone(&listener));
        if let Some(event) = replay() {
            listener(&event);
        }
        subscription
    }

    pub fn publish(&self, event: T) {
        self.publish_with(move || event);
    }

    /// Builds the event inside the dispatch section. Use this when the event
    /// reflects shared state, so the state read and the delivery cannot be
    /// interleaved with another publisher.
    pub fn publish_with<F>(&self, make: F)
    where
        F: FnOnce() -> T,
    {
        self.publish_if(move || Some(make()));
    }

    /// Like [`EventBus::publish_with`], but `make` may decide that nothing
    /// needs to be published.
    pub fn publish_if<F>(&self, make: F)
    where
        F: FnOnce() -> Option<T>,
    {
        self.publish_returning(move || (make(), ()));
    }

    /// Runs `make` inside the dispatch section, publishes the event it
    /// produced (if any) and hands back its other result.
    pub fn publish_returning<F, R>(&self, make: F) -> R
    where
        F: FnOnce() -> (Option<T>, R),
    {
        let dispatch = self.dispatch.lock();
        let (event, result) = make();
        let Some(event) = event else {
            return result;
        };

        if dispatch.borrow().delivering {
            let mut state = dispatch.borrow_mut();
            if self.latest_only {
                state.backlog.clear();
            }
            state.backlog.push_back(event);
            return result;
        }

        dispatch.borrow_mut().delivering = true;
        let _guard = DeliveringGuard {
            dispatch: &dispatch,
        };
        let superseded = || self.latest_only && !dispatch.borrow().backlog.is_empty();
        let mut next = Some(event);
        while let Some(event) = next {
            self.deliver(&event, &superseded);
            next = dispatch.borrow_mut().backlog.pop_front();
        }
        result
    }

    /// Async observer channel. Lagging receivers lose the oldest events.
    pub fn receiver(&self) -> broadcast::Receiver<T> {
        self.tx.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|entry| entry.active.load(Ordering::Acquire))
            .count()
    }

    fn register(&self, listener: Listener<T>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Entry {
                id,
                active: Arc::clone(&active),
                listener,
            });

        let weak: Weak<Entries<T>> = Arc::downgrade(&self.entries);
        Subscription {
            active,
            detach: Some(Box::new(move || {
                if let Some(entries) = weak.upgrade() {
                    entries
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .retain(|entry| entry.id != id);
                }
            })),
        }
    }

    fn deliver(&self, event: &T, superseded: &dyn Fn() -> bool) {
        let snapshot: Vec<(Arc<AtomicBool>, Listener<T>)> = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.retain(|entry| entry.active.load(Ordering::Acquire));
            entries
                .iter()
                .map(|entry| (Arc::clone(&entry.active), Arc::clone(&entry.listener)))
                .collect()
        };

        // Listeners removed by an earlier listener in this pass are skipped.
        for (active, listener) in snapshot {
            if superseded() {
                return;
            }
            if active.load(Ordering::Acquire) {
                listener(event);
            }
        }
        if superseded() {
            return;
        }

        // No async receivers is fine.
        let _ = self.tx.send(event.clone());
    }
}

impl<T> Default for EventBus<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
