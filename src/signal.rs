use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

/// Capacity of the async notification channel. Notifications carry no
/// payload, so a lagged receiver only misses redundant wake-ups.
const SUBSCRIBER_CAPACITY: usize = 16;

type Slot = Arc<dyn Fn() + Send + Sync>;

/// Token identifying one connection on a [`ChangeSignal`].
///
/// Ids are unique per signal and never reused, so disconnecting a stale
/// token can never detach someone else's callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

struct SignalInner {
    next_id: u64,
    slots: Vec<(ConnectionId, Slot)>,
}

/// One-to-many change notification with no payload.
///
/// Listeners either `connect` a callback (invoked synchronously on
/// `emit`) or `subscribe` for an async receiver. Either way a listener is
/// expected to re-query the source rather than read anything from the
/// notification itself.
///
/// Clones share the same underlying channel.
#[derive(Clone)]
pub struct ChangeSignal {
    inner: Arc<Mutex<SignalInner>>,
    tx: broadcast::Sender<()>,
}

impl Default for ChangeSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChangeSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeSignal")
            .field("listeners", &self.listener_count())
            .field("subscribers", &self.tx.receiver_count())
            .finish()
    }
}

impl ChangeSignal {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(SUBSCRIBER_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(SignalInner {
                next_id: 0,
                slots: Vec::new(),
            })),
            tx,
        }
    }

    /// Connect a callback. It stays connected until `disconnect` is called
    /// with the returned id.
    pub fn connect<F>(&self, f: F) -> ConnectionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock();
        let id = ConnectionId(inner.next_id);
        inner.next_id += 1;
        inner.slots.push((id, Arc::new(f)));
        id
    }

    /// Remove exactly one connection. Returns `false` if `id` is not (or no
    /// longer) connected.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        let mut inner = self.inner.lock();
        let len_before = inner.slots.len();
        inner.slots.retain(|(slot_id, _)| *slot_id != id);
        inner.slots.len() < len_before
    }

    pub fn is_connected(&self, id: ConnectionId) -> bool {
        self.inner.lock().slots.iter().any(|(slot_id, _)| *slot_id == id)
    }

    /// Number of connected callbacks (async subscribers are not counted).
    pub fn listener_count(&self) -> usize {
        self.inner.lock().slots.len()
    }

    /// Notify every listener.
    ///
    /// The connection list is snapshotted and the lock released before any
    /// callback runs, so callbacks may freely connect, disconnect, or
    /// re-query whatever owns this signal.
    pub fn emit(&self) {
        let slots: Vec<Slot> = {
            let inner = self.inner.lock();
            inner.slots.iter().map(|(_, slot)| Arc::clone(slot)).collect()
        };
        tracing::trace!(listeners = slots.len(), "emitting change signal");
        for slot in slots {
            slot();
        }
        // Ignore error - means no async subscribers
        let _ = self.tx.send(());
    }

    /// Subscribe an async listener.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Subscribe as a stream of notifications. Lag is folded into a single
    /// notification since there is no payload to lose.
    pub fn stream(&self) -> impl Stream<Item = ()> + Send + 'static {
        BroadcastStream::new(self.tx.subscribe()).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn emit_reaches_every_listener() {
        let signal = ChangeSignal::new();
        let (a, fa) = counter();
        let (b, fb) = counter();
        signal.connect(fa);
        signal.connect(fb);

        signal.emit();

        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn disconnect_detaches_only_that_connection() {
        let signal = ChangeSignal::new();
        let (a, fa) = counter();
        let (b, fb) = counter();
        let id_a = signal.connect(fa);
        let id_b = signal.connect(fb);

        assert!(signal.disconnect(id_a));
        assert!(!signal.is_connected(id_a));
        assert!(signal.is_connected(id_b));
        signal.emit();

        assert_eq!(a.load(Ordering::SeqCst), 0);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn disconnect_twice_returns_false() {
        let signal = ChangeSignal::new();
        let id = signal.connect(|| {});
        assert!(signal.disconnect(id));
        assert!(!signal.disconnect(id));
        assert_eq!(signal.listener_count(), 0);
    }

    #[test]
    fn same_callback_connected_twice_gets_two_ids() {
        let signal = ChangeSignal::new();
        let (count, f) = counter();
        let f = Arc::new(f);
        let f1 = Arc::clone(&f);
        let f2 = Arc::clone(&f);
        let id1 = signal.connect(move || f1());
        let id2 = signal.connect(move || f2());
        assert_ne!(id1, id2);

        signal.emit();
        assert_eq!(count.load(Ordering::SeqCst), 2);

        signal.disconnect(id1);
        signal.emit();
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn callback_may_disconnect_itself_during_emit() {
        let signal = ChangeSignal::new();
        let (count, _) = counter();
        let slot_id: Arc<Mutex<Option<ConnectionId>>> = Arc::new(Mutex::new(None));

        let sig = signal.clone();
        let slot = Arc::clone(&slot_id);
        let c = Arc::clone(&count);
        let id = signal.connect(move || {
            c.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = slot.lock().take() {
                sig.disconnect(id);
            }
        });
        *slot_id.lock() = Some(id);

        signal.emit();
        signal.emit();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(signal.listener_count(), 0);
    }

    #[test]
    fn clones_share_connections() {
        let signal = ChangeSignal::new();
        let clone = signal.clone();
        let (count, f) = counter();
        clone.connect(f);

        signal.emit();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(signal.listener_count(), 1);
    }

    #[tokio::test]
    async fn async_subscriber_is_notified() {
        let signal = ChangeSignal::new();
        let mut rx = signal.subscribe();

        signal.emit();

        rx.recv().await.expect("subscriber should be notified");
    }

    #[tokio::test]
    async fn stream_yields_on_emit() {
        let signal = ChangeSignal::new();
        let mut stream = Box::pin(signal.stream());

        signal.emit();

        assert_eq!(stream.next().await, Some(()));
    }

    #[test]
    fn emit_without_listeners_is_harmless() {
        let signal = ChangeSignal::new();
        signal.emit();
        assert_eq!(signal.listener_count(), 0);
    }
}
