//! In-process publish/subscribe for file lifecycle events.
//!
//! Handlers are registered per [`EventKind`] and run synchronously on the
//! publishing thread, in registration order. A failing handler does not stop
//! the fan-out; failures are collected and handed back to the publisher.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// Metadata key holding the written bytes on create/modify events.
pub const DATA_KEY: &str = "data";
/// Metadata key holding the written size on create/modify events.
pub const SIZE_KEY: &str = "size";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Created,
    Modified,
    Deleted,
    Accessed,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Created => "file_created",
            EventKind::Modified => "file_modified",
            EventKind::Deleted => "file_deleted",
            EventKind::Accessed => "file_accessed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A value stored in event metadata
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Bytes(Bytes),
    Size(u64),
    Text(String),
    /// Derived artifacts keyed by the path they belong at
    Artifacts(BTreeMap<String, Bytes>),
}

/// Free-form metadata attached to an event.
///
/// Clones share the same map, so an observer can attach derived artifacts
/// that later handlers of the same publish will see. Nothing an observer
/// inserts is persisted by the storage engine.
#[derive(Clone, Default)]
pub struct Metadata {
    inner: Arc<RwLock<HashMap<String, MetadataValue>>>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata for a write: the blob and its size
    pub fn for_write(data: Bytes) -> Self {
        let metadata = Self::new();
        metadata.insert(SIZE_KEY, MetadataValue::Size(data.len() as u64));
        metadata.insert(DATA_KEY, MetadataValue::Bytes(data));
        metadata
    }

    pub fn insert(&self, key: impl Into<String>, value: MetadataValue) {
        self.inner.write().insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<MetadataValue> {
        self.inner.read().get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.read().contains_key(key)
    }

    /// The written blob, if this is a write event
    pub fn data(&self) -> Option<Bytes> {
        match self.get(DATA_KEY) {
            Some(MetadataValue::Bytes(data)) => Some(data),
            _ => None,
        }
    }

    /// The written size, if this is a write event
    pub fn size(&self) -> Option<u64> {
        match self.get(SIZE_KEY) {
            Some(MetadataValue::Size(size)) => Some(size),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl fmt::Debug for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.inner.read().keys().cloned().collect();
        f.debug_struct("Metadata").field("keys", &keys).finish()
    }
}

/// A file lifecycle event
#[derive(Debug, Clone)]
pub struct Event {
    pub kind: EventKind,
    pub path: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: Metadata,
}

impl Event {
    pub fn new(kind: EventKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            timestamp: Utc::now(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Event handler callback
pub type Handler = Arc<dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync>;

/// Fan-out event register keyed by event kind
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<HashMap<EventKind, Vec<Handler>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one kind of event
    pub fn subscribe<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subscribers
            .write()
            .entry(kind)
            .or_default()
            .push(Arc::new(handler));
    }

    /// Deliver `event` to every handler of its kind.
    ///
    /// Returns the errors of the handlers that failed, in delivery order.
    pub fn publish(&self, event: &Event) -> Vec<anyhow::Error> {
        // Run handlers outside the lock so they may subscribe or publish
        let handlers: Vec<Handler> = match self.subscribers.read().get(&event.kind) {
            Some(handlers) => handlers.clone(),
            None => return Vec::new(),
        };

        handlers
            .iter()
            .filter_map(|handler| handler(event).err())
            .collect()
    }

    /// Number of handlers registered for `kind`
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers.read().get(&kind).map_or(0, Vec::len)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subscribers = self.subscribers.read();
        let counts: HashMap<&'static str, usize> = subscribers
            .iter()
            .map(|(kind, handlers)| (kind.as_str(), handlers.len()))
            .collect();
        f.debug_struct("EventBus")
            .field("subscribers", &counts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        let errors = bus.publish(&Event::new(EventKind::Created, "a.txt"));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_handlers_run_in_subscription_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for id in 0..3 {
            let seen = seen.clone();
            bus.subscribe(EventKind::Created, move |event| {
                seen.lock().push((id, event.path.clone()));
                Ok(())
            });
        }

        bus.publish(&Event::new(EventKind::Created, "a.txt"));

        let seen = seen.lock();
        assert_eq!(
            *seen,
            vec![
                (0, "a.txt".to_string()),
                (1, "a.txt".to_string()),
                (2, "a.txt".to_string())
            ]
        );
    }

    #[test]
    fn test_only_matching_kind_is_delivered() {
        let bus = EventBus::new();
        let count = Arc::new(Mutex::new(0));

        let c = count.clone();
        bus.subscribe(EventKind::Deleted, move |_| {
            *c.lock() += 1;
            Ok(())
        });

        bus.publish(&Event::new(EventKind::Created, "a.txt"));
        bus.publish(&Event::new(EventKind::Accessed, "a.txt"));
        assert_eq!(*count.lock(), 0);

        bus.publish(&Event::new(EventKind::Deleted, "a.txt"));
        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn test_handler_may_subscribe_and_publish() {
        let bus = EventBus::new();
        let accessed = Arc::new(Mutex::new(Vec::new()));

        let inner_bus = bus.clone();
        let seen = accessed.clone();
        bus.subscribe(EventKind::Created, move |event| {
            let seen = seen.clone();
            inner_bus.subscribe(EventKind::Accessed, move |event| {
                seen.lock().push(event.path.clone());
                Ok(())
            });
            inner_bus.publish(&Event::new(EventKind::Accessed, event.path.clone()));
            Ok(())
        });

        assert!(bus.publish(&Event::new(EventKind::Created, "a.txt")).is_empty());
        assert_eq!(*accessed.lock(), vec!["a.txt".to_string()]);
        assert_eq!(bus.subscriber_count(EventKind::Accessed), 1);
    }

    #[test]
    fn test_publish_while_another_thread_subscribes() {
        let bus = EventBus::new();
        let (started_tx, started_rx) = flume::bounded::<()>(1);
        let (done_tx, done_rx) = flume::bounded::<()>(1);

        let inner_bus = bus.clone();
        bus.subscribe(EventKind::Created, move |event| {
            // Queue a writer on the bus, then publish again from here
            let writer_bus = inner_bus.clone();
            let started_tx = started_tx.clone();
            let writer = std::thread::spawn(move || {
                let _ = started_tx.send(());
                writer_bus.subscribe(EventKind::Deleted, |_| Ok(()));
            });
            let _ = started_rx.recv();
            std::thread::sleep(std::time::Duration::from_millis(50));
            inner_bus.publish(&Event::new(EventKind::Accessed, event.path.clone()));
            let _ = writer.join();
            Ok(())
        });

        let publisher_bus = bus.clone();
        std::thread::spawn(move || {
            publisher_bus.publish(&Event::new(EventKind::Created, "a.txt"));
            let _ = done_tx.send(());
        });

        done_rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("publish finished");
        assert_eq!(bus.subscriber_count(EventKind::Deleted), 1);
    }

    #[test]
    fn test_failures_are_collected_and_fan_out_continues() {
        let bus = EventBus::new();
        let reached = Arc::new(Mutex::new(false));

        bus.subscribe(EventKind::Created, |_| anyhow::bail!("first failed"));
        bus.subscribe(EventKind::Created, |_| anyhow::bail!("second failed"));
        let r = reached.clone();
        bus.subscribe(EventKind::Created, move |_| {
            *r.lock() = true;
            Ok(())
        });

        let errors = bus.publish(&Event::new(EventKind::Created, "a.txt"));

        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].to_string(), "first failed");
        assert_eq!(errors[1].to_string(), "second failed");
        assert!(*reached.lock());
    }

    #[test]
    fn test_observer_attachments_are_visible_downstream() {
        let bus = EventBus::new();
        let observed = Arc::new(Mutex::new(None));

        bus.subscribe(EventKind::Created, |event| {
            let data = event.metadata.data().unwrap_or_default();
            let mut artifacts = BTreeMap::new();
            artifacts.insert(format!("{}.upper", event.path), data.to_ascii_uppercase().into());
            event
                .metadata
                .insert("artifacts", MetadataValue::Artifacts(artifacts));
            Ok(())
        });

        let o = observed.clone();
        bus.subscribe(EventKind::Created, move |event| {
            *o.lock() = event.metadata.get("artifacts");
            Ok(())
        });

        let event = Event::new(EventKind::Created, "note.txt")
            .with_metadata(Metadata::for_write(Bytes::from_static(b"abc")));
        assert!(bus.publish(&event).is_empty());

        let mut expected = BTreeMap::new();
        expected.insert("note.txt.upper".to_string(), Bytes::from_static(b"ABC"));
        assert_eq!(
            *observed.lock(),
            Some(MetadataValue::Artifacts(expected))
        );
    }

    #[test]
    fn test_write_metadata() {
        let metadata = Metadata::for_write(Bytes::from_static(b"hello"));
        assert_eq!(metadata.size(), Some(5));
        assert_eq!(metadata.data(), Some(Bytes::from_static(b"hello")));
        assert_eq!(metadata.len(), 2);
    }
}
