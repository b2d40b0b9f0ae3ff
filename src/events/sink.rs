use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::types::StreamEvent;

use super::EventStream;

/// Single-subscriber delivery channel for generation events.
///
/// Only the most recent subscriber receives events; subscribing again ends
/// the previous [`EventStream`]. Events emitted while nobody listens are
/// dropped. The sink also tracks the streaming session it is bound to:
/// unsubscribing (or dropping the stream) cancels that session, since nobody
/// is left to consume its tokens.
#[derive(Clone, Default)]
pub struct EventSink {
    inner: Arc<Mutex<SinkInner>>,
}

#[derive(Default)]
struct SinkInner {
    subscriber: Option<Subscriber>,
    bound: Option<(u64, CancellationToken)>,
    next_subscriber_id: u64,
}

struct Subscriber {
    id: u64,
    sender: mpsc::UnboundedSender<StreamEvent>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start listening, replacing any previous subscriber
    pub fn subscribe(&self) -> EventStream {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        inner.next_subscriber_id += 1;
        let id = inner.next_subscriber_id;
        if let Some(previous) = inner.subscriber.replace(Subscriber { id, sender }) {
            debug!(previous = previous.id, subscriber = id, "Event subscriber replaced");
        }
        EventStream::new(id, receiver)
    }

    /// Stop listening and cancel the bound streaming session
    pub fn unsubscribe(&self) {
        let mut inner = self.inner.lock();
        if let Some(subscriber) = inner.subscriber.take() {
            debug!(subscriber = subscriber.id, "Event subscriber removed");
        }
        if let Some((session_id, token)) = inner.bound.take() {
            debug!(session_id, "Cancelling session after unsubscribe");
            token.cancel();
        }
    }

    pub fn has_subscriber(&self) -> bool {
        self.inner
            .lock()
            .subscriber
            .as_ref()
            .is_some_and(|s| !s.sender.is_closed())
    }

    /// Couple a streaming session to the current subscription
    pub(crate) fn bind(&self, session_id: u64, token: CancellationToken) {
        self.inner.lock().bound = Some((session_id, token));
    }

    pub(crate) fn unbind(&self, session_id: u64) {
        let mut inner = self.inner.lock();
        if inner.bound.as_ref().is_some_and(|(id, _)| *id == session_id) {
            inner.bound = None;
        }
    }

    /// Cancel `token` while holding the delivery lock.
    ///
    /// Once this returns, no event guarded by `token` can be delivered.
    pub(crate) fn revoke(&self, token: &CancellationToken) {
        let _inner = self.inner.lock();
        token.cancel();
    }

    /// Deliver `event` unless `token` has been cancelled.
    ///
    /// Returns false if the session should stop: either it was cancelled or
    /// the subscriber went away mid-stream.
    pub(crate) fn emit(&self, token: &CancellationToken, event: StreamEvent) -> bool {
        let mut inner = self.inner.lock();
        if token.is_cancelled() {
            return false;
        }

        let Some(subscriber) = &inner.subscriber else {
            return true;
        };
        if subscriber.sender.send(event).is_ok() {
            return true;
        }

        debug!(subscriber = subscriber.id, "Event stream dropped by subscriber");
        inner.subscriber = None;
        if let Some((_, bound)) = inner.bound.take() {
            bound.cancel();
        }
        token.cancel();
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn token(text: &str) -> StreamEvent {
        StreamEvent::Token {
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_events_delivered_in_order() {
        let sink = EventSink::new();
        let mut stream = sink.subscribe();
        let session = CancellationToken::new();

        for text in ["a", "b", "c"] {
            assert!(sink.emit(&session, token(text)));
        }
        assert!(sink.emit(&session, StreamEvent::End));

        let mut received = Vec::new();
        for _ in 0..4 {
            received.push(stream.next_event().await.unwrap());
        }
        assert_eq!(received, vec![token("a"), token("b"), token("c"), StreamEvent::End]);
    }

    #[tokio::test]
    async fn test_last_subscriber_wins() {
        let sink = EventSink::new();
        let mut first = sink.subscribe();
        let mut second = sink.subscribe();
        assert_ne!(first.subscription_id(), second.subscription_id());

        sink.emit(&CancellationToken::new(), token("x"));

        assert_eq!(first.next_event().await, None);
        assert_eq!(second.next_event().await, Some(token("x")));
    }

    #[test]
    fn test_events_without_subscriber_are_dropped() {
        let sink = EventSink::new();
        let session = CancellationToken::new();
        assert!(sink.emit(&session, token("lost")));
        assert!(!session.is_cancelled());

        let mut stream = sink.subscribe();
        assert!(stream.try_next_event().is_none());
    }

    #[test]
    fn test_revoked_token_blocks_delivery() {
        let sink = EventSink::new();
        let mut stream = sink.subscribe();
        let session = CancellationToken::new();

        sink.revoke(&session);
        assert!(!sink.emit(&session, token("late")));
        assert!(!sink.emit(&session, StreamEvent::End));
        assert!(stream.try_next_event().is_none());
    }

    #[test]
    fn test_unsubscribe_cancels_bound_session() {
        let sink = EventSink::new();
        let _stream = sink.subscribe();
        let session = CancellationToken::new();
        sink.bind(7, session.clone());

        sink.unsubscribe();
        assert!(session.is_cancelled());
        assert!(!sink.has_subscriber());
    }

    #[test]
    fn test_unbind_only_matching_session() {
        let sink = EventSink::new();
        let session = CancellationToken::new();
        sink.bind(3, session.clone());
        sink.unbind(4);
        sink.unsubscribe();
        assert!(session.is_cancelled());
    }

    #[test]
    fn test_dropped_stream_cancels_session() {
        let sink = EventSink::new();
        let stream = sink.subscribe();
        let session = CancellationToken::new();
        sink.bind(1, session.clone());
        drop(stream);

        assert!(!sink.emit(&session, token("nobody")));
        assert!(session.is_cancelled());
        assert!(!sink.has_subscriber());
    }
}
