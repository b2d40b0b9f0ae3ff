use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use crate::types::StreamEvent;

/// Receiving end of an [`EventSink`](super::EventSink) subscription.
///
/// The stream ends when a newer subscriber replaces this one or the sink
/// unsubscribes it. Dropping it counts as unsubscribing.
#[derive(Debug)]
pub struct EventStream {
    id: u64,
    receiver: mpsc::UnboundedReceiver<StreamEvent>,
}

impl EventStream {
    pub(crate) fn new(id: u64, receiver: mpsc::UnboundedReceiver<StreamEvent>) -> Self {
        Self { id, receiver }
    }

    /// Identifier of this subscription
    pub fn subscription_id(&self) -> u64 {
        self.id
    }

    /// Wait for the next event. `None` once the subscription has ended.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.receiver.recv().await
    }

    /// Take the next event if one is already queued
    pub fn try_next_event(&mut self) -> Option<StreamEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for EventStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
