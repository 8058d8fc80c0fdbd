//! The live event stream handed out by a discoverer.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use crate::DiscoveryEvent;

/// Lazy, unbounded stream of discovery events.
///
/// Events are pushed at the watcher's pace. The stream ends once every
/// producer has gone away, which happens after `stop()` or after a fatal
/// watcher failure has been reported with a single `Error` event.
#[derive(Debug)]
pub struct DiscoveryStream {
    receiver: mpsc::UnboundedReceiver<DiscoveryEvent>,
}

impl DiscoveryStream {
    /// Wrap any channel receiver. Alternative discoverers build their
    /// streams this way.
    pub fn from_receiver(receiver: mpsc::UnboundedReceiver<DiscoveryEvent>) -> Self {
        Self { receiver }
    }

    /// A stream that yields a single event and then ends.
    pub(crate) fn single(event: DiscoveryEvent) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(event);
        Self::from_receiver(rx)
    }

    /// Receive the next event, or `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<DiscoveryEvent> {
        self.receiver.recv().await
    }
}

impl Stream for DiscoveryStream {
    type Item = DiscoveryEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
