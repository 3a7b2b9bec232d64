// ── Location subscriptions ──
//
// A renderer that lives outside the viewer (a second map, a status bar)
// follows the store through a `LocationFeed`: it holds the last dataset
// it has seen and waits for the next replacement or live change.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::{DeviceLocation, EntityId, Status, StatusCounts};

type Snapshot = Arc<Vec<Arc<DeviceLocation>>>;

/// Subscription to the authoritative locations of a [`LocationStore`].
///
/// [`LocationStore`]: crate::store::LocationStore
pub struct LocationFeed {
    seen: Snapshot,
    rx: watch::Receiver<Snapshot>,
}

impl LocationFeed {
    pub(crate) fn new(rx: watch::Receiver<Snapshot>) -> Self {
        let seen = Arc::clone(&rx.borrow());
        Self { seen, rx }
    }

    /// Locations as of subscription or the last [`changed`](Self::changed).
    pub fn current(&self) -> &Snapshot {
        &self.seen
    }

    pub fn find(&self, id: &EntityId) -> Option<&Arc<DeviceLocation>> {
        self.seen.iter().find(|loc| &loc.id == id)
    }

    /// Device counts summed over every location in the current snapshot,
    /// e.g. for a legend.
    pub fn totals(&self) -> StatusCounts {
        let mut sum = StatusCounts::default();
        for loc in self.seen.as_ref() {
            for status in Status::PRIORITY {
                sum.set(status, sum.get(status).saturating_add(loc.counts.get(status)));
            }
        }
        sum
    }

    /// Wait for the store to change. `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<Snapshot> {
        self.rx.changed().await.ok()?;
        self.seen = Arc::clone(&self.rx.borrow_and_update());
        Some(Arc::clone(&self.seen))
    }

    /// Every snapshot from now on, starting with the current one.
    pub fn into_stream(self) -> LocationFeedStream {
        LocationFeedStream {
            inner: WatchStream::new(self.rx),
        }
    }
}

/// [`LocationFeed`] as a `Stream` of snapshots.
pub struct LocationFeedStream {
    inner: WatchStream<Snapshot>,
}

impl Stream for LocationFeedStream {
    type Item = Snapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
