// ── Reactive location store ──
//
// Entity storage with push-based change notification.

mod collection;
mod location_store;

pub use location_store::LocationStore;
