//! Session orchestration: mirrors live collections, tracks optimistic
//! writes and serves per-viewer views.

pub mod mirror;
pub mod pending;
pub mod session;
pub mod sync;

pub use mirror::CollectionMirror;
pub use pending::{PendingOp, PendingWrite, PendingWrites, WriteState};
pub use session::{
    notification_document, Actor, CommandError, MarketSettings, Marketplace, WriteRejected,
};
pub use sync::{spawn_sync, SyncHandle};
