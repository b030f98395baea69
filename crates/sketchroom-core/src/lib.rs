//! SketchRoom Core Library
//!
//! Shared-drawing engine for SketchRoom rooms: shape model, gesture
//! capture, snapshot persistence and realtime synchronization with peers.
//! Platform specifics (sockets, storage) sit behind small traits.

pub mod collaboration;
pub mod config;
pub mod history;
pub mod input;
pub mod room;
pub mod shapes;
pub mod snapshot;
pub mod storage;
pub mod sync;
pub mod tools;

pub use collaboration::{SyncChannel, SyncOutcome};
pub use config::{ClientConfig, ConfigError};
pub use history::{HistoryFetcher, NoHistory};
#[cfg(feature = "network")]
pub use history::HttpHistoryFetcher;
pub use input::{MouseButton, PointerEvent};
pub use room::RoomSession;
pub use shapes::{Circle, Pencil, Rectangle, Shape, ShapeEnvelope};
pub use snapshot::RoomSnapshot;
pub use storage::{MemoryStorage, SnapshotStore, StorageError};
pub use sync::{Connection, ConnectionState, MemoryConnection, SyncEvent};
pub use tools::{GestureCapture, GestureOutput, ToolKind};

/// Drive a future to completion on the current thread (tests only).
#[cfg(test)]
pub(crate) fn block_on<F: std::future::Future>(f: F) -> F::Output {
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    fn dummy_raw_waker() -> RawWaker {
        fn no_op(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            dummy_raw_waker()
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
        RawWaker::new(std::ptr::null(), &VTABLE)
    }

    let waker = unsafe { Waker::from_raw(dummy_raw_waker()) };
    let mut cx = Context::from_waker(&waker);
    let mut f = std::pin::pin!(f);

    loop {
        if let Poll::Ready(result) = f.as_mut().poll(&mut cx) {
            return result;
        }
    }
}
