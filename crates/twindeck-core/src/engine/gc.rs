//! Deferred deallocation for buffers shared with the audio thread
//!
//! Sources handed to the engine are wrapped in `basedrop::Shared`. When the
//! audio thread drops the last reference, the buffer is queued and freed
//! later on the collector thread instead of inside the callback.

use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

use basedrop::{Collector, Handle};

/// How often the collector thread frees queued buffers
const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

fn init_gc() -> Handle {
    let (tx, rx) = mpsc::sync_channel(1);

    let spawned = thread::Builder::new()
        .name("twindeck-gc".to_string())
        .spawn(move || {
            // Collector is !Sync, so it lives on this thread only
            let mut collector = Collector::new();
            if tx.send(collector.handle()).is_err() {
                return;
            }
            log::info!("GC: collector thread started");
            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        });

    match spawned.ok().and_then(|_| rx.recv().ok()) {
        Some(handle) => handle,
        None => {
            log::error!("GC: collector thread unavailable, shared buffers will not be reclaimed");
            let collector: &'static mut Collector = Box::leak(Box::new(Collector::new()));
            collector.handle()
        }
    }
}

/// Handle for allocating `Shared<T>` values
///
/// The collector thread is started on first use.
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}
