//! Chunked bidirectional sync engine: wire encoding, transport, and
//! the batched drains over pending local changes.

pub mod client;
pub mod location;
pub mod uploader;
pub mod wire;

pub use client::{HttpSyncClient, SyncApi};
pub use location::{locate_with_timeout, FixedLocation, LocationProvider, NoLocation};
pub use uploader::{Uploader, DEFAULT_BATCH_SIZE};
pub use wire::{
    DeletedKey, ImageBatchRequest, ImageRow, ModifiedRow, SyncRequest, SyncResponse,
    MSGPACK_CONTENT_TYPE,
};
