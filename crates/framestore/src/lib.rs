//! Content-addressed, write-once storage for Codeframe frames.
//!
//! A frame is a blob of HTML or JavaScript. Frames are stored once per
//! distinct content and addressed by the first 12 hex chars of their SHA-256
//! digest, so the same source always gets the same short, URL-safe id.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use framestore::{FileFrameStore, FrameStore, StoreConfig};
//!
//! // Create from environment (reads CODEFRAME_STORE_PATH)
//! let config = StoreConfig::from_env().unwrap();
//! let store = Arc::new(FileFrameStore::open(config).unwrap());
//!
//! // Make sure the demo frames exist before handing out their ids
//! let report = framestore::spawn_seed(store.clone(), framestore::bundled_fixtures()).wait();
//! println!("seeded {} fixtures", report.seeded.len());
//!
//! // Store content
//! let id = store.create("<h1>Hello, World!</h1>").unwrap();
//! println!("Stored as: {}", id);
//!
//! // Retrieve content
//! let html = store.get(&id).unwrap();
//! assert_eq!(html, "<h1>Hello, World!</h1>");
//! ```
//!
//! # On disk
//!
//! One gzip file per frame, `{base_path}/cf_<id>.frame`, nothing else.
//! Writes go through a temp file and a rename, and concurrent writers of the
//! same id are serialised, so readers never see a partial frame.

pub mod codec;
pub mod config;
pub mod error;
pub mod fixtures;
pub mod id;
pub mod staging;
pub mod store;

// Re-exports for convenience
pub use codec::{Codec, CodecError};
pub use config::StoreConfig;
pub use error::StoreError;
pub use fixtures::{
    bundled_fixtures, configured_fixtures, seed, spawn_seed, Fixture, FixtureError, FixtureSource,
    SeedHandle, SeedReport, BLANK_FRAME_ID,
};
pub use id::{fingerprint, FrameId, IdError};
pub use store::{frame_file_name, FileFrameStore, FrameStore};
