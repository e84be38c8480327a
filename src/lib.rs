//! Folder image packer
//!
//! Reads selected folders, converts PNG to JPEG, compresses oversized
//! images to a size budget and packages everything into a zip archive,
//! one directory per folder.

pub mod archive;
pub mod batch;
pub mod codec;
pub mod config;
pub mod error;
pub mod intake;
pub mod media;
pub mod normalize;
pub mod retry;

pub use batch::{BatchDriver, ProcessedBatch, Session};
pub use codec::{ImageCodec, RasterCodec};
pub use config::Settings;
pub use error::{Error, Result};
pub use intake::{Group, RawFile, Selection};
pub use normalize::{NormalizedFile, Normalizer};
