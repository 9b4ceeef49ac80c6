//! Image retrieval and upload ingestion.
//!
//! Web image search mirrors the snippet search pipeline but never surfaces
//! errors: every failure path yields a fixed placeholder image so callers
//! always have something to render. Uploads are re-encoded as inline data
//! URLs and captioned on a best-effort basis.

mod ingest;
mod search;
mod types;

pub use ingest::ImageIngestor;
pub use search::{ImageSearch, WebImageClient};
pub use types::{ImageRef, PLACEHOLDER_IMAGE, RetrievedImages, placeholder_images};
