//! Raven Ingest — corpus normalization, segmentation, token chunking, and
//! the batch ingestion pipeline.

pub mod chunking;
pub mod csv_io;
pub mod ingest;
pub mod normalize;
pub mod segment;

pub use chunking::{Chunk, TokenChunker, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
pub use ingest::{IngestReport, Ingester};
pub use normalize::{markdown_from_html, normalize_document, normalize_markdown};
pub use segment::{find_collisions, segment};
