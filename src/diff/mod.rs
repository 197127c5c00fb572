//! Streaming windowed fuzzy diff
//!
//! The engine consumes two line sources and writes the aligned output
//! incrementally; it never buffers more than one comparison window per side.
//! Sources are abstract so the same engine runs against a live multipart
//! body, a cross-request chunk channel, or fixtures in tests.

pub mod engine;
pub mod source;

pub use engine::{diff_streams, DiffConfig};
pub use source::{ByteSource, LineReader, LineSource};
