//! Data ingestion and replay.

pub mod csv_source;
pub mod error;
pub mod replayer;
pub mod source;
pub mod store;
pub mod stream;
pub mod symbol;

pub use csv_source::{FileStats, Layout, RowError};
pub use error::{DataError, FileIssue};
pub use replayer::Replayer;
pub use source::SnapshotSource;
pub use store::{BarStore, LoadOptions, LoadReport, SkippedFile};
pub use stream::{ChunkedReplayer, StreamOptions};
pub use symbol::SymbolResolver;
