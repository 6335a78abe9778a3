pub mod archive;
pub mod parser;
pub mod summary;

pub use archive::{ArchivedMatch, Archiver};
pub use parser::{parse_index, Match, ParsedIndex, Participant};
pub use summary::write_summary_file;
