pub mod filesystem;

pub use filesystem::{move_file, BatchStorage, QUARANTINE_DIR};
