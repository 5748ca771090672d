// Database module
// Dual artifact system: SQLite for review metadata, LanceDB for vectors

pub mod lancedb;
pub mod sqlite;
