// LanceDB vector index module
// Stores one vector per corpus row and serves exact L2 nearest-neighbor search

pub mod vector_store;

pub use vector_store::{SearchHit, VectorStore};
