pub mod chunk;

pub use chunk::{chunk_list, MAX_IDS_PER_REQUEST};
