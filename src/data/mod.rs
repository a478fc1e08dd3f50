//! Data module: leaf numbering and field storage

pub mod mapper;
pub mod storage;

pub use mapper::{CellMapper, LeafIndexMapper};
pub use storage::{FieldStorage, VecStorage};
