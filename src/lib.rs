pub mod backend;
pub mod config;
pub mod list;
pub mod observability;

pub use backend::FsLister;
pub use list::{list_objects, ListError, ListObjectsInfo, ObjectInfo, TreeWalkPool};
