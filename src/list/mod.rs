use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod filter;
pub mod lister;
pub mod pool;
pub mod tree_walk;

pub use lister::list_objects;
pub use pool::{ListParams, TreeWalkPool};
pub use tree_walk::{
    start_tree_walk, Entry, GetObjectInfoFn, IsLeafDirFn, IsLeafFn, ListDirFn, ListedDir,
    TreeWalkResult,
};

/// Path separator in object keys.
pub const SLASH_SEPARATOR: &str = "/";

/// Maximum combined objects and common prefixes in one listing page. Also the
/// capacity of a walk session's result channel.
pub const MAX_OBJECT_LIST: usize = 1000;

/// How many metadata resolutions may run at once while assembling a page.
/// Independent of the page size; protects the backend from unbounded I/O.
pub const LIST_RESOLVE_CONCURRENCY: usize = 10;

/// A resolved object or directory placeholder, copied by value into result
/// pages. Directory names carry a trailing separator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectInfo {
    pub bucket: String,
    pub name: String,
    pub mod_time: Option<DateTime<Utc>>,
    pub size: i64,
    pub is_dir: bool,
}

/// One page of a listing. `objects` and `prefixes` are each in ascending name
/// order; `next_marker` names the last item placed in the page when
/// `is_truncated` is set, and is empty otherwise.
#[derive(Debug, Clone, Default)]
pub struct ListObjectsInfo {
    pub objects: Vec<ObjectInfo>,
    pub prefixes: Vec<String>,
    pub is_truncated: bool,
    pub next_marker: String,
}

#[derive(Debug, Error)]
pub enum ListError {
    /// The walk was started without the classifier callbacks a delayed leaf
    /// check needs. Fatal to the walk.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The producer observed cancellation mid-emission. Internal only; never
    /// surfaced through the listing API.
    #[error("tree walk aborted")]
    WalkAbort,

    /// The entry vanished between listing and metadata resolution.
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ListError {
    /// True for the benign race where an entry was removed while being
    /// listed. Recovered locally, never propagated to the caller.
    pub fn is_not_found(&self) -> bool {
        match self {
            ListError::NotFound { .. } => true,
            ListError::Io(err) => err.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
