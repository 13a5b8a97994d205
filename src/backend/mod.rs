pub mod fs;

pub use fs::FsLister;
