// Copyright PingCAP Inc. 2025.
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; version 2 of the License.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Filesystem-backed collaborators for the listing engine: buckets map to
//! directories under a root, objects to the files beneath them.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::fs;

use crate::list::filter::filter_list_entries;
use crate::list::tree_walk::{
    Entry, GetObjectInfoFn, IsLeafDirFn, IsLeafFn, ListDirFn, ListedDir,
};
use crate::list::{ListError, ObjectInfo, SLASH_SEPARATOR};

/// Serves a local directory tree through the callback contracts the walker
/// and lister consume.
#[derive(Debug, Clone)]
pub struct FsLister {
    root: PathBuf,
}

impl FsLister {
    pub fn new(root: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self { root: root.into() })
    }

    fn full_path(&self, bucket: &str, path: &str) -> PathBuf {
        let mut full = self.root.clone();
        if !bucket.is_empty() {
            full.push(bucket);
        }
        for comp in path.split(SLASH_SEPARATOR) {
            if comp.is_empty() {
                continue;
            }
            full.push(comp);
        }
        full
    }

    async fn read_dir_entries(&self, bucket: &str, prefix_dir: &str) -> std::io::Result<Vec<Entry>> {
        let dir = self.full_path(bucket, prefix_dir);
        let mut read_dir = fs::read_dir(&dir).await?;
        let mut entries = Vec::new();
        while let Some(dirent) = read_dir.next_entry().await? {
            let Some(name) = dirent.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let meta = match dirent.metadata().await {
                Ok(meta) => meta,
                // Vanished between readdir and stat; skip it.
                Err(_) => continue,
            };
            let is_dir = meta.is_dir();
            let mut entry_name = name;
            if is_dir {
                entry_name.push_str(SLASH_SEPARATOR);
            }
            entries.push(Entry {
                name: entry_name.clone(),
                info: Some(ObjectInfo {
                    bucket: bucket.to_string(),
                    name: entry_name,
                    mod_time: meta.modified().ok().map(DateTime::<Utc>::from),
                    size: if is_dir { 0 } else { meta.len() as i64 },
                    is_dir,
                }),
            });
        }
        Ok(entries)
    }

    /// Directory lister: entries come back prefix-filtered and sorted, with
    /// directories carrying a trailing separator.
    pub fn list_dir_fn(self: &Arc<Self>) -> ListDirFn {
        let this = Arc::clone(self);
        Arc::new(move |bucket, prefix_dir, prefix_entry| {
            let this = Arc::clone(&this);
            Box::pin(async move {
                let entries = match this.read_dir_entries(&bucket, &prefix_dir).await {
                    Ok(entries) => entries,
                    // Unreadable directory: nothing to list.
                    Err(_) => return ListedDir::default(),
                };
                if entries.is_empty() {
                    return ListedDir {
                        empty_dir: true,
                        ..Default::default()
                    };
                }
                let (entries, delay_is_leaf) = filter_list_entries(entries, &prefix_entry);
                ListedDir {
                    empty_dir: false,
                    entries,
                    delay_is_leaf,
                }
            })
        })
    }

    /// A file path is terminal; a trailing separator means expandable.
    pub fn is_leaf_fn(&self) -> IsLeafFn {
        Arc::new(|_bucket, path| !path.ends_with(SLASH_SEPARATOR))
    }

    /// A directory with no children at all.
    pub fn is_leaf_dir_fn(self: &Arc<Self>) -> IsLeafDirFn {
        let this = Arc::clone(self);
        Arc::new(move |bucket, path| {
            let this = Arc::clone(&this);
            Box::pin(async move {
                let dir = this.full_path(&bucket, &path);
                let mut read_dir = match fs::read_dir(&dir).await {
                    Ok(read_dir) => read_dir,
                    Err(_) => return false,
                };
                matches!(read_dir.next_entry().await, Ok(None))
            })
        })
    }

    /// Stat-based metadata resolver. The walk usually hands over the info it
    /// already has; a vanished entry surfaces as the benign not-found case.
    pub fn object_info_fn(self: &Arc<Self>) -> GetObjectInfoFn {
        let this = Arc::clone(self);
        Arc::new(move |bucket, name, info| {
            let this = Arc::clone(&this);
            Box::pin(async move {
                if let Some(mut info) = info {
                    info.name = name;
                    return Ok(info);
                }
                let path = this.full_path(&bucket, &name);
                let meta = fs::metadata(&path).await.map_err(|err| {
                    if err.kind() == std::io::ErrorKind::NotFound {
                        ListError::NotFound {
                            bucket: bucket.clone(),
                            key: name.clone(),
                        }
                    } else {
                        ListError::Io(err)
                    }
                })?;
                let is_dir = meta.is_dir();
                Ok(ObjectInfo {
                    bucket,
                    name,
                    mod_time: meta.modified().ok().map(DateTime::<Utc>::from),
                    size: if is_dir { 0 } else { meta.len() as i64 },
                    is_dir,
                })
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_dir_sorts_and_marks_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        std::fs::write(dir.path().join("c.txt"), b"x").unwrap();

        let lister = FsLister::new(dir.path());
        let listed = (*lister.list_dir_fn())(String::new(), String::new(), String::new()).await;

        assert!(!listed.empty_dir);
        let names: Vec<_> = listed.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["a/", "b.txt", "c.txt"]);
        assert!(listed.entries[0].info.as_ref().unwrap().is_dir);
    }

    #[tokio::test]
    async fn empty_directory_is_reported_as_such() {
        let dir = tempfile::tempdir().unwrap();
        let lister = FsLister::new(dir.path());
        let listed = (*lister.list_dir_fn())(String::new(), String::new(), String::new()).await;
        assert!(listed.empty_dir);
        assert!(listed.entries.is_empty());
    }

    #[tokio::test]
    async fn leaf_dir_means_no_children() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("empty")).unwrap();
        std::fs::create_dir_all(dir.path().join("full/sub")).unwrap();

        let lister = FsLister::new(dir.path());
        let is_leaf_dir = lister.is_leaf_dir_fn();
        assert!((*is_leaf_dir)(String::new(), "empty/".to_string()).await);
        assert!(!(*is_leaf_dir)(String::new(), "full/".to_string()).await);
    }

    #[tokio::test]
    async fn object_info_maps_missing_files_to_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let lister = FsLister::new(dir.path());
        let err = (*lister.object_info_fn())(String::new(), "gone.txt".to_string(), None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn object_info_prefers_the_walkers_hint() {
        let dir = tempfile::tempdir().unwrap();
        let lister = FsLister::new(dir.path());
        let hint = ObjectInfo {
            bucket: String::new(),
            name: "short".to_string(),
            size: 7,
            ..Default::default()
        };
        // No stat happens: the file does not exist but the hint wins.
        let info = (*lister.object_info_fn())(
            String::new(),
            "full/path.txt".to_string(),
            Some(hint),
        )
        .await
        .unwrap();
        assert_eq!(info.name, "full/path.txt");
        assert_eq!(info.size, 7);
    }
}
