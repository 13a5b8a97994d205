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

//! Recursive namespace walker: turns backend directory reads into an
//! ordered, cancellable stream of entries honoring a resume marker.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::filter::{has_suffix, path_join};
use super::{ListError, ObjectInfo, MAX_OBJECT_LIST, SLASH_SEPARATOR};

/// One namespace node discovered by a directory read. Directory entries carry
/// a trailing separator in `name`. Produced by the backend, consumed once.
#[derive(Debug, Clone, Default)]
pub struct Entry {
    pub name: String,
    pub info: Option<ObjectInfo>,
}

/// A walk emission. `is_empty_dir` marks a directory with no children, which
/// is itself the leaf to report. `end` marks the globally final emission of
/// the session; the channel closing is a separate, later signal.
#[derive(Debug, Clone)]
pub struct TreeWalkResult {
    pub entry: Entry,
    pub is_empty_dir: bool,
    pub end: bool,
}

/// Outcome of one backend directory read.
#[derive(Debug, Default)]
pub struct ListedDir {
    /// The directory exists but has no children.
    pub empty_dir: bool,
    /// Children, already filtered by the entry prefix and sorted ascending.
    pub entries: Vec<Entry>,
    /// Ask the walker to classify leaves itself. Requires classifiers.
    pub delay_is_leaf: bool,
}

/// Backend directory lister for `(bucket, prefix_dir, prefix_entry)`.
pub type ListDirFn =
    Arc<dyn Fn(String, String, String) -> BoxFuture<'static, ListedDir> + Send + Sync>;

/// Classifies `(bucket, path)` as a terminal, non-expandable entry.
pub type IsLeafFn = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// Classifies `(bucket, path)` as a directory with no children.
pub type IsLeafDirFn = Arc<dyn Fn(String, String) -> BoxFuture<'static, bool> + Send + Sync>;

/// Resolves full metadata for one listed name. The entry's own info, when the
/// backend supplied it, is passed through as a hint.
pub type GetObjectInfoFn = Arc<
    dyn Fn(String, String, Option<ObjectInfo>) -> BoxFuture<'static, Result<ObjectInfo, ListError>>
        + Send
        + Sync,
>;

/// Splits a marker at its first separator into the immediate child directory
/// component (trailing separator kept) and the remainder.
/// "four/five.txt" becomes ("four/", "five.txt"); "four" becomes ("four", "").
fn split_marker(marker: &str) -> (String, String) {
    if marker.is_empty() {
        return (String::new(), String::new());
    }
    match marker.split_once(SLASH_SEPARATOR) {
        Some((dir, base)) => (format!("{dir}{SLASH_SEPARATOR}"), base.to_string()),
        None => (marker.to_string(), String::new()),
    }
}

struct TreeWalk {
    bucket: String,
    recursive: bool,
    list_dir: ListDirFn,
    is_leaf: Option<IsLeafFn>,
    is_leaf_dir: Option<IsLeafDirFn>,
    result_tx: mpsc::Sender<TreeWalkResult>,
    end_walk: CancellationToken,
}

impl TreeWalk {
    /// Delivers one result, racing the send against the abort signal so
    /// cancellation latency stays bounded even when the consumer is gone.
    async fn send(&self, result: TreeWalkResult) -> Result<(), ListError> {
        tokio::select! {
            biased;
            _ = self.end_walk.cancelled() => Err(ListError::WalkAbort),
            sent = self.result_tx.send(result) => sent.map_err(|_| ListError::WalkAbort),
        }
    }

    /// Walks `prefix_dir` depth first, emitting entries strictly greater than
    /// `marker` in walk order. Returns whether the directory read reported
    /// empty, so the caller can emit a placeholder for it instead.
    fn walk(
        &self,
        prefix_dir: String,
        entry_prefix_match: String,
        marker: String,
        is_end: bool,
    ) -> BoxFuture<'_, Result<bool, ListError>> {
        Box::pin(async move {
            // With prefix_dir="one/two/three/" and marker="four/five.txt" we
            // recurse into "one/two/three/four/" carrying marker "five.txt".
            let (marker_dir, marker_base) = split_marker(&marker);

            let listed =
                (*self.list_dir)(self.bucket.clone(), prefix_dir.clone(), entry_prefix_match)
                    .await;

            // A delayed leaf check cannot complete without the classifiers.
            if (listed.delay_is_leaf && self.is_leaf.is_none()) || self.is_leaf_dir.is_none() {
                return Err(ListError::InvalidArgument(
                    "leaf classification requested without classifier callbacks".into(),
                ));
            }

            if listed.empty_dir {
                return Ok(true);
            }

            // Entries below marker_dir were delivered by a previous page.
            let idx = listed
                .entries
                .partition_point(|entry| entry.name.as_str() < marker_dir.as_str());
            let entries = &listed.entries[idx..];
            if entries.is_empty() {
                return Ok(false);
            }

            let last = entries.len() - 1;
            for (i, listed_entry) in entries.iter().enumerate() {
                if i == 0 && listed_entry.name.is_empty() {
                    // An empty-named first entry stands for the directory
                    // itself; report prefix_dir with the backend's info.
                    self.send(TreeWalkResult {
                        entry: Entry {
                            name: prefix_dir.clone(),
                            info: listed_entry.info.clone(),
                        },
                        is_empty_dir: false,
                        end: i == last && is_end,
                    })
                    .await?;
                    continue;
                }

                let mut entry = listed_entry.clone();
                let mut leaf = !has_suffix(&entry.name, SLASH_SEPARATOR);
                if listed.delay_is_leaf {
                    if let Some(is_leaf) = &self.is_leaf {
                        leaf = (**is_leaf)(&self.bucket, &path_join(&prefix_dir, &entry.name));
                        if leaf {
                            if let Some(stripped) = entry.name.strip_suffix(SLASH_SEPARATOR) {
                                entry.name = stripped.to_string();
                            }
                        }
                    }
                }

                let mut leaf_dir = false;
                if has_suffix(&entry.name, SLASH_SEPARATOR) {
                    if let Some(is_leaf_dir) = &self.is_leaf_dir {
                        leaf_dir = (**is_leaf_dir)(
                            self.bucket.clone(),
                            path_join(&prefix_dir, &entry.name),
                        )
                        .await;
                    }
                }

                let is_dir = !leaf_dir && !leaf;

                if i == 0 && entry.name == marker_dir {
                    if !self.recursive {
                        // Already delivered in the previous page.
                        continue;
                    }
                    if !is_dir {
                        // A file equal to the marker component was delivered
                        // previously; a directory still needs recursing into,
                        // the marker only excludes its own name.
                        continue;
                    }
                }

                if self.recursive && is_dir {
                    let marker_arg = if entry.name == marker_dir {
                        // Recursing into "four/" carries "five.txt" down.
                        marker_base.clone()
                    } else {
                        String::new()
                    };
                    // The entry prefix only applies at the first level.
                    let mark_is_end = i == last && is_end;
                    let empty_dir = self
                        .walk(
                            path_join(&prefix_dir, &entry.name),
                            String::new(),
                            marker_arg,
                            mark_is_end,
                        )
                        .await?;
                    if !empty_dir {
                        continue;
                    }
                    // An empty subtree falls through so the directory entry
                    // itself is reported as the placeholder leaf.
                }

                let is_eof = i == last && is_end;
                entry.name = path_join(&prefix_dir, &entry.name);
                self.send(TreeWalkResult {
                    entry,
                    is_empty_dir: leaf_dir,
                    end: is_eof,
                })
                .await?;
            }

            // Everything at this level is listed.
            Ok(false)
        })
    }
}

/// Starts an independent producer walking `prefix` past `marker` and returns
/// the receiving end of its bounded result stream. The channel closes when
/// the walk fully completes; the `end` flag on the final result tells the
/// consumer earlier that nothing further will arrive.
#[allow(clippy::too_many_arguments)]
pub fn start_tree_walk(
    bucket: &str,
    prefix: &str,
    marker: &str,
    recursive: bool,
    list_dir: ListDirFn,
    is_leaf: Option<IsLeafFn>,
    is_leaf_dir: Option<IsLeafDirFn>,
    end_walk: CancellationToken,
) -> mpsc::Receiver<TreeWalkResult> {
    let (result_tx, result_rx) = mpsc::channel(MAX_OBJECT_LIST);

    // "one/two/th" splits into prefix_dir="one/two/" and entry match "th";
    // the marker is made relative to prefix_dir.
    let (prefix_dir, entry_prefix_match) = match prefix.rfind(SLASH_SEPARATOR) {
        Some(idx) => (prefix[..=idx].to_string(), prefix[idx + 1..].to_string()),
        None => (String::new(), prefix.to_string()),
    };
    let marker = marker
        .strip_prefix(&prefix_dir)
        .unwrap_or(marker)
        .to_string();

    let walker = TreeWalk {
        bucket: bucket.to_string(),
        recursive,
        list_dir,
        is_leaf,
        is_leaf_dir,
        result_tx,
        end_walk,
    };
    tokio::spawn(async move {
        match walker.walk(prefix_dir, entry_prefix_match, marker, true).await {
            Ok(_) => {}
            Err(ListError::WalkAbort) => tracing::debug!("tree walk aborted"),
            Err(err) => tracing::error!(error = %err, "tree walk failed"),
        }
        // The sender drops here, closing the stream.
    });
    result_rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::list::filter::filter_list_entries;

    type MemTree = Arc<HashMap<String, Vec<&'static str>>>;

    fn mem_tree(dirs: &[(&'static str, &[&'static str])]) -> MemTree {
        let mut map = HashMap::new();
        for (dir, names) in dirs {
            map.insert(dir.to_string(), names.to_vec());
        }
        Arc::new(map)
    }

    fn mem_list_dir(tree: &MemTree) -> ListDirFn {
        let tree = Arc::clone(tree);
        Arc::new(move |bucket, prefix_dir, prefix_entry| {
            let tree = Arc::clone(&tree);
            Box::pin(async move {
                let Some(names) = tree.get(&prefix_dir) else {
                    return ListedDir::default();
                };
                if names.is_empty() {
                    return ListedDir {
                        empty_dir: true,
                        ..Default::default()
                    };
                }
                let entries = names
                    .iter()
                    .map(|name| Entry {
                        name: name.to_string(),
                        info: Some(ObjectInfo {
                            bucket: bucket.clone(),
                            name: name.to_string(),
                            is_dir: name.ends_with(SLASH_SEPARATOR),
                            ..Default::default()
                        }),
                    })
                    .collect();
                let (entries, delay_is_leaf) = filter_list_entries(entries, &prefix_entry);
                ListedDir {
                    empty_dir: false,
                    entries,
                    delay_is_leaf,
                }
            })
        })
    }

    fn mem_is_leaf() -> IsLeafFn {
        Arc::new(|_bucket, path| !path.ends_with(SLASH_SEPARATOR))
    }

    fn mem_is_leaf_dir(tree: &MemTree) -> IsLeafDirFn {
        let tree = Arc::clone(tree);
        Arc::new(move |_bucket, path| {
            let tree = Arc::clone(&tree);
            Box::pin(async move { tree.get(&path).map(Vec::is_empty).unwrap_or(false) })
        })
    }

    async fn walk_names(
        tree: &MemTree,
        prefix: &str,
        marker: &str,
        recursive: bool,
    ) -> Vec<TreeWalkResult> {
        let mut rx = start_tree_walk(
            "",
            prefix,
            marker,
            recursive,
            mem_list_dir(tree),
            Some(mem_is_leaf()),
            Some(mem_is_leaf_dir(tree)),
            CancellationToken::new(),
        );
        let mut out = Vec::new();
        while let Some(result) = rx.recv().await {
            out.push(result);
        }
        out
    }

    fn sample_tree() -> MemTree {
        mem_tree(&[
            ("", &["a1.txt", "a1/", "b1/", "z.txt"][..]),
            ("a1/", &["1.txt", "2.txt"][..]),
            ("b1/", &[][..]),
        ])
    }

    #[test]
    fn marker_splits_at_first_separator() {
        assert_eq!(split_marker(""), (String::new(), String::new()));
        assert_eq!(
            split_marker("four/five.txt"),
            ("four/".to_string(), "five.txt".to_string())
        );
        assert_eq!(split_marker("four"), ("four".to_string(), String::new()));
        assert_eq!(
            split_marker("a/b/c.txt"),
            ("a/".to_string(), "b/c.txt".to_string())
        );
    }

    #[tokio::test]
    async fn recursive_walk_is_depth_first_ordered() {
        let tree = sample_tree();
        let results = walk_names(&tree, "", "", true).await;
        let names: Vec<_> = results.iter().map(|r| r.entry.name.as_str()).collect();
        assert_eq!(names, ["a1.txt", "a1/1.txt", "a1/2.txt", "b1/", "z.txt"]);

        // The empty directory is reported as its own placeholder leaf.
        assert!(results[3].is_empty_dir);
        // Only the final emission carries the end flag.
        assert!(results.last().map(|r| r.end).unwrap_or(false));
        assert!(results[..4].iter().all(|r| !r.end));
    }

    #[tokio::test]
    async fn marker_resumes_mid_subtree() {
        let tree = sample_tree();
        let results = walk_names(&tree, "", "a1/1.txt", true).await;
        let names: Vec<_> = results.iter().map(|r| r.entry.name.as_str()).collect();
        assert_eq!(names, ["a1/2.txt", "b1/", "z.txt"]);
    }

    #[tokio::test]
    async fn marker_excludes_delivered_file_but_not_directory_contents() {
        let tree = sample_tree();
        // "a1.txt" was delivered previously; "a1/" must still be expanded.
        let results = walk_names(&tree, "", "a1.txt", true).await;
        let names: Vec<_> = results.iter().map(|r| r.entry.name.as_str()).collect();
        assert_eq!(names, ["a1/1.txt", "a1/2.txt", "b1/", "z.txt"]);
    }

    #[tokio::test]
    async fn nested_marker_is_resplit_at_every_recursion_level() {
        let tree = mem_tree(&[
            ("", &["a/", "x.txt"][..]),
            ("a/", &["b/", "f.txt"][..]),
            ("a/b/", &["1.txt", "2.txt", "c/"][..]),
            ("a/b/c/", &["d.txt"][..]),
        ]);
        // "a/b/1.txt" peels to "b/1.txt" inside "a/" and to "1.txt" inside
        // "a/b/"; the delivered file is skipped, its siblings are not.
        let results = walk_names(&tree, "", "a/b/1.txt", true).await;
        let names: Vec<_> = results.iter().map(|r| r.entry.name.as_str()).collect();
        assert_eq!(names, ["a/b/2.txt", "a/b/c/d.txt", "a/f.txt", "x.txt"]);
    }

    #[tokio::test]
    async fn non_recursive_walk_reports_directories_as_terminal() {
        let tree = sample_tree();
        let results = walk_names(&tree, "", "", false).await;
        let names: Vec<_> = results.iter().map(|r| r.entry.name.as_str()).collect();
        assert_eq!(names, ["a1.txt", "a1/", "b1/", "z.txt"]);
    }

    #[tokio::test]
    async fn prefix_splits_into_dir_and_entry_match() {
        let tree = mem_tree(&[
            ("", &["a1.txt", "a1/", "ab.txt", "b1.txt"][..]),
            ("a1/", &["1.txt"][..]),
        ]);
        let results = walk_names(&tree, "a", "", true).await;
        let names: Vec<_> = results.iter().map(|r| r.entry.name.as_str()).collect();
        assert_eq!(names, ["a1.txt", "a1/1.txt", "ab.txt"]);
    }

    #[tokio::test]
    async fn empty_named_first_entry_reports_the_directory_itself() {
        let tree = mem_tree(&[("", &["d/"][..]), ("d/", &["", "x.txt"][..])]);
        let results = walk_names(&tree, "d/", "", true).await;
        let names: Vec<_> = results.iter().map(|r| r.entry.name.as_str()).collect();
        assert_eq!(names, ["d/", "d/x.txt"]);
    }

    #[tokio::test]
    async fn cancelled_walk_emits_nothing() {
        let tree = sample_tree();
        let end_walk = CancellationToken::new();
        end_walk.cancel();
        let mut rx = start_tree_walk(
            "",
            "",
            "",
            true,
            mem_list_dir(&tree),
            Some(mem_is_leaf()),
            Some(mem_is_leaf_dir(&tree)),
            end_walk,
        );
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn missing_classifiers_terminate_the_walk() {
        let tree = sample_tree();
        let mut rx = start_tree_walk(
            "",
            "",
            "",
            true,
            mem_list_dir(&tree),
            Some(mem_is_leaf()),
            None,
            CancellationToken::new(),
        );
        assert!(rx.recv().await.is_none());
    }
}
