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

//! Page assembly: drives one walk session (fresh or resumed), fans out
//! metadata resolution with a bounded worker budget, and builds the
//! S3-style result page.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::filter::{has_prefix, has_suffix};
use super::pool::{ListParams, TreeWalkPool};
use super::tree_walk::{start_tree_walk, GetObjectInfoFn, IsLeafDirFn, IsLeafFn, ListDirFn};
use super::{
    ListError, ListObjectsInfo, ObjectInfo, LIST_RESOLVE_CONCURRENCY, MAX_OBJECT_LIST,
    SLASH_SEPARATOR,
};

/// S3 ListObjectsV1 semantics over a hierarchical backend: prefix, marker,
/// delimiter and max-keys in; objects, common prefixes, truncation flag and
/// next marker out. With a slash or empty delimiter the walk session is
/// parked in `pool` between pages; other delimiters always re-walk.
#[allow(clippy::too_many_arguments)]
pub async fn list_objects(
    bucket: &str,
    prefix: &str,
    marker: &str,
    delimiter: &str,
    max_keys: i32,
    pool: &TreeWalkPool,
    list_dir: ListDirFn,
    is_leaf: Option<IsLeafFn>,
    is_leaf_dir: Option<IsLeafDirFn>,
    get_obj_info: GetObjectInfoFn,
    get_object_info_dirs: &[GetObjectInfoFn],
) -> Result<ListObjectsInfo, ListError> {
    if delimiter != SLASH_SEPARATOR && !delimiter.is_empty() {
        return list_objects_non_slash(
            bucket,
            prefix,
            marker,
            delimiter,
            max_keys,
            list_dir,
            is_leaf,
            is_leaf_dir,
            get_obj_info,
        )
        .await;
    }

    // A marker with nothing in common with the prefix means there is nothing
    // left to list; an empty page, not an error.
    if !marker.is_empty() && !has_prefix(marker, prefix) {
        return Ok(ListObjectsInfo::default());
    }

    if max_keys == 0 {
        return Ok(ListObjectsInfo::default());
    }

    // With delimiter and prefix both "/" no key can sit directly under the
    // root, so the page is empty by construction.
    if delimiter == SLASH_SEPARATOR && prefix == SLASH_SEPARATOR {
        return Ok(ListObjectsInfo::default());
    }

    let max_keys = if max_keys < 0 || max_keys as usize > MAX_OBJECT_LIST {
        MAX_OBJECT_LIST
    } else {
        max_keys as usize
    };

    // Default is recursive; a slash delimiter stops at one level.
    let recursive = delimiter != SLASH_SEPARATOR;

    let params = ListParams {
        bucket: bucket.to_string(),
        recursive,
        marker: marker.to_string(),
        prefix: prefix.to_string(),
    };
    let (mut walk_rx, end_walk) = match pool.release(&params).await {
        Some(session) => session,
        None => {
            let end_walk = CancellationToken::new();
            let walk_rx = start_tree_walk(
                bucket,
                prefix,
                marker,
                recursive,
                list_dir,
                is_leaf,
                is_leaf_dir,
                end_walk.clone(),
            );
            (walk_rx, end_walk)
        }
    };

    // Resolution tasks write into the slot fixed at dispatch, so the page
    // keeps walk order no matter the completion order.
    let resolve_cancel = CancellationToken::new();
    let budget = Arc::new(Semaphore::new(LIST_RESOLVE_CONCURRENCY));
    let mut tasks: JoinSet<Result<(usize, Option<ObjectInfo>), ListError>> = JoinSet::new();

    let mut eof = false;
    let mut dispatched = 0usize;
    while dispatched < max_keys {
        let Some(walk_result) = walk_rx.recv().await else {
            eof = true;
            break;
        };
        let index = dispatched;
        dispatched += 1;

        let end = walk_result.end;
        let entry = walk_result.entry;
        let permit = budget
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ListError::Internal("resolver budget closed".into()))?;
        let bucket = bucket.to_string();
        let cancel = resolve_cancel.clone();

        if has_suffix(&entry.name, SLASH_SEPARATOR) {
            let resolvers = get_object_info_dirs.to_vec();
            tasks.spawn(async move {
                let _permit = permit;
                let mut found: Option<ObjectInfo> = None;
                for resolver in resolvers {
                    let resolved = tokio::select! {
                        _ = cancel.cancelled() => return Err(ListError::WalkAbort),
                        resolved = (*resolver)(bucket.clone(), entry.name.clone(), entry.info.clone()) => resolved,
                    };
                    match resolved {
                        Ok(info) => {
                            found = Some(info);
                            break;
                        }
                        Err(err) if err.is_not_found() => {
                            // Removed mid-listing: keep a placeholder, the
                            // next resolver may still override it.
                            found = Some(ObjectInfo {
                                bucket: bucket.clone(),
                                name: entry.name.clone(),
                                is_dir: true,
                                ..Default::default()
                            });
                        }
                        Err(err) => return Err(err),
                    }
                }
                Ok((index, found))
            });
        } else {
            let get_obj_info = get_obj_info.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let resolved = tokio::select! {
                    _ = cancel.cancelled() => return Err(ListError::WalkAbort),
                    resolved = (*get_obj_info)(bucket, entry.name, entry.info) => resolved,
                };
                match resolved {
                    Ok(info) => Ok((index, Some(info))),
                    // The object may have been deleted between the walk and
                    // this stat; drop the slot.
                    Err(err) if err.is_not_found() => Ok((index, None)),
                    Err(err) => Err(err),
                }
            });
        }

        if end {
            eof = true;
            break;
        }
    }

    let mut slots: Vec<Option<ObjectInfo>> = vec![None; dispatched];
    let mut first_err: Option<ListError> = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok((index, info))) => slots[index] = info,
            // Aborted siblings of a failed resolution; not the page error.
            Ok(Err(ListError::WalkAbort)) => {}
            Ok(Err(err)) => {
                resolve_cancel.cancel();
                first_err.get_or_insert(err);
            }
            Err(join_err) => {
                resolve_cancel.cancel();
                first_err.get_or_insert(ListError::Internal(format!(
                    "resolver task failed: {join_err}"
                )));
            }
        }
    }
    if let Some(err) = first_err {
        end_walk.cancel();
        return Err(err);
    }

    let mut obj_infos: Vec<ObjectInfo> = Vec::with_capacity(dispatched);
    let mut next_marker = String::new();
    for info in slots.into_iter().flatten() {
        next_marker = info.name.clone();
        obj_infos.push(info);
    }

    // Park the walk for the next page if it still has entries to give.
    if !eof {
        let params = ListParams {
            bucket: bucket.to_string(),
            recursive,
            marker: next_marker.clone(),
            prefix: prefix.to_string(),
        };
        pool.set(params, walk_rx, end_walk).await;
    }

    let mut result = ListObjectsInfo::default();
    for info in obj_infos {
        if info.is_dir && delimiter == SLASH_SEPARATOR && info.name != prefix {
            result.prefixes.push(info.name);
            continue;
        }
        result.objects.push(info);
    }
    if !eof {
        result.is_truncated = true;
        result.next_marker = next_marker;
    }

    Ok(result)
}

/// Listing with a delimiter other than "/": always a fresh recursive walk,
/// resolved sequentially, collapsing names at the delimiter into common
/// prefixes. Never pooled, since the collapse needs strictly ordered dedup.
#[allow(clippy::too_many_arguments)]
async fn list_objects_non_slash(
    bucket: &str,
    prefix: &str,
    marker: &str,
    delimiter: &str,
    max_keys: i32,
    list_dir: ListDirFn,
    is_leaf: Option<IsLeafFn>,
    is_leaf_dir: Option<IsLeafDirFn>,
    get_obj_info: GetObjectInfoFn,
) -> Result<ListObjectsInfo, ListError> {
    let end_walk = CancellationToken::new();
    // Stops the producer when this call returns, consumed or not.
    let _stop_walk = end_walk.clone().drop_guard();
    let mut walk_rx = start_tree_walk(
        bucket,
        prefix,
        "",
        true,
        list_dir,
        is_leaf,
        is_leaf_dir,
        end_walk,
    );

    let mut obj_infos: Vec<ObjectInfo> = Vec::new();
    let mut eof = false;
    let mut prev_prefix = String::new();

    loop {
        if max_keys >= 0 && obj_infos.len() == max_keys as usize {
            break;
        }
        let Some(walk_result) = walk_rx.recv().await else {
            eof = true;
            break;
        };

        let name = &walk_result.entry.name;
        let suffix = name.strip_prefix(prefix).unwrap_or(name);
        let obj_info = match suffix.find(delimiter) {
            None => {
                match (*get_obj_info)(
                    bucket.to_string(),
                    name.clone(),
                    walk_result.entry.info.clone(),
                )
                .await
                {
                    Ok(info) => info,
                    Err(err) if err.is_not_found() => continue,
                    Err(err) => return Err(err),
                }
            }
            Some(idx) => {
                // suffix is a tail slice of name, so this stays in bounds
                // even when the prefix only matched after case folding.
                let cut = name.len() - suffix.len() + idx + delimiter.len();
                let curr_prefix = name[..cut].to_string();
                if curr_prefix == prev_prefix {
                    continue;
                }
                prev_prefix = curr_prefix.clone();
                ObjectInfo {
                    bucket: bucket.to_string(),
                    name: curr_prefix,
                    is_dir: true,
                    ..Default::default()
                }
            }
        };

        if obj_info.name.as_str() <= marker {
            continue;
        }
        obj_infos.push(obj_info);
        if walk_result.end {
            eof = true;
            break;
        }
    }

    let next_marker = obj_infos.last().map(|o| o.name.clone()).unwrap_or_default();

    let mut result = ListObjectsInfo::default();
    for info in obj_infos {
        if info.is_dir {
            result.prefixes.push(info.name);
            continue;
        }
        result.objects.push(info);
    }
    if !eof {
        result.is_truncated = true;
        result.next_marker = next_marker;
    }

    Ok(result)
}
