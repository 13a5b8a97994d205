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

//! TTL cache of paused walker sessions, so the next page of a listing can
//! resume the walk started for the previous one instead of re-walking.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::tree_walk::TreeWalkResult;

/// Identifies one resumable walk session. Value equality is the cache key:
/// two requests with identical params may share a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListParams {
    pub bucket: String,
    pub recursive: bool,
    pub marker: String,
    pub prefix: String,
}

struct WalkSession {
    result_rx: mpsc::Receiver<TreeWalkResult>,
    end_walk: CancellationToken,
    expiry: JoinHandle<()>,
}

/// Caches at most one live walker session per `ListParams`. A session not
/// released again within the TTL is cancelled and dropped; that expiry is the
/// only guard against producers piling up behind abandoned paginations.
pub struct TreeWalkPool {
    ttl: Duration,
    pool: Arc<Mutex<HashMap<ListParams, WalkSession>>>,
}

impl TreeWalkPool {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            pool: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Removes and returns the session for `params`, if any. The caller owns
    /// it exclusively until a later `set` parks it again.
    pub async fn release(
        &self,
        params: &ListParams,
    ) -> Option<(mpsc::Receiver<TreeWalkResult>, CancellationToken)> {
        let mut pool = self.pool.lock().await;
        let session = pool.remove(params)?;
        // The expiry task cannot get past this lock, so aborting it here
        // cannot race a session the caller now owns.
        session.expiry.abort();
        Some((session.result_rx, session.end_walk))
    }

    /// Parks a session for `params` and arms its expiry timer. An existing
    /// session under the same key is cancelled first: never two live
    /// producers for one key.
    pub async fn set(
        &self,
        params: ListParams,
        result_rx: mpsc::Receiver<TreeWalkResult>,
        end_walk: CancellationToken,
    ) {
        let mut pool = self.pool.lock().await;
        if let Some(old) = pool.remove(&params) {
            old.expiry.abort();
            old.end_walk.cancel();
        }

        let expiry = tokio::spawn({
            let pool = Arc::clone(&self.pool);
            let params = params.clone();
            let ttl = self.ttl;
            async move {
                tokio::time::sleep(ttl).await;
                let mut pool = pool.lock().await;
                if let Some(session) = pool.remove(&params) {
                    tracing::debug!(
                        bucket = %params.bucket,
                        prefix = %params.prefix,
                        marker = %params.marker,
                        "idle walk session expired"
                    );
                    session.end_walk.cancel();
                }
            }
        });

        pool.insert(
            params,
            WalkSession {
                result_rx,
                end_walk,
                expiry,
            },
        );
    }
}
