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

use std::time::Duration;

use clap::Parser;
use treelist::backend::FsLister;
use treelist::config::Config;
use treelist::list::{filter, list_objects, TreeWalkPool};
use treelist::observability::tracing_setup;

#[derive(Parser, Debug)]
#[command(name = "treelist")]
#[command(about = "Paginated S3-style listing over a local directory tree", long_about = None)]
struct Args {
    /// Root directory to list (overrides config)
    #[arg(short, long)]
    root: Option<String>,

    /// Key prefix filter
    #[arg(short, long, default_value = "")]
    prefix: String,

    /// Start listing strictly after this key
    #[arg(short, long, default_value = "")]
    marker: String,

    /// Group keys up to this delimiter into common prefixes
    #[arg(short, long, default_value = "")]
    delimiter: String,

    /// Page size
    #[arg(long, default_value_t = 100)]
    max_keys: i32,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_setup::init_tracing_from_env();

    let args = Args::parse();

    let cfg = if std::path::Path::new(&args.config).exists() {
        Config::from_path(&args.config)?
    } else {
        Config::default()
    };

    if let Some(insensitive) = cfg.listing.case_insensitive {
        filter::set_case_insensitive(insensitive);
    }

    // Command line args override config file
    let root = args.root.unwrap_or(cfg.root);
    tracing::info!(root = %root, prefix = %args.prefix, "listing");

    let backend = FsLister::new(root);
    let pool = TreeWalkPool::new(Duration::from_secs(cfg.listing.pool_ttl_secs));

    let mut marker = args.marker.clone();
    let mut total_objects = 0usize;
    let mut total_prefixes = 0usize;
    loop {
        let page = list_objects(
            "",
            &args.prefix,
            &marker,
            &args.delimiter,
            args.max_keys,
            &pool,
            backend.list_dir_fn(),
            Some(backend.is_leaf_fn()),
            Some(backend.is_leaf_dir_fn()),
            backend.object_info_fn(),
            &[backend.object_info_fn()],
        )
        .await?;

        for prefix in &page.prefixes {
            println!("{prefix}");
        }
        for obj in &page.objects {
            println!("{}", obj.name);
        }
        total_objects += page.objects.len();
        total_prefixes += page.prefixes.len();

        if !page.is_truncated || page.next_marker.is_empty() {
            break;
        }
        marker = page.next_marker;
    }

    tracing::info!(total_objects, total_prefixes, "listing complete");
    Ok(())
}
