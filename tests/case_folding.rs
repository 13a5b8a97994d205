//! Case-insensitive matching gets its own test binary: the sensitivity flag
//! is process-wide and latches on first use.

use std::time::Duration;

use tempfile::TempDir;
use treelist::backend::FsLister;
use treelist::list::{filter, list_objects, TreeWalkPool};

#[tokio::test]
async fn folded_prefix_longer_than_the_common_prefix_groups_safely() {
    filter::set_case_insensitive(true);

    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("ab-cd"), b"x").unwrap();
    std::fs::write(dir.path().join("ab-ce"), b"x").unwrap();

    let backend = FsLister::new(dir.path());
    let pool = TreeWalkPool::new(Duration::from_secs(30));

    // "AB-C" matches only after folding, so the names cannot be stripped
    // byte-wise; the delimiter cut must still stay inside the name.
    let page = list_objects(
        "",
        "AB-C",
        "",
        "-",
        100,
        &pool,
        backend.list_dir_fn(),
        Some(backend.is_leaf_fn()),
        Some(backend.is_leaf_dir_fn()),
        backend.object_info_fn(),
        &[],
    )
    .await
    .unwrap();

    let prefixes: Vec<_> = page.prefixes.iter().map(String::as_str).collect();
    assert_eq!(prefixes, ["ab-"]);
    assert!(page.objects.is_empty());
}

#[tokio::test]
async fn folded_prefix_narrows_the_walk() {
    filter::set_case_insensitive(true);

    let dir = TempDir::new().unwrap();
    for name in ["Apple.txt", "apricot.txt", "banana.txt"] {
        std::fs::write(dir.path().join(name), b"x").unwrap();
    }

    let backend = FsLister::new(dir.path());
    let pool = TreeWalkPool::new(Duration::from_secs(30));

    let page = list_objects(
        "",
        "a",
        "",
        "",
        100,
        &pool,
        backend.list_dir_fn(),
        Some(backend.is_leaf_fn()),
        Some(backend.is_leaf_dir_fn()),
        backend.object_info_fn(),
        &[backend.object_info_fn()],
    )
    .await
    .unwrap();

    // On-disk spelling is preserved; only the match folds case.
    let names: Vec<_> = page.objects.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, ["Apple.txt", "apricot.txt"]);
}
