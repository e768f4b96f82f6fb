//! End-to-end tests composing wrappers the way deployments do: mount
//! tables over namespaced and auto-batched children, lazy children under
//! mounts, and query pagination across the whole assembly.

use std::sync::Arc;

use mosaic::{
    namespace, AutoBatchStore, Key, LazyStore, MemStore, Mount, MountStore, MountedStore,
    Order, Query, Store,
};

fn mounted_mem(prefix: &str, store: MemStore) -> Mount {
    Mount::new(Key::path(prefix), MountedStore::batching(Arc::new(store)))
}

#[test]
fn test_mount_routing_and_masking() {
    let root = MemStore::new();
    let foo = MemStore::new();
    let foobar = MemStore::new();
    let ds = MountStore::new(vec![
        mounted_mem("/", root.clone()),
        mounted_mem("/foo", foo.clone()),
        mounted_mem("/foo/bar", foobar.clone()),
    ]);

    ds.put(&Key::path("/foo/bar/baz"), b"a".to_vec()).unwrap();
    ds.put(&Key::path("/foo/baz"), b"b".to_vec()).unwrap();
    ds.put(&Key::path("/other"), b"c".to_vec()).unwrap();

    assert_eq!(foobar.get(&Key::path("/baz")).unwrap(), b"a");
    assert_eq!(foo.get(&Key::path("/baz")).unwrap(), b"b");
    assert_eq!(root.get(&Key::path("/other")).unwrap(), b"c");

    // A key the root store holds under /foo is masked by the /foo mount.
    root.put(&Key::path("/foo/shadowed"), b"x".to_vec()).unwrap();
    assert!(!ds.has(&Key::path("/foo/shadowed")).unwrap());

    // The composite reads back through the same paths.
    assert_eq!(ds.get(&Key::path("/foo/bar/baz")).unwrap(), b"a");
    assert_eq!(ds.get_size(&Key::path("/foo/baz")).unwrap(), 1);
}

#[test]
fn test_partial_sync_through_autobatch_children() {
    let foo_child = MemStore::new();
    let bare_child = MemStore::new();
    let foo = Arc::new(AutoBatchStore::new(foo_child.clone(), 100));
    let bare = Arc::new(AutoBatchStore::new(bare_child.clone(), 100));
    let ds = MountStore::new(vec![
        Mount::new(Key::path("/foo"), MountedStore::batching(foo)),
        Mount::new(Key::path("/"), MountedStore::batching(bare)),
    ]);

    ds.put(&Key::path("/foo/a"), b"1".to_vec()).unwrap();
    ds.put(&Key::path("/unrelated"), b"2".to_vec()).unwrap();

    // Syncing /foo flushes only the /foo mount's buffer.
    ds.sync(&Key::path("/foo")).unwrap();
    assert!(foo_child.has(&Key::path("/a")).unwrap());
    assert!(!bare_child.has(&Key::path("/unrelated")).unwrap());

    // Syncing the root reaches everything.
    ds.sync(&Key::root()).unwrap();
    assert!(bare_child.has(&Key::path("/unrelated")).unwrap());
}

#[test]
fn test_merged_query_with_pagination() {
    let a = MemStore::new();
    let b = MemStore::new();
    for k in ["/1", "/3", "/5"] {
        a.put(&Key::path(k), b"v".to_vec()).unwrap();
    }
    for k in ["/2", "/4"] {
        b.put(&Key::path(k), b"v".to_vec()).unwrap();
    }
    let ds = MountStore::new(vec![mounted_mem("/a", a), mounted_mem("/b", b)]);

    let q = Query {
        orders: vec![Order::ByKey],
        ..Query::default()
    };
    let all = ds.query(q.clone()).unwrap().rest_keys().unwrap();
    assert_eq!(
        all,
        vec![
            Key::path("/a/1"),
            Key::path("/b/2"),
            Key::path("/a/3"),
            Key::path("/b/4"),
            Key::path("/a/5"),
        ]
    );

    // offset/limit over the merged stream equals a slice of the full scan.
    let page = ds
        .query(Query {
            offset: 1,
            limit: 2,
            ..q
        })
        .unwrap()
        .rest_keys()
        .unwrap();
    assert_eq!(page, all[1..3].to_vec());
}

#[test]
fn test_namespace_under_mount() {
    let backing = MemStore::new();
    let ns = namespace::wrap(Key::path("/tenant-a"), backing.clone());
    let ds = MountStore::new(vec![Mount::new(
        Key::path("/data"),
        MountedStore::new(Arc::new(ns)),
    )]);

    ds.put(&Key::path("/data/doc"), b"v".to_vec()).unwrap();
    assert_eq!(backing.get(&Key::path("/tenant-a/doc")).unwrap(), b"v");
    let keys = ds
        .query(Query::with_prefix(Key::path("/data")))
        .unwrap()
        .rest_keys()
        .unwrap();
    assert_eq!(keys, vec![Key::path("/data/doc")]);
}

#[test]
fn test_lazy_child_under_mount_activates_on_demand() {
    fn release() -> mosaic::Action {
        Box::new(|slot| {
            *slot = None;
            Ok(())
        })
    }
    let lazy = LazyStore::new(
        Box::new(|_| Ok(())),
        Box::new(|slot| {
            *slot = Some(Box::new(MemStore::new()));
            Ok(())
        }),
        release(),
        release(),
    )
    .unwrap();
    let lazy = Arc::new(lazy);
    let ds = MountStore::new(vec![Mount::new(
        Key::path("/cold"),
        MountedStore::new(lazy.clone()),
    )]);

    assert!(!lazy.is_active());
    ds.put(&Key::path("/cold/k"), b"v".to_vec()).unwrap();
    assert!(lazy.is_active());
    assert_eq!(ds.get(&Key::path("/cold/k")).unwrap(), b"v");
}

#[test]
fn test_autobatch_explicit_batch_bypasses_buffer() {
    let child = MemStore::new();
    let ab = AutoBatchStore::new(child.clone(), 100);
    let mut batch = mosaic::BatchingStore::batch(&ab).unwrap();
    batch.put(&Key::path("/a"), b"v".to_vec()).unwrap();
    batch.commit().unwrap();
    // Landed in the child directly, not in the buffer.
    assert!(child.has(&Key::path("/a")).unwrap());
}

#[test]
fn test_mount_close_reaches_autobatch_buffers() {
    let child = MemStore::new();
    let ab = Arc::new(AutoBatchStore::new(child.clone(), 100));
    let ds = MountStore::new(vec![Mount::new(
        Key::path("/"),
        MountedStore::batching(ab),
    )]);
    ds.put(&Key::path("/a"), b"v".to_vec()).unwrap();
    assert!(child.is_empty());
    ds.close().unwrap();
    assert!(child.has(&Key::path("/a")).unwrap());
}
