// Capture/reconstruct suite against the JSON document store.
//
// The core invariants exercised:
// - A node captured from a read-only skip-cache handle rebuilds to a node
//   that reads the same value, through a fresh handle.
// - A cached handle rebuilds to the very same instance; a skip-cache handle
//   rebuilds to a distinct one.
// - A skip-cache handle opened for exclusive writing cannot be rebuilt while
//   the writer is open: the reopen fails with ResourceOpen.
// - Capturing a rebuilt node yields the record it was rebuilt from.
// - A node rebuilt from a skip-cache record keeps its private handle open
//   until the node drops; dropping an exclusive writer frees the file.
mod common;

use bincode::Options;
use common::{seed_json, with_mode};
use reopen_cache::{
    CacheSettings, Error, HandleCache, HandleRecord, HandleSeed, JsonDriver, Node, NodeRecord,
    NodeSeed, ResourceHandle,
};
use serde::de::DeserializeSeed;
use serde_json::json;
use std::io::ErrorKind;
use std::path::PathBuf;
use tempfile::TempDir;

fn json_cache() -> HandleCache {
    HandleCache::new(JsonDriver, CacheSettings::default())
}

fn fixture() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    seed_json(&path, &json!({ "group": { "data": 1, "inner": { "flag": true } } }));
    (dir, path)
}

fn from_json(cache: &HandleCache, text: &str) -> Result<Node, serde_json::Error> {
    NodeSeed(cache).deserialize(&mut serde_json::Deserializer::from_str(text))
}

// Test: node round-trip through a read-only skip-cache handle.
#[test]
fn node_round_trip_reads_same_value() {
    let (_dir, path) = fixture();
    let cache = json_cache();
    let h = cache.get_or_open(with_mode(&path, "r"), true).unwrap();
    let node = h.navigate("group/data").unwrap();

    let text = serde_json::to_string(&node).unwrap();
    let back = from_json(&cache, &text).unwrap();

    assert_eq!(back.read().unwrap(), json!(1));
    assert_eq!(back.path(), node.path());
    let owner = back.handle().unwrap();
    assert!(!owner.ptr_eq(&h), "skip-cache records reopen");
    assert!(owner.skip_cache());
    assert_eq!(cache.len(), 0);
    assert_eq!(cache.live_handles(), 2);
}

// Test: node round-trip through a cached handle reuses the handle.
#[test]
fn cached_node_round_trip_reuses_handle() {
    let (_dir, path) = fixture();
    let cache = json_cache();
    let h = cache.get_or_open(with_mode(&path, "r"), false).unwrap();
    let group = h.navigate("group").unwrap().into_collection().unwrap();

    let record = group.capture().unwrap();
    let back = record.reconstruct(&cache).unwrap();
    assert!(back.is_collection());
    assert!(back.handle().unwrap().ptr_eq(&h));
    assert_eq!(back, Node::Collection(group));
}

// Test: handle round-trip identity.
// Verifies: cached records rebuild to the same instance, skip-cache records
// to a new one.
#[test]
fn handle_round_trip_identity() {
    let (_dir, path) = fixture();
    let cache = json_cache();

    let cached = cache.get_or_open(with_mode(&path, "a"), false).unwrap();
    let text = serde_json::to_string(&cached).unwrap();
    let back = HandleSeed(&cache)
        .deserialize(&mut serde_json::Deserializer::from_str(&text))
        .unwrap();
    assert!(back.ptr_eq(&cached));

    let private = cache.get_or_open(with_mode(&path, "a"), true).unwrap();
    let back = private.capture().reconstruct(&cache).unwrap();
    assert!(!back.ptr_eq(&private));
    assert!(!back.ptr_eq(&cached));
    assert!(back.skip_cache());
}

// Test: the captured record carries skip_cache among the named arguments.
#[test]
fn handle_record_shape() {
    let (_dir, path) = fixture();
    let cache = json_cache();
    let h = cache
        .get_or_open(with_mode(&path, "r").with_option("pretty", true), true)
        .unwrap();
    let record = h.capture();
    assert_eq!(record.args.len(), 2);
    assert_eq!(record.kwargs.len(), 2);
    assert_eq!(record.kwargs["skip_cache"].as_bool(), Some(true));

    let (config, skip) = record.clone().into_parts().unwrap();
    assert!(skip);
    assert_eq!(&config, h.config());

    // Closed handles still capture.
    h.close().unwrap();
    assert_eq!(h.capture(), record);
}

// Test: an exclusive writer blocks its own skip-cache reconstruction.
#[test]
fn exclusive_skip_cache_reconstruct_fails() {
    let (_dir, path) = fixture();
    let cache = json_cache();
    let writer = cache.get_or_open(with_mode(&path, "w"), true).unwrap();

    let err = writer.capture().reconstruct(&cache).unwrap_err();
    assert!(matches!(err, Error::ResourceOpen { .. }), "{err}");
    assert_eq!(err.io_source().map(|e| e.kind()), Some(ErrorKind::WouldBlock));
    assert_eq!(cache.live_handles(), 1, "failed opens leave no trace");

    // Same failure through the serde entry point.
    let text = serde_json::to_string(&writer).unwrap();
    let err = HandleSeed(&cache)
        .deserialize(&mut serde_json::Deserializer::from_str(&text))
        .unwrap_err();
    assert!(err.to_string().contains("failed to open"), "{err}");

    // Once the writer is closed the record opens again.
    writer.close().unwrap();
    let again = writer.capture().reconstruct(&cache).unwrap();
    assert!(again.is_open());
}

// Test: re-capture stability.
#[test]
fn recapture_is_stable() {
    let (_dir, path) = fixture();
    let cache = json_cache();
    let h = cache.get_or_open(with_mode(&path, "r"), true).unwrap();
    let first: NodeRecord = h.navigate("group/inner/flag").unwrap().capture().unwrap();

    let rebuilt = first.reconstruct(&cache).unwrap();
    let second = rebuilt.capture().unwrap();
    assert_eq!(first, second);

    let again = second.reconstruct(&cache).unwrap();
    assert_eq!(again.read().unwrap(), json!(true));
}

// Test: records serialize through a binary format as well.
#[test]
fn bincode_round_trip() {
    let (_dir, path) = fixture();
    let cache = json_cache();
    let h = cache.get_or_open(with_mode(&path, "r"), false).unwrap();
    let leaf = h.navigate("group/data").unwrap().into_leaf().unwrap();

    let opts = bincode::DefaultOptions::new();
    let bytes = opts.serialize(&leaf).unwrap();
    let back = opts.deserialize_seed(NodeSeed(&cache), &bytes).unwrap();
    assert_eq!(back.read().unwrap(), json!(1));
    assert!(back.handle().unwrap().ptr_eq(&h));

    let bytes = opts.serialize(&h).unwrap();
    let record: HandleRecord = opts.deserialize(&bytes).unwrap();
    assert_eq!(record, h.capture());
}

// Test: nodes of a closed handle cannot be captured.
#[test]
fn capture_requires_open_handle() {
    let (_dir, path) = fixture();
    let cache = json_cache();
    let h = cache.get_or_open(with_mode(&path, "r"), false).unwrap();
    let node = h.navigate("group").unwrap();
    h.close().unwrap();
    assert!(matches!(node.capture(), Err(Error::ResourceClosed)));
    assert!(serde_json::to_string(&node).is_err());
}

// Test: records whose path no longer resolves fail with Lookup.
#[test]
fn reconstruct_missing_path_fails() {
    let (_dir, path) = fixture();
    let cache = json_cache();
    let h = cache.get_or_open(with_mode(&path, "r"), false).unwrap();
    let mut record = h.navigate("group/data").unwrap().capture().unwrap();
    record.path = record.path.join("/group/gone").unwrap();
    assert!(matches!(record.reconstruct(&cache), Err(Error::Lookup { .. })));
    assert!(h.is_open());
}

// Test: plain Deserialize goes through the process-wide cache.
#[test]
fn global_deserialize_uses_global_cache() {
    let (_dir, path) = fixture();
    let h = ResourceHandle::open(with_mode(&path, "r"), false).unwrap();
    let text = serde_json::to_string(&h).unwrap();
    let back: ResourceHandle = serde_json::from_str(&text).unwrap();
    assert!(back.ptr_eq(&h));

    let node_text = serde_json::to_string(&h.navigate("group/data").unwrap()).unwrap();
    let node: Node = serde_json::from_str(&node_text).unwrap();
    assert_eq!(node.read().unwrap(), json!(1));
    h.close().unwrap();
}

// Test: writes through a handle persist on close and read back elsewhere.
#[test]
fn writes_persist_across_handles() {
    let (_dir, path) = fixture();
    let cache = json_cache();
    let w = cache.get_or_open(with_mode(&path, "r+"), false).unwrap();
    let group = w.root().unwrap().get("group").unwrap().into_collection().unwrap();
    let sub = group.create_collection("made").unwrap();
    sub.write("value", json!([1, 2])).unwrap();
    group.write("data", 5).unwrap();
    w.close().unwrap();

    let r = cache.get_or_open(with_mode(&path, "r"), false).unwrap();
    assert_eq!(r.navigate("group/made/value").unwrap().read().unwrap(), json!([1, 2]));
    assert_eq!(r.navigate("group/data").unwrap().read().unwrap(), json!(5));
    assert!(matches!(r.write("group/data", 6), Err(Error::ReadOnly { .. })));
}

// Test: a node rebuilt from a skip-cache record owns its handle.
// Verifies: the node and its children stay usable without the caller holding
// the handle, and the handle is released once they all drop.
#[test]
fn skip_cache_node_keeps_handle_until_dropped() {
    let (_dir, path) = fixture();
    let cache = json_cache();
    let record = {
        let h = cache.get_or_open(with_mode(&path, "r"), true).unwrap();
        h.navigate("group").unwrap().capture().unwrap()
    };
    assert_eq!(cache.live_handles(), 0, "the dropped handle was released");

    let group = record.reconstruct(&cache).unwrap().into_collection().unwrap();
    assert_eq!(cache.live_handles(), 1);
    let data = group.get("data").unwrap();
    drop(group);
    assert_eq!(data.read().unwrap(), json!(1));
    assert_eq!(cache.live_handles(), 1);

    drop(data);
    assert_eq!(cache.live_handles(), 0);
}

// Test: reconstruct_with_handle hands the owner to the caller.
// Verifies: the node alone does not keep a skip-cache handle open.
#[test]
fn reconstruct_with_handle_returns_owner() {
    let (_dir, path) = fixture();
    let cache = json_cache();
    let h = cache.get_or_open(with_mode(&path, "r"), true).unwrap();
    let record = h.navigate("group/data").unwrap().capture().unwrap();

    let (owner, node) = record.reconstruct_with_handle(&cache).unwrap();
    assert!(owner.skip_cache());
    assert!(!owner.ptr_eq(&h));
    assert!(node.handle().unwrap().ptr_eq(&owner));
    assert_eq!(node.read().unwrap(), json!(1));

    drop(owner);
    assert!(matches!(node.read(), Err(Error::ResourceClosed)));
    assert_eq!(cache.live_handles(), 1);
}

// Test: dropping an exclusive skip-cache writer without close.
// Verifies: the file lock is released, so the record opens again.
#[test]
fn dropped_exclusive_writer_can_be_reopened() {
    let (_dir, path) = fixture();
    let cache = json_cache();
    let writer = cache.get_or_open(with_mode(&path, "w"), true).unwrap();
    let record = writer.capture();
    assert!(matches!(
        record.clone().reconstruct(&cache),
        Err(Error::ResourceOpen { .. })
    ));

    drop(writer);
    let again = record.reconstruct(&cache).unwrap();
    assert!(again.is_open());
    assert!(again.is_writable().unwrap());
}
