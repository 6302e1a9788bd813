use std::collections::HashSet;

use beebuf::builder::{compute_real_lengths, create_lengths_tree, search_message};
use beebuf::message::{Descriptor, DynMessage, Reflect};
use beebuf::store::manifest::{Manifest, ManifestEntry};
use beebuf::{BlockStore, Environment, build_multiblock};
use tempfile::tempdir;

fn test_env(root: &std::path::Path) -> Environment {
    Environment::new(root.join("cache"), root.join("blocks"))
}

/// Ingest `content` as a block, returning its raw digest.
fn load_block(env: &Environment, scratch: &std::path::Path, content: &[u8]) -> Vec<u8> {
    let store = BlockStore::open(env).unwrap();
    let source = scratch.join(format!("src-{}", content.len()));
    std::fs::write(&source, content).unwrap();
    let (digest, _) = store.create_block(&source, false).unwrap();
    digest
}

fn pointer_message(env: &Environment, digest: &[u8]) -> DynMessage {
    let mut m = DynMessage::new();
    m.push_str(1, "item1");
    m.push_bytes(2, Descriptor::for_digest(env.algorithm, digest).encode_to_vec());
    m
}

#[test]
fn test_single_leaf_pointer() {
    let dir = tempdir().unwrap();
    let env = test_env(dir.path());
    let content = vec![0xAAu8; 600];
    let digest = load_block(&env, dir.path(), &content);
    let message = pointer_message(&env, &digest);
    let pruned = message.encode_to_vec();
    assert_eq!(pruned.len(), 79);

    let allow: HashSet<Vec<u8>> = HashSet::from([digest.clone()]);
    let (content_id, out_dir) = build_multiblock(&message, &allow, &env).unwrap();

    // Manifest: segment, reference at the pointer's length prefix, segment.
    let manifest = Manifest::load(&out_dir).unwrap();
    assert_eq!(
        manifest.entries,
        vec![
            ManifestEntry::Segment(1),
            ManifestEntry::Reference(hex::encode(&digest), vec![8]),
            ManifestEntry::Segment(2),
        ]
    );

    // Segment 1 holds the prefix up to the descriptor, with the length
    // prefix rewritten to the block's real size; segment 2 is empty.
    let mut expected_first = pruned[..8].to_vec();
    expected_first.extend(beebuf::wire::varint::encode(600));
    assert_eq!(std::fs::read(out_dir.join("1")).unwrap(), expected_first);
    assert_eq!(std::fs::read(out_dir.join("2")).unwrap(), Vec::<u8>::new());

    // wbp.bin is the pruned buffer verbatim.
    assert_eq!(std::fs::read(out_dir.join("wbp.bin")).unwrap(), pruned);

    // content_id = digest(segment 1 || block bytes || segment 2).
    let mut hasher = env.algorithm.hasher();
    hasher.update(&expected_first);
    hasher.update(&content);
    assert_eq!(content_id, hasher.finalize());
}

#[test]
fn test_two_siblings_sharing_one_block() {
    let dir = tempdir().unwrap();
    let env = test_env(dir.path());
    let digest = load_block(&env, dir.path(), &[0xBBu8; 100]);

    let mut sub = DynMessage::new();
    sub.push_bytes(1, Descriptor::for_digest(env.algorithm, &digest).encode_to_vec());
    let mut message = DynMessage::new();
    message.push_message(1, sub.clone());
    message.push_message(2, sub);

    let allow: HashSet<Vec<u8>> = HashSet::from([digest.clone()]);
    let (content_id, out_dir) = build_multiblock(&message, &allow, &env).unwrap();

    // Same digest recorded twice, with distinct real-offset paths.
    let manifest = Manifest::load(&out_dir).unwrap();
    let digest_hex = hex::encode(&digest);
    assert_eq!(
        manifest.entries,
        vec![
            ManifestEntry::Segment(1),
            ManifestEntry::Reference(digest_hex.clone(), vec![1, 3]),
            ManifestEntry::Segment(2),
            ManifestEntry::Reference(digest_hex, vec![105, 107]),
            ManifestEntry::Segment(3),
        ]
    );

    // Each parent's real length is pruned - descriptor_len + block size:
    // 72 - 70 + 100 = 102.
    assert_eq!(std::fs::read(out_dir.join("1")).unwrap(), vec![0x0A, 102, 0x0A, 100]);
    assert_eq!(std::fs::read(out_dir.join("2")).unwrap(), vec![0x12, 102, 0x0A, 100]);
    assert_eq!(std::fs::read(out_dir.join("3")).unwrap(), Vec::<u8>::new());

    let mut hasher = env.algorithm.hasher();
    hasher.update(&[0x0A, 102, 0x0A, 100]);
    hasher.update(&[0xBBu8; 100]);
    hasher.update(&[0x12, 102, 0x0A, 100]);
    hasher.update(&[0xBBu8; 100]);
    assert_eq!(content_id, hasher.finalize());
}

#[test]
fn test_real_length_solver_four_levels() {
    let dir = tempdir().unwrap();
    let env = test_env(dir.path());
    let digest = load_block(&env, dir.path(), &vec![0xCCu8; 1024]);

    let mut level4 = DynMessage::new();
    level4.push_bytes(1, Descriptor::for_digest(env.algorithm, &digest).encode_to_vec());
    let mut level3 = DynMessage::new();
    level3.push_message(1, level4);
    let mut level2 = DynMessage::new();
    level2.push_message(1, level3);
    let mut message = DynMessage::new();
    message.push_message(1, level2);

    let allow: HashSet<Vec<u8>> = HashSet::from([digest.clone()]);
    let container = search_message(&message, &allow, env.algorithm);
    assert_eq!(container[&hex::encode(&digest)], vec![vec![1, 3, 5, 7]]);

    let tree = create_lengths_tree(
        container
            .iter()
            .flat_map(|(hex, paths)| paths.iter().map(move |p| (hex.as_str(), p.as_slice()))),
    )
    .unwrap();
    let buffer = message.encode_to_vec();
    let store = BlockStore::open(&env).unwrap();
    let records = compute_real_lengths(&tree, &buffer, &store, env.algorithm).unwrap();

    let leaf = records[&7];
    assert!(leaf.leaf);
    assert_eq!((leaf.real, leaf.pruned), (1024, 70));
    // Each ancestor grows by its child's (real + width) - (pruned + width).
    assert_eq!((records[&5].real, records[&5].pruned), (1027, 72));
    assert_eq!((records[&3].real, records[&3].pruned), (1030, 74));
    assert_eq!((records[&1].real, records[&1].pruned), (1033, 76));
    for record in records.values() {
        assert!(record.real >= record.pruned);
    }
}

#[test]
fn test_zero_length_submessage_is_legal() {
    let dir = tempdir().unwrap();
    let env = test_env(dir.path());
    let digest = load_block(&env, dir.path(), &[0xDDu8; 256]);

    let mut message = DynMessage::new();
    message.push_message(1, DynMessage::new());
    message.push_bytes(2, Descriptor::for_digest(env.algorithm, &digest).encode_to_vec());
    let pruned = message.encode_to_vec();
    assert_eq!(&pruned[..2], &[0x0A, 0x00]);

    let allow: HashSet<Vec<u8>> = HashSet::from([digest.clone()]);
    let (_, out_dir) = build_multiblock(&message, &allow, &env).unwrap();
    let manifest = Manifest::load(&out_dir).unwrap();
    assert_eq!(
        manifest.entries,
        vec![
            ManifestEntry::Segment(1),
            ManifestEntry::Reference(hex::encode(&digest), vec![3]),
            ManifestEntry::Segment(2),
        ]
    );
    assert_eq!(std::fs::read(out_dir.join("wbp.bin")).unwrap(), pruned);
}

#[test]
fn test_root_pointer_and_deep_pointer() {
    let dir = tempdir().unwrap();
    let env = test_env(dir.path());
    let digest_a = load_block(&env, dir.path(), &[0x11u8; 128]);
    let digest_b = load_block(&env, dir.path(), &[0x22u8; 512]);

    let mut deep = DynMessage::new();
    deep.push_bytes(1, Descriptor::for_digest(env.algorithm, &digest_b).encode_to_vec());
    for _ in 0..4 {
        let mut wrapper = DynMessage::new();
        wrapper.push_message(1, deep);
        deep = wrapper;
    }
    let mut message = DynMessage::new();
    message.push_bytes(1, Descriptor::for_digest(env.algorithm, &digest_a).encode_to_vec());
    message.push_message(2, deep);

    let allow: HashSet<Vec<u8>> = HashSet::from([digest_a.clone(), digest_b.clone()]);
    let (_, out_dir) = build_multiblock(&message, &allow, &env).unwrap();
    let manifest = Manifest::load(&out_dir).unwrap();
    let paths: Vec<(String, usize)> = manifest
        .references()
        .map(|(hex, path)| (hex.to_string(), path.len()))
        .collect();
    assert_eq!(paths, vec![(hex::encode(&digest_a), 1), (hex::encode(&digest_b), 5)]);
}

#[test]
fn test_no_pointers_yields_single_segment() {
    let dir = tempdir().unwrap();
    let env = test_env(dir.path());
    let mut message = DynMessage::new();
    message.push_str(1, "plain");
    let pruned = message.encode_to_vec();

    let (content_id, out_dir) = build_multiblock(&message, &HashSet::new(), &env).unwrap();
    let manifest = Manifest::load(&out_dir).unwrap();
    assert_eq!(manifest.entries, vec![ManifestEntry::Segment(1)]);
    assert_eq!(std::fs::read(out_dir.join("1")).unwrap(), pruned);

    let mut hasher = env.algorithm.hasher();
    hasher.update(&pruned);
    assert_eq!(content_id, hasher.finalize());
}

#[test]
fn test_manifest_json_shape() {
    let mut manifest = Manifest::new();
    manifest.push_segment(1);
    manifest.push_reference("ab".repeat(32), vec![8, 21]);
    manifest.push_segment(2);
    let json = serde_json::to_string(&manifest.entries).unwrap();
    assert_eq!(json, format!("[1,[\"{}\",[8,21]],2]", "ab".repeat(32)));
    let parsed: Vec<ManifestEntry> = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, manifest.entries);
}
