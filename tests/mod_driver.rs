use std::collections::HashSet;

use beebuf::message::{Descriptor, DynMessage, Reflect};
use beebuf::{BeeError, BlockStore, Environment, build_multiblock, generate_wbp_file};
use tempfile::tempdir;

fn test_env(root: &std::path::Path) -> Environment {
    Environment::new(root.join("cache"), root.join("blocks"))
}

fn load_block(env: &Environment, scratch: &std::path::Path, content: &[u8]) -> Vec<u8> {
    let store = BlockStore::open(env).unwrap();
    let source = scratch.join(format!("src-{}", content.len()));
    std::fs::write(&source, content).unwrap();
    let (digest, _) = store.create_block(&source, false).unwrap();
    digest
}

#[test]
fn test_reconstruction_matches_pruned_serialisation() {
    let dir = tempdir().unwrap();
    let env = test_env(dir.path());
    let digest = load_block(&env, dir.path(), &vec![0xAAu8; 600]);

    let mut message = DynMessage::new();
    message.push_str(1, "item1");
    message.push_bytes(2, Descriptor::for_digest(env.algorithm, &digest).encode_to_vec());
    let pruned = message.encode_to_vec();

    let allow: HashSet<Vec<u8>> = HashSet::from([digest]);
    let (_, out_dir) = build_multiblock(&message, &allow, &env).unwrap();

    // Drop the builder's copy and regenerate from the segments alone. The
    // stored prefix holds 600 (two varint bytes) and must shrink to 70.
    std::fs::remove_file(out_dir.join("wbp.bin")).unwrap();
    generate_wbp_file(&out_dir, &env).unwrap();
    assert_eq!(std::fs::read(out_dir.join("wbp.bin")).unwrap(), pruned);
}

#[test]
fn test_reconstruction_of_nested_siblings() {
    let dir = tempdir().unwrap();
    let env = test_env(dir.path());
    let digest = load_block(&env, dir.path(), &[0xBBu8; 100]);

    let mut sub = DynMessage::new();
    sub.push_bytes(1, Descriptor::for_digest(env.algorithm, &digest).encode_to_vec());
    let mut message = DynMessage::new();
    message.push_message(1, sub.clone());
    message.push_message(2, sub);
    let pruned = message.encode_to_vec();

    let allow: HashSet<Vec<u8>> = HashSet::from([digest]);
    let (_, out_dir) = build_multiblock(&message, &allow, &env).unwrap();
    std::fs::remove_file(out_dir.join("wbp.bin")).unwrap();
    generate_wbp_file(&out_dir, &env).unwrap();
    assert_eq!(std::fs::read(out_dir.join("wbp.bin")).unwrap(), pruned);
}

#[test]
fn test_reconstruction_shrinks_nested_prefixes() {
    let dir = tempdir().unwrap();
    let env = test_env(dir.path());
    let digest = load_block(&env, dir.path(), &vec![0xCCu8; 1024]);

    // Four levels deep: every stored prefix is a two-byte varint that
    // must shrink to one byte on reconstruction.
    let mut nested = DynMessage::new();
    nested.push_bytes(1, Descriptor::for_digest(env.algorithm, &digest).encode_to_vec());
    for _ in 0..3 {
        let mut wrapper = DynMessage::new();
        wrapper.push_message(1, nested);
        nested = wrapper;
    }
    let pruned = nested.encode_to_vec();

    let allow: HashSet<Vec<u8>> = HashSet::from([digest]);
    let (_, out_dir) = build_multiblock(&nested, &allow, &env).unwrap();
    std::fs::remove_file(out_dir.join("wbp.bin")).unwrap();
    generate_wbp_file(&out_dir, &env).unwrap();
    assert_eq!(std::fs::read(out_dir.join("wbp.bin")).unwrap(), pruned);
}

#[test]
fn test_offset_inside_block_is_drift() {
    let dir = tempdir().unwrap();
    let env = test_env(dir.path());
    let digest = load_block(&env, dir.path(), &vec![0xAAu8; 600]);

    let mut message = DynMessage::new();
    message.push_str(1, "item1");
    message.push_bytes(2, Descriptor::for_digest(env.algorithm, &digest).encode_to_vec());
    let allow: HashSet<Vec<u8>> = HashSet::from([digest.clone()]);
    let (_, out_dir) = build_multiblock(&message, &allow, &env).unwrap();

    // Segment 1 is 10 bytes; offset 12 lands inside the block's body.
    std::fs::write(
        out_dir.join("_.json"),
        format!("[1,[\"{}\",[12]],2]", hex::encode(&digest)),
    )
    .unwrap();
    let err = generate_wbp_file(&out_dir, &env).unwrap_err();
    assert!(matches!(err, BeeError::InconsistentLengths(_)));
}

#[test]
fn test_missing_block_is_reported() {
    let dir = tempdir().unwrap();
    let env = test_env(dir.path());
    BlockStore::open(&env).unwrap();

    let out_dir = dir.path().join("cachedir");
    std::fs::create_dir_all(&out_dir).unwrap();
    std::fs::write(out_dir.join("1"), [0x0A, 0x02]).unwrap();
    std::fs::write(out_dir.join("2"), []).unwrap();
    std::fs::write(out_dir.join("_.json"), format!("[1,[\"{}\",[1]],2]", "ee".repeat(32)))
        .unwrap();
    let err = generate_wbp_file(&out_dir, &env).unwrap_err();
    assert!(matches!(err, BeeError::UnknownBlock(_)));
}
