use beebuf::{BeeError, BlockStore, DigestAlgorithm, Environment};
use tempfile::tempdir;

fn test_env(root: &std::path::Path) -> Environment {
    Environment::new(root.join("cache"), root.join("blocks"))
}

#[test]
fn test_create_block_by_move() {
    let dir = tempdir().unwrap();
    let env = test_env(dir.path());
    let store = BlockStore::open(&env).unwrap();

    let source = dir.path().join("payload.bin");
    std::fs::write(&source, vec![0xAAu8; 600]).unwrap();
    let (digest, descriptor) = store.create_block(&source, false).unwrap();

    let digest_hex = hex::encode(&digest);
    assert!(!source.exists());
    assert!(store.exists(&digest_hex));
    assert!(!store.is_multiblock(&digest_hex));
    assert_eq!(store.size(&digest_hex).unwrap(), 600);
    assert_eq!(descriptor.digest_for(env.algorithm), Some(digest.as_slice()));
}

#[test]
fn test_create_block_by_copy_is_idempotent() {
    let dir = tempdir().unwrap();
    let env = test_env(dir.path());
    let store = BlockStore::open(&env).unwrap();

    let source = dir.path().join("payload.bin");
    std::fs::write(&source, b"block content").unwrap();
    let (first, _) = store.create_block(&source, true).unwrap();
    assert!(source.exists());
    let (second, _) = store.create_block(&source, true).unwrap();
    assert_eq!(first, second);
    assert_eq!(store.size(&hex::encode(first)).unwrap(), 13);
}

#[test]
fn test_open_stream_chunks() {
    let dir = tempdir().unwrap();
    let mut env = test_env(dir.path());
    env.chunk_size = 4;
    let store = BlockStore::open(&env).unwrap();

    let source = dir.path().join("payload.bin");
    let content: Vec<u8> = (0u8..=25).collect();
    std::fs::write(&source, &content).unwrap();
    let (digest, _) = store.create_block(&source, false).unwrap();

    let mut collected = Vec::new();
    for chunk in store.open_stream(&hex::encode(digest)).unwrap() {
        let chunk = chunk.unwrap();
        assert!(chunk.len() <= 4);
        collected.extend(chunk);
    }
    assert_eq!(collected, content);
}

#[test]
fn test_multiblock_directory_size_and_stream() {
    let dir = tempdir().unwrap();
    let env = test_env(dir.path());
    let store = BlockStore::open(&env).unwrap();

    // Inner flat block.
    let inner = dir.path().join("inner.bin");
    std::fs::write(&inner, b"xyz").unwrap();
    let (inner_digest, _) = store.create_block(&inner, false).unwrap();
    let inner_hex = hex::encode(inner_digest);

    // Outer block in directory form: "AB" <inner> "CD".
    let outer_hex = "00".repeat(32);
    let outer_dir = env.block_dir.join(&outer_hex);
    std::fs::create_dir_all(&outer_dir).unwrap();
    std::fs::write(outer_dir.join("1"), b"AB").unwrap();
    std::fs::write(outer_dir.join("2"), b"CD").unwrap();
    std::fs::write(
        outer_dir.join("_.json"),
        format!("[1,[\"{inner_hex}\",[3]],2]"),
    )
    .unwrap();

    assert!(store.is_multiblock(&outer_hex));
    assert_eq!(store.size(&outer_hex).unwrap(), 7);
    let mut collected = Vec::new();
    for chunk in store.open_stream(&outer_hex).unwrap() {
        collected.extend(chunk.unwrap());
    }
    assert_eq!(collected, b"ABxyzCD");
}

#[test]
fn test_unknown_block_is_reported() {
    let dir = tempdir().unwrap();
    let env = test_env(dir.path());
    let store = BlockStore::open(&env).unwrap();
    let missing = "ff".repeat(32);
    assert!(matches!(store.size(&missing), Err(BeeError::UnknownBlock(_))));
    assert!(matches!(store.open_stream(&missing), Err(BeeError::UnknownBlock(_))));
}

#[test]
fn test_algorithm_change_is_refused() {
    let dir = tempdir().unwrap();
    let env = test_env(dir.path());
    BlockStore::open(&env).unwrap();

    let mut changed = env.clone();
    changed.algorithm = DigestAlgorithm::Sha256;
    assert!(matches!(BlockStore::open(&changed), Err(BeeError::Environment(_))));
    // The recorded algorithm keeps working.
    BlockStore::open(&env).unwrap();
}
