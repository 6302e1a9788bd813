use beebuf::message::{Descriptor, DynMessage, Reflect, Value, descriptor_len};
use beebuf::{BeeError, DigestAlgorithm};

fn sample_message() -> DynMessage {
    let mut inner = DynMessage::new();
    inner.push_str(1, "nested");
    inner.push_uint(2, 300);
    let mut m = DynMessage::new();
    m.push_str(1, "item1");
    m.push_message(2, inner);
    m.push_bytes(3, vec![9u8, 8, 7]);
    m.push_uint(4, 0);
    m.push_fixed64(5, 0xDEAD_BEEF);
    m.push_fixed32(6, 42);
    m
}

#[test]
fn test_encoded_len_matches_encoding() {
    let m = sample_message();
    assert_eq!(m.encoded_len(), m.encode_to_vec().len());
}

#[test]
fn test_decode_reencodes_identically() {
    let m = sample_message();
    let bytes = m.encode_to_vec();
    let decoded = DynMessage::decode(&bytes).unwrap();
    assert_eq!(decoded.encode_to_vec(), bytes);
    // Schema-blind decoding flattens the sub-message into bytes.
    assert!(matches!(decoded.get(2), Some(Value::Bytes(_))));
}

#[test]
fn test_decode_rejects_truncation() {
    let bytes = sample_message().encode_to_vec();
    let err = DynMessage::decode(&bytes[..bytes.len() - 1]).unwrap_err();
    assert!(matches!(err, BeeError::MalformedEncoding(_)));
}

#[test]
fn test_descriptor_len_is_fixed_at_70() {
    // 32-byte algorithm id + 32-byte digest: 2 + (2 + 32 + 2 + 32).
    assert_eq!(descriptor_len(DigestAlgorithm::Sha3_256), 70);
    assert_eq!(descriptor_len(DigestAlgorithm::Sha256), 70);
    let descriptor = Descriptor::for_digest(DigestAlgorithm::Sha3_256, &[7u8; 32]);
    assert_eq!(descriptor.encode_to_vec().len(), 70);
}

#[test]
fn test_descriptor_round_trip_with_positions() {
    let mut descriptor = Descriptor::for_digest(DigestAlgorithm::Sha3_256, &[1u8; 32]);
    descriptor.previous_lengths_position = vec![1, 300, 70_000];
    let decoded = Descriptor::decode(&descriptor.encode_to_vec()).unwrap();
    assert_eq!(decoded, descriptor);
    assert_eq!(decoded.digest_for(DigestAlgorithm::Sha3_256), Some([1u8; 32].as_slice()));
    assert_eq!(decoded.digest_for(DigestAlgorithm::Sha256), None);
}

#[test]
fn test_descriptor_rejects_foreign_bytes() {
    assert!(Descriptor::decode(b"item1").is_err());
    assert!(Descriptor::decode(&[0xABu8; 40]).is_err());
    // An empty buffer parses but holds no hashes, so it never classifies
    // as a block pointer.
    assert!(Descriptor::decode(b"").unwrap().hashes.is_empty());
}

#[test]
fn test_is_block_requires_allow_listed_digest() {
    use beebuf::builder::is_block;
    use std::collections::HashSet;

    let digest = [5u8; 32];
    let bytes = Descriptor::for_digest(DigestAlgorithm::Sha3_256, &digest).encode_to_vec();
    let mut allow = HashSet::new();
    assert_eq!(is_block(&bytes, &allow, DigestAlgorithm::Sha3_256), None);
    allow.insert(digest.to_vec());
    assert_eq!(is_block(&bytes, &allow, DigestAlgorithm::Sha3_256), Some(hex::encode(digest)));
    // Same bytes under a different active algorithm carry no usable hash.
    assert_eq!(is_block(&bytes, &allow, DigestAlgorithm::Sha256), None);
    assert_eq!(is_block(b"item1", &allow, DigestAlgorithm::Sha3_256), None);
}
