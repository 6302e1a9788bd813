use beebuf::BeeError;
use beebuf::wire::varint;

#[test]
fn test_width_transitions() {
    assert_eq!(varint::width(0), 1);
    assert_eq!(varint::width(127), 1);
    assert_eq!(varint::width(128), 2);
    assert_eq!(varint::width(16_383), 2);
    assert_eq!(varint::width(16_384), 3);
    assert_eq!(varint::width(2_097_151), 3);
    assert_eq!(varint::width(2_097_152), 4);
}

#[test]
fn test_encode_decode_boundaries() {
    for n in [0u64, 1, 127, 128, 255, 300, 16_383, 16_384, 2_097_151, 2_097_152, u64::MAX] {
        let encoded = varint::encode(n);
        assert_eq!(encoded.len(), varint::width(n));
        assert_eq!(varint::decode_at(&encoded, 0).unwrap(), n);
    }
}

#[test]
fn test_decode_at_offset() {
    let mut buf = vec![0xFFu8, 0xFF];
    buf.extend(varint::encode(600));
    assert_eq!(varint::decode_at(&buf, 2).unwrap(), 600);
}

#[test]
fn test_truncated_varint_is_malformed() {
    let err = varint::decode_at(&[0x80, 0x80, 0x80], 0).unwrap_err();
    assert!(matches!(err, BeeError::MalformedEncoding(_)));
    let err = varint::decode_at(&[], 0).unwrap_err();
    assert!(matches!(err, BeeError::MalformedEncoding(_)));
}

#[test]
fn test_encoded_width_scan() {
    let buf = varint::encode(2_097_152);
    assert_eq!(varint::encoded_width_at(&buf, 0).unwrap(), 4);
    let err = varint::encoded_width_at(&[0x80], 0).unwrap_err();
    assert!(matches!(err, BeeError::MalformedEncoding(_)));
}
