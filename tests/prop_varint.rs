use proptest::prelude::*;

proptest! {
    #![proptest_config(proptest::test_runner::Config {
        failure_persistence: Some(Box::new(proptest::test_runner::FileFailurePersistence::WithSource("proptest-regressions"))),
        cases: 256,
        .. proptest::test_runner::Config::default()
    })]
    #[test]
    fn prop_varint_round_trip(n in any::<u64>()) {
        use beebuf::wire::varint;
        let encoded = varint::encode(n);
        prop_assert_eq!(encoded.len(), varint::width(n));
        prop_assert_eq!(varint::decode_at(&encoded, 0).unwrap(), n);
        prop_assert_eq!(varint::encoded_width_at(&encoded, 0).unwrap(), encoded.len());
    }

    #[test]
    fn prop_tag_round_trip(number in 1u32..=536_870_911, wt in 0u8..4) {
        use beebuf::wire::tag::{self, WireType};
        let wire_type = match wt {
            0 => WireType::Varint,
            1 => WireType::Fixed64,
            2 => WireType::LengthDelimited,
            _ => WireType::Fixed32,
        };
        let packed = tag::pack(number, wire_type);
        prop_assert_eq!(tag::unpack(packed).unwrap(), (number, wire_type));
    }

    #[test]
    fn prop_decode_ignores_prefix(prefix in proptest::collection::vec(any::<u8>(), 0..16), n in any::<u64>()) {
        use beebuf::wire::varint;
        let mut buf = prefix.clone();
        buf.extend(varint::encode(n));
        prop_assert_eq!(varint::decode_at(&buf, prefix.len()).unwrap(), n);
    }
}
