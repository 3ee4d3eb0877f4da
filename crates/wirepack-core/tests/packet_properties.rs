use std::sync::Arc;

use wirepack_core::{ByteOrder, FieldSpec, Layout, Packet, PacketError, Payload, Value};

fn mixed_layout(order: ByteOrder) -> Arc<Layout> {
    Arc::new(
        Layout::derive(
            "Mixed",
            order,
            vec![
                FieldSpec::new("flag", "?", false),
                FieldSpec::new("code", "c", *b"A"),
                FieldSpec::new("small", "b", -3i8),
                FieldSpec::new("word", "H", 0x1234u16),
                FieldSpec::new("pad", "3x", Value::tuple(Vec::<Value>::new())),
                FieldSpec::new("long", "q", -1i64),
                FieldSpec::new("pair", "2I", (7u32, 8u32)),
                FieldSpec::new("ratio", "d", 0.25f64),
                FieldSpec::new("name", "5p", "abc"),
                FieldSpec::new("raw", "4s", *b"\x01\x02\x03\x04"),
            ],
        )
        .unwrap(),
    )
}

fn sample_buffers() -> Vec<Vec<u8>> {
    let layout = mixed_layout(ByteOrder::Big);
    let header_len = layout.header_len();
    (0u8..16)
        .map(|seed| {
            let mut buf: Vec<u8> = (0..header_len as u8 + seed)
                .map(|i| i.wrapping_mul(31).wrapping_add(seed))
                .collect();
            // Boolean byte normalised and pascal length kept within capacity.
            buf[0] = seed % 2;
            let name = layout.field("name").unwrap().offset();
            buf[name] = seed % 5;
            buf
        })
        .collect()
}

#[test]
fn header_length_is_the_sum_of_field_sizes() {
    let layout = mixed_layout(ByteOrder::Little);
    let sizes: usize = layout.fields().iter().map(|field| field.size()).sum();
    assert_eq!(layout.header_len(), sizes);
    assert_eq!(layout.header_len(), 1 + 1 + 1 + 2 + 3 + 8 + 8 + 8 + 5 + 4);
    assert_eq!(layout.format(), "<?cbH3xq2Id5p4s");
}

#[test]
fn decoded_headers_repack_to_equal_packets() {
    let layout = mixed_layout(ByteOrder::Big);
    let header_len = layout.header_len();
    for buf in sample_buffers() {
        let packet = Packet::from_bytes(&layout, &buf).unwrap();
        let packed = packet.pack().unwrap();
        // Pad bytes and unused pascal capacity pack as zeros.
        let reference = Packet::from_bytes(&layout, &packed).unwrap();
        assert_eq!(reference, packet);
        assert_eq!(packed.len(), buf.len());
        assert_eq!(&packed[header_len..], &buf[header_len..]);
        assert_eq!(packet.pack_header().unwrap().len(), header_len);
    }
}

#[test]
fn round_trip_is_exact_for_canonical_headers() {
    for order in [ByteOrder::Big, ByteOrder::Little, ByteOrder::Network] {
        let layout = mixed_layout(order);
        let canonical = Packet::new(&layout).with_payload(&b"tail"[..]).pack().unwrap();
        let decoded = Packet::from_bytes(&layout, &canonical).unwrap();
        assert_eq!(decoded.pack().unwrap(), canonical);
        assert_eq!(decoded["name"], Value::Bytes(b"abc".to_vec()));
        assert_eq!(decoded["pair"], Value::tuple([7u32, 8]));
    }
}

#[test]
fn integer_values_in_float_fields_round_trip() {
    let layout = Arc::new(
        Layout::derive(
            "F",
            ByteOrder::Big,
            vec![FieldSpec::new("ratio", "d", 0u8), FieldSpec::new("scale", "f", 2i32)],
        )
        .unwrap(),
    );
    let packet = Packet::new(&layout);
    let decoded = Packet::from_bytes(&layout, &packet.pack().unwrap()).unwrap();
    assert_eq!(decoded["ratio"], Value::Float(0.0));
    assert_eq!(decoded, packet);
    assert_eq!(format!("{decoded:?}"), "F()");

    let changed = Packet::with_fields(&layout, [("ratio", Value::Int(-7))]).unwrap();
    let decoded = Packet::from_bytes(&layout, &changed.pack().unwrap()).unwrap();
    assert_eq!(decoded, changed);
    assert_eq!(format!("{decoded:?}"), "F(ratio=-7.0)");
}

#[test]
fn packing_is_deterministic() {
    let layout = mixed_layout(ByteOrder::Big);
    let packet = Packet::with_fields(&layout, [("word", Value::UInt(9)), ("flag", Value::Bool(true))])
        .unwrap()
        .with_payload("text");
    let first = packet.pack().unwrap();
    for _ in 0..4 {
        assert_eq!(packet.pack().unwrap(), first);
    }
    assert_eq!(packet.clone().pack().unwrap(), first);
}

#[test]
fn every_instance_has_the_same_header_length() {
    let layout = mixed_layout(ByteOrder::Big);
    let defaults = Packet::new(&layout);
    let changed = Packet::with_fields(&layout, [("long", Value::Int(i64::MIN)), ("name", Value::from(""))])
        .unwrap();
    assert_eq!(
        defaults.pack_header().unwrap().len(),
        changed.pack_header().unwrap().len()
    );
}

#[test]
fn need_data_boundary_is_header_length() {
    let layout = mixed_layout(ByteOrder::Big);
    let full = Packet::new(&layout).pack().unwrap();
    for len in 0..layout.header_len() {
        let err = Packet::from_bytes(&layout, &full[..len]).unwrap_err();
        assert!(err.is_need_data(), "length {len}");
        assert!(err.is_unpack());
    }
    let packet = Packet::from_bytes(&layout, &full).unwrap();
    assert_eq!(packet.payload(), &Payload::default());
}

#[test]
fn defaults_are_isolated_between_instances() {
    let layout = mixed_layout(ByteOrder::Big);
    let mut first = Packet::new(&layout);
    first.set("raw", *b"zzzz").unwrap();
    if let Some(Value::Tuple(items)) = first.get_mut("pair") {
        items.push(Value::UInt(9));
    }
    let second = Packet::new(&layout);
    assert_eq!(second["raw"], Value::Bytes(vec![1, 2, 3, 4]));
    assert_eq!(second["pair"], Value::tuple([7u32, 8]));
    assert_eq!(format!("{second:?}"), "Mixed()");
}

#[test]
fn tuple_flattening_covers_multi_element_fields() {
    let layout = Arc::new(
        Layout::derive(
            "Flat",
            ByteOrder::Big,
            vec![
                FieldSpec::new("a", "B", 1u8),
                FieldSpec::new("b", "2B", (2u8, 3u8)),
                FieldSpec::new("c", "H", 4u16),
            ],
        )
        .unwrap(),
    );
    let packet = Packet::new(&layout);
    assert_eq!(packet.pack().unwrap(), vec![1, 2, 3, 0, 4]);

    let mut wrong = Packet::new(&layout);
    wrong.set("b", 5u8).unwrap();
    assert!(matches!(wrong.pack().unwrap_err(), PacketError::Pack { .. }));
}

#[test]
fn two_field_header_example() {
    let layout = Arc::new(
        Layout::derive("T", ByteOrder::Big, [("a", "H", 0u16), ("b", "B", 0xffu16)]).unwrap(),
    );
    assert_eq!(Packet::new(&layout).pack().unwrap(), vec![0x00, 0x00, 0xff]);

    let packet = Packet::from_bytes(&layout, b"\x00\x05\x2apayload").unwrap();
    assert_eq!(packet["a"], Value::UInt(5));
    assert_eq!(packet["b"], Value::UInt(0x2a));
    assert_eq!(packet.payload().as_bytes(), Some(&b"payload"[..]));
    assert_eq!(packet.len(), 10);
}

#[test]
fn malformed_tables_are_rejected() {
    for code in ["H@", "4", "e", "3 H", "!B"] {
        let err = Layout::derive("Bad", ByteOrder::Big, [("a", code, 0u8)]).unwrap_err();
        assert!(matches!(err, PacketError::Layout { .. }), "code {code}");
    }
}
