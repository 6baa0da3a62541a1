use super::*;

#[test]
fn node_id_roundtrips_bytes() {
    let id = NodeID::from_bytes([0x05, 0x01, 0x01, 0x01, 0x03, 0x01]);
    assert_eq!(id.raw(), 0x0501_0101_0301);
    assert_eq!(id.to_bytes(), [0x05, 0x01, 0x01, 0x01, 0x03, 0x01]);
}

#[test]
fn node_id_masks_high_bits() {
    let id = NodeID::new(0xFFFF_0501_0101_0301);
    assert_eq!(id.raw(), 0x0501_0101_0301);
}

#[test]
fn node_id_display_is_dotted_hex() {
    let id = NodeID::new(0x0501_0101_0301);
    assert_eq!(id.to_string(), "05.01.01.01.03.01");
}

#[test]
fn node_id_parses_canonical_form() {
    let id: NodeID = "05.01.01.01.03.01".parse().unwrap();
    assert_eq!(id.raw(), 0x0501_0101_0301);
    // lowercase accepted
    let id: NodeID = "ff.00.aa.bb.cc.dd".parse().unwrap();
    assert_eq!(id.raw(), 0xFF00_AABB_CCDD);
}

#[test]
fn node_id_rejects_bad_text() {
    assert!("05.01.01.01.03".parse::<NodeID>().is_err());
    assert!("05.01.01.01.03.01.02".parse::<NodeID>().is_err());
    assert!("05.01.01.01.03.zz".parse::<NodeID>().is_err());
    assert!("".parse::<NodeID>().is_err());
}

#[test]
fn node_id_zero_is_placeholder() {
    assert!(NodeID::ZERO.is_zero());
    assert!(!NodeID::new(1).is_zero());
}

#[test]
fn node_id_from_slice_requires_six_bytes() {
    assert!(NodeID::from_slice(&[1, 2, 3]).is_err());
    let id = NodeID::from_slice(&[0, 0, 0, 0, 0, 7]).unwrap();
    assert_eq!(id.raw(), 7);
}

#[test]
fn event_id_roundtrips() {
    let ev = EventID::new(0x0501_0101_0301_002C);
    assert_eq!(ev.to_bytes(), [0x05, 0x01, 0x01, 0x01, 0x03, 0x01, 0x00, 0x2C]);
    assert_eq!(EventID::from_bytes(ev.to_bytes()), ev);
    assert_eq!(ev.to_string(), "05.01.01.01.03.01.00.2C");
    let parsed: EventID = "05.01.01.01.03.01.00.2C".parse().unwrap();
    assert_eq!(parsed, ev);
}

#[test]
fn event_id_from_node_places_suffix() {
    let node = NodeID::new(0x0501_0101_0301);
    let ev = EventID::from_node(node, 0x002C);
    assert_eq!(ev.raw(), 0x0501_0101_0301_002C);
}
