use scxq2_journal::{
    decode, encode, Frame, FramePayload, JournalError, ReadMode, RouteStartPayload,
};

fn route_start(tick: u32, path: &str) -> Frame {
    Frame::new(
        tick,
        FramePayload::RouteStart(RouteStartPayload {
            path: path.into(),
            method: "GET".into(),
            handler: "K040".into(),
        }),
    )
}

fn make_stream() -> Vec<u8> {
    encode(&[
        route_start(0, "/api/ggl/health"),
        route_start(1, "/api/ggl/verify"),
        route_start(2, "/api/ggl/export"),
    ])
    .unwrap()
}

fn lane_offset(bytes: &[u8], lane: usize) -> usize {
    decode(bytes, ReadMode::Strict).unwrap().lanes[lane].offset as usize
}

#[test]
fn test_truncated_stream_strict_fails() {
    let bytes = make_stream();
    let cut = &bytes[..bytes.len() - 12];
    let result = decode(cut, ReadMode::Strict);
    assert!(matches!(result, Err(JournalError::Truncated { .. })));
}

#[test]
fn test_truncated_stream_permissive_keeps_complete_records() {
    let bytes = make_stream();
    // lose the edge lane and part of the last record
    let cut = &bytes[..bytes.len() - 12];
    let decoded = decode(cut, ReadMode::Permissive).unwrap();
    assert!(decoded.truncated);
    assert_eq!(decoded.frames.len(), 2);
    assert_eq!(decoded.frames[1].tick, 1);
}

#[test]
fn test_missing_edge_lane_permissive_is_truncation() {
    let bytes = make_stream();
    let cut = &bytes[..bytes.len() - 5];
    assert!(decode(cut, ReadMode::Strict).is_err());
    let decoded = decode(cut, ReadMode::Permissive).unwrap();
    assert!(decoded.truncated);
    assert_eq!(decoded.frames.len(), 3);
}

#[test]
fn test_bad_magic_rejected() {
    let mut bytes = make_stream();
    bytes[0] = b'X';
    assert!(matches!(
        decode(&bytes, ReadMode::Permissive),
        Err(JournalError::InvalidHeader(_))
    ));
}

#[test]
fn test_short_header_rejected() {
    assert!(matches!(
        decode(b"GGL1", ReadMode::Strict),
        Err(JournalError::InvalidHeader(_))
    ));
}

#[test]
fn test_lane_out_of_order_rejected() {
    let mut bytes = make_stream();
    // first lane id byte follows the 8-byte header
    bytes[8] = 1;
    assert!(matches!(
        decode(&bytes, ReadMode::Strict),
        Err(JournalError::InvalidLane { lane: 1, .. })
    ));
}

#[test]
fn test_non_empty_edge_lane_rejected() {
    let mut bytes = make_stream();
    let len_at = bytes.len() - 4;
    bytes[len_at] = 2;
    bytes.extend_from_slice(&[0xaa, 0xbb]);
    assert!(matches!(
        decode(&bytes, ReadMode::Strict),
        Err(JournalError::EdgeLaneNotEmpty { len: 2 })
    ));
}

#[test]
fn test_trailing_bytes_rejected() {
    let mut bytes = make_stream();
    bytes.push(0);
    assert!(matches!(
        decode(&bytes, ReadMode::Strict),
        Err(JournalError::TrailingBytes { count: 1 })
    ));
}

#[test]
fn test_unknown_record_kind_rejected() {
    let mut bytes = make_stream();
    // skip the one-byte record count to the first record's kind tag
    let at = lane_offset(&bytes, 2) + 1;
    bytes[at..at + 2].copy_from_slice(&42u16.to_le_bytes());
    match decode(&bytes, ReadMode::Strict) {
        Err(JournalError::UnknownKind { tag, .. }) => assert_eq!(tag, 42),
        other => panic!("expected UnknownKind, got {:?}", other),
    }
}

#[test]
fn test_record_kind_without_declared_schema_rejected() {
    let mut bytes = make_stream();
    let at = lane_offset(&bytes, 2) + 1;
    // route.end is a known kind, but this stream's field lane only declares route.start
    bytes[at..at + 2].copy_from_slice(&9u16.to_le_bytes());
    assert!(matches!(
        decode(&bytes, ReadMode::Permissive),
        Err(JournalError::UnknownKind { tag: 9, .. })
    ));
}

#[test]
fn test_field_lane_schema_mismatch_rejected() {
    let mut bytes = make_stream();
    // kinds varint, kind u16, then the field count
    let at = lane_offset(&bytes, 1) + 3;
    bytes[at] += 1;
    assert!(matches!(
        decode(&bytes, ReadMode::Strict),
        Err(JournalError::SchemaMismatch(_))
    ));
}

#[test]
fn test_field_lane_wrong_type_rejected() {
    let mut bytes = make_stream();
    let at = lane_offset(&bytes, 1) + 4;
    bytes[at] = 3;
    assert!(matches!(
        decode(&bytes, ReadMode::Strict),
        Err(JournalError::SchemaMismatch(_))
    ));
}

#[test]
fn test_dictionary_index_out_of_range_rejected() {
    let mut bytes = make_stream();
    // record count, then the 14-byte record prefix, then the path index
    let at = lane_offset(&bytes, 2) + 1 + 14;
    bytes[at..at + 4].copy_from_slice(&u32::MAX.to_le_bytes());
    assert!(matches!(
        decode(&bytes, ReadMode::Strict),
        Err(JournalError::InvalidFrame { .. })
    ));
}

#[test]
fn test_short_record_body_is_corruption_not_truncation() {
    let mut bytes = make_stream();
    // payload_ref of the first record: 12-byte body declared as 4
    let at = lane_offset(&bytes, 2) + 1 + 6;
    bytes[at..at + 4].copy_from_slice(&4u32.to_le_bytes());
    assert!(matches!(
        decode(&bytes, ReadMode::Permissive),
        Err(JournalError::InvalidFrame { .. })
    ));
}
