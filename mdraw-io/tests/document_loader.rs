mod fixture;

use std::f64::consts::PI;
use std::fs;

use fixture::*;
use mdraw_core::style::StandardTables;
use mdraw_core::zone::ZoneKind;
use mdraw_io::{
    DecodeOptions, DecodedDocument, DiagnosticKind, DocumentLoader, DrawFacade, IoError,
    decode_document,
};
use serde_json::{Value, json};

fn decode(data: &[u8]) -> DecodedDocument {
    decode_document(data, &StandardTables, DecodeOptions::default())
}

fn summary(doc: &DecodedDocument) -> Value {
    let groups: Vec<Value> = doc
        .registry
        .groups()
        .map(|group| {
            json!({
                "id": group.id,
                "children": group.children.iter().map(|c| c.kind_label()).collect::<Vec<_>>(),
                "main_ref": group.has_main_zone_ref,
            })
        })
        .collect();
    let bitmaps: Vec<Value> = doc
        .registry
        .bitmaps()
        .map(|b| json!([b.id, b.width, b.height, b.bits_per_pixel]))
        .collect();
    let diagnostics: Vec<Value> = doc
        .diagnostics
        .iter()
        .map(|d| serde_json::to_value(d.kind).unwrap_or(Value::Null))
        .collect();
    json!({
        "groups": groups,
        "bitmaps": bitmaps,
        "text_flows": doc.text_flows.keys().collect::<Vec<_>>(),
        "transforms": doc.transforms.len(),
        "info": doc.info,
        "diagnostics": diagnostics,
    })
}

fn sample_document() -> Vec<u8> {
    document(&[
        info_zone(0, 612.0, 792.0, 2, 0x1),
        transforms_zone(0, &[(PI, 40.0, 20.0, 0.5, 0.25)]),
        group_zone(
            1,
            &[
                Child::zone_ref(2, 0, 0.0, 100.0),
                Child::new(9, 0.0, 0.0, 8.0, 8.0).data(30, 0),
            ],
            &[],
        ),
        group_zone(2, &[Child::new(1, 0.0, 0.0, 5.0, 5.0)], &[]),
        text_zone(20, "hello"),
        bitmap_zone(30, 4, 2, 1, &[0xf0, 0x0f]),
    ])
}

#[test]
fn sample_document_matches_expected_summary() {
    let doc = decode(&sample_document());
    assert_eq!(
        summary(&doc),
        json!({
            "groups": [
                { "id": 1, "children": ["zone-ref", "bitmap-ref"], "main_ref": false },
                { "id": 2, "children": ["line"], "main_ref": false },
            ],
            "bitmaps": [[30, 4, 2, 1]],
            "text_flows": [20],
            "transforms": 1,
            "info": {
                "page_width": 612.0,
                "page_height": 792.0,
                "horizontal_pages": 2,
                "library_mode": true,
            },
            "diagnostics": [],
        })
    );
    assert_eq!(doc.registry.kind_of(20), Some(ZoneKind::TextFlow));
    assert_eq!(doc.registry.kind_of(30), Some(ZoneKind::Bitmap));
}

#[test]
fn transform_entries_are_converted() {
    let doc = decode(&sample_document());
    let transform = doc.transforms.get(0).expect("变换表第一项");
    assert!((transform.rotation_degrees - 180.0).abs() < 1e-3);
    assert!((transform.original_size.x() - 40.0).abs() < 1e-9);
    assert!((transform.original_size.y() - 20.0).abs() < 1e-9);
    assert!((transform.extra_values[0] - 0.5).abs() < 1e-9);
    assert!((transform.extra_values[1] - 0.25).abs() < 1e-9);
}

#[test]
fn bitmap_payload_range_points_into_input() {
    let data = sample_document();
    let doc = decode(&data);
    let bitmap = doc.registry.bitmap(30).expect("位图已登记");
    let range = bitmap.data.expect("像素数据区间");
    assert_eq!(&data[range.start..range.end], &[0xf0, 0x0f]);
}

#[test]
fn second_transform_table_is_reported_and_ignored() {
    let data = document(&[
        transforms_zone(0, &[(0.0, 1.0, 1.0, 0.0, 0.0)]),
        transforms_zone(0, &[(0.0, 2.0, 2.0, 0.0, 0.0), (0.0, 3.0, 3.0, 0.0, 0.0)]),
    ]);
    let doc = decode(&data);
    assert_eq!(doc.transforms.len(), 1);
    assert_eq!(
        doc.diagnostic_count(DiagnosticKind::DuplicateTransformTable),
        1
    );
}

#[test]
fn duplicate_zone_keeps_first_registration() {
    let data = document(&[
        group_zone(4, &[Child::new(2, 0.0, 0.0, 1.0, 1.0)], &[]),
        group_zone(
            4,
            &[
                Child::new(2, 0.0, 0.0, 1.0, 1.0),
                Child::new(4, 0.0, 0.0, 1.0, 1.0),
            ],
            &[],
        ),
        text_zone(4, "late"),
    ]);
    let doc = decode(&data);
    assert_eq!(doc.registry.get(4).map(|g| g.children.len()), Some(1));
    assert_eq!(doc.diagnostic_count(DiagnosticKind::DuplicateZone), 2);
    assert!(doc.text_flows.is_empty());
}

#[test]
fn unknown_kind_and_non_container_are_reported() {
    let mut odd = dset_header(12, 9);
    odd.extend_from_slice(&[0; 4]);
    let data = document(&[
        envelope(&[record(-1, &odd, 0, &[])]),
        envelope(&[record(5, &dset_header(13, GROUP), 0, &[])]),
        group_zone(14, &[Child::new(2, 0.0, 0.0, 1.0, 1.0)], &[]),
    ]);
    let doc = decode(&data);
    assert_eq!(doc.registry.kind_of(12), Some(ZoneKind::Unknown));
    assert!(!doc.registry.contains(13));
    assert_eq!(doc.diagnostic_count(DiagnosticKind::UnknownZoneKind(9)), 1);
    assert_eq!(doc.diagnostic_count(DiagnosticKind::NotAContainer), 1);
    assert!(doc.registry.get(14).is_some());
}

#[test]
fn placeholder_envelopes_are_skipped() {
    let data = document(&[
        vec![0, 0, 0, 0],
        group_zone(2, &[Child::new(2, 0.0, 0.0, 1.0, 1.0)], &[]),
        vec![0, 0, 0, 0],
    ]);
    let doc = decode(&data);
    assert_eq!(doc.zones_read, 1);
    assert!(doc.diagnostics.is_empty());
}

#[test]
fn envelope_past_end_stops_loop_but_keeps_earlier_zones() {
    let mut data = document(&[group_zone(2, &[Child::new(2, 0.0, 0.0, 1.0, 1.0)], &[])]);
    let mut tail = group_zone(3, &[Child::new(2, 0.0, 0.0, 1.0, 1.0)], &[]);
    tail.truncate(tail.len() - 6);
    data.extend(tail);
    let doc = decode(&data);
    assert!(doc.registry.get(2).is_some());
    assert!(!doc.registry.contains(3));
    assert_eq!(doc.diagnostic_count(DiagnosticKind::Truncated), 1);
}

#[test]
fn damaged_dset_record_inside_envelope_is_skipped() {
    let broken = raw_record(Some(30), -1, &dset_header(2, GROUP), 36, &[]);
    let data = document(&[
        envelope(&[broken]),
        group_zone(3, &[Child::new(2, 0.0, 0.0, 1.0, 1.0)], &[]),
    ]);
    let doc = decode(&data);
    assert!(!doc.registry.contains(2));
    assert_eq!(doc.diagnostic_count(DiagnosticKind::SizeMismatch), 1);
    assert!(doc.registry.get(3).is_some());
}

#[test]
fn facade_loads_document_from_disk() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let path = dir.path().join("sample.cwk");
    fs::write(&path, sample_document()).expect("写入样例失败");

    let loaded = DrawFacade::new().load(&path).expect("读取文档失败");
    assert_eq!(loaded.document.registry.group_count(), 2);
    let range = loaded
        .document
        .text_flows
        .get(&20)
        .copied()
        .expect("文本流区间");
    assert_eq!(loaded.bytes(range), Some(&b"hello"[..]));
}

#[test]
fn facade_rejects_empty_and_missing_files() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let empty = dir.path().join("empty.cwk");
    fs::write(&empty, b"").expect("写入空文件失败");

    let loader = DrawFacade::new();
    assert!(matches!(
        loader.load(&empty),
        Err(IoError::InvalidDocument(_))
    ));
    assert!(matches!(
        loader.load(&dir.path().join("missing.cwk")),
        Err(IoError::ReadError { .. })
    ));
}
