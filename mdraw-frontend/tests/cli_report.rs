use std::fs;

use mdraw_config::AppConfig;
use mdraw_frontend::cli::render_report;
use mdraw_frontend::loader::load_document;

fn be32(value: i32) -> [u8; 4] {
    value.to_be_bytes()
}

fn record(kind: i16, header: &[u8], entry_size: u16, entries: &[Vec<u8>]) -> Vec<u8> {
    let size = 12 + header.len() + entries.len() * usize::from(entry_size);
    let mut out = (size as u32).to_be_bytes().to_vec();
    out.extend_from_slice(&(entries.len() as u16).to_be_bytes());
    out.extend_from_slice(&kind.to_be_bytes());
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(&entry_size.to_be_bytes());
    out.extend_from_slice(&(header.len() as u16).to_be_bytes());
    out.extend_from_slice(header);
    for entry in entries {
        out.extend_from_slice(entry);
    }
    out
}

fn envelope(records: &[Vec<u8>]) -> Vec<u8> {
    let body = records.concat();
    let mut out = (body.len() as u32).to_be_bytes().to_vec();
    out.extend(body);
    out
}

fn dset(id: i32, kind: u8, extra: &[u8]) -> Vec<u8> {
    let mut out = be32(id).to_vec();
    out.extend_from_slice(&[kind, 0, 0, 0]);
    out.extend_from_slice(extra);
    out
}

/// 36 字节子区域条目；坐标单位为点。
fn child(tag: u8, edges: [i32; 4], data: [i32; 2]) -> Vec<u8> {
    let mut out = vec![tag, 0, 1, 0, 0, 0, 0, 0];
    for edge in edges {
        out.extend_from_slice(&be32(edge * 256));
    }
    out.extend_from_slice(&(-1i16).to_be_bytes());
    out.extend_from_slice(&(-1i16).to_be_bytes());
    out.extend_from_slice(&be32(data[0]));
    out.extend_from_slice(&be32(data[1]));
    out
}

fn group(id: i32, children: &[Vec<u8>]) -> Vec<u8> {
    envelope(&[record(-1, &dset(id, 0, &[]), 36, children)])
}

fn sample() -> Vec<u8> {
    let mut info = Vec::new();
    info.extend_from_slice(&be32(100 * 256));
    info.extend_from_slice(&be32(100 * 256));
    info.extend_from_slice(&1u16.to_be_bytes());
    info.extend_from_slice(&0u16.to_be_bytes());
    [
        envelope(&[record(-1, &dset(0, 4, &info), 0, &[])]),
        group(
            1,
            &[
                child(7, [0, 0, 50, 40], [20, 0]),
                child(7, [0, 0, 10, 10], [2, 0]),
                child(2, [10, 150, 30, 170], [0, 0]),
            ],
        ),
        group(2, &[]),
        group(3, &[child(7, [0, 0, 50, 40], [20, 1])]),
        envelope(&[record(-1, &dset(20, 1, b"body"), 0, &[])]),
    ]
    .concat()
}

#[test]
fn report_lists_counts_links_and_outline() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let path = dir.path().join("sample.cwk");
    fs::write(&path, sample()).expect("写入样例失败");

    let mut loaded = load_document(&path, &AppConfig::default()).expect("加载样例失败");
    assert_eq!(loaded.document.roots(), vec![1, 3]);
    let root = loaded.document.registry().get(1).expect("正文区域");
    assert_eq!(root.children.len(), 2);
    assert_eq!(root.children[1].page, Some(2));

    let report = render_report(&mut loaded);
    assert!(report.contains("区域 5 个，容器 3 个，位图 0 个，文本流 1 个，变换 0 项"));
    assert!(report.contains("页面 100.00x100.00，横向 1 页"));
    assert!(report.contains("帧链 1 条，裁剪引用 1 个"));
    assert!(report.contains("没有解码诊断。"));
    assert!(report.contains("  区域引用 -> #20 帧链 0/0 @第 1 页 (0.00, 0.00)"));
    assert!(report.contains("  矩形 20.00x20.00 @第 2 页 (10.00, 50.00)"));
    assert!(report.contains("区域引用 -> #20 帧链 0/1（末帧）"));
    assert!(!report.contains("容器 #2"));
}
