//! 测试用的二进制文档构造器。
#![allow(dead_code)]

pub const GROUP: u8 = 0;
pub const TEXT: u8 = 1;
pub const BITMAP: u8 = 2;
pub const TRANSFORMS: u8 = 3;
pub const DOCUMENT_INFO: u8 = 4;

pub fn fixed(value: f64) -> i32 {
    (value * 256.0).round() as i32
}

pub fn fixed16(value: f64) -> i32 {
    (value * 65536.0).round() as i32
}

/// 按给定字段写出结构记录，`declared` 为 `None` 时自动计算正确长度。
pub fn raw_record(
    declared: Option<u32>,
    kind: i16,
    header: &[u8],
    entry_size: u16,
    entries: &[Vec<u8>],
) -> Vec<u8> {
    let body_len = 12 + header.len() + entries.len() * usize::from(entry_size);
    let mut out = Vec::new();
    out.extend_from_slice(&declared.unwrap_or(body_len as u32).to_be_bytes());
    out.extend_from_slice(&(entries.len() as u16).to_be_bytes());
    out.extend_from_slice(&kind.to_be_bytes());
    out.extend_from_slice(&0u32.to_be_bytes());
    out.extend_from_slice(&entry_size.to_be_bytes());
    out.extend_from_slice(&(header.len() as u16).to_be_bytes());
    out.extend_from_slice(header);
    for entry in entries {
        let mut padded = entry.clone();
        padded.resize(usize::from(entry_size), 0);
        out.extend_from_slice(&padded);
    }
    if let Some(declared) = declared {
        out.resize(4 + declared as usize, 0);
    }
    out
}

pub fn record(kind: i16, header: &[u8], entry_size: u16, entries: &[Vec<u8>]) -> Vec<u8> {
    raw_record(None, kind, header, entry_size, entries)
}

/// 声明长度比字段推算值多 `extra` 字节的损坏记录。
pub fn mismatched_record(entry_size: u16, entries: &[Vec<u8>], extra: u32) -> Vec<u8> {
    let correct = 12 + (entries.len() * usize::from(entry_size)) as u32;
    raw_record(Some(correct + extra), 0, &[], entry_size, entries)
}

pub fn dset_header(id: i32, kind: u8) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&id.to_be_bytes());
    out.push(kind);
    out.push(0);
    out.extend_from_slice(&0u16.to_be_bytes());
    out
}

/// 用 `u32` 长度包住区域内的全部记录。
pub fn envelope(parts: &[Vec<u8>]) -> Vec<u8> {
    let body: Vec<u8> = parts.concat();
    let mut out = (body.len() as u32).to_be_bytes().to_vec();
    out.extend(body);
    out
}

#[derive(Debug, Clone)]
pub struct Child {
    pub tag: u8,
    pub flags: u8,
    pub styles: [u8; 6],
    pub edges: [f64; 4],
    pub ordering: i16,
    pub transform: i16,
    pub data: [i32; 2],
}

impl Child {
    pub fn new(tag: u8, left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            tag,
            flags: 0,
            styles: [1, 0, 0, 0, 0, 0],
            edges: [left, top, right, bottom],
            ordering: -1,
            transform: -1,
            data: [0, 0],
        }
    }

    pub fn zone_ref(target: i32, sub_id: i32, top: f64, bottom: f64) -> Self {
        Self::new(7, 0.0, top, 100.0, bottom).data(target, sub_id)
    }

    pub fn data(mut self, data0: i32, data1: i32) -> Self {
        self.data = [data0, data1];
        self
    }

    pub fn ordering(mut self, ordering: i16) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn styles(mut self, styles: [u8; 6]) -> Self {
        self.styles = styles;
        self
    }

    pub fn flags(mut self, flags: u8) -> Self {
        self.flags = flags;
        self
    }

    pub fn transform(mut self, transform: i16) -> Self {
        self.transform = transform;
        self
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![self.tag, self.flags];
        out.extend_from_slice(&self.styles);
        for edge in self.edges {
            out.extend_from_slice(&fixed(edge).to_be_bytes());
        }
        out.extend_from_slice(&self.ordering.to_be_bytes());
        out.extend_from_slice(&self.transform.to_be_bytes());
        out.extend_from_slice(&self.data[0].to_be_bytes());
        out.extend_from_slice(&self.data[1].to_be_bytes());
        out
    }
}

pub fn group_zone(id: i32, children: &[Child], aux: &[Vec<u8>]) -> Vec<u8> {
    let entries: Vec<Vec<u8>> = children.iter().map(Child::encode).collect();
    let mut parts = vec![record(-1, &dset_header(id, GROUP), 36, &entries)];
    parts.extend(aux.iter().cloned());
    envelope(&parts)
}

pub fn vertices(points: &[(f64, f64)]) -> Vec<u8> {
    let entries: Vec<Vec<u8>> = points
        .iter()
        .map(|&(x, y)| [fixed(x).to_be_bytes(), fixed(y).to_be_bytes()].concat())
        .collect();
    record(0, &[], 8, &entries)
}

pub fn spline_vertices(points: &[[(f64, f64); 3]]) -> Vec<u8> {
    let entries: Vec<Vec<u8>> = points
        .iter()
        .map(|triple| {
            triple
                .iter()
                .flat_map(|&(x, y)| [fixed(x).to_be_bytes(), fixed(y).to_be_bytes()].concat())
                .collect()
        })
        .collect();
    record(0, &[], 24, &entries)
}

pub fn blob(bytes: &[u8]) -> Vec<u8> {
    record(0, bytes, 0, &[])
}

pub fn text_zone(id: i32, text: &str) -> Vec<u8> {
    let mut header = dset_header(id, TEXT);
    header.extend_from_slice(text.as_bytes());
    envelope(&[record(-1, &header, 0, &[])])
}

pub fn bitmap_zone(id: i32, width: u16, height: u16, bpp: u16, pixels: &[u8]) -> Vec<u8> {
    let mut header = dset_header(id, BITMAP);
    header.extend_from_slice(&width.to_be_bytes());
    header.extend_from_slice(&height.to_be_bytes());
    header.extend_from_slice(&bpp.to_be_bytes());
    envelope(&[record(-1, &header, 0, &[]), blob(pixels)])
}

/// `(旋转弧度, 宽, 高, 附加值0, 附加值1)`。
pub fn transforms_zone(id: i32, entries: &[(f64, f64, f64, f64, f64)]) -> Vec<u8> {
    let entries: Vec<Vec<u8>> = entries
        .iter()
        .map(|&(rotation, w, h, e0, e1)| {
            [
                fixed16(rotation).to_be_bytes(),
                fixed(w).to_be_bytes(),
                fixed(h).to_be_bytes(),
                fixed16(e0).to_be_bytes(),
                fixed16(e1).to_be_bytes(),
            ]
            .concat()
        })
        .collect();
    envelope(&[record(-1, &dset_header(id, TRANSFORMS), 20, &entries)])
}

pub fn info_zone(id: i32, width: f64, height: f64, horizontal_pages: u16, flags: u16) -> Vec<u8> {
    let mut header = dset_header(id, DOCUMENT_INFO);
    header.extend_from_slice(&fixed(width).to_be_bytes());
    header.extend_from_slice(&fixed(height).to_be_bytes());
    header.extend_from_slice(&horizontal_pages.to_be_bytes());
    header.extend_from_slice(&flags.to_be_bytes());
    envelope(&[record(-1, &header, 0, &[])])
}

pub fn document(zones: &[Vec<u8>]) -> Vec<u8> {
    zones.concat()
}
