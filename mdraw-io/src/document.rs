//! 顶层区域循环。
//!
//! 每个区域外层是一个 `u32` 长度的包络，内含 DSET 容器记录与若干附属记录。
//! 单个区域解码失败只记录诊断，循环总是从包络末尾继续。

use std::collections::BTreeMap;

use mdraw_core::geometry::Vector2;
use mdraw_core::registry::ZoneRegistry;
use mdraw_core::style::StyleTables;
use mdraw_core::zone::{Bitmap, ByteRange, Transform, TransformTable, ZoneKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::group::GroupDecoder;
use crate::reader::Reader;
use crate::record::{RecordError, StructHeader, read_struct};
use crate::{Diagnostic, DiagnosticKind};

pub mod zone_kind {
    pub const GROUP: u8 = 0;
    pub const TEXT: u8 = 1;
    pub const BITMAP: u8 = 2;
    pub const TRANSFORMS: u8 = 3;
    pub const DOCUMENT_INFO: u8 = 4;
}

/// DSET 头部：`i32 id`、`u8 kind`、`u8 flags`、`u16` 保留。
pub const DSET_HEADER_SIZE: u16 = 8;
const BITMAP_HEADER_SIZE: u16 = DSET_HEADER_SIZE + 6;
const DOCUMENT_INFO_HEADER_SIZE: u16 = DSET_HEADER_SIZE + 12;
const TRANSFORM_ENTRY_SIZE: u16 = 20;
const LIBRARY_FLAG: u16 = 0x1;

/// 文档信息区域中的页面设置。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub page_width: f64,
    pub page_height: f64,
    pub horizontal_pages: u16,
    pub library_mode: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// 单个容器内可容忍的附属记录损坏次数。
    pub max_recoverable_errors: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_recoverable_errors: 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DecodedDocument {
    pub registry: ZoneRegistry,
    pub transforms: TransformTable,
    pub info: Option<DocumentInfo>,
    /// 文本流区域的原始数据区间，内容不在本层解析。
    pub text_flows: BTreeMap<i32, ByteRange>,
    pub diagnostics: Vec<Diagnostic>,
    /// 处理过的非占位包络数量（包括解码失败的）。
    pub zones_read: usize,
}

impl DecodedDocument {
    pub fn diagnostic_count(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics.iter().filter(|d| d.kind == kind).count()
    }
}

pub struct DocumentDecoder<'a, 't> {
    data: &'a [u8],
    tables: &'t dyn StyleTables,
    options: DecodeOptions,
    document: DecodedDocument,
    transforms_seen: bool,
}

impl<'a, 't> DocumentDecoder<'a, 't> {
    pub fn new(data: &'a [u8], tables: &'t dyn StyleTables, options: DecodeOptions) -> Self {
        Self {
            data,
            tables,
            options,
            document: DecodedDocument::default(),
            transforms_seen: false,
        }
    }

    pub fn decode(mut self) -> DecodedDocument {
        let mut reader = Reader::new(self.data);
        while !reader.at_end() {
            let start = reader.tell();
            let Some(size) = reader.read_u32() else {
                warn!(offset = start, "输入末尾残留不足一个长度字段");
                self.push(start, None, DiagnosticKind::Truncated);
                break;
            };
            let end = (start + 4)
                .checked_add(size as usize)
                .filter(|&end| reader.check_position(end));
            let Some(end) = end else {
                warn!(offset = start, size, "区域包络越出输入末尾");
                self.push(start, None, DiagnosticKind::Truncated);
                break;
            };
            if size > 0 {
                self.document.zones_read += 1;
                let mut zone = reader.bounded(end);
                self.decode_zone(&mut zone);
            }
            reader.seek(end);
        }
        info!(
            zones = self.document.zones_read,
            groups = self.document.registry.group_count(),
            diagnostics = self.document.diagnostics.len(),
            "文档解码完成"
        );
        self.document
    }

    fn push(&mut self, offset: usize, zone_id: Option<i32>, kind: DiagnosticKind) {
        self.document
            .diagnostics
            .push(Diagnostic::new(offset, zone_id, kind));
    }

    fn push_record_error(&mut self, err: &RecordError, zone_id: Option<i32>) {
        let kind = match err {
            RecordError::Truncated { .. } => DiagnosticKind::Truncated,
            RecordError::SizeMismatch { .. } => DiagnosticKind::SizeMismatch,
        };
        warn!(?zone_id, %err, "记录解析失败");
        self.push(err.offset(), zone_id, kind);
    }

    fn decode_zone(&mut self, reader: &mut Reader<'_>) {
        let header = match read_struct(reader) {
            Ok(header) => header,
            Err(err) => {
                self.push_record_error(&err, None);
                return;
            }
        };
        if !header.is_container() {
            warn!(offset = header.start, kind = header.kind, "顶层记录不是容器结构");
            self.push(header.start, None, DiagnosticKind::NotAContainer);
            return;
        }
        if header.header_size < DSET_HEADER_SIZE {
            self.push(header.start, None, DiagnosticKind::SizeMismatch);
            return;
        }

        reader.seek(header.header_start());
        let (Some(id), Some(kind)) = (reader.read_i32(), reader.read_u8()) else {
            self.push(header.start, None, DiagnosticKind::Truncated);
            return;
        };
        debug!(zone_id = id, kind, offset = header.start, "读取区域");

        match kind {
            zone_kind::GROUP => {
                let decoder = GroupDecoder::new(self.tables, self.options.max_recoverable_errors);
                if let Some(group) =
                    decoder.decode(reader, &header, id, &mut self.document.diagnostics)
                {
                    if !self.document.registry.register_group(id, group) {
                        self.push(header.start, Some(id), DiagnosticKind::DuplicateZone);
                    }
                }
            }
            zone_kind::TEXT => {
                if self.document.registry.register_zone(id, ZoneKind::TextFlow) {
                    self.document
                        .text_flows
                        .insert(id, ByteRange::new(payload_start(&header), header.end()));
                } else {
                    self.push(header.start, Some(id), DiagnosticKind::DuplicateZone);
                }
            }
            zone_kind::BITMAP => self.decode_bitmap(reader, &header, id),
            zone_kind::TRANSFORMS => self.decode_transforms(reader, &header, id),
            zone_kind::DOCUMENT_INFO => self.decode_info(reader, &header, id),
            other => {
                warn!(zone_id = id, kind = other, "未知的区域类别");
                self.push(header.start, Some(id), DiagnosticKind::UnknownZoneKind(other));
                if !self.document.registry.register_zone(id, ZoneKind::Unknown) {
                    self.push(header.start, Some(id), DiagnosticKind::DuplicateZone);
                }
            }
        }
    }

    fn decode_bitmap(&mut self, reader: &mut Reader<'_>, header: &StructHeader, id: i32) {
        if header.header_size < BITMAP_HEADER_SIZE {
            self.push(header.start, Some(id), DiagnosticKind::SizeMismatch);
            return;
        }
        reader.seek(payload_start(header));
        let (Some(width), Some(height), Some(bits_per_pixel)) =
            (reader.read_u16(), reader.read_u16(), reader.read_u16())
        else {
            self.push(header.start, Some(id), DiagnosticKind::Truncated);
            return;
        };

        reader.seek(header.end());
        if reader.at_end() {
            warn!(zone_id = id, "位图缺少像素数据记录");
            self.push(reader.tell(), Some(id), DiagnosticKind::Truncated);
            return;
        }
        let data = match read_struct(reader) {
            Ok(record) => Some(record.data_range()),
            Err(err @ RecordError::SizeMismatch { .. })
                if self.options.max_recoverable_errors > 0 =>
            {
                self.push_record_error(&err, Some(id));
                None
            }
            Err(err) => {
                self.push_record_error(&err, Some(id));
                return;
            }
        };
        let bitmap = Bitmap {
            id,
            width,
            height,
            bits_per_pixel,
            data,
        };
        if !self.document.registry.register_bitmap(bitmap) {
            self.push(header.start, Some(id), DiagnosticKind::DuplicateZone);
        }
    }

    fn decode_transforms(&mut self, reader: &mut Reader<'_>, header: &StructHeader, id: i32) {
        if self.transforms_seen {
            warn!(zone_id = id, "文档中出现第二个变换表，忽略");
            self.push(header.start, Some(id), DiagnosticKind::DuplicateTransformTable);
            return;
        }
        self.transforms_seen = true;
        if header.num_entries > 0 && header.entry_size < TRANSFORM_ENTRY_SIZE {
            self.push(header.start, Some(id), DiagnosticKind::SizeMismatch);
            return;
        }

        let mut table = TransformTable::new();
        for index in 0..usize::from(header.num_entries) {
            reader.seek(header.entry_offset(index));
            let entry = (|| {
                Some(Transform {
                    rotation_degrees: reader.read_angle()?,
                    original_size: Vector2::new(reader.read_fixed()?, reader.read_fixed()?),
                    extra_values: [reader.read_fixed16()?, reader.read_fixed16()?],
                })
            })();
            let Some(transform) = entry else {
                self.push(header.entry_offset(index), Some(id), DiagnosticKind::Truncated);
                break;
            };
            table.push(transform);
        }
        debug!(zone_id = id, entries = table.len(), "读取变换表");
        self.document.transforms = table;
    }

    fn decode_info(&mut self, reader: &mut Reader<'_>, header: &StructHeader, id: i32) {
        if self.document.info.is_some() {
            self.push(header.start, Some(id), DiagnosticKind::DuplicateZone);
            return;
        }
        if header.header_size < DOCUMENT_INFO_HEADER_SIZE {
            self.push(header.start, Some(id), DiagnosticKind::SizeMismatch);
            return;
        }
        reader.seek(payload_start(header));
        let fields = (
            reader.read_fixed(),
            reader.read_fixed(),
            reader.read_u16(),
            reader.read_u16(),
        );
        let (Some(page_width), Some(page_height), Some(horizontal_pages), Some(flags)) = fields
        else {
            self.push(header.start, Some(id), DiagnosticKind::Truncated);
            return;
        };
        self.document.info = Some(DocumentInfo {
            page_width,
            page_height,
            horizontal_pages,
            library_mode: flags & LIBRARY_FLAG != 0,
        });
    }
}

/// DSET 公共字段之后的第一个字节。
fn payload_start(header: &StructHeader) -> usize {
    header.header_start() + usize::from(DSET_HEADER_SIZE)
}

/// 解码整个输入。
pub fn decode_document(
    data: &[u8],
    tables: &dyn StyleTables,
    options: DecodeOptions,
) -> DecodedDocument {
    DocumentDecoder::new(data, tables, options).decode()
}
