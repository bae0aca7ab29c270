//! 容器区域的子区域表解码。
//!
//! 分两个阶段：先按固定长度条目读出全部子区域，再依次读取它们需要的附属记录
//! （多边形顶点、图片与连接线数据）。附属记录长度不一致时该子区域降级为损坏的
//! 未知区域；不一致次数超过上限、或附属记录缺失时整个容器被丢弃。

use mdraw_core::geometry::{Point2, Rect, Vector2};
use mdraw_core::style::{StyleTables, WrapMode, ZoneStyle};
use mdraw_core::zone::{Group, Polygon, PolygonVertex, Shape, Zone, ZoneContent, ZoneRef};
use tracing::{debug, trace, warn};

use crate::reader::Reader;
use crate::record::{RecordError, StructHeader, read_struct};
use crate::{Diagnostic, DiagnosticKind};

/// 子区域条目的最小长度。
pub const CHILD_ENTRY_SIZE: u16 = 36;

pub mod tag {
    pub const LINE: u8 = 1;
    pub const RECT: u8 = 2;
    pub const ROUND_RECT: u8 = 3;
    pub const OVAL: u8 = 4;
    pub const ARC: u8 = 5;
    pub const POLYGON: u8 = 6;
    pub const ZONE_REF: u8 = 7;
    pub const PICTURE: u8 = 8;
    pub const BITMAP_REF: u8 = 9;
    pub const CONNECTOR: u8 = 10;
}

const POLYGON_CLOSED: i32 = 0x1;
const POLYGON_SPLINE: i32 = 0x2;
const VERTEX_SIZE: u16 = 8;
const SPLINE_VERTEX_SIZE: u16 = 24;

/// 条目中的原始字段。
struct ChildEntry {
    tag: u8,
    flags: u8,
    line_color: u8,
    fill_color: u8,
    line_pattern: u8,
    fill_pattern: u8,
    dash: u8,
    gradient: u8,
    edges: [f64; 4],
    ordering: i16,
    transform: i16,
    data: [i32; 2],
}

impl ChildEntry {
    fn read(reader: &mut Reader<'_>) -> Option<Self> {
        let mut bytes = [0u8; 8];
        for byte in &mut bytes {
            *byte = reader.read_u8()?;
        }
        let edges = [
            reader.read_fixed()?,
            reader.read_fixed()?,
            reader.read_fixed()?,
            reader.read_fixed()?,
        ];
        Some(Self {
            tag: bytes[0],
            flags: bytes[1],
            line_color: bytes[2],
            fill_color: bytes[3],
            line_pattern: bytes[4],
            fill_pattern: bytes[5],
            dash: bytes[6],
            gradient: bytes[7],
            edges,
            ordering: reader.read_i16()?,
            transform: reader.read_i16()?,
            data: [reader.read_i32()?, reader.read_i32()?],
        })
    }
}

/// 附属记录读取结果。
enum AuxError {
    /// 可容忍的不一致，子区域降级。
    Damaged,
    /// 记录缺失或截断，容器中止。
    Missing,
}

pub struct GroupDecoder<'t> {
    tables: &'t dyn StyleTables,
    max_recoverable_errors: usize,
}

impl<'t> GroupDecoder<'t> {
    pub fn new(tables: &'t dyn StyleTables, max_recoverable_errors: usize) -> Self {
        Self {
            tables,
            max_recoverable_errors,
        }
    }

    /// 解码容器 `zone_id` 的子区域。`reader` 须已限定在本区域的外层边界内。
    ///
    /// 返回 `None` 表示容器被丢弃，原因记录在 `diagnostics` 中。
    pub fn decode(
        &self,
        reader: &mut Reader<'_>,
        header: &StructHeader,
        zone_id: i32,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<Group> {
        let count = usize::from(header.num_entries);
        if count > 0 && header.entry_size < CHILD_ENTRY_SIZE {
            warn!(
                zone_id,
                entry_size = header.entry_size,
                "子区域条目长度过小，放弃该容器"
            );
            diagnostics.push(Diagnostic::new(
                header.start,
                Some(zone_id),
                DiagnosticKind::SizeMismatch,
            ));
            return aborted(header.start, zone_id, diagnostics);
        }

        let mut children = Vec::with_capacity(count);
        let mut tags = Vec::with_capacity(count);
        for index in 0..count {
            let offset = header.entry_offset(index);
            reader.seek(offset);
            let Some(entry) = ChildEntry::read(reader) else {
                diagnostics.push(Diagnostic::new(
                    offset,
                    Some(zone_id),
                    DiagnosticKind::Truncated,
                ));
                return aborted(header.start, zone_id, diagnostics);
            };
            tags.push(entry.tag);
            children.push(self.build_child(&entry, offset, zone_id, diagnostics));
        }

        reader.seek(header.end());
        let mut errors = 0usize;
        for (child, &tag) in children.iter_mut().zip(&tags) {
            for _ in 0..child.aux_record_count() {
                let offset = reader.tell();
                if reader.at_end() {
                    warn!(zone_id, offset, "附属记录缺失，放弃该容器");
                    diagnostics.push(Diagnostic::new(
                        offset,
                        Some(zone_id),
                        DiagnosticKind::Truncated,
                    ));
                    return aborted(header.start, zone_id, diagnostics);
                }
                match self.read_aux(reader, child) {
                    Ok(()) => {}
                    Err(AuxError::Damaged) => {
                        errors += 1;
                        diagnostics.push(Diagnostic::new(
                            offset,
                            Some(zone_id),
                            DiagnosticKind::SizeMismatch,
                        ));
                        if errors > self.max_recoverable_errors {
                            warn!(zone_id, errors, "附属记录损坏过多，放弃该容器");
                            return aborted(header.start, zone_id, diagnostics);
                        }
                        debug!(zone_id, offset, tag, "附属记录损坏，子区域降级为未知类型");
                        child.content = ZoneContent::Unknown { tag, damaged: true };
                        break;
                    }
                    Err(AuxError::Missing) => {
                        warn!(zone_id, offset, "附属记录被截断，放弃该容器");
                        diagnostics.push(Diagnostic::new(
                            offset,
                            Some(zone_id),
                            DiagnosticKind::Truncated,
                        ));
                        return aborted(header.start, zone_id, diagnostics);
                    }
                }
            }
        }

        for child in &mut children {
            child.reset_position();
        }
        trace!(zone_id, children = children.len(), "容器解码完成");
        Some(Group::with_children(zone_id, children))
    }

    fn build_child(
        &self,
        entry: &ChildEntry,
        offset: usize,
        zone_id: i32,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Zone {
        let [left, top, right, bottom] = entry.edges;
        let bbox = Rect::from_edges(left, top, right, bottom);
        let [data0, data1] = entry.data;
        let content = match entry.tag {
            tag::LINE => ZoneContent::Shape(Shape::Line),
            tag::RECT => ZoneContent::Shape(Shape::Rect),
            tag::ROUND_RECT => ZoneContent::Shape(Shape::RoundRect {
                corner: Vector2::new(f64::from(data0) / 256.0, f64::from(data1) / 256.0),
            }),
            tag::OVAL => ZoneContent::Shape(Shape::Oval),
            tag::ARC => ZoneContent::Shape(Shape::Arc {
                start_angle: fixed_angle(data0),
                sweep_angle: fixed_angle(data1),
            }),
            tag::POLYGON => ZoneContent::Shape(Shape::Polygon(Polygon {
                closed: data0 & POLYGON_CLOSED != 0,
                spline: data0 & POLYGON_SPLINE != 0,
                vertices: Vec::new(),
            })),
            tag::ZONE_REF => ZoneContent::ZoneRef(ZoneRef::new(data0, data1)),
            tag::PICTURE => ZoneContent::Picture { data: None },
            tag::BITMAP_REF => ZoneContent::BitmapRef { bitmap_id: data0 },
            tag::CONNECTOR => ZoneContent::Shape(Shape::Connector { data: None }),
            other => {
                warn!(zone_id, offset, tag = other, "未知的图形类型");
                diagnostics.push(Diagnostic::new(
                    offset,
                    Some(zone_id),
                    DiagnosticKind::UnknownShapeTag(other),
                ));
                ZoneContent::Unknown {
                    tag: other,
                    damaged: false,
                }
            }
        };

        let mut zone = Zone::new(content, bbox);
        zone.ordering = (entry.ordering >= 0).then_some(i32::from(entry.ordering));
        zone.style = self.build_style(entry);
        zone
    }

    /// 查不到的索引保留默认样式。
    fn build_style(&self, entry: &ChildEntry) -> ZoneStyle {
        let tables = self.tables;
        let mut style = ZoneStyle {
            wrap: WrapMode::from_bits(entry.flags),
            transform_id: usize::try_from(entry.transform).ok(),
            ..ZoneStyle::default()
        };
        match entry.line_color {
            0 => style.line.color = None,
            index => match tables.resolve_color(index) {
                Some(color) => style.line.color = Some(color),
                None => debug!(index, "未找到线条颜色"),
            },
        }
        if entry.fill_color != 0 {
            style.fill.color = tables.resolve_color(entry.fill_color);
        }
        if entry.line_pattern != 0 {
            style.line.pattern = tables.resolve_pattern(entry.line_pattern);
        }
        if entry.fill_pattern != 0 {
            style.fill.pattern = tables.resolve_pattern(entry.fill_pattern);
        }
        if entry.dash != 0 {
            style.line.dash = tables.resolve_dash(entry.dash);
        }
        if entry.gradient != 0 && !tables.resolve_gradient(entry.gradient, &mut style.fill) {
            debug!(index = entry.gradient, "未找到渐变定义");
        }
        style
    }

    fn read_aux(&self, reader: &mut Reader<'_>, child: &mut Zone) -> Result<(), AuxError> {
        let record = match read_struct(reader) {
            Ok(record) => record,
            Err(RecordError::SizeMismatch { .. }) => return Err(AuxError::Damaged),
            Err(RecordError::Truncated { .. }) => return Err(AuxError::Missing),
        };
        match &mut child.content {
            ZoneContent::Shape(Shape::Polygon(polygon)) => {
                read_vertices(reader, &record, polygon)?;
            }
            ZoneContent::Shape(Shape::Connector { data }) | ZoneContent::Picture { data } => {
                *data = Some(record.data_range());
            }
            _ => {}
        }
        reader.seek(record.end());
        Ok(())
    }
}

fn aborted(offset: usize, zone_id: i32, diagnostics: &mut Vec<Diagnostic>) -> Option<Group> {
    diagnostics.push(Diagnostic::new(
        offset,
        Some(zone_id),
        DiagnosticKind::GroupAborted,
    ));
    None
}

fn read_vertices(
    reader: &mut Reader<'_>,
    record: &StructHeader,
    polygon: &mut Polygon,
) -> Result<(), AuxError> {
    if record.is_placeholder() || record.num_entries == 0 {
        return Ok(());
    }
    let with_controls = match record.entry_size {
        VERTEX_SIZE => false,
        SPLINE_VERTEX_SIZE => true,
        _ => return Err(AuxError::Damaged),
    };
    polygon.vertices.reserve(usize::from(record.num_entries));
    for index in 0..usize::from(record.num_entries) {
        reader.seek(record.entry_offset(index));
        let point = read_point(reader)?;
        let controls = if with_controls {
            Some([read_point(reader)?, read_point(reader)?])
        } else {
            None
        };
        polygon.vertices.push(PolygonVertex { point, controls });
    }
    Ok(())
}

fn read_point(reader: &mut Reader<'_>) -> Result<Point2, AuxError> {
    let x = reader.read_fixed().ok_or(AuxError::Missing)?;
    let y = reader.read_fixed().ok_or(AuxError::Missing)?;
    Ok(Point2::new(x, y))
}

fn fixed_angle(raw: i32) -> f64 {
    (f64::from(raw) / 65536.0).to_degrees()
}
