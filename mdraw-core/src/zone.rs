//! 区域（Zone）与容器（Group）数据模型。
//!
//! 区域之间只通过整数 id 互相引用，`ZoneRef::target_id` 不持有目标，
//! 需要时经 [`crate::registry::ZoneRegistry`] 查找。

use serde::{Deserialize, Serialize};

use crate::geometry::{Bounds2D, Point2, Rect, Vector2};
use crate::projection::ProjectionKey;
use crate::style::ZoneStyle;

/// 文档主体（正文）区域的保留 id。
pub const ROOT_ZONE_ID: i32 = 1;

/// 输入流中的字节区间，数据本身不复制。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
}

impl ByteRange {
    #[inline]
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 已登记区域的类别，供链接帧判定等使用。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZoneKind {
    Group,
    TextFlow,
    Bitmap,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonVertex {
    pub point: Point2,
    /// 样条顶点的两个控制点。
    pub controls: Option<[Point2; 2]>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub closed: bool,
    pub spline: bool,
    pub vertices: Vec<PolygonVertex>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Line,
    Rect,
    RoundRect {
        corner: Vector2,
    },
    Oval,
    /// 角度单位为度，起始角自 x 轴正向逆时针计，扫过角可为负。
    Arc {
        start_angle: f64,
        sweep_angle: f64,
    },
    Polygon(Polygon),
    /// 连接线数据不解析，仅记录字节区间。
    Connector {
        data: Option<ByteRange>,
    },
}

/// 帧链信息，仅由链接帧解析填写。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameLink {
    pub frame_id: u32,
    pub frame_sub_id: u32,
    pub is_last_frame: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneRef {
    pub target_id: i32,
    pub sub_id: i32,
    pub link: Option<FrameLink>,
}

impl ZoneRef {
    #[inline]
    pub fn new(target_id: i32, sub_id: i32) -> Self {
        Self {
            target_id,
            sub_id,
            link: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ZoneContent {
    Shape(Shape),
    Picture { data: Option<ByteRange> },
    BitmapRef { bitmap_id: i32 },
    ZoneRef(ZoneRef),
    /// 无法识别的类型标记；`damaged` 表示其附属记录损坏。
    Unknown { tag: u8, damaged: bool },
}

/// 解码得到的一个内容单元。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub content: ZoneContent,
    /// 解码时的原始框（父坐标系），投影总是从这里重新计算。
    pub bbox: Rect,
    pub ordering: Option<i32>,
    pub style: ZoneStyle,
    /// 当前位置；解码后为归一化的 `bbox`，投影后为页面相对坐标。
    pub position: Bounds2D,
    pub page: Option<i32>,
}

impl Zone {
    pub fn new(content: ZoneContent, bbox: Rect) -> Self {
        Self {
            content,
            bbox,
            ordering: None,
            style: ZoneStyle::default(),
            position: bbox.bd_box(),
            page: None,
        }
    }

    pub fn zone_ref(target_id: i32, sub_id: i32, bbox: Rect) -> Self {
        Self::new(ZoneContent::ZoneRef(ZoneRef::new(target_id, sub_id)), bbox)
    }

    #[inline]
    pub fn bd_box(&self) -> Bounds2D {
        self.bbox.bd_box()
    }

    /// 恢复为解码时的位置，页码清空。
    pub fn reset_position(&mut self) {
        self.position = self.bd_box();
        self.page = None;
    }

    #[inline]
    pub fn as_zone_ref(&self) -> Option<&ZoneRef> {
        match &self.content {
            ZoneContent::ZoneRef(zone_ref) => Some(zone_ref),
            _ => None,
        }
    }

    #[inline]
    pub fn as_zone_ref_mut(&mut self) -> Option<&mut ZoneRef> {
        match &mut self.content {
            ZoneContent::ZoneRef(zone_ref) => Some(zone_ref),
            _ => None,
        }
    }

    #[inline]
    pub fn is_unknown(&self) -> bool {
        matches!(self.content, ZoneContent::Unknown { .. })
    }

    /// 解码第二阶段需要读取的附属记录数量。
    pub fn aux_record_count(&self) -> usize {
        match &self.content {
            ZoneContent::Shape(Shape::Polygon(_))
            | ZoneContent::Shape(Shape::Connector { .. })
            | ZoneContent::Picture { .. } => 1,
            _ => 0,
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match &self.content {
            ZoneContent::Shape(shape) => match shape {
                Shape::Line => "line",
                Shape::Rect => "rect",
                Shape::RoundRect { .. } => "round-rect",
                Shape::Oval => "oval",
                Shape::Arc { .. } => "arc",
                Shape::Polygon(_) => "polygon",
                Shape::Connector { .. } => "connector",
            },
            ZoneContent::Picture { .. } => "picture",
            ZoneContent::BitmapRef { .. } => "bitmap-ref",
            ZoneContent::ZoneRef(_) => "zone-ref",
            ZoneContent::Unknown { .. } => "unknown",
        }
    }

    /// 图形的实际绘制范围；圆弧只取扫过部分，其余退化为归一化框。
    ///
    /// 多边形顶点相对外框左上角，结果已换算到外框所在坐标系。
    pub fn shape_bounds(&self) -> Bounds2D {
        let oval = self.bd_box();
        match &self.content {
            ZoneContent::Shape(Shape::Arc {
                start_angle,
                sweep_angle,
            }) => arc_bounds(oval, *start_angle, *sweep_angle),
            ZoneContent::Shape(Shape::Polygon(polygon)) if !polygon.vertices.is_empty() => {
                let origin = Vector2::new(oval.left(), oval.top());
                let mut bounds = Bounds2D::empty();
                for vertex in &polygon.vertices {
                    bounds.include_point(vertex.point.translate(origin));
                    for control in vertex.controls.into_iter().flatten() {
                        bounds.include_point(control.translate(origin));
                    }
                }
                bounds
            }
            _ => oval,
        }
    }
}

/// 计算椭圆 `oval` 上从 `start` 扫过 `sweep`（度）的弧段范围。
pub fn arc_bounds(oval: Bounds2D, start: f64, sweep: f64) -> Bounds2D {
    if oval.is_empty() || sweep.abs() >= 360.0 {
        return oval;
    }
    let center = oval.center();
    let size = oval.size();
    let (rx, ry) = (size.x() * 0.5, size.y() * 0.5);
    let point = |degrees: f64| {
        let radians = degrees.to_radians();
        Point2::new(
            center.x() + rx * radians.cos(),
            center.y() - ry * radians.sin(),
        )
    };

    let (mut start, mut end) = if sweep >= 0.0 {
        (start, start + sweep)
    } else {
        (start + sweep, start)
    };
    // 起始角可能超出一圈，先归一化到 [0, 360)
    let shift = (start / 360.0).floor() * 360.0;
    start -= shift;
    end -= shift;

    let mut bounds = Bounds2D::empty();
    bounds.include_point(point(start));
    bounds.include_point(point(end));
    const QUADRANTS: [f64; 4] = [0.0, 90.0, 180.0, 270.0];
    for base in QUADRANTS {
        let mut candidate = base;
        while candidate < start {
            candidate += 360.0;
        }
        if candidate <= end {
            bounds.include_point(point(candidate));
        }
    }
    bounds
}

/// 所有子区域落在同一页时的汇总位置。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub bbox: Bounds2D,
    pub page: i32,
}

/// 区域容器，对应文档中的一个图层/页面/帧组。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: i32,
    pub children: Vec<Zone>,
    /// 是否存在指向正文区域（id 1）的引用。
    pub has_main_zone_ref: bool,
    pub aggregate: Option<Placement>,
    #[serde(skip)]
    pub(crate) pending_send: Option<Vec<usize>>,
    #[serde(skip)]
    pub(crate) projection_key: Option<ProjectionKey>,
}

impl Group {
    pub fn new(id: i32) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn with_children(id: i32, children: Vec<Zone>) -> Self {
        let mut group = Self::new(id);
        group.children = children;
        group.refresh_main_zone_ref();
        group
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn refresh_main_zone_ref(&mut self) {
        self.has_main_zone_ref = self
            .children
            .iter()
            .filter_map(Zone::as_zone_ref)
            .any(|zone_ref| zone_ref.target_id == ROOT_ZONE_ID);
    }

    /// 丢弃缓存的待发送列表与投影结果，下次访问时重新计算。
    pub fn invalidate(&mut self) {
        self.pending_send = None;
        self.projection_key = None;
    }

    /// 移除所有指向 `target_id` 的引用，返回移除数量。
    pub fn remove_refs_to(&mut self, target_id: i32) -> usize {
        let before = self.children.len();
        self.children.retain(|child| {
            child
                .as_zone_ref()
                .is_none_or(|zone_ref| zone_ref.target_id != target_id)
        });
        let removed = before - self.children.len();
        if removed > 0 {
            self.invalidate();
            self.refresh_main_zone_ref();
        }
        removed
    }

    /// 已缓存的待发送子区域下标。
    #[inline]
    pub fn cached_pending_send(&self) -> Option<&[usize]> {
        self.pending_send.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bitmap {
    pub id: i32,
    pub width: u16,
    pub height: u16,
    pub bits_per_pixel: u16,
    pub data: Option<ByteRange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub rotation_degrees: f64,
    pub original_size: Vector2,
    pub extra_values: [f64; 2],
}

/// 文档级变换表，只追加，按下标引用。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformTable {
    entries: Vec<Transform>,
}

impl TransformTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, transform: Transform) -> usize {
        self.entries.push(transform);
        self.entries.len() - 1
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Transform> {
        self.entries.get(index)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transform> {
        self.entries.iter()
    }
}
