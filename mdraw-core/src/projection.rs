//! 页面投影：把子区域从容器局部坐标换算为页面相对坐标并分配页码。
//!
//! 每次投影都从解码时的原始框重新计算，相同参数重复调用结果逐位一致。

use tracing::trace;

use crate::geometry::{Bounds2D, Point2};
use crate::registry::ZoneRegistry;
use crate::zone::{Group, Placement};

/// 顶边越过页边界不超过该比例（相对页高）时吸附到 0。
pub const DEFAULT_SNAP_TOLERANCE: f64 = 0.1;
/// 顶边越界不超过该比例时退回上一页。
pub const DEFAULT_SHIFT_TOLERANCE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionParams {
    pub page_width: f64,
    pub page_height: f64,
    /// 横向页数，大于 1 时 x 方向同样分页。
    pub horizontal_pages: u32,
    pub snap_tolerance: f64,
    pub shift_tolerance: f64,
}

impl Default for ProjectionParams {
    fn default() -> Self {
        Self {
            page_width: 540.0,
            page_height: 720.0,
            horizontal_pages: 1,
            snap_tolerance: DEFAULT_SNAP_TOLERANCE,
            shift_tolerance: DEFAULT_SHIFT_TOLERANCE,
        }
    }
}

impl ProjectionParams {
    pub fn new(page_width: f64, page_height: f64, horizontal_pages: u32) -> Self {
        Self {
            page_width,
            page_height,
            horizontal_pages,
            ..Self::default()
        }
    }

    pub(crate) fn key(&self) -> ProjectionKey {
        ProjectionKey {
            page_width: self.page_width.to_bits(),
            page_height: self.page_height.to_bits(),
            horizontal_pages: self.horizontal_pages,
            snap_tolerance: self.snap_tolerance.to_bits(),
            shift_tolerance: self.shift_tolerance.to_bits(),
        }
    }
}

/// 投影参数的逐位快照，用于判断容器上的结果是否仍然有效。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectionKey {
    page_width: u64,
    page_height: u64,
    horizontal_pages: u32,
    snap_tolerance: u64,
    shift_tolerance: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionSummary {
    pub groups: usize,
    pub placed: usize,
    pub unplaced: usize,
    pub aggregated: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct GeometryProjector {
    params: ProjectionParams,
}

impl GeometryProjector {
    pub fn new(params: ProjectionParams) -> Self {
        Self { params }
    }

    #[inline]
    pub fn params(&self) -> &ProjectionParams {
        &self.params
    }

    /// 计算单个框的页码与页面相对位置；无法放置时返回 `None`。
    pub fn place(&self, bounds: Bounds2D) -> Option<Placement> {
        if bounds.is_empty() {
            return None;
        }
        let params = &self.params;
        let (page_y, top) = place_axis(
            bounds.top(),
            bounds.bottom(),
            params.page_height,
            params.snap_tolerance,
            params.shift_tolerance,
        )?;
        if params.horizontal_pages <= 1 {
            return Some(Placement {
                bbox: bounds.moved_to(Point2::new(bounds.left(), top)),
                page: page_y,
            });
        }

        let (page_x, left) = place_axis(
            bounds.left(),
            bounds.right(),
            params.page_width,
            params.snap_tolerance,
            params.shift_tolerance,
        )?;
        let columns = i32::try_from(params.horizontal_pages).ok()?;
        let page = page_x.checked_add((page_y - 1).checked_mul(columns)?)?;
        Some(Placement {
            bbox: bounds.moved_to(Point2::new(left, top)),
            page,
        })
    }

    /// 投影容器的全部子区域；所有已放置的子区域同页时返回汇总位置。
    ///
    /// 参数与上次相同且容器未被修改时直接返回缓存结果。
    pub fn project_group(&self, group: &mut Group) -> Option<Placement> {
        let key = self.params.key();
        if group.projection_key == Some(key) {
            return group.aggregate;
        }

        let mut union: Option<(i32, Bounds2D)> = None;
        let mut single_page = true;
        for child in &mut group.children {
            child.reset_position();
            let Some(placement) = self.place(child.bd_box()) else {
                trace!(group_id = group.id, kind = child.kind_label(), "子区域无法放置到页面");
                continue;
            };
            child.position = placement.bbox;
            child.page = Some(placement.page);
            match &mut union {
                None => union = Some((placement.page, placement.bbox)),
                Some((page, bbox)) if *page == placement.page => {
                    bbox.include_bounds(&placement.bbox)
                }
                Some(_) => single_page = false,
            }
        }

        group.aggregate = if single_page {
            union.map(|(page, bbox)| Placement { bbox, page })
        } else {
            None
        };
        group.projection_key = Some(key);
        group.aggregate
    }

    pub fn project_all(&self, registry: &mut ZoneRegistry) -> ProjectionSummary {
        let mut summary = ProjectionSummary::default();
        for group in registry.groups_mut() {
            summary.groups += 1;
            if self.project_group(group).is_some() {
                summary.aggregated += 1;
            }
            let placed = group.children.iter().filter(|c| c.page.is_some()).count();
            summary.placed += placed;
            summary.unplaced += group.children.len() - placed;
        }
        summary
    }
}

/// 单轴分页：返回 1 起始的页码与页内起点。
fn place_axis(min: f64, max: f64, page_len: f64, snap: f64, shift: f64) -> Option<(i32, f64)> {
    if page_len.is_nan() || page_len <= 0.0 || !min.is_finite() || !max.is_finite() {
        return None;
    }
    let mut page = i32::try_from((max / page_len).floor() as i64 + 1).ok()?;
    let mut shifted = false;
    loop {
        if page < 1 {
            return None;
        }
        let local = min - f64::from(page - 1) * page_len;
        if local >= 0.0 {
            return Some((page, local));
        }
        let overflow = -local;
        if overflow <= snap * page_len {
            return Some((page, 0.0));
        }
        if !shifted && page > 1 && overflow <= shift * page_len {
            page -= 1;
            shifted = true;
            continue;
        }
        return None;
    }
}
