pub mod projection;
pub mod registry;
pub mod resolve;
pub mod zone;

pub mod geometry {
    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示。页面坐标系 y 轴向下。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量，用于尺寸与平移量，分量允许为负。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 轴对齐边界框（已归一化，min <= max），用于区域定位与页面投影。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            Self { min, max }
        }

        /// 由四条边构造，自动交换反向的边。
        pub fn from_edges(left: f64, top: f64, right: f64, bottom: f64) -> Self {
            Self {
                min: Point2::new(left.min(right), top.min(bottom)),
                max: Point2::new(left.max(right), top.max(bottom)),
            }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        #[inline]
        pub fn left(&self) -> f64 {
            self.min.x()
        }

        #[inline]
        pub fn top(&self) -> f64 {
            self.min.y()
        }

        #[inline]
        pub fn right(&self) -> f64 {
            self.max.x()
        }

        #[inline]
        pub fn bottom(&self) -> f64 {
            self.max.y()
        }

        #[inline]
        pub fn size(&self) -> Vector2 {
            Vector2(self.max.as_vec2() - self.min.as_vec2())
        }

        pub fn include_point(&mut self, point: Point2) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }

        pub fn include_bounds(&mut self, other: &Bounds2D) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }

        /// 保持尺寸不变，将左上角移动到 `origin`。
        pub fn moved_to(&self, origin: Point2) -> Self {
            Self {
                min: origin,
                max: origin.translate(self.size()),
            }
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            debug_assert!(!self.is_empty());
            let center = (self.min.as_vec2() + self.max.as_vec2()) * 0.5;
            Point2::from_vec(center)
        }
    }

    /// 解码得到的原始区域框：原点加尺寸，尺寸为负表示该轴翻转。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Rect {
        pub origin: Point2,
        pub size: Vector2,
    }

    impl Rect {
        #[inline]
        pub fn new(origin: Point2, size: Vector2) -> Self {
            Self { origin, size }
        }

        pub fn from_edges(left: f64, top: f64, right: f64, bottom: f64) -> Self {
            Self {
                origin: Point2::new(left, top),
                size: Vector2::new(right - left, bottom - top),
            }
        }

        #[inline]
        pub fn is_flipped_x(&self) -> bool {
            self.size.x() < 0.0
        }

        #[inline]
        pub fn is_flipped_y(&self) -> bool {
            self.size.y() < 0.0
        }

        /// 归一化后的边界框：尺寸为负的轴交换 min/max。
        pub fn bd_box(&self) -> Bounds2D {
            let start = self.origin;
            let end = self.origin.translate(self.size);
            Bounds2D::from_edges(start.x(), start.y(), end.x(), end.y())
        }
    }

}

pub mod style {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Color {
        pub r: u8,
        pub g: u8,
        pub b: u8,
    }

    impl Color {
        pub const BLACK: Color = Color::rgb(0, 0, 0);
        pub const WHITE: Color = Color::rgb(255, 255, 255);

        #[inline]
        pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
            Self { r, g, b }
        }
    }

    /// 位图图案，仅保留前景色覆盖比例。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Pattern {
        pub coverage: f32,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct DashSpec {
        pub segments: Vec<f64>,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum GradientKind {
        Linear,
        Radial,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Gradient {
        pub kind: GradientKind,
        /// 线性渐变方向（度）。
        pub angle: f64,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub enum WrapMode {
        #[default]
        None,
        Regular,
        Irregular,
    }

    impl WrapMode {
        pub fn from_bits(bits: u8) -> Self {
            match bits & 0x3 {
                1 => WrapMode::Regular,
                2 => WrapMode::Irregular,
                _ => WrapMode::None,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct LineStyle {
        pub color: Option<Color>,
        pub pattern: Option<Pattern>,
        pub dash: Option<DashSpec>,
        pub width: f64,
    }

    impl Default for LineStyle {
        fn default() -> Self {
            Self {
                color: Some(Color::BLACK),
                pattern: None,
                dash: None,
                width: 1.0,
            }
        }
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct FillStyle {
        pub color: Option<Color>,
        pub pattern: Option<Pattern>,
        pub gradient: Option<Gradient>,
    }

    /// 区域样式：环绕模式、线条/填充与可选的变换表索引。
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct ZoneStyle {
        pub wrap: WrapMode,
        pub line: LineStyle,
        pub fill: FillStyle,
        pub transform_id: Option<usize>,
    }

    /// 外部样式表：颜色、图案、虚线与渐变的索引查找。
    ///
    /// 查找失败时返回 `None`/`false`，调用方保留默认值继续解码。
    pub trait StyleTables {
        fn resolve_color(&self, index: u8) -> Option<Color>;
        fn resolve_pattern(&self, index: u8) -> Option<Pattern>;
        fn resolve_dash(&self, index: u8) -> Option<DashSpec>;
        fn resolve_gradient(&self, index: u8, style: &mut FillStyle) -> bool;
    }

    const CUBE_SIZE: u8 = 216;
    const PATTERN_COVERAGE: [f32; 8] = [1.0, 0.875, 0.75, 0.5, 0.25, 0.125, 0.0625, 0.0];
    const DASHES: [&[f64]; 5] = [
        &[6.0, 3.0],
        &[3.0, 3.0],
        &[1.0, 2.0],
        &[9.0, 3.0, 3.0, 3.0],
        &[12.0, 6.0],
    ];

    /// 内建样式表：8 位调色板（216 色立方 + 灰阶）、百分比图案、常用虚线与渐变。
    #[derive(Debug, Clone, Copy, Default)]
    pub struct StandardTables;

    impl StyleTables for StandardTables {
        fn resolve_color(&self, index: u8) -> Option<Color> {
            match index {
                0 => None,
                1..=CUBE_SIZE => {
                    let i = index - 1;
                    Some(Color::rgb((i / 36) * 51, ((i / 6) % 6) * 51, (i % 6) * 51))
                }
                _ => {
                    let step = u32::from(index - CUBE_SIZE - 1);
                    let level = 255 - (step * 255 / 38).min(255);
                    let level = level as u8;
                    Some(Color::rgb(level, level, level))
                }
            }
        }

        fn resolve_pattern(&self, index: u8) -> Option<Pattern> {
            let slot = usize::from(index).checked_sub(1)?;
            PATTERN_COVERAGE
                .get(slot)
                .map(|&coverage| Pattern { coverage })
        }

        fn resolve_dash(&self, index: u8) -> Option<DashSpec> {
            let slot = usize::from(index).checked_sub(1)?;
            DASHES.get(slot).map(|segments| DashSpec {
                segments: segments.to_vec(),
            })
        }

        fn resolve_gradient(&self, index: u8, style: &mut FillStyle) -> bool {
            let gradient = match index {
                1..=8 => Gradient {
                    kind: GradientKind::Linear,
                    angle: f64::from(index - 1) * 45.0,
                },
                9..=12 => Gradient {
                    kind: GradientKind::Radial,
                    angle: 0.0,
                },
                _ => return false,
            };
            style.gradient = Some(gradient);
            true
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn standard_palette_covers_cube_and_grays() {
            let tables = StandardTables;
            assert_eq!(tables.resolve_color(0), None);
            assert_eq!(tables.resolve_color(1), Some(Color::BLACK));
            assert_eq!(tables.resolve_color(216), Some(Color::WHITE));
            assert_eq!(tables.resolve_color(217), Some(Color::WHITE));
            let darkest = tables.resolve_color(255).expect("gray ramp");
            assert_eq!(darkest, Color::rgb(0, 0, 0));
        }

        #[test]
        fn lookups_fail_soft_outside_tables() {
            let tables = StandardTables;
            assert!(tables.resolve_pattern(0).is_none());
            assert!(tables.resolve_pattern(9).is_none());
            assert!(tables.resolve_dash(6).is_none());
            let mut fill = FillStyle::default();
            assert!(!tables.resolve_gradient(40, &mut fill));
            assert!(fill.gradient.is_none());
            assert!(tables.resolve_gradient(3, &mut fill));
            let gradient = fill.gradient.expect("gradient stored");
            assert_eq!(gradient.kind, GradientKind::Linear);
            assert!((gradient.angle - 90.0).abs() < 1e-9);
        }
    }
}
