use std::fmt::Write as _;
use std::path::Path;

use mdraw_config::AppConfig;
use mdraw_core::zone::{Group, Shape, Transform, Zone, ZoneContent};
use mdraw_engine::walk::{ZoneSink, walk};
use tracing::info;

use crate::errors::FrontendError;
use crate::loader::{LoadedDocument, load_document};

/// 把遍历结果写成缩进大纲。
#[derive(Debug, Default)]
pub struct TextSink {
    out: String,
}

impl TextSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_string(self) -> String {
        self.out
    }

    fn line(&mut self, depth: usize, text: &str) {
        let _ = writeln!(self.out, "{}{}", "  ".repeat(depth), text);
    }
}

impl ZoneSink for TextSink {
    fn begin_group(&mut self, group: &Group, depth: usize) {
        let mut text = format!("容器 #{}（子区域 {} 个）", group.id, group.children.len());
        if let Some(aggregate) = &group.aggregate {
            let _ = write!(
                text,
                " 第 {} 页 ({:.2}, {:.2})-({:.2}, {:.2})",
                aggregate.page,
                aggregate.bbox.left(),
                aggregate.bbox.top(),
                aggregate.bbox.right(),
                aggregate.bbox.bottom()
            );
        }
        self.line(depth, &text);
    }

    fn zone(&mut self, zone: &Zone, transform: Option<&Transform>, depth: usize) {
        let mut text = describe_zone(zone);
        match zone.page {
            Some(page) => {
                let _ = write!(
                    text,
                    " @第 {page} 页 ({:.2}, {:.2})",
                    zone.position.left(),
                    zone.position.top()
                );
            }
            None => text.push_str(" @未放置"),
        }
        if let Some(transform) = transform {
            let _ = write!(text, " 旋转={:.1}°", transform.rotation_degrees);
        }
        self.line(depth, &text);
    }

    fn end_group(&mut self, _group: &Group, _depth: usize) {}
}

/// 单个区域的一行中文描述（不含位置）。
pub fn describe_zone(zone: &Zone) -> String {
    let bounds = zone.bd_box();
    let size = format!("{:.2}x{:.2}", bounds.size().x(), bounds.size().y());
    match &zone.content {
        ZoneContent::Shape(shape) => match shape {
            Shape::Line => format!("线段 {size}"),
            Shape::Rect => format!("矩形 {size}"),
            Shape::RoundRect { corner } => format!("圆角矩形 {size} 圆角={:.2}", corner.x()),
            Shape::Oval => format!("椭圆 {size}"),
            Shape::Arc {
                start_angle,
                sweep_angle,
            } => format!(
                "圆弧 {size} 起始角={start_angle:.1}° 扫过={sweep_angle:.1}° 范围={}",
                extent(zone)
            ),
            Shape::Polygon(polygon) => format!(
                "{} 顶点数={} 闭合={} 范围={}",
                if polygon.spline { "样条" } else { "多边形" },
                polygon.vertices.len(),
                if polygon.closed { "是" } else { "否" },
                extent(zone)
            ),
            Shape::Connector { data } => {
                format!("连接线 数据={}字节", data.map_or(0, |range| range.len()))
            }
        },
        ZoneContent::Picture { data } => {
            format!("图片 {size} 数据={}字节", data.map_or(0, |range| range.len()))
        }
        ZoneContent::BitmapRef { bitmap_id } => format!("位图引用 -> #{bitmap_id}"),
        ZoneContent::ZoneRef(zone_ref) => {
            let mut text = format!("区域引用 -> #{}", zone_ref.target_id);
            if let Some(link) = zone_ref.link {
                let _ = write!(
                    text,
                    " 帧链 {}/{}{}",
                    link.frame_id,
                    link.frame_sub_id,
                    if link.is_last_frame { "（末帧）" } else { "" }
                );
            }
            text
        }
        ZoneContent::Unknown { tag, damaged } => {
            format!("未知区域 类型={tag}{}", if *damaged { "（已损坏）" } else { "" })
        }
    }
}

/// 实际绘制范围的尺寸。
fn extent(zone: &Zone) -> String {
    let size = zone.shape_bounds().size();
    format!("{:.2}x{:.2}", size.x(), size.y())
}

/// 生成文档概览文本：统计、诊断与区域大纲。
pub fn render_report(loaded: &mut LoadedDocument) -> String {
    let mut sink = TextSink::new();
    let stats = walk(&mut loaded.document, &mut sink);
    let outline = sink.into_string();

    let registry = loaded.document.registry();
    let mut out = String::new();
    let _ = writeln!(out, "文档：{}", loaded.path.display());
    let _ = writeln!(
        out,
        "区域 {} 个，容器 {} 个，位图 {} 个，文本流 {} 个，变换 {} 项",
        loaded.zones_read,
        registry.group_count(),
        registry.bitmaps().count(),
        loaded.text_flows.len(),
        loaded.document.transforms().len()
    );
    let settings = loaded.document.settings();
    let _ = writeln!(
        out,
        "页面 {:.2}x{:.2}，横向 {} 页{}",
        settings.projection.page_width,
        settings.projection.page_height,
        settings.projection.horizontal_pages,
        if settings.library_mode { "，库模式" } else { "" }
    );
    if let Some(report) = loaded.document.report() {
        let _ = writeln!(
            out,
            "帧链 {} 条，裁剪引用 {} 个",
            report.chains, report.prune.removed_refs
        );
    }
    if let Some(projection) = loaded.document.projection() {
        let _ = writeln!(
            out,
            "已放置 {} 个，未放置 {} 个",
            projection.placed, projection.unplaced
        );
    }
    if loaded.diagnostics.is_empty() {
        let _ = writeln!(out, "没有解码诊断。");
    } else {
        let _ = writeln!(out, "解码诊断 {} 条：", loaded.diagnostics.len());
        for diagnostic in &loaded.diagnostics {
            let _ = writeln!(out, "  - {diagnostic}");
        }
    }
    if stats.cycles_cut > 0 {
        let _ = writeln!(out, "跳过成环引用 {} 个", stats.cycles_cut);
    }
    let _ = writeln!(out, "区域大纲：");
    out.push_str(&outline);
    out
}

/// CLI 入口：加载文档并打印概览。
pub fn run(path: &Path, config: &AppConfig) -> Result<(), FrontendError> {
    let mut loaded = load_document(path, config)?;
    let report = render_report(&mut loaded);
    info!(path = %path.display(), "输出文档概览");
    print!("{report}");
    Ok(())
}
