use mdraw_core::zone::{Group, Transform, Zone};
use tracing::{trace, warn};

use crate::pipeline::ResolvedDocument;

/// 遍历输出的接收端（渲染器、文本导出等）。
pub trait ZoneSink {
    fn begin_group(&mut self, group: &Group, depth: usize);
    fn zone(&mut self, zone: &Zone, transform: Option<&Transform>, depth: usize);
    fn end_group(&mut self, group: &Group, depth: usize);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub groups: usize,
    pub zones: usize,
    /// 因引用成环而跳过的引用数。
    pub cycles_cut: usize,
}

/// 从各个根容器出发，按待发送顺序输出子区域，遇到容器引用时进入目标容器。
///
/// 当前路径上已经出现的容器不会再次进入。
pub fn walk<S: ZoneSink + ?Sized>(document: &mut ResolvedDocument, sink: &mut S) -> WalkStats {
    document.registry_mut().refresh_pending_send();
    let document = &*document;
    let mut walker = Walker {
        document,
        path: Vec::new(),
        stats: WalkStats::default(),
    };
    for root in document.roots() {
        walker.visit(root, 0, sink);
    }
    walker.stats
}

struct Walker<'d> {
    document: &'d ResolvedDocument,
    path: Vec<i32>,
    stats: WalkStats,
}

impl Walker<'_> {
    fn visit<S: ZoneSink + ?Sized>(&mut self, id: i32, depth: usize, sink: &mut S) {
        let document = self.document;
        let registry = document.registry();
        let Some(group) = registry.get(id) else {
            return;
        };
        let Some(order) = registry.cached_pending_send(id) else {
            return;
        };

        self.path.push(id);
        self.stats.groups += 1;
        sink.begin_group(group, depth);
        for &index in order {
            let Some(zone) = group.children.get(index) else {
                continue;
            };
            let transform = zone
                .style
                .transform_id
                .and_then(|index| document.transform(index));
            sink.zone(zone, transform, depth + 1);
            self.stats.zones += 1;

            let Some(zone_ref) = zone.as_zone_ref() else {
                continue;
            };
            let target = zone_ref.target_id;
            if registry.get(target).is_none() {
                continue;
            }
            if self.path.contains(&target) {
                warn!(group_id = id, target_id = target, "区域引用成环，跳过");
                self.stats.cycles_cut += 1;
                continue;
            }
            trace!(group_id = id, target_id = target, "进入子容器");
            self.visit(target, depth + 2, sink);
        }
        sink.end_group(group, depth);
        self.path.pop();
    }
}
