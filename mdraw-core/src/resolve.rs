//! 解码完成后的全图处理：链接帧与空容器裁剪。
//!
//! 两个处理共享一次 [`ZoneGraph::scan`] 的结果，且顺序固定：
//! 先链接（按子区域下标定位引用），再裁剪（会删除子区域，使下标失效）。
//! [`prune_empty_zones`] 按值接收 `ZoneGraph`，裁剪之后不能再用同一份扫描结果链接。

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, trace, warn};

use crate::registry::{ZoneClassifier, ZoneRegistry};
use crate::zone::{FrameLink, ROOT_ZONE_ID, Zone, ZoneKind};

/// 单个文档解析过程中的可变状态，避免使用全局计数器。
#[derive(Debug, Clone, Default)]
pub struct ResolutionContext {
    next_frame_id: u32,
    /// 来自外层文档：库模式下正文区域永不裁剪。
    pub library_mode: bool,
}

impl ResolutionContext {
    pub fn new(library_mode: bool) -> Self {
        Self {
            next_frame_id: 0,
            library_mode,
        }
    }

    fn allocate_frame_id(&mut self) -> u32 {
        let id = self.next_frame_id;
        self.next_frame_id += 1;
        id
    }

    #[inline]
    pub fn frames_allocated(&self) -> u32 {
        self.next_frame_id
    }
}

/// 引用在容器中的位置。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildSlot {
    pub group_id: i32,
    pub index: usize,
}

/// 一次遍历全部容器得到的引用关系。
#[derive(Debug, Clone, Default)]
pub struct ZoneGraph {
    /// 文本流 id -> (sub id -> 引用位置)，sub id 升序。
    frames: BTreeMap<i32, BTreeMap<i32, ChildSlot>>,
    /// 被引用 id -> 引用它的容器 id（去重、升序）。
    fathers: HashMap<i32, Vec<i32>>,
    empty_groups: Vec<i32>,
}

impl ZoneGraph {
    pub fn scan(registry: &ZoneRegistry, classifier: &dyn ZoneClassifier) -> Self {
        let mut graph = ZoneGraph::default();
        for group in registry.groups() {
            if group.is_empty() {
                graph.empty_groups.push(group.id);
                continue;
            }
            for (index, child) in group.children.iter().enumerate() {
                let Some(zone_ref) = child.as_zone_ref() else {
                    continue;
                };
                let parents = graph.fathers.entry(zone_ref.target_id).or_default();
                if parents.last() != Some(&group.id) {
                    parents.push(group.id);
                }

                if classifier.classify(zone_ref.target_id) != ZoneKind::TextFlow {
                    continue;
                }
                let bucket = graph.frames.entry(zone_ref.target_id).or_default();
                match bucket.entry(zone_ref.sub_id) {
                    Entry::Vacant(slot) => {
                        slot.insert(ChildSlot {
                            group_id: group.id,
                            index,
                        });
                    }
                    Entry::Occupied(first) => {
                        warn!(
                            target_id = zone_ref.target_id,
                            sub_id = zone_ref.sub_id,
                            first_group = first.get().group_id,
                            duplicate_group = group.id,
                            "同一文本流出现重复的 sub id，忽略后出现的引用"
                        );
                    }
                }
            }
        }
        trace!(
            empty = graph.empty_groups.len(),
            referenced = graph.fathers.len(),
            text_flows = graph.frames.len(),
            "区域引用扫描完成"
        );
        graph
    }

    pub fn fathers_of(&self, id: i32) -> &[i32] {
        self.fathers.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    #[inline]
    pub fn empty_groups(&self) -> &[i32] {
        &self.empty_groups
    }

    /// 被任意容器引用过的 id。
    pub fn is_referenced(&self, id: i32) -> bool {
        self.fathers.contains_key(&id)
    }

    pub fn frame_candidates(&self, target_id: i32) -> Option<&BTreeMap<i32, ChildSlot>> {
        self.frames.get(&target_id)
    }
}

/// 把指向同一文本流、sub id 不同的引用串成帧链，返回建立的链数。
///
/// 链内按 sub id 升序编号，与发现顺序无关；只有一个 sub id 的文本流不链接。
pub fn link_frames(
    graph: &ZoneGraph,
    registry: &mut ZoneRegistry,
    ctx: &mut ResolutionContext,
) -> usize {
    let mut chains = 0;
    for (&target_id, bucket) in &graph.frames {
        if bucket.len() < 2 {
            continue;
        }
        let frame_id = ctx.allocate_frame_id();
        let last = bucket.len() - 1;
        for (position, (&sub_id, slot)) in bucket.iter().enumerate() {
            let zone_ref = registry
                .get_mut(slot.group_id)
                .and_then(|group| group.children.get_mut(slot.index))
                .and_then(Zone::as_zone_ref_mut);
            let Some(zone_ref) = zone_ref else {
                warn!(
                    target_id,
                    sub_id,
                    group_id = slot.group_id,
                    index = slot.index,
                    "帧链引用位置已失效"
                );
                continue;
            };
            zone_ref.link = Some(FrameLink {
                frame_id,
                frame_sub_id: position as u32,
                is_last_frame: position == last,
            });
        }
        debug!(target_id, frame_id, frames = bucket.len(), "建立帧链");
        chains += 1;
    }
    chains
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// 从父容器删除的引用数。
    pub removed_refs: usize,
    /// 因裁剪而变空的容器，按变空顺序。
    pub emptied_groups: Vec<i32>,
    /// 被引用但未登记的 id 数，与空容器一样入栈。
    pub dangling: usize,
    /// 出栈次数，不超过容器数与 `dangling` 之和。
    pub pops: usize,
}

/// 从父容器中删除指向空容器（或未登记 id）的引用，并向上级联。
pub fn prune_empty_zones(
    graph: ZoneGraph,
    registry: &mut ZoneRegistry,
    ctx: &ResolutionContext,
) -> PruneReport {
    let mut report = PruneReport::default();
    let mut queued: HashSet<i32> = HashSet::new();
    let mut stack: Vec<i32> = Vec::new();

    for &id in &graph.empty_groups {
        if queued.insert(id) {
            stack.push(id);
        }
    }
    let mut dangling: Vec<i32> = graph
        .fathers
        .keys()
        .copied()
        .filter(|&id| !registry.contains(id))
        .collect();
    dangling.sort_unstable();
    report.dangling = dangling.len();
    for id in dangling {
        debug!(target_id = id, "引用了未登记的区域，按空容器处理");
        if queued.insert(id) {
            stack.push(id);
        }
    }

    while let Some(id) = stack.pop() {
        report.pops += 1;
        if ctx.library_mode && id == ROOT_ZONE_ID {
            debug!("库模式下保留正文区域引用");
            continue;
        }
        for &parent in graph.fathers_of(id) {
            if ctx.library_mode && parent == ROOT_ZONE_ID {
                continue;
            }
            let Some(group) = registry.get_mut(parent) else {
                continue;
            };
            let was_empty = group.is_empty();
            let removed = group.remove_refs_to(id);
            if removed == 0 {
                continue;
            }
            trace!(parent, child = id, removed, "删除空区域引用");
            report.removed_refs += removed;
            if !was_empty && group.is_empty() && queued.insert(parent) {
                report.emptied_groups.push(parent);
                stack.push(parent);
            }
        }
    }
    report
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveReport {
    pub chains: usize,
    pub prune: PruneReport,
}

/// 按固定顺序执行扫描、链接与裁剪，以登记表自身作为类别判定。
pub fn resolve(registry: &mut ZoneRegistry, ctx: &mut ResolutionContext) -> ResolveReport {
    let graph = ZoneGraph::scan(registry, &*registry);
    finish(graph, registry, ctx)
}

/// 与 [`resolve`] 相同，但使用外部提供的类别判定。
pub fn resolve_with(
    registry: &mut ZoneRegistry,
    classifier: &dyn ZoneClassifier,
    ctx: &mut ResolutionContext,
) -> ResolveReport {
    let graph = ZoneGraph::scan(registry, classifier);
    finish(graph, registry, ctx)
}

fn finish(
    graph: ZoneGraph,
    registry: &mut ZoneRegistry,
    ctx: &mut ResolutionContext,
) -> ResolveReport {
    let chains = link_frames(&graph, registry, ctx);
    let prune = prune_empty_zones(graph, registry, ctx);
    debug!(
        chains,
        removed = prune.removed_refs,
        emptied = prune.emptied_groups.len(),
        "区域图解析完成"
    );
    ResolveReport { chains, prune }
}
