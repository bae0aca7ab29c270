//! 按 id 存放区域的登记表。
//!
//! 同一 id 只接受第一次登记；缺失的 id 是正常状态（前向引用或确实不存在），
//! 查询时一律按“空”处理，不会报错。

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::zone::{Bitmap, Group, Zone, ZoneContent, ZoneKind};

/// 判定某个 id 指向的区域类别，供链接帧解析使用。
pub trait ZoneClassifier {
    fn classify(&self, id: i32) -> ZoneKind;
}

impl<F> ZoneClassifier for F
where
    F: Fn(i32) -> ZoneKind,
{
    fn classify(&self, id: i32) -> ZoneKind {
        self(id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ZoneRegistry {
    groups: BTreeMap<i32, Group>,
    bitmaps: BTreeMap<i32, Bitmap>,
    kinds: BTreeMap<i32, ZoneKind>,
}

impl ZoneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 任意类别下是否已登记该 id。
    #[inline]
    pub fn contains(&self, id: i32) -> bool {
        self.kinds.contains_key(&id)
    }

    #[inline]
    pub fn kind_of(&self, id: i32) -> Option<ZoneKind> {
        self.kinds.get(&id).copied()
    }

    /// 登记容器；id 已存在时丢弃新值并返回 `false`。
    pub fn register_group(&mut self, id: i32, mut group: Group) -> bool {
        if let Some(existing) = self.kind_of(id) {
            warn!(zone_id = id, ?existing, "重复登记的区域，保留首次登记的内容");
            return false;
        }
        group.id = id;
        debug!(zone_id = id, children = group.children.len(), "登记容器区域");
        self.kinds.insert(id, ZoneKind::Group);
        self.groups.insert(id, group);
        true
    }

    pub fn register_bitmap(&mut self, bitmap: Bitmap) -> bool {
        let id = bitmap.id;
        if let Some(existing) = self.kind_of(id) {
            warn!(zone_id = id, ?existing, "重复登记的位图，保留首次登记的内容");
            return false;
        }
        self.kinds.insert(id, ZoneKind::Bitmap);
        self.bitmaps.insert(id, bitmap);
        true
    }

    /// 登记不由本层解析的区域（文本流等），只记录类别。
    pub fn register_zone(&mut self, id: i32, kind: ZoneKind) -> bool {
        if let Some(existing) = self.kind_of(id) {
            warn!(zone_id = id, ?existing, ?kind, "重复登记的区域，保留首次登记的类别");
            return false;
        }
        self.kinds.insert(id, kind);
        true
    }

    /// id 未登记为容器，或容器没有子区域。
    pub fn is_empty_or_missing(&self, id: i32) -> bool {
        self.groups.get(&id).is_none_or(Group::is_empty)
    }

    #[inline]
    pub fn get(&self, id: i32) -> Option<&Group> {
        self.groups.get(&id)
    }

    #[inline]
    pub fn get_mut(&mut self, id: i32) -> Option<&mut Group> {
        self.groups.get_mut(&id)
    }

    #[inline]
    pub fn bitmap(&self, id: i32) -> Option<&Bitmap> {
        self.bitmaps.get(&id)
    }

    /// 按 id 升序遍历容器。
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    pub fn groups_mut(&mut self) -> impl Iterator<Item = &mut Group> {
        self.groups.values_mut()
    }

    pub fn bitmaps(&self) -> impl Iterator<Item = &Bitmap> {
        self.bitmaps.values()
    }

    pub fn group_ids(&self) -> Vec<i32> {
        self.groups.keys().copied().collect()
    }

    #[inline]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// 返回可交给渲染层的子区域下标，按 `ordering` 稳定排序（未设置者在前）。
    ///
    /// 结果缓存在容器上，直到容器被修改（见 [`Group::invalidate`]）。
    pub fn pending_send(&mut self, id: i32) -> Option<&[usize]> {
        if self.groups.get(&id)?.pending_send.is_none() {
            let order = self.compute_pending_send(id)?;
            if let Some(group) = self.groups.get_mut(&id) {
                group.pending_send = Some(order);
            }
        }
        self.groups.get(&id)?.pending_send.as_deref()
    }

    /// 为全部容器计算待发送列表。
    pub fn refresh_pending_send(&mut self) {
        for id in self.group_ids() {
            let _ = self.pending_send(id);
        }
    }

    #[inline]
    pub fn cached_pending_send(&self, id: i32) -> Option<&[usize]> {
        self.groups.get(&id)?.cached_pending_send()
    }

    fn compute_pending_send(&self, id: i32) -> Option<Vec<usize>> {
        let group = self.groups.get(&id)?;
        let mut order: Vec<usize> = group
            .children
            .iter()
            .enumerate()
            .filter(|(_, child)| self.is_sendable(child))
            .map(|(index, _)| index)
            .collect();
        order.sort_by_key(|&index| group.children[index].ordering);
        Some(order)
    }

    fn is_sendable(&self, zone: &Zone) -> bool {
        match &zone.content {
            ZoneContent::Unknown { .. } => false,
            ZoneContent::BitmapRef { bitmap_id } => self.bitmaps.contains_key(bitmap_id),
            ZoneContent::ZoneRef(zone_ref) => match self.kind_of(zone_ref.target_id) {
                Some(ZoneKind::Group) => !self.is_empty_or_missing(zone_ref.target_id),
                Some(ZoneKind::TextFlow) | Some(ZoneKind::Bitmap) => true,
                Some(ZoneKind::Unknown) | None => false,
            },
            ZoneContent::Shape(_) | ZoneContent::Picture { .. } => true,
        }
    }
}

impl ZoneClassifier for ZoneRegistry {
    fn classify(&self, id: i32) -> ZoneKind {
        self.kind_of(id).unwrap_or(ZoneKind::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::zone::Shape;

    fn unit() -> Rect {
        Rect::from_edges(0.0, 0.0, 1.0, 1.0)
    }

    fn rect_zone(ordering: Option<i32>) -> Zone {
        let mut zone = Zone::new(ZoneContent::Shape(Shape::Rect), unit());
        zone.ordering = ordering;
        zone
    }

    #[test]
    fn first_registration_wins() {
        let mut registry = ZoneRegistry::new();
        let first = Group::with_children(0, vec![rect_zone(None)]);
        let second = Group::with_children(0, vec![rect_zone(None), rect_zone(None)]);

        assert!(registry.register_group(4, first));
        assert!(!registry.register_group(4, second));
        let stored = registry.get(4).expect("group registered");
        assert_eq!(stored.id, 4);
        assert_eq!(stored.children.len(), 1);
    }

    #[test]
    fn duplicate_across_kinds_is_rejected() {
        let mut registry = ZoneRegistry::new();
        assert!(registry.register_zone(9, ZoneKind::TextFlow));
        assert!(!registry.register_group(9, Group::new(9)));
        assert!(registry.get(9).is_none());
        assert_eq!(registry.classify(9), ZoneKind::TextFlow);
    }

    #[test]
    fn empty_and_missing_are_equivalent() {
        let mut registry = ZoneRegistry::new();
        assert!(registry.is_empty_or_missing(3));
        registry.register_group(3, Group::new(3));
        assert!(registry.is_empty_or_missing(3));
        registry
            .get_mut(3)
            .expect("group registered")
            .children
            .push(rect_zone(None));
        assert!(!registry.is_empty_or_missing(3));
    }

    #[test]
    fn pending_send_filters_and_orders_children() {
        let mut registry = ZoneRegistry::new();
        registry.register_zone(20, ZoneKind::TextFlow);
        registry.register_group(21, Group::new(21));
        let children = vec![
            rect_zone(Some(5)),
            Zone::zone_ref(20, 0, unit()),
            Zone::new(
                ZoneContent::Unknown {
                    tag: 77,
                    damaged: false,
                },
                unit(),
            ),
            Zone::zone_ref(21, 0, unit()),
            Zone::zone_ref(99, 0, unit()),
            rect_zone(Some(1)),
        ];
        registry.register_group(2, Group::with_children(2, children));

        let order = registry.pending_send(2).expect("group exists").to_vec();
        assert_eq!(order, vec![1, 5, 0]);
        assert_eq!(registry.cached_pending_send(2), Some(&[1, 5, 0][..]));
        assert!(registry.pending_send(404).is_none());
    }

    #[test]
    fn closures_act_as_classifiers() {
        let classifier = |id: i32| {
            if id == 5 {
                ZoneKind::TextFlow
            } else {
                ZoneKind::Unknown
            }
        };
        assert_eq!(classifier.classify(5), ZoneKind::TextFlow);
        assert_eq!(classifier.classify(6), ZoneKind::Unknown);
    }
}
