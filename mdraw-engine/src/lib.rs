pub mod walk;

pub mod errors {
    use thiserror::Error;

    #[derive(Debug, Error, PartialEq)]
    pub enum EngineError {
        #[error("invalid page size {width}x{height}")]
        InvalidPageSize { width: f64, height: f64 },
        #[error("horizontal page count must be at least 1, got {0}")]
        InvalidHorizontalPages(u32),
        #[error("invalid projection tolerance {0}")]
        InvalidTolerance(f64),
    }
}

pub mod pipeline {
    use std::collections::BTreeSet;

    use mdraw_core::projection::{GeometryProjector, ProjectionParams, ProjectionSummary};
    use mdraw_core::registry::ZoneRegistry;
    use mdraw_core::resolve::{ResolutionContext, ResolveReport, resolve};
    use mdraw_core::zone::{ROOT_ZONE_ID, Transform, TransformTable};
    use tracing::{debug, info};

    use crate::errors::EngineError;

    /// 解析与投影所需的文档级设置。
    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    pub struct LayoutSettings {
        pub projection: ProjectionParams,
        pub library_mode: bool,
    }

    impl LayoutSettings {
        /// 校验投影参数，非法值在进入投影之前拒绝。
        pub fn validate(&self) -> Result<(), EngineError> {
            let params = &self.projection;
            let valid_len = |len: f64| len.is_finite() && len > 0.0;
            if !valid_len(params.page_width) || !valid_len(params.page_height) {
                return Err(EngineError::InvalidPageSize {
                    width: params.page_width,
                    height: params.page_height,
                });
            }
            if params.horizontal_pages == 0 {
                return Err(EngineError::InvalidHorizontalPages(params.horizontal_pages));
            }
            for tolerance in [params.snap_tolerance, params.shift_tolerance] {
                if !tolerance.is_finite() || tolerance < 0.0 {
                    return Err(EngineError::InvalidTolerance(tolerance));
                }
            }
            Ok(())
        }
    }

    /// 引擎层持有解码后的区域图，按固定顺序执行链接、裁剪与投影。
    #[derive(Debug)]
    pub struct ResolvedDocument {
        registry: ZoneRegistry,
        transforms: TransformTable,
        settings: LayoutSettings,
        report: Option<ResolveReport>,
        projection: Option<ProjectionSummary>,
    }

    impl ResolvedDocument {
        pub fn new(
            registry: ZoneRegistry,
            transforms: TransformTable,
            settings: LayoutSettings,
        ) -> Self {
            Self {
                registry,
                transforms,
                settings,
                report: None,
                projection: None,
            }
        }

        /// 链接帧并裁剪空容器；重复调用直接返回首次结果。
        pub fn resolve(&mut self) -> &ResolveReport {
            let report = self.report.get_or_insert_with(|| {
                let mut ctx = ResolutionContext::new(self.settings.library_mode);
                let report = resolve(&mut self.registry, &mut ctx);
                info!(
                    chains = report.chains,
                    removed = report.prune.removed_refs,
                    "区域图解析完成"
                );
                report
            });
            &*report
        }

        #[inline]
        pub fn is_resolved(&self) -> bool {
            self.report.is_some()
        }

        /// 投影全部容器。尚未解析时先执行解析。
        pub fn project(&mut self) -> Result<ProjectionSummary, EngineError> {
            self.settings.validate()?;
            self.resolve();
            let projector = GeometryProjector::new(self.settings.projection);
            let summary = projector.project_all(&mut self.registry);
            debug!(
                groups = summary.groups,
                placed = summary.placed,
                unplaced = summary.unplaced,
                "投影完成"
            );
            self.projection = Some(summary);
            Ok(summary)
        }

        /// 更换投影参数，之后需要重新调用 [`Self::project`]。
        pub fn set_projection(&mut self, params: ProjectionParams) {
            self.settings.projection = params;
            self.projection = None;
        }

        /// 没有被其他容器引用、且仍有子区域的容器 id，升序。
        ///
        /// 库模式下正文区域即使为空也保留。
        pub fn roots(&self) -> Vec<i32> {
            let referenced: BTreeSet<i32> = self
                .registry
                .groups()
                .flat_map(|group| {
                    group
                        .children
                        .iter()
                        .filter_map(|child| child.as_zone_ref())
                        .map(|zone_ref| zone_ref.target_id)
                        .filter(move |&target| target != group.id)
                })
                .collect();
            let keep_root = self.settings.library_mode;
            self.registry
                .group_ids()
                .into_iter()
                .filter(|id| !referenced.contains(id))
                .filter(|&id| {
                    !self.registry.is_empty_or_missing(id) || (keep_root && id == ROOT_ZONE_ID)
                })
                .collect()
        }

        #[inline]
        pub fn registry(&self) -> &ZoneRegistry {
            &self.registry
        }

        #[inline]
        pub fn registry_mut(&mut self) -> &mut ZoneRegistry {
            &mut self.registry
        }

        #[inline]
        pub fn transforms(&self) -> &TransformTable {
            &self.transforms
        }

        pub fn transform(&self, index: usize) -> Option<&Transform> {
            self.transforms.get(index)
        }

        #[inline]
        pub fn settings(&self) -> &LayoutSettings {
            &self.settings
        }

        #[inline]
        pub fn report(&self) -> Option<&ResolveReport> {
            self.report.as_ref()
        }

        #[inline]
        pub fn projection(&self) -> Option<&ProjectionSummary> {
            self.projection.as_ref()
        }
    }

}
