use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use mdraw_config::AppConfig;
use mdraw_core::projection::ProjectionParams;
use mdraw_core::zone::ByteRange;
use mdraw_engine::pipeline::{LayoutSettings, ResolvedDocument};
use mdraw_io::{DecodeOptions, Diagnostic, DocumentInfo, DocumentLoader, DrawFacade, LoadedFile};
use tracing::{info, warn};

use crate::errors::FrontendError;

/// 解码、解析并投影后的文档与解码期元信息。
#[derive(Debug)]
pub struct LoadedDocument {
    pub path: PathBuf,
    pub data: Vec<u8>,
    pub document: ResolvedDocument,
    pub info: Option<DocumentInfo>,
    pub text_flows: BTreeMap<i32, ByteRange>,
    pub diagnostics: Vec<Diagnostic>,
    pub zones_read: usize,
}

/// 由配置与文档自带的页面设置得到布局参数；文档中的合法值优先。
pub fn layout_settings(config: &AppConfig, info: Option<&DocumentInfo>) -> LayoutSettings {
    let layout = &config.layout;
    let mut projection = ProjectionParams::new(
        layout.page_width,
        layout.page_height,
        layout.horizontal_pages,
    );
    projection.snap_tolerance = config.projection.snap_tolerance;
    projection.shift_tolerance = config.projection.shift_tolerance;
    let mut library_mode = layout.library_mode;

    if let Some(info) = info {
        if info.page_width > 0.0 && info.page_height > 0.0 {
            projection.page_width = info.page_width;
            projection.page_height = info.page_height;
        } else {
            warn!(
                width = info.page_width,
                height = info.page_height,
                "文档页面尺寸无效，沿用配置值"
            );
        }
        if info.horizontal_pages > 0 {
            projection.horizontal_pages = u32::from(info.horizontal_pages);
        }
        library_mode |= info.library_mode;
    }

    LayoutSettings {
        projection,
        library_mode,
    }
}

/// 读取文件并完成解析与投影。
pub fn load_document(path: &Path, config: &AppConfig) -> Result<LoadedDocument, FrontendError> {
    let loader = DrawFacade::with_options(DecodeOptions {
        max_recoverable_errors: config.decode.max_recoverable_errors,
    });
    let LoadedFile {
        path,
        data,
        document: decoded,
    } = loader.load(path)?;
    info!(
        path = %path.display(),
        zones = decoded.zones_read,
        diagnostics = decoded.diagnostics.len(),
        "文档解码完成"
    );

    let settings = layout_settings(config, decoded.info.as_ref());
    let mut document = ResolvedDocument::new(decoded.registry, decoded.transforms, settings);
    document.project()?;

    Ok(LoadedDocument {
        path,
        data,
        document,
        info: decoded.info,
        text_flows: decoded.text_flows,
        diagnostics: decoded.diagnostics,
        zones_read: decoded.zones_read,
    })
}
