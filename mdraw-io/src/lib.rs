pub mod document;
pub mod group;
pub mod reader;
pub mod record;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use mdraw_core::style::StandardTables;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use document::{DecodeOptions, DecodedDocument, DocumentDecoder, DocumentInfo, decode_document};
pub use group::GroupDecoder;
pub use reader::Reader;
pub use record::{RecordError, StructHeader, read_struct};

#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
}

/// 解码过程中发现、但不中断解码的问题。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    SizeMismatch,
    Truncated,
    UnknownZoneKind(u8),
    UnknownShapeTag(u8),
    DuplicateZone,
    NotAContainer,
    /// 容器因损坏过多而整体丢弃。
    GroupAborted,
    DuplicateTransformTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub offset: usize,
    pub zone_id: Option<i32>,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn new(offset: usize, zone_id: Option<i32>, kind: DiagnosticKind) -> Self {
        Self {
            offset,
            zone_id,
            kind,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            DiagnosticKind::SizeMismatch => "记录长度不一致".to_string(),
            DiagnosticKind::Truncated => "记录被截断".to_string(),
            DiagnosticKind::UnknownZoneKind(kind) => format!("未知的区域类别 {kind}"),
            DiagnosticKind::UnknownShapeTag(tag) => format!("未知的图形类型 {tag}"),
            DiagnosticKind::DuplicateZone => "重复的区域 id".to_string(),
            DiagnosticKind::NotAContainer => "顶层记录不是容器结构".to_string(),
            DiagnosticKind::GroupAborted => "容器解码中止".to_string(),
            DiagnosticKind::DuplicateTransformTable => "重复的变换表".to_string(),
        };
        match self.zone_id {
            Some(id) => write!(f, "偏移 {}（区域 {id}）: {what}", self.offset),
            None => write!(f, "偏移 {}: {what}", self.offset),
        }
    }
}

/// 已读入内存的文件与其解码结果；结果中的字节区间指向 `data`。
#[derive(Debug)]
pub struct LoadedFile {
    pub path: PathBuf,
    pub data: Vec<u8>,
    pub document: DecodedDocument,
}

impl LoadedFile {
    /// 取出字节区间对应的原始数据。
    pub fn bytes(&self, range: mdraw_core::zone::ByteRange) -> Option<&[u8]> {
        self.data.get(range.start..range.end)
    }
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<LoadedFile, IoError>;
}

pub struct DrawFacade {
    tables: StandardTables,
    options: DecodeOptions,
}

impl DrawFacade {
    pub fn new() -> Self {
        Self::with_options(DecodeOptions::default())
    }

    pub fn with_options(options: DecodeOptions) -> Self {
        Self {
            tables: StandardTables,
            options,
        }
    }
}

impl Default for DrawFacade {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentLoader for DrawFacade {
    fn load(&self, path: &Path) -> Result<LoadedFile, IoError> {
        let data = fs::read(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        if data.is_empty() {
            return Err(IoError::InvalidDocument(format!("{:?} 是空文件", path)));
        }
        let document = decode_document(&data, &self.tables, self.options);
        if document.zones_read == 0 {
            return Err(IoError::InvalidDocument(format!(
                "{:?} 中没有可识别的区域",
                path
            )));
        }
        Ok(LoadedFile {
            path: path.to_path_buf(),
            data,
            document,
        })
    }
}
