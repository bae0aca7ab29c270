//! 长度前缀的结构记录（struct record）。
//!
//! 布局：`u32 sz`，随后 `u16 N`、`i16 type`、`u32 保留`、`u16 fSz`、`u16 hSz`，
//! 然后是 `hSz` 字节头部和 `N` 个 `fSz` 字节的条目。合法记录满足
//! `N * fSz + hSz + 12 == sz`。`sz == 0` 为占位记录。

use mdraw_core::zone::ByteRange;
use thiserror::Error;

use crate::reader::Reader;

/// `sz` 中计入的固定字段字节数。
pub const STRUCT_FIXED_SIZE: u32 = 12;
/// 顶层容器记录的类型标记。
pub const CONTAINER_TYPE: i16 = -1;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("记录在偏移 {offset} 处被截断")]
    Truncated { offset: usize },
    #[error("偏移 {offset} 处的记录长度 {declared} 与字段推算值 {expected} 不符")]
    SizeMismatch {
        offset: usize,
        declared: u32,
        expected: u64,
    },
}

impl RecordError {
    pub fn offset(&self) -> usize {
        match self {
            RecordError::Truncated { offset } | RecordError::SizeMismatch { offset, .. } => {
                *offset
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructHeader {
    /// 长度字段所在偏移。
    pub start: usize,
    pub size: u32,
    pub num_entries: u16,
    pub kind: i16,
    pub entry_size: u16,
    pub header_size: u16,
}

impl StructHeader {
    fn placeholder(start: usize) -> Self {
        Self {
            start,
            size: 0,
            num_entries: 0,
            kind: 0,
            entry_size: 0,
            header_size: 0,
        }
    }

    #[inline]
    pub fn is_placeholder(&self) -> bool {
        self.size == 0
    }

    #[inline]
    pub fn is_container(&self) -> bool {
        self.kind == CONTAINER_TYPE
    }

    /// 记录之后的第一个字节。
    #[inline]
    pub fn end(&self) -> usize {
        self.start + 4 + self.size as usize
    }

    #[inline]
    pub fn header_start(&self) -> usize {
        self.start + 4 + STRUCT_FIXED_SIZE as usize
    }

    #[inline]
    pub fn entries_start(&self) -> usize {
        self.header_start() + usize::from(self.header_size)
    }

    #[inline]
    pub fn entry_offset(&self, index: usize) -> usize {
        self.entries_start() + index * usize::from(self.entry_size)
    }

    /// 固定字段之后的头部与条目；占位记录为空区间。
    pub fn data_range(&self) -> ByteRange {
        if self.is_placeholder() {
            ByteRange::new(self.start + 4, self.start + 4)
        } else {
            ByteRange::new(self.header_start(), self.end())
        }
    }
}

/// 读取一条结构记录。
///
/// 无论成功与否，游标都停在记录声明的末尾；声明末尾越出输入时停在输入末尾并返回截断错误。
pub fn read_struct(reader: &mut Reader<'_>) -> Result<StructHeader, RecordError> {
    let start = reader.tell();
    let Some(size) = reader.read_u32() else {
        reader.jump_to_end();
        return Err(RecordError::Truncated { offset: start });
    };
    let end = start
        .checked_add(4)
        .and_then(|pos| pos.checked_add(size as usize))
        .filter(|&end| reader.check_position(end));
    let Some(end) = end else {
        reader.jump_to_end();
        return Err(RecordError::Truncated { offset: start });
    };
    if size == 0 {
        return Ok(StructHeader::placeholder(start));
    }
    if size < STRUCT_FIXED_SIZE {
        reader.seek(end);
        return Err(RecordError::SizeMismatch {
            offset: start,
            declared: size,
            expected: u64::from(STRUCT_FIXED_SIZE),
        });
    }

    let fields = (|| {
        let num_entries = reader.read_u16()?;
        let kind = reader.read_i16()?;
        let _reserved = reader.read_u32()?;
        let entry_size = reader.read_u16()?;
        let header_size = reader.read_u16()?;
        Some((num_entries, kind, entry_size, header_size))
    })();
    reader.seek(end);
    let Some((num_entries, kind, entry_size, header_size)) = fields else {
        return Err(RecordError::Truncated { offset: start });
    };

    let expected = u64::from(STRUCT_FIXED_SIZE)
        + u64::from(header_size)
        + u64::from(num_entries) * u64::from(entry_size);
    if expected != u64::from(size) {
        return Err(RecordError::SizeMismatch {
            offset: start,
            declared: size,
            expected,
        });
    }
    Ok(StructHeader {
        start,
        size,
        num_entries,
        kind,
        entry_size,
        header_size,
    })
}
