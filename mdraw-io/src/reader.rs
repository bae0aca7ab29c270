//! 大端字节读取器，读取越界时返回 `None` 而不移动游标。

use std::f64::consts::PI;

#[derive(Clone, Debug)]
pub struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    #[inline]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// 截断到 `end` 的子读取器，游标位置保持不变。
    pub fn bounded(&self, end: usize) -> Reader<'a> {
        let end = end.min(self.data.len());
        Reader {
            data: &self.data[..end],
            offset: self.offset.min(end),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn at_end(&self) -> bool {
        self.offset >= self.data.len()
    }

    #[inline]
    pub fn tell(&self) -> usize {
        self.offset
    }

    /// 位置是否落在数据范围内（允许等于末尾）。
    #[inline]
    pub fn check_position(&self, pos: usize) -> bool {
        pos <= self.data.len()
    }

    /// 移动到 `pos`；越界时移动到末尾并返回 `false`。
    pub fn seek(&mut self, pos: usize) -> bool {
        if self.check_position(pos) {
            self.offset = pos;
            true
        } else {
            self.jump_to_end();
            false
        }
    }

    #[inline]
    pub fn jump_to_end(&mut self) {
        self.offset = self.data.len();
    }

    #[inline]
    pub fn read_bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        let bytes = self.data.get(self.offset..self.offset.checked_add(len)?)?;
        self.offset += len;
        Some(bytes)
    }

    #[inline]
    pub fn read_u8(&mut self) -> Option<u8> {
        let byte = *self.data.get(self.offset)?;
        self.offset += 1;
        Some(byte)
    }

    #[inline]
    pub fn read_u16(&mut self) -> Option<u16> {
        let bytes = self.read_bytes(2)?;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    #[inline]
    pub fn read_i16(&mut self) -> Option<i16> {
        self.read_u16().map(|value| value as i16)
    }

    #[inline]
    pub fn read_u32(&mut self) -> Option<u32> {
        let bytes = self.read_bytes(4)?;
        Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    #[inline]
    pub fn read_i32(&mut self) -> Option<i32> {
        self.read_u32().map(|value| value as i32)
    }

    /// 1/256 定点数（坐标）。
    #[inline]
    pub fn read_fixed(&mut self) -> Option<f64> {
        self.read_i32().map(|value| f64::from(value) / 256.0)
    }

    /// 1/65536 定点数。
    #[inline]
    pub fn read_fixed16(&mut self) -> Option<f64> {
        self.read_i32().map(|value| f64::from(value) / 65536.0)
    }

    /// 1/65536 弧度的定点角度，换算为度。
    #[inline]
    pub fn read_angle(&mut self) -> Option<f64> {
        self.read_fixed16().map(|radians| radians * 180.0 / PI)
    }
}
