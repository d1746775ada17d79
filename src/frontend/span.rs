//! 源位置信息（供 ariadne/DiagSink 使用）

use std::ops::Range;

/// 逻辑文件 ID（与 SourceMap 的下标一一对应）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FileId(pub usize);

impl FileId {
    pub const DUMMY: FileId = FileId(usize::MAX);
}

/// 半开区间 [start, end)，单位为字节偏移
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Span {
    pub file: FileId,
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub const DUMMY: Span = Span { file: FileId::DUMMY, start: 0, end: 0 };

    #[inline]
    pub fn new(file: FileId, start: usize, end: usize) -> Span { Span { file, start, end } }

    #[inline]
    pub fn range(&self) -> Range<usize> { self.start..self.end }

    /// 两个区间是否有交集（空交集视为不重叠）
    #[inline]
    pub fn overlaps(&self, other: &Span) -> bool {
        !(self.end <= other.start || self.start >= other.end)
    }
}
