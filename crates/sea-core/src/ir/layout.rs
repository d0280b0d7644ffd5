use std::collections::BTreeMap;

use thiserror::Error;

use super::Ty;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid data layout `{layout}`: {reason}")]
pub struct LayoutError {
    pub layout: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct StructLayout {
    pub size: u64,
    pub align: u64,
    pub field_offsets: Vec<u64>,
}

/// Target data layout: sizes and alignments used by aggregate decomposition
/// and bounds instrumentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    pub big_endian: bool,
    /// Pointer size in bytes.
    pub pointer_size: u64,
    pub pointer_align: u64,
    /// ABI alignment in bytes, keyed by integer bit width.
    pub int_align: BTreeMap<u32, u64>,
    /// Natural stack alignment in bytes, if specified.
    pub stack_align: Option<u64>,
}

impl Default for DataLayout {
    fn default() -> Self {
        let int_align = [(1, 1), (8, 1), (16, 2), (32, 4), (64, 8)]
            .into_iter()
            .collect();
        Self {
            big_endian: false,
            pointer_size: 8,
            pointer_align: 8,
            int_align,
            stack_align: None,
        }
    }
}

impl DataLayout {
    /// Parses an LLVM-style layout string such as `e-p:64:64-i64:64-S128`.
    /// Specifications that do not affect sizes or alignment are ignored.
    pub fn parse(layout: &str) -> Result<Self, LayoutError> {
        let mut parsed = Self::default();
        let fail = |reason: String| LayoutError {
            layout: layout.to_string(),
            reason,
        };
        for spec in layout.split('-').filter(|spec| !spec.is_empty()) {
            if !spec.is_char_boundary(1) {
                return Err(fail(format!("unknown specification `{}`", spec)));
            }
            let (kind, rest) = spec.split_at(1);
            match kind {
                "e" if rest.is_empty() => parsed.big_endian = false,
                "E" if rest.is_empty() => parsed.big_endian = true,
                "p" => {
                    let fields = numeric_fields(rest.trim_start_matches(|c: char| c.is_ascii_digit()))
                        .map_err(|reason| fail(format!("`{}`: {}", spec, reason)))?;
                    let Some(size) = fields.first() else {
                        return Err(fail(format!("`{}`: missing pointer size", spec)));
                    };
                    parsed.pointer_size = bits_to_bytes(*size)
                        .ok_or_else(|| fail(format!("`{}`: size is not a byte multiple", spec)))?;
                    parsed.pointer_align = fields
                        .get(1)
                        .and_then(|abi| bits_to_bytes(*abi))
                        .unwrap_or(parsed.pointer_size);
                }
                "i" => {
                    let mut parts = rest.splitn(2, ':');
                    let width = parts
                        .next()
                        .and_then(|width| width.parse::<u32>().ok())
                        .ok_or_else(|| fail(format!("`{}`: bad integer width", spec)))?;
                    let fields = numeric_fields(&format!(":{}", parts.next().unwrap_or("")))
                        .map_err(|reason| fail(format!("`{}`: {}", spec, reason)))?;
                    let abi = fields
                        .first()
                        .and_then(|abi| bits_to_bytes(*abi))
                        .ok_or_else(|| fail(format!("`{}`: bad alignment", spec)))?;
                    parsed.int_align.insert(width, abi);
                }
                "S" => {
                    let bits = rest
                        .parse::<u64>()
                        .map_err(|_| fail(format!("`{}`: bad stack alignment", spec)))?;
                    parsed.stack_align = bits_to_bytes(bits);
                }
                "m" | "n" | "a" | "f" | "v" | "A" | "P" | "G" | "F" => {}
                _ => return Err(fail(format!("unknown specification `{}`", spec))),
            }
        }
        Ok(parsed)
    }

    pub fn size_of(&self, ty: &Ty) -> u64 {
        match ty {
            Ty::I1 | Ty::I8 => 1,
            Ty::I16 => 2,
            Ty::I32 => 4,
            Ty::I64 => 8,
            Ty::Ptr => self.pointer_size,
            Ty::Array(element, len) => self.alloc_size_of(element).saturating_mul(*len),
            Ty::Struct(_) => self
                .struct_layout(ty)
                .map(|layout| layout.size)
                .unwrap_or(0),
            Ty::Void => 0,
        }
    }

    /// Size including trailing padding, i.e. the stride between consecutive
    /// elements of this type.
    pub fn alloc_size_of(&self, ty: &Ty) -> u64 {
        align_to(self.size_of(ty), self.align_of(ty))
    }

    pub fn align_of(&self, ty: &Ty) -> u64 {
        match ty {
            Ty::Ptr => self.pointer_align,
            Ty::Array(element, _) => self.align_of(element),
            Ty::Struct(_) => self
                .struct_layout(ty)
                .map(|layout| layout.align)
                .unwrap_or(1),
            Ty::Void => 1,
            integer => {
                let bits = integer.int_bits().unwrap_or(8);
                self.int_align
                    .get(&bits)
                    .copied()
                    .unwrap_or_else(|| u64::from(bits.div_ceil(8)).max(1))
            }
        }
    }

    pub fn struct_layout(&self, ty: &Ty) -> Option<StructLayout> {
        let Ty::Struct(fields) = ty else {
            return None;
        };
        let mut offsets = Vec::with_capacity(fields.len());
        let mut offset = 0u64;
        let mut max_align = 1u64;
        for field in fields {
            let field_align = self.align_of(field);
            max_align = max_align.max(field_align);
            offset = align_to(offset, field_align);
            offsets.push(offset);
            offset = offset.saturating_add(self.size_of(field));
        }
        Some(StructLayout {
            size: align_to(offset, max_align),
            align: max_align,
            field_offsets: offsets,
        })
    }

    /// Byte offset of member `index` inside an aggregate.
    pub fn member_offset(&self, ty: &Ty, index: u64) -> Option<u64> {
        match ty {
            Ty::Array(element, len) if index < *len => {
                Some(self.alloc_size_of(element).saturating_mul(index))
            }
            Ty::Struct(_) => self
                .struct_layout(ty)?
                .field_offsets
                .get(usize::try_from(index).ok()?)
                .copied(),
            _ => None,
        }
    }
}

fn numeric_fields(rest: &str) -> Result<Vec<u64>, String> {
    rest.split(':')
        .filter(|field| !field.is_empty())
        .map(|field| {
            field
                .parse::<u64>()
                .map_err(|_| format!("`{}` is not a number", field))
        })
        .collect()
}

fn bits_to_bytes(bits: u64) -> Option<u64> {
    (bits % 8 == 0).then_some(bits / 8)
}

fn align_to(value: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        return value;
    }
    let rem = value % alignment;
    if rem == 0 {
        value
    } else {
        value + (alignment - rem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_x86_layout() {
        let layout = DataLayout::parse("e-m:e-p:32:32-i64:64-n8:16:32-S128").unwrap();
        assert!(!layout.big_endian);
        assert_eq!(layout.pointer_size, 4);
        assert_eq!(layout.align_of(&Ty::I64), 8);
        assert_eq!(layout.stack_align, Some(16));
    }

    #[test]
    fn struct_fields_are_padded() {
        let layout = DataLayout::default();
        let ty = Ty::Struct(vec![Ty::I8, Ty::I32, Ty::I8]);
        let struct_layout = layout.struct_layout(&ty).unwrap();
        assert_eq!(struct_layout.field_offsets, vec![0, 4, 8]);
        assert_eq!(layout.size_of(&ty), 12);
        assert_eq!(layout.member_offset(&Ty::array(ty, 3), 2), Some(24));
    }

    #[test]
    fn rejects_unknown_specs() {
        let err = DataLayout::parse("e-q:12").unwrap_err();
        assert!(err.reason.contains("unknown specification"));
    }
}
