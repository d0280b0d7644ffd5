use serde::{Deserialize, Serialize};
use std::fmt;

/// First-class types of the module model. Pointers are opaque; address
/// computations carry the element type they step over.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ty {
    I1,
    I8,
    I16,
    I32,
    I64,
    Ptr,
    Array(Box<Ty>, u64),
    Struct(Vec<Ty>),
    Void,
}

impl Ty {
    pub fn int(bits: u32) -> Option<Ty> {
        match bits {
            1 => Some(Ty::I1),
            8 => Some(Ty::I8),
            16 => Some(Ty::I16),
            32 => Some(Ty::I32),
            64 => Some(Ty::I64),
            _ => None,
        }
    }

    pub fn array(element: Ty, len: u64) -> Ty {
        Ty::Array(Box::new(element), len)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Ty::I1 | Ty::I8 | Ty::I16 | Ty::I32 | Ty::I64)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Ty::Ptr)
    }

    /// Integers and pointers: the values SSA promotion can keep in registers.
    pub fn is_scalar(&self) -> bool {
        self.is_integer() || self.is_pointer()
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Ty::Array(..) | Ty::Struct(_))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Ty::Void)
    }

    pub fn int_bits(&self) -> Option<u32> {
        match self {
            Ty::I1 => Some(1),
            Ty::I8 => Some(8),
            Ty::I16 => Some(16),
            Ty::I32 => Some(32),
            Ty::I64 => Some(64),
            _ => None,
        }
    }

    /// Number of direct members of an aggregate.
    pub fn element_count(&self) -> Option<u64> {
        match self {
            Ty::Array(_, len) => Some(*len),
            Ty::Struct(fields) => Some(fields.len() as u64),
            _ => None,
        }
    }

    pub fn element_type(&self, index: u64) -> Option<&Ty> {
        match self {
            Ty::Array(element, len) if index < *len => Some(element),
            Ty::Struct(fields) => fields.get(usize::try_from(index).ok()?),
            _ => None,
        }
    }

    /// Brings an integer constant into the canonical range of this type:
    /// `i1` is stored as 0/1, wider integers sign-extended from their width.
    pub fn normalize(&self, value: i64) -> i64 {
        match self.int_bits() {
            Some(1) => value & 1,
            Some(64) | None => value,
            Some(bits) => {
                let shift = 64 - bits;
                (value << shift) >> shift
            }
        }
    }

    /// Signed range of an integer type.
    pub fn signed_range(&self) -> Option<(i128, i128)> {
        let bits = self.int_bits()?;
        if bits == 1 {
            return Some((0, 1));
        }
        let max = (1i128 << (bits - 1)) - 1;
        Some((-max - 1, max))
    }

    /// Symbol-safe spelling, used for names of generated helpers.
    pub fn mangle(&self) -> String {
        match self {
            Ty::Array(element, len) => format!("a{}.{}", len, element.mangle()),
            Ty::Struct(fields) => {
                let mut name = String::from("s");
                for field in fields {
                    name.push('.');
                    name.push_str(&field.mangle());
                }
                name
            }
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::I1 => write!(f, "i1"),
            Ty::I8 => write!(f, "i8"),
            Ty::I16 => write!(f, "i16"),
            Ty::I32 => write!(f, "i32"),
            Ty::I64 => write!(f, "i64"),
            Ty::Ptr => write!(f, "ptr"),
            Ty::Array(element, len) => write!(f, "[{} x {}]", len, element),
            Ty::Struct(fields) => {
                write!(f, "{{ ")?;
                for (idx, field) in fields.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", field)?;
                }
                write!(f, " }}")
            }
            Ty::Void => write!(f, "void"),
        }
    }
}
