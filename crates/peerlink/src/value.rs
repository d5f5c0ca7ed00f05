//! Tagged 64-bit values passed across the call boundary
//!
//! Mirrors the managed runtime's calling convention: one tag byte naming the
//! slot kind plus a 64-bit payload. Primitives are stored inline, objects
//! are stored as raw `ObjRef` bits (zero = null).
//!
//! ```text
//! tag  kind     payload
//! 0    void     0
//! 1    boolean  0 | 1
//! 2    byte     i8 sign-extended
//! 3    char     u16 code unit
//! 4    short    i16 sign-extended
//! 5    int      i32 sign-extended
//! 6    long     i64
//! 7    float    f32 bits
//! 8    double   f64 bits
//! 9    object   ObjRef bits, 0 = null
//! ```

use std::fmt;
use std::num::NonZeroU64;

const TAG_VOID: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_BYTE: u8 = 2;
const TAG_CHAR: u8 = 3;
const TAG_SHORT: u8 = 4;
const TAG_INT: u8 = 5;
const TAG_LONG: u8 = 6;
const TAG_FLOAT: u8 = 7;
const TAG_DOUBLE: u8 = 8;
const TAG_OBJECT: u8 = 9;

/// Bit set on every global reference.
const GLOBAL_BIT: u64 = 1 << 63;

// ============================================================================
// Managed references and identifiers
// ============================================================================

/// Opaque reference to a managed-runtime object.
///
/// A reference is either *local* (valid until deleted, or until the native
/// frame that received it returns) or *global* (valid until explicitly
/// deleted). The managed collector owns the referent; holding an `ObjRef`
/// only keeps the referent reachable while the reference itself is live.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ObjRef(NonZeroU64);

impl ObjRef {
    /// Build from raw bits. Zero (null) yields `None`.
    #[inline]
    pub const fn from_raw(bits: u64) -> Option<Self> {
        match NonZeroU64::new(bits) {
            Some(bits) => Some(Self(bits)),
            None => None,
        }
    }

    /// Build a local reference from a slot id.
    #[inline]
    pub fn local(id: u64) -> Option<Self> {
        Self::from_raw(id & !GLOBAL_BIT)
    }

    /// Build a global reference from a slot id.
    #[inline]
    pub fn global(id: u64) -> Option<Self> {
        Self::from_raw(id | GLOBAL_BIT)
    }

    /// Raw bits of the reference.
    #[inline]
    pub const fn as_raw(self) -> u64 {
        self.0.get()
    }

    /// Slot id without the global bit.
    #[inline]
    pub const fn id(self) -> u64 {
        self.0.get() & !GLOBAL_BIT
    }

    /// Whether this is a global reference.
    #[inline]
    pub const fn is_global(self) -> bool {
        self.0.get() & GLOBAL_BIT != 0
    }
}

impl fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_global() {
            write!(f, "ObjRef::Global({})", self.id())
        } else {
            write!(f, "ObjRef::Local({})", self.id())
        }
    }
}

/// Managed class identity. Classes are never unloaded, so a `ClassRef`
/// stays valid for the lifetime of the managed runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ClassRef(pub u32);

/// Identifier of a constructor, instance method, or static method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct MethodId(pub u64);

/// Identifier of an instance or static field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct FieldId(pub u64);

// ============================================================================
// ManagedValue
// ============================================================================

/// Argument / return slot of a cross-runtime call.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ManagedValue {
    tag: u8,
    data: u64,
}

impl ManagedValue {
    /// The `void` return value
    #[inline]
    pub const fn void() -> Self {
        Self { tag: TAG_VOID, data: 0 }
    }

    /// A null object reference
    #[inline]
    pub const fn null() -> Self {
        Self { tag: TAG_OBJECT, data: 0 }
    }

    /// Create a boolean value
    #[inline]
    pub const fn bool(b: bool) -> Self {
        Self { tag: TAG_BOOL, data: b as u64 }
    }

    /// Create a byte value
    #[inline]
    pub const fn byte(b: i8) -> Self {
        Self { tag: TAG_BYTE, data: b as i64 as u64 }
    }

    /// Create a UTF-16 code unit value
    #[inline]
    pub const fn char(c: u16) -> Self {
        Self { tag: TAG_CHAR, data: c as u64 }
    }

    /// Create a short value
    #[inline]
    pub const fn short(s: i16) -> Self {
        Self { tag: TAG_SHORT, data: s as i64 as u64 }
    }

    /// Create an int value
    #[inline]
    pub const fn int(i: i32) -> Self {
        Self { tag: TAG_INT, data: i as i64 as u64 }
    }

    /// Create a long value
    #[inline]
    pub const fn long(l: i64) -> Self {
        Self { tag: TAG_LONG, data: l as u64 }
    }

    /// Create a float value
    #[inline]
    pub fn float(f: f32) -> Self {
        Self { tag: TAG_FLOAT, data: f.to_bits() as u64 }
    }

    /// Create a double value
    #[inline]
    pub fn double(d: f64) -> Self {
        Self { tag: TAG_DOUBLE, data: d.to_bits() }
    }

    /// Create an object value (`None` = null)
    #[inline]
    pub fn object(obj: Option<ObjRef>) -> Self {
        Self { tag: TAG_OBJECT, data: obj.map_or(0, ObjRef::as_raw) }
    }

    // ========================================================================
    // Type checks
    // ========================================================================

    /// Check if this is the void marker
    #[inline]
    pub const fn is_void(&self) -> bool {
        self.tag == TAG_VOID
    }

    /// Check if this is an object slot (null included)
    #[inline]
    pub const fn is_object(&self) -> bool {
        self.tag == TAG_OBJECT
    }

    /// Check if this is a null object
    #[inline]
    pub const fn is_null(&self) -> bool {
        self.tag == TAG_OBJECT && self.data == 0
    }

    // ========================================================================
    // Extractors
    // ========================================================================

    /// Extract boolean value
    #[inline]
    pub const fn as_bool(&self) -> Option<bool> {
        if self.tag == TAG_BOOL {
            Some(self.data != 0)
        } else {
            None
        }
    }

    /// Extract byte value
    #[inline]
    pub const fn as_byte(&self) -> Option<i8> {
        if self.tag == TAG_BYTE {
            Some(self.data as i8)
        } else {
            None
        }
    }

    /// Extract UTF-16 code unit
    #[inline]
    pub const fn as_char(&self) -> Option<u16> {
        if self.tag == TAG_CHAR {
            Some(self.data as u16)
        } else {
            None
        }
    }

    /// Extract short value
    #[inline]
    pub const fn as_short(&self) -> Option<i16> {
        if self.tag == TAG_SHORT {
            Some(self.data as i16)
        } else {
            None
        }
    }

    /// Extract int value
    #[inline]
    pub const fn as_int(&self) -> Option<i32> {
        if self.tag == TAG_INT {
            Some(self.data as i32)
        } else {
            None
        }
    }

    /// Extract long value
    #[inline]
    pub const fn as_long(&self) -> Option<i64> {
        if self.tag == TAG_LONG {
            Some(self.data as i64)
        } else {
            None
        }
    }

    /// Extract float value
    #[inline]
    pub fn as_float(&self) -> Option<f32> {
        if self.tag == TAG_FLOAT {
            Some(f32::from_bits(self.data as u32))
        } else {
            None
        }
    }

    /// Extract double value
    #[inline]
    pub fn as_double(&self) -> Option<f64> {
        if self.tag == TAG_DOUBLE {
            Some(f64::from_bits(self.data))
        } else {
            None
        }
    }

    /// Extract an object slot. The outer `Option` is `None` when the slot
    /// is not an object; the inner one is `None` for null.
    #[inline]
    pub const fn as_object(&self) -> Option<Option<ObjRef>> {
        if self.tag == TAG_OBJECT {
            Some(ObjRef::from_raw(self.data))
        } else {
            None
        }
    }

    /// Get raw tag byte
    #[inline]
    pub const fn tag(&self) -> u8 {
        self.tag
    }

    /// Get type name for diagnostics
    pub const fn type_name(&self) -> &'static str {
        match self.tag {
            TAG_VOID => "void",
            TAG_BOOL => "boolean",
            TAG_BYTE => "byte",
            TAG_CHAR => "char",
            TAG_SHORT => "short",
            TAG_INT => "int",
            TAG_LONG => "long",
            TAG_FLOAT => "float",
            TAG_DOUBLE => "double",
            TAG_OBJECT => "object",
            _ => "unknown",
        }
    }
}

impl Default for ManagedValue {
    fn default() -> Self {
        Self::void()
    }
}

impl fmt::Debug for ManagedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tag {
            TAG_VOID => write!(f, "ManagedValue::Void"),
            TAG_BOOL => write!(f, "ManagedValue::Bool({})", self.data != 0),
            TAG_BYTE => write!(f, "ManagedValue::Byte({})", self.data as i8),
            TAG_CHAR => write!(f, "ManagedValue::Char({:#06x})", self.data as u16),
            TAG_SHORT => write!(f, "ManagedValue::Short({})", self.data as i16),
            TAG_INT => write!(f, "ManagedValue::Int({})", self.data as i32),
            TAG_LONG => write!(f, "ManagedValue::Long({})", self.data as i64),
            TAG_FLOAT => write!(f, "ManagedValue::Float({})", f32::from_bits(self.data as u32)),
            TAG_DOUBLE => write!(f, "ManagedValue::Double({})", f64::from_bits(self.data)),
            TAG_OBJECT => match ObjRef::from_raw(self.data) {
                Some(obj) => write!(f, "ManagedValue::Object({:?})", obj),
                None => write!(f, "ManagedValue::Null"),
            },
            _ => write!(f, "ManagedValue::Unknown({}, {:#x})", self.tag, self.data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_and_void() {
        assert!(ManagedValue::null().is_null());
        assert!(ManagedValue::null().is_object());
        assert!(ManagedValue::void().is_void());
        assert!(!ManagedValue::void().is_null());
        assert_eq!(ManagedValue::null().as_object(), Some(None));
    }

    #[test]
    fn test_integer_extremes() {
        assert_eq!(ManagedValue::byte(i8::MIN).as_byte(), Some(i8::MIN));
        assert_eq!(ManagedValue::short(i16::MIN).as_short(), Some(i16::MIN));
        assert_eq!(ManagedValue::int(i32::MIN).as_int(), Some(i32::MIN));
        assert_eq!(ManagedValue::long(i64::MAX).as_long(), Some(i64::MAX));
        assert_eq!(ManagedValue::long(i64::MIN).as_long(), Some(i64::MIN));
    }

    #[test]
    fn test_float_bits_preserved() {
        let f = ManagedValue::float(-0.0);
        assert_eq!(f.as_float().map(f32::to_bits), Some((-0.0f32).to_bits()));
        let d = ManagedValue::double(f64::MAX);
        assert_eq!(d.as_double(), Some(f64::MAX));
    }

    #[test]
    fn test_tags_do_not_cross() {
        let i = ManagedValue::int(1);
        assert_eq!(i.as_long(), None);
        assert_eq!(i.as_bool(), None);
        assert_eq!(i.as_object(), None);
        assert_eq!(i.type_name(), "int");
    }

    #[test]
    fn test_obj_ref_flavours() {
        let local = ObjRef::local(7).unwrap();
        let global = ObjRef::global(7).unwrap();
        assert!(!local.is_global());
        assert!(global.is_global());
        assert_eq!(local.id(), global.id());
        assert_ne!(local, global);
        assert!(ObjRef::from_raw(0).is_none());

        let v = ManagedValue::object(Some(global));
        assert_eq!(v.as_object(), Some(Some(global)));
    }

    #[test]
    fn test_debug_format() {
        let s = format!("{:?}", ManagedValue::int(42));
        assert!(s.contains("42"));
        assert_eq!(format!("{:?}", ManagedValue::null()), "ManagedValue::Null");
    }
}
