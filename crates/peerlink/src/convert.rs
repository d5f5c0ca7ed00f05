//! Static conversions between native and managed values
//!
//! [`Bridgeable`] is the two-way converter for one native type. Scalars pass
//! raw in call slots and box when they must be objects (inside containers,
//! behind `Option`). Everything else crosses as a managed object.

use crate::any::AnyValue;
use crate::bridge::Bridge;
use crate::classes;
use crate::error::{BridgeError, BridgeResult};
use crate::options::MarshalOptions;
use crate::refs::{GlobalRef, LocalRef};
use crate::value::{ManagedValue, ObjRef};

// ============================================================================
// Parameter
// ============================================================================

/// A converted call argument or return value.
///
/// Object values carry the local reference that keeps them alive; it is
/// deleted when the parameter is dropped.
#[derive(Debug)]
pub struct Parameter<'b> {
    value: ManagedValue,
    guard: Option<LocalRef<'b>>,
}

impl<'b> Parameter<'b> {
    /// Raw scalar (or void)
    pub fn raw(value: ManagedValue) -> Self {
        Self { value, guard: None }
    }

    /// Object slot owning its local
    pub fn object(local: Option<LocalRef<'b>>) -> Self {
        Self {
            value: ManagedValue::object(local.as_ref().map(LocalRef::obj)),
            guard: local,
        }
    }

    /// Slot value
    #[inline]
    pub fn value(&self) -> ManagedValue {
        self.value
    }

    /// Slot value for returning from a native method. The local is handed
    /// to the managed runtime's native frame instead of being deleted.
    pub fn into_return(self) -> ManagedValue {
        if let Some(guard) = self.guard {
            guard.into_raw();
        }
        self.value
    }
}

// ============================================================================
// Bridgeable
// ============================================================================

/// Two-way converter between a native type and its managed representation
pub trait Bridgeable: Sized {
    /// Values of this type may be held through a supertype, so containers
    /// convert them through [`AnyValue`] instead of the static converter
    const POLYMORPHIC: bool = false;

    /// Convert from a managed object (`None` = null). The reference is borrowed.
    fn from_managed(bridge: &Bridge, obj: Option<ObjRef>, options: MarshalOptions) -> BridgeResult<Self>;

    /// Convert to a managed object (`None` = null)
    fn to_managed<'b>(&self, bridge: &'b Bridge, options: MarshalOptions) -> BridgeResult<Option<LocalRef<'b>>>;

    /// Convert from a call slot. The slot's reference is borrowed.
    fn from_value(bridge: &Bridge, value: ManagedValue, options: MarshalOptions) -> BridgeResult<Self> {
        match value.as_object() {
            Some(obj) => Self::from_managed(bridge, obj, options),
            None => Err(BridgeError::mismatch("object", value.type_name())),
        }
    }

    /// Convert to a call slot
    fn to_parameter<'b>(&self, bridge: &'b Bridge, options: MarshalOptions) -> BridgeResult<Parameter<'b>> {
        Ok(Parameter::object(self.to_managed(bridge, options)?))
    }

    /// Convert from a value already classified at runtime
    fn from_any(value: AnyValue, bridge: &Bridge, options: MarshalOptions) -> BridgeResult<Self> {
        let local = value.to_managed(bridge, options)?;
        Self::from_managed(bridge, local.as_ref().map(LocalRef::obj), options)
    }
}

/// Convert a container element: the static converter for plain types, the
/// runtime-category path for polymorphic ones
pub fn element_from_managed<T: Bridgeable>(
    bridge: &Bridge,
    obj: Option<ObjRef>,
    options: MarshalOptions,
) -> BridgeResult<T> {
    if T::POLYMORPHIC {
        let any = AnyValue::from_managed(bridge, obj, options)?;
        T::from_any(any, bridge, options)
    } else {
        T::from_managed(bridge, obj, options)
    }
}

pub(crate) fn require(obj: Option<ObjRef>, what: &str) -> BridgeResult<ObjRef> {
    obj.ok_or_else(|| BridgeError::InvalidValue(format!("null where `{}` expected", what)))
}

// ============================================================================
// Argument
// ============================================================================

/// Object-safe view of [`Bridgeable`] for argument lists
pub trait Argument {
    /// Convert to a call slot
    fn to_parameter<'b>(&self, bridge: &'b Bridge, options: MarshalOptions) -> BridgeResult<Parameter<'b>>;
}

impl<T: Bridgeable> Argument for T {
    fn to_parameter<'b>(&self, bridge: &'b Bridge, options: MarshalOptions) -> BridgeResult<Parameter<'b>> {
        Bridgeable::to_parameter(self, bridge, options)
    }
}

// ============================================================================
// Scalars
// ============================================================================

macro_rules! bridge_scalar {
    ($ty:ty, $boxed:expr, $make:expr, $extract:ident) => {
        impl Bridgeable for $ty {
            fn from_managed(bridge: &Bridge, obj: Option<ObjRef>, _options: MarshalOptions) -> BridgeResult<Self> {
                let (class, _, getter, sig) = $boxed;
                let obj = require(obj, stringify!($ty))?;
                let value = bridge.call_method_raw(obj, class, getter, sig, &[])?;
                value
                    .$extract()
                    .ok_or_else(|| BridgeError::mismatch(stringify!($ty), value.type_name()))
            }

            fn to_managed<'b>(&self, bridge: &'b Bridge, _options: MarshalOptions) -> BridgeResult<Option<LocalRef<'b>>> {
                let (class, ctor, _, _) = $boxed;
                bridge.new_object_raw(class, ctor, &[$make(*self)]).map(Some)
            }

            fn from_value(bridge: &Bridge, value: ManagedValue, options: MarshalOptions) -> BridgeResult<Self> {
                match value.$extract() {
                    Some(v) => Ok(v),
                    None if value.is_object() => Self::from_managed(bridge, value.as_object().flatten(), options),
                    None => Err(BridgeError::mismatch(stringify!($ty), value.type_name())),
                }
            }

            fn to_parameter<'b>(&self, _bridge: &'b Bridge, _options: MarshalOptions) -> BridgeResult<Parameter<'b>> {
                Ok(Parameter::raw($make(*self)))
            }
        }
    };
}

bridge_scalar!(bool, classes::BOOLEAN, ManagedValue::bool, as_bool);
bridge_scalar!(i8, classes::BYTE, ManagedValue::byte, as_byte);
bridge_scalar!(i16, classes::SHORT, ManagedValue::short, as_short);
bridge_scalar!(i32, classes::INTEGER, ManagedValue::int, as_int);
bridge_scalar!(i64, classes::LONG, ManagedValue::long, as_long);
bridge_scalar!(f32, classes::FLOAT, ManagedValue::float, as_float);
bridge_scalar!(f64, classes::DOUBLE, ManagedValue::double, as_double);

fn char_to_unit(c: char) -> BridgeResult<u16> {
    u16::try_from(c as u32)
        .ok()
        .filter(|u| !(0xD800..=0xDFFF).contains(u))
        .ok_or_else(|| BridgeError::InvalidValue(format!("{:?} is outside the basic multilingual plane", c)))
}

fn unit_to_char(unit: u16) -> BridgeResult<char> {
    char::from_u32(unit as u32)
        .ok_or_else(|| BridgeError::InvalidValue(format!("lone surrogate {:#06x}", unit)))
}

impl Bridgeable for char {
    fn from_managed(bridge: &Bridge, obj: Option<ObjRef>, _options: MarshalOptions) -> BridgeResult<Self> {
        let (class, _, getter, sig) = classes::CHARACTER;
        let obj = require(obj, "char")?;
        let value = bridge.call_method_raw(obj, class, getter, sig, &[])?;
        let unit = value
            .as_char()
            .ok_or_else(|| BridgeError::mismatch("char", value.type_name()))?;
        unit_to_char(unit)
    }

    fn to_managed<'b>(&self, bridge: &'b Bridge, _options: MarshalOptions) -> BridgeResult<Option<LocalRef<'b>>> {
        let (class, ctor, _, _) = classes::CHARACTER;
        let unit = char_to_unit(*self)?;
        bridge.new_object_raw(class, ctor, &[ManagedValue::char(unit)]).map(Some)
    }

    fn from_value(bridge: &Bridge, value: ManagedValue, options: MarshalOptions) -> BridgeResult<Self> {
        match value.as_char() {
            Some(unit) => unit_to_char(unit),
            None if value.is_object() => Self::from_managed(bridge, value.as_object().flatten(), options),
            None => Err(BridgeError::mismatch("char", value.type_name())),
        }
    }

    fn to_parameter<'b>(&self, _bridge: &'b Bridge, _options: MarshalOptions) -> BridgeResult<Parameter<'b>> {
        Ok(Parameter::raw(ManagedValue::char(char_to_unit(*self)?)))
    }
}

// ============================================================================
// Strings, unit, optionals, managed objects
// ============================================================================

impl Bridgeable for String {
    fn from_managed(bridge: &Bridge, obj: Option<ObjRef>, _options: MarshalOptions) -> BridgeResult<Self> {
        bridge.read_string(require(obj, "String")?)
    }

    fn to_managed<'b>(&self, bridge: &'b Bridge, _options: MarshalOptions) -> BridgeResult<Option<LocalRef<'b>>> {
        bridge.new_string(self).map(Some)
    }
}

impl Bridgeable for () {
    fn from_managed(_bridge: &Bridge, _obj: Option<ObjRef>, _options: MarshalOptions) -> BridgeResult<Self> {
        Ok(())
    }

    fn to_managed<'b>(&self, _bridge: &'b Bridge, _options: MarshalOptions) -> BridgeResult<Option<LocalRef<'b>>> {
        Ok(None)
    }

    fn from_value(_bridge: &Bridge, _value: ManagedValue, _options: MarshalOptions) -> BridgeResult<Self> {
        Ok(())
    }

    fn to_parameter<'b>(&self, _bridge: &'b Bridge, _options: MarshalOptions) -> BridgeResult<Parameter<'b>> {
        Ok(Parameter::raw(ManagedValue::void()))
    }
}

impl<T: Bridgeable> Bridgeable for Option<T> {
    fn from_managed(bridge: &Bridge, obj: Option<ObjRef>, options: MarshalOptions) -> BridgeResult<Self> {
        match obj {
            None => Ok(None),
            Some(obj) => element_from_managed(bridge, Some(obj), options).map(Some),
        }
    }

    fn to_managed<'b>(&self, bridge: &'b Bridge, options: MarshalOptions) -> BridgeResult<Option<LocalRef<'b>>> {
        match self {
            None => Ok(None),
            Some(value) => value.to_managed(bridge, options),
        }
    }

    fn from_value(bridge: &Bridge, value: ManagedValue, options: MarshalOptions) -> BridgeResult<Self> {
        if value.is_null() {
            Ok(None)
        } else if value.is_object() {
            Self::from_managed(bridge, value.as_object().flatten(), options)
        } else {
            T::from_value(bridge, value, options).map(Some)
        }
    }

    fn from_any(value: AnyValue, bridge: &Bridge, options: MarshalOptions) -> BridgeResult<Self> {
        match value {
            AnyValue::Null => Ok(None),
            value => T::from_any(value, bridge, options).map(Some),
        }
    }
}

impl<T: Bridgeable> Bridgeable for Box<T> {
    const POLYMORPHIC: bool = T::POLYMORPHIC;

    fn from_managed(bridge: &Bridge, obj: Option<ObjRef>, options: MarshalOptions) -> BridgeResult<Self> {
        T::from_managed(bridge, obj, options).map(Box::new)
    }

    fn to_managed<'b>(&self, bridge: &'b Bridge, options: MarshalOptions) -> BridgeResult<Option<LocalRef<'b>>> {
        (**self).to_managed(bridge, options)
    }

    fn from_value(bridge: &Bridge, value: ManagedValue, options: MarshalOptions) -> BridgeResult<Self> {
        T::from_value(bridge, value, options).map(Box::new)
    }

    fn to_parameter<'b>(&self, bridge: &'b Bridge, options: MarshalOptions) -> BridgeResult<Parameter<'b>> {
        Bridgeable::to_parameter(&**self, bridge, options)
    }

    fn from_any(value: AnyValue, bridge: &Bridge, options: MarshalOptions) -> BridgeResult<Self> {
        T::from_any(value, bridge, options).map(Box::new)
    }
}

impl Bridgeable for GlobalRef {
    fn from_managed(bridge: &Bridge, obj: Option<ObjRef>, _options: MarshalOptions) -> BridgeResult<Self> {
        bridge.global_ref(require(obj, "managed object")?)
    }

    fn to_managed<'b>(&self, bridge: &'b Bridge, _options: MarshalOptions) -> BridgeResult<Option<LocalRef<'b>>> {
        Ok(Some(bridge.local(bridge.env().new_local_ref(self.obj())?)))
    }

    fn from_any(value: AnyValue, bridge: &Bridge, options: MarshalOptions) -> BridgeResult<Self> {
        match value {
            AnyValue::Managed(global) => Ok(global),
            value => {
                let local = value.to_managed(bridge, options)?;
                Self::from_managed(bridge, local.as_ref().map(LocalRef::obj), options)
            }
        }
    }
}
