//! Values classified at runtime
//!
//! [`AnyValue`] is what crosses when no static converter applies: the
//! element type of heterogeneous containers and the payload of polymorphic
//! slots. Conversion from the managed side asks `BridgeSupport` for the
//! object's projection first, then its type discriminator, and dispatches
//! to the [`Codec`] registered for that category. Categories without a
//! codec fail closed with [`BridgeError::Unclassifiable`].

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use dashmap::DashMap;

use crate::boxes::HashableBox;
use crate::bridge::Bridge;
use crate::category::TypeCategory;
use crate::classes;
use crate::convert::Bridgeable;
use crate::error::{BridgeError, BridgeResult, ThrownError};
use crate::handle::NativeObject;
use crate::marshal::{Data, Timestamp};
use crate::options::MarshalOptions;
use crate::refs::{GlobalRef, LocalRef};
use crate::value::{ManagedValue, ObjRef};

// ============================================================================
// AnyValue
// ============================================================================

/// A value whose shape is only known at runtime
#[derive(Debug, Clone)]
pub enum AnyValue {
    /// Managed null
    Null,
    /// Boolean
    Bool(bool),
    /// 8-bit integer
    Byte(i8),
    /// UTF-16 code unit
    Char(u16),
    /// 16-bit integer
    Short(i16),
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// 32-bit float
    Float(f32),
    /// 64-bit float
    Double(f64),
    /// String
    String(String),
    /// Byte buffer
    Data(Data),
    /// Point in time
    Date(Timestamp),
    /// Ordered sequence
    List(Vec<AnyValue>),
    /// Associative mapping
    Map(HashMap<AnyValue, AnyValue>),
    /// Set
    Set(HashSet<AnyValue>),
    /// Success or translated failure
    Outcome(Result<Box<AnyValue>, ThrownError>),
    /// Identifier
    Uuid(uuid::Uuid),
    /// Locator
    Url(url::Url),
    /// Native object exposed through a peer wrapper
    Peer(NativeObject),
    /// Managed object kept as is
    Managed(GlobalRef),
}

impl AnyValue {
    /// Whether this is [`AnyValue::Null`]
    pub fn is_null(&self) -> bool {
        matches!(self, AnyValue::Null)
    }

    /// String contents, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnyValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer value of any integral variant that fits in `i64`
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            AnyValue::Byte(v) => Some(v as i64),
            AnyValue::Short(v) => Some(v as i64),
            AnyValue::Int(v) => Some(v as i64),
            AnyValue::Long(v) => Some(v),
            AnyValue::Char(v) => Some(v as i64),
            _ => None,
        }
    }

    /// Elements, if this is a list
    pub fn as_list(&self) -> Option<&[AnyValue]> {
        match self {
            AnyValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Native peer downcast to `T`
    pub fn as_peer<T: std::any::Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            AnyValue::Peer(obj) => obj.clone().downcast::<T>().ok(),
            _ => None,
        }
    }

    /// Category this value converts through under `options`. `None` for
    /// null, peers and managed objects, which need no codec.
    pub fn category(&self, options: MarshalOptions) -> Option<TypeCategory> {
        let eager = options.is_compat();
        let pick = |idiomatic: TypeCategory| {
            if eager {
                idiomatic
            } else {
                idiomatic.counterpart()
            }
        };
        Some(match self {
            AnyValue::Null | AnyValue::Peer(_) | AnyValue::Managed(_) => return None,
            AnyValue::Bool(_) => TypeCategory::Boolean,
            AnyValue::Byte(_) => TypeCategory::Byte,
            AnyValue::Char(_) => TypeCategory::Char,
            AnyValue::Short(_) => TypeCategory::Short,
            AnyValue::Int(_) => TypeCategory::Int,
            AnyValue::Long(_) => TypeCategory::Long,
            AnyValue::Float(_) => TypeCategory::Float,
            AnyValue::Double(_) => TypeCategory::Double,
            AnyValue::String(_) => TypeCategory::String,
            AnyValue::Data(_) => pick(TypeCategory::ByteArray),
            AnyValue::Date(_) => pick(TypeCategory::Date),
            AnyValue::List(_) => pick(TypeCategory::List),
            AnyValue::Map(_) => pick(TypeCategory::Map),
            AnyValue::Set(_) => pick(TypeCategory::Set),
            AnyValue::Outcome(_) => pick(TypeCategory::Result),
            AnyValue::Uuid(_) => pick(TypeCategory::Uuid),
            AnyValue::Url(_) => pick(TypeCategory::Uri),
        })
    }

    fn variant_name(&self) -> &'static str {
        match self {
            AnyValue::Null => "null",
            AnyValue::Bool(_) => "bool",
            AnyValue::Byte(_) => "byte",
            AnyValue::Char(_) => "char",
            AnyValue::Short(_) => "short",
            AnyValue::Int(_) => "int",
            AnyValue::Long(_) => "long",
            AnyValue::Float(_) => "float",
            AnyValue::Double(_) => "double",
            AnyValue::String(_) => "string",
            AnyValue::Data(_) => "data",
            AnyValue::Date(_) => "date",
            AnyValue::List(_) => "list",
            AnyValue::Map(_) => "map",
            AnyValue::Set(_) => "set",
            AnyValue::Outcome(_) => "outcome",
            AnyValue::Uuid(_) => "uuid",
            AnyValue::Url(_) => "url",
            AnyValue::Peer(_) => "peer",
            AnyValue::Managed(_) => "managed",
        }
    }

    /// Classify a managed object. `fallback` is consulted for objects of
    /// category `other` that are not peer-bridged; without it such objects
    /// are [`BridgeError::Unclassifiable`].
    pub fn from_managed_with(
        bridge: &Bridge,
        obj: Option<ObjRef>,
        options: MarshalOptions,
        fallback: Option<&dyn Fn(&Bridge, ObjRef) -> BridgeResult<AnyValue>>,
    ) -> BridgeResult<AnyValue> {
        let Some(obj) = obj else {
            return Ok(AnyValue::Null);
        };

        let (name, sig) = classes::PROJECTION;
        let projection = bridge.call_static_raw(
            classes::BRIDGE_SUPPORT,
            name,
            sig,
            &[ManagedValue::object(Some(obj)), ManagedValue::int(options.to_managed_int())],
        )?;
        if let Some(closure) = bridge.adopt(projection) {
            return bridge.closure_of(closure.obj())?.call();
        }

        let (name, sig) = classes::TYPE_DISCRIMINATOR;
        let discriminator = bridge.call_static_raw(classes::BRIDGE_SUPPORT, name, sig, &[ManagedValue::object(Some(obj))])?;
        let category = match bridge.adopt(discriminator) {
            Some(s) => TypeCategory::from_discriminator(&bridge.read_string(s.obj())?),
            None => TypeCategory::Other,
        };

        if category != TypeCategory::Other {
            return match bridge.codecs().get(category) {
                Some(codec) => (codec.decode)(bridge, obj, options),
                None => {
                    tracing::warn!(%category, "no codec registered");
                    Err(BridgeError::Unclassifiable {
                        class_name: bridge.class_name_of(obj)?,
                    })
                }
            };
        }

        if let Some(peer) = bridge.try_peer_of(obj)? {
            return Ok(AnyValue::Peer(peer));
        }
        match fallback {
            Some(fallback) => fallback(bridge, obj),
            None => Err(BridgeError::Unclassifiable {
                class_name: bridge.class_name_of(obj)?,
            }),
        }
    }
}

/// Fallback that keeps unclassifiable managed objects as [`AnyValue::Managed`]
pub fn keep_managed(bridge: &Bridge, obj: ObjRef) -> BridgeResult<AnyValue> {
    Ok(AnyValue::Managed(bridge.global_ref(obj)?))
}

impl Bridgeable for AnyValue {
    const POLYMORPHIC: bool = true;

    fn from_managed(bridge: &Bridge, obj: Option<ObjRef>, options: MarshalOptions) -> BridgeResult<Self> {
        AnyValue::from_managed_with(bridge, obj, options, None)
    }

    fn to_managed<'b>(&self, bridge: &'b Bridge, options: MarshalOptions) -> BridgeResult<Option<LocalRef<'b>>> {
        match self {
            AnyValue::Null => Ok(None),
            AnyValue::Peer(obj) => bridge.wrap_peer(obj).map(Some),
            AnyValue::Managed(global) => Ok(Some(bridge.local(bridge.env().new_local_ref(global.obj())?))),
            value => {
                let category = value
                    .category(options)
                    .ok_or_else(|| BridgeError::mismatch("classified value", value.variant_name()))?;
                match bridge.codecs().get(category) {
                    Some(codec) => (codec.encode)(value, bridge, options),
                    None => Err(BridgeError::Unclassifiable {
                        class_name: format!("native {}", category),
                    }),
                }
            }
        }
    }

    fn from_value(bridge: &Bridge, value: ManagedValue, options: MarshalOptions) -> BridgeResult<Self> {
        if let Some(obj) = value.as_object() {
            return Self::from_managed(bridge, obj, options);
        }
        if let Some(v) = value.as_bool() {
            Ok(AnyValue::Bool(v))
        } else if let Some(v) = value.as_byte() {
            Ok(AnyValue::Byte(v))
        } else if let Some(v) = value.as_char() {
            Ok(AnyValue::Char(v))
        } else if let Some(v) = value.as_short() {
            Ok(AnyValue::Short(v))
        } else if let Some(v) = value.as_int() {
            Ok(AnyValue::Int(v))
        } else if let Some(v) = value.as_long() {
            Ok(AnyValue::Long(v))
        } else if let Some(v) = value.as_float() {
            Ok(AnyValue::Float(v))
        } else if let Some(v) = value.as_double() {
            Ok(AnyValue::Double(v))
        } else {
            Ok(AnyValue::Null)
        }
    }

    fn from_any(value: AnyValue, _bridge: &Bridge, _options: MarshalOptions) -> BridgeResult<Self> {
        Ok(value)
    }
}

// ============================================================================
// Equality and hashing
// ============================================================================

fn peer_addr(obj: &NativeObject) -> *const () {
    Arc::as_ptr(obj) as *const ()
}

fn unordered_hash<T: Hash>(items: impl Iterator<Item = T>) -> u64 {
    items
        .map(|item| {
            let mut hasher = DefaultHasher::new();
            item.hash(&mut hasher);
            hasher.finish()
        })
        .fold(0u64, |acc, h| acc ^ h)
}

impl PartialEq for AnyValue {
    fn eq(&self, other: &Self) -> bool {
        use AnyValue::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Byte(a), Byte(b)) => a == b,
            (Char(a), Char(b)) => a == b,
            (Short(a), Short(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Long(a), Long(b)) => a == b,
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Double(a), Double(b)) => a.to_bits() == b.to_bits(),
            (String(a), String(b)) => a == b,
            (Data(a), Data(b)) => a == b,
            (Date(a), Date(b)) => a.secs().to_bits() == b.secs().to_bits(),
            (List(a), List(b)) => a == b,
            (Map(a), Map(b)) => a == b,
            (Set(a), Set(b)) => a == b,
            (Outcome(a), Outcome(b)) => a == b,
            (Uuid(a), Uuid(b)) => a == b,
            (Url(a), Url(b)) => a == b,
            (Peer(a), Peer(b)) => match (a.downcast_ref::<HashableBox>(), b.downcast_ref::<HashableBox>()) {
                (Some(x), Some(y)) => x == y,
                _ => peer_addr(a) == peer_addr(b),
            },
            (Managed(a), Managed(b)) => a.same_object(b),
            _ => false,
        }
    }
}

impl Eq for AnyValue {}

impl Hash for AnyValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            AnyValue::Null => {}
            AnyValue::Bool(v) => v.hash(state),
            AnyValue::Byte(v) => v.hash(state),
            AnyValue::Char(v) => v.hash(state),
            AnyValue::Short(v) => v.hash(state),
            AnyValue::Int(v) => v.hash(state),
            AnyValue::Long(v) => v.hash(state),
            AnyValue::Float(v) => v.to_bits().hash(state),
            AnyValue::Double(v) => v.to_bits().hash(state),
            AnyValue::String(v) => v.hash(state),
            AnyValue::Data(v) => v.hash(state),
            AnyValue::Date(v) => v.secs().to_bits().hash(state),
            AnyValue::List(v) => v.hash(state),
            AnyValue::Map(v) => unordered_hash(v.iter()).hash(state),
            AnyValue::Set(v) => unordered_hash(v.iter()).hash(state),
            AnyValue::Outcome(Ok(v)) => v.hash(state),
            AnyValue::Outcome(Err(e)) => e.message().hash(state),
            AnyValue::Uuid(v) => v.hash(state),
            AnyValue::Url(v) => v.hash(state),
            AnyValue::Peer(obj) => match obj.downcast_ref::<HashableBox>() {
                Some(boxed) => boxed.hash(state),
                None => peer_addr(obj).hash(state),
            },
            // identity is only known to the managed runtime
            AnyValue::Managed(_) => {}
        }
    }
}

// ============================================================================
// Conversions
// ============================================================================

macro_rules! any_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for AnyValue {
                fn from(v: $ty) -> Self {
                    AnyValue::$variant(v)
                }
            }
        )*
    };
}

any_from! {
    bool => Bool,
    i8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    String => String,
    Data => Data,
    Timestamp => Date,
    Vec<AnyValue> => List,
    HashMap<AnyValue, AnyValue> => Map,
    HashSet<AnyValue> => Set,
    uuid::Uuid => Uuid,
    url::Url => Url,
    GlobalRef => Managed,
}

impl From<&str> for AnyValue {
    fn from(v: &str) -> Self {
        AnyValue::String(v.to_string())
    }
}

impl From<Result<AnyValue, ThrownError>> for AnyValue {
    fn from(v: Result<AnyValue, ThrownError>) -> Self {
        AnyValue::Outcome(v.map(Box::new))
    }
}

impl<T: Into<AnyValue>> From<Option<T>> for AnyValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(AnyValue::Null, Into::into)
    }
}

// ============================================================================
// Codecs
// ============================================================================

/// Decode a managed object of one category
pub type DecodeFn = fn(&Bridge, ObjRef, MarshalOptions) -> BridgeResult<AnyValue>;
/// Encode a value of one category
pub type EncodeFn = for<'b> fn(&AnyValue, &'b Bridge, MarshalOptions) -> BridgeResult<Option<LocalRef<'b>>>;

/// Conversion pair for one category
#[derive(Clone, Copy)]
pub struct Codec {
    /// Managed → native
    pub decode: DecodeFn,
    /// Native → managed
    pub encode: EncodeFn,
}

/// Category-keyed codec table
pub struct CodecTable {
    codecs: DashMap<TypeCategory, Codec>,
}

impl CodecTable {
    /// Table with no codecs
    pub fn empty() -> Self {
        Self { codecs: DashMap::new() }
    }

    /// Table with the built-in codec for every category except `other`
    pub fn with_defaults() -> Self {
        let table = Self::empty();
        for (category, codec) in default_codecs() {
            table.register(category, codec);
        }
        table
    }

    /// Install or replace the codec of `category`
    pub fn register(&self, category: TypeCategory, codec: Codec) -> Option<Codec> {
        self.codecs.insert(category, codec)
    }

    /// Remove the codec of `category`
    pub fn unregister(&self, category: TypeCategory) -> Option<Codec> {
        self.codecs.remove(&category).map(|(_, codec)| codec)
    }

    /// Codec of `category`
    pub fn get(&self, category: TypeCategory) -> Option<Codec> {
        self.codecs.get(&category).map(|codec| *codec)
    }

    /// Number of registered categories
    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    /// Whether no codec is registered
    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}

impl Default for CodecTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for CodecTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut categories: Vec<&str> = self.codecs.iter().map(|e| e.key().as_str()).collect();
        categories.sort_unstable();
        f.debug_struct("CodecTable").field("categories", &categories).finish()
    }
}

/// Native types stored in one [`AnyValue`] variant
trait Variant: Bridgeable {
    fn wrap(self) -> AnyValue;
    fn view(value: &AnyValue) -> Option<&Self>;
}

macro_rules! variant {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Variant for $ty {
                fn wrap(self) -> AnyValue {
                    AnyValue::$variant(self)
                }

                fn view(value: &AnyValue) -> Option<&Self> {
                    match value {
                        AnyValue::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

variant! {
    bool => Bool,
    i8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    String => String,
    Data => Data,
    Timestamp => Date,
    Vec<AnyValue> => List,
    HashMap<AnyValue, AnyValue> => Map,
    HashSet<AnyValue> => Set,
    Result<Box<AnyValue>, ThrownError> => Outcome,
    uuid::Uuid => Uuid,
    url::Url => Url,
}

const AS_GIVEN: u8 = 0;
const EAGER: u8 = 1;
const SHARED: u8 = 2;

fn mode<const M: u8>(options: MarshalOptions) -> MarshalOptions {
    match M {
        EAGER => options.with_compat(true),
        SHARED => options.with_compat(false),
        _ => options,
    }
}

fn decode<T: Variant, const M: u8>(bridge: &Bridge, obj: ObjRef, options: MarshalOptions) -> BridgeResult<AnyValue> {
    T::from_managed(bridge, Some(obj), mode::<M>(options)).map(Variant::wrap)
}

fn encode<'b, T: Variant, const M: u8>(
    value: &AnyValue,
    bridge: &'b Bridge,
    options: MarshalOptions,
) -> BridgeResult<Option<LocalRef<'b>>> {
    match T::view(value) {
        Some(v) => v.to_managed(bridge, mode::<M>(options)),
        None => Err(BridgeError::mismatch(std::any::type_name::<T>(), value.variant_name())),
    }
}

fn decode_char(bridge: &Bridge, obj: ObjRef, _options: MarshalOptions) -> BridgeResult<AnyValue> {
    let (class, _, getter, sig) = classes::CHARACTER;
    let value = bridge.call_method_raw(obj, class, getter, sig, &[])?;
    value
        .as_char()
        .map(AnyValue::Char)
        .ok_or_else(|| BridgeError::mismatch("char", value.type_name()))
}

fn encode_char<'b>(value: &AnyValue, bridge: &'b Bridge, _options: MarshalOptions) -> BridgeResult<Option<LocalRef<'b>>> {
    let AnyValue::Char(unit) = value else {
        return Err(BridgeError::mismatch("char", value.variant_name()));
    };
    let (class, ctor, _, _) = classes::CHARACTER;
    bridge.new_object_raw(class, ctor, &[ManagedValue::char(*unit)]).map(Some)
}

fn codec<T: Variant, const M: u8>() -> Codec {
    Codec {
        decode: decode::<T, M>,
        encode: encode::<T, M>,
    }
}

fn default_codecs() -> Vec<(TypeCategory, Codec)> {
    use TypeCategory as C;
    vec![
        (C::Boolean, codec::<bool, AS_GIVEN>()),
        (C::Byte, codec::<i8, AS_GIVEN>()),
        (
            C::Char,
            Codec {
                decode: decode_char,
                encode: encode_char,
            },
        ),
        (C::Short, codec::<i16, AS_GIVEN>()),
        (C::Int, codec::<i32, AS_GIVEN>()),
        (C::Long, codec::<i64, AS_GIVEN>()),
        (C::Float, codec::<f32, AS_GIVEN>()),
        (C::Double, codec::<f64, AS_GIVEN>()),
        (C::String, codec::<String, AS_GIVEN>()),
        (C::ByteArray, codec::<Data, EAGER>()),
        (C::BridgedData, codec::<Data, SHARED>()),
        (C::Date, codec::<Timestamp, EAGER>()),
        (C::BridgedDate, codec::<Timestamp, SHARED>()),
        (C::List, codec::<Vec<AnyValue>, EAGER>()),
        (C::BridgedList, codec::<Vec<AnyValue>, SHARED>()),
        (C::Map, codec::<HashMap<AnyValue, AnyValue>, EAGER>()),
        (C::BridgedMap, codec::<HashMap<AnyValue, AnyValue>, SHARED>()),
        (C::Set, codec::<HashSet<AnyValue>, EAGER>()),
        (C::BridgedSet, codec::<HashSet<AnyValue>, SHARED>()),
        (C::Result, codec::<Result<Box<AnyValue>, ThrownError>, EAGER>()),
        (C::BridgedResult, codec::<Result<Box<AnyValue>, ThrownError>, SHARED>()),
        (C::Uuid, codec::<uuid::Uuid, EAGER>()),
        (C::BridgedUuid, codec::<uuid::Uuid, SHARED>()),
        (C::Uri, codec::<url::Url, EAGER>()),
        (C::BridgedUri, codec::<url::Url, SHARED>()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_of(v: &AnyValue) -> u64 {
        let mut h = DefaultHasher::new();
        v.hash(&mut h);
        h.finish()
    }

    #[test]
    fn test_defaults_cover_every_category_but_other() {
        let table = CodecTable::with_defaults();
        assert_eq!(table.len(), TypeCategory::ALL.len() - 1);
        for category in TypeCategory::ALL {
            assert_eq!(table.get(category).is_some(), category != TypeCategory::Other, "{}", category);
        }
    }

    #[test]
    fn test_register_and_unregister() {
        let table = CodecTable::empty();
        assert!(table.is_empty());
        assert!(table.register(TypeCategory::Char, codec::<i32, AS_GIVEN>()).is_none());
        assert!(table.get(TypeCategory::Char).is_some());
        assert!(table.unregister(TypeCategory::Char).is_some());
        assert!(table.get(TypeCategory::Char).is_none());
    }

    #[test]
    fn test_category_follows_options() {
        let list = AnyValue::List(vec![AnyValue::Int(1)]);
        assert_eq!(list.category(MarshalOptions::KOTLINCOMPAT), Some(TypeCategory::List));
        assert_eq!(list.category(MarshalOptions::empty()), Some(TypeCategory::BridgedList));
        assert_eq!(AnyValue::Int(3).category(MarshalOptions::empty()), Some(TypeCategory::Int));
        assert_eq!(
            AnyValue::from(Timestamp::EPOCH).category(MarshalOptions::empty()),
            Some(TypeCategory::BridgedDate)
        );
        assert_eq!(AnyValue::Null.category(MarshalOptions::KOTLINCOMPAT), None);
    }

    #[test]
    fn test_float_equality_by_bits() {
        assert_eq!(AnyValue::Double(f64::NAN), AnyValue::Double(f64::NAN));
        assert_ne!(AnyValue::Double(0.0), AnyValue::Double(-0.0));
        assert_ne!(AnyValue::Int(1), AnyValue::Long(1));
    }

    #[test]
    fn test_map_hash_is_order_independent() {
        let mut a = HashMap::new();
        let mut b = HashMap::new();
        for i in 0..16 {
            a.insert(AnyValue::Int(i), AnyValue::from(format!("v{}", i)));
        }
        for i in (0..16).rev() {
            b.insert(AnyValue::Int(i), AnyValue::from(format!("v{}", i)));
        }
        let (a, b) = (AnyValue::Map(a), AnyValue::Map(b));
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_peer_identity() {
        let obj: NativeObject = Arc::new(5u32);
        let same = AnyValue::Peer(obj.clone());
        assert_eq!(same, AnyValue::Peer(obj));
        assert_ne!(same, AnyValue::Peer(Arc::new(5u32)));
        assert_eq!(same.as_peer::<u32>().map(|v| *v), Some(5));
        assert!(same.as_peer::<u8>().is_none());
    }

    #[test]
    fn test_hashable_peers_compare_by_value() {
        let a: NativeObject = Arc::new(HashableBox::new("key".to_string()));
        let b: NativeObject = Arc::new(HashableBox::new("key".to_string()));
        let (a, b) = (AnyValue::Peer(a), AnyValue::Peer(b));
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(AnyValue::from("x").as_str(), Some("x"));
        assert_eq!(AnyValue::from(None::<i32>), AnyValue::Null);
        assert_eq!(AnyValue::from(Some(7i64)).as_i64(), Some(7));
        let outcome = AnyValue::from(Err::<AnyValue, _>(ThrownError::new("boom")));
        assert!(matches!(outcome, AnyValue::Outcome(Err(ref e)) if e.message() == Some("boom")));
    }
}
