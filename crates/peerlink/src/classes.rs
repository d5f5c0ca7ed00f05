//! Managed class paths and member signatures the bridge relies on
//!
//! A managed runtime hosting the bridge must define these classes with at
//! least the listed members. Signatures use the descriptor syntax of the
//! managed runtime (`I` int, `J` long, `Z` boolean, `Lpath;` object, `[B`
//! byte array, `(args)ret` methods).

// ============================================================================
// vm/lang
// ============================================================================

/// Root class
pub const OBJECT: &str = "vm/lang/Object";
/// String class
pub const STRING: &str = "vm/lang/String";
/// Byte array class
pub const BYTE_ARRAY: &str = "[B";
/// Throwable root
pub const THROWABLE: &str = "vm/lang/Throwable";
/// `Throwable.getMessage()`
pub const THROWABLE_GET_MESSAGE: (&str, &str) = ("getMessage", "()Lvm/lang/String;");
/// Constructor taking a message, on throwable classes
pub const MESSAGE_CTOR: &str = "(Lvm/lang/String;)V";
/// Idiomatic outcome
pub const RESULT: &str = "vm/lang/Result";

/// Boxed scalar classes: (class, constructor signature, unbox method, unbox signature)
pub const BOOLEAN: (&str, &str, &str, &str) = ("vm/lang/Boolean", "(Z)V", "booleanValue", "()Z");
/// Boxed byte
pub const BYTE: (&str, &str, &str, &str) = ("vm/lang/Byte", "(B)V", "byteValue", "()B");
/// Boxed char
pub const CHARACTER: (&str, &str, &str, &str) = ("vm/lang/Character", "(C)V", "charValue", "()C");
/// Boxed short
pub const SHORT: (&str, &str, &str, &str) = ("vm/lang/Short", "(S)V", "shortValue", "()S");
/// Boxed int
pub const INTEGER: (&str, &str, &str, &str) = ("vm/lang/Integer", "(I)V", "intValue", "()I");
/// Boxed long
pub const LONG: (&str, &str, &str, &str) = ("vm/lang/Long", "(J)V", "longValue", "()J");
/// Boxed float
pub const FLOAT: (&str, &str, &str, &str) = ("vm/lang/Float", "(F)V", "floatValue", "()F");
/// Boxed double
pub const DOUBLE: (&str, &str, &str, &str) = ("vm/lang/Double", "(D)V", "doubleValue", "()D");

// ============================================================================
// vm/util, vm/net
// ============================================================================

/// List interface
pub const LIST: &str = "vm/util/List";
/// Eager list implementation
pub const ARRAY_LIST: &str = "vm/util/ArrayList";
/// Map interface
pub const MAP: &str = "vm/util/Map";
/// Eager map implementation
pub const LINKED_HASH_MAP: &str = "vm/util/LinkedHashMap";
/// Set interface
pub const SET: &str = "vm/util/Set";
/// Eager set implementation
pub const LINKED_HASH_SET: &str = "vm/util/LinkedHashSet";
/// Iterator interface
pub const ITERATOR: &str = "vm/util/Iterator";
/// Idiomatic date
pub const DATE: &str = "vm/util/Date";
/// Idiomatic UUID
pub const UUID: &str = "vm/util/UUID";
/// Idiomatic URI
pub const URI: &str = "vm/net/URI";

// ============================================================================
// Bridged wrapper library
// ============================================================================

/// Shared list wrapper, `<init>(Lvm/util/List;ZZ)V` / `kotlin(Z)Lvm/util/List;`
pub const BRIDGED_ARRAY: &str = "bridge/lib/Array";
/// Shared map wrapper
pub const BRIDGED_DICTIONARY: &str = "bridge/lib/Dictionary";
/// Shared set wrapper
pub const BRIDGED_SET: &str = "bridge/lib/Set";
/// Outcome wrapper
pub const BRIDGED_RESULT: &str = "bridge/lib/Result";
/// Byte buffer wrapper
pub const BRIDGED_DATA: &str = "bridge/foundation/Data";
/// Date wrapper
pub const BRIDGED_DATE: &str = "bridge/foundation/Date";
/// UUID wrapper
pub const BRIDGED_UUID: &str = "bridge/foundation/UUID";
/// URL wrapper
pub const BRIDGED_URL: &str = "bridge/foundation/URL";

// ============================================================================
// Bridge support
// ============================================================================

/// Static support queries
pub const BRIDGE_SUPPORT: &str = "bridge/kt/BridgeSupport";
/// `BridgeSupport.typeDiscriminator`
pub const TYPE_DISCRIMINATOR: (&str, &str) = ("typeDiscriminator", "(Lvm/lang/Object;)Lvm/lang/String;");
/// `BridgeSupport.projection`
pub const PROJECTION: (&str, &str) = ("projection", "(Lvm/lang/Object;I)Lbridge/kt/NativeClosure0;");
/// `BridgeSupport.peerOf`
pub const PEER_OF: (&str, &str) = ("peerOf", "(Lvm/lang/Object;)J");

/// Interface of managed objects backed by a native peer
pub const PEER_BRIDGED: &str = "bridge/kt/PeerBridged";
/// Zero-argument native closure
pub const NATIVE_CLOSURE: &str = "bridge/kt/NativeClosure0";
/// Native value with native `hashCode`/`equals`
pub const NATIVE_HASHABLE: &str = "bridge/kt/NativeHashable";
/// Completion callback of asynchronous calls
pub const COMPLETION: &str = "bridge/kt/Completion";
/// Signature of the `Completion` argument appended to asynchronous calls
pub const COMPLETION_ARG: &str = "Lbridge/kt/Completion;";

/// Constructor of every peer-holding class
pub const PEER_CTOR: &str = "(J)V";
/// Finalizer hook on peer-holding classes
pub const RELEASE: (&str, &str) = ("release", "(J)V");
/// Per-class projection hook
pub const PROJECTION_HOOK: (&str, &str) = ("projection", "(I)Lbridge/kt/NativeClosure0;");
