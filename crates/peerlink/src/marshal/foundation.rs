//! Byte buffers, timestamps, identifiers and locators

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::bridge::Bridge;
use crate::classes;
use crate::convert::{require, Bridgeable};
use crate::error::{BridgeError, BridgeResult};
use crate::options::MarshalOptions;
use crate::refs::LocalRef;
use crate::value::{ManagedValue, ObjRef};

const KOTLIN_BYTES: (&str, &str) = ("kotlin", "(Z)[B");
const DATA_CTOR: &str = "([B)V";
const DATE_CTOR: &str = "(J)V";
const DATE_GET_TIME: (&str, &str) = ("getTime", "()J");
const BRIDGED_DATE_CTOR: &str = "(Lvm/util/Date;)V";
const BRIDGED_DATE_INTERVAL: (&str, &str) = ("getTimeIntervalSince1970", "()D");
const UUID_FROM_STRING: (&str, &str) = ("fromString", "(Lvm/lang/String;)Lvm/util/UUID;");
const TO_STRING: (&str, &str) = ("toString", "()Lvm/lang/String;");
const BRIDGED_UUID_CTOR: &str = "(Lvm/lang/String;)V";
const BRIDGED_UUID_STRING: (&str, &str) = ("getUuidString", "()Lvm/lang/String;");
const URI_CTOR: &str = "(Lvm/lang/String;)V";
const BRIDGED_URL_CTOR: &str = "(Lvm/lang/String;Lbridge/foundation/URL;)V";
const BRIDGED_URL_STRING: (&str, &str) = ("getAbsoluteString", "()Lvm/lang/String;");

fn returned_string(bridge: &Bridge, value: ManagedValue, what: &str) -> BridgeResult<String> {
    let local = bridge.adopt(value);
    bridge.read_string(require(local.as_ref().map(LocalRef::obj), what)?)
}

// ============================================================================
// Data
// ============================================================================

/// Byte buffer, copied verbatim in both directions
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Data(pub Vec<u8>);

impl Data {
    /// Wrap bytes
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Data(bytes.into())
    }

    /// The bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Number of bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Data {
    fn from(bytes: Vec<u8>) -> Self {
        Data(bytes)
    }
}

impl From<&[u8]> for Data {
    fn from(bytes: &[u8]) -> Self {
        Data(bytes.to_vec())
    }
}

impl Bridgeable for Data {
    fn from_managed(bridge: &Bridge, obj: Option<ObjRef>, options: MarshalOptions) -> BridgeResult<Self> {
        let Some(obj) = obj else {
            return Ok(Data::default());
        };
        if options.is_compat() {
            return bridge.env().read_byte_array(obj).map(Data);
        }
        let (name, sig) = KOTLIN_BYTES;
        let bytes = bridge.call_method_raw(obj, classes::BRIDGED_DATA, name, sig, &[ManagedValue::bool(true)])?;
        match bridge.adopt(bytes) {
            Some(array) => bridge.env().read_byte_array(array.obj()).map(Data),
            None => Ok(Data::default()),
        }
    }

    fn to_managed<'b>(&self, bridge: &'b Bridge, options: MarshalOptions) -> BridgeResult<Option<LocalRef<'b>>> {
        let array = bridge.local(bridge.env().new_byte_array(&self.0)?);
        if options.is_compat() {
            return Ok(Some(array));
        }
        bridge
            .new_object_raw(classes::BRIDGED_DATA, DATA_CTOR, &[array.value()])
            .map(Some)
    }
}

// ============================================================================
// Timestamp
// ============================================================================

/// Point in time as seconds since the Unix epoch, with fraction.
///
/// The managed side keeps milliseconds; crossing rounds to the nearest one.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct Timestamp(f64);

impl Timestamp {
    /// 1970-01-01T00:00:00Z
    pub const EPOCH: Timestamp = Timestamp(0.0);

    /// From seconds since the epoch
    pub const fn from_secs(secs: f64) -> Self {
        Timestamp(secs)
    }

    /// From milliseconds since the epoch
    pub fn from_millis(millis: i64) -> Self {
        Timestamp(millis as f64 / 1000.0)
    }

    /// Seconds since the epoch
    pub const fn secs(self) -> f64 {
        self.0
    }

    /// Milliseconds since the epoch, rounded
    pub fn as_millis(self) -> i64 {
        (self.0 * 1000.0).round() as i64
    }

    /// Current time
    pub fn now() -> Self {
        Self::from(SystemTime::now())
    }

    /// As a [`SystemTime`]. `None` for a non-finite value or one the
    /// platform clock cannot represent.
    pub fn to_system_time(self) -> Option<SystemTime> {
        if self.0 >= 0.0 {
            UNIX_EPOCH.checked_add(Duration::try_from_secs_f64(self.0).ok()?)
        } else {
            UNIX_EPOCH.checked_sub(Duration::try_from_secs_f64(-self.0).ok()?)
        }
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(after) => Timestamp(after.as_secs_f64()),
            Err(before) => Timestamp(-before.duration().as_secs_f64()),
        }
    }
}

impl Bridgeable for Timestamp {
    fn from_managed(bridge: &Bridge, obj: Option<ObjRef>, options: MarshalOptions) -> BridgeResult<Self> {
        let obj = require(obj, "Timestamp")?;
        if options.is_compat() {
            let (name, sig) = DATE_GET_TIME;
            let value = bridge.call_method_raw(obj, classes::DATE, name, sig, &[])?;
            let millis = value
                .as_long()
                .ok_or_else(|| BridgeError::mismatch("long", value.type_name()))?;
            Ok(Timestamp::from_millis(millis))
        } else {
            let (name, sig) = BRIDGED_DATE_INTERVAL;
            let value = bridge.call_method_raw(obj, classes::BRIDGED_DATE, name, sig, &[])?;
            let secs = value
                .as_double()
                .ok_or_else(|| BridgeError::mismatch("double", value.type_name()))?;
            Ok(Timestamp::from_secs(secs))
        }
    }

    fn to_managed<'b>(&self, bridge: &'b Bridge, options: MarshalOptions) -> BridgeResult<Option<LocalRef<'b>>> {
        let date = bridge.new_object_raw(classes::DATE, DATE_CTOR, &[ManagedValue::long(self.as_millis())])?;
        if options.is_compat() {
            return Ok(Some(date));
        }
        bridge
            .new_object_raw(classes::BRIDGED_DATE, BRIDGED_DATE_CTOR, &[date.value()])
            .map(Some)
    }
}

// ============================================================================
// UUID, URL
// ============================================================================

impl Bridgeable for uuid::Uuid {
    fn from_managed(bridge: &Bridge, obj: Option<ObjRef>, options: MarshalOptions) -> BridgeResult<Self> {
        let obj = require(obj, "Uuid")?;
        let text = if options.is_compat() {
            let (name, sig) = TO_STRING;
            let value = bridge.call_method_raw(obj, classes::UUID, name, sig, &[])?;
            returned_string(bridge, value, "UUID string")?
        } else {
            let (name, sig) = BRIDGED_UUID_STRING;
            let value = bridge.call_method_raw(obj, classes::BRIDGED_UUID, name, sig, &[])?;
            returned_string(bridge, value, "UUID string")?
        };
        uuid::Uuid::parse_str(&text).map_err(|e| BridgeError::InvalidValue(format!("UUID `{}`: {}", text, e)))
    }

    fn to_managed<'b>(&self, bridge: &'b Bridge, options: MarshalOptions) -> BridgeResult<Option<LocalRef<'b>>> {
        let text = bridge.new_string(&self.hyphenated().to_string())?;
        let uuid = if options.is_compat() {
            let (name, sig) = UUID_FROM_STRING;
            let value = bridge.call_static_raw(classes::UUID, name, sig, &[text.value()])?;
            bridge.adopt(value)
        } else {
            Some(bridge.new_object_raw(classes::BRIDGED_UUID, BRIDGED_UUID_CTOR, &[text.value()])?)
        };
        Ok(uuid)
    }
}

impl Bridgeable for url::Url {
    fn from_managed(bridge: &Bridge, obj: Option<ObjRef>, options: MarshalOptions) -> BridgeResult<Self> {
        let obj = require(obj, "Url")?;
        let text = if options.is_compat() {
            let (name, sig) = TO_STRING;
            let value = bridge.call_method_raw(obj, classes::URI, name, sig, &[])?;
            returned_string(bridge, value, "URI string")?
        } else {
            let (name, sig) = BRIDGED_URL_STRING;
            let value = bridge.call_method_raw(obj, classes::BRIDGED_URL, name, sig, &[])?;
            returned_string(bridge, value, "URL string")?
        };
        url::Url::parse(&text).map_err(|e| BridgeError::InvalidValue(format!("URL `{}`: {}", text, e)))
    }

    fn to_managed<'b>(&self, bridge: &'b Bridge, options: MarshalOptions) -> BridgeResult<Option<LocalRef<'b>>> {
        let text = bridge.new_string(self.as_str())?;
        let locator = if options.is_compat() {
            bridge.new_object_raw(classes::URI, URI_CTOR, &[text.value()])?
        } else {
            bridge.new_object_raw(classes::BRIDGED_URL, BRIDGED_URL_CTOR, &[text.value(), ManagedValue::null()])?
        };
        Ok(Some(locator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_round() {
        assert_eq!(Timestamp::from_secs(1.0004).as_millis(), 1000);
        assert_eq!(Timestamp::from_secs(1.0006).as_millis(), 1001);
        assert_eq!(Timestamp::from_secs(-0.0006).as_millis(), -1);
        assert_eq!(Timestamp::from_millis(1500).secs(), 1.5);
        assert_eq!(Timestamp::EPOCH.as_millis(), 0);
    }

    #[test]
    fn test_system_time() {
        let t = Timestamp::from_secs(4_102_444_800.25);
        assert_eq!(Timestamp::from(t.to_system_time().unwrap()).as_millis(), t.as_millis());
        let before = Timestamp::from_secs(-86_400.0);
        assert_eq!(Timestamp::from(before.to_system_time().unwrap()).as_millis(), -86_400_000);
        assert!(Timestamp::now() > Timestamp::EPOCH);
    }

    #[test]
    fn test_unrepresentable_system_time() {
        assert!(Timestamp::from_secs(f64::NAN).to_system_time().is_none());
        assert!(Timestamp::from_secs(f64::INFINITY).to_system_time().is_none());
        assert!(Timestamp::from_secs(f64::NEG_INFINITY).to_system_time().is_none());
        assert!(Timestamp::from_secs(f64::MAX).to_system_time().is_none());
        assert_eq!(Timestamp::EPOCH.to_system_time(), Some(UNIX_EPOCH));
    }

    #[test]
    fn test_data_accessors() {
        let d = Data::from(&b"abc"[..]);
        assert_eq!(d.len(), 3);
        assert_eq!(d.as_bytes(), b"abc");
        assert!(Data::default().is_empty());
    }
}
