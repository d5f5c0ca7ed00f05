//! Success-or-failure outcomes

use crate::bridge::Bridge;
use crate::classes;
use crate::convert::{element_from_managed, require, Bridgeable};
use crate::error::{BridgeResult, ThrownError};
use crate::options::MarshalOptions;
use crate::refs::{object_value, LocalRef};
use crate::value::{ManagedValue, ObjRef};

const KOTLIN_RESULT: (&str, &str) = ("kotlin", "(Z)Lvm/lang/Result;");
const BRIDGED_RESULT_CTOR: &str = "(Lvm/lang/Result;)V";
const SUCCESS: (&str, &str) = ("success", "(Lvm/lang/Object;)Lvm/lang/Result;");
const FAILURE: (&str, &str) = ("failure", "(Lvm/lang/Throwable;)Lvm/lang/Result;");
const EXCEPTION_OR_NULL: (&str, &str) = ("exceptionOrNull", "()Lvm/lang/Throwable;");
const GET_OR_NULL: (&str, &str) = ("getOrNull", "()Lvm/lang/Object;");

impl<T: Bridgeable> Bridgeable for Result<T, ThrownError> {
    fn from_managed(bridge: &Bridge, obj: Option<ObjRef>, options: MarshalOptions) -> BridgeResult<Self> {
        let obj = require(obj, "Result")?;
        let result = if options.is_compat() {
            bridge.local(bridge.env().new_local_ref(obj)?)
        } else {
            let (name, sig) = KOTLIN_RESULT;
            let value = bridge.call_method_raw(obj, classes::BRIDGED_RESULT, name, sig, &[ManagedValue::bool(true)])?;
            bridge.local(require(value.as_object().flatten(), "vm/lang/Result")?)
        };

        let (name, sig) = EXCEPTION_OR_NULL;
        let failure = bridge.call_method_raw(result.obj(), classes::RESULT, name, sig, &[])?;
        if let Some(throwable) = bridge.adopt(failure) {
            return Ok(Err(bridge.thrown_from(&throwable)?));
        }

        let (name, sig) = GET_OR_NULL;
        let success = bridge.call_method_raw(result.obj(), classes::RESULT, name, sig, &[])?;
        let success = bridge.adopt(success);
        element_from_managed::<T>(bridge, success.as_ref().map(LocalRef::obj), options).map(Ok)
    }

    fn to_managed<'b>(&self, bridge: &'b Bridge, options: MarshalOptions) -> BridgeResult<Option<LocalRef<'b>>> {
        let value = match self {
            Ok(success) => {
                let payload = success.to_managed(bridge, options)?;
                let (name, sig) = SUCCESS;
                bridge.call_static_raw(classes::RESULT, name, sig, &[object_value(payload.as_ref())])?
            }
            Err(failure) => {
                let throwable = bridge.throwable_for(failure)?;
                let (name, sig) = FAILURE;
                bridge.call_static_raw(classes::RESULT, name, sig, &[throwable.value()])?
            }
        };
        let result = bridge.local(require(value.as_object().flatten(), "vm/lang/Result")?);
        if options.is_compat() {
            return Ok(Some(result));
        }
        bridge
            .new_object_raw(classes::BRIDGED_RESULT, BRIDGED_RESULT_CTOR, &[result.value()])
            .map(Some)
    }
}
