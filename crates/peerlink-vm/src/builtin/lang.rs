//! `vm/lang`: root class, strings, boxes, throwables and `Result`

use peerlink::classes as names;

use super::{
    ERROR, EXCEPTION, ILLEGAL_ARGUMENT_EXCEPTION, ILLEGAL_STATE_EXCEPTION, INDEX_OUT_OF_BOUNDS_EXCEPTION,
    NULL_POINTER_EXCEPTION, RUNTIME_EXCEPTION,
};
use crate::object::Payload;
use crate::types::{ClassDef, FINALIZE};
use crate::value::Value;
use crate::vm::Vm;
use crate::VmResult;

const EQUALS: (&str, &str) = ("equals", "(Lvm/lang/Object;)Z");
const HASH_CODE: (&str, &str) = ("hashCode", "()I");
const TO_STRING: (&str, &str) = ("toString", "()Lvm/lang/String;");

fn string_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32))
}

fn object(vm: &Vm) -> VmResult<()> {
    vm.define_class(
        ClassDef::new(names::OBJECT)
            .constructor("()V", |_, _| Ok(Value::Void))
            .method(EQUALS.0, EQUALS.1, |_, inv| Ok(Value::Bool(inv.this.is_some() && inv.this == inv.object(0)?)))
            .method(HASH_CODE.0, HASH_CODE.1, |_, inv| Ok(Value::Int(inv.this()?.0 as i32)))
            .method(TO_STRING.0, TO_STRING.1, |vm, inv| {
                let this = inv.this()?;
                let text = format!("{}@{:x}", vm.class_name_of(this)?, this.0);
                Ok(Value::object(vm.alloc_string(&text)?))
            })
            .method(FINALIZE.0, FINALIZE.1, |_, _| Ok(Value::Void)),
    )?;
    Ok(())
}

fn string(vm: &Vm) -> VmResult<()> {
    vm.define_class(
        ClassDef::new(names::STRING)
            .method(EQUALS.0, EQUALS.1, |vm, inv| {
                let this = vm.string_of(inv.this()?)?;
                let other = match inv.object(0)? {
                    Some(other) if vm.instance_of(other, names::STRING)? => Some(vm.string_of(other)?),
                    _ => None,
                };
                Ok(Value::Bool(other.as_deref() == Some(this.as_str())))
            })
            .method(HASH_CODE.0, HASH_CODE.1, |vm, inv| Ok(Value::Int(string_hash(&vm.string_of(inv.this()?)?))))
            .method(TO_STRING.0, TO_STRING.1, |_, inv| Ok(Value::object(inv.this()?)))
            .method("length", "()I", |vm, inv| {
                Ok(Value::Int(vm.string_of(inv.this()?)?.encode_utf16().count() as i32))
            }),
    )?;
    vm.define_class(ClassDef::new(names::BYTE_ARRAY).method("length", "()I", |vm, inv| {
        let len = vm.with_payload(inv.this()?, |p| match p {
            Payload::Bytes(b) => b.len(),
            _ => 0,
        })?;
        Ok(Value::Int(len as i32))
    }))?;
    Ok(())
}

fn boxes(vm: &Vm) -> VmResult<()> {
    let all = [
        names::BOOLEAN,
        names::BYTE,
        names::CHARACTER,
        names::SHORT,
        names::INTEGER,
        names::LONG,
        names::FLOAT,
        names::DOUBLE,
    ];
    for (class, ctor, getter, getter_sig) in all {
        let sig = &ctor[1..2];
        vm.define_class(
            ClassDef::new(class)
                .field("value", sig)
                .constructor(ctor, |vm, inv| {
                    vm.put_field(inv.this()?, "value", inv.arg(0))?;
                    Ok(Value::Void)
                })
                .method(getter, getter_sig, |vm, inv| Ok(vm.field(inv.this()?, "value")?))
                .method(EQUALS.0, EQUALS.1, move |vm, inv| {
                    let this = inv.this()?;
                    match inv.object(0)? {
                        Some(other) if vm.instance_of(other, class)? => {
                            let (a, b) = (vm.field(this, "value")?, vm.field(other, "value")?);
                            Ok(Value::Bool(vm.values_equal(a, b)?))
                        }
                        _ => Ok(Value::Bool(false)),
                    }
                })
                .method(HASH_CODE.0, HASH_CODE.1, |vm, inv| {
                    Ok(Value::Int(vm.hash_of(vm.field(inv.this()?, "value")?)?))
                })
                .method(TO_STRING.0, TO_STRING.1, |vm, inv| {
                    let text = match vm.field(inv.this()?, "value")? {
                        Value::Bool(b) => b.to_string(),
                        Value::Char(c) => String::from_utf16_lossy(&[c]),
                        Value::Float(f) => f.to_string(),
                        Value::Double(d) => d.to_string(),
                        other => other.as_long().unwrap_or_default().to_string(),
                    };
                    Ok(Value::object(vm.alloc_string(&text)?))
                }),
        )?;
    }
    Ok(())
}

/// Throwable subclass with the two standard constructors
fn throwable_class(name: &str, parent: Option<&str>) -> ClassDef {
    let def = ClassDef::new(name)
        .constructor("()V", |_, _| Ok(Value::Void))
        .constructor(names::MESSAGE_CTOR, |vm, inv| {
            vm.put_field(inv.this()?, "message", inv.arg(0))?;
            Ok(Value::Void)
        });
    match parent {
        Some(parent) => def.extends(parent),
        None => def
            .field("message", "Lvm/lang/String;")
            .method(names::THROWABLE_GET_MESSAGE.0, names::THROWABLE_GET_MESSAGE.1, |vm, inv| {
                Ok(vm.field(inv.this()?, "message")?)
            })
            .method(TO_STRING.0, TO_STRING.1, |vm, inv| {
                let this = inv.this()?;
                let class = vm.class_name_of(this)?;
                let text = match vm.opt_string(vm.field(this, "message")?)? {
                    Some(message) => format!("{}: {}", class, message),
                    None => class,
                };
                Ok(Value::object(vm.alloc_string(&text)?))
            }),
    }
}

fn throwables(vm: &Vm) -> VmResult<()> {
    let hierarchy = [
        (names::THROWABLE, None),
        (EXCEPTION, Some(names::THROWABLE)),
        (ERROR, Some(names::THROWABLE)),
        (RUNTIME_EXCEPTION, Some(EXCEPTION)),
        (NULL_POINTER_EXCEPTION, Some(RUNTIME_EXCEPTION)),
        (ILLEGAL_ARGUMENT_EXCEPTION, Some(RUNTIME_EXCEPTION)),
        (ILLEGAL_STATE_EXCEPTION, Some(RUNTIME_EXCEPTION)),
        (INDEX_OUT_OF_BOUNDS_EXCEPTION, Some(RUNTIME_EXCEPTION)),
    ];
    for (name, parent) in hierarchy {
        vm.define_class(throwable_class(name, parent))?;
    }
    Ok(())
}

fn result(vm: &Vm) -> VmResult<()> {
    const CTOR: &str = "(Lvm/lang/Object;Lvm/lang/Throwable;)V";
    vm.define_class(
        ClassDef::new(names::RESULT)
            .field("value", "Lvm/lang/Object;")
            .field("exception", "Lvm/lang/Throwable;")
            .constructor(CTOR, |vm, inv| {
                let this = inv.this()?;
                vm.put_field(this, "value", inv.arg(0))?;
                vm.put_field(this, "exception", inv.arg(1))?;
                Ok(Value::Void)
            })
            .static_method("success", "(Lvm/lang/Object;)Lvm/lang/Result;", |vm, inv| {
                Ok(Value::object(vm.construct(names::RESULT, CTOR, &[inv.arg(0), Value::null()])?))
            })
            .static_method("failure", "(Lvm/lang/Throwable;)Lvm/lang/Result;", |vm, inv| {
                let exception = vm.non_null(inv.object(0)?)?;
                Ok(Value::object(vm.construct(names::RESULT, CTOR, &[Value::null(), Value::object(exception)])?))
            })
            .method("isSuccess", "()Z", |vm, inv| Ok(Value::Bool(vm.field(inv.this()?, "exception")?.is_null())))
            .method("isFailure", "()Z", |vm, inv| Ok(Value::Bool(!vm.field(inv.this()?, "exception")?.is_null())))
            .method("getOrNull", "()Lvm/lang/Object;", |vm, inv| Ok(vm.field(inv.this()?, "value")?))
            .method("exceptionOrNull", "()Lvm/lang/Throwable;", |vm, inv| {
                Ok(vm.field(inv.this()?, "exception")?)
            }),
    )?;
    Ok(())
}

pub(super) fn install(vm: &Vm) -> VmResult<()> {
    object(vm)?;
    string(vm)?;
    boxes(vm)?;
    throwables(vm)?;
    result(vm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_hash_matches_polynomial() {
        assert_eq!(string_hash(""), 0);
        assert_eq!(string_hash("a"), 97);
        assert_eq!(string_hash("ab"), 97 * 31 + 98);
    }
}
