//! Unit tests for member keys, flags, handles and values

use core_types::{CodePtr, MemberKey, TypeFlags, TypeId, Value};

#[test]
fn test_member_key_identity() {
    let a = MemberKey::new("compareTo", "(Ljava/lang/Object;)I");
    let b = MemberKey::new("compareTo", "(Ljava/lang/Object;)I");
    assert_eq!(a, b);
    assert_ne!(a, MemberKey::new("compareTo", "(I)I"));
    assert_ne!(a, MemberKey::new("equals", "(Ljava/lang/Object;)I"));
}

#[test]
fn test_member_key_is_cheap_to_clone() {
    let a = MemberKey::new("run", "()V");
    let b = a.clone();
    // Interned halves share storage.
    assert!(std::sync::Arc::ptr_eq(&a.name, &b.name));
    assert!(std::sync::Arc::ptr_eq(&a.signature, &b.signature));
}

#[test]
fn test_type_flags() {
    let class = TypeFlags::class();
    assert!(!class.is_interface && !class.is_abstract && !class.is_final);

    let iface = TypeFlags::interface();
    assert!(iface.is_interface && iface.is_abstract && !iface.is_final);
}

#[test]
fn test_handles_are_value_types() {
    assert_eq!(TypeId::new(3), TypeId::new(3));
    assert_eq!(TypeId::new(3).index(), 3);
    assert_eq!(CodePtr::new(0x40).addr(), 0x40);
}

#[test]
fn test_value_defaults_to_null() {
    assert!(Value::default().is_null());
    assert_eq!(Value::Int(0).kind_name(), "int");
    assert!(!Value::Bool(false).is_null());
}
