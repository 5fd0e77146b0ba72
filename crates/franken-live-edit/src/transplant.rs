//! Carries surviving own state from a replaced value onto its replacement.
//!
//! When both the old and the new value are composite, every own enumerable
//! property of the old value that the new value does not itself own is
//! copied across with its full descriptor. Keys the new value defines win.
//! The copy is one level deep: copied values are shared, not cloned, and
//! prototypes are left alone.

use serde::{Deserialize, Serialize};

use crate::object_model::{JsValue, ObjectError, ObjectHeap, PropertyDescriptor, PropertyKey};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransplantReport {
    pub copied: Vec<PropertyKey>,
    /// Keys the new value refused to accept, e.g. because it is not extensible.
    pub rejected: Vec<PropertyKey>,
}

/// Can `value` carry own properties? Objects and callables can, primitives can't.
pub fn is_composite(heap: &ObjectHeap, value: &JsValue) -> bool {
    value.as_object().is_some_and(|handle| heap.contains(handle))
}

/// Returns `None` when either side is not composite and nothing was attempted.
pub fn transplant(
    heap: &mut ObjectHeap,
    old: &JsValue,
    new: &JsValue,
) -> Result<Option<TransplantReport>, ObjectError> {
    if !is_composite(heap, old) || !is_composite(heap, new) {
        return Ok(None);
    }
    let (Some(source), Some(target)) = (old.as_object(), new.as_object()) else {
        return Ok(None);
    };
    let mut report = TransplantReport::default();
    if source == target {
        return Ok(Some(report));
    }

    let candidates: Vec<(PropertyKey, PropertyDescriptor)> = {
        let source = heap.get(source)?;
        let target = heap.get(target)?;
        source
            .own_property_keys()
            .into_iter()
            .filter(|key| !target.has_own_property(key))
            .filter_map(|key| {
                let desc = source.get_own_property(&key)?;
                desc.enumerable.then(|| (key.clone(), desc.clone()))
            })
            .collect()
    };
    for (key, desc) in candidates {
        if heap.define_property(target, key.clone(), desc)? {
            report.copied.push(key);
        } else {
            report.rejected.push(key);
        }
    }
    Ok(Some(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::Realm;
    use crate::parser::ParserLimits;

    fn eval(realm: &mut Realm, source: &str) -> JsValue {
        realm
            .run_script(source, ParserLimits::default())
            .expect("script")
    }

    fn own(realm: &Realm, value: &JsValue, key: &str) -> Option<JsValue> {
        let handle = value.as_object().expect("object");
        realm
            .heap()
            .get_own_property(handle, &PropertyKey::from(key))
            .expect("lookup")
            .map(|desc| desc.value)
    }

    #[test]
    fn new_keys_win_and_missing_keys_survive() {
        let mut realm = Realm::new();
        let old = eval(&mut realm, "({a: 1, b: 2})");
        let new = eval(&mut realm, "({b: 3})");
        let report = transplant(realm.heap_mut(), &old, &new)
            .expect("transplant")
            .expect("both composite");
        assert_eq!(report.copied, vec![PropertyKey::from("a")]);
        assert!(report.rejected.is_empty());
        assert_eq!(own(&realm, &new, "a"), Some(JsValue::Number(1.0)));
        assert_eq!(own(&realm, &new, "b"), Some(JsValue::Number(3.0)));
        // The old value is left as it was.
        assert_eq!(own(&realm, &old, "b"), Some(JsValue::Number(2.0)));
    }

    #[test]
    fn primitives_on_either_side_skip() {
        let mut realm = Realm::new();
        let object = eval(&mut realm, "({a: 1})");
        for (old, new) in [
            (JsValue::Number(5.0), object.clone()),
            (object.clone(), JsValue::Str("hello".into())),
            (JsValue::Undefined, JsValue::Null),
        ] {
            assert_eq!(transplant(realm.heap_mut(), &old, &new), Ok(None));
        }
    }

    #[test]
    fn functions_are_composite() {
        let mut realm = Realm::new();
        let old = eval(&mut realm, "var f = function () { return 1; }; f.cache = 'warm'; f");
        let new = eval(&mut realm, "(function () { return 2; })");
        assert!(is_composite(realm.heap(), &old));
        transplant(realm.heap_mut(), &old, &new).expect("transplant");
        assert_eq!(own(&realm, &new, "cache"), Some(JsValue::Str("warm".into())));
        // Hidden `prototype` stays the new function's own.
        assert_ne!(own(&realm, &new, "prototype"), own(&realm, &old, "prototype"));
    }

    #[test]
    fn non_enumerable_and_inherited_keys_stay_behind() {
        let mut realm = Realm::new();
        let old = eval(
            &mut realm,
            "function Base() {} Base.prototype.shared = 1; var o = new Base(); o.mine = 2; o",
        );
        let handle = old.as_object().expect("object");
        realm
            .heap_mut()
            .define_property(
                handle,
                PropertyKey::from("secret"),
                PropertyDescriptor::hidden(JsValue::Bool(true)),
            )
            .expect("define");
        let new = eval(&mut realm, "({})");
        let report = transplant(realm.heap_mut(), &old, &new)
            .expect("transplant")
            .expect("both composite");
        assert_eq!(report.copied, vec![PropertyKey::from("mine")]);
        assert_eq!(own(&realm, &new, "secret"), None);
        assert_eq!(own(&realm, &new, "shared"), None);
    }

    #[test]
    fn descriptors_are_copied_whole() {
        let mut realm = Realm::new();
        let old = eval(&mut realm, "({})");
        let new = eval(&mut realm, "({})");
        let pinned = PropertyDescriptor {
            value: JsValue::Number(7.0),
            writable: false,
            enumerable: true,
            configurable: false,
        };
        realm
            .heap_mut()
            .define_property(
                old.as_object().expect("object"),
                PropertyKey::from("pinned"),
                pinned.clone(),
            )
            .expect("define");
        transplant(realm.heap_mut(), &old, &new).expect("transplant");
        assert_eq!(
            realm
                .heap()
                .get_own_property(new.as_object().expect("object"), &PropertyKey::from("pinned")),
            Ok(Some(pinned))
        );
    }

    #[test]
    fn copy_is_shallow() {
        let mut realm = Realm::new();
        let old = eval(&mut realm, "({nested: {deep: 1}})");
        let new = eval(&mut realm, "({nested: {}})");
        let other = eval(&mut realm, "({})");
        transplant(realm.heap_mut(), &old, &new).expect("transplant");
        let nested = own(&realm, &new, "nested").expect("nested");
        assert_eq!(own(&realm, &nested, "deep"), None);

        transplant(realm.heap_mut(), &old, &other).expect("transplant");
        assert_eq!(own(&realm, &other, "nested"), own(&realm, &old, "nested"));
    }

    #[test]
    fn non_extensible_target_rejects_without_failing() {
        let mut realm = Realm::new();
        let old = eval(&mut realm, "({a: 1})");
        let new = eval(&mut realm, "({})");
        realm
            .heap_mut()
            .prevent_extensions(new.as_object().expect("object"))
            .expect("prevent");
        let report = transplant(realm.heap_mut(), &old, &new)
            .expect("transplant")
            .expect("both composite");
        assert_eq!(report.rejected, vec![PropertyKey::from("a")]);
        assert_eq!(own(&realm, &new, "a"), None);
    }

    #[test]
    fn arrays_fill_missing_indices() {
        let mut realm = Realm::new();
        let old = eval(&mut realm, "[1, 2, 3]");
        let new = eval(&mut realm, "[9]");
        transplant(realm.heap_mut(), &old, &new).expect("transplant");
        assert_eq!(realm.to_display_string(&new).expect("display"), "9,2,3");
    }
}
