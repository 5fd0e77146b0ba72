//! Object model for the live-edit runtime: values, property descriptors,
//! prototype chains and the managed heap.
//!
//! Key features:
//!
//! - **Property descriptors**: value plus writable/enumerable/configurable
//! - **Prototype chains**: `[[Prototype]]` slot with bounded, cycle-checked traversal
//! - **Object kinds**: plain objects, arrays, script functions, host natives
//!
//! Objects are never freed: an [`ObjectHandle`] stays valid for the life of
//! the heap, which is what lets the identity registry hand out stable
//! handles. `BTreeMap` keeps own properties in a deterministic order.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ast::Statement;
use crate::interpreter::EnvironmentHandle;

// ---------------------------------------------------------------------------
// PropertyKey
// ---------------------------------------------------------------------------

/// A property key. Only string keys exist in edit script.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyKey(String);

impl PropertyKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The key as an array index, if it is the canonical form of one.
    pub fn array_index(&self) -> Option<u32> {
        let index = self.0.parse::<u32>().ok()?;
        (index != u32::MAX && index.to_string() == self.0).then_some(index)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PropertyKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// ObjectHandle / JsValue
// ---------------------------------------------------------------------------

/// Opaque handle referencing an object on the managed heap. Two values are
/// the same object exactly when their handles are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectHandle(pub u32);

/// Index into the realm's native function table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NativeId(pub u32);

/// Runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum JsValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Object(ObjectHandle),
}

impl JsValue {
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    pub fn as_object(&self) -> Option<ObjectHandle> {
        match self {
            Self::Object(handle) => Some(*handle),
            _ => None,
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// Type name without heap access; callables report `"object"` here, use
    /// [`ObjectHeap::type_of`] for `typeof` semantics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::Object(_) => "object",
        }
    }

    /// Strict equality (`===`).
    pub fn strict_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a == b,
            _ => self == other,
        }
    }

    /// SameValue: like `===` but `NaN` equals itself and `+0` differs from `-0`.
    pub fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => {
                (a.is_nan() && b.is_nan())
                    || (a == b && a.is_sign_negative() == b.is_sign_negative())
            }
            _ => self == other,
        }
    }
}

impl From<&str> for JsValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for JsValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<f64> for JsValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for JsValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<ObjectHandle> for JsValue {
    fn from(handle: ObjectHandle) -> Self {
        Self::Object(handle)
    }
}

// ---------------------------------------------------------------------------
// PropertyDescriptor
// ---------------------------------------------------------------------------

/// Data property descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDescriptor {
    pub value: JsValue,
    pub writable: bool,
    pub enumerable: bool,
    pub configurable: bool,
}

impl PropertyDescriptor {
    /// Writable, enumerable, configurable: what plain assignment creates.
    pub fn data(value: JsValue) -> Self {
        Self {
            value,
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    /// Writable and configurable but skipped by enumeration.
    pub fn hidden(value: JsValue) -> Self {
        Self {
            value,
            writable: true,
            enumerable: false,
            configurable: true,
        }
    }

    /// Non-writable, non-enumerable, non-configurable.
    pub fn frozen(value: JsValue) -> Self {
        Self {
            value,
            writable: false,
            enumerable: false,
            configurable: false,
        }
    }
}

// ---------------------------------------------------------------------------
// ObjectError
// ---------------------------------------------------------------------------

/// Errors from object model operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectError {
    TypeError(String),
    RangeError(String),
    ObjectNotFound(ObjectHandle),
    PrototypeCycleDetected,
    PrototypeChainTooDeep { depth: u32, max: u32 },
}

impl fmt::Display for ObjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeError(msg) => write!(f, "TypeError: {msg}"),
            Self::RangeError(msg) => write!(f, "RangeError: {msg}"),
            Self::ObjectNotFound(h) => write!(f, "object#{} not found", h.0),
            Self::PrototypeCycleDetected => write!(f, "TypeError: prototype chain cycle detected"),
            Self::PrototypeChainTooDeep { depth, max } => {
                write!(
                    f,
                    "TypeError: prototype chain depth {depth} exceeds max {max}"
                )
            }
        }
    }
}

impl std::error::Error for ObjectError {}

// ---------------------------------------------------------------------------
// OrdinaryObject
// ---------------------------------------------------------------------------

/// Default maximum prototype chain depth.
pub const DEFAULT_MAX_PROTOTYPE_DEPTH: u32 = 1024;

/// A script function closed over the environment it was created in.
#[derive(Debug, Clone)]
pub struct FunctionData {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Arc<[Statement]>,
    /// Verbatim source; this is what the default string conversion yields.
    pub source: String,
    /// `None` closes over the global scope.
    pub environment: Option<EnvironmentHandle>,
}

#[derive(Debug, Clone)]
pub enum ObjectKind {
    Plain,
    Array,
    Function(FunctionData),
    Native(NativeId),
}

impl ObjectKind {
    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Function(_) | Self::Native(_))
    }
}

#[derive(Debug, Clone)]
pub struct OrdinaryObject {
    /// `[[Prototype]]` (None ends the chain).
    pub prototype: Option<ObjectHandle>,
    /// `[[Extensible]]`.
    pub extensible: bool,
    pub properties: BTreeMap<PropertyKey, PropertyDescriptor>,
    pub kind: ObjectKind,
}

impl OrdinaryObject {
    pub fn new(prototype: Option<ObjectHandle>, kind: ObjectKind) -> Self {
        Self {
            prototype,
            extensible: true,
            properties: BTreeMap::new(),
            kind,
        }
    }

    pub fn get_own_property(&self, key: &PropertyKey) -> Option<&PropertyDescriptor> {
        self.properties.get(key)
    }

    pub fn has_own_property(&self, key: &PropertyKey) -> bool {
        self.properties.contains_key(key)
    }

    /// `[[DefineOwnProperty]](P, Desc)`.
    ///
    /// Returns `false` when rejected: a new key on a non-extensible object,
    /// or a change to a non-configurable property other than lowering
    /// `writable` or rewriting a writable value.
    pub fn define_own_property(&mut self, key: PropertyKey, desc: PropertyDescriptor) -> bool {
        let Some(current) = self.properties.get(&key) else {
            if !self.extensible {
                return false;
            }
            self.properties.insert(key, desc);
            return true;
        };
        if !current.configurable {
            if desc.configurable || desc.enumerable != current.enumerable {
                return false;
            }
            if !current.writable && (desc.writable || !current.value.same_value(&desc.value)) {
                return false;
            }
        }
        self.properties.insert(key, desc);
        true
    }

    /// `[[Delete]](P)`. Returns `false` if the property is non-configurable.
    pub fn delete(&mut self, key: &PropertyKey) -> bool {
        match self.properties.get(key) {
            Some(desc) if !desc.configurable => false,
            Some(_) => {
                self.properties.remove(key);
                true
            }
            None => true,
        }
    }

    /// `[[OwnPropertyKeys]]()`: array indices ascending, then the remaining
    /// string keys.
    pub fn own_property_keys(&self) -> Vec<PropertyKey> {
        let mut index_keys: Vec<(u32, PropertyKey)> = Vec::new();
        let mut string_keys: Vec<PropertyKey> = Vec::new();
        for key in self.properties.keys() {
            match key.array_index() {
                Some(index) => index_keys.push((index, key.clone())),
                None => string_keys.push(key.clone()),
            }
        }
        index_keys.sort_by_key(|(index, _)| *index);
        let mut result: Vec<PropertyKey> = index_keys.into_iter().map(|(_, k)| k).collect();
        result.extend(string_keys);
        result
    }

    /// `Object.freeze` semantics.
    pub fn freeze(&mut self) {
        self.extensible = false;
        for desc in self.properties.values_mut() {
            desc.configurable = false;
            desc.writable = false;
        }
    }

    pub fn is_callable(&self) -> bool {
        self.kind.is_callable()
    }
}

// ---------------------------------------------------------------------------
// ObjectHeap
// ---------------------------------------------------------------------------

/// The object heap: an append-only arena of objects.
#[derive(Debug, Clone)]
pub struct ObjectHeap {
    objects: Vec<OrdinaryObject>,
    max_prototype_depth: u32,
}

impl Default for ObjectHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectHeap {
    pub fn new() -> Self {
        Self::with_max_prototype_depth(DEFAULT_MAX_PROTOTYPE_DEPTH)
    }

    pub fn with_max_prototype_depth(max_prototype_depth: u32) -> Self {
        Self {
            objects: Vec::new(),
            max_prototype_depth,
        }
    }

    pub fn alloc(&mut self, prototype: Option<ObjectHandle>, kind: ObjectKind) -> ObjectHandle {
        self.alloc_object(OrdinaryObject::new(prototype, kind))
    }

    pub fn alloc_plain(&mut self, prototype: Option<ObjectHandle>) -> ObjectHandle {
        self.alloc(prototype, ObjectKind::Plain)
    }

    /// Move a fully built object onto the heap.
    pub fn alloc_object(&mut self, object: OrdinaryObject) -> ObjectHandle {
        let handle = ObjectHandle(self.objects.len() as u32);
        self.objects.push(object);
        handle
    }

    pub fn get(&self, handle: ObjectHandle) -> Result<&OrdinaryObject, ObjectError> {
        self.objects
            .get(handle.0 as usize)
            .ok_or(ObjectError::ObjectNotFound(handle))
    }

    pub fn get_mut(&mut self, handle: ObjectHandle) -> Result<&mut OrdinaryObject, ObjectError> {
        self.objects
            .get_mut(handle.0 as usize)
            .ok_or(ObjectError::ObjectNotFound(handle))
    }

    pub fn contains(&self, handle: ObjectHandle) -> bool {
        (handle.0 as usize) < self.objects.len()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Does `value` refer to a callable object?
    pub fn is_callable(&self, value: &JsValue) -> bool {
        value
            .as_object()
            .and_then(|handle| self.get(handle).ok())
            .is_some_and(OrdinaryObject::is_callable)
    }

    /// `typeof` result.
    pub fn type_of(&self, value: &JsValue) -> &'static str {
        match value {
            JsValue::Null => "object",
            JsValue::Object(_) if self.is_callable(value) => "function",
            other => other.type_name(),
        }
    }

    /// Walk the prototype chain from `handle`, stopping at the first object
    /// for which `visit` returns `Some`.
    fn walk_chain<T>(
        &self,
        handle: ObjectHandle,
        mut visit: impl FnMut(&OrdinaryObject) -> Option<T>,
    ) -> Result<Option<T>, ObjectError> {
        let mut current = Some(handle);
        let mut depth: u32 = 0;
        let mut visited = BTreeSet::new();
        while let Some(h) = current {
            if depth > self.max_prototype_depth {
                return Err(ObjectError::PrototypeChainTooDeep {
                    depth,
                    max: self.max_prototype_depth,
                });
            }
            if !visited.insert(h) {
                return Err(ObjectError::PrototypeCycleDetected);
            }
            let object = self.get(h)?;
            if let Some(found) = visit(object) {
                return Ok(Some(found));
            }
            current = object.prototype;
            depth += 1;
        }
        Ok(None)
    }

    /// `[[GetOwnProperty]]`: never consults the prototype chain.
    pub fn get_own_property(
        &self,
        handle: ObjectHandle,
        key: &PropertyKey,
    ) -> Result<Option<PropertyDescriptor>, ObjectError> {
        Ok(self.get(handle)?.get_own_property(key).cloned())
    }

    /// `[[Get]]`: own property or the nearest inherited one.
    pub fn get_property(
        &self,
        handle: ObjectHandle,
        key: &PropertyKey,
    ) -> Result<JsValue, ObjectError> {
        let found = self.walk_chain(handle, |object| {
            object.get_own_property(key).map(|desc| desc.value.clone())
        })?;
        Ok(found.unwrap_or(JsValue::Undefined))
    }

    /// `[[HasProperty]]`.
    pub fn has_property(
        &self,
        handle: ObjectHandle,
        key: &PropertyKey,
    ) -> Result<bool, ObjectError> {
        let found = self.walk_chain(handle, |object| object.has_own_property(key).then_some(()))?;
        Ok(found.is_some())
    }

    /// `[[Set]]` onto the receiver's own slot.
    ///
    /// Updates a writable own property, or creates a plain data property on
    /// an extensible object. Returns `false` if the write was refused.
    /// Writing an array index at or past `length` grows `length`. Writing
    /// an array's `length` must be a uint32 number and deletes the elements
    /// at or past it.
    pub fn set_property(
        &mut self,
        handle: ObjectHandle,
        key: PropertyKey,
        value: JsValue,
    ) -> Result<bool, ObjectError> {
        let object = self.get_mut(handle)?;
        if is_array_length(object, &key) && object.has_own_property(&key) {
            let new_len = array_length_value(&value)?;
            return Ok(set_array_length(object, new_len));
        }
        let written = match object.properties.get_mut(&key) {
            Some(desc) if !desc.writable => false,
            Some(desc) => {
                desc.value = value;
                true
            }
            None if !object.extensible => false,
            None => {
                object
                    .properties
                    .insert(key.clone(), PropertyDescriptor::data(value));
                true
            }
        };
        if written && matches!(object.kind, ObjectKind::Array) {
            grow_array_length(object, &key);
        }
        Ok(written)
    }

    /// `Object.defineProperty(O, P, Desc)`.
    pub fn define_property(
        &mut self,
        handle: ObjectHandle,
        key: PropertyKey,
        desc: PropertyDescriptor,
    ) -> Result<bool, ObjectError> {
        let object = self.get_mut(handle)?;
        if is_array_length(object, &key) {
            let new_len = array_length_value(&desc.value)?;
            if !object.define_own_property(key.clone(), desc) {
                return Ok(false);
            }
            let (kept, complete) = truncate_elements(object, new_len);
            if !complete && let Some(length) = object.properties.get_mut(&key) {
                length.value = JsValue::Number(f64::from(kept));
            }
            return Ok(complete);
        }
        let defined = object.define_own_property(key.clone(), desc);
        if defined && matches!(object.kind, ObjectKind::Array) {
            grow_array_length(object, &key);
        }
        Ok(defined)
    }

    /// Array indices below `length` found on `handle` or its prototype
    /// chain, ascending.
    pub fn present_indices(
        &self,
        handle: ObjectHandle,
        length: u32,
    ) -> Result<Vec<u32>, ObjectError> {
        let mut indices = BTreeSet::new();
        self.walk_chain(handle, |object| {
            indices.extend(
                object
                    .properties
                    .keys()
                    .filter_map(PropertyKey::array_index)
                    .filter(|index| *index < length),
            );
            None::<()>
        })?;
        Ok(indices.into_iter().collect())
    }

    pub fn delete_property(
        &mut self,
        handle: ObjectHandle,
        key: &PropertyKey,
    ) -> Result<bool, ObjectError> {
        Ok(self.get_mut(handle)?.delete(key))
    }

    pub fn get_prototype_of(
        &self,
        handle: ObjectHandle,
    ) -> Result<Option<ObjectHandle>, ObjectError> {
        Ok(self.get(handle)?.prototype)
    }

    /// Is `prototype` somewhere on the chain above `handle`?
    pub fn inherits_from(
        &self,
        handle: ObjectHandle,
        prototype: ObjectHandle,
    ) -> Result<bool, ObjectError> {
        let start = self.get(handle)?.prototype;
        let Some(start) = start else {
            return Ok(false);
        };
        let found = self.walk_chain(start, |object| {
            (object.prototype == Some(prototype)).then_some(())
        })?;
        Ok(start == prototype || found.is_some())
    }

    /// `[[OwnPropertyKeys]]` of `handle`.
    pub fn own_keys(&self, handle: ObjectHandle) -> Result<Vec<PropertyKey>, ObjectError> {
        Ok(self.get(handle)?.own_property_keys())
    }

    /// `Object.keys(O)`: own enumerable keys.
    pub fn keys(&self, handle: ObjectHandle) -> Result<Vec<PropertyKey>, ObjectError> {
        let object = self.get(handle)?;
        Ok(object
            .own_property_keys()
            .into_iter()
            .filter(|key| object.get_own_property(key).is_some_and(|d| d.enumerable))
            .collect())
    }

    pub fn prevent_extensions(&mut self, handle: ObjectHandle) -> Result<(), ObjectError> {
        self.get_mut(handle)?.extensible = false;
        Ok(())
    }

    pub fn freeze(&mut self, handle: ObjectHandle) -> Result<(), ObjectError> {
        self.get_mut(handle)?.freeze();
        Ok(())
    }
}

/// Validates a value written to an array's `length`.
///
/// Only numbers that are already uint32 pass; `-0` counts as `0`.
pub fn array_length_value(value: &JsValue) -> Result<u32, ObjectError> {
    match value {
        JsValue::Number(n) if f64::from(*n as u32) == *n => Ok(*n as u32),
        _ => Err(ObjectError::RangeError("Invalid array length".to_string())),
    }
}

fn is_array_length(object: &OrdinaryObject, key: &PropertyKey) -> bool {
    matches!(object.kind, ObjectKind::Array) && key.as_str() == "length"
}

fn set_array_length(object: &mut OrdinaryObject, new_len: u32) -> bool {
    let length_key = PropertyKey::from("length");
    if !object.get_own_property(&length_key).is_some_and(|desc| desc.writable) {
        return false;
    }
    let (kept, complete) = truncate_elements(object, new_len);
    if let Some(length) = object.properties.get_mut(&length_key) {
        length.value = JsValue::Number(f64::from(kept));
    }
    complete
}

/// Deletes elements at or past `new_len`, highest index first.
///
/// A non-configurable element stops the deletion. Returns the length that
/// still covers every element, and whether all deletions happened.
fn truncate_elements(object: &mut OrdinaryObject, new_len: u32) -> (u32, bool) {
    let mut doomed: Vec<(u32, PropertyKey)> = object
        .properties
        .keys()
        .filter_map(|key| key.array_index().map(|index| (index, key.clone())))
        .filter(|(index, _)| *index >= new_len)
        .collect();
    doomed.sort_by(|a, b| b.0.cmp(&a.0));
    for (index, key) in doomed {
        if !object.delete(&key) {
            return (index + 1, false);
        }
    }
    (new_len, true)
}

fn grow_array_length(object: &mut OrdinaryObject, key: &PropertyKey) {
    let Some(index) = key.array_index() else {
        return;
    };
    let length_key = PropertyKey::from("length");
    if let Some(desc) = object.properties.get_mut(&length_key)
        && let JsValue::Number(length) = desc.value
        && f64::from(index) >= length
    {
        desc.value = JsValue::Number(f64::from(index) + 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> PropertyKey {
        PropertyKey::from(s)
    }

    #[test]
    fn own_lookup_ignores_prototype_but_get_walks_it() {
        let mut heap = ObjectHeap::new();
        let proto = heap.alloc_plain(None);
        let child = heap.alloc_plain(Some(proto));
        heap.set_property(proto, key("greeting"), "hi".into())
            .expect("set");

        assert_eq!(heap.get_own_property(child, &key("greeting")).expect("own"), None);
        assert_eq!(
            heap.get_property(child, &key("greeting")).expect("get"),
            JsValue::Str("hi".into())
        );
        assert!(heap.has_property(child, &key("greeting")).expect("has"));
    }

    #[test]
    fn missing_property_reads_as_undefined() {
        let mut heap = ObjectHeap::new();
        let object = heap.alloc_plain(None);
        assert_eq!(
            heap.get_property(object, &key("nope")).expect("get"),
            JsValue::Undefined
        );
    }

    #[test]
    fn set_refuses_non_writable_and_non_extensible() {
        let mut heap = ObjectHeap::new();
        let object = heap.alloc_plain(None);
        heap.define_property(object, key("fixed"), PropertyDescriptor::frozen(1.0.into()))
            .expect("define");
        assert!(!heap.set_property(object, key("fixed"), 2.0.into()).expect("set"));

        heap.prevent_extensions(object).expect("prevent");
        assert!(!heap.set_property(object, key("fresh"), 2.0.into()).expect("set"));
        assert_eq!(
            heap.get_property(object, &key("fixed")).expect("get"),
            JsValue::Number(1.0)
        );
    }

    #[test]
    fn define_respects_non_configurable_rules() {
        let mut object = OrdinaryObject::new(None, ObjectKind::Plain);
        assert!(object.define_own_property(key("k"), PropertyDescriptor::frozen(1.0.into())));
        assert!(!object.define_own_property(key("k"), PropertyDescriptor::data(2.0.into())));
        // Redefining with an identical frozen descriptor is allowed.
        assert!(object.define_own_property(key("k"), PropertyDescriptor::frozen(1.0.into())));
        assert!(!object.delete(&key("k")));
    }

    #[test]
    fn own_keys_put_array_indices_first_in_numeric_order() {
        let mut object = OrdinaryObject::new(None, ObjectKind::Plain);
        for k in ["b", "10", "a", "2", "01"] {
            object.define_own_property(key(k), PropertyDescriptor::data(JsValue::Null));
        }
        let keys: Vec<String> = object
            .own_property_keys()
            .iter()
            .map(|k| k.to_string())
            .collect();
        assert_eq!(keys, vec!["2", "10", "01", "a", "b"]);
    }

    #[test]
    fn keys_skip_non_enumerable() {
        let mut heap = ObjectHeap::new();
        let object = heap.alloc_plain(None);
        heap.define_property(object, key("shown"), PropertyDescriptor::data(1.0.into()))
            .expect("define");
        heap.define_property(object, key("hidden"), PropertyDescriptor::hidden(1.0.into()))
            .expect("define");
        assert_eq!(heap.keys(object).expect("keys"), vec![key("shown")]);
        assert_eq!(heap.own_keys(object).expect("own keys").len(), 2);
    }

    #[test]
    fn prototype_cycle_is_detected() {
        let mut heap = ObjectHeap::new();
        let a = heap.alloc_plain(None);
        let b = heap.alloc_plain(Some(a));
        heap.get_mut(a).expect("a").prototype = Some(b);
        assert_eq!(
            heap.get_property(a, &key("x")),
            Err(ObjectError::PrototypeCycleDetected)
        );
    }

    #[test]
    fn prototype_depth_is_bounded() {
        let mut heap = ObjectHeap::with_max_prototype_depth(3);
        let mut current = heap.alloc_plain(None);
        for _ in 0..6 {
            current = heap.alloc_plain(Some(current));
        }
        assert!(matches!(
            heap.get_property(current, &key("x")),
            Err(ObjectError::PrototypeChainTooDeep { max: 3, .. })
        ));
    }

    #[test]
    fn unknown_handle_is_object_not_found() {
        let heap = ObjectHeap::new();
        assert_eq!(
            heap.get(ObjectHandle(9)).map(|_| ()),
            Err(ObjectError::ObjectNotFound(ObjectHandle(9)))
        );
        assert!(!heap.contains(ObjectHandle(9)));
    }

    #[test]
    fn array_length_grows_on_index_write() {
        let mut heap = ObjectHeap::new();
        let array = heap.alloc(None, ObjectKind::Array);
        heap.define_property(array, key("length"), PropertyDescriptor::hidden(0.0.into()))
            .expect("define");
        heap.set_property(array, key("4"), JsValue::Null).expect("set");
        assert_eq!(
            heap.get_property(array, &key("length")).expect("length"),
            JsValue::Number(5.0)
        );
    }

    fn array_with_length(heap: &mut ObjectHeap, length: f64) -> ObjectHandle {
        let array = heap.alloc(None, ObjectKind::Array);
        heap.define_property(array, key("length"), PropertyDescriptor::hidden(length.into()))
            .expect("define");
        array
    }

    #[test]
    fn array_length_rejects_non_uint32_numbers() {
        let mut heap = ObjectHeap::new();
        let array = array_with_length(&mut heap, 2.0);
        for bad in [1e300, -1.0, 1.5, f64::NAN, f64::INFINITY, 4_294_967_296.0] {
            assert_eq!(
                heap.set_property(array, key("length"), bad.into()),
                Err(ObjectError::RangeError("Invalid array length".to_string())),
                "length {bad}"
            );
        }
        assert_eq!(
            heap.set_property(array, key("length"), JsValue::Str("3".into())),
            Err(ObjectError::RangeError("Invalid array length".to_string()))
        );
        assert_eq!(
            heap.get_property(array, &key("length")).expect("length"),
            JsValue::Number(2.0)
        );
        assert!(heap.set_property(array, key("length"), 4_294_967_295.0.into()).expect("max"));
        assert!(heap.set_property(array, key("length"), (-0.0).into()).expect("zero"));
        assert_eq!(
            heap.get_property(array, &key("length")).expect("length"),
            JsValue::Number(0.0)
        );
    }

    #[test]
    fn shrinking_length_deletes_trailing_elements() {
        let mut heap = ObjectHeap::new();
        let array = array_with_length(&mut heap, 0.0);
        for index in ["0", "1", "2", "3"] {
            heap.set_property(array, key(index), JsValue::Null).expect("set");
        }
        assert!(heap.set_property(array, key("length"), 2.0.into()).expect("shrink"));
        assert_eq!(
            heap.own_keys(array).expect("keys"),
            vec![key("0"), key("1"), key("length")]
        );
    }

    #[test]
    fn non_configurable_element_stops_truncation() {
        let mut heap = ObjectHeap::new();
        let array = array_with_length(&mut heap, 0.0);
        heap.set_property(array, key("0"), JsValue::Null).expect("set");
        heap.define_property(array, key("1"), PropertyDescriptor::frozen(1.0.into()))
            .expect("define");
        heap.set_property(array, key("2"), JsValue::Null).expect("set");
        assert!(!heap.set_property(array, key("length"), 0.0.into()).expect("shrink"));
        assert_eq!(
            heap.get_property(array, &key("length")).expect("length"),
            JsValue::Number(2.0)
        );
        assert_eq!(heap.own_keys(array).expect("keys"), vec![key("0"), key("1"), key("length")]);
    }

    #[test]
    fn present_indices_skip_holes_and_include_inherited() {
        let mut heap = ObjectHeap::new();
        let proto = heap.alloc_plain(None);
        heap.set_property(proto, key("1"), JsValue::Null).expect("set");
        let array = heap.alloc(Some(proto), ObjectKind::Array);
        heap.define_property(array, key("length"), PropertyDescriptor::hidden(0.0.into()))
            .expect("define");
        heap.set_property(array, key("7"), JsValue::Null).expect("set");
        heap.set_property(array, key("length"), 4_000_000_000.0.into())
            .expect("grow");
        assert_eq!(heap.present_indices(array, 4_000_000_000).expect("indices"), vec![1, 7]);
        assert_eq!(heap.present_indices(array, 5).expect("indices"), vec![1]);
    }

    #[test]
    fn inherits_from_walks_the_chain() {
        let mut heap = ObjectHeap::new();
        let root = heap.alloc_plain(None);
        let middle = heap.alloc_plain(Some(root));
        let leaf = heap.alloc_plain(Some(middle));
        assert!(heap.inherits_from(leaf, root).expect("walk"));
        assert!(heap.inherits_from(leaf, middle).expect("walk"));
        assert!(!heap.inherits_from(root, leaf).expect("walk"));
    }

    #[test]
    fn equality_flavours_differ_on_nan_and_signed_zero() {
        let nan = JsValue::Number(f64::NAN);
        assert!(!nan.strict_equals(&nan));
        assert!(nan.same_value(&nan));
        let pos = JsValue::Number(0.0);
        let neg = JsValue::Number(-0.0);
        assert!(pos.strict_equals(&neg));
        assert!(!pos.same_value(&neg));
    }

    #[test]
    fn array_index_requires_canonical_form() {
        assert_eq!(key("7").array_index(), Some(7));
        assert_eq!(key("07").array_index(), None);
        assert_eq!(key("-1").array_index(), None);
        assert_eq!(key("4294967295").array_index(), None);
    }
}
