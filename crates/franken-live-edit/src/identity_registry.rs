//! Identity registry: stable integer handles for live objects.
//!
//! Handles are issued sequentially from 0 in first-registration order and
//! never reused. The registry holds heap handles only, so it never keeps an
//! object alive on its own account; the heap is append-only anyway.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error_code::LiveEditError;
use crate::object_model::{JsValue, ObjectHandle};

/// Integer naming a registered object across requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EditHandle(pub u64);

impl fmt::Display for EditHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct IdentityRegistry {
    objects: Vec<ObjectHandle>,
    by_identity: BTreeMap<ObjectHandle, EditHandle>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the handle already issued for `value`, or issue the next one.
    ///
    /// Identity is heap identity: two structurally equal objects get
    /// different handles.
    pub fn register_or_lookup(&mut self, value: &JsValue) -> Result<EditHandle, LiveEditError> {
        let Some(object) = value.as_object() else {
            return Err(LiveEditError::InvalidTarget {
                type_name: value.type_name(),
            });
        };
        if let Some(handle) = self.by_identity.get(&object) {
            return Ok(*handle);
        }
        let handle = EditHandle(self.objects.len() as u64);
        self.objects.push(object);
        self.by_identity.insert(object, handle);
        Ok(handle)
    }

    pub fn resolve(&self, handle: EditHandle) -> Option<ObjectHandle> {
        usize::try_from(handle.0)
            .ok()
            .and_then(|index| self.objects.get(index))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
