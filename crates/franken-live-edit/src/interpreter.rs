//! Tree-walking interpreter and realm for edit-script.
//!
//! A [`Realm`] owns everything a running script can reach: the object heap,
//! the global object, the built-in prototypes, host natives and the
//! environment records that closures capture. Semantics follow sloppy-mode
//! ES5 for the grammar in `parser.rs`:
//! - **Hoisting**: `var` and function declarations bind before the body runs.
//! - **Closures**: function objects keep the environment they were created in.
//! - **Receivers**: `o.f()` binds `this` to `o`; a bare call binds the global.
//! - **Globals**: assigning an undeclared name creates a global property.
//!
//! Environment records are append-only, like heap objects; a closure's
//! environment stays reachable for as long as the realm lives.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ast::{
    AssignOp, BinaryOp, Expression, FunctionLiteral, LogicalOp, MemberProperty, Program,
    Statement, UnaryOp,
};
use crate::object_model::{
    DEFAULT_MAX_PROTOTYPE_DEPTH, FunctionData, JsValue, NativeId, ObjectError, ObjectHandle,
    ObjectHeap, ObjectKind, OrdinaryObject, PropertyDescriptor, PropertyKey,
};
use crate::parser::{ParseError, ParserLimits, parse_script};

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterLimits {
    /// Maximum nesting of function calls before a `RangeError`.
    pub max_call_depth: usize,
    pub max_prototype_depth: u32,
    /// Longest string, in UTF-8 bytes, that concatenation or an array's
    /// string conversion may build before a `RangeError`.
    pub max_string_length: usize,
}

impl Default for InterpreterLimits {
    fn default() -> Self {
        Self {
            max_call_depth: 64,
            max_prototype_depth: DEFAULT_MAX_PROTOTYPE_DEPTH,
            max_string_length: (1 << 29) - 24,
        }
    }
}

// ---------------------------------------------------------------------------
// EvalFailure
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalFailureKind {
    Reference,
    Type,
    Range,
    Syntax,
    /// A value raised by a `throw` statement.
    Thrown,
}

impl EvalFailureKind {
    pub fn error_name(self) -> Option<&'static str> {
        match self {
            Self::Reference => Some("ReferenceError"),
            Self::Type => Some("TypeError"),
            Self::Range => Some("RangeError"),
            Self::Syntax => Some("SyntaxError"),
            Self::Thrown => None,
        }
    }
}

/// An abrupt completion that escaped evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalFailure {
    pub kind: EvalFailureKind,
    pub message: String,
}

impl EvalFailure {
    pub fn new(kind: EvalFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn reference(message: impl Into<String>) -> Self {
        Self::new(EvalFailureKind::Reference, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(EvalFailureKind::Type, message)
    }

    pub fn range(message: impl Into<String>) -> Self {
        Self::new(EvalFailureKind::Range, message)
    }

    pub fn thrown(message: impl Into<String>) -> Self {
        Self::new(EvalFailureKind::Thrown, message)
    }
}

impl fmt::Display for EvalFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind.error_name() {
            Some(name) => write!(f, "{name}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for EvalFailure {}

impl From<ParseError> for EvalFailure {
    fn from(error: ParseError) -> Self {
        Self::new(EvalFailureKind::Syntax, error.to_string())
    }
}

impl From<ObjectError> for EvalFailure {
    fn from(error: ObjectError) -> Self {
        match error {
            ObjectError::TypeError(message) => Self::type_error(message),
            ObjectError::RangeError(message) => Self::range(message),
            ObjectError::ObjectNotFound(handle) => {
                Self::type_error(format!("object#{} not found", handle.0))
            }
            ObjectError::PrototypeCycleDetected => {
                Self::type_error("prototype chain cycle detected")
            }
            ObjectError::PrototypeChainTooDeep { depth, max } => {
                Self::range(format!("prototype chain depth {depth} exceeds max {max}"))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Environments
// ---------------------------------------------------------------------------

/// Opaque handle to an environment record in the realm's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EnvironmentHandle(pub u32);

#[derive(Debug, Clone)]
struct EnvironmentRecord {
    bindings: BTreeMap<String, JsValue>,
    parent: Option<EnvironmentHandle>,
    /// Set on function-call records; `None` defers to the parent.
    this_value: Option<JsValue>,
}

/// Innermost environment, or `None` for global code.
type Scope = Option<EnvironmentHandle>;

enum Completion {
    Normal(Option<JsValue>),
    Return(JsValue),
}

// ---------------------------------------------------------------------------
// Realm
// ---------------------------------------------------------------------------

/// Host callback exposed to scripts as a function object.
pub type NativeFunction =
    Arc<dyn Fn(&mut Realm, &JsValue, &[JsValue]) -> Result<JsValue, EvalFailure> + Send + Sync>;

#[derive(Clone)]
struct NativeEntry {
    name: String,
    function: NativeFunction,
}

pub struct Realm {
    heap: ObjectHeap,
    environments: Vec<EnvironmentRecord>,
    natives: Vec<NativeEntry>,
    global: ObjectHandle,
    object_prototype: ObjectHandle,
    function_prototype: ObjectHandle,
    array_prototype: ObjectHandle,
    limits: InterpreterLimits,
    call_depth: usize,
}

impl fmt::Debug for Realm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Realm")
            .field("objects", &self.heap.len())
            .field("environments", &self.environments.len())
            .field("natives", &self.natives.len())
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl Default for Realm {
    fn default() -> Self {
        Self::new()
    }
}

impl Realm {
    pub fn new() -> Self {
        Self::with_limits(InterpreterLimits::default())
    }

    pub fn with_limits(limits: InterpreterLimits) -> Self {
        let mut heap = ObjectHeap::with_max_prototype_depth(limits.max_prototype_depth);
        let object_prototype = heap.alloc_plain(None);
        let function_prototype = heap.alloc_plain(Some(object_prototype));
        let array_prototype = heap.alloc_plain(Some(object_prototype));
        let mut realm = Self {
            heap,
            environments: Vec::new(),
            natives: Vec::new(),
            // Replaced below once the global object is built.
            global: object_prototype,
            object_prototype,
            function_prototype,
            array_prototype,
            limits,
            call_depth: 0,
        };

        let mut global = OrdinaryObject::new(Some(object_prototype), ObjectKind::Plain);
        for (name, value) in [
            ("undefined", JsValue::Undefined),
            ("NaN", JsValue::Number(f64::NAN)),
            ("Infinity", JsValue::Number(f64::INFINITY)),
        ] {
            global.define_own_property(PropertyKey::from(name), PropertyDescriptor::frozen(value));
        }
        let builtins: [(&str, NativeFunction); 3] = [
            ("String", Arc::new(builtin_string) as NativeFunction),
            ("Number", Arc::new(builtin_number) as NativeFunction),
            ("Boolean", Arc::new(builtin_boolean) as NativeFunction),
        ];
        for (name, function) in builtins {
            let handle = realm.register_native(name, function);
            global.define_own_property(
                PropertyKey::from(name),
                PropertyDescriptor::hidden(JsValue::Object(handle)),
            );
        }
        realm.global = realm.heap.alloc_object(global);
        realm
    }

    pub fn heap(&self) -> &ObjectHeap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut ObjectHeap {
        &mut self.heap
    }

    pub fn global(&self) -> ObjectHandle {
        self.global
    }

    pub fn object_prototype(&self) -> ObjectHandle {
        self.object_prototype
    }

    pub fn limits(&self) -> InterpreterLimits {
        self.limits
    }

    /// Bind `name` on the global object.
    pub fn define_global(&mut self, name: &str, value: JsValue) -> Result<(), ObjectError> {
        if self
            .heap
            .set_property(self.global, PropertyKey::from(name), value)?
        {
            Ok(())
        } else {
            Err(ObjectError::TypeError(format!(
                "Cannot assign to read only global '{name}'"
            )))
        }
    }

    pub fn get_global(&self, name: &str) -> Result<JsValue, ObjectError> {
        self.heap.get_property(self.global, &PropertyKey::from(name))
    }

    /// Expose a host callback as the global function `name`.
    pub fn define_native<F>(&mut self, name: &str, function: F) -> Result<ObjectHandle, ObjectError>
    where
        F: Fn(&mut Realm, &JsValue, &[JsValue]) -> Result<JsValue, EvalFailure>
            + Send
            + Sync
            + 'static,
    {
        let handle = self.register_native(name, Arc::new(function));
        self.define_global(name, JsValue::Object(handle))?;
        Ok(handle)
    }

    fn register_native(&mut self, name: &str, function: NativeFunction) -> ObjectHandle {
        let id = NativeId(self.natives.len() as u32);
        self.natives.push(NativeEntry {
            name: name.to_string(),
            function,
        });
        self.heap
            .alloc(Some(self.function_prototype), ObjectKind::Native(id))
    }

    /// A fresh `{}` inheriting from `Object.prototype`.
    pub fn new_object(&mut self) -> ObjectHandle {
        self.heap.alloc_plain(Some(self.object_prototype))
    }

    pub fn new_array(&mut self, elements: &[JsValue]) -> ObjectHandle {
        self.alloc_array(elements.iter().cloned().map(Some).collect())
    }

    fn alloc_array(&mut self, elements: Vec<Option<JsValue>>) -> ObjectHandle {
        let mut array = OrdinaryObject::new(Some(self.array_prototype), ObjectKind::Array);
        let length = elements.len();
        for (index, element) in elements.into_iter().enumerate() {
            if let Some(value) = element {
                array.define_own_property(
                    PropertyKey::from(index.to_string()),
                    PropertyDescriptor::data(value),
                );
            }
        }
        array.define_own_property(
            PropertyKey::from("length"),
            PropertyDescriptor {
                value: JsValue::Number(length as f64),
                writable: true,
                enumerable: false,
                configurable: false,
            },
        );
        self.heap.alloc_object(array)
    }

    /// Parse and run `source` as global code, returning its completion value.
    pub fn run_script(
        &mut self,
        source: &str,
        limits: ParserLimits,
    ) -> Result<JsValue, EvalFailure> {
        let program = parse_script(source, limits)?;
        self.run_program(&program)
    }

    pub fn run_program(&mut self, program: &Program) -> Result<JsValue, EvalFailure> {
        self.hoist(&program.body, None)?;
        match self.exec_statements(&program.body, None)? {
            Completion::Normal(value) => Ok(value.unwrap_or(JsValue::Undefined)),
            Completion::Return(value) => Ok(value),
        }
    }

    /// Call `function` with an explicit receiver.
    pub fn call_function(
        &mut self,
        function: &JsValue,
        this: JsValue,
        arguments: &[JsValue],
    ) -> Result<JsValue, EvalFailure> {
        let Some(handle) = function.as_object().filter(|_| self.heap.is_callable(function)) else {
            return Err(EvalFailure::type_error(format!(
                "{} is not a function",
                self.describe_value(function)
            )));
        };
        if self.call_depth >= self.limits.max_call_depth {
            return Err(EvalFailure::range("Maximum call stack size exceeded"));
        }
        let kind = self.heap.get(handle)?.kind.clone();
        self.call_depth += 1;
        let result = match kind {
            ObjectKind::Function(data) => self.call_script_function(&data, this, arguments),
            ObjectKind::Native(id) => self.call_native(id, &this, arguments),
            ObjectKind::Plain | ObjectKind::Array => {
                Err(EvalFailure::type_error("object is not a function"))
            }
        };
        self.call_depth -= 1;
        result
    }

    fn call_script_function(
        &mut self,
        data: &FunctionData,
        this: JsValue,
        arguments: &[JsValue],
    ) -> Result<JsValue, EvalFailure> {
        let this = match this {
            JsValue::Undefined | JsValue::Null => JsValue::Object(self.global),
            other => other,
        };
        let mut bindings = BTreeMap::new();
        for (index, param) in data.params.iter().enumerate() {
            let value = arguments.get(index).cloned().unwrap_or(JsValue::Undefined);
            bindings.insert(param.clone(), value);
        }
        let scope = Some(self.push_environment(bindings, data.environment, Some(this)));
        self.hoist(&data.body, scope)?;
        match self.exec_statements(&data.body, scope)? {
            Completion::Return(value) => Ok(value),
            Completion::Normal(_) => Ok(JsValue::Undefined),
        }
    }

    fn call_native(
        &mut self,
        id: NativeId,
        this: &JsValue,
        arguments: &[JsValue],
    ) -> Result<JsValue, EvalFailure> {
        let function = self
            .natives
            .get(id.0 as usize)
            .map(|entry| Arc::clone(&entry.function))
            .ok_or_else(|| EvalFailure::type_error(format!("native#{} is not registered", id.0)))?;
        function(self, this, arguments)
    }

    fn construct(
        &mut self,
        callee: &JsValue,
        arguments: &[JsValue],
        description: &str,
    ) -> Result<JsValue, EvalFailure> {
        let constructible = match callee {
            JsValue::Object(handle) => {
                matches!(self.heap.get(*handle)?.kind, ObjectKind::Function(_))
            }
            _ => false,
        };
        let Some(handle) = callee.as_object().filter(|_| constructible) else {
            return Err(EvalFailure::type_error(format!(
                "{description} is not a constructor"
            )));
        };
        let prototype = match self
            .heap
            .get_property(handle, &PropertyKey::from("prototype"))?
        {
            JsValue::Object(prototype) => prototype,
            _ => self.object_prototype,
        };
        let instance = JsValue::Object(self.heap.alloc_plain(Some(prototype)));
        let result = self.call_function(callee, instance.clone(), arguments)?;
        Ok(if result.is_object() { result } else { instance })
    }

    // -- Environments -------------------------------------------------------

    fn push_environment(
        &mut self,
        bindings: BTreeMap<String, JsValue>,
        parent: Scope,
        this_value: Option<JsValue>,
    ) -> EnvironmentHandle {
        let handle = EnvironmentHandle(self.environments.len() as u32);
        self.environments.push(EnvironmentRecord {
            bindings,
            parent,
            this_value,
        });
        handle
    }

    fn environment(&self, handle: EnvironmentHandle) -> Result<&EnvironmentRecord, EvalFailure> {
        self.environments
            .get(handle.0 as usize)
            .ok_or_else(|| EvalFailure::reference(format!("environment#{} not found", handle.0)))
    }

    fn environment_mut(
        &mut self,
        handle: EnvironmentHandle,
    ) -> Result<&mut EnvironmentRecord, EvalFailure> {
        self.environments
            .get_mut(handle.0 as usize)
            .ok_or_else(|| EvalFailure::reference(format!("environment#{} not found", handle.0)))
    }

    fn find_binding(&self, scope: Scope, name: &str) -> Result<Scope, EvalFailure> {
        let mut current = scope;
        while let Some(handle) = current {
            let record = self.environment(handle)?;
            if record.bindings.contains_key(name) {
                return Ok(Some(handle));
            }
            current = record.parent;
        }
        Ok(None)
    }

    /// Resolve `name`, or `None` if it is bound nowhere.
    fn lookup_identifier(&self, scope: Scope, name: &str) -> Result<Option<JsValue>, EvalFailure> {
        if let Some(handle) = self.find_binding(scope, name)? {
            return Ok(self.environment(handle)?.bindings.get(name).cloned());
        }
        let key = PropertyKey::from(name);
        if self.heap.has_property(self.global, &key)? {
            return Ok(Some(self.heap.get_property(self.global, &key)?));
        }
        Ok(None)
    }

    fn read_identifier(&self, scope: Scope, name: &str) -> Result<JsValue, EvalFailure> {
        self.lookup_identifier(scope, name)?
            .ok_or_else(|| EvalFailure::reference(format!("{name} is not defined")))
    }

    fn assign_identifier(
        &mut self,
        scope: Scope,
        name: &str,
        value: JsValue,
    ) -> Result<(), EvalFailure> {
        if let Some(handle) = self.find_binding(scope, name)? {
            self.environment_mut(handle)?
                .bindings
                .insert(name.to_string(), value);
            return Ok(());
        }
        // Sloppy mode: a refused global write is silently dropped.
        self.heap
            .set_property(self.global, PropertyKey::from(name), value)?;
        Ok(())
    }

    fn this_value(&self, scope: Scope) -> Result<JsValue, EvalFailure> {
        let mut current = scope;
        while let Some(handle) = current {
            let record = self.environment(handle)?;
            if let Some(this) = &record.this_value {
                return Ok(this.clone());
            }
            current = record.parent;
        }
        Ok(JsValue::Object(self.global))
    }

    /// Bind a hoisted name. `None` declares without overwriting.
    fn declare(
        &mut self,
        scope: Scope,
        name: &str,
        value: Option<JsValue>,
    ) -> Result<(), EvalFailure> {
        match scope {
            Some(handle) => {
                let bindings = &mut self.environment_mut(handle)?.bindings;
                match value {
                    Some(value) => {
                        bindings.insert(name.to_string(), value);
                    }
                    None => {
                        bindings
                            .entry(name.to_string())
                            .or_insert(JsValue::Undefined);
                    }
                }
            }
            None => {
                let key = PropertyKey::from(name);
                match value {
                    Some(value) => {
                        self.heap.set_property(self.global, key, value)?;
                    }
                    None => {
                        if self.heap.get_own_property(self.global, &key)?.is_none() {
                            self.heap
                                .set_property(self.global, key, JsValue::Undefined)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn hoist(&mut self, body: &[Statement], scope: Scope) -> Result<(), EvalFailure> {
        for statement in body {
            match statement {
                Statement::Var(declarators) => {
                    for declarator in declarators {
                        self.declare(scope, &declarator.name, None)?;
                    }
                }
                Statement::Function(literal) => {
                    if let Some(name) = &literal.name {
                        let function = self.create_function(literal, scope);
                        self.declare(scope, name, Some(JsValue::Object(function)))?;
                    }
                }
                Statement::If {
                    consequent,
                    alternate,
                    ..
                } => {
                    self.hoist(std::slice::from_ref(consequent.as_ref()), scope)?;
                    if let Some(alternate) = alternate {
                        self.hoist(std::slice::from_ref(alternate.as_ref()), scope)?;
                    }
                }
                Statement::While { body, .. } => {
                    self.hoist(std::slice::from_ref(body.as_ref()), scope)?;
                }
                Statement::Block(inner) => self.hoist(inner, scope)?,
                Statement::Return(_)
                | Statement::Throw(_)
                | Statement::Empty
                | Statement::Expression(_) => {}
            }
        }
        Ok(())
    }

    fn create_function(&mut self, literal: &FunctionLiteral, scope: Scope) -> ObjectHandle {
        let data = FunctionData {
            name: literal.name.clone(),
            params: literal.params.clone(),
            body: Arc::from(literal.body.clone()),
            source: literal.source.clone(),
            environment: scope,
        };
        let function = self
            .heap
            .alloc(Some(self.function_prototype), ObjectKind::Function(data));
        let mut prototype = OrdinaryObject::new(Some(self.object_prototype), ObjectKind::Plain);
        prototype.define_own_property(
            PropertyKey::from("constructor"),
            PropertyDescriptor::hidden(JsValue::Object(function)),
        );
        let prototype = self.heap.alloc_object(prototype);
        if let Ok(object) = self.heap.get_mut(function) {
            object.define_own_property(
                PropertyKey::from("prototype"),
                PropertyDescriptor {
                    value: JsValue::Object(prototype),
                    writable: true,
                    enumerable: false,
                    configurable: false,
                },
            );
        }
        function
    }

    /// Function expressions see their own name in an intermediate scope.
    fn create_function_expression(
        &mut self,
        literal: &FunctionLiteral,
        scope: Scope,
    ) -> ObjectHandle {
        let Some(name) = &literal.name else {
            return self.create_function(literal, scope);
        };
        let own_scope = self.push_environment(BTreeMap::new(), scope, None);
        let function = self.create_function(literal, Some(own_scope));
        if let Some(record) = self.environments.get_mut(own_scope.0 as usize) {
            record
                .bindings
                .insert(name.clone(), JsValue::Object(function));
        }
        function
    }

    // -- Statements ---------------------------------------------------------

    fn exec_statements(
        &mut self,
        body: &[Statement],
        scope: Scope,
    ) -> Result<Completion, EvalFailure> {
        let mut last = None;
        for statement in body {
            match self.exec_statement(statement, scope)? {
                Completion::Normal(Some(value)) => last = Some(value),
                Completion::Normal(None) => {}
                returned @ Completion::Return(_) => return Ok(returned),
            }
        }
        Ok(Completion::Normal(last))
    }

    fn exec_statement(
        &mut self,
        statement: &Statement,
        scope: Scope,
    ) -> Result<Completion, EvalFailure> {
        match statement {
            Statement::Var(declarators) => {
                for declarator in declarators {
                    if let Some(init) = &declarator.init {
                        let value = self.eval(init, scope)?;
                        self.assign_identifier(scope, &declarator.name, value)?;
                    }
                }
                Ok(Completion::Normal(None))
            }
            Statement::Function(_) | Statement::Empty => Ok(Completion::Normal(None)),
            Statement::If {
                test,
                consequent,
                alternate,
            } => {
                let test = self.eval(test, scope)?;
                if to_boolean(&test) {
                    self.exec_statement(consequent, scope)
                } else if let Some(alternate) = alternate {
                    self.exec_statement(alternate, scope)
                } else {
                    Ok(Completion::Normal(None))
                }
            }
            Statement::While { test, body } => {
                let mut last = None;
                loop {
                    let condition = self.eval(test, scope)?;
                    if !to_boolean(&condition) {
                        break;
                    }
                    match self.exec_statement(body, scope)? {
                        Completion::Normal(Some(value)) => last = Some(value),
                        Completion::Normal(None) => {}
                        returned @ Completion::Return(_) => return Ok(returned),
                    }
                }
                Ok(Completion::Normal(last))
            }
            Statement::Return(argument) => {
                let value = match argument {
                    Some(argument) => self.eval(argument, scope)?,
                    None => JsValue::Undefined,
                };
                Ok(Completion::Return(value))
            }
            Statement::Throw(argument) => {
                let value = self.eval(argument, scope)?;
                Err(EvalFailure::thrown(self.to_display_string(&value)?))
            }
            Statement::Block(body) => self.exec_statements(body, scope),
            Statement::Expression(expression) => {
                Ok(Completion::Normal(Some(self.eval(expression, scope)?)))
            }
        }
    }

    // -- Expressions --------------------------------------------------------

    fn eval(&mut self, expression: &Expression, scope: Scope) -> Result<JsValue, EvalFailure> {
        match expression {
            Expression::Number(value) => Ok(JsValue::Number(*value)),
            Expression::String(value) => Ok(JsValue::Str(value.clone())),
            Expression::Bool(value) => Ok(JsValue::Bool(*value)),
            Expression::Null => Ok(JsValue::Null),
            Expression::This => self.this_value(scope),
            Expression::Identifier(name) => self.read_identifier(scope, name),
            Expression::Array(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(match element {
                        Some(element) => Some(self.eval(element, scope)?),
                        None => None,
                    });
                }
                Ok(JsValue::Object(self.alloc_array(values)))
            }
            Expression::Object(properties) => {
                let object = self.new_object();
                for (key, value) in properties {
                    let value = self.eval(value, scope)?;
                    self.heap.define_property(
                        object,
                        PropertyKey::from(key.as_str()),
                        PropertyDescriptor::data(value),
                    )?;
                }
                Ok(JsValue::Object(object))
            }
            Expression::Function(literal) => {
                Ok(JsValue::Object(self.create_function_expression(literal, scope)))
            }
            Expression::Unary { op, argument } => self.eval_unary(*op, argument, scope),
            Expression::Binary { op, left, right } => {
                let left = self.eval(left, scope)?;
                let right = self.eval(right, scope)?;
                self.apply_binary(*op, &left, &right)
            }
            Expression::Logical { op, left, right } => {
                let left = self.eval(left, scope)?;
                let short_circuit = match op {
                    LogicalOp::And => !to_boolean(&left),
                    LogicalOp::Or => to_boolean(&left),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(right, scope)
                }
            }
            Expression::Conditional {
                test,
                consequent,
                alternate,
            } => {
                let test = self.eval(test, scope)?;
                if to_boolean(&test) {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }
            Expression::Assign { op, target, value } => {
                self.eval_assign(*op, target, value, scope)
            }
            Expression::Sequence(items) => {
                let mut last = JsValue::Undefined;
                for item in items {
                    last = self.eval(item, scope)?;
                }
                Ok(last)
            }
            Expression::Member { object, property } => {
                let base = self.eval(object, scope)?;
                let key = self.member_key(property, scope)?;
                self.get_member(&base, &key)
            }
            Expression::Call { callee, arguments } => self.eval_call(callee, arguments, scope),
            Expression::New { callee, arguments } => {
                let constructor = self.eval(callee, scope)?;
                let arguments = self.eval_arguments(arguments, scope)?;
                self.construct(&constructor, &arguments, &describe_callee(callee))
            }
        }
    }

    fn eval_arguments(
        &mut self,
        arguments: &[Expression],
        scope: Scope,
    ) -> Result<Vec<JsValue>, EvalFailure> {
        arguments
            .iter()
            .map(|argument| self.eval(argument, scope))
            .collect()
    }

    fn eval_call(
        &mut self,
        callee: &Expression,
        arguments: &[Expression],
        scope: Scope,
    ) -> Result<JsValue, EvalFailure> {
        let (function, this) = match callee {
            Expression::Member { object, property } => {
                let base = self.eval(object, scope)?;
                let key = self.member_key(property, scope)?;
                (self.get_member(&base, &key)?, base)
            }
            other => (self.eval(other, scope)?, JsValue::Undefined),
        };
        let arguments = self.eval_arguments(arguments, scope)?;
        if !self.heap.is_callable(&function) {
            return Err(EvalFailure::type_error(format!(
                "{} is not a function",
                describe_callee(callee)
            )));
        }
        self.call_function(&function, this, &arguments)
    }

    fn eval_unary(
        &mut self,
        op: UnaryOp,
        argument: &Expression,
        scope: Scope,
    ) -> Result<JsValue, EvalFailure> {
        match op {
            UnaryOp::TypeOf => {
                let value = match argument {
                    Expression::Identifier(name) => self.lookup_identifier(scope, name)?,
                    other => Some(self.eval(other, scope)?),
                };
                let name = value.map_or("undefined", |value| self.heap.type_of(&value));
                Ok(JsValue::Str(name.to_string()))
            }
            UnaryOp::Delete => match argument {
                Expression::Member { object, property } => {
                    let base = self.eval(object, scope)?;
                    let key = self.member_key(property, scope)?;
                    match base {
                        JsValue::Object(handle) => {
                            Ok(JsValue::Bool(self.heap.delete_property(handle, &key)?))
                        }
                        JsValue::Undefined | JsValue::Null => Err(EvalFailure::type_error(
                            format!("Cannot convert {} to object", base.type_name()),
                        )),
                        _ => Ok(JsValue::Bool(true)),
                    }
                }
                Expression::Identifier(name) => {
                    if self.find_binding(scope, name)?.is_some() {
                        return Ok(JsValue::Bool(false));
                    }
                    let deleted = self
                        .heap
                        .delete_property(self.global, &PropertyKey::from(name.as_str()))?;
                    Ok(JsValue::Bool(deleted))
                }
                other => {
                    self.eval(other, scope)?;
                    Ok(JsValue::Bool(true))
                }
            },
            UnaryOp::Void => {
                self.eval(argument, scope)?;
                Ok(JsValue::Undefined)
            }
            UnaryOp::Not => {
                let value = self.eval(argument, scope)?;
                Ok(JsValue::Bool(!to_boolean(&value)))
            }
            UnaryOp::Minus => {
                let value = self.eval(argument, scope)?;
                Ok(JsValue::Number(-self.to_number(&value)))
            }
            UnaryOp::Plus => {
                let value = self.eval(argument, scope)?;
                Ok(JsValue::Number(self.to_number(&value)))
            }
            UnaryOp::BitNot => {
                let value = self.eval(argument, scope)?;
                Ok(JsValue::Number(f64::from(!to_int32(self.to_number(&value)))))
            }
        }
    }

    fn eval_assign(
        &mut self,
        op: AssignOp,
        target: &Expression,
        value: &Expression,
        scope: Scope,
    ) -> Result<JsValue, EvalFailure> {
        match target {
            Expression::Identifier(name) => {
                let result = match op {
                    AssignOp::Assign => self.eval(value, scope)?,
                    AssignOp::Compound(binary) => {
                        let current = self.read_identifier(scope, name)?;
                        let operand = self.eval(value, scope)?;
                        self.apply_binary(binary, &current, &operand)?
                    }
                };
                self.assign_identifier(scope, name, result.clone())?;
                Ok(result)
            }
            Expression::Member { object, property } => {
                let base = self.eval(object, scope)?;
                let key = self.member_key(property, scope)?;
                let result = match op {
                    AssignOp::Assign => self.eval(value, scope)?,
                    AssignOp::Compound(binary) => {
                        let current = self.get_member(&base, &key)?;
                        let operand = self.eval(value, scope)?;
                        self.apply_binary(binary, &current, &operand)?
                    }
                };
                self.set_member(&base, key, result.clone())?;
                Ok(result)
            }
            _ => Err(EvalFailure::new(
                EvalFailureKind::Syntax,
                "Invalid assignment target",
            )),
        }
    }

    fn member_key(
        &mut self,
        property: &MemberProperty,
        scope: Scope,
    ) -> Result<PropertyKey, EvalFailure> {
        match property {
            MemberProperty::Named(name) => Ok(PropertyKey::from(name.as_str())),
            MemberProperty::Computed(expression) => {
                let value = self.eval(expression, scope)?;
                self.to_property_key(&value)
            }
        }
    }

    fn get_member(&self, base: &JsValue, key: &PropertyKey) -> Result<JsValue, EvalFailure> {
        match base {
            JsValue::Object(handle) => Ok(self.heap.get_property(*handle, key)?),
            JsValue::Str(text) => Ok(string_property(text, key)),
            JsValue::Undefined | JsValue::Null => Err(EvalFailure::type_error(format!(
                "Cannot read property '{key}' of {}",
                base.type_name()
            ))),
            JsValue::Bool(_) | JsValue::Number(_) => Ok(JsValue::Undefined),
        }
    }

    fn set_member(
        &mut self,
        base: &JsValue,
        key: PropertyKey,
        value: JsValue,
    ) -> Result<(), EvalFailure> {
        match base {
            JsValue::Object(handle) => {
                let coerce_length = key.as_str() == "length"
                    && matches!(self.heap.get(*handle)?.kind, ObjectKind::Array)
                    && !matches!(value, JsValue::Number(_));
                let value = if coerce_length {
                    JsValue::Number(self.to_number(&value))
                } else {
                    value
                };
                self.heap.set_property(*handle, key, value)?;
                Ok(())
            }
            JsValue::Undefined | JsValue::Null => Err(EvalFailure::type_error(format!(
                "Cannot set property '{key}' of {}",
                base.type_name()
            ))),
            _ => Ok(()),
        }
    }

    fn apply_binary(
        &self,
        op: BinaryOp,
        left: &JsValue,
        right: &JsValue,
    ) -> Result<JsValue, EvalFailure> {
        let value = match op {
            BinaryOp::Add => {
                let left = self.to_primitive(left)?;
                let right = self.to_primitive(right)?;
                if matches!(left, JsValue::Str(_)) || matches!(right, JsValue::Str(_)) {
                    let left = self.to_display_string(&left)?;
                    let right = self.to_display_string(&right)?;
                    if left.len() + right.len() > self.limits.max_string_length {
                        return Err(invalid_string_length());
                    }
                    JsValue::Str(left + &right)
                } else {
                    JsValue::Number(self.to_number(&left) + self.to_number(&right))
                }
            }
            BinaryOp::Sub => JsValue::Number(self.to_number(left) - self.to_number(right)),
            BinaryOp::Mul => JsValue::Number(self.to_number(left) * self.to_number(right)),
            BinaryOp::Div => JsValue::Number(self.to_number(left) / self.to_number(right)),
            BinaryOp::Rem => JsValue::Number(self.to_number(left) % self.to_number(right)),
            BinaryOp::Eq => JsValue::Bool(self.loose_equals(left, right)?),
            BinaryOp::NotEq => JsValue::Bool(!self.loose_equals(left, right)?),
            BinaryOp::StrictEq => JsValue::Bool(left.strict_equals(right)),
            BinaryOp::StrictNotEq => JsValue::Bool(!left.strict_equals(right)),
            BinaryOp::Lt => {
                JsValue::Bool(matches!(self.compare(left, right)?, Some(Ordering::Less)))
            }
            BinaryOp::Gt => {
                JsValue::Bool(matches!(self.compare(left, right)?, Some(Ordering::Greater)))
            }
            BinaryOp::LtEq => JsValue::Bool(matches!(
                self.compare(left, right)?,
                Some(Ordering::Less | Ordering::Equal)
            )),
            BinaryOp::GtEq => JsValue::Bool(matches!(
                self.compare(left, right)?,
                Some(Ordering::Greater | Ordering::Equal)
            )),
            BinaryOp::In => {
                let Some(handle) = right.as_object() else {
                    return Err(EvalFailure::type_error(format!(
                        "Cannot use 'in' operator to search for '{}' in {}",
                        self.describe_value(left),
                        self.describe_value(right)
                    )));
                };
                JsValue::Bool(self.heap.has_property(handle, &self.to_property_key(left)?)?)
            }
            BinaryOp::InstanceOf => JsValue::Bool(self.instance_of(left, right)?),
            BinaryOp::BitAnd => self.int32_op(left, right, |a, b| a & b),
            BinaryOp::BitOr => self.int32_op(left, right, |a, b| a | b),
            BinaryOp::BitXor => self.int32_op(left, right, |a, b| a ^ b),
            BinaryOp::Shl => self.int32_op(left, right, |a, b| a.wrapping_shl(b as u32 & 31)),
            BinaryOp::Shr => self.int32_op(left, right, |a, b| a >> (b as u32 & 31)),
            BinaryOp::UShr => {
                let shift = to_uint32(self.to_number(right)) & 31;
                JsValue::Number(f64::from(to_uint32(self.to_number(left)) >> shift))
            }
        };
        Ok(value)
    }

    fn int32_op(&self, left: &JsValue, right: &JsValue, op: impl Fn(i32, i32) -> i32) -> JsValue {
        let left = to_int32(self.to_number(left));
        let right = to_int32(self.to_number(right));
        JsValue::Number(f64::from(op(left, right)))
    }

    fn instance_of(&self, value: &JsValue, constructor: &JsValue) -> Result<bool, EvalFailure> {
        let Some(constructor) = constructor
            .as_object()
            .filter(|_| self.heap.is_callable(constructor))
        else {
            return Err(EvalFailure::type_error(
                "Right-hand side of 'instanceof' is not callable",
            ));
        };
        let Some(object) = value.as_object() else {
            return Ok(false);
        };
        let prototype = self
            .heap
            .get_property(constructor, &PropertyKey::from("prototype"))?;
        let Some(prototype) = prototype.as_object() else {
            return Err(EvalFailure::type_error(
                "Function has non-object prototype in instanceof check",
            ));
        };
        Ok(self.heap.inherits_from(object, prototype)?)
    }

    fn loose_equals(&self, left: &JsValue, right: &JsValue) -> Result<bool, EvalFailure> {
        use JsValue::{Bool, Null, Number, Object, Str, Undefined};
        match (left, right) {
            (Undefined | Null, Undefined | Null) => Ok(true),
            (Undefined | Null, _) | (_, Undefined | Null) => Ok(false),
            (Number(_), Str(_)) | (Str(_), Number(_)) => {
                Ok(self.to_number(left) == self.to_number(right))
            }
            (Bool(_), _) => self.loose_equals(&Number(self.to_number(left)), right),
            (_, Bool(_)) => self.loose_equals(left, &Number(self.to_number(right))),
            (Object(a), Object(b)) => Ok(a == b),
            (Object(_), _) => self.loose_equals(&self.to_primitive(left)?, right),
            (_, Object(_)) => self.loose_equals(left, &self.to_primitive(right)?),
            _ => Ok(left.strict_equals(right)),
        }
    }

    fn compare(&self, left: &JsValue, right: &JsValue) -> Result<Option<Ordering>, EvalFailure> {
        let left = self.to_primitive(left)?;
        let right = self.to_primitive(right)?;
        if let (JsValue::Str(a), JsValue::Str(b)) = (&left, &right) {
            return Ok(Some(a.encode_utf16().cmp(b.encode_utf16())));
        }
        Ok(self.to_number(&left).partial_cmp(&self.to_number(&right)))
    }

    // -- Conversions --------------------------------------------------------

    /// Objects convert through their default string form; no user code runs.
    fn to_primitive(&self, value: &JsValue) -> Result<JsValue, EvalFailure> {
        match value {
            JsValue::Object(_) => Ok(JsValue::Str(self.to_display_string(value)?)),
            other => Ok(other.clone()),
        }
    }

    pub fn to_property_key(&self, value: &JsValue) -> Result<PropertyKey, EvalFailure> {
        Ok(PropertyKey::from(self.to_display_string(value)?))
    }

    /// A string form for error messages. An array too long to convert
    /// shows as `[object Array]`.
    fn describe_value(&self, value: &JsValue) -> String {
        self.to_display_string(value)
            .unwrap_or_else(|_| "[object Array]".to_string())
    }

    pub fn to_number(&self, value: &JsValue) -> f64 {
        match value {
            JsValue::Undefined => f64::NAN,
            JsValue::Null => 0.0,
            JsValue::Bool(b) => f64::from(u8::from(*b)),
            JsValue::Number(n) => *n,
            JsValue::Str(text) => string_to_number(text),
            // A conversion too long to build holds separators, so it is NaN.
            JsValue::Object(_) => self
                .to_display_string(value)
                .map_or(f64::NAN, |text| string_to_number(&text)),
        }
    }

    /// The default string conversion.
    ///
    /// Functions render as their source text, arrays as their comma-joined
    /// elements (a cycle renders as the empty string), other objects as
    /// `[object Object]`. Never runs user code. An array whose text would
    /// pass `max_string_length` is a `RangeError`.
    pub fn to_display_string(&self, value: &JsValue) -> Result<String, EvalFailure> {
        let mut in_progress = BTreeSet::new();
        self.display_inner(value, &mut in_progress)
    }

    fn display_inner(
        &self,
        value: &JsValue,
        in_progress: &mut BTreeSet<ObjectHandle>,
    ) -> Result<String, EvalFailure> {
        let text = match value {
            JsValue::Undefined => "undefined".to_string(),
            JsValue::Null => "null".to_string(),
            JsValue::Bool(b) => b.to_string(),
            JsValue::Number(n) => number_to_string(*n),
            JsValue::Str(text) => text.clone(),
            JsValue::Object(handle) => {
                let Ok(object) = self.heap.get(*handle) else {
                    return Ok("[object Object]".to_string());
                };
                match &object.kind {
                    ObjectKind::Function(data) => data.source.clone(),
                    ObjectKind::Native(id) => {
                        let name = self
                            .natives
                            .get(id.0 as usize)
                            .map_or("", |entry| entry.name.as_str());
                        format!("function {name}() {{ [native code] }}")
                    }
                    ObjectKind::Plain => "[object Object]".to_string(),
                    ObjectKind::Array => {
                        if !in_progress.insert(*handle) {
                            return Ok(String::new());
                        }
                        let joined = self.join_array(*handle, in_progress);
                        in_progress.remove(handle);
                        joined?
                    }
                }
            }
        };
        Ok(text)
    }

    /// Joins only the elements that exist; holes cost one separator each.
    fn join_array(
        &self,
        handle: ObjectHandle,
        in_progress: &mut BTreeSet<ObjectHandle>,
    ) -> Result<String, EvalFailure> {
        let length = match self.heap.get_property(handle, &PropertyKey::from("length")) {
            Ok(JsValue::Number(length)) => to_uint32(length),
            _ => 0,
        };
        let Some(separators) = length.checked_sub(1) else {
            return Ok(String::new());
        };
        let limit = self.limits.max_string_length;
        if separators as usize > limit {
            return Err(invalid_string_length());
        }
        let mut joined = String::new();
        let mut written: u32 = 0;
        for index in self.heap.present_indices(handle, length)? {
            let element = self
                .heap
                .get_property(handle, &PropertyKey::from(index.to_string()));
            let text = match element {
                Ok(JsValue::Undefined | JsValue::Null) | Err(_) => continue,
                Ok(value) => self.display_inner(&value, in_progress)?,
            };
            let pending = (separators - written) as usize;
            if joined.len() + pending + text.len() > limit {
                return Err(invalid_string_length());
            }
            joined.extend(std::iter::repeat_n(',', (index - written) as usize));
            written = index;
            joined.push_str(&text);
        }
        joined.extend(std::iter::repeat_n(',', (separators - written) as usize));
        Ok(joined)
    }
}

fn invalid_string_length() -> EvalFailure {
    EvalFailure::range("Invalid string length")
}

fn describe_callee(callee: &Expression) -> String {
    match callee {
        Expression::Identifier(name) => name.clone(),
        Expression::This => "this".to_string(),
        Expression::Member {
            object,
            property: MemberProperty::Named(name),
        } => format!("{}.{name}", describe_callee(object)),
        Expression::Member { object, .. } => format!("{}[...]", describe_callee(object)),
        _ => "expression".to_string(),
    }
}

fn string_property(text: &str, key: &PropertyKey) -> JsValue {
    if key.as_str() == "length" {
        return JsValue::Number(text.encode_utf16().count() as f64);
    }
    key.array_index()
        .and_then(|index| text.encode_utf16().nth(index as usize))
        .map_or(JsValue::Undefined, |unit| {
            JsValue::Str(String::from_utf16_lossy(&[unit]))
        })
}

/// ES5 `ToUint32`: truncate, then wrap modulo 2^32. Non-finite values give 0.
pub fn to_uint32(number: f64) -> u32 {
    if !number.is_finite() {
        return 0;
    }
    number.trunc().rem_euclid(4_294_967_296.0) as u32
}

pub fn to_int32(number: f64) -> i32 {
    to_uint32(number) as i32
}

pub fn to_boolean(value: &JsValue) -> bool {
    match value {
        JsValue::Undefined | JsValue::Null => false,
        JsValue::Bool(b) => *b,
        JsValue::Number(n) => *n != 0.0 && !n.is_nan(),
        JsValue::Str(text) => !text.is_empty(),
        JsValue::Object(_) => true,
    }
}

fn string_to_number(text: &str) -> f64 {
    let trimmed = text.trim_matches(|ch: char| ch.is_whitespace() || ch == '\u{feff}');
    if trimmed.is_empty() {
        return 0.0;
    }
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        if hex.is_empty() || !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return f64::NAN;
        }
        return hex.chars().fold(0.0, |acc, ch| {
            acc * 16.0 + f64::from(ch.to_digit(16).unwrap_or(0))
        });
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if trimmed
            .chars()
            .all(|ch| ch.is_ascii_digit() || matches!(ch, '.' | 'e' | 'E' | '+' | '-')) =>
        {
            trimmed.parse::<f64>().unwrap_or(f64::NAN)
        }
        _ => f64::NAN,
    }
}

/// Format a number the way `Number.prototype.toString()` does.
pub fn number_to_string(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let sign = if value < 0.0 { "-" } else { "" };
    // `{:e}` yields the shortest round-tripping digits.
    let scientific = format!("{:e}", value.abs());
    let (mantissa, exponent) = scientific
        .split_once('e')
        .unwrap_or((scientific.as_str(), "0"));
    let digits: String = mantissa.chars().filter(|ch| *ch != '.').collect();
    let k = digits.len() as i32;
    let n = exponent.parse::<i32>().unwrap_or(0) + 1;

    let body = if k <= n && n <= 21 {
        format!("{digits}{}", "0".repeat((n - k) as usize))
    } else if 0 < n && n <= 21 {
        let (integral, fraction) = digits.split_at(n as usize);
        format!("{integral}.{fraction}")
    } else if -6 < n && n <= 0 {
        format!("0.{}{digits}", "0".repeat((-n) as usize))
    } else {
        let exponent = n - 1;
        let exponent_sign = if exponent >= 0 { '+' } else { '-' };
        let (first, rest) = digits.split_at(1);
        if rest.is_empty() {
            format!("{first}e{exponent_sign}{}", exponent.abs())
        } else {
            format!("{first}.{rest}e{exponent_sign}{}", exponent.abs())
        }
    };
    format!("{sign}{body}")
}

fn builtin_string(
    realm: &mut Realm,
    _this: &JsValue,
    arguments: &[JsValue],
) -> Result<JsValue, EvalFailure> {
    let text = arguments
        .first()
        .map(|value| realm.to_display_string(value))
        .transpose()?
        .unwrap_or_default();
    Ok(JsValue::Str(text))
}

fn builtin_number(
    realm: &mut Realm,
    _this: &JsValue,
    arguments: &[JsValue],
) -> Result<JsValue, EvalFailure> {
    let number = arguments
        .first()
        .map_or(0.0, |value| realm.to_number(value));
    Ok(JsValue::Number(number))
}

fn builtin_boolean(
    _realm: &mut Realm,
    _this: &JsValue,
    arguments: &[JsValue],
) -> Result<JsValue, EvalFailure> {
    Ok(JsValue::Bool(arguments.first().is_some_and(to_boolean)))
}
