//! End-to-end edit round trips through `EditController`.
//!
//! Focus areas:
//! - Handle stability across registrations and edits
//! - Load/save symmetry for string values
//! - Only the first expression of a submission runs
//! - Failed saves leave the target untouched
//! - State transplant between composite values
//! - Bad-target errors as a separate class

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use frankenengine_live_edit::edit_link::parse_edit_link;
use frankenengine_live_edit::object_model::PropertyKey;
use frankenengine_live_edit::{
    EditConfig, EditController, EditHandle, EditRequest, EditResponse, EditStatus, JsValue,
    LiveEditError, LiveEditErrorCode, ParserLimits, Realm,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn controller(seed: &str) -> EditController {
    let mut realm = Realm::new();
    realm
        .run_script(seed, ParserLimits::default())
        .expect("seed script");
    EditController::with_config(realm, EditConfig::default())
}

fn save(
    controller: &mut EditController,
    handle: EditHandle,
    key: &str,
    text: &str,
) -> EditResponse {
    controller
        .handle_request(EditRequest::save(handle, key, text))
        .expect("save response")
}

fn load(controller: &mut EditController, handle: EditHandle, key: &str) -> String {
    let response = controller
        .handle_request(EditRequest::load(handle, key))
        .expect("load response");
    assert_eq!(response.status, EditStatus::Unmodified);
    response.source_text
}

fn eval(controller: &mut EditController, source: &str) -> JsValue {
    controller
        .realm_mut()
        .run_script(source, ParserLimits::default())
        .expect("script")
}

// ===========================================================================
// 1. Registry
// ===========================================================================

#[test]
fn handles_are_stable_and_sequential() {
    let mut controller = controller("var a = {}; var b = {}; var f = function () {};");
    let a = controller.register_global("a").expect("a");
    let b = controller.register_global("b").expect("b");
    let f = controller.register_global("f").expect("f");
    assert_eq!((a, b, f), (EditHandle(0), EditHandle(1), EditHandle(2)));
    assert_eq!(controller.register_global("b"), Ok(b));
    assert_eq!(controller.register_global("a"), Ok(a));
    assert_eq!(controller.registry().len(), 3);
}

#[test]
fn structurally_equal_objects_get_distinct_handles() {
    let mut controller = controller("var x = {k: 1}; var y = {k: 1};");
    let x = controller.register_global("x").expect("x");
    let y = controller.register_global("y").expect("y");
    assert_ne!(x, y);
}

#[test]
fn handle_survives_edits_to_its_object() {
    let mut controller = controller("var o = {k: 1};");
    let handle = controller.register_global("o").expect("register");
    save(&mut controller, handle, "k", "{nested: true}");
    save(&mut controller, handle, "other", "2");
    assert_eq!(controller.register_global("o"), Ok(handle));
    assert_eq!(load(&mut controller, handle, "other"), "2");
}

// ===========================================================================
// 2. Load/save round trip
// ===========================================================================

#[test]
fn string_with_apostrophe_round_trips() {
    let mut controller = controller(r#"var o = {s: "it's fine"};"#);
    let handle = controller.register_global("o").expect("register");
    let loaded = load(&mut controller, handle, "s");
    assert_eq!(loaded, r"'it\'s fine'");

    let response = save(&mut controller, handle, "s", &loaded);
    assert_eq!(response.status, EditStatus::Saved);
    assert_eq!(response.source_text, loaded);
    assert_eq!(
        eval(&mut controller, "o.s"),
        JsValue::Str("it's fine".to_string())
    );
    assert_eq!(load(&mut controller, handle, "s"), loaded);
}

#[test]
fn saving_a_new_key_creates_an_own_property() {
    let mut controller = controller("var o = {};");
    let handle = controller.register_global("o").expect("register");
    assert_eq!(load(&mut controller, handle, "fresh"), "undefined");
    assert_eq!(save(&mut controller, handle, "fresh", "[1, 2]").status, EditStatus::Saved);
    assert_eq!(load(&mut controller, handle, "fresh"), "1,2");
}

#[test]
fn saved_functions_are_callable() {
    let mut controller = controller("var o = {};");
    let handle = controller.register_global("o").expect("register");
    let response = save(
        &mut controller,
        handle,
        "twice",
        "function (n) { return n * 2; }",
    );
    assert_eq!(response.status, EditStatus::Saved);
    assert_eq!(eval(&mut controller, "o.twice(21)"), JsValue::Number(42.0));
    assert_eq!(
        load(&mut controller, handle, "twice"),
        "function (n) { return n * 2; }"
    );
}

#[test]
fn name_is_echoed() {
    let mut controller = controller("var o = {k: 1};");
    let handle = controller.register_global("o").expect("register");
    let response = controller
        .handle_request(EditRequest::load(handle, "k").with_name("settings"))
        .expect("response");
    assert_eq!(response.name.as_deref(), Some("settings"));
    assert_eq!(response.handle, handle);
    assert_eq!(response.key, "k");
}

// ===========================================================================
// 3. Expression bounding
// ===========================================================================

#[test]
fn trailing_statements_never_run() {
    let mut controller = controller("var o = {k: 0};");
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    controller
        .realm_mut()
        .define_native("doEvilThing", move |_realm, _this, _args| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(JsValue::Undefined)
        })
        .expect("native");
    let handle = controller.register_global("o").expect("register");

    let response = save(&mut controller, handle, "k", "1+1; doEvilThing()");
    assert_eq!(response.status, EditStatus::Saved);
    assert_eq!(response.source_text, "1+1");
    assert_eq!(eval(&mut controller, "o.k"), JsValue::Number(2.0));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // The native itself works when called deliberately.
    eval(&mut controller, "doEvilThing()");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn trailing_line_comment_is_harmless() {
    let mut controller = controller("var o = {};");
    let handle = controller.register_global("o").expect("register");
    let response = save(&mut controller, handle, "k", "7 // seven");
    assert_eq!(response.status, EditStatus::Saved);
    assert_eq!(response.source_text, "7");
}

#[test]
fn bitwise_expressions_save_whole() {
    let mut controller = controller("var o = {flags: 1};");
    let handle = controller.register_global("o").expect("register");
    let response = save(&mut controller, handle, "flags", "1 | 4");
    assert_eq!(response.status, EditStatus::Saved);
    assert_eq!(response.source_text, "1 | 4");
    assert_eq!(load(&mut controller, handle, "flags"), "5");

    let response = save(&mut controller, handle, "flags", "o.flags >>> 1; o.flags = 0");
    assert_eq!(response.source_text, "o.flags >>> 1");
    assert_eq!(load(&mut controller, handle, "flags"), "2");
}

#[test]
fn unknown_character_fails_the_save_instead_of_truncating() {
    let mut controller = controller("var o = {k: 1};");
    let handle = controller.register_global("o").expect("register");
    let response = save(&mut controller, handle, "k", "2 @ 3");
    assert!(
        response.status.to_string().starts_with("error: SyntaxError: "),
        "{}",
        response.status
    );
    assert_eq!(response.source_text, "2 @ 3");
    assert_eq!(load(&mut controller, handle, "k"), "1");
}

// ===========================================================================
// 4. Failure isolation
// ===========================================================================

#[test]
fn parse_failure_reports_and_leaves_value() {
    let mut controller = controller("var o = {k: 'keep'};");
    let handle = controller.register_global("o").expect("register");
    let response = save(&mut controller, handle, "k", "{");
    assert_eq!(
        response.status,
        EditStatus::Error("SyntaxError: Unexpected end of input (1:1)".to_string())
    );
    assert_eq!(response.source_text, "{");
    assert_eq!(load(&mut controller, handle, "k"), "'keep'");
}

#[test]
fn empty_submission_is_a_parse_error() {
    let mut controller = controller("var o = {k: 1};");
    let handle = controller.register_global("o").expect("register");
    let response = save(&mut controller, handle, "k", "");
    assert!(response.status.is_error());
    assert!(response.status.to_string().starts_with("error: SyntaxError: "));
    assert_eq!(load(&mut controller, handle, "k"), "1");
}

#[test]
fn evaluation_failure_reports_extracted_text() {
    let mut controller = controller("var o = {k: 1};");
    let handle = controller.register_global("o").expect("register");
    let response = save(&mut controller, handle, "k", "missing.field; 2");
    assert_eq!(
        response.status,
        EditStatus::Error("ReferenceError: missing is not defined".to_string())
    );
    assert_eq!(response.source_text, "missing.field");
    assert_eq!(load(&mut controller, handle, "k"), "1");
}

#[test]
fn thrown_values_become_error_status() {
    let mut controller = controller("var o = {k: 1}; function fail() { throw 'nope'; }");
    let handle = controller.register_global("o").expect("register");
    let response = save(&mut controller, handle, "k", "fail()");
    assert_eq!(response.status, EditStatus::Error("nope".to_string()));
    assert_eq!(load(&mut controller, handle, "k"), "1");
}

#[test]
fn invalid_array_length_is_a_range_error_status() {
    let mut controller = controller("var o = {k: 1}; var list = [1, 2, 3];");
    let handle = controller.register_global("o").expect("register");
    let response = save(
        &mut controller,
        handle,
        "k",
        "function () { var a = []; a.length = 1e300; return a; }()",
    );
    assert_eq!(
        response.status,
        EditStatus::Error("RangeError: Invalid array length".to_string())
    );
    assert_eq!(load(&mut controller, handle, "k"), "1");

    let list = controller.register_global("list").expect("register");
    let response = save(&mut controller, list, "length", "-1");
    assert_eq!(
        response.status,
        EditStatus::Error("RangeError: Invalid array length".to_string())
    );
    assert_eq!(load(&mut controller, list, "length"), "3");
    assert_eq!(save(&mut controller, list, "length", "1").status, EditStatus::Saved);
    assert_eq!(load(&mut controller, handle, "k"), "1");
    assert_eq!(eval(&mut controller, "'' + list"), JsValue::Str("1".into()));
}

#[test]
fn huge_sparse_arrays_load_without_panicking() {
    let mut controller = controller(
        "var o = {}; o.sparse = []; o.sparse[2] = 'x'; o.sparse.length = 50000; \
         o.huge = []; o.huge.length = 4294967295;",
    );
    let handle = controller.register_global("o").expect("register");
    let sparse = load(&mut controller, handle, "sparse");
    assert_eq!(sparse.len(), 49_999 + 1);
    assert!(sparse.starts_with(",,x,,"));

    let response = controller
        .handle_request(EditRequest::load(handle, "huge"))
        .expect("load response");
    assert_eq!(
        response.status,
        EditStatus::Error("RangeError: Invalid string length".to_string())
    );
    assert_eq!(response.source_text, "");
    // The controller keeps serving requests.
    assert_eq!(load(&mut controller, handle, "missing"), "undefined");
}

// ===========================================================================
// 5. Transplant
// ===========================================================================

#[test]
fn replacement_keeps_old_keys_it_does_not_define() {
    let mut controller = controller("var o = {cfg: {a: 1, b: 2}}; var before = o.cfg;");
    let handle = controller.register_global("o").expect("register");
    assert_eq!(save(&mut controller, handle, "cfg", "{b: 3}").status, EditStatus::Saved);
    assert_eq!(eval(&mut controller, "o.cfg.a"), JsValue::Number(1.0));
    assert_eq!(eval(&mut controller, "o.cfg.b"), JsValue::Number(3.0));
    // The replaced object is untouched and no longer installed.
    assert_eq!(eval(&mut controller, "before.b"), JsValue::Number(2.0));
    assert_eq!(eval(&mut controller, "before === o.cfg"), JsValue::Bool(false));
}

#[test]
fn primitive_replacement_skips_transplant() {
    let mut controller = controller("var o = {k: 5};");
    let handle = controller.register_global("o").expect("register");
    assert_eq!(save(&mut controller, handle, "k", "'hello'").status, EditStatus::Saved);
    assert_eq!(load(&mut controller, handle, "k"), "'hello'");
    let transplant = controller
        .events()
        .iter()
        .find(|event| event.event == "transplant")
        .expect("transplant event");
    assert_eq!(transplant.outcome, "skip");
}

#[test]
fn function_state_carries_to_new_function() {
    let mut controller =
        controller("var o = {}; o.handler = function () { return 1; }; o.handler.hits = 3;");
    let handle = controller.register_global("o").expect("register");
    save(&mut controller, handle, "handler", "function () { return 2; }");
    assert_eq!(eval(&mut controller, "o.handler()"), JsValue::Number(2.0));
    assert_eq!(eval(&mut controller, "o.handler.hits"), JsValue::Number(3.0));
}

// ===========================================================================
// 6. Bad targets
// ===========================================================================

#[test]
fn handle_one_past_the_end_is_not_found() {
    let mut controller = controller("var a = {}; var b = {};");
    controller.register_global("a").expect("a");
    controller.register_global("b").expect("b");
    let err = controller
        .handle_request(EditRequest::load(EditHandle(2), "k"))
        .expect_err("unknown handle");
    assert_eq!(
        err,
        LiveEditError::HandleNotFound {
            handle: EditHandle(2)
        }
    );
    assert!(err.is_bad_target());
    assert_eq!(err.stable_code(), "FE-LIVEEDIT-0002");

    let err = controller
        .handle_request(EditRequest::save(EditHandle(2), "k", "1"))
        .expect_err("unknown handle");
    assert_eq!(err.code(), LiveEditErrorCode::HandleNotFound);
    assert_eq!(controller.registry().len(), 2);
}

#[test]
fn primitives_cannot_be_registered() {
    let mut controller = controller("var s = 'text';");
    for value in [
        JsValue::Undefined,
        JsValue::Null,
        JsValue::Bool(true),
        JsValue::Number(1.0),
        JsValue::Str("text".into()),
    ] {
        let err = controller.register(&value).expect_err("primitive");
        assert_eq!(err.code(), LiveEditErrorCode::InvalidTarget);
    }
    assert!(controller.registry().is_empty());
}

// ===========================================================================
// 7. Links and wire format
// ===========================================================================

#[test]
fn edit_link_resolves_back_to_the_same_property() {
    let mut controller = controller("var settings = {theme: 'dark'};");
    let value = controller.realm().get_global("settings").expect("global");
    let link = controller
        .edit_link(&value, Some("Settings"), Some("theme"))
        .expect("link");
    let parsed = parse_edit_link(&link).expect("parse");
    let key = parsed.key.expect("key");
    let response = controller
        .handle_request(EditRequest::load(parsed.handle, key))
        .expect("response");
    assert_eq!(response.source_text, "'dark'");
}

#[test]
fn requests_deserialize_from_camel_case_json() {
    let mut controller = controller("var o = {k: 1};");
    let handle = controller.register_global("o").expect("register");
    let request: EditRequest =
        serde_json::from_str(r#"{"handle": 0, "key": "k", "text": "k + 1", "name": "o"}"#)
            .expect("request");
    assert_eq!(request.handle, handle);
    let response = controller.handle_request(request).expect("response");
    // `k` is not a global, so evaluation fails in global scope.
    assert_eq!(
        serde_json::to_value(&response).expect("json"),
        serde_json::json!({
            "sourceText": "k + 1",
            "status": "error: ReferenceError: k is not defined",
            "handle": 0,
            "key": "k",
            "name": "o"
        })
    );
}

#[test]
fn own_property_is_edited_not_inherited_one() {
    let mut controller =
        controller("function Base() {} Base.prototype.mode = 'base'; var o = new Base();");
    let handle = controller.register_global("o").expect("register");
    assert_eq!(load(&mut controller, handle, "mode"), "undefined");
    save(&mut controller, handle, "mode", "'own'");
    assert_eq!(eval(&mut controller, "o.mode"), JsValue::Str("own".into()));
    assert_eq!(
        eval(&mut controller, "Base.prototype.mode"),
        JsValue::Str("base".into())
    );
    let object = controller.registry().resolve(handle).expect("object");
    assert!(
        controller
            .realm()
            .heap()
            .get_own_property(object, &PropertyKey::from("mode"))
            .expect("lookup")
            .is_some()
    );
}
