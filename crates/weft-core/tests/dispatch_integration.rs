//! Join-point dispatch through `AspectProxy::invoke`
//!
//! Covers ordering on success and failure, around replacement, throw
//! re-raise, advice forms, and per-call context isolation.

mod common;

use std::sync::Arc;

use common::{entries, new_log, real_calls, record, Cart, Log, Timer};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde_json::json;
use weft_core::{
    Advice, AdviceRegistry, AspectError, AspectProxy, Failure, Invocation, JoinPointKind, Managed,
    TypeDescriptor, Value,
};

fn proxy() -> AspectProxy {
    common::cart_proxy(AdviceRegistry::new())
}

fn add(log: &Log, proxy: &mut AspectProxy, kind: JoinPointKind, pointcut: &str, label: &str) {
    proxy
        .register_advice(kind, pointcut, Advice::function(label, record(log, label)))
        .unwrap();
}

fn proceeding_around(log: &Log) -> Advice {
    let log = Arc::clone(log);
    Advice::function("around", move |inv| {
        log.lock().push("around".to_string());
        inv.proceed()
    })
}

fn register_all_kinds(log: &Log, proxy: &mut AspectProxy, pointcut: &str) {
    add(log, proxy, JoinPointKind::Before, pointcut, "before");
    proxy
        .register_advice(JoinPointKind::Around, pointcut, proceeding_around(log))
        .unwrap();
    add(log, proxy, JoinPointKind::After, pointcut, "after");
    add(log, proxy, JoinPointKind::Throw, pointcut, "throw");
    add(log, proxy, JoinPointKind::AfterAnyway, pointcut, "after-anyway");
}

// ────────────────────────────────────────────────────────────────────────────
// Ordering
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_success_order_skips_throw() {
    let log = new_log();
    let mut proxy = proxy();
    register_all_kinds(&log, &mut proxy, "Shop\\Cart->*()");

    let result = proxy.invoke("addItem", vec![json!("apple")]).unwrap();

    assert_eq!(result, json!(1));
    assert_eq!(entries(&log), ["before", "around", "after", "after-anyway"]);
}

#[test]
fn test_failure_order_skips_after() {
    let log = new_log();
    let mut proxy = proxy();
    register_all_kinds(&log, &mut proxy, "Shop\\Cart->*()");

    let err = proxy.invoke("checkout", Vec::new()).unwrap_err();

    assert!(err.is_call_failure());
    assert_eq!(err.failure().unwrap().kind(), "EmptyCart");
    assert_eq!(entries(&log), ["before", "around", "throw", "after-anyway"]);
}

#[test]
fn test_failure_without_around_goes_to_throw() {
    let log = new_log();
    let mut proxy = proxy();
    add(&log, &mut proxy, JoinPointKind::Before, "Shop\\Cart->checkout()", "before");
    add(&log, &mut proxy, JoinPointKind::After, "Shop\\Cart->checkout()", "after");
    add(&log, &mut proxy, JoinPointKind::Throw, "Shop\\Cart->checkout()", "throw");

    assert!(proxy.invoke("checkout", Vec::new()).is_err());
    assert_eq!(entries(&log), ["before", "throw"]);
}

#[test]
fn test_every_matching_row_runs_in_registration_order() {
    let log = new_log();
    let mut proxy = proxy();
    add(&log, &mut proxy, JoinPointKind::Before, "Shop\\Cart->add*()", "first");
    add(&log, &mut proxy, JoinPointKind::Before, "Shop\\Cart->removeItem()", "skipped");
    add(&log, &mut proxy, JoinPointKind::Before, "Shop\\*->*()", "second");
    add(&log, &mut proxy, JoinPointKind::After, "*()", "never");
    add(&log, &mut proxy, JoinPointKind::After, "Shop\\Cart->addItem()", "after");

    proxy.invoke("addItem", vec![json!("pear")]).unwrap();

    assert_eq!(entries(&log), ["first", "second", "after"]);
}

#[test]
fn test_reregistering_replaces_advice() {
    let log = new_log();
    let mut proxy = proxy();
    add(&log, &mut proxy, JoinPointKind::Before, "Shop\\Cart->addItem()", "old");
    add(&log, &mut proxy, JoinPointKind::After, "Shop\\Cart->addItem()", "after");
    add(&log, &mut proxy, JoinPointKind::Before, "Shop\\Cart->addItem()", "new");

    assert_eq!(proxy.registrations().len(), 2);
    proxy.invoke("addItem", vec![json!("fig")]).unwrap();
    assert_eq!(entries(&log), ["new", "after"]);
}

#[test]
fn test_unknown_method_fires_nothing() {
    let log = new_log();
    let mut proxy = proxy();
    register_all_kinds(&log, &mut proxy, "Shop\\Cart->*()");

    let err = proxy.invoke("fly", Vec::new()).unwrap_err();

    assert!(matches!(err, AspectError::UnknownMethod { ref method, .. } if method == "fly"));
    assert!(entries(&log).is_empty());
    assert_eq!(real_calls(&proxy), 0);
}

// ────────────────────────────────────────────────────────────────────────────
// Around
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_around_without_proceed_blocks_real_call() {
    let mut proxy = proxy();
    proxy
        .register_advice(
            JoinPointKind::Around,
            "Shop\\Cart->addItem()",
            Advice::function("block", |_inv| Ok(json!("blocked"))),
        )
        .unwrap();

    let result = proxy.invoke("addItem", vec![json!("apple")]).unwrap();

    assert_eq!(result, json!("blocked"));
    assert_eq!(real_calls(&proxy), 0);
}

#[test]
fn test_around_null_result_is_kept() {
    let mut proxy = proxy();
    proxy
        .register_advice(
            JoinPointKind::Around,
            "Shop\\Cart->count()",
            Advice::function("nothing", |_inv| Ok(Value::Null)),
        )
        .unwrap();

    assert_eq!(proxy.invoke("count", Vec::new()).unwrap(), Value::Null);
    assert_eq!(real_calls(&proxy), 0);
}

#[test]
fn test_first_matching_around_wins() {
    let mut proxy = proxy();
    proxy
        .register_advice(
            JoinPointKind::Around,
            "Shop\\Cart->add*()",
            Advice::function("first", |_inv| Ok(json!("first"))),
        )
        .unwrap();
    proxy
        .register_advice(
            JoinPointKind::Around,
            "Shop\\Cart->addItem()",
            Advice::function("second", |_inv| Ok(json!("second"))),
        )
        .unwrap();

    assert_eq!(proxy.invoke("addItem", Vec::new()).unwrap(), json!("first"));
}

#[test]
fn test_around_proceeds_with_replacement_args() {
    let mut proxy = proxy();
    proxy
        .register_advice(
            JoinPointKind::Around,
            "Shop\\Cart->addItem()",
            Advice::function("twice", |inv| {
                inv.proceed_with(&[json!("one")])?;
                let count = inv.proceed_with(&[json!("two")])?;
                assert_eq!(inv.proceed_count(), 2);
                Ok(count)
            }),
        )
        .unwrap();

    assert_eq!(proxy.invoke("addItem", vec![json!("ignored")]).unwrap(), json!(2));
    assert_eq!(real_calls(&proxy), 2);
}

#[test]
fn test_proceed_outside_around_is_rejected() {
    let log = new_log();
    let mut proxy = proxy();
    proxy
        .register_advice(
            JoinPointKind::Before,
            "Shop\\Cart->addItem()",
            Advice::function("sneaky", |inv| inv.proceed()),
        )
        .unwrap();
    add(&log, &mut proxy, JoinPointKind::Throw, "Shop\\Cart->addItem()", "throw");
    add(&log, &mut proxy, JoinPointKind::AfterAnyway, "Shop\\Cart->addItem()", "after-anyway");

    let err = proxy.invoke("addItem", Vec::new()).unwrap_err();

    assert!(matches!(err, AspectError::ProceedOutsideAround(ref kind) if kind == "before"));
    assert_eq!(entries(&log), ["after-anyway"]);
    assert_eq!(real_calls(&proxy), 0);
}

// ────────────────────────────────────────────────────────────────────────────
// Throw and after-anyway
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_throw_receives_and_reraises_same_failure() {
    let seen: Arc<Mutex<Option<Failure>>> = Arc::new(Mutex::new(None));
    let mut proxy = proxy();
    let slot = Arc::clone(&seen);
    proxy
        .register_advice(
            JoinPointKind::Throw,
            "Shop\\Cart->*()",
            Advice::function("capture", move |inv| {
                *slot.lock() = inv.failure().cloned();
                Ok(Value::Null)
            }),
        )
        .unwrap();

    let err = proxy.invoke("checkout", Vec::new()).unwrap_err();

    let delivered = seen.lock().clone().expect("throw advice did not run");
    let raised = err.failure().expect("expected a call failure");
    assert!(raised.same(&delivered));
    assert_eq!(raised.message(), "cart is empty");
}

#[test]
fn test_failing_throw_advice_replaces_failure() {
    let mut proxy = proxy();
    proxy
        .register_advice(
            JoinPointKind::Throw,
            "Shop\\Cart->checkout()",
            Advice::function("translate", |inv| {
                let original = inv.failure().map(|f| f.message().to_string()).unwrap_or_default();
                Err(Failure::new("CheckoutError", format!("checkout refused: {}", original)).into())
            }),
        )
        .unwrap();

    let err = proxy.invoke("checkout", Vec::new()).unwrap_err();

    assert_eq!(err.failure().unwrap().kind(), "CheckoutError");
    assert_eq!(err.to_string(), "CheckoutError: checkout refused: cart is empty");
}

#[test]
fn test_failure_in_before_goes_to_throw() {
    let log = new_log();
    let mut proxy = proxy();
    proxy
        .register_advice(
            JoinPointKind::Before,
            "Shop\\Cart->addItem()",
            Advice::function("deny", |_inv| Err(Failure::new("Denied", "read only").into())),
        )
        .unwrap();
    add(&log, &mut proxy, JoinPointKind::Throw, "Shop\\Cart->addItem()", "throw");

    let err = proxy.invoke("addItem", Vec::new()).unwrap_err();

    assert_eq!(err.failure().unwrap().kind(), "Denied");
    assert_eq!(entries(&log), ["throw"]);
    assert_eq!(real_calls(&proxy), 0);
}

#[test]
fn test_after_anyway_failure_surfaces_only_on_success() {
    let mut proxy = proxy();
    proxy
        .register_advice(
            JoinPointKind::AfterAnyway,
            "Shop\\Cart->*()",
            Advice::function("cleanup", |_inv| Err(Failure::new("CleanupError", "disk full").into())),
        )
        .unwrap();

    let err = proxy.invoke("addItem", vec![json!("kiwi")]).unwrap_err();
    assert_eq!(err.failure().unwrap().kind(), "CleanupError");

    let mut empty = common::cart_proxy(AdviceRegistry::new());
    empty
        .register_advice(
            JoinPointKind::AfterAnyway,
            "Shop\\Cart->*()",
            Advice::function("cleanup", |_inv| Err(Failure::new("CleanupError", "disk full").into())),
        )
        .unwrap();
    let err = empty.invoke("checkout", Vec::new()).unwrap_err();
    assert_eq!(err.failure().unwrap().kind(), "EmptyCart");
}

#[test]
fn test_unresolved_self_advice_skips_throw() {
    let log = new_log();
    let mut proxy = proxy();
    proxy
        .register_before("Shop\\Cart->addItem()", "$this->missing")
        .unwrap();
    add(&log, &mut proxy, JoinPointKind::Throw, "Shop\\Cart->addItem()", "throw");
    add(&log, &mut proxy, JoinPointKind::AfterAnyway, "Shop\\Cart->addItem()", "after-anyway");

    let err = proxy.invoke("addItem", Vec::new()).unwrap_err();

    assert!(matches!(err, AspectError::AdviceTargetUnresolved(ref s) if s.contains("Shop\\Cart")));
    assert_eq!(entries(&log), ["after-anyway"]);
}

// ────────────────────────────────────────────────────────────────────────────
// Advice forms and payloads
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_advice_sees_args_and_result() {
    let seen: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    let mut proxy = proxy();
    let sink = Arc::clone(&seen);
    proxy
        .register_advice(
            JoinPointKind::After,
            "Shop\\Cart->addItem()",
            Advice::function("inspect", move |inv| {
                let mut sink = sink.lock();
                sink.push(Value::Array(inv.args().to_vec()));
                sink.push(inv.returned().cloned().unwrap_or(Value::Null));
                Ok(Value::Null)
            }),
        )
        .unwrap();

    proxy.invoke("addItem", vec![json!("plum"), json!(2)]).unwrap();

    assert_eq!(*seen.lock(), vec![json!(["plum", 2]), json!(1)]);
}

#[test]
fn test_self_hosted_advice() {
    let mut proxy = proxy();
    proxy.register_before("Shop\\Cart->checkout()", "$this->verify").unwrap();
    proxy.register_around("Shop\\Cart->addItem()", "$this->wrap").unwrap();

    assert_eq!(proxy.invoke("addItem", vec![json!("fig")]).unwrap(), json!({ "wrapped": 1 }));
    assert_eq!(proxy.invoke("checkout", Vec::new()).unwrap(), json!({ "paid": 1 }));
}

#[test]
fn test_slots_hold_last_advice_result() {
    let seen: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
    let mut proxy = proxy();
    proxy.register_before("Shop\\Cart->addItem()", "$this->verify").unwrap();
    let sink = Arc::clone(&seen);
    proxy
        .register_advice(
            JoinPointKind::After,
            "Shop\\Cart->addItem()",
            Advice::function("read-slot", move |inv| {
                *sink.lock() = inv.slot(JoinPointKind::Before).cloned();
                Ok(Value::Null)
            }),
        )
        .unwrap();

    proxy.invoke("addItem", Vec::new()).unwrap();
    assert_eq!(*seen.lock(), Some(json!(1)));
    proxy.invoke("addItem", Vec::new()).unwrap();
    assert_eq!(*seen.lock(), Some(json!(2)));
}

#[test]
fn test_static_and_free_advice() {
    let log = new_log();
    let mut registry = AdviceRegistry::new();
    registry.register_function("audit\\record", record(&log, "free"));
    registry.register_static("Audit\\Log", "record", record(&log, "static"));
    let mut proxy = common::cart_proxy(registry);

    proxy.register_before("Shop\\Cart->addItem()", "\\audit\\record").unwrap();
    proxy.register_after("Shop\\Cart->addItem()", "Audit\\Log::record").unwrap();
    proxy.invoke("addItem", Vec::new()).unwrap();

    assert_eq!(entries(&log), ["free", "static"]);
}

#[test]
fn test_unregistered_advice_fails_at_registration() {
    let mut proxy = proxy();
    let err = proxy.register_before("Shop\\Cart->addItem()", "audit\\record").unwrap_err();
    assert!(matches!(err, AspectError::AdviceTargetUnresolved(_)));
    assert!(proxy.registrations().is_empty());
}

#[test]
fn test_aspect_is_instantiated_per_call() {
    let seen: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    let mut registry = AdviceRegistry::new();
    registry.register_aspect::<Timer>("Audit\\Timer");
    let mut proxy = common::cart_proxy(registry);
    proxy.register_before("Shop\\Cart->addItem()", "Audit\\Timer->tick").unwrap();
    proxy.register_around("Shop\\Cart->count()", "Audit\\Timer->measure").unwrap();
    let sink = Arc::clone(&seen);
    proxy
        .register_advice(
            JoinPointKind::After,
            "Shop\\Cart->addItem()",
            Advice::function("read-slot", move |inv: &mut Invocation<'_>| {
                sink.lock().push(inv.slot(JoinPointKind::Before).cloned().unwrap_or(Value::Null));
                Ok(Value::Null)
            }),
        )
        .unwrap();

    proxy.invoke("addItem", Vec::new()).unwrap();
    proxy.invoke("addItem", Vec::new()).unwrap();

    assert_eq!(*seen.lock(), vec![json!(1), json!(1)]);
    assert_eq!(proxy.invoke("count", Vec::new()).unwrap(), json!({ "timed": 2 }));
}

#[test]
fn test_aspect_without_named_advice() {
    let mut registry = AdviceRegistry::new();
    registry.register_aspect::<Timer>("Audit\\Timer");
    let mut proxy = common::cart_proxy(registry);
    proxy.register_before("Shop\\Cart->addItem()", "Audit\\Timer->lap").unwrap();

    let err = proxy.invoke("addItem", Vec::new()).unwrap_err();
    assert!(matches!(err, AspectError::AdviceTargetUnresolved(ref s) if s == "Audit\\Timer->lap"));
}

// ────────────────────────────────────────────────────────────────────────────
// Properties
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_properties_pass_through_without_advice() {
    let log = new_log();
    let mut proxy = proxy();
    register_all_kinds(&log, &mut proxy, "*()");

    proxy.set("owner", json!("ada")).unwrap();
    assert_eq!(proxy.get("owner").unwrap(), json!("ada"));
    assert!(entries(&log).is_empty());

    assert!(matches!(
        proxy.get("discount"),
        Err(AspectError::UnknownProperty { ref property, .. }) if property == "discount"
    ));
    assert!(matches!(
        proxy.set("discount", json!(5)),
        Err(AspectError::UnknownProperty { .. })
    ));
}

// ────────────────────────────────────────────────────────────────────────────
// Nested invocations
// ────────────────────────────────────────────────────────────────────────────

static REGISTER: Lazy<TypeDescriptor> =
    Lazy::new(|| TypeDescriptor::new("Shop\\Register").with_method("pay"));

/// Outer type whose method calls into an inner proxied cart
struct Register {
    cart: AspectProxy,
}

impl Managed for Register {
    fn descriptor(&self) -> &TypeDescriptor {
        &REGISTER
    }

    fn call(&mut self, _method: &str, _args: &[Value]) -> Result<Value, Failure> {
        self.cart
            .invoke("addItem", vec![json!("fee")])
            .map_err(|err| match err.failure() {
                Some(failure) => failure.clone(),
                None => Failure::new("AspectError", err.to_string()),
            })
    }
}

fn describe(log: &Log, label: &'static str) -> Advice {
    let log = Arc::clone(log);
    Advice::function(label, move |inv| {
        let returned = inv.returned().map(Value::to_string).unwrap_or_else(|| "-".to_string());
        log.lock().push(format!(
            "{} {} {} {}",
            label,
            inv.signature(),
            Value::Array(inv.args().to_vec()),
            returned
        ));
        Ok(Value::Null)
    })
}

#[test]
fn test_nested_invocations_have_separate_context() {
    let log = new_log();
    let mut cart = proxy();
    cart.register_advice(JoinPointKind::Before, "Shop\\Cart->*()", describe(&log, "inner-before"))
        .unwrap();
    cart.register_advice(JoinPointKind::After, "Shop\\Cart->*()", describe(&log, "inner-after"))
        .unwrap();

    let mut register = AspectProxy::new(Box::new(Register { cart }), Arc::new(AdviceRegistry::new()));
    register
        .register_advice(JoinPointKind::Before, "Shop\\Register->pay()", describe(&log, "outer-before"))
        .unwrap();
    register
        .register_advice(JoinPointKind::After, "Shop\\Register->pay()", describe(&log, "outer-after"))
        .unwrap();

    let result = register.invoke("pay", vec![json!("card")]).unwrap();

    assert_eq!(result, json!(1));
    assert_eq!(
        entries(&log),
        [
            "outer-before Shop\\Register->pay() [\"card\"] -",
            "inner-before Shop\\Cart->addItem() [\"fee\"] -",
            "inner-after Shop\\Cart->addItem() [\"fee\"] 1",
            "outer-after Shop\\Register->pay() [\"card\"] 1",
        ]
    );
}

#[test]
fn test_cart_construct_rejects_bad_owner() {
    let err = <Cart as weft_core::Construct>::construct(&[json!(7)]).unwrap_err();
    assert_eq!(err.kind(), "TypeError");
}
