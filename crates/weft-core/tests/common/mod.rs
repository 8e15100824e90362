//! Shared fixtures for the integration tests
//!
//! `Shop\Cart` is an aspected type hosting its own advice, `Shop\Ledger` is
//! a plain type with the same shape, and `Audit\Timer` is an aspect that is
//! instantiated for every advice call.

#![allow(dead_code)]

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde_json::json;
use weft_core::{
    AdviceRegistry, Aspect, AspectProxy, AspectResult, Construct, Failure, Invocation, JoinPoint,
    Managed, SelfRegistering, TypeDescriptor, Value, Visibility,
};

/// Ordered record of advice firings
pub type Log = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().clone()
}

/// Advice body that appends `label` to the log and returns it
pub fn record(log: &Log, label: &str) -> impl Fn(&mut Invocation<'_>) -> AspectResult<Value> + Send + Sync + 'static {
    let log = Arc::clone(log);
    let label = label.to_string();
    move |_inv| {
        log.lock().push(label.clone());
        Ok(Value::from(label.as_str()))
    }
}

static CART: Lazy<TypeDescriptor> = Lazy::new(|| {
    TypeDescriptor::new("Shop\\Cart")
        .with_method("addItem")
        .with_method("removeItem")
        .with_method("checkout")
        .with_method("count")
        .with_method_visibility("recalculate", Visibility::Protected)
        .with_property("owner")
        .with_property("calls")
});

/// Shopping cart whose `checkout` fails while the cart is empty
#[derive(Debug, Default)]
pub struct Cart {
    pub items: Vec<Value>,
    pub owner: Value,
    pub real_calls: usize,
    pub verified: usize,
}

impl Managed for Cart {
    fn descriptor(&self) -> &TypeDescriptor {
        &CART
    }

    fn call(&mut self, method: &str, args: &[Value]) -> Result<Value, Failure> {
        self.real_calls += 1;
        match method {
            "addItem" => {
                let item = args.first().cloned().unwrap_or(Value::Null);
                self.items.push(item);
                Ok(json!(self.items.len()))
            }
            "removeItem" => {
                self.items.pop();
                Ok(json!(self.items.len()))
            }
            "checkout" if self.items.is_empty() => Err(Failure::new("EmptyCart", "cart is empty")),
            "checkout" => Ok(json!({ "paid": self.items.len() })),
            "count" => Ok(json!(self.items.len())),
            "recalculate" => Ok(Value::Null),
            other => Err(Failure::new("BadMethod", format!("no method {}", other))),
        }
    }

    fn get_property(&self, name: &str) -> Option<Value> {
        match name {
            "owner" => Some(self.owner.clone()),
            "calls" => Some(json!(self.real_calls)),
            _ => None,
        }
    }

    fn set_property(&mut self, name: &str, value: Value) -> bool {
        if name != "owner" {
            return false;
        }
        self.owner = value;
        true
    }

    fn advise(&mut self, method: &str, join_point: &mut JoinPoint) -> Option<AspectResult<Value>> {
        match method {
            "verify" => {
                self.verified += 1;
                Some(Ok(json!(self.verified)))
            }
            "wrap" => Some(join_point.proceed(self).map(|inner| json!({ "wrapped": inner }))),
            _ => None,
        }
    }
}

impl Construct for Cart {
    fn type_descriptor() -> &'static TypeDescriptor {
        &CART
    }

    fn construct(args: &[Value]) -> Result<Self, Failure> {
        match args.first() {
            None => Ok(Cart::default()),
            Some(Value::String(owner)) => Ok(Cart {
                owner: json!(owner),
                ..Cart::default()
            }),
            Some(other) => Err(Failure::new("TypeError", format!("owner must be a string, got {}", other))),
        }
    }
}

impl SelfRegistering for Cart {
    fn register_join_points(proxy: &mut AspectProxy) -> AspectResult<()> {
        proxy.register_before("Shop\\Cart->checkout()", "$this->verify")
    }
}

static LEDGER: Lazy<TypeDescriptor> = Lazy::new(|| {
    TypeDescriptor::new("Shop\\Ledger")
        .with_method("addItem")
        .with_method("checkout")
});

/// Plain type with the same methods as the cart
#[derive(Debug, Default)]
pub struct Ledger {
    pub entries: usize,
}

impl Managed for Ledger {
    fn descriptor(&self) -> &TypeDescriptor {
        &LEDGER
    }

    fn call(&mut self, method: &str, _args: &[Value]) -> Result<Value, Failure> {
        match method {
            "addItem" => {
                self.entries += 1;
                Ok(json!(self.entries))
            }
            _ => Ok(Value::Null),
        }
    }
}

impl Construct for Ledger {
    fn type_descriptor() -> &'static TypeDescriptor {
        &LEDGER
    }

    fn construct(_args: &[Value]) -> Result<Self, Failure> {
        Ok(Ledger::default())
    }
}

/// Aspect built fresh for every advice call; `tick` always returns 1
#[derive(Default)]
pub struct Timer {
    ticks: u64,
}

impl Aspect for Timer {
    fn advise(&mut self, method: &str, invocation: &mut Invocation<'_>) -> Option<AspectResult<Value>> {
        match method {
            "tick" => {
                self.ticks += 1;
                Some(Ok(json!(self.ticks)))
            }
            "measure" => Some(invocation.proceed().map(|inner| json!({ "timed": inner }))),
            _ => None,
        }
    }
}

/// Proxy around a fresh cart with no join points
pub fn cart_proxy(advice: AdviceRegistry) -> AspectProxy {
    AspectProxy::new(Box::new(Cart::default()), Arc::new(advice))
}

/// Number of times the real cart methods ran
pub fn real_calls(proxy: &AspectProxy) -> u64 {
    proxy.get("calls").unwrap().as_u64().unwrap()
}
