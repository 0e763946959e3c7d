//! Attribute bindings.
//!
//! A [`BindingSpec`] declares which attribute names on a type are reactive
//! and what their defaults are; specs compose explicitly when one type
//! extends another. A [`Model`] is the per-instance store: each declared
//! name gets a slot holding the cached value plus the subscriptions watching
//! it. [`Model::attr`] exposes a slot as an ordinary observable
//! ([`ObservableAttribute`]), which is how template/UI layers consume state.
//!
//! Writes notify a snapshot of the slot's subscribers, skipping any whose
//! [`Who`] token matches the writer's — echo suppression, so two observers
//! bound two-way to the same slot don't feed each other forever. Pointed
//! handles ([`Model::attr_pointed`]) watch a named property *of the held
//! value* and fire only when that property is written through the pointed
//! write path, not when the outer attribute is reassigned wholesale.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::error::FetchError;
use crate::observable::{Observable, Observer, Subscription, Who};

/// Dynamically typed binding value, shared with every subscriber.
pub type Value = Rc<dyn Any>;

/// Wrap a plain value for storage in a binding.
pub fn value<V: Any>(v: V) -> Value {
    Rc::new(v)
}

/// Ordered `name -> default` declarations for one type.
#[derive(Clone, Default)]
pub struct BindingSpec {
    entries: Vec<(&'static str, Value)>,
}

impl BindingSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `name` with `default`. Redeclaring a name replaces its
    /// default in place.
    pub fn bind<V: Any>(mut self, name: &'static str, default: V) -> Self {
        let default = value(default);
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = default;
        } else {
            self.entries.push((name, default));
        }
        self
    }

    /// Overlay `child` onto `self` the way a subtype extends its parent:
    /// child entries win on a name collision (in the parent's position),
    /// new child names append in their declaration order.
    pub fn compose(&self, child: &BindingSpec) -> BindingSpec {
        let mut merged = self.clone();
        for (name, default) in &child.entries {
            if let Some(entry) = merged.entries.iter_mut().find(|(n, _)| n == name) {
                entry.1 = default.clone();
            } else {
                merged.entries.push((name, default.clone()));
            }
        }
        merged
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| *n == name)
    }

    pub fn default_of(&self, name: &str) -> Option<Value> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, d)| d.clone())
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(n, _)| *n)
    }
}

struct SubEntry {
    key: u64,
    cb: Rc<dyn Fn(Value)>,
    pointed: Option<&'static str>,
    who: Option<Who>,
}

impl Clone for SubEntry {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            cb: self.cb.clone(),
            pointed: self.pointed,
            who: self.who.clone(),
        }
    }
}

struct Slot {
    value: RefCell<Value>,
    subs: RefCell<SmallVec<[SubEntry; 2]>>,
    next_key: Cell<u64>,
}

impl Slot {
    fn new(value: Value) -> Rc<Self> {
        Rc::new(Self {
            value: RefCell::new(value),
            subs: RefCell::new(SmallVec::new()),
            next_key: Cell::new(0),
        })
    }
}

/// Per-instance binding store.
#[derive(Clone)]
pub struct Model {
    inner: Rc<ModelInner>,
}

struct ModelInner {
    spec: BindingSpec,
    slots: RefCell<HashMap<&'static str, Rc<Slot>>>,
}

impl Model {
    /// Instance with every declared name set to its default.
    pub fn new(spec: &BindingSpec) -> Model {
        Self::with_values(spec, [])
    }

    /// Instance with `overrides` taking the place of defaults where given.
    /// Override names not declared in the spec become plain (non-reactive)
    /// storage.
    pub fn with_values(
        spec: &BindingSpec,
        overrides: impl IntoIterator<Item = (&'static str, Value)>,
    ) -> Model {
        let mut overrides: HashMap<&'static str, Value> = overrides.into_iter().collect();
        let mut slots = HashMap::new();
        for (name, default) in &spec.entries {
            let initial = overrides.remove(name).unwrap_or_else(|| default.clone());
            slots.insert(*name, Slot::new(initial));
        }
        for (name, v) in overrides {
            slots.insert(name, Slot::new(v));
        }
        Model {
            inner: Rc::new(ModelInner {
                spec: spec.clone(),
                slots: RefCell::new(slots),
            }),
        }
    }

    pub fn spec(&self) -> &BindingSpec {
        &self.inner.spec
    }

    /// Cached value for `name`, lazily re-seeded from the default if the
    /// slot has not been materialized yet. `None` for names this instance
    /// knows nothing about.
    pub fn get(&self, name: &'static str) -> Option<Value> {
        if let Some(slot) = self.inner.slots.borrow().get(name) {
            return Some(slot.value.borrow().clone());
        }
        let default = self.inner.spec.default_of(name)?;
        self.inner
            .slots
            .borrow_mut()
            .insert(name, Slot::new(default.clone()));
        Some(default)
    }

    /// Typed read; `None` when the name is unknown or holds another type.
    pub fn get_as<V: Clone + 'static>(&self, name: &'static str) -> Option<V> {
        let v = self.get(name)?;
        match v.downcast_ref::<V>() {
            Some(v) => Some(v.clone()),
            None => {
                log::warn!("binding '{name}' holds a different type than requested");
                None
            }
        }
    }

    /// Write without an originator token: every subscriber is notified.
    pub fn set(&self, name: &'static str, v: Value) {
        self.write(name, v, None);
    }

    /// Write as `who`: subscribers registered under the same token are
    /// skipped.
    pub fn set_as(&self, name: &'static str, v: Value, who: &Who) {
        self.write(name, v, Some(who));
    }

    /// Reactive handle for a declared binding; `None` for undeclared names,
    /// which stay plain fields.
    pub fn attr(&self, name: &'static str) -> Option<ObservableAttribute> {
        self.inner
            .spec
            .contains(name)
            .then(|| ObservableAttribute::new(self.clone(), name, None))
    }

    /// Handle for the named property of the value held at `name`.
    pub fn attr_pointed(
        &self,
        name: &'static str,
        prop: &'static str,
    ) -> Option<ObservableAttribute> {
        self.inner
            .spec
            .contains(name)
            .then(|| ObservableAttribute::new(self.clone(), name, Some(prop)))
    }

    fn slot(&self, name: &'static str) -> Option<Rc<Slot>> {
        self.inner.slots.borrow().get(name).cloned()
    }

    fn slot_or_init(&self, name: &'static str, init: impl FnOnce() -> Value) -> Rc<Slot> {
        let mut slots = self.inner.slots.borrow_mut();
        slots.entry(name).or_insert_with(|| Slot::new(init())).clone()
    }

    fn write(&self, name: &'static str, v: Value, who: Option<&Who>) {
        let slot = self.slot_or_init(name, || v.clone());
        *slot.value.borrow_mut() = v.clone();

        // Snapshot before iterating: a callback may subscribe, unsubscribe,
        // or write again, and each reentrant write gets its own fresh pass.
        let snapshot: SmallVec<[SubEntry; 2]> = slot.subs.borrow().clone();
        for entry in snapshot {
            if entry.pointed.is_some() {
                continue;
            }
            if suppressed(&entry.who, who) {
                continue;
            }
            (entry.cb)(v.clone());
        }
    }

    fn notify_pointed(&self, name: &'static str, prop: &'static str, v: Value, who: Option<&Who>) {
        let Some(slot) = self.slot(name) else { return };
        let snapshot: SmallVec<[SubEntry; 2]> = slot.subs.borrow().clone();
        for entry in snapshot {
            if entry.pointed != Some(prop) {
                continue;
            }
            if suppressed(&entry.who, who) {
                continue;
            }
            (entry.cb)(v.clone());
        }
    }

    fn subscribe_slot(
        &self,
        name: &'static str,
        cb: Rc<dyn Fn(Value)>,
        pointed: Option<&'static str>,
        who: Option<Who>,
    ) -> u64 {
        let slot = self.slot_or_init(name, || {
            self.inner
                .spec
                .default_of(name)
                .unwrap_or_else(|| value(()))
        });
        let key = slot.next_key.get();
        slot.next_key.set(key + 1);
        slot.subs.borrow_mut().push(SubEntry {
            key,
            cb,
            pointed,
            who,
        });
        key
    }

    fn unsubscribe_slot(&self, name: &'static str, key: u64) {
        if let Some(slot) = self.slot(name) {
            slot.subs.borrow_mut().retain(|e| e.key != key);
        }
    }
}

fn suppressed(entry_who: &Option<Who>, writer: Option<&Who>) -> bool {
    matches!((entry_who, writer), (Some(ew), Some(w)) if ew == w)
}

/// An attribute slot exposed through the observable protocol.
///
/// Subscribing delivers the current value first (deferred, like any other
/// emission) and then every non-suppressed write. Fetch-mode answers with
/// the cached value synchronously. For a pointed handle, reads, writes, and
/// notifications all go through the named property of the held value.
pub struct ObservableAttribute {
    model: Model,
    name: &'static str,
    pointed: Option<&'static str>,
    node: Observable<Value, Value>,
}

impl ObservableAttribute {
    fn new(model: Model, name: &'static str, pointed: Option<&'static str>) -> Self {
        let m = model.clone();
        let node = Observable::from_hook(move |obs, sid, opts| {
            let weak = obs.downgrade();
            let cb: Rc<dyn Fn(Value)> = Rc::new(move |v| {
                if let Some(obs) = weak.upgrade() {
                    obs.next(v, sid);
                }
            });
            let key = m.subscribe_slot(name, cb, pointed, opts.who.clone());
            let m2 = m.clone();
            obs.set_teardown(sid, move || m2.unsubscribe_slot(name, key));

            let current = read_current(&m, name, pointed);
            if opts.fetch {
                return current;
            }
            if let Some(v) = current {
                obs.next(v, sid);
            }
            None
        });
        Self {
            model,
            name,
            pointed,
            node,
        }
    }

    pub fn observable(&self) -> &Observable<Value, Value> {
        &self.node
    }

    pub fn subscribe(&self, on_next: impl Fn(Value) + 'static) -> Subscription {
        self.node.subscribe(on_next)
    }

    pub fn subscribe_observer(&self, observer: Observer<Value, Value>) -> Subscription {
        self.node.subscribe_observer(observer)
    }

    /// Current value, synchronously.
    pub fn fetch(&self) -> Result<Value, FetchError> {
        self.node.fetch()
    }

    pub fn get(&self) -> Option<Value> {
        read_current(&self.model, self.name, self.pointed)
    }

    /// Write without an originator token.
    pub fn set(&self, v: Value) {
        self.write(v, None);
    }

    /// Write as `who`, suppressing the echo back to that subscriber.
    pub fn set_as(&self, v: Value, who: &Who) {
        self.write(v, Some(who));
    }

    fn write(&self, v: Value, who: Option<&Who>) {
        match self.pointed {
            None => self.model.write(self.name, v, who),
            Some(prop) => {
                // Route through the nested binding so the inner model's own
                // subscribers fire, then notify pointed watchers out here.
                let Some(held) = self.model.get(self.name) else {
                    log::warn!("pointed write: '{}' holds no value", self.name);
                    return;
                };
                let Some(inner) = held.downcast_ref::<Model>() else {
                    log::warn!(
                        "pointed write: '{}.{}' target is not a model",
                        self.name,
                        prop
                    );
                    return;
                };
                inner.write(prop, v.clone(), who);
                self.model.notify_pointed(self.name, prop, v, who);
            }
        }
    }
}

fn read_current(model: &Model, name: &'static str, pointed: Option<&'static str>) -> Option<Value> {
    let held = model.get(name)?;
    match pointed {
        None => Some(held),
        Some(prop) => match held.downcast_ref::<Model>() {
            Some(inner) => inner.get(prop),
            None => {
                log::warn!("pointed read: '{name}.{prop}' target is not a model");
                None
            }
        },
    }
}
