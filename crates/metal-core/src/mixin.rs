#![forbid(unsafe_code)]

//! Mixin composition.
//!
//! A [`Mixin`] is either *primitive* (wrapping one [`Props`] bag) or a
//! composite of other mixins, optionally with keys removed via
//! [`Mixin::without`]. Applying mixins to an object happens in two passes:
//!
//! 1. **Merge.** Items are flattened in order into one batch of
//!    `(descriptor, value)` pairs. Later items win, except that a required
//!    placeholder never replaces a key the batch already defines. Methods
//!    replacing an earlier method gain a super link; keys listed in
//!    `concatenatedProperties` are concatenated instead of replaced. Each
//!    mixin instance is recorded on the object and skipped on any later
//!    application.
//! 2. **Define.** Every merged key is installed with
//!    [`Realm::define_property`]. Aliases are resolved first, observer
//!    registrations of the replaced value are migrated to the new one, and
//!    objects carrying [`mixin_delegate`] are told about each key.
//!
//! # Failure Modes
//!
//! A full application fails with [`MetalError::Composition`] listing every
//! required key still undefined. Partial applications record such keys as
//! outstanding instead; a later application defining them clears them.
//! Definitions made before the failure stay in place.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::{AHashMap, AHashSet};

use crate::accessors::{has_property, raw_value};
use crate::descriptor::{ComputedProperty, Descriptor};
use crate::error::{MetalError, Result};
use crate::events::MethodRef;
use crate::guid::Guid;
use crate::meta::Key;
use crate::method::Method;
use crate::object::Object;
use crate::realm::Realm;
use crate::value::Value;
use crate::watching::refresh_links;

/// Property whose array value names the keys merged by concatenation.
pub const CONCATENATED_PROPERTIES: &str = "concatenatedProperties";

const WILL_APPLY: &str = "willApplyProperty";
const DID_APPLY: &str = "didApplyProperty";

#[derive(Debug, Clone)]
pub enum PropValue {
    Value(Value),
    Descriptor(Descriptor),
}

/// An ordered property bag.
#[derive(Debug, Clone, Default)]
pub struct Props {
    entries: Vec<(Key, PropValue)>,
}

impl Props {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn value(self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, PropValue::Value(value.into()))
    }

    #[must_use]
    pub fn method(self, key: &str, method: Method) -> Self {
        self.value(key, method)
    }

    #[must_use]
    pub fn computed(self, key: &str, cp: ComputedProperty) -> Self {
        self.descriptor(key, Descriptor::Computed(cp))
    }

    #[must_use]
    pub fn required(self, key: &str) -> Self {
        self.descriptor(key, Descriptor::Required)
    }

    #[must_use]
    pub fn alias(self, key: &str, target: &str) -> Self {
        self.descriptor(key, Descriptor::Alias(Rc::from(target)))
    }

    #[must_use]
    pub fn descriptor(self, key: &str, desc: Descriptor) -> Self {
        self.insert(key, PropValue::Descriptor(desc))
    }

    /// Declare keys merged by concatenation across mixins.
    #[must_use]
    pub fn concatenated<I, S>(self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = Value::array(keys.into_iter().map(|k| Value::from(k.as_ref())));
        self.value(CONCATENATED_PROPERTIES, names)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| &**k)
    }

    fn get(&self, key: &str) -> Option<&PropValue> {
        self.entries.iter().find(|(k, _)| &**k == key).map(|(_, v)| v)
    }

    fn insert(mut self, key: &str, value: PropValue) -> Self {
        match self.entries.iter_mut().find(|(k, _)| &**k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((Key::from(key), value)),
        }
        self
    }
}

/// One entry of a mixin list.
#[derive(Debug, Clone)]
pub enum MixinItem {
    Mixin(Mixin),
    Props(Props),
}

impl From<Mixin> for MixinItem {
    fn from(mixin: Mixin) -> Self {
        Self::Mixin(mixin)
    }
}

impl From<&Mixin> for MixinItem {
    fn from(mixin: &Mixin) -> Self {
        Self::Mixin(mixin.clone())
    }
}

impl From<Props> for MixinItem {
    fn from(props: Props) -> Self {
        Self::Props(props)
    }
}

struct MixinInner {
    guid: Guid,
    properties: RefCell<Option<Props>>,
    mixins: RefCell<Vec<Mixin>>,
    without: Vec<Key>,
}

#[derive(Clone)]
pub struct Mixin {
    inner: Rc<MixinInner>,
}

thread_local! {
    static MIXIN_DELEGATE: Mixin = Mixin::create([Props::new()
        .required(WILL_APPLY)
        .required(DID_APPLY)]);
}

/// The mixin marking objects that want `willApplyProperty(key)` and
/// `didApplyProperty(key)` called around every property a mixin applies.
#[must_use]
pub fn mixin_delegate() -> Mixin {
    MIXIN_DELEGATE.with(Mixin::clone)
}

impl Mixin {
    fn build(properties: Option<Props>, mixins: Vec<Mixin>, without: Vec<Key>) -> Self {
        Self {
            inner: Rc::new(MixinInner {
                guid: Guid::next(),
                properties: RefCell::new(properties),
                mixins: RefCell::new(mixins),
                without,
            }),
        }
    }

    fn primitive(props: Props) -> Self {
        Self::build(Some(props), Vec::new(), Vec::new())
    }

    fn wrap(item: MixinItem) -> Self {
        match item {
            MixinItem::Mixin(mixin) => mixin,
            MixinItem::Props(props) => Self::primitive(props),
        }
    }

    /// A composite mixin over `items`, in order.
    pub fn create<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<MixinItem>,
    {
        let mixins = items.into_iter().map(|item| Self::wrap(item.into())).collect();
        Self::build(None, mixins, Vec::new())
    }

    /// Append `items` to this mixin. Objects it was already applied to are
    /// not updated.
    pub fn reopen<I, T>(&self, items: I) -> &Self
    where
        I: IntoIterator<Item = T>,
        T: Into<MixinItem>,
    {
        let own = self.inner.properties.borrow_mut().take();
        let mut mixins = self.inner.mixins.borrow_mut();
        if let Some(props) = own {
            *mixins = vec![Self::primitive(props)];
        }
        mixins.extend(items.into_iter().map(|item| Self::wrap(item.into())));
        self
    }

    pub fn apply(&self, realm: &Realm, obj: &Object) -> Result<Object> {
        realm.apply_mixin(obj, [self], false)
    }

    /// Apply, leaving unmet required keys outstanding.
    pub fn apply_partial(&self, realm: &Realm, obj: &Object) -> Result<Object> {
        realm.apply_mixin(obj, [self], true)
    }

    /// Whether this mixin has been applied to `obj` (or to the object it
    /// was extended from).
    #[must_use]
    pub fn detect(&self, obj: &Object) -> bool {
        obj.meta().mixins.iter().any(|m| m.guid() == self.guid())
    }

    /// Whether `other` is this mixin or includes it.
    #[must_use]
    pub fn detect_mixin(&self, other: &Mixin) -> bool {
        fn walk(current: &Mixin, wanted: Guid, seen: &mut AHashSet<Guid>) -> bool {
            if !seen.insert(current.guid()) {
                return false;
            }
            if current.guid() == wanted {
                return true;
            }
            let children = current.inner.mixins.borrow().clone();
            children.iter().rev().any(|child| walk(child, wanted, seen))
        }
        walk(other, self.guid(), &mut AHashSet::default())
    }

    /// A mixin applying this one minus `keys`.
    #[must_use]
    pub fn without<I, S>(&self, keys: I) -> Mixin
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let without = keys.into_iter().map(|k| Key::from(k.as_ref())).collect();
        Self::build(None, vec![self.clone()], without)
    }

    /// Every key this mixin defines, in first-seen order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        fn collect(mixin: &Mixin, out: &mut Vec<String>, seen: &mut AHashSet<Guid>) {
            if !seen.insert(mixin.guid()) {
                return;
            }
            if let Some(props) = mixin.inner.properties.borrow().as_ref() {
                for key in props.keys() {
                    if !out.iter().any(|k| k == key) {
                        out.push(key.to_string());
                    }
                }
                return;
            }
            let children = mixin.inner.mixins.borrow().clone();
            for child in &children {
                collect(child, out, seen);
            }
        }
        let mut out = Vec::new();
        collect(self, &mut out, &mut AHashSet::default());
        out
    }

    /// Named (non-primitive) mixins applied to `obj`.
    #[must_use]
    pub fn applied_to(obj: &Object) -> Vec<Mixin> {
        obj.meta()
            .mixins
            .iter()
            .filter(|m| m.inner.properties.borrow().is_none())
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn guid(&self) -> Guid {
        self.inner.guid
    }
}

impl PartialEq for Mixin {
    fn eq(&self, other: &Self) -> bool {
        self.guid() == other.guid()
    }
}

impl Eq for Mixin {}

impl fmt::Debug for Mixin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mixin")
            .field("guid", &self.inner.guid)
            .field("primitive", &self.inner.properties.borrow().is_some())
            .field("without", &self.inner.without)
            .finish_non_exhaustive()
    }
}

/// The flattened batch produced by the merge pass.
#[derive(Default)]
struct Merged {
    order: Vec<Key>,
    entries: AHashMap<Key, (Descriptor, Value)>,
}

impl Merged {
    fn get(&self, key: &str) -> Option<&(Descriptor, Value)> {
        self.entries.get(key)
    }

    fn put(&mut self, key: &Key, desc: Descriptor, value: Value) {
        if self.entries.insert(Rc::clone(key), (desc, value)).is_none() {
            self.order.push(Rc::clone(key));
        }
    }

    fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.order.retain(|k| &**k != key);
        }
    }

    /// A plain value from this batch, falling back to the object's stored
    /// value when the batch has none.
    fn plain_or_base(&self, obj: &Object, key: &str) -> Value {
        match self.get(key) {
            Some((Descriptor::Plain, value)) if value.truthy() => value.clone(),
            _ => raw_value(obj, key),
        }
    }
}

fn concat_names(value: &Value) -> Vec<Key> {
    value
        .as_array()
        .unwrap_or_default()
        .iter()
        .filter_map(|v| v.as_str().map(Key::from))
        .collect()
}

fn merge_items(obj: &Object, items: &[Mixin], merged: &mut Merged) {
    for mixin in items {
        if mixin.detect(obj) {
            continue;
        }
        obj.meta_mut().mixins_mut().push(mixin.clone());

        let props = mixin.inner.properties.borrow().clone();
        match props {
            Some(props) => merge_props(obj, &props, merged),
            None => {
                let children = mixin.inner.mixins.borrow().clone();
                merge_items(obj, &children, merged);
                for key in &mixin.inner.without {
                    merged.remove(key);
                }
            }
        }
    }
}

fn merge_props(obj: &Object, props: &Props, merged: &mut Merged) {
    let mut concats = concat_names(&merged.plain_or_base(obj, CONCATENATED_PROPERTIES));
    if let Some(PropValue::Value(extra)) = props.get(CONCATENATED_PROPERTIES) {
        concats.extend(concat_names(extra));
    }

    for (key, entry) in &props.entries {
        match entry {
            PropValue::Descriptor(desc) => {
                if desc.is_required() && merged.get(key).is_some() {
                    continue;
                }
                merged.put(key, desc.clone(), Value::Undefined);
            }
            PropValue::Value(value) => {
                let value = match value {
                    Value::Method(method) if method.is_method() => {
                        let prev = match merged.get(key) {
                            Some((Descriptor::Plain, prev)) if prev.truthy() => prev.clone(),
                            _ => raw_value(obj, key),
                        };
                        match prev {
                            Value::Method(prev) => Value::Method(method.with_super(prev)),
                            _ => value.clone(),
                        }
                    }
                    _ if &**key == CONCATENATED_PROPERTIES || concats.contains(key) => {
                        let base = merged.plain_or_base(obj, key);
                        if base.truthy() {
                            base.concat(value)
                        } else {
                            Value::Array(value.clone().into_array())
                        }
                    }
                    _ => value.clone(),
                };
                merged.put(key, Descriptor::Plain, value);
            }
        }
    }
}

impl Realm {
    /// Apply `items` to `obj`, failing if a required key stays undefined.
    pub fn mixin<I, T>(&self, obj: &Object, items: I) -> Result<Object>
    where
        I: IntoIterator<Item = T>,
        T: Into<MixinItem>,
    {
        self.apply_mixin(obj, items, false)
    }

    pub fn apply_mixin<I, T>(&self, obj: &Object, items: I, partial: bool) -> Result<Object>
    where
        I: IntoIterator<Item = T>,
        T: Into<MixinItem>,
    {
        let items: Vec<MixinItem> = items.into_iter().map(Into::into).collect();
        let mut merged = Merged::default();
        for item in items {
            match item {
                MixinItem::Mixin(mixin) => merge_items(obj, &[mixin], &mut merged),
                MixinItem::Props(props) => merge_props(obj, &props, &mut merged),
            }
        }

        tracing::debug!(
            message = "mixin.apply",
            guid = %obj.guid(),
            keys = merged.order.len(),
            partial
        );

        let hooks = mixin_delegate().detect(obj);
        let will_apply = hooks.then(|| hook(&merged, obj, WILL_APPLY)).flatten();
        let did_apply = hooks.then(|| hook(&merged, obj, DID_APPLY)).flatten();

        let mut missing: Vec<String> = Vec::new();
        for key in merged.order.clone() {
            let Some((desc, value)) = merged.get(&key).cloned() else {
                continue;
            };

            if desc.is_required() {
                if !has_property(obj, &key) {
                    if partial {
                        obj.meta_mut().required_mut().mark(&key);
                    } else {
                        missing.push(key.to_string());
                    }
                }
                continue;
            }

            let (desc, value) = self.resolve_alias(obj, &merged, desc, value)?;
            let key_arg = [Value::from(Rc::clone(&key))];

            if let Some(will) = &will_apply {
                will.call(obj, &key_arg);
            }

            let observes = observer_paths(&value, Method::observes);
            let observes_before = observer_paths(&value, Method::observes_before);
            let current = raw_value(obj, &key);
            if !observes.is_empty() {
                for path in observer_paths(&current, Method::observes) {
                    self.remove_observer(obj, &path, None, MethodRef::Name(Rc::clone(&key)))?;
                }
            }
            if !observes_before.is_empty() {
                for path in observer_paths(&current, Method::observes_before) {
                    self.remove_before_observer(obj, &path, None, MethodRef::Name(Rc::clone(&key)))?;
                }
            }

            self.define_property(obj, &key, desc, value)?;

            for path in &observes {
                self.add_observer(obj, path, None, MethodRef::Name(Rc::clone(&key)))?;
            }
            for path in &observes_before {
                self.add_before_observer(obj, path, None, MethodRef::Name(Rc::clone(&key)))?;
            }

            let outstanding = obj.meta().required.is_outstanding(&key);
            if outstanding {
                obj.meta_mut().required_mut().satisfy(&key);
            }

            if let Some(did) = &did_apply {
                did.call(obj, &key_arg);
            }
        }

        if !partial {
            let meta = obj.meta();
            for key in meta.required.outstanding() {
                if !missing.iter().any(|m| m == &**key) {
                    missing.push(key.to_string());
                }
            }
        }
        if !missing.is_empty() {
            tracing::debug!(message = "mixin.missing_required", guid = %obj.guid(), count = missing.len());
            return Err(MetalError::composition(missing));
        }
        Ok(obj.clone())
    }

    fn resolve_alias(
        &self,
        obj: &Object,
        merged: &Merged,
        mut desc: Descriptor,
        mut value: Value,
    ) -> Result<(Descriptor, Value)> {
        let mut hops = 0;
        while let Descriptor::Alias(target) = &desc {
            let target = Rc::clone(target);
            if hops >= self.config().max_alias_hops {
                self.check(false, || format!("alias '{target}' does not resolve"))?;
                return Ok((Descriptor::Plain, raw_value(obj, &target)));
            }
            hops += 1;

            if let Some((d, v)) = merged.get(&target) {
                desc = d.clone();
                value = v.clone();
            } else {
                let existing = obj.meta().descs.get(&*target).cloned();
                desc = existing.unwrap_or(Descriptor::Plain);
                value = raw_value(obj, &target);
            }
        }
        Ok((desc, value))
    }

    /// Install `desc` for `key` on `obj`, replacing any previous descriptor.
    ///
    /// A plain descriptor stores `value`; any other kind takes over the key
    /// and runs its setup. An alias whose chain of installed aliases leads
    /// back to `key`, or runs past `max_alias_hops`, is an assertion
    /// failure; with assertions off the key stays a plain property holding
    /// its current stored value instead.
    pub fn define_property(&self, obj: &Object, key: &str, desc: Descriptor, value: Value) -> Result<()> {
        if obj.is_destroyed() {
            return Ok(());
        }
        desc.validate(self, key)?;

        let (desc, value) = match desc {
            Descriptor::Alias(target) if self.alias_loops(obj, key, &target) => {
                self.check(false, || format!("alias '{key}' -> '{target}' forms a cycle"))?;
                (Descriptor::Plain, raw_value(obj, key))
            }
            desc => (desc, value),
        };

        let old = obj.meta().descs.get(key).cloned();
        if let Some(old) = old {
            old.teardown(obj, key);
        }

        let kind = desc.kind();
        match desc {
            Descriptor::Plain => {
                let mut meta = obj.meta_mut();
                if meta.descs.contains_key(key) {
                    meta.descs_mut().remove(key);
                }
                meta.values_mut().insert(Key::from(key), value);
            }
            desc => {
                {
                    let mut meta = obj.meta_mut();
                    meta.descs_mut().insert(Key::from(key), desc.clone());
                    if meta.values.contains_key(key) {
                        meta.values_mut().remove(key);
                    }
                }
                desc.setup(self, obj, key)?;
            }
        }

        tracing::debug!(message = "descriptor.define", guid = %obj.guid(), key, kind);
        if obj.meta().watch_count(key) > 0 {
            refresh_links(obj, key);
        }
        Ok(())
    }
}

impl Realm {
    /// Whether following installed aliases from `target` reaches `key`
    /// or exceeds the hop bound.
    fn alias_loops(&self, obj: &Object, key: &str, target: &str) -> bool {
        let mut current: Key = Key::from(target);
        for _ in 0..self.config().max_alias_hops {
            if &*current == key {
                return true;
            }
            let next = match obj.meta().descs.get(&*current) {
                Some(Descriptor::Alias(next)) => Rc::clone(next),
                _ => return false,
            };
            current = next;
        }
        true
    }
}

fn hook(merged: &Merged, obj: &Object, key: &str) -> Option<Method> {
    merged.plain_or_base(obj, key).as_method().cloned()
}

fn observer_paths(value: &Value, paths: fn(&Method) -> &[Rc<str>]) -> Vec<Rc<str>> {
    value.as_method().map(|m| paths(m).to_vec()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessors::{get, set};
    use crate::descriptor::computed;
    use crate::method::observer;
    use std::cell::Cell;

    fn tagged(tag: &'static str) -> Method {
        Method::new(move |call, args| {
            let below = call.call_super(args);
            Value::from(format!("{tag}{}", below.as_str().unwrap_or("")))
        })
    }

    fn call(obj: &Object, key: &str) -> Value {
        match get(obj, key) {
            Value::Method(m) => m.call(obj, &[]),
            other => panic!("{key} is not a method: {other:?}"),
        }
    }

    #[test]
    fn later_values_win() {
        let realm = Realm::new();
        let obj = Object::new();
        realm
            .mixin(&obj, [Props::new().value("a", 1).value("b", 1), Props::new().value("a", 2)])
            .unwrap();
        assert_eq!(get(&obj, "a"), Value::from(2));
        assert_eq!(get(&obj, "b"), Value::from(1));
    }

    #[test]
    fn missing_required_key_fails_listing_all_keys() {
        let realm = Realm::new();
        let obj = Object::new();
        let err = realm.mixin(&obj, [mixin_delegate()]).unwrap_err();
        assert_eq!(err, MetalError::composition([WILL_APPLY, DID_APPLY]));
    }

    #[test]
    fn required_key_supplied_by_a_later_mixin() {
        let realm = Realm::new();
        let needs = Mixin::create([Props::new().required("willApplyProperty")]);
        let gives = Mixin::create([Props::new().method("willApplyProperty", tagged("w"))]);

        let obj = Object::new();
        realm.mixin(&obj, [&needs, &gives]).unwrap();

        // A required placeholder never replaces a definition in the batch.
        let obj = Object::new();
        realm.mixin(&obj, [&gives, &needs]).unwrap();
        assert_eq!(call(&obj, "willApplyProperty"), Value::from("w"));
    }

    #[test]
    fn partial_application_defers_required_keys() {
        let realm = Realm::new();
        let obj = Object::new();
        let needs = Mixin::create([Props::new().required("name")]);
        needs.apply_partial(&realm, &obj).unwrap();
        assert_eq!(obj.meta().required.count(), 1);

        let err = realm.mixin(&obj, [Props::new().value("other", 1)]).unwrap_err();
        assert_eq!(err.keys(), ["name".to_string()]);

        realm.mixin(&obj, [Props::new().value("name", "x")]).unwrap();
        assert_eq!(obj.meta().required.count(), 0);
    }

    #[test]
    fn concatenated_properties_accumulate_in_order() {
        let realm = Realm::new();
        let obj = Object::new();
        let base = Mixin::create([Props::new().concatenated(["classNames"]).value("classNames", Value::array(["x"]))]);
        let extra = Mixin::create([Props::new().value("classNames", Value::array(["y"]))]);
        realm.mixin(&obj, [&base, &extra]).unwrap();
        assert_eq!(get(&obj, "classNames"), Value::array(["x", "y"]));

        // A later application keeps concatenating onto the stored value.
        realm.mixin(&obj, [Props::new().value("classNames", "z")]).unwrap();
        assert_eq!(get(&obj, "classNames"), Value::array(["x", "y", "z"]));
    }

    #[test]
    fn super_chain_spans_three_mixins() {
        let realm = Realm::new();
        let obj = Object::new();
        let items = ["a", "b", "c"].map(|tag| Mixin::create([Props::new().method("greet", tagged(tag))]));
        realm.mixin(&obj, &items).unwrap();
        assert_eq!(call(&obj, "greet"), Value::from("cba"));
    }

    #[test]
    fn super_reaches_the_existing_method() {
        let realm = Realm::new();
        let obj = Object::new();
        realm.mixin(&obj, [Props::new().method("greet", tagged("base"))]).unwrap();
        realm.mixin(&obj, [Props::new().method("greet", tagged("top-"))]).unwrap();
        assert_eq!(call(&obj, "greet"), Value::from("top-base"));
    }

    #[test]
    fn not_method_values_are_stored_as_is() {
        let realm = Realm::new();
        let obj = Object::new();
        let plain = tagged("p").not_method();
        realm.mixin(&obj, [Props::new().method("f", tagged("a"))]).unwrap();
        realm.mixin(&obj, [Props::new().method("f", plain.clone())]).unwrap();
        assert_eq!(get(&obj, "f"), Value::from(plain));
        assert_eq!(call(&obj, "f"), Value::from("p"));
    }

    #[test]
    fn applying_twice_is_a_no_op() {
        let realm = Realm::new();
        let obj = Object::new();
        let mixin = Mixin::create([Props::new().method("greet", tagged("a"))]);
        mixin.apply(&realm, &obj).unwrap();
        mixin.apply(&realm, &obj).unwrap();
        assert_eq!(call(&obj, "greet"), Value::from("a"));
        assert!(mixin.detect(&obj));
        assert_eq!(Mixin::applied_to(&obj), vec![mixin]);
    }

    #[test]
    fn without_drops_keys() {
        let realm = Realm::new();
        let obj = Object::new();
        let mixin = Mixin::create([Props::new().value("keep", 1).value("drop", 2)]);
        mixin.without(["drop"]).apply(&realm, &obj).unwrap();
        assert_eq!(get(&obj, "keep"), Value::from(1));
        assert_eq!(get(&obj, "drop"), Value::Undefined);
    }

    #[test]
    fn keys_detect_and_reopen() {
        let inner = Mixin::create([Props::new().value("a", 1)]);
        let outer = Mixin::create([Props::new().value("b", 1)]);
        outer.reopen([&inner]);
        outer.reopen([Props::new().value("a", 2).value("c", 3)]);
        assert_eq!(outer.keys(), vec!["b", "a", "c"]);
        assert!(inner.detect_mixin(&outer));
        assert!(outer.detect_mixin(&outer));
        assert!(!outer.detect_mixin(&inner));
    }

    #[test]
    fn aliases_resolve_through_batch_and_object() {
        let realm = Realm::new();
        let obj = Object::new();
        realm.mixin(&obj, [Props::new().method("greet", tagged("hi")).alias("hello", "greet")]).unwrap();
        assert_eq!(call(&obj, "hello"), Value::from("hi"));

        realm.mixin(&obj, [Props::new().alias("wave", "greet")]).unwrap();
        assert_eq!(call(&obj, "wave"), Value::from("hi"));

        realm.mixin(&obj, [Props::new().alias("loop", "loop")]).unwrap_err();
    }

    #[test]
    fn computed_properties_via_mixin() {
        let realm = Realm::new();
        let obj = Object::new();
        let full = computed(|obj, _, _| {
            let first = get(obj, "first");
            let last = get(obj, "last");
            Value::from(format!("{} {}", first.as_str().unwrap_or(""), last.as_str().unwrap_or("")))
        })
        .property(["first", "last"])
        .cacheable(true);
        realm
            .mixin(&obj, [Props::new().value("first", "Ada").value("last", "L").computed("full", full)])
            .unwrap();
        assert_eq!(get(&obj, "full"), Value::from("Ada L"));
        set(&obj, "last", "Lovelace");
        assert_eq!(get(&obj, "full"), Value::from("Ada Lovelace"));
    }

    #[test]
    fn observer_registrations_migrate_with_the_method() {
        let realm = Realm::new();
        let obj = Object::new();
        let hits = Rc::new(Cell::new(0u32));

        let h = Rc::clone(&hits);
        let first = observer(
            move |_, _| {
                h.set(h.get() + 1);
                Value::Undefined
            },
            ["x"],
        );
        let h = Rc::clone(&hits);
        let second = observer(
            move |_, _| {
                h.set(h.get() + 10);
                Value::Undefined
            },
            ["y"],
        );

        realm.mixin(&obj, [Props::new().method("onChange", first)]).unwrap();
        set(&obj, "x", 1);
        assert_eq!(hits.get(), 1);

        realm.mixin(&obj, [Props::new().method("onChange", second)]).unwrap();
        assert!(!realm.is_watching(&obj, "x"));
        set(&obj, "x", 2);
        assert_eq!(hits.get(), 1);
        set(&obj, "y", 1);
        assert_eq!(hits.get(), 11);
    }

    #[test]
    fn delegate_hooks_wrap_each_key() {
        let realm = Realm::new();
        let obj = Object::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let hook = |phase: &'static str| {
            let log = Rc::clone(&log);
            Method::new(move |_, args| {
                let key = args[0].as_str().unwrap_or("").to_string();
                log.borrow_mut().push(format!("{phase} {key}"));
                Value::Undefined
            })
        };
        realm
            .mixin(
                &obj,
                [
                    MixinItem::from(mixin_delegate()),
                    Props::new()
                        .method(WILL_APPLY, hook("will"))
                        .method(DID_APPLY, hook("did"))
                        .into(),
                ],
            )
            .unwrap();
        log.borrow_mut().clear();

        realm.mixin(&obj, [Props::new().value("a", 1)]).unwrap();
        assert_eq!(*log.borrow(), vec!["will a", "did a"]);
    }

    #[test]
    fn define_property_replaces_descriptors() {
        let realm = Realm::new();
        let obj = Object::new();
        let cp = computed(|_, _, _| Value::from("computed"));
        realm.define_property(&obj, "p", cp.into(), Value::Undefined).unwrap();
        assert_eq!(get(&obj, "p"), Value::from("computed"));
        realm.define_property(&obj, "p", Descriptor::Plain, Value::from(1)).unwrap();
        assert_eq!(get(&obj, "p"), Value::from(1));
        assert!(!obj.meta().descs.contains_key("p"));
    }

    #[test]
    fn child_mixins_do_not_touch_the_parent() {
        let realm = Realm::new();
        let parent = Object::new();
        let base = Mixin::create([Props::new().value("a", 1)]);
        base.apply(&realm, &parent).unwrap();

        let child = parent.extend();
        assert!(base.detect(&child));
        let extra = Mixin::create([Props::new().value("a", 2)]);
        extra.apply(&realm, &child).unwrap();

        assert!(!extra.detect(&parent));
        assert_eq!(get(&parent, "a"), Value::from(1));
        assert_eq!(get(&child, "a"), Value::from(2));
    }
}
