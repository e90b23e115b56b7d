//! End-to-end scenarios across paths, observers, listeners and mixins,
//! plus the structured log events emitted along the way.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use metal_core::{
    CONCATENATED_PROPERTIES, MAX_NOTIFY_DEPTH, MetalConfig, MetalError, Method, Mixin, Object,
    Props, Realm, Value, add_listener, before_observer, computed, get, listeners_for, mixin_delegate,
    observer, property_did_change, remove_listener, send_event, set, watched_events,
};
use tracing::Subscriber;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

// ── Log capture ─────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct Capture {
    events: Arc<Mutex<Vec<(tracing::Level, String)>>>,
}

impl Capture {
    fn messages(&self, level: tracing::Level) -> Vec<String> {
        self.events
            .lock()
            .expect("capture lock")
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl<S> Layer<S> for Capture
where
    S: Subscriber + for<'lookup> tracing_subscriber::registry::LookupSpan<'lookup>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        struct Message(String);
        impl tracing::field::Visit for Message {
            fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
                if field.name() == "message" {
                    self.0 = value.to_string();
                }
            }

            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                if field.name() == "message" && self.0.is_empty() {
                    self.0 = format!("{value:?}").trim_matches('"').to_string();
                }
            }
        }
        let mut message = Message(String::new());
        event.record(&mut message);
        self.events
            .lock()
            .expect("capture lock")
            .push((*event.metadata().level(), message.0));
    }
}

fn captured<R>(f: impl FnOnce() -> R) -> (R, Capture) {
    let capture = Capture::default();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, capture)
}

fn string_of(obj: &Object, key: &str) -> String {
    get(obj, key).as_str().unwrap_or_default().to_string()
}

// ── Paths ───────────────────────────────────────────────────────────────

#[test]
fn tolerant_set_through_missing_object_is_a_logged_no_op() {
    let realm = Realm::new();
    let root = Object::new();

    let (result, capture) = captured(|| realm.try_set_path(Some(&root), "a.b.c", 1));
    assert_eq!(result, Ok(Value::Undefined));
    assert_eq!(get(&root, "a"), Value::Undefined);
    assert_eq!(
        capture.messages(tracing::Level::WARN),
        vec!["path.set_skipped".to_string()]
    );

    let err = realm.set_path(Some(&root), "a.b.c", 1).unwrap_err();
    assert!(matches!(err, MetalError::PathResolution { .. }));
}

#[test]
fn paths_read_and_write_through_globals() {
    let realm = Realm::new();
    let app = Object::new();
    let user = Object::new();
    set(realm.globals(), "App", &app);
    set(&app, "user", &user);

    realm.set_path(None, "App.user.name", "ada").unwrap();
    assert_eq!(string_of(&user, "name"), "ada");
    assert_eq!(
        realm.get_path(None, "App.user.name").unwrap(),
        Value::from("ada")
    );

    let anywhere = Object::new();
    assert_eq!(
        realm.get_path(Some(&anywhere), "App.user.name").unwrap(),
        Value::from("ada")
    );
    assert!(realm.set_path(None, "App", 1).is_err());
}

#[test]
fn star_paths_pick_the_target_first() {
    let realm = Realm::new();
    let root = Object::new();
    let content = Object::new();
    set(&root, "content", &content);
    set(&content, "length", 3);

    assert_eq!(
        realm.get_path(Some(&root), "content*length").unwrap(),
        Value::from(3)
    );
    let (target, rest) = realm.normalize_tuple(Some(&root), "content*length").unwrap();
    assert_eq!(target, Some(content));
    assert_eq!(rest, "length");
    assert!(realm.set_path(Some(&root), "content*", 1).is_err());
}

// ── Observers ───────────────────────────────────────────────────────────

#[test]
fn computed_observers_see_fresh_values() {
    let realm = Realm::new();
    let person = Object::new();
    let seen = Rc::new(RefCell::new(Vec::new()));

    let log = Rc::clone(&seen);
    let on_full = observer(
        move |call, _| {
            log.borrow_mut().push(string_of(call.this(), "full"));
            Value::Undefined
        },
        ["full"],
    );
    let full = computed(|obj, _, _| {
        Value::from(format!("{} {}", string_of(obj, "first"), string_of(obj, "last")))
    })
    .property(["first", "last"])
    .cacheable(true);

    realm
        .mixin(
            &person,
            [Props::new()
                .value("first", "Ada")
                .value("last", "Byron")
                .computed("full", full)
                .method("fullChanged", on_full)],
        )
        .unwrap();

    assert_eq!(string_of(&person, "full"), "Ada Byron");
    set(&person, "last", "Lovelace");
    set(&person, "first", "Augusta");
    assert_eq!(*seen.borrow(), vec!["Ada Lovelace", "Augusta Lovelace"]);
}

#[test]
fn before_observers_run_ahead_of_the_write() {
    let realm = Realm::new();
    let obj = Object::new();
    set(&obj, "count", 1);
    let before = Rc::new(Cell::new(0.0));

    let b = Rc::clone(&before);
    let watcher = before_observer(
        move |call, _| {
            b.set(get(call.this(), "count").as_f64().unwrap_or(-1.0));
            Value::Undefined
        },
        ["count"],
    );
    realm
        .mixin(&obj, [Props::new().method("countWillChange", watcher)])
        .unwrap();

    set(&obj, "count", 2);
    assert!((before.get() - 1.0).abs() < f64::EPSILON);
}

#[test]
fn chain_observer_on_an_extended_object_is_independent() {
    let realm = Realm::new();
    let a = Object::new();
    set(&a, "b", 1);
    let parent = Object::new();
    set(&parent, "a", &a);

    let hits = Rc::new(Cell::new(0));
    let h = Rc::clone(&hits);
    let count = Method::new(move |_, _| {
        h.set(h.get() + 1);
        Value::Undefined
    });
    realm.add_observer(&parent, "a.b", None, &count).unwrap();

    let child = parent.extend();
    set(&a, "b", 2);
    // Parent and child each observe through their own chain.
    assert_eq!(hits.get(), 2);

    child.destroy();
    set(&a, "b", 3);
    assert_eq!(hits.get(), 3);
}

#[test]
fn runaway_notification_is_cut_and_logged() {
    let obj = Object::new();
    let depth = Rc::new(Cell::new(0usize));
    let d = Rc::clone(&depth);
    let again = Method::new(move |call, _| {
        d.set(d.get() + 1);
        property_did_change(call.this(), "x");
        Value::Undefined
    });
    add_listener(&obj, "x:change", None, again, None);

    let ((), capture) = captured(|| property_did_change(&obj, "x"));
    assert_eq!(depth.get(), MAX_NOTIFY_DEPTH);
    assert!(
        capture
            .messages(tracing::Level::WARN)
            .iter()
            .any(|m| m == "notify.depth_exceeded")
    );
}

// ── Listeners ───────────────────────────────────────────────────────────

#[test]
fn duplicate_listener_fires_once() {
    let obj = Object::new();
    let hits = Rc::new(Cell::new(0));
    let h = Rc::clone(&hits);
    let ping = Method::new(move |_, args| {
        assert_eq!(args[1], Value::from("ev"));
        assert_eq!(args[2], Value::from(7));
        h.set(h.get() + 1);
        Value::Undefined
    });

    add_listener(&obj, "ev", None, &ping, None);
    add_listener(&obj, "ev", None, &ping, None);
    assert_eq!(listeners_for(&obj, "ev").len(), 1);
    assert!(send_event(&obj, "ev", &[Value::from(7)]));
    assert_eq!(hits.get(), 1);

    remove_listener(&obj, "ev", None, &ping);
    assert!(!send_event(&obj, "ev", &[]));
    assert!(watched_events(&obj).is_empty());
}

#[test]
fn listeners_on_dropped_targets_are_skipped() {
    let obj = Object::new();
    let hits = Rc::new(Cell::new(0));
    let h = Rc::clone(&hits);
    let ping = Method::new(move |_, _| {
        h.set(h.get() + 1);
        Value::Undefined
    });

    {
        let target = Object::new();
        add_listener(&obj, "ev", Some(&target), &ping, None);
        assert!(send_event(&obj, "ev", &[]));
    }
    assert!(!send_event(&obj, "ev", &[]));
    assert_eq!(hits.get(), 1);
    assert!(listeners_for(&obj, "ev").is_empty());
}

// ── Mixins ──────────────────────────────────────────────────────────────

#[test]
fn required_property_must_be_supplied() {
    let realm = Realm::new();
    let target = Object::new();
    let needs = Mixin::create([Props::new().required("willApplyProperty")]);

    let (result, capture) = captured(|| needs.apply(&realm, &target));
    let err = result.unwrap_err();
    assert_eq!(err.keys(), ["willApplyProperty".to_string()]);
    assert_eq!(
        err.to_string(),
        "required properties not defined: willApplyProperty"
    );
    assert!(
        capture
            .messages(tracing::Level::DEBUG)
            .iter()
            .any(|m| m == "mixin.missing_required")
    );

    let fresh = Object::new();
    let gives = Mixin::create([Props::new().method(
        "willApplyProperty",
        Method::new(|_, _| Value::Undefined),
    )]);
    realm.mixin(&fresh, [&needs, &gives]).unwrap();
    assert!(needs.detect(&fresh));
    assert!(gives.detect(&fresh));
}

#[test]
fn concatenated_arrays_follow_application_order() {
    let realm = Realm::new();
    let view = Object::new();
    let first = Mixin::create([Props::new()
        .value(CONCATENATED_PROPERTIES, Value::array(["classNames"]))
        .value("classNames", Value::array(["x"]))]);
    let second = Mixin::create([Props::new().value("classNames", Value::array(["y"]))]);

    realm.mixin(&view, [&first, &second]).unwrap();
    assert_eq!(get(&view, "classNames"), Value::array(["x", "y"]));
}

#[test]
fn delegate_mixin_requires_both_hooks() {
    let realm = Realm::new();
    let obj = Object::new();
    let err = realm.mixin(&obj, [mixin_delegate()]).unwrap_err();
    assert_eq!(
        err,
        MetalError::composition(["willApplyProperty", "didApplyProperty"])
    );
}

#[test]
fn lax_mode_accepts_malformed_dependent_keys() {
    let strict = Realm::new();
    let lax = Realm::new().with_config(MetalConfig::default().with_assertions(false));
    let bad = || {
        computed(|_, _, _| Value::from(1))
            .property(["a..b"])
            .cacheable(true)
    };

    let obj = Object::new();
    assert!(
        strict
            .mixin(&obj, [Props::new().computed("p", bad())])
            .is_err()
    );
    let obj = Object::new();
    lax.mixin(&obj, [Props::new().computed("p", bad())]).unwrap();
    assert_eq!(get(&obj, "p"), Value::from(1));
}
