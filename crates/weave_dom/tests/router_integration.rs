//! Integration tests for the event router
//!
//! These tests verify that:
//! - Dispatch walks target to root, running handlers in registration order
//! - Failing handlers are isolated from siblings and ancestors
//! - Delegation fires only for descendants matching the selector
//! - Registry entries never keep removed elements alive
//! - Handlers drive the store and re-renders close the loop

use serde_json::{json, Map, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use weave_core::{MemoryStorage, State, Store, StoreConfig};
use weave_dom::{
    Document, DomEvent, Element, EventConfig, EventData, EventDelegation, EventRouter, Selector,
    VElement,
};

struct Fixture {
    document: Document,
    router: EventRouter,
    app: Element,
}

fn fixture() -> Fixture {
    let document = Document::new();
    let router = EventRouter::new(&document);
    let app = document.create_element("section").with_class("todoapp");
    document.root().append_child(&app).unwrap();
    Fixture {
        document,
        router,
        app,
    }
}

fn click(document: &Document, target: &Element) -> DomEvent {
    document.dispatch_event(target, "click", EventData::None)
}

type Log = Rc<RefCell<Vec<&'static str>>>;

fn logger(log: &Log, name: &'static str) -> impl Fn(&mut DomEvent) + 'static {
    let log = Rc::clone(log);
    move |_event: &mut DomEvent| log.borrow_mut().push(name)
}

#[test]
fn test_walk_runs_target_then_ancestors_in_order() {
    let f = fixture();
    let list = f.document.create_element("ul");
    let item = f.document.create_element("li");
    f.app.append_child(&list).unwrap();
    list.append_child(&item).unwrap();

    let log: Log = Rc::default();
    f.router.bind(&f.app, EventConfig::new().on("click", logger(&log, "app")));
    f.router.bind(&item, EventConfig::new().on("click", logger(&log, "item-1")));
    f.router.bind(&item, EventConfig::new().on("onClick", logger(&log, "item-2")));
    f.router.bind(&list, EventConfig::new().on("click", logger(&log, "list")));

    click(&f.document, &item);
    assert_eq!(*log.borrow(), vec!["item-1", "item-2", "list", "app"]);
}

#[test]
fn test_custom_and_mixed_case_events_route() {
    let f = fixture();
    let item = f.document.create_element("li");
    f.app.append_child(&item).unwrap();

    let log: Log = Rc::default();
    f.router.bind(&item, EventConfig::new().on("todo-added", logger(&log, "added")));
    f.router.bind(&f.app, EventConfig::new().on("click", logger(&log, "click")));
    assert_eq!(f.router.listened_event_types(), vec!["todo-added", "click"]);

    f.document.dispatch_event(&item, "todo-added", EventData::None);
    assert_eq!(*log.borrow(), vec!["added"]);

    f.document.dispatch_event(&item, "Todo-Added", EventData::None);
    f.document.dispatch_event(&item, "Click", EventData::None);
    assert_eq!(*log.borrow(), vec!["added", "added", "click"]);

    f.document.dispatch_event(&item, "todoadded", EventData::None);
    assert_eq!(log.borrow().len(), 3);
}

#[test]
fn test_failing_handlers_are_isolated() {
    let f = fixture();
    let button = f.document.create_element("button");
    f.app.append_child(&button).unwrap();

    let log: Log = Rc::default();
    f.router.bind(
        &button,
        EventConfig::new().on("click", |_| Err::<(), _>(anyhow::anyhow!("broken handler"))),
    );
    f.router.bind(
        &button,
        EventConfig::new().on("click", |_| -> () { panic!("handler exploded") }),
    );
    f.router.bind(&button, EventConfig::new().on("click", logger(&log, "sibling")));
    f.router.bind(&f.app, EventConfig::new().on("click", logger(&log, "ancestor")));

    click(&f.document, &button);
    assert_eq!(*log.borrow(), vec!["sibling", "ancestor"]);
}

#[test]
fn test_stop_propagation_finishes_current_node() {
    let f = fixture();
    let input = f.document.create_element("input").with_class("new-todo");
    f.app.append_child(&input).unwrap();

    let log: Log = Rc::default();
    let first = Rc::clone(&log);
    f.router.bind(
        &input,
        EventConfig::new().on("keydown", move |event| {
            first.borrow_mut().push("input");
            if event.key() == Some("Enter") {
                event.stop_propagation();
            }
        }),
    );
    f.router.bind(&input, EventConfig::new().on("keydown", logger(&log, "input-2")));
    f.router.bind(&f.app, EventConfig::new().on("keydown", logger(&log, "app")));

    let enter = f.document.dispatch_event(
        &input,
        "keydown",
        EventData::Key {
            key: "Enter".into(),
            repeat: false,
        },
    );
    assert!(enter.propagation_stopped);
    assert_eq!(*log.borrow(), vec!["input", "input-2"]);

    log.borrow_mut().clear();
    f.document.dispatch_event(
        &input,
        "keydown",
        EventData::Key {
            key: "a".into(),
            repeat: false,
        },
    );
    assert_eq!(*log.borrow(), vec!["input", "input-2", "app"]);
}

#[test]
fn test_delegation_matches_only_selector() {
    let f = fixture();
    let delegation = EventDelegation::new(&f.router);
    let list = f.document.create_element("ul").with_class("todo-list");
    let item = f.document.create_element("li");
    let destroy = f.document.create_element("button").with_class("destroy");
    let label = f.document.create_element("label");
    f.app.append_child(&list).unwrap();
    list.append_child(&item).unwrap();
    item.append_child(&destroy).unwrap();
    item.append_child(&label).unwrap();

    let hits = Rc::new(Cell::new(0));
    let counter = Rc::clone(&hits);
    delegation
        .delegate(&list, ".destroy", "click", move |_| counter.set(counter.get() + 1))
        .unwrap();

    click(&f.document, &destroy);
    assert_eq!(hits.get(), 1);

    click(&f.document, &label);
    assert_eq!(hits.get(), 1);

    assert!(delegation.undelegate(&list, ".destroy", "click"));
    assert!(!delegation.undelegate(&list, ".destroy", "click"));
    click(&f.document, &destroy);
    assert_eq!(hits.get(), 1);
    assert!(!f.router.is_bound(&list));
}

#[test]
fn test_delegation_ignores_matches_outside_container() {
    let f = fixture();
    let delegation = EventDelegation::new(&f.router);
    let outer = f.document.create_element("div").with_class("destroy");
    let list = f.document.create_element("ul");
    let item = f.document.create_element("li");
    f.app.append_child(&outer).unwrap();
    outer.append_child(&list).unwrap();
    list.append_child(&item).unwrap();

    let hits = Rc::new(Cell::new(0));
    let counter = Rc::clone(&hits);
    delegation
        .delegate(&list, ".destroy", "click", move |_| counter.set(counter.get() + 1))
        .unwrap();

    click(&f.document, &item);
    assert_eq!(hits.get(), 0);
}

#[test]
fn test_unbind_and_cleanup() {
    let f = fixture();
    let button = f.document.create_element("button");
    f.app.append_child(&button).unwrap();
    let stranger = f.document.create_element("p");

    let log: Log = Rc::default();
    f.router.bind(&button, EventConfig::new().on("click", logger(&log, "button")));

    assert!(!f.router.unbind(&stranger));
    assert!(!f.router.cleanup(&stranger));

    assert!(f.router.unbind(&button));
    click(&f.document, &button);
    assert!(log.borrow().is_empty());
    assert_eq!(f.document.listener_count("click"), 1);
}

#[test]
fn test_removed_elements_are_reclaimed_without_unbind() {
    let f = fixture();
    let list = f.document.create_element("ul");
    f.app.append_child(&list).unwrap();

    for _ in 0..10 {
        let item = f.document.create_element("li");
        list.append_child(&item).unwrap();
        f.router.bind(&item, EventConfig::new().on("click", |_| ()));
    }
    assert_eq!(f.router.registry_len(), 10);
    assert_eq!(f.router.live_registry_len(), 10);

    for item in list.children() {
        item.remove();
    }
    assert_eq!(f.router.live_registry_len(), 0);
    assert_eq!(f.router.sweep(), 10);
    assert_eq!(f.router.registry_len(), 0);
}

#[test]
fn test_detached_and_destroyed_routes_stay_silent() {
    let f = fixture();
    let button = f.document.create_element("button");
    f.app.append_child(&button).unwrap();

    let log: Log = Rc::default();
    f.router.bind(&button, EventConfig::new().on("click", logger(&log, "button")));

    button.remove();
    click(&f.document, &button);
    assert!(log.borrow().is_empty());

    f.app.append_child(&button).unwrap();
    f.router.destroy();
    click(&f.document, &button);
    assert!(log.borrow().is_empty());
    assert_eq!(f.document.total_listener_count(), 0);
}

#[test]
fn test_binding_during_dispatch_applies_to_next_event() {
    let f = fixture();
    let button = f.document.create_element("button");
    f.app.append_child(&button).unwrap();

    let log: Log = Rc::default();
    let router = f.router.clone();
    let late = Rc::clone(&log);
    f.router.bind(
        &button,
        EventConfig::new().on("click", move |event| {
            let late = Rc::clone(&late);
            if let Some(target) = &event.current_target {
                router.bind(
                    target,
                    EventConfig::new().on("click", move |_| late.borrow_mut().push("late")),
                );
            }
        }),
    );

    click(&f.document, &button);
    assert!(log.borrow().is_empty());
    click(&f.document, &button);
    assert_eq!(*log.borrow(), vec!["late"]);
}

fn toggle_patch(id: &str, completed: bool) -> Value {
    let mut todo = Map::new();
    todo.insert(id.to_string(), json!({ "completed": completed }));
    json!({ "todos": Value::Object(todo) })
}

fn render_todos(router: &EventRouter, list: &Element, state: &State) {
    for child in list.children() {
        router.cleanup(&child);
        child.remove();
    }

    let Some(Value::Object(todos)) = state.get("todos") else {
        return;
    };
    for (id, todo) in todos {
        let completed = todo["completed"].as_bool().unwrap_or(false);
        let title = todo["title"].as_str().unwrap_or_default();
        let todo_id = id.clone();

        let mut item = VElement::new("li").attr("data-id", id.as_str());
        if completed {
            item = item.class("completed");
        }
        let item = item.child(VElement::new("label").text(title)).child(
            VElement::new("input")
                .class("toggle")
                .attr("type", "checkbox")
                .on("click", move |event| {
                    event
                        .update_state(toggle_patch(&todo_id, !completed), "TOGGLE_TODO")
                        .map(|_| ())
                }),
        );
        router.mount(&item, list).unwrap();
    }
}

#[test]
fn test_event_to_state_to_render_loop() {
    let store = Store::new(StoreConfig::default(), MemoryStorage::new());
    let document = Document::new();
    let router = EventRouter::new(&document).with_store(store.clone());
    let list = document.create_element("ul").with_class("todo-list");
    document.root().append_child(&list).unwrap();

    let renders = Rc::new(Cell::new(0));
    {
        let router = router.clone();
        let list = list.clone();
        let renders = Rc::clone(&renders);
        store.subscribe(move |state: &State, _prev: &State, _action: &str| {
            renders.set(renders.get() + 1);
            render_todos(&router, &list, state);
        });
    }

    store
        .set_state(
            json!({"todos": {
                "1": {"id": 1, "title": "Write tests", "completed": false},
                "2": {"id": 2, "title": "Ship it", "completed": false}
            }}),
            "ADD_TODO",
        )
        .unwrap();
    assert_eq!(renders.get(), 1);
    assert_eq!(list.children().len(), 2);

    let first = Selector::parse("li[data-id='1']").unwrap();
    let toggle_selector = Selector::parse(".toggle").unwrap();
    let toggle = list
        .query_selector(&first)
        .and_then(|item| item.query_selector(&toggle_selector))
        .unwrap();

    click(&document, &toggle);
    drop(toggle);

    assert_eq!(renders.get(), 2);
    assert_eq!(store.get_state_at("todos.1.completed"), Some(json!(true)));
    assert_eq!(store.get_state_at("todos.2.completed"), Some(json!(false)));
    assert_eq!(store.last_action().as_deref(), Some("TOGGLE_TODO"));
    assert_eq!(store.stats().completed_count, 1);

    let rerendered = list.query_selector(&first).unwrap();
    assert!(rerendered.has_class("completed"));

    router.sweep();
    assert_eq!(router.registry_len(), 2);
}
