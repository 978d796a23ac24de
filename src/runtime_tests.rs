#[cfg(test)]
mod tests {
    use crate::dom::{
        delegate_events, insert, merge_props, spread, template, Document, Event, Insertable, Node, PropValue, Props,
        Value,
    };
    use crate::reactive::{
        batch, create_effect, create_memo, create_signal, flush_microtasks, is_tracking, on_cleanup, on_mount,
        untrack, Signal,
    };
    use std::cell::{Cell, RefCell};
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::rc::Rc;

    // ═══════════════════════════════════════════════════════════════════════════
    // REACTIVE SCENARIOS
    // ═══════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_effect_logs_every_write() {
        let (count, set_count) = create_signal(0);
        let log = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&log);
        create_effect(move || sink.borrow_mut().push(count.get()));

        set_count.set(1);
        set_count.update(|prev| prev + 1);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_batch_runs_each_effect_once_with_final_values() {
        let first = Signal::new("a".to_string());
        let last = Signal::new("b".to_string());
        let runs = Rc::new(Cell::new(0));
        let seen = Rc::new(RefCell::new(String::new()));

        let (f, l, r, s) = (first.clone(), last.clone(), Rc::clone(&runs), Rc::clone(&seen));
        create_effect(move || {
            r.set(r.get() + 1);
            *s.borrow_mut() = format!("{} {}", f.get(), l.get());
        });
        assert_eq!(runs.get(), 1);

        batch(|| {
            first.set("x".to_string());
            batch(|| last.set("y".to_string()));
            first.set("Ada".to_string());
            assert_eq!(runs.get(), 1, "nothing runs before the outermost batch exits");
        });

        assert_eq!(runs.get(), 2);
        assert_eq!(*seen.borrow(), "Ada y");
    }

    #[test]
    fn test_writes_during_flush_settle() {
        let source = Signal::new(1);
        let doubled = Signal::new(0);
        let observed = Rc::new(RefCell::new(Vec::new()));

        let (src, dst) = (source.clone(), doubled.clone());
        create_effect(move || dst.set(src.get() * 2));
        let (dst, seen) = (doubled.clone(), Rc::clone(&observed));
        create_effect(move || seen.borrow_mut().push(dst.get()));

        batch(|| source.set(5));
        assert_eq!(doubled.get_untracked(), 10);
        assert_eq!(observed.borrow().last(), Some(&10));
    }

    #[test]
    fn test_memo_stops_propagation_on_equal_output() {
        let n = Signal::new(3);
        let computations = Rc::new(Cell::new(0));
        let downstream = Rc::new(Cell::new(0));

        let (source, counter) = (n.clone(), Rc::clone(&computations));
        let parity = create_memo(move || {
            counter.set(counter.get() + 1);
            source.get() % 2
        });

        let (p, d) = (parity.clone(), Rc::clone(&downstream));
        create_effect(move || {
            p.get();
            d.set(d.get() + 1);
        });
        assert_eq!((computations.get(), downstream.get()), (1, 1));

        n.set(3);
        assert_eq!((computations.get(), downstream.get()), (1, 1), "equal write is a no-op");

        n.set(5);
        assert_eq!((computations.get(), downstream.get()), (2, 1), "same parity stops at the memo");

        n.set(6);
        assert_eq!((computations.get(), downstream.get()), (3, 2));
        assert_eq!(parity.get_untracked(), 0);
    }

    #[test]
    fn test_memo_diamond_effect_sees_settled_pair() {
        let s = Signal::new(1);
        let (left_src, right_src) = (s.clone(), s.clone());
        let plus_one = create_memo(move || left_src.get() + 1);
        let times_ten = create_memo(move || right_src.get() * 10);

        let log = Rc::new(RefCell::new(Vec::new()));
        let (a, b, sink) = (plus_one.clone(), times_ten.clone(), Rc::clone(&log));
        create_effect(move || sink.borrow_mut().push((a.get(), b.get())));

        s.set(2);
        assert_eq!(*log.borrow(), vec![(2, 10), (3, 20)]);

        batch(|| s.set(4));
        assert_eq!(*log.borrow(), vec![(2, 10), (3, 20), (5, 40)]);
    }

    #[test]
    fn test_effect_reading_signal_and_its_memo_runs_once_per_write() {
        let s = Signal::new(1);
        let source = s.clone();
        let doubled = create_memo(move || source.get() * 2);

        let log = Rc::new(RefCell::new(Vec::new()));
        let (direct, derived, sink) = (s.clone(), doubled.clone(), Rc::clone(&log));
        create_effect(move || sink.borrow_mut().push((direct.get(), derived.get())));

        s.set(5);
        assert_eq!(*log.borrow(), vec![(1, 2), (5, 10)]);

        batch(|| {
            s.set(6);
            s.set(7);
        });
        assert_eq!(*log.borrow(), vec![(1, 2), (5, 10), (7, 14)]);
    }

    #[test]
    fn test_subscriber_added_during_notification_waits_for_next_write() {
        let s = Signal::new(0);
        let inner_runs = Rc::new(Cell::new(0));

        let (outer_src, counter) = (s.clone(), Rc::clone(&inner_runs));
        create_effect(move || {
            if outer_src.get() == 1 {
                let (inner_src, counter) = (outer_src.clone(), Rc::clone(&counter));
                create_effect(move || {
                    inner_src.get();
                    counter.set(counter.get() + 1);
                });
            }
        });
        assert_eq!(inner_runs.get(), 0);

        s.set(1);
        assert_eq!(inner_runs.get(), 1, "only the creation run, the pending write is not replayed");
        assert_eq!(s.subscriber_count(), 2);
    }

    #[test]
    fn test_cleanups_run_in_order_before_next_run() {
        let trigger = Signal::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));

        let (t, sink) = (trigger.clone(), Rc::clone(&log));
        create_effect(move || {
            let run = t.get();
            sink.borrow_mut().push(format!("run {}", run));
            for label in ["a", "b"] {
                let cleanup_sink = Rc::clone(&sink);
                on_cleanup(move || cleanup_sink.borrow_mut().push(format!("cleanup {} {}", run, label)))
                    .expect("inside an effect");
            }
        });

        trigger.set(1);
        assert_eq!(
            *log.borrow(),
            vec!["run 0", "cleanup 0 a", "cleanup 0 b", "run 1"]
        );
        assert!(on_cleanup(|| {}).is_err());
    }

    #[test]
    fn test_panicking_effect_releases_tracking_state() {
        let value = Signal::new(0);
        let runs = Rc::new(Cell::new(0));

        let (v, r) = (value.clone(), Rc::clone(&runs));
        create_effect(move || {
            r.set(r.get() + 1);
            if v.get() == 13 {
                panic!("unlucky");
            }
        });

        let result = catch_unwind(AssertUnwindSafe(|| value.set(13)));
        assert!(result.is_err());
        assert!(!is_tracking());

        let result = catch_unwind(AssertUnwindSafe(|| batch(|| value.set(13))));
        assert!(result.is_ok(), "the stored value is already 13, so nothing is scheduled");

        value.set(14);
        assert_eq!(runs.get(), 3);

        let result = catch_unwind(AssertUnwindSafe(|| batch(|| value.set(13))));
        assert!(result.is_err());
        value.set(20);
        assert_eq!(runs.get(), 5, "batching still works after a panicking flush");
    }

    #[test]
    fn test_untracked_read_and_mount_order() {
        let tracked = Signal::new(1);
        let ignored = Signal::new(1);
        let runs = Rc::new(Cell::new(0));
        let order = Rc::new(RefCell::new(Vec::new()));

        let (t, i, r, o) = (tracked.clone(), ignored.clone(), Rc::clone(&runs), Rc::clone(&order));
        create_effect(move || {
            r.set(r.get() + 1);
            t.get();
            untrack(|| i.get());
            let mounted = Rc::clone(&o);
            on_mount(move || mounted.borrow_mut().push("mounted"));
            o.borrow_mut().push("setup");
        });

        ignored.set(2);
        assert_eq!(runs.get(), 1);
        tracked.set(2);
        assert_eq!(runs.get(), 2);

        assert_eq!(flush_microtasks(), 2);
        assert_eq!(*order.borrow(), vec!["setup", "setup", "mounted", "mounted"]);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DOM SCENARIOS
    // ═══════════════════════════════════════════════════════════════════════════

    fn mounted(doc: &Document, html: &str) -> Node {
        let node = template(doc, html).expect("valid markup").instantiate();
        if let Some(body) = doc.body() {
            body.append_child(&node);
        }
        node
    }

    #[test]
    fn test_list_rerenders_wholesale_before_marker() {
        let doc = Document::new();
        let list = mounted(&doc, "<ul><!--tn-for--></ul>");
        let marker = list.first_child().expect("marker comment");

        let items = Signal::new(vec!["a".to_string(), "b".to_string()]);
        let (source, owner) = (items.clone(), doc.clone());
        insert(
            &list,
            Insertable::accessor(move || {
                let rows: Vec<Insertable> = source
                    .get()
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| {
                        let li = owner.create_element("li");
                        li.append_child(&owner.create_text_node(&format!("{}-{}", index, item)));
                        Insertable::Node(li)
                    })
                    .collect();
                Insertable::List(rows)
            }),
            Some(&marker),
        );
        assert_eq!(list.to_html(), "<ul><li>0-a</li><li>1-b</li><!--tn-for--></ul>");

        let first_before = list.first_child().expect("first item");
        items.set(vec!["c".to_string()]);
        assert_eq!(list.to_html(), "<ul><li>0-c</li><!--tn-for--></ul>");
        assert!(first_before.parent().is_none(), "previous items are detached");
    }

    #[test]
    fn test_conditional_swaps_branches() {
        let doc = Document::new();
        let host = mounted(&doc, "<div></div>");
        let n = Signal::new(7);

        let (count, owner) = (n.clone(), doc.clone());
        insert(
            &host,
            Insertable::accessor(move || {
                let label = match count.get() {
                    v if v > 10 => "High",
                    v if v > 5 => "Medium",
                    _ => "Low",
                };
                let p = owner.create_element("p");
                p.append_child(&owner.create_text_node(label));
                Insertable::Node(p)
            }),
            None,
        );
        assert_eq!(host.to_html(), "<div><p>Medium</p></div>");
        n.set(11);
        assert_eq!(host.to_html(), "<div><p>High</p></div>");
        n.set(1);
        assert_eq!(host.to_html(), "<div><p>Low</p></div>");
    }

    #[test]
    fn test_delegated_click_bubbles_until_stopped() {
        let doc = Document::new();
        let outer = mounted(&doc, "<section><div><button>go</button></div></section>");
        let inner = outer.first_child().expect("div");
        let button = inner.first_child().expect("button");
        let log = Rc::new(RefCell::new(Vec::new()));

        for (node, label, stop) in [(&outer, "section", false), (&inner, "div", true), (&button, "button", false)] {
            let sink = Rc::clone(&log);
            spread(
                node,
                [(
                    "onClick",
                    PropValue::Handler(Rc::new(move |event: &Event| {
                        sink.borrow_mut().push(label);
                        if stop {
                            event.stop_propagation();
                        }
                    })),
                )],
            )
            .expect("handler fits an event key");
        }
        delegate_events(&doc, &["click"]);
        assert_eq!(doc.node().listener_count("click"), 1);

        button.dispatch_event("click");
        assert_eq!(*log.borrow(), vec!["button", "div"]);
    }

    #[test]
    fn test_spread_attributes_style_and_children() {
        let doc = Document::new();
        let input = mounted(&doc, "<input>");
        let label = Signal::new("Name".to_string());

        let text = label.clone();
        spread(
            &input,
            [
                ("value", PropValue::from("Ada")),
                ("data-id", PropValue::from(7)),
                ("disabled", PropValue::from(false)),
                ("style", PropValue::Style(vec![("color".into(), "red".into())])),
            ],
        )
        .expect("valid props");
        assert_eq!(input.property("value"), Some(Value::from("Ada")));
        assert_eq!(input.get_attribute("data-id").as_deref(), Some("7"));
        assert!(!input.has_attribute("disabled"));
        assert_eq!(input.style_property("color").as_deref(), Some("red"));

        let div = mounted(&doc, "<div></div>");
        spread(
            &div,
            [(
                "children",
                PropValue::Children(Insertable::accessor(move || Insertable::from(text.get()))),
            )],
        )
        .expect("valid children");
        assert_eq!(div.text_content(), "Name");
        label.set("Email".to_string());
        assert_eq!(div.text_content(), "Email");
    }

    #[test]
    fn test_props_view_reads_live_values() {
        let props = Props::new();
        let count = Signal::new(1);
        let source = count.clone();
        props.set("count", move || Value::from(source.get()));

        let view = merge_props([("count", Value::from(0)), ("label", Value::from("Go"))], &props);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        create_effect(move || sink.borrow_mut().push(format!("{} {}", view.get("label"), view.get("count"))));

        count.set(2);
        props.set_value("label", "Stop");
        assert_eq!(seen.borrow().first().map(String::as_str), Some("Go 1"));
        assert_eq!(seen.borrow().get(1).map(String::as_str), Some("Go 2"));
    }
}
