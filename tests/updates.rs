use traceviz_core::{fixed, local, value_map, Action, Case, ConfigurationError, Payload, Predicate, Update, Value};

fn is(value: &Value, expected: i64) -> Predicate {
	Predicate::Equals(fixed!(*value), fixed!(Value::integer(expected)))
}

#[test]
fn set_from_local() {
	let selected = Value::integer(0);
	let update = Update::set(fixed!(selected), local!("id"));
	update.update(Some(&value_map! { "id" => Value::integer(42) })).unwrap();
	assert_eq!(selected.payload(), Payload::Integer(42));

	let err = update.update(None).unwrap_err();
	assert_eq!(err.component, "update");
	assert!(err.message.contains("local value 'id'"), "{}", err.message);
}

#[test]
fn set_or_clear_and_toggle() {
	let selected = Value::string("a");
	let local = value_map! { "id" => Value::string("a") };
	Update::set_or_clear(fixed!(selected), local!("id")).update(Some(&local)).unwrap();
	assert!(selected.is_zero());

	let set = Value::string_set(["a", "b"]);
	Update::toggle(fixed!(set), local!("id")).update(Some(&local)).unwrap();
	assert_eq!(set.to_string(), "b");
	Update::toggle(fixed!(set), local!("id")).update(Some(&local)).unwrap();
	assert_eq!(set.to_string(), "a, b");
}

#[test]
fn extend_appends() {
	let history = Value::integer_list([1]);
	Update::extend(fixed!(history), fixed!(Value::integer(2))).update(None).unwrap();
	assert_eq!(history.payload(), Payload::IntegerList(vec![1, 2]));
}

#[test]
fn fold_errors_name_the_update() {
	let dest = Value::integer(0);
	let err = Update::set(fixed!(dest), fixed!(Value::string("x")))
		.update(None)
		.unwrap_err();
	assert_eq!(err.component, "update");
	assert!(err.message.contains("string"), "{}", err.message);
}

#[test]
fn set_if_empty_only_fills_zero() {
	let dest = Value::string("");
	Update::set_if_empty(fixed!(dest), fixed!(Value::string("first"))).update(None).unwrap();
	Update::set_if_empty(fixed!(dest), fixed!(Value::string("second"))).update(None).unwrap();
	assert_eq!(dest.to_string(), "first");
}

#[test]
fn clear_resets_every_target() {
	let a = Value::integer(3);
	let b = Value::string_list(["x"]);
	Update::Clear(vec![fixed!(a), fixed!(b)]).update(None).unwrap();
	assert!(a.is_zero());
	assert!(b.is_zero());
}

#[test]
fn swap_exchanges_payloads() {
	let a = Value::string("left");
	let b = Value::string("right");
	Update::Swap(fixed!(a), fixed!(b)).update(None).unwrap();
	assert_eq!(a.to_string(), "right");
	assert_eq!(b.to_string(), "left");
}

#[test]
fn failed_swap_leaves_both_sides() {
	let a = Value::string_list(["x"]);
	let b = Value::string("y");
	let err = Update::Swap(fixed!(a), fixed!(b)).update(None).unwrap_err();
	assert_eq!(err.component, "update");
	assert_eq!(a.payload(), Payload::StringList(vec!["x".into()]));
	assert_eq!(b.payload(), Payload::String("y".into()));
}

#[test]
fn failed_pop_keeps_the_head() {
	let stack = Value::string_list(["x", "y"]);
	let count = Value::integer(7);
	let pop = Update::PopLeft {
		src: fixed!(stack),
		dest: Some(fixed!(count)),
	};
	assert!(pop.update(None).is_err());
	assert_eq!(stack.payload(), Payload::StringList(vec!["x".into(), "y".into()]));
	assert_eq!(count.payload(), Payload::Integer(7));

	let discard = Update::PopLeft {
		src: fixed!(stack),
		dest: None,
	};
	discard.update(None).unwrap();
	assert_eq!(stack.to_string(), "y");
}

#[test]
fn push_pop_and_concat() {
	let stack = Value::string_list(["b"]);
	let top = Value::string("");

	Update::PushLeft {
		dest: fixed!(stack),
		src: fixed!(Value::string("a")),
	}
	.update(None)
	.unwrap();
	assert_eq!(stack.to_string(), "a, b");

	let pop = Update::PopLeft {
		src: fixed!(stack),
		dest: Some(fixed!(top)),
	};
	pop.update(None).unwrap();
	assert_eq!(top.to_string(), "a");
	pop.update(None).unwrap();
	assert_eq!(top.to_string(), "b");
	pop.update(None).unwrap();
	assert!(top.is_zero());

	Update::Concat {
		dest: fixed!(stack),
		srcs: vec![fixed!(Value::string_list(["x", "y"])), local!("more")],
	}
	.update(Some(&value_map! { "more" => Value::string("z") }))
	.unwrap();
	assert_eq!(stack.to_string(), "x, y, z");

	let not_a_list = Update::PushLeft {
		dest: fixed!(top),
		src: fixed!(Value::string("a")),
	};
	assert!(not_a_list.update(None).is_err());
}

#[test]
fn conditionals() {
	let mode = Value::integer(1);
	let out = Value::string("");
	let write = |text: &str| Update::set(fixed!(out), fixed!(Value::string(text)));

	let branch = Update::If {
		predicate: is(&mode, 1),
		then: vec![write("one")],
		otherwise: vec![write("other")],
	};
	branch.update(None).unwrap();
	assert_eq!(out.to_string(), "one");
	mode.set(Payload::Integer(5)).unwrap();
	branch.update(None).unwrap();
	assert_eq!(out.to_string(), "other");

	let switch = Update::Switch {
		cases: vec![
			Case::new(is(&mode, 1), vec![write("first")]),
			Case::new(Predicate::GreaterThan(fixed!(mode), fixed!(Value::integer(2))), vec![write("big")]),
			Case::new(Predicate::True, vec![write("unreached")]),
		],
		default: vec![write("default")],
	};
	switch.update(None).unwrap();
	assert_eq!(out.to_string(), "big");

	let none_match = Update::Switch {
		cases: vec![Case::new(Predicate::False, vec![write("never")])],
		default: vec![write("default")],
	};
	none_match.update(None).unwrap();
	assert_eq!(out.to_string(), "default");

	let case = Case::new(is(&mode, 7), vec![write("seven")]);
	assert!(!case.update(None).unwrap());
	mode.set(Payload::Integer(7)).unwrap();
	assert!(case.update(None).unwrap());
	Update::Case(Case::new(Predicate::False, vec![write("nope")])).update(None).unwrap();
	assert_eq!(out.to_string(), "seven");
}

#[test]
fn do_runs_in_order() {
	let log = Value::string_list(Vec::<String>::new());
	Update::Do(vec![
		Update::extend(fixed!(log), fixed!(Value::string("a"))),
		Update::extend(fixed!(log), fixed!(Value::string("b"))),
	])
	.update(None)
	.unwrap();
	assert_eq!(log.to_string(), "a, b");
}

#[test]
fn invalid_updates_fail_only_when_run() {
	let err = ConfigurationError::new("config", "bad arity");
	let out = Value::integer(0);
	let guarded = Update::If {
		predicate: Predicate::False,
		then: vec![Update::Invalid(err.clone())],
		otherwise: vec![Update::set(fixed!(out), fixed!(Value::integer(1)))],
	};
	guarded.update(None).unwrap();
	assert_eq!(out.payload(), Payload::Integer(1));

	let action = Action::new("row", "click", vec![Update::Invalid(err.clone())]);
	assert_eq!(action.update(None).unwrap_err(), err);
}
