use std::rc::Rc;
use std::time::Duration;

use traceviz_core::config::InteractionsConfig;
use traceviz_core::{value_map, ManualScheduler, Payload, Value, ValueMap};

use crate::record;

fn globals() -> ValueMap {
	value_map! {
		"selected" => Value::integer(0),
		"hovered" => Value::string_set(Vec::<String>::new()),
		"zoom" => Value::integer(1),
	}
}

const SELECTION: &str = r#"{
	"actions": [
		{ "target": "row", "type": "click", "updates": [
			{ "set": { "dest": { "global": "selected" }, "src": { "local": "id" } } }
		] },
		{ "target": "row", "type": "hover", "updates": [
			{ "toggle": { "dest": { "global": "hovered" }, "src": { "local": "name" } } }
		] },
		{ "target": "chart", "type": "reset", "updates": [
			{ "clear": [{ "global": "selected" }, { "global": "hovered" }] },
			{ "set": { "dest": { "global": "zoom" }, "src": { "literal": 1 } } }
		] }
	],
	"reactions": [
		{ "target": "row", "type": "highlight", "predicate": {
			"or": [
				{ "equals": [{ "global": "selected" }, { "local": "id" }] },
				{ "includes": [{ "global": "hovered" }, { "local": "name" }] }
			]
		} }
	],
	"watches": [
		{ "type": "redraw", "values": ["zoom"] }
	]
}"#;

#[test]
fn builds_a_working_registry() {
	crate::init_tracing();

	let globals = globals();
	let interactions = InteractionsConfig::from_json(SELECTION)
		.unwrap()
		.build(&globals, None)
		.unwrap();
	interactions
		.check_for_supported_actions(&[("row", "click"), ("row", "hover"), ("chart", "reset")])
		.unwrap();
	interactions.check_for_supported_reactions(&[("row", "highlight")]).unwrap();
	interactions.check_for_supported_watches(&["redraw"]).unwrap();

	let row = value_map! { "id" => Value::integer(3), "name" => Value::string("cpu") };
	let (seen, _subscription) = record(
		&interactions
			.match_reaction("row", "highlight")
			.matches(Some(&row))
			.unwrap(),
	);

	interactions.update("row", "hover", Some(&row)).unwrap();
	interactions.update("row", "click", Some(&row)).unwrap();
	assert_eq!(globals.get("hovered").unwrap().to_string(), "cpu");
	assert_eq!(globals.get("selected").unwrap().payload(), Payload::Integer(3));
	assert_eq!(*seen.borrow(), vec![false, true]);

	globals.get("zoom").unwrap().set(Payload::Integer(4)).unwrap();
	interactions.update("chart", "reset", None).unwrap();
	assert!(globals.get("selected").unwrap().is_zero());
	assert!(globals.get("hovered").unwrap().is_zero());
	assert_eq!(globals.expect_number("zoom").unwrap(), 1.0);
	assert_eq!(*seen.borrow(), vec![false, true, false]);
}

#[test]
fn broken_combinators_fail_only_when_run() {
	let json = r#"{
		"actions": [
			{ "target": "row", "type": "click", "updates": [
				{ "set": { "dest": { "global": "nope" }, "src": { "literal": 1 } } }
			] },
			{ "target": "row", "type": "hover", "updates": [] }
		],
		"reactions": [
			{ "target": "row", "type": "highlight", "predicate": { "equals": [{ "literal": 1 }] } }
		]
	}"#;
	let interactions = InteractionsConfig::from_json(json).unwrap().build(&globals(), None).unwrap();

	interactions.update("row", "hover", None).unwrap();
	let err = interactions.update("row", "click", None).unwrap_err();
	assert!(err.message.contains("nope"), "{}", err.message);

	let err = interactions
		.match_reaction("row", "highlight")
		.matches(None)
		.unwrap_err();
	assert!(err.message.contains("exactly two"), "{}", err.message);
}

#[test]
fn watches_need_known_globals() {
	let json = r#"{ "watches": [{ "type": "redraw", "values": ["missing"] }] }"#;
	assert!(InteractionsConfig::from_json(json).unwrap().build(&globals(), None).is_err());
}

#[test]
fn malformed_documents_are_rejected() {
	assert!(InteractionsConfig::from_json("{").is_err());
	assert!(InteractionsConfig::from_json(r#"{ "extra": [] }"#).is_err());
	assert!(InteractionsConfig::from_json(r#"{ "actions": [{ "target": "row" }] }"#).is_err());

	let err = InteractionsConfig::from_json(r#"{ "actions": [{ "target": "row", "type": "click", "updates": [{ "explode": {} }] }] }"#)
		.unwrap_err();
	assert_eq!(err.component, "config");
}

#[test]
fn literals_cover_every_shape() {
	let json = r#"{
		"actions": [
			{ "target": "t", "type": "literals", "updates": [
				{ "set": { "dest": { "local": "s" }, "src": { "literal": "text" } } },
				{ "set": { "dest": { "local": "d" }, "src": { "literal": 0.25 } } },
				{ "set": { "dest": { "local": "sl" }, "src": { "literal": ["a", "b"] } } },
				{ "set": { "dest": { "local": "il" }, "src": { "literal": [1, 2] } } },
				{ "set": { "dest": { "local": "ts" }, "src": { "literal": { "seconds": 2, "nanos": 5 } } } },
				{ "set": { "dest": { "local": "s" }, "src": { "literal": null } } }
			] },
			{ "target": "t", "type": "bool", "updates": [
				{ "set": { "dest": { "local": "s" }, "src": { "literal": true } } }
			] }
		]
	}"#;
	let interactions = InteractionsConfig::from_json(json).unwrap().build(&ValueMap::new(), None).unwrap();

	let local = value_map! {
		"s" => Value::string("old"),
		"d" => Value::double(0.0),
		"sl" => Value::string_list(Vec::<String>::new()),
		"il" => Value::integer_list([]),
		"ts" => Value::zero(traceviz_core::ValueKind::Timestamp),
	};
	interactions.update("t", "literals", Some(&local)).unwrap();
	assert!(local.get("s").unwrap().is_zero());
	assert_eq!(local.expect_number("d").unwrap(), 0.25);
	assert_eq!(local.expect_string_list("sl").unwrap(), vec!["a", "b"]);
	assert_eq!(local.expect_integer_list("il").unwrap(), vec![1, 2]);
	assert_eq!(local.expect_timestamp("ts").unwrap().nanos, 5);

	assert!(interactions.update("t", "bool", Some(&local)).is_err());
}

#[test]
fn overflowing_timestamp_literals_fail_when_run() {
	let json = r#"{
		"actions": [
			{ "target": "t", "type": "far", "updates": [
				{ "set": { "dest": { "local": "ts" }, "src": { "literal": { "seconds": 9223372036854775807, "nanos": 2000000000 } } } }
			] }
		]
	}"#;
	let interactions = InteractionsConfig::from_json(json).unwrap().build(&ValueMap::new(), None).unwrap();
	let local = value_map! { "ts" => Value::zero(traceviz_core::ValueKind::Timestamp) };
	let err = interactions.update("t", "far", Some(&local)).unwrap_err();
	assert_eq!(err.component, "config");
	assert!(local.get("ts").unwrap().is_zero());
}

#[test]
fn changed_windows_use_the_scheduler() {
	let json = r#"{
		"reactions": [
			{ "target": "chart", "type": "busy", "predicate": {
				"changed": { "values": [{ "global": "zoom" }], "window_ms": 50 }
			} }
		]
	}"#;
	let config = InteractionsConfig::from_json(json).unwrap();

	let without = config.build(&globals(), None).unwrap();
	assert!(without.match_reaction("chart", "busy").matches(None).is_err());

	let globals = globals();
	let scheduler = ManualScheduler::new();
	let interactions = config.build(&globals, Some(Rc::new(scheduler.clone()))).unwrap();
	let (seen, _subscription) = record(&interactions.match_reaction("chart", "busy").matches(None).unwrap());

	globals.get("zoom").unwrap().set(Payload::Integer(2)).unwrap();
	scheduler.advance(Duration::from_millis(50));
	assert_eq!(*seen.borrow(), vec![false, true, false]);
}

#[test]
fn conditional_updates_from_config() {
	let json = r#"{
		"actions": [
			{ "target": "row", "type": "click", "updates": [
				{ "switch": {
					"cases": [
						{ "predicate": { "less_than": [{ "local": "id" }, { "literal": 10 }] },
						  "then": [{ "set": { "dest": { "global": "zoom" }, "src": { "literal": 2 } } }] }
					],
					"default": [{ "set": { "dest": { "global": "zoom" }, "src": { "literal": 3 } } }]
				} },
				{ "if": {
					"predicate": { "not": "false" },
					"then": [{ "push_left": { "dest": { "local": "trail" }, "src": { "local": "id" } } }]
				} }
			] }
		]
	}"#;
	let globals = globals();
	let interactions = InteractionsConfig::from_json(json).unwrap().build(&globals, None).unwrap();

	let trail = Value::integer_list([]);
	interactions
		.update("row", "click", Some(&value_map! { "id" => Value::integer(4), "trail" => trail.clone() }))
		.unwrap();
	assert_eq!(globals.expect_number("zoom").unwrap(), 2.0);
	interactions
		.update("row", "click", Some(&value_map! { "id" => Value::integer(40), "trail" => trail.clone() }))
		.unwrap();
	assert_eq!(globals.expect_number("zoom").unwrap(), 3.0);
	assert_eq!(trail.payload(), Payload::IntegerList(vec![40, 4]));
}
