use serde_json::json;

use botflow_spec::{BotSpec, IssueSeverity, validate_bot_spec};

fn spec_fixture(value: serde_json::Value) -> BotSpec {
    serde_json::from_value(value).expect("fixture should deserialize")
}

#[test]
fn valid_spec_has_no_issues() {
    let spec = spec_fixture(json!({
        "flows": [
            {
                "entry_cmd": "/book",
                "type": "wizard",
                "params": {
                    "steps": [
                        { "ask": "Name?", "var": "name" },
                        { "widget": { "type": "calendar", "min": "today", "max": "+30d" }, "var": "day" }
                    ],
                    "on_complete": [
                        { "type": "action.sql_exec", "params": { "sql": "INSERT INTO b(n) VALUES (:name)" } },
                        { "type": "action.reply_template", "params": { "text": "Done" } }
                    ]
                }
            },
            { "entry_cmd": "/menu", "type": "menu", "params": { "text": "Pick", "keyboard": [[{ "text": "/book" }]] } }
        ]
    }));
    let report = validate_bot_spec(&spec);
    assert!(report.is_valid(), "{:?}", report.issues);
    assert!(report.issues.is_empty());
}

#[test]
fn unknown_action_type_is_reported_not_fatal_to_loading() {
    let spec = spec_fixture(json!({
        "flows": [
            {
                "entry_cmd": "/x",
                "type": "wizard",
                "params": {
                    "steps": [ { "ask": "?", "var": "v" } ],
                    "on_enter": [ { "type": "action.teleport", "params": {} } ]
                }
            }
        ]
    }));
    let report = validate_bot_spec(&spec);
    assert!(!report.is_valid());
    let issue = report.errors().next().expect("error");
    assert_eq!(issue.code, "unknown_action_type");
    assert_eq!(issue.location, "flows[0](/x).on_enter[0]");
}

#[test]
fn bad_regex_is_only_a_warning() {
    let spec = spec_fixture(json!({
        "flows": [
            {
                "entry_cmd": "/x",
                "type": "wizard",
                "params": {
                    "steps": [ { "ask": "?", "var": "v", "validate": { "regex": "([a-z", "msg": "bad" } } ]
                }
            }
        ]
    }));
    let report = validate_bot_spec(&spec);
    assert!(report.is_valid());
    let warning = report.warnings().next().expect("warning");
    assert_eq!(warning.severity, IssueSeverity::Warning);
    assert_eq!(warning.code, "invalid_regex");
}

#[test]
fn structural_problems_are_errors() {
    let spec = spec_fixture(json!({
        "flows": [
            { "entry_cmd": "/a", "type": "wizard", "params": { "steps": [] } },
            { "entry_cmd": "/a", "type": "wizard", "params": { "steps": [ { "ask": "?", "var": "has:colon" } ] } },
            {
                "entry_cmd": "/p",
                "type": "wizard",
                "params": {
                    "steps": [
                        {
                            "widget": {
                                "type": "pagination",
                                "source": { "type": "ctx", "key": "items" },
                                "page_size": 0,
                                "item_template": "{{name}}"
                            },
                            "var": "item"
                        },
                        {
                            "widget": { "type": "calendar", "min": "2024-05-01", "max": "2024-04-01" },
                            "var": "day"
                        }
                    ]
                }
            }
        ]
    }));
    let report = validate_bot_spec(&spec);
    let codes: Vec<_> = report.errors().map(|issue| issue.code.as_str()).collect();
    assert!(codes.contains(&"no_steps"));
    assert!(codes.contains(&"duplicate_entry_cmd"));
    assert!(codes.contains(&"invalid_var"));
    assert!(codes.contains(&"invalid_page_size"));
    assert!(codes.contains(&"empty_range"));
}

#[test]
fn shadowed_legacy_wizard_is_flagged() {
    let spec = spec_fixture(json!({
        "flows": [
            { "entry_cmd": "/go", "type": "wizard", "params": { "steps": [ { "ask": "?", "var": "v" } ] } }
        ],
        "wizards": [
            { "entry_cmd": "/go", "steps": [ { "ask": "?", "var": "v" } ] }
        ]
    }));
    let report = validate_bot_spec(&spec);
    assert!(report.is_valid());
    assert!(
        report
            .warnings()
            .any(|issue| issue.code == "shadowed_legacy_wizard")
    );
}
