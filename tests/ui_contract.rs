mod common;

use app_manifest::contract::{collect_action_references, validate_ui_contract_against_manifest};
use app_manifest::manifest::{load_app_manifest, AppManifest, IssueKind, Severity};
use serde_json::{json, Value};

async fn manifest() -> AppManifest {
    load_app_manifest(&common::social_app(), "", None)
        .await
        .manifest
        .expect("fixture app should validate")
}

fn full_contract() -> Value {
    json!({
        "schema_version": "1.0",
        "screens": [
            {"id": "screen.home", "routes": ["/"], "steps_from_home": 0},
            {"id": "screen.onboarding", "routes": ["/onboarding"], "steps_from_home": 1},
            {"id": "screen.profile", "routes": ["/profile"], "steps_from_home": 1},
            {"id": "screen.profile_edit", "routes": ["/profile/edit"], "steps_from_home": 2},
            {"id": "screen.settings", "routes": ["/settings"], "steps_from_home": 1},
            {"id": "screen.notifications", "routes": ["/notifications"], "steps_from_home": 1},
            {"id": "screen.user_profile", "routes": ["/@:handle"], "steps_from_home": 1},
            {"id": "screen.dm_list", "routes": ["/dm"], "steps_from_home": 1},
            {"id": "screen.dm_thread", "routes": ["/dm/:thread"], "steps_from_home": 2}
        ],
        "actions": [
            {"id": "action.open_composer", "available_on": ["screen.home"], "max_steps_from_home": 1},
            {"id": "action.send_post", "available_on": ["screen.home"], "max_steps_from_home": 1},
            {"id": "action.open_notifications", "available_on": ["screen.home"], "max_steps_from_home": 1},
            {"id": "action.open_dm_thread", "available_on": ["screen.dm_list"], "max_steps_from_home": 2},
            {"id": "action.send_dm", "available_on": ["screen.dm_thread"], "max_steps_from_home": 3},
            {"id": "action.edit_profile", "available_on": ["screen.profile"], "max_steps_from_home": 2}
        ]
    })
}

fn messages(issues: &[app_manifest::Issue]) -> Vec<&str> {
    issues.iter().map(|i| i.message.as_str()).collect()
}

#[tokio::test]
async fn test_complete_contract_is_satisfied() {
    let issues = validate_ui_contract_against_manifest(&manifest().await, &full_contract(), "ui-contract.json");
    assert!(issues.is_empty(), "{:#?}", issues);
}

#[tokio::test]
async fn test_references_include_layouts_and_inserts() {
    let refs = collect_action_references(&manifest().await);
    let home = &refs["screen.home"];
    assert!(home.contains("open_composer"));
    assert!(home.contains("action.open_notifications"));
    assert!(home.contains("send_post"));
    assert!(refs["screen.dm_thread"].contains("send_dm"));
}

#[tokio::test]
async fn test_findings_are_warnings_only() {
    let mut contract = full_contract();
    contract["screens"][8]["steps_from_home"] = json!(5);
    contract["actions"][4]["max_steps_from_home"] = json!(9);
    contract["actions"][1]["available_on"] = json!(["screen.settings"]);

    let issues = validate_ui_contract_against_manifest(&manifest().await, &contract, "ui-contract.json");
    assert!(!issues.is_empty());
    assert!(issues.iter().all(|i| i.severity == Severity::Warning && i.kind == IssueKind::Contract));

    let msgs = messages(&issues);
    // send_post is not referenced on settings.
    assert!(msgs.iter().any(|m| m.contains("'action.send_post' is not referenced")), "{:#?}", msgs);
    // dm_thread is now too far away for send_dm's hard budget.
    assert!(msgs.iter().any(|m| m.contains("'screen.dm_thread' is 5 steps from home")), "{:#?}", msgs);
    // The contract itself allows more than the hard limit.
    assert!(msgs.iter().any(|m| m.contains("must be reachable within 3 steps")), "{:#?}", msgs);
    // Distance 5 is still within the contract's own budget of 9.
    assert!(msgs.iter().all(|m| !m.contains("'action.send_dm' is reachable in")), "{:#?}", msgs);
}

#[tokio::test]
async fn test_missing_required_entries_are_listed() {
    let mut contract = full_contract();
    contract["screens"].as_array_mut().unwrap().retain(|s| s["id"] != "screen.settings");
    contract["actions"].as_array_mut().unwrap().retain(|a| a["id"] != "action.send_dm");

    let issues = validate_ui_contract_against_manifest(&manifest().await, &contract, "ui-contract.json");
    let msgs = messages(&issues);
    assert!(msgs.contains(&"required screen 'screen.settings' is missing from the contract"));
    assert!(msgs.contains(&"required action 'action.send_dm' is missing from the contract"));
    assert_eq!(issues.len(), 2, "{:#?}", msgs);
}

#[tokio::test]
async fn test_unknown_screens_and_route_mismatches_are_flagged() {
    let mut contract = full_contract();
    contract["screens"][7]["routes"] = json!(["/messages"]);
    contract["screens"].as_array_mut().unwrap().push(json!({
        "id": "screen.explore", "routes": ["/explore"], "steps_from_home": 1
    }));

    let issues = validate_ui_contract_against_manifest(&manifest().await, &contract, "ui-contract.json");
    let msgs = messages(&issues);
    assert!(msgs.iter().any(|m| m.contains("'/messages'")), "{:#?}", msgs);
    assert!(msgs.iter().any(|m| m.contains("'screen.explore' is neither declared")), "{:#?}", msgs);

    let mismatch = issues.iter().find(|i| i.message.contains("'/messages'")).unwrap();
    let at = mismatch.location.as_ref().unwrap();
    assert_eq!(at.file, "ui-contract.json");
    assert_eq!(at.path, "screens[7].routes[0]");
}

#[tokio::test]
async fn test_malformed_contract_never_panics() {
    let issues = validate_ui_contract_against_manifest(&manifest().await, &json!({"screens": "nope"}), "c.json");
    assert!(!issues.is_empty());
    assert!(issues.iter().all(|i| !i.is_error()));
}
