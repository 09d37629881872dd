use device_bridge::{
    build_backend, build_bridge,
    commands::dispatch,
    config::Settings,
    error::ErrorCode,
    models::{BridgeCall, Outcome, Session},
};
use serde_json::{Value, json};

fn call(method: &str, params: Value) -> BridgeCall {
    serde_json::from_value(json!({ "method": method, "params": params })).unwrap()
}

fn value(outcome: Outcome) -> Value {
    match outcome {
        Outcome::Resolved { value } => value,
        Outcome::Rejected { code, message } => panic!("rejected with {code}: {message}"),
    }
}

#[tokio::test]
async fn stub_flow_over_default_config() {
    let settings = Settings::from_toml("").unwrap();
    let bridge = build_bridge(&settings.bridge).unwrap();
    let mut session = Session::new();

    let rejected = dispatch(&bridge, &mut session, call("startDeviceDiscovery", json!([]))).await;
    assert!(matches!(
        rejected.outcome,
        Outcome::Rejected { code: ErrorCode::NotInitialized, .. }
    ));

    let steps = [
        ("initSDK", json!(["app", "secret", "eu"]), json!(true)),
        ("startDeviceDiscovery", json!([]), json!(true)),
        ("getDiscoveredDevices", json!([]), json!([])),
        ("addDevice", json!(["", "farm", "pw"]), json!(true)),
        ("getDeviceList", json!([]), json!([])),
        ("controlDevice", json!(["missing", {"power": false}]), json!(true)),
        ("getDeviceStatus", json!(["missing"]), json!({"online": true, "name": "Test Device"})),
        ("stopDeviceDiscovery", json!([]), json!(true)),
    ];
    for (method, params, expected) in steps {
        let response = dispatch(&bridge, &mut session, call(method, params)).await;
        assert_eq!(value(response.outcome), expected, "{method}");
    }
}

#[tokio::test]
async fn fixture_flow_commissions_a_device() {
    let settings = Settings::from_toml(
        "[bridge]\nmock_fixtures = true\ninit_policy = \"all_operations\"\n",
    )
    .unwrap();
    let bridge = build_bridge(&settings.bridge).unwrap();
    let mut session = Session::new();

    let response = dispatch(&bridge, &mut session, call("getDeviceList", json!([]))).await;
    assert!(matches!(
        response.outcome,
        Outcome::Rejected { code: ErrorCode::NotInitialized, .. }
    ));

    dispatch(&bridge, &mut session, call("initSDK", json!(["app", "secret", "kr"]))).await;

    let discovered = dispatch(&bridge, &mut session, call("getDiscoveredDevices", json!([]))).await;
    let discovered = value(discovered.outcome);
    assert_eq!(discovered.as_array().map(Vec::len), Some(2));
    assert!(discovered[0].get("online").is_none());

    let status = call("getDeviceStatus", json!(["new_device_001"]));
    let response = dispatch(&bridge, &mut session, status).await;
    assert!(matches!(
        response.outcome,
        Outcome::Rejected { code: ErrorCode::DeviceNotFound, .. }
    ));

    let added = dispatch(
        &bridge,
        &mut session,
        call("addDevice", json!(["new_device_001", "farm", "pw"])),
    )
    .await;
    assert_eq!(value(added.outcome), json!(true));

    let status = call("getDeviceStatus", json!(["new_device_001"]));
    let status = value(dispatch(&bridge, &mut session, status).await.outcome);
    assert_eq!(status, json!({"online": true, "name": "New Smart Device"}));

    let registered = dispatch(&bridge, &mut session, call("getDeviceList", json!([]))).await;
    let registered = value(registered.outcome);
    assert_eq!(registered.as_array().map(Vec::len), Some(4));
}

#[test]
fn vendor_backend_needs_a_binding() {
    let settings = Settings::from_toml("[bridge]\nbackend = \"vendor\"\n").unwrap();
    let err = build_backend(&settings.bridge).err().unwrap();
    assert!(err.to_string().contains("SDK binding"));
}
