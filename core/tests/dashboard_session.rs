use std::sync::Arc;

use satmachine_core::{
    AdminApi, Config, Confirmation, EditState, FieldInput, FixedModeSchedule, MachineDashboard,
    MachineId, ManualPaymentNotifier, Method, MockTransport, RealtimeState, SettingsController,
};
use serde_json::json;

fn run_future<T>(future: impl std::future::Future<Output = T>) -> T {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("tokio runtime");
    runtime.block_on(future)
}

#[test]
fn admin_session_walks_machine_lifecycle() {
    let transport = MockTransport::new();
    let notifier = ManualPaymentNotifier::new();
    let mut dashboard =
        MachineDashboard::new(AdminApi::new(transport.clone()), Arc::new(notifier.clone()));

    transport.push_json(json!([]));
    let task = dashboard.list().expect("list");
    dashboard.apply(run_future(task));
    assert!(dashboard.machines().is_empty());

    dashboard.open_create();
    let form = dashboard.form_mut().expect("form");
    form.set_field("name", FieldInput::Text("Kiosk1".to_string()));
    form.set_field("wallet", FieldInput::Text("w1".to_string()));
    form.set_field("lnurlpayamount", FieldInput::Number(0.0));
    transport.push_json(json!({
        "id": "abc123", "name": "Kiosk1", "wallet": "w1",
        "lnurlpayamount": 0, "lnurlwithdrawamount": 0, "total": 0,
        "lnurlpay": "LNURL1KIOSK"
    }));
    let task = dashboard.submit().expect("create");
    dashboard.apply(run_future(task));
    assert_eq!(dashboard.edit_state(), EditState::Idle);
    assert_eq!(dashboard.machines().len(), 1);

    let id = MachineId::new("abc123");
    assert!(dashboard.open_edit(&id));
    dashboard
        .form_mut()
        .expect("form")
        .set_field("lnurlwithdrawamount", FieldInput::Number(21.0));
    transport.push_json(json!({
        "id": "abc123", "name": "Kiosk1", "wallet": "w1",
        "lnurlpayamount": 0, "lnurlwithdrawamount": 21, "total": 0,
        "lnurlpay": "LNURL1KIOSK"
    }));
    let task = dashboard.submit().expect("update");
    dashboard.apply(run_future(task));
    assert_eq!(dashboard.machine(&id).expect("machine").lnurlwithdrawamount, 21);

    let wait = dashboard.open_realtime(&id).expect("wait");
    assert_eq!(dashboard.qr_value(), Some("LNURL1KIOSK"));
    assert!(notifier.trigger("abc123"));
    dashboard.apply(run_future(wait));
    assert_eq!(dashboard.realtime_state(), RealtimeState::Idle);

    assert!(dashboard.request_delete(&id));
    assert!(dashboard.resolve_delete(Confirmation::Declined).is_none());
    assert_eq!(dashboard.machines().len(), 1);

    assert!(dashboard.request_delete(&id));
    transport.push_json(json!(null));
    let task = dashboard
        .resolve_delete(Confirmation::Accepted)
        .expect("delete");
    dashboard.apply(run_future(task));
    assert!(dashboard.machines().is_empty());

    let methods: Vec<Method> = transport
        .requests()
        .iter()
        .map(|request| request.method)
        .collect();
    assert_eq!(
        methods,
        [Method::Get, Method::Post, Method::Put, Method::Delete]
    );
}

#[test]
fn settings_save_then_load_returns_saved_config() {
    let transport = MockTransport::new();
    let mut settings = SettingsController::new(AdminApi::new(transport.clone()));

    for schedule in FixedModeSchedule::ALL {
        let config = Config {
            processing_enabled: schedule != FixedModeSchedule::Daily,
            lamassu_server_ip: "192.168.1.20".to_string(),
            fixed_mode_schedule: schedule,
            fixed_mode_time: "23:59".to_string(),
            max_daily_fixed_amount: 150.5,
            ..Config::default()
        };
        transport.push_json(json!({"ok": true}));
        transport.push_json(serde_json::to_value(&config).expect("encode"));

        let task = settings.save(config.clone()).expect("save");
        let reload = settings.apply(run_future(task)).expect("reload");
        settings.apply(run_future(reload));

        assert_eq!(settings.config(), Some(&config));
        assert!(!settings.is_saving());
        assert!(!settings.is_fetching());
    }
}
