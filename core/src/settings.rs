use tracing::{debug, info, warn};

use crate::api::{AdminApi, Task, task};
use crate::error::Failure;
use crate::forms::SettingsForm;
use crate::model::Config;
use crate::notify::Notifications;
use crate::targets;

pub const SAVED_MESSAGE: &str = "Configuration saved successfully";
pub const CONNECTION_OK_MESSAGE: &str = "Connection test successful";

#[derive(Debug, Clone)]
pub enum SettingsEvent {
    Loaded(Result<Config, Failure>),
    Saved(Result<(), Failure>),
    Tested(Result<(), Failure>),
}

/// Owns the deployment config and the form that edits it.
#[derive(Debug)]
pub struct SettingsController {
    api: AdminApi,
    config: Option<Config>,
    form: SettingsForm,
    fetching: bool,
    /// A save finished while a load was in flight; that load may predate the save.
    reload_pending: bool,
    testing: bool,
    notifications: Notifications,
}

impl SettingsController {
    pub fn new(api: AdminApi) -> Self {
        Self {
            api,
            config: None,
            form: SettingsForm::default(),
            fetching: false,
            reload_pending: false,
            testing: false,
            notifications: Notifications::default(),
        }
    }

    /// Last config the server returned.
    pub fn config(&self) -> Option<&Config> {
        self.config.as_ref()
    }

    pub fn form(&self) -> &SettingsForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut SettingsForm {
        &mut self.form
    }

    pub fn is_fetching(&self) -> bool {
        self.fetching
    }

    pub fn is_saving(&self) -> bool {
        self.form.is_loading()
    }

    pub fn is_testing(&self) -> bool {
        self.testing
    }

    pub fn notifications_mut(&mut self) -> &mut Notifications {
        &mut self.notifications
    }

    pub fn load(&mut self) -> Option<Task<SettingsEvent>> {
        if self.fetching {
            return None;
        }
        self.fetching = true;
        Some(task(self.api.get_config(), SettingsEvent::Loaded))
    }

    /// Validates the form buffer and saves it.
    pub fn submit_form(&mut self) -> Option<Task<SettingsEvent>> {
        let config = self.form.submit()?;
        self.save(config)
    }

    pub fn save(&mut self, config: Config) -> Option<Task<SettingsEvent>> {
        if self.form.is_loading() {
            return None;
        }
        self.form.set_loading(true);
        Some(task(self.api.save_config(&config), SettingsEvent::Saved))
    }

    pub fn test_connection(&mut self, server_ip: &str) -> Option<Task<SettingsEvent>> {
        if self.testing {
            return None;
        }
        self.testing = true;
        Some(task(
            self.api.test_connection(server_ip.trim()),
            SettingsEvent::Tested,
        ))
    }

    /// Applies an outcome. A successful save returns the reload that confirms it.
    pub fn apply(&mut self, event: SettingsEvent) -> Option<Task<SettingsEvent>> {
        match event {
            SettingsEvent::Loaded(result) => {
                self.fetching = false;
                if self.reload_pending {
                    self.reload_pending = false;
                    debug!(target: targets::API, "Discarding config loaded before the last save");
                    return self.load();
                }
                match result {
                    Ok(config) => {
                        self.form.reset(Some(config.clone()));
                        self.config = Some(config);
                    }
                    Err(failure) => self.fail("load", &failure),
                }
                None
            }
            SettingsEvent::Saved(result) => {
                self.form.set_loading(false);
                match result {
                    Ok(()) => {
                        info!(target: targets::API, "Configuration saved");
                        self.notifications.positive(SAVED_MESSAGE);
                        if self.fetching {
                            self.reload_pending = true;
                            None
                        } else {
                            self.load()
                        }
                    }
                    Err(failure) => {
                        self.fail("save", &failure);
                        None
                    }
                }
            }
            SettingsEvent::Tested(result) => {
                self.testing = false;
                match result {
                    Ok(()) => self.notifications.positive(CONNECTION_OK_MESSAGE),
                    Err(failure) => self.fail("test connection", &failure),
                }
                None
            }
        }
    }

    fn fail(&mut self, action: &str, failure: &Failure) {
        warn!(target: targets::API, action, error = %failure, "Settings request failed");
        self.notifications.negative(failure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{CONFIG_PATH, Method, MockTransport};
    use crate::forms::FieldInput;
    use crate::model::FixedModeSchedule;
    use crate::notify::NotificationKind;
    use serde_json::json;

    fn run_future<T>(future: impl std::future::Future<Output = T>) -> T {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("tokio runtime");
        runtime.block_on(future)
    }

    #[test]
    fn save_notifies_and_reloads() {
        let transport = MockTransport::new();
        let mut settings = SettingsController::new(AdminApi::new(transport.clone()));
        let config = Config {
            processing_enabled: true,
            lamassu_server_ip: "10.0.0.5".to_string(),
            fixed_mode_schedule: FixedModeSchedule::Weekly,
            fixed_mode_time: "08:30".to_string(),
            max_daily_fixed_amount: 2000.0,
            ..Config::default()
        };
        transport.push_json(json!(null));
        transport.push_json(serde_json::to_value(&config).expect("encode"));

        let task = settings.save(config.clone()).expect("save task");
        assert!(settings.save(config.clone()).is_none());
        let reload = settings.apply(run_future(task)).expect("reload task");
        assert!(!settings.is_saving());
        settings.apply(run_future(reload));

        assert_eq!(settings.config(), Some(&config));
        assert_eq!(settings.form().buffer(), &config);
        let notes = settings.notifications_mut().drain();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].message, SAVED_MESSAGE);

        let requests = transport.requests();
        assert_eq!(requests[0].method, Method::Put);
        assert_eq!(requests[1].method, Method::Get);
        assert_eq!(requests[1].path, CONFIG_PATH);
    }

    #[test]
    fn load_in_flight_during_save_is_replaced_by_reload() {
        let transport = MockTransport::new();
        let mut settings = SettingsController::new(AdminApi::new(transport.clone()));
        let before = Config {
            fixed_mode_schedule: FixedModeSchedule::Daily,
            ..Config::default()
        };
        let after = Config {
            fixed_mode_schedule: FixedModeSchedule::Weekly,
            ..Config::default()
        };

        let load = settings.load().expect("load task");
        let save = settings.save(after.clone()).expect("save task");
        transport.push_json(json!(null));
        assert!(settings.apply(run_future(save)).is_none());

        transport.push_json(serde_json::to_value(&before).expect("encode"));
        let reload = settings
            .apply(run_future(load))
            .expect("reload after stale load");
        assert_eq!(settings.config(), None);

        transport.push_json(serde_json::to_value(&after).expect("encode"));
        assert!(settings.apply(run_future(reload)).is_none());
        assert_eq!(settings.config(), Some(&after));
        assert_eq!(settings.form().buffer(), &after);
        assert!(!settings.is_fetching());
    }

    #[test]
    fn failed_save_clears_busy_flag_without_reload() {
        let transport = MockTransport::new();
        transport.push_api_error(500, "database is locked");
        let mut settings = SettingsController::new(AdminApi::new(transport.clone()));

        let task = settings.save(Config::default()).expect("save task");
        assert!(settings.apply(run_future(task)).is_none());
        assert!(!settings.is_saving());
        let notes = settings.notifications_mut().drain();
        assert_eq!(notes[0].kind, NotificationKind::Negative);
        assert_eq!(notes[0].message, "database is locked");
    }

    #[test]
    fn invalid_form_is_not_saved() {
        let transport = MockTransport::new();
        let mut settings = SettingsController::new(AdminApi::new(transport.clone()));
        settings
            .form_mut()
            .set_field("fixed_mode_time", FieldInput::Text("25:00".to_string()));

        assert!(settings.submit_form().is_none());
        assert!(settings.form().error("fixed_mode_time").is_some());
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn connection_test_never_touches_config() {
        let transport = MockTransport::new();
        transport.push_api_error(502, "Connection refused");
        let mut settings = SettingsController::new(AdminApi::new(transport.clone()));

        let task = settings.test_connection(" 10.0.0.9 ").expect("test task");
        assert!(settings.test_connection("10.0.0.9").is_none());
        settings.apply(run_future(task));

        assert!(!settings.is_testing());
        assert!(settings.config().is_none());
        let request = transport.last_request().expect("request");
        assert_eq!(request.body, Some(json!({"server_ip": "10.0.0.9"})));
        assert_eq!(
            settings.notifications_mut().drain()[0].message,
            "Connection refused"
        );
    }
}
