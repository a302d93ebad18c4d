use std::collections::HashMap;
use std::fs;
use std::time::Instant;

use iced::Command;
use iced::widget::qr_code;
use satmachine_core::{Confirmation, Failure, FieldInput, ItemKey, RealtimeState, Task, targets};

use super::types::{DeleteTarget, FormId, Message, RecordKind, Tab, Toast};
use super::{AdminApp, QrCache, Session};
use crate::logging::{LogEntry, apply_log_level};

const DIAGNOSTIC_LOG_LINES: usize = 50;

/// Turns an optional controller task into an iced command tagged with `session`.
fn perform<E>(session: u64, task: Option<Task<E>>, wrap: fn(u64, E) -> Message) -> Command<Message>
where
    E: Send + 'static,
{
    match task {
        Some(task) => Command::perform(task, move |event| wrap(session, event)),
        None => Command::none(),
    }
}

/// Outcomes from a replaced session must not reach the current controllers.
fn from_other_session(message: &Message, current: u64) -> bool {
    message
        .origin_session()
        .is_some_and(|origin| origin != current)
}

fn clear_numbers(inputs: &mut HashMap<(FormId, &'static str), String>, form: FormId) {
    inputs.retain(|(owner, _), _| *owner != form);
}

impl AdminApp {
    pub(super) fn handle(&mut self, message: Message) -> Command<Message> {
        match message {
            Message::LogTick => {
                self.refresh_logs();
                let now = Instant::now();
                self.toasts.retain(|toast| !toast.expired(now));
                Command::none()
            }
            Message::LogLevelChanged(level) => {
                self.log_level = level;
                apply_log_level(&self.reload_handle, level);
                tracing::info!(target: targets::UI, "Log level set to {}", level);
                Command::none()
            }
            Message::ToggleTarget(target, enabled) => {
                if enabled {
                    self.enabled_targets.insert(target);
                } else {
                    self.enabled_targets.remove(&target);
                }
                Command::none()
            }
            Message::CopyDiagnostics => {
                self.copy_status = Some(self.copy_diagnostics());
                Command::none()
            }
            Message::CopyText(value) => {
                self.copy_status = Some(copy_to_clipboard(value));
                Command::none()
            }
            Message::ClearLogs => {
                self.log_store.clear();
                self.log_entries.clear();
                Command::none()
            }
            Message::SelectTab(tab) => {
                self.active_tab = tab;
                self.load_tab(tab)
            }
            Message::CloseDialogs => {
                self.close_top_dialog();
                Command::none()
            }
            Message::DismissNotification(index) => {
                if index < self.toasts.len() {
                    self.toasts.remove(index);
                }
                Command::none()
            }
            Message::InvoiceAmountChanged(value) => {
                if let Some(session) = self.session.as_mut() {
                    let trimmed = value.trim();
                    if trimmed.is_empty() {
                        session.machines.set_invoice_amount(0);
                    } else if let Ok(amount) = trimmed.parse::<u64>() {
                        session.machines.set_invoice_amount(amount);
                    }
                }
                self.invoice_amount_text = value;
                Command::none()
            }
            Message::ToggleItems(id) => {
                if !self.expanded_items.remove(&id) {
                    self.expanded_items.insert(id);
                }
                Command::none()
            }
            Message::ExportPathChanged(value) => {
                self.export_path = value;
                Command::none()
            }
            Message::ExportMachines => {
                self.export_machines();
                Command::none()
            }
            Message::ConnectionAddressChanged(value) => {
                self.connection_address = value;
                Command::none()
            }
            Message::ProfileFieldChanged(field, value) => {
                *self.profile_inputs.field_mut(field) = value;
                Command::none()
            }
            Message::SaveProfile => self.save_profile(),
            Message::ApplyProfile => self.apply_profile(),
            message => self.handle_session(message),
        }
    }

    fn handle_session(&mut self, message: Message) -> Command<Message> {
        let Some(session) = self.session.as_mut() else {
            tracing::debug!(target: targets::UI, "No session; ignoring {:?}", message);
            return Command::none();
        };
        if from_other_session(&message, session.id) {
            tracing::debug!(
                target: targets::UI,
                current = session.id,
                "Dropping outcome from a replaced session"
            );
            return Command::none();
        }

        match message {
            Message::TextChanged { form, field, value } => {
                set_field(session, form, field, FieldInput::Text(value));
                Command::none()
            }
            Message::NumberChanged { form, field, value } => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    set_field(session, form, field, FieldInput::Number(0.0));
                } else if let Ok(number) = trimmed.parse::<f64>() {
                    set_field(session, form, field, FieldInput::Number(number));
                }
                self.number_inputs.insert((form, field), value);
                Command::none()
            }
            Message::FlagChanged { form, field, value } => {
                set_field(session, form, field, FieldInput::Flag(value));
                Command::none()
            }
            Message::ResolveDelete(target, answer) => match target {
                DeleteTarget::Machine => {
                    perform(session.id, session.machines.resolve_delete(answer), Message::Machines)
                }
                DeleteTarget::Client => {
                    perform(session.id, session.clients.resolve_delete(answer), Message::Clients)
                }
                DeleteTarget::Recipient => {
                    perform(
                        session.id,
                        session.recipients.resolve_delete(answer),
                        Message::Recipients,
                    )
                }
            },
            Message::Machines(_, event) => {
                perform(session.id, session.machines.apply(event), Message::Machines)
            }
            Message::ReloadMachines => {
                perform(session.id, session.machines.list(), Message::Machines)
            }
            Message::RefreshMachine(id) => {
                let origin = session.id;
                Command::perform(session.machines.refresh(&id), move |event| {
                    Message::Machines(origin, event)
                })
            }
            Message::OpenCreateMachine => {
                session.machines.open_create();
                clear_numbers(&mut self.number_inputs, FormId::Machine);
                Command::none()
            }
            Message::OpenEditMachine(id) => {
                if !session.machines.open_edit(&id) {
                    tracing::warn!(target: targets::UI, id = %id, "Machine not in list");
                }
                clear_numbers(&mut self.number_inputs, FormId::Machine);
                Command::none()
            }
            Message::CloseMachineForm => {
                session.machines.close_edit();
                Command::none()
            }
            Message::SubmitMachine => {
                perform(session.id, session.machines.submit(), Message::Machines)
            }
            Message::AdvancedTipsToggled(value) => {
                session.machines.set_tips(value);
                Command::none()
            }
            Message::AdvancedOtcToggled(value) => {
                session.machines.set_otc(value);
                if !value {
                    self.number_inputs.remove(&(FormId::Machine, "withdrawlimit"));
                }
                Command::none()
            }
            Message::RequestDeleteMachine(id) => {
                session.machines.request_delete(&id);
                Command::none()
            }
            Message::OpenRealtime(id) => {
                self.invoice_amount_text = session.machines.invoice_amount().to_string();
                perform(session.id, session.machines.open_realtime(&id), Message::Machines)
            }
            Message::CloseRealtime => {
                session.machines.close_realtime();
                Command::none()
            }
            Message::CreateInvoice(id) => {
                perform(session.id, session.machines.create_invoice(&id), Message::Machines)
            }
            Message::OpenItemForm(key) => {
                match key.parse::<ItemKey>() {
                    Ok(key) => {
                        if session.machines.open_item_form(&key) {
                            clear_numbers(&mut self.number_inputs, FormId::Item);
                        } else {
                            tracing::warn!(target: targets::UI, key = %key, "Line item not found");
                        }
                    }
                    Err(error) => {
                        tracing::warn!(target: targets::UI, "Bad line item key: {}", error)
                    }
                }
                Command::none()
            }
            Message::CloseItemForm => {
                session.machines.close_item_form();
                Command::none()
            }
            Message::SubmitItem => {
                perform(session.id, session.machines.submit_item(), Message::Machines)
            }
            Message::Clients(_, event) => {
                session.clients.apply(event);
                Command::none()
            }
            Message::Recipients(_, event) => {
                session.recipients.apply(event);
                Command::none()
            }
            Message::ReloadRecords(kind) => match kind {
                RecordKind::Client => perform(session.id, session.clients.list(), Message::Clients),
                RecordKind::Recipient => {
                    perform(session.id, session.recipients.list(), Message::Recipients)
                }
            },
            Message::OpenRecord(kind, id) => {
                let opened = match kind {
                    RecordKind::Client => session.clients.open(id.as_ref()),
                    RecordKind::Recipient => session.recipients.open(id.as_ref()),
                };
                if !opened {
                    tracing::warn!(target: targets::UI, "Record to edit is no longer listed");
                }
                clear_numbers(&mut self.number_inputs, record_form(kind));
                Command::none()
            }
            Message::CloseRecord(kind) => {
                match kind {
                    RecordKind::Client => session.clients.close(),
                    RecordKind::Recipient => session.recipients.close(),
                }
                Command::none()
            }
            Message::SubmitRecord(kind) => match kind {
                RecordKind::Client => {
                    perform(session.id, session.clients.submit(), Message::Clients)
                }
                RecordKind::Recipient => {
                    perform(session.id, session.recipients.submit(), Message::Recipients)
                }
            },
            Message::RequestDeleteRecord(kind, id) => {
                match kind {
                    RecordKind::Client => session.clients.request_delete(id),
                    RecordKind::Recipient => session.recipients.request_delete(id),
                };
                Command::none()
            }
            Message::Settings(_, event) => {
                let follow_up = session.settings.apply(event);
                clear_numbers(&mut self.number_inputs, FormId::Settings);
                if self.connection_address.is_empty() {
                    if let Some(config) = session.settings.config() {
                        self.connection_address = config.lamassu_server_ip.clone();
                    }
                }
                perform(session.id, follow_up, Message::Settings)
            }
            Message::ReloadSettings => {
                perform(session.id, session.settings.load(), Message::Settings)
            }
            Message::SubmitSettings => {
                perform(session.id, session.settings.submit_form(), Message::Settings)
            }
            Message::ScheduleSelected(schedule) => {
                set_field(
                    session,
                    FormId::Settings,
                    "fixed_mode_schedule",
                    FieldInput::Text(schedule.as_str().to_string()),
                );
                Command::none()
            }
            Message::TestConnection => perform(
                session.id,
                session.settings.test_connection(&self.connection_address),
                Message::Settings,
            ),
            Message::Transactions(_, event) => {
                session.transactions.apply(event);
                Command::none()
            }
            Message::ReloadTransactions => {
                perform(session.id, session.transactions.load(), Message::Transactions)
            }
            Message::SortTransactions(column) => {
                session.transactions.table_mut().sort_by(column);
                Command::none()
            }
            Message::TransactionsPage(page) => {
                session.transactions.table_mut().set_page(page);
                Command::none()
            }
            Message::RowsPerPageSelected(rows) => {
                session.transactions.table_mut().set_rows_per_page(rows.0);
                Command::none()
            }
            _ => Command::none(),
        }
    }

    /// Rebuilds the per-tab controllers from the current profile.
    pub(super) fn connect(&mut self) -> Command<Message> {
        self.session = None;
        self.qr = None;
        self.expanded_items.clear();
        self.number_inputs.clear();
        self.session_run_id = self.session_run_id.wrapping_add(1);

        match Session::open(self.session_run_id, &self.profile) {
            Ok(session) => {
                tracing::info!(
                    target: targets::UI,
                    server = %self.profile.server_url,
                    session = self.session_run_id,
                    "Session opened"
                );
                self.session = Some(session);
                self.load_tab(self.active_tab)
            }
            Err(error) => {
                let failure = Failure::from(&error);
                tracing::warn!(target: targets::UI, error = %failure, "Session not opened");
                self.profile_status = Some(failure.to_string());
                self.active_tab = Tab::Connection;
                Command::none()
            }
        }
    }

    fn load_tab(&mut self, tab: Tab) -> Command<Message> {
        let Some(session) = self.session.as_mut() else {
            return Command::none();
        };
        match tab {
            Tab::Machines => perform(session.id, session.machines.list(), Message::Machines),
            Tab::Clients => perform(session.id, session.clients.list(), Message::Clients),
            Tab::Recipients => perform(session.id, session.recipients.list(), Message::Recipients),
            Tab::Transactions => {
                perform(session.id, session.transactions.load(), Message::Transactions)
            }
            Tab::Settings => perform(session.id, session.settings.load(), Message::Settings),
            Tab::Connection | Tab::Debug => Command::none(),
        }
    }

    /// Escape closes the innermost open dialog.
    fn close_top_dialog(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.machines.pending_delete().is_some() {
            session.machines.resolve_delete(Confirmation::Declined);
        } else if session.clients.pending_delete().is_some() {
            session.clients.resolve_delete(Confirmation::Declined);
        } else if session.recipients.pending_delete().is_some() {
            session.recipients.resolve_delete(Confirmation::Declined);
        } else if session.machines.item_form().is_some() {
            session.machines.close_item_form();
        } else if session.machines.form().is_some() {
            session.machines.close_edit();
        } else if session.machines.realtime_state() != RealtimeState::Idle {
            session.machines.close_realtime();
        } else if session.clients.is_dialog_open() {
            session.clients.close();
        } else if session.recipients.is_dialog_open() {
            session.recipients.close();
        }
    }

    pub(super) fn collect_notifications(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let drained = [
            session.machines.notifications_mut().drain(),
            session.clients.notifications_mut().drain(),
            session.recipients.notifications_mut().drain(),
            session.settings.notifications_mut().drain(),
            session.transactions.notifications_mut().drain(),
        ];
        self.toasts
            .extend(drained.into_iter().flatten().map(Toast::new));
    }

    /// Keeps the QR matrix in step with the realtime dialog's value.
    pub(super) fn sync_qr(&mut self) {
        let value = self
            .session
            .as_ref()
            .and_then(|session| session.machines.qr_value());
        let Some(value) = value else {
            self.qr = None;
            return;
        };
        if self.qr.as_ref().is_some_and(|qr| qr.source == value) {
            return;
        }
        self.qr = match qr_code::Data::new(value) {
            Ok(data) => Some(QrCache {
                source: value.to_string(),
                data,
            }),
            Err(error) => {
                tracing::warn!(target: targets::UI, error = ?error, "QR encoding failed");
                None
            }
        };
    }

    fn export_machines(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let path = self.export_path.trim();
        if path.is_empty() {
            self.export_status = Some("Export path is empty.".to_string());
            return;
        }

        let count = session.machines.machines().len();
        let csv = match session.machines.export() {
            Ok(csv) => csv,
            Err(error) => {
                tracing::warn!(
                    target: targets::STORAGE,
                    path,
                    "Export failed: {}",
                    error.technical_detail()
                );
                self.export_status = Some(format!("Export failed: {}", error.user_summary()));
                return;
            }
        };
        match fs::write(path, csv) {
            Ok(()) => {
                tracing::info!(target: targets::STORAGE, path, count, "Machines exported");
                self.export_status = Some(format!("Exported {count} machines to {path}."));
            }
            Err(error) => {
                tracing::warn!(target: targets::STORAGE, path, "Export failed: {}", error);
                self.export_status = Some(format!("Export failed: {error}"));
            }
        }
    }

    fn save_profile(&mut self) -> Command<Message> {
        let mut profile = match self.profile_inputs.to_profile(&self.profile) {
            Ok(profile) => profile,
            Err(message) => {
                self.profile_status = Some(message);
                return Command::none();
            }
        };
        profile.log_level = Some(self.log_level.to_string());

        match profile.save(&self.profile_path) {
            Ok(()) => {
                self.profile = profile;
                self.profile_status =
                    Some(format!("Saved to {}.", self.profile_path.display()));
                self.connect()
            }
            Err(error) => {
                self.profile_status = Some(Failure::from(&error).to_string());
                Command::none()
            }
        }
    }

    fn apply_profile(&mut self) -> Command<Message> {
        match self.profile_inputs.to_profile(&self.profile) {
            Ok(profile) => {
                self.profile = profile;
                self.profile_status = Some("Applied for this session only.".to_string());
                self.connect()
            }
            Err(message) => {
                self.profile_status = Some(message);
                Command::none()
            }
        }
    }

    fn refresh_logs(&mut self) {
        let entries = self.log_store.snapshot();
        for entry in &entries {
            if self.known_targets.insert(entry.target.clone()) {
                self.enabled_targets.insert(entry.target.clone());
            }
        }
        self.log_entries = entries;
    }

    pub(super) fn sorted_targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = self.known_targets.iter().cloned().collect();
        targets.sort();
        targets
    }

    pub(super) fn visible_entries(&self) -> Vec<&LogEntry> {
        self.log_entries
            .iter()
            .filter(|entry| self.enabled_targets.contains(&entry.target))
            .collect()
    }

    fn copy_diagnostics(&self) -> String {
        copy_to_clipboard(self.diagnostics_text())
    }

    fn diagnostics_text(&self) -> String {
        let mut output = String::new();
        output.push_str("SatoshiMachine admin diagnostics\n");
        output.push_str(&format!("Log level: {}\n", self.log_level));
        output.push_str(&format!("Server: {}\n", self.profile.server_url));
        output.push_str(&format!("Profile: {}\n", self.profile_path.display()));
        match &self.session {
            Some(session) => {
                output.push_str(&format!(
                    "Machines loaded: {}\n",
                    session.machines.machines().len()
                ));
                output.push_str(&format!(
                    "Realtime: {:?}\n",
                    session.machines.realtime_state()
                ));
                output.push_str(&format!(
                    "Transactions loaded: {}\n",
                    session.transactions.table().rows().len()
                ));
            }
            None => output.push_str("Session: not connected\n"),
        }
        output.push_str(&format!(
            "Targets enabled: {}\n",
            self.sorted_targets()
                .into_iter()
                .filter(|target| self.enabled_targets.contains(target))
                .collect::<Vec<String>>()
                .join(", ")
        ));
        output.push_str("Recent logs:\n");

        let entries = self.visible_entries();
        let start = entries.len().saturating_sub(DIAGNOSTIC_LOG_LINES);
        for entry in entries.into_iter().skip(start) {
            output.push_str(&entry.format_line());
            output.push('\n');
        }

        output
    }
}

fn copy_to_clipboard(text: String) -> String {
    match arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text)) {
        Ok(()) => {
            tracing::info!(target: targets::UI, "Copied to clipboard");
            "Copied".to_string()
        }
        Err(error) => {
            tracing::warn!(target: targets::UI, "Clipboard copy failed: {}", error);
            format!("Failed: {error}")
        }
    }
}

fn record_form(kind: RecordKind) -> FormId {
    match kind {
        RecordKind::Client => FormId::Client,
        RecordKind::Recipient => FormId::Recipient,
    }
}

fn set_field(session: &mut Session, form: FormId, field: &'static str, input: FieldInput) {
    let applied = match form {
        FormId::Machine => session
            .machines
            .form_mut()
            .is_some_and(|form| form.set_field(field, input)),
        FormId::Item => session
            .machines
            .item_form_mut()
            .is_some_and(|form| form.set_field(field, input)),
        FormId::Client => session.clients.form_mut().set_field(field, input),
        FormId::Recipient => session.recipients.form_mut().set_field(field, input),
        FormId::Settings => session.settings.form_mut().set_field(field, input),
    };
    if !applied {
        tracing::debug!(target: targets::UI, ?form, field, "Field edit not applied");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use satmachine_core::{MachineEvent, SettingsEvent};

    #[test]
    fn outcomes_from_replaced_session_are_dropped() {
        let payment = Message::Machines(
            1,
            MachineEvent::Payment {
                generation: 1,
                observed: true,
            },
        );
        assert!(from_other_session(&payment, 2));
        assert!(!from_other_session(&payment, 1));
        assert!(!from_other_session(&Message::ReloadMachines, 2));

        let tested = Message::Settings(3, SettingsEvent::Tested(Ok(())));
        assert_eq!(tested.origin_session(), Some(3));
        assert!(from_other_session(&tested, 4));
    }

    #[test]
    fn clearing_numbers_only_touches_one_form() {
        let mut inputs = HashMap::new();
        inputs.insert((FormId::Machine, "lnurlpayamount"), "1.".to_string());
        inputs.insert((FormId::Item, "price"), "2".to_string());

        clear_numbers(&mut inputs, FormId::Machine);

        assert_eq!(inputs.len(), 1);
        assert!(inputs.contains_key(&(FormId::Item, "price")));
    }
}
