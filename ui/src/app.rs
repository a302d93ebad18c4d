use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use iced::keyboard;
use iced::theme;
use iced::widget::{column, container, row, text};
use iced::widget::qr_code;
use iced::{Alignment, Application, Color, Command, Element, Length, Subscription, Theme};
use satmachine_core::{
    AdminProfile, ClientBook, MachineDashboard, MachineId, RecipientBook, SettingsController,
    TransactionsView, targets,
};

use crate::logging::{LogEntry, LogLevel, LogStore, ReloadHandle};

mod actions;
mod helpers;
mod styles;
mod types;
mod views;

use helpers::escape_key_event;
pub use types::{DeleteTarget, Flags, FormId, Message, ProfileField, RecordKind, RowsPerPage, Tab};
use types::{ProfileInputs, Toast};

const DEFAULT_EXPORT_PATH: &str = "machines.csv";

/// Per-tab controllers bound to one server profile.
struct Session {
    id: u64,
    machines: MachineDashboard,
    clients: ClientBook,
    recipients: RecipientBook,
    settings: SettingsController,
    transactions: TransactionsView,
}

impl Session {
    fn open(id: u64, profile: &AdminProfile) -> Result<Self, satmachine_core::Error> {
        let api = profile.build_api()?;
        let notifier = profile.build_notifier()?;
        Ok(Self {
            id,
            machines: MachineDashboard::new(api.clone(), notifier),
            clients: ClientBook::new(api.clone()),
            recipients: RecipientBook::new(api.clone()),
            settings: SettingsController::new(api.clone()),
            transactions: TransactionsView::new(api),
        })
    }
}

/// Cached QR matrix for the value the realtime dialog shows.
struct QrCache {
    source: String,
    data: qr_code::Data,
}

pub struct AdminApp {
    log_store: LogStore,
    reload_handle: ReloadHandle,
    log_entries: Vec<LogEntry>,
    log_level: LogLevel,
    known_targets: HashSet<String>,
    enabled_targets: HashSet<String>,
    copy_status: Option<String>,
    active_tab: Tab,
    profile: AdminProfile,
    profile_path: PathBuf,
    profile_inputs: ProfileInputs,
    profile_status: Option<String>,
    session: Option<Session>,
    session_run_id: u64,
    number_inputs: HashMap<(FormId, &'static str), String>,
    invoice_amount_text: String,
    expanded_items: HashSet<MachineId>,
    connection_address: String,
    export_path: String,
    export_status: Option<String>,
    toasts: Vec<Toast>,
    qr: Option<QrCache>,
}

impl Application for AdminApp {
    type Executor = iced::executor::Default;
    type Message = Message;
    type Theme = Theme;
    type Flags = Flags;

    fn new(flags: Flags) -> (Self, Command<Message>) {
        let default_targets = [
            targets::API,
            targets::REALTIME,
            targets::FORMS,
            targets::UI,
            targets::STORAGE,
        ];
        let known_targets: HashSet<String> =
            default_targets.iter().map(|value| value.to_string()).collect();
        let enabled_targets = known_targets.clone();
        let profile_inputs = ProfileInputs::from_profile(&flags.profile);

        let mut app = Self {
            log_store: flags.log_store,
            reload_handle: flags.reload_handle,
            log_entries: Vec::new(),
            log_level: flags.log_level,
            known_targets,
            enabled_targets,
            copy_status: None,
            active_tab: Tab::Machines,
            profile: flags.profile,
            profile_path: flags.profile_path,
            profile_inputs,
            profile_status: flags.profile_status,
            session: None,
            session_run_id: 0,
            number_inputs: HashMap::new(),
            invoice_amount_text: String::new(),
            expanded_items: HashSet::new(),
            connection_address: String::new(),
            export_path: DEFAULT_EXPORT_PATH.to_string(),
            export_status: None,
            toasts: Vec::new(),
            qr: None,
        };
        let command = app.connect();
        (app, command)
    }

    fn title(&self) -> String {
        "SatoshiMachine Admin".to_string()
    }

    fn update(&mut self, message: Message) -> Command<Message> {
        let command = self.handle(message);
        self.collect_notifications();
        self.sync_qr();
        command
    }

    fn subscription(&self) -> Subscription<Message> {
        let log_tick = iced::time::every(Duration::from_millis(250)).map(|_| Message::LogTick);
        let escape_key = keyboard::on_key_press(escape_key_event);
        Subscription::batch(vec![log_tick, escape_key])
    }

    fn view(&self) -> Element<'_, Message> {
        let header = row![
            text("SatoshiMachine")
                .size(28)
                .style(theme::Text::Color(Color::from_rgb8(0x10, 0x1a, 0x24))),
            text(&self.profile.server_url)
                .size(16)
                .style(theme::Text::Color(Color::from_rgb8(0x5f, 0x6b, 0x7a))),
        ]
        .spacing(12)
        .align_items(Alignment::Center);

        let tabs = self.tab_bar();
        let body = match self.dialog_view() {
            Some(dialog) => dialog,
            None => self.tab_view(),
        };

        let content = column![header, tabs, self.toasts_view(), body]
            .spacing(20)
            .padding(16);

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }
}
