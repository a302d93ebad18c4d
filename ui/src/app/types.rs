use std::path::PathBuf;
use std::time::Instant;

use satmachine_core::{
    AdminProfile, Client, CommissionRecipient, Confirmation, FixedModeSchedule, MachineEvent,
    MachineId, Notification, RecordEvent, RecordId, SettingsEvent, TransactionEvent,
};

use crate::logging::{LogLevel, LogStore, ReloadHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Machines,
    Clients,
    Recipients,
    Transactions,
    Settings,
    Connection,
    Debug,
}

/// Which edit buffer a field message targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormId {
    Machine,
    Item,
    Client,
    Recipient,
    Settings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Client,
    Recipient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeleteTarget {
    Machine,
    Client,
    Recipient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileField {
    ServerUrl,
    WalletId,
    InvoiceKey,
    AdminKey,
    TimeoutSecs,
    ReconnectAttempts,
    ReconnectDelayMs,
}

#[derive(Debug, Clone)]
pub enum Message {
    LogTick,
    LogLevelChanged(LogLevel),
    ToggleTarget(String, bool),
    CopyDiagnostics,
    CopyText(String),
    ClearLogs,
    SelectTab(Tab),
    CloseDialogs,
    DismissNotification(usize),
    TextChanged {
        form: FormId,
        field: &'static str,
        value: String,
    },
    NumberChanged {
        form: FormId,
        field: &'static str,
        value: String,
    },
    FlagChanged {
        form: FormId,
        field: &'static str,
        value: bool,
    },
    ResolveDelete(DeleteTarget, Confirmation),
    /// Machine request outcome, tagged with the id of the session that issued it.
    Machines(u64, MachineEvent),
    ReloadMachines,
    RefreshMachine(MachineId),
    OpenCreateMachine,
    OpenEditMachine(MachineId),
    CloseMachineForm,
    SubmitMachine,
    AdvancedTipsToggled(bool),
    AdvancedOtcToggled(bool),
    RequestDeleteMachine(MachineId),
    OpenRealtime(MachineId),
    CloseRealtime,
    InvoiceAmountChanged(String),
    CreateInvoice(MachineId),
    ToggleItems(MachineId),
    OpenItemForm(String),
    CloseItemForm,
    SubmitItem,
    ExportPathChanged(String),
    ExportMachines,
    Clients(u64, RecordEvent<Client>),
    Recipients(u64, RecordEvent<CommissionRecipient>),
    ReloadRecords(RecordKind),
    OpenRecord(RecordKind, Option<RecordId>),
    CloseRecord(RecordKind),
    SubmitRecord(RecordKind),
    RequestDeleteRecord(RecordKind, RecordId),
    Settings(u64, SettingsEvent),
    ReloadSettings,
    SubmitSettings,
    ScheduleSelected(FixedModeSchedule),
    ConnectionAddressChanged(String),
    TestConnection,
    Transactions(u64, TransactionEvent),
    ReloadTransactions,
    SortTransactions(&'static str),
    TransactionsPage(usize),
    RowsPerPageSelected(RowsPerPage),
    ProfileFieldChanged(ProfileField, String),
    SaveProfile,
    ApplyProfile,
}

impl Message {
    /// Session id carried by a controller outcome.
    pub fn origin_session(&self) -> Option<u64> {
        match self {
            Message::Machines(session, _)
            | Message::Clients(session, _)
            | Message::Recipients(session, _)
            | Message::Settings(session, _)
            | Message::Transactions(session, _) => Some(*session),
            _ => None,
        }
    }
}

/// Page-size choices offered for the transaction table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowsPerPage(pub usize);

impl RowsPerPage {
    pub const ALL: [RowsPerPage; 5] = [
        RowsPerPage(5),
        RowsPerPage(10),
        RowsPerPage(25),
        RowsPerPage(50),
        RowsPerPage(0),
    ];
}

impl std::fmt::Display for RowsPerPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            0 => f.write_str("All"),
            rows => write!(f, "{rows}"),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Toast {
    pub(crate) notification: Notification,
    pub(crate) shown_at: Instant,
}

impl Toast {
    pub(crate) fn new(notification: Notification) -> Self {
        Self {
            notification,
            shown_at: Instant::now(),
        }
    }

    pub(crate) fn expired(&self, now: Instant) -> bool {
        now.duration_since(self.shown_at) >= self.notification.timeout
    }
}

/// Raw text of the Connection tab, applied to the profile on save.
#[derive(Debug, Clone, Default)]
pub(crate) struct ProfileInputs {
    pub(crate) server_url: String,
    pub(crate) wallet_id: String,
    pub(crate) invoice_key: String,
    pub(crate) admin_key: String,
    pub(crate) timeout_secs: String,
    pub(crate) reconnect_attempts: String,
    pub(crate) reconnect_delay_ms: String,
}

impl ProfileInputs {
    pub(crate) fn from_profile(profile: &AdminProfile) -> Self {
        Self {
            server_url: profile.server_url.clone(),
            wallet_id: profile.wallet.id.clone(),
            invoice_key: profile.wallet.invoice_key.clone(),
            admin_key: profile.wallet.admin_key.clone(),
            timeout_secs: profile.request_timeout_secs.to_string(),
            reconnect_attempts: profile.realtime.reconnect_attempts.to_string(),
            reconnect_delay_ms: profile.realtime.reconnect_delay_ms.to_string(),
        }
    }

    pub(crate) fn field_mut(&mut self, field: ProfileField) -> &mut String {
        match field {
            ProfileField::ServerUrl => &mut self.server_url,
            ProfileField::WalletId => &mut self.wallet_id,
            ProfileField::InvoiceKey => &mut self.invoice_key,
            ProfileField::AdminKey => &mut self.admin_key,
            ProfileField::TimeoutSecs => &mut self.timeout_secs,
            ProfileField::ReconnectAttempts => &mut self.reconnect_attempts,
            ProfileField::ReconnectDelayMs => &mut self.reconnect_delay_ms,
        }
    }

    /// Builds the profile these inputs describe, keeping fields the tab does not edit.
    pub(crate) fn to_profile(&self, base: &AdminProfile) -> Result<AdminProfile, String> {
        let mut profile = base.clone();
        profile.server_url = self.server_url.trim().to_string();
        profile.wallet.id = self.wallet_id.trim().to_string();
        profile.wallet.invoice_key = self.invoice_key.trim().to_string();
        profile.wallet.admin_key = self.admin_key.trim().to_string();
        profile.request_timeout_secs = parse_whole(&self.timeout_secs, "Request timeout")?;
        profile.realtime.reconnect_attempts =
            parse_whole(&self.reconnect_attempts, "Reconnect attempts")?;
        profile.realtime.reconnect_delay_ms =
            parse_whole(&self.reconnect_delay_ms, "Reconnect delay")?;
        if profile.server_url.is_empty() {
            return Err("Server URL is required.".to_string());
        }
        Ok(profile)
    }
}

fn parse_whole<T: std::str::FromStr>(value: &str, label: &str) -> Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("{label} must be a whole number."))
}

pub struct Flags {
    pub log_store: LogStore,
    pub reload_handle: ReloadHandle,
    pub log_level: LogLevel,
    pub profile: AdminProfile,
    pub profile_path: PathBuf,
    pub profile_status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_inputs_round_trip_and_reject_bad_numbers() {
        let profile = AdminProfile::default();
        let mut inputs = ProfileInputs::from_profile(&profile);
        assert_eq!(inputs.to_profile(&profile), Ok(profile.clone()));

        *inputs.field_mut(ProfileField::ReconnectAttempts) = "three".to_string();
        assert_eq!(
            inputs.to_profile(&profile),
            Err("Reconnect attempts must be a whole number.".to_string())
        );

        *inputs.field_mut(ProfileField::ReconnectAttempts) = "3".to_string();
        *inputs.field_mut(ProfileField::ServerUrl) = "  ".to_string();
        assert!(inputs.to_profile(&profile).is_err());
    }

    #[test]
    fn rows_per_page_zero_reads_as_all() {
        assert_eq!(RowsPerPage(0).to_string(), "All");
        assert_eq!(RowsPerPage(25).to_string(), "25");
    }
}
