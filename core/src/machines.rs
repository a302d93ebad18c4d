use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::api::{AdminApi, Task, task};
use crate::error::{Error, Failure};
use crate::forms::{ItemForm, MachineForm};
use crate::model::{
    AdvancedFlags, DEFAULT_INVOICE_AMOUNT, Invoice, InvoiceRequest, ItemDraft, ItemKey, LineItem,
    Machine, MachineDraft, MachineId,
};
use crate::notify::{Confirmation, Notifications};
use crate::realtime::{PaymentNotifier, PaymentWatch, WatchGuard};
use crate::table::{MACHINE_COLUMNS, export_csv};
use crate::targets;

pub const PAYMENT_RECEIVED_MESSAGE: &str = "Payment received";

#[derive(Debug, Clone)]
pub enum MachineEvent {
    Listed(Result<Vec<Machine>, Failure>),
    Refreshed {
        id: MachineId,
        result: Result<Machine, Failure>,
    },
    /// Create (`id` is `None`) or update of the machine in the edit dialog.
    Saved {
        id: Option<MachineId>,
        session: u64,
        result: Result<Machine, Failure>,
    },
    ItemSaved {
        id: MachineId,
        session: u64,
        result: Result<Machine, Failure>,
    },
    Deleted {
        id: MachineId,
        result: Result<(), Failure>,
    },
    InvoiceCreated {
        id: MachineId,
        result: Result<Invoice, Failure>,
    },
    Payment {
        generation: u64,
        observed: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditState {
    Idle,
    Editing { existing: Option<MachineId> },
    Saving { existing: Option<MachineId> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealtimeState {
    Idle,
    Awaiting { machine: MachineId },
    /// The dialog is still open but its channel is gone; no payment will arrive.
    Unsubscribed { machine: MachineId },
}

#[derive(Debug)]
struct EditSession {
    existing: Option<MachineId>,
    form: MachineForm,
    advanced: AdvancedFlags,
}

#[derive(Debug)]
struct RealtimeSession {
    machine: MachineId,
    qr_value: Option<String>,
    invoice: Option<Invoice>,
    generation: u64,
    guard: Option<WatchGuard>,
}

/// Machine list, its edit and line-item dialogs, and the realtime payment dialog.
pub struct MachineDashboard {
    api: AdminApi,
    notifier: Arc<dyn PaymentNotifier>,
    machines: Vec<Machine>,
    loading: bool,
    edit: Option<EditSession>,
    item_form: Option<ItemForm>,
    edit_session: u64,
    saving: bool,
    pending_delete: Option<MachineId>,
    deleting: bool,
    invoice_amount: u64,
    creating_invoice: bool,
    realtime: Option<RealtimeSession>,
    generation: u64,
    notifications: Notifications,
}

impl fmt::Debug for MachineDashboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MachineDashboard")
            .field("machines", &self.machines.len())
            .field("loading", &self.loading)
            .field("edit", &self.edit)
            .field("realtime", &self.realtime)
            .finish_non_exhaustive()
    }
}

impl MachineDashboard {
    pub fn new(api: AdminApi, notifier: Arc<dyn PaymentNotifier>) -> Self {
        Self {
            api,
            notifier,
            machines: Vec::new(),
            loading: false,
            edit: None,
            item_form: None,
            edit_session: 0,
            saving: false,
            pending_delete: None,
            deleting: false,
            invoice_amount: DEFAULT_INVOICE_AMOUNT,
            creating_invoice: false,
            realtime: None,
            generation: 0,
            notifications: Notifications::default(),
        }
    }

    pub fn machines(&self) -> &[Machine] {
        &self.machines
    }

    pub fn machine(&self, id: &MachineId) -> Option<&Machine> {
        self.machines.iter().find(|machine| &machine.id == id)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn notifications_mut(&mut self) -> &mut Notifications {
        &mut self.notifications
    }

    pub fn list(&mut self) -> Option<Task<MachineEvent>> {
        if self.loading {
            return None;
        }
        self.loading = true;
        Some(task(self.api.list_machines(), MachineEvent::Listed))
    }

    /// Re-fetches one machine and replaces its row.
    pub fn refresh(&self, id: &MachineId) -> Task<MachineEvent> {
        let id = id.clone();
        let future = self.api.get_machine(&id);
        task(future, move |result| MachineEvent::Refreshed { id, result })
    }

    pub fn export(&self) -> Result<String, Error> {
        export_csv(&MACHINE_COLUMNS, &self.machines)
    }

    /// A machine or line-item save is in flight, possibly from an earlier dialog.
    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn open_create(&mut self) {
        let mut form = MachineForm::new(None);
        form.set_loading(self.saving);
        self.edit_session += 1;
        self.edit = Some(EditSession {
            existing: None,
            form,
            advanced: AdvancedFlags::default(),
        });
    }

    pub fn open_edit(&mut self, id: &MachineId) -> bool {
        let Some(machine) = self.machine(id) else {
            return false;
        };
        let draft = MachineDraft::from_machine(machine);
        let advanced = machine.advanced_flags();
        let mut form = MachineForm::new(Some(draft));
        form.set_loading(self.saving);
        self.edit_session += 1;
        self.edit = Some(EditSession {
            existing: Some(id.clone()),
            form,
            advanced,
        });
        true
    }

    pub fn close_edit(&mut self) {
        self.edit = None;
    }

    pub fn edit_state(&self) -> EditState {
        match &self.edit {
            None => EditState::Idle,
            Some(session) if session.form.is_loading() => EditState::Saving {
                existing: session.existing.clone(),
            },
            Some(session) => EditState::Editing {
                existing: session.existing.clone(),
            },
        }
    }

    pub fn form(&self) -> Option<&MachineForm> {
        self.edit.as_ref().map(|session| &session.form)
    }

    pub fn form_mut(&mut self) -> Option<&mut MachineForm> {
        self.edit.as_mut().map(|session| &mut session.form)
    }

    pub fn advanced(&self) -> Option<AdvancedFlags> {
        self.edit.as_ref().map(|session| session.advanced)
    }

    /// Shows or hides the tips section. Hiding it drops the tip wallet from the draft.
    pub fn set_tips(&mut self, enabled: bool) {
        let Some(session) = self.edit.as_mut() else {
            return;
        };
        session.advanced.tips = enabled;
        if !enabled {
            session.form.buffer_mut().tip_wallet = None;
        }
    }

    /// Shows or hides the OTC section. Hiding it drops the withdraw limit from the draft.
    pub fn set_otc(&mut self, enabled: bool) {
        let Some(session) = self.edit.as_mut() else {
            return;
        };
        session.advanced.otc = enabled;
        if !enabled {
            session.form.buffer_mut().withdrawlimit = None;
        }
    }

    /// Creates or updates the machine in the edit dialog.
    pub fn submit(&mut self) -> Option<Task<MachineEvent>> {
        if self.saving {
            return None;
        }
        let session = self.edit.as_mut()?;
        let draft = session.form.submit()?;
        session.form.set_loading(true);
        self.saving = true;
        let existing = session.existing.clone();
        let edit_session = self.edit_session;
        let api = self.api.clone();
        Some(match existing {
            Some(id) => {
                let future = api.update_machine(&id, &draft);
                task(future, move |result| MachineEvent::Saved {
                    id: Some(id),
                    session: edit_session,
                    result,
                })
            }
            None => task(api.create_machine(&draft), move |result| MachineEvent::Saved {
                id: None,
                session: edit_session,
                result,
            }),
        })
    }

    pub fn request_delete(&mut self, id: &MachineId) -> bool {
        if self.deleting || self.machine(id).is_none() {
            return false;
        }
        self.pending_delete = Some(id.clone());
        true
    }

    pub fn pending_delete(&self) -> Option<&MachineId> {
        self.pending_delete.as_ref()
    }

    pub fn resolve_delete(&mut self, answer: Confirmation) -> Option<Task<MachineEvent>> {
        let id = self.pending_delete.take()?;
        if answer == Confirmation::Declined {
            debug!(target: targets::UI, id = %id, "Machine delete declined");
            return None;
        }
        self.deleting = true;
        let future = self.api.delete_machine(&id);
        Some(task(future, move |result| MachineEvent::Deleted { id, result }))
    }

    /// Line items of a machine, in key order.
    pub fn items(&self, id: &MachineId) -> Vec<&LineItem> {
        self.machine(id)
            .map(Machine::items)
            .unwrap_or_default()
    }

    /// Opens the line-item form for `"<machineId>"` (new item) or
    /// `"<machineId>:<itemId>"` (existing item).
    pub fn open_item_form(&mut self, key: &ItemKey) -> bool {
        let Some(machine) = self.machine(&key.machine) else {
            return false;
        };
        let (map_key, mut item) = match &key.item {
            Some(item_id) => {
                let composite = key.to_string();
                let found = match machine.items_map.get_key_value(&composite) {
                    Some(entry) => Some(entry),
                    None => machine
                        .items_map
                        .iter()
                        .find(|(_, item)| &item.id == item_id),
                };
                match found {
                    Some((map_key, item)) => (Some(map_key.clone()), item.clone()),
                    None => return false,
                }
            }
            None => (None, LineItem::default()),
        };
        item.currency = machine.currency.clone();
        let mut form = ItemForm::new(Some(ItemDraft {
            machine: key.machine.clone(),
            item,
            key: map_key,
        }));
        form.set_loading(self.saving);
        self.edit_session += 1;
        self.item_form = Some(form);
        true
    }

    pub fn item_form(&self) -> Option<&ItemForm> {
        self.item_form.as_ref()
    }

    pub fn item_form_mut(&mut self) -> Option<&mut ItemForm> {
        self.item_form.as_mut()
    }

    pub fn close_item_form(&mut self) {
        self.item_form = None;
    }

    /// Writes the edited item into its machine and saves the whole machine.
    pub fn submit_item(&mut self) -> Option<Task<MachineEvent>> {
        if self.saving {
            return None;
        }
        let form = self.item_form.as_mut()?;
        let ItemDraft {
            machine,
            mut item,
            key,
        } = form.submit()?;
        let Some(current) = self.machines.iter().find(|candidate| candidate.id == machine) else {
            return None;
        };

        let mut draft = MachineDraft::from_machine(current);
        if item.id.is_empty() {
            item.id = next_item_id(&draft);
        }
        let key =
            key.unwrap_or_else(|| ItemKey::new(machine.clone(), item.id.clone()).to_string());
        draft.items_map.insert(key, item);

        form.set_loading(true);
        self.saving = true;
        let session = self.edit_session;
        let future = self.api.update_machine(&machine, &draft);
        Some(task(future, move |result| MachineEvent::ItemSaved {
            id: machine,
            session,
            result,
        }))
    }

    pub fn invoice_amount(&self) -> u64 {
        self.invoice_amount
    }

    pub fn set_invoice_amount(&mut self, amount: u64) {
        self.invoice_amount = amount;
    }

    pub fn is_creating_invoice(&self) -> bool {
        self.creating_invoice
    }

    /// Requests a payment request for `id` at the current invoice amount.
    pub fn create_invoice(&mut self, id: &MachineId) -> Option<Task<MachineEvent>> {
        if self.creating_invoice || self.invoice_amount == 0 {
            return None;
        }
        let request = InvoiceRequest::for_machine(self.machine(id)?, self.invoice_amount);
        self.creating_invoice = true;
        let id = id.clone();
        let future = self.api.create_invoice(&request);
        Some(task(future, move |result| MachineEvent::InvoiceCreated {
            id,
            result,
        }))
    }

    /// Opens the realtime dialog for `id`, releasing any previous subscription
    /// first. The returned task resolves when the payment is observed.
    pub fn open_realtime(&mut self, id: &MachineId) -> Option<Task<MachineEvent>> {
        self.close_realtime();
        let qr_value = self.machine(id)?.lnurlpay.clone();

        self.generation += 1;
        let generation = self.generation;
        let mut session = RealtimeSession {
            machine: id.clone(),
            qr_value,
            invoice: None,
            generation,
            guard: None,
        };

        let follow_up = match self.notifier.watch(id.as_str()) {
            Ok(PaymentWatch { guard, signal }) => {
                info!(target: targets::REALTIME, machine = %id, generation, "Awaiting payment");
                session.guard = Some(guard);
                let task: Task<MachineEvent> = Box::pin(async move {
                    MachineEvent::Payment {
                        generation,
                        observed: signal.observed().await,
                    }
                });
                Some(task)
            }
            Err(error) => {
                self.realtime_failed(&error);
                None
            }
        };
        self.realtime = Some(session);
        follow_up
    }

    pub fn close_realtime(&mut self) {
        if let Some(session) = self.realtime.take() {
            debug!(target: targets::REALTIME, machine = %session.machine, "Realtime dialog closed");
        }
    }

    pub fn realtime_state(&self) -> RealtimeState {
        match &self.realtime {
            None => RealtimeState::Idle,
            Some(session) if session.guard.is_some() => RealtimeState::Awaiting {
                machine: session.machine.clone(),
            },
            Some(session) => RealtimeState::Unsubscribed {
                machine: session.machine.clone(),
            },
        }
    }

    /// Value shown as a QR code in the realtime dialog.
    pub fn qr_value(&self) -> Option<&str> {
        self.realtime.as_ref()?.qr_value.as_deref()
    }

    pub fn invoice(&self) -> Option<&Invoice> {
        self.realtime.as_ref()?.invoice.as_ref()
    }

    /// Applies a finished task. May return a follow-up task (a payment wait).
    pub fn apply(&mut self, event: MachineEvent) -> Option<Task<MachineEvent>> {
        match event {
            MachineEvent::Listed(result) => {
                self.loading = false;
                match result {
                    Ok(machines) => {
                        debug!(target: targets::API, count = machines.len(), "Machines loaded");
                        self.machines = machines;
                    }
                    Err(failure) => self.fail("list", &failure),
                }
                None
            }
            MachineEvent::Refreshed { id, result } => {
                match result {
                    Ok(machine) => self.replace(&id, machine),
                    Err(failure) => self.fail("refresh", &failure),
                }
                None
            }
            MachineEvent::Saved {
                id,
                session,
                result,
            } => {
                self.finish_save();
                let current = session == self.edit_session;
                match result {
                    Ok(machine) => {
                        info!(target: targets::API, id = %machine.id, "Machine saved");
                        match id {
                            Some(id) => self.replace(&id, machine),
                            None => self.machines.push(machine),
                        }
                        if current {
                            self.edit = None;
                        }
                    }
                    Err(failure) => self.fail("save", &failure),
                }
                None
            }
            MachineEvent::ItemSaved {
                id,
                session,
                result,
            } => {
                self.finish_save();
                let current = session == self.edit_session;
                match result {
                    Ok(machine) => {
                        self.replace(&id, machine);
                        if current {
                            self.item_form = None;
                        }
                    }
                    Err(failure) => self.fail("save item", &failure),
                }
                None
            }
            MachineEvent::Deleted { id, result } => {
                self.deleting = false;
                match result {
                    Ok(()) => {
                        info!(target: targets::API, id = %id, "Machine deleted");
                        self.machines.retain(|machine| machine.id != id);
                    }
                    Err(failure) => self.fail("delete", &failure),
                }
                None
            }
            MachineEvent::InvoiceCreated { id, result } => {
                self.creating_invoice = false;
                match result {
                    Ok(invoice) => {
                        let showing = self
                            .realtime
                            .as_ref()
                            .is_some_and(|session| session.machine == id);
                        let follow_up = if showing {
                            None
                        } else {
                            self.open_realtime(&id)
                        };
                        if let Some(session) = self.realtime.as_mut() {
                            session.qr_value = Some(invoice.payment_request.clone());
                            session.invoice = Some(invoice);
                        }
                        follow_up
                    }
                    Err(failure) => {
                        self.fail("create invoice", &failure);
                        None
                    }
                }
            }
            MachineEvent::Payment {
                generation,
                observed,
            } => {
                let Some(session) = self.realtime.as_mut() else {
                    return None;
                };
                if session.generation != generation {
                    debug!(target: targets::REALTIME, generation, "Ignoring stale payment signal");
                    return None;
                }
                if observed {
                    self.close_realtime();
                    self.notifications.positive(PAYMENT_RECEIVED_MESSAGE);
                } else {
                    warn!(target: targets::REALTIME, machine = %session.machine, "Payment channel ended without a payment");
                    session.guard = None;
                }
                None
            }
        }
    }

    fn finish_save(&mut self) {
        self.saving = false;
        if let Some(session) = self.edit.as_mut() {
            session.form.set_loading(false);
        }
        if let Some(form) = self.item_form.as_mut() {
            form.set_loading(false);
        }
    }

    fn replace(&mut self, id: &MachineId, machine: Machine) {
        match self.machines.iter_mut().find(|current| &current.id == id) {
            Some(current) => *current = machine,
            None => self.machines.push(machine),
        }
    }

    fn fail(&mut self, action: &str, failure: &Failure) {
        warn!(target: targets::API, action, error = %failure, "Machine request failed");
        self.notifications.negative(failure);
    }

    fn realtime_failed(&mut self, error: &Error) {
        warn!(target: targets::REALTIME, error = %error.technical_detail(), "Could not subscribe to payments");
        self.notifications.negative(&Failure::from(error));
    }
}

fn next_item_id(draft: &MachineDraft) -> String {
    let mut index = draft.items_map.len() + 1;
    loop {
        let candidate = format!("item{index}");
        if !draft.items_map.values().any(|item| item.id == candidate) {
            return candidate;
        }
        index += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Method, MockTransport};
    use crate::forms::FieldInput;
    use crate::realtime::ManualPaymentNotifier;
    use serde_json::json;

    fn run_future<T>(future: impl std::future::Future<Output = T>) -> T {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("tokio runtime");
        runtime.block_on(future)
    }

    fn dashboard(transport: &MockTransport, notifier: &ManualPaymentNotifier) -> MachineDashboard {
        transport.push_json(json!([
            {"id": "m1", "name": "Lobby", "wallet": "w1", "lnurlpayamount": 5,
             "lnurlwithdrawamount": 0, "total": 0, "currency": "GTQ",
             "lnurlpay": "LNURL1LOBBY", "tip_wallet": "tips", "withdrawlimit": 3,
             "itemsMap": {"m1:i1": {"id": "i1", "name": "Coffee", "price": 3.5}}}
        ]));
        let mut dashboard =
            MachineDashboard::new(AdminApi::new(transport.clone()), Arc::new(notifier.clone()));
        let task = dashboard.list().expect("list task");
        dashboard.apply(run_future(task));
        dashboard
    }

    fn fill_new_machine(dashboard: &mut MachineDashboard) {
        dashboard.open_create();
        let form = dashboard.form_mut().expect("form");
        form.set_field("name", FieldInput::Text("Kiosk1".to_string()));
        form.set_field("wallet", FieldInput::Text("w1".to_string()));
        form.set_field("lnurlpayamount", FieldInput::Number(0.0));
    }

    #[test]
    fn create_appends_server_record_and_closes_dialog() {
        let transport = MockTransport::new();
        let mut dashboard = dashboard(&transport, &ManualPaymentNotifier::new());
        fill_new_machine(&mut dashboard);
        transport.push_json(json!({"id": "abc123", "name": "Kiosk1", "wallet": "w1",
            "lnurlpayamount": 0, "lnurlwithdrawamount": 0, "total": 0}));

        let task = dashboard.submit().expect("create task");
        assert_eq!(dashboard.edit_state(), EditState::Saving { existing: None });
        assert!(dashboard.submit().is_none());
        dashboard.apply(run_future(task));

        assert_eq!(dashboard.edit_state(), EditState::Idle);
        assert_eq!(dashboard.machines().len(), 2);
        let created: Vec<_> = dashboard
            .machines()
            .iter()
            .filter(|machine| machine.id.as_str() == "abc123")
            .collect();
        assert_eq!(created.len(), 1);
        let request = transport.last_request().expect("request");
        assert_eq!(request.method, Method::Post);
        assert!(request.body.expect("body").get("id").is_none());
    }

    #[test]
    fn failed_save_keeps_dialog_and_list() {
        let transport = MockTransport::new();
        let mut dashboard = dashboard(&transport, &ManualPaymentNotifier::new());
        fill_new_machine(&mut dashboard);
        transport.push_api_error(400, "Wallet does not exist.");

        let task = dashboard.submit().expect("create task");
        dashboard.apply(run_future(task));

        assert_eq!(dashboard.edit_state(), EditState::Editing { existing: None });
        assert_eq!(dashboard.machines().len(), 1);
        let notes = dashboard.notifications_mut().drain();
        assert_eq!(notes[0].message, "Wallet does not exist.");
    }

    #[test]
    fn empty_required_field_never_saves() {
        let transport = MockTransport::new();
        let mut dashboard = dashboard(&transport, &ManualPaymentNotifier::new());
        dashboard.open_create();
        dashboard
            .form_mut()
            .expect("form")
            .set_field("wallet", FieldInput::Text("w1".to_string()));

        assert!(dashboard.submit().is_none());
        assert_eq!(transport.requests().len(), 1);
        assert!(dashboard.form().expect("form").error("name").is_some());
    }

    #[test]
    fn edit_prefills_flags_and_replaces_by_id() {
        let transport = MockTransport::new();
        let mut dashboard = dashboard(&transport, &ManualPaymentNotifier::new());
        let id = MachineId::new("m1");

        assert!(dashboard.open_edit(&id));
        assert_eq!(
            dashboard.advanced(),
            Some(AdvancedFlags {
                tips: true,
                otc: true
            })
        );
        assert_eq!(dashboard.form().expect("form").buffer().name, "Lobby");

        transport.push_json(json!({"id": "m1", "name": "Lobby 2", "wallet": "w2"}));
        let task = dashboard.submit().expect("update task");
        dashboard.apply(run_future(task));

        assert_eq!(dashboard.machines().len(), 1);
        let machine = dashboard.machine(&id).expect("machine");
        assert_eq!(machine.name, "Lobby 2");
        assert_eq!(machine.wallet, "w2");
        assert!(machine.items_map.is_empty());
        assert_eq!(
            transport.last_request().expect("request").path,
            "/satoshimachine/api/v1/myex/m1"
        );
    }

    #[test]
    fn delete_requires_confirmation() {
        let transport = MockTransport::new();
        let mut dashboard = dashboard(&transport, &ManualPaymentNotifier::new());
        let id = MachineId::new("m1");
        let before = dashboard.machines().to_vec();

        assert!(dashboard.request_delete(&id));
        assert!(dashboard.resolve_delete(Confirmation::Declined).is_none());
        assert_eq!(dashboard.machines(), before.as_slice());

        assert!(dashboard.request_delete(&id));
        transport.push_api_error(403, "Not your MyExtension.");
        let task = dashboard
            .resolve_delete(Confirmation::Accepted)
            .expect("delete task");
        dashboard.apply(run_future(task));
        assert_eq!(dashboard.machines(), before.as_slice());

        assert!(dashboard.request_delete(&id));
        transport.push_json(json!(null));
        let task = dashboard
            .resolve_delete(Confirmation::Accepted)
            .expect("delete task");
        dashboard.apply(run_future(task));
        assert!(dashboard.machines().is_empty());
    }

    #[test]
    fn invoice_shows_payment_request_and_payment_closes_dialog() {
        let transport = MockTransport::new();
        let notifier = ManualPaymentNotifier::new();
        let mut dashboard = dashboard(&transport, &notifier);
        let id = MachineId::new("m1");

        let wait = dashboard.open_realtime(&id).expect("payment wait");
        assert_eq!(dashboard.qr_value(), Some("LNURL1LOBBY"));
        assert_eq!(
            dashboard.realtime_state(),
            RealtimeState::Awaiting {
                machine: id.clone()
            }
        );

        transport.push_json(json!({"payment_hash": "h1", "payment_request": "lnbc10n1p"}));
        let task = dashboard.create_invoice(&id).expect("invoice task");
        assert!(dashboard.apply(run_future(task)).is_none());
        assert_eq!(dashboard.qr_value(), Some("lnbc10n1p"));
        let request = transport.last_request().expect("request");
        assert_eq!(
            request.body,
            Some(json!({"satoshimachine_id": "m1", "amount": 10, "memo": "SatoshiMachine - Lobby"}))
        );

        assert!(notifier.trigger("m1"));
        dashboard.apply(run_future(wait));
        assert_eq!(dashboard.realtime_state(), RealtimeState::Idle);
        assert!(!notifier.is_active("m1"));
    }

    #[test]
    fn reopening_releases_previous_subscription_and_ignores_stale_signal() {
        let transport = MockTransport::new();
        let notifier = ManualPaymentNotifier::new();
        let mut dashboard = dashboard(&transport, &notifier);
        let id = MachineId::new("m1");

        let first = dashboard.open_realtime(&id).expect("first wait");
        let second = dashboard.open_realtime(&id).expect("second wait");
        assert!(notifier.is_active("m1"));

        dashboard.apply(run_future(first));
        assert_eq!(
            dashboard.realtime_state(),
            RealtimeState::Awaiting {
                machine: id.clone()
            }
        );

        dashboard.close_realtime();
        assert!(!notifier.is_active("m1"));
        dashboard.apply(run_future(second));
        assert_eq!(dashboard.realtime_state(), RealtimeState::Idle);
    }

    #[test]
    fn dropped_channel_leaves_dialog_without_subscription() {
        // Known limitation: without a reconnect policy a dropped channel
        // stops notifications while the dialog stays open.
        let transport = MockTransport::new();
        let notifier = ManualPaymentNotifier::new();
        let mut dashboard = dashboard(&transport, &notifier);
        let id = MachineId::new("m1");

        let generation = {
            let _wait = dashboard.open_realtime(&id).expect("wait");
            dashboard.generation
        };
        dashboard.apply(MachineEvent::Payment {
            generation,
            observed: false,
        });
        assert_eq!(
            dashboard.realtime_state(),
            RealtimeState::Unsubscribed { machine: id }
        );
        assert!(!notifier.is_active("m1"));
    }

    #[test]
    fn item_form_upserts_into_machine() {
        let transport = MockTransport::new();
        let mut dashboard = dashboard(&transport, &ManualPaymentNotifier::new());
        let key: ItemKey = "m1:i1".parse().expect("key");

        assert!(dashboard.open_item_form(&key));
        let form = dashboard.item_form_mut().expect("item form");
        assert_eq!(form.buffer().item.name, "Coffee");
        assert_eq!(form.buffer().item.currency.as_deref(), Some("GTQ"));
        form.set_field("price", FieldInput::Number(4.0));

        transport.push_json(json!({"id": "m1", "name": "Lobby", "wallet": "w1",
            "itemsMap": {"m1:i1": {"id": "i1", "name": "Coffee", "price": 4.0}}}));
        let task = dashboard.submit_item().expect("item task");
        dashboard.apply(run_future(task));

        assert!(dashboard.item_form().is_none());
        assert_eq!(dashboard.items(&MachineId::new("m1"))[0].price, 4.0);
        let request = transport.last_request().expect("request");
        assert_eq!(request.method, Method::Put);
        assert_eq!(
            request.body.expect("body")["itemsMap"]["m1:i1"]["price"],
            json!(4.0)
        );

        assert!(!dashboard.open_item_form(&"m1:missing".parse().expect("key")));
        assert!(dashboard.open_item_form(&"m1".parse().expect("key")));
    }

    #[test]
    fn export_matches_table_columns() {
        let transport = MockTransport::new();
        let dashboard = dashboard(&transport, &ManualPaymentNotifier::new());
        let csv = dashboard.export().expect("csv");
        assert_eq!(
            csv,
            "\"ID\",\"Name\",\"Wallet\",\"Total sent/received\"\r\n\"m1\",\"Lobby\",\"w1\",\"0\""
        );
    }

    #[test]
    fn reopened_edit_dialog_waits_for_earlier_save() {
        let transport = MockTransport::new();
        let mut dashboard = dashboard(&transport, &ManualPaymentNotifier::new());
        let id = MachineId::new("m1");

        assert!(dashboard.open_edit(&id));
        transport.push_json(json!({"id": "m1", "name": "Lobby", "wallet": "w2"}));
        let first = dashboard.submit().expect("update task");
        dashboard.close_edit();

        assert!(dashboard.open_edit(&id));
        assert_eq!(dashboard.edit_state(), EditState::Saving { existing: Some(id.clone()) });
        assert!(dashboard.submit().is_none());

        dashboard.apply(run_future(first));
        assert!(!dashboard.is_saving());
        assert_eq!(dashboard.edit_state(), EditState::Editing { existing: Some(id.clone()) });
        assert_eq!(dashboard.machine(&id).expect("machine").wallet, "w2");
        assert_eq!(transport.requests().len(), 2);
    }

    #[test]
    fn item_stored_under_plain_key_is_updated_in_place() {
        let transport = MockTransport::new();
        let mut dashboard = dashboard(&transport, &ManualPaymentNotifier::new());
        let id = MachineId::new("m1");
        let machine: Machine = serde_json::from_value(json!({
            "id": "m1", "name": "Lobby", "wallet": "w1", "currency": "GTQ",
            "itemsMap": {"i7": {"id": "i7", "name": "Tea", "price": 2.0}}
        }))
        .expect("decode machine");
        dashboard.apply(MachineEvent::Refreshed {
            id: id.clone(),
            result: Ok(machine),
        });

        assert!(dashboard.open_item_form(&"m1:i7".parse().expect("key")));
        let form = dashboard.item_form_mut().expect("item form");
        assert_eq!(form.buffer().key.as_deref(), Some("i7"));
        form.set_field("price", FieldInput::Number(2.5));

        transport.push_json(json!({"id": "m1", "name": "Lobby", "wallet": "w1",
            "itemsMap": {"i7": {"id": "i7", "name": "Tea", "price": 2.5}}}));
        let task = dashboard.submit_item().expect("item task");
        dashboard.apply(run_future(task));

        let body = transport.last_request().expect("request").body.expect("body");
        let items = body["itemsMap"].as_object().expect("items map");
        assert_eq!(items.len(), 1);
        assert_eq!(items["i7"]["price"], json!(2.5));
        assert_eq!(dashboard.items(&id).len(), 1);
    }

    #[test]
    fn hiding_advanced_sections_clears_their_fields() {
        let transport = MockTransport::new();
        let mut dashboard = dashboard(&transport, &ManualPaymentNotifier::new());
        let id = MachineId::new("m1");

        assert!(dashboard.open_edit(&id));
        let advanced = dashboard.advanced().expect("advanced flags");
        assert!(advanced.tips && advanced.otc);

        dashboard.set_tips(false);
        dashboard.set_otc(false);
        let draft = dashboard.form().expect("form").buffer();
        assert_eq!(draft.tip_wallet, None);
        assert_eq!(draft.withdrawlimit, None);

        transport.push_json(json!({"id": "m1", "name": "Lobby", "wallet": "w1"}));
        let task = dashboard.submit().expect("update task");
        dashboard.apply(run_future(task));
        let body = transport.last_request().expect("request").body.expect("body");
        assert!(body.get("tip_wallet").is_none());
        assert!(body.get("withdrawlimit").is_none());
    }
}
