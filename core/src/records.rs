use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::api::{AdminApi, Task, task};
use crate::error::Failure;
use crate::forms::{FormRecord, RecordForm};
use crate::model::{Client, CommissionRecipient, RecordId};
use crate::notify::{Confirmation, Notifications};
use crate::targets;

pub const CLIENTS_PATH: &str = "/dca_admin/api/v1/clients";
pub const COMMISSION_RECIPIENTS_PATH: &str = "/dca_admin/api/v1/commission-recipients";

/// A record kept in a server-side collection with list/create/update/delete endpoints.
pub trait RemoteRecord: Serialize + DeserializeOwned + Clone + Send + 'static {
    const COLLECTION: &'static str;
    const LABEL: &'static str;

    fn id(&self) -> Option<&RecordId>;
}

impl RemoteRecord for Client {
    const COLLECTION: &'static str = CLIENTS_PATH;
    const LABEL: &'static str = "Client";

    fn id(&self) -> Option<&RecordId> {
        self.id.as_ref()
    }
}

impl RemoteRecord for CommissionRecipient {
    const COLLECTION: &'static str = COMMISSION_RECIPIENTS_PATH;
    const LABEL: &'static str = "Commission recipient";

    fn id(&self) -> Option<&RecordId> {
        self.id.as_ref()
    }
}

#[derive(Debug, Clone)]
pub enum RecordEvent<R> {
    Listed(Result<Vec<R>, Failure>),
    Saved {
        id: Option<RecordId>,
        session: u64,
        result: Result<R, Failure>,
    },
    Deleted {
        id: RecordId,
        result: Result<(), Failure>,
    },
}

/// List plus create/edit dialog for one record collection.
#[derive(Debug)]
pub struct RecordBook<R: RemoteRecord + FormRecord> {
    api: AdminApi,
    records: Vec<R>,
    loading: bool,
    form: RecordForm<R>,
    dialog_open: bool,
    edit_session: u64,
    saving: bool,
    pending_delete: Option<RecordId>,
    deleting: bool,
    notifications: Notifications,
}

pub type ClientBook = RecordBook<Client>;
pub type RecipientBook = RecordBook<CommissionRecipient>;

impl<R: RemoteRecord + FormRecord> RecordBook<R> {
    pub fn new(api: AdminApi) -> Self {
        Self {
            api,
            records: Vec::new(),
            loading: false,
            form: RecordForm::default(),
            dialog_open: false,
            edit_session: 0,
            saving: false,
            pending_delete: None,
            deleting: false,
            notifications: Notifications::default(),
        }
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_dialog_open(&self) -> bool {
        self.dialog_open
    }

    pub fn form(&self) -> &RecordForm<R> {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut RecordForm<R> {
        &mut self.form
    }

    /// A save is in flight, possibly from an earlier dialog.
    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn pending_delete(&self) -> Option<&RecordId> {
        self.pending_delete.as_ref()
    }

    pub fn notifications_mut(&mut self) -> &mut Notifications {
        &mut self.notifications
    }

    pub fn list(&mut self) -> Option<Task<RecordEvent<R>>> {
        if self.loading {
            return None;
        }
        self.loading = true;
        Some(task(self.api.list_records::<R>(), RecordEvent::Listed))
    }

    /// Opens the dialog with a copy of `id`'s record, or blank for a new one.
    pub fn open(&mut self, id: Option<&RecordId>) -> bool {
        let record = match id {
            Some(id) => match self.find(id) {
                Some(record) => Some(record.clone()),
                None => return false,
            },
            None => None,
        };
        self.form.reset(record);
        self.form.set_loading(self.saving);
        self.edit_session += 1;
        self.dialog_open = true;
        true
    }

    pub fn close(&mut self) {
        self.dialog_open = false;
        self.form.reset(None);
    }

    pub fn submit(&mut self) -> Option<Task<RecordEvent<R>>> {
        if !self.dialog_open || self.saving {
            return None;
        }
        let record = self.form.submit()?;
        self.form.set_loading(true);
        self.saving = true;
        let id = record.id().cloned();
        let session = self.edit_session;
        let api = self.api.clone();
        Some(match id.clone() {
            Some(existing) => task(api.update_record(&existing, &record), move |result| {
                RecordEvent::Saved {
                    id,
                    session,
                    result,
                }
            }),
            None => task(api.create_record(&record), move |result| RecordEvent::Saved {
                id: None,
                session,
                result,
            }),
        })
    }

    pub fn request_delete(&mut self, id: RecordId) -> bool {
        if self.deleting || self.find(&id).is_none() {
            return false;
        }
        self.pending_delete = Some(id);
        true
    }

    pub fn resolve_delete(&mut self, answer: Confirmation) -> Option<Task<RecordEvent<R>>> {
        let id = self.pending_delete.take()?;
        if answer == Confirmation::Declined {
            return None;
        }
        self.deleting = true;
        let event_id = id.clone();
        Some(task(self.api.delete_record::<R>(&id), move |result| {
            RecordEvent::Deleted {
                id: event_id,
                result,
            }
        }))
    }

    pub fn apply(&mut self, event: RecordEvent<R>) {
        match event {
            RecordEvent::Listed(result) => {
                self.loading = false;
                match result {
                    Ok(records) => self.records = records,
                    Err(failure) => self.fail("list", &failure),
                }
            }
            RecordEvent::Saved {
                id,
                session,
                result,
            } => {
                self.saving = false;
                self.form.set_loading(false);
                let current = self.dialog_open && session == self.edit_session;
                match result {
                    Ok(saved) => {
                        match id.as_ref().and_then(|id| self.position(id)) {
                            Some(index) => self.records[index] = saved,
                            None => self.records.push(saved),
                        }
                        info!(target: targets::API, record = R::LABEL, "Record saved");
                        self.notifications.positive(format!("{} saved", R::LABEL));
                        if current {
                            self.close();
                        }
                    }
                    Err(failure) => self.fail("save", &failure),
                }
            }
            RecordEvent::Deleted { id, result } => {
                self.deleting = false;
                match result {
                    Ok(()) => {
                        self.records.retain(|record| record.id() != Some(&id));
                        info!(target: targets::API, record = R::LABEL, id = %id, "Record deleted");
                        self.notifications.positive(format!("{} deleted", R::LABEL));
                    }
                    Err(failure) => self.fail("delete", &failure),
                }
            }
        }
    }

    fn find(&self, id: &RecordId) -> Option<&R> {
        self.records.iter().find(|record| record.id() == Some(id))
    }

    fn position(&self, id: &RecordId) -> Option<usize> {
        self.records.iter().position(|record| record.id() == Some(id))
    }

    fn fail(&mut self, action: &str, failure: &Failure) {
        warn!(target: targets::API, record = R::LABEL, action, error = %failure, "Record request failed");
        self.notifications.negative(failure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Method, MockTransport};
    use crate::forms::FieldInput;
    use serde_json::json;

    fn run_future<T>(future: impl std::future::Future<Output = T>) -> T {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("tokio runtime");
        runtime.block_on(future)
    }

    fn loaded_book(transport: &MockTransport) -> ClientBook {
        transport.push_json(json!([
            {"id": "c1", "name": "Ana", "wallet_id": "wa", "dca_percentage": "40.00",
             "commission_percentage": 3, "active": true}
        ]));
        let mut book = ClientBook::new(AdminApi::new(transport.clone()));
        let task = book.list().expect("list task");
        book.apply(run_future(task));
        book
    }

    #[test]
    fn edit_replaces_record_and_closes_dialog() {
        let transport = MockTransport::new();
        let mut book = loaded_book(&transport);
        assert_eq!(book.records()[0].dca_percentage, 40.0);

        assert!(book.open(Some(&RecordId::new("c1"))));
        book.form_mut()
            .set_field("name", FieldInput::Text("Ana Maria".to_string()));
        transport.push_json(json!({"id": "c1", "name": "Ana Maria", "wallet_id": "wa",
            "dca_percentage": 40, "commission_percentage": 3, "active": true}));

        let task = book.submit().expect("save task");
        assert!(book.submit().is_none());
        book.apply(run_future(task));

        assert!(!book.is_dialog_open());
        assert_eq!(book.records().len(), 1);
        assert_eq!(book.records()[0].name, "Ana Maria");
        let request = transport.last_request().expect("request");
        assert_eq!(request.method, Method::Put);
        assert_eq!(request.path, "/dca_admin/api/v1/clients/c1");
    }

    #[test]
    fn reopened_dialog_waits_for_earlier_save() {
        let transport = MockTransport::new();
        let mut book = loaded_book(&transport);
        let c1 = RecordId::new("c1");

        assert!(book.open(Some(&c1)));
        transport.push_json(json!({"id": "c1", "name": "Ana", "wallet_id": "wa",
            "dca_percentage": 50, "commission_percentage": 3, "active": true}));
        let first = book.submit().expect("save task");
        book.close();

        assert!(book.open(Some(&c1)));
        assert!(book.form().is_loading());
        assert!(book.submit().is_none());

        book.apply(run_future(first));
        assert!(book.is_dialog_open());
        assert!(!book.is_saving());
        assert!(!book.form().is_loading());
        assert_eq!(book.records()[0].dca_percentage, 50.0);
        assert_eq!(transport.requests().len(), 2);
    }

    #[test]
    fn invalid_percentage_blocks_submit() {
        let transport = MockTransport::new();
        let mut book = loaded_book(&transport);
        book.open(None);
        book.form_mut()
            .set_field("name", FieldInput::Text("Luis".to_string()));
        book.form_mut()
            .set_field("wallet_id", FieldInput::Text("wl".to_string()));
        book.form_mut()
            .set_field("dca_percentage", FieldInput::Number(150.0));

        assert!(book.submit().is_none());
        assert_eq!(
            book.form().error("dca_percentage"),
            Some("Must be between 0 and 100")
        );
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn failed_create_keeps_dialog_open() {
        let transport = MockTransport::new();
        let mut book = loaded_book(&transport);
        book.open(None);
        book.form_mut()
            .set_field("name", FieldInput::Text("Luis".to_string()));
        book.form_mut()
            .set_field("wallet_id", FieldInput::Text("wl".to_string()));
        transport.push_api_error(400, "Wallet not found");

        let task = book.submit().expect("save task");
        book.apply(run_future(task));

        assert!(book.is_dialog_open());
        assert!(!book.form().is_loading());
        assert_eq!(book.records().len(), 1);
        let notes = book.notifications_mut().drain();
        assert_eq!(notes[0].message, "Wallet not found");
    }

    #[test]
    fn delete_waits_for_confirmation() {
        let transport = MockTransport::new();
        let mut book = loaded_book(&transport);

        assert!(book.request_delete(RecordId::new("c1")));
        assert!(book.resolve_delete(Confirmation::Declined).is_none());
        assert_eq!(transport.requests().len(), 1);

        assert!(book.request_delete(RecordId::new("c1")));
        transport.push_json(json!(null));
        let task = book
            .resolve_delete(Confirmation::Accepted)
            .expect("delete task");
        book.apply(run_future(task));
        assert!(book.records().is_empty());
    }
}
