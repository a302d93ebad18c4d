pub mod api;
pub mod error;
pub mod forms;
pub mod http;
pub mod machines;
pub mod model;
pub mod notify;
pub mod profile;
pub mod realtime;
pub mod records;
pub mod settings;
pub mod table;
pub mod targets;
pub mod transactions;
pub mod validation;

pub use api::{AdminApi, ApiFuture, ApiRequest, Method, MockTransport, Task, Transport};
pub use error::{Error, Failure, StorageAction};
pub use forms::{
    ClientForm, CommissionRecipientForm, FieldInput, FormRecord, ItemForm, MachineForm,
    RecordForm, SettingsForm,
};
pub use http::HttpTransport;
pub use machines::{EditState, MachineDashboard, MachineEvent, RealtimeState};
pub use model::{
    AdvancedFlags, Client, CommissionRecipient, Config, Credential, FixedModeSchedule, Invoice,
    InvoiceRequest, ItemDraft, ItemKey, LineItem, Machine, MachineDraft, MachineId, RecordId,
    Transaction, TransactionStatus,
};
pub use notify::{Confirmation, Notification, NotificationKind, Notifications};
pub use profile::{AdminProfile, RealtimeSettings, WalletKeys, profile_path};
pub use realtime::{
    ManualPaymentNotifier, PaymentNotifier, PaymentSignal, PaymentWatch, ReconnectPolicy,
    WatchGuard, WebSocketNotifier,
};
pub use records::{ClientBook, RecipientBook, RecordBook, RecordEvent, RemoteRecord};
pub use settings::{SettingsController, SettingsEvent};
pub use table::{Align, Column, MACHINE_COLUMNS, TableRow, export_csv};
pub use transactions::{TransactionEvent, TransactionTable, TransactionsView};
pub use validation::{FieldErrors, FieldValue, Rule, Validate, ValidationPolicy};
