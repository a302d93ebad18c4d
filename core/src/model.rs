use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_INVOICE_AMOUNT: u64 = 10;
pub const INVOICE_MEMO_PREFIX: &str = "SatoshiMachine - ";

/// Which of the wallet's two API keys a request is signed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Credential {
    /// Invoice key; read-only calls.
    Read,
    /// Admin key; mutating calls.
    Write,
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Read => f.write_str("invoice"),
            Credential::Write => f.write_str("admin"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MachineId(pub String);

impl MachineId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-assigned identity of a client or commission recipient.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Composite `"<machineId>:<itemId>"` key of a line item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey {
    pub machine: MachineId,
    pub item: Option<String>,
}

impl ItemKey {
    pub fn new(machine: MachineId, item: impl Into<String>) -> Self {
        Self {
            machine,
            item: Some(item.into()),
        }
    }

    pub fn machine_only(machine: MachineId) -> Self {
        Self {
            machine,
            item: None,
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.item {
            Some(item) => write!(f, "{}:{item}", self.machine),
            None => write!(f, "{}", self.machine),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemKeyError {
    pub value: String,
}

impl fmt::Display for ItemKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid item key: '{}'", self.value)
    }
}

impl std::error::Error for ItemKeyError {}

impl FromStr for ItemKey {
    type Err = ItemKeyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (machine, item) = match value.split_once(':') {
            Some((machine, item)) => (machine, (!item.is_empty()).then(|| item.to_string())),
            None => (value, None),
        };
        if machine.is_empty() {
            return Err(ItemKeyError {
                value: value.to_string(),
            });
        }
        Ok(Self {
            machine: MachineId::new(machine),
            item,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "flexible_number")]
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

/// A SatoshiMachine ("myex") record as returned by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub id: MachineId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub wallet: String,
    #[serde(default)]
    pub lnurlwithdrawamount: u64,
    #[serde(default)]
    pub lnurlpayamount: u64,
    #[serde(default)]
    pub total: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tip_wallet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawlimit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lnurlpay: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lnurlwithdraw: Option<String>,
    #[serde(
        default,
        rename = "itemsMap",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub items_map: BTreeMap<String, LineItem>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Machine {
    pub fn new(id: MachineId, name: impl Into<String>, wallet: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            wallet: wallet.into(),
            lnurlwithdrawamount: 0,
            lnurlpayamount: 0,
            total: 0,
            currency: None,
            tip_wallet: None,
            withdrawlimit: None,
            lnurlpay: None,
            lnurlwithdraw: None,
            items_map: BTreeMap::new(),
            extra: Map::new(),
        }
    }

    pub fn items(&self) -> Vec<&LineItem> {
        self.items_map.values().collect()
    }

    pub fn advanced_flags(&self) -> AdvancedFlags {
        AdvancedFlags {
            tips: self
                .tip_wallet
                .as_deref()
                .is_some_and(|wallet| !wallet.is_empty()),
            otc: self.withdrawlimit.is_some_and(|limit| limit >= 1),
        }
    }
}

/// Advanced sections of the machine edit dialog that start expanded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdvancedFlags {
    pub tips: bool,
    pub otc: bool,
}

/// Edit buffer and request body for machine create/update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MachineId>,
    pub name: String,
    pub wallet: String,
    pub lnurlwithdrawamount: u64,
    pub lnurlpayamount: u64,
    #[serde(default)]
    pub total: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tip_wallet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawlimit: Option<u64>,
    #[serde(
        default,
        rename = "itemsMap",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub items_map: BTreeMap<String, LineItem>,
}

impl MachineDraft {
    pub fn from_machine(machine: &Machine) -> Self {
        Self {
            id: Some(machine.id.clone()),
            name: machine.name.clone(),
            wallet: machine.wallet.clone(),
            lnurlwithdrawamount: machine.lnurlwithdrawamount,
            lnurlpayamount: machine.lnurlpayamount,
            total: machine.total,
            currency: machine.currency.clone(),
            tip_wallet: machine.tip_wallet.clone(),
            withdrawlimit: machine.withdrawlimit,
            items_map: machine.items_map.clone(),
        }
    }
}

/// Edit buffer for one line item of a machine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemDraft {
    pub machine: MachineId,
    pub item: LineItem,
    /// Map key the item was read from; new items get `"<machine>:<item>"`.
    pub key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub wallet_id: String,
    #[serde(default, deserialize_with = "flexible_number")]
    pub dca_percentage: f64,
    #[serde(default, deserialize_with = "flexible_number")]
    pub commission_percentage: f64,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl Default for Client {
    fn default() -> Self {
        Self {
            id: None,
            name: String::new(),
            wallet_id: String::new(),
            dca_percentage: 0.0,
            commission_percentage: 0.0,
            active: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionRecipient {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub wallet_id: String,
    #[serde(default, deserialize_with = "flexible_number")]
    pub percentage: f64,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl Default for CommissionRecipient {
    fn default() -> Self {
        Self {
            id: None,
            name: String::new(),
            wallet_id: String::new(),
            percentage: 0.0,
            active: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixedModeSchedule {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl FixedModeSchedule {
    pub const ALL: [FixedModeSchedule; 3] = [
        FixedModeSchedule::Daily,
        FixedModeSchedule::Weekly,
        FixedModeSchedule::Monthly,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FixedModeSchedule::Daily => "daily",
            FixedModeSchedule::Weekly => "weekly",
            FixedModeSchedule::Monthly => "monthly",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|schedule| schedule.as_str() == value)
    }
}

impl fmt::Display for FixedModeSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixedModeSchedule::Daily => f.write_str("Daily"),
            FixedModeSchedule::Weekly => f.write_str("Weekly"),
            FixedModeSchedule::Monthly => f.write_str("Monthly"),
        }
    }
}

/// The deployment-wide DCA configuration. Saved as a full record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, deserialize_with = "null_as_default")]
    pub processing_enabled: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub lamassu_server_ip: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fixed_mode_schedule: FixedModeSchedule,
    #[serde(default = "default_fixed_mode_time", deserialize_with = "null_as_default")]
    pub fixed_mode_time: String,
    #[serde(default, deserialize_with = "flexible_number")]
    pub max_daily_fixed_amount: f64,
    /// Server-side fields this console does not edit; sent back unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            processing_enabled: false,
            lamassu_server_ip: String::new(),
            fixed_mode_schedule: FixedModeSchedule::Daily,
            fixed_mode_time: default_fixed_mode_time(),
            max_daily_fixed_amount: 0.0,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Approved => "approved",
            TransactionStatus::Rejected => "rejected",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub client_name: String,
    #[serde(deserialize_with = "flexible_number")]
    pub amount: f64,
    pub status: TransactionStatus,
    #[serde(deserialize_with = "flexible_timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRequest {
    pub satoshimachine_id: MachineId,
    pub amount: u64,
    pub memo: String,
}

impl InvoiceRequest {
    pub fn for_machine(machine: &Machine, amount: u64) -> Self {
        Self {
            satoshimachine_id: machine.id.clone(),
            amount,
            memo: format!("{INVOICE_MEMO_PREFIX}{}", machine.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    #[serde(default)]
    pub payment_hash: Option<String>,
    pub payment_request: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProbe {
    pub server_ip: String,
}

fn default_active() -> bool {
    true
}

fn default_fixed_mode_time() -> String {
    "00:00".to_string()
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

// Decimal columns arrive either as JSON numbers or as strings.
fn flexible_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrText>::deserialize(deserializer)? {
        None => Ok(0.0),
        Some(NumberOrText::Number(value)) => Ok(value),
        Some(NumberOrText::Text(text)) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid number '{text}'"))),
    }
}

fn flexible_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse_timestamp(&text)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{text}'")))
}

pub(crate) fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(value) = DateTime::parse_from_rfc3339(text) {
        return Some(value.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .into_iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
}
