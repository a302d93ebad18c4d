use std::fmt;

use tracing::debug;

use crate::model::{
    Client, CommissionRecipient, Config, FixedModeSchedule, ItemDraft, MachineDraft,
};
use crate::targets;
use crate::validation::{FieldErrors, FieldValue, Rule, Validate, ValidationPolicy};

/// An owned edit applied to one field of a form buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldInput {
    Text(String),
    Number(f64),
    Flag(bool),
}

/// A record that can back a [`RecordForm`].
pub trait FormRecord: Validate + Clone + Default + fmt::Debug {
    const FORM_NAME: &'static str;

    fn default_policy() -> ValidationPolicy;

    /// Applies `input` to `field`. Returns false when the field is unknown or
    /// the input kind does not match it.
    fn set_field(&mut self, field: &str, input: FieldInput) -> bool;
}

/// Editable copy of a record plus its validation state.
///
/// The buffer is only replaced through [`RecordForm::reset`]; the owner calls it
/// when a dialog opens or after a successful save.
#[derive(Debug, Clone)]
pub struct RecordForm<R: FormRecord> {
    buffer: R,
    policy: ValidationPolicy,
    errors: FieldErrors,
    loading: bool,
}

pub type ClientForm = RecordForm<Client>;
pub type CommissionRecipientForm = RecordForm<CommissionRecipient>;
pub type SettingsForm = RecordForm<Config>;
pub type MachineForm = RecordForm<MachineDraft>;
pub type ItemForm = RecordForm<ItemDraft>;

impl<R: FormRecord> Default for RecordForm<R> {
    fn default() -> Self {
        Self::new(None)
    }
}

impl<R: FormRecord> RecordForm<R> {
    pub fn new(record: Option<R>) -> Self {
        Self::with_policy(record, R::default_policy())
    }

    pub fn with_policy(record: Option<R>, policy: ValidationPolicy) -> Self {
        Self {
            buffer: record.unwrap_or_default(),
            policy,
            errors: FieldErrors::new(),
            loading: false,
        }
    }

    /// Replaces the whole buffer; nothing from a previous edit survives.
    pub fn reset(&mut self, record: Option<R>) {
        self.buffer = record.unwrap_or_default();
        self.errors.clear();
    }

    pub fn buffer(&self) -> &R {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut R {
        &mut self.buffer
    }

    pub fn set_field(&mut self, field: &str, input: FieldInput) -> bool {
        let applied = self.buffer.set_field(field, input);
        if applied {
            self.errors.remove(field);
        } else {
            debug!(target: targets::FORMS, form = R::FORM_NAME, field, "Ignored field input");
        }
        applied
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn error(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    /// Validates the buffer and returns the record to save.
    ///
    /// Returns `None` when validation fails or a save is already in flight.
    pub fn submit(&mut self) -> Option<R> {
        if self.loading {
            debug!(target: targets::FORMS, form = R::FORM_NAME, "Submit ignored while saving");
            return None;
        }

        match self.policy.validate(&self.buffer) {
            Ok(()) => {
                self.errors.clear();
                Some(self.buffer.clone())
            }
            Err(errors) => {
                debug!(
                    target: targets::FORMS,
                    form = R::FORM_NAME,
                    fields = ?errors.keys().collect::<Vec<_>>(),
                    "Validation failed"
                );
                self.errors = errors;
                None
            }
        }
    }
}

fn set_text(target: &mut String, input: FieldInput) -> bool {
    match input {
        FieldInput::Text(value) => {
            *target = value;
            true
        }
        _ => false,
    }
}

fn set_number(target: &mut f64, input: FieldInput) -> bool {
    match input {
        FieldInput::Number(value) => {
            *target = value;
            true
        }
        _ => false,
    }
}

fn set_amount(target: &mut u64, input: FieldInput) -> bool {
    match input {
        FieldInput::Number(value) if value >= 0.0 && value.fract() == 0.0 => {
            *target = value as u64;
            true
        }
        _ => false,
    }
}

fn set_flag(target: &mut bool, input: FieldInput) -> bool {
    match input {
        FieldInput::Flag(value) => {
            *target = value;
            true
        }
        _ => false,
    }
}

fn set_optional_text(target: &mut Option<String>, input: FieldInput) -> bool {
    match input {
        FieldInput::Text(value) => {
            *target = (!value.is_empty()).then_some(value);
            true
        }
        _ => false,
    }
}

fn percentage_rule() -> Rule {
    Rule::range(0.0, 100.0)
}

impl Validate for Client {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "name" => Some(FieldValue::Text(&self.name)),
            "wallet_id" => Some(FieldValue::Text(&self.wallet_id)),
            "dca_percentage" => Some(FieldValue::Number(self.dca_percentage)),
            "commission_percentage" => Some(FieldValue::Number(self.commission_percentage)),
            "active" => Some(FieldValue::Flag(self.active)),
            _ => None,
        }
    }
}

impl FormRecord for Client {
    const FORM_NAME: &'static str = "client";

    fn default_policy() -> ValidationPolicy {
        ValidationPolicy::new()
            .rule("name", Rule::RequiredString)
            .rule("wallet_id", Rule::RequiredString)
            .rule("dca_percentage", percentage_rule())
            .rule("commission_percentage", percentage_rule())
    }

    fn set_field(&mut self, field: &str, input: FieldInput) -> bool {
        match field {
            "name" => set_text(&mut self.name, input),
            "wallet_id" => set_text(&mut self.wallet_id, input),
            "dca_percentage" => set_number(&mut self.dca_percentage, input),
            "commission_percentage" => set_number(&mut self.commission_percentage, input),
            "active" => set_flag(&mut self.active, input),
            _ => false,
        }
    }
}

impl Validate for CommissionRecipient {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "name" => Some(FieldValue::Text(&self.name)),
            "wallet_id" => Some(FieldValue::Text(&self.wallet_id)),
            "percentage" => Some(FieldValue::Number(self.percentage)),
            "active" => Some(FieldValue::Flag(self.active)),
            _ => None,
        }
    }
}

impl FormRecord for CommissionRecipient {
    const FORM_NAME: &'static str = "commission_recipient";

    fn default_policy() -> ValidationPolicy {
        ValidationPolicy::new()
            .rule("name", Rule::RequiredString)
            .rule("wallet_id", Rule::RequiredString)
            .rule("percentage", percentage_rule())
    }

    fn set_field(&mut self, field: &str, input: FieldInput) -> bool {
        match field {
            "name" => set_text(&mut self.name, input),
            "wallet_id" => set_text(&mut self.wallet_id, input),
            "percentage" => set_number(&mut self.percentage, input),
            "active" => set_flag(&mut self.active, input),
            _ => false,
        }
    }
}

impl Validate for Config {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "processing_enabled" => Some(FieldValue::Flag(self.processing_enabled)),
            "lamassu_server_ip" => Some(FieldValue::Text(&self.lamassu_server_ip)),
            "fixed_mode_schedule" => Some(FieldValue::Text(self.fixed_mode_schedule.as_str())),
            "fixed_mode_time" => Some(FieldValue::Text(&self.fixed_mode_time)),
            "max_daily_fixed_amount" => Some(FieldValue::Number(self.max_daily_fixed_amount)),
            _ => None,
        }
    }
}

impl FormRecord for Config {
    const FORM_NAME: &'static str = "settings";

    fn default_policy() -> ValidationPolicy {
        ValidationPolicy::new()
            .rule(
                "fixed_mode_schedule",
                Rule::one_of(FixedModeSchedule::ALL.map(FixedModeSchedule::as_str)),
            )
            .rule("fixed_mode_time", Rule::RequiredString)
            .rule("fixed_mode_time", Rule::ClockTime)
            .rule("max_daily_fixed_amount", Rule::at_least(0.0))
    }

    fn set_field(&mut self, field: &str, input: FieldInput) -> bool {
        match field {
            "processing_enabled" => set_flag(&mut self.processing_enabled, input),
            "lamassu_server_ip" => set_text(&mut self.lamassu_server_ip, input),
            "fixed_mode_schedule" => match input {
                FieldInput::Text(value) => match FixedModeSchedule::parse(&value) {
                    Some(schedule) => {
                        self.fixed_mode_schedule = schedule;
                        true
                    }
                    None => false,
                },
                _ => false,
            },
            "fixed_mode_time" => set_text(&mut self.fixed_mode_time, input),
            "max_daily_fixed_amount" => set_number(&mut self.max_daily_fixed_amount, input),
            _ => false,
        }
    }
}

impl Validate for MachineDraft {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "name" => Some(FieldValue::Text(&self.name)),
            "wallet" => Some(FieldValue::Text(&self.wallet)),
            "lnurlwithdrawamount" => Some(FieldValue::Number(self.lnurlwithdrawamount as f64)),
            "lnurlpayamount" => Some(FieldValue::Number(self.lnurlpayamount as f64)),
            "tip_wallet" => Some(FieldValue::Text(self.tip_wallet.as_deref().unwrap_or(""))),
            "withdrawlimit" => Some(FieldValue::Number(self.withdrawlimit.unwrap_or(0) as f64)),
            _ => None,
        }
    }
}

impl FormRecord for MachineDraft {
    const FORM_NAME: &'static str = "machine";

    fn default_policy() -> ValidationPolicy {
        ValidationPolicy::new()
            .rule("name", Rule::RequiredString)
            .rule("wallet", Rule::RequiredString)
            .rule("lnurlwithdrawamount", Rule::at_least(0.0))
            .rule("lnurlpayamount", Rule::at_least(0.0))
    }

    fn set_field(&mut self, field: &str, input: FieldInput) -> bool {
        match field {
            "name" => set_text(&mut self.name, input),
            "wallet" => set_text(&mut self.wallet, input),
            "lnurlwithdrawamount" => set_amount(&mut self.lnurlwithdrawamount, input),
            "lnurlpayamount" => set_amount(&mut self.lnurlpayamount, input),
            "tip_wallet" => set_optional_text(&mut self.tip_wallet, input),
            "withdrawlimit" => {
                let mut limit = self.withdrawlimit.unwrap_or(0);
                let applied = set_amount(&mut limit, input);
                if applied {
                    self.withdrawlimit = (limit > 0).then_some(limit);
                }
                applied
            }
            _ => false,
        }
    }
}

impl Validate for ItemDraft {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "name" => Some(FieldValue::Text(&self.item.name)),
            "description" => Some(FieldValue::Text(
                self.item.description.as_deref().unwrap_or(""),
            )),
            "price" => Some(FieldValue::Number(self.item.price)),
            _ => None,
        }
    }
}

impl FormRecord for ItemDraft {
    const FORM_NAME: &'static str = "line_item";

    fn default_policy() -> ValidationPolicy {
        ValidationPolicy::new()
            .rule("name", Rule::RequiredString)
            .rule("price", Rule::at_least(0.0))
    }

    fn set_field(&mut self, field: &str, input: FieldInput) -> bool {
        match field {
            "name" => set_text(&mut self.item.name, input),
            "description" => set_optional_text(&mut self.item.description, input),
            "price" => set_number(&mut self.item.price, input),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecordId;

    fn filled_client() -> Client {
        Client {
            id: Some(RecordId::new("c1")),
            name: "Ana".to_string(),
            wallet_id: "wallet-a".to_string(),
            dca_percentage: 40.0,
            commission_percentage: 3.0,
            active: true,
        }
    }

    #[test]
    fn required_field_empty_never_emits() {
        let mut form = ClientForm::new(Some(filled_client()));
        form.set_field("name", FieldInput::Text(String::new()));

        assert!(form.submit().is_none());
        assert!(form.error("name").is_some());

        let mut recipients = CommissionRecipientForm::new(None);
        recipients.set_field("name", FieldInput::Text("Ops".to_string()));
        assert!(recipients.submit().is_none());
        assert!(recipients.error("wallet_id").is_some());
    }

    #[test]
    fn reset_replaces_the_whole_buffer() {
        let mut form = ClientForm::new(Some(filled_client()));
        form.set_field("dca_percentage", FieldInput::Number(75.0));
        form.set_field("active", FieldInput::Flag(false));

        let replacement = Client {
            id: Some(RecordId::new("c2")),
            name: "Luis".to_string(),
            wallet_id: "wallet-l".to_string(),
            ..Client::default()
        };
        form.reset(Some(replacement.clone()));
        assert_eq!(form.buffer(), &replacement);

        form.reset(None);
        assert_eq!(form.buffer(), &Client::default());
    }

    #[test]
    fn valid_submit_emits_full_copy() {
        let mut form = ClientForm::new(Some(filled_client()));
        form.set_field("commission_percentage", FieldInput::Number(5.0));

        let saved = form.submit().expect("valid client");
        assert_eq!(saved.id, Some(RecordId::new("c1")));
        assert_eq!(saved.wallet_id, "wallet-a");
        assert_eq!(saved.commission_percentage, 5.0);
    }

    #[test]
    fn percentage_out_of_range_is_rejected() {
        let mut form = CommissionRecipientForm::new(Some(CommissionRecipient {
            name: "Ops".to_string(),
            wallet_id: "wallet-o".to_string(),
            percentage: 120.0,
            ..CommissionRecipient::default()
        }));
        assert!(form.submit().is_none());
        assert_eq!(form.error("percentage"), Some("Must be between 0 and 100"));
    }

    #[test]
    fn submit_is_refused_while_loading() {
        let mut form = ClientForm::new(Some(filled_client()));
        form.set_loading(true);
        assert!(form.submit().is_none());
        assert!(form.errors().is_empty());

        form.set_loading(false);
        assert!(form.submit().is_some());
    }

    #[test]
    fn settings_form_checks_schedule_and_time() {
        let mut form = SettingsForm::new(Some(Config::default()));
        assert!(form.submit().is_some());

        assert!(!form.set_field("fixed_mode_schedule", FieldInput::Text("hourly".to_string())));
        assert!(form.set_field("fixed_mode_schedule", FieldInput::Text("monthly".to_string())));
        form.set_field("fixed_mode_time", FieldInput::Text("25:00".to_string()));
        assert!(form.submit().is_none());
        assert!(form.error("fixed_mode_time").is_some());

        form.set_field("fixed_mode_time", FieldInput::Text(String::new()));
        assert!(form.submit().is_none());
        assert_eq!(form.error("fixed_mode_time"), Some("This field is required"));
    }

    #[test]
    fn machine_form_rejects_fractional_amounts() {
        let mut form = MachineForm::new(None);
        assert!(!form.set_field("lnurlpayamount", FieldInput::Number(1.5)));
        assert!(form.set_field("lnurlpayamount", FieldInput::Number(21.0)));
        assert_eq!(form.buffer().lnurlpayamount, 21);

        form.set_field("withdrawlimit", FieldInput::Number(0.0));
        assert_eq!(form.buffer().withdrawlimit, None);
    }
}
