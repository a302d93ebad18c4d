use iced::alignment::Horizontal;
use iced::theme;
use iced::widget::{
    QRCode, Space, button, checkbox, column, container, pick_list, row, scrollable, text,
    text_input,
};
use iced::{Alignment, Color, Element, Length, Padding};
use satmachine_core::transactions::{TRANSACTION_COLUMNS, status_color};
use satmachine_core::{
    Align, Confirmation, EditState, FixedModeSchedule, FormRecord, ItemKey, MACHINE_COLUMNS,
    Machine, RealtimeState, RecordForm, RecordId, TableRow,
};

use super::helpers::{
    field_flag, field_text, format_number, level_color, page_numbers, status_badge_color,
};
use super::styles::{DialogStyle, StatusBadgeStyle, TabStyle, ToastStyle};
use super::types::{DeleteTarget, FormId, Message, ProfileField, RecordKind, RowsPerPage, Tab};
use super::{AdminApp, Session};
use crate::logging::LogLevel;

const TITLE_COLOR: Color = Color::from_rgb(0x12 as f32 / 255.0, 0x12 as f32 / 255.0, 0x12 as f32 / 255.0);
const MUTED_COLOR: Color = Color::from_rgb(0x6a as f32 / 255.0, 0x6a as f32 / 255.0, 0x6a as f32 / 255.0);
const ERROR_COLOR: Color = Color::from_rgb(0xc1 as f32 / 255.0, 0x00 as f32 / 255.0, 0x15 as f32 / 255.0);

fn section_title(label: &str) -> Element<'_, Message> {
    text(label)
        .size(20)
        .style(theme::Text::Color(TITLE_COLOR))
        .into()
}

fn muted(label: impl ToString) -> Element<'static, Message> {
    text(label)
        .size(13)
        .style(theme::Text::Color(MUTED_COLOR))
        .into()
}

fn labeled<'a>(
    label: &'a str,
    input: impl Into<Element<'a, Message>>,
    error: Option<&str>,
) -> Element<'a, Message> {
    let mut field = column![text(label).size(13), input.into()].spacing(4);
    if let Some(error) = error {
        field = field.push(
            text(error)
                .size(12)
                .style(theme::Text::Color(ERROR_COLOR)),
        );
    }
    field.into()
}

fn cell<'a>(value: impl ToString, align: Align, portion: u16) -> Element<'a, Message> {
    let horizontal = match align {
        Align::Left => Horizontal::Left,
        Align::Right => Horizontal::Right,
        Align::Center => Horizontal::Center,
    };
    container(text(value).size(14))
        .width(Length::FillPortion(portion))
        .align_x(horizontal)
        .into()
}

fn small_button(label: &str, message: Option<Message>) -> Element<'_, Message> {
    button(text(label).size(13))
        .padding([4, 8])
        .on_press_maybe(message)
        .into()
}

fn text_field<'a, R: FormRecord>(
    form_id: FormId,
    form: &RecordForm<R>,
    field: &'static str,
    label: &'a str,
) -> Element<'a, Message> {
    let value = field_text(form.buffer(), field);
    let input = text_input(label, &value)
        .on_input(move |value| Message::TextChanged {
            form: form_id,
            field,
            value,
        })
        .padding(6)
        .size(14);
    labeled(label, input, form.error(field))
}

fn flag_field<'a, R: FormRecord>(
    form_id: FormId,
    form: &RecordForm<R>,
    field: &'static str,
    label: &'a str,
) -> Element<'a, Message> {
    checkbox(label, field_flag(form.buffer(), field))
        .on_toggle(move |value| Message::FlagChanged {
            form: form_id,
            field,
            value,
        })
        .into()
}

fn save_label(saving: bool) -> &'static str {
    if saving { "Saving..." } else { "Save" }
}

impl AdminApp {
    fn number_field<'a, R: FormRecord>(
        &self,
        form_id: FormId,
        form: &RecordForm<R>,
        field: &'static str,
        label: &'a str,
    ) -> Element<'a, Message> {
        let value = self
            .number_inputs
            .get(&(form_id, field))
            .cloned()
            .unwrap_or_else(|| field_text(form.buffer(), field));
        let input = text_input("0", &value)
            .on_input(move |value| Message::NumberChanged {
                form: form_id,
                field,
                value,
            })
            .padding(6)
            .size(14);
        labeled(label, input, form.error(field))
    }

    pub(super) fn tab_bar(&self) -> Element<'_, Message> {
        row![
            self.tab_button(Tab::Machines, "Machines"),
            self.tab_button(Tab::Clients, "Clients"),
            self.tab_button(Tab::Recipients, "Commission"),
            self.tab_button(Tab::Transactions, "Transactions"),
            self.tab_button(Tab::Settings, "Settings"),
            self.tab_button(Tab::Connection, "Connection"),
            self.tab_button(Tab::Debug, "Debug"),
        ]
        .spacing(4)
        .align_items(Alignment::Center)
        .into()
    }

    fn tab_button(&self, tab: Tab, label: &str) -> Element<'_, Message> {
        let style = theme::Button::custom(TabStyle {
            active: self.active_tab == tab,
        });

        button(text(label))
            .padding([6, 12])
            .style(style)
            .on_press(Message::SelectTab(tab))
            .into()
    }

    pub(super) fn toasts_view(&self) -> Element<'_, Message> {
        let mut toasts = column![].spacing(6);
        for (index, toast) in self.toasts.iter().enumerate() {
            let mut body = column![text(&toast.notification.message).size(14)].spacing(2);
            if let Some(detail) = &toast.notification.detail {
                body = body.push(text(detail).size(12));
            }
            let line = row![
                body.width(Length::Fill),
                button(text("x").size(12))
                    .padding([2, 6])
                    .style(theme::Button::Text)
                    .on_press(Message::DismissNotification(index)),
            ]
            .spacing(8)
            .align_items(Alignment::Center);
            toasts = toasts.push(
                container(line)
                    .padding(8)
                    .width(Length::Fill)
                    .style(theme::Container::Custom(Box::new(ToastStyle {
                        kind: toast.notification.kind,
                    }))),
            );
        }
        toasts.into()
    }

    pub(super) fn tab_view(&self) -> Element<'_, Message> {
        match (self.active_tab, self.session.as_ref()) {
            (Tab::Connection, _) => self.connection_tab_view(),
            (Tab::Debug, _) => self.debug_tab_view(),
            (_, None) => self.disconnected_view(),
            (Tab::Machines, Some(session)) => self.machines_tab_view(session),
            (Tab::Clients, Some(session)) => self.clients_tab_view(session),
            (Tab::Recipients, Some(session)) => self.recipients_tab_view(session),
            (Tab::Transactions, Some(session)) => self.transactions_tab_view(session),
            (Tab::Settings, Some(session)) => self.settings_tab_view(session),
        }
    }

    fn disconnected_view(&self) -> Element<'_, Message> {
        column![
            section_title("Not connected"),
            muted(
                self.profile_status
                    .clone()
                    .unwrap_or_else(|| "Check the connection profile.".to_string())
            ),
            button("Open connection profile").on_press(Message::SelectTab(Tab::Connection)),
        ]
        .spacing(10)
        .into()
    }

    /// The open dialog, innermost first; it replaces the tab body while open.
    pub(super) fn dialog_view(&self) -> Option<Element<'_, Message>> {
        let session = self.session.as_ref()?;
        let body = if let Some(id) = session.machines.pending_delete() {
            confirm_view(DeleteTarget::Machine, format!("Delete machine {id}?"))
        } else if let Some(id) = session.clients.pending_delete() {
            confirm_view(DeleteTarget::Client, format!("Delete client {id}?"))
        } else if let Some(id) = session.recipients.pending_delete() {
            confirm_view(
                DeleteTarget::Recipient,
                format!("Delete commission recipient {id}?"),
            )
        } else if session.machines.item_form().is_some() {
            self.item_dialog(session)?
        } else if session.machines.form().is_some() {
            self.machine_dialog(session)?
        } else if session.machines.realtime_state() != RealtimeState::Idle {
            self.realtime_dialog(session)
        } else if session.clients.is_dialog_open() {
            self.client_dialog(session)
        } else if session.recipients.is_dialog_open() {
            self.recipient_dialog(session)
        } else {
            return None;
        };

        Some(
            container(body)
                .padding(16)
                .max_width(560)
                .style(theme::Container::Custom(Box::new(DialogStyle)))
                .into(),
        )
    }

    fn machines_tab_view<'a>(&'a self, session: &'a Session) -> Element<'a, Message> {
        let dashboard = &session.machines;
        let reload = (!dashboard.is_loading()).then_some(Message::ReloadMachines);
        let toolbar = row![
            section_title("Machines"),
            Space::with_width(Length::Fill),
            button("Add machine").on_press(Message::OpenCreateMachine),
            button(if dashboard.is_loading() { "Loading..." } else { "Reload" })
                .on_press_maybe(reload),
        ]
        .spacing(8)
        .align_items(Alignment::Center);

        let export = row![
            text_input("machines.csv", &self.export_path)
                .on_input(Message::ExportPathChanged)
                .padding(6)
                .size(13)
                .width(Length::Fixed(260.0)),
            button("Export CSV").on_press(Message::ExportMachines),
            muted(self.export_status.clone().unwrap_or_default()),
        ]
        .spacing(8)
        .align_items(Alignment::Center);

        let mut header = row![].spacing(8);
        for column in MACHINE_COLUMNS {
            header = header.push(cell(column.label, column.align, 2));
        }
        header = header.push(cell("Actions", Align::Center, 5));

        let mut rows = column![header].spacing(6);
        if dashboard.machines().is_empty() && !dashboard.is_loading() {
            rows = rows.push(muted("No machines yet."));
        }
        for machine in dashboard.machines() {
            rows = rows.push(self.machine_row(machine));
            if self.expanded_items.contains(&machine.id) {
                rows = rows.push(self.items_view(machine));
            }
        }

        column![toolbar, export, scrollable(rows).height(Length::Fill)]
            .spacing(12)
            .into()
    }

    fn machine_row<'a>(&'a self, machine: &'a Machine) -> Element<'a, Message> {
        let mut line = row![].spacing(8).align_items(Alignment::Center);
        for column in MACHINE_COLUMNS {
            line = line.push(cell(machine.cell(column.name), column.align, 2));
        }
        let items_label = if self.expanded_items.contains(&machine.id) {
            "Hide items"
        } else {
            "Items"
        };
        let actions = row![
            small_button("Edit", Some(Message::OpenEditMachine(machine.id.clone()))),
            small_button("Refresh", Some(Message::RefreshMachine(machine.id.clone()))),
            small_button(items_label, Some(Message::ToggleItems(machine.id.clone()))),
            small_button("Pay", Some(Message::OpenRealtime(machine.id.clone()))),
            small_button(
                "Delete",
                Some(Message::RequestDeleteMachine(machine.id.clone()))
            ),
        ]
        .spacing(4);
        line.push(container(actions).width(Length::FillPortion(5)))
            .into()
    }

    fn items_view<'a>(&'a self, machine: &'a Machine) -> Element<'a, Message> {
        let mut items = column![].spacing(4);
        for item in machine.items() {
            let price = match &item.currency {
                Some(currency) => format!("{} {currency}", format_number(item.price)),
                None => format_number(item.price),
            };
            let key = ItemKey::new(machine.id.clone(), item.id.clone()).to_string();
            items = items.push(
                row![
                    cell(&item.name, Align::Left, 3),
                    cell(
                        item.description.clone().unwrap_or_default(),
                        Align::Left,
                        4
                    ),
                    cell(price, Align::Right, 2),
                    small_button("Edit", Some(Message::OpenItemForm(key))),
                ]
                .spacing(8)
                .align_items(Alignment::Center),
            );
        }
        if machine.items_map.is_empty() {
            items = items.push(muted("No line items."));
        }
        items = items.push(small_button(
            "Add item",
            Some(Message::OpenItemForm(machine.id.to_string())),
        ));

        container(items)
            .padding(Padding {
                top: 6.0,
                right: 6.0,
                bottom: 6.0,
                left: 24.0,
            })
            .style(theme::Container::Box)
            .into()
    }

    fn machine_dialog<'a>(&'a self, session: &'a Session) -> Option<Element<'a, Message>> {
        let dashboard = &session.machines;
        let form = dashboard.form()?;
        let advanced = dashboard.advanced().unwrap_or_default();
        let state = dashboard.edit_state();
        let saving = matches!(state, EditState::Saving { .. });
        let title = match &state {
            EditState::Editing { existing: Some(id) } | EditState::Saving { existing: Some(id) } => {
                format!("Edit machine {id}")
            }
            _ => "New machine".to_string(),
        };

        let mut fields = column![
            text(title).size(20),
            text_field(FormId::Machine, form, "name", "Name"),
            text_field(FormId::Machine, form, "wallet", "Wallet"),
            self.number_field(
                FormId::Machine,
                form,
                "lnurlwithdrawamount",
                "Withdraw amount (sats)"
            ),
            self.number_field(FormId::Machine, form, "lnurlpayamount", "Pay amount (sats)"),
            checkbox("Tips", advanced.tips).on_toggle(Message::AdvancedTipsToggled),
        ]
        .spacing(10);
        if advanced.tips {
            fields = fields.push(text_field(FormId::Machine, form, "tip_wallet", "Tip wallet"));
        }
        fields = fields.push(checkbox("OTC", advanced.otc).on_toggle(Message::AdvancedOtcToggled));
        if advanced.otc {
            fields = fields.push(self.number_field(
                FormId::Machine,
                form,
                "withdrawlimit",
                "Withdraw limit (sats)",
            ));
        }
        fields = fields.push(dialog_buttons(
            Message::CloseMachineForm,
            (!saving).then_some(Message::SubmitMachine),
            save_label(saving),
        ));
        Some(fields.into())
    }

    fn item_dialog<'a>(&'a self, session: &'a Session) -> Option<Element<'a, Message>> {
        let form = session.machines.item_form()?;
        let draft = form.buffer();
        let title = if draft.item.id.is_empty() {
            format!("New item for {}", draft.machine)
        } else {
            format!("Edit item {}", draft.item.id)
        };
        let saving = form.is_loading();

        Some(
            column![
                text(title).size(20),
                text_field(FormId::Item, form, "name", "Name"),
                text_field(FormId::Item, form, "description", "Description"),
                self.number_field(FormId::Item, form, "price", "Price"),
                muted(format!(
                    "Currency: {}",
                    draft.item.currency.as_deref().unwrap_or("sat")
                )),
                dialog_buttons(
                    Message::CloseItemForm,
                    (!saving).then_some(Message::SubmitItem),
                    save_label(saving),
                ),
            ]
            .spacing(10)
            .into(),
        )
    }

    fn realtime_dialog<'a>(&'a self, session: &'a Session) -> Element<'a, Message> {
        let dashboard = &session.machines;
        let (machine_id, status) = match dashboard.realtime_state() {
            RealtimeState::Awaiting { machine } => (machine, "Waiting for payment..."),
            RealtimeState::Unsubscribed { machine } => (
                machine,
                "Live updates stopped. Close and reopen to listen again.",
            ),
            RealtimeState::Idle => return column![].into(),
        };
        let name = dashboard
            .machine(&machine_id)
            .map(|machine| machine.name.clone())
            .unwrap_or_else(|| machine_id.to_string());

        let mut body = column![text(name).size(20), muted(status)]
            .spacing(10)
            .align_items(Alignment::Center);

        match (&self.qr, dashboard.qr_value()) {
            (Some(qr), _) => {
                body = body.push(QRCode::new(&qr.data).cell_size(5));
                body = body.push(muted(qr.source.clone()));
            }
            (None, Some(value)) => body = body.push(muted(value.to_string())),
            (None, None) => body = body.push(muted("This machine has no payment link.")),
        }

        let creating = dashboard.is_creating_invoice();
        let create = (!creating && dashboard.invoice_amount() > 0)
            .then(|| Message::CreateInvoice(machine_id.clone()));
        body = body.push(
            row![
                text_input("Amount (sats)", &self.invoice_amount_text)
                    .on_input(Message::InvoiceAmountChanged)
                    .padding(6)
                    .size(14)
                    .width(Length::Fixed(160.0)),
                button(if creating { "Creating..." } else { "Create invoice" })
                    .on_press_maybe(create),
            ]
            .spacing(8)
            .align_items(Alignment::Center),
        );
        if let Some(invoice) = dashboard.invoice() {
            body = body.push(small_button(
                "Copy payment request",
                Some(Message::CopyText(invoice.payment_request.clone())),
            ));
        }
        body = body.push(button("Close").on_press(Message::CloseRealtime));
        body.into()
    }

    fn clients_tab_view<'a>(&'a self, session: &'a Session) -> Element<'a, Message> {
        let book = &session.clients;
        let mut rows = column![row![
            cell("Name", Align::Left, 3),
            cell("Wallet", Align::Left, 3),
            cell("DCA %", Align::Right, 2),
            cell("Commission %", Align::Right, 2),
            cell("Active", Align::Center, 1),
            cell("Actions", Align::Center, 3),
        ]
        .spacing(8)]
        .spacing(6);

        for client in book.records() {
            let actions = record_actions(RecordKind::Client, client.id.as_ref());
            rows = rows.push(
                row![
                    cell(&client.name, Align::Left, 3),
                    cell(&client.wallet_id, Align::Left, 3),
                    cell(format_number(client.dca_percentage), Align::Right, 2),
                    cell(format_number(client.commission_percentage), Align::Right, 2),
                    cell(yes_no(client.active), Align::Center, 1),
                    container(actions).width(Length::FillPortion(3)),
                ]
                .spacing(8)
                .align_items(Alignment::Center),
            );
        }

        column![
            record_toolbar("Clients", "Add client", RecordKind::Client, book.is_loading()),
            scrollable(rows).height(Length::Fill),
        ]
        .spacing(12)
        .into()
    }

    fn recipients_tab_view<'a>(&'a self, session: &'a Session) -> Element<'a, Message> {
        let book = &session.recipients;
        let mut rows = column![row![
            cell("Name", Align::Left, 3),
            cell("Wallet", Align::Left, 3),
            cell("Percentage", Align::Right, 2),
            cell("Active", Align::Center, 1),
            cell("Actions", Align::Center, 3),
        ]
        .spacing(8)]
        .spacing(6);

        for recipient in book.records() {
            let actions = record_actions(RecordKind::Recipient, recipient.id.as_ref());
            rows = rows.push(
                row![
                    cell(&recipient.name, Align::Left, 3),
                    cell(&recipient.wallet_id, Align::Left, 3),
                    cell(format_number(recipient.percentage), Align::Right, 2),
                    cell(yes_no(recipient.active), Align::Center, 1),
                    container(actions).width(Length::FillPortion(3)),
                ]
                .spacing(8)
                .align_items(Alignment::Center),
            );
        }

        column![
            record_toolbar(
                "Commission recipients",
                "Add recipient",
                RecordKind::Recipient,
                book.is_loading()
            ),
            scrollable(rows).height(Length::Fill),
        ]
        .spacing(12)
        .into()
    }

    fn client_dialog<'a>(&'a self, session: &'a Session) -> Element<'a, Message> {
        let form = session.clients.form();
        let title = match &form.buffer().id {
            Some(id) => format!("Edit client {id}"),
            None => "New client".to_string(),
        };
        let saving = form.is_loading();
        column![
            text(title).size(20),
            text_field(FormId::Client, form, "name", "Name"),
            text_field(FormId::Client, form, "wallet_id", "Wallet ID"),
            self.number_field(FormId::Client, form, "dca_percentage", "DCA percentage"),
            self.number_field(
                FormId::Client,
                form,
                "commission_percentage",
                "Commission percentage"
            ),
            flag_field(FormId::Client, form, "active", "Active"),
            dialog_buttons(
                Message::CloseRecord(RecordKind::Client),
                (!saving).then_some(Message::SubmitRecord(RecordKind::Client)),
                save_label(saving),
            ),
        ]
        .spacing(10)
        .into()
    }

    fn recipient_dialog<'a>(&'a self, session: &'a Session) -> Element<'a, Message> {
        let form = session.recipients.form();
        let title = match &form.buffer().id {
            Some(id) => format!("Edit commission recipient {id}"),
            None => "New commission recipient".to_string(),
        };
        let saving = form.is_loading();
        column![
            text(title).size(20),
            text_field(FormId::Recipient, form, "name", "Name"),
            text_field(FormId::Recipient, form, "wallet_id", "Wallet ID"),
            self.number_field(FormId::Recipient, form, "percentage", "Percentage"),
            flag_field(FormId::Recipient, form, "active", "Active"),
            dialog_buttons(
                Message::CloseRecord(RecordKind::Recipient),
                (!saving).then_some(Message::SubmitRecord(RecordKind::Recipient)),
                save_label(saving),
            ),
        ]
        .spacing(10)
        .into()
    }

    fn transactions_tab_view<'a>(&'a self, session: &'a Session) -> Element<'a, Message> {
        let view = &session.transactions;
        let table = view.table();
        let pagination = table.pagination();
        let reload = (!view.is_loading()).then_some(Message::ReloadTransactions);

        let toolbar = row![
            section_title("Transactions"),
            Space::with_width(Length::Fill),
            button(if view.is_loading() { "Loading..." } else { "Reload" })
                .on_press_maybe(reload),
        ]
        .spacing(8)
        .align_items(Alignment::Center);

        let mut header = row![].spacing(8).align_items(Alignment::Center);
        for column in TRANSACTION_COLUMNS {
            if column.name == "actions" {
                header = header.push(cell(column.label, column.align, 2));
                continue;
            }
            let marker = match (pagination.sort_by == column.name, pagination.descending) {
                (true, true) => " v",
                (true, false) => " ^",
                (false, _) => "",
            };
            header = header.push(
                button(text(format!("{}{marker}", column.label)).size(14))
                    .padding(0)
                    .style(theme::Button::Text)
                    .on_press(Message::SortTransactions(column.name))
                    .width(Length::FillPortion(2)),
            );
        }

        let mut rows = column![header].spacing(6);
        if table.rows().is_empty() && !view.is_loading() {
            rows = rows.push(muted("No transactions."));
        }
        for transaction in table.visible_rows() {
            let mut line = row![].spacing(8).align_items(Alignment::Center);
            for column in TRANSACTION_COLUMNS {
                let content: Element<'_, Message> = match column.name {
                    "status" => container(
                        container(text(transaction.status.as_str()).size(12))
                            .padding([2, 8])
                            .style(theme::Container::Custom(Box::new(StatusBadgeStyle {
                                color: status_badge_color(status_color(transaction.status)),
                            }))),
                    )
                    .width(Length::FillPortion(2))
                    .center_x()
                    .into(),
                    "actions" => container(small_button(
                        "Copy ID",
                        Some(Message::CopyText(transaction.id.clone())),
                    ))
                    .width(Length::FillPortion(2))
                    .center_x()
                    .into(),
                    name => cell(transaction.cell(name), column.align, 2),
                };
                line = line.push(content);
            }
            rows = rows.push(line);
        }

        column![
            toolbar,
            scrollable(rows).height(Length::Fill),
            self.pagination_view(session),
        ]
        .spacing(12)
        .into()
    }

    fn pagination_view<'a>(&'a self, session: &'a Session) -> Element<'a, Message> {
        let table = session.transactions.table();
        let pagination = table.pagination();
        let count = table.page_count();

        let mut pages = row![small_button(
            "<",
            (pagination.page > 1).then(|| Message::TransactionsPage(pagination.page - 1)),
        )]
        .spacing(4)
        .align_items(Alignment::Center);
        for page in page_numbers(pagination.page, count) {
            let entry: Element<'_, Message> = match page {
                Some(page) if page == pagination.page => button(text(page).size(13))
                    .padding([4, 8])
                    .style(theme::Button::Primary)
                    .into(),
                Some(page) => page_button(page),
                None => muted("..."),
            };
            pages = pages.push(entry);
        }
        pages = pages.push(small_button(
            ">",
            (pagination.page < count).then(|| Message::TransactionsPage(pagination.page + 1)),
        ));

        row![
            pages,
            Space::with_width(Length::Fill),
            muted(format!("{} transactions", table.rows().len())),
            text("Rows per page").size(13),
            pick_list(
                &RowsPerPage::ALL[..],
                Some(RowsPerPage(pagination.rows_per_page)),
                Message::RowsPerPageSelected,
            ),
        ]
        .spacing(8)
        .align_items(Alignment::Center)
        .into()
    }

    fn settings_tab_view<'a>(&'a self, session: &'a Session) -> Element<'a, Message> {
        let settings = &session.settings;
        if settings.config().is_none() && settings.is_fetching() {
            return column![section_title("Settings"), muted("Loading configuration...")]
                .spacing(12)
                .into();
        }

        let form = settings.form();
        let saving = settings.is_saving();
        let testing = settings.is_testing();
        let schedule = form.buffer().fixed_mode_schedule;

        let config = column![
            section_title("DCA configuration"),
            flag_field(
                FormId::Settings,
                form,
                "processing_enabled",
                "Processing enabled"
            ),
            text_field(
                FormId::Settings,
                form,
                "lamassu_server_ip",
                "Lamassu server address"
            ),
            labeled(
                "Fixed mode schedule",
                pick_list(
                    &FixedModeSchedule::ALL[..],
                    Some(schedule),
                    Message::ScheduleSelected,
                ),
                form.error("fixed_mode_schedule"),
            ),
            text_field(FormId::Settings, form, "fixed_mode_time", "Fixed mode time (HH:MM)"),
            self.number_field(
                FormId::Settings,
                form,
                "max_daily_fixed_amount",
                "Max daily fixed amount"
            ),
            row![
                button(save_label(saving))
                    .on_press_maybe((!saving).then_some(Message::SubmitSettings)),
                button("Reload").on_press_maybe(
                    (!settings.is_fetching()).then_some(Message::ReloadSettings)
                ),
            ]
            .spacing(8),
        ]
        .spacing(10)
        .width(Length::FillPortion(2));

        let probe = column![
            section_title("Test connection"),
            muted("Probes an address without changing the saved configuration."),
            text_input("192.168.1.20", &self.connection_address)
                .on_input(Message::ConnectionAddressChanged)
                .padding(6)
                .size(14),
            button(if testing { "Testing..." } else { "Test connection" })
                .on_press_maybe((!testing).then_some(Message::TestConnection)),
        ]
        .spacing(10);

        row![
            config,
            container(probe)
                .padding(12)
                .width(Length::FillPortion(1))
                .style(theme::Container::Box),
        ]
        .spacing(16)
        .align_items(Alignment::Start)
        .into()
    }

    fn connection_tab_view(&self) -> Element<'_, Message> {
        let inputs = &self.profile_inputs;
        let profile_input = |label: &'static str, value: &str, field: ProfileField, secure: bool| {
            labeled(
                label,
                text_input(label, value)
                    .on_input(move |value| Message::ProfileFieldChanged(field, value))
                    .secure(secure)
                    .padding(6)
                    .size(14),
                None,
            )
        };

        let connected = if self.session.is_some() {
            "Connected"
        } else {
            "Not connected"
        };

        column![
            section_title("Connection profile"),
            muted(format!("{connected} | {}", self.profile_path.display())),
            profile_input("Server URL", &inputs.server_url, ProfileField::ServerUrl, false),
            profile_input("Wallet ID", &inputs.wallet_id, ProfileField::WalletId, false),
            profile_input("Invoice key", &inputs.invoice_key, ProfileField::InvoiceKey, true),
            profile_input("Admin key", &inputs.admin_key, ProfileField::AdminKey, true),
            profile_input(
                "Request timeout (s)",
                &inputs.timeout_secs,
                ProfileField::TimeoutSecs,
                false
            ),
            profile_input(
                "Reconnect attempts",
                &inputs.reconnect_attempts,
                ProfileField::ReconnectAttempts,
                false
            ),
            profile_input(
                "Reconnect delay (ms)",
                &inputs.reconnect_delay_ms,
                ProfileField::ReconnectDelayMs,
                false
            ),
            row![
                button("Save profile").on_press(Message::SaveProfile),
                button("Apply without saving").on_press(Message::ApplyProfile),
            ]
            .spacing(8),
            muted(self.profile_status.clone().unwrap_or_default()),
        ]
        .spacing(10)
        .max_width(640)
        .into()
    }

    fn debug_tab_view(&self) -> Element<'_, Message> {
        let level_picker = pick_list(
            &LogLevel::ALL[..],
            Some(self.log_level),
            Message::LogLevelChanged,
        )
        .placeholder("Log level");

        let console_header = row![section_title("Console"), level_picker]
            .spacing(12)
            .align_items(Alignment::Center);

        let console = column![
            console_header,
            self.target_filters_view(),
            self.log_lines_view()
        ]
        .spacing(12)
        .width(Length::FillPortion(2));

        row![console, self.debug_panel_view()]
            .spacing(16)
            .align_items(Alignment::Start)
            .into()
    }

    fn target_filters_view(&self) -> Element<'_, Message> {
        let mut filter_row = row![text("Targets").size(14)]
            .spacing(10)
            .align_items(Alignment::Center);

        for target in self.sorted_targets() {
            let enabled = self.enabled_targets.contains(&target);
            filter_row = filter_row.push(
                checkbox(target.clone(), enabled)
                    .on_toggle(move |value| Message::ToggleTarget(target.clone(), value)),
            );
        }

        container(filter_row)
            .padding(8)
            .style(theme::Container::Box)
            .into()
    }

    fn log_lines_view(&self) -> Element<'_, Message> {
        let mut lines = column![].spacing(4);

        for entry in self.visible_entries() {
            let line = text(entry.format_line())
                .size(14)
                .horizontal_alignment(Horizontal::Left)
                .style(theme::Text::Color(level_color(entry.level)));
            lines = lines.push(line);
        }

        scrollable(lines)
            .height(Length::Fill)
            .width(Length::Fill)
            .into()
    }

    fn debug_panel_view(&self) -> Element<'_, Message> {
        let copy_status = self.copy_status.as_deref().unwrap_or("Ready");
        let (machines, realtime) = match &self.session {
            Some(session) => (
                session.machines.machines().len().to_string(),
                format!("{:?}", session.machines.realtime_state()),
            ),
            None => ("-".to_string(), "-".to_string()),
        };
        let panel = column![
            section_title("Debug panel"),
            muted(format!("Server: {}", self.profile.server_url)),
            muted(format!("Machines loaded: {machines}")),
            muted(format!("Realtime: {realtime}")),
            muted(format!("Log entries: {}", self.log_entries.len())),
            button("Copy diagnostics").on_press(Message::CopyDiagnostics),
            button("Clear logs").on_press(Message::ClearLogs),
            muted(format!("Clipboard: {copy_status}")),
        ]
        .spacing(10);

        container(panel)
            .padding(12)
            .width(Length::FillPortion(1))
            .style(theme::Container::Box)
            .into()
    }
}

fn page_button(page: usize) -> Element<'static, Message> {
    button(text(page).size(13))
        .padding([4, 8])
        .on_press(Message::TransactionsPage(page))
        .into()
}

fn yes_no(value: bool) -> &'static str {
    if value { "Yes" } else { "No" }
}

fn confirm_view(target: DeleteTarget, prompt: String) -> Element<'static, Message> {
    column![
        text(prompt).size(18),
        row![
            button("Cancel").on_press(Message::ResolveDelete(target, Confirmation::Declined)),
            button("Delete")
                .style(theme::Button::Destructive)
                .on_press(Message::ResolveDelete(target, Confirmation::Accepted)),
        ]
        .spacing(8),
    ]
    .spacing(12)
    .into()
}

fn dialog_buttons(
    cancel: Message,
    save: Option<Message>,
    save_label: &'static str,
) -> Element<'static, Message> {
    row![
        button("Cancel").on_press(cancel),
        button(save_label).on_press_maybe(save),
    ]
    .spacing(8)
    .into()
}

fn record_toolbar(
    title: &'static str,
    add_label: &'static str,
    kind: RecordKind,
    loading: bool,
) -> Element<'static, Message> {
    row![
        section_title(title),
        Space::with_width(Length::Fill),
        button(add_label).on_press(Message::OpenRecord(kind, None)),
        button(if loading { "Loading..." } else { "Reload" })
            .on_press_maybe((!loading).then_some(Message::ReloadRecords(kind))),
    ]
    .spacing(8)
    .align_items(Alignment::Center)
    .into()
}

fn record_actions(
    kind: RecordKind,
    id: Option<&RecordId>,
) -> Element<'static, Message> {
    match id {
        Some(id) => row![
            small_button("Edit", Some(Message::OpenRecord(kind, Some(id.clone())))),
            small_button("Delete", Some(Message::RequestDeleteRecord(kind, id.clone()))),
        ]
        .spacing(4)
        .into(),
        None => muted("unsaved"),
    }
}
