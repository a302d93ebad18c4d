use iced::Color;
use iced::keyboard;
use satmachine_core::transactions::StatusColor;
use satmachine_core::{FieldValue, Validate};

use crate::app::types::Message;

pub(crate) fn level_color(level: tracing::Level) -> Color {
    match level {
        tracing::Level::ERROR => Color::from_rgb8(0xe0, 0x4f, 0x4f),
        tracing::Level::WARN => Color::from_rgb8(0xe0, 0xb0, 0x4f),
        tracing::Level::INFO => Color::from_rgb8(0x3b, 0x82, 0xf6),
        tracing::Level::DEBUG => Color::from_rgb8(0x22, 0x7d, 0x64),
        tracing::Level::TRACE => Color::from_rgb8(0x6b, 0x72, 0x80),
    }
}

pub(crate) fn status_badge_color(color: StatusColor) -> Color {
    match color {
        StatusColor::Warning => Color::from_rgb8(0xf2, 0xc0, 0x37),
        StatusColor::Positive => Color::from_rgb8(0x21, 0xba, 0x45),
        StatusColor::Negative => Color::from_rgb8(0xc1, 0x00, 0x15),
        StatusColor::Grey => Color::from_rgb8(0x9e, 0x9e, 0x9e),
    }
}

pub(crate) fn escape_key_event(
    key: keyboard::Key,
    _modifiers: keyboard::Modifiers,
) -> Option<Message> {
    match key {
        keyboard::Key::Named(keyboard::key::Named::Escape) => Some(Message::CloseDialogs),
        _ => None,
    }
}

/// Current text of a form field, as an input box shows it.
pub(crate) fn field_text(record: &impl Validate, field: &str) -> String {
    match record.field(field) {
        Some(FieldValue::Text(value)) => value.to_string(),
        Some(FieldValue::Number(value)) => format_number(value),
        Some(FieldValue::Flag(_)) | None => String::new(),
    }
}

pub(crate) fn field_flag(record: &impl Validate, field: &str) -> bool {
    matches!(record.field(field), Some(FieldValue::Flag(true)))
}

/// Whole numbers without a trailing `.0`.
pub(crate) fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// `1..=count` page numbers, with `None` standing in for skipped runs.
pub(crate) fn page_numbers(current: usize, count: usize) -> Vec<Option<usize>> {
    const WINDOW: usize = 2;
    let mut pages = Vec::new();
    for page in 1..=count {
        let near = page.abs_diff(current) <= WINDOW;
        if page == 1 || page == count || near {
            pages.push(Some(page));
        } else if pages.last() != Some(&None) {
            pages.push(None);
        }
    }
    pages
}

#[cfg(test)]
mod tests {
    use super::*;
    use satmachine_core::Client;

    #[test]
    fn numbers_render_without_trailing_zero() {
        assert_eq!(format_number(21.0), "21");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(-4.0), "-4");
    }

    #[test]
    fn field_text_reads_through_validate() {
        let client = Client {
            name: "Ana".to_string(),
            dca_percentage: 40.0,
            ..Client::default()
        };
        assert_eq!(field_text(&client, "name"), "Ana");
        assert_eq!(field_text(&client, "dca_percentage"), "40");
        assert_eq!(field_text(&client, "unknown"), "");
        assert!(field_flag(&client, "active"));
    }

    #[test]
    fn page_numbers_collapse_distant_pages() {
        assert_eq!(page_numbers(1, 3), vec![Some(1), Some(2), Some(3)]);
        assert_eq!(
            page_numbers(5, 10),
            vec![
                Some(1),
                None,
                Some(3),
                Some(4),
                Some(5),
                Some(6),
                Some(7),
                None,
                Some(10)
            ]
        );
    }
}
