use iced::{Background, Border, Color, Theme, Vector};

use satmachine_core::NotificationKind;

#[derive(Debug, Clone, Copy)]
pub(crate) struct TabStyle {
    pub(crate) active: bool,
}

impl iced::widget::button::StyleSheet for TabStyle {
    type Style = Theme;

    fn active(&self, style: &Self::Style) -> iced::widget::button::Appearance {
        let palette = style.extended_palette();
        let (background, text_color) = if self.active {
            (palette.background.base.color, palette.background.base.text)
        } else {
            (palette.background.weak.color, palette.background.weak.text)
        };

        iced::widget::button::Appearance {
            background: Some(Background::Color(background)),
            text_color,
            border: Border {
                color: palette.background.strong.color,
                width: 1.0,
                radius: [8.0, 8.0, 0.0, 0.0].into(),
            },
            shadow_offset: if self.active {
                Vector::new(0.0, 0.0)
            } else {
                Vector::new(0.0, 1.0)
            },
            ..iced::widget::button::Appearance::default()
        }
    }

    fn hovered(&self, style: &Self::Style) -> iced::widget::button::Appearance {
        let mut appearance = self.active(style);
        if !self.active {
            if let Some(Background::Color(color)) = appearance.background {
                appearance.background = Some(Background::Color(lift(color, 0.05)));
            }
        }
        appearance
    }
}

/// Pill behind a transaction status.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StatusBadgeStyle {
    pub(crate) color: Color,
}

impl iced::widget::container::StyleSheet for StatusBadgeStyle {
    type Style = Theme;

    fn appearance(&self, _style: &Self::Style) -> iced::widget::container::Appearance {
        iced::widget::container::Appearance {
            text_color: Some(Color::WHITE),
            background: Some(Background::Color(self.color)),
            border: Border {
                color: Color::TRANSPARENT,
                width: 0.0,
                radius: 999.0.into(),
            },
            ..iced::widget::container::Appearance::default()
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ToastStyle {
    pub(crate) kind: NotificationKind,
}

impl iced::widget::container::StyleSheet for ToastStyle {
    type Style = Theme;

    fn appearance(&self, _style: &Self::Style) -> iced::widget::container::Appearance {
        let background = match self.kind {
            NotificationKind::Positive => Color::from_rgb8(0x21, 0xba, 0x45),
            NotificationKind::Negative => Color::from_rgb8(0xc1, 0x00, 0x15),
        };
        iced::widget::container::Appearance {
            text_color: Some(Color::WHITE),
            background: Some(Background::Color(background)),
            border: Border {
                color: Color::TRANSPARENT,
                width: 0.0,
                radius: 6.0.into(),
            },
            ..iced::widget::container::Appearance::default()
        }
    }
}

/// Card framing an open dialog.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DialogStyle;

impl iced::widget::container::StyleSheet for DialogStyle {
    type Style = Theme;

    fn appearance(&self, style: &Self::Style) -> iced::widget::container::Appearance {
        let palette = style.extended_palette();
        iced::widget::container::Appearance {
            text_color: None,
            background: Some(Background::Color(palette.background.weak.color)),
            border: Border {
                color: palette.primary.base.color,
                width: 1.5,
                radius: 8.0.into(),
            },
            ..iced::widget::container::Appearance::default()
        }
    }
}

fn lift(color: Color, amount: f32) -> Color {
    Color {
        r: (color.r + amount).min(1.0),
        g: (color.g + amount).min(1.0),
        b: (color.b + amount).min(1.0),
        a: color.a,
    }
}
