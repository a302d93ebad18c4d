pub mod app;
pub mod logging;

use iced::Application;

pub use app::{AdminApp, Flags};
pub use logging::{
    DEFAULT_LOG_CAPACITY, LogEntry, LogLevel, LogStore, ReloadHandle, apply_log_level,
    init_logging,
};

pub type UiResult = iced::Result;

pub fn run(flags: Flags) -> UiResult {
    AdminApp::run(iced::Settings::with_flags(flags))
}
