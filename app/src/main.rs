use tracing::Level;

use satmachine_core::{AdminProfile, profile_path, targets};
use satmachine_ui::logging::{DEFAULT_LOG_CAPACITY, LogLevel, LogStore, init_logging};
use satmachine_ui::{Flags, UiResult, run};

fn main() -> UiResult {
    let profile_path = profile_path();
    let (profile, profile_status) = match AdminProfile::load_optional(&profile_path) {
        Ok(Some(profile)) => (profile, None),
        Ok(None) => (
            AdminProfile::default(),
            Some(format!(
                "No profile at {}; using defaults.",
                profile_path.display()
            )),
        ),
        Err(error) => (
            AdminProfile::default(),
            Some(format!("Profile not loaded: {}", error.technical_detail())),
        ),
    };

    let log_level = match profile.log_level.as_deref().map(str::parse::<LogLevel>) {
        Some(Ok(level)) => level,
        Some(Err(_)) | None => LogLevel::default(),
    };

    let log_store = LogStore::new(DEFAULT_LOG_CAPACITY);
    let reload_handle = init_logging(log_store.clone(), log_level);

    tracing::info!(target: targets::UI, "SatoshiMachine admin starting");
    tracing::info!(
        target: targets::STORAGE,
        path = %profile_path.display(),
        "Profile location"
    );
    if let Some(status) = &profile_status {
        tracing::warn!(target: targets::STORAGE, "{}", status);
    }
    tracing::event!(target: targets::UI, Level::DEBUG, "Logging infrastructure online");

    run(Flags {
        log_store,
        reload_handle,
        log_level,
        profile,
        profile_path,
        profile_status,
    })
}
