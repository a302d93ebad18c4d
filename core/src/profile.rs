use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ron::ser::{PrettyConfig, to_string_pretty};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::AdminApi;
use crate::error::{Error, StorageAction};
use crate::http::HttpTransport;
use crate::model::Credential;
use crate::realtime::{PaymentNotifier, ReconnectPolicy, WebSocketNotifier};
use crate::targets;

pub const PROFILE_ENV: &str = "SATMACHINE_PROFILE";
pub const DEFAULT_PROFILE_PATH: &str = "admin_profile.ron";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// The wallet whose keys sign API calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletKeys {
    pub id: String,
    pub invoice_key: String,
    pub admin_key: String,
}

impl WalletKeys {
    /// The configured key for `credential`, if non-empty.
    pub fn key_for(&self, credential: Credential) -> Option<&str> {
        let key = match credential {
            Credential::Read => self.invoice_key.trim(),
            Credential::Write => self.admin_key.trim(),
        };
        (!key.is_empty()).then_some(key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeSettings {
    pub reconnect_attempts: u32,
    pub reconnect_delay_ms: u64,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        let policy = ReconnectPolicy::default();
        Self {
            reconnect_attempts: policy.max_attempts,
            reconnect_delay_ms: policy.delay.as_millis() as u64,
        }
    }
}

impl RealtimeSettings {
    pub fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: self.reconnect_attempts,
            delay: Duration::from_millis(self.reconnect_delay_ms),
        }
    }
}

/// Connection profile persisted as RON next to the binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminProfile {
    pub server_url: String,
    pub wallet: WalletKeys,
    pub request_timeout_secs: u64,
    pub realtime: RealtimeSettings,
    pub log_level: Option<String>,
}

impl Default for AdminProfile {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:5000".to_string(),
            wallet: WalletKeys::default(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            realtime: RealtimeSettings::default(),
            log_level: None,
        }
    }
}

/// Profile location: `$SATMACHINE_PROFILE` or `admin_profile.ron`.
pub fn profile_path() -> PathBuf {
    std::env::var_os(PROFILE_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PROFILE_PATH))
}

impl AdminProfile {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path).map_err(|source| Error::StorageIo {
            action: StorageAction::Load,
            path: Some(path.display().to_string()),
            source,
        })?;
        ron::de::from_str(&contents).map_err(|error| Error::Ron {
            action: StorageAction::Load,
            path: Some(path.display().to_string()),
            source: error.code,
        })
    }

    /// Like [`AdminProfile::load`], but a missing file is `Ok(None)`.
    pub fn load_optional(path: &Path) -> Result<Option<Self>, Error> {
        match Self::load(path) {
            Ok(profile) => Ok(Some(profile)),
            Err(Error::StorageIo { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let contents =
            to_string_pretty(self, PrettyConfig::new()).map_err(|source| Error::Ron {
                action: StorageAction::Save,
                path: Some(path.display().to_string()),
                source,
            })?;
        fs::write(path, contents).map_err(|source| Error::StorageIo {
            action: StorageAction::Save,
            path: Some(path.display().to_string()),
            source,
        })?;
        info!(target: targets::STORAGE, path = %path.display(), "Profile saved");
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn build_api(&self) -> Result<AdminApi, Error> {
        let transport =
            HttpTransport::new(&self.server_url, self.wallet.clone(), self.request_timeout())?;
        Ok(AdminApi::new(transport))
    }

    pub fn build_notifier(&self) -> Result<Arc<dyn PaymentNotifier>, Error> {
        let notifier = WebSocketNotifier::new(&self.server_url, self.realtime.policy())?;
        Ok(Arc::new(notifier))
    }
}
