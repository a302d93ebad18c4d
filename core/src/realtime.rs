use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use futures::future::{AbortHandle, Abortable};
use tokio::sync::oneshot;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::Error;
use crate::http::base_url;
use crate::targets;

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// How many times a dropped payment channel is re-opened. Zero keeps the
/// channel single-shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

/// `ws(s)://<host>/api/v1/ws/<subscription>`, secure unless the server is plain http.
pub fn socket_url(server: &Url, subscription_id: &str) -> Result<Url, Error> {
    let scheme = if server.scheme() == "http" { "ws" } else { "wss" };
    let host = server.host_str().ok_or_else(|| Error::Realtime {
        subscription: subscription_id.to_string(),
        details: format!("server URL '{server}' has no host"),
    })?;
    let port = server
        .port()
        .map(|port| format!(":{port}"))
        .unwrap_or_default();
    let value = format!("{scheme}://{host}{port}/api/v1/ws/{subscription_id}");
    Url::parse(&value).map_err(|source| Error::InvalidUrl { value, source })
}

/// Opens payment subscriptions keyed by machine id.
pub trait PaymentNotifier: Send + Sync {
    fn watch(&self, subscription_id: &str) -> Result<PaymentWatch, Error>;
}

/// An open subscription: the guard owns it, the signal reports the payment.
pub struct PaymentWatch {
    pub guard: WatchGuard,
    pub signal: PaymentSignal,
}

impl fmt::Debug for PaymentWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentWatch")
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}

/// Releases its subscription when dropped.
pub struct WatchGuard {
    subscription: String,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl WatchGuard {
    pub fn new(subscription: impl Into<String>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            subscription: subscription.into(),
            release: Some(Box::new(release)),
        }
    }

    pub fn subscription(&self) -> &str {
        &self.subscription
    }
}

impl fmt::Debug for WatchGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchGuard")
            .field("subscription", &self.subscription)
            .finish()
    }
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            debug!(target: targets::REALTIME, subscription = %self.subscription, "Releasing subscription");
            release();
        }
    }
}

/// Resolves `true` on the first payment message, `false` if the channel
/// ends or is released first.
pub struct PaymentSignal {
    future: Pin<Box<dyn Future<Output = bool> + Send>>,
}

impl PaymentSignal {
    pub fn new(future: impl Future<Output = bool> + Send + 'static) -> Self {
        Self {
            future: Box::pin(future),
        }
    }

    pub async fn observed(self) -> bool {
        self.future.await
    }
}

#[derive(Debug, Clone)]
pub struct WebSocketNotifier {
    server: Url,
    policy: ReconnectPolicy,
}

impl WebSocketNotifier {
    pub fn new(server_url: &str, policy: ReconnectPolicy) -> Result<Self, Error> {
        Ok(Self {
            server: base_url(server_url)?,
            policy,
        })
    }
}

impl PaymentNotifier for WebSocketNotifier {
    fn watch(&self, subscription_id: &str) -> Result<PaymentWatch, Error> {
        let url = socket_url(&self.server, subscription_id)?;
        let (handle, registration) = AbortHandle::new_pair();
        let listener = Abortable::new(
            listen(url, subscription_id.to_string(), self.policy),
            registration,
        );
        Ok(PaymentWatch {
            guard: WatchGuard::new(subscription_id, move || handle.abort()),
            signal: PaymentSignal::new(async move { listener.await.unwrap_or(false) }),
        })
    }
}

async fn listen(url: Url, subscription: String, policy: ReconnectPolicy) -> bool {
    let mut attempt = 0;
    loop {
        match connect_async(url.as_str()).await {
            Ok((mut stream, _)) => {
                info!(target: targets::REALTIME, subscription = %subscription, "Payment channel open");
                while let Some(message) = stream.next().await {
                    match message {
                        Ok(Message::Text(_)) | Ok(Message::Binary(_)) => {
                            info!(target: targets::REALTIME, subscription = %subscription, "Payment received");
                            return true;
                        }
                        Ok(Message::Close(_)) => break,
                        Ok(_) => {}
                        Err(error) => {
                            warn!(target: targets::REALTIME, subscription = %subscription, error = %error, "Payment channel error");
                            break;
                        }
                    }
                }
            }
            Err(error) => {
                warn!(target: targets::REALTIME, subscription = %subscription, error = %error, "Payment channel connect failed");
            }
        }

        if attempt >= policy.max_attempts {
            warn!(target: targets::REALTIME, subscription = %subscription, attempts = attempt, "Payment channel closed");
            return false;
        }
        attempt += 1;
        tokio::time::sleep(policy.delay).await;
    }
}

/// In-process notifier; payments are triggered by hand.
#[derive(Debug, Clone, Default)]
pub struct ManualPaymentNotifier {
    inner: Arc<Mutex<ManualState>>,
}

#[derive(Debug, Default)]
struct ManualState {
    next_token: u64,
    senders: HashMap<String, (u64, oneshot::Sender<()>)>,
}

impl ManualPaymentNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers a payment to the open subscription, if any.
    pub fn trigger(&self, subscription_id: &str) -> bool {
        let sender = match self.inner.lock() {
            Ok(mut state) => state.senders.remove(subscription_id),
            Err(_) => None,
        };
        match sender {
            Some((_, sender)) => sender.send(()).is_ok(),
            None => false,
        }
    }

    pub fn is_active(&self, subscription_id: &str) -> bool {
        match self.inner.lock() {
            Ok(state) => state.senders.contains_key(subscription_id),
            Err(_) => false,
        }
    }
}

impl PaymentNotifier for ManualPaymentNotifier {
    fn watch(&self, subscription_id: &str) -> Result<PaymentWatch, Error> {
        let (sender, receiver) = oneshot::channel();
        let token = match self.inner.lock() {
            Ok(mut state) => {
                state.next_token += 1;
                let token = state.next_token;
                state
                    .senders
                    .insert(subscription_id.to_string(), (token, sender));
                token
            }
            Err(_) => {
                return Err(Error::Realtime {
                    subscription: subscription_id.to_string(),
                    details: "notifier state poisoned".to_string(),
                });
            }
        };

        let inner = Arc::clone(&self.inner);
        let key = subscription_id.to_string();
        let guard = WatchGuard::new(subscription_id, move || {
            if let Ok(mut state) = inner.lock() {
                if state.senders.get(&key).is_some_and(|(owner, _)| *owner == token) {
                    state.senders.remove(&key);
                }
            }
        });
        Ok(PaymentWatch {
            guard,
            signal: PaymentSignal::new(async move { receiver.await.is_ok() }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_future<T>(future: impl Future<Output = T>) -> T {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("tokio runtime");
        runtime.block_on(future)
    }

    #[test]
    fn socket_url_follows_server_scheme() {
        let secure = base_url("https://lnbits.example/prefix").expect("url");
        assert_eq!(
            socket_url(&secure, "abc123").expect("ws url").as_str(),
            "wss://lnbits.example/api/v1/ws/abc123"
        );

        let plain = base_url("http://localhost:5000").expect("url");
        assert_eq!(
            socket_url(&plain, "abc123").expect("ws url").as_str(),
            "ws://localhost:5000/api/v1/ws/abc123"
        );
    }

    #[test]
    fn manual_trigger_resolves_signal() {
        let notifier = ManualPaymentNotifier::new();
        let watch = notifier.watch("m1").expect("watch");
        assert!(notifier.is_active("m1"));

        assert!(notifier.trigger("m1"));
        assert!(run_future(watch.signal.observed()));
        assert!(!notifier.trigger("m1"));
    }

    #[test]
    fn dropping_guard_releases_subscription() {
        let notifier = ManualPaymentNotifier::new();
        let PaymentWatch { guard, signal } = notifier.watch("m1").expect("watch");

        drop(guard);
        assert!(!notifier.is_active("m1"));
        assert!(!run_future(signal.observed()));
    }

    #[test]
    fn stale_guard_does_not_release_newer_watch() {
        let notifier = ManualPaymentNotifier::new();
        let first = notifier.watch("m1").expect("first");
        let second = notifier.watch("m1").expect("second");

        drop(first.guard);
        assert!(notifier.is_active("m1"));
        assert!(!run_future(first.signal.observed()));

        assert!(notifier.trigger("m1"));
        assert!(run_future(second.signal.observed()));
    }

    #[test]
    fn default_policy_never_reconnects() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.max_attempts, 0);
        assert_eq!(policy.delay, DEFAULT_RECONNECT_DELAY);
    }
}
