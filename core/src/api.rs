use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Failure};
use crate::model::{
    Config, ConnectionProbe, Credential, Invoice, InvoiceRequest, Machine, MachineDraft, MachineId,
    RecordId, Transaction,
};
use crate::records::RemoteRecord;
use crate::targets;

pub const MACHINES_PATH: &str = "/satoshimachine/api/v1/myex";
pub const PAYMENT_PATH: &str = "/satoshimachine/api/v1/myex/payment";
pub const CONFIG_PATH: &str = "/dca_admin/api/v1/config";
pub const TEST_CONNECTION_PATH: &str = "/dca_admin/api/v1/test-connection";
pub const TRANSACTIONS_PATH: &str = "/dca_admin/api/v1/transactions";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One call against the server, relative to its base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub credential: Credential,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>, credential: Credential) -> Self {
        Self {
            method,
            path: path.into(),
            credential,
            body: None,
        }
    }

    pub fn with_body<B: Serialize>(mut self, body: &B) -> Result<Self, Error> {
        let value = serde_json::to_value(body).map_err(|error| Error::Encode {
            path: self.path.clone(),
            details: error.to_string(),
        })?;
        self.body = Some(value);
        Ok(self)
    }
}

pub type ApiFuture<T> = Pin<Box<dyn Future<Output = Result<T, Error>> + Send + 'static>>;

/// Moves a request to the server and returns the decoded JSON body.
pub trait Transport: Send + Sync {
    fn send(&self, request: ApiRequest) -> ApiFuture<Value>;
}

/// Typed facade over the admin endpoints. Cheap to clone.
#[derive(Clone)]
pub struct AdminApi {
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for AdminApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminApi").finish_non_exhaustive()
    }
}

impl AdminApi {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    pub fn list_machines(&self) -> ApiFuture<Vec<Machine>> {
        self.call(ApiRequest::new(Method::Get, MACHINES_PATH, Credential::Read))
    }

    pub fn get_machine(&self, id: &MachineId) -> ApiFuture<Machine> {
        self.call(ApiRequest::new(
            Method::Get,
            format!("{MACHINES_PATH}/{id}"),
            Credential::Read,
        ))
    }

    pub fn create_machine(&self, draft: &MachineDraft) -> ApiFuture<Machine> {
        let mut body = draft.clone();
        body.id = None;
        self.call_with_body(
            ApiRequest::new(Method::Post, MACHINES_PATH, Credential::Write),
            &body,
        )
    }

    pub fn update_machine(&self, id: &MachineId, draft: &MachineDraft) -> ApiFuture<Machine> {
        let mut body = draft.clone();
        body.id = Some(id.clone());
        self.call_with_body(
            ApiRequest::new(
                Method::Put,
                format!("{MACHINES_PATH}/{id}"),
                Credential::Write,
            ),
            &body,
        )
    }

    pub fn delete_machine(&self, id: &MachineId) -> ApiFuture<()> {
        self.call_unit(ApiRequest::new(
            Method::Delete,
            format!("{MACHINES_PATH}/{id}"),
            Credential::Write,
        ))
    }

    pub fn create_invoice(&self, request: &InvoiceRequest) -> ApiFuture<Invoice> {
        self.call_with_body(
            ApiRequest::new(Method::Post, PAYMENT_PATH, Credential::Read),
            request,
        )
    }

    pub fn get_config(&self) -> ApiFuture<Config> {
        self.call(ApiRequest::new(Method::Get, CONFIG_PATH, Credential::Read))
    }

    /// The response body is ignored; callers re-fetch after a save.
    pub fn save_config(&self, config: &Config) -> ApiFuture<()> {
        match ApiRequest::new(Method::Put, CONFIG_PATH, Credential::Read).with_body(config) {
            Ok(request) => self.call_unit(request),
            Err(error) => failed(error),
        }
    }

    pub fn test_connection(&self, server_ip: &str) -> ApiFuture<()> {
        let probe = ConnectionProbe {
            server_ip: server_ip.to_string(),
        };
        match ApiRequest::new(Method::Post, TEST_CONNECTION_PATH, Credential::Read)
            .with_body(&probe)
        {
            Ok(request) => self.call_unit(request),
            Err(error) => failed(error),
        }
    }

    pub fn list_transactions(&self) -> ApiFuture<Vec<Transaction>> {
        self.call(ApiRequest::new(
            Method::Get,
            TRANSACTIONS_PATH,
            Credential::Read,
        ))
    }

    pub fn list_records<R: RemoteRecord>(&self) -> ApiFuture<Vec<R>> {
        self.call(ApiRequest::new(Method::Get, R::COLLECTION, Credential::Read))
    }

    pub fn create_record<R: RemoteRecord>(&self, record: &R) -> ApiFuture<R> {
        self.call_with_body(
            ApiRequest::new(Method::Post, R::COLLECTION, Credential::Write),
            record,
        )
    }

    pub fn update_record<R: RemoteRecord>(&self, id: &RecordId, record: &R) -> ApiFuture<R> {
        self.call_with_body(
            ApiRequest::new(
                Method::Put,
                format!("{}/{id}", R::COLLECTION),
                Credential::Write,
            ),
            record,
        )
    }

    pub fn delete_record<R: RemoteRecord>(&self, id: &RecordId) -> ApiFuture<()> {
        self.call_unit(ApiRequest::new(
            Method::Delete,
            format!("{}/{id}", R::COLLECTION),
            Credential::Write,
        ))
    }

    fn call<T>(&self, request: ApiRequest) -> ApiFuture<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let transport = Arc::clone(&self.transport);
        Box::pin(async move {
            let path = request.path.clone();
            debug!(target: targets::API, method = %request.method, path = %path, "API request");
            let body = transport.send(request).await?;
            serde_json::from_value(body).map_err(|error| Error::Decode {
                path,
                details: error.to_string(),
            })
        })
    }

    fn call_with_body<T, B>(&self, request: ApiRequest, body: &B) -> ApiFuture<T>
    where
        T: DeserializeOwned + Send + 'static,
        B: Serialize,
    {
        match request.with_body(body) {
            Ok(request) => self.call(request),
            Err(error) => failed(error),
        }
    }

    fn call_unit(&self, request: ApiRequest) -> ApiFuture<()> {
        let transport = Arc::clone(&self.transport);
        Box::pin(async move {
            debug!(
                target: targets::API,
                method = %request.method,
                path = %request.path,
                "API request"
            );
            transport.send(request).await.map(|_| ())
        })
    }
}

fn failed<T: Send + 'static>(error: Error) -> ApiFuture<T> {
    Box::pin(std::future::ready(Err(error)))
}

/// A pending controller step resolving to the event that completes it.
pub type Task<E> = Pin<Box<dyn Future<Output = E> + Send + 'static>>;

/// Wraps an API call so its outcome arrives as a controller event.
pub fn task<T, E, F>(future: ApiFuture<T>, wrap: F) -> Task<E>
where
    T: Send + 'static,
    E: Send + 'static,
    F: FnOnce(Result<T, Failure>) -> E + Send + 'static,
{
    Box::pin(async move { wrap(future.await.map_err(Failure::from)) })
}

/// Replays queued responses in order and records every request it receives.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    queue: Arc<Mutex<VecDeque<Result<Value, Error>>>>,
    requests: Arc<Mutex<Vec<ApiRequest>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_json(&self, value: Value) {
        self.push_result(Ok(value));
    }

    pub fn push_error(&self, error: Error) {
        self.push_result(Err(error));
    }

    /// Queues a FastAPI-style failure carrying `message` as its detail.
    pub fn push_api_error(&self, status: u16, message: impl Into<String>) {
        self.push_result(Err(Error::Api {
            method: String::new(),
            path: String::new(),
            status,
            message: message.into(),
        }));
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(_) => Vec::new(),
        }
    }

    pub fn last_request(&self) -> Option<ApiRequest> {
        self.requests().pop()
    }

    fn push_result(&self, result: Result<Value, Error>) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(result);
        }
    }

    fn pop_result(&self) -> Option<Result<Value, Error>> {
        if let Ok(mut queue) = self.queue.lock() {
            return queue.pop_front();
        }
        None
    }
}

impl Transport for MockTransport {
    fn send(&self, request: ApiRequest) -> ApiFuture<Value> {
        let path = request.path.clone();
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        let result = self.pop_result();
        Box::pin(async move {
            result.unwrap_or_else(|| {
                Err(Error::NoResponse {
                    path,
                    details: "MockTransport queue is empty".to_string(),
                })
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Client, FixedModeSchedule};
    use serde_json::json;

    fn run_future<T>(future: impl Future<Output = T>) -> T {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("tokio runtime");
        runtime.block_on(future)
    }

    #[test]
    fn machine_calls_use_expected_paths_and_credentials() {
        let transport = MockTransport::new();
        transport.push_json(json!([{"id": "abc123", "name": "Kiosk1", "wallet": "w1"}]));
        transport.push_json(json!(null));
        let api = AdminApi::new(transport.clone());

        let machines = run_future(api.list_machines()).expect("list");
        assert_eq!(machines[0].name, "Kiosk1");
        run_future(api.delete_machine(&MachineId::new("abc123"))).expect("delete");

        let requests = transport.requests();
        assert_eq!(requests[0].method, Method::Get);
        assert_eq!(requests[0].path, MACHINES_PATH);
        assert_eq!(requests[0].credential, Credential::Read);
        assert_eq!(requests[1].method, Method::Delete);
        assert_eq!(requests[1].path, "/satoshimachine/api/v1/myex/abc123");
        assert_eq!(requests[1].credential, Credential::Write);
    }

    #[test]
    fn update_sends_full_draft_with_id() {
        let transport = MockTransport::new();
        transport.push_json(json!({"id": "abc123", "name": "Kiosk2", "wallet": "w1"}));
        let api = AdminApi::new(transport.clone());
        let draft = MachineDraft {
            name: "Kiosk2".to_string(),
            wallet: "w1".to_string(),
            lnurlwithdrawamount: 21,
            ..MachineDraft::default()
        };

        let updated =
            run_future(api.update_machine(&MachineId::new("abc123"), &draft)).expect("update");
        assert_eq!(updated.name, "Kiosk2");

        let request = transport.last_request().expect("request");
        let body = request.body.expect("body");
        assert_eq!(body["id"], json!("abc123"));
        assert_eq!(body["lnurlwithdrawamount"], json!(21));
    }

    #[test]
    fn save_config_ignores_response_body() {
        let transport = MockTransport::new();
        transport.push_json(json!({"unexpected": true}));
        let api = AdminApi::new(transport.clone());
        let config = Config {
            fixed_mode_schedule: FixedModeSchedule::Monthly,
            ..Config::default()
        };

        run_future(api.save_config(&config)).expect("save");
        let request = transport.last_request().expect("request");
        assert_eq!(request.method, Method::Put);
        assert_eq!(request.path, CONFIG_PATH);
        assert_eq!(request.body.expect("body")["fixed_mode_schedule"], json!("monthly"));
    }

    #[test]
    fn decode_failures_and_empty_queue_are_errors() {
        let transport = MockTransport::new();
        transport.push_json(json!({"not": "a list"}));
        let api = AdminApi::new(transport);

        let error = run_future(api.list_records::<Client>()).expect_err("decode error");
        assert!(matches!(error, Error::Decode { .. }));

        let error = run_future(api.get_config()).expect_err("empty queue");
        assert!(matches!(error, Error::NoResponse { .. }));
    }

    #[test]
    fn task_maps_errors_to_failures() {
        let transport = MockTransport::new();
        transport.push_api_error(403, "Not your MyExtension.");
        let api = AdminApi::new(transport);

        let outcome = run_future(task(api.get_config(), |result| result.map(|_| ())));
        let failure = outcome.expect_err("failure");
        assert_eq!(failure.summary, "Not your MyExtension.");
    }
}
