use super::status;
use crate::application::context::RequestContext;
use crate::application::engine::{BillingEngine, CreateLoanRequest, PAYMENT_SUCCESSFUL};
use crate::domain::loan::{LoanId, NewBorrower};
use crate::error::{ErrorKind, LoanError};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Request {
    pub method: Method,
    /// Path, optionally followed by `?query`.
    pub path: String,
    #[serde(default)]
    pub body: Option<String>,
}

impl Request {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub status: u16,
    pub body: Value,
}

impl Response {
    fn ok<T: Serialize>(value: T) -> Self {
        match serde_json::to_value(value) {
            Ok(body) => Self {
                status: status::OK,
                body,
            },
            Err(e) => Self::error(status::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }

    fn bad_request(message: &str) -> Self {
        Self::error(status::BAD_REQUEST, message)
    }
}

impl From<LoanError> for Response {
    fn from(err: LoanError) -> Self {
        let status = match err.kind() {
            ErrorKind::Validation => status::BAD_REQUEST,
            ErrorKind::DeadlineExceeded => status::REQUEST_TIMEOUT,
            ErrorKind::Rejected
            | ErrorKind::NotFound
            | ErrorKind::Conflict
            | ErrorKind::Persistence => status::INTERNAL_SERVER_ERROR,
        };
        match err.kind() {
            ErrorKind::Persistence => error!("Error: {err}"),
            ErrorKind::DeadlineExceeded => warn!("Error: {err}"),
            _ => {}
        }
        Self::error(status, err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct PaymentRequest {
    amount: Decimal,
}

/// Routes loan requests to the billing engine.
///
/// Each request gets its own [`RequestContext`] whose deadline is the
/// configured timeout.
#[derive(Clone)]
pub struct LoanHandler {
    engine: Arc<BillingEngine>,
    timeout: Duration,
}

impl LoanHandler {
    pub fn new(engine: Arc<BillingEngine>, timeout: Duration) -> Self {
        Self { engine, timeout }
    }

    pub async fn handle(&self, request: &Request) -> Response {
        let (path, query) = request
            .path
            .split_once('?')
            .unwrap_or((request.path.as_str(), ""));
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        let body = request.body.as_deref().unwrap_or("");
        let ctx = RequestContext::with_timeout(self.timeout);

        match (request.method, segments.as_slice()) {
            (Method::Get, ["loans", id, "outstanding"]) => self.get_outstanding(&ctx, id).await,
            (Method::Get, ["loans", id, "delinquent"]) => self.is_delinquent(&ctx, id).await,
            (Method::Post, ["loans", id, "payment"]) => self.make_payment(&ctx, id, body).await,
            (Method::Get, ["loans"]) => self.get_loans_with_borrower(&ctx, query).await,
            (Method::Post, ["loans"]) => self.create_loan(&ctx, body).await,
            (Method::Post, ["borrowers"]) => self.create_borrower(&ctx, body).await,
            _ => Response::error(status::NOT_FOUND, "not found"),
        }
    }

    async fn get_outstanding(&self, ctx: &RequestContext, id: &str) -> Response {
        let Some(loan_id) = parse_loan_id(id) else {
            return Response::bad_request("invalid loan ID");
        };
        match self.engine.get_outstanding(ctx, loan_id).await {
            Ok(outstanding) => Response::ok(json!({ "outstanding": outstanding })),
            Err(e) => e.into(),
        }
    }

    async fn is_delinquent(&self, ctx: &RequestContext, id: &str) -> Response {
        let Some(loan_id) = parse_loan_id(id) else {
            return Response::bad_request("invalid loan ID");
        };
        match self.engine.is_delinquent(ctx, loan_id).await {
            Ok(check) => Response::ok(check),
            Err(e) => e.into(),
        }
    }

    async fn make_payment(&self, ctx: &RequestContext, id: &str, body: &str) -> Response {
        let Some(loan_id) = parse_loan_id(id) else {
            return Response::bad_request("invalid loan ID");
        };
        let Some(request) = parse_body::<PaymentRequest>(body) else {
            return Response::bad_request("invalid request");
        };
        match self.engine.make_payment(ctx, loan_id, request.amount).await {
            Ok(_) => Response::ok(json!({ "message": PAYMENT_SUCCESSFUL })),
            Err(e) => e.into(),
        }
    }

    async fn get_loans_with_borrower(&self, ctx: &RequestContext, query: &str) -> Response {
        let Some(limit) = parse_page_param(query, "limit") else {
            return Response::bad_request("invalid limit");
        };
        let Some(offset) = parse_page_param(query, "offset") else {
            return Response::bad_request("invalid offset");
        };
        match self.engine.get_loans_with_borrower(ctx, limit, offset).await {
            Ok(loans) => Response::ok(loans),
            Err(e) => e.into(),
        }
    }

    async fn create_loan(&self, ctx: &RequestContext, body: &str) -> Response {
        let Some(request) = parse_body::<CreateLoanRequest>(body) else {
            return Response::bad_request("invalid request");
        };
        match self.engine.create_loan(ctx, request).await {
            Ok(loan_id) => Response::ok(json!({ "loan_id": loan_id })),
            Err(e) => e.into(),
        }
    }

    async fn create_borrower(&self, ctx: &RequestContext, body: &str) -> Response {
        let Some(borrower) = parse_body::<NewBorrower>(body) else {
            return Response::bad_request("invalid request");
        };
        match self.engine.register_borrower(ctx, borrower).await {
            Ok(borrower_id) => Response::ok(json!({ "borrower_id": borrower_id })),
            Err(e) => e.into(),
        }
    }
}

fn parse_loan_id(raw: &str) -> Option<LoanId> {
    raw.parse().ok()
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Option<T> {
    serde_json::from_str(body).ok()
}

/// Reads a non-negative integer query parameter; absent, negative or
/// non-numeric values are all invalid.
fn parse_page_param(query: &str, name: &str) -> Option<u32> {
    let raw = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)?;
    let value: i64 = raw.parse().ok()?;
    u32::try_from(value).ok()
}
