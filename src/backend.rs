use actix_web::http::{Method, StatusCode};
use awc::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request to the backend failed: {0}")]
    Transport(String),
    #[error("session is no longer valid")]
    Unauthorized,
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("unexpected response shape from the backend")]
    Parse,
}

impl BackendError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        BackendError::Transport(err.to_string())
    }
}

// map a non-success upstream response; a 4xx message is meant for the user,
// a 5xx body is internal detail and stays out of the client response
pub fn status_error(status: StatusCode, body: &[u8]) -> BackendError {
    if status == StatusCode::UNAUTHORIZED {
        return BackendError::Unauthorized;
    }
    if status.is_server_error() {
        return BackendError::Transport(format!("backend returned {status}"));
    }

    let message = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|root| {
            root.get("message")
                .or_else(|| root.get("error"))
                .and_then(|node| node.as_str())
                .map(|text| text.to_string())
        })
        .unwrap_or_else(|| format!("backend returned {status}"));

    BackendError::Status {
        status: status.as_u16(),
        message,
    }
}

// one round trip to the remote API; no retries, a failure is reported once
pub async fn call(
    method: Method,
    bearer: Option<&str>,
    url: &str,
    body: Option<&Value>,
) -> Result<Value, BackendError> {
    let mut req = Client::default().request(method, url);
    if let Some(token) = bearer {
        req = req.bearer_auth(token);
    }

    let mut res = match body {
        Some(body) => req.send_json(body).await,
        None => req.send().await,
    }
    .map_err(BackendError::transport)?;

    let bytes = res.body().await.map_err(BackendError::transport)?;
    if !res.status().is_success() {
        return Err(status_error(res.status(), &bytes));
    }

    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes).map_err(|_| BackendError::Parse)
}

pub fn with_query(url: String, query: &str) -> String {
    if query.is_empty() {
        url
    } else {
        format!("{url}?{query}")
    }
}

// endpoints return the entity either bare or wrapped in a named field
pub fn unwrap_entity<'a>(root: &'a Value, field: &str) -> &'a Value {
    root.get(field).unwrap_or(root)
}

pub fn parse_entity<T: DeserializeOwned>(root: &Value, field: &str) -> Result<T, BackendError> {
    serde_json::from_value(unwrap_entity(root, field).clone()).map_err(|_| BackendError::Parse)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub total_count: u32,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

// list envelopes carry the items under a resource-named field and may omit
// any of the pagination counters
pub fn parse_list<T: DeserializeOwned>(
    root: &Value,
    field: &str,
) -> Result<(Vec<T>, Pagination), BackendError> {
    let node = root
        .get(field)
        .or_else(|| root.get("items"))
        .unwrap_or(root);

    let items: Vec<T> = serde_json::from_value(node.clone()).map_err(|_| BackendError::Parse)?;

    let counter = |name: &str| root.get(name).and_then(|node| node.as_u64()).map(|n| n as u32);

    let pagination = Pagination {
        total_count: counter("total")
            .or_else(|| counter("total_count"))
            .unwrap_or(items.len() as u32),
        page: counter("page").unwrap_or(1),
        limit: counter("limit").unwrap_or(10),
        total_pages: counter("total_pages").unwrap_or(0),
    };

    Ok((items, pagination))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::models::Room;
    use serde_json::json;

    fn room_json(id: &str) -> Value {
        json!({
            "id": id,
            "room_number": "101",
            "type": "double",
            "capacity": 2,
            "price_per_night": 100.0,
            "status": "available",
        })
    }

    #[test]
    fn test_entity_bare_and_wrapped() {
        let bare: Room = parse_entity(&room_json("r1"), "room").unwrap();
        assert_eq!(bare.id, "r1");

        let wrapped: Room = parse_entity(&json!({ "room": room_json("r2") }), "room").unwrap();
        assert_eq!(wrapped.id, "r2");
    }

    #[test]
    fn test_list_with_and_without_counters() {
        let root = json!({
            "rooms": [room_json("r1"), room_json("r2")],
            "total": 12,
            "page": 2,
            "limit": 2,
            "total_pages": 6,
        });
        let (items, pagination): (Vec<Room>, _) = parse_list(&root, "rooms").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(
            pagination,
            Pagination {
                total_count: 12,
                page: 2,
                limit: 2,
                total_pages: 6
            }
        );

        let root = json!({ "rooms": [room_json("r1")] });
        let (items, pagination): (Vec<Room>, _) = parse_list(&root, "rooms").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(pagination.total_count, 1);
        assert_eq!(pagination.page, 1);
    }

    #[test]
    fn test_status_error_message_fields() {
        let err = status_error(StatusCode::BAD_REQUEST, br#"{"message":"guests over capacity"}"#);
        assert_eq!(err.to_string(), "guests over capacity");

        let err = status_error(StatusCode::FORBIDDEN, br#"{"error":"staff only"}"#);
        assert!(matches!(err, BackendError::Status { status: 403, .. }));

        let err = status_error(StatusCode::UNAUTHORIZED, b"");
        assert!(matches!(err, BackendError::Unauthorized));
    }

    #[test]
    fn test_server_error_body_never_reaches_the_client() {
        let err = status_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            br#"{"message":"pg: connection refused at 10.0.0.7"}"#,
        );
        assert!(matches!(err, BackendError::Transport(_)));
        assert!(!err.to_string().contains("connection refused"));

        let err = status_error(StatusCode::SERVICE_UNAVAILABLE, b"maintenance window");
        assert!(matches!(err, BackendError::Transport(_)));
    }
}
