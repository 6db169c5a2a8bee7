use crate::models::{User, UserRole};
use actix_web::HttpRequest;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::{FromRow, PgPool};

// abandoned tokens die after a week regardless of activity
const SESSION_TTL_HOURS: i64 = 24 * 7;

// a locally issued opaque token maps to the backend bearer token; the bearer
// never reaches the browser
#[derive(Debug, Clone, FromRow)]
struct SessionRow {
    token: String,
    bearer: String,
    user_id: String,
    role: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SessionContext {
    pub token: String,
    pub bearer: String,
    pub user_id: String,
    pub role: UserRole,
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    pool: PgPool,
}

impl SessionStore {
    pub async fn new(db_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPool::connect(db_url).await?;
        Ok(SessionStore { pool })
    }

    pub async fn create(&self, bearer: &str, user: &User) -> Result<String, sqlx::Error> {
        let token = new_token();

        sqlx::query(
            "INSERT INTO sessions (token, bearer, user_id, role, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&token)
        .bind(bearer)
        .bind(&user.id)
        .bind(role_str(user.role))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(token)
    }

    pub async fn lookup(&self, token: &str) -> Result<Option<SessionContext>, sqlx::Error> {
        let row: Option<SessionRow> = sqlx::query_as(
            "SELECT token, bearer, user_id, role, created_at FROM sessions WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        // expired rows are reaped on first touch
        if is_expired(row.created_at, Utc::now()) {
            self.invalidate(&row.token).await?;
            return Ok(None);
        }

        Ok(Some(SessionContext {
            role: parse_role(&row.role),
            token: row.token,
            bearer: row.bearer,
            user_id: row.user_id,
        }))
    }

    // called on logout and whenever the backend answers 401
    pub async fn invalidate(&self, token: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn is_expired(created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - created_at > chrono::Duration::hours(SESSION_TTL_HOURS)
}

fn new_token() -> String {
    let mut buf = [0u8; 32];
    rand::rngs::OsRng.fill(&mut buf);
    base64::engine::general_purpose::STANDARD.encode(buf)
}

fn role_str(role: UserRole) -> &'static str {
    match role {
        UserRole::Guest => "guest",
        UserRole::Staff => "staff",
        UserRole::Admin => "admin",
    }
}

fn parse_role(text: &str) -> UserRole {
    match text {
        "staff" => UserRole::Staff,
        "admin" => UserRole::Admin,
        _ => UserRole::Guest,
    }
}

pub fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

#[cfg(test)]
mod test {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_token_shape() {
        let first = new_token();
        let second = new_token();
        assert_eq!(first.len(), 44);
        assert_ne!(first, second);
    }

    #[test]
    fn test_session_expiry_window() {
        use chrono::TimeZone;

        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let ttl = chrono::Duration::hours(SESSION_TTL_HOURS);

        assert!(!is_expired(created, created));
        assert!(!is_expired(created, created + ttl));
        assert!(is_expired(created, created + ttl + chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_role_roundtrip() {
        for role in [UserRole::Guest, UserRole::Staff, UserRole::Admin] {
            assert_eq!(parse_role(role_str(role)), role);
        }
        assert_eq!(parse_role("unknown"), UserRole::Guest);
    }

    #[test]
    fn test_bearer_extraction() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer abc123"))
            .to_http_request();
        assert_eq!(bearer(&req), Some("abc123"));

        let req = TestRequest::default().to_http_request();
        assert_eq!(bearer(&req), None);

        let req = TestRequest::default()
            .insert_header(("Authorization", "Basic abc123"))
            .to_http_request();
        assert_eq!(bearer(&req), None);
    }
}
