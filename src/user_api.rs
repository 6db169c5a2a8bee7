use crate::backend::{call, parse_entity, parse_list, with_query, BackendError};
use crate::models;
use actix_web::http::Method;
use serde_json::{json, Value};

#[derive(Debug, Default, Clone)]
pub struct UserAppState {
    base_url: String,
}

impl UserAppState {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(String, models::User), BackendError> {
        let url = format!("{}/auth/login", self.base_url);
        let body = json!({ "email": email, "password": password });
        let root = call(Method::POST, None, &url, Some(&body)).await?;
        parse_login(&root)
    }

    pub async fn logout(&self, bearer: &str) -> Result<(), BackendError> {
        let url = format!("{}/auth/logout", self.base_url);
        call(Method::POST, Some(bearer), &url, Some(&json!({}))).await?;
        Ok(())
    }

    pub async fn me(&self, bearer: &str) -> Result<models::User, BackendError> {
        let url = format!("{}/auth/me", self.base_url);
        let root = call(Method::GET, Some(bearer), &url, None).await?;
        parse_entity(&root, "user")
    }

    pub async fn update_profile(
        &self,
        bearer: &str,
        payload: &models::UpdateProfilePayload,
    ) -> Result<models::User, BackendError> {
        let url = format!("{}/auth/me", self.base_url);
        let body = serde_json::to_value(payload).map_err(|_| BackendError::Parse)?;
        let root = call(Method::PUT, Some(bearer), &url, Some(&body)).await?;
        parse_entity(&root, "user")
    }

    // the handler checks the admin role before calling; the upstream enforces
    // it again and its 403 is passed through untouched
    pub async fn user_query(
        &self,
        bearer: &str,
        query: &str,
    ) -> Result<models::UserChunk, BackendError> {
        let url = with_query(format!("{}/users", self.base_url), query);
        let root = call(Method::GET, Some(bearer), &url, None).await?;
        parse_user_chunk(&root)
    }
}

fn parse_login(root: &Value) -> Result<(String, models::User), BackendError> {
    let token = root
        .get("token")
        .or_else(|| root.get("access_token"))
        .and_then(|node| node.as_str())
        .ok_or(BackendError::Parse)?
        .to_string();

    let user = parse_entity(root, "user")?;
    Ok((token, user))
}

fn parse_user_chunk(root: &Value) -> Result<models::UserChunk, BackendError> {
    let (items, pagination) = parse_list(root, "users")?;
    Ok(models::UserChunk {
        items,
        total_count: pagination.total_count,
        page: pagination.page,
        limit: pagination.limit,
        total_pages: pagination.total_pages,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::models::UserRole;
    use serde_json::json;

    fn user_json() -> Value {
        json!({
            "id": "u1",
            "email": "guest@example.com",
            "role": "guest",
            "full_name": "A Guest",
            "is_verified": true,
        })
    }

    #[test]
    fn test_login_token_field_variants() {
        let root = json!({ "token": "abc", "user": user_json() });
        let (token, user) = parse_login(&root).unwrap();
        assert_eq!(token, "abc");
        assert_eq!(user.role, UserRole::Guest);
        assert!(user.is_active);

        let root = json!({ "access_token": "xyz", "user": user_json() });
        let (token, _) = parse_login(&root).unwrap();
        assert_eq!(token, "xyz");
    }

    #[test]
    fn test_login_without_token_fails() {
        let root = json!({ "user": user_json() });
        assert!(parse_login(&root).is_err());
    }

    #[test]
    fn test_user_chunk() {
        let root = json!({ "users": [user_json()], "total": 1, "page": 1, "limit": 20 });
        let chunk = parse_user_chunk(&root).unwrap();
        assert_eq!(chunk.items.len(), 1);
        assert_eq!(chunk.limit, 20);
    }
}
