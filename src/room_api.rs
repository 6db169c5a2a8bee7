use crate::backend::{call, parse_entity, parse_list, with_query, BackendError};
use crate::models;
use actix_web::http::Method;
use serde_json::Value;

#[derive(Debug, Default, Clone)]
pub struct RoomAppState {
    base_url: String,
}

impl RoomAppState {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn room_query(
        &self,
        bearer: Option<&str>,
        query: &str,
    ) -> Result<models::RoomChunk, BackendError> {
        let url = with_query(format!("{}/rooms", self.base_url), query);
        let root = call(Method::GET, bearer, &url, None).await?;
        parse_room_chunk(&root)
    }

    pub async fn room_get(
        &self,
        bearer: Option<&str>,
        id: &str,
    ) -> Result<models::Room, BackendError> {
        let url = format!("{}/rooms/{id}", self.base_url);
        let root = call(Method::GET, bearer, &url, None).await?;
        parse_entity(&root, "room")
    }

    pub async fn availability_query(
        &self,
        bearer: Option<&str>,
        query: &str,
    ) -> Result<Vec<models::RoomAvailability>, BackendError> {
        let url = with_query(format!("{}/rooms/availability", self.base_url), query);
        let root = call(Method::GET, bearer, &url, None).await?;
        let (items, _) = parse_list(&root, "availability")?;
        Ok(items)
    }

    pub async fn room_create(
        &self,
        bearer: &str,
        payload: &models::CreateRoomPayload,
    ) -> Result<models::Room, BackendError> {
        let url = format!("{}/rooms", self.base_url);
        let body = serde_json::to_value(payload).map_err(|_| BackendError::Parse)?;
        let root = call(Method::POST, Some(bearer), &url, Some(&body)).await?;
        parse_entity(&root, "room")
    }

    pub async fn room_update(
        &self,
        bearer: &str,
        id: &str,
        payload: &models::UpdateRoomPayload,
    ) -> Result<models::Room, BackendError> {
        let url = format!("{}/rooms/{id}", self.base_url);
        let body = serde_json::to_value(payload).map_err(|_| BackendError::Parse)?;
        let root = call(Method::PUT, Some(bearer), &url, Some(&body)).await?;
        parse_entity(&root, "room")
    }

    pub async fn room_delete(&self, bearer: &str, id: &str) -> Result<(), BackendError> {
        let url = format!("{}/rooms/{id}", self.base_url);
        call(Method::DELETE, Some(bearer), &url, None).await?;
        Ok(())
    }
}

fn parse_room_chunk(root: &Value) -> Result<models::RoomChunk, BackendError> {
    let (items, pagination) = parse_list(root, "rooms")?;
    Ok(models::RoomChunk {
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
    use serde_json::json;

    #[test]
    fn test_room_chunk_from_list_envelope() {
        let root = json!({
            "rooms": [{
                "id": "r1",
                "room_number": "101",
                "type": "suite",
                "capacity": 4,
                "price_per_night": 250.0,
                "status": "available",
                "amenities": ["wifi"],
            }],
            "total": 7,
            "page": 1,
            "limit": 10,
            "total_pages": 1,
        });

        let chunk = parse_room_chunk(&root).unwrap();
        assert_eq!(chunk.items.len(), 1);
        assert_eq!(chunk.items[0].room_number, "101");
        assert_eq!(chunk.total_count, 7);
    }

}
