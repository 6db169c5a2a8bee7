use crate::backend::{call, parse_entity, parse_list, with_query, BackendError};
use crate::models;
use actix_web::http::Method;
use serde_json::{json, Value};

#[derive(Debug, Default, Clone)]
pub struct BookingAppState {
    base_url: String,
}

impl BookingAppState {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    // the backend scopes the list by the bearer's role: guests see their own
    // bookings, staff see everything
    pub async fn booking_query(
        &self,
        bearer: &str,
        query: &str,
    ) -> Result<models::BookingChunk, BackendError> {
        let url = with_query(format!("{}/bookings", self.base_url), query);
        let root = call(Method::GET, Some(bearer), &url, None).await?;
        parse_booking_chunk(&root)
    }

    pub async fn booking_get(&self, bearer: &str, id: &str) -> Result<models::Booking, BackendError> {
        let url = format!("{}/bookings/{id}", self.base_url);
        let root = call(Method::GET, Some(bearer), &url, None).await?;
        parse_entity(&root, "booking")
    }

    pub async fn booking_create(
        &self,
        bearer: &str,
        payload: &models::CreateBookingPayload,
    ) -> Result<models::Booking, BackendError> {
        let url = format!("{}/bookings", self.base_url);
        let body = serde_json::to_value(payload).map_err(|_| BackendError::Parse)?;
        let root = call(Method::POST, Some(bearer), &url, Some(&body)).await?;
        parse_entity(&root, "booking")
    }

    pub async fn booking_update(
        &self,
        bearer: &str,
        id: &str,
        payload: &models::UpdateBookingPayload,
    ) -> Result<models::Booking, BackendError> {
        let url = format!("{}/bookings/{id}", self.base_url);
        let body = serde_json::to_value(payload).map_err(|_| BackendError::Parse)?;
        let root = call(Method::PUT, Some(bearer), &url, Some(&body)).await?;
        parse_entity(&root, "booking")
    }

    pub async fn booking_cancel(
        &self,
        bearer: &str,
        id: &str,
        reason: Option<&str>,
    ) -> Result<models::Booking, BackendError> {
        let url = format!("{}/bookings/{id}/cancel", self.base_url);
        let body = json!({ "reason": reason });
        let root = call(Method::POST, Some(bearer), &url, Some(&body)).await?;
        parse_entity(&root, "booking")
    }

    pub async fn booking_check_in(
        &self,
        bearer: &str,
        id: &str,
    ) -> Result<models::Booking, BackendError> {
        let url = format!("{}/bookings/{id}/check-in", self.base_url);
        let root = call(Method::POST, Some(bearer), &url, Some(&json!({}))).await?;
        parse_entity(&root, "booking")
    }

    pub async fn booking_check_out(
        &self,
        bearer: &str,
        id: &str,
    ) -> Result<models::Booking, BackendError> {
        let url = format!("{}/bookings/{id}/check-out", self.base_url);
        let root = call(Method::POST, Some(bearer), &url, Some(&json!({}))).await?;
        parse_entity(&root, "booking")
    }

    pub async fn booking_delete(&self, bearer: &str, id: &str) -> Result<(), BackendError> {
        let url = format!("{}/bookings/{id}", self.base_url);
        call(Method::DELETE, Some(bearer), &url, None).await?;
        Ok(())
    }
}

fn parse_booking_chunk(root: &Value) -> Result<models::BookingChunk, BackendError> {
    let (items, pagination) = parse_list(root, "bookings")?;
    Ok(models::BookingChunk {
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
    use crate::models::BookingStatus;
    use serde_json::json;

    fn booking_json() -> Value {
        json!({
            "id": "b1",
            "room_id": "r1",
            "guest_id": "u1",
            "check_in_date": "2024-01-01T14:00:00Z",
            "check_out_date": "2024-01-04T11:00:00Z",
            "guests": 2,
            "total_amount": 300.0,
            "paid_amount": 100.0,
            "status": "confirmed",
            "created_at": "2023-12-20T09:30:00Z",
        })
    }

    #[test]
    fn test_wrapped_booking_normalizes() {
        let wrapped = json!({ "booking": booking_json(), "message": "Booking created successfully" });
        let booking: models::Booking = parse_entity(&wrapped, "booking").unwrap();
        assert_eq!(booking.id, "b1");
        assert_eq!(booking.status, BookingStatus::Confirmed);
    }

    #[test]
    fn test_booking_chunk() {
        let root = json!({ "bookings": [booking_json()], "total": 1 });
        let chunk = parse_booking_chunk(&root).unwrap();
        assert_eq!(chunk.items.len(), 1);
        assert_eq!(chunk.items[0].paid_amount, 100.0);
        assert_eq!(chunk.total_count, 1);
    }
}
