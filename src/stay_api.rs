use crate::backend::{call, parse_entity, parse_list, with_query, BackendError};
use crate::models;
use actix_web::http::Method;
use serde_json::Value;

#[derive(Debug, Default, Clone)]
pub struct StayAppState {
    base_url: String,
}

impl StayAppState {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn stay_query(
        &self,
        bearer: &str,
        query: &str,
    ) -> Result<models::StayRecordChunk, BackendError> {
        let url = with_query(format!("{}/stay_records", self.base_url), query);
        let root = call(Method::GET, Some(bearer), &url, None).await?;
        parse_stay_chunk(&root)
    }

    // detail responses wrap the record in a camelCase field
    pub async fn stay_get(
        &self,
        bearer: &str,
        id: &str,
    ) -> Result<models::StayRecord, BackendError> {
        let url = format!("{}/stay_records/{id}", self.base_url);
        let root = call(Method::GET, Some(bearer), &url, None).await?;
        parse_entity(&root, "stayRecord")
    }

    // physical check-in creates the ground-truth occupancy record
    pub async fn stay_create(
        &self,
        bearer: &str,
        payload: &models::CreateStayRecordPayload,
    ) -> Result<models::StayRecord, BackendError> {
        let url = format!("{}/stay_records", self.base_url);
        let body = serde_json::to_value(payload).map_err(|_| BackendError::Parse)?;
        let root = call(Method::POST, Some(bearer), &url, Some(&body)).await?;
        parse_entity(&root, "stayRecord")
    }

    pub async fn stay_update(
        &self,
        bearer: &str,
        id: &str,
        payload: &models::UpdateStayRecordPayload,
    ) -> Result<models::StayRecord, BackendError> {
        let url = format!("{}/stay_records/{id}", self.base_url);
        let body = serde_json::to_value(payload).map_err(|_| BackendError::Parse)?;
        let root = call(Method::PUT, Some(bearer), &url, Some(&body)).await?;
        parse_entity(&root, "stayRecord")
    }

    pub async fn stay_checkout(
        &self,
        bearer: &str,
        id: &str,
        payload: &models::CheckOutStayPayload,
    ) -> Result<models::StayRecord, BackendError> {
        let url = format!("{}/stay_records/{id}/checkout", self.base_url);
        let body = serde_json::to_value(payload).map_err(|_| BackendError::Parse)?;
        let root = call(Method::POST, Some(bearer), &url, Some(&body)).await?;
        parse_entity(&root, "stayRecord")
    }

    pub async fn stay_stats(&self, bearer: &str) -> Result<models::StayStats, BackendError> {
        let url = format!("{}/stay_records/stats/overview", self.base_url);
        let root = call(Method::GET, Some(bearer), &url, None).await?;
        parse_entity(&root, "stats")
    }
}

fn parse_stay_chunk(root: &Value) -> Result<models::StayRecordChunk, BackendError> {
    let (items, pagination) = parse_list(root, "stay_records")?;
    Ok(models::StayRecordChunk {
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
    fn test_stay_record_detail_unwrap() {
        let root = json!({
            "stayRecord": {
                "id": "s1",
                "booking_id": "b1",
                "actual_check_in_time": "2024-01-01T15:12:00Z",
                "notes": "late arrival",
                "created_at": "2024-01-01T15:12:00Z",
            }
        });

        let record: models::StayRecord = parse_entity(&root, "stayRecord").unwrap();
        assert_eq!(record.booking_id, "b1");
        assert!(record.actual_check_out_time.is_none());
        assert!(record.incidents.is_empty());
    }

    #[test]
    fn test_stay_chunk_defaults() {
        let root = json!({
            "stay_records": [],
            "total": 0,
        });
        let chunk = parse_stay_chunk(&root).unwrap();
        assert_eq!(chunk.total_count, 0);
        assert_eq!(chunk.page, 1);
        assert_eq!(chunk.limit, 10);
    }

    #[test]
    fn test_stats_unwrap() {
        let root = json!({
            "stats": {
                "total_stay_records": 12,
                "active_stays": 3,
                "check_ins_today": 1,
                "check_outs_today": 2,
                "average_stay_duration": 2.4,
                "total_revenue": 8400.0,
            }
        });
        let stats: models::StayStats = parse_entity(&root, "stats").unwrap();
        assert_eq!(stats.active_stays, 3);
    }
}
