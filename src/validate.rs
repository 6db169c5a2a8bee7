use crate::models::{CreateRoomPayload, Room};
use chrono::NaiveDate;
use std::collections::HashMap;

// field -> message map in the shape the booking form renders; submission is
// blocked while the map is non-empty
pub fn validate_booking_form(
    room: Option<&Room>,
    check_in: Option<NaiveDate>,
    check_out: Option<NaiveDate>,
    guests: u32,
    today: NaiveDate,
) -> HashMap<&'static str, String> {
    let mut errors = HashMap::new();

    if room.is_none() {
        errors.insert("room", "Please select a room".to_string());
    }

    match check_in {
        None => {
            errors.insert("check_in_date", "Check-in date is required".to_string());
        }
        Some(date) if date < today => {
            errors.insert(
                "check_in_date",
                "Check-in date cannot be in the past".to_string(),
            );
        }
        Some(_) => {}
    }

    match (check_in, check_out) {
        (_, None) => {
            errors.insert("check_out_date", "Check-out date is required".to_string());
        }
        (Some(arrival), Some(departure)) if departure <= arrival => {
            errors.insert(
                "check_out_date",
                "Check-out date must be after check-in date".to_string(),
            );
        }
        _ => {}
    }

    if guests < 1 {
        errors.insert("guests", "At least 1 guest is required".to_string());
    } else if let Some(room) = room {
        if guests > room.capacity {
            errors.insert(
                "guests",
                format!("This room can only accommodate {} guest(s)", room.capacity),
            );
        }
    }

    errors
}

pub fn validate_payment(total_amount: f64, paid_amount: f64) -> Option<String> {
    if paid_amount < 0.0 {
        return Some("Paid amount cannot be negative".to_string());
    }
    if paid_amount > total_amount {
        return Some("Paid amount cannot exceed the total amount".to_string());
    }
    None
}

pub fn validate_room_form(payload: &CreateRoomPayload) -> HashMap<&'static str, String> {
    let mut errors = HashMap::new();

    if payload.room_number.trim().is_empty() {
        errors.insert("room_number", "Room number is required".to_string());
    }
    if payload.capacity < 1 {
        errors.insert("capacity", "Capacity must be at least 1".to_string());
    }
    if payload.price_per_night <= 0.0 {
        errors.insert(
            "price_per_night",
            "Price per night must be greater than zero".to_string(),
        );
    }

    errors
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::models::{RoomStatus, RoomType};

    fn room(capacity: u32) -> Room {
        Room {
            id: "r1".to_string(),
            room_number: "101".to_string(),
            room_type: RoomType::Double,
            capacity,
            price_per_night: 100.0,
            status: RoomStatus::Available,
            floor: None,
            size_sqm: None,
            description: None,
            amenities: vec![],
            images: vec![],
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_valid_form_has_no_errors() {
        let room = room(2);
        let errors = validate_booking_form(
            Some(&room),
            Some(date(2024, 1, 1)),
            Some(date(2024, 1, 4)),
            2,
            date(2024, 1, 1),
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn test_guests_over_capacity_blocks_submission() {
        let room = room(2);
        let errors = validate_booking_form(
            Some(&room),
            Some(date(2024, 1, 1)),
            Some(date(2024, 1, 4)),
            3,
            date(2024, 1, 1),
        );
        assert_eq!(
            errors.get("guests").map(|s| s.as_str()),
            Some("This room can only accommodate 2 guest(s)")
        );
    }

    #[test]
    fn test_check_in_cannot_be_past() {
        let room = room(2);
        let errors = validate_booking_form(
            Some(&room),
            Some(date(2023, 12, 31)),
            Some(date(2024, 1, 4)),
            1,
            date(2024, 1, 1),
        );
        assert!(errors.contains_key("check_in_date"));
    }

    #[test]
    fn test_check_out_must_follow_check_in() {
        let room = room(2);
        let errors = validate_booking_form(
            Some(&room),
            Some(date(2024, 1, 4)),
            Some(date(2024, 1, 4)),
            1,
            date(2024, 1, 1),
        );
        assert!(errors.contains_key("check_out_date"));
    }

    #[test]
    fn test_missing_fields() {
        let errors = validate_booking_form(None, None, None, 0, date(2024, 1, 1));
        assert!(errors.contains_key("room"));
        assert!(errors.contains_key("check_in_date"));
        assert!(errors.contains_key("check_out_date"));
        assert!(errors.contains_key("guests"));
    }

    #[test]
    fn test_overpayment_rejected() {
        assert!(validate_payment(300.0, 300.0).is_none());
        assert!(validate_payment(300.0, 300.01).is_some());
        assert!(validate_payment(300.0, -1.0).is_some());
    }

    #[test]
    fn test_room_form() {
        let payload = CreateRoomPayload {
            room_number: " ".to_string(),
            room_type: RoomType::Single,
            capacity: 0,
            price_per_night: 0.0,
            description: None,
            amenities: vec![],
            floor: None,
            size_sqm: None,
        };
        let errors = validate_room_form(&payload);
        assert!(errors.contains_key("room_number"));
        assert!(errors.contains_key("capacity"));
        assert!(errors.contains_key("price_per_night"));
    }
}
