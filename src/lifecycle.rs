use crate::locale::Locale;
use crate::models::{self, BookingStatus};
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingAction {
    CheckIn,
    CheckOut,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{action:?} is not allowed while the booking is {from:?}")]
pub struct TransitionError {
    pub from: BookingStatus,
    pub action: BookingAction,
}

pub fn can_check_in(status: BookingStatus) -> bool {
    matches!(status, BookingStatus::Pending | BookingStatus::Confirmed)
}

pub fn can_check_out(status: BookingStatus) -> bool {
    status == BookingStatus::CheckedIn
}

// same rule for guests and staff
pub fn can_cancel(status: BookingStatus) -> bool {
    matches!(status, BookingStatus::Pending | BookingStatus::Confirmed)
}

pub fn is_terminal(status: BookingStatus) -> bool {
    matches!(status, BookingStatus::CheckedOut | BookingStatus::Cancelled)
}

pub fn apply(status: BookingStatus, action: BookingAction) -> Result<BookingStatus, TransitionError> {
    let allowed = match action {
        BookingAction::CheckIn => can_check_in(status),
        BookingAction::CheckOut => can_check_out(status),
        BookingAction::Cancel => can_cancel(status),
    };

    if !allowed {
        return Err(TransitionError {
            from: status,
            action,
        });
    }

    Ok(match action {
        BookingAction::CheckIn => BookingStatus::CheckedIn,
        BookingAction::CheckOut => BookingStatus::CheckedOut,
        BookingAction::Cancel => BookingStatus::Cancelled,
    })
}

// a partial night counts as a full one, and a stay is never shorter than one night
pub fn nights(check_in: DateTime<Utc>, check_out: DateTime<Utc>) -> i64 {
    let secs = (check_out - check_in).num_seconds();
    let days = (secs as f64 / 86_400.0).ceil() as i64;
    days.max(1)
}

pub fn total_amount(nights: i64, price_per_night: f64) -> f64 {
    nights as f64 * price_per_night
}

// price is captured at booking time, never recomputed from the current room price
pub fn quote(check_in: DateTime<Utc>, check_out: DateTime<Utc>, price_per_night: f64) -> (i64, f64) {
    let n = nights(check_in, check_out);
    (n, total_amount(n, price_per_night))
}

pub fn outstanding(total_amount: f64, paid_amount: f64) -> f64 {
    (total_amount - paid_amount).max(0.0)
}

pub fn is_paid(total_amount: f64, paid_amount: f64) -> bool {
    paid_amount >= total_amount
}

pub fn status_label(status: BookingStatus, locale: Locale) -> &'static str {
    match locale {
        Locale::En => match status {
            BookingStatus::Pending => "Pending",
            BookingStatus::Confirmed => "Confirmed",
            BookingStatus::CheckedIn => "Checked in",
            BookingStatus::CheckedOut => "Checked out",
            BookingStatus::Cancelled => "Cancelled",
        },
        Locale::My => match status {
            BookingStatus::Pending => "စောင့်ဆိုင်းဆဲ",
            BookingStatus::Confirmed => "အတည်ပြုပြီး",
            BookingStatus::CheckedIn => "ချက်ခ်အင်ဝင်ပြီး",
            BookingStatus::CheckedOut => "ချက်ခ်အောက်ထွက်ပြီး",
            BookingStatus::Cancelled => "ပယ်ဖျက်ပြီး",
        },
    }
}

pub fn status_badge(status: BookingStatus) -> &'static str {
    match status {
        BookingStatus::Pending => "yellow",
        BookingStatus::Confirmed => "blue",
        BookingStatus::CheckedIn => "green",
        BookingStatus::CheckedOut => "gray",
        BookingStatus::Cancelled => "red",
    }
}

pub fn view(booking: models::Booking, locale: Locale) -> models::BookingView {
    models::BookingView {
        nights: nights(booking.check_in_date, booking.check_out_date),
        outstanding: outstanding(booking.total_amount, booking.paid_amount),
        fully_paid: is_paid(booking.total_amount, booking.paid_amount),
        terminal: is_terminal(booking.status),
        status_label: status_label(booking.status, locale),
        status_badge: status_badge(booking.status),
        booking,
    }
}

pub fn view_chunk(chunk: models::BookingChunk, locale: Locale) -> models::BookingViewChunk {
    models::BookingViewChunk {
        items: chunk
            .items
            .into_iter()
            .map(|booking| view(booking, locale))
            .collect(),
        total_count: chunk.total_count,
        page: chunk.page,
        limit: chunk.limit,
        total_pages: chunk.total_pages,
    }
}
