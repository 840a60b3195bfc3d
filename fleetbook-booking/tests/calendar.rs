mod common;

use chrono::Duration;
use common::*;
use fleetbook_core::{Booking, BookingError};
use proptest::prelude::*;

#[derive(Debug, Clone)]
struct Attempt {
    vehicle_id: i64,
    start_day: i64,
    span_days: i64,
    cancel_after: bool,
}

fn attempt() -> impl Strategy<Value = Attempt> {
    (prop_oneof![Just(CAR), Just(STRICT_CAR)], 0i64..20, 0i64..4, any::<bool>()).prop_map(
        |(vehicle_id, start_day, span_days, cancel_after)| Attempt {
            vehicle_id,
            start_day,
            span_days,
            cancel_after,
        },
    )
}

fn overlapping(a: &Booking, b: &Booking) -> bool {
    a.vehicle_id == b.vehicle_id && a.window().overlaps(&b.window())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn active_bookings_never_overlap(attempts in prop::collection::vec(attempt(), 1..24)) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();

        runtime.block_on(async {
            let h = Harness::new();

            for a in &attempts {
                let pickup = utc(1, 6) + Duration::days(a.start_day);
                let dropoff = pickup + Duration::days(a.span_days) + Duration::hours(2);
                let before: Vec<Booking> = h.store.bookings().await.into_iter().filter(|b| b.is_active()).collect();

                match h.controller.create_booking(&seeker(), request(a.vehicle_id, pickup, dropoff)).await {
                    Ok(booking) => {
                        assert!(before.iter().all(|b| !overlapping(b, &booking)));
                        if a.cancel_after {
                            h.controller.cancel_booking(&host(), booking.id).await.unwrap();
                        }
                    }
                    Err(BookingError::BookingConflict) => {
                        // Rejections must be justified by a live booking
                        let window = fleetbook_booking::fees::normalize_window(pickup, dropoff);
                        assert!(before
                            .iter()
                            .any(|b| b.vehicle_id == a.vehicle_id && b.window().overlaps(&window)));
                    }
                    Err(other) => panic!("unexpected error: {:?}", other),
                }
            }

            let active: Vec<Booking> = h.store.bookings().await.into_iter().filter(|b| b.is_active()).collect();
            for (i, a) in active.iter().enumerate() {
                for b in &active[i + 1..] {
                    assert!(!overlapping(a, b), "{:?} overlaps {:?}", a.window(), b.window());
                }
            }
        });
    }
}
