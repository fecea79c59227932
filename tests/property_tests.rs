use proptest::prelude::*;
use std::sync::Arc;

mod common;
use common::{InMemoryReservationRepository, InMemoryTableRepository};

use reservations_rs::models::{
    CreateReservationRequest, OccupancyReport, Originator, Reservation, ReservationStatus, Table,
};
use reservations_rs::services::ReservationService;

prop_compose! {
    fn arb_originator()(origin in prop_oneof![
        Just(Originator::Client),
        Just(Originator::Admin),
    ]) -> Originator {
        origin
    }
}

prop_compose! {
    fn arb_create_request()(
        customer in "[a-zA-Z ]{1,40}",
        email_user in "[a-z0-9]{1,12}",
        date_index in 0usize..3,
        hour in 10u8..23,
        party_size in 1u32..12,
    ) -> CreateReservationRequest {
        let dates = ["2024-06-01", "2024-06-02", "2024-06-03"];
        CreateReservationRequest {
            customer,
            email: format!("{}@example.com", email_user),
            date: dates[date_index].to_string(),
            time: format!("{:02}:00", hour),
            party_size,
        }
    }
}

proptest! {
    #[test]
    fn test_occupancy_report_bounds(total in 0usize..500, occupied in 0usize..500) {
        let occupied = occupied.min(total);
        let report = OccupancyReport::from_counts("2024-06-01".to_string(), total, occupied);

        prop_assert_eq!(report.free_count, total - occupied);

        let percentage = report.occupancy_percentage;
        prop_assert!(percentage >= rust_decimal::Decimal::ZERO);
        prop_assert!(percentage <= rust_decimal::Decimal::from(100u32));

        // Always rendered with exactly two fraction digits
        let rendered = percentage.to_string();
        let fraction = rendered.split('.').nth(1).unwrap_or("");
        prop_assert_eq!(fraction.len(), 2);
    }

    #[test]
    fn test_cancel_always_lands_cancelled(
        request in arb_create_request(),
        origin in arb_originator(),
        id in 1u32..1000,
        table_id in 1u32..50,
        repeat in 1usize..4,
    ) {
        let mut reservation = Reservation::new(id, request, table_id, origin);

        for _ in 0..repeat {
            reservation.cancel();
            prop_assert_eq!(&reservation.status, &ReservationStatus::Cancelled);
        }
        prop_assert!(!reservation.is_active());
    }

    #[test]
    fn test_reservation_serde_round_trip(
        request in arb_create_request(),
        origin in arb_originator(),
        id in 1u32..1000,
        table_id in 1u32..50,
    ) {
        let reservation = Reservation::new(id, request, table_id, origin);

        let json = serde_json::to_string(&reservation).unwrap();
        let parsed: Reservation = serde_json::from_str(&json).unwrap();

        prop_assert_eq!(parsed, reservation);
    }

    #[test]
    fn test_operation_sequences_preserve_invariant(
        ops in prop::collection::vec((any::<bool>(), arb_create_request(), 1u32..12), 1..25),
        seed in 0u64..1000,
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();

        runtime.block_on(async move {
            let tables = Arc::new(InMemoryTableRepository::new());
            for id in 1..=5 {
                tables.insert(Table::new(id, 4));
            }
            let reservations = Arc::new(InMemoryReservationRepository::new());
            let service = ReservationService::new(tables.clone(), reservations.clone())
                .with_rng_seed(seed);

            for (is_create, request, cancel_id) in ops {
                if is_create {
                    // Failures (no tables, conflicts) are legitimate outcomes
                    let _ = service
                        .create_reservation(request, Originator::Client)
                        .await;
                } else {
                    let _ = service.cancel_reservation(cancel_id).await;
                }
            }

            // No two active reservations may share a (table, date) pair
            let all = reservations.snapshot();
            let active: Vec<_> = all.iter().filter(|r| r.is_active()).collect();
            for (i, a) in active.iter().enumerate() {
                for b in active.iter().skip(i + 1) {
                    assert!(
                        !(a.table_id == b.table_id && a.date == b.date),
                        "table {} double-booked on {}",
                        a.table_id,
                        a.date
                    );
                }
            }

            // Ids are unique
            let mut ids: Vec<u32> = all.iter().map(|r| r.id).collect();
            ids.sort_unstable();
            ids.dedup();
            assert_eq!(ids.len(), all.len());
        });
    }
}
