use common::{DriverId, RiderId, TripId};
use criterion::{Criterion, criterion_group, criterion_main};
use document_store::InMemoryDocumentStore;
use domain::{
    ApplyAccept, ApplyCompletion, CreateTrip, Driver, Fare, Money, RecordDecline, Trip,
    TripService,
};

fn fare() -> Fare {
    Fare::new("F1", "sedan", Money::from_cents(2500))
}

fn bench_aggregate_transitions(c: &mut Criterion) {
    c.bench_function("domain/trip_decline_accept_complete", |b| {
        b.iter(|| {
            let mut trip = Trip::request(TripId::new("T1"), RiderId::new("R1"), fare());
            for i in 0..10 {
                trip.decline(DriverId::new(format!("D{i}")));
            }
            trip.accept(Driver::new("D42")).unwrap();
            trip.complete().unwrap();
            trip
        });
    });
}

fn bench_record_decline(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = TripService::new(InMemoryDocumentStore::new());
    let trip_id = TripId::new("T-bench");
    rt.block_on(async {
        service
            .create_trip(CreateTrip::new(trip_id.clone(), RiderId::new("R1"), fare()))
            .await
            .unwrap();
    });

    let mut n = 0u64;
    c.bench_function("domain/record_decline", |b| {
        b.iter(|| {
            n += 1;
            rt.block_on(async {
                service
                    .record_decline(RecordDecline::new(
                        trip_id.clone(),
                        DriverId::new(format!("D{n}")),
                    ))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_full_command_cycle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("domain/full_create_accept_complete", |b| {
        b.iter(|| {
            rt.block_on(async {
                let service = TripService::new(InMemoryDocumentStore::new());
                let cmd = CreateTrip::for_rider(RiderId::new("R1"), fare());
                let trip_id = cmd.trip_id.clone();
                service.create_trip(cmd).await.unwrap();

                service
                    .apply_accept(ApplyAccept::new(trip_id.clone(), Driver::new("D1")))
                    .await
                    .unwrap();

                service
                    .apply_completion(ApplyCompletion::new(trip_id))
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_aggregate_transitions,
    bench_record_decline,
    bench_full_command_cycle,
);
criterion_main!(benches);
