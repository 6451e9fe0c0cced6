//! Outbound event mapping and publication.
//!
//! Every outbox message recorded by the trip service maps onto exactly one
//! channel. The envelope is owned by the rider the trip belongs to.

use document_store::{DocumentStore, OutboxMessage};
use domain::{DomainEvent, TripEvent};
use messaging::{BusError, Envelope, EventBus};

use crate::contracts::{
    PAYMENT_CMD_CREATE_SESSION, TRIP_EVENT_DRIVER_ASSIGNED, TRIP_EVENT_DRIVER_NOT_INTERESTED,
};
use crate::error::{Result, SagaError};

/// An event ready to hand to the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub channel: &'static str,
    pub envelope: Envelope,
}

/// Returns the channel a trip event is published on.
pub fn channel_for(event: &TripEvent) -> &'static str {
    match event {
        TripEvent::DriverAssigned(_) => TRIP_EVENT_DRIVER_ASSIGNED,
        TripEvent::DriverDeclined(_) => TRIP_EVENT_DRIVER_NOT_INTERESTED,
        TripEvent::TripCompleted(_) => PAYMENT_CMD_CREATE_SESSION,
    }
}

/// Builds the outbound message for a trip event.
pub fn outbound_for(event: &TripEvent) -> Result<OutboundMessage> {
    let envelope = match event {
        TripEvent::DriverAssigned(snapshot) | TripEvent::TripCompleted(snapshot) => {
            Envelope::from_payload(snapshot.rider_id.as_str(), snapshot)
        }
        TripEvent::DriverDeclined(data) => Envelope::from_payload(data.trip.rider_id.as_str(), data),
    }
    .map_err(BusError::Encoding)?;

    Ok(OutboundMessage {
        channel: channel_for(event),
        envelope,
    })
}

/// Publishes one outbox message and marks it published.
///
/// Returns the channel it went out on. The message is marked only after the
/// bus accepted it, so a failure anywhere leaves it pending for the relay.
pub async fn publish_outbox_message<S, B>(
    store: &S,
    bus: &B,
    message: &OutboxMessage,
) -> Result<&'static str>
where
    S: DocumentStore + ?Sized,
    B: EventBus + ?Sized,
{
    let event: TripEvent = message.decode()?;
    if event.event_type() != message.event_type {
        return Err(SagaError::UnroutableEvent(message.event_type.clone()));
    }

    let outbound = outbound_for(&event)?;
    bus.publish(outbound.channel, &outbound.envelope).await?;
    store.mark_published(message.id).await?;

    tracing::debug!(
        outbox_id = %message.id,
        trip_id = %message.document_id,
        channel = outbound.channel,
        "outbox message published"
    );

    Ok(outbound.channel)
}

#[cfg(test)]
mod tests {
    use common::{DriverId, RiderId, TripId};
    use document_store::InMemoryDocumentStore;
    use domain::{
        Aggregate, CreateTrip, DeclinedData, Driver, Fare, Money, RecordDecline, Trip,
        TripService, TripSnapshot,
    };
    use messaging::InMemoryEventBus;

    use super::*;

    fn trip() -> Trip {
        Trip::request(
            TripId::new("T1"),
            RiderId::new("R1"),
            Fare::new("F1", "sedan", Money::from_cents(2500)),
        )
    }

    #[test]
    fn assigned_goes_to_rider() {
        let mut trip = trip();
        trip.accept(Driver::new("D2")).unwrap();

        let outbound = outbound_for(&TripEvent::driver_assigned(&trip)).unwrap();
        assert_eq!(outbound.channel, "driver-assigned");
        assert_eq!(outbound.envelope.owner_id, "R1");

        let snapshot: TripSnapshot = outbound.envelope.decode_data().unwrap();
        assert_eq!(snapshot, trip.snapshot());
        assert_eq!(outbound.envelope.data["assignedDriver"]["id"], "D2");
    }

    #[test]
    fn declined_carries_exclusion_list() {
        let mut trip = trip();
        trip.decline(DriverId::new("D1"));

        let outbound = outbound_for(&TripEvent::driver_declined(&trip)).unwrap();
        assert_eq!(outbound.channel, "driver-not-interested");

        let data: DeclinedData = outbound.envelope.decode_data().unwrap();
        assert_eq!(data.declined_driver_ids, vec![DriverId::new("D1")]);
        assert_eq!(
            outbound.envelope.data["declinedDriverIDs"],
            serde_json::json!(["D1"])
        );
    }

    #[test]
    fn completed_requests_payment() {
        let mut trip = trip();
        trip.accept(Driver::new("D2")).unwrap();
        trip.complete().unwrap();

        let outbound = outbound_for(&TripEvent::trip_completed(&trip)).unwrap();
        assert_eq!(outbound.channel, "payment-session-requested");
        assert_eq!(outbound.envelope.data["status"], "completed");
        assert_eq!(outbound.envelope.data["fare"]["totalPriceInCents"], 2500);
    }

    #[tokio::test]
    async fn publish_marks_message_published() {
        let store = InMemoryDocumentStore::new();
        let service = TripService::new(store.clone());
        let bus = InMemoryEventBus::new();

        service
            .create_trip(CreateTrip::new(
                TripId::new("T1"),
                RiderId::new("R1"),
                Fare::new("F1", "sedan", Money::from_cents(2500)),
            ))
            .await
            .unwrap();
        let result = service
            .record_decline(RecordDecline::new(TripId::new("T1"), DriverId::new("D1")))
            .await
            .unwrap();
        let message = result.outbox.unwrap();

        let channel = publish_outbox_message(&store, &bus, &message).await.unwrap();
        assert_eq!(channel, "driver-not-interested");
        assert_eq!(bus.published_on(channel).await.len(), 1);
        assert_eq!(store.pending_count().await, 0);
    }

    #[tokio::test]
    async fn failed_publish_leaves_message_pending() {
        let store = InMemoryDocumentStore::new();
        let service = TripService::new(store.clone());
        let bus = InMemoryEventBus::new();
        bus.set_fail_publishes(true);

        service
            .create_trip(CreateTrip::new(
                TripId::new("T1"),
                RiderId::new("R1"),
                Fare::new("F1", "sedan", Money::from_cents(2500)),
            ))
            .await
            .unwrap();
        let message = service
            .record_decline(RecordDecline::new(TripId::new("T1"), DriverId::new("D1")))
            .await
            .unwrap()
            .outbox
            .unwrap();

        let result = publish_outbox_message(&store, &bus, &message).await;
        assert!(matches!(result, Err(SagaError::Bus(_))));
        assert_eq!(store.pending_count().await, 1);
    }

    #[tokio::test]
    async fn unknown_event_type_fails_to_decode() {
        let store = InMemoryDocumentStore::new();
        let bus = InMemoryEventBus::new();
        let message = OutboxMessage::new(
            Trip::aggregate_type(),
            "T1",
            "RiderRated",
            serde_json::json!({"type": "RiderRated", "data": {}}),
        );

        let result = publish_outbox_message(&store, &bus, &message).await;
        assert!(matches!(result, Err(SagaError::Decode(_))));
        assert!(bus.published().await.is_empty());
    }
}
