//! Trip orchestration service.

use common::TripId;
use document_store::DocumentStore;

use crate::command::{Command, CommandHandler, CommandResult, Decision};
use crate::error::DomainError;

use super::{
    AcceptOutcome, ApplyAccept, ApplyCompletion, CancelTrip, CreateTrip, DeclineOutcome,
    RecordDecline, Trip, TripEvent,
};

/// Service for driving trips through their lifecycle.
///
/// Every mutating operation is a guarded read-modify-write on the trip
/// document. Operations that owe a downstream effect record their event in
/// the outbox as part of the same write.
pub struct TripService<S: DocumentStore> {
    handler: CommandHandler<S, Trip>,
}

impl<S: DocumentStore> TripService<S> {
    /// Creates a new trip service with the given document store.
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    /// Sets how many times a conflicting write is retried before giving up.
    pub fn with_max_attempts(self, max_attempts: u32) -> Self {
        Self {
            handler: self.handler.with_max_attempts(max_attempts),
        }
    }

    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<S, Trip> {
        &self.handler
    }

    /// Returns a reference to the underlying document store.
    pub fn store(&self) -> &S {
        self.handler.store()
    }

    /// Creates a new trip waiting for a driver.
    #[tracing::instrument(skip(self))]
    pub async fn create_trip(
        &self,
        cmd: CreateTrip,
    ) -> Result<CommandResult<Trip, ()>, DomainError> {
        let trip = Trip::request(cmd.trip_id, cmd.rider_id, cmd.fare);
        self.handler.create(trip).await
    }

    /// Loads a trip by ID.
    #[tracing::instrument(skip(self))]
    pub async fn get_trip(&self, trip_id: &TripId) -> Result<Trip, DomainError> {
        let (trip, _) = self.handler.load_required(trip_id.as_str()).await?;
        Ok(trip)
    }

    /// Records a driver's decline and the resulting exclusion list.
    ///
    /// A repeated decline from the same driver writes nothing and records
    /// no event.
    #[tracing::instrument(skip(self))]
    pub async fn record_decline(
        &self,
        cmd: RecordDecline,
    ) -> Result<CommandResult<Trip, DeclineOutcome>, DomainError> {
        let driver_id = cmd.driver_id.clone();

        self.handler
            .execute(cmd.aggregate_id(), |trip| {
                let outcome = trip.decline(driver_id.clone());
                if outcome.is_recorded() {
                    Ok(Decision::changed(outcome, TripEvent::driver_declined(trip)))
                } else {
                    Ok(Decision::Unchanged(outcome))
                }
            })
            .await
    }

    /// Assigns the driver unless the trip already has one.
    #[tracing::instrument(skip(self))]
    pub async fn apply_accept(
        &self,
        cmd: ApplyAccept,
    ) -> Result<CommandResult<Trip, AcceptOutcome>, DomainError> {
        let driver = cmd.driver.clone();

        self.handler
            .execute(cmd.aggregate_id(), |trip| {
                match trip.accept(driver.clone())? {
                    AcceptOutcome::Assigned => Ok(Decision::changed(
                        AcceptOutcome::Assigned,
                        TripEvent::driver_assigned(trip),
                    )),
                    AcceptOutcome::AlreadyAssigned => {
                        Ok(Decision::Unchanged(AcceptOutcome::AlreadyAssigned))
                    }
                }
            })
            .await
    }

    /// Completes an accepted trip, recording the payment trigger.
    #[tracing::instrument(skip(self))]
    pub async fn apply_completion(
        &self,
        cmd: ApplyCompletion,
    ) -> Result<CommandResult<Trip, ()>, DomainError> {
        self.handler
            .execute(cmd.aggregate_id(), |trip| {
                trip.complete()?;
                Ok(Decision::changed((), TripEvent::trip_completed(trip)))
            })
            .await
    }

    /// Cancels a trip that has not finished.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_trip(
        &self,
        cmd: CancelTrip,
    ) -> Result<CommandResult<Trip, ()>, DomainError> {
        self.handler
            .execute(cmd.aggregate_id(), |trip| {
                trip.cancel()?;
                Ok(Decision::changed_silently(()))
            })
            .await
    }
}
