//! Command handling infrastructure.
//!
//! Every mutation goes through [`CommandHandler::execute`], which loads the
//! aggregate together with its stored version, lets the command decide on the
//! loaded state, and saves with that version as a precondition. A save that
//! loses a concurrent race is retried from a fresh load.

use std::marker::PhantomData;

use document_store::{Document, DocumentStore, OutboxMessage, SaveOptions, Version};

use crate::aggregate::{Aggregate, DomainEvent};
use crate::error::DomainError;

/// Default number of load-decide-save attempts before giving up on conflicts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// What a command decided after inspecting (and possibly mutating) an aggregate.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision<E, T> {
    /// Nothing changed; no write happens.
    Unchanged(T),

    /// The aggregate changed and must be saved, optionally recording an
    /// event for downstream consumers in the same write.
    Changed { output: T, event: Option<E> },
}

impl<E, T> Decision<E, T> {
    /// A change that records an event.
    pub fn changed(output: T, event: E) -> Self {
        Decision::Changed {
            output,
            event: Some(event),
        }
    }

    /// A change with no downstream effect.
    pub fn changed_silently(output: T) -> Self {
        Decision::Changed {
            output,
            event: None,
        }
    }
}

/// Result of command execution.
#[derive(Debug, Clone)]
pub struct CommandResult<A: Aggregate, T> {
    /// The aggregate after the command.
    pub aggregate: A,

    /// What the command reported.
    pub output: T,

    /// The stored version of the aggregate after the command.
    pub version: Version,

    /// True if the command wrote to the store.
    pub changed: bool,

    /// The outbox message written with the change, if any.
    pub outbox: Option<OutboxMessage>,
}

/// Trait for commands that can be executed against an aggregate.
///
/// Commands represent an intention to perform an action. They may be rejected
/// if the aggregate's current state doesn't allow the action.
pub trait Command: Send + Sync {
    /// The type of aggregate this command targets.
    type Aggregate: Aggregate;

    /// Returns the key of the aggregate this command targets.
    fn aggregate_id(&self) -> &str;
}

/// Handler for executing commands against aggregates.
///
/// The handler is responsible for:
/// 1. Loading the aggregate and its version from the document store
/// 2. Running the command against the loaded state
/// 3. Saving the new state and its outbox message atomically, guarded by the loaded version
/// 4. Retrying from step 1 when the guard rejects the save
pub struct CommandHandler<S, A>
where
    S: DocumentStore,
    A: Aggregate,
{
    store: S,
    max_attempts: u32,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: DocumentStore,
    A: Aggregate,
{
    /// Creates a new command handler with the given document store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            _phantom: PhantomData,
        }
    }

    /// Sets the number of attempts made before conflicts are surfaced.
    ///
    /// Values below 1 are raised to 1.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Returns a reference to the underlying document store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the configured number of attempts.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Loads an aggregate with its stored version.
    ///
    /// Returns None if the aggregate doesn't exist.
    pub async fn load(&self, id: &str) -> Result<Option<(A, Version)>, DomainError> {
        match self.store.get(A::aggregate_type(), id).await? {
            Some(document) => Ok(Some((document.decode()?, document.version))),
            None => Ok(None),
        }
    }

    /// Loads an aggregate, failing with `AggregateNotFound` if it doesn't exist.
    pub async fn load_required(&self, id: &str) -> Result<(A, Version), DomainError> {
        self.load(id)
            .await?
            .ok_or_else(|| DomainError::AggregateNotFound {
                aggregate_type: A::aggregate_type(),
                aggregate_id: id.to_string(),
            })
    }

    /// Stores a brand-new aggregate.
    pub async fn create(&self, aggregate: A) -> Result<CommandResult<A, ()>, DomainError> {
        let document = Document::from_value(A::aggregate_type(), aggregate.id(), &aggregate)?;
        let version = self.store.insert(document).await?;

        Ok(CommandResult {
            aggregate,
            output: (),
            version,
            changed: true,
            outbox: None,
        })
    }

    /// Executes a command as a guarded read-modify-write cycle.
    ///
    /// The command function receives a freshly loaded aggregate on every
    /// attempt and may mutate it. It must return [`Decision::Unchanged`]
    /// only if it left the aggregate untouched.
    pub async fn execute<T, F>(
        &self,
        id: &str,
        mut command_fn: F,
    ) -> Result<CommandResult<A, T>, DomainError>
    where
        T: Send,
        F: FnMut(&mut A) -> Result<Decision<A::Event, T>, A::Error> + Send,
        DomainError: From<A::Error>,
    {
        for attempt in 1..=self.max_attempts {
            let (mut aggregate, version) = self.load_required(id).await?;

            let (output, event) = match command_fn(&mut aggregate)? {
                Decision::Unchanged(output) => {
                    return Ok(CommandResult {
                        aggregate,
                        output,
                        version,
                        changed: false,
                        outbox: None,
                    });
                }
                Decision::Changed { output, event } => (output, event),
            };

            let document = Document::from_value(A::aggregate_type(), id, &aggregate)?;
            let outbox = event
                .map(|event| {
                    OutboxMessage::from_event(A::aggregate_type(), id, event.event_type(), &event)
                })
                .transpose()?;

            match self
                .store
                .save(
                    document,
                    SaveOptions::expect_version(version),
                    outbox.iter().cloned().collect(),
                )
                .await
            {
                Ok(version) => {
                    return Ok(CommandResult {
                        aggregate,
                        output,
                        version,
                        changed: true,
                        outbox,
                    });
                }
                Err(e) if e.is_conflict() => {
                    metrics::counter!("trip_store_conflicts_total").increment(1);
                    tracing::debug!(
                        aggregate_type = A::aggregate_type(),
                        aggregate_id = id,
                        attempt,
                        "save lost a concurrent update, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(
            aggregate_type = A::aggregate_type(),
            aggregate_id = id,
            attempts = self.max_attempts,
            "giving up after repeated conflicts"
        );
        Err(DomainError::ConflictRetriesExhausted {
            aggregate_type: A::aggregate_type(),
            aggregate_id: id.to_string(),
            attempts: self.max_attempts,
        })
    }
}
