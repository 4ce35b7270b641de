//! Sea-ORM entity definitions
//!
//! These map the sync core's stores to database tables.

pub mod change_event;
pub mod device_sync_state;
pub mod event_ack;
pub mod ingest_error;

// Re-export all entities
pub use change_event::Entity as ChangeEvent;
pub use device_sync_state::Entity as DeviceSyncState;
pub use event_ack::Entity as EventAck;
pub use ingest_error::Entity as IngestError;

// Re-export active models for easy access
pub use change_event::ActiveModel as ChangeEventActive;
pub use device_sync_state::ActiveModel as DeviceSyncStateActive;
pub use event_ack::ActiveModel as EventAckActive;
pub use ingest_error::ActiveModel as IngestErrorActive;
