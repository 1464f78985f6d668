//! Requests, events, and operation handles for the DNS-SD surface
//!
//! Each asynchronous discovery call returns a cancellable
//! [`Operation`] handle carrying a channel of that call's event kind.
//! Events for one operation arrive in emission order and are consumed
//! by a single task; events across operations are unordered relative
//! to each other.

use crate::error::{OperationFailure, Result};
use crate::txt::TxtRecord;
use async_channel::Receiver;

/// DNS A (host address) resource record type.
pub const RECORD_TYPE_A: u16 = 1;
/// DNS RP (responsible person) resource record type.
pub const RECORD_TYPE_RP: u16 = 17;
/// DNS IN record class.
pub const RECORD_CLASS_IN: u16 = 1;

/// Flags controlling service registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterFlags {
    /// Fail on a name conflict instead of renaming the instance.
    pub no_auto_rename: bool,
    /// Advertise the records as unique rather than shared.
    pub unique: bool,
}

/// Flags reported alongside a delivered event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventFlags {
    /// The record is being added (as opposed to removed).
    pub add: bool,
    /// More events follow immediately; coalescing is possible.
    pub more_coming: bool,
}

/// Parameters for registering a service advertisement.
#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub flags: RegisterFlags,
    /// Interface to register on; 0 means all interfaces.
    pub interface_index: u32,
    pub instance_name: String,
    /// Service type of the `_name._proto` shape.
    pub service_type: String,
    /// Registration domain; empty selects the default domain.
    pub domain: String,
    /// Target host; empty selects the local host.
    pub host: String,
    pub port: u16,
    /// Optional attribute record to attach at registration time.
    pub txt: Option<TxtRecord>,
}

/// Parameters for browsing for service instances.
#[derive(Debug, Clone)]
pub struct BrowseRequest {
    pub interface_index: u32,
    pub service_type: String,
    pub domain: String,
}

/// Parameters for resolving a browsed instance to host and port.
#[derive(Debug, Clone)]
pub struct ResolveRequest {
    pub interface_index: u32,
    pub instance_name: String,
    pub service_type: String,
    pub domain: String,
}

/// Parameters for querying a raw resource record.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub interface_index: u32,
    pub full_name: String,
    pub record_type: u16,
    pub record_class: u16,
}

/// Which class of domains to enumerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainScope {
    /// Domains recommended for browsing.
    Browse,
    /// Domains recommended for registration.
    Registration,
}

/// Parameters for enumerating discovery domains.
#[derive(Debug, Clone)]
pub struct EnumerateRequest {
    pub interface_index: u32,
    pub scope: DomainScope,
}

/// The browse-event identity of a service instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceLocation {
    pub interface_index: u32,
    pub instance_name: String,
    pub service_type: String,
    pub domain: String,
}

/// Events from a register operation.
#[derive(Debug, Clone)]
pub enum RegisterEvent {
    /// The registration was confirmed under the reported name.
    Registered {
        flags: EventFlags,
        instance_name: String,
        service_type: String,
        domain: String,
    },
    Failed(OperationFailure),
}

/// Events from a browse operation.
#[derive(Debug, Clone)]
pub enum BrowseEvent {
    /// A service instance appeared.
    Found(ServiceLocation, EventFlags),
    /// A service instance disappeared.
    Lost(ServiceLocation, EventFlags),
    Failed(OperationFailure),
}

/// Events from a resolve operation.
#[derive(Debug, Clone)]
pub enum ResolveEvent {
    Resolved {
        flags: EventFlags,
        interface_index: u32,
        full_name: String,
        host: String,
        port: u16,
        txt: TxtRecord,
    },
    Failed(OperationFailure),
}

/// A single resource-record answer.
#[derive(Debug, Clone)]
pub struct RecordAnswer {
    pub flags: EventFlags,
    pub interface_index: u32,
    pub full_name: String,
    pub record_type: u16,
    pub record_class: u16,
    pub rdata: Vec<u8>,
    pub ttl: u32,
}

/// Events from a record query operation.
#[derive(Debug, Clone)]
pub enum QueryEvent {
    Answered(RecordAnswer),
    Failed(OperationFailure),
}

/// Events from a domain enumeration operation.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    Found {
        flags: EventFlags,
        interface_index: u32,
        domain: String,
    },
    Lost {
        flags: EventFlags,
        interface_index: u32,
        domain: String,
    },
    Failed(OperationFailure),
}

type CancelFn = Box<dyn FnOnce() + Send + Sync>;

/// A live, cancellable handle on one in-flight discovery call.
///
/// Dropping the handle or calling [`release`](Operation::release)
/// stops further event delivery; the cancel action runs exactly once.
pub struct Operation<E> {
    events: Receiver<E>,
    cancel: Option<CancelFn>,
}

impl<E> Operation<E> {
    pub fn new(events: Receiver<E>, cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            events,
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Receives the next event, or `None` once the backend has closed
    /// the stream.
    pub async fn next_event(&self) -> Option<E> {
        self.events.recv().await.ok()
    }

    /// Explicitly releases the underlying resource.
    pub fn release(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl<E> Drop for Operation<E> {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl<E> std::fmt::Debug for Operation<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("released", &self.cancel.is_none())
            .finish()
    }
}

/// Backend control surface of a live registration.
pub trait RegistrationControl: Send + Sync {
    /// Attaches an extra resource record to the registration.
    fn add_record(&mut self, record_type: u16, rdata: &[u8], ttl: u32) -> Result<()>;
}

/// A register operation: an event stream plus record-attachment
/// control over the live registration.
pub struct Registration {
    op: Operation<RegisterEvent>,
    control: Box<dyn RegistrationControl>,
}

impl Registration {
    pub fn new(op: Operation<RegisterEvent>, control: Box<dyn RegistrationControl>) -> Self {
        Self { op, control }
    }

    pub async fn next_event(&self) -> Option<RegisterEvent> {
        self.op.next_event().await
    }

    pub fn add_record(&mut self, record_type: u16, rdata: &[u8], ttl: u32) -> Result<()> {
        self.control.add_record(record_type, rdata, ttl)
    }

    pub fn release(self) {
        self.op.release();
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration").field("op", &self.op).finish()
    }
}

/// The discovery facility the harness drives.
///
/// Each call starts one asynchronous operation and returns its handle
/// synchronously, or a [`ClientError`](crate::error::ClientError) if
/// the call could not be initiated at all.
pub trait DnssdClient: Send + Sync {
    fn register(&self, request: RegisterRequest) -> Result<Registration>;

    fn browse(&self, request: BrowseRequest) -> Result<Operation<BrowseEvent>>;

    fn resolve(&self, request: ResolveRequest) -> Result<Operation<ResolveEvent>>;

    fn query_record(&self, request: QueryRequest) -> Result<Operation<QueryEvent>>;

    fn enumerate_domains(&self, request: EnumerateRequest) -> Result<Operation<DomainEvent>>;
}
