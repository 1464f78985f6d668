//! Abstract DNS-SD client surface for the exerciser harness.
//!
//! This crate defines the operation requests, the per-kind event enums
//! delivered over cancellable operation handles, and the attribute
//! (TXT) record codec. The harness only ever talks to the
//! [`DnssdClient`] trait; the default backend is [`MdnsClient`], an
//! adapter over the `mdns-sd` crate that implements the subset of the
//! surface the crate can express and reports the rest as unsupported
//! at start time.

pub mod error;
pub mod mdns;
pub mod txt;
pub mod types;

pub use error::{ClientError, OperationFailure, Result, TxtError};
pub use mdns::MdnsClient;
pub use txt::TxtRecord;
pub use types::{
    BrowseEvent, BrowseRequest, DnssdClient, DomainEvent, DomainScope, EnumerateRequest,
    EventFlags, Operation, QueryEvent, QueryRequest, RecordAnswer, RegisterEvent, RegisterFlags,
    RegisterRequest, Registration, RegistrationControl, ResolveEvent, ResolveRequest,
    ServiceLocation, RECORD_CLASS_IN, RECORD_TYPE_A, RECORD_TYPE_RP,
};
