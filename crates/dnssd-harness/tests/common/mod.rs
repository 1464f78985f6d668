//! Scripted in-memory discovery client for driving the session from
//! tests: every start call is recorded, and the test holds the event
//! sender for each operation it hands out.

#![allow(dead_code)]

use async_channel::Sender;
use dnssd_client::{
    BrowseEvent, BrowseRequest, ClientError, DnssdClient, DomainEvent, EnumerateRequest,
    Operation, QueryEvent, QueryRequest, RegisterEvent, RegisterRequest, Registration,
    RegistrationControl, ResolveEvent, ResolveRequest,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A record attached to a scripted registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedRecord {
    pub record_type: u16,
    pub rdata: Vec<u8>,
    pub ttl: u32,
}

#[derive(Clone)]
pub struct RegisterCall {
    pub request: RegisterRequest,
    pub events: Sender<RegisterEvent>,
    pub records: Arc<Mutex<Vec<AttachedRecord>>>,
}

#[derive(Clone)]
pub struct BrowseCall {
    pub request: BrowseRequest,
    pub events: Sender<BrowseEvent>,
}

#[derive(Clone)]
pub struct ResolveCall {
    pub request: ResolveRequest,
    pub events: Sender<ResolveEvent>,
}

#[derive(Clone)]
pub struct QueryCall {
    pub request: QueryRequest,
    pub events: Sender<QueryEvent>,
}

#[derive(Clone)]
pub struct DomainCall {
    pub request: EnumerateRequest,
    pub events: Sender<DomainEvent>,
}

#[derive(Default)]
struct Recorded {
    registers: Vec<RegisterCall>,
    browses: Vec<BrowseCall>,
    resolves: Vec<ResolveCall>,
    queries: Vec<QueryCall>,
    domains: Vec<DomainCall>,
}

/// In-memory [`DnssdClient`] whose event streams are fed by the test.
#[derive(Default)]
pub struct ScriptedClient {
    recorded: Mutex<Recorded>,
    fail_starts: Mutex<HashSet<&'static str>>,
    fail_add_record: Mutex<bool>,
    released: Arc<AtomicUsize>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the named operation fail to start from now on.
    pub fn fail_start(&self, operation: &'static str) {
        self.fail_starts.lock().unwrap().insert(operation);
    }

    /// Makes `add_record` fail on registrations started from now on.
    pub fn fail_add_record(&self) {
        *self.fail_add_record.lock().unwrap() = true;
    }

    /// How many operation handles have been released so far.
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn register_calls(&self) -> Vec<RegisterCall> {
        self.recorded.lock().unwrap().registers.clone()
    }

    pub fn browse_calls(&self) -> Vec<BrowseCall> {
        self.recorded.lock().unwrap().browses.clone()
    }

    pub fn resolve_calls(&self) -> Vec<ResolveCall> {
        self.recorded.lock().unwrap().resolves.clone()
    }

    pub fn query_calls(&self) -> Vec<QueryCall> {
        self.recorded.lock().unwrap().queries.clone()
    }

    pub fn domain_calls(&self) -> Vec<DomainCall> {
        self.recorded.lock().unwrap().domains.clone()
    }

    fn release_counter(&self) -> impl FnOnce() + Send + 'static {
        let released = Arc::clone(&self.released);
        move || {
            released.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn check_start(&self, operation: &'static str) -> Result<(), ClientError> {
        if self.fail_starts.lock().unwrap().contains(operation) {
            return Err(ClientError::StartFailed {
                operation,
                reason: "scripted start failure".to_string(),
            });
        }
        Ok(())
    }
}

struct ScriptedControl {
    records: Arc<Mutex<Vec<AttachedRecord>>>,
    fail: bool,
}

impl RegistrationControl for ScriptedControl {
    fn add_record(&mut self, record_type: u16, rdata: &[u8], ttl: u32) -> Result<(), ClientError> {
        if self.fail {
            return Err(ClientError::RecordAttachFailed {
                reason: "scripted attach failure".to_string(),
            });
        }
        self.records.lock().unwrap().push(AttachedRecord {
            record_type,
            rdata: rdata.to_vec(),
            ttl,
        });
        Ok(())
    }
}

impl DnssdClient for ScriptedClient {
    fn register(&self, request: RegisterRequest) -> Result<Registration, ClientError> {
        self.check_start("register")?;

        let (tx, rx) = async_channel::unbounded();
        let records = Arc::new(Mutex::new(Vec::new()));
        let op = Operation::new(rx, self.release_counter());
        let control = ScriptedControl {
            records: Arc::clone(&records),
            fail: *self.fail_add_record.lock().unwrap(),
        };

        self.recorded.lock().unwrap().registers.push(RegisterCall {
            request,
            events: tx,
            records,
        });
        Ok(Registration::new(op, Box::new(control)))
    }

    fn browse(&self, request: BrowseRequest) -> Result<Operation<BrowseEvent>, ClientError> {
        self.check_start("browse")?;

        let (tx, rx) = async_channel::unbounded();
        let op = Operation::new(rx, self.release_counter());
        self.recorded.lock().unwrap().browses.push(BrowseCall {
            request,
            events: tx,
        });
        Ok(op)
    }

    fn resolve(&self, request: ResolveRequest) -> Result<Operation<ResolveEvent>, ClientError> {
        self.check_start("resolve")?;

        let (tx, rx) = async_channel::unbounded();
        let op = Operation::new(rx, self.release_counter());
        self.recorded.lock().unwrap().resolves.push(ResolveCall {
            request,
            events: tx,
        });
        Ok(op)
    }

    fn query_record(&self, request: QueryRequest) -> Result<Operation<QueryEvent>, ClientError> {
        self.check_start("query_record")?;

        let (tx, rx) = async_channel::unbounded();
        let op = Operation::new(rx, self.release_counter());
        self.recorded.lock().unwrap().queries.push(QueryCall {
            request,
            events: tx,
        });
        Ok(op)
    }

    fn enumerate_domains(
        &self,
        request: EnumerateRequest,
    ) -> Result<Operation<DomainEvent>, ClientError> {
        self.check_start("enumerate_domains")?;

        let (tx, rx) = async_channel::unbounded();
        let op = Operation::new(rx, self.release_counter());
        self.recorded.lock().unwrap().domains.push(DomainCall {
            request,
            events: tx,
        });
        Ok(op)
    }
}
