//! Per-variant operation spawners and their chaining logic
//!
//! Each spawner starts one client call and hands its event stream to a
//! dedicated task. Dependent operations are started by explicit calls
//! from inside the handling loops: Register chains into
//! DuplicateRegister, the record attach, and the record Query; Browse
//! chains into Resolve; Resolve chains into the host-address Query.

use crate::error::Result;
use crate::session::Session;
use chrono::Utc;
use dnssd_client::{
    BrowseEvent, BrowseRequest, DomainEvent, DomainScope, EnumerateRequest, QueryEvent,
    QueryRequest, RegisterEvent, RegisterFlags, RegisterRequest, Registration, ResolveEvent,
    ResolveRequest, ServiceLocation, RECORD_CLASS_IN, RECORD_TYPE_A, RECORD_TYPE_RP,
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Record attached to the registration and then queried back.
const RESPONSIBLE_PERSON: &[u8] = b"cookie monster";
const RECORD_TTL: u32 = 3600;

/// Position of a query in the operation chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryRole {
    /// Terminal query of the register chain; its outcome concludes
    /// the run.
    RegisteredRecord,
    /// Address lookup chained from a resolution.
    HostAddress,
}

/// Builds the fully qualified name a record is queried under.
fn full_name(instance_name: &str, service_type: &str, domain: &str) -> String {
    let domain = if domain.is_empty() { "local." } else { domain };
    format!(
        "{}.{}.{}",
        instance_name,
        service_type.trim_end_matches('.'),
        domain.trim_start_matches('.')
    )
}

impl Session {
    /// Registers the test service and handles its confirmation.
    pub(crate) fn start_register(self: &Arc<Self>) -> Result<()> {
        let request = RegisterRequest {
            flags: RegisterFlags::default(),
            interface_index: self.config.interface_index,
            instance_name: self.config.instance_name.clone(),
            service_type: self.config.service_type.clone(),
            domain: self.config.domain.clone(),
            host: String::new(),
            port: self.config.port,
            txt: None,
        };

        let mut registration = self.client.register(request)?;
        let session = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                match registration.next_event().await {
                    Some(RegisterEvent::Registered {
                        flags,
                        instance_name,
                        service_type,
                        domain,
                    }) => {
                        info!(
                            ?flags,
                            instance = %instance_name,
                            service_type = %service_type,
                            domain = %domain,
                            "service registered"
                        );
                        session.continue_register_chain(
                            &mut registration,
                            &instance_name,
                            &service_type,
                            &domain,
                        );
                        // Keep the registration alive so the attached
                        // record stays queryable for the rest of the run.
                    }
                    Some(RegisterEvent::Failed(failure)) => {
                        session.record_failure("register", &failure);
                        registration.release();
                        return;
                    }
                    None => return,
                }
            }
        });

        self.tasks.insert("register".to_string(), handle);
        Ok(())
    }

    /// Continues the register chain once registration is confirmed.
    ///
    /// Spawn order is fixed: the duplicate registration, then the
    /// record attach, then the query for that record — the query
    /// depends on the record being present.
    fn continue_register_chain(
        self: &Arc<Self>,
        registration: &mut Registration,
        instance_name: &str,
        service_type: &str,
        domain: &str,
    ) {
        if let Err(e) = self.start_duplicate_register() {
            self.record_start_error("duplicate register", &e);
        }

        if let Err(e) = registration.add_record(RECORD_TYPE_RP, RESPONSIBLE_PERSON, RECORD_TTL) {
            self.record_start_error("add_record", &e);
            // The chain terminus is unreachable; conclude the run here.
            self.complete();
            return;
        }

        let request = QueryRequest {
            interface_index: self.config.interface_index,
            full_name: full_name(instance_name, service_type, domain),
            record_type: RECORD_TYPE_RP,
            record_class: RECORD_CLASS_IN,
        };
        if let Err(e) = self.start_query(request, QueryRole::RegisteredRecord) {
            self.record_start_error("record query", &e);
            self.complete();
        }
    }

    /// Registers the same instance name again with uniqueness flags
    /// set, on the next port up. The registration is expected to be
    /// rejected; a confirmation is an anomaly worth flagging.
    fn start_duplicate_register(self: &Arc<Self>) -> Result<()> {
        let request = RegisterRequest {
            flags: RegisterFlags {
                no_auto_rename: true,
                unique: true,
            },
            interface_index: self.config.interface_index,
            instance_name: self.config.instance_name.clone(),
            service_type: self.config.service_type.clone(),
            domain: self.config.domain.clone(),
            host: String::new(),
            port: self.config.duplicate_port(),
            txt: None,
        };

        let registration = self.client.register(request)?;
        let session = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                match registration.next_event().await {
                    Some(RegisterEvent::Registered {
                        instance_name,
                        service_type,
                        domain,
                        ..
                    }) => {
                        warn!(
                            instance = %instance_name,
                            service_type = %service_type,
                            domain = %domain,
                            "duplicate registration unexpectedly succeeded"
                        );
                    }
                    Some(RegisterEvent::Failed(failure)) => {
                        session.record_failure("duplicate register", &failure);
                        registration.release();
                        return;
                    }
                    None => return,
                }
            }
        });

        self.tasks.insert("register-duplicate".to_string(), handle);
        Ok(())
    }

    /// Browses for instances of the test type and resolves each
    /// appearance.
    pub(crate) fn start_browse(self: &Arc<Self>) -> Result<()> {
        let request = BrowseRequest {
            interface_index: self.config.interface_index,
            service_type: self.config.service_type.clone(),
            domain: self.config.domain.clone(),
        };

        let op = self.client.browse(request)?;
        let session = Arc::clone(self);
        let handle = tokio::spawn(async move {
            while let Some(event) = op.next_event().await {
                match event {
                    BrowseEvent::Found(location, flags) => {
                        info!(
                            ?flags,
                            interface = location.interface_index,
                            instance = %location.instance_name,
                            service_type = %location.service_type,
                            domain = %location.domain,
                            "service appeared"
                        );
                        session.handle_appearance(location);
                    }
                    BrowseEvent::Lost(location, flags) => {
                        info!(
                            ?flags,
                            interface = location.interface_index,
                            instance = %location.instance_name,
                            "service disappeared"
                        );
                    }
                    BrowseEvent::Failed(failure) => {
                        session.record_failure("browse", &failure);
                        op.release();
                        return;
                    }
                }
            }
        });

        self.tasks.insert("browse".to_string(), handle);
        Ok(())
    }

    /// Starts one resolve per appearance event, unless deduplication
    /// is enabled and this instance has already been seen.
    fn handle_appearance(self: &Arc<Self>, location: ServiceLocation) {
        if self.config.dedup_resolves {
            if self.resolved.contains_key(&location) {
                debug!(
                    instance = %location.instance_name,
                    "repeat appearance of a known instance, skipping resolve"
                );
                return;
            }
            self.resolved.insert(location.clone(), Utc::now());
        }

        info!(instance = %location.instance_name, "resolving");
        if let Err(e) = self.start_resolve(location) {
            self.record_start_error("resolve", &e);
        }
    }

    /// Resolves one instance to host and port, then queries the
    /// host's address record. Released after the first resolution.
    fn start_resolve(self: &Arc<Self>, location: ServiceLocation) -> Result<()> {
        let request = ResolveRequest {
            interface_index: location.interface_index,
            instance_name: location.instance_name,
            service_type: location.service_type,
            domain: location.domain,
        };

        let op = self.client.resolve(request)?;
        let session = Arc::clone(self);
        let handle = tokio::spawn(async move {
            match op.next_event().await {
                Some(ResolveEvent::Resolved {
                    flags,
                    interface_index,
                    full_name,
                    host,
                    port,
                    txt,
                }) => {
                    let pairs: Vec<String> = txt
                        .iter()
                        .map(|(key, value)| {
                            let value = value
                                .map(|v| String::from_utf8_lossy(v).into_owned())
                                .unwrap_or_default();
                            format!("{}={}", key, value)
                        })
                        .collect();
                    info!(
                        ?flags,
                        interface = interface_index,
                        full_name = %full_name,
                        host = %host,
                        port,
                        txt = %pairs.join(" "),
                        "service resolved"
                    );

                    info!(host = %host, "querying address record");
                    let request = QueryRequest {
                        interface_index,
                        full_name: host,
                        record_type: RECORD_TYPE_A,
                        record_class: RECORD_CLASS_IN,
                    };
                    if let Err(e) = session.start_query(request, QueryRole::HostAddress) {
                        session.record_start_error("address query", &e);
                    }
                    op.release();
                }
                Some(ResolveEvent::Failed(failure)) => {
                    session.record_failure("resolve", &failure);
                    op.release();
                }
                None => {}
            }
        });

        self.tasks.insert(format!("resolve-{}", Uuid::new_v4()), handle);
        Ok(())
    }

    /// Queries one resource record and logs its answers. The
    /// register-chain record query concludes the run on its first
    /// answer or failure; the address query does not chain further.
    fn start_query(self: &Arc<Self>, request: QueryRequest, role: QueryRole) -> Result<()> {
        let op = self.client.query_record(request)?;
        let session = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                match op.next_event().await {
                    Some(QueryEvent::Answered(answer)) => {
                        // Record text rides in ISO-8859-1.
                        let text: String = answer.rdata.iter().map(|&b| b as char).collect();
                        info!(
                            flags = ?answer.flags,
                            interface = answer.interface_index,
                            full_name = %answer.full_name,
                            record_type = answer.record_type,
                            record_class = answer.record_class,
                            ttl = answer.ttl,
                            data = %text,
                            "query answered"
                        );
                        if role == QueryRole::RegisteredRecord {
                            op.release();
                            session.complete();
                            return;
                        }
                    }
                    Some(QueryEvent::Failed(failure)) => {
                        session.record_failure("query", &failure);
                        op.release();
                        if role == QueryRole::RegisteredRecord {
                            session.complete();
                        }
                        return;
                    }
                    None => return,
                }
            }
        });

        self.tasks.insert(format!("query-{}", Uuid::new_v4()), handle);
        Ok(())
    }

    /// Enumerates browsing domains and logs appearances and
    /// disappearances.
    pub(crate) fn start_domain_enumerate(self: &Arc<Self>) -> Result<()> {
        let request = EnumerateRequest {
            interface_index: self.config.interface_index,
            scope: DomainScope::Browse,
        };

        let op = self.client.enumerate_domains(request)?;
        let session = Arc::clone(self);
        let handle = tokio::spawn(async move {
            while let Some(event) = op.next_event().await {
                match event {
                    DomainEvent::Found {
                        flags,
                        interface_index,
                        domain,
                    } => {
                        info!(
                            ?flags,
                            interface = interface_index,
                            domain = %domain,
                            "browsing domain appeared"
                        );
                    }
                    DomainEvent::Lost {
                        flags,
                        interface_index,
                        domain,
                    } => {
                        info!(
                            ?flags,
                            interface = interface_index,
                            domain = %domain,
                            "browsing domain disappeared"
                        );
                    }
                    DomainEvent::Failed(failure) => {
                        session.record_failure("domain enumeration", &failure);
                        op.release();
                        return;
                    }
                }
            }
        });

        self.tasks.insert("domains".to_string(), handle);
        Ok(())
    }
}
