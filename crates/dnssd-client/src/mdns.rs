//! `mdns-sd`-backed implementation of the client surface
//!
//! The daemon covers registration, browsing, and resolution. Raw
//! record queries, domain enumeration, unique-registration flags, and
//! record attachment have no equivalent in its public API; those
//! operations fail to start as [`ClientError::Unsupported`] and the
//! harness logs and abandons them.

use crate::error::{ClientError, Result};
use crate::txt::TxtRecord;
use crate::types::{
    BrowseEvent, BrowseRequest, DnssdClient, DomainEvent, EnumerateRequest, EventFlags, Operation,
    QueryEvent, QueryRequest, RegisterEvent, RegisterRequest, Registration, RegistrationControl,
    ResolveEvent, ResolveRequest, ServiceLocation,
};
use mdns_sd::{ServiceDaemon, ServiceEvent as MdnsEvent, ServiceInfo};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// DNS-SD client backed by an `mdns-sd` [`ServiceDaemon`].
pub struct MdnsClient {
    daemon: Arc<ServiceDaemon>,
    host: String,
}

impl MdnsClient {
    /// Creates the client and its underlying daemon.
    pub fn new() -> Result<Self> {
        let daemon = ServiceDaemon::new().map_err(|e| ClientError::DaemonInit {
            reason: e.to_string(),
        })?;

        let host = hostname::get()
            .map(|h| format!("{}.local.", h.to_string_lossy()))
            .unwrap_or_else(|_| "localhost.local.".to_string());

        Ok(Self {
            daemon: Arc::new(daemon),
            host,
        })
    }
}

/// Joins a bare service type and domain into the fully qualified form
/// the daemon expects, e.g. `_unittest._udp` + `` → `_unittest._udp.local.`.
fn qualified_type(service_type: &str, domain: &str) -> String {
    let domain = if domain.is_empty() { "local." } else { domain };
    let mut qualified = format!(
        "{}.{}",
        service_type.trim_end_matches('.'),
        domain.trim_start_matches('.')
    );
    if !qualified.ends_with('.') {
        qualified.push('.');
    }
    qualified
}

/// Recovers the instance name from a fully qualified service name.
fn instance_name(full_name: &str, qualified_type: &str) -> String {
    full_name
        .strip_suffix(qualified_type)
        .and_then(|s| s.strip_suffix('.'))
        .unwrap_or(full_name)
        .to_string()
}

fn effective_domain(domain: &str) -> String {
    if domain.is_empty() {
        "local.".to_string()
    } else {
        domain.to_string()
    }
}

struct MdnsRegistrationControl;

impl RegistrationControl for MdnsRegistrationControl {
    fn add_record(&mut self, _record_type: u16, _rdata: &[u8], _ttl: u32) -> Result<()> {
        Err(ClientError::Unsupported {
            operation: "add_record",
        })
    }
}

impl DnssdClient for MdnsClient {
    fn register(&self, request: RegisterRequest) -> Result<Registration> {
        if request.flags.no_auto_rename || request.flags.unique {
            return Err(ClientError::Unsupported {
                operation: "unique registration",
            });
        }

        let ty = qualified_type(&request.service_type, &request.domain);
        let host = if request.host.is_empty() {
            self.host.clone()
        } else {
            request.host.clone()
        };

        let mut properties = HashMap::new();
        if let Some(txt) = &request.txt {
            for (key, value) in txt.iter() {
                let value = value
                    .map(|v| String::from_utf8_lossy(v).into_owned())
                    .unwrap_or_default();
                properties.insert(key.to_string(), value);
            }
        }

        let info = ServiceInfo::new(
            &ty,
            &request.instance_name,
            &host,
            "",
            request.port,
            properties,
        )
        .map_err(|e| ClientError::StartFailed {
            operation: "register",
            reason: e.to_string(),
        })?;

        let full_name = info.get_fullname().to_string();
        self.daemon
            .register(info)
            .map_err(|e| ClientError::StartFailed {
                operation: "register",
                reason: e.to_string(),
            })?;

        let (tx, rx) = async_channel::unbounded();
        // The daemon reports no registration callback; a successful
        // register call stands in for the confirmation event.
        tx.try_send(RegisterEvent::Registered {
            flags: EventFlags::default(),
            instance_name: request.instance_name.clone(),
            service_type: request.service_type.clone(),
            domain: effective_domain(&request.domain),
        })
        .ok();

        let daemon = Arc::clone(&self.daemon);
        let op = Operation::new(rx, move || {
            drop(tx);
            let _ = daemon.unregister(&full_name);
        });
        Ok(Registration::new(op, Box::new(MdnsRegistrationControl)))
    }

    fn browse(&self, request: BrowseRequest) -> Result<Operation<BrowseEvent>> {
        let ty = qualified_type(&request.service_type, &request.domain);
        let receiver = self
            .daemon
            .browse(&ty)
            .map_err(|e| ClientError::StartFailed {
                operation: "browse",
                reason: e.to_string(),
            })?;

        let (tx, rx) = async_channel::unbounded();
        let service_type = request.service_type.clone();
        let domain = effective_domain(&request.domain);
        let interface_index = request.interface_index;
        let ty_for_task = ty.clone();

        let task = tokio::spawn(async move {
            while let Ok(event) = receiver.recv_async().await {
                let forwarded = match event {
                    MdnsEvent::ServiceFound(_, full_name) => Some(BrowseEvent::Found(
                        ServiceLocation {
                            interface_index,
                            instance_name: instance_name(&full_name, &ty_for_task),
                            service_type: service_type.clone(),
                            domain: domain.clone(),
                        },
                        EventFlags {
                            add: true,
                            more_coming: false,
                        },
                    )),
                    MdnsEvent::ServiceRemoved(_, full_name) => Some(BrowseEvent::Lost(
                        ServiceLocation {
                            interface_index,
                            instance_name: instance_name(&full_name, &ty_for_task),
                            service_type: service_type.clone(),
                            domain: domain.clone(),
                        },
                        EventFlags::default(),
                    )),
                    MdnsEvent::SearchStarted(t) => {
                        debug!(service_type = t, "search started");
                        None
                    }
                    MdnsEvent::SearchStopped(t) => {
                        debug!(service_type = t, "search stopped");
                        None
                    }
                    _ => None,
                };

                if let Some(event) = forwarded {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
            }
        });

        let daemon = Arc::clone(&self.daemon);
        Ok(Operation::new(rx, move || {
            let _ = daemon.stop_browse(&ty);
            task.abort();
        }))
    }

    fn resolve(&self, request: ResolveRequest) -> Result<Operation<ResolveEvent>> {
        let ty = qualified_type(&request.service_type, &request.domain);
        let receiver = self
            .daemon
            .browse(&ty)
            .map_err(|e| ClientError::StartFailed {
                operation: "resolve",
                reason: e.to_string(),
            })?;

        let (tx, rx) = async_channel::unbounded();
        let wanted = request.instance_name.clone();
        let interface_index = request.interface_index;
        let ty_for_task = ty.clone();

        let task = tokio::spawn(async move {
            while let Ok(event) = receiver.recv_async().await {
                if let MdnsEvent::ServiceResolved(info) = event {
                    if instance_name(info.get_fullname(), &ty_for_task) != wanted {
                        continue;
                    }

                    let mut txt = TxtRecord::new();
                    for prop in info.get_properties().iter() {
                        txt.set(prop.key(), prop.val_str());
                    }

                    let resolved = ResolveEvent::Resolved {
                        flags: EventFlags::default(),
                        interface_index,
                        full_name: info.get_fullname().to_string(),
                        host: info.get_hostname().to_string(),
                        port: info.get_port(),
                        txt,
                    };
                    if tx.send(resolved).await.is_err() {
                        break;
                    }
                }
            }
        });

        let daemon = Arc::clone(&self.daemon);
        Ok(Operation::new(rx, move || {
            let _ = daemon.stop_browse(&ty);
            task.abort();
        }))
    }

    fn query_record(&self, _request: QueryRequest) -> Result<Operation<QueryEvent>> {
        Err(ClientError::Unsupported {
            operation: "query_record",
        })
    }

    fn enumerate_domains(&self, _request: EnumerateRequest) -> Result<Operation<DomainEvent>> {
        Err(ClientError::Unsupported {
            operation: "enumerate_domains",
        })
    }
}
