// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process loopback transport
//!
//! Every socket created from clones of one [`LoopbackTransport`] shares a
//! datagram bus. Routing is by destination port:
//!
//! - multicast destination: sockets on that port that joined the group
//! - limited broadcast (255.255.255.255): every socket on that port
//! - unicast: only the most recently bound socket on that port, the way
//!   Linux picks one receiver among SO_REUSEADDR sockets
//!
//! Faults can be injected (send failure, blocked ports, missing combined
//! multicast bind, join failure, bounded queues) to exercise error paths
//! without touching the OS network stack.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::transport::{DatagramSocket, Transport};

/// First port handed out for ephemeral binds
const EPHEMERAL_PORT_START: u16 = 49152;

#[derive(Debug)]
struct Endpoint {
    port: u16,
    groups: Vec<Ipv4Addr>,
    queue: VecDeque<Vec<u8>>,
}

#[derive(Debug)]
struct Bus {
    endpoints: BTreeMap<u64, Endpoint>,
    next_id: u64,
    next_ephemeral: u16,
    blocked_ports: Vec<u16>,
    fail_sends: bool,
    fail_joins: bool,
    combined_multicast_bind: bool,
    queue_limit: Option<usize>,
    datagrams_sent: u64,
    datagrams_discarded: u64,
}

impl Default for Bus {
    fn default() -> Self {
        Self {
            endpoints: BTreeMap::new(),
            next_id: 0,
            next_ephemeral: EPHEMERAL_PORT_START,
            blocked_ports: Vec::new(),
            fail_sends: false,
            fail_joins: false,
            combined_multicast_bind: true,
            queue_limit: None,
            datagrams_sent: 0,
            datagrams_discarded: 0,
        }
    }
}

impl Bus {
    fn ephemeral_port(&mut self) -> u16 {
        let port = self.next_ephemeral;
        self.next_ephemeral = self
            .next_ephemeral
            .checked_add(1)
            .unwrap_or(EPHEMERAL_PORT_START);
        port
    }

    fn deliver(&mut self, data: &[u8], dest: SocketAddrV4) -> usize {
        let ip = *dest.ip();
        let port = dest.port();
        let limit = self.queue_limit;

        let receivers: Vec<&mut Endpoint> = if ip.is_multicast() {
            self.endpoints
                .values_mut()
                .filter(|e| e.port == port && e.groups.contains(&ip))
                .collect()
        } else if ip.is_broadcast() {
            self.endpoints
                .values_mut()
                .filter(|e| e.port == port)
                .collect()
        } else {
            // Ids grow with bind order: last match is the newest socket
            self.endpoints
                .values_mut()
                .rev()
                .find(|e| e.port == port)
                .into_iter()
                .collect()
        };

        let mut delivered = 0;
        let mut discarded = 0;
        for endpoint in receivers {
            if limit.is_some_and(|max| endpoint.queue.len() >= max) {
                discarded += 1;
                continue;
            }
            endpoint.queue.push_back(data.to_vec());
            delivered += 1;
        }

        self.datagrams_discarded += discarded;
        delivered
    }
}

/// In-process datagram bus
///
/// Clones share the bus. Not `Send`: the whole messaging core runs on one
/// control-loop thread.
#[derive(Clone, Debug, Default)]
pub struct LoopbackTransport {
    bus: Rc<RefCell<Bus>>,
}

impl LoopbackTransport {
    /// Fresh, empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `send_to` fail with [`Error::Send`]
    pub fn set_fail_sends(&self, fail: bool) {
        self.bus.borrow_mut().fail_sends = fail;
    }

    /// Make every `join_multicast` fail with [`Error::MulticastJoin`]
    pub fn set_fail_joins(&self, fail: bool) {
        self.bus.borrow_mut().fail_joins = fail;
    }

    /// Refuse binds on `port` (simulates a port owned by another process)
    pub fn block_port(&self, port: u16) {
        let mut bus = self.bus.borrow_mut();
        if !bus.blocked_ports.contains(&port) {
            bus.blocked_ports.push(port);
        }
    }

    /// Enable or disable the combined bind+join primitive
    pub fn set_combined_multicast_bind(&self, supported: bool) {
        self.bus.borrow_mut().combined_multicast_bind = supported;
    }

    /// Bound each socket's receive queue (`None` = unbounded)
    pub fn set_queue_limit(&self, limit: Option<usize>) {
        self.bus.borrow_mut().queue_limit = limit;
    }

    /// Deliver raw bytes to `dest` as if sent by a foreign host
    pub fn inject(&self, dest: SocketAddrV4, data: &[u8]) -> usize {
        self.bus.borrow_mut().deliver(data, dest)
    }

    /// Datagrams queued on all sockets bound to `port`
    pub fn pending(&self, port: u16) -> usize {
        self.bus
            .borrow()
            .endpoints
            .values()
            .filter(|e| e.port == port)
            .map(|e| e.queue.len())
            .sum()
    }

    /// Number of live sockets
    pub fn socket_count(&self) -> usize {
        self.bus.borrow().endpoints.len()
    }

    /// Successful `send_to` calls across all sockets
    pub fn datagrams_sent(&self) -> u64 {
        self.bus.borrow().datagrams_sent
    }

    /// Datagrams dropped because a receive queue was full
    pub fn datagrams_discarded(&self) -> u64 {
        self.bus.borrow().datagrams_discarded
    }
}

impl Transport for LoopbackTransport {
    type Socket = LoopbackSocket;

    fn bind(&self, port: u16) -> Result<LoopbackSocket> {
        let mut bus = self.bus.borrow_mut();
        if bus.blocked_ports.contains(&port) {
            return Err(Error::Bind {
                port,
                reason: "port blocked".into(),
            });
        }

        let port = if port == 0 { bus.ephemeral_port() } else { port };
        let id = bus.next_id;
        bus.next_id += 1;
        bus.endpoints.insert(
            id,
            Endpoint {
                port,
                groups: Vec::new(),
                queue: VecDeque::new(),
            },
        );

        Ok(LoopbackSocket {
            id,
            port,
            bus: Rc::clone(&self.bus),
        })
    }

    fn bind_multicast(&self, port: u16, group: Ipv4Addr) -> Result<LoopbackSocket> {
        if !self.bus.borrow().combined_multicast_bind {
            return Err(Error::Unsupported("combined multicast bind"));
        }
        let mut socket = self.bind(port)?;
        socket.join_multicast(group)?;
        Ok(socket)
    }
}

/// Socket on a [`LoopbackTransport`] bus; unregisters on drop
#[derive(Debug)]
pub struct LoopbackSocket {
    id: u64,
    port: u16,
    bus: Rc<RefCell<Bus>>,
}

impl DatagramSocket for LoopbackSocket {
    fn send_to(&mut self, data: &[u8], dest: SocketAddrV4) -> Result<usize> {
        let mut bus = self.bus.borrow_mut();
        if bus.fail_sends {
            return Err(Error::Send {
                dest,
                reason: "injected send failure".into(),
            });
        }
        bus.deliver(data, dest);
        bus.datagrams_sent += 1;
        Ok(data.len())
    }

    fn try_recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>> {
        let mut bus = self.bus.borrow_mut();
        let Some(endpoint) = bus.endpoints.get_mut(&self.id) else {
            return Ok(None);
        };
        let Some(datagram) = endpoint.queue.pop_front() else {
            return Ok(None);
        };

        // Truncate like a real datagram socket
        let len = datagram.len().min(buf.len());
        buf[..len].copy_from_slice(&datagram[..len]);
        Ok(Some(len))
    }

    fn join_multicast(&mut self, group: Ipv4Addr) -> Result<()> {
        if !group.is_multicast() {
            return Err(Error::InvalidParameter("not a multicast address"));
        }

        let mut bus = self.bus.borrow_mut();
        if bus.fail_joins {
            return Err(Error::MulticastJoin {
                group,
                reason: "injected join failure".into(),
            });
        }
        if let Some(endpoint) = bus.endpoints.get_mut(&self.id) {
            if !endpoint.groups.contains(&group) {
                endpoint.groups.push(group);
            }
        }
        Ok(())
    }

    fn local_port(&self) -> u16 {
        self.port
    }
}

impl Drop for LoopbackSocket {
    fn drop(&mut self) {
        if let Ok(mut bus) = self.bus.try_borrow_mut() {
            bus.endpoints.remove(&self.id);
        }
    }
}
