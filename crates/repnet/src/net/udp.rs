use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use super::connection::ConnectionId;
use super::protocol::{unix_time_ms, DisconnectReason, Packet, PacketKind, MAX_PACKET_SIZE};
use super::stats::NetworkStats;
use super::transport::{Transport, TransportError};
use crate::queue::Inbox;

/// One rkyv-framed packet per datagram. Unknown senders are learned from
/// their source address.
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
    local_id: Option<ConnectionId>,
    inbox: Option<Inbox>,
    address_book: HashMap<ConnectionId, SocketAddr>,
    recv_buffer: [u8; MAX_PACKET_SIZE],
    stats: NetworkStats,
}

impl UdpTransport {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;

        let local_addr = socket.local_addr()?;

        Ok(Self {
            socket,
            local_addr,
            local_id: None,
            inbox: None,
            address_book: HashMap::new(),
            recv_buffer: [0u8; MAX_PACKET_SIZE],
            stats: NetworkStats::default(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn add_peer(&mut self, id: ConnectionId, addr: SocketAddr) {
        self.address_book.insert(id, addr);
    }

    pub fn peer_addr(&self, id: ConnectionId) -> Option<SocketAddr> {
        self.address_book.get(&id).copied()
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    fn send_to(&mut self, packet: &Packet, addr: SocketAddr) -> Result<usize, TransportError> {
        let data = packet.serialize()?;

        if data.len() > MAX_PACKET_SIZE {
            return Err(TransportError::PacketTooLarge {
                size: data.len(),
                max: MAX_PACKET_SIZE,
            });
        }

        let bytes = self.socket.send_to(&data, addr)?;

        self.stats.packets_sent += 1;
        self.stats.bytes_sent += bytes as u64;

        Ok(bytes)
    }

    fn other_peers(&self, except: ConnectionId) -> Vec<SocketAddr> {
        self.address_book
            .iter()
            .filter(|(id, _)| **id != except)
            .map(|(_, addr)| *addr)
            .collect()
    }
}

impl Transport for UdpTransport {
    fn connect(&mut self, id: ConnectionId, inbox: Inbox) -> Result<(), TransportError> {
        if self.local_id.is_some() {
            let reason = "Already connected";
            inbox.enqueue(Packet::connection_denial(id, reason, unix_time_ms()));
            return Err(TransportError::Denied {
                reason: reason.to_string(),
            });
        }

        inbox.enqueue(Packet::connection_approval(id, unix_time_ms()));
        self.local_id = Some(id);
        self.inbox = Some(inbox);
        log::debug!("Connection {} bound to {}", id, self.local_addr);
        Ok(())
    }

    fn disconnect(
        &mut self,
        id: ConnectionId,
        reason: DisconnectReason,
    ) -> Result<(), TransportError> {
        if self.local_id == Some(id) {
            let notice = Packet::disconnection_notice(id, reason, unix_time_ms());
            for addr in self.other_peers(id) {
                if let Err(e) = self.send_to(&notice, addr) {
                    log::warn!("Failed to notify {} of disconnect: {}", addr, e);
                }
            }
            if let Some(inbox) = self.inbox.take() {
                inbox.enqueue(notice);
            }
            self.local_id = None;
            return Ok(());
        }

        self.address_book
            .remove(&id)
            .map(|_| ())
            .ok_or(TransportError::NotConnected(id))
    }

    fn send(&mut self, target: ConnectionId, packet: &Packet) -> Result<(), TransportError> {
        let addr = self
            .peer_addr(target)
            .ok_or(TransportError::NotConnected(target))?;
        self.send_to(packet, addr)?;
        Ok(())
    }

    fn broadcast(&mut self, packet: &Packet) -> Result<usize, TransportError> {
        let targets = self.other_peers(packet.sender());
        let mut reached = 0;
        let mut first_error = None;
        for addr in targets {
            match self.send_to(packet, addr) {
                Ok(_) => reached += 1,
                Err(e) => {
                    log::warn!("Broadcast to {} failed: {}", addr, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(reached),
        }
    }

    fn poll(&mut self) -> Result<(), TransportError> {
        loop {
            match self.socket.recv_from(&mut self.recv_buffer) {
                Ok((size, addr)) => {
                    let packet = match Packet::deserialize(&self.recv_buffer[..size]) {
                        Ok(packet) => packet,
                        Err(e) => {
                            log::debug!("Discarding undecodable datagram from {}: {}", addr, e);
                            continue;
                        }
                    };

                    self.stats.packets_received += 1;
                    self.stats.bytes_received += size as u64;

                    let sender = packet.sender();
                    if Some(sender) != self.local_id {
                        if packet.kind() == PacketKind::DisconnectionResponse {
                            self.address_book.remove(&sender);
                        } else {
                            self.address_book.entry(sender).or_insert(addr);
                        }
                    }

                    if let Some(inbox) = &self.inbox {
                        inbox.enqueue(packet);
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }
}
