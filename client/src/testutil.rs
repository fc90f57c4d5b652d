//! Scripted transport plumbing shared by the unit tests.

use crate::connection::Connection;
use crate::transport::Transport;
use bincode::{deserialize, serialize};
use shared::{ClientEvent, ServerEvent};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::time::Instant;

/// Shared handle to the fake channel: tests queue inbound frames and
/// inspect outbound frames after the transport moved into a connection.
pub struct FakeWire {
    pub inbound: VecDeque<Vec<u8>>,
    pub sent: Vec<Vec<u8>>,
    pub open: bool,
}

pub struct FakeTransport {
    wire: Rc<RefCell<FakeWire>>,
}

impl FakeTransport {
    pub fn new() -> (Self, Rc<RefCell<FakeWire>>) {
        let wire = Rc::new(RefCell::new(FakeWire {
            inbound: VecDeque::new(),
            sent: Vec::new(),
            open: true,
        }));
        (
            Self {
                wire: Rc::clone(&wire),
            },
            wire,
        )
    }
}

impl Transport for FakeTransport {
    fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        let mut wire = self.wire.borrow_mut();
        if !wire.open {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "transport closed",
            ));
        }
        wire.sent.push(frame.to_vec());
        Ok(())
    }

    fn try_recv(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        let mut wire = self.wire.borrow_mut();
        if !wire.open {
            return Ok(None);
        }
        match wire.inbound.pop_front() {
            Some(frame) => {
                buf[..frame.len()].copy_from_slice(&frame);
                Ok(Some(frame.len()))
            }
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        self.wire.borrow_mut().open = false;
    }

    fn is_open(&self) -> bool {
        self.wire.borrow().open
    }
}

pub fn push_event(wire: &Rc<RefCell<FakeWire>>, event: &ServerEvent) {
    wire.borrow_mut()
        .inbound
        .push_back(serialize(event).expect("serialize server event"));
}

pub fn sent_events(wire: &Rc<RefCell<FakeWire>>) -> Vec<ClientEvent> {
    wire.borrow()
        .sent
        .iter()
        .map(|frame| deserialize(frame).expect("deserialize client frame"))
        .collect()
}

/// Opens a connection over `transport` and walks it through the
/// `Connected` acknowledgment so tests start from a live session.
pub fn established_connection(
    transport: FakeTransport,
    wire: &Rc<RefCell<FakeWire>>,
    identity: &str,
) -> Connection {
    let mut connection = Connection::open(Box::new(transport), identity);
    push_event(wire, &ServerEvent::Connected);
    connection.poll(Instant::now());
    assert!(connection.is_connected());
    connection
}
