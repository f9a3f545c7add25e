use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::{Packet, PacketQueue, PacketType};

/// Maps `PacketType` to the one `PacketQueue` that type is routed to.
/// O(1) lookup; spec §4.2 expects typically 2 routes per session.
pub struct Router {
    routes: HashMap<PacketType, Rc<RefCell<PacketQueue>>>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: HashMap::with_capacity(2),
        }
    }

    /// Registers `queue` as the sink for `packet_type`. A duplicate
    /// registration is a programmer error and panics loudly, per spec
    /// §4.2 ("duplicate type is a programmer error and fails loudly").
    pub fn add_route(&mut self, packet_type: PacketType, queue: Rc<RefCell<PacketQueue>>) {
        if self.routes.insert(packet_type, queue).is_some() {
            panic!("router: duplicate route registered for {packet_type:?}");
        }
    }

    /// Dispatches `packet` to its registered queue. An unrouted type is
    /// dropped with a trace log rather than treated as an error.
    pub fn write(&self, packet: Packet) {
        match self.routes.get(&packet.packet_type()) {
            Some(queue) => queue.borrow_mut().write(packet),
            None => log::trace!("router: no route for {:?}, dropping packet", packet.packet_type()),
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}
