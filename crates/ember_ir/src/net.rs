//! Resolution of connections into storage nets.
//!
//! Connections partition signals into equivalence classes. Each class is one
//! [`Net`]: a single storage location with a canonical signal used for naming.

use crate::arena::Arena;
use crate::design::Design;
use crate::error::ElabError;
use crate::ids::{NetId, SignalId};

/// One storage location shared by all connected signals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Net {
    /// The signal that names the net: a top-level port if the class has
    /// one, otherwise the shallowest declaration (lowest ID breaks ties).
    pub canonical: SignalId,
    /// All member signals in ID order.
    pub members: Vec<SignalId>,
    /// Width shared by every member.
    pub width: u32,
}

/// Mapping from signals to their storage nets.
#[derive(Debug, Clone)]
pub struct NetMap {
    net_of: Vec<NetId>,
    nets: Arena<NetId, Net>,
}

impl NetMap {
    /// Builds the net map of a design with union-find over all connections.
    ///
    /// Nets are numbered in order of their lowest member ID.
    pub fn build(design: &Design) -> Result<Self, ElabError> {
        let n = design.signals.len();
        let mut uf = UnionFind::new(n);
        for (_, module) in design.modules.iter() {
            for conn in &module.connections {
                let (wa, wb) = (design.signal_width(conn.a), design.signal_width(conn.b));
                if wa != wb {
                    return Err(ElabError::ConnectionWidth {
                        a: design.signal_path(conn.a),
                        a_width: wa,
                        b: design.signal_path(conn.b),
                        b_width: wb,
                    });
                }
                uf.union(conn.a.index(), conn.b.index());
            }
        }

        let mut root_net: Vec<Option<NetId>> = vec![None; n];
        let mut net_of = Vec::with_capacity(n);
        let mut nets: Arena<NetId, Net> = Arena::new();
        for sid in design.signals.ids() {
            let root = uf.find(sid.index());
            let net = match root_net[root] {
                Some(net) => {
                    nets[net].members.push(sid);
                    net
                }
                None => {
                    let net = nets.alloc(Net {
                        canonical: sid,
                        members: vec![sid],
                        width: design.signal_width(sid),
                    });
                    root_net[root] = Some(net);
                    net
                }
            };
            net_of.push(net);
        }

        let top = design.top;
        let rank = |s: SignalId| {
            let sig = &design.signals[s];
            let top_port = sig.owner == top && sig.kind.is_port();
            (!top_port, design.depth(sig.owner), s)
        };
        for (_, net) in nets.iter_mut() {
            if let Some(best) = net.members.iter().copied().min_by_key(|s| rank(*s)) {
                net.canonical = best;
            }
        }

        Ok(Self { net_of, nets })
    }

    /// Returns the net of a signal.
    pub fn net_of(&self, signal: SignalId) -> NetId {
        self.net_of[signal.index()]
    }

    /// Returns a net by ID.
    pub fn net(&self, id: NetId) -> &Net {
        &self.nets[id]
    }

    /// Returns the canonical signal of the net containing `signal`.
    pub fn canonical(&self, signal: SignalId) -> SignalId {
        self.nets[self.net_of(signal)].canonical
    }

    /// Returns `true` if both signals share storage.
    pub fn same_net(&self, a: SignalId, b: SignalId) -> bool {
        self.net_of(a) == self.net_of(b)
    }

    /// Returns the number of nets.
    pub fn len(&self) -> usize {
        self.nets.len()
    }

    /// Returns `true` if the design has no signals.
    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }

    /// Iterates over `(NetId, &Net)` pairs in net order.
    pub fn iter(&self) -> impl Iterator<Item = (NetId, &Net)> {
        self.nets.iter()
    }
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::DesignBuilder;

    #[test]
    fn unconnected_signals_get_own_nets() {
        let mut b = DesignBuilder::new("top");
        let top = b.top();
        let a = b.input(top, "a", 1);
        let w = b.wire(top, "w", 1);
        let d = b.finish().unwrap();
        let nets = NetMap::build(&d).unwrap();
        assert_eq!(nets.len(), 2);
        assert!(!nets.same_net(a, w));
        assert_eq!(nets.canonical(w), w);
    }

    #[test]
    fn transitive_connections_merge() {
        let mut b = DesignBuilder::new("top");
        let top = b.top();
        let w = b.wire(top, "w", 8);
        let c0 = b.child(top, "c0");
        let c1 = b.child(top, "c1");
        let out0 = b.output(c0, "out", 8);
        let in1 = b.input(c1, "in_", 8);
        let y = b.output(top, "y", 8);
        b.connect(top, out0, w);
        b.connect(top, w, in1);
        b.connect(top, in1, y);
        let d = b.finish().unwrap();
        let nets = NetMap::build(&d).unwrap();

        assert!(nets.same_net(out0, y));
        assert!(nets.same_net(w, in1));
        // a top-level port names the net even though it was declared last
        assert_eq!(nets.canonical(in1), y);
        let net = nets.net(nets.net_of(w));
        assert_eq!(net.members, vec![w, out0, in1, y]);
        assert_eq!(net.width, 8);
        assert_eq!(nets.len(), 1);
    }

    #[test]
    fn shallowest_declaration_is_canonical() {
        let mut b = DesignBuilder::new("top");
        let top = b.top();
        let c = b.child(top, "c");
        let g = b.child(c, "g");
        let gin = b.input(g, "gin", 2);
        let cin = b.wire(c, "cw", 2);
        b.connect(c, gin, cin);
        let d = b.finish().unwrap();
        let nets = NetMap::build(&d).unwrap();
        assert_eq!(nets.canonical(gin), cin);
    }

    #[test]
    fn width_mismatch_reported() {
        let mut b = DesignBuilder::new("top");
        let top = b.top();
        let x = b.wire(top, "x", 3);
        let y = b.wire(top, "y", 4);
        b.connect(top, x, y);
        let d = b.finish_unchecked();
        assert!(matches!(
            NetMap::build(&d),
            Err(ElabError::ConnectionWidth { .. })
        ));
    }
}
