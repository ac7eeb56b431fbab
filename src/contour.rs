//! Index-stable cyclic contour storage.
//!
//! The clipped radical-plane disk boundary is a single simple cyclic polygon
//! that gets points spliced in and out many times while clipping. Nodes live
//! in an arena with explicit next/prev links, so insertion and removal never
//! shift other nodes; removed slots are reclaimed only by [`ContourRing::clear`],
//! which is called once per contact pair on a reused per-worker buffer.

use nalgebra::Point3;

pub(crate) const NIL: u32 = u32::MAX;

/// One contour point. `left_id`/`right_id` name the sphere bounding the edge
/// arriving at/leaving the point; `angle > 0` marks the leaving edge as a
/// circular arc subtending that angle.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ContourNode {
    pub p: Point3<f64>,
    pub angle: f64,
    pub left_id: usize,
    pub right_id: usize,
    /// Scratch mark used while restricting the contour to the radical circle.
    pub outside: bool,
    next: u32,
    prev: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct ContourRing {
    nodes: Vec<ContourNode>,
    head: u32,
    len: usize,
}

#[allow(clippy::cast_possible_truncation)]
impl ContourRing {
    pub(crate) fn new() -> Self {
        Self {
            nodes: Vec::new(),
            head: NIL,
            len: 0,
        }
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            head: NIL,
            len: 0,
        }
    }

    /// Drop all nodes, keeping the allocation for reuse.
    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.head = NIL;
        self.len = 0;
    }

    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    pub(crate) const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) const fn head(&self) -> u32 {
        self.head
    }

    #[inline]
    pub(crate) fn next(&self, i: u32) -> u32 {
        self.nodes[i as usize].next
    }

    #[inline]
    pub(crate) fn prev(&self, i: u32) -> u32 {
        self.nodes[i as usize].prev
    }

    #[inline]
    pub(crate) fn node(&self, i: u32) -> &ContourNode {
        &self.nodes[i as usize]
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, i: u32) -> &mut ContourNode {
        &mut self.nodes[i as usize]
    }

    /// Append a point before the head, i.e. at the cyclic "end".
    pub(crate) fn push_back(&mut self, p: Point3<f64>, left_id: usize, right_id: usize) -> u32 {
        let idx = self.nodes.len() as u32;
        if self.head == NIL {
            self.nodes.push(ContourNode {
                p,
                angle: 0.0,
                left_id,
                right_id,
                outside: false,
                next: idx,
                prev: idx,
            });
            self.head = idx;
        } else {
            let tail = self.nodes[self.head as usize].prev;
            self.nodes.push(ContourNode {
                p,
                angle: 0.0,
                left_id,
                right_id,
                outside: false,
                next: self.head,
                prev: tail,
            });
            self.nodes[tail as usize].next = idx;
            self.nodes[self.head as usize].prev = idx;
        }
        self.len += 1;
        idx
    }

    /// Splice a new point in right after `at`.
    pub(crate) fn insert_after(
        &mut self,
        at: u32,
        p: Point3<f64>,
        left_id: usize,
        right_id: usize,
    ) -> u32 {
        let idx = self.nodes.len() as u32;
        let after = self.nodes[at as usize].next;
        self.nodes.push(ContourNode {
            p,
            angle: 0.0,
            left_id,
            right_id,
            outside: false,
            next: after,
            prev: at,
        });
        self.nodes[at as usize].next = idx;
        self.nodes[after as usize].prev = idx;
        self.len += 1;
        idx
    }

    /// Unlink node `i`; its arena slot stays dead until `clear`.
    /// Returns the index after the removed node.
    pub(crate) fn remove(&mut self, i: u32) -> u32 {
        let ContourNode { next, prev, .. } = self.nodes[i as usize];
        if self.len == 1 {
            self.head = NIL;
            self.len = 0;
            return NIL;
        }
        self.nodes[prev as usize].next = next;
        self.nodes[next as usize].prev = prev;
        if self.head == i {
            self.head = next;
        }
        self.len -= 1;
        next
    }

    /// Walk the live nodes once in cyclic order starting at the head.
    /// The ring must not be mutated while iterating.
    pub(crate) fn indices(&self) -> RingIndices<'_> {
        RingIndices {
            ring: self,
            cursor: self.head,
            remaining: self.len,
        }
    }

    #[cfg(test)]
    pub(crate) fn points(&self) -> Vec<Point3<f64>> {
        self.indices().map(|i| self.node(i).p).collect()
    }
}

pub(crate) struct RingIndices<'a> {
    ring: &'a ContourRing,
    cursor: u32,
    remaining: usize,
}

impl Iterator for RingIndices<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.cursor;
        self.cursor = self.ring.next(current);
        self.remaining -= 1;
        Some(current)
    }
}
