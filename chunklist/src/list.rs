//! The chunked list container and its rebalancing policy

use packlist::{End, Packlist};
use tracing::{debug, trace};

use crate::FILL_MAX;
use crate::iter::{Direction, Iter, IterMut};
use crate::node::{Arena, Node, NodeId};
use crate::value::{Entry, Value};

/// An ordered sequence of byte strings and signed 64-bit integers, stored
/// as a doubly linked chain of packed segments with cached totals.
///
/// Every mutating operation that can grow a segment takes a `fill`
/// parameter: the advisory maximum entry count per segment, clamped to
/// [`FILL_MAX`]. Segments never sit empty in the chain; the last entry
/// leaving a segment detaches it.
#[derive(Debug, Clone, Default)]
pub struct Chunklist {
    pub(crate) nodes: Arena,
    pub(crate) head: Option<NodeId>,
    pub(crate) tail: Option<NodeId>,
    pub(crate) count: usize,
    pub(crate) segments: usize,
}

impl Chunklist {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entries across all segments.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of segments in the chain.
    pub fn segment_count(&self) -> usize {
        self.segments
    }

    /// Push `value` at the head. Returns true when a new segment had to be
    /// allocated for it.
    pub fn push_head(&mut self, fill: usize, value: &[u8]) -> bool {
        self.push(fill, value, End::Head)
    }

    /// Push `value` at the tail. Returns true when a new segment had to be
    /// allocated for it.
    pub fn push_tail(&mut self, fill: usize, value: &[u8]) -> bool {
        self.push(fill, value, End::Tail)
    }

    fn push(&mut self, fill: usize, value: &[u8], end: End) -> bool {
        let fill = clamp_fill(fill);
        let target = match end {
            End::Head => self.head,
            End::Tail => self.tail,
        };
        match target.filter(|&id| self.nodes.get(id).count < fill) {
            Some(id) => {
                self.push_into(id, value, end);
                false
            }
            None => {
                let mut seg = Packlist::new();
                seg.push(value, end);
                let id = self.nodes.insert(Node::new(seg, 1));
                trace!("allocated segment {id} for {end:?} push");
                match end {
                    End::Head => self.link_node(self.head, id, false),
                    End::Tail => self.link_node(self.tail, id, true),
                }
                self.count += 1;
                true
            }
        }
    }

    /// Pop and decode the head entry.
    pub fn pop_head(&mut self) -> Option<Value> {
        self.pop(End::Head)
    }

    /// Pop and decode the tail entry.
    pub fn pop_tail(&mut self) -> Option<Value> {
        self.pop(End::Tail)
    }

    fn pop(&mut self, end: End) -> Option<Value> {
        let id = match end {
            End::Head => self.head,
            End::Tail => self.tail,
        }?;
        let seg = &self.nodes.get(id).seg;
        let at = match end {
            End::Head => seg.index(0),
            End::Tail => seg.index(-1),
        }?;
        let value = Value::from(seg.get(at));
        self.del_at(id, at);
        Some(value)
    }

    /// Look up the entry at signed global index `i` (negative counts from
    /// the tail, `-1` being the last). Returns the decoded value anchored
    /// to its position, or `None` when out of range.
    pub fn index(&self, i: isize) -> Option<Entry> {
        let forward = i >= 0;
        let wanted = if forward {
            i as usize
        } else {
            (-(i + 1)) as usize
        };
        if wanted >= self.count {
            return None;
        }

        let mut accum = 0usize;
        let mut id = if forward { self.head } else { self.tail };
        let node_id = loop {
            let n = id?;
            let node = self.nodes.get(n);
            if accum + node.count > wanted {
                break n;
            }
            accum += node.count;
            id = if forward { node.next } else { node.prev };
        };
        let node = self.nodes.get(node_id);
        let offset = if forward {
            (wanted - accum) as isize
        } else {
            -(((wanted - accum) as isize) + 1)
        };
        let at = node.seg.index(offset)?;
        Some(Entry {
            value: Value::from(node.seg.get(at)),
            node: node_id,
            at,
            offset,
        })
    }

    /// Insert `value` before the anchored entry, rebalancing against
    /// `fill`.
    pub fn insert_before(&mut self, fill: usize, at: &Entry, value: &[u8]) {
        self.insert(fill, at, value, false);
    }

    /// Insert `value` after the anchored entry, rebalancing against
    /// `fill`.
    pub fn insert_after(&mut self, fill: usize, at: &Entry, value: &[u8]) {
        self.insert(fill, at, value, true);
    }

    fn insert(&mut self, fill: usize, anchor: &Entry, value: &[u8], after: bool) {
        let fill = clamp_fill(fill);
        if self.head.is_none() {
            // Nothing to anchor against; start the chain.
            let mut seg = Packlist::new();
            seg.push(value, End::Head);
            let id = self.nodes.insert(Node::new(seg, 1));
            self.link_node(None, id, after);
            self.count += 1;
            return;
        }

        let id = anchor.node;
        let node_count = self.nodes.get(id).count;
        let fwd = if anchor.offset >= 0 {
            anchor.offset as usize
        } else {
            (node_count as isize + anchor.offset) as usize
        };

        if node_count < fill {
            let node = self.nodes.get_mut(id);
            if after {
                match node.seg.next(anchor.at) {
                    Some(n) => node.seg.insert(n, value),
                    None => node.seg.push(value, End::Tail),
                }
            } else {
                node.seg.insert(anchor.at, value);
            }
            node.count += 1;
            self.count += 1;
            return;
        }

        // The anchor's segment is full. At an edge the value can spill
        // into a neighbour with room, or into a fresh segment; in the
        // middle the segment has to split.
        if after && fwd + 1 == node_count {
            if let Some(n) = self.nodes.get(id).next {
                if self.nodes.get(n).count < fill {
                    self.push_into(n, value, End::Head);
                    return;
                }
            }
            self.splice_single(id, value, true);
            return;
        }
        if !after && fwd == 0 {
            if let Some(p) = self.nodes.get(id).prev {
                if self.nodes.get(p).count < fill {
                    self.push_into(p, value, End::Tail);
                    return;
                }
            }
            self.splice_single(id, value, false);
            return;
        }

        let new_id = self.split_node(id, fwd, after);
        self.push_into(new_id, value, if after { End::Head } else { End::Tail });
        self.link_node(Some(id), new_id, after);
        self.merge_around(id, fill);
    }

    /// Replace the entry at global index `i` with `value`, keeping its
    /// position. Returns false when out of range.
    pub fn replace_at_index(&mut self, i: isize, value: &[u8]) -> bool {
        match self.index(i) {
            Some(entry) => {
                let node = self.nodes.get_mut(entry.node);
                node.seg.replace(entry.at, value);
                true
            }
            None => false,
        }
    }

    /// Delete up to `count` entries starting at signed global index
    /// `start`. The count is clamped to what remains; with a negative
    /// `start`, asking for `-start` or more entries deletes through the
    /// tail. Returns the number of entries removed.
    pub fn delete_range(&mut self, start: isize, count: usize) -> usize {
        if count == 0 {
            return 0;
        }
        let mut extent = count;
        if start >= 0 {
            let start = start as usize;
            if start >= self.count {
                return 0;
            }
            extent = extent.min(self.count - start);
        } else {
            extent = extent.min(start.unsigned_abs());
        }
        let Some(entry) = self.index(start) else {
            return 0;
        };

        let mut id = Some(entry.node);
        let mut offset = entry.offset;
        let mut removed = 0usize;
        while extent > 0 {
            let Some(node_id) = id else { break };
            let next = self.nodes.get(node_id).next;
            let node_count = self.nodes.get(node_id).count;
            let fwd = if offset >= 0 {
                offset as usize
            } else {
                (node_count as isize + offset) as usize
            };

            let del = if fwd == 0 && extent >= node_count {
                debug!("delete-range detaching whole segment {node_id} ({node_count} entries)");
                self.del_node(node_id);
                node_count
            } else {
                let del = (node_count - fwd).min(extent);
                let node = self.nodes.get_mut(node_id);
                node.seg.delete_range(offset, del);
                node.count -= del;
                self.count -= del;
                if self.nodes.get(node_id).count == 0 {
                    self.del_node(node_id);
                }
                del
            };
            extent -= del;
            removed += del;
            id = next;
            offset = 0;
        }
        removed
    }

    /// Move the tail entry to the head. The value is read out first:
    /// pushing can reallocate and rebalance segments, so the tail entry is
    /// re-resolved before being deleted. Integer tails travel as their
    /// decimal rendering and re-encode on arrival.
    pub fn rotate(&mut self, fill: usize) {
        if self.count <= 1 {
            return;
        }
        let bytes = {
            let Some(tail) = self.tail else { return };
            let seg = &self.nodes.get(tail).seg;
            let Some(at) = seg.index(-1) else { return };
            Value::from(seg.get(at)).to_bytes()
        };
        self.push_head(fill, &bytes);
        let Some(tail) = self.tail else { return };
        if let Some(at) = self.nodes.get(tail).seg.index(-1) {
            self.del_at(tail, at);
        }
    }

    /// Deep copy with disjoint segment buffers: each segment's bytes are
    /// copied wholesale and spliced at the copy's tail. Equivalent to
    /// `clone`.
    pub fn duplicate(&self) -> Self {
        self.clone()
    }

    /// Iterate decoded values in `dir`.
    pub fn iter(&self, dir: Direction) -> Iter<'_> {
        Iter::new(self, dir)
    }

    /// Iterator positioned at global index `idx`, or `None` when out of
    /// range.
    pub fn iter_from(&self, dir: Direction, idx: isize) -> Option<Iter<'_>> {
        let entry = self.index(idx)?;
        Some(Iter::starting_at(self, dir, entry.node, entry.offset))
    }

    /// Directional iterator that can also delete the entry it last
    /// yielded; see [`IterMut::delete`].
    pub fn iter_mut(&mut self, dir: Direction) -> IterMut<'_> {
        IterMut::new(self, dir)
    }

    // ---- chain plumbing ----

    /// Splice `new` into the chain before or after `old`. With no `old`
    /// the chain must be empty and `new` becomes both head and tail.
    fn link_node(&mut self, old: Option<NodeId>, new: NodeId, after: bool) {
        match old {
            None => {
                debug_assert!(self.head.is_none() && self.tail.is_none());
                self.head = Some(new);
                self.tail = Some(new);
            }
            Some(old_id) if after => {
                let old_next = self.nodes.get(old_id).next;
                self.nodes.get_mut(new).prev = Some(old_id);
                self.nodes.get_mut(new).next = old_next;
                match old_next {
                    Some(n) => self.nodes.get_mut(n).prev = Some(new),
                    None => self.tail = Some(new),
                }
                self.nodes.get_mut(old_id).next = Some(new);
            }
            Some(old_id) => {
                let old_prev = self.nodes.get(old_id).prev;
                self.nodes.get_mut(new).next = Some(old_id);
                self.nodes.get_mut(new).prev = old_prev;
                match old_prev {
                    Some(p) => self.nodes.get_mut(p).next = Some(new),
                    None => self.head = Some(new),
                }
                self.nodes.get_mut(old_id).prev = Some(new);
            }
        }
        self.segments += 1;
    }

    /// Detach `id` from the chain and free it, folding whatever entries it
    /// still holds out of the totals.
    fn del_node(&mut self, id: NodeId) {
        let node = self.nodes.remove(id);
        match node.prev {
            Some(p) => self.nodes.get_mut(p).next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(n) => self.nodes.get_mut(n).prev = node.prev,
            None => self.tail = node.prev,
        }
        self.segments -= 1;
        self.count -= node.count;
    }

    /// Delete the entry at cursor `at` inside segment `id`. Returns true
    /// when that emptied the segment and it was detached.
    pub(crate) fn del_at(&mut self, id: NodeId, at: usize) -> bool {
        let node = self.nodes.get_mut(id);
        node.seg.delete(at);
        node.count -= 1;
        self.count -= 1;
        if self.nodes.get(id).count == 0 {
            self.del_node(id);
            true
        } else {
            false
        }
    }

    fn push_into(&mut self, id: NodeId, value: &[u8], end: End) {
        let node = self.nodes.get_mut(id);
        node.seg.push(value, end);
        node.count += 1;
        self.count += 1;
    }

    /// Allocate a segment holding only `value` and splice it next to
    /// `at`. Used when `at` is full at an edge and has no neighbour with
    /// room.
    fn splice_single(&mut self, at: NodeId, value: &[u8], after: bool) {
        let mut seg = Packlist::new();
        seg.push(value, End::Head);
        let id = self.nodes.insert(Node::new(seg, 1));
        debug!("no room around segment {at}, spliced new segment {id}");
        self.link_node(Some(at), id, after);
        self.count += 1;
    }

    /// Split segment `id` at forward offset `offset`: the new segment gets
    /// the entries from `offset + 1` onward when `after`, else those
    /// before `offset`; the original keeps the rest. Both halves are
    /// carved by copying the whole buffer and range-deleting the other
    /// side. The new node is returned unlinked.
    fn split_node(&mut self, id: NodeId, offset: usize, after: bool) -> NodeId {
        let node = self.nodes.get_mut(id);
        let mut new_seg = node.seg.clone();
        if after {
            node.seg.delete_range(offset as isize + 1, usize::MAX);
            new_seg.delete_range(0, offset + 1);
        } else {
            node.seg.delete_range(0, offset);
            new_seg.delete_range(offset as isize, usize::MAX);
        }
        node.count = node.seg.len();
        let orig_count = node.count;
        let new_count = new_seg.len();
        let new_id = self.nodes.insert(Node::new(new_seg, new_count));
        debug!("split segment {id} at offset {offset}: {orig_count} + {new_count} entries");
        new_id
    }

    /// After a split, fold small segments around `center` back together.
    /// Attempts, in order: the pair beyond the previous neighbour, the
    /// pair beyond the next neighbour, then `center` with its previous,
    /// then the survivor of that with its next. Each pair merges only when
    /// the combined entry count fits `fill`.
    fn merge_around(&mut self, center: NodeId, fill: usize) {
        let prev = self.nodes.get(center).prev;
        let prev_prev = prev.and_then(|p| self.nodes.get(p).prev);
        if let (Some(a), Some(b)) = (prev_prev, prev) {
            if self.can_merge(a, b, fill) {
                self.merge_segments(a, b);
            }
        }

        let next = self.nodes.get(center).next;
        let next_next = next.and_then(|n| self.nodes.get(n).next);
        if let (Some(a), Some(b)) = (next, next_next) {
            if self.can_merge(a, b, fill) {
                self.merge_segments(a, b);
            }
        }

        let target = match self.nodes.get(center).prev {
            Some(p) if self.can_merge(p, center, fill) => self.merge_segments(p, center),
            _ => center,
        };
        if let Some(n) = self.nodes.get(target).next {
            if self.can_merge(target, n, fill) {
                self.merge_segments(target, n);
            }
        }
    }

    fn can_merge(&self, a: NodeId, b: NodeId, fill: usize) -> bool {
        self.nodes.get(a).count + self.nodes.get(b).count <= fill
    }

    /// Merge two adjacent segments (`a` immediately before `b`), draining
    /// the smaller into the larger in the direction that preserves entry
    /// order. Frees the drained node and returns the survivor.
    fn merge_segments(&mut self, a: NodeId, b: NodeId) -> NodeId {
        debug_assert_eq!(self.nodes.get(a).next, Some(b));
        let (target, source, from, to) = if self.nodes.get(a).count >= self.nodes.get(b).count {
            (a, b, 0isize, End::Tail)
        } else {
            (b, a, -1isize, End::Head)
        };
        while self.nodes.get(source).count > 0 {
            let node = self.nodes.get_mut(source);
            let Some(at) = node.seg.index(from) else { break };
            let bytes = Value::from(node.seg.get(at)).to_bytes();
            node.seg.delete(at);
            node.count -= 1;
            let node = self.nodes.get_mut(target);
            node.seg.push(&bytes, to);
            node.count += 1;
        }
        debug!(
            "merged segment {source} into {target} ({} entries)",
            self.nodes.get(target).count
        );
        self.del_node(source);
        target
    }
}

fn clamp_fill(fill: usize) -> usize {
    fill.clamp(1, FILL_MAX)
}
