//! Directional iteration over the segment chain
//!
//! Iterator state is the anchor triple: current segment, byte cursor
//! within it, and in-segment offset. Falling off a segment hops to the
//! near edge of the neighbour in the travel direction. [`IterMut`] can
//! delete the entry it last yielded and re-anchors itself afterwards;
//! inserting while iterating is not supported, recreate the iterator
//! instead.

use crate::list::Chunklist;
use crate::node::NodeId;
use crate::value::Value;

/// Direction of travel through the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

#[derive(Debug, Clone)]
struct State {
    node: Option<NodeId>,
    at: Option<usize>,
    offset: isize,
    dir: Direction,
}

impl State {
    fn start(list: &Chunklist, dir: Direction) -> State {
        match dir {
            Direction::Forward => State {
                node: list.head,
                at: None,
                offset: 0,
                dir,
            },
            Direction::Reverse => State {
                node: list.tail,
                at: None,
                offset: -1,
                dir,
            },
        }
    }

    fn anchored(node: NodeId, offset: isize, dir: Direction) -> State {
        State {
            node: Some(node),
            at: None,
            offset,
            dir,
        }
    }

    /// Step to the next entry in the travel direction. With no current
    /// cursor the in-segment offset is resolved fresh, which is how the
    /// iterator lands after segment hops and deletes.
    fn advance(&mut self, list: &Chunklist) -> Option<(NodeId, usize)> {
        loop {
            let node = self.node?;
            let seg = &list.nodes.get(node).seg;
            let stepped = match self.at {
                None => seg.index(self.offset),
                Some(at) => match self.dir {
                    Direction::Forward => {
                        self.offset += 1;
                        seg.next(at)
                    }
                    Direction::Reverse => {
                        self.offset -= 1;
                        seg.prev(at)
                    }
                },
            };
            match stepped {
                Some(at) => {
                    self.at = Some(at);
                    return Some((node, at));
                }
                None => {
                    // Fell off this segment; restart at the near edge of
                    // the neighbour.
                    let n = list.nodes.get(node);
                    match self.dir {
                        Direction::Forward => {
                            self.node = n.next;
                            self.offset = 0;
                        }
                        Direction::Reverse => {
                            self.node = n.prev;
                            self.offset = -1;
                        }
                    }
                    self.at = None;
                }
            }
        }
    }
}

/// Borrowing iterator over decoded values.
pub struct Iter<'a> {
    list: &'a Chunklist,
    state: State,
}

impl<'a> Iter<'a> {
    pub(crate) fn new(list: &'a Chunklist, dir: Direction) -> Self {
        Iter {
            list,
            state: State::start(list, dir),
        }
    }

    pub(crate) fn starting_at(
        list: &'a Chunklist,
        dir: Direction,
        node: NodeId,
        offset: isize,
    ) -> Self {
        Iter {
            list,
            state: State::anchored(node, offset, dir),
        }
    }
}

impl Iterator for Iter<'_> {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        let (node, at) = self.state.advance(self.list)?;
        Some(Value::from(self.list.nodes.get(node).seg.get(at)))
    }
}

/// Iterator holding exclusive access so the entry it last yielded can be
/// deleted in place.
pub struct IterMut<'a> {
    list: &'a mut Chunklist,
    state: State,
}

impl<'a> IterMut<'a> {
    pub(crate) fn new(list: &'a mut Chunklist, dir: Direction) -> Self {
        let state = State::start(list, dir);
        IterMut { list, state }
    }

    /// Step to the next value.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<Value> {
        let (node, at) = self.state.advance(self.list)?;
        Some(Value::from(self.list.nodes.get(node).seg.get(at)))
    }

    /// Delete the entry most recently returned by [`next`], re-anchoring
    /// the iterator so the walk continues with the neighbouring entry.
    /// Returns false when there is no current entry.
    ///
    /// [`next`]: IterMut::next
    pub fn delete(&mut self) -> bool {
        let (Some(node), Some(at)) = (self.state.node, self.state.at) else {
            return false;
        };
        let prev = self.list.nodes.get(node).prev;
        let next = self.list.nodes.get(node).next;
        let node_deleted = self.list.del_at(node, at);
        self.state.at = None;
        if node_deleted {
            // The whole segment went away; continue from the neighbour.
            match self.state.dir {
                Direction::Forward => {
                    self.state.node = next;
                    self.state.offset = 0;
                }
                Direction::Reverse => {
                    self.state.node = prev;
                    self.state.offset = -1;
                }
            }
        }
        // Otherwise the unchanged offset already names the right entry:
        // forward, the successor slid into it; reverse, offset-1 is the
        // predecessor and the next advance resolves it fresh.
        true
    }
}
