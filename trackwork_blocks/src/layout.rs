// Copyright 2025 the Trackwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Editing facade that keeps blocks consistent with the track they cover.

use kurbo::Point;
use trackwork_graph::{
    DeleteHook, Endpoint, Geometry, GraphConfig, NoUndo, SplitOutcome, StraightGeometry, TrackId,
    TrackKind, Transaction, UndoLog,
};

use crate::block::{Block, BlockGraph};
use crate::config::BlockConfig;
use crate::error::BlockError;
use crate::file::write_layout;
use crate::partition::{BlockPartitioner, Notice, blocks, release};
use crate::pubsub::{EventSink, fire_action};

/// Collects the blocks touched while objects are deleted: the owner of a deleted member,
/// and every block with a boundary attached to the deleted object.
#[derive(Debug, Default)]
struct Maintenance {
    touched: Vec<TrackId>,
}

impl Maintenance {
    fn touch(&mut self, block: TrackId) {
        if !self.touched.contains(&block) {
            self.touched.push(block);
        }
    }
}

impl DeleteHook<Block> for Maintenance {
    fn before_delete(&mut self, graph: &mut BlockGraph, id: TrackId) {
        if let Some(block) = graph.overlay(id) {
            let members = block.members.clone();
            if let Err(err) = release(graph, id, &members) {
                log::warn!("releasing members of a deleted block: {err}");
            }
            self.touched.retain(|&b| b != id);
            return;
        }
        if let Some(owner) = graph.owner(id) {
            if let Some(block) = graph.overlay_mut(owner) {
                block.members.retain(|&m| m != id);
            }
            self.touch(owner);
        }
        for block in blocks(graph) {
            let attached = graph
                .overlay(block)
                .is_some_and(|b| b.attachments.iter().flatten().any(|a| a.track == id));
            if attached {
                self.touch(block);
            }
        }
    }
}

/// Graph, geometry, and partitioner: everything an edit touches except the undo log.
#[derive(Debug)]
struct Parts<G> {
    graph: BlockGraph,
    geometry: G,
    partitioner: BlockPartitioner,
}

impl<G: Geometry> Parts<G> {
    fn reconcile_all(&mut self, blocks: &[TrackId]) -> Result<(), BlockError> {
        for &block in blocks {
            if self.graph.overlay(block).is_some() {
                self.partitioner
                    .reconcile(&mut self.graph, &self.geometry, block)?;
            }
        }
        Ok(())
    }

    fn connect(&mut self, a: TrackId, i: u8, b: TrackId, j: u8) -> Result<(), BlockError> {
        self.graph.connect(a, i, b, j)?;
        let touched = owners(&self.graph, &[a, b]);
        self.reconcile_all(&touched)
    }

    fn disconnect(&mut self, a: TrackId, i: u8, b: TrackId, j: u8) -> Result<(), BlockError> {
        let touched = owners(&self.graph, &[a, b]);
        self.graph.disconnect(a, i, b, j)?;
        self.reconcile_all(&touched)
    }

    fn delete(&mut self, id: TrackId, cascade: bool) -> Result<Vec<TrackId>, BlockError> {
        let mut hook = Maintenance::default();
        let removed = self.graph.delete(id, cascade, &mut hook)?;
        self.reconcile_all(&hook.touched)?;
        Ok(removed)
    }

    fn split(&mut self, id: TrackId, at: Point, disconnect: bool) -> Result<SplitOutcome, BlockError> {
        let mut tracks = vec![id];
        tracks.extend(self.graph.peer(id, 1).map(|p| p.track));
        let touched = owners(&self.graph, &tracks);
        let outcome = self.graph.split(id, at, disconnect, &self.geometry)?;
        self.reconcile_all(&touched)?;
        Ok(outcome)
    }

    fn merge(&mut self, a: TrackId, ep_a: u8, b: TrackId, ep_b: u8) -> Result<(), BlockError> {
        let mut hook = Maintenance {
            touched: owners(&self.graph, &[a]),
        };
        self.graph
            .merge(a, ep_a, b, ep_b, &self.geometry, &mut hook)?;
        self.reconcile_all(&hook.touched)
    }
}

/// A track graph with its blocks, geometry, and undo log.
///
/// Every structural edit runs inside one undo transaction and reconciles the blocks it
/// touches before returning. A block that stops validating is deleted and a
/// [`Notice`] is raised.
#[derive(Debug)]
pub struct Layout<G = StraightGeometry, U = NoUndo> {
    parts: Parts<G>,
    undo: U,
}

impl Default for Layout {
    fn default() -> Self {
        Self::new(
            StraightGeometry::default(),
            NoUndo,
            GraphConfig::default(),
            BlockConfig::default(),
        )
    }
}

impl<G: Geometry, U: UndoLog> Layout<G, U> {
    /// Create an empty layout.
    pub fn new(geometry: G, undo: U, graph: GraphConfig, blocks: BlockConfig) -> Self {
        Self {
            parts: Parts {
                graph: BlockGraph::with_config(graph),
                geometry,
                partitioner: BlockPartitioner::new(blocks),
            },
            undo,
        }
    }

    /// The graph, read-only. Edits go through the layout so blocks stay consistent.
    pub fn graph(&self) -> &BlockGraph {
        &self.parts.graph
    }

    /// The partitioner, for queries.
    pub fn partitioner(&self) -> &BlockPartitioner {
        &self.parts.partitioner
    }

    /// The geometry collaborator.
    pub fn geometry(&self) -> &G {
        &self.parts.geometry
    }

    /// The undo log.
    pub fn undo(&self) -> &U {
        &self.undo
    }

    /// Drain the notices raised so far.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.parts.partitioner.take_notices()
    }

    // --- track edits ---

    /// Add a plain segment or turnout. Overlays are created through block operations.
    pub fn add_track(&mut self, turnout: bool, endpoints: Vec<Endpoint>) -> TrackId {
        let kind = if turnout {
            TrackKind::Turnout
        } else {
            TrackKind::Plain
        };
        self.parts.graph.create_with(kind, endpoints)
    }

    /// Join two endpoints and reconcile the blocks of both tracks.
    pub fn connect(&mut self, a: TrackId, i: u8, b: TrackId, j: u8) -> Result<(), BlockError> {
        let tx = Transaction::begin(&mut self.undo, "Connect");
        tx.finish(self.parts.connect(a, i, b, j))
    }

    /// Separate two endpoints and reconcile the blocks of both tracks.
    pub fn disconnect(&mut self, a: TrackId, i: u8, b: TrackId, j: u8) -> Result<(), BlockError> {
        let tx = Transaction::begin(&mut self.undo, "Disconnect");
        tx.finish(self.parts.disconnect(a, i, b, j))
    }

    /// Delete a track (or block) and reconcile the blocks it belonged to.
    pub fn delete(&mut self, id: TrackId, cascade: bool) -> Result<Vec<TrackId>, BlockError> {
        let tx = Transaction::begin(&mut self.undo, "Delete");
        tx.finish(self.parts.delete(id, cascade))
    }

    /// Split a plain segment; the new piece joins its parent's block.
    pub fn split(
        &mut self,
        id: TrackId,
        at: Point,
        disconnect: bool,
    ) -> Result<SplitOutcome, BlockError> {
        let tx = Transaction::begin(&mut self.undo, "Split");
        tx.finish(self.parts.split(id, at, disconnect))
    }

    /// Fuse `b` into `a` and reconcile the blocks of both.
    pub fn merge(&mut self, a: TrackId, ep_a: u8, b: TrackId, ep_b: u8) -> Result<(), BlockError> {
        let tx = Transaction::begin(&mut self.undo, "Merge");
        tx.finish(self.parts.merge(a, ep_a, b, ep_b))
    }

    // --- block edits ---

    /// Create a block from the run around `seed`.
    pub fn create_block(
        &mut self,
        seed: TrackId,
        name: &str,
        script: &str,
    ) -> Result<TrackId, BlockError> {
        let tx = Transaction::begin(&mut self.undo, "Create block");
        let Parts {
            graph,
            geometry,
            partitioner,
        } = &mut self.parts;
        tx.finish(partitioner.create_from_seed(graph, geometry, seed, name, script))
    }

    /// Create a block from the selected tracks.
    pub fn create_block_from_selection(
        &mut self,
        selection: &[TrackId],
        name: &str,
        script: &str,
    ) -> Result<TrackId, BlockError> {
        let tx = Transaction::begin(&mut self.undo, "Create block");
        let Parts {
            graph,
            geometry,
            partitioner,
        } = &mut self.parts;
        tx.finish(partitioner.create_from_selection(graph, geometry, selection, name, script))
    }

    /// Create blocks for every plain segment not yet in one.
    pub fn discover_blocks(&mut self) -> Result<Vec<TrackId>, BlockError> {
        let tx = Transaction::begin(&mut self.undo, "Discover blocks");
        let Parts {
            graph,
            geometry,
            partitioner,
        } = &mut self.parts;
        tx.finish(partitioner.discover_all(graph, geometry))
    }

    /// Delete a block, releasing its members.
    pub fn delete_block(&mut self, block: TrackId) -> Result<(), BlockError> {
        let tx = Transaction::begin(&mut self.undo, "Delete block");
        let parts = &mut self.parts;
        tx.finish(parts.partitioner.delete_block(&mut parts.graph, block))
    }

    /// Rename a block.
    pub fn rename_block(
        &mut self,
        block: TrackId,
        name: &str,
        script: &str,
    ) -> Result<(), BlockError> {
        let tx = Transaction::begin(&mut self.undo, "Modify block");
        let parts = &mut self.parts;
        tx.finish(
            parts
                .partitioner
                .rename(&mut parts.graph, block, name, script),
        )
    }

    /// Apply an occupancy action to the block called `name`.
    pub fn fire_action<S>(
        &mut self,
        name: &str,
        action: &str,
        sink: &mut S,
    ) -> Result<(), BlockError>
    where
        S: EventSink + ?Sized,
    {
        fire_action(&mut self.parts.graph, name, action, sink)
    }

    // --- files ---

    /// Serialize tracks and blocks.
    pub fn save(&self) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail.
        let _ = write_layout(&self.parts.graph, &mut out);
        out
    }

    /// Replace the layout with the contents of `text`.
    ///
    /// A fatal error leaves the layout empty.
    pub fn load(&mut self, text: &str) -> Result<Vec<TrackId>, BlockError> {
        let Parts {
            graph,
            geometry,
            partitioner,
        } = &mut self.parts;
        graph.clear();
        let result = partitioner.load_layout(graph, geometry, text);
        if result.as_ref().is_err_and(BlockError::is_fatal) {
            graph.clear();
        }
        result
    }
}

fn owners(graph: &BlockGraph, tracks: &[TrackId]) -> Vec<TrackId> {
    let mut out = Vec::new();
    for &t in tracks {
        if let Some(b) = graph.owner(t)
            && graph.overlay(b).is_some()
            && !out.contains(&b)
        {
            out.push(b);
        }
    }
    out
}
