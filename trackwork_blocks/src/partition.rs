// Copyright 2025 the Trackwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Creating, reconciling, and querying blocks.

use std::collections::BTreeSet;

use kurbo::{Rect, Vec2};
use trackwork_graph::{Endpoint, Geometry, TrackId, TrackKind};

use crate::block::{Block, BlockGraph};
use crate::config::BlockConfig;
use crate::contiguity::{open_ends, select};
use crate::discover::{Discovery, index, walk};
use crate::error::{BlockError, Rejection};

/// A non-fatal message for the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    /// Persisted index of the block concerned, if any.
    pub block: Option<u32>,
    /// Message text.
    pub message: String,
}

/// What [`BlockPartitioner::reconcile`] did to a block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reconciled {
    /// Membership was rebuilt and the block kept.
    Kept,
    /// The block no longer validated and was deleted.
    Deleted,
}

/// Discovers, validates, and maintains block overlays on a [`BlockGraph`].
///
/// The partitioner holds only its rules and the notices it has raised; the discovery
/// state of each call lives in a [`Discovery`] value.
#[derive(Clone, Debug, Default)]
pub struct BlockPartitioner {
    config: BlockConfig,
    notices: Vec<Notice>,
}

impl BlockPartitioner {
    /// Create a partitioner with the given rules.
    pub fn new(config: BlockConfig) -> Self {
        Self {
            config,
            notices: Vec::new(),
        }
    }

    /// Rules in effect.
    pub fn config(&self) -> &BlockConfig {
        &self.config
    }

    /// Notices raised since the last call to [`take_notices`](Self::take_notices).
    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Drain the notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        core::mem::take(&mut self.notices)
    }

    pub(crate) fn notice(&mut self, block: Option<u32>, message: String) {
        log::warn!("{message}");
        self.notices.push(Notice { block, message });
    }

    // --- discovery ---

    /// Walk and validate the run around `seed` without changing anything.
    pub fn discover<G>(
        &self,
        graph: &BlockGraph,
        geometry: &G,
        seed: TrackId,
    ) -> Result<Discovery, Rejection>
    where
        G: Geometry + ?Sized,
    {
        walk(graph, geometry, &self.config, seed, None)
    }

    /// Create a block from the run around `seed`.
    ///
    /// On any rejection nothing is created.
    pub fn create_from_seed<G>(
        &mut self,
        graph: &mut BlockGraph,
        geometry: &G,
        seed: TrackId,
        name: &str,
        script: &str,
    ) -> Result<TrackId, BlockError>
    where
        G: Geometry + ?Sized,
    {
        if name.is_empty() {
            return Err(Rejection::MissingName.into());
        }
        let found = walk(graph, geometry, &self.config, seed, None)?;
        self.commit(graph, found, None, name, script)
    }

    /// Create a block from an explicit selection, which may include turnouts.
    pub fn create_from_selection<G>(
        &mut self,
        graph: &mut BlockGraph,
        geometry: &G,
        selection: &[TrackId],
        name: &str,
        script: &str,
    ) -> Result<TrackId, BlockError>
    where
        G: Geometry + ?Sized,
    {
        if name.is_empty() {
            return Err(Rejection::MissingName.into());
        }
        let found = select(graph, geometry, &self.config, selection, None)?;
        self.commit(graph, found, None, name, script)
    }

    /// Create a block for every plain segment not yet in one, in index order.
    ///
    /// Each block claims its members as soon as it is created, so later seeds in the same
    /// sweep skip them. Seeds whose run does not validate are skipped silently, along with
    /// the rest of that run. Returns the new blocks.
    pub fn discover_all<G>(
        &mut self,
        graph: &mut BlockGraph,
        geometry: &G,
    ) -> Result<Vec<TrackId>, BlockError>
    where
        G: Geometry + ?Sized,
    {
        let mut created = Vec::new();
        let mut rejected = BTreeSet::new();
        for seed in graph.ids() {
            if !graph.is_plain(seed) || graph.owner(seed).is_some() || rejected.contains(&seed)
            {
                continue;
            }
            match walk(graph, geometry, &self.config, seed, None) {
                Ok(found) => {
                    let name = self.auto_name(graph);
                    created.push(self.commit(graph, found, None, &name, "")?);
                }
                Err(why) => {
                    log::trace!("discover_all: T{} skipped: {why}", index(graph, seed));
                    rejected.extend(self.run_of(graph, seed));
                }
            }
        }
        log::debug!("discover_all: {} new blocks", created.len());
        Ok(created)
    }

    /// Plain segments reachable from `seed` without crossing turnouts or owned tracks.
    fn run_of(&self, graph: &BlockGraph, seed: TrackId) -> BTreeSet<TrackId> {
        let mut seen = BTreeSet::from([seed]);
        let mut stack = vec![seed];
        while let Some(id) = stack.pop() {
            let Some(object) = graph.get(id) else {
                continue;
            };
            for e in object.endpoints() {
                if let Some(p) = e.connection()
                    && graph.is_plain(p.track)
                    && graph.owner(p.track).is_none()
                    && seen.insert(p.track)
                {
                    stack.push(p.track);
                }
            }
        }
        seen
    }

    fn auto_name(&self, graph: &BlockGraph) -> String {
        let taken: BTreeSet<&str> = graph
            .iter()
            .filter_map(|(_, o)| o.kind().overlay().map(Block::name))
            .collect();
        (1..)
            .map(|n| format!("{}{n}", self.config.auto_name_prefix))
            .find(|name| !taken.contains(name.as_str()))
            .unwrap_or_default()
    }

    /// Materialize or update a block from a validated discovery.
    pub(crate) fn commit(
        &mut self,
        graph: &mut BlockGraph,
        found: Discovery,
        existing: Option<TrackId>,
        name: &str,
        script: &str,
    ) -> Result<TrackId, BlockError> {
        let endpoints: Vec<Endpoint> = found
            .boundaries
            .iter()
            .map(|b| Endpoint::new(b.position, b.angle))
            .collect();
        let attachments = found.boundaries.iter().map(|b| b.attached).collect();
        let bounds = found
            .members
            .iter()
            .filter_map(|&m| graph.bounding_box(m))
            .reduce(|a, b| a.union(b))
            .unwrap_or(Rect::ZERO);

        let id = match existing {
            Some(id) => {
                let block = block_mut(graph, id)?;
                let released: Vec<TrackId> = block
                    .members
                    .iter()
                    .copied()
                    .filter(|m| !found.members.contains(m))
                    .collect();
                block.members.clone_from(&found.members);
                block.length = found.length;
                block.attachments = attachments;
                for m in released {
                    if graph.owner(m) == Some(id) {
                        graph.set_owner(m, None)?;
                    }
                }
                graph.replace_endpoints(id, endpoints)?;
                id
            }
            None => graph.create_with(
                TrackKind::Overlay(Block {
                    name: name.to_owned(),
                    script: script.to_owned(),
                    offset: Vec2::ZERO,
                    members: found.members.clone(),
                    length: found.length,
                    attachments,
                    occupied: false,
                }),
                endpoints,
            ),
        };
        graph.set_bounds(id, bounds)?;
        for &m in &found.members {
            graph.set_owner(m, Some(id))?;
        }
        log::debug!(
            "block T{}: {} members, length {:.3}",
            index(graph, id),
            found.members.len(),
            found.length
        );
        Ok(id)
    }

    // --- maintenance ---

    /// Rebuild a block's membership against the current graph.
    ///
    /// Surviving stored members, plus tracks that still name the block as owner, are the
    /// starting point. A block of plain segments is walked again from its first survivor;
    /// a block with turnouts is re-checked as a selection. A block that no longer
    /// validates is deleted with a notice.
    pub fn reconcile<G>(
        &mut self,
        graph: &mut BlockGraph,
        geometry: &G,
        block: TrackId,
    ) -> Result<Reconciled, BlockError>
    where
        G: Geometry + ?Sized,
    {
        let stored = block_ref(graph, block)?.members.clone();
        let mut survivors: Vec<TrackId> =
            stored.into_iter().filter(|&m| graph.is_alive(m)).collect();
        for (id, _) in graph.iter() {
            if graph.owner(id) == Some(block) && !survivors.contains(&id) {
                survivors.push(id);
            }
        }
        match self.rebuild(graph, geometry, block, &survivors) {
            Ok(found) => {
                self.commit(graph, found, Some(block), "", "")?;
                Ok(Reconciled::Kept)
            }
            Err(why) => {
                let name = block_ref(graph, block)?.name.clone();
                let idx = graph.index_of(block);
                self.delete_block(graph, block)?;
                self.notice(idx, format!("Deleting block {name}: {why}"));
                Ok(Reconciled::Deleted)
            }
        }
    }

    /// Recompute a discovery from `survivors`, which `block` may already own.
    fn rebuild<G>(
        &self,
        graph: &BlockGraph,
        geometry: &G,
        block: TrackId,
        survivors: &[TrackId],
    ) -> Result<Discovery, Rejection>
    where
        G: Geometry + ?Sized,
    {
        let Some(&first) = survivors.first() else {
            return Err(Rejection::EmptySelection);
        };
        if survivors.iter().any(|&m| !graph.is_plain(m)) {
            return select(graph, geometry, &self.config, survivors, Some(block));
        }
        let mut found = walk(graph, geometry, &self.config, first, Some(block))?;
        let open = open_ends(graph, &found.members, graph.config());
        if !open.is_contiguous() {
            return Err(Rejection::Discontiguous {
                open_ends: open.ends.len(),
                allowed: open.allowed,
            });
        }
        // Keep the stored order when the membership is unchanged.
        let same: BTreeSet<_> = survivors.iter().collect();
        if found.members.len() == survivors.len() && found.members.iter().all(|m| same.contains(m))
        {
            found.members = survivors.to_vec();
        }
        Ok(found)
    }

    /// Delete a block, clearing the owner back-reference of each member it holds.
    pub fn delete_block(&mut self, graph: &mut BlockGraph, block: TrackId) -> Result<(), BlockError> {
        let members = block_ref(graph, block)?.members.clone();
        release(graph, block, &members)?;
        graph.delete(block, false, &mut ())?;
        Ok(())
    }

    /// Change a block's name and script. The name must not be empty.
    pub fn rename(
        &mut self,
        graph: &mut BlockGraph,
        block: TrackId,
        name: &str,
        script: &str,
    ) -> Result<(), BlockError> {
        if name.is_empty() {
            return Err(Rejection::MissingName.into());
        }
        let b = block_mut(graph, block)?;
        b.name = name.to_owned();
        b.script = script.to_owned();
        Ok(())
    }

    // --- queries ---

    /// The live block owning `track`, if any.
    pub fn owning_block(&self, graph: &BlockGraph, track: TrackId) -> Option<TrackId> {
        graph.owner(track).filter(|&b| is_block(graph, b))
    }

    /// Live blocks in index order.
    pub fn blocks(&self, graph: &BlockGraph) -> Vec<TrackId> {
        blocks(graph)
    }

    /// One-line description: `block(<index>): Layer=<n> <name>`.
    pub fn describe(&self, graph: &BlockGraph, block: TrackId) -> Option<String> {
        let object = graph.get(block)?;
        let b = object.kind().overlay()?;
        Some(format!(
            "block({}): Layer={} {}",
            object.index(),
            object.layer(),
            b.name
        ))
    }

    /// Name and member list, for list views.
    pub fn title(&self, graph: &BlockGraph, block: TrackId) -> Option<String> {
        let b = graph.overlay(block)?;
        let members: Vec<String> = b
            .members
            .iter()
            .filter_map(|&m| graph.index_of(m))
            .map(|i| format!("T{i}"))
            .collect();
        Some(format!("{} ({})", b.name, members.join(", ")))
    }

    /// Union of member bounding boxes.
    pub fn bounds(&self, graph: &BlockGraph, block: TrackId) -> Option<Rect> {
        graph
            .overlay(block)?
            .members
            .iter()
            .filter_map(|&m| graph.bounding_box(m))
            .reduce(|a, b| a.union(b))
    }

    /// Verify a block's invariants: live members it owns, cached length, length floor, and
    /// exactly two boundaries that lead out of the block to live track or nothing.
    pub fn check<G>(&self, graph: &BlockGraph, geometry: &G, block: TrackId) -> Result<(), BlockError>
    where
        G: Geometry + ?Sized,
    {
        let b = block_ref(graph, block)?;
        let idx = index(graph, block);
        if b.members.is_empty() {
            return Err(BlockError::Corrupt(format!("block T{idx} has no members")));
        }
        let mut length = 0.0;
        for &m in &b.members {
            if !graph.is_alive(m) {
                return Err(BlockError::Corrupt(format!(
                    "block T{idx} holds a deleted track"
                )));
            }
            if graph.owner(m) != Some(block) {
                return Err(BlockError::Corrupt(format!(
                    "T{} is in block T{idx} but not owned by it",
                    index(graph, m)
                )));
            }
            length += crate::discover::measure(graph, geometry, m)?;
        }
        if (length - b.length).abs() > 1e-6 * length.max(1.0) {
            return Err(BlockError::Corrupt(format!(
                "block T{idx} caches length {} but members sum to {length}",
                b.length
            )));
        }
        if b.length < self.config.min_block_length {
            return Err(BlockError::Corrupt(format!(
                "block T{idx} is shorter than the minimum"
            )));
        }
        if b.attachments.len() != 2 || graph.endpoint_count(block) != Some(2) {
            return Err(BlockError::Corrupt(format!(
                "block T{idx} has {} boundaries",
                b.attachments.len()
            )));
        }
        for at in b.attachments.iter().flatten() {
            if b.contains(at.track) {
                return Err(BlockError::Corrupt(format!(
                    "block T{idx} boundary leads back into the block"
                )));
            }
            if !graph.is_alive(at.track) {
                return Err(BlockError::Corrupt(format!(
                    "block T{idx} boundary is attached to a deleted track"
                )));
            }
        }
        Ok(())
    }
}

pub(crate) fn is_block(graph: &BlockGraph, id: TrackId) -> bool {
    graph.overlay(id).is_some()
}

pub(crate) fn blocks(graph: &BlockGraph) -> Vec<TrackId> {
    graph
        .iter()
        .filter(|(_, o)| o.kind().overlay().is_some())
        .map(|(id, _)| id)
        .collect()
}

pub(crate) fn block_ref(graph: &BlockGraph, id: TrackId) -> Result<&Block, BlockError> {
    graph
        .overlay(id)
        .ok_or(BlockError::NotABlock(index(graph, id)))
}

pub(crate) fn block_mut(graph: &mut BlockGraph, id: TrackId) -> Result<&mut Block, BlockError> {
    let idx = index(graph, id);
    graph.overlay_mut(id).ok_or(BlockError::NotABlock(idx))
}

/// Clear the owner back-reference of `members` that still point at `block`.
pub(crate) fn release(
    graph: &mut BlockGraph,
    block: TrackId,
    members: &[TrackId],
) -> Result<(), BlockError> {
    for &m in members {
        if graph.is_alive(m) && graph.get(m).and_then(|o| o.owner_id()) == Some(block) {
            graph.set_owner(m, None)?;
        }
    }
    Ok(())
}
