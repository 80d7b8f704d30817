// Copyright 2025 the Trackwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `BLOCK` records and load-time reconciliation.
//!
//! ```text
//! BLOCK 12 "Main ""east""" "" 0 0
//!     TRK 3
//!     TRK 4
//!     END
//! ```
//!
//! The member list is a hint: on load each block is rebuilt against the graph as it is now.

use std::collections::BTreeSet;
use std::fmt;

use kurbo::Vec2;
use trackwork_graph::file::{Record, quote, records};
use trackwork_graph::{Geometry, GraphError, TrackId, TrackKind};

use crate::block::{Block, BlockGraph};
use crate::error::BlockError;
use crate::partition::{BlockPartitioner, Reconciled, blocks};

/// Write one `BLOCK` record per block, in index order.
pub fn write_blocks<W: fmt::Write>(graph: &BlockGraph, out: &mut W) -> fmt::Result {
    for id in blocks(graph) {
        let (Some(object), Some(b)) = (graph.get(id), graph.overlay(id)) else {
            continue;
        };
        writeln!(
            out,
            "BLOCK {} {} {} {} {}",
            object.index(),
            quote(&b.name),
            quote(&b.script),
            b.offset.x,
            b.offset.y
        )?;
        for index in b.members.iter().filter_map(|&m| graph.index_of(m)) {
            writeln!(out, "\tTRK {index}")?;
        }
        writeln!(out, "\tEND")?;
    }
    Ok(())
}

/// Write the track records followed by the block records.
pub fn write_layout<W: fmt::Write>(graph: &BlockGraph, out: &mut W) -> fmt::Result {
    graph.write_tracks(out)?;
    write_blocks(graph, out)
}

struct StoredBlock {
    index: u32,
    name: String,
    script: String,
    offset: Vec2,
    members: Vec<u32>,
}

fn parse_block(record: &Record) -> Result<StoredBlock, GraphError> {
    let h = &record.header;
    let index = h.parse(1, "block index")?;
    let name = h.field(2, "block name")?.to_owned();
    let script = h.field(3, "block script")?.to_owned();
    let offset = if h.fields.len() > 4 {
        Vec2::new(h.parse(4, "offset x")?, h.parse(5, "offset y")?)
    } else {
        Vec2::ZERO
    };
    let mut members = Vec::with_capacity(record.body.len());
    for line in &record.body {
        match line.field(0, "block line")? {
            "TRK" => members.push(line.parse(1, "track index")?),
            other => return Err(line.error(format!("unexpected `{other}` in block"))),
        }
    }
    Ok(StoredBlock {
        index,
        name,
        script,
        offset,
        members,
    })
}

impl BlockPartitioner {
    /// Recreate the blocks described by the `BLOCK` records against the current graph.
    ///
    /// Every block first claims the stored members that still exist, so neighbouring
    /// blocks keep their share of a run. Member indices that no longer resolve, or that an
    /// earlier block already claimed, are dropped with a notice. Each block is then
    /// reconciled like an edited block: rebuilt from its first surviving member and
    /// re-checked. A block with no surviving members, or one that no longer validates, is
    /// not recreated and a notice says so. Returns the blocks recreated.
    pub fn load_blocks<G>(
        &mut self,
        graph: &mut BlockGraph,
        geometry: &G,
        records: &[Record],
    ) -> Result<Vec<TrackId>, BlockError>
    where
        G: Geometry + ?Sized,
    {
        let stored = records
            .iter()
            .filter(|r| r.kind() == "BLOCK")
            .map(parse_block)
            .collect::<Result<Vec<_>, _>>()?;
        let mut seen = BTreeSet::new();
        for s in &stored {
            if graph.find(s.index).is_some() || !seen.insert(s.index) {
                return Err(GraphError::Corrupt(format!(
                    "block T{} reuses an existing index",
                    s.index
                ))
                .into());
            }
        }

        let mut claimed = Vec::with_capacity(stored.len());
        for s in stored {
            let id = graph.create_with_index(
                s.index,
                TrackKind::Overlay(Block {
                    name: s.name.clone(),
                    script: s.script,
                    offset: s.offset,
                    ..Block::default()
                }),
                Vec::new(),
            )?;
            let mut survivors = Vec::with_capacity(s.members.len());
            for &m in &s.members {
                let track = graph
                    .find(m)
                    .filter(|&t| graph.kind(t).is_some_and(TrackKind::is_track));
                match track.map(|t| (t, graph.owner(t))) {
                    Some((t, None)) => {
                        graph.set_owner(t, Some(id))?;
                        survivors.push(t);
                    }
                    Some((_, Some(other))) if other == id => {}
                    Some((_, Some(other))) => self.notice(
                        Some(s.index),
                        format!(
                            "Block {}: T{m} already belongs to block T{}",
                            s.name,
                            graph.index_of(other).unwrap_or_default()
                        ),
                    ),
                    None => self.notice(
                        Some(s.index),
                        format!("Block {}: T{m} doesn't exist", s.name),
                    ),
                }
            }
            if survivors.is_empty() {
                graph.delete(id, false, &mut ())?;
                self.notice(
                    Some(s.index),
                    format!("Deleting block {}: no tracks", s.name),
                );
                continue;
            }
            if let Some(b) = graph.overlay_mut(id) {
                b.members = survivors;
            }
            claimed.push(id);
        }

        let mut loaded = Vec::with_capacity(claimed.len());
        for id in claimed {
            if self.reconcile(graph, geometry, id)? == Reconciled::Kept {
                loaded.push(id);
            }
        }
        log::debug!("loaded {} blocks", loaded.len());
        Ok(loaded)
    }

    /// Load tracks and blocks from layout text into `graph`.
    ///
    /// Corrupt connectivity fails the whole load before anything is created. Blocks that
    /// no longer fit the graph are dropped with notices.
    pub fn load_layout<G>(
        &mut self,
        graph: &mut BlockGraph,
        geometry: &G,
        text: &str,
    ) -> Result<Vec<TrackId>, BlockError>
    where
        G: Geometry + ?Sized,
    {
        let records = records(text)?;
        for r in &records {
            if !matches!(r.kind(), "TRACK" | "BLOCK") {
                log::debug!("line {}: skipping {} record", r.header.number, r.kind());
            }
        }
        graph.load_tracks(&records)?;
        self.load_blocks(graph, geometry, &records)
    }
}
