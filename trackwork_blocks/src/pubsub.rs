// Copyright 2025 the Trackwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Occupancy contract between blocks and an external event bus.
//!
//! States and actions travel as strings: a block accepts exactly [`OCCUPIED`] and
//! [`UNOCCUPIED`], and publishes the new state under its own name.

use crate::block::BlockGraph;
use crate::error::BlockError;
use crate::partition::blocks;

/// A train is in the block.
pub const OCCUPIED: &str = "OCCUPIED";
/// The block is clear.
pub const UNOCCUPIED: &str = "UNOCCUPIED";

/// Receiver of state-change events.
pub trait EventSink {
    /// `name` changed to `state`.
    fn publish(&mut self, name: &str, state: &str);
}

impl EventSink for Vec<(String, String)> {
    fn publish(&mut self, name: &str, state: &str) {
        self.push((name.to_owned(), state.to_owned()));
    }
}

/// Names of every block, in index order.
pub fn describe_names(graph: &BlockGraph) -> Vec<String> {
    blocks(graph)
        .into_iter()
        .filter_map(|b| graph.overlay(b).map(|x| x.name().to_owned()))
        .collect()
}

/// Current state of the block called `name`.
pub fn get_state(graph: &BlockGraph, name: &str) -> Result<&'static str, BlockError> {
    let block = find_named(graph, name)?;
    let occupied = graph.overlay(block).is_some_and(|b| b.is_occupied());
    Ok(if occupied { OCCUPIED } else { UNOCCUPIED })
}

/// Apply `action` to the block called `name` and publish its new state.
pub fn fire_action<S>(
    graph: &mut BlockGraph,
    name: &str,
    action: &str,
    sink: &mut S,
) -> Result<(), BlockError>
where
    S: EventSink + ?Sized,
{
    let occupied = match action {
        OCCUPIED => true,
        UNOCCUPIED => false,
        other => return Err(BlockError::UnknownAction(other.to_owned())),
    };
    let block = find_named(graph, name)?;
    if let Some(b) = graph.overlay_mut(block) {
        b.occupied = occupied;
    }
    log::debug!("block {name}: {action}");
    sink.publish(name, action);
    Ok(())
}

fn find_named(graph: &BlockGraph, name: &str) -> Result<trackwork_graph::TrackId, BlockError> {
    blocks(graph)
        .into_iter()
        .find(|&b| graph.overlay(b).is_some_and(|x| x.name() == name))
        .ok_or_else(|| BlockError::UnknownBlock(name.to_owned()))
}
