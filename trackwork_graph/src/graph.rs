// Copyright 2025 the Trackwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core graph implementation: storage, identity, adjacency, and deletion.

use std::collections::BTreeMap;

use kurbo::{Point, Rect};

use crate::config::GraphConfig;
use crate::error::GraphError;
use crate::geometry::opposition;
use crate::types::{
    Elevation, ElevationMode, Endpoint, EndpointOptions, EndpointRef, TrackFlags, TrackId,
    TrackKind,
};

/// Reaction point for subsystems layered over the graph.
///
/// [`TrackGraph::delete`] calls [`DeleteHook::before_delete`] for every object it removes,
/// while the object and its connections are still intact.
pub trait DeleteHook<X> {
    /// Called before `id` is disconnected and freed.
    fn before_delete(&mut self, graph: &mut TrackGraph<X>, id: TrackId);
}

impl<X> DeleteHook<X> for () {
    fn before_delete(&mut self, _graph: &mut TrackGraph<X>, _id: TrackId) {}
}

/// Endpoint position within an object. Objects never carry more than `u8::MAX` endpoints.
pub(crate) fn ep_u8(i: usize) -> u8 {
    u8::try_from(i).unwrap_or(u8::MAX)
}

/// Closed-interval overlap; degenerate boxes of straight segments still count.
fn touches(a: Rect, b: Rect) -> bool {
    a.x0 <= b.x1 && b.x0 <= a.x1 && a.y0 <= b.y1 && b.y0 <= a.y1
}

/// A node of the connectivity graph.
#[derive(Clone, Debug)]
pub struct TrackObject<X> {
    pub(crate) index: u32,
    pub(crate) generation: u32,
    pub(crate) kind: TrackKind<X>,
    pub(crate) endpoints: Vec<Endpoint>,
    pub(crate) bounds: Rect,
    pub(crate) layer: u32,
    pub(crate) flags: TrackFlags,
    pub(crate) owner: Option<TrackId>,
}

impl<X> TrackObject<X> {
    /// Persisted integer index, stable for the lifetime of the object.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Variant tag and overlay payload.
    pub fn kind(&self) -> &TrackKind<X> {
        &self.kind
    }

    /// Endpoints in order.
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Bounding box.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Layer id.
    pub fn layer(&self) -> u32 {
        self.layer
    }

    /// Flags.
    pub fn flags(&self) -> TrackFlags {
        self.flags
    }

    /// Raw owner back-reference. Prefer [`TrackGraph::owner`], which checks liveness.
    pub fn owner_id(&self) -> Option<TrackId> {
        self.owner
    }

    pub(crate) fn refresh_bounds(&mut self) {
        let mut points = self.endpoints.iter().map(|e| e.position);
        if let Some(first) = points.next() {
            self.bounds = points.fold(Rect::from_points(first, first), |r, p| r.union_pt(p));
        }
    }
}

/// The trackwork connectivity graph.
///
/// Owns every track object. Objects are addressed by generational [`TrackId`]s;
/// adjacency is stored on both endpoints of a connection and every mutation keeps the
/// two sides in agreement.
pub struct TrackGraph<X = ()> {
    pub(crate) slots: Vec<Option<TrackObject<X>>>,
    generations: Vec<u32>,
    free_list: Vec<usize>,
    by_index: BTreeMap<u32, TrackId>,
    max_index: u32,
    pub(crate) config: GraphConfig,
    current_layer: u32,
}

impl<X> core::fmt::Debug for TrackGraph<X> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let total = self.slots.len();
        let alive = self.by_index.len();
        f.debug_struct("TrackGraph")
            .field("slots_total", &total)
            .field("objects_alive", &alive)
            .field("free_list", &self.free_list.len())
            .field("max_index", &self.max_index)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<X> Default for TrackGraph<X> {
    fn default() -> Self {
        Self::new()
    }
}

impl<X> TrackGraph<X> {
    /// Create an empty graph with default tolerances.
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    /// Create an empty graph with the given tolerances.
    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            slots: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            by_index: BTreeMap::new(),
            max_index: 0,
            config,
            current_layer: 0,
        }
    }

    /// Tolerances in effect.
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Replace the tolerances.
    pub fn set_config(&mut self, config: GraphConfig) {
        self.config = config;
    }

    /// Layer assigned to newly created objects.
    pub fn set_current_layer(&mut self, layer: u32) {
        self.current_layer = layer;
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.by_index.len()
    }

    /// True when the graph holds no objects.
    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }

    // --- creation ---

    /// Create an object with `endpoint_count` unconnected endpoints at the origin.
    pub fn create(&mut self, kind: TrackKind<X>, endpoint_count: u8) -> TrackId {
        let endpoints = (0..endpoint_count).map(|_| Endpoint::default()).collect();
        self.insert(0, kind, endpoints)
    }

    /// Create an object from endpoint descriptions. Any connection on the input is dropped.
    pub fn create_with(&mut self, kind: TrackKind<X>, endpoints: Vec<Endpoint>) -> TrackId {
        let endpoints = endpoints.iter().map(Endpoint::detached).collect();
        self.insert(0, kind, endpoints)
    }

    /// Create an object carrying a persisted index, as when loading a file.
    ///
    /// An index of `0` allocates the next free index.
    pub fn create_with_index(
        &mut self,
        index: u32,
        kind: TrackKind<X>,
        endpoints: Vec<Endpoint>,
    ) -> Result<TrackId, GraphError> {
        if index != 0 && self.by_index.contains_key(&index) {
            return Err(GraphError::DuplicateIndex(index));
        }
        let endpoints = endpoints.iter().map(Endpoint::detached).collect();
        Ok(self.insert(index, kind, endpoints))
    }

    /// Allocate `max_index + 1`, or the lowest unused index once `u32::MAX` is taken.
    fn next_index(&mut self) -> u32 {
        if let Some(next) = self.max_index.checked_add(1) {
            self.max_index = next;
            return next;
        }
        let mut candidate = 1_u32;
        for &used in self.by_index.keys() {
            if used != candidate {
                break;
            }
            candidate = candidate.saturating_add(1);
        }
        candidate
    }

    fn insert(&mut self, index: u32, kind: TrackKind<X>, endpoints: Vec<Endpoint>) -> TrackId {
        let index = if index == 0 {
            self.next_index()
        } else {
            self.max_index = self.max_index.max(index);
            index
        };
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            (idx, generation)
        } else {
            self.slots.push(None);
            self.generations.push(1);
            (self.slots.len() - 1, 1)
        };
        let mut object = TrackObject {
            index,
            generation,
            kind,
            endpoints,
            bounds: Rect::ZERO,
            layer: self.current_layer,
            flags: TrackFlags::default(),
            owner: None,
        };
        object.refresh_bounds();
        self.slots[idx] = Some(object);
        #[allow(
            clippy::cast_possible_truncation,
            reason = "TrackId uses 32-bit slot indices by design."
        )]
        let id = TrackId::new(idx as u32, generation);
        self.by_index.insert(index, id);
        log::trace!("create T{index} as {id:?}");
        id
    }

    // --- identity and lookup ---

    /// Returns true if `id` refers to a live object.
    pub fn is_alive(&self, id: TrackId) -> bool {
        self.get(id).is_some()
    }

    /// Live object for `id`.
    pub fn get(&self, id: TrackId) -> Option<&TrackObject<X>> {
        let object = self.slots.get(id.idx())?.as_ref()?;
        (object.generation == id.1).then_some(object)
    }

    pub(crate) fn get_mut(&mut self, id: TrackId) -> Option<&mut TrackObject<X>> {
        let object = self.slots.get_mut(id.idx())?.as_mut()?;
        (object.generation == id.1).then_some(object)
    }

    pub(crate) fn require(&self, id: TrackId) -> Result<&TrackObject<X>, GraphError> {
        self.get(id).ok_or(GraphError::Missing(id))
    }

    pub(crate) fn require_mut(&mut self, id: TrackId) -> Result<&mut TrackObject<X>, GraphError> {
        self.get_mut(id).ok_or(GraphError::Missing(id))
    }

    /// Live object carrying persisted `index`.
    pub fn find(&self, index: u32) -> Option<TrackId> {
        self.by_index.get(&index).copied()
    }

    /// Persisted index of `id`.
    pub fn index_of(&self, id: TrackId) -> Option<u32> {
        self.get(id).map(|o| o.index)
    }

    /// Variant of `id`.
    pub fn kind(&self, id: TrackId) -> Option<&TrackKind<X>> {
        self.get(id).map(|o| &o.kind)
    }

    /// Overlay payload of `id`.
    pub fn overlay(&self, id: TrackId) -> Option<&X> {
        self.get(id).and_then(|o| o.kind.overlay())
    }

    /// Mutable overlay payload of `id`.
    pub fn overlay_mut(&mut self, id: TrackId) -> Option<&mut X> {
        self.get_mut(id).and_then(|o| o.kind.overlay_mut())
    }

    /// True when `id` is a live plain segment.
    pub fn is_plain(&self, id: TrackId) -> bool {
        self.kind(id).is_some_and(TrackKind::is_plain)
    }

    /// Live ids in ascending persisted-index order.
    pub fn ids(&self) -> Vec<TrackId> {
        self.by_index.values().copied().collect()
    }

    /// Iterate live objects in ascending persisted-index order.
    pub fn iter(&self) -> impl Iterator<Item = (TrackId, &TrackObject<X>)> + '_ {
        self.by_index
            .values()
            .filter_map(|&id| self.get(id).map(|o| (id, o)))
    }

    // --- endpoints ---

    /// Number of endpoints of `id`.
    pub fn endpoint_count(&self, id: TrackId) -> Option<u8> {
        self.get(id).map(|o| ep_u8(o.endpoints.len()))
    }

    /// Endpoint `ep` of `id`.
    pub fn endpoint(&self, id: TrackId, ep: u8) -> Option<&Endpoint> {
        self.get(id)?.endpoints.get(usize::from(ep))
    }

    /// Position of endpoint `ep` of `id`.
    pub fn endpoint_position(&self, id: TrackId, ep: u8) -> Option<Point> {
        self.endpoint(id, ep).map(|e| e.position)
    }

    /// Outward angle of endpoint `ep` of `id`.
    pub fn endpoint_angle(&self, id: TrackId, ep: u8) -> Option<f64> {
        self.endpoint(id, ep).map(|e| e.angle)
    }

    /// Bounding box of `id`.
    pub fn bounding_box(&self, id: TrackId) -> Option<Rect> {
        self.get(id).map(|o| o.bounds)
    }

    pub(crate) fn check_endpoint(&self, id: TrackId, ep: u8) -> Result<&Endpoint, GraphError> {
        let object = self.require(id)?;
        object
            .endpoints
            .get(usize::from(ep))
            .ok_or(GraphError::BadEndpoint {
                index: object.index,
                endpoint: ep,
            })
    }

    pub(crate) fn endpoint_mut(&mut self, at: EndpointRef) -> Result<&mut Endpoint, GraphError> {
        let object = self.require_mut(at.track)?;
        let index = object.index;
        object
            .endpoints
            .get_mut(usize::from(at.endpoint))
            .ok_or(GraphError::BadEndpoint {
                index,
                endpoint: at.endpoint,
            })
    }

    /// Move endpoint `ep` of `id`. The bounding box follows the endpoints.
    pub fn set_endpoint(
        &mut self,
        id: TrackId,
        ep: u8,
        position: Point,
        angle: f64,
    ) -> Result<(), GraphError> {
        let e = self.endpoint_mut(EndpointRef::new(id, ep))?;
        e.position = position;
        e.angle = angle;
        if let Some(object) = self.get_mut(id) {
            object.refresh_bounds();
        }
        Ok(())
    }

    /// Replace every endpoint of `id`, as when an overlay is rebuilt.
    ///
    /// Fails with [`GraphError::EndpointInUse`] if any current endpoint is connected.
    pub fn replace_endpoints(
        &mut self,
        id: TrackId,
        endpoints: Vec<Endpoint>,
    ) -> Result<(), GraphError> {
        let object = self.require_mut(id)?;
        if let Some(ep) = object.endpoints.iter().position(Endpoint::is_connected) {
            return Err(GraphError::EndpointInUse {
                index: object.index,
                endpoint: ep_u8(ep),
            });
        }
        object.endpoints = endpoints.iter().map(Endpoint::detached).collect();
        object.refresh_bounds();
        Ok(())
    }

    /// Replace the option flags of endpoint `ep` of `id`.
    pub fn set_endpoint_options(
        &mut self,
        id: TrackId,
        ep: u8,
        options: EndpointOptions,
    ) -> Result<(), GraphError> {
        self.endpoint_mut(EndpointRef::new(id, ep))?.options = options;
        Ok(())
    }

    /// Replace the elevation descriptor of endpoint `ep` of `id`.
    ///
    /// A height source pushes a computed height across an existing connection.
    pub fn set_elevation(
        &mut self,
        id: TrackId,
        ep: u8,
        elevation: Elevation,
    ) -> Result<(), GraphError> {
        let at = EndpointRef::new(id, ep);
        let e = self.endpoint_mut(at)?;
        e.elevation = elevation;
        if let Some(peer) = e.connection {
            self.propagate_elevation(at, peer);
        }
        Ok(())
    }

    /// Override the bounding box reported by the geometry collaborator.
    pub fn set_bounds(&mut self, id: TrackId, bounds: Rect) -> Result<(), GraphError> {
        self.require_mut(id)?.bounds = bounds;
        Ok(())
    }

    /// Flags of `id`.
    pub fn flags(&self, id: TrackId) -> Option<TrackFlags> {
        self.get(id).map(|o| o.flags)
    }

    /// Replace the flags of `id`.
    pub fn set_flags(&mut self, id: TrackId, flags: TrackFlags) -> Result<(), GraphError> {
        self.require_mut(id)?.flags = flags;
        Ok(())
    }

    /// Add or remove `id` from the selection.
    pub fn set_selected(&mut self, id: TrackId, selected: bool) -> Result<(), GraphError> {
        self.require_mut(id)?.flags.set(TrackFlags::SELECTED, selected);
        Ok(())
    }

    /// Selected live objects in ascending persisted-index order.
    pub fn selected(&self) -> Vec<TrackId> {
        self.iter()
            .filter(|(_, o)| o.flags.contains(TrackFlags::SELECTED))
            .map(|(id, _)| id)
            .collect()
    }

    /// Clear the selection.
    pub fn clear_selection(&mut self) {
        for object in self.slots.iter_mut().flatten() {
            object.flags.remove(TrackFlags::SELECTED);
        }
    }

    // --- ownership back-references ---

    /// Live overlay owning `id`, if any. A stale owner reads as `None`.
    pub fn owner(&self, id: TrackId) -> Option<TrackId> {
        self.get(id)?.owner.filter(|o| self.is_alive(*o))
    }

    /// Set or clear the owner back-reference of `id`.
    pub fn set_owner(&mut self, id: TrackId, owner: Option<TrackId>) -> Result<(), GraphError> {
        self.require_mut(id)?.owner = owner;
        Ok(())
    }

    // --- adjacency ---

    /// The endpoint joined to endpoint `ep` of `id`.
    pub fn peer(&self, id: TrackId, ep: u8) -> Option<EndpointRef> {
        self.endpoint(id, ep)?.connection
    }

    /// Endpoint of `id` that is joined to `me`, if any.
    pub fn connected_to_me(&self, id: TrackId, me: TrackId) -> Option<u8> {
        let object = self.get(id)?;
        object
            .endpoints
            .iter()
            .position(|e| e.connection.is_some_and(|c| c.track == me))
            .map(ep_u8)
    }

    /// Check that two endpoints are close enough and face each other.
    ///
    /// Returns the distance and angle deviation on success.
    pub fn check_alignment(
        &self,
        a: TrackId,
        i: u8,
        b: TrackId,
        j: u8,
    ) -> Result<(f64, f64), GraphError> {
        let ea = self.check_endpoint(a, i)?;
        let eb = self.check_endpoint(b, j)?;
        let distance = ea.position.distance(eb.position);
        let angle = opposition(ea.angle, eb.angle);
        if distance > self.config.connect_distance || angle > self.config.connect_angle {
            return Err(GraphError::OutOfTolerance {
                a: self.index_of(a).unwrap_or_default(),
                ep_a: i,
                b: self.index_of(b).unwrap_or_default(),
                ep_b: j,
                distance,
                angle,
            });
        }
        Ok((distance, angle))
    }

    /// Join endpoint `i` of `a` to endpoint `j` of `b`.
    ///
    /// Both objects must be track, both endpoints free, and the endpoints within the
    /// configured tolerances. On any error nothing is mutated.
    pub fn connect(&mut self, a: TrackId, i: u8, b: TrackId, j: u8) -> Result<(), GraphError> {
        let oa = self.require(a)?;
        let ob = self.require(b)?;
        if !oa.kind.is_track() {
            return Err(GraphError::NotTrack(oa.index));
        }
        if !ob.kind.is_track() {
            return Err(GraphError::NotTrack(ob.index));
        }
        if a == b && i == j {
            return Err(GraphError::SelfConnection(oa.index));
        }
        for (id, ep) in [(a, i), (b, j)] {
            if self.check_endpoint(id, ep)?.is_connected() {
                return Err(GraphError::EndpointInUse {
                    index: self.index_of(id).unwrap_or_default(),
                    endpoint: ep,
                });
            }
        }
        if let Err(err) = self.check_alignment(a, i, b, j) {
            log::debug!("connect rejected: {err}");
            return Err(err);
        }
        let ra = EndpointRef::new(a, i);
        let rb = EndpointRef::new(b, j);
        self.link(ra, rb)?;
        self.propagate_elevation(ra, rb);
        log::debug!(
            "connect T{}[{i}] = T{}[{j}]",
            self.index_of(a).unwrap_or_default(),
            self.index_of(b).unwrap_or_default()
        );
        Ok(())
    }

    /// Separate endpoint `i` of `a` from endpoint `j` of `b`.
    ///
    /// Fails with the fatal-class [`GraphError::NotMutual`] if the two endpoints do not
    /// reference each other; nothing is mutated in that case.
    pub fn disconnect(&mut self, a: TrackId, i: u8, b: TrackId, j: u8) -> Result<(), GraphError> {
        let ra = EndpointRef::new(a, i);
        let rb = EndpointRef::new(b, j);
        let mutual = self.check_endpoint(a, i)?.connection == Some(rb)
            && self.check_endpoint(b, j)?.connection == Some(ra);
        if !mutual {
            return Err(GraphError::NotMutual {
                a: self.index_of(a).unwrap_or_default(),
                ep_a: i,
                b: self.index_of(b).unwrap_or_default(),
                ep_b: j,
            });
        }
        self.unlink(ra, rb)?;
        self.revert_elevation(ra);
        self.revert_elevation(rb);
        log::debug!(
            "disconnect T{}[{i}] / T{}[{j}]",
            self.index_of(a).unwrap_or_default(),
            self.index_of(b).unwrap_or_default()
        );
        Ok(())
    }

    /// Set both sides of a connection without tolerance checks.
    pub(crate) fn link(&mut self, a: EndpointRef, b: EndpointRef) -> Result<(), GraphError> {
        self.check_endpoint(a.track, a.endpoint)?;
        self.check_endpoint(b.track, b.endpoint)?;
        self.endpoint_mut(a)?.connection = Some(b);
        self.endpoint_mut(b)?.connection = Some(a);
        Ok(())
    }

    /// Clear both sides of a connection.
    pub(crate) fn unlink(&mut self, a: EndpointRef, b: EndpointRef) -> Result<(), GraphError> {
        self.check_endpoint(a.track, a.endpoint)?;
        self.check_endpoint(b.track, b.endpoint)?;
        self.endpoint_mut(a)?.connection = None;
        self.endpoint_mut(b)?.connection = None;
        Ok(())
    }

    fn propagate_elevation(&mut self, a: EndpointRef, b: EndpointRef) {
        let (Some(ea), Some(eb)) = (
            self.endpoint(a.track, a.endpoint).map(|e| e.elevation.clone()),
            self.endpoint(b.track, b.endpoint).map(|e| e.elevation.clone()),
        ) else {
            return;
        };
        let computed = |height| Elevation {
            mode: ElevationMode::Computed,
            height,
            station: None,
        };
        if ea.is_source() && eb.mode == ElevationMode::None {
            if let Ok(e) = self.endpoint_mut(b) {
                e.elevation = computed(ea.height);
            }
        } else if eb.is_source() && ea.mode == ElevationMode::None {
            if let Ok(e) = self.endpoint_mut(a) {
                e.elevation = computed(eb.height);
            }
        }
    }

    fn revert_elevation(&mut self, at: EndpointRef) {
        if let Ok(e) = self.endpoint_mut(at)
            && e.elevation.mode == ElevationMode::Computed
        {
            e.elevation = Elevation::default();
        }
    }

    // --- deletion ---

    /// Delete `id`, returning every object removed.
    ///
    /// With `cascade`, connected neighbours flagged
    /// [`CANNOT_BE_ON_END`](TrackFlags::CANNOT_BE_ON_END) are deleted first (unless `id`
    /// carries that flag itself). `hook` sees each object before it is disconnected.
    pub fn delete<H>(
        &mut self,
        id: TrackId,
        cascade: bool,
        hook: &mut H,
    ) -> Result<Vec<TrackId>, GraphError>
    where
        H: DeleteHook<X> + ?Sized,
    {
        let object = self.require(id)?;
        let mut victims = Vec::new();
        if cascade && !object.flags.contains(TrackFlags::CANNOT_BE_ON_END) {
            for e in &object.endpoints {
                if let Some(peer) = e.connection
                    && self
                        .flags(peer.track)
                        .is_some_and(|f| f.contains(TrackFlags::CANNOT_BE_ON_END))
                    && !victims.contains(&peer.track)
                {
                    victims.push(peer.track);
                }
            }
        }
        victims.push(id);
        let mut removed = Vec::with_capacity(victims.len());
        for victim in victims {
            if self.is_alive(victim) {
                self.delete_one(victim, hook)?;
                removed.push(victim);
            }
        }
        Ok(removed)
    }

    fn delete_one<H>(&mut self, id: TrackId, hook: &mut H) -> Result<(), GraphError>
    where
        H: DeleteHook<X> + ?Sized,
    {
        hook.before_delete(self, id);
        let endpoints = self.require(id)?.endpoints.len();
        for ep in 0..endpoints {
            let ep = ep_u8(ep);
            if let Some(peer) = self.peer(id, ep) {
                self.disconnect(id, ep, peer.track, peer.endpoint)?;
            }
        }
        let object = self.slots[id.idx()].take().ok_or(GraphError::Missing(id))?;
        self.by_index.remove(&object.index);
        self.free_list.push(id.idx());
        log::debug!("delete T{}", object.index);
        Ok(())
    }

    /// Remove every object. Ids handed out before stay stale.
    pub fn clear(&mut self) {
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if slot.take().is_some() {
                self.free_list.push(idx);
            }
        }
        self.by_index.clear();
        self.max_index = 0;
    }

    // --- spatial queries ---

    /// Live objects whose bounding box intersects `rect`.
    pub fn tracks_in_rect(&self, rect: Rect) -> Vec<TrackId> {
        self.iter()
            .filter(|(_, o)| touches(o.bounds, rect))
            .map(|(id, _)| id)
            .collect()
    }

    /// Nearest free track endpoint within `connect_distance` of `point`.
    pub fn unconnected_endpoint_near(&self, point: Point) -> Option<EndpointRef> {
        let mut best: Option<(EndpointRef, f64)> = None;
        for (id, object) in self.iter() {
            if !object.kind.is_track() {
                continue;
            }
            for (ep, e) in object.endpoints.iter().enumerate() {
                if e.is_connected() {
                    continue;
                }
                let d = e.position.distance(point);
                if d <= self.config.connect_distance && best.is_none_or(|(_, bd)| d < bd) {
                    best = Some((EndpointRef::new(id, ep_u8(ep)), d));
                }
            }
        }
        best.map(|(at, _)| at)
    }

    // --- auditing ---

    /// Verify adjacency symmetry over the whole graph.
    pub fn audit(&self) -> Result<(), GraphError> {
        for (id, object) in self.iter() {
            for (ep, e) in object.endpoints.iter().enumerate() {
                let Some(peer) = e.connection else {
                    continue;
                };
                let back = self
                    .endpoint(peer.track, peer.endpoint)
                    .and_then(|pe| pe.connection);
                if back != Some(EndpointRef::new(id, ep_u8(ep))) {
                    return Err(GraphError::Corrupt(format!(
                        "T{}[{ep}] references {:?} which does not reference it back",
                        object.index, peer
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Straight plain segment from `a` to `b`.
    pub(crate) fn straight(g: &mut TrackGraph, a: (f64, f64), b: (f64, f64)) -> TrackId {
        let pa = Point::new(a.0, a.1);
        let pb = Point::new(b.0, b.1);
        let ang = crate::geometry::direction(pa, pb);
        g.create_with(
            TrackKind::Plain,
            vec![Endpoint::new(pa, ang + 180.0), Endpoint::new(pb, ang)]
                .into_iter()
                .map(|mut e| {
                    e.angle = crate::geometry::normalize_angle(e.angle);
                    e
                })
                .collect(),
        )
    }

    #[test]
    fn create_assigns_increasing_indices() {
        let mut g = TrackGraph::<()>::new();
        let a = g.create(TrackKind::Plain, 2);
        let b = g.create(TrackKind::Turnout, 3);
        assert_eq!(g.index_of(a), Some(1));
        assert_eq!(g.index_of(b), Some(2));
        assert_eq!(g.find(2), Some(b));
        assert_eq!(g.endpoint_count(b), Some(3));
        assert!(g.peer(b, 2).is_none());
    }

    #[test]
    fn explicit_indices_are_unique() {
        let mut g = TrackGraph::<()>::new();
        let a = g.create_with_index(7, TrackKind::Plain, vec![]).unwrap();
        assert_eq!(g.index_of(a), Some(7));
        assert_eq!(
            g.create_with_index(7, TrackKind::Plain, vec![]),
            Err(GraphError::DuplicateIndex(7))
        );
        let b = g.create(TrackKind::Plain, 2);
        assert_eq!(g.index_of(b), Some(8), "auto index continues after max");
    }

    #[test]
    fn connect_sets_both_sides() {
        let mut g = TrackGraph::new();
        let a = straight(&mut g, (0.0, 0.0), (5.0, 0.0));
        let b = straight(&mut g, (5.0, 0.0), (10.0, 0.0));
        g.connect(a, 1, b, 0).unwrap();
        assert_eq!(g.peer(a, 1), Some(EndpointRef::new(b, 0)));
        assert_eq!(g.peer(b, 0), Some(EndpointRef::new(a, 1)));
        assert_eq!(g.connected_to_me(b, a), Some(0));
        g.audit().unwrap();
    }

    #[test]
    fn connect_out_of_tolerance_mutates_nothing() {
        let mut g = TrackGraph::new();
        let a = straight(&mut g, (0.0, 0.0), (5.0, 0.0));
        let far = straight(&mut g, (6.0, 0.0), (10.0, 0.0));
        let err = g.connect(a, 1, far, 0).unwrap_err();
        assert!(matches!(err, GraphError::OutOfTolerance { .. }));
        assert!(!err.is_fatal());
        assert!(g.peer(a, 1).is_none());
        assert!(g.peer(far, 0).is_none());

        // Same position, wrong facing.
        let bent = straight(&mut g, (5.0, 0.0), (5.0, 5.0));
        let err = g.connect(a, 1, bent, 0).unwrap_err();
        assert!(matches!(err, GraphError::OutOfTolerance { .. }));
        assert!(g.peer(a, 1).is_none());
    }

    #[test]
    fn connect_rejects_busy_endpoints_and_overlays() {
        let mut g = TrackGraph::<u8>::new();
        let a = g.create_with(
            TrackKind::Plain,
            vec![
                Endpoint::new(Point::new(0.0, 0.0), 270.0),
                Endpoint::new(Point::new(5.0, 0.0), 90.0),
            ],
        );
        let b = g.create_with(
            TrackKind::Plain,
            vec![
                Endpoint::new(Point::new(5.0, 0.0), 270.0),
                Endpoint::new(Point::new(10.0, 0.0), 90.0),
            ],
        );
        let c = g.create_with(
            TrackKind::Plain,
            vec![
                Endpoint::new(Point::new(5.0, 0.0), 270.0),
                Endpoint::new(Point::new(10.0, 1.0), 90.0),
            ],
        );
        let o = g.create(TrackKind::Overlay(3), 2);
        g.connect(a, 1, b, 0).unwrap();
        assert!(matches!(
            g.connect(a, 1, c, 0),
            Err(GraphError::EndpointInUse { .. })
        ));
        assert!(matches!(g.connect(o, 0, c, 0), Err(GraphError::NotTrack(_))));
        assert!(matches!(
            g.connect(a, 5, c, 0),
            Err(GraphError::BadEndpoint { endpoint: 5, .. })
        ));
    }

    #[test]
    fn disconnect_requires_mutual_reference() {
        let mut g = TrackGraph::new();
        let a = straight(&mut g, (0.0, 0.0), (5.0, 0.0));
        let b = straight(&mut g, (5.0, 0.0), (10.0, 0.0));
        let err = g.disconnect(a, 1, b, 0).unwrap_err();
        assert!(err.is_fatal());
        g.connect(a, 1, b, 0).unwrap();
        g.disconnect(a, 1, b, 0).unwrap();
        assert!(g.peer(a, 1).is_none());
        assert!(g.peer(b, 0).is_none());
    }

    #[test]
    fn elevation_is_shared_across_a_connection() {
        let mut g = TrackGraph::new();
        let a = straight(&mut g, (0.0, 0.0), (5.0, 0.0));
        let b = straight(&mut g, (5.0, 0.0), (10.0, 0.0));
        g.set_elevation(a, 1, Elevation::defined(2.5)).unwrap();
        g.connect(a, 1, b, 0).unwrap();
        let e = &g.endpoint(b, 0).unwrap().elevation;
        assert_eq!(e.mode, ElevationMode::Computed);
        assert_eq!(e.height, 2.5);

        g.disconnect(a, 1, b, 0).unwrap();
        assert_eq!(g.endpoint(b, 0).unwrap().elevation.mode, ElevationMode::None);
        assert_eq!(
            g.endpoint(a, 1).unwrap().elevation.mode,
            ElevationMode::Defined
        );
    }

    #[test]
    fn delete_disconnects_and_invalidates() {
        let mut g = TrackGraph::new();
        let a = straight(&mut g, (0.0, 0.0), (5.0, 0.0));
        let b = straight(&mut g, (5.0, 0.0), (10.0, 0.0));
        g.connect(a, 1, b, 0).unwrap();
        let removed = g.delete(b, false, &mut ()).unwrap();
        assert_eq!(removed, vec![b]);
        assert!(!g.is_alive(b));
        assert!(g.peer(a, 1).is_none());
        assert_eq!(g.find(2), None);
        g.audit().unwrap();

        // Slot reuse yields a distinct id.
        let c = straight(&mut g, (5.0, 0.0), (10.0, 0.0));
        assert_ne!(b, c);
        assert!(!g.is_alive(b));
        assert!(g.get(b).is_none());
    }

    #[test]
    fn cascade_removes_dependent_neighbours() {
        let mut g = TrackGraph::new();
        let a = straight(&mut g, (0.0, 0.0), (5.0, 0.0));
        let joint = straight(&mut g, (5.0, 0.0), (6.0, 0.0));
        let b = straight(&mut g, (6.0, 0.0), (10.0, 0.0));
        g.set_flags(joint, TrackFlags::VISIBLE | TrackFlags::CANNOT_BE_ON_END)
            .unwrap();
        g.connect(a, 1, joint, 0).unwrap();
        g.connect(joint, 1, b, 0).unwrap();

        let removed = g.delete(a, true, &mut ()).unwrap();
        assert_eq!(removed, vec![joint, a]);
        assert!(g.is_alive(b));
        assert!(g.peer(b, 0).is_none());
        g.audit().unwrap();
    }

    #[test]
    fn delete_hook_sees_intact_object() {
        struct Seen(Vec<(u32, bool)>);
        impl DeleteHook<()> for Seen {
            fn before_delete(&mut self, graph: &mut TrackGraph<()>, id: TrackId) {
                let connected = graph.peer(id, 1).is_some();
                self.0.push((graph.index_of(id).unwrap(), connected));
            }
        }
        let mut g = TrackGraph::new();
        let a = straight(&mut g, (0.0, 0.0), (5.0, 0.0));
        let b = straight(&mut g, (5.0, 0.0), (10.0, 0.0));
        g.connect(a, 1, b, 0).unwrap();
        let mut seen = Seen(Vec::new());
        g.delete(a, true, &mut seen).unwrap();
        assert_eq!(seen.0, vec![(1, true)]);
    }

    #[test]
    fn stale_owner_reads_as_none() {
        let mut g = TrackGraph::new();
        let a = straight(&mut g, (0.0, 0.0), (5.0, 0.0));
        let owner = straight(&mut g, (0.0, 5.0), (5.0, 5.0));
        g.set_owner(a, Some(owner)).unwrap();
        assert_eq!(g.owner(a), Some(owner));
        g.delete(owner, false, &mut ()).unwrap();
        assert_eq!(g.owner(a), None);
    }

    #[test]
    fn endpoint_search_and_rect_query() {
        let mut g = TrackGraph::new();
        let a = straight(&mut g, (0.0, 0.0), (5.0, 0.0));
        let b = straight(&mut g, (20.0, 0.0), (25.0, 0.0));
        assert_eq!(
            g.unconnected_endpoint_near(Point::new(5.05, 0.0)),
            Some(EndpointRef::new(a, 1))
        );
        assert_eq!(g.unconnected_endpoint_near(Point::new(12.0, 0.0)), None);
        let hits = g.tracks_in_rect(Rect::new(18.0, -1.0, 30.0, 1.0));
        assert_eq!(hits, vec![b]);
    }

    #[test]
    fn selection_round_trip() {
        let mut g = TrackGraph::new();
        let a = straight(&mut g, (0.0, 0.0), (5.0, 0.0));
        let b = straight(&mut g, (5.0, 0.0), (10.0, 0.0));
        g.set_selected(b, true).unwrap();
        g.set_selected(a, true).unwrap();
        assert_eq!(g.selected(), vec![a, b]);
        g.clear_selection();
        assert!(g.selected().is_empty());
    }

    #[test]
    fn clear_keeps_old_ids_stale() {
        let mut g = TrackGraph::new();
        let a = straight(&mut g, (0.0, 0.0), (5.0, 0.0));
        g.clear();
        assert!(g.is_empty());
        let b = straight(&mut g, (0.0, 0.0), (5.0, 0.0));
        assert!(!g.is_alive(a));
        assert_ne!(a, b);
        assert_eq!(g.index_of(b), Some(1));
    }
}
