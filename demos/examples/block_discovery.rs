// Copyright 2025 the Trackwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Block discovery.
//!
//! Lay a short main line with a passing siding, let the partitioner name the blocks, then
//! save the layout and load it back.
//!
//! Run:
//! - `cargo run -p trackwork_demos --example block_discovery`

use kurbo::Point;
use trackwork_blocks::Layout;
use trackwork_graph::{Endpoint, TrackId, direction, normalize_angle};

fn segment(layout: &mut Layout, a: (f64, f64), b: (f64, f64)) -> TrackId {
    let (pa, pb) = (Point::new(a.0, a.1), Point::new(b.0, b.1));
    let angle = direction(pa, pb);
    layout.add_track(
        false,
        vec![
            Endpoint::new(pa, normalize_angle(angle + 180.0)),
            Endpoint::new(pb, angle),
        ],
    )
}

fn main() {
    let mut layout = Layout::default();

    // West approach, a turnout at x = 20, then the main line and a diverging siding.
    let west = segment(&mut layout, (0.0, 0.0), (20.0, 0.0));
    let points = layout.add_track(
        true,
        vec![
            Endpoint::new(Point::new(20.0, 0.0), 270.0),
            Endpoint::new(Point::new(26.0, 0.0), 90.0),
            Endpoint::new(Point::new(26.0, 3.0), 90.0),
        ],
    );
    let main = segment(&mut layout, (26.0, 0.0), (60.0, 0.0));
    let siding = segment(&mut layout, (26.0, 3.0), (50.0, 3.0));
    layout.connect(west, 1, points, 0).unwrap();
    layout.connect(points, 1, main, 0).unwrap();
    layout.connect(points, 2, siding, 0).unwrap();

    let created = layout.discover_blocks().unwrap();
    for &block in &created {
        let p = layout.partitioner();
        println!(
            "{}  {}",
            p.describe(layout.graph(), block).unwrap_or_default(),
            p.title(layout.graph(), block).unwrap_or_default()
        );
    }

    let text = layout.save();
    println!("--- saved ---\n{text}");

    let mut reloaded = Layout::default();
    let blocks = reloaded.load(&text).unwrap();
    println!("reloaded {} blocks", blocks.len());
    for notice in reloaded.take_notices() {
        println!("notice: {}", notice.message);
    }
}
