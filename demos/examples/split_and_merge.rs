// Copyright 2025 the Trackwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Split and merge inside a block.
//!
//! Cutting a member track keeps both pieces in the block; fusing them restores the
//! original member count. Cutting the block short deletes it with a notice.
//!
//! Run:
//! - `cargo run -p trackwork_demos --example split_and_merge`

use kurbo::Point;
use trackwork_blocks::Layout;
use trackwork_graph::{Endpoint, SplitOutcome};

fn main() {
    let mut layout = Layout::default();
    let mut ids = Vec::new();
    for i in 0..3 {
        let x = f64::from(i) * 10.0;
        ids.push(layout.add_track(
            false,
            vec![
                Endpoint::new(Point::new(x, 0.0), 270.0),
                Endpoint::new(Point::new(x + 10.0, 0.0), 90.0),
            ],
        ));
    }
    layout.connect(ids[0], 1, ids[1], 0).unwrap();
    layout.connect(ids[1], 1, ids[2], 0).unwrap();
    let block = layout.create_block(ids[0], "Yard", "").unwrap();

    let report = |layout: &Layout| {
        if let Some(b) = layout.graph().overlay(block) {
            println!("{}: {} members, length {}", b.name(), b.members().len(), b.length());
        } else {
            println!("block is gone");
        }
    };
    report(&layout);

    let outcome = layout.split(ids[1], Point::new(14.0, 0.0), false).unwrap();
    let SplitOutcome::Split { leftover } = outcome else {
        println!("split only disconnected: {outcome:?}");
        return;
    };
    report(&layout);

    layout.merge(ids[1], 1, leftover, 0).unwrap();
    report(&layout);

    // Removing the middle leaves two 10-unit pieces, each shorter than the minimum.
    layout.delete(ids[1], false).unwrap();
    report(&layout);
    for notice in layout.take_notices() {
        println!("notice: {}", notice.message);
    }
}
