// Copyright 2025 the Trackwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Line-oriented layout records.
//!
//! A layout file is a sequence of records. Each record starts with a header line whose
//! first word names the record type and ends with a line reading `END`. Fields are
//! separated by whitespace; strings are double-quoted with `""` standing for a literal
//! quote.
//!
//! This module reads and writes the connectivity part of a layout:
//!
//! ```text
//! TRACK 1 PLAIN 0
//! E 0 0 270
//! T 2 5 0 90
//! END
//! ```
//!
//! `T <peer> <x> <y> <angle>` is a connected endpoint and `E <x> <y> <angle>` a free one.
//! Peers are resolved once every record has been read.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use kurbo::Point;

use crate::error::GraphError;
use crate::graph::{TrackGraph, ep_u8};
use crate::types::{Endpoint, EndpointRef, TrackId, TrackKind};

/// One tokenized line of a record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Line {
    /// One-based line number in the source text.
    pub number: usize,
    /// Whitespace-separated fields with quotes removed.
    pub fields: Vec<String>,
}

impl Line {
    /// Field `i`, or a parse error naming what was expected.
    pub fn field(&self, i: usize, what: &str) -> Result<&str, GraphError> {
        self.fields
            .get(i)
            .map(String::as_str)
            .ok_or_else(|| self.error(format!("missing {what}")))
    }

    /// Field `i` parsed as `T`.
    pub fn parse<T: core::str::FromStr>(&self, i: usize, what: &str) -> Result<T, GraphError> {
        let raw = self.field(i, what)?;
        raw.parse()
            .map_err(|_| self.error(format!("bad {what} `{raw}`")))
    }

    /// A parse error located at this line.
    pub fn error(&self, message: String) -> GraphError {
        GraphError::Parse {
            line: self.number,
            message,
        }
    }
}

/// A header line and the body lines up to its `END`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    /// Header line; `fields[0]` is the record type.
    pub header: Line,
    /// Body lines, without the terminator.
    pub body: Vec<Line>,
}

impl Record {
    /// Record type keyword.
    pub fn kind(&self) -> &str {
        self.header.fields.first().map_or("", String::as_str)
    }
}

/// Quote a string field, doubling embedded quotes.
pub fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Split a line into fields, honouring quoted strings.
pub fn tokenize(line: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let Some(&c) = chars.peek() else {
            break;
        };
        let mut field = String::new();
        if c == '"' {
            chars.next();
            loop {
                match chars.next() {
                    Some('"') if chars.peek() == Some(&'"') => {
                        chars.next();
                        field.push('"');
                    }
                    Some('"') => break,
                    Some(c) => field.push(c),
                    None => return Err("unterminated string".into()),
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                field.push(c);
            }
        }
        fields.push(field);
    }
    Ok(fields)
}

/// Split `text` into records. Blank lines and lines starting with `#` are skipped.
pub fn records(text: &str) -> Result<Vec<Record>, GraphError> {
    let mut out = Vec::new();
    let mut open: Option<Record> = None;
    for (i, raw) in text.lines().enumerate() {
        let number = i + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let fields = tokenize(trimmed).map_err(|message| GraphError::Parse {
            line: number,
            message,
        })?;
        let line = Line { number, fields };
        let is_end = line.fields.first().is_some_and(|f| f == "END");
        match (open.take(), is_end) {
            (Some(record), true) => out.push(record),
            (Some(mut record), false) => {
                record.body.push(line);
                open = Some(record);
            }
            (None, true) => return Err(line.error("END without a record".into())),
            (None, false) => {
                open = Some(Record {
                    header: line,
                    body: Vec::new(),
                });
            }
        }
    }
    if let Some(record) = open {
        return Err(record.header.error(format!("{} record has no END", record.kind())));
    }
    Ok(out)
}

struct Parsed {
    index: u32,
    turnout: bool,
    layer: u32,
    endpoints: Vec<Endpoint>,
    peers: Vec<Option<u32>>,
    line: usize,
}

fn parse_track(record: &Record) -> Result<Parsed, GraphError> {
    let h = &record.header;
    let index: u32 = h.parse(1, "track index")?;
    if index == 0 {
        return Err(h.error("track index 0 is reserved".into()));
    }
    let turnout = match h.field(2, "track kind")? {
        "PLAIN" => false,
        "TURNOUT" => true,
        other => return Err(h.error(format!("unknown track kind `{other}`"))),
    };
    let layer = h.parse(3, "layer")?;
    let mut endpoints = Vec::new();
    let mut peers = Vec::new();
    for line in &record.body {
        let (peer, at) = match line.field(0, "endpoint tag")? {
            "T" => (Some(line.parse::<u32>(1, "peer index")?), 2),
            "E" => (None, 1),
            other => return Err(line.error(format!("unknown endpoint tag `{other}`"))),
        };
        let x = line.parse(at, "x")?;
        let y = line.parse(at + 1, "y")?;
        let angle = line.parse(at + 2, "angle")?;
        endpoints.push(Endpoint::new(Point::new(x, y), angle));
        peers.push(peer);
    }
    if endpoints.len() > usize::from(u8::MAX) {
        return Err(h.error("too many endpoints".into()));
    }
    if !turnout && endpoints.len() != 2 {
        return Err(h.error(format!(
            "plain track T{index} has {} endpoints",
            endpoints.len()
        )));
    }
    Ok(Parsed {
        index,
        turnout,
        layer,
        endpoints,
        peers,
        line: h.number,
    })
}

/// Pair every `T` endpoint with the endpoint of its peer that points back.
///
/// Where several endpoints of the peer point back, the nearest unmatched one is taken.
fn resolve(parsed: &[Parsed]) -> Result<Vec<((usize, u8), (usize, u8))>, GraphError> {
    let by_index: BTreeMap<u32, usize> =
        parsed.iter().enumerate().map(|(i, p)| (p.index, i)).collect();
    let mut matched = BTreeSet::new();
    let mut pairs = Vec::new();
    for (ri, rec) in parsed.iter().enumerate() {
        for (ep, peer) in rec.peers.iter().enumerate() {
            let ep = ep_u8(ep);
            let Some(peer) = *peer else {
                continue;
            };
            if matched.contains(&(ri, ep)) {
                continue;
            }
            let &pi = by_index.get(&peer).ok_or_else(|| {
                GraphError::Corrupt(format!(
                    "line {}: T{}[{ep}] references missing track T{peer}",
                    rec.line, rec.index
                ))
            })?;
            let here = rec.endpoints[usize::from(ep)].position;
            let back = parsed[pi]
                .peers
                .iter()
                .enumerate()
                .filter(|&(pe, p)| {
                    *p == Some(rec.index)
                        && (pi, ep_u8(pe)) != (ri, ep)
                        && !matched.contains(&(pi, ep_u8(pe)))
                })
                .map(|(pe, _)| {
                    let d = parsed[pi].endpoints[pe].position.distance(here);
                    (ep_u8(pe), d)
                })
                .min_by(|a, b| a.1.total_cmp(&b.1));
            let Some((pe, _)) = back else {
                return Err(GraphError::Corrupt(format!(
                    "line {}: T{}[{ep}] references T{peer}, which does not reference it back",
                    rec.line, rec.index
                )));
            };
            matched.insert((ri, ep));
            matched.insert((pi, pe));
            pairs.push(((ri, ep), (pi, pe)));
        }
    }
    Ok(pairs)
}

impl<X> TrackGraph<X> {
    /// Write one `TRACK` record per plain segment and turnout, in index order.
    pub fn write_tracks<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        for (_, object) in self.iter() {
            if !object.kind().is_track() {
                continue;
            }
            writeln!(
                out,
                "TRACK {} {} {}",
                object.index(),
                object.kind().name(),
                object.layer()
            )?;
            for e in object.endpoints() {
                let p = e.position;
                match e.connection().and_then(|c| self.index_of(c.track)) {
                    Some(peer) => writeln!(out, "T {peer} {} {} {}", p.x, p.y, e.angle)?,
                    None => writeln!(out, "E {} {} {}", p.x, p.y, e.angle)?,
                }
            }
            writeln!(out, "END")?;
        }
        Ok(())
    }

    /// Create the objects described by the `TRACK` records and join their endpoints.
    ///
    /// Other record types are ignored. The records are checked in full before anything
    /// is created: a peer that does not exist or does not point back is a
    /// [`GraphError::Corrupt`], and the graph is left untouched.
    pub fn load_tracks(&mut self, records: &[Record]) -> Result<Vec<TrackId>, GraphError> {
        let parsed = records
            .iter()
            .filter(|r| r.kind() == "TRACK")
            .map(parse_track)
            .collect::<Result<Vec<_>, _>>()?;
        let mut seen = BTreeSet::new();
        for p in &parsed {
            if !seen.insert(p.index) || self.find(p.index).is_some() {
                return Err(GraphError::DuplicateIndex(p.index));
            }
        }
        let pairs = resolve(&parsed)?;

        let mut ids = Vec::with_capacity(parsed.len());
        for p in parsed {
            let kind = if p.turnout {
                TrackKind::Turnout
            } else {
                TrackKind::Plain
            };
            let id = self.create_with_index(p.index, kind, p.endpoints)?;
            self.require_mut(id)?.layer = p.layer;
            ids.push(id);
        }
        for ((ra, ea), (rb, eb)) in pairs {
            self.link(EndpointRef::new(ids[ra], ea), EndpointRef::new(ids[rb], eb))?;
        }
        log::debug!("loaded {} tracks", ids.len());
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::straight;

    #[test]
    fn tokenize_handles_quotes() {
        assert_eq!(
            tokenize(r#"BLOCK 3 "Main ""A""" "" 1.5 -2"#).unwrap(),
            vec!["BLOCK", "3", "Main \"A\"", "", "1.5", "-2"]
        );
        assert!(tokenize(r#"BLOCK "open"#).is_err());
        assert_eq!(quote("a\"b"), r#""a""b""#);
    }

    #[test]
    fn records_require_terminators() {
        let err = records("TRACK 1 PLAIN 0\nE 0 0 270\n").unwrap_err();
        assert!(err.is_fatal());
        assert!(records("END\n").is_err());
        let r = records("# comment\n\nFOO 1\nBAR\nEND\n").unwrap();
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].kind(), "FOO");
        assert_eq!(r[0].body.len(), 1);
    }

    #[test]
    fn tracks_round_trip() {
        let mut g = TrackGraph::<()>::new();
        let a = straight(&mut g, (0.0, 0.0), (5.0, 0.0));
        let b = straight(&mut g, (5.0, 0.0), (10.0, 0.0));
        let c = straight(&mut g, (10.0, 0.0), (15.5, 0.0));
        g.connect(a, 1, b, 0).unwrap();
        g.connect(b, 1, c, 0).unwrap();
        let mut text = String::new();
        g.write_tracks(&mut text).unwrap();

        let mut h = TrackGraph::<()>::new();
        let ids = h.load_tracks(&records(&text).unwrap()).unwrap();
        assert_eq!(ids.len(), 3);
        let (a2, b2, c2) = (h.find(1).unwrap(), h.find(2).unwrap(), h.find(3).unwrap());
        assert_eq!(h.peer(a2, 1), Some(EndpointRef::new(b2, 0)));
        assert_eq!(h.peer(c2, 0), Some(EndpointRef::new(b2, 1)));
        assert_eq!(h.endpoint_position(c2, 1), Some(Point::new(15.5, 0.0)));
        h.audit().unwrap();

        let mut again = String::new();
        h.write_tracks(&mut again).unwrap();
        assert_eq!(text, again);
    }

    #[test]
    fn turnout_with_two_legs_to_one_peer() {
        // A short plain piece joining two legs of the same turnout.
        let text = "\
TRACK 1 TURNOUT 0
T 2 0 0 270
T 2 5 0 90
E 5 1 80
END
TRACK 2 PLAIN 0
T 1 5 0 270
T 1 0 0 90
END
";
        let mut g = TrackGraph::<()>::new();
        g.load_tracks(&records(text).unwrap()).unwrap();
        let t = g.find(1).unwrap();
        let p = g.find(2).unwrap();
        assert_eq!(g.peer(t, 0), Some(EndpointRef::new(p, 1)));
        assert_eq!(g.peer(t, 1), Some(EndpointRef::new(p, 0)));
        g.audit().unwrap();
    }

    #[test]
    fn highest_index_does_not_exhaust_allocation() {
        let text = "TRACK 4294967295 PLAIN 0\nE 0 0 270\nE 5 0 90\nEND\n";
        let mut g = TrackGraph::<()>::new();
        g.load_tracks(&records(text).unwrap()).unwrap();
        let a = g.create(TrackKind::Plain, 2);
        let b = g.create(TrackKind::Plain, 2);
        assert_eq!(g.index_of(a), Some(1));
        assert_eq!(g.index_of(b), Some(2));
        assert_eq!(g.find(u32::MAX).map(|t| g.index_of(t)), Some(Some(u32::MAX)));
    }

    #[test]
    fn unresolved_peer_is_corruption() {
        let text = "TRACK 1 PLAIN 0\nT 9 0 0 270\nE 5 0 90\nEND\n";
        let mut g = TrackGraph::<()>::new();
        let err = g.load_tracks(&records(text).unwrap()).unwrap_err();
        assert!(err.is_fatal());
        assert!(g.is_empty(), "nothing created on a failed load");

        let text = "\
TRACK 1 PLAIN 0
T 2 0 0 270
E 5 0 90
END
TRACK 2 PLAIN 0
E 0 0 90
E -5 0 270
END
";
        let err = g.load_tracks(&records(text).unwrap()).unwrap_err();
        assert!(matches!(err, GraphError::Corrupt(_)));
        assert!(g.is_empty());
    }

    #[test]
    fn plain_track_needs_two_endpoints() {
        let text = "TRACK 1 PLAIN 0\nE 0 0 270\nEND\n";
        let mut g = TrackGraph::<()>::new();
        assert!(matches!(
            g.load_tracks(&records(text).unwrap()),
            Err(GraphError::Parse { line: 1, .. })
        ));
    }
}
