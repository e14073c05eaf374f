use std::fs::File;
use std::io;
use std::mem;
use std::path::Path;

use prelude::flame::{self, Span};

/// Dumps the spans of the calling thread with repeated control cycles folded
/// into one span per name and depth.
pub fn write_flame<P: AsRef<Path>>(path: P) -> io::Result<()> {
    let mut spans = flame::spans();
    merge_spans(&mut spans);
    flame::dump_html_custom(&mut File::create(path)?, &spans)
}

fn merge_spans(spans: &mut Vec<Span>) {
    if spans.is_empty() {
        return;
    }

    // Spans to merge become adjacent, the one with the most children first
    spans.sort_by(|s1, s2| {
        let a = (&s1.name, s1.depth, usize::max_value() - s1.children.len());
        let b = (&s2.name, s2.depth, usize::max_value() - s2.children.len());
        a.cmp(&b)
    });

    let mut merged: Vec<Span> = Vec::with_capacity(spans.len());
    for mut span in spans.drain(..) {
        match merged.last_mut() {
            Some(target) if target.name == span.name && target.depth == span.depth => {
                target.delta += span.delta;
                target.children.extend(mem::replace(&mut span.children, Vec::new()));
            }
            _ => merged.push(span),
        }
    }

    for span in &mut merged {
        merge_spans(&mut span.children);
    }
    *spans = merged;
}
