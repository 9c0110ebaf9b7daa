/// One output slot of a head/tail truncated listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limited<T> {
    Item(T),
    /// Number of elements left out between head and tail.
    Skipped(usize),
}

/// Keep the first `head` and last `tail` elements; anything in between collapses
/// into a single `Skipped` marker. Bounds are checked against the full length.
pub fn limited<T>(elements: &[T], head: usize, tail: usize) -> Vec<Limited<&T>> {
    let total = elements.len();
    let tail_start = total.saturating_sub(tail);
    let mut output = Vec::with_capacity(total.min(head + tail + 1));
    for (index, element) in elements.iter().enumerate() {
        if index < head || index >= tail_start {
            output.push(Limited::Item(element));
        } else if index == head {
            output.push(Limited::Skipped(total - head - tail));
        }
    }
    output
}

/// Render a limited listing into `out`, one call per slot.
pub fn write_limited<T>(
    out: &mut String,
    elements: &[T],
    head: usize,
    tail: usize,
    mut item: impl FnMut(&mut String, &T),
    mut skipped: impl FnMut(&mut String, usize),
) {
    for slot in limited(elements, head, tail) {
        match slot {
            Limited::Item(element) => item(out, element),
            Limited::Skipped(count) => skipped(out, count),
        }
    }
}

pub fn plural<'a>(count: usize, singular: &'a str, plural: &'a str) -> &'a str {
    if count == 1 { singular } else { plural }
}
