//! Ramer-Douglas-Peucker simplification of traced outlines.
//!
//! Border following yields one point per boundary pixel; RDP collapses
//! the staircase runs along straight edges so the emitted path data stays
//! small. Outlines are closed rings, so [`simplify_ring`] splits each ring
//! at two far-apart anchors and runs RDP on both halves as open chains.

use crate::types::{Point, Polyline};

/// Simplify a closed ring (the last point implicitly connects back to
/// the first).
///
/// The ring is cut at its first point and at the point farthest from it;
/// both anchors survive. Rings that collapse below three points are
/// returned empty since they enclose no area.
#[must_use = "returns the simplified ring"]
pub fn simplify_ring(ring: &Polyline, tolerance: f64) -> Polyline {
    let points = ring.points();
    if points.len() < 4 {
        return if points.len() == 3 {
            ring.clone()
        } else {
            Polyline::new(Vec::new())
        };
    }

    let first = points[0];
    let far = points
        .iter()
        .enumerate()
        .skip(1)
        .max_by(|(_, a), (_, b)| {
            first
                .distance_squared(**a)
                .total_cmp(&first.distance_squared(**b))
        })
        .map_or(points.len() / 2, |(i, _)| i);

    let mut closed: Vec<Point> = points.to_vec();
    closed.push(first);
    let keep_a = rdp_keep(&closed[..=far], tolerance);
    let keep_b = rdp_keep(&closed[far..], tolerance);

    // `keep_b` starts at the shared `far` anchor and ends at the repeated
    // first point; drop both duplicates.
    let mut out: Vec<Point> = closed[..=far]
        .iter()
        .zip(&keep_a)
        .filter_map(|(&p, &k)| k.then_some(p))
        .collect();
    let tail = &closed[far..];
    out.extend(
        tail.iter()
            .zip(&keep_b)
            .take(tail.len() - 1)
            .skip(1)
            .filter_map(|(&p, &k)| k.then_some(p)),
    );

    if out.len() < 3 {
        return Polyline::new(Vec::new());
    }
    Polyline::new(out)
}

/// RDP over `points`, returning which indices survive.
///
/// Iterative with an explicit stack so long outlines cannot overflow.
fn rdp_keep(points: &[Point], tolerance: f64) -> Vec<bool> {
    let mut kept = vec![false; points.len()];
    let Some(last) = points.len().checked_sub(1) else {
        return kept;
    };
    kept[0] = true;
    kept[last] = true;

    let mut stack = vec![(0, last)];
    while let Some((start, end)) = stack.pop() {
        if end <= start + 1 {
            continue;
        }
        let (max_idx, max_dist) = ((start + 1)..end)
            .map(|i| (i, perpendicular_distance(points[i], points[start], points[end])))
            .fold((start, 0.0_f64), |best, cur| if cur.1 > best.1 { cur } else { best });
        if max_dist > tolerance {
            kept[max_idx] = true;
            stack.push((start, max_idx));
            stack.push((max_idx, end));
        }
    }
    kept
}

/// Perpendicular distance from `p` to the line through `a` and `b`,
/// or the distance to `a` when the two coincide.
fn perpendicular_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx.mul_add(dx, dy * dy);
    if length_sq == 0.0 {
        return p.distance(a);
    }
    let cross = dx.mul_add(a.y - p.y, -(dy * (a.x - p.x)));
    cross.abs() / length_sq.sqrt()
}
