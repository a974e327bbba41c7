//! Eye-openness geometry
//!
//! Computes the eye aspect ratio from the six landmark points of one eye,
//! ordered: outer corner, two upper-lid points, inner corner, two lower-lid
//! points.

/// Six 2-D points describing one eye, in anatomical order p0..p5
pub type EyePoints = [(f32, f32); 6];

/// Ratio reported when the eye corners are co-located.
///
/// A degenerate landmark set reads as fully open, so collapsed geometry can
/// never fabricate a closed frame (and never divides by zero).
pub const DEGENERATE_OPEN_RATIO: f32 = 1.0;

fn euclidean(a: (f32, f32), b: (f32, f32)) -> f32 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    (dx * dx + dy * dy).sqrt()
}

/// Vertical-to-horizontal eye opening ratio: (|p1p5| + |p2p4|) / (2 |p0p3|).
///
/// Pure and deterministic. Values below ~0.2 indicate a closed eye.
pub fn openness_ratio(eye: &EyePoints) -> f32 {
    let vertical_a = euclidean(eye[1], eye[5]);
    let vertical_b = euclidean(eye[2], eye[4]);
    let horizontal = euclidean(eye[0], eye[3]);

    if horizontal <= f32::EPSILON {
        return DEGENERATE_OPEN_RATIO;
    }

    (vertical_a + vertical_b) / (2.0 * horizontal)
}
