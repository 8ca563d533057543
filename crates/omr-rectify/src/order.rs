//! Canonical ordering of a four-point quadrilateral into TL/TR/BR/BL.

use omr_core::PagePoint;

/// Order four arbitrary quadrilateral points as `[TL, TR, BR, BL]` using the
/// sum/difference rule: `TL = argmin(x+y)`, `BR = argmax(x+y)`,
/// `TR = argmin(x−y)`, `BL = argmax(x−y)`.
pub fn order_points(pts: &[PagePoint; 4]) -> [PagePoint; 4] {
    let sums: Vec<f32> = pts.iter().map(|p| p.x + p.y).collect();
    let diffs: Vec<f32> = pts.iter().map(|p| p.x - p.y).collect();

    let argmin = |v: &[f32]| -> usize {
        v.iter()
            .enumerate()
            .min_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap()
    };
    let argmax = |v: &[f32]| -> usize {
        v.iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap()
    };

    let tl = pts[argmin(&sums)];
    let br = pts[argmax(&sums)];
    let tr = pts[argmin(&diffs)];
    let bl = pts[argmax(&diffs)];

    [tl, tr, br, bl]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_shuffled_rectangle_correctly() {
        let tl = PagePoint::new(0.0, 0.0);
        let tr = PagePoint::new(100.0, 0.0);
        let br = PagePoint::new(100.0, 200.0);
        let bl = PagePoint::new(0.0, 200.0);

        // feed them in a scrambled order
        let scrambled = [br, tl, bl, tr];
        let ordered = order_points(&scrambled);
        assert_eq!(ordered, [tl, tr, br, bl]);
    }
}
