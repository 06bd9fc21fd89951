// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Polygon helpers for traced contours: area, perimeter, Douglas-Peucker
// simplification, convex hull and minimum-area bounding rectangle.

use imageproc::contours::Contour;
use scanwerk_core::types::Point;

/// Convert a traced contour into float points.
pub fn contour_points(contour: &Contour<u32>) -> Vec<Point> {
    contour
        .points
        .iter()
        .map(|p| Point::new(p.x as f32, p.y as f32))
        .collect()
}

/// Absolute shoelace area of a closed polygon.
pub fn polygon_area(points: &[Point]) -> f32 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut area = 0.0f32;
    for i in 0..n {
        let j = (i + 1) % n;
        area += points[i].x * points[j].y - points[j].x * points[i].y;
    }
    area.abs() / 2.0
}

/// Length of the closed polygon outline.
pub fn perimeter(points: &[Point]) -> f32 {
    let n = points.len();
    if n < 2 {
        return 0.0;
    }
    (0..n).map(|i| points[i].distance(&points[(i + 1) % n])).sum()
}

fn point_segment_distance(p: &Point, a: &Point, b: &Point) -> f32 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len2 = dx * dx + dy * dy;
    if len2 < f32::EPSILON {
        return p.distance(a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0);
    p.distance(&Point::new(a.x + t * dx, a.y + t * dy))
}

fn douglas_peucker(points: &[Point], epsilon: f32, out: &mut Vec<Point>) {
    if points.len() < 3 {
        out.extend_from_slice(&points[..points.len().saturating_sub(1)]);
        return;
    }
    let (first, last) = (points[0], points[points.len() - 1]);
    let (idx, dist) = points[1..points.len() - 1]
        .iter()
        .enumerate()
        .map(|(i, p)| (i + 1, point_segment_distance(p, &first, &last)))
        .fold((0, 0.0f32), |best, cur| if cur.1 > best.1 { cur } else { best });

    if dist > epsilon {
        douglas_peucker(&points[..=idx], epsilon, out);
        douglas_peucker(&points[idx..], epsilon, out);
    } else {
        out.push(first);
    }
}

/// Simplify a closed polygon with the Douglas-Peucker algorithm.
///
/// The polygon is split at the vertex farthest from the first point so the
/// closed outline is treated as two open chains.
pub fn approximate_polygon(points: &[Point], epsilon: f32) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let start = points[0];
    let far = points
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.distance(&start).total_cmp(&b.distance(&start)))
        .map(|(i, _)| i)
        .unwrap_or(0);
    if far == 0 {
        return vec![start];
    }

    let mut second_chain: Vec<Point> = points[far..].to_vec();
    second_chain.push(start);

    let mut out = Vec::new();
    douglas_peucker(&points[..=far], epsilon, &mut out);
    douglas_peucker(&second_chain, epsilon, &mut out);
    out
}

fn cross(o: &Point, a: &Point, b: &Point) -> f32 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Convex hull via Andrew's monotone chain.
fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut pts = points.to_vec();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let mut hull: Vec<Point> = Vec::with_capacity(pts.len() * 2);
    for p in pts.iter() {
        while hull.len() >= 2 && cross(&hull[hull.len() - 2], &hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(*p);
    }
    let lower_len = hull.len() + 1;
    for p in pts.iter().rev().skip(1) {
        while hull.len() >= lower_len && cross(&hull[hull.len() - 2], &hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(*p);
    }
    hull.pop();
    hull
}

/// Oriented rectangle of minimum area around a point set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinAreaRect {
    pub center: Point,
    /// Extent along `angle`.
    pub width: f32,
    /// Extent perpendicular to `angle`.
    pub height: f32,
    /// Direction of the `width` side in degrees, y pointing down.
    pub angle: f32,
}

impl MinAreaRect {
    /// Direction of the longer side, folded into (-90, 90].
    pub fn long_side_angle(&self) -> f32 {
        let angle = if self.width >= self.height {
            self.angle
        } else {
            self.angle + 90.0
        };
        let mut folded = angle.rem_euclid(180.0);
        if folded > 90.0 {
            folded -= 180.0;
        }
        folded
    }
}

/// Rotating-calipers search over the hull edges.
pub fn min_area_rect(points: &[Point]) -> Option<MinAreaRect> {
    let hull = convex_hull(points);
    if hull.len() < 3 {
        return None;
    }

    let n = hull.len();
    let mut best: Option<(f32, MinAreaRect)> = None;
    for i in 0..n {
        let (a, b) = (hull[i], hull[(i + 1) % n]);
        let len = a.distance(&b);
        if len < f32::EPSILON {
            continue;
        }
        let (ux, uy) = ((b.x - a.x) / len, (b.y - a.y) / len);
        let (vx, vy) = (-uy, ux);

        let (mut min_u, mut max_u, mut min_v, mut max_v) = (f32::MAX, f32::MIN, f32::MAX, f32::MIN);
        for p in &hull {
            let (rx, ry) = (p.x - a.x, p.y - a.y);
            let pu = rx * ux + ry * uy;
            let pv = rx * vx + ry * vy;
            min_u = min_u.min(pu);
            max_u = max_u.max(pu);
            min_v = min_v.min(pv);
            max_v = max_v.max(pv);
        }

        let (width, height) = (max_u - min_u, max_v - min_v);
        let area = width * height;
        if best.as_ref().is_none_or(|(a, _)| area < *a) {
            let (cu, cv) = ((min_u + max_u) / 2.0, (min_v + max_v) / 2.0);
            let center = Point::new(a.x + cu * ux + cv * vx, a.y + cu * uy + cv * vy);
            best = Some((
                area,
                MinAreaRect {
                    center,
                    width,
                    height,
                    angle: uy.atan2(ux).to_degrees(),
                },
            ));
        }
    }
    best.map(|(_, rect)| rect)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(side: f32) -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(side, 0.0),
            Point::new(side, side),
            Point::new(0.0, side),
        ]
    }

    #[test]
    fn area_and_perimeter_of_square() {
        let sq = square(10.0);
        assert!((polygon_area(&sq) - 100.0).abs() < 1e-4);
        assert!((perimeter(&sq) - 40.0).abs() < 1e-4);
    }

    #[test]
    fn dense_rectangle_outline_simplifies_to_four_corners() {
        let mut outline = Vec::new();
        for x in 0..50 {
            outline.push(Point::new(x as f32, 0.0));
        }
        for y in 0..30 {
            outline.push(Point::new(50.0, y as f32));
        }
        for x in (1..=50).rev() {
            outline.push(Point::new(x as f32, 30.0));
        }
        for y in (1..=30).rev() {
            outline.push(Point::new(0.0, y as f32));
        }
        let eps = 0.02 * perimeter(&outline);
        let approx = approximate_polygon(&outline, eps);
        assert_eq!(approx.len(), 4, "got {approx:?}");
    }

    #[test]
    fn hull_drops_interior_points() {
        let mut pts = square(4.0);
        pts.push(Point::new(2.0, 2.0));
        assert_eq!(convex_hull(&pts).len(), 4);
    }

    #[test]
    fn min_area_rect_of_tilted_bar() {
        let theta = 10f32.to_radians();
        let (c, s) = (theta.cos(), theta.sin());
        let pts: Vec<Point> = [(0.0, 0.0), (100.0, 0.0), (100.0, 10.0), (0.0, 10.0)]
            .iter()
            .map(|&(x, y): &(f32, f32)| Point::new(x * c - y * s, x * s + y * c))
            .collect();
        let rect = min_area_rect(&pts).unwrap();
        assert!((rect.long_side_angle() - 10.0).abs() < 0.01, "angle {}", rect.long_side_angle());
        assert!((rect.width.max(rect.height) - 100.0).abs() < 0.01);
    }
}
