//! Geometry helpers.

use cgmath::{MetricSpace, Point2};

/// A 2D point
pub type Point2d = Point2<f64>;

/// Converts a serialized `[x, y]` pair into a point.
pub fn point(xy: [f64; 2]) -> Point2d {
    Point2d::new(xy[0], xy[1])
}

/// The length of a polyline in m.
pub fn polyline_length(points: &[Point2d]) -> f64 {
    points.windows(2).map(|w| w[0].distance(w[1])).sum()
}

#[cfg(test)]
mod test {
    use super::{polyline_length, Point2d};

    #[test]
    fn polyline() {
        let points = [
            Point2d::new(0.0, 0.0),
            Point2d::new(3.0, 4.0),
            Point2d::new(3.0, 10.0),
        ];
        assert_eq!(polyline_length(&points), 11.0);
        assert_eq!(polyline_length(&points[..1]), 0.0);
    }
}
