//! Axis-aligned bounding boxes in millimetres.

use nalgebra::{Isometry3, Point3, Vector3};
use rigspec_types::Axis;
use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box, defined by its minimum and maximum corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Aabb {
    /// Create a bounding box from its two opposite corners.
    ///
    /// The corners are normalised so that `min ≤ max` per axis.
    pub fn new(a: Point3<f64>, b: Point3<f64>) -> Self {
        Self {
            min: a.inf(&b),
            max: a.sup(&b),
        }
    }

    /// A box of `size` centred on `center`.
    pub fn from_center_size(center: Point3<f64>, size: Vector3<f64>) -> Self {
        let half = size.abs() / 2.0;
        Self::new(center - half, center + half)
    }

    /// Smallest box enclosing every point, or `None` for an empty iterator.
    pub fn enclosing<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Point3<f64>>,
    {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Self::new(first, first), |acc, p| Self {
            min: acc.min.inf(&p),
            max: acc.max.sup(&p),
        }))
    }

    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn size(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// Extent along one axis.
    pub fn extent(&self, axis: Axis) -> f64 {
        self.size()[axis.index()]
    }

    pub fn volume(&self) -> f64 {
        let s = self.size();
        s.x * s.y * s.z
    }

    /// The eight corners, bottom face first.
    pub fn corners(&self) -> [Point3<f64>; 8] {
        let (a, b) = (self.min, self.max);
        [
            Point3::new(a.x, a.y, a.z),
            Point3::new(b.x, a.y, a.z),
            Point3::new(b.x, b.y, a.z),
            Point3::new(a.x, b.y, a.z),
            Point3::new(a.x, a.y, b.z),
            Point3::new(b.x, a.y, b.z),
            Point3::new(b.x, b.y, b.z),
            Point3::new(a.x, b.y, b.z),
        ]
    }

    /// True when `other` overlaps (intersects or touches) this box.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        (0..3).all(|i| self.min[i] <= other.max[i] && self.max[i] >= other.min[i])
    }

    /// The common region of two boxes, or `None` when they do not overlap.
    pub fn intersection(&self, other: &Aabb) -> Option<Aabb> {
        if !self.overlaps(other) {
            return None;
        }
        Some(Aabb {
            min: self.min.sup(&other.min),
            max: self.max.inf(&other.max),
        })
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// Euclidean distance from `p` to the box; zero inside.
    pub fn distance_to_point(&self, p: &Point3<f64>) -> f64 {
        let clamped = p.sup(&self.min).inf(&self.max);
        (p - clamped).norm()
    }

    /// Axis-aligned box enclosing this box after a rigid transform.
    ///
    /// Exact for rotations by multiples of 90°.
    pub fn transformed(&self, iso: &Isometry3<f64>) -> Aabb {
        let corners = self.corners().map(|c| iso * c);
        let mut out = Aabb::new(corners[0], corners[0]);
        for c in &corners[1..] {
            out.min = out.min.inf(c);
            out.max = out.max.sup(c);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Translation3, UnitQuaternion};

    fn unit_box() -> Aabb {
        Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn new_normalises_corners() {
        let b = Aabb::new(Point3::new(2.0, 0.0, 5.0), Point3::new(0.0, 3.0, 1.0));
        assert_eq!(b.min, Point3::new(0.0, 0.0, 1.0));
        assert_eq!(b.max, Point3::new(2.0, 3.0, 5.0));
        assert_relative_eq!(b.volume(), 24.0);
    }

    #[test]
    fn intersection_of_overlapping_boxes() {
        let a = Aabb::new(Point3::origin(), Point3::new(10.0, 10.0, 10.0));
        let b = Aabb::new(Point3::new(8.0, 8.0, 8.0), Point3::new(20.0, 20.0, 20.0));
        let i = a.intersection(&b).unwrap();
        assert_relative_eq!(i.volume(), 8.0);
        assert_eq!(a.intersection(&b), b.intersection(&a));
    }

    #[test]
    fn touching_boxes_overlap_with_zero_volume() {
        let a = unit_box();
        let b = Aabb::new(Point3::new(1.0, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0));
        assert!(a.overlaps(&b));
        assert_relative_eq!(a.intersection(&b).unwrap().volume(), 0.0);
    }

    #[test]
    fn separated_boxes_do_not_intersect() {
        let a = unit_box();
        let b = Aabb::new(Point3::new(3.0, 0.0, 0.0), Point3::new(4.0, 1.0, 1.0));
        assert!(a.intersection(&b).is_none());
    }

    #[test]
    fn distance_to_point_outside_and_inside() {
        let b = unit_box();
        assert_relative_eq!(b.distance_to_point(&Point3::new(4.0, 0.5, 0.5)), 3.0);
        assert_relative_eq!(b.distance_to_point(&Point3::new(0.5, 0.5, 0.5)), 0.0);
    }

    #[test]
    fn transformed_by_quarter_turn_swaps_extents() {
        let b = Aabb::new(Point3::origin(), Point3::new(4.0, 2.0, 1.0));
        let iso = Isometry3::from_parts(
            Translation3::new(10.0, 0.0, 0.0),
            UnitQuaternion::from_euler_angles(0.0, 0.0, std::f64::consts::FRAC_PI_2),
        );
        let t = b.transformed(&iso);
        assert_relative_eq!(t.extent(Axis::X), 2.0, epsilon = 1e-9);
        assert_relative_eq!(t.extent(Axis::Y), 4.0, epsilon = 1e-9);
        assert_relative_eq!(t.max.x, 10.0, epsilon = 1e-9);
    }
}
