//! Bounding volumes for spatial queries
//!
//! Provides the axis-aligned bounding box used throughout the partitioning
//! subsystem, plus the six-plane camera frustum used for visibility tests.

use crate::foundation::math::{Mat4, Point3, Vec3};

/// Axis-Aligned Bounding Box for spatial queries
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl AABB {
    /// Create a new AABB from min and max points
    ///
    /// Debug-asserts that min <= max on all axes.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        debug_assert!(
            min.x <= max.x && min.y <= max.y && min.z <= max.z,
            "AABB min must be <= max on all axes"
        );
        Self { min, max }
    }

    /// Create an AABB centered at a point with given extents
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// Create the smallest AABB enclosing a set of points
    ///
    /// An empty slice produces a zero-sized box at the origin.
    pub fn from_points(points: &[Vec3]) -> Self {
        let Some(first) = points.first() else {
            return Self {
                min: Vec3::zeros(),
                max: Vec3::zeros(),
            };
        };

        let mut min = *first;
        let mut max = *first;
        for p in &points[1..] {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }

        Self { min, max }
    }

    /// Get the center of the AABB
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the extents (half-size) of the AABB
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Get the full size of the AABB along each axis
    pub fn dimensions(&self) -> Vec3 {
        self.max - self.min
    }

    /// Width of the box (X axis)
    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    /// Height of the box (Y axis)
    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    /// Depth of the box (Z axis)
    pub fn depth(&self) -> f32 {
        self.max.z - self.min.z
    }

    /// Largest dimension of the box across all three axes
    pub fn max_dimension(&self) -> f32 {
        self.width().max(self.height()).max(self.depth())
    }

    /// True when the box has no spatial extent on any axis
    ///
    /// Such a box cannot be meaningfully indexed and is rejected by the
    /// partitioning structures.
    pub fn has_zero_area(&self) -> bool {
        self.max_dimension() == 0.0
    }

    /// Enumerate the 8 corners of the box
    pub fn corners(&self) -> [Vec3; 8] {
        let (min, max) = (self.min, self.max);
        [
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(max.x, max.y, min.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(min.x, max.y, max.z),
            Vec3::new(max.x, max.y, max.z),
        ]
    }

    /// Check if this AABB contains a point
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Check if this AABB contains every point in a slice
    pub fn contains_points(&self, points: &[Vec3]) -> bool {
        points.iter().all(|p| self.contains_point(*p))
    }

    /// Check if this AABB intersects another AABB
    pub fn intersects(&self, other: &AABB) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }
}

/// Plane defined by normal and distance from origin
#[derive(Debug, Clone, Copy)]
pub struct Plane {
    /// Normal vector (should be normalized)
    pub normal: Vec3,
    /// Distance from origin along the normal
    pub distance: f32,
}

impl Plane {
    /// Create a new plane from normal and distance
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self {
            normal: normal.normalize(),
            distance,
        }
    }

    /// Create a plane from raw `ax + by + cz + d = 0` coefficients
    ///
    /// The plane is normalized so that signed distances are in world units.
    /// Degenerate coefficients produce a plane that rejects nothing.
    pub fn from_coefficients(a: f32, b: f32, c: f32, d: f32) -> Self {
        let normal = Vec3::new(a, b, c);
        let length = normal.magnitude();
        if length <= f32::EPSILON {
            return Self {
                normal: Vec3::zeros(),
                distance: 0.0,
            };
        }
        Self {
            normal: normal / length,
            distance: d / length,
        }
    }

    /// Calculate signed distance from plane to point
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(&point) + self.distance
    }
}

/// Frustum for visibility culling
///
/// Six planes plus the eight world-space corner points of the volume. The
/// corners are what the spatial hash uses to build a bounding box around a
/// camera's view.
#[derive(Debug, Clone)]
pub struct Frustum {
    /// Six planes defining the frustum (left, right, bottom, top, near, far)
    pub planes: [Plane; 6],
    corners: [Vec3; 8],
}

impl Frustum {
    /// Extract frustum planes from a view-projection matrix
    ///
    /// Uses the Gribb-Hartmann method: each plane is a sum or difference of
    /// rows of the combined matrix. Corner points are recovered by
    /// unprojecting the NDC cube through the inverse matrix. A singular
    /// matrix yields a degenerate frustum that culls nothing.
    pub fn from_matrix(view_projection: &Mat4) -> Self {
        let m = view_projection;
        let row = |i: usize| Vec4Row {
            x: m[(i, 0)],
            y: m[(i, 1)],
            z: m[(i, 2)],
            w: m[(i, 3)],
        };

        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));

        let planes = [
            r3.add(&r0).to_plane(),  // left
            r3.sub(&r0).to_plane(),  // right
            r3.add(&r1).to_plane(),  // bottom
            r3.sub(&r1).to_plane(),  // top
            r3.add(&r2).to_plane(),  // near
            r3.sub(&r2).to_plane(),  // far
        ];

        let corners = view_projection.try_inverse().map_or([Vec3::zeros(); 8], |inv| {
            let unproject = |x: f32, y: f32, z: f32| {
                let p = inv.transform_point(&Point3::new(x, y, z));
                Vec3::new(p.x, p.y, p.z)
            };
            [
                // near plane first, far plane second
                unproject(-1.0, -1.0, -1.0),
                unproject(1.0, -1.0, -1.0),
                unproject(1.0, 1.0, -1.0),
                unproject(-1.0, 1.0, -1.0),
                unproject(-1.0, -1.0, 1.0),
                unproject(1.0, -1.0, 1.0),
                unproject(1.0, 1.0, 1.0),
                unproject(-1.0, 1.0, 1.0),
            ]
        });

        Self { planes, corners }
    }

    /// The eight world-space corner points (near 4, then far 4)
    pub fn corners(&self) -> &[Vec3; 8] {
        &self.corners
    }

    /// The four corners of the near plane
    pub fn near_corners(&self) -> &[Vec3] {
        &self.corners[..4]
    }

    /// The four corners of the far plane
    pub fn far_corners(&self) -> &[Vec3] {
        &self.corners[4..]
    }

    /// Smallest AABB enclosing the whole frustum volume
    pub fn bounding_box(&self) -> AABB {
        AABB::from_points(&self.corners)
    }

    /// Check if an AABB is inside or intersects the frustum
    pub fn intersects_aabb(&self, aabb: &AABB) -> bool {
        // For each plane, test the AABB corner furthest along the plane
        // normal; if even that corner is behind the plane the box is out.
        for plane in &self.planes {
            let mut p = aabb.min;
            if plane.normal.x >= 0.0 {
                p.x = aabb.max.x;
            }
            if plane.normal.y >= 0.0 {
                p.y = aabb.max.y;
            }
            if plane.normal.z >= 0.0 {
                p.z = aabb.max.z;
            }

            if plane.distance_to_point(p) < 0.0 {
                return false;
            }
        }

        true
    }
}

/// One row of a 4x4 matrix, used during plane extraction
struct Vec4Row {
    x: f32,
    y: f32,
    z: f32,
    w: f32,
}

impl Vec4Row {
    fn add(&self, other: &Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
            w: self.w + other.w,
        }
    }

    fn sub(&self, other: &Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
            w: self.w - other.w,
        }
    }

    fn to_plane(self) -> Plane {
        Plane::from_coefficients(self.x, self.y, self.z, self.w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4Ext;

    #[test]
    fn test_aabb_contains_point() {
        let aabb = AABB::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));

        assert!(aabb.contains_point(Vec3::zeros()));
        assert!(aabb.contains_point(Vec3::new(0.5, 0.5, 0.5)));
        assert!(!aabb.contains_point(Vec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn test_aabb_intersects() {
        let aabb1 = AABB::new(Vec3::zeros(), Vec3::new(2.0, 2.0, 2.0));
        let aabb2 = AABB::new(Vec3::new(1.0, 1.0, 1.0), Vec3::new(3.0, 3.0, 3.0));
        let aabb3 = AABB::new(Vec3::new(5.0, 5.0, 5.0), Vec3::new(7.0, 7.0, 7.0));

        assert!(aabb1.intersects(&aabb2));
        assert!(!aabb1.intersects(&aabb3));
    }

    #[test]
    fn test_aabb_from_points_encloses_input() {
        let points = [
            Vec3::new(1.0, -2.0, 3.0),
            Vec3::new(-4.0, 5.0, 0.5),
            Vec3::new(2.0, 0.0, -1.0),
        ];
        let aabb = AABB::from_points(&points);

        assert!(aabb.contains_points(&points));
        assert_eq!(aabb.min, Vec3::new(-4.0, -2.0, -1.0));
        assert_eq!(aabb.max, Vec3::new(2.0, 5.0, 3.0));
    }

    #[test]
    fn test_aabb_zero_area() {
        let degenerate = AABB::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(1.0, 2.0, 3.0));
        assert!(degenerate.has_zero_area());

        // A flat box still has extent on some axis
        let flat = AABB::new(Vec3::zeros(), Vec3::new(1.0, 1.0, 0.0));
        assert!(!flat.has_zero_area());
    }

    #[test]
    fn test_aabb_corner_count_and_extremes() {
        let aabb = AABB::new(Vec3::new(-1.0, -2.0, -3.0), Vec3::new(1.0, 2.0, 3.0));
        let corners = aabb.corners();

        assert_eq!(corners.len(), 8);
        assert!(corners.contains(&aabb.min));
        assert!(corners.contains(&aabb.max));
    }

    fn test_frustum() -> Frustum {
        let proj = Mat4::perspective(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0);
        let view = Mat4::look_at(
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::zeros(),
            Vec3::new(0.0, 1.0, 0.0),
        );
        Frustum::from_matrix(&(proj * view))
    }

    #[test]
    fn test_frustum_sees_box_in_front() {
        let frustum = test_frustum();
        let aabb = AABB::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));

        assert!(frustum.intersects_aabb(&aabb));
    }

    #[test]
    fn test_frustum_culls_box_behind_camera() {
        let frustum = test_frustum();
        let behind = AABB::from_center_extents(Vec3::new(0.0, 0.0, 20.0), Vec3::new(1.0, 1.0, 1.0));

        assert!(!frustum.intersects_aabb(&behind));
    }

    #[test]
    fn test_frustum_culls_box_beyond_far_plane() {
        let frustum = test_frustum();
        let too_far =
            AABB::from_center_extents(Vec3::new(0.0, 0.0, -200.0), Vec3::new(1.0, 1.0, 1.0));

        assert!(!frustum.intersects_aabb(&too_far));
    }

    #[test]
    fn test_frustum_bounding_box_covers_near_and_far() {
        let frustum = test_frustum();
        let bounds = frustum.bounding_box();

        // Camera at z=10 looking down -Z with far plane 100: the volume
        // spans roughly z in [-90, 9.9]
        assert!(bounds.max.z <= 10.0);
        assert!(bounds.min.z < -80.0);
        assert!(bounds.contains_point(Vec3::zeros()));
    }
}
