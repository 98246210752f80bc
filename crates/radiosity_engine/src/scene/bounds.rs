use crate::foundation::math::Vec3;

/// Axis-Aligned Bounding Box used to skip whole meshes during traversal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl Aabb {
    /// Box containing nothing; growing it by any point yields that point
    pub fn empty() -> Self {
        Self {
            min: Vec3::repeat(f32::INFINITY),
            max: Vec3::repeat(f32::NEG_INFINITY),
        }
    }

    /// Smallest box containing `points`
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Self {
        points.into_iter().fold(Self::empty(), |mut bounds, p| {
            bounds.grow(p);
            bounds
        })
    }

    /// Extend the box to contain `point`
    pub fn grow(&mut self, point: &Vec3) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    /// Get the center of the AABB
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Check if this AABB contains a point
    pub fn contains_point(&self, point: &Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Test ray intersection with this AABB using the slab method
    ///
    /// Returns the entry distance (0 when the origin is inside) if the ray
    /// reaches the box before `max_distance`.
    pub fn intersect_ray(&self, origin: &Vec3, direction: &Vec3, max_distance: f32) -> Option<f32> {
        let mut t_min = 0.0_f32;
        let mut t_max = max_distance;

        for axis in 0..3 {
            let inv = 1.0 / direction[axis];
            let mut t0 = (self.min[axis] - origin[axis]) * inv;
            let mut t1 = (self.max[axis] - origin[axis]) * inv;
            if inv < 0.0 {
                std::mem::swap(&mut t0, &mut t1);
            }
            // NaN from 0 * inf on a slab boundary keeps the previous bound
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_max < t_min {
                return None;
            }
        }

        Some(t_min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_points() {
        let points = [Vec3::new(1.0, -2.0, 0.0), Vec3::new(-1.0, 3.0, 0.5)];
        let bounds = Aabb::from_points(&points);
        assert_eq!(bounds.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(bounds.max, Vec3::new(1.0, 3.0, 0.5));
        assert_eq!(bounds.center(), Vec3::new(0.0, 0.5, 0.25));
    }

    #[test]
    fn test_ray_hits_and_misses() {
        let bounds = Aabb { min: Vec3::repeat(-1.0), max: Vec3::repeat(1.0) };
        let origin = Vec3::new(0.0, 0.0, -5.0);
        assert_eq!(bounds.intersect_ray(&origin, &Vec3::z(), 100.0), Some(4.0));
        assert_eq!(bounds.intersect_ray(&origin, &-Vec3::z(), 100.0), None);
        assert_eq!(bounds.intersect_ray(&origin, &Vec3::z(), 3.0), None);
        assert_eq!(bounds.intersect_ray(&Vec3::zeros(), &Vec3::x(), 0.5), Some(0.0));
    }
}
