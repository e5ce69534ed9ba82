//! Affine transforms accumulated down the scene graph.

use glam::{DMat3, DMat4, DVec3};
use serde::{Deserialize, Serialize};

/// A 4x4 affine transform in model units.
///
/// Serialized as 16 numbers in column-major order, so the fourth column
/// carries the translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transform {
    matrix: DMat4,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        matrix: DMat4::IDENTITY,
    };

    pub fn from_matrix(matrix: DMat4) -> Self {
        Self { matrix }
    }

    pub fn from_translation(offset: DVec3) -> Self {
        Self::from_matrix(DMat4::from_translation(offset))
    }

    pub fn from_scale(scale: DVec3) -> Self {
        Self::from_matrix(DMat4::from_scale(scale))
    }

    /// Rotation about the Z (up) axis, angle in radians.
    pub fn from_rotation_z(angle: f64) -> Self {
        Self::from_matrix(DMat4::from_rotation_z(angle))
    }

    /// Compose a parent transform with a child's local transform.
    ///
    /// The result maps child-local points to the parent's space: the local
    /// transform is applied first, then the parent.
    pub fn compose(parent: &Transform, local: &Transform) -> Transform {
        Transform::from_matrix(parent.matrix * local.matrix)
    }

    /// Shorthand for `Transform::compose(self, local)`.
    pub fn then(&self, local: &Transform) -> Transform {
        Transform::compose(self, local)
    }

    pub fn matrix(&self) -> &DMat4 {
        &self.matrix
    }

    pub fn inverse(&self) -> Transform {
        Transform::from_matrix(self.matrix.inverse())
    }

    pub fn transform_point(&self, point: DVec3) -> DVec3 {
        self.matrix.transform_point3(point)
    }

    pub fn transform_vector(&self, vector: DVec3) -> DVec3 {
        self.matrix.transform_vector3(vector)
    }

    /// Transform a surface normal (inverse transpose of the linear part), normalized.
    pub fn transform_normal(&self, normal: DVec3) -> DVec3 {
        let linear = DMat3::from_mat4(self.matrix);
        if linear.determinant().abs() < f64::EPSILON {
            return linear.mul_vec3(normal).normalize_or_zero();
        }
        linear.inverse().transpose().mul_vec3(normal).normalize_or_zero()
    }

    pub fn x_axis(&self) -> DVec3 {
        self.matrix.x_axis.truncate()
    }

    pub fn y_axis(&self) -> DVec3 {
        self.matrix.y_axis.truncate()
    }

    pub fn z_axis(&self) -> DVec3 {
        self.matrix.z_axis.truncate()
    }

    /// Translation part.
    pub fn origin(&self) -> DVec3 {
        self.matrix.w_axis.truncate()
    }

    /// Scalar triple product of the basis vectors, `(x × y) · z`.
    pub fn determinant(&self) -> f64 {
        self.x_axis().cross(self.y_axis()).dot(self.z_axis())
    }

    /// True when the transform flips handedness.
    pub fn is_mirrored(&self) -> bool {
        self.determinant() < 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: DVec3, b: DVec3) -> bool {
        (a - b).length() < 1e-9
    }

    #[test]
    fn test_compose_applies_local_first() {
        let parent = Transform::from_translation(DVec3::new(10.0, 0.0, 0.0));
        let local = Transform::from_scale(DVec3::splat(2.0));
        let composed = Transform::compose(&parent, &local);

        let p = DVec3::new(1.0, 2.0, 3.0);
        let expected = parent.transform_point(local.transform_point(p));
        assert!(approx(composed.transform_point(p), expected));
        assert!(approx(composed.transform_point(p), DVec3::new(12.0, 4.0, 6.0)));
    }

    #[test]
    fn test_compose_is_associative() {
        let a = Transform::from_rotation_z(0.3);
        let b = Transform::from_translation(DVec3::new(1.0, -2.0, 0.5));
        let c = Transform::from_scale(DVec3::new(1.0, 3.0, -1.0));

        let left = a.then(&b).then(&c);
        let right = a.then(&b.then(&c));
        let p = DVec3::new(0.7, 0.1, -4.0);
        assert!(approx(left.transform_point(p), right.transform_point(p)));
    }

    #[test]
    fn test_mirroring_detection() {
        assert!(!Transform::IDENTITY.is_mirrored());
        assert!(!Transform::from_rotation_z(1.2).is_mirrored());
        let mirror = Transform::from_scale(DVec3::new(-1.0, 1.0, 1.0));
        assert!(mirror.is_mirrored());
        // Two mirrors cancel out
        assert!(!mirror.then(&mirror).is_mirrored());
        assert!((mirror.determinant() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_normal_transform_under_non_uniform_scale() {
        let t = Transform::from_scale(DVec3::new(2.0, 1.0, 1.0));
        let n = t.transform_normal(DVec3::new(1.0, 1.0, 0.0).normalize());
        assert!(approx(n, DVec3::new(0.5, 1.0, 0.0).normalize()));
    }

    #[test]
    fn test_deserialize_column_major() {
        let json = "[1,0,0,0, 0,1,0,0, 0,0,1,0, 5,6,7,1]";
        let t: Transform = serde_json::from_str(json).unwrap();
        assert_eq!(t.origin(), DVec3::new(5.0, 6.0, 7.0));
    }
}
