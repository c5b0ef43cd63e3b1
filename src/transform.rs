//! Conversions from 3x4 pose matrices to position + orientation.

use crate::types::Matrix34;
use serde::Serialize;

/// Position in meters and orientation as yaw/pitch/roll in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EulerPose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl EulerPose {
    /// `[x, y, z, yaw, pitch, roll]`
    pub fn to_array(&self) -> [f64; 6] {
        [self.x, self.y, self.z, self.yaw, self.pitch, self.roll]
    }

    pub fn position(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// Position in meters and orientation as a unit quaternion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuaternionPose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
    pub qx: f64,
    pub qy: f64,
    pub qz: f64,
}

impl QuaternionPose {
    /// `[x, y, z, w, qx, qy, qz]`
    pub fn to_array(&self) -> [f64; 7] {
        [self.x, self.y, self.z, self.w, self.qx, self.qy, self.qz]
    }

    pub fn position(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// Convert a pose matrix to position and Euler angles in degrees.
///
/// Z-Y-X decomposition with two-argument arctangents:
///   yaw   = atan2(m10, m00)
///   pitch = atan2(-m20, sqrt(m21² + m22²))
///   roll  = atan2(m21, m22)
///
/// No special handling near pitch = ±90°.
pub fn convert_to_euler(m: &Matrix34) -> EulerPose {
    let yaw = m[1][0].atan2(m[0][0]);
    let pitch = (-m[2][0]).atan2((m[2][1] * m[2][1] + m[2][2] * m[2][2]).sqrt());
    let roll = m[2][1].atan2(m[2][2]);
    EulerPose {
        x: m[0][3],
        y: m[1][3],
        z: m[2][3],
        yaw: yaw.to_degrees(),
        pitch: pitch.to_degrees(),
        roll: roll.to_degrees(),
    }
}

/// Scalar part of the rotation quaternion. The trace term is taken in
/// absolute value so rounding cannot push it below zero.
pub(crate) fn quaternion_w(m: &Matrix34) -> f64 {
    (1.0 + m[0][0] + m[1][1] + m[2][2]).abs().sqrt() / 2.0
}

/// Vector part of the rotation quaternion for a given scalar part.
/// `w == 0` (rotations of 180°) yields non-finite components.
pub(crate) fn quaternion_xyz(m: &Matrix34, w: f64) -> [f64; 3] {
    [
        (m[2][1] - m[1][2]) / (4.0 * w),
        (m[0][2] - m[2][0]) / (4.0 * w),
        (m[1][0] - m[0][1]) / (4.0 * w),
    ]
}

/// Convert a pose matrix to position and rotation quaternion.
pub fn convert_to_quaternion(m: &Matrix34) -> QuaternionPose {
    let w = quaternion_w(m);
    let [qx, qy, qz] = quaternion_xyz(m, w);
    QuaternionPose {
        x: m[0][3],
        y: m[1][3],
        z: m[2][3],
        w,
        qx,
        qy,
        qz,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::IDENTITY_MATRIX;

    /// Rotation matrix for yaw (Z), pitch (Y), roll (X) in radians, applied Z·Y·X.
    pub(crate) fn rotation(yaw: f64, pitch: f64, roll: f64, t: [f64; 3]) -> Matrix34 {
        let (sy, cy) = yaw.sin_cos();
        let (sp, cp) = pitch.sin_cos();
        let (sr, cr) = roll.sin_cos();
        [
            [cy * cp, cy * sp * sr - sy * cr, cy * sp * cr + sy * sr, t[0]],
            [sy * cp, sy * sp * sr + cy * cr, sy * sp * cr - cy * sr, t[1]],
            [-sp, cp * sr, cp * cr, t[2]],
        ]
    }

    #[test]
    fn test_identity_euler() {
        assert_eq!(convert_to_euler(&IDENTITY_MATRIX).to_array(), [0.0; 6]);
    }

    #[test]
    fn test_identity_quaternion() {
        assert_eq!(
            convert_to_quaternion(&IDENTITY_MATRIX).to_array(),
            [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0]
        );
    }

    #[test]
    fn test_translation_passthrough() {
        let m = rotation(0.3, -0.2, 0.1, [1.5, -2.0, 0.25]);
        assert_eq!(convert_to_euler(&m).position(), [1.5, -2.0, 0.25]);
        assert_eq!(convert_to_quaternion(&m).position(), [1.5, -2.0, 0.25]);
    }

    #[test]
    fn test_euler_recovers_angles() {
        let m = rotation(2.5, 0.4, -2.8, [0.0; 3]);
        let e = convert_to_euler(&m);
        assert!((e.yaw - 2.5f64.to_degrees()).abs() < 1e-9);
        assert!((e.pitch - 0.4f64.to_degrees()).abs() < 1e-9);
        assert!((e.roll - (-2.8f64).to_degrees()).abs() < 1e-9);
    }

    #[test]
    fn test_euler_ranges() {
        let steps = [-3.1, -2.0, -1.0, -0.3, 0.0, 0.7, 1.5, 2.9, 3.14159];
        for &yaw in &steps {
            for &pitch in &[-1.5707, -1.2, -0.4, 0.0, 0.8, 1.5707] {
                for &roll in &steps {
                    let e = convert_to_euler(&rotation(yaw, pitch, roll, [0.0; 3]));
                    assert!(e.yaw > -180.0 && e.yaw <= 180.0, "yaw {}", e.yaw);
                    assert!(e.roll > -180.0 && e.roll <= 180.0, "roll {}", e.roll);
                    assert!(e.pitch >= -90.0 && e.pitch <= 90.0, "pitch {}", e.pitch);
                }
            }
        }
    }

    #[test]
    fn test_quaternion_about_z() {
        let angle = 1.0f64;
        let q = convert_to_quaternion(&rotation(angle, 0.0, 0.0, [0.0; 3]));
        assert!((q.w - (angle / 2.0).cos()).abs() < 1e-12);
        assert!((q.qz - (angle / 2.0).sin()).abs() < 1e-12);
        assert!(q.qx.abs() < 1e-12);
        assert!(q.qy.abs() < 1e-12);
    }

    #[test]
    fn test_quaternion_half_turn_is_degenerate() {
        let half_turn: Matrix34 = [
            [-1.0, 0.0, 0.0, 0.0],
            [0.0, -1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ];
        let q = convert_to_quaternion(&half_turn);
        assert_eq!(q.w, 0.0);
        assert!(!q.qx.is_finite() || !q.qy.is_finite() || !q.qz.is_finite());
    }
}
