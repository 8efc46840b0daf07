//! Common types used across ndpak
//!
//! Small value types for geometry and bone math, plus the title enum that
//! selects per-game lookup tables.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// 3D vector (position, normal, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };
    pub const ONE: Self = Self { x: 1.0, y: 1.0, z: 1.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn from_array(v: [f32; 3]) -> Self {
        Self { x: v[0], y: v[1], z: v[2] }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn normalize(&self) -> Self {
        let len = self.length();
        if len > 0.0 {
            Self {
                x: self.x / len,
                y: self.y / len,
                z: self.z / len,
            }
        } else {
            Self::ZERO
        }
    }

    pub fn scale(&self, s: f32) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }

    pub fn dot(&self, other: &Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Self) -> Self {
        Self {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }
}

impl Default for Vec3 {
    fn default() -> Self {
        Self::ZERO
    }
}

/// Affine transform stored as three rotation rows and a translation row.
///
/// Points are row vectors: `p' = p * R + t`. `a.multiply(&b)` applies `a`
/// first, so a bone's world matrix is `local.multiply(&parent_world)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mat43 {
    pub rows: [[f32; 3]; 4],
}

impl Mat43 {
    pub const IDENTITY: Self = Self {
        rows: [
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.0, 0.0, 0.0],
        ],
    };

    /// Rotation matrix from an `[x, y, z, w]` quaternion
    pub fn from_quat(q: [f32; 4]) -> Self {
        let [x, y, z, w] = q;

        let xx = x * x;
        let xy = x * y;
        let xz = x * z;
        let xw = x * w;
        let yy = y * y;
        let yz = y * z;
        let yw = y * w;
        let zz = z * z;
        let zw = z * w;

        Self {
            rows: [
                [1.0 - 2.0 * (yy + zz), 2.0 * (xy - zw), 2.0 * (xz + yw)],
                [2.0 * (xy + zw), 1.0 - 2.0 * (xx + zz), 2.0 * (yz - xw)],
                [2.0 * (xz - yw), 2.0 * (yz + xw), 1.0 - 2.0 * (xx + yy)],
                [0.0, 0.0, 0.0],
            ],
        }
    }

    /// Inverse of [`Mat43::from_quat`]; translation is ignored
    pub fn to_quat(&self) -> [f32; 4] {
        let m = &self.rows;
        let trace = m[0][0] + m[1][1] + m[2][2];

        if trace > 0.0 {
            let s = 0.5 / (trace + 1.0).sqrt();
            [
                (m[2][1] - m[1][2]) * s,
                (m[0][2] - m[2][0]) * s,
                (m[1][0] - m[0][1]) * s,
                0.25 / s,
            ]
        } else if m[0][0] > m[1][1] && m[0][0] > m[2][2] {
            let s = 2.0 * (1.0 + m[0][0] - m[1][1] - m[2][2]).sqrt();
            [
                0.25 * s,
                (m[0][1] + m[1][0]) / s,
                (m[0][2] + m[2][0]) / s,
                (m[2][1] - m[1][2]) / s,
            ]
        } else if m[1][1] > m[2][2] {
            let s = 2.0 * (1.0 + m[1][1] - m[0][0] - m[2][2]).sqrt();
            [
                (m[0][1] + m[1][0]) / s,
                0.25 * s,
                (m[1][2] + m[2][1]) / s,
                (m[0][2] - m[2][0]) / s,
            ]
        } else {
            let s = 2.0 * (1.0 + m[2][2] - m[0][0] - m[1][1]).sqrt();
            [
                (m[0][2] + m[2][0]) / s,
                (m[1][2] + m[2][1]) / s,
                0.25 * s,
                (m[1][0] - m[0][1]) / s,
            ]
        }
    }

    pub fn translation(&self) -> Vec3 {
        Vec3::from_array(self.rows[3])
    }

    pub fn with_translation(mut self, t: Vec3) -> Self {
        self.rows[3] = t.to_array();
        self
    }

    /// Transpose the rotation rows, keeping the translation
    pub fn transpose_rotation(&self) -> Self {
        let m = &self.rows;
        Self {
            rows: [
                [m[0][0], m[1][0], m[2][0]],
                [m[0][1], m[1][1], m[2][1]],
                [m[0][2], m[1][2], m[2][2]],
                m[3],
            ],
        }
    }

    /// `self` followed by `other`
    pub fn multiply(&self, other: &Self) -> Self {
        let a = &self.rows;
        let b = &other.rows;
        let mut rows = [[0.0f32; 3]; 4];
        for (i, row) in rows.iter_mut().enumerate() {
            for (j, value) in row.iter_mut().enumerate() {
                *value = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
            }
        }
        for j in 0..3 {
            rows[3][j] += b[3][j];
        }
        Self { rows }
    }

    /// Inverse of a rigid transform (orthonormal rotation plus translation)
    pub fn inverse(&self) -> Self {
        let mut result = self.transpose_rotation();
        let [tx, ty, tz] = self.rows[3];
        let r = &self.rows;
        result.rows[3] = [
            -(r[0][0] * tx + r[0][1] * ty + r[0][2] * tz),
            -(r[1][0] * tx + r[1][1] * ty + r[1][2] * tz),
            -(r[2][0] * tx + r[2][1] * ty + r[2][2] * tz),
        ];
        result
    }

    /// Transform a point
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        let m = &self.rows;
        Vec3::new(
            p.x * m[0][0] + p.y * m[1][0] + p.z * m[2][0] + m[3][0],
            p.x * m[0][1] + p.y * m[1][1] + p.z * m[2][1] + m[3][1],
            p.x * m[0][2] + p.y * m[1][2] + p.z * m[2][2] + m[3][2],
        )
    }

    pub fn approx_eq(&self, other: &Self, eps: f32) -> bool {
        self.rows
            .iter()
            .flatten()
            .zip(other.rows.iter().flatten())
            .all(|(a, b)| (a - b).abs() <= eps)
    }
}

impl Default for Mat43 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    pub const ZERO: Self = Self {
        min: Vec3::ZERO,
        max: Vec3::ZERO,
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn center(&self) -> Vec3 {
        Vec3::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
            (self.min.z + self.max.z) / 2.0,
        )
    }

    pub fn expand(&mut self, point: Vec3) {
        self.min.x = self.min.x.min(point.x);
        self.min.y = self.min.y.min(point.y);
        self.min.z = self.min.z.min(point.z);
        self.max.x = self.max.x.max(point.x);
        self.max.y = self.max.y.max(point.y);
        self.max.z = self.max.z.max(point.z);
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::ZERO
    }
}

/// Supported titles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum Game {
    #[default]
    #[serde(rename = "U4")]
    Uncharted4,
    #[serde(rename = "TLL")]
    LostLegacy,
    #[serde(rename = "TLOU2")]
    LastOfUs2,
    #[serde(rename = "TLOUP1")]
    LastOfUsPart1,
}

impl Game {
    pub const ALL: [Game; 4] = [
        Game::Uncharted4,
        Game::LostLegacy,
        Game::LastOfUs2,
        Game::LastOfUsPart1,
    ];

    /// Short code used in hash indexes and on the command line
    pub fn code(&self) -> &'static str {
        match self {
            Game::Uncharted4 => "U4",
            Game::LostLegacy => "TLL",
            Game::LastOfUs2 => "TLOU2",
            Game::LastOfUsPart1 => "TLOUP1",
        }
    }

    /// Uncharted titles keep their texture dictionaries in a single world
    pub fn is_uncharted(&self) -> bool {
        matches!(self, Game::Uncharted4 | Game::LostLegacy)
    }

    /// Guess the title from an install path.
    ///
    /// Checked in a fixed order against the lowercased path with `/`
    /// turned into `\`.
    pub fn detect_from_path(path: &Path) -> Option<Game> {
        let lowered = path.to_string_lossy().to_lowercase().replace('/', "\\");
        if lowered.contains("\\thelostlegacy\\") || lowered.contains("tll") {
            Some(Game::LostLegacy)
        } else if lowered.contains("\\uncharted4\\") || lowered.contains("u4") {
            Some(Game::Uncharted4)
        } else if lowered.contains("\\ps4\\main\\") || lowered.contains("tlou2") {
            Some(Game::LastOfUs2)
        } else if lowered.contains("\\pc\\main\\") || lowered.contains("tloup1") {
            Some(Game::LastOfUsPart1)
        } else {
            None
        }
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Game {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Game::ALL
            .into_iter()
            .find(|g| g.code().eq_ignore_ascii_case(s))
            .ok_or_else(|| crate::Error::InvalidConfig {
                message: format!("unknown game '{s}' (expected U4, TLL, TLOU2 or TLOUP1)"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_operations() {
        let v1 = Vec3::new(1.0, 2.0, 3.0);
        let v2 = Vec3::new(4.0, 5.0, 6.0);

        assert!((v1.dot(&v2) - 32.0).abs() < 0.001);

        let cross = v1.cross(&v2);
        assert!((cross.x - (-3.0)).abs() < 0.001);
        assert!((cross.y - 6.0).abs() < 0.001);
        assert!((cross.z - (-3.0)).abs() < 0.001);
    }

    #[test]
    fn test_quat_round_trip() {
        let half = std::f32::consts::FRAC_1_SQRT_2;
        let q = [0.0, half, 0.0, half];
        let back = Mat43::from_quat(q).to_quat();
        for (a, b) in q.iter().zip(back.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_inverse_undoes_transform() {
        let half = std::f32::consts::FRAC_1_SQRT_2;
        let m = Mat43::from_quat([half, 0.0, 0.0, half]).with_translation(Vec3::new(1.0, 2.0, 3.0));
        let round = m.multiply(&m.inverse());
        assert!(round.approx_eq(&Mat43::IDENTITY, 1e-5));

        let p = Vec3::new(0.5, -1.0, 4.0);
        let back = m.inverse().transform_point(m.transform_point(p));
        assert!((back.x - p.x).abs() < 1e-5);
        assert!((back.y - p.y).abs() < 1e-5);
        assert!((back.z - p.z).abs() < 1e-5);
    }

    #[test]
    fn test_multiply_applies_left_first() {
        let a = Mat43::IDENTITY.with_translation(Vec3::new(1.0, 0.0, 0.0));
        let half = std::f32::consts::FRAC_1_SQRT_2;
        let b = Mat43::from_quat([0.0, 0.0, half, half]);
        let p = a.multiply(&b).transform_point(Vec3::ZERO);
        let q = b.transform_point(a.transform_point(Vec3::ZERO));
        assert!((p.x - q.x).abs() < 1e-5 && (p.y - q.y).abs() < 1e-5);
    }

    #[test]
    fn test_bounding_box_expand() {
        let mut bbox = BoundingBox::new(Vec3::ZERO, Vec3::ZERO);
        bbox.expand(Vec3::new(1.0, 2.0, 3.0));
        bbox.expand(Vec3::new(-1.0, -2.0, -3.0));

        assert_eq!(bbox.min, Vec3::new(-1.0, -2.0, -3.0));
        assert_eq!(bbox.max, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_game_detection_order() {
        assert_eq!(
            Game::detect_from_path(Path::new("D:/Games/TheLostLegacy/build/actor77/chloe.pak")),
            Some(Game::LostLegacy)
        );
        assert_eq!(
            Game::detect_from_path(Path::new("C:\\Uncharted4\\actor77\\hero.pak")),
            Some(Game::Uncharted4)
        );
        assert_eq!(
            Game::detect_from_path(Path::new("/dump/ps4/main/actor97/abby.pak")),
            Some(Game::LastOfUs2)
        );
        assert_eq!(
            Game::detect_from_path(Path::new("/steam/pc/main/actor97/joel.pak")),
            Some(Game::LastOfUsPart1)
        );
        assert_eq!(Game::detect_from_path(Path::new("/tmp/thing.pak")), None);
    }

    #[test]
    fn test_game_from_str() {
        assert_eq!("tlou2".parse::<Game>().ok(), Some(Game::LastOfUs2));
        assert!("halo".parse::<Game>().is_err());
    }
}
