//! Per-point classification bits

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Classification bitset attached to every point of a frame.
///
/// Only [`PointFlags::GROUND`] is produced by the segmentation stages; the
/// remaining bits are reserved for the object extraction that consumes the
/// output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PointFlags(u8);

impl PointFlags {
    pub const NONE: Self = Self(0);
    pub const NOISE: Self = Self(1);
    pub const GROUND: Self = Self(2);
    /// Static background structure
    pub const BACKGROUND: Self = Self(4);
    pub const VEHICLE: Self = Self(8);
    pub const SIGN: Self = Self(16);
    pub const PEDESTRIAN: Self = Self(32);
    pub const BIKER: Self = Self(64);

    /// Raw bits
    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if every bit of `other` is set
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Drop every bit
    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub const fn is_ground(self) -> bool {
        self.contains(Self::GROUND)
    }
}

impl BitOr for PointFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for PointFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for PointFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(PointFlags, &str); 7] = [
            (PointFlags::NOISE, "noise"),
            (PointFlags::GROUND, "ground"),
            (PointFlags::BACKGROUND, "background"),
            (PointFlags::VEHICLE, "vehicle"),
            (PointFlags::SIGN, "sign"),
            (PointFlags::PEDESTRIAN, "pedestrian"),
            (PointFlags::BIKER, "biker"),
        ];

        if self.is_empty() {
            return write!(f, "none");
        }
        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{}", name)?;
                first = false;
            }
        }
        Ok(())
    }
}
