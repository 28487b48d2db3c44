//! Angular and dome-slit geometry.
//!
//! Pure functions shared by the following algorithm and the vignetting
//! model: wrapped angular differences and the distance from the telescope
//! vertex to the inner edge of the dome slit as a function of elevation.

use crate::error::ConfigError;

/// Return `a - b` in degrees, wrapped into [-180, 180).
///
/// All azimuth comparisons must go through this function; raw subtraction
/// of azimuths is meaningless across the 0/360 seam.
pub fn angle_diff(a: f64, b: f64) -> f64 {
    (a - b + 180.0).rem_euclid(360.0) - 180.0
}

/// Dome-slit distance model.
///
/// The telescope vertex sits `telescope_height_offset` above the dome center;
/// the dome slit is at `dome_inner_radius` from the center. Both lengths use
/// the same unit (millimeters in the standard configuration).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DomeGeometry {
    dome_inner_radius: f64,
    telescope_height_offset: f64,
}

impl DomeGeometry {
    /// Create a geometry model, validating the triangle domain.
    ///
    /// The height offset must be smaller than the dome radius, otherwise the
    /// law-of-sines solution below has no real angle.
    pub fn new(dome_inner_radius: f64, telescope_height_offset: f64) -> Result<Self, ConfigError> {
        if dome_inner_radius <= 0.0 {
            return Err(ConfigError::InvalidGeometry(format!(
                "dome_inner_radius={dome_inner_radius} must be positive"
            )));
        }
        if telescope_height_offset < 0.0 {
            return Err(ConfigError::InvalidGeometry(format!(
                "telescope_height_offset={telescope_height_offset} must not be negative"
            )));
        }
        if telescope_height_offset >= dome_inner_radius {
            return Err(ConfigError::InvalidGeometry(format!(
                "telescope_height_offset={telescope_height_offset} must be smaller than \
                 dome_inner_radius={dome_inner_radius}"
            )));
        }
        Ok(Self {
            dome_inner_radius,
            telescope_height_offset,
        })
    }

    /// Distance from the telescope vertex to the inner edge of the dome slit
    /// at the given telescope elevation (deg).
    ///
    /// Solves the triangle with side a = dome inner radius, side b =
    /// telescope height offset and angle A = elevation + 90 deg:
    ///
    /// ```text
    /// B = asin(b/a * sin(A))
    /// C = 180 - A - B
    /// distance = a * sin(C) / sin(A)
    /// ```
    ///
    /// The equations degenerate at the zenith, so elevation is clamped to
    /// 89.999 deg.
    pub fn distance_to_dome(&self, elevation: f64) -> f64 {
        let elevation = elevation.min(89.999);
        let side_a = self.dome_inner_radius;
        let side_b = self.telescope_height_offset;
        let angle_a = (elevation + 90.0).to_radians();
        let angle_b = (side_b / side_a * angle_a.sin()).asin();
        let angle_c = std::f64::consts::PI - angle_a - angle_b;
        side_a * angle_c.sin() / angle_a.sin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_angle_diff_wraps() {
        assert_relative_eq!(angle_diff(10.0, 350.0), 20.0, epsilon = 1e-12);
        assert_relative_eq!(angle_diff(350.0, 10.0), -20.0, epsilon = 1e-12);
        assert_relative_eq!(angle_diff(20.0, 10.0), 10.0, epsilon = 1e-12);
        assert_relative_eq!(angle_diff(0.0, 0.0), 0.0, epsilon = 1e-12);
        // Half-open interval: +180 wraps to -180.
        assert_relative_eq!(angle_diff(180.0, 0.0), -180.0, epsilon = 1e-12);
        assert_relative_eq!(angle_diff(-179.0, 180.0), 1.0, epsilon = 1e-12);
        assert_relative_eq!(angle_diff(720.0 + 5.0, 3.0), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_geometry_validation() {
        assert!(DomeGeometry::new(5000.0, 1000.0).is_ok());
        assert!(DomeGeometry::new(0.0, 0.0).is_err());
        assert!(DomeGeometry::new(-5000.0, 1000.0).is_err());
        assert!(DomeGeometry::new(5000.0, -1.0).is_err());
        assert!(DomeGeometry::new(1000.0, 1000.0).is_err());
        assert!(DomeGeometry::new(1000.0, 2000.0).is_err());
    }

    #[test]
    fn test_distance_at_horizon() {
        let geometry = DomeGeometry::new(5000.0, 1000.0).unwrap();
        // At elevation 0: A = 90 deg, B = asin(b/a), C = 90 - B, so
        // distance = a * cos(B) = sqrt(a^2 - b^2).
        let expected = (5000.0f64.powi(2) - 1000.0f64.powi(2)).sqrt();
        assert_relative_eq!(geometry.distance_to_dome(0.0), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_distance_shrinks_toward_zenith() {
        // With the vertex above center, the slit is closest near the zenith.
        let geometry = DomeGeometry::new(5000.0, 1000.0).unwrap();
        let d0 = geometry.distance_to_dome(0.0);
        let d45 = geometry.distance_to_dome(45.0);
        let d89 = geometry.distance_to_dome(89.0);
        assert!(d45 < d0);
        assert!(d89 < d45);
        // Approaches radius - offset at the zenith.
        assert_relative_eq!(geometry.distance_to_dome(90.0), 4000.0, epsilon = 1.0);
    }

    #[test]
    fn test_distance_zenith_clamp() {
        let geometry = DomeGeometry::new(5000.0, 1000.0).unwrap();
        // Elevations at and beyond the zenith clamp to 89.999 deg.
        let clamped = geometry.distance_to_dome(89.999);
        assert_relative_eq!(geometry.distance_to_dome(90.0), clamped, epsilon = 1e-12);
        assert_relative_eq!(geometry.distance_to_dome(95.0), clamped, epsilon = 1e-12);
        assert!(clamped.is_finite());
    }

    #[test]
    fn test_zero_offset_is_constant_radius() {
        // With the vertex at the dome center the distance is the radius
        // at every elevation.
        let geometry = DomeGeometry::new(5000.0, 0.0).unwrap();
        for elevation in [0.0, 15.0, 45.0, 80.0, 89.9] {
            assert_relative_eq!(
                geometry.distance_to_dome(elevation),
                5000.0,
                epsilon = 1e-9
            );
        }
    }
}
