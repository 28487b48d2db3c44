//! Vignetting verdicts for the telescope view through the dome slit.
//!
//! Pure functions over the latest-known telemetry: an azimuth-mismatch
//! verdict, a shutter-door verdict and their combination. Missing inputs
//! always map to `Unknown`, never to a stale determinate value.

use crate::config::Config;
use crate::error::ConfigError;
use crate::events::ShutterDoorState;
use crate::geometry::{angle_diff, DomeGeometry};

/// How badly the telescope view is obstructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Vignetted {
    /// Cannot be determined from the available inputs.
    Unknown,
    No,
    Partially,
    Fully,
}

impl Vignetted {
    /// Combine the azimuth and shutter verdicts into the overall verdict.
    ///
    /// Unknown on either side makes the combination Unknown; a determinate
    /// verdict is never fabricated from partial knowledge.
    pub fn combine(azimuth: Vignetted, shutter: Vignetted) -> Vignetted {
        if azimuth == Vignetted::Unknown || shutter == Vignetted::Unknown {
            Vignetted::Unknown
        } else if azimuth == Vignetted::No && shutter == Vignetted::No {
            Vignetted::No
        } else if azimuth == Vignetted::Fully || shutter == Vignetted::Fully {
            Vignetted::Fully
        } else {
            Vignetted::Partially
        }
    }
}

/// Vignetting thresholds plus the dome geometry, built once from
/// configuration.
#[derive(Debug, Clone, Copy)]
pub struct VignettingModel {
    azimuth_vignette_partial: f64,
    azimuth_vignette_full: f64,
    dropout_door_vignette_partial: f64,
    dropout_door_vignette_full: f64,
    geometry: DomeGeometry,
    /// `geometry.distance_to_dome(0)`, cached at construction.
    distance_to_dome_at_horizon: f64,
}

impl VignettingModel {
    /// Build the model from a validated configuration.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let geometry = DomeGeometry::new(config.dome_inner_radius, config.telescope_height_offset)?;
        Ok(Self {
            azimuth_vignette_partial: config.azimuth_vignette_partial,
            azimuth_vignette_full: config.azimuth_vignette_full,
            dropout_door_vignette_partial: config.dropout_door_vignette_partial,
            dropout_door_vignette_full: config.dropout_door_vignette_full,
            geometry,
            distance_to_dome_at_horizon: geometry.distance_to_dome(0.0),
        })
    }

    /// Verdict from the azimuth mismatch between dome and telescope.
    ///
    /// The absolute wrapped azimuth difference is scaled by cos(elevation)
    /// to approximate sky-plane displacement, then by the ratio of the
    /// horizon slit distance to the slit distance at the current elevation
    /// (the slit is closer to the vertex at high elevation, so the same
    /// angular error obstructs more).
    pub fn vignetted_by_azimuth(
        &self,
        dome_azimuth: Option<f64>,
        telescope_azimuth: Option<f64>,
        telescope_elevation: Option<f64>,
    ) -> Vignetted {
        let (Some(dome_azimuth), Some(telescope_azimuth), Some(telescope_elevation)) =
            (dome_azimuth, telescope_azimuth, telescope_elevation)
        else {
            return Vignetted::Unknown;
        };

        let abs_azimuth_difference = angle_diff(dome_azimuth, telescope_azimuth).abs();
        let distance_to_dome = self.geometry.distance_to_dome(telescope_elevation);
        let scaled_abs_azimuth_difference = abs_azimuth_difference
            * telescope_elevation.to_radians().cos()
            * self.distance_to_dome_at_horizon
            / distance_to_dome;
        if scaled_abs_azimuth_difference < self.azimuth_vignette_partial {
            Vignetted::No
        } else if scaled_abs_azimuth_difference < self.azimuth_vignette_full {
            Vignetted::Partially
        } else {
            Vignetted::Fully
        }
    }

    /// Verdict from the shutter doors.
    ///
    /// Both doors opened is clear; both closed is fully vignetted. Dropout
    /// closed with main opened depends on elevation: the dropout panel only
    /// blocks the low part of the slit. Any door in motion, or main closed
    /// with dropout opened, cannot be decided from door states alone.
    pub fn vignetted_by_shutter(
        &self,
        dropout_door_state: Option<ShutterDoorState>,
        main_door_state: Option<ShutterDoorState>,
        telescope_elevation: Option<f64>,
    ) -> Vignetted {
        use ShutterDoorState::{Closed, Opened};

        let (Some(dropout), Some(main)) = (dropout_door_state, main_door_state) else {
            return Vignetted::Unknown;
        };
        match (dropout, main) {
            (Opened, Opened) => Vignetted::No,
            (Closed, Closed) => Vignetted::Fully,
            (Closed, Opened) => {
                let Some(elevation) = telescope_elevation else {
                    return Vignetted::Unknown;
                };
                if elevation > self.dropout_door_vignette_partial {
                    Vignetted::No
                } else if elevation > self.dropout_door_vignette_full {
                    Vignetted::Partially
                } else {
                    Vignetted::Fully
                }
            }
            _ => Vignetted::Unknown,
        }
    }
}
