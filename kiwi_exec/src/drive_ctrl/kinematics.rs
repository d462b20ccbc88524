//! Kiwi drive kinematics and power shaping

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use nalgebra::{Matrix2, Matrix3, Matrix3x2, Vector3};

// Internal
use super::{DriveCtrlError, DriveCtrlParams};
use comms_if::eqpt::mech::{DriveCommand, WheelPowers, NUM_WHEELS};
use util::maths::zero_small;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Raw wheel powers smaller than this are numerical noise and treated as zero.
const RAW_POWER_EPS: f64 = 1e-6;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Kinematics of the three-wheeled holonomic chassis.
///
/// The body to wheel transform is computed once at construction. All methods are pure.
#[derive(Debug, Clone)]
pub struct DriveKinematics {
    /// Maps `(vx, vy, v_ang)` onto the three raw wheel powers
    transform: Matrix3<f64>,

    /// Inverse of `transform`, `None` if the geometry is singular
    inverse: Option<Matrix3<f64>>,

    floor: f64,
    ceiling: f64,

    /// Either `1` or `-1` depending on the motor wiring
    wiring_sign: i32,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DriveKinematics {
    /// Build the kinematics from the drive parameters.
    pub fn new(params: &DriveCtrlParams) -> Result<Self, DriveCtrlError> {
        if params.power_floor < 0 || params.power_floor >= params.power_ceiling {
            return Err(DriveCtrlError::InvalidPowerBand {
                floor: params.power_floor,
                ceiling: params.power_ceiling,
            });
        }
        if params.k_rot == 0.0 || !params.k_rot.is_finite() {
            return Err(DriveCtrlError::InvalidRotConstant(params.k_rot));
        }

        let transform = Self::build_transform(params.mounting_offset_deg, params.k_rot);

        Ok(Self {
            transform,
            inverse: transform.try_inverse(),
            floor: params.power_floor as f64,
            ceiling: params.power_ceiling as f64,
            wiring_sign: if params.invert_output { -1 } else { 1 },
        })
    }

    /// Build `[T * R(offset) | k_rot]` where `T` holds the directions of the 120 degree spaced
    /// wheels.
    fn build_transform(mounting_offset_deg: f64, k_rot: f64) -> Matrix3<f64> {
        let half_sqrt3 = 3f64.sqrt() / 2.0;

        let dirs = Matrix3x2::new(
            -1.0, 0.0,
            0.5, -half_sqrt3,
            0.5, half_sqrt3,
        );

        let (s, c) = mounting_offset_deg.to_radians().sin_cos();
        let rot = Matrix2::new(
            c, -s,
            s, c,
        );

        let t = dirs * rot;

        Matrix3::new(
            t[(0, 0)], t[(0, 1)], k_rot,
            t[(1, 0)], t[(1, 1)], k_rot,
            t[(2, 0)], t[(2, 1)], k_rot,
        )
    }

    /// The cached body to wheel transform.
    pub fn transform(&self) -> &Matrix3<f64> {
        &self.transform
    }

    /// Compute the unshaped wheel powers for a command.
    pub fn raw_powers(&self, cmd: &DriveCommand) -> [f64; NUM_WHEELS] {
        let raw = self.transform * Vector3::new(cmd.vx, cmd.vy, cmd.v_ang);

        [
            zero_small(raw[0], RAW_POWER_EPS),
            zero_small(raw[1], RAW_POWER_EPS),
            zero_small(raw[2], RAW_POWER_EPS),
        ]
    }

    /// Shape raw powers into the motors' effective band.
    ///
    /// Zero stays zero. Every non-zero output has a magnitude in `[floor, ceiling]` and the sign
    /// of its raw value. The wiring sign is not applied here.
    pub fn shape(&self, raw: [f64; NUM_WHEELS]) -> [i32; NUM_WHEELS] {
        let max_abs = raw.iter().fold(0f64, |m, v| m.max(v.abs()));
        let min_abs = raw
            .iter()
            .filter(|v| **v != 0.0)
            .fold(f64::INFINITY, |m, v| m.min(v.abs()));

        if max_abs == 0.0 {
            return [0; NUM_WHEELS];
        }

        let shaped = if max_abs > self.ceiling {
            // Rescale so the largest lands on the working ceiling, then lift off the floor
            let scale = (self.ceiling - self.floor) / max_abs;
            trace!("Rescaling raw powers {:?} by {:.4}", raw, scale);
            [
                self.boost(raw[0] * scale),
                self.boost(raw[1] * scale),
                self.boost(raw[2] * scale),
            ]
        }
        else if min_abs < self.floor {
            [self.boost(raw[0]), self.boost(raw[1]), self.boost(raw[2])]
        }
        else {
            raw
        };

        [
            shaped[0].trunc() as i32,
            shaped[1].trunc() as i32,
            shaped[2].trunc() as i32,
        ]
    }

    /// Add the floor to a non-zero power keeping its sign, limited to the ceiling.
    fn boost(&self, value: f64) -> f64 {
        if value == 0.0 {
            0.0
        }
        else {
            (value.abs() + self.floor).min(self.ceiling) * value.signum()
        }
    }

    /// Compute the wheel powers to transmit for a command.
    pub fn wheel_powers(&self, cmd: &DriveCommand) -> WheelPowers {
        let shaped = self.shape(self.raw_powers(cmd));

        WheelPowers::new([
            shaped[0] * self.wiring_sign,
            shaped[1] * self.wiring_sign,
            shaped[2] * self.wiring_sign,
        ])
    }

    /// The sign applied to shaped powers for transmission.
    pub fn wiring_sign(&self) -> i32 {
        self.wiring_sign
    }

    /// Recover the body velocity which produces the given raw wheel powers.
    ///
    /// Returns `None` if the geometry has no inverse.
    pub fn body_velocity(&self, raw: [f64; NUM_WHEELS]) -> Option<DriveCommand> {
        self.inverse.map(|inv| {
            let v = inv * Vector3::new(raw[0], raw[1], raw[2]);
            DriveCommand::new(v[0], v[1], v[2])
        })
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn kin() -> DriveKinematics {
        DriveKinematics::new(&DriveCtrlParams::default()).unwrap()
    }

    #[test]
    fn test_zero_input() {
        let k = kin();
        assert_eq!(k.raw_powers(&DriveCommand::zero()), [0.0; 3]);
        assert_eq!(k.wheel_powers(&DriveCommand::zero()), WheelPowers::zero());
    }

    #[test]
    fn test_transform_without_offset() {
        let params = DriveCtrlParams {
            mounting_offset_deg: 0.0,
            ..Default::default()
        };
        let k = DriveKinematics::new(&params).unwrap();
        let t = k.transform();

        assert!((t[(0, 0)] + 1.0).abs() < 1e-12);
        assert!(t[(0, 1)].abs() < 1e-12);
        assert!((t[(1, 1)] + 3f64.sqrt() / 2.0).abs() < 1e-12);
        assert!((t[(2, 1)] - 3f64.sqrt() / 2.0).abs() < 1e-12);
        for i in 0..3 {
            assert_eq!(t[(i, 2)], 2.0);
        }
    }

    #[test]
    fn test_pure_rotation() {
        let k = kin();

        // Every wheel gets k_rot * 1 = 2, lifted to 27 and inverted by the wiring
        let powers = k.wheel_powers(&DriveCommand::rotate(1.0));
        assert_eq!(powers.powers(), [-27, -27, -27]);

        let powers = k.wheel_powers(&DriveCommand::rotate(-1.0));
        assert_eq!(powers.powers(), [27, 27, 27]);
    }

    #[test]
    fn test_shaping_band_and_sign() {
        let k = kin();
        let floor = 25;
        let ceiling = 100;

        let speeds = [-500.0, -80.0, -15.0, -1.0, 0.0, 0.5, 3.0, 40.0, 120.0, 900.0];

        for &vx in speeds.iter() {
            for &vy in speeds.iter() {
                for &w in [-30.0, -1.0, 0.0, 1.0, 30.0].iter() {
                    let cmd = DriveCommand::new(vx, vy, w);
                    let raw = k.raw_powers(&cmd);
                    let powers = k.wheel_powers(&cmd).powers();

                    for i in 0..3 {
                        if raw[i] == 0.0 {
                            assert_eq!(powers[i], 0, "{:?} wheel {}", cmd, i);
                        }
                        else {
                            let mag = powers[i].abs();
                            assert!(
                                mag >= floor && mag <= ceiling,
                                "{:?} wheel {} power {} out of band", cmd, i, powers[i]
                            );
                            assert_eq!(
                                powers[i].signum(),
                                raw[i].signum() as i32 * k.wiring_sign(),
                                "{:?} wheel {} sign", cmd, i
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_shaping_preserves_ordering() {
        let k = kin();

        let shaped = k.shape([10.0, -300.0, 150.0]);
        assert_eq!(shaped[1], -100);
        assert!(shaped[2] > shaped[0]);
        assert!(shaped[0] >= 25);

        // Already inside the band, untouched
        assert_eq!(k.shape([30.0, -60.0, 90.0]), [30, -60, 90]);

        // Below the floor but inside the ceiling, lifted without rescaling
        assert_eq!(k.shape([5.0, 0.0, -50.0]), [30, 0, -75]);
    }

    #[test]
    fn test_body_velocity_round_trip() {
        let k = kin();
        let cmd = DriveCommand::new(12.0, -30.0, 4.0);

        let back = k.body_velocity(k.raw_powers(&cmd)).unwrap();

        assert!((back.vx - cmd.vx).abs() < 1e-9);
        assert!((back.vy - cmd.vy).abs() < 1e-9);
        assert!((back.v_ang - cmd.v_ang).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_params() {
        let params = DriveCtrlParams {
            power_floor: 100,
            ..Default::default()
        };
        assert!(matches!(
            DriveKinematics::new(&params),
            Err(DriveCtrlError::InvalidPowerBand { .. })
        ));

        let params = DriveCtrlParams {
            k_rot: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            DriveKinematics::new(&params),
            Err(DriveCtrlError::InvalidRotConstant(_))
        ));
    }
}
