//! Conversion of raw codes into physical units.
//!
//! Floating-point variants of the Bosch compensation formulas. `t_fine` is truncated
//! toward zero before it is fed to the humidity formula; readings must match the
//! reference implementation bit for bit, so keep it that way.
//!
//! The `try_*` functions report a non-finite result. The plain functions replace it
//! with a nominal value: 25 °C, 50 %RH, or the unadjusted temperature for the heat index.

use crate::calibration::{HumidityCoefficients, TemperatureCoefficients};
use crate::error::NonFinite;

pub const NOMINAL_TEMPERATURE_C: f64 = 25.0;
pub const NOMINAL_HUMIDITY_PCT: f64 = 50.0;

/// Below this temperature the heat index equals the air temperature.
pub const HEAT_INDEX_THRESHOLD_C: f64 = 26.0;

/// Compensated temperature plus the fine value the humidity formula needs.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Temperature {
    pub celsius: f64,
    pub t_fine: i32,
}

pub fn try_compensate_temperature(
    raw_temp: u32,
    calib: &TemperatureCoefficients,
) -> Result<Temperature, NonFinite> {
    let raw = f64::from(raw_temp);
    let t1 = f64::from(calib.t1);

    let var1 = (raw / 16384.0 - t1 / 1024.0) * f64::from(calib.t2);
    let delta = raw / 131072.0 - t1 / 8192.0;
    let var2 = delta * delta * f64::from(calib.t3);

    let sum = var1 + var2;
    if !sum.is_finite() {
        return Err(NonFinite);
    }
    // `as` truncates toward zero
    let t_fine = sum as i32;
    Ok(Temperature {
        celsius: f64::from(t_fine) / 5120.0,
        t_fine,
    })
}

pub fn compensate_temperature(raw_temp: u32, calib: &TemperatureCoefficients) -> Temperature {
    try_compensate_temperature(raw_temp, calib).unwrap_or_else(|_| {
        warn!("Temperature compensation failed for raw {}", raw_temp);
        Temperature {
            celsius: NOMINAL_TEMPERATURE_C,
            t_fine: 0,
        }
    })
}

/// Relative humidity in percent, clamped to `0.0..=100.0`.
pub fn try_compensate_humidity(
    raw_hum: u32,
    calib: &HumidityCoefficients,
    t_fine: i32,
) -> Result<f64, NonFinite> {
    let var_h = f64::from(t_fine) - 76800.0;
    if var_h == 0.0 {
        return Ok(0.0);
    }

    let h1 = f64::from(calib.h1);
    let h2 = f64::from(calib.h2);
    let h3 = f64::from(calib.h3);
    let h4 = f64::from(calib.h4);
    let h5 = f64::from(calib.h5);
    let h6 = f64::from(calib.h6);

    let offset = f64::from(raw_hum) - (h4 * 64.0 + h5 / 16384.0 * var_h);
    let gain = h2 / 65536.0 * (1.0 + h6 / 67108864.0 * var_h * (1.0 + h3 / 67108864.0 * var_h));
    let var_h = offset * gain;
    let humidity = var_h * (1.0 - h1 * var_h / 524288.0);

    if !humidity.is_finite() {
        return Err(NonFinite);
    }
    Ok(humidity.clamp(0.0, 100.0))
}

pub fn compensate_humidity(raw_hum: u32, calib: &HumidityCoefficients, t_fine: i32) -> f64 {
    try_compensate_humidity(raw_hum, calib, t_fine).unwrap_or_else(|_| {
        warn!("Humidity compensation failed for raw {}", raw_hum);
        NOMINAL_HUMIDITY_PCT
    })
}

/// Nine-term heat index polynomial in °C and %RH.
///
/// The coefficients are fixed by the cloud dashboard this node reports to.
pub fn try_heat_index(temperature_c: f64, humidity_pct: f64) -> Result<f64, NonFinite> {
    if temperature_c < HEAT_INDEX_THRESHOLD_C {
        return Ok(temperature_c);
    }

    let t = temperature_c;
    let r = humidity_pct;
    let hi = 0.363445176 + 0.988622465 * t + 0.008184780 * r + 0.000144105 * t * r
        - 0.000054777 * t * t
        - 0.00121227 * r * r
        + 0.000038646 * t * t * r
        + 0.000029039 * t * r * r
        - 0.00000187 * t * t * r * r;

    if hi.is_finite() {
        Ok(hi)
    } else {
        Err(NonFinite)
    }
}

pub fn heat_index(temperature_c: f64, humidity_pct: f64) -> f64 {
    try_heat_index(temperature_c, humidity_pct).unwrap_or_else(|_| {
        warn!("Heat index failed for {} C / {} %", temperature_c, humidity_pct);
        temperature_c
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationCoefficients;

    const T: TemperatureCoefficients = CalibrationCoefficients::NOMINAL.temperature;
    const H: HumidityCoefficients = CalibrationCoefficients::NOMINAL.humidity;

    #[test]
    fn datasheet_temperature() {
        let t = compensate_temperature(519_888, &T);
        assert_eq!(t.t_fine, 128_422);
        assert_eq!(t.celsius, 128_422.0 / 5120.0);
        assert!((t.celsius - 25.082421875).abs() < 1e-12);
    }

    #[test]
    fn t_fine_truncates_toward_zero() {
        // var1 + var2 is -721299.x here; flooring would give -721300
        let t = compensate_temperature(0, &T);
        assert_eq!(t.t_fine, -721_299);
    }

    #[test]
    fn humidity_matches_reference() {
        let h = compensate_humidity(30_000, &H, 128_422);
        assert!((h - 59.2981548414799).abs() < 1e-9);
    }

    #[test]
    fn humidity_degenerate_branch() {
        assert_eq!(compensate_humidity(30_000, &H, 76_800), 0.0);
    }

    #[test]
    fn humidity_is_clamped_for_every_extreme() {
        let extremes = [0u32, 1, 0x7FFF, 0x8000, 0xFFFE, 0xFFFF, 0x10_0000, u32::MAX];
        let t_fines = [i32::MIN, -721_299, -1, 0, 76_799, 76_801, 128_422, 960_255, i32::MAX];
        let coefficient_sets = [
            H,
            HumidityCoefficients {
                h1: 255,
                h2: i16::MAX,
                h3: 255,
                h4: i16::MIN,
                h5: i16::MAX,
                h6: i8::MIN,
            },
            HumidityCoefficients {
                h1: 0,
                h2: i16::MIN,
                h3: 0,
                h4: i16::MAX,
                h5: i16::MIN,
                h6: i8::MAX,
            },
        ];

        for calib in &coefficient_sets {
            for &raw in &extremes {
                for &t_fine in &t_fines {
                    let h = compensate_humidity(raw, calib, t_fine);
                    assert!((0.0..=100.0).contains(&h), "raw={raw} t_fine={t_fine} -> {h}");
                }
            }
        }
    }

    #[test]
    fn heat_index_passes_through_below_threshold() {
        assert_eq!(heat_index(25.9, 80.0), 25.9);
        assert_eq!(heat_index(-10.0, 100.0), -10.0);
    }

    #[test]
    fn heat_index_polynomial() {
        let (t, r): (f64, f64) = (30.0, 70.0);
        let reference = 0.363445176
            + 0.988622465 * t
            + 0.008184780 * r
            + 0.000144105 * t * r
            - 0.000054777 * t.powi(2)
            - 0.00121227 * r.powi(2)
            + 0.000038646 * t.powi(2) * r
            + 0.000029039 * t * r.powi(2)
            - 0.00000187 * t.powi(2) * r.powi(2);

        assert!((heat_index(t, r) - reference).abs() < 1e-9);
        assert!((heat_index(t, r) - 23.364982925999996).abs() < 1e-9);
    }

    #[test]
    fn non_finite_inputs_fail_closed() {
        assert_eq!(try_heat_index(f64::INFINITY, 50.0), Err(NonFinite));
        assert_eq!(heat_index(f64::INFINITY, 50.0), f64::INFINITY);
        assert_eq!(heat_index(30.0, f64::NAN).to_bits(), 30.0f64.to_bits());
    }
}
