// src/location/nmea.rs
//! NMEA 0183 position parsing

use crate::walk::Coordinate;

/// Parse one NMEA sentence, returning the position it carries, if any.
///
/// Only GGA and RMC sentences carry positions; everything else is ignored.
pub fn parse_sentence(line: &str) -> Option<Coordinate> {
    let parts: Vec<&str> = line.split(',').collect();

    if line.starts_with("$GPGGA") || line.starts_with("$GNGGA") {
        parse_gga(&parts)
    } else if line.starts_with("$GPRMC") || line.starts_with("$GNRMC") {
        parse_rmc(&parts)
    } else {
        None
    }
}

/// GGA: fix data. Field 6 is fix quality, 0 meaning no fix.
fn parse_gga(parts: &[&str]) -> Option<Coordinate> {
    if parts.len() < 15 {
        return None;
    }

    let quality: u8 = parts[6].parse().ok()?;
    if quality == 0 {
        return None;
    }

    let latitude = parse_coordinate(parts[2], parts[3], "S")?;
    let longitude = parse_coordinate(parts[4], parts[5], "W")?;
    Some(Coordinate {
        latitude,
        longitude,
    })
}

/// RMC: recommended minimum. Field 2 is the status flag, "A" meaning valid.
fn parse_rmc(parts: &[&str]) -> Option<Coordinate> {
    if parts.len() < 10 {
        return None;
    }

    if parts[2] != "A" {
        return None;
    }

    let latitude = parse_coordinate(parts[3], parts[4], "S")?;
    let longitude = parse_coordinate(parts[5], parts[6], "W")?;
    Some(Coordinate {
        latitude,
        longitude,
    })
}

/// Convert (d)ddmm.mmmm plus a hemisphere letter to signed decimal degrees.
fn parse_coordinate(value: &str, hemisphere: &str, negative: &str) -> Option<f64> {
    if value.is_empty() || hemisphere.is_empty() {
        return None;
    }

    let raw: f64 = value.parse().ok()?;
    let degrees = (raw / 100.0).trunc();
    let minutes = raw % 100.0;

    let mut decimal = degrees + minutes / 60.0;
    if hemisphere == negative {
        decimal = -decimal;
    }
    Some(decimal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gga_parsing() {
        let gga = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";

        let coordinate = parse_sentence(gga).unwrap();
        assert!((coordinate.latitude - 48.1173).abs() < 0.0001);
        assert!((coordinate.longitude - 11.5166).abs() < 0.0001);
    }

    #[test]
    fn test_gga_without_fix() {
        let gga = "$GPGGA,123519,4807.038,N,01131.000,E,0,00,,,M,,M,,*47";
        assert_eq!(parse_sentence(gga), None);
    }

    #[test]
    fn test_rmc_parsing() {
        let rmc = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A";

        let coordinate = parse_sentence(rmc).unwrap();
        assert!((coordinate.latitude - 48.1173).abs() < 0.0001);
        assert!((coordinate.longitude - 11.5166).abs() < 0.0001);
    }

    #[test]
    fn test_rmc_void_status() {
        let rmc = "$GPRMC,123519,V,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A";
        assert_eq!(parse_sentence(rmc), None);
    }

    #[test]
    fn test_southern_and_western_hemispheres() {
        let gga = "$GPGGA,123519,3352.000,S,15112.000,W,1,08,0.9,10.0,M,46.9,M,,*47";

        let coordinate = parse_sentence(gga).unwrap();
        assert!(coordinate.latitude < 0.0);
        assert!(coordinate.longitude < 0.0);
    }

    #[test]
    fn test_unrelated_sentence() {
        let gsv = "$GPGSV,3,1,12,01,40,083,46,02,17,308,41*75";
        assert_eq!(parse_sentence(gsv), None);
    }
}
