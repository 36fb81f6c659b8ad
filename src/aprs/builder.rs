use thiserror::Error;

use super::base91;
use super::parser::KNOTS_TO_MPH;
use super::types::Point;

pub const MAX_MESSAGE_LEN: usize = 67;
const FORBIDDEN_MESSAGE_CHARS: [char; 3] = ['|', '~', '{'];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AprsError {
    #[error("message is empty")]
    EmptyMessage,
    #[error("message is {0} characters, at most 67 allowed")]
    MessageTooLong(usize),
    #[error("message contains forbidden character {0:?}")]
    ForbiddenCharacter(char),
    #[error("addressee longer than 9 characters: {0}")]
    AddresseeTooLong(String),
}

/// Compressed position report: `!` + table + base-91 lat/lon + code +
/// altitude (or course/speed) + compression type.
pub fn compressed_position_report(point: &Point, symbol_table: char, symbol_code: char) -> String {
    let lat = point.lat.clamp(-90.0, 90.0);
    let lon = point.lon.clamp(-180.0, 180.0);
    let y = (380_926.0 * (90.0 - lat)) as u32;
    let x = (190_463.0 * (180.0 + lon)) as u32;

    format!(
        "!{}{}{}{}{}",
        symbol_table,
        base91::encode(y, 4),
        base91::encode(x, 4),
        symbol_code,
        compressed_extension(point)
    )
}

fn compressed_extension(point: &Point) -> String {
    if point.altitude >= 1.0 {
        let cs = (point.altitude.ln() / 1.002_f64.ln()).round() as u32;
        // current fix, GGA source, software origin
        let compression = 0b0011_0010;
        format!("{}{}", base91::encode(cs.min(91 * 91 - 1), 2), (compression + 33) as u8 as char)
    } else if point.speed > 0.0 {
        let course = ((point.heading % 360) / 4) as u32;
        let knots = point.speed / KNOTS_TO_MPH;
        let speed = ((knots + 1.0).ln() / 1.08_f64.ln()).round() as u32;
        // current fix, RMC source, software origin
        let compression = 0b0011_1010;
        format!(
            "{}{}{}",
            (course + 33) as u8 as char,
            (speed.min(90) + 33) as u8 as char,
            (compression + 33) as u8 as char
        )
    } else {
        "   ".to_string()
    }
}

/// Rejects text the APRS message format cannot carry.
pub fn validate_message_text(text: &str) -> Result<(), AprsError> {
    if text.is_empty() {
        return Err(AprsError::EmptyMessage);
    }
    let len = text.chars().count();
    if len > MAX_MESSAGE_LEN {
        return Err(AprsError::MessageTooLong(len));
    }
    if let Some(c) = text.chars().find(|c| FORBIDDEN_MESSAGE_CHARS.contains(c)) {
        return Err(AprsError::ForbiddenCharacter(c));
    }
    Ok(())
}

/// `:ADDRESSEE:text{id`
pub fn message(recipient: &str, text: &str, id: &str) -> Result<String, AprsError> {
    if recipient.len() > 9 {
        return Err(AprsError::AddresseeTooLong(recipient.to_string()));
    }
    validate_message_text(text)?;
    Ok(format!(":{:<9}:{}{{{}", recipient, text, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aprs::parse;

    #[test]
    fn compressed_report_known_encoding() {
        let point = Point {
            lat: 49.5,
            lon: -72.75,
            ..Default::default()
        };
        assert_eq!(compressed_position_report(&point, '/', 'O'), "!/5L!!<*e7O   ");
    }

    #[test]
    fn compressed_report_carries_altitude() {
        let point = Point {
            lat: 45.5,
            lon: -122.6,
            altitude: 10004.0,
            ..Default::default()
        };
        let report = compressed_position_report(&point, '/', 'O');
        assert!(report.ends_with("S]S"), "{}", report);

        let parsed = parse(&report);
        assert!((parsed.position.lat - 45.5).abs() < 1e-4);
        assert!((parsed.position.lon + 122.6).abs() < 1e-4);
        assert!((parsed.position.altitude - 10004.0).abs() < 10.0);
    }

    #[test]
    fn compressed_report_carries_course_and_speed() {
        let point = Point {
            lat: 45.5,
            lon: -122.6,
            speed: 40.0,
            heading: 90,
            ..Default::default()
        };
        let parsed = parse(&compressed_position_report(&point, '/', '>'));
        assert_eq!(parsed.position.heading, 88);
        assert!((parsed.position.speed - 40.0).abs() < 2.0);
    }

    #[test]
    fn message_format() {
        assert_eq!(
            message("KF7FVH-1", "Landed", "1").unwrap(),
            ":KF7FVH-1 :Landed{1"
        );
        let parsed = parse(&message("KF7FVH-1", "Landed", "1").unwrap());
        assert_eq!(parsed.message.unwrap().text, "Landed");
    }

    #[test]
    fn message_validation() {
        assert_eq!(message("KF7FVH-1", "", "1"), Err(AprsError::EmptyMessage));
        assert_eq!(
            message("KF7FVH-1", &"x".repeat(68), "1"),
            Err(AprsError::MessageTooLong(68))
        );
        assert_eq!(
            message("KF7FVH-1", "a|b", "1"),
            Err(AprsError::ForbiddenCharacter('|'))
        );
        assert!(message("KF7FVH-1", &"x".repeat(67), "1").is_ok());
    }
}
