use super::base91;
use super::types::{AprsData, Message, Telemetry};

pub(crate) const KNOTS_TO_MPH: f64 = 1.150_779;

/// Extracts whatever position, message and telemetry content the
/// information field carries. Unrecognized payloads yield an empty
/// `AprsData`.
pub fn parse(body: &str) -> AprsData {
    let mut data = AprsData::default();
    let mut chars = body.chars();
    let Some(dti) = chars.next() else {
        return data;
    };
    let rest = chars.as_str();

    match dti {
        '!' | '=' => parse_position(rest, &mut data),
        // position with timestamp (DDHHMMz, DDHHMM/ or HHMMSSh)
        '/' | '@' => {
            if let Some(rest) = rest.get(7..) {
                parse_position(rest, &mut data);
            }
        }
        ':' => data.message = parse_message(rest),
        'T' => {
            if let Some(rest) = rest.strip_prefix('#') {
                data.telemetry = parse_standard_telemetry(rest);
            }
        }
        _ => {}
    }

    data
}

fn parse_position(s: &str, data: &mut AprsData) {
    let first = s.chars().next();
    let comment = if first.is_some_and(|c| c.is_ascii_digit() || c == ' ') {
        parse_uncompressed(s, data)
    } else {
        parse_compressed(s, data)
    };
    let Some(comment) = comment else {
        return;
    };

    let (comment, telemetry) = extract_compressed_telemetry(comment);
    if telemetry.is_some() {
        data.telemetry = telemetry;
    }
    if let Some(altitude) = find_altitude(&comment) {
        data.position.altitude = altitude;
    }
    data.comment = comment.trim().to_string();
}

/// `DDMM.mmN/DDDMM.mmW$` followed by an optional `CSE/SPD` extension.
/// Returns the remaining comment on success.
fn parse_uncompressed<'a>(s: &'a str, data: &mut AprsData) -> Option<&'a str> {
    let lat = parse_degrees(s.get(0..8)?, 2, 'N', 'S')?;
    let table = s.get(8..9)?;
    let lon = parse_degrees(s.get(9..18)?, 3, 'E', 'W')?;
    let code = s.get(18..19)?;
    let mut rest = s.get(19..).unwrap_or("");

    data.position.lat = lat;
    data.position.lon = lon;
    data.symbol = Some(format!("{}{}", table, code));

    if let Some((course, speed)) = rest.get(0..7).and_then(parse_course_speed) {
        data.position.heading = course;
        data.position.speed = speed * KNOTS_TO_MPH;
        rest = &rest[7..];
    }
    Some(rest)
}

fn parse_degrees(field: &str, deg_digits: usize, positive: char, negative: char) -> Option<f64> {
    // position ambiguity replaces trailing digits with spaces
    let field = field.replace(' ', "0");
    let hemisphere = field.chars().last()?;
    let degrees: f64 = field.get(0..deg_digits)?.parse().ok()?;
    let minutes: f64 = field.get(deg_digits..field.len() - 1)?.parse().ok()?;
    let value = degrees + minutes / 60.0;
    match hemisphere.to_ascii_uppercase() {
        h if h == positive => Some(value),
        h if h == negative => Some(-value),
        _ => None,
    }
}

fn parse_course_speed(ext: &str) -> Option<(u16, f64)> {
    let (course, speed) = ext.split_once('/')?;
    if course.len() != 3 || speed.len() != 3 {
        return None;
    }
    let course: u16 = course.parse().ok()?;
    let speed: f64 = speed.parse().ok()?;
    Some((course % 360, speed))
}

/// `/YYYYXXXX$csT`: symbol table, base-91 lat/lon, symbol code, then
/// course/speed or altitude and the compression type byte.
fn parse_compressed<'a>(s: &'a str, data: &mut AprsData) -> Option<&'a str> {
    let table = s.get(0..1)?;
    let y = base91::decode(s.get(1..5)?)?;
    let x = base91::decode(s.get(5..9)?)?;
    let code = s.get(9..10)?;
    let cs = s.get(10..12)?.as_bytes();
    let compression = s.get(12..13)?.as_bytes()[0];

    data.position.lat = 90.0 - y as f64 / 380_926.0;
    data.position.lon = -180.0 + x as f64 / 190_463.0;
    data.symbol = Some(format!("{}{}", table, code));

    let (c, sp) = (cs[0], cs[1]);
    if c != b' ' && c >= 33 && sp >= 33 {
        let c = (c - 33) as u32;
        let sp = (sp - 33) as u32;
        let gga = compression >= 33 && ((compression - 33) >> 3) & 0x03 == 0b10;
        if gga {
            data.position.altitude = 1.002_f64.powi((c * 91 + sp) as i32);
        } else if c <= 89 {
            data.position.heading = (c * 4) as u16 % 360;
            data.position.speed = (1.08_f64.powi(sp as i32) - 1.0) * KNOTS_TO_MPH;
        }
    }

    Some(s.get(13..).unwrap_or(""))
}

fn find_altitude(comment: &str) -> Option<f64> {
    let idx = comment.find("/A=")?;
    comment.get(idx + 3..idx + 9)?.parse().ok()
}

/// Pulls a `|ss1122...|` base-91 telemetry block out of a comment.
fn extract_compressed_telemetry(comment: &str) -> (String, Option<Telemetry>) {
    let parsed = comment.find('|').and_then(|start| {
        let len = comment[start + 1..].find('|')?;
        let block = &comment[start + 1..start + 1 + len];
        if !(4..=14).contains(&block.len()) || block.len() % 2 != 0 {
            return None;
        }
        let mut pairs = (0..block.len() / 2)
            .map(|i| block.get(i * 2..i * 2 + 2).and_then(base91::decode));
        let sequence = pairs.next()??;
        let values = pairs.collect::<Option<Vec<u32>>>()?;
        let analog = values.iter().take(5).map(|v| *v as f64).collect();
        let digital = values.get(5).map(|v| *v as u8);
        let stripped = format!("{}{}", &comment[..start], &comment[start + len + 2..]);
        Some((
            stripped,
            Telemetry {
                sequence,
                analog,
                digital,
            },
        ))
    });

    match parsed {
        Some((stripped, telemetry)) => (stripped, Some(telemetry)),
        None => (comment.to_string(), None),
    }
}

/// `T#005,199,000,255,073,123,01101001`
fn parse_standard_telemetry(s: &str) -> Option<Telemetry> {
    let mut fields = s.split(',');
    let sequence = fields.next()?.trim().parse().unwrap_or(0);
    let fields: Vec<&str> = fields.collect();
    let analog = fields
        .iter()
        .take(5)
        .map(|f| f.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .ok()?;
    let digital = fields
        .get(5)
        .map(|bits| bits.trim())
        .filter(|bits| bits.len() == 8)
        .and_then(|bits| u8::from_str_radix(bits, 2).ok());
    Some(Telemetry {
        sequence,
        analog,
        digital,
    })
}

/// `:ADDRESSEE:text{id` with a 9-character space-padded addressee.
fn parse_message(s: &str) -> Option<Message> {
    let recipient = s.get(0..9)?.trim();
    let body = s.get(9..)?.strip_prefix(':')?;
    if recipient.is_empty() {
        return None;
    }
    let (text, id) = match body.rfind('{') {
        Some(idx) => (&body[..idx], Some(body[idx + 1..].trim().to_string())),
        None => (body, None),
    };
    Some(Message {
        recipient: recipient.to_string(),
        text: text.to_string(),
        id: id.filter(|id| !id.is_empty()),
    })
}
