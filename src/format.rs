//! Degree, minute and second strings for latitude and longitude.

use crate::CameraError;

/// Template used by [`format_gps`] when none is given, e.g. `70° 37'  4.980" S`.
pub const DEFAULT_GPS_FORMAT: &str = "%2d° %2d' %6.3f\" %s";

#[derive(Debug, Clone, Copy, PartialEq)]
enum Conversion {
    Integer,
    Float,
    Letter,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Placeholder {
    zero_pad: bool,
    width: usize,
    precision: Option<usize>,
    conversion: Conversion,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Placeholder(Placeholder),
}

fn invalid(format: &str, reason: &'static str) -> CameraError {
    CameraError::InvalidFormat {
        format: format.to_string(),
        reason,
    }
}

fn parse_placeholder(format: &str, modifiers: &str, conversion: char) -> Result<Placeholder, CameraError> {
    let conversion = match conversion {
        'd' => Conversion::Integer,
        'f' => Conversion::Float,
        's' => Conversion::Letter,
        _ => return Err(invalid(format, "unsupported conversion, use %d, %f or %s")),
    };
    let (width, precision) = match modifiers.split_once('.') {
        Some((width, precision)) => (width, Some(precision)),
        None => (modifiers, None),
    };
    let parse = |digits: &str| -> Result<usize, CameraError> {
        if digits.is_empty() {
            Ok(0)
        } else {
            digits
                .parse()
                .map_err(|_| invalid(format, "malformed width or precision"))
        }
    };
    Ok(Placeholder {
        zero_pad: width.starts_with('0'),
        width: parse(width)?,
        precision: precision.map(parse).transpose()?,
        conversion,
    })
}

fn parse(format: &str) -> Result<Vec<Segment>, CameraError> {
    let mut segments = vec![];
    let mut text = String::new();
    let mut chars = format.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            text.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            text.push('%');
            continue;
        }
        let mut modifiers = String::new();
        while let Some(&next) = chars.peek() {
            if next.is_ascii_digit() || next == '.' {
                modifiers.push(next);
                chars.next();
            } else {
                break;
            }
        }
        let conversion = chars
            .next()
            .ok_or_else(|| invalid(format, "dangling % at the end"))?;
        if !text.is_empty() {
            segments.push(Segment::Text(std::mem::take(&mut text)));
        }
        segments.push(Segment::Placeholder(parse_placeholder(format, &modifiers, conversion)?));
    }
    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    Ok(segments)
}

fn render_number(placeholder: &Placeholder, value: f64) -> String {
    let width = placeholder.width;
    match (placeholder.conversion, placeholder.zero_pad) {
        (Conversion::Integer, false) => format!("{:>width$}", value.trunc() as i64, width = width),
        (Conversion::Integer, true) => format!("{:0width$}", value.trunc() as i64, width = width),
        (_, zero_pad) => {
            let precision = placeholder.precision.unwrap_or(6);
            if zero_pad {
                format!("{:0width$.precision$}", value, width = width, precision = precision)
            } else {
                format!("{:>width$.precision$}", value, width = width, precision = precision)
            }
        }
    }
}

fn format_coordinate(segments: &[Segment], degrees: f64, letters: [char; 2], use_letter: bool) -> String {
    let negative = degrees < 0.0;
    let magnitude = degrees.abs();
    let minutes = (magnitude * 60.0) % 60.0;
    let seconds = (minutes * 60.0) % 60.0;
    let degrees = if negative && !use_letter {
        -magnitude
    } else {
        magnitude
    };
    let mut values = [degrees, minutes, seconds].into_iter();
    let letter = letters[negative as usize].to_string();

    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Placeholder(p) if p.conversion == Conversion::Letter => {
                out.push_str(&format!("{:>width$}", letter, width = p.width))
            }
            Segment::Placeholder(p) => {
                if let Some(value) = values.next() {
                    out.push_str(&render_number(p, value));
                }
            }
        }
    }
    out
}

/// Formats a latitude and a longitude in degrees with a printf-like template.
///
/// The template holds up to three numeric placeholders (`%d` or `%f`, with
/// optional width and precision such as `%6.3f`) that receive the degrees,
/// the minutes and the seconds in this order, and optionally a `%s` that
/// receives the hemisphere letter (`N`/`S` or `E`/`W`). Without a `%s` the
/// sign is kept on the degrees. `%%` writes a percent sign. With `as_latex`
/// the degree sign is written as `$^\circ$`.
///
/// ```
/// use cv_camera_transform::format_gps;
/// let (lat, lon) = format_gps(-70.61805, 13.5, None, false).unwrap();
/// assert_eq!(lat, "70° 37'  4.980\" S");
/// assert_eq!(lon, "13° 30'  0.000\" E");
/// ```
pub fn format_gps(
    latitude: f64,
    longitude: f64,
    format: Option<&str>,
    as_latex: bool,
) -> Result<(String, String), CameraError> {
    let format = format.unwrap_or(DEFAULT_GPS_FORMAT);
    let segments = parse(format)?;
    let placeholders: Vec<&Placeholder> = segments
        .iter()
        .filter_map(|segment| match segment {
            Segment::Placeholder(p) => Some(p),
            Segment::Text(_) => None,
        })
        .collect();
    if placeholders.is_empty() {
        return Err(invalid(format, "no placeholder"));
    }
    let use_letter = placeholders
        .iter()
        .any(|p| p.conversion == Conversion::Letter);
    let numbers = placeholders
        .iter()
        .filter(|p| p.conversion != Conversion::Letter)
        .count();
    if numbers > 3 {
        return Err(invalid(format, "at most three numeric placeholders are allowed"));
    }

    let mut latitude = format_coordinate(&segments, latitude, ['N', 'S'], use_letter);
    let mut longitude = format_coordinate(&segments, longitude, ['E', 'W'], use_letter);
    if as_latex {
        latitude = latitude.replace('°', r"$^\circ$");
        longitude = longitude.replace('°', r"$^\circ$");
    }
    Ok((latitude, longitude))
}
