// Text line formats emitted by the sensor firmware.
//
// Tilt lines:        "X:0.12 Y:-0.40 Z:0.98 | Gyro X:1.0 ..."
// Orientation lines: "pitch,roll,yaw"

use imu_traits::{Euler, Float, ImuError, Reading};

const SEGMENT_DELIMITER: char = '|';
const FIELD_DELIMITER: char = ',';

/// One `AXIS:value` token found in a line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisToken {
    pub axis: char,
    pub value: Float,
}

/// Scans `segment` for `AXIS:value` tokens, left to right, non-overlapping.
///
/// `AXIS` is one of `X`, `Y`, `Z` and `value` is an optionally negative
/// decimal (`-?digits[.digits]`). Text around the tokens is skipped.
pub fn axis_tokens(segment: &str) -> Vec<AxisToken> {
    let bytes = segment.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match match_token(bytes, i) {
            Some((token, end)) => {
                tokens.push(token);
                i = end;
            }
            None => i += 1,
        }
    }

    tokens
}

fn match_token(bytes: &[u8], start: usize) -> Option<(AxisToken, usize)> {
    let axis = match bytes.get(start)? {
        b'X' => 'X',
        b'Y' => 'Y',
        b'Z' => 'Z',
        _ => return None,
    };
    if bytes.get(start + 1) != Some(&b':') {
        return None;
    }

    let value_start = start + 2;
    let mut end = value_start;
    if bytes.get(end) == Some(&b'-') {
        end += 1;
    }

    let int_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    if end == int_start {
        return None;
    }

    // A trailing "." with no fraction digits is consumed but not parsed.
    let mut number_end = end;
    if bytes.get(end) == Some(&b'.') {
        end += 1;
        while bytes.get(end).is_some_and(u8::is_ascii_digit) {
            end += 1;
        }
        if end > number_end + 1 {
            number_end = end;
        }
    }

    // Only ASCII bytes were consumed, so the slice is valid UTF-8.
    let text = std::str::from_utf8(&bytes[value_start..number_end]).ok()?;
    // Long digit runs overflow to infinity.
    let value = text.parse::<Float>().ok().filter(|v| v.is_finite())?;
    Some((AxisToken { axis, value }, end))
}

/// Parses a tilt line into an `(X, Y)` reading.
///
/// Only the segment before the first `|` is considered. `Z` and unknown
/// text are ignored, a repeated axis keeps its last value, and an axis that
/// is missing reads as `0.0` as long as the other one is present.
pub fn parse_axis_line(line: &str) -> Result<Reading, ImuError> {
    let primary = line
        .trim()
        .split(SEGMENT_DELIMITER)
        .next()
        .unwrap_or_default();

    let mut x = None;
    let mut y = None;
    for token in axis_tokens(primary) {
        match token.axis {
            'X' => x = Some(token.value),
            'Y' => y = Some(token.value),
            _ => (),
        }
    }

    if x.is_none() && y.is_none() {
        return Err(ImuError::InvalidPacket(format!(
            "no X/Y tokens in line {:?}",
            line.trim()
        )));
    }

    Ok(Reading::new(x.unwrap_or(0.0), y.unwrap_or(0.0)))
}

/// Parses a `pitch,roll,yaw` line in degrees. Fields past the third are ignored.
pub fn parse_orientation_line(line: &str) -> Result<Euler, ImuError> {
    let mut fields = line.trim().split(FIELD_DELIMITER).map(str::trim);

    let mut next_angle = |name: &str| -> Result<Float, ImuError> {
        let field = fields
            .next()
            .ok_or_else(|| ImuError::InvalidPacket(format!("missing {} field", name)))?;
        let angle = field
            .parse::<Float>()
            .map_err(|e| ImuError::InvalidPacket(format!("bad {} {:?}: {}", name, field, e)))?;
        if !angle.is_finite() {
            return Err(ImuError::InvalidPacket(format!("non-finite {} {:?}", name, field)));
        }
        Ok(angle)
    };

    let pitch = next_angle("pitch")?;
    let roll = next_angle("roll")?;
    let yaw = next_angle("yaw")?;
    Ok(Euler::new(pitch, roll, yaw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_accel_segment() {
        let r = parse_axis_line("Accel X:0.52 Y:-1.25 Z:9.81 | Gyro X:3.0 Y:4.0 Z:5.0\r\n").unwrap();
        assert_eq!(r, Reading::new(0.52, -1.25));
    }

    #[test]
    fn axis_order_does_not_matter() {
        let r = parse_axis_line("Z:1 Y:2 X:3").unwrap();
        assert_eq!(r, Reading::new(3.0, 2.0));
    }

    #[test]
    fn last_occurrence_wins() {
        let r = parse_axis_line("X:1 Y:1 X:7").unwrap();
        assert_eq!(r, Reading::new(7.0, 1.0));
    }

    #[test]
    fn missing_axis_reads_as_zero() {
        assert_eq!(parse_axis_line("Y:0.5").unwrap(), Reading::new(0.0, 0.5));
        assert_eq!(parse_axis_line("X:-2").unwrap(), Reading::new(-2.0, 0.0));
    }

    #[test]
    fn trailing_dot_is_accepted() {
        assert_eq!(parse_axis_line("X:4. Y:1").unwrap(), Reading::new(4.0, 1.0));
    }

    #[test]
    fn rejects_lines_without_xy() {
        for line in [
            "",
            "   ",
            "Gyro:OK",
            "Z:9.81",
            "X:abc Y:-",
            "x:1 y:2",
            "| X:1 Y:2",
        ] {
            assert!(
                matches!(parse_axis_line(line), Err(ImuError::InvalidPacket(_))),
                "accepted {:?}",
                line
            );
        }
    }

    #[test]
    fn rejects_overflowing_values() {
        let huge = "9".repeat(400);
        let line = format!("X:{} Y:{}", huge, huge);
        assert!(matches!(
            parse_axis_line(&line),
            Err(ImuError::InvalidPacket(_))
        ));

        let line = format!("X:{} Y:0.5", huge);
        assert_eq!(parse_axis_line(&line).unwrap(), Reading::new(0.0, 0.5));
        assert!(axis_tokens(&format!("X:-{}", huge)).is_empty());
    }

    #[test]
    fn ignores_tokens_after_delimiter() {
        let r = parse_axis_line("X:1|Y:5").unwrap();
        assert_eq!(r, Reading::new(1.0, 0.0));
    }

    #[test]
    fn tokenizer_skips_noise() {
        let tokens = axis_tokens("AX:1 --Y:-2.5;Z:3");
        assert_eq!(
            tokens,
            vec![
                AxisToken { axis: 'X', value: 1.0 },
                AxisToken { axis: 'Y', value: -2.5 },
                AxisToken { axis: 'Z', value: 3.0 },
            ]
        );
    }

    #[test]
    fn parses_orientation() {
        let e = parse_orientation_line("12.5,-3.0,170.25\r\n").unwrap();
        assert_eq!(e, Euler::new(12.5, -3.0, 170.25));
        let e = parse_orientation_line("1, 2, 3, 99").unwrap();
        assert_eq!(e, Euler::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn rejects_short_or_garbled_orientation() {
        assert!(parse_orientation_line("1.0,2.0").is_err());
        assert!(parse_orientation_line("1.0,abc,3.0").is_err());
        assert!(parse_orientation_line("").is_err());
        assert!(parse_orientation_line("inf,0,0").is_err());
        assert!(parse_orientation_line("0,NaN,0").is_err());
    }

    proptest! {
        #[test]
        fn any_xy_line_parses_exactly(
            x in -10_000i32..10_000,
            y in -10_000i32..10_000,
            z in -10_000i32..10_000,
            swap in any::<bool>(),
            extra in "[a-z ]{0,12}",
        ) {
            let x = x as Float / 100.0;
            let y = y as Float / 100.0;
            let (first, second) = if swap {
                (format!("Y:{}", y), format!("X:{}", x))
            } else {
                (format!("X:{}", x), format!("Y:{}", y))
            };
            let line = format!("{}{} Z:{} {}| Gyro X:0", first, extra, z, second);
            let r = parse_axis_line(&line).unwrap();
            prop_assert_eq!(r, Reading::new(x, y));
        }

        #[test]
        fn lines_without_axis_letters_are_rejected(line in "[a-w0-9 :.,-]{0,40}") {
            prop_assert!(parse_axis_line(&line).is_err());
        }
    }
}
