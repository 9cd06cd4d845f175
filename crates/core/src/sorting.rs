use std::cmp::Ordering;
use std::collections::HashMap;

use crate::domain::{Frame, FrameSortMode};

/// Sort a roll's frames in place. Frames whose sort key is absent or
/// unparsable go last; ties fall back to frame count, then id.
///
/// `lens_names` maps lens ids to display names and is only consulted for
/// [`FrameSortMode::Lens`].
pub fn sort_frames(frames: &mut [Frame], mode: FrameSortMode, lens_names: &HashMap<i64, String>) {
    frames.sort_by(|a, b| {
        let primary = match mode {
            FrameSortMode::FrameCount => Ordering::Equal,
            FrameSortMode::Date => absent_last(a.date, b.date, |x, y| x.cmp(&y)),
            FrameSortMode::FStop => absent_last(
                a.aperture.as_deref().and_then(parse_f_number),
                b.aperture.as_deref().and_then(parse_f_number),
                |x, y| x.total_cmp(&y),
            ),
            FrameSortMode::ShutterSpeed => absent_last(
                a.shutter.as_deref().and_then(parse_shutter_seconds),
                b.shutter.as_deref().and_then(parse_shutter_seconds),
                |x, y| x.total_cmp(&y),
            ),
            FrameSortMode::Lens => absent_last(
                lens_name(a, lens_names),
                lens_name(b, lens_names),
                |x, y| x.to_lowercase().cmp(&y.to_lowercase()),
            ),
        };
        primary
            .then_with(|| a.count.cmp(&b.count))
            .then_with(|| a.id.cmp(&b.id))
    });
}

fn absent_last<T>(a: Option<T>, b: Option<T>, cmp: impl FnOnce(T, T) -> Ordering) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => cmp(a, b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn lens_name<'a>(frame: &Frame, lens_names: &'a HashMap<i64, String>) -> Option<&'a str> {
    frame
        .lens_id
        .and_then(|id| lens_names.get(&id))
        .map(String::as_str)
}

/// Parse an aperture such as `"5.6"`, `"f/5.6"` or `"f2,8"`.
pub fn parse_f_number(value: &str) -> Option<f64> {
    let v = value.trim();
    let v = v
        .strip_prefix("f/")
        .or_else(|| v.strip_prefix("F/"))
        .or_else(|| v.strip_prefix('f'))
        .or_else(|| v.strip_prefix('F'))
        .unwrap_or(v);
    v.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite() && *n > 0.0)
}

/// Parse a shutter speed into seconds: `"1/125"`, `"2\""`, `"0.5"`.
/// Bulb (`"B"`) sorts after every timed exposure.
pub fn parse_shutter_seconds(value: &str) -> Option<f64> {
    let v = value.trim();
    if v.eq_ignore_ascii_case("b") {
        return Some(f64::INFINITY);
    }
    let seconds = if let Some((num, den)) = v.split_once('/') {
        let num: f64 = num.trim().parse().ok()?;
        let den: f64 = den.trim().parse().ok()?;
        if den == 0.0 {
            return None;
        }
        num / den
    } else {
        v.trim_end_matches(['"', 's']).trim().replace(',', ".").parse().ok()?
    };
    (seconds.is_finite() && seconds > 0.0).then_some(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn frame(id: i64, count: i32) -> Frame {
        Frame {
            id,
            roll_id: 1,
            count,
            ..Default::default()
        }
    }

    fn ids(frames: &[Frame]) -> Vec<i64> {
        frames.iter().map(|f| f.id).collect()
    }

    #[test]
    fn test_parse_shutter_seconds() {
        assert_eq!(parse_shutter_seconds("1/125"), Some(1.0 / 125.0));
        assert_eq!(parse_shutter_seconds("2\""), Some(2.0));
        assert_eq!(parse_shutter_seconds("B"), Some(f64::INFINITY));
        assert_eq!(parse_shutter_seconds("fast"), None);
        assert_eq!(parse_shutter_seconds("1/0"), None);
    }

    #[test]
    fn test_parse_f_number() {
        assert_eq!(parse_f_number("5.6"), Some(5.6));
        assert_eq!(parse_f_number("f/8"), Some(8.0));
        assert_eq!(parse_f_number("2,8"), Some(2.8));
        assert_eq!(parse_f_number(""), None);
    }

    #[test]
    fn test_sort_by_frame_count() {
        let mut frames = vec![frame(1, 3), frame(2, 1), frame(3, 2)];
        sort_frames(&mut frames, FrameSortMode::FrameCount, &HashMap::new());
        assert_eq!(ids(&frames), vec![2, 3, 1]);
    }

    #[test]
    fn test_sort_by_date_undated_last() {
        let day = |d| {
            NaiveDate::from_ymd_opt(2024, 5, d)
                .unwrap()
                .and_hms_opt(10, 0, 0)
        };
        let mut frames = vec![
            Frame { date: None, ..frame(1, 1) },
            Frame { date: day(20), ..frame(2, 2) },
            Frame { date: day(3), ..frame(3, 3) },
        ];
        sort_frames(&mut frames, FrameSortMode::Date, &HashMap::new());
        assert_eq!(ids(&frames), vec![3, 2, 1]);
    }

    #[test]
    fn test_sort_by_f_stop_numeric() {
        let ap = |s: &str| Some(s.to_string());
        let mut frames = vec![
            Frame { aperture: ap("11"), ..frame(1, 1) },
            Frame { aperture: ap("2.8"), ..frame(2, 2) },
            Frame { aperture: ap("?"), ..frame(3, 3) },
            Frame { aperture: ap("5.6"), ..frame(4, 4) },
        ];
        sort_frames(&mut frames, FrameSortMode::FStop, &HashMap::new());
        assert_eq!(ids(&frames), vec![2, 4, 1, 3]);
    }

    #[test]
    fn test_sort_by_shutter_speed() {
        let sh = |s: &str| Some(s.to_string());
        let mut frames = vec![
            Frame { shutter: sh("B"), ..frame(1, 1) },
            Frame { shutter: sh("1/60"), ..frame(2, 2) },
            Frame { shutter: None, ..frame(3, 3) },
            Frame { shutter: sh("2\""), ..frame(4, 4) },
            Frame { shutter: sh("1/1000"), ..frame(5, 5) },
        ];
        sort_frames(&mut frames, FrameSortMode::ShutterSpeed, &HashMap::new());
        assert_eq!(ids(&frames), vec![5, 2, 4, 1, 3]);
    }

    #[test]
    fn test_sort_by_lens_name() {
        let lens_names = HashMap::from([
            (10, "zeiss Planar".to_string()),
            (20, "Canon FD".to_string()),
        ]);
        let mut frames = vec![
            Frame { lens_id: Some(10), ..frame(1, 1) },
            Frame { lens_id: None, ..frame(2, 2) },
            Frame { lens_id: Some(20), ..frame(3, 3) },
            Frame { lens_id: Some(10), ..frame(4, 0) },
        ];
        sort_frames(&mut frames, FrameSortMode::Lens, &lens_names);
        assert_eq!(ids(&frames), vec![3, 4, 1, 2]);
    }
}
