//! URL state encoding/decoding for shareable URLs.
//!
//! Two wire forms carry a [`MapViewState`]:
//!
//! - hash fragment: `#<profile>/<zoom>/<lat>/<lon>/<bearing>/<pitch>[/<objectId>]`
//! - path + query: `/<profile>/<objectId>[-slug]?z=..&lat=..&lng=..&bearing=..&pitch=..`
//!   (the second path segment is `map` when nothing is selected)
//!
//! Zoom is written with 2 decimals, coordinates with 5 (~1 m), angles with 0.
//! Every parse entry point returns `None` on malformed input, never a
//! partially-filled record. The same record is also persisted as JSON so a
//! reload without URL state restores the last view.

use super::view_state::{MapViewState, ANGLE_PRECISION, COORD_PRECISION, ZOOM_PRECISION};
use crate::storage::PersistedSlot;
use url::form_urlencoded;

/// Second path segment used when no object is selected.
pub const MAP_SEGMENT: &str = "map";

/// Formats a number with a fixed number of decimals the way browsers do
/// (`Number.prototype.toFixed`).
///
/// Rounding works on the exact binary value, so `1.045` (stored just below
/// the tie) gives `"1.04"`. Exact ties round away from zero. A result that
/// rounds to zero never carries a sign, so the text parses back to a value
/// that formats identically.
pub fn to_fixed(value: f64, digits: usize) -> String {
    let text = if value.is_finite() && is_exact_tie(value, digits) {
        round_tie_away(value, digits)
    } else {
        format!("{:.*}", digits, value)
    };

    match text.strip_prefix('-') {
        Some(magnitude) if magnitude.chars().all(|c| c == '0' || c == '.') => {
            magnitude.to_string()
        }
        _ => text,
    }
}

/// True when `value * 10^digits` lies exactly halfway between two integers.
///
/// With `value = m * 2^e` (m odd after shifting out trailing zeros), the
/// product is `m * 5^digits * 2^(e + digits)`, whose only fractional bit is
/// one half exactly when that exponent is -1.
fn is_exact_tie(value: f64, digits: usize) -> bool {
    let bits = value.to_bits();
    let exponent_bits = ((bits >> 52) & 0x7ff) as i64;
    let fraction = bits & ((1u64 << 52) - 1);
    let (mantissa, exponent) = if exponent_bits == 0 {
        (fraction, -1074)
    } else {
        (fraction | (1u64 << 52), exponent_bits - 1075)
    };
    if mantissa == 0 {
        return false;
    }
    exponent + digits as i64 + mantissa.trailing_zeros() as i64 == -1
}

/// Formats an exact tie, rounding the magnitude up.
fn round_tie_away(value: f64, digits: usize) -> String {
    // One more decimal is exact: it ends in the tie's 5.
    let mut text = format!("{:.*}", digits + 1, value);
    text.pop();
    if text.ends_with('.') {
        text.pop();
    }

    let mut chars: Vec<char> = text.chars().collect();
    let mut i = chars.len();
    loop {
        if i == 0 {
            let at = usize::from(chars.first() == Some(&'-'));
            chars.insert(at, '1');
            break;
        }
        i -= 1;
        match chars[i] {
            '9' => chars[i] = '0',
            c @ '0'..='8' => {
                chars[i] = (c as u8 + 1) as char;
                break;
            }
            _ => {}
        }
    }
    chars.into_iter().collect()
}

/// Parses a whole segment as a finite number.
fn parse_finite(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a hash fragment (including the leading `#`).
///
/// Example: `#m/14.00/54.93429/23.91776/0/0` or with a selection
/// `#m/14.00/54.93429/23.91776/0/0/p2811970425`.
pub fn parse_hash_fragment(fragment: &str) -> Option<MapViewState> {
    let body = fragment.strip_prefix('#')?;
    let parts: Vec<&str> = body.split('/').collect();
    if parts.len() != 6 && parts.len() != 7 {
        return None;
    }

    let zoom = parse_finite(parts[1])?;
    let latitude = parse_finite(parts[2])?;
    let longitude = parse_finite(parts[3])?;
    let bearing = parse_finite(parts[4])?;
    let pitch = parse_finite(parts[5])?;

    Some(MapViewState {
        map_profile: parts[0].to_string(),
        zoom,
        latitude,
        longitude,
        bearing,
        pitch,
        selected_object_id: parts
            .get(6)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string()),
    })
}

/// Format a state as a hash fragment; the inverse of [`parse_hash_fragment`].
pub fn format_hash_fragment(state: &MapViewState) -> String {
    let base = format!(
        "#{}/{}/{}/{}/{}/{}",
        state.map_profile,
        to_fixed(state.zoom, ZOOM_PRECISION),
        to_fixed(state.latitude, COORD_PRECISION),
        to_fixed(state.longitude, COORD_PRECISION),
        to_fixed(state.bearing, ANGLE_PRECISION),
        to_fixed(state.pitch, ANGLE_PRECISION),
    );
    match &state.selected_object_id {
        Some(id) => format!("{}/{}", base, id),
        None => base,
    }
}

/// Splits a URL path into its non-empty segments.
pub fn path_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Extracts the object id token from the selection path segment.
///
/// The segment is either [`MAP_SEGMENT`] or `<token>[-<slug>]`.
pub fn selection_from_segment(segment: &str) -> Option<String> {
    if segment == MAP_SEGMENT {
        return None;
    }
    segment
        .split('-')
        .next()
        .filter(|token| !token.is_empty())
        .map(|token| token.to_string())
}

/// Parse the path-profile form: the profile is the first path segment, the
/// optional selection the second, and the camera comes from the query.
///
/// Fails if the profile segment or any of `z`, `lat`, `lng`, `bearing`,
/// `pitch` is missing or not a finite number. When a key repeats, the first
/// occurrence counts.
pub fn parse_query_string(query: &str, path_segments: &[&str]) -> Option<MapViewState> {
    let profile = path_segments.first().filter(|s| !s.is_empty())?;
    let query = query.strip_prefix('?').unwrap_or(query);

    let mut zoom = None;
    let mut lat = None;
    let mut lng = None;
    let mut bearing = None;
    let mut pitch = None;

    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        let slot = match key.as_ref() {
            "z" => &mut zoom,
            "lat" => &mut lat,
            "lng" => &mut lng,
            "bearing" => &mut bearing,
            "pitch" => &mut pitch,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(value.into_owned());
        }
    }

    let number = |raw: Option<String>| raw.as_deref().and_then(parse_finite);

    Some(MapViewState {
        map_profile: profile.to_string(),
        zoom: number(zoom)?,
        latitude: number(lat)?,
        longitude: number(lng)?,
        bearing: number(bearing)?,
        pitch: number(pitch)?,
        selected_object_id: path_segments
            .get(1)
            .and_then(|segment| selection_from_segment(segment)),
    })
}

/// Format the camera as a query string (with leading `?`).
///
/// Only the five numeric fields are carried here; the profile and selection
/// travel in the path, see [`format_path`].
pub fn format_query_string(state: &MapViewState) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("z", &to_fixed(state.zoom, ZOOM_PRECISION))
        .append_pair("lat", &to_fixed(state.latitude, COORD_PRECISION))
        .append_pair("lng", &to_fixed(state.longitude, COORD_PRECISION))
        .append_pair("bearing", &to_fixed(state.bearing, ANGLE_PRECISION))
        .append_pair("pitch", &to_fixed(state.pitch, ANGLE_PRECISION))
        .finish();
    format!("?{}", query)
}

/// Format the path of the path-profile form: `/<profile>/<objectId>[-slug]`
/// or `/<profile>/map`.
pub fn format_path(state: &MapViewState, slug: Option<&str>) -> String {
    let selection = match (&state.selected_object_id, slug) {
        (Some(token), Some(slug)) if !slug.is_empty() => format!("{}-{}", token, slug),
        (Some(token), _) => token.clone(),
        (None, _) => MAP_SEGMENT.to_string(),
    };
    format!("/{}/{}", state.map_profile, selection)
}

/// Turns a feature name into a URL slug: lowercase alphanumerics separated
/// by single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut gap = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if gap && !slug.is_empty() {
                slug.push('-');
            }
            gap = false;
            slug.extend(c.to_lowercase());
        } else {
            gap = true;
        }
    }
    slug
}

/// Read the persisted state. Missing, unreadable, or malformed content is a
/// cache miss.
pub fn read_persisted<S: PersistedSlot + ?Sized>(slot: &S, key: &str) -> Option<MapViewState> {
    let json = match slot.read(key) {
        Ok(Some(json)) => json,
        Ok(None) => return None,
        Err(e) => {
            log::warn!("Failed to load map state from storage: {}", e);
            return None;
        }
    };

    match serde_json::from_str::<MapViewState>(&json) {
        Ok(state) if state.is_finite() => Some(state),
        Ok(_) => {
            log::warn!("Ignoring stored map state with non-finite values");
            None
        }
        Err(e) => {
            log::warn!("Failed to parse stored map state: {}", e);
            None
        }
    }
}

/// Overwrite the persisted state. Best effort: failures are logged only.
pub fn write_persisted<S: PersistedSlot + ?Sized>(slot: &S, key: &str, state: &MapViewState) {
    let json = match serde_json::to_string(state) {
        Ok(json) => json,
        Err(e) => {
            log::warn!("Failed to serialize map state: {}", e);
            return;
        }
    };

    if let Err(e) = slot.write(key, &json) {
        log::warn!("Failed to save map state to storage: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemorySlot;
    use proptest::prelude::*;

    fn state(profile: &str, selection: Option<&str>) -> MapViewState {
        MapViewState {
            map_profile: profile.to_string(),
            zoom: 14.0,
            latitude: 54.93429,
            longitude: 23.91776,
            bearing: 0.0,
            pitch: 0.0,
            selected_object_id: selection.map(str::to_string),
        }
    }

    fn rounded(value: f64, digits: usize) -> f64 {
        to_fixed(value, digits).parse().unwrap()
    }

    #[test]
    fn test_to_fixed_matches_browser_rounding() {
        assert_eq!(to_fixed(14.0, 2), "14.00");
        assert_eq!(to_fixed(2.5, 0), "3");
        assert_eq!(to_fixed(-2.5, 0), "-3");
        assert_eq!(to_fixed(0.5, 0), "1");
        assert_eq!(to_fixed(-0.0, 2), "0.00");
        assert_eq!(to_fixed(1.005, 2), "1.00");
        assert_eq!(to_fixed(54.934294, 5), "54.93429");
        assert_eq!(to_fixed(23.917766, 5), "23.91777");
        assert_eq!(to_fixed(359.6, 0), "360");
        assert_eq!(to_fixed(1.045, 2), "1.04");
        assert_eq!(to_fixed(54.123455, 5), "54.12345");
        assert_eq!(to_fixed(0.125, 2), "0.13");
        assert_eq!(to_fixed(-0.125, 2), "-0.13");
        assert_eq!(to_fixed(9.5, 0), "10");
        assert_eq!(to_fixed(-99.5, 0), "-100");
    }

    #[test]
    fn test_to_fixed_never_signs_zero() {
        assert_eq!(to_fixed(-0.4, 0), "0");
        assert_eq!(to_fixed(-0.004, 2), "0.00");
        assert_eq!(to_fixed(-0.000001, 5), "0.00000");
        assert_eq!(to_fixed(-0.6, 0), "-1");

        // The printed text parses back to a value that prints the same.
        let printed = to_fixed(-0.4, 0);
        let reparsed: f64 = printed.parse().unwrap();
        assert_eq!(to_fixed(reparsed, 0), printed);
    }

    #[test]
    fn test_parse_hash_example() {
        let parsed = parse_hash_fragment("#p/12.50/54.68720/25.27970/10/0/p42").unwrap();
        assert_eq!(
            parsed,
            MapViewState {
                map_profile: "p".to_string(),
                zoom: 12.5,
                latitude: 54.6872,
                longitude: 25.2797,
                bearing: 10.0,
                pitch: 0.0,
                selected_object_id: Some("p42".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_hash_without_selection() {
        let parsed = parse_hash_fragment("#m/14/54.93429/23.91776/0/0").unwrap();
        assert_eq!(parsed, state("m", None));

        // Empty trailing segment means no selection.
        let parsed = parse_hash_fragment("#m/14/54.93429/23.91776/0/0/").unwrap();
        assert_eq!(parsed.selected_object_id, None);
    }

    #[test]
    fn test_parse_hash_rejects_malformed() {
        assert_eq!(parse_hash_fragment("#m/abc/54.6/25.2/0/0"), None);
        assert_eq!(parse_hash_fragment("m/14/54.6/25.2/0/0"), None);
        assert_eq!(parse_hash_fragment("#m/14/54.6/25.2/0"), None);
        assert_eq!(parse_hash_fragment("#m/14/54.6/25.2/0/0/p1/extra"), None);
        assert_eq!(parse_hash_fragment("#m/14/54.6/25.2/NaN/0"), None);
        assert_eq!(parse_hash_fragment("#m/14/inf/25.2/0/0"), None);
        assert_eq!(parse_hash_fragment("#m/14abc/54.6/25.2/0/0"), None);
        assert_eq!(parse_hash_fragment(""), None);
        assert_eq!(parse_hash_fragment("#"), None);
    }

    #[test]
    fn test_format_hash() {
        assert_eq!(
            format_hash_fragment(&state("m", None)),
            "#m/14.00/54.93429/23.91776/0/0"
        );
        assert_eq!(
            format_hash_fragment(&state("m", Some("p2811970425"))),
            "#m/14.00/54.93429/23.91776/0/0/p2811970425"
        );
    }

    #[test]
    fn test_query_string_round_trip() {
        let original = state("p", Some("p42"));
        let query = format_query_string(&original);
        assert_eq!(
            query,
            "?z=14.00&lat=54.93429&lng=23.91776&bearing=0&pitch=0"
        );

        let path = format_path(&original, Some("vilniaus-katedra"));
        assert_eq!(path, "/p/p42-vilniaus-katedra");

        let parsed = parse_query_string(&query, &path_segments(&path)).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_query_string_without_selection() {
        let original = state("m", None);
        let path = format_path(&original, Some("ignored"));
        assert_eq!(path, "/m/map");

        let parsed =
            parse_query_string(&format_query_string(&original), &path_segments(&path)).unwrap();
        assert_eq!(parsed, original);

        let parsed = parse_query_string("z=14&lat=54.93429&lng=23.91776&bearing=0&pitch=0", &["m"])
            .unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_query_string_rejects_missing_or_bad_numbers() {
        let segments = ["m", "map"];
        assert_eq!(parse_query_string("?z=14&lat=54&lng=23&bearing=0", &segments), None);
        assert_eq!(
            parse_query_string("?z=14&lat=x&lng=23&bearing=0&pitch=0", &segments),
            None
        );
        assert_eq!(parse_query_string("?z=14&lat=54&lng=23&bearing=0&pitch=0", &[]), None);
        assert_eq!(parse_query_string("", &segments), None);
    }

    #[test]
    fn test_query_string_first_duplicate_wins() {
        let parsed =
            parse_query_string("?z=9&z=x&lat=54&lng=23&bearing=0&pitch=0&extra=1", &["m"])
                .unwrap();
        assert_eq!(parsed.zoom, 9.0);
    }

    #[test]
    fn test_selection_from_segment() {
        assert_eq!(selection_from_segment("map"), None);
        assert_eq!(selection_from_segment(""), None);
        assert_eq!(selection_from_segment("-slug"), None);
        assert_eq!(selection_from_segment("p42"), Some("p42".to_string()));
        assert_eq!(
            selection_from_segment("p42-kauno-pilis"),
            Some("p42".to_string())
        );
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Vilniaus katedra"), "vilniaus-katedra");
        assert_eq!(slugify("  Trakų  salos pilis! "), "trakų-salos-pilis");
        assert_eq!(slugify("Café & Bar (Old Town)"), "café-bar-old-town");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn test_persisted_round_trip() {
        let slot = MemorySlot::new();
        let original = state("p", Some("a17"));
        write_persisted(&slot, "openmap_state", &original);
        assert_eq!(read_persisted(&slot, "openmap_state"), Some(original));
        assert_eq!(read_persisted(&slot, "other_key"), None);
    }

    #[test]
    fn test_persisted_malformed_is_cache_miss() {
        let slot = MemorySlot::new();
        slot.write("k", "not json").unwrap();
        assert_eq!(read_persisted(&slot, "k"), None);

        slot.write("k", r#"{"mapType":"m","zoom":"14"}"#).unwrap();
        assert_eq!(read_persisted(&slot, "k"), None);
    }

    #[test]
    fn test_persisted_accepts_legacy_json_without_selection() {
        let slot = MemorySlot::new();
        slot.write(
            "k",
            r#"{"mapType":"m","zoom":14,"latitude":54.93429,"longitude":23.91776,"bearing":0,"pitch":0}"#,
        )
        .unwrap();
        assert_eq!(read_persisted(&slot, "k"), Some(state("m", None)));
    }

    #[test]
    fn test_persisted_unavailable_storage_is_swallowed() {
        let slot = MemorySlot::unavailable();
        write_persisted(&slot, "k", &state("m", None));
        assert_eq!(read_persisted(&slot, "k"), None);
    }

    proptest! {
        #[test]
        fn prop_hash_round_trip_within_precision(
            profile in "[a-z]",
            zoom in 0.0f64..24.0,
            latitude in -90.0f64..90.0,
            longitude in -180.0f64..180.0,
            bearing in -180.0f64..180.0,
            pitch in 0.0f64..85.0,
            selection in proptest::option::of("[ap][0-9]{1,12}"),
        ) {
            let original = MapViewState {
                map_profile: profile,
                zoom,
                latitude,
                longitude,
                bearing,
                pitch,
                selected_object_id: selection,
            };
            let parsed = parse_hash_fragment(&format_hash_fragment(&original)).unwrap();

            prop_assert_eq!(&parsed.map_profile, &original.map_profile);
            prop_assert_eq!(&parsed.selected_object_id, &original.selected_object_id);
            prop_assert_eq!(parsed.zoom, rounded(zoom, ZOOM_PRECISION));
            prop_assert_eq!(parsed.latitude, rounded(latitude, COORD_PRECISION));
            prop_assert_eq!(parsed.longitude, rounded(longitude, COORD_PRECISION));
            prop_assert_eq!(parsed.bearing, rounded(bearing, ANGLE_PRECISION));
            prop_assert_eq!(parsed.pitch, rounded(pitch, ANGLE_PRECISION));
        }
    }
}
