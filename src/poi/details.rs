//! Display details extracted from a POI's properties.

use serde_json::{Map, Value};

const OSM_BASE: &str = "https://www.openstreetmap.org/";
const HERITAGE_BASE: &str = "https://kvr.kpd.lt/heritage/Pages/KVRDetail.aspx?lang=lt&MC=";

/// Links to the feature on OpenStreetMap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsmLinks {
    pub view: String,
    pub edit: String,
}

/// A link with a display label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub label: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoiDetails {
    pub name: Option<String>,
    pub official_name: Option<String>,
    pub alt_name: Option<String>,
    pub address: Option<String>,
    /// One entry per rule, weekdays in Lithuanian.
    pub opening_hours: Vec<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub heritage: Option<Link>,
    pub wikipedia: Option<Link>,
    /// Height with its unit, e.g. `"12 m."`.
    pub height: Option<String>,
    /// Whether entry is paid; `None` when unknown.
    pub fee: Option<bool>,
    pub image: Option<String>,
    pub osm: Option<OsmLinks>,
}

impl PoiDetails {
    pub fn from_properties(properties: &Map<String, Value>) -> Self {
        let get = |key: &str| text(properties, key);

        Self {
            name: get("name"),
            official_name: get("official_name"),
            alt_name: get("alt_name"),
            address: format_address(properties),
            opening_hours: get("opening_hours")
                .map(|hours| format_opening_hours(&hours))
                .unwrap_or_default(),
            email: get("email"),
            phone: get("phone"),
            website: get("website"),
            heritage: get("heritage").map(|code| Link {
                label: "Kultūros vertybių registras".to_string(),
                url: format!("{}{}", HERITAGE_BASE, code),
            }),
            wikipedia: get("wikipedia").and_then(|w| wikipedia_link(&w)),
            height: get("height").map(|h| format!("{} m.", h)),
            fee: get("fee").map(|fee| fee == "yes"),
            image: get("image"),
            osm: osm_links(properties),
        }
    }

    /// Title for the detail panel.
    pub fn title(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or(self.official_name.as_deref())
            .or(self.alt_name.as_deref())
    }
}

/// A non-empty property as text. Numbers are formatted.
fn text(properties: &Map<String, Value>, key: &str) -> Option<String> {
    match properties.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `street housenumber, city LT-post_code`; `None` without a street.
pub fn format_address(properties: &Map<String, Value>) -> Option<String> {
    let mut address = text(properties, "street")?;

    if let Some(number) = text(properties, "housenumber") {
        address.push(' ');
        address.push_str(&number);
    }
    if let Some(city) = text(properties, "city") {
        address.push_str(", ");
        address.push_str(&city);
    }
    if let Some(code) = text(properties, "post_code") {
        address.push(' ');
        if code.chars().all(|c| c.is_ascii_digit()) {
            address.push_str("LT-");
        }
        address.push_str(&code);
    }

    Some(address)
}

/// View and edit links from `__type__` (`n`, `w` or `r`) and `id`.
pub fn osm_links(properties: &Map<String, Value>) -> Option<OsmLinks> {
    let id = text(properties, "id")?;
    let kind = match text(properties, "__type__")?.as_str() {
        "n" => "node",
        "w" => "way",
        "r" => "relation",
        _ => return None,
    };

    Some(OsmLinks {
        view: format!("{}{}/{}", OSM_BASE, kind, id),
        edit: format!("{}edit?{}={}", OSM_BASE, kind, id),
    })
}

/// `lang:Title` to a Wikipedia article link.
fn wikipedia_link(value: &str) -> Option<Link> {
    let (lang, title) = value.split_once(':')?;
    if lang.is_empty() || title.is_empty() {
        return None;
    }
    let path: String = title
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();

    Some(Link {
        label: title.to_string(),
        url: format!("https://{}.wikipedia.org/wiki/{}", lang, path),
    })
}

const WEEKDAYS: [(&str, &str); 7] = [
    ("Mo", "Pr"),
    ("Tu", "An"),
    ("We", "Tr"),
    ("Th", "Kt"),
    ("Fr", "Pt"),
    ("Sa", "Št"),
    ("Su", "Sk"),
];

/// Splits an OSM `opening_hours` value into rules and translates weekday
/// abbreviations. A comma between a time and the next day range also
/// separates rules (`"Mo-Fr 08:00-17:00, Sa 10:00-14:00"`).
pub fn format_opening_hours(value: &str) -> Vec<String> {
    let chars: Vec<char> = value.chars().collect();
    let mut normalized = String::with_capacity(value.len());

    for (i, &c) in chars.iter().enumerate() {
        if c == ',' {
            let before = chars[..i].iter().rev().find(|c| !c.is_whitespace());
            let after = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            let separates = matches!(before, Some(b) if b.is_ascii_digit())
                && matches!(after, Some(a) if a.is_alphanumeric() || *a == '_');
            normalized.push(if separates { ';' } else { c });
        } else {
            normalized.push(c);
        }
    }

    for (english, lithuanian) in WEEKDAYS {
        normalized = normalized.replacen(english, lithuanian, 1);
    }

    normalized
        .split(';')
        .map(str::trim)
        .filter(|rule| !rule.is_empty())
        .map(str::to_string)
        .collect()
}
