use serde_json::Value;

use crate::config::Heuristics;
use crate::parser::document::{collapse_ws, Document};
use crate::types::{GeoSignals, LocationSource, StructuredBlock};

/// Structured address beats geo meta; hreflang and map embeds are readiness flags only.
pub fn extract(doc: &Document, blocks: &[StructuredBlock], h: &Heuristics) -> GeoSignals {
    let mut hreflang: Vec<String> = Vec::new();
    for link in &doc.hreflang {
        let lang = link.lang.to_lowercase();
        if !hreflang.contains(&lang) {
            hreflang.push(lang);
        }
    }

    let geo_meta = geo_meta_location(doc);
    let has_geo_meta = geo_meta.is_some() || doc.meta.keys().any(|k| k.starts_with("geo."));

    let (location, location_source) = match structured_address(blocks) {
        Some(addr) => (Some(addr), Some(LocationSource::StructuredAddress)),
        None => match geo_meta {
            Some(meta) => (Some(meta), Some(LocationSource::GeoMeta)),
            None => (None, None),
        },
    };

    GeoSignals {
        location,
        location_source,
        hreflang,
        has_geo_meta,
        has_map_embed: doc.iframes.iter().any(|src| is_map_embed(src, h)),
    }
}

// ── Structured address ──

fn structured_address(blocks: &[StructuredBlock]) -> Option<String> {
    blocks.iter().find_map(|b| {
        if b.has_type("PostalAddress") {
            return format_address(&Value::Object(b.fields.clone()));
        }
        let addr = b.field("address")?;
        match addr {
            Value::Array(items) => items.iter().find_map(format_address),
            other => format_address(other),
        }
    })
}

fn format_address(addr: &Value) -> Option<String> {
    if let Some(s) = addr.as_str() {
        let s = collapse_ws(s);
        return (!s.is_empty()).then_some(s);
    }

    let parts: Vec<String> = ["addressLocality", "addressRegion", "addressCountry"]
        .iter()
        .filter_map(|key| addr.get(*key))
        .filter_map(|v| {
            v.as_str()
                .or_else(|| v.get("name").and_then(|n| n.as_str()))
                .map(collapse_ws)
        })
        .filter(|s| !s.is_empty())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

// ── Geo meta tags ──

fn geo_meta_location(doc: &Document) -> Option<String> {
    if let Some(place) = doc.meta("geo.placename") {
        return Some(collapse_ws(place));
    }
    doc.meta("geo.position")
        .and_then(|p| parse_coordinates(p, ';'))
        .or_else(|| doc.meta("icbm").and_then(|p| parse_coordinates(p, ',')))
}

fn parse_coordinates(raw: &str, sep: char) -> Option<String> {
    let (lat, lon) = raw.split_once(sep)?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lon: f64 = lon.trim().parse().ok()?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return None;
    }
    Some(format!("{},{}", lat, lon))
}

// ── Map embeds ──

fn is_map_embed(src: &str, h: &Heuristics) -> bool {
    let absolute = if src.starts_with("//") {
        format!("https:{}", src)
    } else {
        src.to_string()
    };
    let Ok(url) = url::Url::parse(&absolute) else {
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };
    let target = format!("{}{}", host.to_lowercase(), url.path().to_lowercase());
    h.map_providers.iter().any(|p| target.contains(p.as_str()))
}
