//! JSON-LD payloads → [`StructuredBlock`]s.
//!
//! Each `<script type="application/ld+json">` body is parsed on its own; a
//! broken block produces a soft error and the remaining blocks still count.

use serde_json::{Map, Value};

use crate::error::ExtractError;
use crate::types::{SchemaType, StructuredBlock};

const ORGANIZATION_TYPES: &[&str] = &[
    "Organization",
    "Corporation",
    "NGO",
    "OnlineBusiness",
    "OnlineStore",
    "EducationalOrganization",
    "NewsMediaOrganization",
];

const LOCAL_BUSINESS_TYPES: &[&str] = &[
    "LocalBusiness",
    "Store",
    "Restaurant",
    "FoodEstablishment",
    "ProfessionalService",
    "HomeAndConstructionBusiness",
    "HealthAndBeautyBusiness",
    "MedicalBusiness",
    "Dentist",
    "LegalService",
    "AutomotiveBusiness",
    "LodgingBusiness",
    "Hotel",
    "FinancialService",
    "RealEstateAgent",
    "SportsActivityLocation",
    "TravelAgency",
];

const PRODUCT_TYPES: &[&str] = &["Product", "ProductGroup", "IndividualProduct", "ProductModel"];

const ARTICLE_TYPES: &[&str] = &[
    "Article",
    "NewsArticle",
    "BlogPosting",
    "TechArticle",
    "ScholarlyArticle",
    "Report",
];

/// Parse every raw payload of one page. Never fails as a whole.
pub fn extract_blocks(url: &str, payloads: &[String]) -> (Vec<StructuredBlock>, Vec<ExtractError>) {
    let mut blocks = Vec::new();
    let mut errors = Vec::new();

    for (i, raw) in payloads.iter().enumerate() {
        let body = unwrap_payload(raw);
        if body.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(body) {
            Ok(value) => collect(value, &mut blocks),
            Err(e) => errors.push(ExtractError::parse(url, format!("json-ld block {}: {}", i, e))),
        }
    }

    (blocks, errors)
}

/// Strip the comment / CDATA wrappers some CMSes put around JSON-LD.
fn unwrap_payload(raw: &str) -> &str {
    let mut s = raw.trim();
    for (open, close) in [("<!--", "-->"), ("<![CDATA[", "]]>"), ("//<![CDATA[", "//]]>")] {
        if let Some(inner) = s.strip_prefix(open) {
            s = inner.strip_suffix(close).unwrap_or(inner).trim();
        }
    }
    s.trim_end_matches(';').trim()
}

fn collect(value: Value, out: &mut Vec<StructuredBlock>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect(item, out);
            }
        }
        Value::Object(mut map) => {
            let graph = map.remove("@graph");
            if map.contains_key("@type") {
                out.push(classify(map));
            }
            if let Some(graph) = graph {
                collect(graph, out);
            }
        }
        _ => {}
    }
}

fn classify(fields: Map<String, Value>) -> StructuredBlock {
    let types = type_names(fields.get("@type"));
    let schema_type = types
        .iter()
        .find_map(|t| schema_type_of(t))
        .unwrap_or(SchemaType::Unknown);

    StructuredBlock {
        schema_type,
        types,
        fields,
    }
}

fn type_names(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => vec![bare_type(s)],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(bare_type)
            .collect(),
        _ => Vec::new(),
    }
}

/// "https://schema.org/Product" and "schema:Product" both mean "Product".
fn bare_type(s: &str) -> String {
    s.trim()
        .rsplit(['/', ':', '#'])
        .next()
        .unwrap_or("")
        .to_string()
}

pub fn schema_type_of(name: &str) -> Option<SchemaType> {
    if name == "FAQPage" {
        Some(SchemaType::FaqPage)
    } else if LOCAL_BUSINESS_TYPES.contains(&name) {
        Some(SchemaType::LocalBusiness)
    } else if ORGANIZATION_TYPES.contains(&name) {
        Some(SchemaType::Organization)
    } else if PRODUCT_TYPES.contains(&name) {
        Some(SchemaType::Product)
    } else if ARTICLE_TYPES.contains(&name) {
        Some(SchemaType::Article)
    } else {
        None
    }
}

// ── Tests ──
