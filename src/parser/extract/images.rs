use crate::config::Heuristics;
use crate::types::{AltTextClass, ImageAudit, ImageElement, ImageIssue};

pub fn classify(alt: Option<&str>, h: &Heuristics) -> AltTextClass {
    let Some(alt) = alt else {
        return AltTextClass::Missing;
    };
    let alt = alt.trim();
    if alt.is_empty() {
        AltTextClass::Empty
    } else if alt.chars().count() < h.min_alt_len
        || h.generic_alt_phrases.contains(&alt.to_lowercase())
    {
        AltTextClass::Weak
    } else {
        AltTextClass::Ok
    }
}

pub fn audit(images: &[ImageElement], h: &Heuristics) -> ImageAudit {
    let mut result = ImageAudit::default();

    for img in images {
        let class = classify(img.alt.as_deref(), h);
        match class {
            AltTextClass::Missing => result.counts.missing += 1,
            AltTextClass::Empty => result.counts.empty += 1,
            AltTextClass::Weak => result.counts.weak += 1,
            AltTextClass::Ok => {
                result.counts.ok += 1;
                continue;
            }
        }
        if result.issues.len() < h.max_image_issues {
            result.issues.push(ImageIssue {
                src: img.src.clone(),
                class,
            });
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn img(src: &str, alt: Option<&str>) -> ImageElement {
        ImageElement {
            src: src.into(),
            alt: alt.map(str::to_string),
        }
    }

    #[test]
    fn length_boundary() {
        let h = Heuristics::default();
        assert_eq!(classify(Some("ok"), &h), AltTextClass::Weak);
        assert_eq!(classify(Some("oka"), &h), AltTextClass::Ok);
    }

    #[test]
    fn missing_empty_and_generic() {
        let h = Heuristics::default();
        assert_eq!(classify(None, &h), AltTextClass::Missing);
        assert_eq!(classify(Some("   "), &h), AltTextClass::Empty);
        assert_eq!(classify(Some("Photo"), &h), AltTextClass::Weak);
        assert_eq!(classify(Some(" icon "), &h), AltTextClass::Weak);
        assert_eq!(classify(Some("Red widget on a desk"), &h), AltTextClass::Ok);
    }

    #[test]
    fn counts_and_offenders() {
        let h = Heuristics::default();
        let images = vec![
            img("/a.png", None),
            img("/b.png", Some("")),
            img("/c.png", Some("image")),
            img("/d.png", Some("Our team at the office")),
        ];
        let a = audit(&images, &h);
        assert_eq!(a.counts.missing, 1);
        assert_eq!(a.counts.empty, 1);
        assert_eq!(a.counts.weak, 1);
        assert_eq!(a.counts.ok, 1);
        let srcs: Vec<_> = a.issues.iter().map(|i| i.src.as_str()).collect();
        assert_eq!(srcs, vec!["/a.png", "/b.png", "/c.png"]);
    }

    #[test]
    fn offender_list_is_capped_but_counts_are_not() {
        let mut h = Heuristics::default();
        h.max_image_issues = 2;
        let images: Vec<_> = (0..5).map(|i| img(&format!("/{i}.png"), None)).collect();
        let a = audit(&images, &h);
        assert_eq!(a.counts.missing, 5);
        assert_eq!(a.issues.len(), 2);
    }
}
