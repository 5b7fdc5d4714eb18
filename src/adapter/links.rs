//! `tel:` and `sms:` link interception.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use url::Url;

/// Levels walked up from the clicked element looking for an `href`.
const MAX_ANCESTOR_LEVELS: usize = 2;

/// Everything that is not part of a dialable number.
static NON_DIALABLE: Lazy<Option<Regex>> = Lazy::new(|| match Regex::new(r"[^\d+*-]") {
    Ok(regex) => Some(regex),
    Err(e) => {
        log::error!("Invalid dialable-number pattern: {}", e);
        None
    }
});

/// The parts of a DOM element the click handler looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DomElement {
    #[serde(default, alias = "tagName")]
    pub tag: String,
    #[serde(default)]
    pub href: Option<String>,
}

impl DomElement {
    pub fn anchor(href: impl Into<String>) -> Self {
        Self {
            tag: "a".to_string(),
            href: Some(href.into()),
        }
    }

    pub fn element(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            href: None,
        }
    }

    fn has_href(&self) -> bool {
        self.href.as_deref().is_some_and(|href| !href.is_empty())
    }

    fn is_anchor(&self) -> bool {
        self.tag.eq_ignore_ascii_case("a")
    }
}

/// What a click on a phone link asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkIntent {
    Call { phone_number: String },
    Sms { phone_number: String, text: Option<String> },
}

/// Strip everything but digits, `+`, `*` and `-`.
pub fn sanitize_phone_number(raw: &str) -> String {
    match NON_DIALABLE.as_ref() {
        Some(pattern) => pattern.replace_all(raw, "").into_owned(),
        None => raw
            .chars()
            .filter(|c| c.is_ascii_digit() || matches!(c, '+' | '*' | '-'))
            .collect(),
    }
}

/// Resolve a click given the clicked element followed by its ancestors,
/// nearest first.
pub fn resolve_click(path: &[DomElement]) -> Option<LinkIntent> {
    let target = path
        .iter()
        .take(MAX_ANCESTOR_LEVELS + 1)
        .find(|element| element.has_href())?;
    if !target.is_anchor() {
        return None;
    }
    let href = target.href.as_deref()?;

    if href.starts_with("sms:") {
        let phone_number = sanitize_phone_number(href.split('?').next().unwrap_or_default());
        Some(LinkIntent::Sms {
            phone_number,
            text: sms_text(href),
        })
    } else if href.starts_with("tel:") {
        Some(LinkIntent::Call {
            phone_number: sanitize_phone_number(href),
        })
    } else {
        None
    }
}

/// Message text of an `sms:` link: `body`, or else `text`.
fn sms_text(href: &str) -> Option<String> {
    let url = match Url::parse(href) {
        Ok(url) => url,
        Err(e) => {
            log::debug!("Unparseable sms link {}: {}", href, e);
            return None;
        }
    };

    let mut body = None;
    let mut text = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "body" if body.is_none() => body = Some(value.into_owned()),
            "text" if text.is_none() => text = Some(value.into_owned()),
            _ => {}
        }
    }
    body.filter(|b| !b.is_empty())
        .or(text.filter(|t| !t.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tel_link_on_anchor() {
        let intent = resolve_click(&[DomElement::anchor("tel:+12025551234")]);
        assert_eq!(
            intent,
            Some(LinkIntent::Call {
                phone_number: "+12025551234".to_string()
            })
        );
    }

    #[test]
    fn test_tel_link_strips_formatting() {
        let intent = resolve_click(&[DomElement::anchor("tel:+1 (202) 555-1234")]);
        assert_eq!(
            intent,
            Some(LinkIntent::Call {
                phone_number: "+1202555-1234".to_string()
            })
        );
    }

    #[test]
    fn test_click_inside_anchor_walks_up_two_levels() {
        let path = [
            DomElement::element("span"),
            DomElement::element("b"),
            DomElement::anchor("tel:911"),
        ];
        assert!(matches!(resolve_click(&path), Some(LinkIntent::Call { .. })));

        let too_deep = [
            DomElement::element("span"),
            DomElement::element("b"),
            DomElement::element("i"),
            DomElement::anchor("tel:911"),
        ];
        assert_eq!(resolve_click(&too_deep), None);
    }

    #[test]
    fn test_sms_link_prefers_body() {
        let intent = resolve_click(&[DomElement::anchor("sms:+15551234567?text=hi&body=hello%20there")]);
        assert_eq!(
            intent,
            Some(LinkIntent::Sms {
                phone_number: "+15551234567".to_string(),
                text: Some("hello there".to_string()),
            })
        );
    }

    #[test]
    fn test_sms_link_falls_back_to_text() {
        let intent = resolve_click(&[DomElement::anchor("sms:5551234567?text=ping")]);
        assert_eq!(
            intent,
            Some(LinkIntent::Sms {
                phone_number: "5551234567".to_string(),
                text: Some("ping".to_string()),
            })
        );

        let intent = resolve_click(&[DomElement::anchor("sms:5551234567")]);
        assert!(matches!(intent, Some(LinkIntent::Sms { text: None, .. })));
    }

    #[test]
    fn test_other_links_are_ignored() {
        assert_eq!(resolve_click(&[DomElement::anchor("https://example.com")]), None);
        assert_eq!(resolve_click(&[DomElement::element("div")]), None);
        assert_eq!(resolve_click(&[]), None);

        let not_anchor = DomElement {
            tag: "area".to_string(),
            href: Some("tel:123".to_string()),
        };
        assert_eq!(resolve_click(&[not_anchor]), None);
    }
}
