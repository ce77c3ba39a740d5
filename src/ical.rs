//! Line-oriented iCalendar scanning and CalDAV filter evaluation.
//!
//! Only VEVENT and VTODO blocks are extracted. Time comparison is
//! lexicographic on the raw `YYYYMMDD[ThhmmssZ]` strings; recurrence and
//! timezone arithmetic are out of scope.

use std::collections::HashMap;

use crate::xmlscan::{CalendarFilter, PropFilter, TextMatch, TimeRange};

#[derive(Debug, Clone, Default)]
pub struct ICalProp {
    pub value:  String,
    pub params: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ICalComponent {
    /// `VEVENT` or `VTODO`.
    pub kind:  String,
    pub props: HashMap<String, ICalProp>,
}

impl ICalComponent {
    pub fn uid(&self) -> Option<&str> {
        self.props.get("UID").map(|p| p.value.as_str())
    }

    pub fn start(&self) -> Option<&str> {
        self.props.get("DTSTART").map(|p| p.value.as_str())
    }

    /// `DTEND`, or `DUE` for a VTODO without one.
    pub fn end(&self) -> Option<&str> {
        match self.props.get("DTEND") {
            Some(p) => Some(p.value.as_str()),
            None if self.kind == "VTODO" => self.props.get("DUE").map(|p| p.value.as_str()),
            None => None,
        }
    }
}

// RFC 5545 line unfolding: a continuation line starts with space or tab.
fn unfold(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in text.lines() {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        if raw.starts_with(' ') || raw.starts_with('\t') {
            if let Some(last) = lines.last_mut() {
                last.push_str(&raw[1..]);
                continue;
            }
        }
        lines.push(raw.to_string());
    }
    lines
}

fn parse_prop_line(line: &str) -> Option<(String, ICalProp)> {
    let colon = line.find(':')?;
    let (left, value) = line.split_at(colon);
    let value = value[1..].to_string();
    let mut parts = left.split(';');
    let name = parts.next()?.trim().to_uppercase();
    if name.is_empty() {
        return None;
    }
    let mut params = HashMap::new();
    for seg in parts {
        if let Some(eq) = seg.find('=') {
            params.insert(seg[..eq].trim().to_uppercase(), seg[eq + 1..].trim().to_string());
        }
    }
    Some((name, ICalProp { value, params }))
}

/// Scan a calendar blob for VEVENT/VTODO blocks.
pub fn parse_components(text: &str) -> Vec<ICalComponent> {
    let mut out = Vec::new();
    let mut current: Option<ICalComponent> = None;
    for line in unfold(text) {
        if let Some(kind) = line.strip_prefix("BEGIN:") {
            let kind = kind.trim().to_uppercase();
            if kind == "VEVENT" || kind == "VTODO" {
                current = Some(ICalComponent { kind, props: HashMap::new() });
            }
            continue;
        }
        if let Some(kind) = line.strip_prefix("END:") {
            let kind = kind.trim().to_uppercase();
            if let Some(comp) = current.take() {
                if comp.kind == kind {
                    out.push(comp);
                } else {
                    // unbalanced block; keep scanning inside it.
                    current = Some(comp);
                }
            }
            continue;
        }
        if let Some(comp) = current.as_mut() {
            if let Some((name, prop)) = parse_prop_line(&line) {
                comp.props.insert(name, prop);
            }
        }
    }
    out
}

/// Overlap rule: `end > window.start && start < window.end`, with missing
/// bounds treated as open-ended. Comparison is lexicographic.
pub fn overlaps(start: Option<&str>, end: Option<&str>, window: &TimeRange) -> bool {
    if let (Some(ws), Some(e)) = (window.start.as_deref(), end) {
        if e <= ws {
            return false;
        }
    }
    if let (Some(we), Some(s)) = (window.end.as_deref(), start) {
        if s >= we {
            return false;
        }
    }
    true
}

/// Contains-semantics text match under the requested collation.
pub fn text_matches(value: &str, tm: &TextMatch) -> bool {
    let hit = match tm.collation.as_str() {
        "i;octet" => value.contains(&tm.text),
        _ => value.to_lowercase().contains(&tm.text.to_lowercase()),
    };
    if tm.negate {
        !hit
    } else {
        hit
    }
}

fn prop_filter_matches(comp: &ICalComponent, pf: &PropFilter) -> bool {
    let prop = comp.props.get(&pf.name.to_uppercase());
    if pf.is_not_defined {
        return prop.is_none();
    }
    let prop = match prop {
        Some(p) => p,
        None => return false,
    };
    if let Some(tm) = &pf.text_match {
        if !text_matches(&prop.value, tm) {
            return false;
        }
    }
    for pam in &pf.param_filters {
        let param = prop.params.get(&pam.name.to_uppercase());
        if pam.is_not_defined {
            if param.is_some() {
                return false;
            }
            continue;
        }
        let param = match param {
            Some(v) => v,
            None => return false,
        };
        if let Some(tm) = &pam.text_match {
            if !text_matches(param, tm) {
                return false;
            }
        }
    }
    true
}

/// Apply a calendar-query filter to one parsed component.
pub fn component_matches(comp: &ICalComponent, filter: &CalendarFilter) -> bool {
    if let Some(kind) = filter.component.as_deref() {
        if comp.kind != kind {
            return false;
        }
    }
    if let Some(tr) = &filter.time_range {
        if !overlaps(comp.start(), comp.end(), tr) {
            return false;
        }
    }
    filter.prop_filters.iter().all(|pf| prop_filter_matches(comp, pf))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:e1\r\nSUMMARY:Board meeting\r\n ... continued\r\nDTSTART:20250101T120000Z\r\nDTEND:20250101T130000Z\r\nATTENDEE;ROLE=CHAIR:mailto:a@example.com\r\nEND:VEVENT\r\nBEGIN:VTODO\r\nUID:t1\r\nDUE:20250301T000000Z\r\nEND:VTODO\r\nEND:VCALENDAR\r\n";

    #[test]
    fn test_parse_components() {
        let comps = parse_components(SAMPLE);
        assert_eq!(comps.len(), 2);
        assert_eq!(comps[0].kind, "VEVENT");
        assert_eq!(comps[0].uid(), Some("e1"));
        assert_eq!(comps[0].props["SUMMARY"].value, "Board meeting... continued");
        assert_eq!(comps[0].props["ATTENDEE"].params["ROLE"], "CHAIR");
        assert_eq!(comps[1].kind, "VTODO");
        assert_eq!(comps[1].end(), Some("20250301T000000Z"));
    }

    #[test]
    fn test_overlaps() {
        let w = TimeRange {
            start: Some("20250101T000000Z".into()),
            end:   Some("20250131T235959Z".into()),
        };
        assert!(overlaps(Some("20250101T120000Z"), Some("20250101T130000Z"), &w));
        assert!(!overlaps(Some("20260101T120000Z"), Some("20260101T130000Z"), &w));
        assert!(!overlaps(Some("20241201T000000Z"), Some("20241231T000000Z"), &w));
        // a missing event end is open-ended
        assert!(overlaps(Some("20250115T000000Z"), None, &w));
        // open-ended window
        assert!(overlaps(Some("20990101T000000Z"), None, &TimeRange::default()));
    }

    #[test]
    fn test_text_collations() {
        let tm = TextMatch { text: "board".into(), collation: "i;ascii-casemap".into(), negate: false };
        assert!(text_matches("Board meeting", &tm));
        let tm = TextMatch { text: "board".into(), collation: "i;octet".into(), negate: false };
        assert!(!text_matches("Board meeting", &tm));
        let tm = TextMatch { text: "board".into(), collation: "i;ascii-casemap".into(), negate: true };
        assert!(!text_matches("Board meeting", &tm));
    }
}
