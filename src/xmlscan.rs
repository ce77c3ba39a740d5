//! Targeted scanners for the constrained XML subset used by request bodies.
//!
//! PROPFIND, PROPPATCH, extended MKCOL, ORDERPATCH, SEARCH and REPORT carry
//! small, well-known shapes; these extractors pick out exactly the elements
//! the handlers need and ignore everything else. Unknown elements never
//! cause an error.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // an opening (or self-closing) tag, capturing the qualified name.
    static ref OPEN_TAG: Regex =
        Regex::new(r#"<([A-Za-z][\w.-]*(?::[A-Za-z][\w.-]*)?)((?:\s[^<>]*?)?)(/?)>"#).unwrap();
    static ref ATTR: Regex = Regex::new(r#"([A-Za-z][\w.-]*)\s*=\s*"([^"]*)""#).unwrap();
}

fn local_matches(qname: &str, local: &str) -> bool {
    qname.rsplit(':').next() == Some(local)
}

/// Decode the five predefined XML entities.
pub(crate) fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

// One scanned element: qualified name, attribute blob, inner content
// ("" for self-closing), and the byte range it spans.
struct ScannedElem<'t> {
    qname: &'t str,
    attrs: &'t str,
    inner: &'t str,
    end:   usize,
}

// scan for the next element with the given local name, starting at `from`.
fn next_elem<'t>(body: &'t str, local: &str, from: usize) -> Option<ScannedElem<'t>> {
    let mut pos = from;
    while let Some(caps) = OPEN_TAG.captures(&body[pos..]) {
        let mat = caps.get(0).unwrap();
        let qname = caps.get(1).unwrap().as_str();
        let attrs = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        let selfclosing = !caps.get(3).unwrap().as_str().is_empty();
        let open_end = pos + mat.end();
        if !local_matches(qname, local) {
            pos = open_end;
            continue;
        }
        if selfclosing {
            return Some(ScannedElem { qname, attrs, inner: "", end: open_end });
        }
        let close = format!("</{}>", qname);
        match body[open_end..].find(&close) {
            Some(rel) => {
                let inner = &body[open_end..open_end + rel];
                return Some(ScannedElem {
                    qname,
                    attrs,
                    inner,
                    end: open_end + rel + close.len(),
                });
            },
            None => {
                // unbalanced; treat as empty and move on.
                return Some(ScannedElem { qname, attrs, inner: "", end: open_end });
            },
        }
    }
    None
}

// all elements with the given local name, at any depth.
fn elements<'t>(body: &'t str, local: &str) -> Vec<ScannedElem<'t>> {
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some(e) = next_elem(body, local, pos) {
        pos = e.end;
        out.push(e);
    }
    out
}

fn first_inner<'t>(body: &'t str, local: &str) -> Option<&'t str> {
    next_elem(body, local, 0).map(|e| e.inner)
}

fn has_elem(body: &str, local: &str) -> bool {
    next_elem(body, local, 0).is_some()
}

fn attr_value(attrs: &str, name: &str) -> Option<String> {
    for caps in ATTR.captures_iter(attrs) {
        if &caps[1] == name {
            return Some(unescape_xml(&caps[2]));
        }
    }
    None
}

/// Text content of every element with the given local name.
pub(crate) fn text_elements(body: &str, local: &str) -> Vec<String> {
    elements(body, local)
        .into_iter()
        .map(|e| unescape_xml(e.inner.trim()))
        .collect()
}

// immediate child elements of a block: (qualified name, unescaped text).
fn child_entries(block: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < block.len() {
        let caps = match OPEN_TAG.captures(&block[pos..]) {
            Some(c) => c,
            None => break,
        };
        let mat = caps.get(0).unwrap();
        let qname = caps.get(1).unwrap().as_str().to_string();
        let selfclosing = !caps.get(3).unwrap().as_str().is_empty();
        let open_end = pos + mat.end();
        if selfclosing {
            out.push((qname, String::new()));
            pos = open_end;
            continue;
        }
        let close = format!("</{}>", qname);
        match block[open_end..].find(&close) {
            Some(rel) => {
                let inner = &block[open_end..open_end + rel];
                out.push((qname.clone(), unescape_xml(inner.trim())));
                pos = open_end + rel + close.len();
            },
            None => {
                out.push((qname, String::new()));
                pos = open_end;
            },
        }
    }
    out
}

// ----- PROPFIND -----

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PropfindMode {
    Allprop,
    Propname,
    Prop(Vec<String>),
}

pub(crate) fn propfind_mode(body: &[u8]) -> PropfindMode {
    let text = match std::str::from_utf8(body) {
        Ok(t) if !t.trim().is_empty() => t,
        _ => return PropfindMode::Allprop,
    };
    if has_elem(text, "propname") {
        return PropfindMode::Propname;
    }
    if has_elem(text, "allprop") {
        return PropfindMode::Allprop;
    }
    if let Some(inner) = first_inner(text, "prop") {
        let keys = child_entries(inner).into_iter().map(|(name, _)| name).collect();
        return PropfindMode::Prop(keys);
    }
    PropfindMode::Allprop
}

// ----- PROPPATCH / extended MKCOL -----

/// `set/prop` pairs and `remove/prop` names from a PROPPATCH body.
pub(crate) fn proppatch_ops(body: &[u8]) -> (Vec<(String, String)>, Vec<String>) {
    let text = match std::str::from_utf8(body) {
        Ok(t) => t,
        Err(_) => return (Vec::new(), Vec::new()),
    };
    let mut sets = Vec::new();
    for set_block in elements(text, "set") {
        if let Some(prop) = first_inner(set_block.inner, "prop") {
            sets.extend(child_entries(prop));
        }
    }
    let mut removes = Vec::new();
    for rm_block in elements(text, "remove") {
        if let Some(prop) = first_inner(rm_block.inner, "prop") {
            removes.extend(child_entries(prop).into_iter().map(|(name, _)| name));
        }
    }
    (sets, removes)
}

/// Key/value pairs from an extended MKCOL (or MKCALENDAR) body.
pub(crate) fn mkcol_props(body: &[u8]) -> Vec<(String, String)> {
    proppatch_ops(body).0
}

// ----- ORDERPATCH -----

/// `order-member/segment` sequences, or `names/name` as a fallback.
pub(crate) fn orderpatch_names(body: &[u8]) -> Vec<String> {
    let text = match std::str::from_utf8(body) {
        Ok(t) => t,
        Err(_) => return Vec::new(),
    };
    let segments = text_elements(text, "segment");
    let names = if segments.is_empty() {
        text_elements(text, "name")
    } else {
        segments
    };
    let mut out: Vec<String> = Vec::new();
    for n in names {
        if !n.is_empty() && !out.contains(&n) {
            out.push(n);
        }
    }
    out
}

// ----- SEARCH -----

pub(crate) fn search_contains(body: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(body).ok()?;
    text_elements(text, "contains").into_iter().find(|s| !s.is_empty())
}

// ----- REPORT -----

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ReportKind {
    VersionTree,
    CalendarQuery,
    CalendarMultiget,
    FreeBusyQuery,
    Unknown,
}

pub(crate) fn report_kind(body: &[u8]) -> ReportKind {
    let text = match std::str::from_utf8(body) {
        Ok(t) => t,
        Err(_) => return ReportKind::Unknown,
    };
    if has_elem(text, "version-tree") || has_elem(text, "version-history") {
        ReportKind::VersionTree
    } else if has_elem(text, "calendar-query") {
        ReportKind::CalendarQuery
    } else if has_elem(text, "calendar-multiget") {
        ReportKind::CalendarMultiget
    } else if has_elem(text, "free-busy-query") {
        ReportKind::FreeBusyQuery
    } else {
        ReportKind::Unknown
    }
}

pub(crate) fn multiget_hrefs(body: &[u8]) -> Vec<String> {
    match std::str::from_utf8(body) {
        Ok(t) => text_elements(t, "href").into_iter().filter(|h| !h.is_empty()).collect(),
        Err(_) => Vec::new(),
    }
}

// ----- CalDAV filters -----

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeRange {
    pub start: Option<String>,
    pub end:   Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextMatch {
    pub text:      String,
    pub collation: String,
    pub negate:    bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamFilter {
    pub name:           String,
    pub is_not_defined: bool,
    pub text_match:     Option<TextMatch>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropFilter {
    pub name:           String,
    pub is_not_defined: bool,
    pub text_match:     Option<TextMatch>,
    pub param_filters:  Vec<ParamFilter>,
}

/// A flattened `filter` element of a calendar-query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalendarFilter {
    /// Component kind to match (`VEVENT` / `VTODO`); `None` matches any.
    pub component:     Option<String>,
    pub time_range:    Option<TimeRange>,
    pub prop_filters:  Vec<PropFilter>,
    /// The query used the nested `VCALENDAR > COMPONENT` comp-filter shape.
    pub strict_nested: bool,
}

fn parse_text_match(e: &ScannedElem) -> TextMatch {
    TextMatch {
        text:      unescape_xml(e.inner.trim()),
        collation: attr_value(e.attrs, "collation").unwrap_or_else(|| "i;ascii-casemap".to_string()),
        negate:    attr_value(e.attrs, "negate-condition").as_deref() == Some("yes"),
    }
}

fn parse_param_filter(e: &ScannedElem) -> Option<ParamFilter> {
    Some(ParamFilter {
        name:           attr_value(e.attrs, "name")?,
        is_not_defined: has_elem(e.inner, "is-not-defined"),
        text_match:     next_elem(e.inner, "text-match", 0).map(|tm| parse_text_match(&tm)),
    })
}

fn parse_prop_filter(e: &ScannedElem) -> Option<PropFilter> {
    Some(PropFilter {
        name:           attr_value(e.attrs, "name")?,
        is_not_defined: {
            // is-not-defined directly on the prop-filter, not inside a
            // nested param-filter.
            let mut inner = e.inner.to_string();
            for pf in elements(e.inner, "param-filter") {
                if !pf.inner.is_empty() {
                    inner = inner.replacen(pf.inner, "", 1);
                }
            }
            has_elem(&inner, "is-not-defined")
        },
        text_match:     next_elem(e.inner, "text-match", 0).map(|tm| parse_text_match(&tm)),
        param_filters:  elements(e.inner, "param-filter")
            .iter()
            .filter_map(parse_param_filter)
            .collect(),
    })
}

/// Extract the comp/prop/param/time filter structure of a calendar-query.
pub(crate) fn calendar_filter(body: &[u8]) -> CalendarFilter {
    let text = match std::str::from_utf8(body) {
        Ok(t) => t,
        Err(_) => return CalendarFilter::default(),
    };
    let mut filter = CalendarFilter::default();

    let comp_names: Vec<String> = {
        let mut v = Vec::new();
        let mut pos = 0;
        // comp-filters may nest; scan opening tags only, in document order.
        while let Some(caps) = OPEN_TAG.captures(&text[pos..]) {
            let mat = caps.get(0).unwrap();
            let qname = caps.get(1).unwrap().as_str();
            let attrs = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            pos += mat.end();
            if local_matches(qname, "comp-filter") {
                if let Some(name) = attr_value(attrs, "name") {
                    v.push(name);
                }
            }
        }
        v
    };

    match comp_names.first() {
        Some(outer) if outer == "VCALENDAR" => {
            if let Some(nested) = comp_names.get(1) {
                filter.component = Some(nested.clone());
                filter.strict_nested = true;
            }
        },
        Some(outer) => {
            filter.component = Some(outer.clone());
        },
        None => {},
    }

    if let Some(tr) = next_elem(text, "time-range", 0) {
        filter.time_range = Some(TimeRange {
            start: attr_value(tr.attrs, "start"),
            end:   attr_value(tr.attrs, "end"),
        });
    }

    filter.prop_filters = elements(text, "prop-filter")
        .iter()
        .filter_map(parse_prop_filter)
        .collect();

    filter
}

pub(crate) fn freebusy_range(body: &[u8]) -> Option<TimeRange> {
    let text = std::str::from_utf8(body).ok()?;
    next_elem(text, "time-range", 0).map(|tr| TimeRange {
        start: attr_value(tr.attrs, "start"),
        end:   attr_value(tr.attrs, "end"),
    })
}
