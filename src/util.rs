use std::io::{Cursor, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use headers::Header;

use crate::errors::DavError;
use crate::DavResult;

/// HTTP/WebDAV methods understood by the handler.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
#[repr(u32)]
pub enum DavMethod {
    Head       = 0x00001,
    Get        = 0x00002,
    Put        = 0x00004,
    Options    = 0x00008,
    PropFind   = 0x00010,
    PropPatch  = 0x00020,
    MkCol      = 0x00040,
    Copy       = 0x00080,
    Move       = 0x00100,
    Delete     = 0x00200,
    Lock       = 0x00400,
    Unlock     = 0x00800,
    Report     = 0x01000,
    Search     = 0x02000,
    OrderPatch = 0x04000,
    Bind       = 0x08000,
    Unbind     = 0x10000,
    Rebind     = 0x20000,
    MkCalendar = 0x40000,
}

impl DavMethod {
    pub fn as_str(&self) -> &'static str {
        match *self {
            DavMethod::Head => "HEAD",
            DavMethod::Get => "GET",
            DavMethod::Put => "PUT",
            DavMethod::Options => "OPTIONS",
            DavMethod::PropFind => "PROPFIND",
            DavMethod::PropPatch => "PROPPATCH",
            DavMethod::MkCol => "MKCOL",
            DavMethod::Copy => "COPY",
            DavMethod::Move => "MOVE",
            DavMethod::Delete => "DELETE",
            DavMethod::Lock => "LOCK",
            DavMethod::Unlock => "UNLOCK",
            DavMethod::Report => "REPORT",
            DavMethod::Search => "SEARCH",
            DavMethod::OrderPatch => "ORDERPATCH",
            DavMethod::Bind => "BIND",
            DavMethod::Unbind => "UNBIND",
            DavMethod::Rebind => "REBIND",
            DavMethod::MkCalendar => "MKCALENDAR",
        }
    }

    /// Methods that change server state and are subject to lock preconditions.
    pub fn is_mutating(&self) -> bool {
        matches!(
            *self,
            DavMethod::Put
                | DavMethod::Delete
                | DavMethod::Move
                | DavMethod::Copy
                | DavMethod::PropPatch
                | DavMethod::MkCol
                | DavMethod::MkCalendar
                | DavMethod::Bind
                | DavMethod::Unbind
                | DavMethod::Rebind
                | DavMethod::OrderPatch
        )
    }
}

// translate method into our own enum that has webdav methods as well.
pub(crate) fn dav_method(m: &http::Method) -> DavResult<DavMethod> {
    let m = match *m {
        http::Method::HEAD => DavMethod::Head,
        http::Method::GET => DavMethod::Get,
        http::Method::PUT => DavMethod::Put,
        http::Method::DELETE => DavMethod::Delete,
        http::Method::OPTIONS => DavMethod::Options,
        _ => match m.as_str() {
            "PROPFIND" => DavMethod::PropFind,
            "PROPPATCH" => DavMethod::PropPatch,
            "MKCOL" => DavMethod::MkCol,
            "COPY" => DavMethod::Copy,
            "MOVE" => DavMethod::Move,
            "LOCK" => DavMethod::Lock,
            "UNLOCK" => DavMethod::Unlock,
            "REPORT" => DavMethod::Report,
            "SEARCH" => DavMethod::Search,
            "ORDERPATCH" => DavMethod::OrderPatch,
            "BIND" => DavMethod::Bind,
            "UNBIND" => DavMethod::Unbind,
            "REBIND" => DavMethod::Rebind,
            "MKCALENDAR" => DavMethod::MkCalendar,
            _ => {
                return Err(DavError::UnknownDavMethod);
            },
        },
    };
    Ok(m)
}

/// A set of allowed [`DavMethod`]s.
#[derive(Clone, Copy, Debug)]
pub struct DavMethodSet(u32);

impl DavMethodSet {
    /// New set, all methods allowed.
    pub fn all() -> DavMethodSet {
        DavMethodSet(0xffffffff)
    }

    /// New empty set.
    pub fn none() -> DavMethodSet {
        DavMethodSet(0)
    }

    /// Add a method.
    pub fn add(&mut self, m: DavMethod) -> &Self {
        self.0 |= m as u32;
        self
    }

    /// Remove a method.
    pub fn remove(&mut self, m: DavMethod) -> &Self {
        self.0 &= !(m as u32);
        self
    }

    /// Check if a method is in the set.
    pub fn contains(&self, m: DavMethod) -> bool {
        self.0 & (m as u32) > 0
    }
}

impl Default for DavMethodSet {
    fn default() -> Self {
        DavMethodSet::all()
    }
}

// methods listed in the Allow: header, in a stable order.
pub(crate) const ALL_METHODS: &[DavMethod] = &[
    DavMethod::Options,
    DavMethod::Get,
    DavMethod::Head,
    DavMethod::Put,
    DavMethod::Delete,
    DavMethod::PropFind,
    DavMethod::PropPatch,
    DavMethod::MkCol,
    DavMethod::Copy,
    DavMethod::Move,
    DavMethod::Lock,
    DavMethod::Unlock,
    DavMethod::Report,
    DavMethod::Search,
    DavMethod::OrderPatch,
    DavMethod::Bind,
    DavMethod::Unbind,
    DavMethod::Rebind,
];

pub(crate) fn systemtime_to_httpdate(t: SystemTime) -> String {
    let d = headers::Date::from(t);
    let mut v = Vec::new();
    d.encode(&mut v);
    v[0].to_str().unwrap_or("").to_owned()
}

pub(crate) fn systemtime_to_rfc3339(t: SystemTime) -> String {
    // 1996-12-19T16:39:57Z
    let dt: DateTime<Utc> = t.into();
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn systemtime_to_ms(t: SystemTime) -> u128 {
    t.duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or(0)
}

pub(crate) fn now_rfc3339() -> String {
    systemtime_to_rfc3339(SystemTime::now())
}

// A buffer that implements "Write".
#[derive(Clone)]
pub(crate) struct MemBuffer(Cursor<Vec<u8>>);

impl MemBuffer {
    pub fn new() -> MemBuffer {
        MemBuffer(Cursor::new(Vec::new()))
    }

    pub fn take(&mut self) -> Bytes {
        let buf = std::mem::take(self.0.get_mut());
        self.0.set_position(0);
        Bytes::from(buf)
    }
}

impl Write for MemBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
