//! A WebDAV (RFC 4918) protocol engine with CalDAV (RFC 4791) extensions,
//! layered over a pluggable storage backend.
//!
//! The engine answers the full WebDAV method set plus versioning, quota,
//! collection ordering, ACL gating and client-dialect compat, persisting
//! its side state (locks, dead properties, orderings, version history) as
//! JSON sidecar records under a reserved `_dav/` tree on the same backend.
//!
//! The HTTP transport is not part of this crate: the handler consumes an
//! `http::Request` with a collected byte body and produces an
//! `http::Response` with a buffered body.
//!
//! ```no_run
//! use dav_engine::{DavHandler, memfs::MemFs};
//!
//! let handler = DavHandler::builder()
//!     .filesystem(MemFs::new())
//!     .caldav(true)
//!     .build_handler();
//! ```

#[macro_use]
extern crate log;

mod acl;
mod compat;
mod conditional;
mod davhandler;
mod davheaders;
mod errors;
mod handle_caldav;
mod handle_copymove;
mod handle_delete;
mod handle_gethead;
mod handle_lock;
mod handle_mkcol;
mod handle_options;
mod handle_order;
mod handle_props;
mod handle_put;
mod handle_report;
mod handle_search;
mod multistatus;
mod quota;
mod util;
mod xmlscan;

pub mod body;
pub mod davpath;
pub mod dialect;
pub mod fs;
pub mod hooks;
pub mod ical;
pub mod ignore;
pub mod memfs;
pub mod statestore;

pub use crate::davhandler::{DavConfig, DavHandler};
pub use crate::handle_caldav::CalDavHooks;
pub use crate::compat::CompatHooks;
pub use crate::util::{DavMethod, DavMethodSet};
pub use crate::xmlscan::{CalendarFilter, ParamFilter, PropFilter, TextMatch, TimeRange};

pub(crate) use crate::errors::DavError;

pub(crate) type DavResult<T> = Result<T, DavError>;
