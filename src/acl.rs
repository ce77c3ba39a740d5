//! Hierarchical deny-wins access gate on dead properties.
//!
//! Deny rules live in the dead-property store along the ancestor chain:
//! `Z:acl-deny-<METHOD>=true` denies one method, `Z:acl-deny=<csv>` denies
//! by privilege, where GET/HEAD/PROPFIND map to `read` and everything else
//! to `write`. Any deny at any level wins; the default is allow.

use crate::davpath::DavPath;
use crate::statestore::DavStateStore;
use crate::util::DavMethod;

fn privilege(method: DavMethod) -> &'static str {
    match method {
        DavMethod::Get | DavMethod::Head | DavMethod::PropFind => "read",
        _ => "write",
    }
}

pub(crate) async fn acl_allows(store: &DavStateStore, path: &DavPath, method: DavMethod) -> bool {
    let method_key = format!("Z:acl-deny-{}", method.as_str());
    let privilege = privilege(method);
    for ancestor in path.ancestors() {
        let props = store.get_props(&ancestor).await;
        if props.get(&method_key).map(|v| v == "true").unwrap_or(false) {
            return false;
        }
        if let Some(csv) = props.get("Z:acl-deny") {
            if csv.split(',').any(|p| p.trim() == privilege) {
                return false;
            }
        }
    }
    true
}
