//! Central builders for every persisted key, so the layout lives in one place.
//!
//! Layout:
//! - `flow:{phone}`                conversation flow (TTL = FLOW_TTL_SECONDS)
//! - `availability:{req_id}`      scatter/gather state (TTL 300s)
//! - `session:{phone}`            capped turn list
//! - `warnings:{phone}`           moderator strike counter
//! - `ban:{phone}`                moderator ban marker
//! - `customer_profile:{phone}`   customer profile cache (TTL 300s)
//! - `prov_profile_cache:{phone}` provider profile cache (TTL 300s)

pub const SESSION_PREFIX: &str = "session:";

pub fn flow(phone: &str) -> String {
    format!("flow:{}", phone)
}

pub fn availability(req_id: &str) -> String {
    format!("availability:{}", req_id)
}

pub fn session(phone: &str) -> String {
    format!("{}{}", SESSION_PREFIX, phone)
}

pub fn warnings(phone: &str) -> String {
    format!("warnings:{}", phone)
}

pub fn ban(phone: &str) -> String {
    format!("ban:{}", phone)
}

pub fn customer_profile(phone: &str) -> String {
    format!("customer_profile:{}", phone)
}

pub fn provider_profile(phone: &str) -> String {
    format!("prov_profile_cache:{}", phone)
}
