//! Text understanding without a model: canonical normalization, the curated
//! service/city synonym tables, intent word lists, and the static
//! `(service, city)` extractor built on them.

pub mod catalog;
pub mod extract;
pub mod interpret;
pub mod normalize;

pub use extract::extract_service_and_city;
pub use interpret::{interpret_yes_no, is_greeting, is_reset_keyword, normalize_button, normalize_city_input};
pub use normalize::normalize_for_matching;
