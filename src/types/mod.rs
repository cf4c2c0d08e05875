pub mod fetch_request;
pub mod frequency;
pub mod reading;
