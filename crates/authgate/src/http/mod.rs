pub mod cookies;
pub mod urls;
