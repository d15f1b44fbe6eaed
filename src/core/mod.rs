pub mod fallback;
pub mod providers;
