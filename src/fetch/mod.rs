pub mod collector;
pub mod error;
pub mod flatten;
pub mod page_fetcher;
