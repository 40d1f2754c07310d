pub mod registered;
pub mod rollup;
pub mod top_items;
