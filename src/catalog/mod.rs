//! Catalog helpers shared by the public pages and the admin dashboard

mod pagination;
mod slug;

pub use pagination::{Pagination, DEFAULT_PER_PAGE, MAX_PER_PAGE};
pub use slug::slugify;
