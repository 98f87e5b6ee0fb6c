pub mod catalog;
pub mod pagination;
pub mod payload;
pub mod selection;
pub mod voter;
