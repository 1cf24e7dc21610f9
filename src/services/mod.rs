//! Service layer for business logic
//!
//! Short-code generation and the link workflows built on top of the
//! storage contract.

mod link_service;
mod shortcode;

pub use link_service::LinkService;
pub use shortcode::{ShortCodeGenerator, generate_random_code};
