mod health;
mod redirect;

pub use health::health_handler;
pub use redirect::{public_redirect_handler, user_redirect_handler};
