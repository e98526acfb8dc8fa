pub mod ipopt;
pub mod newton;
