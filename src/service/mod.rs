//! Generic CRUD over a store session, and request decoding.

mod crud;
mod validation;
pub use crud::CrudService;
pub use validation::{check_type, RequestValidator};
