//! Domain services used by the HTTP handlers

pub mod categories;
pub mod products;
pub mod uploads;

pub use categories::CategoryService;
pub use products::ProductService;
pub use uploads::UploadStore;
