//! Database entities for the catalog
pub mod category;
pub mod product;
pub mod subcategory;

pub use category::{Entity as Category, Model as CategoryModel};
pub use product::{Entity as Product, Model as ProductModel};
pub use subcategory::{Entity as Subcategory, Model as SubcategoryModel};
