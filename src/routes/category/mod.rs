mod handler;
pub mod model;

pub use handler::{
    create_category, delete_category, list_categories, list_system_categories,
    setup_system_categories, update_category,
};
