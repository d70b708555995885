mod handler;
pub mod model;

pub use handler::{create_expense, delete_expense, get_expense, list_group_expenses, update_expense};
