//! Persistence seams.
//!
//! Entities are stored as whole documents: a save replaces the previous
//! version and concurrent writers to the same record are last-writer-wins.
//! The two `*_linked` expense operations are the exception and touch the
//! expense and its group's id list atomically.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::AppResult,
    routes::{
        auth::model::User, category::model::Category, expense::model::Expense,
        group::model::Group,
    },
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: &User) -> AppResult<()>;
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>>;
    /// Only the ids that exist are returned; order is unspecified.
    async fn find_users(&self, ids: &[Uuid]) -> AppResult<Vec<User>>;
    /// Case-insensitive match on username or email.
    async fn find_user_by_login(&self, identifier: &str) -> AppResult<Option<User>>;
    async fn find_user_by_phone(&self, phone: &str) -> AppResult<Option<User>>;
    async fn update_user(&self, user: &User) -> AppResult<()>;
}

#[async_trait]
pub trait GroupStore: Send + Sync {
    async fn insert_group(&self, group: &Group) -> AppResult<()>;
    async fn find_group(&self, id: Uuid) -> AppResult<Option<Group>>;
    /// Groups holding any participant entry for `user_id`, active or not.
    async fn groups_for_user(&self, user_id: Uuid) -> AppResult<Vec<Group>>;
    async fn all_groups(&self) -> AppResult<Vec<Group>>;
    async fn save_group(&self, group: &Group) -> AppResult<()>;
}

#[async_trait]
pub trait ExpenseStore: Send + Sync {
    /// Stores the expense and appends its id to the owning group's list.
    async fn insert_expense_linked(&self, expense: &Expense) -> AppResult<()>;
    async fn find_expense(&self, id: Uuid) -> AppResult<Option<Expense>>;
    /// Every expense whose back-reference points at `group_id`, in creation order.
    async fn expenses_for_group(&self, group_id: Uuid) -> AppResult<Vec<Expense>>;
    async fn save_expense(&self, expense: &Expense) -> AppResult<()>;
    /// Removes the id from the owning group's list and deletes the record.
    async fn delete_expense_linked(&self, expense: &Expense) -> AppResult<()>;
}

#[async_trait]
pub trait CategoryStore: Send + Sync {
    async fn insert_category(&self, category: &Category) -> AppResult<()>;
    async fn find_category(&self, id: Uuid) -> AppResult<Option<Category>>;
    async fn system_categories(&self) -> AppResult<Vec<Category>>;
    async fn user_categories(&self, user_id: Uuid) -> AppResult<Vec<Category>>;
    async fn save_category(&self, category: &Category) -> AppResult<()>;
}

pub trait Store: UserStore + GroupStore + ExpenseStore + CategoryStore {
    fn backend_tag(&self) -> &'static str;
}
