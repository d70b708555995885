use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CategoryStore, ExpenseStore, GroupStore, Store, UserStore};
use crate::{
    error::{AppError, AppResult},
    routes::{
        auth::model::User, category::model::Category, expense::model::Expense,
        group::model::Group,
    },
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    groups: HashMap<Uuid, Group>,
    expenses: HashMap<Uuid, Expense>,
    categories: HashMap<Uuid, Category>,
}

/// In-process store used for development runs without `DATABASE_URL` and
/// for tests. A single lock covers every table so linked writes are atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hard-deletes a user, leaving any participant entries pointing at it.
    pub async fn remove_user(&self, id: Uuid) {
        self.tables.write().await.users.remove(&id);
    }

    /// Drops an expense id from its group's list without touching the
    /// expense, the state a crash between two writes would leave behind.
    pub async fn unlink_expense(&self, group_id: Uuid, expense_id: Uuid) {
        if let Some(group) = self.tables.write().await.groups.get_mut(&group_id) {
            group.expenses.retain(|id| *id != expense_id);
        }
    }
}

fn duplicate(what: &str) -> AppError {
    AppError::bad_request(format!("{} is already registered", what))
}

fn check_unique(tables: &Tables, user: &User) -> AppResult<()> {
    for other in tables.users.values().filter(|u| u.id != user.id) {
        if other.username.eq_ignore_ascii_case(&user.username) {
            return Err(duplicate("Username"));
        }
        if other.email.eq_ignore_ascii_case(&user.email) {
            return Err(duplicate("Email"));
        }
        if user.phone.is_some() && other.phone == user.phone {
            return Err(duplicate("Phone number"));
        }
    }
    Ok(())
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: &User) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        check_unique(&tables, user)?;
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_users(&self, ids: &[Uuid]) -> AppResult<Vec<User>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.users.get(id).cloned())
            .collect())
    }

    async fn find_user_by_login(&self, identifier: &str) -> AppResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| {
                u.username.eq_ignore_ascii_case(identifier) || u.email.eq_ignore_ascii_case(identifier)
            })
            .cloned())
    }

    async fn find_user_by_phone(&self, phone: &str) -> AppResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.phone.as_deref() == Some(phone))
            .cloned())
    }

    async fn update_user(&self, user: &User) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user.id) {
            return Err(AppError::not_found("User not found"));
        }
        check_unique(&tables, user)?;
        tables.users.insert(user.id, user.clone());
        Ok(())
    }
}

#[async_trait]
impl GroupStore for MemoryStore {
    async fn insert_group(&self, group: &Group) -> AppResult<()> {
        self.tables
            .write()
            .await
            .groups
            .insert(group.id, group.clone());
        Ok(())
    }

    async fn find_group(&self, id: Uuid) -> AppResult<Option<Group>> {
        Ok(self.tables.read().await.groups.get(&id).cloned())
    }

    async fn groups_for_user(&self, user_id: Uuid) -> AppResult<Vec<Group>> {
        let tables = self.tables.read().await;
        Ok(tables
            .groups
            .values()
            .filter(|g| g.participants.iter().any(|p| p.user == Some(user_id)))
            .cloned()
            .collect())
    }

    async fn all_groups(&self) -> AppResult<Vec<Group>> {
        let tables = self.tables.read().await;
        let mut groups: Vec<Group> = tables.groups.values().cloned().collect();
        groups.sort_by_key(|g| g.created_at);
        Ok(groups)
    }

    async fn save_group(&self, group: &Group) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        match tables.groups.get_mut(&group.id) {
            Some(existing) => {
                *existing = group.clone();
                Ok(())
            }
            None => Err(AppError::not_found("Group not found")),
        }
    }
}

#[async_trait]
impl ExpenseStore for MemoryStore {
    async fn insert_expense_linked(&self, expense: &Expense) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let group = tables
            .groups
            .get_mut(&expense.group)
            .ok_or_else(|| AppError::not_found("Group not found"))?;
        group.expenses.push(expense.id);
        tables.expenses.insert(expense.id, expense.clone());
        Ok(())
    }

    async fn find_expense(&self, id: Uuid) -> AppResult<Option<Expense>> {
        Ok(self.tables.read().await.expenses.get(&id).cloned())
    }

    async fn expenses_for_group(&self, group_id: Uuid) -> AppResult<Vec<Expense>> {
        let tables = self.tables.read().await;
        let mut expenses: Vec<Expense> = tables
            .expenses
            .values()
            .filter(|e| e.group == group_id)
            .cloned()
            .collect();
        expenses.sort_by_key(|e| e.created_at);
        Ok(expenses)
    }

    async fn save_expense(&self, expense: &Expense) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        match tables.expenses.get_mut(&expense.id) {
            Some(existing) => {
                *existing = expense.clone();
                Ok(())
            }
            None => Err(AppError::not_found("Expense not found")),
        }
    }

    async fn delete_expense_linked(&self, expense: &Expense) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(group) = tables.groups.get_mut(&expense.group) {
            group.expenses.retain(|id| *id != expense.id);
        }
        tables.expenses.remove(&expense.id);
        Ok(())
    }
}

#[async_trait]
impl CategoryStore for MemoryStore {
    async fn insert_category(&self, category: &Category) -> AppResult<()> {
        self.tables
            .write()
            .await
            .categories
            .insert(category.id, category.clone());
        Ok(())
    }

    async fn find_category(&self, id: Uuid) -> AppResult<Option<Category>> {
        Ok(self.tables.read().await.categories.get(&id).cloned())
    }

    async fn system_categories(&self) -> AppResult<Vec<Category>> {
        let tables = self.tables.read().await;
        Ok(tables
            .categories
            .values()
            .filter(|c| c.is_system)
            .cloned()
            .collect())
    }

    async fn user_categories(&self, user_id: Uuid) -> AppResult<Vec<Category>> {
        let tables = self.tables.read().await;
        Ok(tables
            .categories
            .values()
            .filter(|c| c.created_by == Some(user_id))
            .cloned()
            .collect())
    }

    async fn save_category(&self, category: &Category) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        match tables.categories.get_mut(&category.id) {
            Some(existing) => {
                *existing = category.clone();
                Ok(())
            }
            None => Err(AppError::not_found("Category not found")),
        }
    }
}

impl Store for MemoryStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }
}
