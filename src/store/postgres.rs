use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, postgres::PgPoolOptions, types::Json};
use uuid::Uuid;

use super::{CategoryStore, ExpenseStore, GroupStore, Store, UserStore};
use crate::{
    error::{AppError, AppResult},
    routes::{
        auth::model::User,
        category::model::Category,
        expense::model::{Expense, Receipt, Split},
        group::model::{Group, Participant},
    },
    split::SplitMethod,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

const USER_COLUMNS: &str = "id, username, email, phone, password_hash, device_tokens, \
     email_verified, phone_verified, created_at";

const GROUP_COLUMNS: &str = "id, name, description, image, currency, categories, owner_id, \
     participants, expense_ids, active, created_at, updated_at";

const EXPENSE_COLUMNS: &str = "id, group_id, title, amount, category, paid_by, split_method, \
     occurred_at, notes, receipt_original_url, receipt_optimized_url, splits, created_by, \
     active, created_at, updated_at";

const CATEGORY_COLUMNS: &str =
    "id, name, icon, is_system, created_by, active, created_at, updated_at";

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    phone: Option<String>,
    password_hash: Option<String>,
    device_tokens: Vec<String>,
    email_verified: bool,
    phone_verified: bool,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            phone: row.phone,
            password_hash: row.password_hash,
            device_tokens: row.device_tokens,
            email_verified: row.email_verified,
            phone_verified: row.phone_verified,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct GroupRow {
    id: Uuid,
    name: String,
    description: String,
    image: Option<String>,
    currency: String,
    categories: Vec<String>,
    owner_id: Uuid,
    participants: Json<Vec<Participant>>,
    expense_ids: Vec<Uuid>,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<GroupRow> for Group {
    fn from(row: GroupRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            image: row.image,
            currency: row.currency,
            categories: row.categories,
            owner: row.owner_id,
            participants: row.participants.0,
            expenses: row.expense_ids,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ExpenseRow {
    id: Uuid,
    group_id: Uuid,
    title: String,
    amount: f64,
    category: String,
    paid_by: Uuid,
    split_method: String,
    occurred_at: DateTime<Utc>,
    notes: String,
    receipt_original_url: Option<String>,
    receipt_optimized_url: Option<String>,
    splits: Json<Vec<Split>>,
    created_by: Uuid,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ExpenseRow> for Expense {
    type Error = AppError;

    fn try_from(row: ExpenseRow) -> Result<Self, Self::Error> {
        let split_method: SplitMethod = row
            .split_method
            .parse()
            .map_err(|e| AppError::internal(format!("corrupt expense {}: {}", row.id, e)))?;
        let receipt = match (row.receipt_original_url, row.receipt_optimized_url) {
            (Some(original_url), Some(optimized_url)) => Some(Receipt {
                original_url,
                optimized_url,
            }),
            _ => None,
        };

        Ok(Self {
            id: row.id,
            group: row.group_id,
            title: row.title,
            amount: row.amount,
            category: row.category,
            paid_by: row.paid_by,
            split_method,
            date: row.occurred_at,
            notes: row.notes,
            receipt,
            splits: row.splits.0,
            created_by: row.created_by,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    icon: String,
    is_system: bool,
    created_by: Option<Uuid>,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            icon: row.icon,
            is_system: row.is_system,
            created_by: row.created_by,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: &User) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, username, email, phone, password_hash, device_tokens,
                email_verified, phone_verified, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(&user.device_tokens)
        .bind(user.email_verified)
        .bind(user.phone_verified)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn find_users(&self, ids: &[Uuid]) -> AppResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn find_user_by_login(&self, identifier: &str) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE LOWER(username) = LOWER($1) OR LOWER(email) = LOWER($1) \
             LIMIT 1"
        ))
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_phone(&self, phone: &str) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE phone = $1"
        ))
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn update_user(&self, user: &User) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET username = $2, email = $3, phone = $4, password_hash = $5,
                device_tokens = $6, email_verified = $7, phone_verified = $8
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(&user.device_tokens)
        .bind(user.email_verified)
        .bind(user.phone_verified)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("User not found"));
        }
        Ok(())
    }
}

#[async_trait]
impl GroupStore for PgStore {
    async fn insert_group(&self, group: &Group) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO groups (
                id, name, description, image, currency, categories, owner_id,
                participants, expense_ids, active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(group.id)
        .bind(&group.name)
        .bind(&group.description)
        .bind(&group.image)
        .bind(&group.currency)
        .bind(&group.categories)
        .bind(group.owner)
        .bind(Json(&group.participants))
        .bind(&group.expenses)
        .bind(group.active)
        .bind(group.created_at)
        .bind(group.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_group(&self, id: Uuid) -> AppResult<Option<Group>> {
        let row = sqlx::query_as::<_, GroupRow>(&format!(
            "SELECT {GROUP_COLUMNS} FROM groups WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Group::from))
    }

    async fn groups_for_user(&self, user_id: Uuid) -> AppResult<Vec<Group>> {
        let membership = serde_json::json!([{ "user": user_id }]);
        let rows = sqlx::query_as::<_, GroupRow>(&format!(
            "SELECT {GROUP_COLUMNS} FROM groups WHERE participants @> $1 ORDER BY created_at DESC"
        ))
        .bind(Json(membership))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Group::from).collect())
    }

    async fn all_groups(&self) -> AppResult<Vec<Group>> {
        let rows = sqlx::query_as::<_, GroupRow>(&format!(
            "SELECT {GROUP_COLUMNS} FROM groups ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Group::from).collect())
    }

    async fn save_group(&self, group: &Group) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE groups
            SET name = $2, description = $3, image = $4, currency = $5, categories = $6,
                owner_id = $7, participants = $8, expense_ids = $9, active = $10,
                updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(group.id)
        .bind(&group.name)
        .bind(&group.description)
        .bind(&group.image)
        .bind(&group.currency)
        .bind(&group.categories)
        .bind(group.owner)
        .bind(Json(&group.participants))
        .bind(&group.expenses)
        .bind(group.active)
        .bind(group.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Group not found"));
        }
        Ok(())
    }
}

#[async_trait]
impl ExpenseStore for PgStore {
    async fn insert_expense_linked(&self, expense: &Expense) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO expenses (
                id, group_id, title, amount, category, paid_by, split_method, occurred_at,
                notes, receipt_original_url, receipt_optimized_url, splits, created_by,
                active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(expense.id)
        .bind(expense.group)
        .bind(&expense.title)
        .bind(expense.amount)
        .bind(&expense.category)
        .bind(expense.paid_by)
        .bind(expense.split_method.as_str())
        .bind(expense.date)
        .bind(&expense.notes)
        .bind(expense.receipt.as_ref().map(|r| r.original_url.as_str()))
        .bind(expense.receipt.as_ref().map(|r| r.optimized_url.as_str()))
        .bind(Json(&expense.splits))
        .bind(expense.created_by)
        .bind(expense.active)
        .bind(expense.created_at)
        .bind(expense.updated_at)
        .execute(&mut *tx)
        .await?;

        let linked = sqlx::query(
            r#"
            UPDATE groups
            SET expense_ids = array_append(expense_ids, $1), updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(expense.id)
        .bind(expense.group)
        .execute(&mut *tx)
        .await?;

        if linked.rows_affected() == 0 {
            return Err(AppError::not_found("Group not found"));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_expense(&self, id: Uuid) -> AppResult<Option<Expense>> {
        let row = sqlx::query_as::<_, ExpenseRow>(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Expense::try_from).transpose()
    }

    async fn expenses_for_group(&self, group_id: Uuid) -> AppResult<Vec<Expense>> {
        let rows = sqlx::query_as::<_, ExpenseRow>(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE group_id = $1 ORDER BY created_at"
        ))
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Expense::try_from).collect()
    }

    async fn save_expense(&self, expense: &Expense) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE expenses
            SET title = $2, amount = $3, category = $4, paid_by = $5, split_method = $6,
                occurred_at = $7, notes = $8, receipt_original_url = $9,
                receipt_optimized_url = $10, splits = $11, active = $12, updated_at = $13
            WHERE id = $1
            "#,
        )
        .bind(expense.id)
        .bind(&expense.title)
        .bind(expense.amount)
        .bind(&expense.category)
        .bind(expense.paid_by)
        .bind(expense.split_method.as_str())
        .bind(expense.date)
        .bind(&expense.notes)
        .bind(expense.receipt.as_ref().map(|r| r.original_url.as_str()))
        .bind(expense.receipt.as_ref().map(|r| r.optimized_url.as_str()))
        .bind(Json(&expense.splits))
        .bind(expense.active)
        .bind(expense.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Expense not found"));
        }
        Ok(())
    }

    async fn delete_expense_linked(&self, expense: &Expense) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE groups
            SET expense_ids = array_remove(expense_ids, $1), updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(expense.id)
        .bind(expense.group)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM expenses WHERE id = $1")
            .bind(expense.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl CategoryStore for PgStore {
    async fn insert_category(&self, category: &Category) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO categories (id, name, icon, is_system, created_by, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.icon)
        .bind(category.is_system)
        .bind(category.created_by)
        .bind(category.active)
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_category(&self, id: Uuid) -> AppResult<Option<Category>> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Category::from))
    }

    async fn system_categories(&self) -> AppResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE is_system"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn user_categories(&self, user_id: Uuid) -> AppResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE created_by = $1"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn save_category(&self, category: &Category) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE categories
            SET name = $2, icon = $3, active = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.icon)
        .bind(category.active)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Category not found"));
        }
        Ok(())
    }
}

impl Store for PgStore {
    fn backend_tag(&self) -> &'static str {
        "postgres"
    }
}
