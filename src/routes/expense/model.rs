use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    AppState,
    error::{AppError, AppResult},
    events::{GroupEvent, GroupEventKind},
    routes::{
        auth::model::UserSummary,
        category::model::Category,
        group::{guard::load_group_for_member, model::Group},
    },
    split::{SplitMethod, compute_splits},
    validation::Validator,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Split {
    pub user: Uuid,
    pub amount: f64,
    pub paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Receipt {
    pub original_url: String,
    pub optimized_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Expense {
    pub id: Uuid,
    pub group: Uuid,
    pub title: String,
    pub amount: f64,
    pub category: String,
    pub paid_by: Uuid,
    pub split_method: SplitMethod,
    pub date: DateTime<Utc>,
    pub notes: String,
    pub receipt: Option<Receipt>,
    pub splits: Vec<Split>,
    pub created_by: Uuid,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateExpenseRequest {
    pub group_id: Uuid,
    pub title: String,
    pub amount: f64,
    pub paid_by: Option<Uuid>,
    pub category: Option<String>,
    #[serde(default)]
    pub split_method: SplitMethod,
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: String,
    /// Base64 image, optionally as a `data:` URL.
    pub receipt_image: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateExpenseRequest {
    pub title: Option<String>,
    pub amount: Option<f64>,
    pub paid_by: Option<Uuid>,
    pub category: Option<String>,
    pub split_method: Option<SplitMethod>,
    pub date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SplitView {
    pub user: UserSummary,
    pub amount: f64,
    pub paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ExpenseView {
    pub id: Uuid,
    pub group: Uuid,
    pub title: String,
    pub amount: f64,
    pub category: String,
    pub paid_by: UserSummary,
    pub split_method: SplitMethod,
    /// True when the requested split method is not implemented and the
    /// amount was divided equally instead.
    pub split_fallback: bool,
    pub date: DateTime<Utc>,
    pub notes: String,
    pub receipt: Option<Receipt>,
    pub splits: Vec<SplitView>,
    pub created_by: UserSummary,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn validate_amount(validator: &mut Validator, amount: f64) {
    validator.check(
        amount.is_finite() && amount > 0.0,
        "amount",
        "Amount must be a positive number",
    );
}

fn split_lines(group: &Group, amount: f64, method: SplitMethod) -> AppResult<Vec<Split>> {
    let computation = compute_splits(amount, &group.active_participants(), method)?;
    if let Some(requested) = computation.fallback_from {
        tracing::warn!(
            group_id = %group.id,
            method = %requested,
            "split method not implemented, dividing equally"
        );
    }
    Ok(computation
        .lines
        .into_iter()
        .map(|line| Split {
            user: line.user,
            amount: line.amount,
            paid: false,
            paid_at: None,
        })
        .collect())
}

impl Expense {
    pub async fn create(
        state: &AppState,
        caller: Uuid,
        req: CreateExpenseRequest,
    ) -> AppResult<Self> {
        let mut validator = Validator::new();
        validator
            .required(&req.title, "title", 100)
            .max_len(&req.notes, "notes", 1000);
        validate_amount(&mut validator, req.amount);
        validator.result()?;

        let group = load_group_for_member(state, req.group_id, caller).await?;

        let paid_by = req.paid_by.unwrap_or(caller);
        if !group.is_active_participant(paid_by) {
            return Err(AppError::bad_request(
                "Payer must be an active participant of the group",
            ));
        }

        let category = Category::resolve(state, caller, req.category.as_deref()).await?;
        let splits = split_lines(&group, req.amount, req.split_method)?;

        let receipt = match req.receipt_image.as_deref() {
            Some(encoded) => match state.receipts.process(encoded).await {
                Ok(receipt) => Some(receipt),
                Err(e) => {
                    tracing::warn!(group_id = %group.id, error = %e, "receipt processing failed, continuing without receipt");
                    None
                }
            },
            None => None,
        };

        let now = Utc::now();
        let expense = Expense {
            id: Uuid::new_v4(),
            group: group.id,
            title: req.title.trim().to_string(),
            amount: req.amount,
            category,
            paid_by,
            split_method: req.split_method,
            date: req.date.unwrap_or(now),
            notes: req.notes.trim().to_string(),
            receipt,
            splits,
            created_by: caller,
            active: true,
            created_at: now,
            updated_at: now,
        };
        state.store.insert_expense_linked(&expense).await?;

        tracing::info!(
            expense_id = %expense.id,
            group_id = %expense.group,
            amount = expense.amount,
            "created expense"
        );
        state.events.publish(GroupEvent::new(
            GroupEventKind::ExpenseAdded,
            &expense,
        ));
        Ok(expense)
    }

    pub async fn list_for_group(
        state: &AppState,
        caller: Uuid,
        group_id: Uuid,
    ) -> AppResult<Vec<Self>> {
        load_group_for_member(state, group_id, caller).await?;

        let mut expenses = state.store.expenses_for_group(group_id).await?;
        expenses.retain(|e| e.active);
        expenses.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(expenses)
    }

    pub async fn find_for_member(
        state: &AppState,
        caller: Uuid,
        expense_id: Uuid,
    ) -> AppResult<(Self, Group)> {
        let expense = state
            .store
            .find_expense(expense_id)
            .await?
            .filter(|e| e.active)
            .ok_or_else(|| AppError::not_found("Expense not found"))?;
        let group = load_group_for_member(state, expense.group, caller).await?;
        Ok((expense, group))
    }

    pub async fn update(
        state: &AppState,
        caller: Uuid,
        expense_id: Uuid,
        req: UpdateExpenseRequest,
    ) -> AppResult<Self> {
        let (mut expense, group) = Self::find_for_member(state, caller, expense_id).await?;

        if caller != expense.created_by && caller != expense.paid_by {
            return Err(AppError::forbidden(
                "Only the creator or the payer can edit this expense",
            ));
        }

        let mut validator = Validator::new();
        if let Some(title) = &req.title {
            validator.required(title, "title", 100);
        }
        if let Some(notes) = &req.notes {
            validator.max_len(notes, "notes", 1000);
        }
        if let Some(amount) = req.amount {
            validate_amount(&mut validator, amount);
        }
        validator.result()?;

        if let Some(paid_by) = req.paid_by {
            if !group.is_active_participant(paid_by) {
                return Err(AppError::bad_request(
                    "Payer must be an active participant of the group",
                ));
            }
            expense.paid_by = paid_by;
        }

        let amount_changed = req.amount.is_some_and(|a| a != expense.amount);
        let method_changed = req.split_method.is_some_and(|m| m != expense.split_method);

        if let Some(title) = req.title {
            expense.title = title.trim().to_string();
        }
        if let Some(amount) = req.amount {
            expense.amount = amount;
        }
        if let Some(method) = req.split_method {
            expense.split_method = method;
        }
        if req.category.is_some() {
            expense.category = Category::resolve(state, caller, req.category.as_deref()).await?;
        }
        if let Some(date) = req.date {
            expense.date = date;
        }
        if let Some(notes) = req.notes {
            expense.notes = notes.trim().to_string();
        }

        // Recomputed against today's membership, not the one at creation.
        if amount_changed || method_changed {
            expense.splits = split_lines(&group, expense.amount, expense.split_method)?;
        }

        expense.updated_at = Utc::now();
        state.store.save_expense(&expense).await?;

        state.events.publish(GroupEvent::new(
            GroupEventKind::ExpenseUpdated,
            &expense,
        ));
        Ok(expense)
    }

    pub async fn delete(state: &AppState, caller: Uuid, expense_id: Uuid) -> AppResult<()> {
        let (expense, _) = Self::find_for_member(state, caller, expense_id).await?;

        if caller != expense.created_by {
            return Err(AppError::forbidden(
                "Only the creator can delete this expense",
            ));
        }

        state.store.delete_expense_linked(&expense).await?;

        tracing::info!(expense_id = %expense.id, group_id = %expense.group, "deleted expense");
        state.events.publish(GroupEvent::deleted(expense.group, expense.id));
        Ok(())
    }

    pub async fn into_views(state: &AppState, expenses: Vec<Self>) -> AppResult<Vec<ExpenseView>> {
        let ids: Vec<Uuid> = expenses
            .iter()
            .flat_map(|e| {
                [e.paid_by, e.created_by]
                    .into_iter()
                    .chain(e.splits.iter().map(|s| s.user))
            })
            .collect();
        let users = UserSummary::lookup(state, &ids).await?;
        let summary = |id: Uuid| {
            users
                .get(&id)
                .cloned()
                .unwrap_or_else(|| UserSummary::unknown(id))
        };

        Ok(expenses
            .into_iter()
            .map(|e| ExpenseView {
                id: e.id,
                group: e.group,
                title: e.title,
                amount: e.amount,
                category: e.category,
                paid_by: summary(e.paid_by),
                split_method: e.split_method,
                split_fallback: e.split_method != SplitMethod::Equally,
                date: e.date,
                notes: e.notes,
                receipt: e.receipt,
                splits: e
                    .splits
                    .into_iter()
                    .map(|s| SplitView {
                        user: summary(s.user),
                        amount: s.amount,
                        paid: s.paid,
                        paid_at: s.paid_at,
                    })
                    .collect(),
                created_by: summary(e.created_by),
                created_at: e.created_at,
                updated_at: e.updated_at,
            })
            .collect())
    }

    pub async fn into_view(self, state: &AppState) -> AppResult<ExpenseView> {
        let mut views = Self::into_views(state, vec![self]).await?;
        views
            .pop()
            .ok_or_else(|| AppError::internal("Expense view could not be built"))
    }
}
