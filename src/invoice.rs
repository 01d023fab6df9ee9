use chrono::{NaiveDate, Utc};

use crate::domain::{Plan, User};

#[derive(thiserror::Error, Debug)]
pub enum InvoiceError {
    #[error("plan `{0}` has a negative amount.")]
    NegativeAmount(String),
    #[error("plan `{0}` has no name.")]
    UnnamedPlan(i32),
}

/// 发票，作为`invoice`模板的数据
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Invoice {
    pub customer: String,
    pub plan_name: String,
    pub amount: String,
    pub issued_on: NaiveDate,
}

/// 由计划数据计算发票，不做任何I/O
pub fn compute_invoice(user: &User, plan: &Plan) -> Result<Invoice, InvoiceError> {
    if plan.plan_name.trim().is_empty() {
        return Err(InvoiceError::UnnamedPlan(plan.id));
    }
    if plan.plan_amount < 0 {
        return Err(InvoiceError::NegativeAmount(plan.plan_name.clone()));
    }

    Ok(Invoice {
        customer: user.full_name(),
        plan_name: plan.plan_name.clone(),
        amount: plan.amount_formatted(),
        issued_on: Utc::now().date_naive(),
    })
}
