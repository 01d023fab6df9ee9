use chrono::{DateTime, Utc};

/// 订阅计划，金额以分为单位
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, serde::Serialize, serde::Deserialize)]
pub struct Plan {
    pub id: i32,
    pub plan_name: String,
    pub plan_amount: i32,
    pub created_at: DateTime<Utc>,
}

impl Plan {
    /// `1000` -> `$10.00`
    pub fn amount_formatted(&self) -> String {
        let sign = if self.plan_amount < 0 { "-" } else { "" };
        let cents = self.plan_amount.unsigned_abs();
        format!("{sign}${}.{:02}", cents / 100, cents % 100)
    }
}
