use sqlx::PgPool;

use crate::db;

/// Remaining call budget in the rolling 24-hour window, floored at zero.
/// Derived from attempt timestamps on every run, never cached.
pub async fn remaining(pool: &PgPool, daily_limit: i64) -> Result<i64, sqlx::Error> {
    let used = db::queue::attempts_in_window(pool).await?;
    Ok((daily_limit - used).max(0))
}
