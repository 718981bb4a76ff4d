use actix_web::{HttpResponse, Responder, get, web};

use super::models::{AppState, StatsResponse};

#[get("/stats/")]
pub async fn get_stats(state: web::Data<AppState>) -> impl Responder {
    let ledger = &state.ledger;
    let chain = ledger.blocks();
    let height = chain.len();

    let last_interval_secs = match chain.as_slice() {
        [.., older, newer] => Some((newer.timestamp - older.timestamp).max(0)),
        _ => None,
    };

    let limits = ledger.limits();
    HttpResponse::Ok().json(StatsResponse {
        height,
        difficulty: ledger.difficulty(),
        pending: ledger.pending().len(),
        last_interval_secs,
        max_attempts: limits.max_attempts,
        time_budget_ms: limits.time_budget.as_millis(),
    })
}
