use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::resilience::BreakerStatus;
use crate::services::trend_orchestrator::OrchestratorStatus;
use crate::AppState;

use super::ApiResponse;

#[derive(Serialize)]
pub struct ServiceStatus {
    pub orchestrator: OrchestratorStatus,
    pub breaker: BreakerStatus,
}

pub async fn status(State(state): State<AppState>) -> Json<ApiResponse<ServiceStatus>> {
    Json(ApiResponse::ok(ServiceStatus {
        orchestrator: state.orchestrator.status(),
        breaker: state.breaker.status(),
    }))
}
