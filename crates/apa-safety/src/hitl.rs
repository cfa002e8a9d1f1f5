//! HITL (Human-in-the-Loop) approval gate.
//!
//! Resolves spec.md §9's open question on HITL default behavior: the
//! original source's `request_human_approval` returns `decision="rejected"`
//! immediately while leaving the persisted row `pending` — a silently-lying
//! default. Every gate here keeps the returned decision and the persisted
//! row in agreement.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::oneshot;
use uuid::Uuid;

use apa_core::error::{Error, Result};
use apa_core::traits::HitlStore;
use apa_core::types::{Action, HitlDecision, HitlRequest, HitlRequestType, HitlStatus, RiskLevel};

/// A human-approval channel. Implementations differ only in how
/// `request_human_approval` resolves; `respond` is uniform (validate the
/// row is still pending, mutate it, signal any waiter).
#[async_trait]
pub trait ApprovalGate: Send + Sync {
    async fn request_human_approval(
        &self,
        run_id: &str,
        agent_id: &str,
        action: &Action,
        reason: &str,
        risk_level: RiskLevel,
    ) -> Result<HitlRequest>;

    async fn respond(
        &self,
        request_id: &str,
        user_id: &str,
        decision: HitlDecision,
        feedback: Option<String>,
    ) -> Result<HitlRequest>;
}

fn new_pending_request(
    run_id: &str,
    agent_id: &str,
    action: &Action,
    reason: &str,
    risk_level: RiskLevel,
) -> HitlRequest {
    HitlRequest {
        id: Uuid::new_v4().to_string(),
        run_id: run_id.to_string(),
        agent_id: agent_id.to_string(),
        request_type: HitlRequestType::ActionApproval,
        reason: reason.to_string(),
        action_details: action.clone(),
        risk_level,
        status: HitlStatus::Pending,
        decision: None,
        feedback: None,
        reason_code: None,
        requested_at: Utc::now(),
        responded_at: None,
        responded_by: None,
    }
}

fn decision_status(decision: HitlDecision) -> HitlStatus {
    match decision {
        HitlDecision::Approve | HitlDecision::Modify => HitlStatus::Approved,
        HitlDecision::Reject => HitlStatus::Rejected,
    }
}

async fn apply_response(
    store: &Arc<dyn HitlStore>,
    request_id: &str,
    user_id: &str,
    decision: HitlDecision,
    feedback: Option<String>,
) -> Result<HitlRequest> {
    let mut row = store
        .get(request_id)
        .await?
        .ok_or_else(|| Error::validation(format!("HITL request {request_id} not found")))?;

    if row.status != HitlStatus::Pending {
        return Err(Error::hitl_invalid_state(request_id, format!("{:?}", row.status)));
    }

    row.status = decision_status(decision);
    row.decision = Some(decision);
    row.feedback = feedback;
    row.responded_by = Some(user_id.to_string());
    row.responded_at = Some(Utc::now());
    store.update(row.clone()).await?;
    Ok(row)
}

/// Genuinely blocks on a human response. A `tokio::sync::oneshot` is
/// registered against the request id at creation time; `respond()` fires it,
/// and a timeout elapsing resolves the row to `timeout`/`rejected` itself.
/// The default mode for the executor binary.
pub struct BlockingApprovalGate {
    store: Arc<dyn HitlStore>,
    waiters: DashMap<String, oneshot::Sender<()>>,
    timeout: Duration,
}

impl BlockingApprovalGate {
    pub fn new(store: Arc<dyn HitlStore>, timeout: Duration) -> Self {
        Self {
            store,
            waiters: DashMap::new(),
            timeout,
        }
    }
}

#[async_trait]
impl ApprovalGate for BlockingApprovalGate {
    async fn request_human_approval(
        &self,
        run_id: &str,
        agent_id: &str,
        action: &Action,
        reason: &str,
        risk_level: RiskLevel,
    ) -> Result<HitlRequest> {
        let request = new_pending_request(run_id, agent_id, action, reason, risk_level);
        self.store.create(request.clone()).await?;

        let (tx, rx) = oneshot::channel();
        self.waiters.insert(request.id.clone(), tx);

        tracing::info!(
            request_id = %request.id,
            run_id,
            risk = ?risk_level,
            "awaiting human approval"
        );

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(_) => self
                .store
                .get(&request.id)
                .await?
                .ok_or_else(|| Error::internal("HITL request disappeared after response")),
            Err(_) => {
                self.waiters.remove(&request.id);
                let mut row = self
                    .store
                    .get(&request.id)
                    .await?
                    .unwrap_or_else(|| request.clone());
                if row.status == HitlStatus::Pending {
                    row.status = HitlStatus::Timeout;
                    row.decision = Some(HitlDecision::Reject);
                    row.reason_code = Some("TIMEOUT".to_string());
                    row.responded_at = Some(Utc::now());
                    self.store.update(row.clone()).await?;
                    tracing::warn!(request_id = %row.id, "HITL request timed out, auto-rejected");
                }
                Ok(row)
            }
        }
    }

    async fn respond(
        &self,
        request_id: &str,
        user_id: &str,
        decision: HitlDecision,
        feedback: Option<String>,
    ) -> Result<HitlRequest> {
        let row = apply_response(&self.store, request_id, user_id, decision, feedback).await?;
        if let Some((_, tx)) = self.waiters.remove(request_id) {
            let _ = tx.send(());
        }
        Ok(row)
    }
}

/// Used only when no operator-notification channel is configured (e.g.
/// headless test harnesses). The row is persisted `pending` and then
/// immediately resolved to `rejected` with `reason_code =
/// "NO_OPERATOR_CHANNEL"` recorded on the row itself, so the row and the
/// returned decision never disagree.
pub struct AutoRejectDiagnosticGate {
    store: Arc<dyn HitlStore>,
}

impl AutoRejectDiagnosticGate {
    pub fn new(store: Arc<dyn HitlStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ApprovalGate for AutoRejectDiagnosticGate {
    async fn request_human_approval(
        &self,
        run_id: &str,
        agent_id: &str,
        action: &Action,
        reason: &str,
        risk_level: RiskLevel,
    ) -> Result<HitlRequest> {
        let mut request = new_pending_request(run_id, agent_id, action, reason, risk_level);
        self.store.create(request.clone()).await?;

        request.status = HitlStatus::Rejected;
        request.decision = Some(HitlDecision::Reject);
        request.reason_code = Some("NO_OPERATOR_CHANNEL".to_string());
        request.responded_at = Some(Utc::now());
        self.store.update(request.clone()).await?;

        tracing::warn!(
            request_id = %request.id,
            run_id,
            "auto-rejected HITL request: no operator channel configured"
        );
        Ok(request)
    }

    async fn respond(
        &self,
        request_id: &str,
        user_id: &str,
        decision: HitlDecision,
        feedback: Option<String>,
    ) -> Result<HitlRequest> {
        apply_response(&self.store, request_id, user_id, decision, feedback).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apa_core::mem::InMemoryHitlStore;
    use serde_json::json;

    fn action() -> Action {
        Action::new("user_communication", json!({"to": "ops@example.com"}))
    }

    #[tokio::test]
    async fn blocking_gate_resolves_on_respond() {
        let store: Arc<dyn HitlStore> = Arc::new(InMemoryHitlStore::new());
        let gate = Arc::new(BlockingApprovalGate::new(store, Duration::from_secs(5)));

        let gate_clone = gate.clone();
        let act = action();
        let handle = tokio::spawn(async move {
            gate_clone
                .request_human_approval("run-1", "agent-1", &act, "needs sign-off", RiskLevel::High)
                .await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        let pending_id = {
            let rows = gate.store.pending(10, None).await.unwrap();
            rows[0].id.clone()
        };

        gate.respond(&pending_id, "user-1", HitlDecision::Approve, Some("looks fine".into()))
            .await
            .unwrap();

        let resolved = handle.await.unwrap().unwrap();
        assert_eq!(resolved.status, HitlStatus::Approved);
        assert_eq!(resolved.decision, Some(HitlDecision::Approve));
    }

    #[tokio::test]
    async fn blocking_gate_times_out_to_rejected() {
        let store: Arc<dyn HitlStore> = Arc::new(InMemoryHitlStore::new());
        let gate = BlockingApprovalGate::new(store, Duration::from_millis(50));
        let act = action();

        let result = gate
            .request_human_approval("run-2", "agent-1", &act, "needs sign-off", RiskLevel::Critical)
            .await
            .unwrap();

        assert_eq!(result.status, HitlStatus::Timeout);
        assert_eq!(result.decision, Some(HitlDecision::Reject));
        assert_eq!(result.reason_code.as_deref(), Some("TIMEOUT"));
    }

    #[tokio::test]
    async fn auto_reject_gate_never_leaves_row_pending() {
        let store: Arc<dyn HitlStore> = Arc::new(InMemoryHitlStore::new());
        let gate = AutoRejectDiagnosticGate::new(store.clone());
        let act = action();

        let result = gate
            .request_human_approval("run-3", "agent-1", &act, "no channel wired", RiskLevel::High)
            .await
            .unwrap();

        assert_eq!(result.status, HitlStatus::Rejected);
        assert_eq!(result.reason_code.as_deref(), Some("NO_OPERATOR_CHANNEL"));

        let persisted = store.get(&result.id).await.unwrap().unwrap();
        assert_eq!(persisted.status, HitlStatus::Rejected);
    }

    #[tokio::test]
    async fn respond_to_non_pending_request_is_rejected() {
        let store: Arc<dyn HitlStore> = Arc::new(InMemoryHitlStore::new());
        let gate = AutoRejectDiagnosticGate::new(store);
        let act = action();

        let result = gate
            .request_human_approval("run-4", "agent-1", &act, "no channel wired", RiskLevel::High)
            .await
            .unwrap();

        let err = gate
            .respond(&result.id, "user-1", HitlDecision::Approve, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::HitlInvalidState(_, _)));
    }
}
