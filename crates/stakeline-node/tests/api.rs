//! HTTP contract tests

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Duration;
use serde_json::{json, Value};
use stakeline_core::{ManualClock, LOCK_PERIOD_DAYS};
use stakeline_ledger::{Ledger, LedgerConfig};
use stakeline_node::{router, AppState, Metrics};
use stakeline_storage::MemoryStore;
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    clock: Arc<ManualClock>,
}

fn app() -> TestApp {
    let clock = Arc::new(ManualClock::starting_now());
    let ledger = Ledger::new(
        Arc::new(MemoryStore::new()),
        clock.clone(),
        LedgerConfig::default(),
    );
    let state = AppState::new(ledger, Arc::new(Metrics::new().unwrap()), true);
    TestApp {
        router: router(state),
        clock,
    }
}

impl TestApp {
    async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn save_wallet(&self, address: &str, code: Option<&str>) -> Value {
        let (status, body) = self
            .send(
                "POST",
                "/api/save-wallet/",
                Some(json!({"wallet_address": address, "referral_code": code, "wallet_type": "test"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body
    }
}

mod wallet_tests {
    use super::*;

    #[tokio::test]
    async fn test_save_wallet_and_stats() {
        let app = app();
        let a = app.save_wallet("0xA", None).await;
        assert_eq!(a["is_new"], true);
        assert!(a.get("referrer_bonus_given").is_none());

        let code = a["referral_code"].as_str().unwrap().to_string();
        let b = app.save_wallet("0xB", Some(&code)).await;
        assert_eq!(b["referrer_bonus_given"], true);
        assert_eq!(b["referrer_received"], "3");

        let (status, stats) = app.send("GET", "/api/user-stats/0xA/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["total_referrals"], 1);
        assert_eq!(stats["token_balance"], "3");
        assert_eq!(stats["reward_breakdown"]["from_signups"], "3");
        assert_eq!(
            stats["referral_link"],
            format!("http://localhost:3000?ref={}", code)
        );
    }

    #[tokio::test]
    async fn test_existing_wallet_is_not_new() {
        let app = app();
        app.save_wallet("0xA", None).await;
        let again = app.save_wallet("0xA", None).await;
        assert_eq!(again["is_new"], false);
    }

    #[tokio::test]
    async fn test_missing_address_is_bad_request() {
        let app = app();
        let (status, body) = app.send("POST", "/api/save-wallet/", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_input");
    }

    #[tokio::test]
    async fn test_unknown_stats_is_404() {
        let app = app();
        let (status, body) = app.send("GET", "/api/user-stats/0xnobody/", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");
    }
}

mod staking_tests {
    use super::*;

    #[tokio::test]
    async fn test_stake_list_unlock_flow() {
        let app = app();
        app.save_wallet("0xB", None).await;

        let stake = json!({"wallet_address": "0xB", "amount": 1.0, "tx_hash": "0xabc"});
        let (status, receipt) = app.send("POST", "/api/staking/process/", Some(stake.clone())).await;
        assert_eq!(status, StatusCode::OK, "{}", receipt);
        assert_eq!(receipt["invoice"]["bonus_5_percent"], "0.05");
        assert_eq!(receipt["invoice"]["staked_amount"], "0.95");
        assert_eq!(receipt["invoice"]["days_remaining"], LOCK_PERIOD_DAYS);

        // resubmission returns the same body
        let (status, replay) = app.send("POST", "/api/staking/process/", Some(stake)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(replay, receipt);

        let (_, list) = app.send("GET", "/api/staking/list/0xB/", None).await;
        assert_eq!(list["active_stakings"], 1);
        assert_eq!(list["stakings"][0]["can_unlock"], false);

        let id = receipt["staking_id"].as_u64().unwrap();
        let uri = format!("/api/staking/unlock/{}/", id);
        let owner = json!({"wallet_address": "0xB"});

        let (status, early) = app.send("POST", &uri, Some(owner.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(early["code"], "not_matured");
        assert_eq!(early["days_remaining"], LOCK_PERIOD_DAYS);

        let (status, _) = app
            .send("POST", &uri, Some(json!({"wallet_address": "0xmallory"})))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        app.clock.advance(Duration::days(LOCK_PERIOD_DAYS));
        let (status, unlocked) = app.send("POST", &uri, Some(owner.clone())).await;
        assert_eq!(status, StatusCode::OK, "{}", unlocked);
        assert_eq!(unlocked["amount"], "0.95");
        assert_eq!(unlocked["stats"]["token_balance"], "1");

        let (status, again) = app.send("POST", &uri, Some(owner)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(again["code"], "already_unlocked");
        assert_eq!(again["receipt"], unlocked);

        let (_, history) = app.send("GET", "/api/rewards/0xB/", None).await;
        assert_eq!(history.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_amount_as_string_and_invalid_amounts() {
        let app = app();
        app.save_wallet("0xB", None).await;

        let (status, receipt) = app
            .send(
                "POST",
                "/api/staking/process/",
                Some(json!({"wallet_address": "0xB", "amount": "2.5", "tx_hash": "0x1"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(receipt["amount"], "2.5");

        for amount in [json!(0), json!(-1), json!("ten")] {
            let (status, body) = app
                .send(
                    "POST",
                    "/api/staking/process/",
                    Some(json!({"wallet_address": "0xB", "amount": amount, "tx_hash": "0x2"})),
                )
                .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["code"], "invalid_amount");
        }
    }

    #[tokio::test]
    async fn test_unknown_position_and_bad_id() {
        let app = app();
        let owner = json!({"wallet_address": "0xB"});
        let (status, _) = app.send("POST", "/api/staking/unlock/42/", Some(owner.clone())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app.send("POST", "/api/staking/unlock/abc/", Some(owner)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_for_unknown_wallet_is_empty() {
        let app = app();
        let (status, list) = app.send("GET", "/api/staking/list/0xnew/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["stakings"], json!([]));
    }
}

mod ops_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_and_metrics() {
        let app = app();
        let (status, health) = app.send("GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health["status"], "healthy");

        app.save_wallet("0xA", None).await;

        let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let text = String::from_utf8(
            to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec(),
        )
        .unwrap();
        assert!(text.contains("stakeline_operations_total{operation=\"bootstrap_wallet\",outcome=\"ok\"} 1"));
    }
}
