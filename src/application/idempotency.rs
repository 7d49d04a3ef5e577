use super::locks::KeyedLocks;
use crate::config::EngineConfig;
use crate::domain::idempotency::{IdempotencyKey, IdempotencyRecord, StoredResponse, request_hash};
use crate::domain::ports::IdempotencyStoreRef;
use crate::error::{PaymentError, Result};
use chrono::Utc;
use serde::Serialize;
use std::future::Future;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// At-most-once execution of mutating requests per (key, endpoint).
///
/// The lookup, the wrapped operation, and the write of its response all run
/// under a per-(key, endpoint) lock, so concurrent duplicates wait for the
/// first one and then replay its response.
pub struct IdempotencyGate {
    store: IdempotencyStoreRef,
    config: EngineConfig,
    locks: KeyedLocks<(IdempotencyKey, String)>,
}

impl IdempotencyGate {
    pub fn new(store: IdempotencyStoreRef, config: &EngineConfig) -> Self {
        Self {
            store,
            config: config.clone(),
            locks: KeyedLocks::new(),
        }
    }

    /// Runs `operation` unless a response for (`key`, `endpoint`) is already
    /// stored.
    ///
    /// * no key: the operation always runs and nothing is stored.
    /// * malformed key: `InvalidFormat`, the operation does not run.
    /// * unusable expiry setting: `ValidationError`, the operation does not run.
    /// * stored, same body: the stored response is returned verbatim.
    /// * stored, different body: `Conflict`, the operation does not run.
    /// * stored but expired: the record is dropped and the operation runs.
    ///
    /// Only successful responses are stored; an error from `operation` is
    /// returned as is and a retry with the same key runs it again.
    pub async fn execute<B, F, Fut>(
        &self,
        key: Option<&str>,
        endpoint: &str,
        body: &B,
        operation: F,
    ) -> Result<StoredResponse>
    where
        B: Serialize + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<StoredResponse>>,
    {
        let Some(raw_key) = key else {
            return operation().await;
        };
        let key: IdempotencyKey = raw_key.parse()?;
        let hash = request_hash(body)?;
        let ttl = self.config.idempotency_ttl()?;

        let slot = (key.clone(), endpoint.to_string());
        let _guard = self.locks.acquire(&slot).await;

        if let Some(existing) = self.store.find(&key, endpoint).await? {
            if existing.is_expired_at(Utc::now()) {
                self.store.delete(&key, endpoint).await?;
                info!(%key, endpoint, "expired idempotency record removed");
            } else if existing.request_hash != hash {
                warn!(%key, endpoint, "idempotency key reused with a different body");
                return Err(PaymentError::Conflict(
                    "idempotency key already used with different request body".to_string(),
                ));
            } else {
                debug!(%key, endpoint, "replaying stored response");
                return Ok(existing.response);
            }
        }

        let response = operation().await?;

        let now = Utc::now();
        let expires_at = now.checked_add_signed(ttl).ok_or_else(|| {
            PaymentError::ValidationError(format!("idempotency expiry {now} + {ttl} is out of range"))
        })?;
        self.store
            .save(IdempotencyRecord {
                id: Uuid::new_v4(),
                key: key.clone(),
                endpoint: endpoint.to_string(),
                request_hash: hash,
                response: response.clone(),
                created_at: now,
                expires_at,
            })
            .await?;
        debug!(%key, endpoint, status = response.status, "idempotency record saved");

        Ok(response)
    }

    /// Deletes every expired record, returning how many were removed.
    pub async fn purge_expired(&self) -> Result<usize> {
        let purged = self.store.purge_expired(Utc::now()).await?;
        if purged > 0 {
            info!(purged, "expired idempotency records purged");
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::IdempotencyStore;
    use crate::infrastructure::in_memory::InMemoryIdempotencyStore;
    use chrono::Duration;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const KEY: &str = "6f1c2b0a-5d4e-4c3b-9a8f-7e6d5c4b3a21";
    const ENDPOINT: &str = "POST /wallets/deposit";

    fn gate() -> (IdempotencyGate, Arc<InMemoryIdempotencyStore>) {
        let store = Arc::new(InMemoryIdempotencyStore::new());
        (IdempotencyGate::new(store.clone(), &EngineConfig::default()), store)
    }

    fn counting(counter: &AtomicUsize) -> impl Future<Output = Result<StoredResponse>> + '_ {
        async move {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(StoredResponse {
                status: 201,
                body: json!({ "execution": n }),
            })
        }
    }

    #[tokio::test]
    async fn test_replay_returns_first_response() {
        let (gate, _) = gate();
        let calls = AtomicUsize::new(0);
        let body = json!({"amount": "10"});

        let first = gate
            .execute(Some(KEY), ENDPOINT, &body, || counting(&calls))
            .await
            .unwrap();
        let second = gate
            .execute(Some(KEY), ENDPOINT, &body, || counting(&calls))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_different_body_conflicts() {
        let (gate, _) = gate();
        let calls = AtomicUsize::new(0);

        gate.execute(Some(KEY), ENDPOINT, &json!({"amount": "10"}), || counting(&calls))
            .await
            .unwrap();
        let result = gate
            .execute(Some(KEY), ENDPOINT, &json!({"amount": "11"}), || counting(&calls))
            .await;

        assert!(matches!(result, Err(PaymentError::Conflict(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_malformed_key_rejected_before_execution() {
        let (gate, _) = gate();
        let calls = AtomicUsize::new(0);

        let result = gate
            .execute(Some("abc"), ENDPOINT, &json!({}), || counting(&calls))
            .await;

        assert!(matches!(result, Err(PaymentError::InvalidFormat(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_key_disables_deduplication() {
        let (gate, store) = gate();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            gate.execute(None, ENDPOINT, &json!({}), || counting(&calls))
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_key_is_scoped_by_endpoint() {
        let (gate, _) = gate();
        let calls = AtomicUsize::new(0);

        gate.execute(Some(KEY), ENDPOINT, &json!({}), || counting(&calls))
            .await
            .unwrap();
        gate.execute(Some(KEY), "POST /remittances/send", &json!({}), || counting(&calls))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_expired_record_is_replaced() {
        let (gate, store) = gate();
        let calls = AtomicUsize::new(0);
        let body = json!({"amount": "10"});

        gate.execute(Some(KEY), ENDPOINT, &body, || counting(&calls))
            .await
            .unwrap();

        let key: IdempotencyKey = KEY.parse().unwrap();
        let mut record = store.find(&key, ENDPOINT).await.unwrap().unwrap();
        record.expires_at = Utc::now() - Duration::seconds(1);
        store.save(record).await.unwrap();

        let response = gate
            .execute(Some(KEY), ENDPOINT, &json!({"amount": "99"}), || counting(&calls))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(response.body, json!({ "execution": 2 }));
    }

    #[tokio::test]
    async fn test_failed_operation_is_not_cached() {
        let (gate, _) = gate();
        let calls = AtomicUsize::new(0);

        let failed = gate
            .execute(Some(KEY), ENDPOINT, &json!({}), || async {
                Err(PaymentError::ExternalFailure("boom".into()))
            })
            .await;
        assert!(failed.is_err());

        gate.execute(Some(KEY), ENDPOINT, &json!({}), || counting(&calls))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_duplicates_execute_once() {
        let (gate, _) = gate();
        let gate = Arc::new(gate);
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let gate = gate.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                gate.execute(Some(KEY), ENDPOINT, &json!({"amount": "10"}), || async {
                    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                    counting(&calls).await
                })
                .await
                .unwrap()
            }));
        }

        let mut responses = Vec::new();
        for handle in handles {
            responses.push(handle.await.unwrap());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(responses.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[tokio::test]
    async fn test_invalid_expiry_rejected_before_execution() {
        let store = Arc::new(InMemoryIdempotencyStore::new());
        let config = EngineConfig {
            idempotency_ttl_hours: -24,
            ..EngineConfig::default()
        };
        let gate = IdempotencyGate::new(store.clone(), &config);
        let calls = AtomicUsize::new(0);

        let result = gate
            .execute(Some(KEY), ENDPOINT, &json!({}), || counting(&calls))
            .await;

        assert!(matches!(result, Err(PaymentError::ValidationError(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (gate, store) = gate();
        let calls = AtomicUsize::new(0);
        gate.execute(Some(KEY), ENDPOINT, &json!({}), || counting(&calls))
            .await
            .unwrap();

        assert_eq!(gate.purge_expired().await.unwrap(), 0);

        let key: IdempotencyKey = KEY.parse().unwrap();
        let mut record = store.find(&key, ENDPOINT).await.unwrap().unwrap();
        record.expires_at = Utc::now() - Duration::hours(1);
        store.save(record).await.unwrap();

        assert_eq!(gate.purge_expired().await.unwrap(), 1);
        assert_eq!(store.len().await, 0);
    }
}
