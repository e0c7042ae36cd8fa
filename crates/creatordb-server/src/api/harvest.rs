//! `POST /api/v1/harvest`: always answers 200 with the harvest envelope.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use creatordb_core::{HarvestRequest, HarvestResponse, Platform, WarningCode};
use creatordb_harvester::parse_target;

use crate::middleware::RequestId;

use super::AppState;

type AccountKey = (Platform, String);

/// Accounts with a harvest currently running on this server.
///
/// One account must never be harvested twice at once; a second request for
/// it is answered immediately instead of queued.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    accounts: Arc<Mutex<HashSet<AccountKey>>>,
}

/// Releases the account when the harvest finishes or the request is dropped.
#[derive(Debug)]
pub(super) struct InFlightGuard {
    accounts: Arc<Mutex<HashSet<AccountKey>>>,
    key: AccountKey,
}

impl InFlight {
    pub(super) fn claim(&self, key: AccountKey) -> Option<InFlightGuard> {
        let mut accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
        if !accounts.insert(key.clone()) {
            return None;
        }
        Some(InFlightGuard {
            accounts: Arc::clone(&self.accounts),
            key,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

fn account_key(request: &HarvestRequest) -> Option<AccountKey> {
    let platform = request.platform()?;
    let target = parse_target(request.target()?)?;
    Some((platform, target.key().to_string()))
}

pub(super) async fn run_harvest(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    payload: Result<Json<HarvestRequest>, JsonRejection>,
) -> Json<HarvestResponse> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::debug!(request_id = %req_id.0, error = %rejection, "rejected harvest body");
            return Json(HarvestResponse::failed(
                "",
                WarningCode::InvalidRequest,
                format!("invalid request body: {}", rejection.body_text()),
            ));
        }
    };

    // Requests that cannot name an account are rejected by the harvester itself.
    let _guard = match account_key(&request) {
        Some(key) => match state.in_flight.claim(key.clone()) {
            Some(guard) => Some(guard),
            None => {
                tracing::info!(request_id = %req_id.0, platform = %key.0, handle = %key.1, "harvest already running");
                return Json(HarvestResponse::failed(
                    &key.1,
                    WarningCode::InvalidRequest,
                    format!("a harvest of {} {} is already running", key.0, key.1),
                ));
            }
        },
        None => None,
    };

    tracing::info!(
        request_id = %req_id.0,
        target = request.target().unwrap_or_default(),
        "harvest requested"
    );
    Json(state.harvester.harvest(&request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_is_exclusive_until_released() {
        let in_flight = InFlight::default();
        let key = (Platform::TikTok, "someone".to_string());

        let guard = in_flight.claim(key.clone()).expect("first claim");
        assert!(in_flight.claim(key.clone()).is_none());
        assert!(in_flight
            .claim((Platform::Instagram, "someone".to_string()))
            .is_some());

        drop(guard);
        assert!(in_flight.claim(key).is_some());
    }

    #[test]
    fn account_key_normalizes_profile_urls() {
        let request: HarvestRequest =
            serde_json::from_str(r#"{"profileUrl":"https://www.tiktok.com/@Someone?lang=en"}"#)
                .unwrap();
        let (platform, handle) = account_key(&request).expect("key");
        assert_eq!(platform, Platform::TikTok);
        assert_eq!(handle, "someone");
    }

    #[test]
    fn account_key_needs_a_target() {
        let request: HarvestRequest = serde_json::from_str(r#"{"platform":"tiktok"}"#).unwrap();
        assert!(account_key(&request).is_none());
    }
}
