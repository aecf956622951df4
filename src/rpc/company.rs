use serde_json::{Value, json};
use tracing::{error, info, instrument};

use super::auth::rpc_error_message;
use super::{OdooSession, call_envelope};
use crate::error::{ReportError, Result};

const CALL_KW_PATH: &str = "/web/dataset/call_kw";

impl OdooSession {
    /// Points the server-side session at `company_id` so later reads are
    /// scoped to it. Returns `false` when the server rejects the switch.
    #[instrument(level = "info", skip(self))]
    pub fn switch_company(&self, company_id: i64) -> Result<bool> {
        let uid = self.uid.ok_or(ReportError::NotLoggedIn)?;
        let payload = switch_company_payload(uid, company_id);

        let body = self.post_json(CALL_KW_PATH, &payload)?;
        let response: Value = serde_json::from_str(&body)?;

        if response.get("error").is_some() {
            error!(
                company_id,
                error = %rpc_error_message(&response).unwrap_or_default(),
                "failed to switch company"
            );
            return Ok(false);
        }

        info!(company_id, "session switched to company");
        Ok(true)
    }
}

fn switch_company_payload(uid: i64, company_id: i64) -> Value {
    call_envelope(
        "res.users",
        "write",
        json!([[uid], {"company_id": company_id}]),
        json!({
            "context": {
                "allowed_company_ids": [company_id],
                "company_id": company_id,
            }
        }),
    )
}
