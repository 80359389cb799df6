//! Referral code resolution

use crate::context::LedgerContext;
use crate::error::LedgerResult;
use stakeline_core::{Account, Address, ReferralCode};
use std::sync::Arc;

/// Maps an invite code to the account that owns it
pub struct ReferralResolver {
    ctx: Arc<LedgerContext>,
}

impl ReferralResolver {
    pub fn new(ctx: Arc<LedgerContext>) -> Self {
        Self { ctx }
    }

    /// Referrer for `code`, or `None` when the code is blank, malformed,
    /// unknown, or belongs to `registering` itself. Read-only.
    pub fn resolve(&self, code: &str, registering: &Address) -> LedgerResult<Option<Account>> {
        let code = match ReferralCode::parse(code) {
            Ok(code) => code,
            Err(_) => return Ok(None),
        };

        let referrer = self
            .ctx
            .with_retry("account_by_code", |store| store.account_by_code(&code))?;

        Ok(referrer.filter(|account| &account.address != registering))
    }
}
