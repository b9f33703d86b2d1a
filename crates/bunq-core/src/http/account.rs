/*
[INPUT]:  Active session user id and optional paging parameters
[OUTPUT]: Pages of bank monetary accounts
[POS]:    HTTP layer - monetary account endpoints (require a session)
[UPDATE]: When adding account kinds or account endpoints
*/

// ### Monetary Account Endpoints

use crate::http::{ApiRequest, BunqClient, Result};
use crate::types::{MonetaryAccountBank, MonetaryAccountBankElement, Page, QueryParam, ResponseEnvelope};

fn monetary_account_bank_path(user_id: u64) -> String {
    format!("user/{user_id}/monetary-account-bank")
}

impl BunqClient {
    /// List the session user's bank accounts
    ///
    /// GET /user/{userID}/monetary-account-bank
    pub async fn list_monetary_accounts_bank(
        &self,
        params: Vec<QueryParam>,
    ) -> Result<Page<MonetaryAccountBank>> {
        let path = monetary_account_bank_path(self.current_user_id()?);
        let request = ApiRequest::get(path).params(params);

        let envelope: ResponseEnvelope<MonetaryAccountBankElement> = self.execute(request).await?;
        Ok(Page::from_envelope(envelope, |element| {
            element.monetary_account_bank
        }))
    }
}
