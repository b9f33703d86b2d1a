/*
[INPUT]:  Active session user id, monetary account id and paging parameters
[OUTPUT]: Pages of payments
[POS]:    HTTP layer - payment endpoints (require a session)
[UPDATE]: When adding payment endpoints or filters
*/

// ### Payment Endpoints

use crate::http::{ApiRequest, BunqClient, Result};
use crate::types::{Page, Payment, PaymentElement, QueryParam, ResponseEnvelope};

fn payment_path(user_id: u64, monetary_account_id: u64) -> String {
    format!("user/{user_id}/monetary-account/{monetary_account_id}/payment")
}

impl BunqClient {
    /// List payments of one monetary account, newest first
    ///
    /// GET /user/{userID}/monetary-account/{monetaryAccountID}/payment
    pub async fn list_payments(
        &self,
        monetary_account_id: u64,
        params: Vec<QueryParam>,
    ) -> Result<Page<Payment>> {
        let path = payment_path(self.current_user_id()?, monetary_account_id);
        let request = ApiRequest::get(path).params(params);

        let envelope: ResponseEnvelope<PaymentElement> = self.execute(request).await?;
        Ok(Page::from_envelope(envelope, |element| element.payment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::key_pair::fixtures::client_key;
    use crate::http::BunqError;

    #[test]
    fn test_payment_path() {
        assert_eq!(payment_path(1, 2), "user/1/monetary-account/2/payment");
    }

    #[tokio::test]
    async fn test_list_payments_requires_session() {
        let client = BunqClient::new("http://127.0.0.1:9/v1/", client_key()).unwrap();
        let err = client.list_payments(2, vec![]).await.unwrap_err();
        assert!(matches!(err, BunqError::InvalidState(_)));
    }
}
