use crate::error::{ApiError, ApiResult};
use database_layer::{
    fits_money_column, to_money_scale, PharmacyStore, UpsertOutcome, MONEY_LIMIT,
};
use rust_decimal::Decimal;
use tracing::{info, instrument};

/// Set the pharmacy's price for a drug, inserting or replacing the row.
#[instrument(skip(store))]
pub async fn update_price(
    store: &dyn PharmacyStore,
    pharmacy_id: i64,
    drug_id: i64,
    price: Decimal,
) -> ApiResult<UpsertOutcome> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ApiError::validation("price must not be negative"));
    }
    if !fits_money_column(price) {
        return Err(ApiError::validation(format!(
            "price must be below {MONEY_LIMIT} with at most two decimal places"
        )));
    }
    let price = to_money_scale(price);
    if store.find_drug(drug_id).await?.is_none() {
        return Err(ApiError::not_found(format!("Drug {drug_id} not found")));
    }

    let outcome = store.upsert_price(pharmacy_id, drug_id, price).await?;
    info!(pharmacy_id, drug_id, price = %price, ?outcome, "Price updated");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use database_layer::{InMemoryStore, MemoryState};

    fn store() -> InMemoryStore {
        InMemoryStore::new(
            MemoryState::default()
                .with_pharmacy(1, 10, "Main Street", true)
                .with_drug(2, "Metformin"),
        )
    }

    #[tokio::test]
    async fn insert_then_update_keeps_one_row() {
        let store = store();
        let first = update_price(&store, 1, 2, Decimal::new(999, 2)).await.unwrap();
        let second = update_price(&store, 1, 2, Decimal::new(1099, 2)).await.unwrap();
        assert_eq!(first, UpsertOutcome::Inserted);
        assert_eq!(second, UpsertOutcome::Updated);

        let prices = store.list_prices(1).await.unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices[0].price, Decimal::new(1099, 2));
    }

    #[tokio::test]
    async fn negative_price_is_rejected() {
        let err = update_price(&store(), 1, 2, Decimal::new(-1, 0)).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn sub_cent_and_oversized_prices_are_rejected() {
        let store = store();
        for price in [Decimal::new(12345, 3), Decimal::new(100_000_000, 0)] {
            let err = update_price(&store, 1, 2, price).await.unwrap_err();
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        }
        assert!(store.list_prices(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stored_price_is_padded_to_cents() {
        let store = store();
        update_price(&store, 1, 2, Decimal::new(125, 1)).await.unwrap();
        let prices = store.list_prices(1).await.unwrap();
        assert_eq!(prices[0].price.to_string(), "12.50");
    }

    #[tokio::test]
    async fn zero_price_is_allowed() {
        assert!(update_price(&store(), 1, 2, Decimal::ZERO).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_drug_is_not_found() {
        let err = update_price(&store(), 1, 404, Decimal::ONE).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
