use serde::Deserialize;

use crate::models::CurveType;

/// A market account as held by the settlement ledger: everything the pricing
/// engine needs to quote buys and sells.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketAccount {
    pub address: String,
    pub circulating_supply: u64,
    pub curve_type: CurveType,
    /// Base unit price at zero supply.
    pub base_price: u64,
    pub is_delegated: bool,
}

/// Wire shape of a market account. Kept loose on purpose: the strictness
/// lives in [`decode_market_account`], the single decode boundary.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMarketAccount {
    address: Option<String>,
    circulating_supply: Option<u64>,
    curve_type: Option<String>,
    base_price: Option<u64>,
    #[serde(default)]
    is_delegated: bool,
}

/// Decode a ledger market-account payload into the typed form.
///
/// Shape mismatches are rejected here with a descriptive error rather than
/// letting half-decoded records propagate.
pub fn decode_market_account(value: serde_json::Value) -> Result<MarketAccount, String> {
    let raw: RawMarketAccount =
        serde_json::from_value(value).map_err(|e| format!("malformed market account: {e}"))?;

    let address = raw
        .address
        .ok_or_else(|| "market account missing address".to_string())?;
    let circulating_supply = raw
        .circulating_supply
        .ok_or_else(|| "market account missing circulatingSupply".to_string())?;
    let base_price = raw
        .base_price
        .ok_or_else(|| "market account missing basePrice".to_string())?;

    let curve_raw = raw
        .curve_type
        .ok_or_else(|| "market account missing curveType".to_string())?;
    let curve_type = CurveType::from_str(&curve_raw)
        .ok_or_else(|| format!("unknown curve type: {curve_raw}"))?;

    Ok(MarketAccount {
        address,
        circulating_supply,
        curve_type,
        base_price,
        is_delegated: raw.is_delegated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_complete_account() {
        let account = decode_market_account(json!({
            "address": "mkt_abc",
            "circulatingSupply": 420,
            "curveType": "exponential",
            "basePrice": 1_000_000u64,
            "isDelegated": true
        }))
        .unwrap();

        assert_eq!(account.address, "mkt_abc");
        assert_eq!(account.circulating_supply, 420);
        assert_eq!(account.curve_type, CurveType::Exponential);
        assert_eq!(account.base_price, 1_000_000);
        assert!(account.is_delegated);
    }

    #[test]
    fn rejects_missing_fields() {
        let err = decode_market_account(json!({ "address": "mkt_abc" })).unwrap_err();
        assert!(err.contains("circulatingSupply"));
    }

    #[test]
    fn rejects_unknown_curve() {
        let err = decode_market_account(json!({
            "address": "mkt_abc",
            "circulatingSupply": 1,
            "curveType": "parabolic",
            "basePrice": 1
        }))
        .unwrap_err();
        assert!(err.contains("parabolic"));
    }
}
