//! Typed contract calls that can be sponsored by the paymaster.
//!
//! Each shape is validated when it is built and converts into the wire [`Call`] sent to the
//! paymaster, plus a [`CanonicalFields`] view used when signing or logging the intent.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use starknet::core::utils::{cairo_short_string_to_felt, get_selector_from_name};
use starknet_crypto::Felt;

use crate::canonical::CanonicalFields;
use crate::constants::signing::ORDER_AMOUNT_DECIMALS;
use crate::errors::{Error, Result};
use crate::signer::field::felt_to_hex;

/// Contract invocation in wire form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub to: Felt,
    pub selector: Felt,
    pub calldata: Vec<Felt>,
}

impl Call {
    pub fn to_json(&self) -> Value {
        json!({
            "to": felt_to_hex(&self.to),
            "selector": felt_to_hex(&self.selector),
            "calldata": self.calldata.iter().map(felt_to_hex).collect::<Vec<_>>(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    fn as_felt(&self) -> Felt {
        match self {
            TradeSide::Buy => Felt::ZERO,
            TradeSide::Sell => Felt::ONE,
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "BUY"),
            TradeSide::Sell => write!(f, "SELL"),
        }
    }
}

impl std::str::FromStr for TradeSide {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "BUY" => Ok(TradeSide::Buy),
            "SELL" => Ok(TradeSide::Sell),
            other => Err(Error::Validation(format!("Unknown trade side: {other}"))),
        }
    }
}

/// ERC-20 `transfer(recipient, amount: u256)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferCall {
    token: Felt,
    recipient: Felt,
    amount: u128,
}

impl TransferCall {
    pub fn new(token: Felt, recipient: Felt, amount: u128) -> Result<Self> {
        if token == Felt::ZERO || recipient == Felt::ZERO {
            return Err(Error::Validation(
                "Transfer token and recipient must be non-zero addresses".to_string(),
            ));
        }
        if amount == 0 {
            return Err(Error::Validation("Transfer amount must be positive".to_string()));
        }
        Ok(Self {
            token,
            recipient,
            amount,
        })
    }

    pub fn amount(&self) -> u128 {
        self.amount
    }

    pub fn to_call(&self) -> Result<Call> {
        Ok(Call {
            to: self.token,
            selector: selector("transfer")?,
            // u256 is encoded as (low, high)
            calldata: vec![self.recipient, Felt::from(self.amount), Felt::ZERO],
        })
    }

    pub fn canonical_fields(&self) -> CanonicalFields {
        CanonicalFields::new()
            .with("type", "transfer")
            .with("token", felt_to_hex(&self.token))
            .with("recipient", felt_to_hex(&self.recipient))
            .with("amount", self.amount)
    }
}

/// Order placement on the exchange contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeCall {
    exchange: Felt,
    market: String,
    side: TradeSide,
    quantity: Decimal,
    price: Decimal,
    nonce: u64,
}

impl TradeCall {
    pub fn new(
        exchange: Felt,
        market: &str,
        side: TradeSide,
        quantity: Decimal,
        price: Decimal,
        nonce: u64,
    ) -> Result<Self> {
        if exchange == Felt::ZERO {
            return Err(Error::Validation(
                "Exchange address must be non-zero".to_string(),
            ));
        }
        if market.is_empty() || market.len() > 31 || !market.is_ascii() {
            return Err(Error::Validation(format!(
                "Market must be 1-31 ASCII characters: {market:?}"
            )));
        }
        // Amounts are validated eagerly so `to_call` only fails on selector errors
        scale_amount("quantity", quantity)?;
        scale_amount("price", price)?;

        Ok(Self {
            exchange,
            market: market.to_string(),
            side,
            quantity,
            price,
            nonce,
        })
    }

    pub fn market(&self) -> &str {
        &self.market
    }

    pub fn side(&self) -> TradeSide {
        self.side
    }

    pub fn to_call(&self) -> Result<Call> {
        let market = cairo_short_string_to_felt(&self.market)
            .map_err(|e| Error::Validation(format!("Invalid market {}: {e}", self.market)))?;
        Ok(Call {
            to: self.exchange,
            selector: selector("place_order")?,
            calldata: vec![
                market,
                self.side.as_felt(),
                Felt::from(scale_amount("quantity", self.quantity)?),
                Felt::from(scale_amount("price", self.price)?),
                Felt::from(self.nonce),
            ],
        })
    }

    pub fn canonical_fields(&self) -> CanonicalFields {
        CanonicalFields::new()
            .with("type", "trade")
            .with("exchange", felt_to_hex(&self.exchange))
            .with("market", self.market.as_str())
            .with("side", self.side.to_string())
            .with("quantity", self.quantity)
            .with("price", self.price)
            .with("nonce", self.nonce)
    }
}

/// Arbitrary entrypoint invocation, for calls the typed shapes do not cover
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymasterCall {
    contract: Felt,
    entrypoint: String,
    calldata: Vec<Felt>,
}

impl PaymasterCall {
    pub fn new(contract: Felt, entrypoint: &str, calldata: Vec<Felt>) -> Result<Self> {
        if contract == Felt::ZERO {
            return Err(Error::Validation(
                "Contract address must be non-zero".to_string(),
            ));
        }
        if entrypoint.is_empty() {
            return Err(Error::Validation("Entrypoint must not be empty".to_string()));
        }
        selector(entrypoint)?;
        Ok(Self {
            contract,
            entrypoint: entrypoint.to_string(),
            calldata,
        })
    }

    pub fn to_call(&self) -> Result<Call> {
        Ok(Call {
            to: self.contract,
            selector: selector(&self.entrypoint)?,
            calldata: self.calldata.clone(),
        })
    }

    pub fn canonical_fields(&self) -> CanonicalFields {
        let calldata: Vec<String> = self.calldata.iter().map(felt_to_hex).collect();
        CanonicalFields::new()
            .with("type", "invoke")
            .with("contract", felt_to_hex(&self.contract))
            .with("entrypoint", self.entrypoint.as_str())
            .with("calldata", calldata.join(","))
    }
}

/// Any call the paymaster can sponsor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SponsoredCall {
    Transfer(TransferCall),
    Trade(TradeCall),
    Invoke(PaymasterCall),
}

impl SponsoredCall {
    pub fn to_call(&self) -> Result<Call> {
        match self {
            SponsoredCall::Transfer(call) => call.to_call(),
            SponsoredCall::Trade(call) => call.to_call(),
            SponsoredCall::Invoke(call) => call.to_call(),
        }
    }

    pub fn canonical_fields(&self) -> CanonicalFields {
        match self {
            SponsoredCall::Transfer(call) => call.canonical_fields(),
            SponsoredCall::Trade(call) => call.canonical_fields(),
            SponsoredCall::Invoke(call) => call.canonical_fields(),
        }
    }
}

impl From<TransferCall> for SponsoredCall {
    fn from(call: TransferCall) -> Self {
        SponsoredCall::Transfer(call)
    }
}

impl From<TradeCall> for SponsoredCall {
    fn from(call: TradeCall) -> Self {
        SponsoredCall::Trade(call)
    }
}

impl From<PaymasterCall> for SponsoredCall {
    fn from(call: PaymasterCall) -> Self {
        SponsoredCall::Invoke(call)
    }
}

/// Convert a list of sponsored calls into wire calls
pub fn to_wire_calls(calls: &[SponsoredCall]) -> Result<Vec<Call>> {
    calls.iter().map(SponsoredCall::to_call).collect()
}

fn selector(entrypoint: &str) -> Result<Felt> {
    get_selector_from_name(entrypoint)
        .map_err(|e| Error::Validation(format!("Invalid entrypoint {entrypoint:?}: {e}")))
}

/// Fixed-point integer with `ORDER_AMOUNT_DECIMALS` decimals
fn scale_amount(name: &str, value: Decimal) -> Result<u128> {
    if value <= Decimal::ZERO {
        return Err(Error::Validation(format!("Trade {name} must be positive")));
    }
    let normalized = value.normalize();
    let scale = normalized.scale();
    if scale > ORDER_AMOUNT_DECIMALS {
        return Err(Error::Validation(format!(
            "Trade {name} {value} has more than {ORDER_AMOUNT_DECIMALS} decimals"
        )));
    }
    let mantissa = u128::try_from(normalized.mantissa())
        .map_err(|_| Error::Validation(format!("Trade {name} {value} is out of range")))?;
    mantissa
        .checked_mul(10u128.pow(ORDER_AMOUNT_DECIMALS - scale))
        .ok_or_else(|| Error::Validation(format!("Trade {name} {value} is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use starknet::macros::felt;
    use std::str::FromStr;

    fn exchange() -> Felt {
        felt!("0x3f32e152b9637c31bfcf73e434f78591067a01ba070505ff6ee195642c9acfb")
    }

    #[test]
    fn test_transfer_calldata_splits_u256() {
        let call = TransferCall::new(felt!("0x49d36570"), felt!("0x123"), 1_000)
            .unwrap()
            .to_call()
            .unwrap();

        assert_eq!(call.selector, get_selector_from_name("transfer").unwrap());
        assert_eq!(
            call.calldata,
            vec![felt!("0x123"), Felt::from(1_000u64), Felt::ZERO]
        );
    }

    #[test]
    fn test_transfer_rejects_zero_values() {
        assert!(TransferCall::new(Felt::ZERO, felt!("0x1"), 1).is_err());
        assert!(TransferCall::new(felt!("0x1"), felt!("0x1"), 0).is_err());
    }

    #[test]
    fn test_trade_amounts_are_scaled() {
        let trade = TradeCall::new(
            exchange(),
            "BTC-USD",
            TradeSide::Sell,
            Decimal::from_str("0.1").unwrap(),
            Decimal::from_str("43250.5").unwrap(),
            7,
        )
        .unwrap();
        let call = trade.to_call().unwrap();

        assert_eq!(call.calldata[0], cairo_short_string_to_felt("BTC-USD").unwrap());
        assert_eq!(call.calldata[1], Felt::ONE);
        assert_eq!(call.calldata[2], Felt::from(10_000_000u64));
        assert_eq!(call.calldata[3], Felt::from(4_325_050_000_000u64));
        assert_eq!(call.calldata[4], Felt::from(7u64));
    }

    #[test]
    fn test_trade_rejects_excess_precision() {
        let err = TradeCall::new(
            exchange(),
            "ETH-USD",
            TradeSide::Buy,
            Decimal::from_str("0.000000001").unwrap(),
            Decimal::from_str("2000").unwrap(),
            1,
        )
        .unwrap_err();
        assert!(err.to_string().contains("decimals"));

        // Trailing zeros do not count as precision
        assert!(TradeCall::new(
            exchange(),
            "ETH-USD",
            TradeSide::Buy,
            Decimal::from_str("1.1000000000").unwrap(),
            Decimal::from_str("2000").unwrap(),
            1,
        )
        .is_ok());
    }

    #[test]
    fn test_trade_rejects_bad_market_and_amounts() {
        let qty = Decimal::from_str("1").unwrap();
        let long_market = "M".repeat(32);
        assert!(TradeCall::new(exchange(), "", TradeSide::Buy, qty, qty, 1).is_err());
        assert!(TradeCall::new(exchange(), &long_market, TradeSide::Buy, qty, qty, 1).is_err());
        assert!(TradeCall::new(exchange(), "BTC-USD", TradeSide::Buy, Decimal::ZERO, qty, 1).is_err());
        assert!(TradeCall::new(exchange(), "BTC-USD", TradeSide::Buy, qty, -qty, 1).is_err());
    }

    #[test]
    fn test_trade_canonical_fields() {
        let trade = TradeCall::new(
            exchange(),
            "BTC-USD",
            TradeSide::Buy,
            Decimal::from_str("0.10").unwrap(),
            Decimal::from_str("100").unwrap(),
            3,
        )
        .unwrap();
        let encoded = trade.canonical_fields().encode();
        assert!(encoded.contains("market=BTC-USD"));
        assert!(encoded.contains("quantity=0.10"));
        assert!(encoded.contains("side=BUY"));
        assert!(encoded.starts_with("exchange=0x3f32e152"));
    }

    #[test]
    fn test_paymaster_call_json() {
        let call: SponsoredCall = PaymasterCall::new(felt!("0xabc"), "approve", vec![felt!("0x1")])
            .unwrap()
            .into();
        let json = call.to_call().unwrap().to_json();

        assert_eq!(json["to"], "0xabc");
        assert_eq!(json["calldata"][0], "0x1");
        assert!(json["selector"].as_str().unwrap().starts_with("0x"));
        assert!(PaymasterCall::new(felt!("0xabc"), "", vec![]).is_err());
        assert!(PaymasterCall::new(felt!("0xabc"), "appröve", vec![]).is_err());
    }

    #[test]
    fn test_trade_side_parsing() {
        assert_eq!(TradeSide::from_str("buy").unwrap(), TradeSide::Buy);
        assert_eq!(TradeSide::from_str("SELL").unwrap(), TradeSide::Sell);
        assert!(TradeSide::from_str("hold").is_err());
    }
}
