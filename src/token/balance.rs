/// ERC-20 `balanceOf` encoding, decoding and decimal scaling.
use crate::token::TokenError;
use ethers::abi::{self, ParamType, Token as AbiToken};
use ethers::types::{
    Address, Bytes, TransactionRequest, U256, transaction::eip2718::TypedTransaction,
};
use ethers::utils::id;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Largest scale a `Decimal` can carry.
const MAX_SCALE: u32 = 28;

/// Width of a `Decimal` mantissa.
const MANTISSA_BITS: usize = 96;

/// Largest power of ten below `U256::MAX`.
const MAX_U256_EXPONENT: u32 = 77;

/// parse address
pub fn parse_address(address: &str) -> Result<Address, TokenError> {
    Address::from_str(address.trim()).map_err(|_| TokenError::InvalidAddress(address.to_string()))
}

/// Calldata for `balanceOf(owner)`.
pub fn balance_of_call(owner: Address) -> Bytes {
    let mut data = id("balanceOf(address)").to_vec();
    data.extend(abi::encode(&[AbiToken::Address(owner)]));
    Bytes::from(data)
}

/// `eth_call` transaction reading `owner`'s balance on `contract`.
pub fn balance_of_transaction(owner: Address, contract: Address) -> TypedTransaction {
    TransactionRequest::new()
        .from(owner)
        .to(contract)
        .data(balance_of_call(owner))
        .into()
}

/// Decodes the single `uint256` a `balanceOf` call returns.
pub fn decode_balance(response: &[u8]) -> Result<U256, TokenError> {
    if response.is_empty() {
        return Err(TokenError::EmptyResponse);
    }
    let tokens = abi::decode(&[ParamType::Uint(256)], response)
        .map_err(|e| TokenError::Decode(format!("balanceOf: {}", e)))?;
    match tokens.as_slice() {
        [AbiToken::Uint(value)] => Ok(*value),
        other => Err(TokenError::Decode(format!(
            "balanceOf returned {} values",
            other.len()
        ))),
    }
}

/// Scales a base-unit amount by `10^-decimals`.
///
/// Exact for `decimals <= 28` while the amount fits a 96-bit mantissa.
/// Otherwise fractional digits are dropped, rounding half to even, until it
/// fits. `decimals == 0` passes the integer through. Only an integer part
/// wider than 96 bits is an overflow.
pub fn scale_balance(raw: U256, decimals: u32) -> Result<Decimal, TokenError> {
    let mut scale = decimals.min(MAX_SCALE);
    loop {
        let mantissa = if scale == decimals {
            raw
        } else {
            round_half_even(raw, decimals - scale)
        };
        if mantissa.bits() <= MANTISSA_BITS {
            return Ok(Decimal::from_i128_with_scale(
                mantissa.as_u128() as i128,
                scale,
            ));
        }
        if scale == 0 {
            return Err(TokenError::BalanceOverflow);
        }
        scale -= 1;
    }
}

/// `value / 10^exponent`, ties to even.
fn round_half_even(value: U256, exponent: u32) -> U256 {
    if exponent > MAX_U256_EXPONENT {
        return U256::zero();
    }
    let divisor = U256::exp10(exponent as usize);
    let (quotient, remainder) = value.div_mod(divisor);
    let rest = divisor - remainder;
    if remainder > rest || (remainder == rest && quotient.bit(0)) {
        quotient + U256::one()
    } else {
        quotient
    }
}
