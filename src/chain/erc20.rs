//! ERC-20 calldata and return-data handling

use crate::{Error, Result};
use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

sol! {
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function decimals() external view returns (uint8);
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

pub fn balance_of_calldata(account: Address) -> Bytes {
    IERC20::balanceOfCall { account }.abi_encode().into()
}

pub fn decimals_calldata() -> Bytes {
    IERC20::decimalsCall {}.abi_encode().into()
}

pub fn transfer_calldata(to: Address, amount: U256) -> Bytes {
    IERC20::transferCall { to, amount }.abi_encode().into()
}

/// Decode the first return word as a `uint256`.
///
/// Empty or short data is an error: a call to an address without code
/// succeeds with `0x`, which must not read as zero.
pub fn decode_uint(data: &[u8], function: &str) -> Result<U256> {
    if data.len() < 32 {
        return Err(Error::Rpc(format!(
            "{}() returned {} bytes, expected a 32-byte word (is this an ERC-20 contract?)",
            function,
            data.len()
        )));
    }
    Ok(U256::from_be_slice(&data[..32]))
}

pub fn decode_decimals(data: &[u8]) -> Result<u8> {
    let value = decode_uint(data, "decimals")?;
    u8::try_from(value)
        .map_err(|_| Error::Rpc(format!("decimals() returned {}, above 255", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::hex;
    use alloy::primitives::address;

    const RECIPIENT: Address = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");

    #[test]
    fn encodes_selectors_and_arguments() {
        assert_eq!(hex::encode(decimals_calldata()), "313ce567");

        let balance = balance_of_calldata(RECIPIENT);
        assert_eq!(&balance[..4], &hex::decode("70a08231").unwrap()[..]);
        assert_eq!(balance.len(), 4 + 32);
        assert_eq!(&balance[16..36], RECIPIENT.as_slice());

        let transfer = transfer_calldata(RECIPIENT, U256::from(1_500_000u64));
        assert_eq!(&transfer[..4], &hex::decode("a9059cbb").unwrap()[..]);
        assert_eq!(transfer.len(), 4 + 64);
        assert_eq!(U256::from_be_slice(&transfer[36..68]), U256::from(1_500_000u64));
    }

    #[test]
    fn decodes_words() {
        let mut word = [0u8; 32];
        word[31] = 6;
        assert_eq!(decode_decimals(&word).unwrap(), 6);
        assert_eq!(decode_uint(&word, "balanceOf").unwrap(), U256::from(6u8));
    }

    #[test]
    fn rejects_empty_or_short_data() {
        assert!(matches!(decode_decimals(&[]), Err(Error::Rpc(_))));
        assert!(decode_uint(&[0u8; 31], "balanceOf").is_err());
    }

    #[test]
    fn rejects_decimals_above_255() {
        let mut word = [0u8; 32];
        word[30] = 1; // 256
        assert!(decode_decimals(&word).is_err());
    }
}
