//! Liquidity of phantom pools.
//!
//! The nominal balances of a phantom pool are linear pool share tokens which
//! have no price of their own. The pool's value is the part of every linear
//! pool's main and wrapped balances it owns, valued at the main token's price.

use {
    super::onchain::{OnchainLinearPool, OnchainPoolData},
    crate::prices::Prices,
    alloy::primitives::Address,
    anyhow::{Context, Result},
    bigdecimal::{BigDecimal, Zero},
    indexmap::IndexMap,
    number::{conversions::checked_div, units::format_units},
};

pub fn unwrapped_tokens(linear_pools: &IndexMap<Address, OnchainLinearPool>) -> Vec<Address> {
    linear_pools
        .values()
        .map(|linear| linear.unwrapped_token_address)
        .collect()
}

/// Sums, for every linear pool, the phantom pool's share of the main and
/// wrapped balances in USD. Wrapped balances are converted to main token
/// amounts with the wrapped token's price rate.
///
/// Linear pools whose main token has no USD price contribute nothing at all.
pub fn phantom_total_liquidity(
    onchain: &OnchainPoolData,
    linear_pools: &IndexMap<Address, OnchainLinearPool>,
    prices: &Prices,
) -> Result<BigDecimal> {
    let mut total = BigDecimal::zero();
    for (address, linear) in linear_pools {
        let Some(price) = prices.usd(&linear.main_token.address) else {
            tracing::debug!(
                linear_pool = %address,
                main_token = %linear.main_token.address,
                "no price for main token, leaving linear pool out of liquidity"
            );
            continue;
        };

        let balance = onchain
            .balance_of(address)
            .with_context(|| format!("no balance of linear pool {address}"))?;
        let share = checked_div(balance, &linear.total_supply)
            .with_context(|| format!("linear pool {address} has no supply"))?;

        let main = &linear.main_token;
        let wrapped = &linear.wrapped_token;
        let main_value = format_units(main.balance, main.decimals) * &share * &price;
        let wrapped_value =
            format_units(wrapped.balance, wrapped.decimals) * &share * &price * &wrapped.price_rate;
        total += main_value + wrapped_value;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            pools::{
                PoolId,
                onchain::{LinearPoolToken, OnchainTokenData},
            },
            prices::FiatCurrency,
        },
        alloy::primitives::U256,
        maplit::hashmap,
        std::str::FromStr,
    };

    fn decimal(value: &str) -> BigDecimal {
        BigDecimal::from_str(value).unwrap()
    }

    fn token(address: Address, balance: U256, decimals: u8, price_rate: &str) -> LinearPoolToken {
        LinearPoolToken {
            address,
            index: 0,
            balance,
            price_rate: decimal(price_rate),
            decimals,
        }
    }

    struct Linear {
        address: Address,
        main: Address,
        main_balance: U256,
        wrapped_balance: U256,
        wrapped_rate: &'static str,
        total_supply: &'static str,
        held_by_phantom: &'static str,
    }

    fn setup(linears: &[Linear]) -> (OnchainPoolData, IndexMap<Address, OnchainLinearPool>) {
        let tokens = linears
            .iter()
            .map(|linear| {
                let data = OnchainTokenData {
                    balance: decimal(linear.held_by_phantom),
                    weight: None,
                    decimals: 18,
                    price_rate: 1.into(),
                };
                (linear.address, data)
            })
            .collect();
        let linear_pools: IndexMap<_, _> = linears
            .iter()
            .map(|linear| {
                let pool = OnchainLinearPool {
                    id: PoolId::default(),
                    main_token: token(linear.main, linear.main_balance, 6, "1"),
                    wrapped_token: token(
                        Address::repeat_byte(0xee),
                        linear.wrapped_balance,
                        18,
                        linear.wrapped_rate,
                    ),
                    total_supply: decimal(linear.total_supply),
                    unwrapped_token_address: linear.main,
                };
                (linear.address, pool)
            })
            .collect();
        let onchain = OnchainPoolData {
            tokens,
            total_supply: 1000.into(),
            swap_fee: decimal("0.0001"),
            decimals: 18,
            linear_pools: Some(linear_pools.clone()),
        };
        (onchain, linear_pools)
    }

    fn two_linear_pools() -> [Linear; 2] {
        [
            Linear {
                address: Address::repeat_byte(0x11),
                main: Address::repeat_byte(0x21),
                // 1 main token, 2 wrapped tokens
                main_balance: U256::from(1_000_000),
                wrapped_balance: U256::from(2_000_000_000_000_000_000_u128),
                wrapped_rate: "1.05",
                total_supply: "100",
                held_by_phantom: "50",
            },
            Linear {
                address: Address::repeat_byte(0x12),
                main: Address::repeat_byte(0x22),
                // 4 main tokens, 8 wrapped tokens
                main_balance: U256::from(4_000_000),
                wrapped_balance: U256::from(8_000_000_000_000_000_000_u128),
                wrapped_rate: "1.1",
                total_supply: "120",
                held_by_phantom: "30",
            },
        ]
    }

    #[test]
    fn sums_linear_pools_exactly() {
        let (onchain, linear_pools) = setup(&two_linear_pools());
        let prices = Prices::new(hashmap! {
            Address::repeat_byte(0x21) => hashmap! { FiatCurrency::Usd => 0.1 },
            Address::repeat_byte(0x22) => hashmap! { FiatCurrency::Usd => 0.3 },
        });

        // 1 * 0.5 * 0.1 + 2 * 0.5 * 0.1 * 1.05 = 0.155
        // 4 * 0.25 * 0.3 + 8 * 0.25 * 0.3 * 1.1 = 0.96
        assert_eq!(
            phantom_total_liquidity(&onchain, &linear_pools, &prices).unwrap(),
            decimal("1.115")
        );
        assert_eq!(
            unwrapped_tokens(&linear_pools),
            [Address::repeat_byte(0x21), Address::repeat_byte(0x22)]
        );
    }

    #[test]
    fn unpriced_main_token_omits_both_terms() {
        let (onchain, linear_pools) = setup(&two_linear_pools());
        let prices = Prices::new(hashmap! {
            Address::repeat_byte(0x21) => hashmap! { FiatCurrency::Usd => 0.1 },
            // A price for the wrapped token alone does not count.
            Address::repeat_byte(0xee) => hashmap! { FiatCurrency::Usd => 5.0 },
        });

        assert_eq!(
            phantom_total_liquidity(&onchain, &linear_pools, &prices).unwrap(),
            decimal("0.155")
        );
    }

    #[test]
    fn zero_supply_is_an_error() {
        let mut linears = two_linear_pools();
        linears[1].total_supply = "0";
        let (onchain, linear_pools) = setup(&linears);
        let prices = Prices::new(hashmap! {
            Address::repeat_byte(0x22) => hashmap! { FiatCurrency::Usd => 1.0 },
        });

        assert!(phantom_total_liquidity(&onchain, &linear_pools, &prices).is_err());
    }

    #[test]
    fn missing_balance_is_an_error() {
        let (mut onchain, linear_pools) = setup(&two_linear_pools());
        onchain.tokens.shift_remove(&Address::repeat_byte(0x11));
        let prices = Prices::new(hashmap! {
            Address::repeat_byte(0x21) => hashmap! { FiatCurrency::Usd => 1.0 },
        });

        assert!(phantom_total_liquidity(&onchain, &linear_pools, &prices).is_err());
    }
}
