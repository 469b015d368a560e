use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;

use crate::airdrop::models::AssetDescriptor;
use crate::airdrop::validation::is_valid_address;
use crate::ledger::models::{
    drops_to_xrp, encode_currency_code, AccountInfo, Network, Obligation, TrustLine,
};

/// Result of screening a pasted address list before building a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressCheck {
    /// First occurrence of each valid address, input order
    pub valid_addresses: Vec<String>,
    pub invalid_addresses: Vec<String>,
    pub summary: AddressCheckSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AddressCheckSummary {
    pub total_input: usize,
    pub valid_count: usize,
    pub invalid_count: usize,
    pub duplicates_removed: usize,
    pub blank_count: usize,
}

/// Unlike recipient normalization this never fails: bad entries are
/// reported, not rejected
pub fn check_addresses(addresses: &[String]) -> AddressCheck {
    let mut seen = HashSet::new();
    let mut valid_addresses = Vec::new();
    let mut invalid_addresses = Vec::new();
    let mut duplicates_removed = 0;
    let mut blank_count = 0;

    for raw in addresses {
        let address = raw.trim();
        if address.is_empty() {
            blank_count += 1;
        } else if !is_valid_address(address) {
            invalid_addresses.push(address.to_string());
        } else if seen.insert(address) {
            valid_addresses.push(address.to_string());
        } else {
            duplicates_removed += 1;
        }
    }

    AddressCheck {
        summary: AddressCheckSummary {
            total_input: addresses.len(),
            valid_count: valid_addresses.len(),
            invalid_count: invalid_addresses.len(),
            duplicates_removed,
            blank_count,
        },
        valid_addresses,
        invalid_addresses,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountBalance {
    pub account: String,
    pub network: Network,
    pub balance_drops: u64,
    #[serde(with = "rust_decimal::serde::str")]
    pub balance: Decimal,
    pub sequence: u32,
}

impl AccountBalance {
    pub fn new(network: Network, info: AccountInfo) -> Self {
        Self {
            balance: drops_to_xrp(info.balance_drops),
            balance_drops: info.balance_drops,
            sequence: info.sequence,
            account: info.account,
            network,
        }
    }
}

/// An asset the account holds and could distribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeldAsset {
    pub asset: AssetDescriptor,
    #[serde(with = "rust_decimal::serde::str")]
    pub balance: Decimal,
    /// Trust line limit; absent for the native asset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletAssets {
    pub account: String,
    pub network: Network,
    pub funded: bool,
    /// Native asset first, then issued assets with a positive balance
    pub assets: Vec<HeldAsset>,
}

/// `info` is `None` for an account that does not exist on the ledger yet
pub fn wallet_assets(
    account: &str,
    network: Network,
    info: Option<&AccountInfo>,
    lines: &[TrustLine],
) -> WalletAssets {
    let native = HeldAsset {
        asset: AssetDescriptor::Native,
        balance: info
            .map(|i| drops_to_xrp(i.balance_drops))
            .unwrap_or(Decimal::ZERO),
        limit: None,
    };

    // negative balances are lines where this account is the issuer
    let issued = lines
        .iter()
        .filter(|line| line.balance > Decimal::ZERO)
        .map(|line| HeldAsset {
            asset: AssetDescriptor::Issued {
                code: line.currency.clone(),
                issuer: line.counterparty.clone(),
            },
            balance: line.balance,
            limit: Some(line.limit.normalize().to_string()),
        });

    WalletAssets {
        account: account.to_string(),
        network,
        funded: info.is_some(),
        assets: std::iter::once(native).chain(issued).collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedToken {
    pub asset: AssetDescriptor,
    /// Held by all trust lines to the issuer combined
    #[serde(with = "rust_decimal::serde::str")]
    pub outstanding: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuerTokens {
    pub issuer: String,
    pub network: Network,
    pub tokens: Vec<IssuedToken>,
}

pub fn issuer_tokens(issuer: &str, network: Network, obligations: Vec<Obligation>) -> IssuerTokens {
    let tokens = obligations
        .into_iter()
        .map(|obligation| IssuedToken {
            asset: AssetDescriptor::Issued {
                code: obligation.currency,
                issuer: issuer.to_string(),
            },
            outstanding: obligation.amount,
        })
        .collect();

    IssuerTokens {
        issuer: issuer.to_string(),
        network,
        tokens,
    }
}

impl IssuerTokens {
    /// Matches a code given in either its short or its 40-digit hex form
    pub fn find(&self, code: &str) -> Option<&IssuedToken> {
        let wanted = encode_currency_code(code);
        self.tokens.iter().find(|token| match &token.asset {
            AssetDescriptor::Issued { code, .. } => encode_currency_code(code) == wanted,
            AssetDescriptor::Native => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const ADDR_A: &str = "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh";
    const ADDR_B: &str = "rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe";
    const ISSUER: &str = "rPEPPER7kfTD9w2To4CQk6UCfuHM9c6GDY";

    #[test]
    fn test_check_addresses_summary() {
        let input: Vec<String> = [
            ADDR_A,
            "  ",
            "not-an-address",
            ADDR_B,
            ADDR_A,
            " rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe ",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let check = check_addresses(&input);

        assert_eq!(check.valid_addresses, vec![ADDR_A, ADDR_B]);
        assert_eq!(check.invalid_addresses, vec!["not-an-address"]);
        assert_eq!(
            check.summary,
            AddressCheckSummary {
                total_input: 6,
                valid_count: 2,
                invalid_count: 1,
                duplicates_removed: 2,
                blank_count: 1,
            }
        );
    }

    #[test]
    fn test_wallet_assets_lists_native_first() {
        let info = AccountInfo {
            account: ADDR_A.to_string(),
            balance_drops: 25_500_000,
            sequence: 9,
        };
        let lines = vec![
            TrustLine {
                currency: "USD".to_string(),
                counterparty: ISSUER.to_string(),
                balance: dec!(40),
                limit: dec!(1000.00),
            },
            TrustLine {
                currency: "EUR".to_string(),
                counterparty: ISSUER.to_string(),
                balance: Decimal::ZERO,
                limit: dec!(10),
            },
            TrustLine {
                currency: "FOO".to_string(),
                counterparty: ADDR_B.to_string(),
                balance: dec!(-5),
                limit: Decimal::ZERO,
            },
        ];

        let wallet = wallet_assets(ADDR_A, Network::Testnet, Some(&info), &lines);

        assert!(wallet.funded);
        assert_eq!(wallet.assets.len(), 2);
        assert_eq!(wallet.assets[0].asset, AssetDescriptor::Native);
        assert_eq!(wallet.assets[0].balance, dec!(25.5));
        assert_eq!(
            wallet.assets[1].asset,
            AssetDescriptor::Issued {
                code: "USD".to_string(),
                issuer: ISSUER.to_string(),
            }
        );

        let json = serde_json::to_value(&wallet).unwrap();
        assert_eq!(json["assets"][0]["asset"]["type"], "native");
        assert!(json["assets"][0].get("limit").is_none());
        assert_eq!(json["assets"][1]["limit"], "1000");
    }

    #[test]
    fn test_unfunded_wallet_offers_native_only() {
        let wallet = wallet_assets(ADDR_A, Network::Mainnet, None, &[]);

        assert!(!wallet.funded);
        assert_eq!(wallet.assets.len(), 1);
        assert_eq!(wallet.assets[0].balance, Decimal::ZERO);
    }

    #[test]
    fn test_issuer_token_lookup_by_either_code_form() {
        let tokens = issuer_tokens(
            ISSUER,
            Network::Testnet,
            vec![
                Obligation {
                    currency: "534F4C4F00000000000000000000000000000000".to_string(),
                    amount: dec!(1000),
                },
                Obligation {
                    currency: "USD".to_string(),
                    amount: dec!(250.5),
                },
            ],
        );

        assert_eq!(tokens.tokens.len(), 2);
        assert_eq!(tokens.find("SOLO").unwrap().outstanding, dec!(1000));
        assert_eq!(tokens.find("USD").unwrap().outstanding, dec!(250.5));
        assert!(tokens.find("EUR").is_none());
    }
}
