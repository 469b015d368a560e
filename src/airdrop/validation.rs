use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;

use crate::airdrop::models::{AssetDescriptor, RecipientSpec};
use crate::error::ValidationError;
use crate::ledger::signer::Credential;

/// Base58 alphabet used by ledger addresses and seeds
const LEDGER_ALPHABET: &str = "rpshnaf39wBUDNEGHJKLM4PQRST7VWXYZ2bcdeCg65jkm8oFqi1tuvAxyz";

const MIN_AMOUNT: Decimal = dec!(0.000001);
const MAX_AMOUNT: Decimal = dec!(100000000000);

/// Native amounts are whole drops
const NATIVE_MAX_SCALE: u32 = 6;

fn in_alphabet(s: &str) -> bool {
    s.chars().all(|c| LEDGER_ALPHABET.contains(c))
}

/// Classic address syntax: `r` followed by 24 to 34 base58 characters
pub fn is_valid_address(address: &str) -> bool {
    address.starts_with('r') && (25..=35).contains(&address.len()) && in_alphabet(address)
}

pub fn validate_address(address: &str) -> Result<String, ValidationError> {
    let address = address.trim();
    if !is_valid_address(address) {
        return Err(ValidationError::InvalidAddress(address.to_string()));
    }
    Ok(address.to_string())
}

/// Three-character standard codes, 4-20 character codes sent hex-encoded, or
/// the raw 40-character hex form
pub fn validate_currency_code(code: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::InvalidCurrency(code.to_string());

    if code.eq_ignore_ascii_case("XRP") {
        return Err(invalid());
    }
    match code.len() {
        40 => {
            if !code.chars().all(|c| c.is_ascii_hexdigit()) || code.chars().all(|c| c == '0') {
                return Err(invalid());
            }
        }
        3..=20 => {
            if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(invalid());
            }
        }
        _ => return Err(invalid()),
    }
    Ok(())
}

pub fn validate_asset(asset: &AssetDescriptor) -> Result<AssetDescriptor, ValidationError> {
    match asset {
        AssetDescriptor::Native => Ok(AssetDescriptor::Native),
        AssetDescriptor::Issued { code, issuer } => {
            let code = code.trim();
            validate_currency_code(code)?;
            let issuer = validate_address(issuer)?;
            Ok(AssetDescriptor::Issued {
                code: code.to_string(),
                issuer,
            })
        }
    }
}

/// Positive and within the supported range, whatever the asset
pub fn validate_amount_range(amount: Decimal) -> Result<(), ValidationError> {
    if amount <= Decimal::ZERO {
        return Err(ValidationError::InvalidAmount(format!(
            "{} must be positive",
            amount
        )));
    }
    if amount < MIN_AMOUNT {
        return Err(ValidationError::InvalidAmount(format!(
            "{} is below the minimum of {}",
            amount, MIN_AMOUNT
        )));
    }
    if amount > MAX_AMOUNT {
        return Err(ValidationError::InvalidAmount(format!(
            "{} exceeds the maximum of {}",
            amount, MAX_AMOUNT
        )));
    }
    Ok(())
}

pub fn validate_amount(amount: Decimal, asset: &AssetDescriptor) -> Result<(), ValidationError> {
    validate_amount_range(amount)?;
    if *asset == AssetDescriptor::Native && amount.normalize().scale() > NATIVE_MAX_SCALE {
        return Err(ValidationError::InvalidAmount(format!(
            "{} has more than {} decimal places",
            amount, NATIVE_MAX_SCALE
        )));
    }
    Ok(())
}

/// Trim, check and price every recipient. Blank entries are ignored;
/// anything else that is malformed rejects the whole list.
pub fn normalize_recipients(
    specs: &[RecipientSpec],
    default_amount: Option<Decimal>,
    asset: &AssetDescriptor,
    max_recipients: usize,
) -> Result<Vec<(String, Decimal)>, ValidationError> {
    let mut seen = HashSet::new();
    let mut recipients = Vec::with_capacity(specs.len());

    for spec in specs {
        if spec.address().trim().is_empty() {
            continue;
        }

        let address = validate_address(spec.address())?;
        if !seen.insert(address.clone()) {
            return Err(ValidationError::DuplicateRecipient(address));
        }

        let amount = spec
            .amount()
            .or(default_amount)
            .ok_or_else(|| ValidationError::MissingAmount(address.clone()))?;
        validate_amount(amount, asset)?;

        recipients.push((address, amount));
    }

    if recipients.is_empty() {
        return Err(ValidationError::NoRecipients);
    }
    if recipients.len() > max_recipients {
        return Err(ValidationError::TooManyRecipients {
            count: recipients.len(),
            max: max_recipients,
        });
    }
    if let AssetDescriptor::Issued { issuer, .. } = asset {
        if seen.contains(issuer) {
            return Err(ValidationError::InvalidRequest(
                "the issuer cannot receive its own asset".to_string(),
            ));
        }
    }

    Ok(recipients)
}

/// Family seed (`s...`) or 32-character hex seed
pub fn is_valid_secret(secret: &str) -> bool {
    let secret = secret.trim();
    let family_seed =
        secret.starts_with('s') && (25..=35).contains(&secret.len()) && in_alphabet(secret);
    let hex_seed = secret.len() == 32 && secret.chars().all(|c| c.is_ascii_hexdigit());
    family_seed || hex_seed
}

pub fn validate_credential(credential: &Credential) -> Result<(), ValidationError> {
    match credential {
        Credential::Secret(secret) => {
            if !is_valid_secret(secret) {
                // never echo the secret
                return Err(ValidationError::InvalidCredential(
                    "secret is not a valid seed".to_string(),
                ));
            }
        }
        Credential::Interactive { account } => {
            if !is_valid_address(account) {
                return Err(ValidationError::InvalidCredential(format!(
                    "invalid signing account {}",
                    account
                )));
            }
        }
    }
    Ok(())
}
