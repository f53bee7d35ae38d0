//! Constructor argument coercion and ABI encoding.

use alloy_core::{
    dyn_abi::{DynSolType, DynSolValue, Specifier},
    json_abi::JsonAbi,
    primitives::{Address, U256},
};
use anyhow::{Context, Result};

/// A constructor argument after step references have been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgInput<'a> {
    /// Literal text, parsed according to the declared parameter type.
    Literal(&'a str),
    /// An address produced by an earlier step.
    Address(Address),
}

/// A constructor parameter declared by an ABI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructorInput {
    pub name: String,
    pub ty: DynSolType,
}

/// Constructor parameters declared by `abi`, in order.
///
/// An ABI without a constructor entry declares no parameters.
pub fn constructor_inputs(abi: &JsonAbi) -> Result<Vec<ConstructorInput>> {
    let Some(constructor) = &abi.constructor else {
        return Ok(Vec::new());
    };

    constructor
        .inputs
        .iter()
        .map(|param| {
            let ty = param.resolve().map_err(|e| {
                anyhow::anyhow!("unsupported constructor parameter type '{}': {}", param.ty, e)
            })?;
            Ok(ConstructorInput {
                name: param.name.clone(),
                ty,
            })
        })
        .collect()
}

/// Coerce resolved arguments into typed ABI values.
pub fn coerce_args(inputs: &[ConstructorInput], args: &[ArgInput<'_>]) -> Result<Vec<DynSolValue>> {
    if inputs.len() != args.len() {
        anyhow::bail!(
            "Constructor expects {} argument(s), got {}",
            inputs.len(),
            args.len()
        );
    }

    inputs
        .iter()
        .zip(args)
        .enumerate()
        .map(|(i, (input, arg))| {
            coerce_arg(&input.ty, arg).with_context(|| {
                format!(
                    "Invalid constructor argument #{} ({}: {})",
                    i + 1,
                    input.name,
                    input.ty.sol_type_name()
                )
            })
        })
        .collect()
}

fn coerce_arg(ty: &DynSolType, arg: &ArgInput<'_>) -> Result<DynSolValue> {
    match (ty, arg) {
        (DynSolType::Address, ArgInput::Address(address)) => Ok(DynSolValue::Address(*address)),
        (DynSolType::Address, ArgInput::Literal(raw)) => raw
            .trim()
            .parse::<Address>()
            .map(DynSolValue::Address)
            .map_err(|e| anyhow::anyhow!("invalid address '{}': {}", raw, e)),
        (_, ArgInput::Address(_)) => anyhow::bail!(
            "a deployed address cannot be passed as {}",
            ty.sol_type_name()
        ),
        (DynSolType::Uint(bits), ArgInput::Literal(raw)) => {
            let value = parse_uint(raw)?;
            if value.bit_len() > *bits {
                anyhow::bail!("{} does not fit in uint{}", raw, bits);
            }
            Ok(DynSolValue::Uint(value, *bits))
        }
        (_, ArgInput::Literal(raw)) => ty.coerce_str(raw).map_err(|e| {
            anyhow::anyhow!("cannot parse '{}' as {}: {}", raw, ty.sol_type_name(), e)
        }),
    }
}

/// Parse an unsigned integer literal.
///
/// Accepts decimal (`26400000`), hex (`0x64`) and exponent shorthand (`7e16`).
/// Underscores are ignored.
pub fn parse_uint(raw: &str) -> Result<U256> {
    let s = raw.trim().replace('_', "");

    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if hex.is_empty() {
            anyhow::bail!("invalid hex integer '{}': no digits", raw);
        }
        return U256::from_str_radix(hex, 16)
            .map_err(|e| anyhow::anyhow!("invalid hex integer '{}': {}", raw, e));
    }

    if let Some((mantissa, exponent)) = s.split_once(['e', 'E']) {
        if mantissa.is_empty() {
            anyhow::bail!("invalid integer '{}': missing mantissa", raw);
        }
        let mantissa = U256::from_str_radix(mantissa, 10)
            .map_err(|e| anyhow::anyhow!("invalid integer '{}': {}", raw, e))?;
        let exponent: u64 = exponent
            .parse()
            .with_context(|| format!("invalid exponent in '{}'", raw))?;
        return U256::from(10u64)
            .checked_pow(U256::from(exponent))
            .and_then(|scale| mantissa.checked_mul(scale))
            .with_context(|| format!("'{}' overflows uint256", raw));
    }

    if s.is_empty() {
        anyhow::bail!("invalid integer '{}': no digits", raw);
    }

    U256::from_str_radix(&s, 10).map_err(|e| anyhow::anyhow!("invalid integer '{}': {}", raw, e))
}

/// ABI-encode constructor arguments as function parameters.
pub fn encode_args(values: &[DynSolValue]) -> Vec<u8> {
    if values.is_empty() {
        return Vec::new();
    }
    DynSolValue::Tuple(values.to_vec()).abi_encode_params()
}

/// Render a value for logs and deployment records.
pub fn format_value(value: &DynSolValue) -> String {
    match value {
        DynSolValue::Address(address) => address.to_checksum(None),
        DynSolValue::Uint(v, _) => v.to_string(),
        DynSolValue::Int(v, _) => v.to_string(),
        DynSolValue::Bool(b) => b.to_string(),
        DynSolValue::String(s) => s.clone(),
        DynSolValue::Bytes(b) => format!("0x{}", hex::encode(b)),
        DynSolValue::FixedBytes(word, size) => format!("0x{}", hex::encode(&word[..*size])),
        other => format!("{other:?}"),
    }
}
