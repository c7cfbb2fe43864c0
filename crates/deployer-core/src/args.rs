//! Constructor argument resolution.
//!
//! Declared arguments are matched against the constructor inputs of the
//! artifact's ABI. Literals are coerced to the parameter type; references
//! become the confirmed address of another contract.

use alloy_dyn_abi::{DynSolType, DynSolValue, Specifier};
use alloy_json_abi::Param;
use alloy_primitives::{Address, Bytes};
use deployer_config::{ConstructorArg, ContractConfig};
use deployer_types::ContractArtifact;
use thiserror::Error;

/// Errors that can occur while resolving constructor arguments.
#[derive(Debug, Error)]
pub enum ArgumentError {
	#[error("{contract}: constructor takes {expected} arguments, {declared} declared")]
	Count {
		contract: String,
		expected: usize,
		declared: usize,
	},
	#[error("{contract}: parameter {index} has unsupported type '{ty}': {reason}")]
	UnsupportedType {
		contract: String,
		index: usize,
		ty: String,
		reason: String,
	},
	#[error("{contract}: argument {index} cannot be converted to {ty}: {reason}")]
	InvalidValue {
		contract: String,
		index: usize,
		ty: String,
		reason: String,
	},
	#[error("{contract}: argument {index} references '{reference}' but the parameter type is {ty}")]
	ReferenceType {
		contract: String,
		index: usize,
		reference: String,
		ty: String,
	},
	#[error("{contract}: argument {index} references '{reference}', which has no confirmed address")]
	UnresolvedReference {
		contract: String,
		index: usize,
		reference: String,
	},
	#[error("{contract}: failed to ABI-encode constructor arguments")]
	Encoding { contract: String },
}

/// Checks declared arguments against the ABI without any deployed
/// addresses. References are checked for type only.
pub fn validate_constructor_args(
	contract: &ContractConfig,
	artifact: &ContractArtifact,
) -> Result<(), ArgumentError> {
	encode_constructor_args(contract, artifact, |_| Some(Address::ZERO)).map(|_| ())
}

/// ABI-encodes the constructor arguments of `contract`.
///
/// `address_of` returns the confirmed address of a referenced contract.
pub fn encode_constructor_args<F>(
	contract: &ContractConfig,
	artifact: &ContractArtifact,
	address_of: F,
) -> Result<Bytes, ArgumentError>
where
	F: Fn(&str) -> Option<Address>,
{
	let inputs = artifact.constructor_inputs();
	if inputs.len() != contract.args.len() {
		return Err(ArgumentError::Count {
			contract: contract.name.clone(),
			expected: inputs.len(),
			declared: contract.args.len(),
		});
	}
	if inputs.is_empty() {
		return Ok(Bytes::new());
	}

	let values = inputs
		.iter()
		.zip(&contract.args)
		.enumerate()
		.map(|(index, (param, arg))| resolve_arg(&contract.name, index, param, arg, &address_of))
		.collect::<Result<Vec<_>, _>>()?;

	DynSolValue::Tuple(values)
		.abi_encode_sequence()
		.map(Bytes::from)
		.ok_or_else(|| ArgumentError::Encoding {
			contract: contract.name.clone(),
		})
}

fn resolve_arg<F>(
	contract: &str,
	index: usize,
	param: &Param,
	arg: &ConstructorArg,
	address_of: &F,
) -> Result<DynSolValue, ArgumentError>
where
	F: Fn(&str) -> Option<Address>,
{
	let ty: DynSolType = param.resolve().map_err(|e| ArgumentError::UnsupportedType {
		contract: contract.to_string(),
		index,
		ty: param.ty.clone(),
		reason: e.to_string(),
	})?;

	if let Some(reference) = arg.reference() {
		if ty != DynSolType::Address {
			return Err(ArgumentError::ReferenceType {
				contract: contract.to_string(),
				index,
				reference: reference.to_string(),
				ty: param.ty.clone(),
			});
		}
		let address = address_of(reference).ok_or_else(|| ArgumentError::UnresolvedReference {
			contract: contract.to_string(),
			index,
			reference: reference.to_string(),
		})?;
		return Ok(DynSolValue::Address(address));
	}

	let literal = arg.literal().ok_or_else(|| ArgumentError::InvalidValue {
		contract: contract.to_string(),
		index,
		ty: param.ty.clone(),
		reason: "value has no ABI representation".to_string(),
	})?;
	ty.coerce_str(&literal)
		.map_err(|e| ArgumentError::InvalidValue {
			contract: contract.to_string(),
			index,
			ty: param.ty.clone(),
			reason: e.to_string(),
		})
}
