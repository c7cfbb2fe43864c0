//! Contract declarations and constructor arguments.

use serde::{Deserialize, Serialize};

/// A contract to deploy, as declared in the configuration.
///
/// Declaration order is significant: the planner uses it to break ties
/// between contracts that do not depend on each other.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ContractConfig {
	/// Logical name; key of the deployment record.
	pub name: String,
	/// Artifact to deploy when it differs from the logical name, e.g. when
	/// the same compiled contract is deployed twice under different names.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub artifact: Option<String>,
	/// Contracts that must be confirmed before this one is submitted.
	#[serde(default)]
	pub depends_on: Vec<String>,
	/// Constructor arguments in ABI order.
	#[serde(default)]
	pub args: Vec<ConstructorArg>,
}

impl ContractConfig {
	/// Creates a declaration without dependencies or arguments.
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			artifact: None,
			depends_on: Vec::new(),
			args: Vec::new(),
		}
	}

	/// Adds an explicit dependency.
	pub fn depends_on(mut self, dependency: impl Into<String>) -> Self {
		self.depends_on.push(dependency.into());
		self
	}

	/// Appends a constructor argument.
	pub fn with_arg(mut self, arg: ConstructorArg) -> Self {
		self.args.push(arg);
		self
	}

	/// Sets the artifact name.
	pub fn with_artifact(mut self, artifact: impl Into<String>) -> Self {
		self.artifact = Some(artifact.into());
		self
	}

	/// Name of the artifact to look up in the registry.
	pub fn artifact_name(&self) -> &str {
		self.artifact.as_deref().unwrap_or(&self.name)
	}

	/// All dependencies of the contract.
	///
	/// Explicit `depends_on` entries come first, followed by contracts
	/// referenced from constructor arguments. Duplicates are removed and
	/// first-seen order is kept.
	pub fn dependencies(&self) -> Vec<String> {
		let mut deps: Vec<String> = Vec::new();
		let referenced = self.args.iter().filter_map(ConstructorArg::reference);
		for dep in self.depends_on.iter().map(String::as_str).chain(referenced) {
			if !deps.iter().any(|d| d == dep) {
				deps.push(dep.to_string());
			}
		}
		deps
	}
}

/// A single constructor argument.
///
/// Either a reference to another contract's deployed address written as
/// `{ contract = "Name" }`, or a literal TOML value that is coerced to the
/// constructor parameter type declared in the ABI.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ConstructorArg {
	/// Address of another contract deployed in the same network.
	Reference { contract: String },
	/// Literal value.
	Value(toml::Value),
}

impl ConstructorArg {
	/// Builds a reference argument.
	pub fn contract(name: impl Into<String>) -> Self {
		ConstructorArg::Reference {
			contract: name.into(),
		}
	}

	/// Builds a literal argument.
	pub fn value(value: impl Into<toml::Value>) -> Self {
		ConstructorArg::Value(value.into())
	}

	/// Name of the referenced contract, if this argument is a reference.
	pub fn reference(&self) -> Option<&str> {
		match self {
			ConstructorArg::Reference { contract } => Some(contract),
			ConstructorArg::Value(_) => None,
		}
	}

	/// Renders a literal in the textual form accepted by ABI coercion.
	///
	/// Returns `None` for references and for values that have no ABI
	/// representation (tables and datetimes).
	pub fn literal(&self) -> Option<String> {
		match self {
			ConstructorArg::Reference { .. } => None,
			ConstructorArg::Value(value) => render_literal(value, false),
		}
	}
}

fn render_literal(value: &toml::Value, nested: bool) -> Option<String> {
	match value {
		toml::Value::String(s) if nested => Some(format!("{s:?}")),
		toml::Value::String(s) => Some(s.clone()),
		toml::Value::Integer(i) => Some(i.to_string()),
		toml::Value::Float(f) => Some(f.to_string()),
		toml::Value::Boolean(b) => Some(b.to_string()),
		toml::Value::Array(items) => {
			let rendered = items
				.iter()
				.map(|item| render_literal(item, true))
				.collect::<Option<Vec<_>>>()?;
			Some(format!("[{}]", rendered.join(", ")))
		},
		toml::Value::Table(_) | toml::Value::Datetime(_) => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_dependencies_include_references_once() {
		let contract = ContractConfig::new("Market")
			.depends_on("Token")
			.with_arg(ConstructorArg::contract("Token"))
			.with_arg(ConstructorArg::contract("Oracle"))
			.with_arg(ConstructorArg::value(10));

		assert_eq!(contract.dependencies(), vec!["Token", "Oracle"]);
	}

	#[test]
	fn test_artifact_name_defaults_to_contract_name() {
		assert_eq!(ContractConfig::new("WafLog").artifact_name(), "WafLog");
		assert_eq!(
			ContractConfig::new("OutputOracle")
				.with_artifact("AlwaysYesOracle")
				.artifact_name(),
			"AlwaysYesOracle"
		);
	}

	#[test]
	fn test_literal_rendering() {
		assert_eq!(ConstructorArg::value("hello").literal().as_deref(), Some("hello"));
		assert_eq!(ConstructorArg::value(42).literal().as_deref(), Some("42"));
		assert_eq!(ConstructorArg::value(true).literal().as_deref(), Some("true"));

		let array = ConstructorArg::Value(toml::Value::Array(vec![
			toml::Value::String("a".into()),
			toml::Value::String("b".into()),
		]));
		assert_eq!(array.literal().as_deref(), Some(r#"["a", "b"]"#));

		assert!(ConstructorArg::contract("Token").literal().is_none());
	}

	#[test]
	fn test_untagged_parsing() {
		#[derive(Deserialize)]
		struct Wrapper {
			args: Vec<ConstructorArg>,
		}

		let parsed: Wrapper =
			toml::from_str(r#"args = [{ contract = "Token" }, "0xabc", 18]"#).unwrap();
		assert_eq!(parsed.args[0], ConstructorArg::contract("Token"));
		assert_eq!(parsed.args[1], ConstructorArg::value("0xabc"));
		assert_eq!(parsed.args[2], ConstructorArg::value(18));
	}
}
