//! Layered settings for polymorphic models
//!
//! Sources are merged in priority order: environment variables > TOML file > defaults.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Prefix of the environment variables read by [`EnvSource::polymodels`]
pub const ENV_PREFIX: &str = "POLYMODELS_";

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("TOML error: {0}")]
	Toml(#[from] toml::de::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("Parse error: {0}")]
	Parse(String),

	#[error("Invalid setting `{key}`: {reason}")]
	Invalid { key: String, reason: String },
}

/// Naming conventions shared by every polymorphic type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolymodelsSettings {
	/// Name of the discriminator field declared on root types
	pub discriminator_field: String,
	/// Separator joining accessor path parts into an eager-load lookup
	pub lookup_separator: String,
	/// Primary key column of root tables
	pub pk_field: String,
	/// Suffix of the parent-link field on child tables (`animal` + `_ptr`)
	pub ptr_suffix: String,
}

impl Default for PolymodelsSettings {
	fn default() -> Self {
		Self {
			discriminator_field: "content_type".to_string(),
			lookup_separator: ".".to_string(),
			pk_field: "id".to_string(),
			ptr_suffix: "_ptr".to_string(),
		}
	}
}

impl PolymodelsSettings {
	/// Merge `sources` over the defaults, highest priority last
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_polymorphic::settings::{PolymodelsSettings, SettingsSource, SettingsError};
	/// use indexmap::IndexMap;
	/// use serde_json::Value;
	///
	/// struct Fixed;
	///
	/// impl SettingsSource for Fixed {
	///     fn load(&self) -> Result<IndexMap<String, Value>, SettingsError> {
	///         Ok(IndexMap::from([("lookup_separator".to_string(), Value::from("__"))]))
	///     }
	///     fn priority(&self) -> u8 { 10 }
	///     fn description(&self) -> String { "fixed".to_string() }
	/// }
	///
	/// let settings = PolymodelsSettings::from_sources(&[&Fixed]).unwrap();
	/// assert_eq!(settings.lookup_separator, "__");
	/// assert_eq!(settings.discriminator_field, "content_type");
	/// ```
	pub fn from_sources(sources: &[&dyn SettingsSource]) -> Result<Self, SettingsError> {
		let mut ordered: Vec<&dyn SettingsSource> = sources.to_vec();
		ordered.sort_by_key(|source| source.priority());

		let mut merged = match serde_json::to_value(Self::default())? {
			Value::Object(map) => map,
			_ => return Err(SettingsError::Parse("defaults are not an object".to_string())),
		};
		for source in ordered {
			let values = source.load()?;
			tracing::debug!(
				source = %source.description(),
				keys = values.len(),
				"loaded polymodels settings source"
			);
			merged.extend(values);
		}

		let settings: Self = serde_json::from_value(Value::Object(merged))?;
		settings.validate()?;
		Ok(settings)
	}

	/// Defaults, then `path` if given, then `POLYMODELS_*` environment variables
	pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
		let env = EnvSource::polymodels();
		match path {
			Some(path) => Self::from_sources(&[&TomlFileSource::new(path), &env]),
			None => Self::from_sources(&[&env]),
		}
	}

	pub fn validate(&self) -> Result<(), SettingsError> {
		let required = [
			("discriminator_field", &self.discriminator_field),
			("lookup_separator", &self.lookup_separator),
			("pk_field", &self.pk_field),
			("ptr_suffix", &self.ptr_suffix),
		];
		for (key, value) in required {
			if value.trim().is_empty() {
				return Err(SettingsError::Invalid {
					key: key.to_string(),
					reason: "must not be empty".to_string(),
				});
			}
		}
		Ok(())
	}

	/// Parent-link field a child declares towards `parent_link` (`animal_ptr`)
	pub fn ptr_field(&self, parent_link: &str) -> String {
		format!("{}{}", parent_link, self.ptr_suffix)
	}

	pub fn join_lookup(&self, parts: &[String]) -> String {
		parts.join(&self.lookup_separator)
	}
}

/// A layer of settings values
pub trait SettingsSource: Send + Sync {
	fn load(&self) -> Result<IndexMap<String, Value>, SettingsError>;

	/// Higher priority sources override lower ones
	fn priority(&self) -> u8;

	fn description(&self) -> String;
}

pub struct TomlFileSource {
	path: PathBuf,
}

impl TomlFileSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

impl SettingsSource for TomlFileSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SettingsError> {
		if !self.path.exists() {
			return Ok(IndexMap::new());
		}

		let content = fs::read_to_string(&self.path)?;
		let table: toml::Table = toml::from_str(&content)?;

		// A `[polymodels]` table wins over top-level keys
		let section = match table.get("polymodels") {
			Some(toml::Value::Table(section)) => section.clone(),
			_ => table,
		};
		let json = serde_json::to_value(section)?;
		let map = json
			.as_object()
			.ok_or_else(|| SettingsError::Parse("Expected table at root".to_string()))?;

		Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
	}

	fn priority(&self) -> u8 {
		50
	}

	fn description(&self) -> String {
		format!("TOML file: {}", self.path.display())
	}
}

pub struct EnvSource {
	prefix: String,
}

impl EnvSource {
	pub fn new(prefix: impl Into<String>) -> Self {
		Self {
			prefix: prefix.into(),
		}
	}

	pub fn polymodels() -> Self {
		Self::new(ENV_PREFIX)
	}
}

impl SettingsSource for EnvSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SettingsError> {
		Ok(std::env::vars()
			.filter_map(|(key, value)| {
				key.strip_prefix(&self.prefix)
					.map(|key| (key.to_lowercase(), Value::String(value)))
			})
			.collect())
	}

	fn priority(&self) -> u8 {
		100
	}

	fn description(&self) -> String {
		format!("Environment variables (prefix: {})", self.prefix)
	}
}
