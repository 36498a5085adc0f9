use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use crate::codec::{Codec, CodecOptions};
use crate::descriptor::{Descriptor, FieldDescriptor};
use crate::error::CodecError;
use crate::resolve::{self, TypeExpr};
use crate::wire::Wire;

/// Root registry configuration, parsed from TOML or JSON.
///
/// ```toml
/// [options]
/// max_string_len = 65536
///
/// [[records]]
/// name = "Quote"
/// fields = [
///     { name = "symbol", type = "String" },
///     { name = "levels", type = "List<Level>" },
/// ]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub options: CodecOptions,

    /// Record definitions. May reference each other in any order.
    #[serde(default)]
    pub records: Vec<RecordConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordConfig {
    pub name: String,
    /// Wire order is the order of this list.
    pub fields: Vec<FieldConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    /// Type expression, e.g. `Map<String, List<Int32>>`.
    #[serde(rename = "type")]
    pub ty: String,
}

/// Record descriptors by name, resolved once at registration.
///
/// Immutable once built; share it behind an `Arc` for concurrent use.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    records: HashMap<String, Descriptor>,
    options: CodecOptions,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every record in `config`. Fails on duplicate names, names that
    /// shadow built-in types, duplicate fields, unknown types and cycles.
    pub fn from_config(config: &RegistryConfig) -> Result<Self, CodecError> {
        let mut defs: HashMap<&str, Vec<(&str, TypeExpr)>> = HashMap::new();
        for record in &config.records {
            check_record_name(&record.name)?;
            let mut seen = HashSet::new();
            let mut fields = Vec::with_capacity(record.fields.len());
            for field in &record.fields {
                if !seen.insert(field.name.as_str()) {
                    return Err(CodecError::config(format!(
                        "record '{}': duplicate field '{}'",
                        record.name, field.name
                    )));
                }
                let expr = TypeExpr::parse(&field.ty)
                    .map_err(|e| e.with_context(&field.name).with_context(&record.name))?;
                fields.push((field.name.as_str(), expr));
            }
            if defs.insert(record.name.as_str(), fields).is_some() {
                return Err(CodecError::config(format!("duplicate record '{}'", record.name)));
            }
        }

        let mut builder = Builder {
            defs: &defs,
            done: HashMap::new(),
            visiting: Vec::new(),
        };
        for record in &config.records {
            builder.record(&record.name)?;
        }

        for name in builder.done.keys() {
            tracing::debug!(record = %name, "registered record");
        }
        Ok(Self {
            records: builder.done,
            options: config.options.clone(),
        })
    }

    pub fn from_toml_str(s: &str) -> Result<Self, CodecError> {
        let config: RegistryConfig = toml::from_str(s)?;
        Self::from_config(&config)
    }

    pub fn from_json_str(s: &str) -> Result<Self, CodecError> {
        let config: RegistryConfig = serde_json::from_str(s)?;
        Self::from_config(&config)
    }

    pub fn with_options(mut self, options: CodecOptions) -> Self {
        self.options = options;
        self
    }

    /// Register a derived record type, together with the records nested in it.
    ///
    /// Re-registering an identical definition is a no-op; a different
    /// definition under an existing name is an error. On error the registry
    /// is left unchanged.
    pub fn register<T: Wire>(&mut self) -> Result<&Descriptor, CodecError> {
        let descriptor = T::descriptor();
        let Descriptor::Record(record) = &descriptor else {
            return Err(CodecError::unsupported(format!(
                "'{descriptor}' is not a record type"
            )));
        };
        let name = record.name().to_string();

        let mut staged = HashMap::new();
        self.stage(&descriptor, &mut staged)?;
        for (staged_name, staged_descriptor) in staged {
            tracing::debug!(record = %staged_name, "registered record");
            self.records.insert(staged_name, staged_descriptor);
        }

        self.records
            .get(&name)
            .ok_or_else(|| CodecError::unsupported(format!("unknown record type '{name}'")))
    }

    /// Collect the records in `descriptor` that are not registered yet.
    fn stage(
        &self,
        descriptor: &Descriptor,
        staged: &mut HashMap<String, Descriptor>,
    ) -> Result<(), CodecError> {
        match descriptor {
            Descriptor::List(element) => self.stage(element, staged),
            Descriptor::Map(key, value) => {
                self.stage(key, staged)?;
                self.stage(value, staged)
            }
            Descriptor::Record(record) => {
                let name = record.name();
                match self.records.get(name).or_else(|| staged.get(name)) {
                    Some(existing) if existing == descriptor => return Ok(()),
                    Some(_) => {
                        return Err(CodecError::config(format!(
                            "conflicting definitions for record '{name}'"
                        )));
                    }
                    None => check_record_name(name)?,
                }
                for field in record.fields() {
                    self.stage(&field.descriptor, staged)?;
                }
                staged.insert(name.to_string(), descriptor.clone());
                Ok(())
            }
            _ => Ok(()),
        }
    }

    pub fn record(&self, name: &str) -> Option<&Descriptor> {
        self.records.get(name)
    }

    pub fn record_names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Resolve a type expression against built-ins and registered records.
    pub fn resolve(&self, expr: &str) -> Result<Descriptor, CodecError> {
        let expr = TypeExpr::parse(expr)?;
        resolve::resolve_with(&expr, &mut |name| Ok(self.records.get(name).cloned()))
    }

    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    /// Codec configured with this registry's options.
    pub fn codec(&self) -> Codec {
        Codec::new(self.options.clone())
    }
}

/// A record name must be a bare identifier in type expressions and must not
/// collide with a built-in type.
fn check_record_name(name: &str) -> Result<(), CodecError> {
    match TypeExpr::parse(name) {
        Ok(expr) if expr.args.is_empty() && expr.name == name => {}
        _ => {
            return Err(CodecError::config(format!(
                "record name '{name}' is not a valid type name"
            )));
        }
    }
    if resolve::is_reserved(name) {
        return Err(CodecError::config(format!(
            "record name '{name}' shadows a built-in type"
        )));
    }
    Ok(())
}

/// Depth-first record resolution with memoization and cycle detection.
struct Builder<'a> {
    defs: &'a HashMap<&'a str, Vec<(&'a str, TypeExpr)>>,
    done: HashMap<String, Descriptor>,
    visiting: Vec<&'a str>,
}

impl<'a> Builder<'a> {
    fn record(&mut self, name: &str) -> Result<Option<Descriptor>, CodecError> {
        if let Some(d) = self.done.get(name) {
            return Ok(Some(d.clone()));
        }
        let defs = self.defs;
        let Some((&name, fields)) = defs.get_key_value(name) else {
            return Ok(None);
        };
        if let Some(start) = self.visiting.iter().position(|n| *n == name) {
            let mut chain = self.visiting[start..].to_vec();
            chain.push(name);
            return Err(CodecError::unsupported(format!(
                "self-referential record '{name}' ({})",
                chain.join(" -> ")
            )));
        }

        self.visiting.push(name);
        let mut resolved = Vec::with_capacity(fields.len());
        for (field, expr) in fields {
            let descriptor = resolve::resolve_with(expr, &mut |n| self.record(n))
                .map_err(|e| e.with_context(field).with_context(name))?;
            resolved.push(FieldDescriptor::new(*field, descriptor));
        }
        self.visiting.pop();

        let descriptor = Descriptor::record(name, resolved);
        self.done.insert(name.to_string(), descriptor.clone());
        Ok(Some(descriptor))
    }
}
