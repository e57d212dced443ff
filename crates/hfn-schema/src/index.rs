//! The in-memory schema/package/module index.
//!
//! Built once from a [`ConfigPayload`] and then only read. Every lookup
//! table the codec and the client need is resolved here: schemas by
//! interned key, remote functions and RPCs by dotted name, RPCs by id for
//! inbound response decoding, and per-module state schemas.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::{ConfigPayload, FieldDef, SchemaDef};
use crate::SchemaError;

/// Interned reference to a schema: `(package id, schema id)`.
///
/// Schema ids are only unique within a package, so the package id is part
/// of the key. Record-typed fields carry this key instead of a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaKey {
    /// The owning package.
    pub package_id: u32,
    /// The schema id within the package.
    pub schema_id: u32,
}

impl fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.package_id, self.schema_id)
    }
}

/// The declared type of a field: one of the five scalar tags, or a
/// reference to another schema for nested records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Tag `s` — UTF-8 string.
    Str,
    /// Tag `i` — integer within the 32-bit signed range.
    Int,
    /// Tag `f` — any number.
    Float,
    /// Tag `b` — boolean.
    Bool,
    /// Tag `t` — byte-string.
    Bytes,
    /// A nested record bound to the referenced schema.
    Record(SchemaKey),
}

impl FieldType {
    fn parse(tag: &str) -> Result<Self, SchemaError> {
        match tag {
            "s" => Ok(FieldType::Str),
            "i" => Ok(FieldType::Int),
            "f" => Ok(FieldType::Float),
            "b" => Ok(FieldType::Bool),
            "t" => Ok(FieldType::Bytes),
            other => {
                // A schema reference: "<package id>-<schema id>".
                let (pkg, schema) = other
                    .split_once('-')
                    .ok_or_else(|| SchemaError::InvalidTypeTag(other.into()))?;
                let package_id = pkg
                    .parse()
                    .map_err(|_| SchemaError::InvalidTypeTag(other.into()))?;
                let schema_id = schema
                    .parse()
                    .map_err(|_| SchemaError::InvalidTypeTag(other.into()))?;
                Ok(FieldType::Record(SchemaKey {
                    package_id,
                    schema_id,
                }))
            }
        }
    }
}

/// One field of a schema. The type is immutable once the schema is built.
#[derive(Debug, Clone)]
pub struct Field {
    /// Numeric id, stable across schema versions; authoritative for wire
    /// encoding.
    pub id: u32,
    /// Human-facing name; authoritative for application access.
    pub name: String,
    /// Declared value type.
    pub ty: FieldType,
    /// Whether the field holds a list of its type.
    pub is_array: bool,
}

/// A record schema: an id and a set of fields addressable by id or name.
#[derive(Debug)]
pub struct Schema {
    /// The schema's interned key.
    pub key: SchemaKey,
    fields: Vec<Field>,
    by_id: HashMap<u32, usize>,
    by_name: HashMap<String, usize>,
}

impl Schema {
    fn build(package_id: u32, def: &SchemaDef) -> Result<Self, SchemaError> {
        let key = SchemaKey {
            package_id,
            schema_id: def.0,
        };
        let mut fields = Vec::with_capacity(def.1.len());
        let mut by_id = HashMap::new();
        let mut by_name = HashMap::new();

        for FieldDef(id, name, tag, is_array) in &def.1 {
            if by_id.contains_key(id) {
                return Err(SchemaError::DuplicateField { id: *id, schema: key });
            }
            let index = fields.len();
            by_id.insert(*id, index);
            by_name.insert(name.clone(), index);
            fields.push(Field {
                id: *id,
                name: name.clone(),
                ty: FieldType::parse(tag)?,
                is_array: *is_array != 0,
            });
        }

        Ok(Self {
            key,
            fields,
            by_id,
            by_name,
        })
    }

    /// Field lookup by wire id.
    pub fn field_by_id(&self, id: u32) -> Option<&Field> {
        self.by_id.get(&id).map(|i| &self.fields[*i])
    }

    /// Field lookup by name.
    pub fn field_by_name(&self, name: &str) -> Option<&Field> {
        self.by_name.get(name).map(|i| &self.fields[*i])
    }

    /// All fields in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }
}

/// A remote function resolved from the index.
#[derive(Debug, Clone)]
pub struct HfnDescriptor {
    /// Function id within its module.
    pub id: u32,
    /// Bare function name.
    pub name: String,
    /// Owning package id.
    pub package_id: u32,
    /// Owning module id.
    pub module_id: u32,
    /// Request payload schema.
    pub schema: Arc<Schema>,
}

/// An RPC resolved from the index.
#[derive(Debug, Clone)]
pub struct RpcDescriptor {
    /// RPC id within its package.
    pub id: u32,
    /// Bare RPC name.
    pub name: String,
    /// Owning package id.
    pub package_id: u32,
    /// Request payload schema.
    pub request: Arc<Schema>,
    /// Response payload schema.
    pub response: Arc<Schema>,
}

/// A named model resolved from the index.
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    /// Model id within its module.
    pub id: u32,
    /// Model name (`State` for the module state model).
    pub name: String,
    /// The model's schema.
    pub schema: Arc<Schema>,
}

#[derive(Debug)]
struct Module {
    name: String,
    state_schema: Option<Arc<Schema>>,
}

#[derive(Debug)]
struct Package {
    name: String,
    modules: HashMap<u32, Module>,
}

/// The complete, immutable lookup index built from a configuration payload.
#[derive(Debug)]
pub struct SchemaIndex {
    app_id: String,
    towers: Vec<String>,
    runway: Option<String>,
    schemas: HashMap<SchemaKey, Arc<Schema>>,
    packages: HashMap<u32, Package>,
    hfns: HashMap<String, HfnDescriptor>,
    rpcs: HashMap<String, RpcDescriptor>,
    rpcs_by_id: HashMap<(u32, u32), RpcDescriptor>,
    models: HashMap<String, ModelDescriptor>,
}

impl SchemaIndex {
    /// Parses a JSON configuration payload and builds the index.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let payload: ConfigPayload = serde_json::from_str(json)?;
        Self::from_config(payload)
    }

    /// Builds the index from an already-parsed payload.
    pub fn from_config(payload: ConfigPayload) -> Result<Self, SchemaError> {
        let ConfigPayload(app_id, towers, runway, package_defs) = payload;

        if runway.is_empty() && towers.is_empty() {
            return Err(SchemaError::MissingEndpoint);
        }

        // Schemas first, so module/rpc references (including cross-package
        // ones) can resolve in the second pass.
        let mut schemas = HashMap::new();
        for pkg in &package_defs {
            for schema_def in &pkg.3 {
                let schema = Schema::build(pkg.0, schema_def)?;
                schemas.insert(schema.key, Arc::new(schema));
            }
        }

        let resolve = |package_id: u32, schema_id: u32| {
            let key = SchemaKey {
                package_id,
                schema_id,
            };
            schemas
                .get(&key)
                .cloned()
                .ok_or(SchemaError::UnknownSchemaRef(key))
        };

        let mut packages = HashMap::new();
        let mut hfns = HashMap::new();
        let mut rpcs = HashMap::new();
        let mut rpcs_by_id = HashMap::new();
        let mut models = HashMap::new();

        for pkg in &package_defs {
            let package_id = pkg.0;
            let mut modules = HashMap::new();

            for module_def in &pkg.4 {
                let module_id = module_def.0;
                let module_name = &module_def.1;
                let mut state_schema = None;

                for model_def in &module_def.2 {
                    let schema = resolve(package_id, model_def.1)?;
                    let name = if model_def.2.is_empty() {
                        "State".to_string()
                    } else {
                        model_def.2.clone()
                    };
                    // Model id 0 is the module's pushed-state schema.
                    if model_def.0 == 0 {
                        state_schema = Some(schema.clone());
                    }
                    models.insert(
                        dotted(package_id, &pkg.1, module_name, &name),
                        ModelDescriptor {
                            id: model_def.0,
                            name,
                            schema,
                        },
                    );
                }

                for hfn_def in &module_def.3 {
                    let schema = resolve(package_id, hfn_def.1)?;
                    hfns.insert(
                        dotted(package_id, &pkg.1, module_name, &hfn_def.2),
                        HfnDescriptor {
                            id: hfn_def.0,
                            name: hfn_def.2.clone(),
                            package_id,
                            module_id,
                            schema,
                        },
                    );
                }

                modules.insert(
                    module_id,
                    Module {
                        name: module_name.clone(),
                        state_schema,
                    },
                );
            }

            for rpc_def in &pkg.5 {
                let descriptor = RpcDescriptor {
                    id: rpc_def.0,
                    name: rpc_def.1.clone(),
                    package_id,
                    request: resolve(package_id, rpc_def.2)?,
                    response: resolve(package_id, rpc_def.3)?,
                };
                let name = if package_id == 0 {
                    rpc_def.1.clone()
                } else {
                    format!("{}.{}", pkg.1, rpc_def.1)
                };
                rpcs_by_id.insert((package_id, rpc_def.0), descriptor.clone());
                rpcs.insert(name, descriptor);
            }

            packages.insert(
                package_id,
                Package {
                    name: pkg.1.clone(),
                    modules,
                },
            );
        }

        tracing::debug!(
            app_id = %app_id,
            packages = packages.len(),
            schemas = schemas.len(),
            hfns = hfns.len(),
            rpcs = rpcs.len(),
            "schema index built"
        );

        Ok(Self {
            app_id,
            towers,
            runway: if runway.is_empty() { None } else { Some(runway) },
            schemas,
            packages,
            hfns,
            rpcs,
            rpcs_by_id,
            models,
        })
    }

    /// The application id from the config.
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// The statically configured endpoint, if any.
    pub fn runway(&self) -> Option<&str> {
        self.runway.as_deref()
    }

    /// The candidate endpoint pool.
    pub fn towers(&self) -> &[String] {
        &self.towers
    }

    /// Schema lookup by interned key.
    pub fn schema(&self, key: SchemaKey) -> Option<Arc<Schema>> {
        self.schemas.get(&key).cloned()
    }

    /// Remote-function lookup by dotted name.
    pub fn hfn(&self, name: &str) -> Option<&HfnDescriptor> {
        self.hfns.get(name)
    }

    /// RPC lookup by dotted name.
    pub fn rpc(&self, name: &str) -> Option<&RpcDescriptor> {
        self.rpcs.get(name)
    }

    /// RPC lookup by (package id, rpc id), used for inbound responses.
    pub fn rpc_by_id(&self, package_id: u32, rpc_id: u32) -> Option<&RpcDescriptor> {
        self.rpcs_by_id.get(&(package_id, rpc_id))
    }

    /// Named-model lookup by dotted name.
    pub fn model(&self, name: &str) -> Option<&ModelDescriptor> {
        self.models.get(name)
    }

    /// The pushed-state schema (model id 0) of a module, if it has one.
    pub fn state_schema(
        &self,
        package_id: u32,
        module_id: u32,
    ) -> Option<Arc<Schema>> {
        self.packages
            .get(&package_id)?
            .modules
            .get(&module_id)?
            .state_schema
            .clone()
    }

    /// The name of a module, for diagnostics.
    pub fn module_name(&self, package_id: u32, module_id: u32) -> Option<&str> {
        self.packages
            .get(&package_id)?
            .modules
            .get(&module_id)
            .map(|m| m.name.as_str())
    }
}

/// Dotted lookup name: `pkg.module.item`, with the package segment omitted
/// for the anonymous package 0.
fn dotted(package_id: u32, package: &str, module: &str, item: &str) -> String {
    if package_id == 0 {
        format!("{module}.{item}")
    } else {
        format!("{package}.{module}.{item}")
    }
}
