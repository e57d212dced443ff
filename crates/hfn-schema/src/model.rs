//! Schema-bound record instances.
//!
//! A [`Model`] is a sparse field store validated against its schema: an
//! absent field is unset, not null. Values are checked when set, not when
//! read. Nested record fields hold child `Model`s owned by the parent — a
//! tree, never a graph.

use std::collections::BTreeMap;
use std::sync::Arc;

use hfn_wire::{decode_seq, encode_seq, Value};

use crate::{Field, FieldType, Schema, SchemaError, SchemaIndex};

/// A value held by a model field.
#[derive(Debug, Clone)]
pub enum FieldValue {
    /// A scalar, or a list of scalars for array-typed fields.
    Scalar(Value),
    /// A nested record.
    Record(Box<Model>),
    /// A list of nested records for array-typed record fields.
    RecordList(Vec<Model>),
}

/// A schema-bound, sparse record instance.
///
/// Field ids key the internal store, so encoding order is deterministic
/// (ascending field id) regardless of the order fields were set in.
#[derive(Debug, Clone)]
pub struct Model {
    schema: Arc<Schema>,
    index: Arc<SchemaIndex>,
    values: BTreeMap<u32, FieldValue>,
}

impl Model {
    /// Creates an empty model bound to `schema`. The index is needed to
    /// resolve nested record schemas on demand.
    pub fn new(schema: Arc<Schema>, index: Arc<SchemaIndex>) -> Self {
        Self {
            schema,
            index,
            values: BTreeMap::new(),
        }
    }

    /// The schema this model is bound to.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Sets a scalar (or scalar-list) field by name. Returns `false` —
    /// without mutating — if the field is unknown, record-typed, or the
    /// value fails its type/array check.
    pub fn set(&mut self, name: &str, value: Value) -> bool {
        let Some(field) = self.schema.field_by_name(name).cloned() else {
            return false;
        };
        self.try_set(&field, FieldValue::Scalar(value))
    }

    /// Like [`Model::set`], addressing the field by wire id.
    pub fn set_by_id(&mut self, id: u32, value: Value) -> bool {
        let Some(field) = self.schema.field_by_id(id).cloned() else {
            return false;
        };
        self.try_set(&field, FieldValue::Scalar(value))
    }

    /// Sets a record-typed field to a nested model. The model must be bound
    /// to exactly the schema the field references.
    pub fn set_model(&mut self, name: &str, model: Model) -> bool {
        let Some(field) = self.schema.field_by_name(name).cloned() else {
            return false;
        };
        self.try_set(&field, FieldValue::Record(Box::new(model)))
    }

    /// Sets an array-typed record field to a list of nested models.
    pub fn set_models(&mut self, name: &str, models: Vec<Model>) -> bool {
        let Some(field) = self.schema.field_by_name(name).cloned() else {
            return false;
        };
        self.try_set(&field, FieldValue::RecordList(models))
    }

    /// Returns the value of a set field.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        let field = self.schema.field_by_name(name)?;
        self.values.get(&field.id)
    }

    /// Whether the field is currently set.
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Unsets a field.
    pub fn delete(&mut self, name: &str) {
        if let Some(field) = self.schema.field_by_name(name) {
            self.values.remove(&field.id);
        }
    }

    /// Names of all currently-set fields, in ascending field-id order.
    pub fn keys(&self) -> Vec<&str> {
        self.values
            .keys()
            .filter_map(|id| self.schema.field_by_id(*id))
            .map(|f| f.name.as_str())
            .collect()
    }

    fn try_set(&mut self, field: &Field, value: FieldValue) -> bool {
        let valid = match (&value, field.ty) {
            (FieldValue::Scalar(v), ty) => match ty {
                FieldType::Record(_) => false,
                scalar_ty => {
                    if field.is_array {
                        match v {
                            Value::List(items) => items
                                .iter()
                                .all(|item| check_scalar(item, scalar_ty)),
                            _ => false,
                        }
                    } else {
                        check_scalar(v, scalar_ty)
                    }
                }
            },
            (FieldValue::Record(model), FieldType::Record(key)) => {
                !field.is_array && model.schema.key == key
            }
            (FieldValue::RecordList(models), FieldType::Record(key)) => {
                field.is_array
                    && models.iter().all(|m| m.schema.key == key)
            }
            _ => false,
        };

        if valid {
            self.values.insert(field.id, value);
        }
        valid
    }

    /// Serializes the set fields as an interleaved `[fieldId, value]` wire
    /// sequence. Nested models are encoded depth-first and embedded as
    /// byte-strings, so the result is self-describing to any peer holding
    /// the same schema tree.
    pub fn encode(&self) -> Vec<u8> {
        let mut slots = Vec::with_capacity(self.values.len() * 2);
        for (id, value) in &self.values {
            slots.push(Value::Int(*id as i64));
            slots.push(match value {
                FieldValue::Scalar(v) => v.clone(),
                FieldValue::Record(model) => Value::Bytes(model.encode()),
                FieldValue::RecordList(models) => Value::List(
                    models
                        .iter()
                        .map(|m| Value::Bytes(m.encode()))
                        .collect(),
                ),
            });
        }
        encode_seq(&slots)
    }

    /// Decodes a model buffer into this model, two slots at a time.
    ///
    /// An unrecognized field id aborts decoding of the remainder; fields
    /// decoded before the abort are retained. Values that fail their field's
    /// type check are skipped, not fatal. Nested models that fail to decode
    /// are kept in their partial state, mirroring the top-level policy.
    pub fn decode(&mut self, data: &[u8]) -> Result<(), SchemaError> {
        if data.is_empty() {
            return Err(SchemaError::EmptyBuffer);
        }
        let slots = decode_seq(data)?;

        let mut iter = slots.into_iter();
        while let Some(id_slot) = iter.next() {
            let Some(id) = id_slot.as_int() else {
                return Err(SchemaError::MalformedSequence);
            };
            let Some(field) = u32::try_from(id)
                .ok()
                .and_then(|id| self.schema.field_by_id(id))
                .cloned()
            else {
                return Err(SchemaError::UnknownField(id));
            };
            let Some(value_slot) = iter.next() else {
                return Err(SchemaError::MalformedSequence);
            };

            match field.ty {
                FieldType::Record(key) => {
                    let Some(target) = self.index.schema(key) else {
                        return Err(SchemaError::UnknownSchemaRef(key));
                    };
                    self.decode_record(&field, target, value_slot);
                }
                _ => {
                    if !self.try_set(&field, FieldValue::Scalar(value_slot)) {
                        tracing::debug!(
                            field = %field.name,
                            "skipping type-mismatched value during decode"
                        );
                    }
                }
            }
        }
        Ok(())
    }

    fn decode_record(
        &mut self,
        field: &Field,
        target: Arc<Schema>,
        slot: Value,
    ) {
        let decode_child = |bytes: &[u8]| {
            let mut child = Model::new(target.clone(), self.index.clone());
            if let Err(error) = child.decode(bytes) {
                tracing::debug!(
                    field = %field.name,
                    %error,
                    "nested model decoded partially"
                );
            }
            child
        };

        let value = if field.is_array {
            let Value::List(items) = slot else {
                tracing::debug!(
                    field = %field.name,
                    "skipping non-list value for array record field"
                );
                return;
            };
            let models = items
                .iter()
                .filter_map(Value::as_bytes)
                .map(decode_child)
                .collect();
            FieldValue::RecordList(models)
        } else {
            let Some(bytes) = slot.as_bytes() else {
                tracing::debug!(
                    field = %field.name,
                    "skipping non-bytes value for record field"
                );
                return;
            };
            FieldValue::Record(Box::new(decode_child(bytes)))
        };

        self.try_set(field, value);
    }

    /// Fills the model from a plain, field-name-keyed nested map. Unknown
    /// keys are skipped; values that fail validation are skipped the same
    /// way [`Model::set`] rejects them.
    pub fn from_object(&mut self, obj: &Value) -> Result<&mut Self, SchemaError> {
        let Value::Map(entries) = obj else {
            return Err(SchemaError::NotAnObject);
        };

        for (key, value) in entries {
            let Some(field) = self.schema.field_by_name(key).cloned() else {
                continue;
            };

            match field.ty {
                FieldType::Record(schema_key) => {
                    let Some(target) = self.index.schema(schema_key) else {
                        return Err(SchemaError::UnknownSchemaRef(schema_key));
                    };
                    if field.is_array {
                        let Value::List(items) = value else {
                            continue;
                        };
                        let mut models = Vec::with_capacity(items.len());
                        for item in items {
                            let mut child = Model::new(
                                target.clone(),
                                self.index.clone(),
                            );
                            child.from_object(item)?;
                            models.push(child);
                        }
                        self.try_set(&field, FieldValue::RecordList(models));
                    } else {
                        let mut child =
                            Model::new(target.clone(), self.index.clone());
                        child.from_object(value)?;
                        self.try_set(
                            &field,
                            FieldValue::Record(Box::new(child)),
                        );
                    }
                }
                _ => {
                    self.try_set(&field, FieldValue::Scalar(value.clone()));
                }
            }
        }
        Ok(self)
    }

    /// Converts the model back to a plain, field-name-keyed nested map.
    pub fn to_object(&self) -> Value {
        let mut entries = Vec::with_capacity(self.values.len());
        for (id, value) in &self.values {
            let Some(field) = self.schema.field_by_id(*id) else {
                continue;
            };
            let out = match value {
                FieldValue::Scalar(v) => v.clone(),
                FieldValue::Record(model) => model.to_object(),
                FieldValue::RecordList(models) => Value::List(
                    models.iter().map(Model::to_object).collect(),
                ),
            };
            entries.push((field.name.clone(), out));
        }
        Value::Map(entries)
    }
}

fn check_scalar(value: &Value, ty: FieldType) -> bool {
    match ty {
        FieldType::Str => matches!(value, Value::Str(_)),
        FieldType::Int => matches!(
            value,
            Value::Int(n) if (-2_147_483_648..=2_147_483_647).contains(n)
        ),
        FieldType::Float => matches!(value, Value::Int(_) | Value::Float(_)),
        FieldType::Bool => matches!(value, Value::Bool(_)),
        FieldType::Bytes => matches!(value, Value::Bytes(_)),
        FieldType::Record(_) => false,
    }
}
