//! The compact configuration payload shape.
//!
//! The payload is a positional JSON array — no key names on the wire, just
//! nested tuples. Serde's tuple-struct derive maps each level directly:
//!
//! ```text
//! [appId, towers, runway, [package...]]
//! package = [id, name, fullName, [schema...], [module...], [rpc...]]
//! schema  = [id, [field...]]           field = [id, name, type, isArray]
//! module  = [id, name, [model...], [hfn...]]
//! model   = [id, schemaId, name]       hfn   = [id, schemaId, name]
//! rpc     = [id, name, reqSchemaId, resSchemaId]
//! ```

use serde::Deserialize;

/// The top-level configuration payload: app id, tower pool, static runway,
/// packages.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigPayload(
    pub String,
    pub Vec<String>,
    pub String,
    pub Vec<PackageDef>,
);

/// One package: id, name, full name, schemas, modules, rpcs.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageDef(
    pub u32,
    pub String,
    pub String,
    pub Vec<SchemaDef>,
    pub Vec<ModuleDef>,
    pub Vec<RpcDef>,
);

/// One schema: id, fields.
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaDef(pub u32, pub Vec<FieldDef>);

/// One field: id, name, type tag, isArray flag (0/1).
#[derive(Debug, Clone, Deserialize)]
pub struct FieldDef(pub u32, pub String, pub String, pub u8);

/// One module: id, name, models, hfns.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleDef(pub u32, pub String, pub Vec<ModelDef>, pub Vec<HfnDef>);

/// One model: id, schema id, name.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelDef(pub u32, pub u32, pub String);

/// One remote function: id, schema id, name.
#[derive(Debug, Clone, Deserialize)]
pub struct HfnDef(pub u32, pub u32, pub String);

/// One rpc: id, name, request schema id, response schema id.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcDef(pub u32, pub String, pub u32, pub u32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_deserializes_from_positional_json() {
        let json = r#"[
            "app-1",
            ["wss://tower-1.example.com"],
            "",
            [[1, "chat", "com.example.chat",
              [[1, [[1, "text", "s", 0], [2, "tags", "s", 1]]]],
              [[1, "room", [[0, 1, "State"]], [[1, 1, "send"]]]],
              [[1, "history", 1, 1]]
            ]]
        ]"#;

        let payload: ConfigPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.0, "app-1");
        assert_eq!(payload.1.len(), 1);
        assert_eq!(payload.2, "");

        let pkg = &payload.3[0];
        assert_eq!(pkg.0, 1);
        assert_eq!(pkg.1, "chat");
        let field = &pkg.3[0].1[1];
        assert_eq!(field.1, "tags");
        assert_eq!(field.3, 1);
    }

    #[test]
    fn test_wrong_shape_is_rejected() {
        let result: Result<ConfigPayload, _> =
            serde_json::from_str(r#"{"id": "nope"}"#);
        assert!(result.is_err());
    }
}
