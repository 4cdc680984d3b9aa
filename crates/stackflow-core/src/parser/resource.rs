//! リソースノードのパース

use crate::error::{FlowError, Result};
use crate::model::{Declaration, Parameter, Properties, Reference, ResourceKind, Value};
use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use std::collections::BTreeMap;

/// 参照を表す型注釈: `(ref)"web1.id"`
const REF_ANNOTATION: &str = "ref";

/// リソースノードをパース
///
/// ```kdl
/// subnet "public-1" {
///     vpc (ref)"engineering-vpc"
///     cidr "10.0.0.0/24"
/// }
/// ```
pub fn parse_resource(kind: ResourceKind, node: &KdlNode) -> Result<Declaration> {
    let name = first_string_arg(node)
        .ok_or_else(|| FlowError::InvalidConfig(format!("{} requires a name", kind)))?;

    let mut properties = BTreeMap::new();

    // インラインのプロパティ（名前以外の key=value）
    for entry in node.entries().iter().skip(1) {
        if let Some(key) = entry.name() {
            insert_property(
                &mut properties,
                normalize_key(key.value()),
                entry_value(entry)?,
            );
        }
    }

    if let Some(children) = node.children() {
        for (key, value) in parse_block(children)? {
            insert_property(&mut properties, key, value);
        }
    }

    Ok(Declaration {
        kind,
        name,
        properties: Properties::from(properties),
    })
}

/// parameter ノードをパース
///
/// ```kdl
/// parameter "your_ip" description="..." default="..."
/// ```
pub fn parse_parameter(node: &KdlNode) -> Result<Parameter> {
    let name = first_string_arg(node)
        .ok_or_else(|| FlowError::InvalidConfig("parameter requires a name".to_string()))?;

    let mut parameter = Parameter {
        name,
        ..Default::default()
    };

    for entry in node.entries() {
        let Some(key) = entry.name() else { continue };
        let value = scalar_to_string(entry.value());
        match key.value() {
            "description" => parameter.description = value,
            "default" => parameter.default = value,
            other => {
                return Err(FlowError::InvalidConfig(format!(
                    "parameter '{}': unknown property '{}'",
                    parameter.name, other
                )));
            }
        }
    }

    Ok(parameter)
}

/// 子ブロックをプロパティのマップに変換
fn parse_block(doc: &KdlDocument) -> Result<BTreeMap<String, Value>> {
    let mut map = BTreeMap::new();
    for child in doc.nodes() {
        let key = normalize_key(child.name().value());
        let value = parse_property(child)?;
        insert_property(&mut map, key, value);
    }
    Ok(map)
}

/// プロパティノードを値に変換
///
/// - 引数1つ → スカラー/参照
/// - 引数複数 → リスト
/// - key=value のみ、または子ブロック → マップ
/// - 引数なし → true（フラグ）
fn parse_property(node: &KdlNode) -> Result<Value> {
    let key = node.name().value();
    let (args, props): (Vec<&KdlEntry>, Vec<&KdlEntry>) =
        node.entries().iter().partition(|e| e.name().is_none());

    if let Some(children) = node.children() {
        if !args.is_empty() {
            return Err(FlowError::InvalidConfig(format!(
                "'{}': 引数と子ブロックは同時に指定できません",
                key
            )));
        }
        let mut map = parse_block(children)?;
        for entry in props {
            if let Some(name) = entry.name() {
                insert_property(&mut map, normalize_key(name.value()), entry_value(entry)?);
            }
        }
        return Ok(Value::Map(map));
    }

    match (args.len(), props.len()) {
        (0, 0) => Ok(Value::Bool(true)),
        (0, _) => {
            let mut map = BTreeMap::new();
            for entry in props {
                if let Some(name) = entry.name() {
                    map.insert(normalize_key(name.value()), entry_value(entry)?);
                }
            }
            Ok(Value::Map(map))
        }
        (1, 0) => entry_value(args[0]),
        (_, 0) => Ok(Value::List(
            args.into_iter()
                .map(entry_value)
                .collect::<Result<Vec<_>>>()?,
        )),
        _ => Err(FlowError::InvalidConfig(format!(
            "'{}': 引数と key=value は同時に指定できません",
            key
        ))),
    }
}

/// エントリを値に変換（`(ref)` 注釈は参照になる）
fn entry_value(entry: &KdlEntry) -> Result<Value> {
    if let Some(ty) = entry.ty()
        && ty.value() == REF_ANNOTATION
    {
        let target = entry.value().as_string().ok_or_else(|| {
            FlowError::InvalidReference(format!("(ref) には文字列が必要です: {}", entry))
        })?;
        return Ok(Value::Ref(Reference::parse(target)?));
    }

    match entry.value() {
        KdlValue::String(s) => Ok(Value::String(s.clone())),
        KdlValue::Integer(i) => i64::try_from(*i).map(Value::Integer).map_err(|_| {
            FlowError::InvalidConfig(format!("整数が範囲外です: {}", i))
        }),
        KdlValue::Float(f) => Ok(Value::Float(*f)),
        KdlValue::Bool(b) => Ok(Value::Bool(*b)),
        KdlValue::Null => Err(FlowError::InvalidConfig(format!(
            "null は指定できません: {}",
            entry
        ))),
    }
}

/// 同じキーが繰り返された場合はリストにまとめる
fn insert_property(map: &mut BTreeMap<String, Value>, key: String, value: Value) {
    match map.remove(&key) {
        None => {
            map.insert(key, value);
        }
        Some(Value::List(mut items)) => {
            match value {
                Value::List(more) => items.extend(more),
                other => items.push(other),
            }
            map.insert(key, Value::List(items));
        }
        Some(existing) => {
            map.insert(key, Value::List(vec![existing, value]));
        }
    }
}

fn normalize_key(key: &str) -> String {
    key.replace('-', "_")
}

fn first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .first()
        .filter(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn scalar_to_string(value: &KdlValue) -> Option<String> {
    match value {
        KdlValue::String(s) => Some(s.clone()),
        KdlValue::Integer(i) => Some(i.to_string()),
        KdlValue::Float(f) => Some(f.to_string()),
        KdlValue::Bool(b) => Some(b.to_string()),
        KdlValue::Null => None,
    }
}
