// 型解決レジストリ
//
// リフレクションされたカラム型を、生成モジュール内で参照可能な
// テキストに解決します。解決順序は、登録済みクラスの完全一致、
// 継承関係（is-a）、sqlalchemyモジュールパスに基づく方言判定の順です。

use std::collections::{BTreeMap, HashMap};

use crate::core::error::GenerateError;
use crate::core::reflect::{PyValue, TypeArg, TypeDef};

/// 方言モジュールが公開する型クラス名
///
/// 元実装は方言モジュールを動的インポートして属性の有無を調べますが、
/// ここでは既知の公開リストを静的に持ちます。
const POSTGRESQL_TYPES: &[&str] = &[
    "ARRAY", "BIGINT", "BIT", "BOOLEAN", "BYTEA", "CHAR", "CIDR", "CITEXT",
    "DATE", "DATEMULTIRANGE", "DATERANGE", "DOMAIN", "DOUBLE_PRECISION",
    "ENUM", "FLOAT", "HSTORE", "INET", "INT4MULTIRANGE", "INT4RANGE",
    "INT8MULTIRANGE", "INT8RANGE", "INTEGER", "INTERVAL", "JSON", "JSONB",
    "JSONPATH", "MACADDR", "MACADDR8", "MONEY", "NUMERIC", "NUMMULTIRANGE",
    "NUMRANGE", "OID", "REAL", "REGCLASS", "REGCONFIG", "SMALLINT", "TEXT",
    "TIME", "TIMESTAMP", "TSMULTIRANGE", "TSQUERY", "TSRANGE",
    "TSTZMULTIRANGE", "TSTZRANGE", "TSVECTOR", "UUID", "VARCHAR",
];

const MYSQL_TYPES: &[&str] = &[
    "BIGINT", "BINARY", "BIT", "BLOB", "BOOLEAN", "CHAR", "DATE", "DATETIME",
    "DECIMAL", "DOUBLE", "ENUM", "FLOAT", "INTEGER", "JSON", "LONGBLOB",
    "LONGTEXT", "MEDIUMBLOB", "MEDIUMINT", "MEDIUMTEXT", "NCHAR", "NUMERIC",
    "NVARCHAR", "REAL", "SET", "SMALLINT", "TEXT", "TIME", "TIMESTAMP",
    "TINYBLOB", "TINYINT", "TINYTEXT", "VARBINARY", "VARCHAR", "YEAR",
];

const SQLITE_TYPES: &[&str] = &[
    "BLOB", "BOOLEAN", "CHAR", "DATE", "DATETIME", "DECIMAL", "FLOAT",
    "INTEGER", "JSON", "NUMERIC", "REAL", "SMALLINT", "TEXT", "TIME",
    "TIMESTAMP", "VARCHAR",
];

/// シンボル表から論理名に対応する識別子を引く
fn lookup(symbols: &BTreeMap<String, String>, name: &str) -> Result<String, GenerateError> {
    symbols
        .get(name)
        .cloned()
        .ok_or_else(|| GenerateError::SymbolNotFound {
            name: name.to_string(),
        })
}

/// 方言モジュールが型クラスを公開しているかどうか
fn dialect_exports_type(dialect: &str, class_name: &str) -> bool {
    let table = match dialect {
        "postgresql" => POSTGRESQL_TYPES,
        "mysql" => MYSQL_TYPES,
        "sqlite" => SQLITE_TYPES,
        _ => return false,
    };
    table.contains(&class_name)
}

/// インスタンス単位の描画方法
#[derive(Debug, Clone)]
pub enum InstanceRenderer {
    /// モジュールトップレベルの名前付き定数として一度だけ定義し、
    /// 以後はその識別子で参照する
    NamedConstant {
        /// 定数の識別子
        symbol: String,
        /// 定義行を出力済みか
        defined: bool,
    },
}

/// 型解決レジストリ
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    /// 登録済みクラスと論理シンボル名（登録順を保持）
    classes: Vec<(String, String)>,
    /// インスタンスキーに紐づく描画方法
    instance_renderers: HashMap<String, InstanceRenderer>,
    /// `module.Class` に紐づく描画方法
    class_renderers: HashMap<String, InstanceRenderer>,
    /// クラス名に紐づく描画方法
    class_name_renderers: HashMap<String, InstanceRenderer>,
    /// 描画中に蓄積された定義行（一度だけ排出される）
    defines: Vec<String>,
}

#[derive(Clone, Copy)]
enum RendererSlot {
    Instance,
    Class,
    ClassName,
}

impl TypeRegistry {
    /// 空のレジストリを構築
    pub fn new() -> Self {
        TypeRegistry::default()
    }

    /// クラスと論理シンボル名の対応を登録
    ///
    /// 同じクラスへの同じ対応の再登録は無視し、異なる対応は衝突です。
    pub fn set_class(&mut self, class_name: &str, symbol_name: &str) -> Result<(), GenerateError> {
        if let Some((_, existing)) = self.classes.iter().find(|(c, _)| c == class_name) {
            if existing == symbol_name {
                return Ok(());
            }
            return Err(GenerateError::SymbolConflict {
                message: format!("Type conflict: '{}'", symbol_name),
            });
        }
        self.classes
            .push((class_name.to_string(), symbol_name.to_string()));
        Ok(())
    }

    /// インスタンスキーに描画方法を登録
    pub fn set_instance_renderer(&mut self, instance_key: &str, renderer: InstanceRenderer) {
        self.instance_renderers
            .insert(instance_key.to_string(), renderer);
    }

    /// `module.Class` キーに描画方法を登録
    pub fn set_class_renderer(&mut self, qualified_name: &str, renderer: InstanceRenderer) {
        self.class_renderers
            .insert(qualified_name.to_string(), renderer);
    }

    /// クラス名キーに描画方法を登録
    pub fn set_class_name_renderer(&mut self, class_name: &str, renderer: InstanceRenderer) {
        self.class_name_renderers
            .insert(class_name.to_string(), renderer);
    }

    /// 蓄積された定義行を排出（レジストリ側は空になる)
    pub fn drain_defines(&mut self) -> Vec<String> {
        std::mem::take(&mut self.defines)
    }

    /// 型インスタンスを参照テキストに描画
    ///
    /// 描画方法が登録されていればそれに従い、なければコンストラクタ
    /// 呼び出しをインラインで描画します。
    pub fn render(
        &mut self,
        type_def: &TypeDef,
        dialect: &str,
        symbols: &BTreeMap<String, String>,
    ) -> Result<String, GenerateError> {
        match self.renderer_slot(type_def) {
            Some((slot, key)) => {
                let InstanceRenderer::NamedConstant { symbol, defined } =
                    self.renderer(slot, &key).clone();
                if !defined {
                    let plain = self.render_plain(type_def, dialect, symbols)?;
                    self.defines.push(format!("{} = {}", symbol, plain));
                    *self.renderer_mut(slot, &key) = InstanceRenderer::NamedConstant {
                        symbol: symbol.clone(),
                        defined: true,
                    };
                }
                Ok(symbol)
            }
            None => self.render_plain(type_def, dialect, symbols),
        }
    }

    /// コンストラクタ呼び出しとしてインライン描画
    ///
    /// 引数がない場合は括弧を付けません（クラス参照のままで有効）。
    pub fn render_plain(
        &self,
        type_def: &TypeDef,
        dialect: &str,
        symbols: &BTreeMap<String, String>,
    ) -> Result<String, GenerateError> {
        let module_symbol = self.resolve(type_def, dialect, symbols)?;
        let mut params = Vec::new();
        for arg in &type_def.args {
            match arg {
                TypeArg::Pos(value) => {
                    params.push(self.render_value(value, dialect, symbols)?);
                }
                TypeArg::Kw(name, value) => {
                    params.push(format!(
                        "{}={}",
                        name,
                        self.render_value(value, dialect, symbols)?
                    ));
                }
            }
        }
        let call = if params.is_empty() {
            String::new()
        } else {
            format!("({})", params.join(", "))
        };
        Ok(format!(
            "{}.{}{}",
            module_symbol, type_def.class_name, call
        ))
    }

    /// 型インスタンスの所属モジュールシンボルを解決
    ///
    /// 完全一致、is-a、sqlalchemyモジュールパスの順に試します。
    pub fn resolve(
        &self,
        type_def: &TypeDef,
        dialect: &str,
        symbols: &BTreeMap<String, String>,
    ) -> Result<String, GenerateError> {
        if let Some((_, symbol_name)) = self
            .classes
            .iter()
            .find(|(class_name, _)| *class_name == type_def.class_name)
        {
            return lookup(symbols, symbol_name);
        }
        for (class_name, symbol_name) in &self.classes {
            if type_def.bases.iter().any(|base| base == class_name) {
                return lookup(symbols, symbol_name);
            }
        }

        if type_def.module.starts_with("sqlalchemy.") {
            let prefix = type_def
                .module
                .split('.')
                .take(3)
                .collect::<Vec<_>>()
                .join(".");
            if prefix == format!("sqlalchemy.dialects.{}", dialect)
                || dialect_exports_type(dialect, &type_def.class_name)
            {
                return lookup(symbols, "type");
            }
        }
        Err(GenerateError::UnresolvedType {
            type_name: type_def.qualified_name(),
        })
    }

    fn render_value(
        &self,
        value: &PyValue,
        dialect: &str,
        symbols: &BTreeMap<String, String>,
    ) -> Result<String, GenerateError> {
        match value {
            PyValue::Type(inner) => self.render_plain(inner, dialect, symbols),
            PyValue::Str(_) | PyValue::Int(_) | PyValue::Float(_) | PyValue::Bool(_) => {
                value
                    .render_scalar()
                    .ok_or_else(|| GenerateError::AssertionFailure {
                        message: "scalar type argument did not render".to_string(),
                    })
            }
        }
    }

    fn renderer_slot(&self, type_def: &TypeDef) -> Option<(RendererSlot, String)> {
        if let Some(key) = &type_def.instance_key {
            if self.instance_renderers.contains_key(key) {
                return Some((RendererSlot::Instance, key.clone()));
            }
        }
        let qualified = type_def.qualified_name();
        if self.class_renderers.contains_key(&qualified) {
            return Some((RendererSlot::Class, qualified));
        }
        if self.class_name_renderers.contains_key(&type_def.class_name) {
            return Some((RendererSlot::ClassName, type_def.class_name.clone()));
        }
        None
    }

    fn renderer(&self, slot: RendererSlot, key: &str) -> &InstanceRenderer {
        match slot {
            RendererSlot::Instance => &self.instance_renderers[key],
            RendererSlot::Class => &self.class_renderers[key],
            RendererSlot::ClassName => &self.class_name_renderers[key],
        }
    }

    fn renderer_mut(&mut self, slot: RendererSlot, key: &str) -> &mut InstanceRenderer {
        match slot {
            RendererSlot::Instance => self.instance_renderers.get_mut(key).unwrap(),
            RendererSlot::Class => self.class_renderers.get_mut(key).unwrap(),
            RendererSlot::ClassName => self.class_name_renderers.get_mut(key).unwrap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reflect::TypeArg;

    fn symbols() -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("sa".to_string(), "_sa".to_string());
        map.insert("type".to_string(), "t".to_string());
        map.insert("acme".to_string(), "_acme".to_string());
        map
    }

    #[test]
    fn test_resolve_exact_class() {
        let mut registry = TypeRegistry::new();
        registry.set_class("Money", "acme").unwrap();
        let t = TypeDef {
            class_name: "Money".to_string(),
            module: "acme.types".to_string(),
            bases: Vec::new(),
            args: Vec::new(),
            instance_key: None,
        };
        assert_eq!(registry.resolve(&t, "postgresql", &symbols()).unwrap(), "_acme");
    }

    #[test]
    fn test_resolve_is_a() {
        let mut registry = TypeRegistry::new();
        registry.set_class("BaseMoney", "acme").unwrap();
        let t = TypeDef {
            class_name: "Money".to_string(),
            module: "acme.types".to_string(),
            bases: vec!["BaseMoney".to_string()],
            args: Vec::new(),
            instance_key: None,
        };
        assert_eq!(registry.resolve(&t, "postgresql", &symbols()).unwrap(), "_acme");
    }

    #[test]
    fn test_resolve_dialect_module() {
        let registry = TypeRegistry::new();
        let t = TypeDef::dialect("postgresql", "UUID");
        assert_eq!(registry.resolve(&t, "postgresql", &symbols()).unwrap(), "t");
    }

    #[test]
    fn test_resolve_generic_reexported_by_dialect() {
        let registry = TypeRegistry::new();
        let t = TypeDef::generic("INTEGER");
        assert_eq!(registry.resolve(&t, "postgresql", &symbols()).unwrap(), "t");
    }

    #[test]
    fn test_resolve_without_symbol_binding_fails() {
        let mut registry = TypeRegistry::new();
        registry.set_class("Money", "acme").unwrap();
        let t = TypeDef {
            class_name: "Money".to_string(),
            module: "acme.types".to_string(),
            bases: Vec::new(),
            args: Vec::new(),
            instance_key: None,
        };
        let err = registry.resolve(&t, "postgresql", &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, GenerateError::SymbolNotFound { .. }));
    }

    #[test]
    fn test_resolve_unknown_type_fails() {
        let registry = TypeRegistry::new();
        let t = TypeDef {
            class_name: "Money".to_string(),
            module: "acme.types".to_string(),
            bases: Vec::new(),
            args: Vec::new(),
            instance_key: None,
        };
        let err = registry.resolve(&t, "postgresql", &symbols()).unwrap_err();
        assert!(matches!(err, GenerateError::UnresolvedType { .. }));
    }

    #[test]
    fn test_class_conflict() {
        let mut registry = TypeRegistry::new();
        registry.set_class("Money", "acme").unwrap();
        registry.set_class("Money", "acme").unwrap();
        let err = registry.set_class("Money", "other").unwrap_err();
        assert!(matches!(err, GenerateError::SymbolConflict { .. }));
    }

    #[test]
    fn test_render_plain_without_args_has_no_parens() {
        let mut registry = TypeRegistry::new();
        let t = TypeDef::generic("INTEGER");
        assert_eq!(
            registry.render(&t, "postgresql", &symbols()).unwrap(),
            "t.INTEGER"
        );
    }

    #[test]
    fn test_render_plain_with_args() {
        let mut registry = TypeRegistry::new();
        let t = TypeDef::generic("VARCHAR")
            .with_args(vec![TypeArg::Kw("length".to_string(), PyValue::Int(32))]);
        assert_eq!(
            registry.render(&t, "postgresql", &symbols()).unwrap(),
            "t.VARCHAR(length=32)"
        );
    }

    #[test]
    fn test_render_nested_type_argument() {
        let mut registry = TypeRegistry::new();
        let element = TypeDef::dialect("postgresql", "TEXT");
        let t = TypeDef::dialect("postgresql", "ARRAY")
            .with_args(vec![TypeArg::Pos(PyValue::Type(Box::new(element)))]);
        assert_eq!(
            registry.render(&t, "postgresql", &symbols()).unwrap(),
            "t.ARRAY(t.TEXT)"
        );
    }

    #[test]
    fn test_named_constant_defined_once() {
        let mut registry = TypeRegistry::new();
        registry.set_instance_renderer(
            "mood",
            InstanceRenderer::NamedConstant {
                symbol: "MOOD".to_string(),
                defined: false,
            },
        );
        let mut t = TypeDef::dialect("postgresql", "ENUM").with_args(vec![
            TypeArg::Pos(PyValue::Str("happy".to_string())),
            TypeArg::Pos(PyValue::Str("sad".to_string())),
            TypeArg::Kw("name".to_string(), PyValue::Str("mood".to_string())),
        ]);
        t.instance_key = Some("mood".to_string());

        assert_eq!(registry.render(&t, "postgresql", &symbols()).unwrap(), "MOOD");
        assert_eq!(registry.render(&t, "postgresql", &symbols()).unwrap(), "MOOD");

        let defines = registry.drain_defines();
        assert_eq!(
            defines,
            vec!["MOOD = t.ENUM('happy', 'sad', name='mood')".to_string()]
        );
        assert!(registry.drain_defines().is_empty());
    }
}
