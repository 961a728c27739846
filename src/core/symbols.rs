// シンボル表とインポートレジストリ
//
// 生成モジュール内の識別子割り当てと追加インポート文を一元管理します。
// 論理名と識別子の対応は一度確定すると変更できず、衝突は即座に
// エラーになります。

use std::collections::BTreeMap;

use crate::core::error::GenerateError;
use crate::core::pysyntax::is_keyword;
use crate::core::reflect::TypeDef;
use crate::core::types::TypeRegistry;

/// デフォルトのシンボル束縛
///
/// 生成モジュールの骨格が前提とする識別子の初期値です。プロジェクト
/// 設定の `symbols` マップで個別に上書きできます。
#[derive(Debug, Clone)]
pub struct SymbolDefaults {
    /// sqlalchemyモジュールのエイリアス
    pub sa: String,
    /// MetaDataインスタンス
    pub meta: String,
    /// Tableエイリアス
    pub table: String,
    /// 方言型モジュールのエイリアス
    pub type_: String,
    /// Columnエイリアス
    pub column: String,
    /// DefaultClauseエイリアス
    pub default: String,
    /// 主キー制約ヘルパー
    pub pk: String,
    /// 外部キー制約ヘルパー
    pub fk: String,
    /// 一意制約ヘルパー
    pub uk: String,
    /// 制約ヘルパーモジュールのパス
    pub constraints: String,
}

impl Default for SymbolDefaults {
    fn default() -> Self {
        SymbolDefaults {
            sa: "_sa".to_string(),
            meta: "m".to_string(),
            table: "T".to_string(),
            type_: "t".to_string(),
            column: "C".to_string(),
            default: "D".to_string(),
            pk: "PrimaryKey".to_string(),
            fk: "ForeignKey".to_string(),
            uk: "Unique".to_string(),
            constraints: "sagen.constraints".to_string(),
        }
    }
}

impl SymbolDefaults {
    /// 論理名と識別子の組を返す
    fn to_pairs(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("sa", &self.sa),
            ("meta", &self.meta),
            ("table", &self.table),
            ("type", &self.type_),
            ("column", &self.column),
            ("default", &self.default),
            ("pk", &self.pk),
            ("fk", &self.fk),
            ("uk", &self.uk),
            ("constraints", &self.constraints),
        ]
    }
}

/// インポートレジストリ
///
/// 論理IDからインポート文への対応を登録順に保持します。同一IDへの
/// 同一文の再登録は無視し、異なる文は衝突エラーになります。
#[derive(Debug, Clone, Default)]
pub struct Imports {
    entries: Vec<(String, String)>,
}

impl Imports {
    /// インポート文を登録
    pub fn set(&mut self, name: &str, statement: &str) -> Result<(), GenerateError> {
        if let Some((_, existing)) = self.entries.iter().find(|(id, _)| id == name) {
            if existing == statement {
                return Ok(());
            }
            return Err(GenerateError::ImportConflict {
                name: name.to_string(),
                existing: existing.clone(),
                conflict: statement.to_string(),
            });
        }
        self.entries.push((name.to_string(), statement.to_string()));
        Ok(())
    }

    /// 論理IDが登録済みかどうか
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(id, _)| id == name)
    }

    /// 登録順にインポート文を走査
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, statement)| statement.as_str())
    }
}

/// シンボル表
///
/// 論理名から出力モジュール内識別子への対応を保持します。インポート
/// レジストリと型レジストリを抱き合わせて持ちます。
#[derive(Debug, Clone)]
pub struct Symbols {
    symbols: BTreeMap<String, String>,
    /// 追加インポート文
    pub imports: Imports,
    /// 型解決レジストリ
    pub types: TypeRegistry,
}

impl Symbols {
    /// デフォルト束縛のみでシンボル表を構築
    pub fn new(defaults: &SymbolDefaults) -> Result<Self, GenerateError> {
        Self::with_overrides(defaults, &BTreeMap::new())
    }

    /// デフォルト束縛に上書きを適用してシンボル表を構築
    ///
    /// 上書きも通常の `set` を通るため、衝突規則がそのまま適用されます。
    pub fn with_overrides(
        defaults: &SymbolDefaults,
        overrides: &BTreeMap<String, String>,
    ) -> Result<Self, GenerateError> {
        let mut merged: BTreeMap<String, String> = defaults
            .to_pairs()
            .into_iter()
            .map(|(name, symbol)| (name.to_string(), symbol.to_string()))
            .collect();
        for (name, symbol) in overrides {
            merged.insert(name.clone(), symbol.clone());
        }
        let mut table = Symbols {
            symbols: BTreeMap::new(),
            imports: Imports::default(),
            types: TypeRegistry::new(),
        };
        for (name, symbol) in &merged {
            table.set(name, symbol)?;
        }
        Ok(table)
    }

    /// シンボルを登録
    ///
    /// 予約語の識別子、既存の論理名への別識別子、既存の識別子への
    /// 別論理名はいずれも衝突エラーです。同一の組の再登録は無視します。
    pub fn set(&mut self, name: &str, symbol: &str) -> Result<(), GenerateError> {
        if is_keyword(symbol) {
            return Err(GenerateError::SymbolConflict {
                message: format!("Cannot use keyword '{}' as symbol", symbol),
            });
        }
        if let Some(existing) = self.symbols.get(name) {
            if existing == symbol {
                return Ok(());
            }
            return Err(GenerateError::SymbolConflict {
                message: format!(
                    "Name '{}' is already bound to symbol '{}' (requested: '{}')",
                    name, existing, symbol
                ),
            });
        }
        if let Some((owner, _)) = self.symbols.iter().find(|(_, s)| s.as_str() == symbol) {
            return Err(GenerateError::SymbolConflict {
                message: format!(
                    "Symbol '{}' is already bound to name '{}' (requested: '{}')",
                    symbol, owner, name
                ),
            });
        }
        self.symbols.insert(name.to_string(), symbol.to_string());
        Ok(())
    }

    /// シンボルを取得
    pub fn get(&self, name: &str) -> Result<&str, GenerateError> {
        self.symbols
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| GenerateError::SymbolNotFound {
                name: name.to_string(),
            })
    }

    /// シンボルを削除（未登録なら何もしない）
    pub fn remove(&mut self, name: &str) {
        self.symbols.remove(name);
    }

    /// 論理名が登録済みかどうか
    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    /// テンプレート展開用に対応表を複製して返す
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.symbols.clone()
    }

    /// 型定義を出力テキストに描画
    ///
    /// 型レジストリとシンボル対応表を同時に貸し出すための入り口です。
    pub fn render_type(
        &mut self,
        type_def: &TypeDef,
        dialect: &str,
    ) -> Result<String, GenerateError> {
        let Symbols {
            symbols, types, ..
        } = self;
        types.render(type_def, dialect, symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_installed() {
        let symbols = Symbols::new(&SymbolDefaults::default()).unwrap();
        assert_eq!(symbols.get("sa").unwrap(), "_sa");
        assert_eq!(symbols.get("meta").unwrap(), "m");
        assert_eq!(symbols.get("table").unwrap(), "T");
        assert_eq!(symbols.get("constraints").unwrap(), "sagen.constraints");
    }

    #[test]
    fn test_overrides_applied() {
        let mut overrides = BTreeMap::new();
        overrides.insert("meta".to_string(), "metadata".to_string());
        let symbols = Symbols::with_overrides(&SymbolDefaults::default(), &overrides).unwrap();
        assert_eq!(symbols.get("meta").unwrap(), "metadata");
        assert_eq!(symbols.get("sa").unwrap(), "_sa");
    }

    #[test]
    fn test_same_pair_reset_is_noop() {
        let mut symbols = Symbols::new(&SymbolDefaults::default()).unwrap();
        symbols.set("table_users", "users").unwrap();
        symbols.set("table_users", "users").unwrap();
        assert_eq!(symbols.get("table_users").unwrap(), "users");
    }

    #[test]
    fn test_name_rebind_conflicts() {
        let mut symbols = Symbols::new(&SymbolDefaults::default()).unwrap();
        symbols.set("table_users", "users").unwrap();
        let err = symbols.set("table_users", "users2").unwrap_err();
        assert!(matches!(err, GenerateError::SymbolConflict { .. }));
    }

    #[test]
    fn test_symbol_reuse_conflicts() {
        let mut symbols = Symbols::new(&SymbolDefaults::default()).unwrap();
        symbols.set("table_users", "users").unwrap();
        let err = symbols.set("table_accounts", "users").unwrap_err();
        assert!(matches!(err, GenerateError::SymbolConflict { .. }));
    }

    #[test]
    fn test_keyword_symbol_rejected() {
        let mut symbols = Symbols::new(&SymbolDefaults::default()).unwrap();
        let err = symbols.set("table_class", "class").unwrap_err();
        assert!(matches!(err, GenerateError::SymbolConflict { .. }));
    }

    #[test]
    fn test_missing_symbol() {
        let symbols = Symbols::new(&SymbolDefaults::default()).unwrap();
        let err = symbols.get("nope").unwrap_err();
        assert!(matches!(err, GenerateError::SymbolNotFound { .. }));
    }

    #[test]
    fn test_remove_then_rebind() {
        let mut symbols = Symbols::new(&SymbolDefaults::default()).unwrap();
        symbols.set("table_users", "users").unwrap();
        symbols.remove("table_users");
        symbols.set("table_users", "users_v2").unwrap();
        assert_eq!(symbols.get("table_users").unwrap(), "users_v2");
    }

    #[test]
    fn test_imports_idempotent_and_conflicting() {
        let mut imports = Imports::default();
        imports.set("pk", "from x import PrimaryKey").unwrap();
        imports.set("pk", "from x import PrimaryKey").unwrap();
        let err = imports.set("pk", "from y import PrimaryKey").unwrap_err();
        assert!(matches!(err, GenerateError::ImportConflict { .. }));
        assert_eq!(imports.iter().count(), 1);
    }

    #[test]
    fn test_imports_keep_insertion_order() {
        let mut imports = Imports::default();
        imports.set("z", "import z").unwrap();
        imports.set("a", "import a").unwrap();
        let statements: Vec<&str> = imports.iter().collect();
        assert_eq!(statements, vec!["import z", "import a"]);
    }
}
