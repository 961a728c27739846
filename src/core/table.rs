// テーブル描画とコレクション
//
// リフレクション済みテーブルを生成モジュール内の宣言ブロックに
// 変換します。別モジュールに属するスキーマのテーブルは、宣言の
// 代わりにインポート参照として扱われます。

use std::collections::{BTreeMap, HashSet};

use crate::core::column::Column;
use crate::core::constraint::{Annotation, Constraint, ConstraintKind};
use crate::core::error::GenerateError;
use crate::core::graph;
use crate::core::pysyntax::py_str;
use crate::core::reflect::TableDef;
use crate::core::symbols::Symbols;

/// 描画用テーブルモデル
///
/// 構築時に `table_<名前>` シンボルを登録します。スキーマがモジュール
/// 対応表に載っている場合は参照テーブルになり、カラムも制約も
/// 持ちません。
#[derive(Debug, Clone)]
pub struct Table {
    /// 変数名
    pub varname: String,
    /// リフレクション定義
    pub def: TableDef,
    /// 描画用カラム
    pub columns: Vec<Column>,
    /// 描画用制約
    pub constraints: Vec<Constraint>,
    /// 参照テーブルか
    pub is_reference: bool,
}

impl Table {
    /// リフレクション定義から構築
    pub fn new(
        varname: &str,
        def: TableDef,
        schemas: &BTreeMap<String, String>,
        symbols: &mut Symbols,
        dialect: &str,
    ) -> Result<Self, GenerateError> {
        if let Some(schema) = &def.schema {
            if let Some(module_path) = schemas.get(schema) {
                return Self::new_reference(varname, def, module_path, symbols);
            }
        }

        symbols.set(&format!("table_{}", def.name), varname)?;
        let mut columns = Vec::with_capacity(def.columns.len());
        for column_def in &def.columns {
            columns.push(Column::from_def(column_def, symbols, dialect)?);
        }
        let mut constraints = Vec::new();
        for constraint_def in &def.constraints {
            if let Some(constraint) = Constraint::from_def(constraint_def, varname, symbols)? {
                constraints.push(constraint);
            }
        }
        Ok(Table {
            varname: varname.to_string(),
            def,
            columns,
            constraints,
            is_reference: false,
        })
    }

    /// 別モジュールで定義済みのテーブルへの参照を構築
    ///
    /// モジュールをエイリアス付きでインポートし、`table_<名前>` を
    /// `エイリアス.変数名` に束縛します。既にアンダースコアで始まる
    /// モジュール名はそのまま使います。
    fn new_reference(
        varname: &str,
        def: TableDef,
        module_path: &str,
        symbols: &mut Symbols,
    ) -> Result<Self, GenerateError> {
        let (package, module) =
            module_path
                .rsplit_once('.')
                .ok_or_else(|| GenerateError::SchemaModulePath {
                    path: module_path.to_string(),
                })?;
        let local = if module.starts_with('_') {
            symbols
                .imports
                .set(module_path, &format!("from {} import {}", package, module))?;
            module.to_string()
        } else {
            let aliased = format!("_{}", module);
            symbols.imports.set(
                module_path,
                &format!("from {} import {} as {}", package, module, aliased),
            )?;
            aliased
        };
        symbols.set(
            &format!("table_{}", def.name),
            &format!("{}.{}", local, varname),
        )?;
        Ok(Table {
            varname: varname.to_string(),
            def,
            columns: Vec::new(),
            constraints: Vec::new(),
            is_reference: true,
        })
    }

    /// 修飾キーを返す
    pub fn key(&self) -> String {
        self.def.key()
    }

    /// 指定の参照先を持つ外部キーをALTER文扱いに切り替える
    pub fn defer_foreign_keys_to(&mut self, referred_key: &str) {
        for constraint in &mut self.constraints {
            if constraint.referred_key().as_deref() == Some(referred_key) {
                constraint.defer();
            }
        }
    }

    /// テーブル宣言ブロックを描画
    ///
    /// 制約は種別順位・注釈有無・制約名・描画テキストの順で安定に
    /// 並べ替えられます。
    pub fn render(&self, symbols: &Symbols) -> Result<String, GenerateError> {
        let mut args: Vec<String> = Vec::with_capacity(self.columns.len() + 1);
        for column in &self.columns {
            args.push(column.render(symbols)?);
        }
        if let Some(schema) = &self.def.schema {
            args.push(format!("schema={}", py_str(schema)));
        }
        let args_text = if args.is_empty() {
            String::new()
        } else {
            format!(",\n    {},\n", args.join(",\n    "))
        };
        let mut result = format!(
            "{}({}, {}{})",
            symbols.get("table")?,
            py_str(&self.def.name),
            symbols.get("meta")?,
            args_text
        );

        if !self.constraints.is_empty() {
            let mut rendered: Vec<(u8, bool, Option<String>, String)> = Vec::new();
            for constraint in &self.constraints {
                rendered.push((
                    constraint.kind().rank(),
                    constraint.annotation != Annotation::None,
                    constraint.name().map(str::to_string),
                    constraint.render(symbols)?,
                ));
            }
            rendered.sort();
            let blocks: Vec<String> = rendered.into_iter().map(|(_, _, _, text)| text).collect();
            result = format!("{}\n{}", result, blocks.join("\n"));
        }
        Ok(result)
    }
}

/// 描画対象テーブルの集合
///
/// 構築時に並び順の確定、循環の切断、前方参照の注釈付けまでを
/// 済ませます。
#[derive(Debug, Clone)]
pub struct TableCollection {
    tables: Vec<Table>,
}

impl TableCollection {
    /// テーブル定義の列から構築
    ///
    /// 参照テーブルが先、同種内は変数名順に並びます。
    pub fn new(
        entries: Vec<(String, TableDef)>,
        schemas: &BTreeMap<String, String>,
        symbols: &mut Symbols,
        dialect: &str,
    ) -> Result<Self, GenerateError> {
        let mut tables = Vec::with_capacity(entries.len());
        for (varname, def) in entries {
            tables.push(Table::new(&varname, def, schemas, symbols, dialect)?);
        }
        tables.sort_by_key(|table| (!table.is_reference, table.varname.clone()));

        graph::break_cycles(&mut tables)?;
        annotate_forward_references(&mut tables);

        Ok(TableCollection { tables })
    }

    /// 並び順どおりに走査
    pub fn iter(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter()
    }

    /// テーブル数
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// 空かどうか
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// 前方参照の注釈付け
///
/// 並び順を前から走査し、未出現のテーブルを参照する外部キーを
/// コメント化（Unseen）し、実宣言の複製（Seen）を参照先テーブルの
/// 位置に送ります。自テーブルは走査前に出現済み扱いになるため、
/// 自己参照は注釈されません。
fn annotate_forward_references(tables: &mut [Table]) {
    let keys: Vec<String> = tables.iter().map(Table::key).collect();
    let varnames: Vec<String> = tables.iter().map(|t| t.varname.clone()).collect();
    let index: BTreeMap<&str, usize> = keys
        .iter()
        .enumerate()
        .map(|(i, key)| (key.as_str(), i))
        .collect();

    let mut seen: HashSet<String> = HashSet::new();
    for i in 0..tables.len() {
        seen.insert(keys[i].clone());
        let owner = varnames[i].clone();
        let mut copies: Vec<(usize, Constraint)> = Vec::new();
        for constraint in &mut tables[i].constraints {
            if constraint.kind() != ConstraintKind::ForeignKey {
                continue;
            }
            if matches!(constraint.annotation, Annotation::Seen { .. }) {
                continue;
            }
            let Some(remote_key) = constraint.referred_key() else {
                continue;
            };
            if seen.contains(&remote_key) {
                continue;
            }
            let Some(&remote_index) = index.get(remote_key.as_str()) else {
                continue;
            };
            constraint.annotation = Annotation::Unseen {
                owner: varnames[remote_index].clone(),
            };
            copies.push((
                remote_index,
                constraint.with_annotation(Annotation::Seen {
                    owner: owner.clone(),
                }),
            ));
        }
        for (remote_index, copy) in copies {
            tables[remote_index].constraints.push(copy);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reflect::{ColumnDef, ConstraintAttrs, ConstraintDef, TypeDef};
    use crate::core::symbols::SymbolDefaults;

    fn column(name: &str, primary_key: bool) -> ColumnDef {
        ColumnDef {
            name: name.to_string(),
            ctype: TypeDef::generic("INTEGER"),
            nullable: !primary_key,
            primary_key,
            autoincrement: false,
            server_default: None,
        }
    }

    fn table_def(name: &str, schema: Option<&str>) -> TableDef {
        TableDef {
            name: name.to_string(),
            schema: schema.map(str::to_string),
            columns: vec![column("id", true)],
            constraints: vec![ConstraintDef::PrimaryKey {
                attrs: ConstraintAttrs::default(),
                columns: vec!["id".to_string()],
            }],
        }
    }

    #[test]
    fn test_concrete_table_render() {
        let mut symbols = Symbols::new(&SymbolDefaults::default()).unwrap();
        let table = Table::new(
            "users",
            table_def("users", None),
            &BTreeMap::new(),
            &mut symbols,
            "postgresql",
        )
        .unwrap();
        assert!(!table.is_reference);
        assert_eq!(symbols.get("table_users").unwrap(), "users");
        assert_eq!(
            table.render(&symbols).unwrap(),
            "T('users', m,\n    C('id', t.INTEGER, nullable=False, autoincrement=False),\n)\n\
             PrimaryKey(users.c.id)"
        );
    }

    #[test]
    fn test_foreign_schema_appended_as_keyword() {
        let mut symbols = Symbols::new(&SymbolDefaults::default()).unwrap();
        let table = Table::new(
            "users",
            table_def("users", Some("auth")),
            &BTreeMap::new(),
            &mut symbols,
            "postgresql",
        )
        .unwrap();
        let rendered = table.render(&symbols).unwrap();
        assert!(rendered.contains("schema='auth',\n)"));
    }

    #[test]
    fn test_reference_table_aliases_module() {
        let mut symbols = Symbols::new(&SymbolDefaults::default()).unwrap();
        let mut schemas = BTreeMap::new();
        schemas.insert("auth".to_string(), "myapp.schema.auth".to_string());
        let table = Table::new(
            "users",
            table_def("users", Some("auth")),
            &schemas,
            &mut symbols,
            "postgresql",
        )
        .unwrap();
        assert!(table.is_reference);
        assert!(table.columns.is_empty() && table.constraints.is_empty());
        assert_eq!(symbols.get("table_users").unwrap(), "_auth.users");
        let imports: Vec<&str> = symbols.imports.iter().collect();
        assert_eq!(imports, vec!["from myapp.schema import auth as _auth"]);
    }

    #[test]
    fn test_reference_module_with_leading_underscore() {
        let mut symbols = Symbols::new(&SymbolDefaults::default()).unwrap();
        let mut schemas = BTreeMap::new();
        schemas.insert("auth".to_string(), "myapp.schema._auth".to_string());
        let table = Table::new(
            "users",
            table_def("users", Some("auth")),
            &schemas,
            &mut symbols,
            "postgresql",
        )
        .unwrap();
        assert!(table.is_reference);
        let imports: Vec<&str> = symbols.imports.iter().collect();
        assert_eq!(imports, vec!["from myapp.schema import _auth"]);
        assert_eq!(symbols.get("table_users").unwrap(), "_auth.users");
    }

    #[test]
    fn test_dotless_module_path_rejected() {
        let mut symbols = Symbols::new(&SymbolDefaults::default()).unwrap();
        let mut schemas = BTreeMap::new();
        schemas.insert("auth".to_string(), "flat".to_string());
        let err = Table::new(
            "users",
            table_def("users", Some("auth")),
            &schemas,
            &mut symbols,
            "postgresql",
        )
        .unwrap_err();
        assert!(matches!(err, GenerateError::SchemaModulePath { .. }));
    }

    #[test]
    fn test_collection_sorts_references_first() {
        let mut symbols = Symbols::new(&SymbolDefaults::default()).unwrap();
        let mut schemas = BTreeMap::new();
        schemas.insert("auth".to_string(), "myapp.schema.auth".to_string());
        let entries = vec![
            ("zebra".to_string(), table_def("zebra", None)),
            ("users".to_string(), table_def("users", Some("auth"))),
            ("apple".to_string(), table_def("apple", None)),
        ];
        let collection =
            TableCollection::new(entries, &schemas, &mut symbols, "postgresql").unwrap();
        let order: Vec<(&str, bool)> = collection
            .iter()
            .map(|t| (t.varname.as_str(), t.is_reference))
            .collect();
        assert_eq!(
            order,
            vec![("users", true), ("apple", false), ("zebra", false)]
        );
    }

    #[test]
    fn test_self_reference_not_annotated() {
        let mut symbols = Symbols::new(&SymbolDefaults::default()).unwrap();
        let mut def = table_def("employees", None);
        def.columns.push(column("manager_id", false));
        def.constraints.push(ConstraintDef::ForeignKey {
            attrs: ConstraintAttrs::default(),
            columns: vec!["manager_id".to_string()],
            referred_schema: None,
            referred_table: "employees".to_string(),
            referred_columns: vec!["id".to_string()],
            onupdate: None,
            ondelete: None,
            use_alter: false,
        });
        let entries = vec![("employees".to_string(), def)];
        let collection =
            TableCollection::new(entries, &BTreeMap::new(), &mut symbols, "postgresql").unwrap();
        let table = collection.iter().next().unwrap();
        assert!(table
            .constraints
            .iter()
            .all(|c| c.annotation == Annotation::None));
    }

    #[test]
    fn test_backward_reference_gets_annotated_pair() {
        // addressesがpersonsを参照するが、並び順でaddressesが先になる
        let mut symbols = Symbols::new(&SymbolDefaults::default()).unwrap();
        let mut addresses = table_def("addresses", None);
        addresses.constraints.push(ConstraintDef::ForeignKey {
            attrs: ConstraintAttrs::default(),
            columns: vec!["person_id".to_string()],
            referred_schema: None,
            referred_table: "persons".to_string(),
            referred_columns: vec!["id".to_string()],
            onupdate: None,
            ondelete: None,
            use_alter: false,
        });
        let entries = vec![
            ("addresses".to_string(), addresses),
            ("persons".to_string(), table_def("persons", None)),
        ];
        let collection =
            TableCollection::new(entries, &BTreeMap::new(), &mut symbols, "postgresql").unwrap();
        let tables: Vec<&Table> = collection.iter().collect();

        let unseen = tables[0]
            .constraints
            .iter()
            .find(|c| c.kind() == ConstraintKind::ForeignKey)
            .unwrap();
        assert_eq!(
            unseen.annotation,
            Annotation::Unseen {
                owner: "persons".to_string()
            }
        );

        let seen = tables[1]
            .constraints
            .iter()
            .find(|c| c.kind() == ConstraintKind::ForeignKey)
            .unwrap();
        assert_eq!(
            seen.annotation,
            Annotation::Seen {
                owner: "addresses".to_string()
            }
        );
    }
}
