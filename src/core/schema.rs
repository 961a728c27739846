// スキーマドキュメント
//
// リフレクション対象の取得からモジュールテキストの書き出しまでを
// まとめる最上位のコア型です。出力は同一入力に対してバイト単位で
// 安定します。

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io::Write;

use crate::core::error::{GenerateError, ReflectError};
use crate::core::reflect::{ReflectionProvider, TableDef, TypeLoader};
use crate::core::symbols::Symbols;
use crate::core::table::TableCollection;
use crate::core::template::Template;

/// 生成モジュールの骨格
const MODULE_TPL: &str = r#"
# -*- coding: ascii -*-  pylint: skip-file
"""
==============================
 SQLAlchemy schema definition
==============================

SQLAlchemy schema definition%(dbspec)s.

:Warning: DO NOT EDIT, this file is generated
"""
__docformat__ = "restructuredtext en"

import sqlalchemy as %(sa)s
from sqlalchemy.dialects import %(dialect)s as %(type)s
%(imports)s
%(meta)s = %(sa)s.MetaData()
%(table)s = %(sa)s.Table
%(column)s = %(sa)s.Column
%(default)s = %(sa)s.DefaultClause
%(lines)s
del %(sa)s, %(table)s, %(column)s, %(default)s, %(meta)s

# vim: nowrap tw=0
"#;

/// スキーマドキュメント
#[derive(Debug)]
pub struct Schema {
    dialect: String,
    tables: TableCollection,
    symbols: Symbols,
    dbname: Option<String>,
}

impl Schema {
    /// リフレクションを実行してドキュメントを構築
    ///
    /// 要求されたテーブルに加え、外部キーで到達可能なテーブルを
    /// 推移的に取り込みます。未知の型は型ローダーで解決を試み、
    /// 同じ型名の再出現は循環として打ち切ります。
    pub async fn build(
        provider: &mut dyn ReflectionProvider,
        requests: &[(String, String)],
        schemas: &BTreeMap<String, String>,
        mut symbols: Symbols,
        dbname: Option<String>,
        loader: Option<&dyn TypeLoader>,
    ) -> Result<Self, GenerateError> {
        let dialect = provider.dialect().to_string();
        let mut attempted: HashSet<String> = HashSet::new();
        let mut known: BTreeSet<String> = BTreeSet::new();
        let mut pending: BTreeSet<String> = BTreeSet::new();

        let mut entries: Vec<(String, TableDef)> = Vec::new();
        for (varname, qualified) in requests {
            let (schema, name) = split_qualified(qualified);
            let def = reflect_one(
                provider,
                &mut symbols,
                loader,
                name,
                schema,
                &mut attempted,
            )
            .await?;
            known.insert(def.key());
            queue_referred(&def, &known, &mut pending);
            entries.push((varname.clone(), def));
        }

        let mut discovered: BTreeMap<String, TableDef> = BTreeMap::new();
        while let Some(key) = pending.pop_first() {
            if known.contains(&key) {
                continue;
            }
            let (schema, name) = split_qualified(&key);
            let def = reflect_one(
                provider,
                &mut symbols,
                loader,
                name,
                schema,
                &mut attempted,
            )
            .await?;
            known.insert(def.key());
            queue_referred(&def, &known, &mut pending);
            discovered.insert(key, def);
        }
        for (_, def) in discovered {
            let varname = def.name.clone();
            entries.push((varname, def));
        }

        let tables = TableCollection::new(entries, schemas, &mut symbols, &dialect)?;
        Ok(Schema {
            dialect,
            tables,
            symbols,
            dbname,
        })
    }

    /// 方言名を返す
    pub fn dialect(&self) -> &str {
        &self.dialect
    }

    /// テーブル集合を返す
    pub fn tables(&self) -> &TableCollection {
        &self.tables
    }

    /// モジュールテキストを書き出す
    ///
    /// インポートはシンボル展開後にソートされ、カスタム型の定義行は
    /// 最初のテーブルブロックより前に一度だけ置かれます。
    pub fn render<W: Write>(&mut self, writer: &mut W) -> Result<(), GenerateError> {
        let symbol_map = self.symbols.to_map();

        let mut imports: Vec<String> = self
            .symbols
            .imports
            .iter()
            .map(|statement| Template::new(statement).expand(&symbol_map))
            .collect();
        if !imports.is_empty() {
            imports.sort();
            imports.push(String::new());
        }

        let mut lines: Vec<String> = Vec::new();
        let defines = self.symbols.types.drain_defines();
        if !defines.is_empty() {
            lines.push(String::new());
            lines.extend(defines);
            lines.push(String::new());
        }
        for table in self.tables.iter() {
            if table.is_reference {
                continue;
            }
            if lines.is_empty() {
                lines.push(String::new());
            }
            lines.push(format!("# Table \"{}\"", escape_ascii(&table.def.name)));
            lines.push(format!(
                "{} = {}",
                table.varname,
                table.render(&self.symbols)?
            ));
            lines.push(String::new());
            lines.push(String::new());
        }

        let mut params = symbol_map;
        params.insert(
            "dbspec".to_string(),
            match &self.dbname {
                Some(dbname) => format!(" for {}", dbname),
                None => String::new(),
            },
        );
        params.insert("dialect".to_string(), self.dialect.clone());
        params.insert("imports".to_string(), imports.join("\n"));
        params.insert("lines".to_string(), lines.join("\n"));

        writer.write_all(Template::new(MODULE_TPL).expand(&params).as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// 修飾名をスキーマ部とテーブル名に分割
fn split_qualified(qualified: &str) -> (Option<&str>, &str) {
    match qualified.split_once('.') {
        Some((schema, name)) => (Some(schema), name),
        None => (None, qualified),
    }
}

/// 外部キーの参照先を未取得キューに積む
fn queue_referred(def: &TableDef, known: &BTreeSet<String>, pending: &mut BTreeSet<String>) {
    for constraint in &def.constraints {
        if let Some(key) = constraint.referred_key() {
            if !known.contains(&key) {
                pending.insert(key);
            }
        }
    }
}

/// 一テーブルのリフレクション（型ローダーのリトライ付き）
///
/// 未知の型が報告されるたびにローダーへ解決を委ね、ローダー自身が
/// 連鎖的に未知の型を報告した場合はスタックで追跡します。同じ型名が
/// 再登場したら解決が進んでいないため循環エラーです。
async fn reflect_one(
    provider: &mut dyn ReflectionProvider,
    symbols: &mut Symbols,
    loader: Option<&dyn TypeLoader>,
    name: &str,
    schema: Option<&str>,
    attempted: &mut HashSet<String>,
) -> Result<TableDef, GenerateError> {
    loop {
        let type_name = match provider.table(name, schema).await {
            Ok(def) => return Ok(def),
            Err(ReflectError::UnrecognizedType { type_name }) => type_name,
            Err(other) => return Err(other.into()),
        };
        let Some(loader) = loader else {
            return Err(ReflectError::UnrecognizedType { type_name }.into());
        };
        if !attempted.insert(type_name.clone()) {
            return Err(GenerateError::TypeLoadCycle { type_name });
        }
        let mut stack = vec![type_name];
        while let Some(current) = stack.last().cloned() {
            match loader.load(&current, symbols, provider).await {
                Ok(()) => {
                    stack.pop();
                }
                Err(GenerateError::Reflect(ReflectError::UnrecognizedType {
                    type_name: chained,
                })) => {
                    if !attempted.insert(chained.clone()) {
                        return Err(GenerateError::TypeLoadCycle {
                            type_name: chained,
                        });
                    }
                    stack.push(chained);
                }
                Err(other) => return Err(other),
            }
        }
    }
}

/// 非ASCII文字をエスケープしてコメントに安全な形にする
fn escape_ascii(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii() {
            out.push(ch);
        } else if (ch as u32) < 0x100 {
            out.push_str(&format!("\\x{:02x}", ch as u32));
        } else {
            out.push_str(&format!("\\u{:04x}", ch as u32));
        }
    }
    out
}
