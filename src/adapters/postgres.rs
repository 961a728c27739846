// PostgreSQLリフレクションプロバイダー
//
// information_schemaとpg_catalogからテーブル定義を取得し、構造化
// モデルに変換します。SERIAL/IDENTITYの検出、型マッピング、ENUM型の
// 遅延ロードを担当します。

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use sqlx::{AnyPool, Row};

use crate::core::error::{GenerateError, ReflectError};
use crate::core::pysyntax::{is_identifier, is_keyword};
use crate::core::reflect::{
    ColumnDef, ConstraintAttrs, ConstraintDef, DefaultDef, PyValue, ReflectionProvider, TableDef,
    TypeArg, TypeDef, TypeLoader,
};
use crate::core::symbols::Symbols;
use crate::core::types::InstanceRenderer;

/// PostgreSQL用リフレクションプロバイダー
pub struct PostgresProvider {
    pool: AnyPool,
    custom_types: HashMap<String, TypeDef>,
}

impl PostgresProvider {
    /// 接続プールからプロバイダーを作成
    pub fn new(pool: AnyPool) -> Self {
        PostgresProvider {
            pool,
            custom_types: HashMap::new(),
        }
    }

    /// カラム情報を取得して変換
    async fn columns(
        &self,
        name: &str,
        schema: &str,
        primary_key_columns: &[String],
    ) -> Result<Vec<ColumnDef>, ReflectError> {
        let sql = r#"
            SELECT
                column_name,
                data_type,
                is_nullable,
                column_default,
                character_maximum_length,
                numeric_precision,
                numeric_scale,
                udt_name,
                is_identity,
                identity_generation
            FROM information_schema.columns
            WHERE table_name = $1 AND table_schema = $2
            ORDER BY ordinal_position
        "#;
        let rows = sqlx::query(sql)
            .bind(name)
            .bind(schema)
            .fetch_all(&self.pool)
            .await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let column_name: String = row.get(0);
            let data_type: String = row.get(1);
            let is_nullable: String = row.get(2);
            let column_default: Option<String> = row.get(3);
            let char_max_length: Option<i32> = row.get(4);
            let numeric_precision: Option<i32> = row.get(5);
            let numeric_scale: Option<i32> = row.get(6);
            let udt_name: Option<String> = row.get(7);
            let is_identity: String = row.get(8);
            let identity_generation: Option<String> = row.get(9);

            let ctype = map_type(
                &data_type,
                udt_name.as_deref(),
                char_max_length,
                numeric_precision,
                numeric_scale,
                &self.custom_types,
            )?;

            let primary_key = primary_key_columns.contains(&column_name);
            let identity = is_identity == "YES";
            let serial = !identity
                && is_serial(&data_type, column_default.as_deref());

            let server_default = if identity {
                let arg = match identity_generation.as_deref() {
                    Some("ALWAYS") => "Identity(always=True)".to_string(),
                    _ => "Identity()".to_string(),
                };
                Some(DefaultDef {
                    arg,
                    for_update: false,
                    is_identity: true,
                })
            } else if serial {
                // nextval()のデフォルトは自動採番の実装詳細なので出力しない
                None
            } else {
                column_default.map(|arg| DefaultDef {
                    arg,
                    for_update: false,
                    is_identity: false,
                })
            };

            columns.push(ColumnDef {
                name: column_name,
                ctype,
                nullable: is_nullable == "YES",
                primary_key,
                autoincrement: identity || serial,
                server_default,
            });
        }
        Ok(columns)
    }

    /// 主キー制約を取得
    async fn primary_key(
        &self,
        name: &str,
        schema: &str,
    ) -> Result<Option<ConstraintDef>, ReflectError> {
        let sql = r#"
            SELECT
                tc.constraint_name,
                kcu.column_name,
                tc.is_deferrable,
                tc.initially_deferred
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            WHERE tc.constraint_type = 'PRIMARY KEY'
                AND tc.table_name = $1
                AND tc.table_schema = $2
            ORDER BY kcu.ordinal_position
        "#;
        let rows = sqlx::query(sql)
            .bind(name)
            .bind(schema)
            .fetch_all(&self.pool)
            .await?;
        if rows.is_empty() {
            return Ok(None);
        }

        let attrs = constraint_attrs(&rows[0], 0, 2, 3);
        let columns = rows.iter().map(|row| row.get(1)).collect();
        Ok(Some(ConstraintDef::PrimaryKey { attrs, columns }))
    }

    /// 一意制約を取得（制約名ごとにまとめる）
    async fn unique_constraints(
        &self,
        name: &str,
        schema: &str,
    ) -> Result<Vec<ConstraintDef>, ReflectError> {
        let sql = r#"
            SELECT
                tc.constraint_name,
                kcu.column_name,
                tc.is_deferrable,
                tc.initially_deferred
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            WHERE tc.constraint_type = 'UNIQUE'
                AND tc.table_name = $1
                AND tc.table_schema = $2
            ORDER BY tc.constraint_name, kcu.ordinal_position
        "#;
        let rows = sqlx::query(sql)
            .bind(name)
            .bind(schema)
            .fetch_all(&self.pool)
            .await?;

        let mut grouped: BTreeMap<String, (ConstraintAttrs, Vec<String>)> = BTreeMap::new();
        for row in &rows {
            let constraint_name: String = row.get(0);
            let entry = grouped
                .entry(constraint_name)
                .or_insert_with(|| (constraint_attrs(row, 0, 2, 3), Vec::new()));
            entry.1.push(row.get(1));
        }
        Ok(grouped
            .into_values()
            .map(|(attrs, columns)| ConstraintDef::Unique { attrs, columns })
            .collect())
    }

    /// 外部キー制約を取得（制約名ごとにまとめる）
    async fn foreign_keys(
        &self,
        name: &str,
        schema: &str,
    ) -> Result<Vec<ConstraintDef>, ReflectError> {
        let sql = r#"
            SELECT
                tc.constraint_name,
                kcu.column_name,
                ccu.table_schema AS referenced_schema,
                ccu.table_name AS referenced_table,
                ccu.column_name AS referenced_column,
                rc.update_rule,
                rc.delete_rule,
                tc.is_deferrable,
                tc.initially_deferred
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            JOIN information_schema.constraint_column_usage ccu
                ON ccu.constraint_name = tc.constraint_name
                AND ccu.constraint_schema = tc.constraint_schema
            JOIN information_schema.referential_constraints rc
                ON rc.constraint_name = tc.constraint_name
                AND rc.constraint_schema = tc.constraint_schema
            WHERE tc.constraint_type = 'FOREIGN KEY'
                AND tc.table_name = $1
                AND tc.table_schema = $2
            ORDER BY tc.constraint_name, kcu.ordinal_position
        "#;
        let rows = sqlx::query(sql)
            .bind(name)
            .bind(schema)
            .fetch_all(&self.pool)
            .await?;

        struct FkParts {
            attrs: ConstraintAttrs,
            columns: Vec<String>,
            referred_schema: Option<String>,
            referred_table: String,
            referred_columns: Vec<String>,
            onupdate: Option<String>,
            ondelete: Option<String>,
        }

        let mut grouped: BTreeMap<String, FkParts> = BTreeMap::new();
        for row in &rows {
            let constraint_name: String = row.get(0);
            let referenced_schema: String = row.get(2);
            let entry = grouped.entry(constraint_name).or_insert_with(|| FkParts {
                attrs: constraint_attrs(row, 0, 7, 8),
                columns: Vec::new(),
                referred_schema: if referenced_schema == "public" {
                    None
                } else {
                    Some(referenced_schema)
                },
                referred_table: row.get(3),
                referred_columns: Vec::new(),
                onupdate: referential_action(row.get::<String, _>(5)),
                ondelete: referential_action(row.get::<String, _>(6)),
            });
            entry.columns.push(row.get(1));
            entry.referred_columns.push(row.get(4));
        }
        Ok(grouped
            .into_values()
            .map(|parts| ConstraintDef::ForeignKey {
                attrs: parts.attrs,
                columns: parts.columns,
                referred_schema: parts.referred_schema,
                referred_table: parts.referred_table,
                referred_columns: parts.referred_columns,
                onupdate: parts.onupdate,
                ondelete: parts.ondelete,
                use_alter: false,
            })
            .collect())
    }

    /// チェック制約を取得
    ///
    /// NOT NULL由来の暗黙のチェック句は除外します。取得はしますが、
    /// 描画層では表現対象外として読み飛ばされます。
    async fn check_constraints(
        &self,
        name: &str,
        schema: &str,
    ) -> Result<Vec<ConstraintDef>, ReflectError> {
        let sql = r#"
            SELECT
                tc.constraint_name,
                cc.check_clause
            FROM information_schema.table_constraints tc
            JOIN information_schema.check_constraints cc
                ON cc.constraint_name = tc.constraint_name
                AND cc.constraint_schema = tc.constraint_schema
            WHERE tc.constraint_type = 'CHECK'
                AND tc.table_name = $1
                AND tc.table_schema = $2
                AND cc.check_clause NOT LIKE '%IS NOT NULL%'
            ORDER BY tc.constraint_name
        "#;
        let rows = sqlx::query(sql)
            .bind(name)
            .bind(schema)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|row| ConstraintDef::Check {
                attrs: ConstraintAttrs {
                    name: Some(row.get(0)),
                    deferrable: None,
                    initially: None,
                },
                expression: row.get(1),
            })
            .collect())
    }
}

#[async_trait]
impl ReflectionProvider for PostgresProvider {
    fn dialect(&self) -> &str {
        "postgresql"
    }

    async fn table(
        &mut self,
        name: &str,
        schema: Option<&str>,
    ) -> Result<TableDef, ReflectError> {
        let lookup_schema = schema.unwrap_or("public");

        let primary_key = self.primary_key(name, lookup_schema).await?;
        let pk_columns: Vec<String> = match &primary_key {
            Some(ConstraintDef::PrimaryKey { columns, .. }) => columns.clone(),
            _ => Vec::new(),
        };

        let columns = self.columns(name, lookup_schema, &pk_columns).await?;
        if columns.is_empty() {
            return Err(ReflectError::NotFound {
                table: match schema {
                    Some(schema) => format!("{}.{}", schema, name),
                    None => name.to_string(),
                },
            });
        }

        let mut constraints = Vec::new();
        if let Some(pk) = primary_key {
            constraints.push(pk);
        }
        constraints.extend(self.unique_constraints(name, lookup_schema).await?);
        constraints.extend(self.foreign_keys(name, lookup_schema).await?);
        constraints.extend(self.check_constraints(name, lookup_schema).await?);

        Ok(TableDef {
            name: name.to_string(),
            schema: schema.map(str::to_string),
            columns,
            constraints,
        })
    }

    fn register_custom_type(&mut self, name: &str, type_def: TypeDef) {
        self.custom_types.insert(name.to_string(), type_def);
    }
}

/// 制約共通属性を行から読み取る
fn constraint_attrs(
    row: &sqlx::any::AnyRow,
    name_index: usize,
    deferrable_index: usize,
    initially_index: usize,
) -> ConstraintAttrs {
    let is_deferrable: String = row.get(deferrable_index);
    let initially_deferred: String = row.get(initially_index);
    ConstraintAttrs {
        name: Some(row.get(name_index)),
        deferrable: if is_deferrable == "YES" {
            Some(true)
        } else {
            None
        },
        initially: if initially_deferred == "YES" {
            Some("DEFERRED".to_string())
        } else {
            None
        },
    }
}

/// 参照アクションを正規化（NO ACTIONは既定値なので出力しない）
fn referential_action(rule: String) -> Option<String> {
    if rule == "NO ACTION" {
        None
    } else {
        Some(rule)
    }
}

/// SERIAL列の検出
fn is_serial(data_type: &str, default: Option<&str>) -> bool {
    matches!(data_type, "integer" | "bigint" | "smallint")
        && default.is_some_and(|d| d.starts_with("nextval("))
}

/// 生の型情報を型定義に変換
fn map_type(
    data_type: &str,
    udt_name: Option<&str>,
    char_max_length: Option<i32>,
    numeric_precision: Option<i32>,
    numeric_scale: Option<i32>,
    custom_types: &HashMap<String, TypeDef>,
) -> Result<TypeDef, ReflectError> {
    let length_args = |length: Option<i32>| -> Vec<TypeArg> {
        length
            .map(|l| vec![TypeArg::Pos(PyValue::Int(l as i64))])
            .unwrap_or_default()
    };

    let type_def = match data_type {
        "integer" => TypeDef::generic("INTEGER"),
        "bigint" => TypeDef::generic("BIGINT"),
        "smallint" => TypeDef::generic("SMALLINT"),
        "text" => TypeDef::generic("TEXT"),
        "boolean" => TypeDef::generic("BOOLEAN"),
        "date" => TypeDef::generic("DATE"),
        "real" => TypeDef::generic("REAL"),
        "character varying" => {
            TypeDef::generic("VARCHAR").with_args(length_args(char_max_length))
        }
        "character" => TypeDef::generic("CHAR").with_args(length_args(char_max_length)),
        "numeric" => {
            let mut args = Vec::new();
            if let Some(precision) = numeric_precision {
                args.push(TypeArg::Pos(PyValue::Int(precision as i64)));
                if let Some(scale) = numeric_scale {
                    args.push(TypeArg::Pos(PyValue::Int(scale as i64)));
                }
            }
            TypeDef::generic("NUMERIC").with_args(args)
        }
        "double precision" => TypeDef::dialect("postgresql", "DOUBLE_PRECISION"),
        "bytea" => TypeDef::dialect("postgresql", "BYTEA"),
        "uuid" => TypeDef::dialect("postgresql", "UUID"),
        "json" => TypeDef::dialect("postgresql", "JSON"),
        "jsonb" => TypeDef::dialect("postgresql", "JSONB"),
        "inet" => TypeDef::dialect("postgresql", "INET"),
        "cidr" => TypeDef::dialect("postgresql", "CIDR"),
        "macaddr" => TypeDef::dialect("postgresql", "MACADDR"),
        "money" => TypeDef::dialect("postgresql", "MONEY"),
        "interval" => TypeDef::dialect("postgresql", "INTERVAL"),
        "timestamp without time zone" => TypeDef::generic("TIMESTAMP"),
        "timestamp with time zone" => TypeDef::generic("TIMESTAMP")
            .with_args(vec![TypeArg::Kw("timezone".to_string(), PyValue::Bool(true))]),
        "time without time zone" => TypeDef::generic("TIME"),
        "time with time zone" => TypeDef::generic("TIME")
            .with_args(vec![TypeArg::Kw("timezone".to_string(), PyValue::Bool(true))]),
        "ARRAY" => {
            // udt_nameは要素型名の先頭にアンダースコアを付けた形
            let element_udt = udt_name
                .and_then(|u| u.strip_prefix('_'))
                .ok_or_else(|| ReflectError::UnrecognizedType {
                    type_name: udt_name.unwrap_or("ARRAY").to_string(),
                })?;
            let element = map_udt(element_udt, custom_types)?;
            TypeDef::dialect("postgresql", "ARRAY")
                .with_args(vec![TypeArg::Pos(PyValue::Type(Box::new(element)))])
        }
        "USER-DEFINED" => {
            let udt = udt_name.unwrap_or(data_type);
            custom_types
                .get(udt)
                .cloned()
                .ok_or_else(|| ReflectError::UnrecognizedType {
                    type_name: udt.to_string(),
                })?
        }
        _ => {
            return Err(ReflectError::UnrecognizedType {
                type_name: data_type.to_string(),
            })
        }
    };
    Ok(type_def)
}

/// 要素型のudt名を型定義に変換
fn map_udt(
    udt_name: &str,
    custom_types: &HashMap<String, TypeDef>,
) -> Result<TypeDef, ReflectError> {
    let type_def = match udt_name {
        "int2" => TypeDef::generic("SMALLINT"),
        "int4" => TypeDef::generic("INTEGER"),
        "int8" => TypeDef::generic("BIGINT"),
        "text" => TypeDef::generic("TEXT"),
        "varchar" => TypeDef::generic("VARCHAR"),
        "bool" => TypeDef::generic("BOOLEAN"),
        "float4" => TypeDef::generic("REAL"),
        "float8" => TypeDef::dialect("postgresql", "DOUBLE_PRECISION"),
        "numeric" => TypeDef::generic("NUMERIC"),
        "date" => TypeDef::generic("DATE"),
        "uuid" => TypeDef::dialect("postgresql", "UUID"),
        "timestamp" => TypeDef::generic("TIMESTAMP"),
        "timestamptz" => TypeDef::generic("TIMESTAMP")
            .with_args(vec![TypeArg::Kw("timezone".to_string(), PyValue::Bool(true))]),
        other => custom_types
            .get(other)
            .cloned()
            .ok_or_else(|| ReflectError::UnrecognizedType {
                type_name: other.to_string(),
            })?,
    };
    Ok(type_def)
}

/// ENUM型ローダー
///
/// 未知の型名をpg_enumから引き、方言ENUM型のインスタンスとして
/// 登録します。各ENUMは生成モジュール内で名前付き定数として一度だけ
/// 定義されます。
pub struct PgEnumLoader {
    pool: AnyPool,
}

impl PgEnumLoader {
    /// 接続プールからローダーを作成
    pub fn new(pool: AnyPool) -> Self {
        PgEnumLoader { pool }
    }
}

#[async_trait]
impl TypeLoader for PgEnumLoader {
    async fn load(
        &self,
        type_name: &str,
        symbols: &mut Symbols,
        provider: &mut dyn ReflectionProvider,
    ) -> Result<(), GenerateError> {
        let sql = r#"
            SELECT e.enumlabel
            FROM pg_type t
            JOIN pg_enum e ON e.enumtypid = t.oid
            WHERE t.typname = $1
            ORDER BY e.enumsortorder
        "#;
        let rows = sqlx::query(sql)
            .bind(type_name)
            .fetch_all(&self.pool)
            .await
            .map_err(ReflectError::Database)?;
        if rows.is_empty() {
            return Err(ReflectError::TypeLoad {
                type_name: type_name.to_string(),
                message: "not an enum type".to_string(),
            }
            .into());
        }

        let constant = type_name.to_uppercase();
        if !is_identifier(&constant) || is_keyword(&constant) {
            return Err(ReflectError::TypeLoad {
                type_name: type_name.to_string(),
                message: format!("cannot derive a constant name from '{}'", type_name),
            }
            .into());
        }

        let mut args: Vec<TypeArg> = rows
            .iter()
            .map(|row| TypeArg::Pos(PyValue::Str(row.get(0))))
            .collect();
        args.push(TypeArg::Kw(
            "name".to_string(),
            PyValue::Str(type_name.to_string()),
        ));

        let mut type_def = TypeDef::dialect("postgresql", "ENUM").with_args(args);
        type_def.instance_key = Some(type_name.to_string());

        symbols.set(&format!("type_{}", type_name), &constant)?;
        symbols.types.set_instance_renderer(
            type_name,
            InstanceRenderer::NamedConstant {
                symbol: constant,
                defined: false,
            },
        );
        provider.register_custom_type(type_name, type_def);
        Ok(())
    }
}
