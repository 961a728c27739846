// リフレクションモデルとプロバイダー契約
//
// データベースから取得したメタデータの構造化表現と、それを供給する
// 非同期プロバイダーのトレイトを定義します。コア層はこのモデルのみを
// 扱い、ドライバー固有の型には依存しません。

use async_trait::async_trait;

use crate::core::error::{GenerateError, ReflectError};
use crate::core::pysyntax::{py_bool, py_str};
use crate::core::symbols::Symbols;

/// リフレクション済みテーブル定義
#[derive(Debug, Clone)]
pub struct TableDef {
    /// テーブル名
    pub name: String,
    /// スキーマ名（デフォルトスキーマの場合はNone）
    pub schema: Option<String>,
    /// カラム定義（物理的な定義順）
    pub columns: Vec<ColumnDef>,
    /// 制約定義
    pub constraints: Vec<ConstraintDef>,
}

impl TableDef {
    /// 修飾キー（`schema.name` または `name`）を返す
    pub fn key(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }
}

/// リフレクション済みカラム定義
#[derive(Debug, Clone)]
pub struct ColumnDef {
    /// カラム名
    pub name: String,
    /// カラム型
    pub ctype: TypeDef,
    /// NULL許容か
    pub nullable: bool,
    /// 主キー構成カラムか
    pub primary_key: bool,
    /// 自動採番カラムか
    pub autoincrement: bool,
    /// サーバーサイドデフォルト
    pub server_default: Option<DefaultDef>,
}

/// サーバーサイドデフォルト定義
#[derive(Debug, Clone)]
pub struct DefaultDef {
    /// デフォルト式（identityの場合はコンストラクタ呼び出しテキスト）
    pub arg: String,
    /// UPDATE時デフォルトか
    pub for_update: bool,
    /// IDENTITY構成か（ラップせず直接属性呼び出しとして描画される）
    pub is_identity: bool,
}

/// リフレクション済み型定義
#[derive(Debug, Clone)]
pub struct TypeDef {
    /// 型クラス名（例: `INTEGER`, `ENUM`）
    pub class_name: String,
    /// 型クラスの所属モジュール（例: `sqlalchemy.sql.sqltypes`）
    pub module: String,
    /// 継承チェーン上の祖先クラス名（is-a解決に使用）
    pub bases: Vec<String>,
    /// コンストラクタ引数
    pub args: Vec<TypeArg>,
    /// インスタンス単位の描画キー（名前付き型のみ）
    pub instance_key: Option<String>,
}

impl TypeDef {
    /// 方言非依存の汎用型を構築
    pub fn generic(class_name: &str) -> Self {
        TypeDef {
            class_name: class_name.to_string(),
            module: "sqlalchemy.sql.sqltypes".to_string(),
            bases: Vec::new(),
            args: Vec::new(),
            instance_key: None,
        }
    }

    /// 方言固有型を構築
    pub fn dialect(dialect_module: &str, class_name: &str) -> Self {
        TypeDef {
            class_name: class_name.to_string(),
            module: format!("sqlalchemy.dialects.{}", dialect_module),
            bases: Vec::new(),
            args: Vec::new(),
            instance_key: None,
        }
    }

    /// コンストラクタ引数を付与
    pub fn with_args(mut self, args: Vec<TypeArg>) -> Self {
        self.args = args;
        self
    }

    /// 完全修飾名（`module.Class`）を返す
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module, self.class_name)
    }
}

/// 型コンストラクタ引数
#[derive(Debug, Clone)]
pub enum TypeArg {
    /// 位置引数
    Pos(PyValue),
    /// キーワード引数
    Kw(String, PyValue),
}

/// Pythonリテラルとして描画可能な値
#[derive(Debug, Clone)]
pub enum PyValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// ネストした型インスタンス（例: `ARRAY(TEXT())` の要素型）
    Type(Box<TypeDef>),
}

impl PyValue {
    /// Pythonリテラル表現を返す（ネスト型は呼び出し側で描画）
    pub fn render_scalar(&self) -> Option<String> {
        match self {
            PyValue::Str(s) => Some(py_str(s)),
            PyValue::Int(i) => Some(i.to_string()),
            PyValue::Float(f) => Some(format!("{:?}", f)),
            PyValue::Bool(b) => Some(py_bool(*b).to_string()),
            PyValue::Type(_) => None,
        }
    }
}

/// 制約の共通属性
#[derive(Debug, Clone, Default)]
pub struct ConstraintAttrs {
    /// 制約名
    pub name: Option<String>,
    /// DEFERRABLE属性
    pub deferrable: Option<bool>,
    /// INITIALLY属性
    pub initially: Option<String>,
}

/// リフレクション済み制約定義
#[derive(Debug, Clone)]
pub enum ConstraintDef {
    /// 主キー制約
    PrimaryKey {
        attrs: ConstraintAttrs,
        columns: Vec<String>,
    },
    /// 一意制約
    Unique {
        attrs: ConstraintAttrs,
        columns: Vec<String>,
    },
    /// 外部キー制約
    ForeignKey {
        attrs: ConstraintAttrs,
        columns: Vec<String>,
        referred_schema: Option<String>,
        referred_table: String,
        referred_columns: Vec<String>,
        onupdate: Option<String>,
        ondelete: Option<String>,
        use_alter: bool,
    },
    /// チェック制約（描画対象外、ファクトリで読み飛ばされる）
    Check {
        attrs: ConstraintAttrs,
        expression: String,
    },
}

impl ConstraintDef {
    /// 共通属性を返す
    pub fn attrs(&self) -> &ConstraintAttrs {
        match self {
            ConstraintDef::PrimaryKey { attrs, .. }
            | ConstraintDef::Unique { attrs, .. }
            | ConstraintDef::ForeignKey { attrs, .. }
            | ConstraintDef::Check { attrs, .. } => attrs,
        }
    }

    /// 外部キーの参照先修飾キーを返す
    pub fn referred_key(&self) -> Option<String> {
        match self {
            ConstraintDef::ForeignKey {
                referred_schema,
                referred_table,
                ..
            } => Some(match referred_schema {
                Some(schema) => format!("{}.{}", schema, referred_table),
                None => referred_table.clone(),
            }),
            _ => None,
        }
    }

    /// 外部キーのuse_alterフラグを設定（他の制約では無視）
    pub fn set_use_alter(&mut self, value: bool) {
        if let ConstraintDef::ForeignKey { use_alter, .. } = self {
            *use_alter = value;
        }
    }
}

/// リフレクションプロバイダー契約
///
/// データベースごとの実装がこのトレイトを提供します。コアの
/// リトライループは `UnrecognizedType` のみを捕捉します。
#[async_trait]
pub trait ReflectionProvider: Send {
    /// 方言名（例: "postgresql"）
    fn dialect(&self) -> &str;

    /// テーブル定義を取得
    async fn table(
        &mut self,
        name: &str,
        schema: Option<&str>,
    ) -> Result<TableDef, ReflectError>;

    /// カスタム型を登録（型ローダーから呼ばれる）
    fn register_custom_type(&mut self, name: &str, type_def: TypeDef);
}

/// 型ローダー契約
///
/// 未知の型名を受け取り、シンボル表・型レジストリ・プロバイダーの
/// カスタム型表を更新してリトライを成立させます。
#[async_trait]
pub trait TypeLoader: Send + Sync {
    async fn load(
        &self,
        type_name: &str,
        symbols: &mut Symbols,
        provider: &mut dyn ReflectionProvider,
    ) -> Result<(), GenerateError>;
}
