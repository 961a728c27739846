// 制約描画
//
// 主キー・一意・外部キー制約を生成モジュール内の宣言テキストに
// 変換します。チェック制約はファクトリ段階で読み飛ばされます。
// 外部キーには前方参照・循環の注釈状態が付きます。

use crate::core::error::GenerateError;
use crate::core::pysyntax::{is_identifier, is_keyword, py_bool, py_str};
use crate::core::reflect::{ConstraintAttrs, ConstraintDef};
use crate::core::symbols::Symbols;

/// 制約種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    PrimaryKey,
    Unique,
    ForeignKey,
}

impl ConstraintKind {
    /// ソート用の種別順位
    pub fn rank(self) -> u8 {
        match self {
            ConstraintKind::PrimaryKey => 0,
            ConstraintKind::Unique => 1,
            ConstraintKind::ForeignKey => 2,
        }
    }
}

/// 外部キーの注釈状態
///
/// 描画位置と参照先の位置関係を表します。注釈の変更は複製を通じて
/// 行い、共有の可変状態は持ちません。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Annotation {
    /// 注釈なし（前方参照でない通常の外部キー）
    None,
    /// 参照先が既に定義済み（この制約は参照元テーブルの位置で描画）
    Seen {
        /// 制約を所有するテーブルの変数名
        owner: String,
    },
    /// 参照先が未定義（コメントアウトされた複製が参照先の位置に置かれる）
    Unseen {
        /// 制約を所有するテーブルの変数名
        owner: String,
    },
}

/// 描画用制約モデル
#[derive(Debug, Clone)]
pub struct Constraint {
    kind: ConstraintKind,
    def: ConstraintDef,
    /// 循環切断によってALTER文扱いになったか
    ///
    /// リフレクション段階からuse_alterが立っていた外部キーとは
    /// 区別され、循環注釈はこちらにのみ付きます。
    cycle_forced: bool,
    /// 所属テーブルの変数名
    pub table: String,
    /// 注釈状態
    pub annotation: Annotation,
}

impl Constraint {
    /// リフレクション定義から構築
    ///
    /// チェック制約は表現対象外のため `None` を返します。対応する
    /// 制約ヘルパーのインポート文をここで登録します。
    pub fn from_def(
        def: &ConstraintDef,
        table: &str,
        symbols: &mut Symbols,
    ) -> Result<Option<Self>, GenerateError> {
        let (kind, import_id, import_stmt) = match def {
            ConstraintDef::Check { .. } => return Ok(None),
            ConstraintDef::PrimaryKey { .. } => (
                ConstraintKind::PrimaryKey,
                "pk",
                "from %(constraints)s import PrimaryKey as %(pk)s",
            ),
            ConstraintDef::Unique { .. } => (
                ConstraintKind::Unique,
                "uk",
                "from %(constraints)s import Unique as %(uk)s",
            ),
            ConstraintDef::ForeignKey { .. } => (
                ConstraintKind::ForeignKey,
                "fk",
                "from %(constraints)s import ForeignKey as %(fk)s",
            ),
        };
        symbols.imports.set(import_id, import_stmt)?;
        Ok(Some(Constraint {
            kind,
            def: def.clone(),
            cycle_forced: false,
            table: table.to_string(),
            annotation: Annotation::None,
        }))
    }

    /// 制約種別を返す
    pub fn kind(&self) -> ConstraintKind {
        self.kind
    }

    /// 制約名を返す
    pub fn name(&self) -> Option<&str> {
        self.def.attrs().name.as_deref()
    }

    /// 外部キーの参照先修飾キーを返す
    pub fn referred_key(&self) -> Option<String> {
        self.def.referred_key()
    }

    /// 外部キーのuse_alterフラグを返す
    pub fn use_alter(&self) -> bool {
        matches!(self.def, ConstraintDef::ForeignKey { use_alter: true, .. })
    }

    /// 循環切断によるALTER文扱いに切り替える
    pub fn defer(&mut self) {
        self.def.set_use_alter(true);
        self.cycle_forced = true;
    }

    /// 注釈を差し替えた複製を返す
    pub fn with_annotation(&self, annotation: Annotation) -> Self {
        Constraint {
            annotation,
            ..self.clone()
        }
    }

    /// 制約宣言を描画
    pub fn render(&self, symbols: &Symbols) -> Result<String, GenerateError> {
        match &self.def {
            ConstraintDef::PrimaryKey { attrs, columns } => {
                self.render_key(symbols, "pk", attrs, columns)
            }
            ConstraintDef::Unique { attrs, columns } => {
                self.render_key(symbols, "uk", attrs, columns)
            }
            ConstraintDef::ForeignKey {
                attrs,
                columns,
                referred_table,
                referred_columns,
                onupdate,
                ondelete,
                use_alter,
                ..
            } => {
                let own = format!(
                    "[{}]",
                    columns
                        .iter()
                        .map(|col| format!("{}{}", self.table, access_col(col)))
                        .collect::<Vec<_>>()
                        .join(",\n    ")
                );
                let remote_symbol = symbols.get(&format!("table_{}", referred_table))?;
                let remote = format!(
                    "[{}]",
                    referred_columns
                        .iter()
                        .map(|col| format!("{}{}", remote_symbol, access_col(col)))
                        .collect::<Vec<_>>()
                        .join(",\n    ")
                );
                let mut keywords = Vec::new();
                if let Some(value) = onupdate {
                    keywords.push(format!("onupdate={}", py_str(value)));
                }
                if let Some(value) = ondelete {
                    keywords.push(format!("ondelete={}", py_str(value)));
                }
                if *use_alter {
                    keywords.push("use_alter=True".to_string());
                }
                let result =
                    render_call(symbols, "fk", &[own, remote], attrs, &keywords, false)?;
                Ok(self.annotate(result, self.cycle_forced))
            }
            ConstraintDef::Check { .. } => Err(GenerateError::AssertionFailure {
                message: "check constraints are not renderable".to_string(),
            }),
        }
    }

    /// 主キー・一意制約の共通描画
    fn render_key(
        &self,
        symbols: &Symbols,
        symbol_name: &str,
        attrs: &ConstraintAttrs,
        columns: &[String],
    ) -> Result<String, GenerateError> {
        let args: Vec<String> = columns
            .iter()
            .map(|col| format!("{}{}", self.table, access_col(col)))
            .collect();
        let short = columns.len() <= 1;
        let result = render_call(symbols, symbol_name, &args, attrs, &[], short)?;
        if columns.is_empty() {
            return Ok(format!("# {}", result));
        }
        Ok(result)
    }

    /// 前方参照・循環の注釈コメントを付与
    fn annotate(&self, result: String, cyclic: bool) -> String {
        match &self.annotation {
            Annotation::None => result,
            Annotation::Seen { owner } => {
                if cyclic {
                    format!("\n# Cyclic foreign key:\n{}", result)
                } else {
                    format!(
                        "\n# Foreign key belongs to {}:\n{}",
                        py_str(owner),
                        result
                    )
                }
            }
            Annotation::Unseen { owner } => {
                let header = if cyclic {
                    format!("Cyclic foreign key, defined at table {}:", py_str(owner))
                } else {
                    format!("Defined at table {}:", py_str(owner))
                };
                let mut out = String::from("\n");
                out.push_str(&format!("# {}\n", header));
                let mut lines = result.lines().peekable();
                while let Some(line) = lines.next() {
                    out.push_str("# ");
                    out.push_str(line);
                    if lines.peek().is_some() {
                        out.push('\n');
                    }
                }
                out
            }
        }
    }
}

/// カラムアクセス文字列を生成
///
/// 属性アクセスが可能な名前は `.c.name`、そうでない名前は
/// 辞書アクセス `.c['name']` になります。
pub fn access_col(name: &str) -> String {
    if name.is_ascii() && !is_keyword(name) && is_identifier(name) {
        format!(".c.{}", name)
    } else {
        format!(".c[{}]", py_str(name))
    }
}

/// 全制約共通の呼び出しレイアウト
///
/// 短い形式は引数が一行に収まる場合のみで、共通属性が2つ以上あると
/// 複数行形式に切り替わります。
fn render_call(
    symbols: &Symbols,
    symbol_name: &str,
    args: &[String],
    attrs: &ConstraintAttrs,
    keywords: &[String],
    short: bool,
) -> Result<String, GenerateError> {
    let mut params = Vec::new();
    if let Some(name) = &attrs.name {
        params.push(format!("name={}", py_str(name)));
    }
    if let Some(deferrable) = attrs.deferrable {
        params.push(format!("deferrable={}", py_bool(deferrable)));
    }
    if let Some(initially) = &attrs.initially {
        params.push(format!("initially={}", py_str(initially)));
    }
    params.extend(keywords.iter().cloned());

    let short = short && params.len() <= 1;

    let args_text = if args.is_empty() {
        String::new()
    } else if short {
        args.join(", ")
    } else {
        format!("\n    {},", args.join(",\n    "))
    };

    let params_text = if short {
        let joined = params.join(", ");
        if !args_text.is_empty() && !joined.is_empty() {
            format!(", {}", joined)
        } else {
            joined
        }
    } else {
        let mut joined = params.join(",\n    ");
        if !joined.is_empty() {
            joined = format!("\n    {},", joined);
        }
        if !args_text.is_empty() || !joined.is_empty() {
            joined.push('\n');
        }
        joined
    };

    Ok(format!(
        "{}({}{})",
        symbols.get(symbol_name)?,
        args_text,
        params_text
    ))
}
