// カラム描画
//
// リフレクション済みカラム定義を生成モジュール内のカラム宣言行に
// 変換します。型はシンボル表を通じて構築時に解決済みのテキストを
// 保持します。

use crate::core::error::GenerateError;
use crate::core::pysyntax::py_str;
use crate::core::reflect::{ColumnDef, DefaultDef};
use crate::core::symbols::Symbols;

/// 描画用カラムモデル
#[derive(Debug, Clone)]
pub struct Column {
    /// カラム名
    pub name: String,
    /// 解決済みの型テキスト
    pub ctype: String,
    nullable: bool,
    primary_key: bool,
    autoincrement: bool,
    server_default: Option<DefaultDef>,
}

impl Column {
    /// リフレクション定義から構築
    ///
    /// 型の解決はここで行われ、未知の型は `UnrecognizedType` として
    /// 呼び出し側のリトライループに届きます。
    pub fn from_def(
        def: &ColumnDef,
        symbols: &mut Symbols,
        dialect: &str,
    ) -> Result<Self, GenerateError> {
        let ctype = symbols.render_type(&def.ctype, dialect)?;
        Ok(Column {
            name: def.name.clone(),
            ctype,
            nullable: def.nullable,
            primary_key: def.primary_key,
            autoincrement: def.autoincrement,
            server_default: def.server_default.clone(),
        })
    }

    /// カラム宣言を描画
    ///
    /// デフォルト値と一致するキーワードは省略します。NULL許容でない
    /// 場合のみ `nullable=False`、主キーかつ非自動採番の場合のみ
    /// `autoincrement=False` が付きます。
    pub fn render(&self, symbols: &Symbols) -> Result<String, GenerateError> {
        let mut params = vec![py_str(&self.name), self.ctype.clone()];
        if !self.nullable {
            params.push("nullable=False".to_string());
        }
        if !self.autoincrement && self.primary_key {
            params.push("autoincrement=False".to_string());
        }
        if let Some(default) = &self.server_default {
            params.push(format!(
                "server_default={}",
                render_default(default, symbols)?
            ));
        }
        Ok(format!("{}({})", symbols.get("column")?, params.join(", ")))
    }
}

/// サーバーサイドデフォルトを描画
///
/// IDENTITY構成はラップせずライブラリ属性の呼び出しとして描画し、
/// それ以外はデフォルト句でラップします。
fn render_default(default: &DefaultDef, symbols: &Symbols) -> Result<String, GenerateError> {
    if default.is_identity {
        return Ok(format!("{}.{}", symbols.get("sa")?, default.arg));
    }
    let for_update = if default.for_update {
        ", for_update=True"
    } else {
        ""
    };
    Ok(format!(
        "{}({}{})",
        symbols.get("default")?,
        py_str(&default.arg),
        for_update
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reflect::TypeDef;
    use crate::core::symbols::SymbolDefaults;

    fn column_def(name: &str) -> ColumnDef {
        ColumnDef {
            name: name.to_string(),
            ctype: TypeDef::generic("INTEGER"),
            nullable: true,
            primary_key: false,
            autoincrement: false,
            server_default: None,
        }
    }

    fn render(def: &ColumnDef) -> String {
        let mut symbols = Symbols::new(&SymbolDefaults::default()).unwrap();
        let column = Column::from_def(def, &mut symbols, "postgresql").unwrap();
        column.render(&symbols).unwrap()
    }

    #[test]
    fn test_plain_nullable_column() {
        assert_eq!(render(&column_def("age")), "C('age', t.INTEGER)");
    }

    #[test]
    fn test_not_nullable() {
        let def = ColumnDef {
            nullable: false,
            ..column_def("age")
        };
        assert_eq!(render(&def), "C('age', t.INTEGER, nullable=False)");
    }

    #[test]
    fn test_non_autoincrement_primary_key() {
        let def = ColumnDef {
            nullable: false,
            primary_key: true,
            ..column_def("id")
        };
        assert_eq!(
            render(&def),
            "C('id', t.INTEGER, nullable=False, autoincrement=False)"
        );
    }

    #[test]
    fn test_autoincrement_primary_key_omits_keyword() {
        let def = ColumnDef {
            nullable: false,
            primary_key: true,
            autoincrement: true,
            ..column_def("id")
        };
        assert_eq!(render(&def), "C('id', t.INTEGER, nullable=False)");
    }

    #[test]
    fn test_server_default_wrapped() {
        let def = ColumnDef {
            server_default: Some(DefaultDef {
                arg: "now()".to_string(),
                for_update: false,
                is_identity: false,
            }),
            ..column_def("created_at")
        };
        assert_eq!(
            render(&def),
            "C('created_at', t.INTEGER, server_default=D('now()'))"
        );
    }

    #[test]
    fn test_server_default_for_update() {
        let def = ColumnDef {
            server_default: Some(DefaultDef {
                arg: "now()".to_string(),
                for_update: true,
                is_identity: false,
            }),
            ..column_def("updated_at")
        };
        assert_eq!(
            render(&def),
            "C('updated_at', t.INTEGER, server_default=D('now()', for_update=True))"
        );
    }

    #[test]
    fn test_identity_default_rendered_directly() {
        let def = ColumnDef {
            nullable: false,
            primary_key: true,
            autoincrement: true,
            server_default: Some(DefaultDef {
                arg: "Identity(always=True)".to_string(),
                for_update: false,
                is_identity: true,
            }),
            ..column_def("id")
        };
        assert_eq!(
            render(&def),
            "C('id', t.INTEGER, nullable=False, server_default=_sa.Identity(always=True))"
        );
    }
}
