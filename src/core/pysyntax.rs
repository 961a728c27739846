// Python出力構文ヘルパー
//
// 生成対象言語（Python）の予約語判定・識別子文法・リテラル表現を
// 提供します。出力されるテキストが有効なPythonであることの根拠は
// すべてこのモジュールに集約されます。

use std::sync::LazyLock;

use regex::Regex;

/// Python 3 の予約語一覧
///
/// シンボルの識別子やカラムの属性アクセスに使用できません。
pub const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break",
    "class", "continue", "def", "del", "elif", "else", "except", "finally",
    "for", "from", "global", "if", "import", "in", "is", "lambda", "nonlocal",
    "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
];

/// Python識別子のトークン文法
static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Pythonの予約語かどうかを判定
pub fn is_keyword(name: &str) -> bool {
    PYTHON_KEYWORDS.contains(&name)
}

/// 有効なPython識別子（ASCII限定、予約語チェックなし）かどうかを判定
pub fn is_identifier(name: &str) -> bool {
    name.is_ascii() && NAME_RE.is_match(name)
}

/// Python文字列リテラル表現
///
/// CPythonのreprに合わせます。シングルクォートを優先し、文字列が
/// シングルクォートを含みダブルクォートを含まない場合のみ
/// ダブルクォートで囲みます。
pub fn py_str(value: &str) -> String {
    let quote = if value.contains('\'') && !value.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(value.len() + 2);
    out.push(quote);
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Python真偽値リテラル表現
pub fn py_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords() {
        assert!(is_keyword("class"));
        assert!(is_keyword("True"));
        assert!(is_keyword("async"));
        assert!(!is_keyword("table"));
        assert!(!is_keyword("Class"));
    }

    #[test]
    fn test_identifier_grammar() {
        assert!(is_identifier("user_id"));
        assert!(is_identifier("_private"));
        assert!(is_identifier("T"));
        assert!(!is_identifier("9lives"));
        assert!(!is_identifier("user-id"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("naïve"));
        assert!(!is_identifier("has space"));
    }

    #[test]
    fn test_py_str_plain() {
        assert_eq!(py_str("users"), "'users'");
    }

    #[test]
    fn test_py_str_prefers_double_quotes_for_single_quote() {
        assert_eq!(py_str("it's"), "\"it's\"");
    }

    #[test]
    fn test_py_str_escapes_single_quote_when_both_present() {
        assert_eq!(py_str("a'b\"c"), "'a\\'b\"c'");
    }

    #[test]
    fn test_py_str_escapes() {
        assert_eq!(py_str("a\\b"), "'a\\\\b'");
        assert_eq!(py_str("line\nbreak"), "'line\\nbreak'");
        assert_eq!(py_str("tab\there"), "'tab\\there'");
        assert_eq!(py_str("bell\x07"), "'bell\\x07'");
    }

    #[test]
    fn test_py_bool() {
        assert_eq!(py_bool(true), "True");
        assert_eq!(py_bool(false), "False");
    }
}
