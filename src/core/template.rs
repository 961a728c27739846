// テキストテンプレート
//
// 生成モジュールの骨格を表現する、`%(name)s` プレースホルダー形式の
// 最小限のテンプレートエンジンです。

use std::collections::BTreeMap;

/// プレースホルダー付きテキストテンプレート
///
/// 構築時に共通インデントの除去と前後の空白行の正規化を行い、
/// `expand` でプレースホルダーを値に置換します。
#[derive(Debug, Clone)]
pub struct Template {
    text: String,
}

impl Template {
    /// テンプレートを構築
    ///
    /// 全行に共通する先頭の空白（インデント）を取り除き、先頭の空行と
    /// 末尾の空白を削除します。ソース中にインデントして埋め込まれた
    /// テンプレート文字列をそのまま渡せるようにするためです。
    pub fn new(source: &str) -> Self {
        Template {
            text: dedent(source).trim_start_matches('\n').trim_end().to_string(),
        }
    }

    /// テンプレートのテキストを返す
    pub fn text(&self) -> &str {
        &self.text
    }

    /// プレースホルダーを展開
    ///
    /// `%(key)s` を対応する値に置換します。`%%` はリテラルの `%` に
    /// なります。未知のプレースホルダーはそのまま残します。
    pub fn expand(&self, values: &BTreeMap<String, String>) -> String {
        let mut out = String::with_capacity(self.text.len());
        let mut rest = self.text.as_str();
        while let Some(pos) = rest.find('%') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            if let Some(stripped) = tail.strip_prefix("%%") {
                out.push('%');
                rest = stripped;
            } else if let Some(after) = tail.strip_prefix("%(") {
                match after.find(")s") {
                    Some(end) => {
                        let key = &after[..end];
                        match values.get(key) {
                            Some(value) => out.push_str(value),
                            None => {
                                out.push_str("%(");
                                out.push_str(key);
                                out.push_str(")s");
                            }
                        }
                        rest = &after[end + 2..];
                    }
                    None => {
                        out.push('%');
                        rest = &tail[1..];
                    }
                }
            } else {
                out.push('%');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        out
    }
}

/// 全行に共通する先頭空白を除去
fn dedent(source: &str) -> String {
    let margin = source
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);
    source
        .lines()
        .map(|line| {
            if line.len() >= margin {
                &line[margin..]
            } else {
                line.trim_start_matches([' ', '\t'])
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_dedent_and_trim() {
        let tpl = Template::new(
            "
            line one
                indented
            line two
        ",
        );
        assert_eq!(tpl.text(), "line one\n    indented\nline two");
    }

    #[test]
    fn test_expand_placeholders() {
        let tpl = Template::new("hello %(name)s, %(name)s again");
        let result = tpl.expand(&values(&[("name", "world")]));
        assert_eq!(result, "hello world, world again");
    }

    #[test]
    fn test_percent_escape() {
        let tpl = Template::new("100%% of %(what)s");
        let result = tpl.expand(&values(&[("what", "tests")]));
        assert_eq!(result, "100% of tests");
    }

    #[test]
    fn test_unknown_placeholder_left_verbatim() {
        let tpl = Template::new("%(known)s and %(unknown)s");
        let result = tpl.expand(&values(&[("known", "yes")]));
        assert_eq!(result, "yes and %(unknown)s");
    }

    #[test]
    fn test_lone_percent_passes_through() {
        let tpl = Template::new("50% done");
        assert_eq!(tpl.expand(&values(&[])), "50% done");
    }
}
