//! Synchronous regex tokenizer for fenced code blocks.
//!
//! Each language is an ordered table of `(pattern, class)` rules. Every rule
//! is matched against the whole block, matches are sorted by start offset,
//! and overlaps are resolved greedily: the earliest-starting, first-listed
//! match wins and any later match starting inside it is dropped. The
//! surviving tokens are spliced into the escaped source from the end
//! backwards.

use once_cell::sync::Lazy;
use regex::Regex;

use super::escape::{html_escape, push_escaped};

/// A highlighted byte range `[start, end)` of the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub start: usize,
    pub end: usize,
    pub class: &'static str,
}

struct Rule {
    regex: Regex,
    class: &'static str,
    /// Capture group that forms the token; 0 is the whole match.
    group: usize,
}

fn rule(pattern: &str, class: &'static str) -> Rule {
    rule_group(pattern, class, 0)
}

fn rule_group(pattern: &str, class: &'static str, group: usize) -> Rule {
    Rule {
        regex: Regex::new(pattern).expect("valid highlight pattern"),
        class,
        group,
    }
}

const DQ_STRING: &str = r#""(?:[^"\\\n]|\\.)*""#;
const SQ_STRING: &str = r"'(?:[^'\\\n]|\\.)*'";
const NUMBER: &str = r"\b(?:0x[0-9a-fA-F_]+|\d[\d_]*(?:\.\d+)?(?:[eE][+-]?\d+)?)\b";

static JSON_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        rule_group(r#"("(?:[^"\\\n]|\\.)*")\s*:"#, "property", 1),
        rule(DQ_STRING, "string"),
        rule(r"-?\b\d+(?:\.\d+)?(?:[eE][+-]?\d+)?\b", "number"),
        rule(r"\b(?:true|false|null)\b", "keyword"),
        rule(r"[{}\[\],:]", "punctuation"),
    ]
});

static JS_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        rule(r"(?s)//[^\n]*|/\*.*?\*/", "comment"),
        rule(&format!(r"{DQ_STRING}|{SQ_STRING}|`(?:[^`\\]|\\.)*`"), "string"),
        rule(
            r"\b(?:const|let|var|function|return|if|else|for|while|do|switch|case|break|continue|new|class|extends|import|export|from|default|async|await|try|catch|finally|throw|typeof|instanceof|in|of|interface|type|enum|implements|public|private|protected|readonly|this|super|yield)\b",
            "keyword",
        ),
        rule(r"\b(?:true|false|null|undefined|NaN|Infinity)\b", "boolean"),
        rule(NUMBER, "number"),
        rule_group(r"\b([A-Za-z_$][\w$]*)\s*\(", "function", 1),
        rule(r"=>|===|!==|==|!=|<=|>=|&&|\|\||[+\-*/%=<>!?]", "operator"),
    ]
});

static PYTHON_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        rule(r"#[^\n]*", "comment"),
        rule(
            &format!(r#"(?s)"""(?:.*?)"""|'''(?:.*?)'''|[rbfu]?{DQ_STRING}|[rbfu]?{SQ_STRING}"#),
            "string",
        ),
        rule(r"@[A-Za-z_][\w.]*", "decorator"),
        rule(
            r"\b(?:def|class|return|if|elif|else|for|while|in|not|and|or|is|import|from|as|with|try|except|finally|raise|pass|break|continue|lambda|yield|global|nonlocal|async|await|del|assert)\b",
            "keyword",
        ),
        rule(r"\b(?:True|False|None)\b", "boolean"),
        rule(NUMBER, "number"),
        rule_group(r"\bdef\s+([A-Za-z_]\w*)", "function", 1),
        rule_group(r"\b([A-Za-z_]\w*)\s*\(", "function", 1),
    ]
});

static SHELL_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        rule_group(r"(?m)(?:^|\s)(#[^\n]*)", "comment", 1),
        rule(&format!(r"{DQ_STRING}|{SQ_STRING}"), "string"),
        rule(r"\$\{[^}\n]*\}|\$[A-Za-z_]\w*|\$[0-9@#?$!*-]", "variable"),
        rule(
            r"\b(?:if|then|else|elif|fi|for|while|until|do|done|case|esac|function|in|return|export|local|readonly|select)\b",
            "keyword",
        ),
        rule_group(r"(?m)^\s*([A-Za-z_][\w.-]*)", "function", 1),
        rule_group(r"\s(--?[A-Za-z][\w-]*)", "parameter", 1),
        rule(r"\|\||&&|[|&;><]", "operator"),
    ]
});

static RUST_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        rule(r"(?s)//[^\n]*|/\*.*?\*/", "comment"),
        rule(DQ_STRING, "string"),
        rule(r"'(?:[^'\\\n]|\\.)'", "char"),
        rule(r"'[a-z_]\w*\b", "lifetime"),
        rule(
            r"\b(?:as|async|await|break|const|continue|crate|dyn|else|enum|extern|fn|for|if|impl|in|let|loop|match|mod|move|mut|pub|ref|return|self|Self|static|struct|super|trait|type|unsafe|use|where|while)\b",
            "keyword",
        ),
        rule(r"\b(?:true|false)\b", "boolean"),
        rule(r"\b[a-z_][a-z0-9_]*!", "macro"),
        rule(r"\b[A-Z][A-Za-z0-9_]*\b", "class-name"),
        rule(NUMBER, "number"),
        rule_group(r"\b([a-z_][a-z0-9_]*)\s*\(", "function", 1),
    ]
});

static GENERIC_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        rule(r"(?s)//[^\n]*|/\*.*?\*/", "comment"),
        rule(&format!(r"{DQ_STRING}|{SQ_STRING}"), "string"),
        rule(NUMBER, "number"),
    ]
});

fn rules_for(language: &str) -> &'static [Rule] {
    match language.trim().to_ascii_lowercase().as_str() {
        "json" | "jsonc" | "json5" => &JSON_RULES,
        "js" | "javascript" | "jsx" | "mjs" | "cjs" | "ts" | "typescript" | "tsx" => &JS_RULES,
        "py" | "python" | "python3" => &PYTHON_RULES,
        "sh" | "bash" | "shell" | "zsh" | "console" | "shellscript" => &SHELL_RULES,
        "rs" | "rust" => &RUST_RULES,
        _ => &GENERIC_RULES,
    }
}

/// Tokenize `code` for `language`. The result is sorted by start offset and
/// contains no overlapping ranges.
pub fn tokenize(code: &str, language: &str) -> Vec<Token> {
    let mut candidates = Vec::new();
    for rule in rules_for(language) {
        for caps in rule.regex.captures_iter(code) {
            let Some(m) = caps.get(rule.group).or_else(|| caps.get(0)) else {
                continue;
            };
            if m.start() == m.end() {
                continue;
            }
            candidates.push(Token {
                start: m.start(),
                end: m.end(),
                class: rule.class,
            });
        }
    }

    // Stable: equal starts keep rule order, so the first-listed rule wins.
    candidates.sort_by_key(|t| t.start);

    let mut tokens: Vec<Token> = Vec::with_capacity(candidates.len());
    let mut last_end = 0;
    for token in candidates {
        if token.start < last_end {
            continue;
        }
        last_end = token.end;
        tokens.push(token);
    }
    tokens
}

/// Escape `code` and wrap each token in a `<span class="token …">`.
///
/// Tokens are applied from the end of the string backwards so earlier
/// offsets stay valid while splicing.
pub fn splice_tokens(code: &str, tokens: &[Token]) -> String {
    let mut pieces: Vec<String> = Vec::with_capacity(tokens.len() * 2 + 1);
    let mut cursor = code.len();
    for token in tokens.iter().rev() {
        if token.end > cursor || token.start > token.end {
            continue;
        }
        pieces.push(html_escape(&code[token.end..cursor]));
        let mut span = String::with_capacity(token.end - token.start + 32);
        span.push_str(r#"<span class="token "#);
        span.push_str(token.class);
        span.push_str(r#"">"#);
        push_escaped(&mut span, &code[token.start..token.end]);
        span.push_str("</span>");
        pieces.push(span);
        cursor = token.start;
    }
    pieces.push(html_escape(&code[..cursor]));
    pieces.reverse();
    pieces.concat()
}

/// Highlight `code`, or only escape it when it exceeds `max_chars` bytes.
pub fn highlight(code: &str, language: &str, max_chars: usize) -> String {
    if code.len() > max_chars {
        return html_escape(code);
    }
    splice_tokens(code, &tokenize(code, language))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classes_of<'a>(code: &'a str, tokens: &[Token]) -> Vec<(&'a str, &'static str)> {
        tokens
            .iter()
            .map(|t| (&code[t.start..t.end], t.class))
            .collect()
    }

    #[test]
    fn json_property_and_number() {
        let code = r#"{"a":1}"#;
        let tokens = tokenize(code, "json");
        let classes = classes_of(code, &tokens);
        assert!(classes.contains(&(r#""a""#, "property")));
        assert!(classes.contains(&("1", "number")));
        assert!(!classes.iter().any(|(_, c)| *c == "string"));

        let html = highlight(code, "json", 1000);
        assert!(html.contains(r#"<span class="token property">&quot;a&quot;</span>"#));
        assert!(html.contains(r#"<span class="token number">1</span>"#));
    }

    #[test]
    fn json_string_values_are_strings() {
        let code = r#"{"k": "v"}"#;
        let classes = classes_of(code, &tokenize(code, "json"));
        assert!(classes.contains(&(r#""k""#, "property")));
        assert!(classes.contains(&(r#""v""#, "string")));
    }

    #[test]
    fn comment_wins_over_keywords_inside_it() {
        let code = "// let x = 1\nlet y = 2;";
        let tokens = tokenize(code, "ts");
        let classes = classes_of(code, &tokens);
        assert_eq!(classes[0], ("// let x = 1", "comment"));
        assert!(classes.contains(&("let", "keyword")));
        assert_eq!(classes.iter().filter(|(_, c)| *c == "keyword").count(), 1);
    }

    #[test]
    fn tokens_never_overlap() {
        let code = "fn main() { let s = \"fn // not a comment\"; println!(\"{}\", s); } // done";
        let tokens = tokenize(code, "rust");
        for pair in tokens.windows(2) {
            assert!(pair[0].end <= pair[1].start, "{pair:?}");
        }
    }

    #[test]
    fn unknown_language_uses_generic_rules() {
        let code = "x = \"hi\" // note";
        let classes = classes_of(code, &tokenize(code, "cobol"));
        assert!(classes.contains(&("\"hi\"", "string")));
        assert!(classes.contains(&("// note", "comment")));
    }

    #[test]
    fn splicing_escapes_untokenized_text() {
        let html = highlight("if a < b && c > d { }", "cobol", 1000);
        assert!(html.contains("a &lt; b &amp;&amp; c &gt; d"));
    }

    #[test]
    fn oversized_code_is_only_escaped() {
        let html = highlight("<b>\"x\"</b>", "json", 3);
        assert_eq!(html, "&lt;b&gt;&quot;x&quot;&lt;/b&gt;");
    }

    #[test]
    fn splice_preserves_source_text() {
        let code = "def f(x):\n    return x + 1  # inc\n";
        let html = highlight(code, "python", 10_000);
        let stripped = Regex::new(r"<[^>]+>").unwrap().replace_all(&html, "");
        assert_eq!(stripped, code);
    }

    #[test]
    fn shell_comment_and_variable() {
        let code = "echo $HOME # print home";
        let classes = classes_of(code, &tokenize(code, "bash"));
        assert!(classes.contains(&("$HOME", "variable")));
        assert!(classes.contains(&("# print home", "comment")));
        assert!(classes.contains(&("echo", "function")));
    }
}
