use crate::models::render::{BlockKind, ClassifiedBlock, CodeBlock, Complexity, HighlightSpan, StyleTag};

const SQL_TAGS: &[&str] = &["sql", "mongodb"];
const DIAGRAM_TAGS: &[&str] = &["mermaid"];

/// Statement prefixes allowed to run without the user asking
const AUTO_RUN_PREFIXES: &[&str] = &["SELECT", "WITH"];

/// (needle, weight); matched as case-insensitive substrings
const COMPLEXITY_WEIGHTS: &[(&str, u32)] = &[
    ("JOIN", 2),
    ("GROUP BY", 1),
    ("HAVING", 2),
    ("WITH", 2),
    ("UNION", 2),
];

/// Label a fenced block by its language tag
pub fn classify(language: Option<&str>) -> BlockKind {
    let tag = match language.map(str::trim) {
        Some(tag) if !tag.is_empty() => tag.to_lowercase(),
        _ => return BlockKind::Plain,
    };

    if SQL_TAGS.contains(&tag.as_str()) {
        BlockKind::Sql
    } else if DIAGRAM_TAGS.contains(&tag.as_str()) {
        BlockKind::Diagram
    } else {
        BlockKind::Generic
    }
}

pub fn classify_block(block: CodeBlock) -> ClassifiedBlock {
    let kind = classify(block.language.as_deref());
    ClassifiedBlock { block, kind }
}

/// Whether a SQL block may be executed automatically.
///
/// Prefix check only: the text must start with SELECT or WITH after trimming. Rejecting
/// writes hidden inside such statements is left to the execution backend.
pub fn is_auto_run_eligible(sql: &str) -> bool {
    let trimmed = sql.trim();
    AUTO_RUN_PREFIXES.iter().any(|prefix| {
        trimmed
            .get(..prefix.len())
            .map(|head| head.eq_ignore_ascii_case(prefix))
            .unwrap_or(false)
    })
}

/// Keyword-weight score behind [`complexity`]
pub fn complexity_score(sql: &str) -> u32 {
    let upper = sql.to_uppercase();
    let mut score: u32 = COMPLEXITY_WEIGHTS
        .iter()
        .filter(|(needle, _)| upper.contains(needle))
        .map(|(_, weight)| weight)
        .sum();

    if upper.contains("SELECT") && upper.contains("WHERE") {
        score += 1;
    }
    score
}

pub fn complexity(sql: &str) -> Complexity {
    match complexity_score(sql) {
        s if s < 3 => Complexity::Simple,
        s if s < 6 => Complexity::Intermediate,
        _ => Complexity::Complex,
    }
}

/// Words looked up in order; the first entry matching a word decides its style
const WORD_STYLES: &[(&str, StyleTag)] = &[
    ("SELECT", StyleTag::Keyword),
    ("FROM", StyleTag::Keyword),
    ("WHERE", StyleTag::Keyword),
    ("AND", StyleTag::Keyword),
    ("OR", StyleTag::Keyword),
    ("NOT", StyleTag::Keyword),
    ("IN", StyleTag::Keyword),
    ("IS", StyleTag::Keyword),
    ("NULL", StyleTag::Keyword),
    ("LIKE", StyleTag::Keyword),
    ("BETWEEN", StyleTag::Keyword),
    ("EXISTS", StyleTag::Keyword),
    ("AS", StyleTag::Keyword),
    ("ON", StyleTag::Keyword),
    ("JOIN", StyleTag::Keyword),
    ("INNER", StyleTag::Keyword),
    ("LEFT", StyleTag::Keyword),
    ("RIGHT", StyleTag::Keyword),
    ("FULL", StyleTag::Keyword),
    ("OUTER", StyleTag::Keyword),
    ("CROSS", StyleTag::Keyword),
    ("GROUP", StyleTag::Keyword),
    ("BY", StyleTag::Keyword),
    ("ORDER", StyleTag::Keyword),
    ("HAVING", StyleTag::Keyword),
    ("LIMIT", StyleTag::Keyword),
    ("OFFSET", StyleTag::Keyword),
    ("DISTINCT", StyleTag::Keyword),
    ("UNION", StyleTag::Keyword),
    ("ALL", StyleTag::Keyword),
    ("WITH", StyleTag::Keyword),
    ("CASE", StyleTag::Keyword),
    ("WHEN", StyleTag::Keyword),
    ("THEN", StyleTag::Keyword),
    ("ELSE", StyleTag::Keyword),
    ("END", StyleTag::Keyword),
    ("ASC", StyleTag::Keyword),
    ("DESC", StyleTag::Keyword),
    ("INSERT", StyleTag::Keyword),
    ("INTO", StyleTag::Keyword),
    ("VALUES", StyleTag::Keyword),
    ("UPDATE", StyleTag::Keyword),
    ("SET", StyleTag::Keyword),
    ("DELETE", StyleTag::Keyword),
    ("CREATE", StyleTag::Keyword),
    ("TABLE", StyleTag::Keyword),
    ("DROP", StyleTag::Keyword),
    ("ALTER", StyleTag::Keyword),
    ("OVER", StyleTag::Keyword),
    ("PARTITION", StyleTag::Keyword),
    ("TRUE", StyleTag::Keyword),
    ("FALSE", StyleTag::Keyword),
    ("COUNT", StyleTag::Function),
    ("SUM", StyleTag::Function),
    ("AVG", StyleTag::Function),
    ("MIN", StyleTag::Function),
    ("MAX", StyleTag::Function),
    ("ROUND", StyleTag::Function),
    ("COALESCE", StyleTag::Function),
    ("NULLIF", StyleTag::Function),
    ("CAST", StyleTag::Function),
    ("LOWER", StyleTag::Function),
    ("UPPER", StyleTag::Function),
    ("LENGTH", StyleTag::Function),
    ("SUBSTRING", StyleTag::Function),
    ("CONCAT", StyleTag::Function),
    ("NOW", StyleTag::Function),
    ("DATE_TRUNC", StyleTag::Function),
    ("EXTRACT", StyleTag::Function),
    ("ROW_NUMBER", StyleTag::Function),
    ("RANK", StyleTag::Function),
    ("DENSE_RANK", StyleTag::Function),
];

fn word_style(word: &str) -> StyleTag {
    WORD_STYLES
        .iter()
        .find(|(w, _)| w.eq_ignore_ascii_case(word))
        .map(|(_, style)| *style)
        .unwrap_or(StyleTag::Identifier)
}

/// Split SQL into styled spans. Concatenating the span texts gives back the input.
pub fn highlight_sql(sql: &str) -> Vec<HighlightSpan> {
    let chars: Vec<char> = sql.chars().collect();
    let mut spans: Vec<HighlightSpan> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;

        let style = if c.is_whitespace() {
            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
            StyleTag::Whitespace
        } else if c == '-' && chars.get(i + 1) == Some(&'-') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            StyleTag::Comment
        } else if c == '/' && chars.get(i + 1) == Some(&'*') {
            i += 2;
            while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                i += 1;
            }
            i = (i + 2).min(chars.len());
            StyleTag::Comment
        } else if c == '\'' {
            i += 1;
            while i < chars.len() {
                if chars[i] == '\'' {
                    // '' is an escaped quote
                    if chars.get(i + 1) == Some(&'\'') {
                        i += 2;
                        continue;
                    }
                    i += 1;
                    break;
                }
                i += 1;
            }
            StyleTag::String
        } else if c == '"' || c == '`' {
            i += 1;
            while i < chars.len() && chars[i] != c {
                i += 1;
            }
            i = (i + 1).min(chars.len());
            StyleTag::Identifier
        } else if c.is_ascii_digit() {
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            StyleTag::Number
        } else if c.is_alphabetic() || c == '_' {
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            word_style(&word)
        } else {
            i += 1;
            StyleTag::Operator
        };

        spans.push(HighlightSpan {
            style,
            text: chars[start..i].iter().collect(),
        });
    }

    spans
}
