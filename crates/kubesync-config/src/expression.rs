//! `$(...)` shell expressions embedded in document strings.

use kubesync_core::Document;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;
use tracing::debug;

use crate::ExpressionError;
use crate::walk::walk;

/// Options passed to an [`ExpressionResolver`].
#[derive(Debug, Clone)]
pub struct ExpressionOptions {
    /// Shell used to run expressions, invoked as `<shell> -c <command>`.
    pub shell: String,
    /// Extra environment variables for every command.
    pub env: BTreeMap<String, String>,
}

impl Default for ExpressionOptions {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            env: BTreeMap::new(),
        }
    }
}

/// Evaluates expressions embedded in an already substituted document.
pub trait ExpressionResolver: Send + Sync {
    /// Resolve every expression in `document`. File-relative expressions are
    /// evaluated from `base_path`.
    fn resolve_all_expressions(
        &self,
        document: Document,
        base_path: &Path,
        options: &ExpressionOptions,
    ) -> Result<Document, ExpressionError>;
}

/// Runs `$(command)` segments through a shell.
///
/// Trailing newlines of the output are dropped. A string that is exactly one
/// expression takes the output's JSON type when it parses as JSON. `$$(` is
/// an escape and is left as written.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellExpressionResolver;

impl ExpressionResolver for ShellExpressionResolver {
    fn resolve_all_expressions(
        &self,
        mut document: Document,
        base_path: &Path,
        options: &ExpressionOptions,
    ) -> Result<Document, ExpressionError> {
        walk(
            &mut document,
            (),
            |_, value| value.contains("$("),
            |(), _, value| evaluate(value, base_path, options).map(|doc| ((), doc)),
        )?;
        Ok(document)
    }
}

fn evaluate(
    input: &str,
    base_path: &Path,
    options: &ExpressionOptions,
) -> Result<Document, ExpressionError> {
    let bytes = input.as_bytes();
    let mut output = String::with_capacity(input.len());
    let mut last = 0;
    let mut cursor = 0;

    while let Some(offset) = input[cursor..].find("$(") {
        let start = cursor + offset;
        if start > 0 && bytes[start - 1] == b'$' {
            // Escaped: nothing up to the matching `)` is evaluated
            match closing_paren(bytes, start + 1) {
                Some(end) => {
                    cursor = end + 1;
                    continue;
                }
                None => break,
            }
        }

        let end = closing_paren(bytes, start + 1)
            .ok_or_else(|| ExpressionError::Unterminated(input.to_string()))?;
        let result = run(&input[start + 2..end], base_path, options)?;

        if start == 0 && end == input.len() - 1 {
            return Ok(serde_json::from_str::<Document>(&result)
                .unwrap_or_else(|_| Document::string(result)));
        }

        output.push_str(&input[last..start]);
        output.push_str(&result);
        last = end + 1;
        cursor = end + 1;
    }

    output.push_str(&input[last..]);
    Ok(Document::string(output))
}

/// Index of the `)` matching the `(` at `open`.
///
/// Parentheses inside single or double quotes, or escaped with a backslash,
/// are not counted.
fn closing_paren(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote = None;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, b) {
            (Some(b'\''), b'\'') => quote = None,
            (Some(b'\''), _) => {}
            (_, b'\\') => escaped = true,
            (Some(_), b'"') => quote = None,
            (Some(_), _) => {}
            (None, b'\'' | b'"') => quote = Some(b),
            (None, b'(') => depth += 1,
            (None, b')') => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn run(
    command: &str,
    base_path: &Path,
    options: &ExpressionOptions,
) -> Result<String, ExpressionError> {
    let dir = if base_path.as_os_str().is_empty() {
        Path::new(".")
    } else {
        base_path
    };
    debug!(command = %command, dir = %dir.display(), "Running expression");

    let output = Command::new(&options.shell)
        .arg("-c")
        .arg(command)
        .current_dir(dir)
        .envs(&options.env)
        .output()?;

    if !output.status.success() {
        return Err(ExpressionError::CommandFailed {
            command: command.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .trim_end_matches(['\n', '\r'])
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolve(document: Document) -> Result<Document, ExpressionError> {
        ShellExpressionResolver.resolve_all_expressions(
            document,
            Path::new("."),
            &ExpressionOptions::default(),
        )
    }

    #[test]
    fn test_plain_strings_untouched() {
        let doc = Document::from(json!({"a": "no expressions", "b": 2}));
        assert_eq!(resolve(doc.clone()).unwrap(), doc);
    }

    #[test]
    fn test_embedded_expression() {
        let doc = resolve(Document::from("prefix-$(echo value)-suffix")).unwrap();
        assert_eq!(doc, Document::from("prefix-value-suffix"));
    }

    #[test]
    fn test_whole_expression_is_typed() {
        assert_eq!(resolve(Document::from("$(echo 3)")).unwrap(), Document::from(3i64));
        assert_eq!(resolve(Document::from("$(echo hello)")).unwrap(), Document::from("hello"));
        assert_eq!(
            resolve(Document::from(r#"$(echo '{"a": true}')"#)).unwrap(),
            Document::from(json!({"a": true}))
        );
    }

    #[test]
    fn test_nested_parentheses() {
        let doc = resolve(Document::from("$(echo $(echo inner))")).unwrap();
        assert_eq!(doc, Document::from("inner"));
    }

    #[test]
    fn test_mapping_leaves() {
        let doc = resolve(Document::from(json!({
            "spec": {"tag": "v$(echo 1)"},
            "list": ["$(echo x)"]
        })))
        .unwrap();
        assert_eq!(
            doc,
            Document::from(json!({"spec": {"tag": "v1"}, "list": ["x"]}))
        );
    }

    #[test]
    fn test_escaped_expression() {
        let doc = resolve(Document::from("keep $$(date)")).unwrap();
        assert_eq!(doc, Document::from("keep $$(date)"));
    }

    #[test]
    fn test_escaped_expression_hides_nested_commands() {
        let doc = resolve(Document::from("keep $$(echo $(echo inner)) $(echo outer)")).unwrap();
        assert_eq!(doc, Document::from("keep $$(echo $(echo inner)) outer"));

        let doc = resolve(Document::from("keep $$(echo $(echo inner)")).unwrap();
        assert_eq!(doc, Document::from("keep $$(echo $(echo inner)"));
    }

    #[test]
    fn test_quoted_parentheses() {
        let doc = resolve(Document::from(r#"x-$(echo ")")"#)).unwrap();
        assert_eq!(doc, Document::from("x-)"));

        let doc = resolve(Document::from("x-$(echo '(' \\))")).unwrap();
        assert_eq!(doc, Document::from("x-( )"));
    }

    #[test]
    fn test_failing_command() {
        let err = resolve(Document::from("$(exit 3)")).unwrap_err();
        assert!(matches!(err, ExpressionError::CommandFailed { .. }));
    }

    #[test]
    fn test_unterminated_expression() {
        let err = resolve(Document::from("$(echo")).unwrap_err();
        assert!(matches!(err, ExpressionError::Unterminated(_)));
    }

    #[test]
    fn test_base_path_and_env() {
        let dir = std::env::temp_dir().join(format!("kubesync-expr-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("version.txt"), "1.4.2\n").unwrap();

        let mut options = ExpressionOptions::default();
        options.env.insert("GREETING".to_string(), "hi".to_string());

        let doc = ShellExpressionResolver
            .resolve_all_expressions(
                Document::from(json!({
                    "version": "v$(cat version.txt)",
                    "greeting": "$(echo $GREETING)"
                })),
                &dir,
                &options,
            )
            .unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(doc, Document::from(json!({"version": "v1.4.2", "greeting": "hi"})));
    }
}
