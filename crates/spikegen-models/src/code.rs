// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Minimal code-fragment scanning and rewriting
//!
//! Fragments refer to model state through `$(name)` tokens. Only the few
//! rewrites the compiler itself depends on live here: delayed-access
//! detection, literal/name replacement and the `$(func, args...)` call form.

use crate::{ModelError, ModelResult};

/// True if the fragment contains anything besides whitespace
#[inline]
pub fn has_code(code: &str) -> bool {
    !code.trim().is_empty()
}

/// True if `code` references `$(<name><suffix>)`
///
/// ```rust
/// use spikegen_models::code::references_var;
/// assert!(references_var("$(V_pre) > 0", "V", "_pre"));
/// assert!(!references_var("$(V) > 0", "V", "_pre"));
/// ```
pub fn references_var(code: &str, name: &str, suffix: &str) -> bool {
    code.contains(&format!("$({}{})", name, suffix))
}

/// Replace every `$(token)` with `replacement`
pub fn substitute(code: &str, token: &str, replacement: &str) -> String {
    code.replace(&format!("$({})", token), replacement)
}

/// Replace `$(<name><suffix>)` with the formatted value for each name
pub fn value_substitutions<F>(
    code: &str,
    names: &[&str],
    values: &[f64],
    suffix: &str,
    format_value: F,
) -> String
where
    F: Fn(f64) -> String,
{
    names
        .iter()
        .zip(values)
        .fold(code.to_string(), |acc, (name, value)| {
            substitute(&acc, &format!("{}{}", name, suffix), &format_value(*value))
        })
}

/// Replace `$(<name>)` with `<prefix><name><postfix>` for each name
pub fn name_substitutions(code: &str, prefix: &str, names: &[&str], postfix: &str) -> String {
    names.iter().fold(code.to_string(), |acc, name| {
        substitute(&acc, name, &format!("{}{}{}", prefix, name, postfix))
    })
}

/// Rewrite every `$(func, a0, a1, ...)` call into `template`
///
/// `$(0)`, `$(1)`, ... in `template` are replaced with the call's arguments.
/// Arguments may contain nested parentheses and commas inside them.
///
/// # Errors
///
/// `MalformedCode` if a call is unterminated or has the wrong argument count.
pub fn function_substitute(
    code: &str,
    func: &str,
    num_args: usize,
    template: &str,
) -> ModelResult<String> {
    let opener = format!("$({}", func);
    let mut out = String::with_capacity(code.len());
    let mut rest = code;

    while let Some(start) = rest.find(&opener) {
        let after = &rest[start + opener.len()..];
        // `$(funcOther` is a different token
        let args_start = match after.chars().next() {
            Some(',') => 1,
            Some(')') => 0,
            _ => {
                out.push_str(&rest[..start + opener.len()]);
                rest = after;
                continue;
            }
        };

        out.push_str(&rest[..start]);
        let (args, consumed) = split_call_args(&after[args_start..]).ok_or_else(|| {
            ModelError::MalformedCode(format!("unterminated call to '{}'", func))
        })?;

        if args.len() != num_args {
            return Err(ModelError::MalformedCode(format!(
                "'{}' takes {} argument(s), found {}",
                func,
                num_args,
                args.len()
            )));
        }

        let expanded = args
            .iter()
            .enumerate()
            .fold(template.to_string(), |acc, (i, arg)| {
                substitute(&acc, &i.to_string(), arg)
            });
        out.push_str(&expanded);
        rest = &after[args_start + consumed..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Split `a, f(b, c))...` into `["a", "f(b, c)"]` and the byte count up to
/// and including the closing parenthesis
fn split_call_args(text: &str) -> Option<(Vec<String>, usize)> {
    let mut depth = 0usize;
    let mut args = Vec::new();
    let mut current = String::new();

    for (i, c) in text.char_indices() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' if depth == 0 => {
                if !current.trim().is_empty() {
                    args.push(current.trim().to_string());
                }
                return Some((args, i + 1));
            }
            ')' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                args.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_substitutions() {
        let code = "$(V_pre) > $(Vthresh) + $(offset)";
        let out = value_substitutions(code, &["Vthresh", "offset"], &[-50.0, 0.5], "", |v| {
            format!("{:.6}f", v)
        });
        assert_eq!(out, "$(V_pre) > -50.000000f + 0.500000f");
    }

    #[test]
    fn test_name_substitutions() {
        let out = name_substitutions("$(gain) * $(V_pre)", "", &["gain"], "Syn");
        assert_eq!(out, "gainSyn * $(V_pre)");
    }

    #[test]
    fn test_function_substitute_nested() {
        let code = "$(addToInSyn, fmax($(g), 0.0f)); x = 1;";
        let out = function_substitute(code, "addToInSyn", 1, "linSyn += $(0)").unwrap();
        assert_eq!(out, "linSyn += fmax($(g), 0.0f); x = 1;");
    }

    #[test]
    fn test_function_substitute_leaves_other_tokens() {
        let code = "$(addToInSynDelay, 1); $(addToInSyn, 2);";
        let out = function_substitute(code, "addToInSyn", 1, "s += $(0)").unwrap();
        assert_eq!(out, "$(addToInSynDelay, 1); s += 2;");
    }

    #[test]
    fn test_function_substitute_errors() {
        assert!(matches!(
            function_substitute("$(addToInSyn, (1 + 2);", "addToInSyn", 1, "$(0)"),
            Err(ModelError::MalformedCode(_))
        ));
        assert!(matches!(
            function_substitute("$(addToInSyn, 1, 2);", "addToInSyn", 1, "$(0)"),
            Err(ModelError::MalformedCode(_))
        ));
    }
}
