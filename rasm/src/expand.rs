//! Textual macro expansion, running before the parser sees the source.
//!
//! A macro block
//!
//! ```text
//! .macro name arg1 arg2
//!     ... body with \arg1, \arg2 ...
//! .endmacro
//! ```
//!
//! defines `name`; any later line whose first token is `name` is
//! replaced by the body with the call-site arguments substituted
//! positionally. Bodies may call previously defined macros; expansion
//! repeats until the text settles.

use std::collections::HashMap;

use crate::{Error, Result};

struct Macro {
    params: Vec<String>,
    body: Vec<String>,
}

const EXPANSION_LIMIT: usize = 16;

/// The part of a line the expander cares about: everything before the
/// comment marker.
fn code_of(line: &str) -> &str {
    line.split('#').next().unwrap_or("")
}

fn collect_definitions(source: &str) -> Result<(HashMap<String, Macro>, Vec<String>)> {
    let mut macros = HashMap::new();
    let mut lines = Vec::new();
    let mut building: Option<(String, Macro)> = None;

    for line in source.lines() {
        let mut tokens = code_of(line).split_whitespace();
        let head = tokens.next();

        if building.is_some() {
            match head {
                Some(".endmacro") => {
                    let (name, definition) = building.take().unwrap();
                    macros.insert(name, definition);
                }
                Some(".macro") => {
                    let (name, _) = building.take().unwrap();
                    return Err(Error::Asm(format!(
                        "macro definitions cannot nest (inside \"{}\")",
                        name
                    )));
                }
                _ => building.as_mut().unwrap().1.body.push(line.to_string()),
            }
        } else {
            match head {
                Some(".macro") => {
                    let name = tokens
                        .next()
                        .ok_or_else(|| Error::Asm(".macro without a name".to_string()))?
                        .to_string();
                    let params = tokens
                        .map(|t| t.trim_end_matches(',').to_string())
                        .collect();
                    building = Some((
                        name,
                        Macro {
                            params,
                            body: Vec::new(),
                        },
                    ));
                }
                Some(".endmacro") => {
                    return Err(Error::Asm(".endmacro without .macro".to_string()));
                }
                _ => lines.push(line.to_string()),
            }
        }
    }

    if let Some((name, _)) = building {
        return Err(Error::Asm(format!("unterminated macro \"{}\"", name)));
    }

    Ok((macros, lines))
}

fn substitute(template: &str, bindings: &[(String, &str)]) -> String {
    let mut result = template.to_string();
    for (param, argument) in bindings {
        result = result.replace(&format!("\\{}", param), argument);
    }
    result
}

fn expand_once(
    lines: &[String],
    macros: &HashMap<String, Macro>,
) -> Result<(Vec<String>, bool)> {
    let mut expanded = Vec::with_capacity(lines.len());
    let mut changed = false;

    for line in lines {
        let mut tokens: Vec<&str> = code_of(line).split_whitespace().collect();

        // A label may precede the call; it keeps the address of the
        // first expanded line.
        let label = if tokens.first().map_or(false, |t| t.ends_with(':')) {
            Some(tokens.remove(0))
        } else {
            None
        };

        let definition = tokens.first().and_then(|head| macros.get(*head));
        let definition = match definition {
            Some(definition) => definition,
            None => {
                expanded.push(line.clone());
                continue;
            }
        };

        changed = true;
        if let Some(label) = label {
            expanded.push(label.to_string());
        }

        let name = tokens[0];
        let arguments: Vec<&str> = tokens[1..]
            .iter()
            .map(|t| t.trim_end_matches(','))
            .collect();
        if arguments.len() != definition.params.len() {
            return Err(Error::Asm(format!(
                "macro \"{}\" takes {} arguments, got {}",
                name,
                definition.params.len(),
                arguments.len()
            )));
        }

        // Longest parameter first, so \n does not eat into \name.
        let mut bindings: Vec<(String, &str)> = definition
            .params
            .iter()
            .cloned()
            .zip(arguments)
            .collect();
        bindings.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        for body_line in &definition.body {
            expanded.push(substitute(body_line, &bindings));
        }
    }

    Ok((expanded, changed))
}

fn check_leftover_substitutions(lines: &[String]) -> Result<()> {
    for line in lines {
        for token in code_of(line).split_whitespace() {
            if token.contains('\\') && !token.contains('"') {
                return Err(Error::Asm(format!(
                    "undefined macro argument in \"{}\"",
                    line.trim()
                )));
            }
        }
    }
    Ok(())
}

pub fn expand(source: &str) -> Result<String> {
    let (macros, mut lines) = collect_definitions(source)?;

    if !macros.is_empty() {
        let mut settled = false;
        for _ in 0..EXPANSION_LIMIT {
            let (next, changed) = expand_once(&lines, &macros)?;
            lines = next;
            if !changed {
                settled = true;
                break;
            }
        }
        if !settled {
            return Err(Error::Asm(
                "macro expansion did not settle (recursive macro?)".to_string(),
            ));
        }
    }

    check_leftover_substitutions(&lines)?;
    Ok(lines.join("\n"))
}
