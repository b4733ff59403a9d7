//! Editor scripts: one user interaction per line, replayed against the core.
//!
//! Header references are the built-in names (`detail`, `quantity`, `unit`,
//! `unit-cost`, `total`) or aliases bound by `add-custom <alias>`. Tokens are
//! separated by whitespace; double quotes keep a token together.

use crate::error::{Result, ScriptError};
use catalog_schema_core::{
    BaseColumn, Editor, Event, HeaderId, MemoryClient, Mode, Operator, SchemaError, Slot,
};
use regex::Regex;
use std::collections::HashMap;
use std::io::Write;
use std::sync::OnceLock;

/// A double-quoted string (group 1) or a bare word (group 2).
fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""([^"]*)"|(\S+)"#).expect("token regex must compile"))
}

/// One parsed script line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    AddBase(BaseColumn),
    AddCustom(String),
    Remove(String),
    Restore(String),
    Discard(String),
    Title(String, String),
    Quantity(String, bool),
    Reorder(Vec<String>),
    Start(String, Operator),
    Click(String, Slot),
    Replace(String, Slot),
    Pick(String),
    Cancel,
    Outside,
    Delete(String, Slot, bool),
    Eval(Vec<(String, f64)>),
    Show,
    Submit(String),
}

fn tokenize(line: &str) -> Vec<String> {
    token_re()
        .captures_iter(line)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .collect()
}

fn base_column_by_name(name: &str) -> Option<BaseColumn> {
    match name.to_ascii_lowercase().as_str() {
        "detail" => Some(BaseColumn::Detail),
        "quantity" => Some(BaseColumn::Quantity),
        "unit" => Some(BaseColumn::Unit),
        "unit-cost" | "unitcost" => Some(BaseColumn::UnitCost),
        "total" => Some(BaseColumn::Total),
        _ => None,
    }
}

fn parse_answer(token: &str) -> std::result::Result<bool, String> {
    match token.to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" => Ok(true),
        "no" | "n" | "false" => Ok(false),
        other => Err(format!("expected yes or no, got '{}'", other)),
    }
}

fn parse_slot(group: &str, operand: &str) -> std::result::Result<Slot, String> {
    let group = group
        .parse::<usize>()
        .map_err(|_| format!("invalid group index '{}'", group))?;
    let operand = operand
        .parse::<usize>()
        .map_err(|_| format!("invalid operand index '{}'", operand))?;
    Ok(Slot::new(group, operand))
}

/// Parse one line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> std::result::Result<Option<Command>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let tokens = tokenize(trimmed);
    let Some((name, args)) = tokens.split_first() else {
        return Ok(None);
    };
    let arity = |min: usize, usage: &str| {
        if args.len() < min {
            Err(format!("usage: {}", usage))
        } else {
            Ok(())
        }
    };

    let command = match name.as_str() {
        "add-base" => {
            arity(1, "add-base quantity|unit")?;
            match base_column_by_name(&args[0]) {
                Some(base) if base.is_optional() => Command::AddBase(base),
                _ => return Err(format!("'{}' is not an optional base column", args[0])),
            }
        }
        "add-custom" => {
            arity(1, "add-custom <alias>")?;
            if base_column_by_name(&args[0]).is_some() {
                return Err(format!("alias '{}' shadows a base column", args[0]));
            }
            Command::AddCustom(args[0].clone())
        }
        "remove" => {
            arity(1, "remove <ref>")?;
            Command::Remove(args[0].clone())
        }
        "restore" => {
            arity(1, "restore <ref>")?;
            Command::Restore(args[0].clone())
        }
        "discard" => {
            arity(1, "discard <ref>")?;
            Command::Discard(args[0].clone())
        }
        "title" => {
            arity(1, "title <ref> <text..>")?;
            Command::Title(args[0].clone(), args[1..].join(" "))
        }
        "quantity" => {
            arity(2, "quantity <ref> yes|no")?;
            Command::Quantity(args[0].clone(), parse_answer(&args[1])?)
        }
        "reorder" => {
            arity(1, "reorder <ref>..")?;
            Command::Reorder(args.to_vec())
        }
        "start" => {
            arity(2, "start <ref> multiply|divide")?;
            Command::Start(args[0].clone(), args[1].parse::<Operator>()?)
        }
        "click" => {
            arity(3, "click <ref> <group> <operand>")?;
            Command::Click(args[0].clone(), parse_slot(&args[1], &args[2])?)
        }
        "replace" => {
            arity(3, "replace <ref> <group> <operand>")?;
            Command::Replace(args[0].clone(), parse_slot(&args[1], &args[2])?)
        }
        "pick" => {
            arity(1, "pick <ref>")?;
            Command::Pick(args[0].clone())
        }
        "cancel" => Command::Cancel,
        "outside" => Command::Outside,
        "delete" => {
            arity(3, "delete <ref> <group> <operand> [yes|no]")?;
            let confirm = match args.get(3) {
                Some(answer) => parse_answer(answer)?,
                None => true,
            };
            Command::Delete(args[0].clone(), parse_slot(&args[1], &args[2])?, confirm)
        }
        "eval" => {
            let values = args
                .iter()
                .map(|arg| {
                    let (name, value) = arg
                        .split_once('=')
                        .ok_or_else(|| format!("expected <ref>=<value>, got '{}'", arg))?;
                    let value = value
                        .parse::<f64>()
                        .map_err(|_| format!("invalid number '{}'", value))?;
                    Ok((name.to_string(), value))
                })
                .collect::<std::result::Result<Vec<_>, String>>()?;
            Command::Eval(values)
        }
        "show" => Command::Show,
        "submit" => {
            arity(1, "submit <title..>")?;
            Command::Submit(args.join(" "))
        }
        other => return Err(format!("unknown command '{}'", other)),
    };
    Ok(Some(command))
}

/// Editor state carried across script lines.
pub struct Session {
    editor: Editor,
    aliases: HashMap<String, HeaderId>,
    client: MemoryClient,
    pretty: bool,
    last_submission: Option<String>,
}

impl Session {
    pub fn new(editor: Editor, pretty: bool) -> Self {
        Session {
            editor,
            aliases: HashMap::new(),
            client: MemoryClient::new(),
            pretty,
            last_submission: None,
        }
    }

    /// JSON of the most recent successful `submit`.
    pub fn last_submission(&self) -> Option<&str> {
        self.last_submission.as_deref()
    }

    fn resolve(&self, name: &str) -> std::result::Result<HeaderId, String> {
        if let Some(base) = base_column_by_name(name) {
            return Ok(base.header_id());
        }
        self.aliases
            .get(name)
            .cloned()
            .ok_or_else(|| format!("unknown header reference '{}'", name))
    }

    /// Run every line of `source`, writing command output to `out`. Stops at
    /// the first failing line.
    pub fn run<W: Write>(&mut self, source: &str, out: &mut W) -> Result<()> {
        for (index, line) in source.lines().enumerate() {
            let line_no = index + 1;
            let command = parse_line(line).map_err(|message| ScriptError::Parse {
                line: line_no,
                message,
            })?;
            let Some(command) = command else {
                continue;
            };
            tracing::debug!(line = line_no, ?command, "running script line");
            let output = self.execute(command, line_no)?;
            for text in output {
                writeln!(out, "{}", text)?;
            }
        }
        Ok(())
    }

    fn execute(&mut self, command: Command, line: usize) -> Result<Vec<String>> {
        let parse_err = |message: String| ScriptError::Parse { line, message };
        let schema_err = |source: SchemaError| ScriptError::Schema { line, source };
        let mut output = Vec::new();

        match command {
            Command::AddBase(base) => {
                self.editor.add_built_in(base).map_err(schema_err)?;
            }
            Command::AddCustom(alias) => {
                if self.aliases.contains_key(&alias) {
                    return Err(parse_err(format!("alias '{}' is already bound", alias)));
                }
                let id = self.editor.add_custom();
                self.aliases.insert(alias, id);
            }
            Command::Remove(name) => {
                let id = self.resolve(&name).map_err(parse_err)?;
                self.editor.remove_header(&id).map_err(schema_err)?;
            }
            Command::Restore(name) => {
                let id = self.resolve(&name).map_err(parse_err)?;
                self.editor.restore_removed_custom(&id).map_err(schema_err)?;
            }
            Command::Discard(name) => {
                let id = self.resolve(&name).map_err(parse_err)?;
                self.editor.discard_removed_custom(&id).map_err(schema_err)?;
            }
            Command::Title(name, title) => {
                let id = self.resolve(&name).map_err(parse_err)?;
                self.editor.set_title(&id, &title).map_err(schema_err)?;
            }
            Command::Quantity(name, answer) => {
                let id = self.resolve(&name).map_err(parse_err)?;
                self.editor
                    .answer_quantity_question(&id, answer)
                    .map_err(schema_err)?;
            }
            Command::Reorder(names) => {
                let ids = names
                    .iter()
                    .map(|name| self.resolve(name))
                    .collect::<std::result::Result<Vec<_>, String>>()
                    .map_err(parse_err)?;
                self.editor.reorder(&ids);
            }
            Command::Start(name, operator) => {
                let header = self.resolve(&name).map_err(parse_err)?;
                self.apply(Event::StartFormula { header, operator }, line)?;
            }
            Command::Click(name, slot) => {
                let header = self.resolve(&name).map_err(parse_err)?;
                self.apply(Event::ActivateOperand { header, slot }, line)?;
            }
            Command::Replace(name, slot) => {
                let header = self.resolve(&name).map_err(parse_err)?;
                self.apply(Event::ReplaceOperand { header, slot }, line)?;
            }
            Command::Pick(name) => {
                let header = self.resolve(&name).map_err(parse_err)?;
                self.apply(Event::Pick(header), line)?;
            }
            Command::Cancel => {
                self.apply(Event::Cancel, line)?;
            }
            Command::Outside => {
                self.apply(Event::OutsideInteraction, line)?;
            }
            Command::Delete(name, slot, answer) => {
                let id = self.resolve(&name).map_err(parse_err)?;
                let mut asked = None;
                self.editor
                    .delete_operand(&id, slot, |prompt| {
                        asked = Some(prompt.message());
                        answer
                    })
                    .map_err(schema_err)?;
                if let Some(question) = asked {
                    output.push(format!("? {} {}", question, if answer { "yes" } else { "no" }));
                }
            }
            Command::Eval(values) => {
                let mut row = HashMap::new();
                for (name, value) in values {
                    row.insert(self.resolve(&name).map_err(parse_err)?, value);
                }
                let registry = self.editor.registry();
                let computed = registry.evaluate_row(&row);
                for header in registry.headers() {
                    if let Some(value) = computed.get(&header.id) {
                        let shown = value.map_or_else(|| "-".to_string(), |v| v.to_string());
                        output.push(format!("{} = {}", registry.title_of(&header.id), shown));
                    }
                }
            }
            Command::Show => output.extend(self.show()),
            Command::Submit(title) => {
                let submission = self.editor.prepare_submission(&title).map_err(schema_err)?;
                let json = submission.to_json(self.pretty).map_err(schema_err)?;
                let stored = self.editor.submit(&title, &self.client).map_err(schema_err)?;
                tracing::info!(id = stored.id, "submitted schema");
                output.push(json.clone());
                self.last_submission = Some(json);
            }
        }
        Ok(output)
    }

    fn apply(&mut self, event: Event, line: usize) -> Result<()> {
        let outcome = self
            .editor
            .apply(event)
            .map_err(|source| ScriptError::Schema { line, source })?;
        tracing::debug!(line, ?outcome, "applied event");
        Ok(())
    }

    /// One line per header (`order title = expression`), then the selection.
    fn show(&self) -> Vec<String> {
        let registry = self.editor.registry();
        let mut lines: Vec<String> = registry
            .headers()
            .iter()
            .map(|header| {
                let title = registry.title_of(&header.id);
                match self.editor.format_expression(&header.id) {
                    Some(expr) if !expr.is_empty() => {
                        format!("{:>3} {} = {}", header.order, title, expr)
                    }
                    _ => format!("{:>3} {}", header.order, title),
                }
            })
            .collect();

        if let Mode::Selecting(state) = self.editor.mode() {
            let eligible: Vec<String> = self
                .editor
                .eligible_candidates()
                .iter()
                .map(|id| registry.title_of(id))
                .collect();
            lines.push(format!(
                "selecting {} {} [{}]",
                registry.title_of(&state.target),
                state.slot,
                eligible.join(", ")
            ));
        }
        lines
    }
}
