use crate::{
    core::DEFAULT_INDENT_WIDTH,
    ir::types::{CaseClause, Stmt, StructuredFunction},
};

/// Renders a [`StructuredFunction`] as WGSL-flavoured pseudo code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PseudoCodeEmitter {
    indent_width: usize,
}

impl Default for PseudoCodeEmitter {
    fn default() -> Self {
        Self { indent_width: DEFAULT_INDENT_WIDTH }
    }
}

impl PseudoCodeEmitter {
    /// Creates an emitter indenting nested blocks by `indent_width` spaces.
    pub fn new(indent_width: usize) -> Self {
        Self { indent_width }
    }

    /// Renders `function` and returns the source text.
    pub fn emit(&self, function: &StructuredFunction) -> String {
        let mut source = vec![format!("fn {}() {{", function.name)];
        emit_block(&function.body, &mut source);
        source.push("}".to_string());

        self.indent_source(&mut source);
        source.join("\n")
    }

    /// Indents every line by the number of braces open before it.
    fn indent_source(&self, source: &mut [String]) {
        let mut indentation_level: usize = 0;
        for line in source.iter_mut() {
            if line.starts_with('}') {
                indentation_level = indentation_level.saturating_sub(1);
            }

            *line = format!("{}{line}", " ".repeat(indentation_level * self.indent_width));

            if line.ends_with('{') {
                indentation_level += 1;
            }
        }
    }
}

fn emit_block(stmts: &[Stmt], source: &mut Vec<String>) {
    for stmt in stmts {
        emit_stmt(stmt, source);
    }
}

fn emit_case(clause: &CaseClause, source: &mut Vec<String>) {
    let mut labels: Vec<String> = clause.selectors.iter().map(|value| value.to_string()).collect();
    let header = match (labels.is_empty(), clause.is_default) {
        (true, _) => "default: {".to_string(),
        (false, is_default) => {
            if is_default {
                labels.push("default".to_string());
            }
            format!("case {}: {{", labels.join(", "))
        }
    };

    source.push(header);
    emit_block(&clause.body, source);
    source.push("}".to_string());
}

fn emit_stmt(stmt: &Stmt, source: &mut Vec<String>) {
    match stmt {
        Stmt::Op(operation) => source.push(format!("{operation};")),
        Stmt::BlockMarker(id) => source.push(format!("// block {id}")),
        Stmt::DeclareGuard(name) => source.push(format!("var {name} : bool = true;")),
        Stmt::ClearGuard(name) => source.push(format!("{name} = false;")),
        Stmt::If { condition, then_body, else_body } => {
            source.push(format!("if ({condition}) {{"));
            emit_block(then_body, source);
            if !else_body.is_empty() {
                source.push("} else {".to_string());
                emit_block(else_body, source);
            }
            source.push("}".to_string());
        }
        Stmt::Loop { body, continuing } => {
            source.push("loop {".to_string());
            emit_block(body, source);
            if !continuing.is_empty() {
                source.push("continuing {".to_string());
                emit_block(continuing, source);
                source.push("}".to_string());
            }
            source.push("}".to_string());
        }
        Stmt::Switch { selector, cases } => {
            source.push(format!("switch (%{selector}) {{"));
            cases.iter().for_each(|clause| emit_case(clause, source));
            source.push("}".to_string());
        }
        Stmt::Break => source.push("break;".to_string()),
        Stmt::Continue => source.push("continue;".to_string()),
        Stmt::BreakIf(condition) => source.push(format!("break if {condition};")),
        Stmt::Return(None) => source.push("return;".to_string()),
        Stmt::Return(Some(value)) => source.push(format!("return %{value};")),
        Stmt::Discard => source.push("discard;".to_string()),
    }
}
