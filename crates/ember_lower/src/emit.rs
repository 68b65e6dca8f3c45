//! Verilog-2001 text output.

use std::path::{Path, PathBuf};

use ember_config::LowerConfig;
use ember_diagnostics::DiagnosticSink;
use ember_ir::{BinaryOp, Design, PortDirection, UnaryOp};

use crate::error::LowerError;
use crate::lower::lower;
use crate::vast::{
    LoweredModule, Trigger, VBlock, VExpr, VItem, VLValue, VPort, VStmt, VarKind,
};

/// Renders a lowered module as Verilog-2001 source.
///
/// `indent` is the number of spaces per nesting level.
pub fn emit_verilog(module: &LoweredModule, indent: usize) -> String {
    let mut p = Printer {
        out: String::new(),
        unit: " ".repeat(indent),
        depth: 0,
    };
    p.line(&format!("// Generated by ember from design '{}'.", module.name));
    p.line(&format!("module {} (", module.name));
    p.depth += 1;
    let count = module.ports.len();
    for (i, port) in module.ports.iter().enumerate() {
        let sep = if i + 1 < count { "," } else { "" };
        p.line(&format!("{}{sep}", port_decl(port)));
    }
    p.depth -= 1;
    p.line(");");

    if !module.decls.is_empty() {
        p.blank();
        p.depth += 1;
        for decl in &module.decls {
            let mut text = match decl.kind {
                VarKind::Integer => format!("integer {}", decl.name),
                kind => format!("{}{}{}", kind_keyword(kind), range(decl.width), decl.name),
            };
            if let Some(init) = &decl.init {
                text.push_str(&format!(" = {}", literal(init.width(), &init.to_hex())));
            }
            text.push(';');
            p.line(&text);
        }
        p.depth -= 1;
    }

    let mut in_assigns = false;
    p.depth += 1;
    for item in &module.items {
        match item {
            VItem::Assign(a) => {
                if !in_assigns {
                    p.blank();
                    in_assigns = true;
                }
                p.line(&format!("assign {} = {};", lvalue(&a.lhs), expr(&a.rhs, false)));
            }
            VItem::Always(block) => {
                in_assigns = false;
                p.blank();
                p.block(block);
            }
        }
    }
    p.depth -= 1;
    p.blank();
    p.line("endmodule");
    p.out
}

/// Lowers `design` and writes `<module>.v` into `dir`.
///
/// Returns the path of the written file.
pub fn lower_to_file(
    design: &Design,
    config: &LowerConfig,
    sink: &DiagnosticSink,
    dir: &Path,
) -> Result<PathBuf, LowerError> {
    let module = lower(design, config, sink)?;
    let text = emit_verilog(&module, config.indent);
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.v", module.name));
    std::fs::write(&path, &text)?;
    tracing::info!(path = %path.display(), bytes = text.len(), "wrote Verilog");
    Ok(path)
}

struct Printer {
    out: String,
    unit: String,
    depth: usize,
}

impl Printer {
    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str(&self.unit);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn block(&mut self, block: &VBlock) {
        for rule in &block.rules {
            self.line(&format!("// {rule}"));
        }
        let header = match &block.trigger {
            Trigger::Posedge(clk) => format!("always @(posedge {clk}) begin"),
            Trigger::Signals(names) if names.is_empty() => "always @* begin".to_string(),
            Trigger::Signals(names) => format!("always @({}) begin", names.join(" or ")),
            Trigger::Initial => "initial begin".to_string(),
        };
        self.line(&header);
        self.stmts(&block.body);
        self.line("end");
    }

    fn stmts(&mut self, body: &[VStmt]) {
        self.depth += 1;
        for stmt in body {
            self.stmt(stmt);
        }
        self.depth -= 1;
    }

    fn stmt(&mut self, stmt: &VStmt) {
        match stmt {
            VStmt::Assign { .. } | VStmt::Fatal { .. } => {
                let text = simple(stmt);
                self.line(&text);
            }
            VStmt::If {
                cond,
                then_body,
                else_body,
            } => {
                self.line(&format!("if ({}) begin", expr(cond, false)));
                self.stmts(then_body);
                if else_body.is_empty() {
                    self.line("end");
                } else {
                    self.line("end else begin");
                    self.stmts(else_body);
                    self.line("end");
                }
            }
            VStmt::Case {
                selector,
                width,
                arms,
                default,
            } => {
                self.line(&format!("case ({})", expr(selector, false)));
                self.depth += 1;
                for arm in arms {
                    let item = match width {
                        Some(w) => format!("{w}'d{}", arm.item),
                        None => arm.item.to_string(),
                    };
                    self.arm(&item, &arm.body);
                }
                self.arm("default", default);
                self.depth -= 1;
                self.line("endcase");
            }
            VStmt::For {
                var,
                start,
                stop,
                step,
                body,
            } => {
                let (cmp, update) = if *step > 0 {
                    ("<", format!("{var} + {step}"))
                } else {
                    (">", format!("{var} - {}", step.unsigned_abs()))
                };
                self.line(&format!(
                    "for ({var} = {start}; {var} {cmp} {stop}; {var} = {update}) begin"
                ));
                self.stmts(body);
                self.line("end");
            }
        }
    }

    fn arm(&mut self, item: &str, body: &[VStmt]) {
        match body {
            [] => self.line(&format!("{item}: ;")),
            [one @ (VStmt::Assign { .. } | VStmt::Fatal { .. })] => {
                let text = simple(one);
                self.line(&format!("{item}: {text}"));
            }
            _ => {
                self.line(&format!("{item}: begin"));
                self.stmts(body);
                self.line("end");
            }
        }
    }
}

/// A statement that fits on one line.
fn simple(stmt: &VStmt) -> String {
    match stmt {
        VStmt::Assign { lhs, rhs, blocking } => {
            let op = if *blocking { "=" } else { "<=" };
            format!("{} {op} {};", lvalue(lhs), expr(rhs, false))
        }
        VStmt::Fatal { message } => {
            let escaped = message.replace('\\', "\\\\").replace('"', "\\\"");
            format!("$fatal(1, \"{escaped}\");")
        }
        _ => String::new(),
    }
}

fn port_decl(port: &VPort) -> String {
    let direction = match port.direction {
        PortDirection::Input => "input",
        PortDirection::Output => "output",
    };
    let mut text = format!(
        "{direction} {}{}{}",
        kind_keyword(port.kind),
        range(port.width),
        port.name
    );
    if let (VarKind::Reg, Some(init)) = (port.kind, &port.init) {
        text.push_str(&format!(" = {}", literal(init.width(), &init.to_hex())));
    }
    text
}

fn kind_keyword(kind: VarKind) -> &'static str {
    match kind {
        VarKind::Wire => "wire ",
        VarKind::Reg => "reg ",
        VarKind::Integer => "integer ",
    }
}

fn range(width: u32) -> String {
    if width == 1 {
        String::new()
    } else {
        format!("[{}:0] ", width - 1)
    }
}

fn literal(width: u32, hex: &str) -> String {
    format!("{width}'h{hex}")
}

fn lvalue(lv: &VLValue) -> String {
    match lv {
        VLValue::Ident(name) => name.clone(),
        VLValue::Bit { name, index } => format!("{name}[{}]", expr(index, false)),
        VLValue::Range { name, msb, lsb } => format!("{name}[{msb}:{lsb}]"),
        VLValue::Part { name, lo, width } => format!("{name}[{} +: {width}]", expr(lo, false)),
    }
}

/// Renders an expression; `nested` operator expressions are parenthesized.
fn expr(e: &VExpr, nested: bool) -> String {
    let text = match e {
        VExpr::Ident(name) => return name.clone(),
        VExpr::Literal(b) => return literal(b.width(), &b.to_hex()),
        VExpr::Int(v) if *v >= 0 => return v.to_string(),
        VExpr::Int(v) => v.to_string(),
        VExpr::Unary { op, operand } => format!("{}{}", unary_op(*op), expr(operand, true)),
        VExpr::Binary { op, lhs, rhs } => {
            format!("{} {} {}", expr(lhs, true), binary_op(*op), expr(rhs, true))
        }
        VExpr::Ternary {
            cond,
            then_val,
            else_val,
        } => format!(
            "{} ? {} : {}",
            expr(cond, true),
            expr(then_val, true),
            expr(else_val, true)
        ),
        VExpr::Concat(parts) => {
            let parts: Vec<String> = parts.iter().map(|p| expr(p, false)).collect();
            return format!("{{{}}}", parts.join(", "));
        }
        VExpr::Repeat { count, value } => return format!("{{{count}{{{}}}}}", expr(value, false)),
        VExpr::Bit { name, index } => return format!("{name}[{}]", expr(index, false)),
        VExpr::Range { name, msb, lsb } => return format!("{name}[{msb}:{lsb}]"),
        VExpr::Part { name, lo, width } => {
            return format!("{name}[{} +: {width}]", expr(lo, false))
        }
    };
    if nested {
        format!("({text})")
    } else {
        text
    }
}

fn unary_op(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Not => "~",
        UnaryOp::Neg => "-",
        UnaryOp::LogicNot => "!",
        UnaryOp::RedAnd => "&",
        UnaryOp::RedOr => "|",
        UnaryOp::RedXor => "^",
    }
}

fn binary_op(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Rem => "%",
        BinaryOp::And => "&",
        BinaryOp::Or => "|",
        BinaryOp::Xor => "^",
        BinaryOp::Shl => "<<",
        BinaryOp::Shr => ">>",
        BinaryOp::Eq => "==",
        BinaryOp::Ne => "!=",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
        BinaryOp::LogicAnd => "&&",
        BinaryOp::LogicOr => "||",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vast::{VAssign, VCaseArm, VDecl};
    use ember_common::Bits;

    fn counter() -> LoweredModule {
        LoweredModule {
            name: "counter".into(),
            ports: vec![
                VPort {
                    name: "clk".into(),
                    direction: PortDirection::Input,
                    kind: VarKind::Wire,
                    width: 1,
                    init: None,
                },
                VPort {
                    name: "en".into(),
                    direction: PortDirection::Input,
                    kind: VarKind::Wire,
                    width: 1,
                    init: None,
                },
                VPort {
                    name: "q".into(),
                    direction: PortDirection::Output,
                    kind: VarKind::Reg,
                    width: 8,
                    init: Some(Bits::zero(8)),
                },
            ],
            decls: vec![VDecl {
                kind: VarKind::Wire,
                name: "next".into(),
                width: 8,
                init: None,
            }],
            items: vec![
                VItem::Assign(VAssign {
                    lhs: VLValue::Ident("next".into()),
                    rhs: VExpr::binary(BinaryOp::Add, VExpr::ident("q"), VExpr::literal(8, 1)),
                }),
                VItem::Always(VBlock {
                    trigger: Trigger::Posedge("clk".into()),
                    rules: vec!["counter::tick".into()],
                    body: vec![VStmt::If {
                        cond: VExpr::ident("en"),
                        then_body: vec![VStmt::Assign {
                            lhs: VLValue::Ident("q".into()),
                            rhs: VExpr::ident("next"),
                            blocking: false,
                        }],
                        else_body: Vec::new(),
                    }],
                }),
            ],
            clock: Some("clk".into()),
        }
    }

    #[test]
    fn module_text() {
        let text = emit_verilog(&counter(), 2);
        let expected = "\
// Generated by ember from design 'counter'.
module counter (
  input wire clk,
  input wire en,
  output reg [7:0] q = 8'h00
);

  wire [7:0] next;

  assign next = q + 8'h01;

  // counter::tick
  always @(posedge clk) begin
    if (en) begin
      q <= next;
    end
  end

endmodule
";
        assert_eq!(text, expected);
    }

    #[test]
    fn nested_expressions_are_parenthesized() {
        let e = VExpr::binary(
            BinaryOp::Mul,
            VExpr::binary(BinaryOp::Add, VExpr::ident("a"), VExpr::ident("b")),
            VExpr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(VExpr::ident("c")),
            },
        );
        assert_eq!(expr(&e, false), "(a + b) * (~c)");
        let sext = VExpr::Concat(vec![
            VExpr::Repeat {
                count: 4,
                value: Box::new(VExpr::Bit {
                    name: "a".into(),
                    index: Box::new(VExpr::Int(3)),
                }),
            },
            VExpr::ident("a"),
        ]);
        assert_eq!(expr(&sext, true), "{{4{a[3]}}, a}");
        assert_eq!(expr(&VExpr::binary(BinaryOp::Sub, VExpr::Int(3), VExpr::Int(-1)), false), "3 - (-1)");
    }

    #[test]
    fn case_arms_and_fatal() {
        let mut p = Printer {
            out: String::new(),
            unit: "    ".into(),
            depth: 0,
        };
        p.stmt(&VStmt::Case {
            selector: VExpr::ident("sel"),
            width: Some(2),
            arms: vec![VCaseArm {
                item: 0,
                body: vec![VStmt::Assign {
                    lhs: VLValue::Ident("t".into()),
                    rhs: VExpr::ident("r_0"),
                    blocking: true,
                }],
            }],
            default: vec![VStmt::Fatal {
                message: "index \"r\" out of range".into(),
            }],
        });
        assert_eq!(
            p.out,
            "case (sel)\n    2'd0: t = r_0;\n    default: $fatal(1, \"index \\\"r\\\" out of range\");\nendcase\n"
        );
    }

    #[test]
    fn counting_down() {
        let mut p = Printer {
            out: String::new(),
            unit: " ".into(),
            depth: 0,
        };
        p.stmt(&VStmt::For {
            var: "i__0".into(),
            start: 7,
            stop: -1,
            step: -2,
            body: Vec::new(),
        });
        assert_eq!(p.out, "for (i__0 = 7; i__0 > -1; i__0 = i__0 - 2) begin\nend\n");
    }

    #[test]
    fn writes_named_file() {
        let mut b = ember_ir::DesignBuilder::new("buf1");
        let top = b.top();
        let a = b.input(top, "a", 1);
        let y = b.output(top, "y", 1);
        b.comb(top, "pass", ember_ir::Stmt::assign(y, a));
        let design = b.finish().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = lower_to_file(
            &design,
            &LowerConfig::default(),
            &DiagnosticSink::new(),
            &dir.path().join("out"),
        )
        .unwrap();
        assert_eq!(path.file_name().unwrap(), "buf1.v");
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("assign y = a;"));
        assert!(text.ends_with("endmodule\n"));
    }
}
