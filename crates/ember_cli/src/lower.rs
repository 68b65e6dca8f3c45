//! `ember lower`: emit synthesizable Verilog.

use std::path::Path;

use ember_diagnostics::DiagnosticSink;

use crate::pipeline::{load_design, load_settings, render_diagnostics};
use crate::{GlobalArgs, LowerArgs};

/// Runs the `ember lower` command.
///
/// Writes the Verilog text to `--output`, or to stdout when no output file
/// is given.
pub fn run(args: &LowerArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let design_path = Path::new(&args.design);
    let config = load_settings(global, design_path)?;
    let design = load_design(design_path)?;

    let sink = DiagnosticSink::new();
    let module = ember_lower::lower(&design, &config.lower, &sink)?;
    render_diagnostics(&sink.diagnostics(), global.color);
    let text = ember_lower::emit_verilog(&module, config.lower.indent);

    match &args.output {
        Some(path) => {
            std::fs::write(path, &text).map_err(|e| format!("cannot write '{path}': {e}"))?;
            if !global.quiet {
                eprintln!("     Lowered {} to {path}", module.name);
            }
        }
        None => print!("{text}"),
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_ir::{DesignBuilder, Expr, Stmt, UnaryOp};
    use tempfile::TempDir;

    #[test]
    fn writes_the_output_file() {
        let tmp = TempDir::new().unwrap();
        let mut b = DesignBuilder::new("inv");
        let top = b.top();
        let a = b.input(top, "a", 8);
        let y = b.output(top, "y", 8);
        b.comb(top, "flip", Stmt::assign(y, Expr::unary(UnaryOp::Not, a.into())));
        let design_path = tmp.path().join("inv.json");
        std::fs::write(&design_path, serde_json::to_string(&b.finish().unwrap()).unwrap())
            .unwrap();
        let out = tmp.path().join("inv.v");

        let args = LowerArgs {
            design: design_path.display().to_string(),
            output: Some(out.display().to_string()),
        };
        let global = GlobalArgs {
            quiet: true,
            verbose: 0,
            color: false,
            config: None,
        };
        assert_eq!(run(&args, &global).unwrap(), 0);

        let text = std::fs::read_to_string(&out).unwrap();
        assert!(text.contains("module inv"), "{text}");
        assert!(text.contains("endmodule"), "{text}");
    }
}
