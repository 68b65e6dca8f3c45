//! Shared pipeline helpers for CLI commands.
//!
//! Loading designs and configuration, rendering diagnostics, and building
//! input values from stimulus files or a seeded random source.

use std::path::Path;

use ember_common::Bits;
use ember_config::EmberConfig;
use ember_diagnostics::{Diagnostic, DiagnosticRenderer, TerminalRenderer};
use ember_ir::Design;
use rand::Rng;
use serde_json::Value;

use crate::GlobalArgs;

/// Input values to apply before one cycle, by port name.
pub type CycleInputs = Vec<(String, Bits)>;

/// Reads a JSON-serialized design and checks its structural invariants.
pub fn load_design(path: &Path) -> Result<Design, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read design '{}': {e}", path.display()))?;
    let design: Design = serde_json::from_str(&text)
        .map_err(|e| format!("invalid design file '{}': {e}", path.display()))?;
    design.validate()?;
    tracing::info!(
        modules = design.modules.len(),
        rules = design.rules.len(),
        "loaded design '{}'",
        design.name(design.top_module().name)
    );
    Ok(design)
}

/// Loads the `--config` file, or `ember.toml` next to the design if present.
pub fn load_settings(
    global: &GlobalArgs,
    design_path: &Path,
) -> Result<EmberConfig, Box<dyn std::error::Error>> {
    let config = match &global.config {
        Some(path) => ember_config::load_config(Path::new(path))?,
        None => {
            let dir = design_path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            ember_config::load_config_from_dir(dir)?
        }
    };
    Ok(config)
}

/// Renders diagnostics to stderr and returns how many were rendered.
pub fn render_diagnostics(diagnostics: &[Diagnostic], color: bool) -> usize {
    let renderer = TerminalRenderer::new(color);
    for diag in diagnostics {
        eprint!("{}", renderer.render(diag));
    }
    diagnostics.len()
}

/// Names and widths of the top module's input ports, in declaration order.
pub fn input_ports(design: &Design) -> Vec<(String, u32)> {
    design
        .top_ports()
        .into_iter()
        .filter(|s| design.signals[*s].kind.is_input())
        .map(|s| {
            (
                design.name(design.signals[s].name).to_string(),
                design.signal_width(s),
            )
        })
        .collect()
}

/// A uniformly random value of `width` bits.
pub fn random_bits(rng: &mut impl Rng, width: u32) -> Bits {
    let words: Vec<u64> = (0..width.div_ceil(64)).map(|_| rng.gen()).collect();
    Bits::from_words(width, &words)
}

/// Random values for every input port.
pub fn random_inputs(rng: &mut impl Rng, ports: &[(String, u32)]) -> CycleInputs {
    ports
        .iter()
        .map(|(name, width)| (name.clone(), random_bits(rng, *width)))
        .collect()
}

/// Parses a stimulus file: a JSON array holding one object per cycle that
/// maps input port names to values.
///
/// Values are JSON numbers or strings in hex (`"0x1f"`), binary (`"0b101"`),
/// or decimal. Ports missing from an entry keep their previous value.
pub fn parse_stimulus(
    design: &Design,
    text: &str,
) -> Result<Vec<CycleInputs>, Box<dyn std::error::Error>> {
    let entries: Vec<serde_json::Map<String, Value>> =
        serde_json::from_str(text).map_err(|e| format!("invalid stimulus file: {e}"))?;
    let mut cycles = Vec::with_capacity(entries.len());
    for (cycle, entry) in entries.iter().enumerate() {
        let mut inputs = Vec::with_capacity(entry.len());
        for (port, value) in entry {
            let signal = design
                .find_port(port)
                .ok_or_else(|| format!("stimulus cycle {cycle}: no port named '{port}'"))?;
            let width = design.signal_width(signal);
            let bits = parse_value(width, value)
                .map_err(|e| format!("stimulus cycle {cycle}, port '{port}': {e}"))?;
            inputs.push((port.clone(), bits));
        }
        cycles.push(inputs);
    }
    Ok(cycles)
}

/// Converts one stimulus value to a `width`-bit vector.
pub fn parse_value(width: u32, value: &Value) -> Result<Bits, String> {
    match value {
        Value::Bool(b) => Ok(Bits::truncated(width, u64::from(*b))),
        Value::Number(n) => {
            let raw = n
                .as_u64()
                .ok_or_else(|| format!("{n} is not a non-negative integer"))?;
            Bits::new(width, raw).map_err(|e| e.to_string())
        }
        Value::String(s) => {
            let s = s.trim();
            if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                parse_radix(width, hex, 4)
            } else if let Some(bin) = s.strip_prefix("0b").or_else(|| s.strip_prefix("0B")) {
                parse_radix(width, bin, 1)
            } else {
                let raw: u64 = s.parse().map_err(|_| format!("cannot parse '{s}'"))?;
                Bits::new(width, raw).map_err(|e| e.to_string())
            }
        }
        other => Err(format!("unsupported value {other}")),
    }
}

/// Parses hex (`bits_per_digit = 4`) or binary (`1`) digits of any length.
fn parse_radix(width: u32, digits: &str, bits_per_digit: u32) -> Result<Bits, String> {
    let radix = 1u32 << bits_per_digit;
    let mut value = Bits::zero(width);
    let mut pos = 0u32;
    let mut any = false;
    for c in digits.chars().rev() {
        if c == '_' {
            continue;
        }
        let digit = c
            .to_digit(radix)
            .ok_or_else(|| format!("invalid digit '{c}' in '{digits}'"))?;
        any = true;
        for b in 0..bits_per_digit {
            if (digit >> b) & 1 == 1 {
                let bit = pos + b;
                if bit >= width {
                    return Err(format!("'{digits}' does not fit in {width} bits"));
                }
                value.set_bit(bit, true);
            }
        }
        pos += bits_per_digit;
    }
    if !any {
        return Err("empty literal".to_string());
    }
    Ok(value)
}
