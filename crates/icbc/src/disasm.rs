use crate::opcode::{Instruction, Mode};
use crate::program::Program;

/// Render a single operand the way the disassembler and VM traces show it.
pub fn format_operand(mode: Mode, param: i64) -> String {
    match mode {
        Mode::Position => format!("[{param}]"),
        Mode::Immediate => format!("#{param}"),
        Mode::Relative if param < 0 => format!("[rb{param}]"),
        Mode::Relative => format!("[rb+{param}]"),
    }
}

/// Render a decoded instruction with its raw parameters, e.g.
/// `Add [4], #3 -> [4]`.
pub fn format_instruction(instr: &Instruction, params: &[i64]) -> String {
    let opcode = instr.opcode;
    let mut reads = Vec::new();
    let mut write = None;
    for (i, &param) in params.iter().enumerate().take(opcode.arity()) {
        let operand = format_operand(instr.mode(i), param);
        if opcode.write_param() == Some(i) && i > 0 {
            write = Some(operand);
        } else {
            reads.push(operand);
        }
    }

    let mut out = opcode.mnemonic().to_string();
    if !reads.is_empty() {
        out.push(' ');
        out.push_str(&reads.join(", "));
    }
    if let Some(target) = write {
        out.push_str(" -> ");
        out.push_str(&target);
    }
    out
}

/// Linear-sweep disassembly. Words that do not decode, or instructions
/// truncated by the end of the image, are listed as `DATA`.
///
/// Intcode freely mixes code and data, so the listing is a best effort.
pub fn disassemble(program: &Program) -> Vec<String> {
    let cells = program.cells();
    let mut lines = Vec::new();
    let mut addr = 0usize;

    while addr < cells.len() {
        let word = cells[addr];
        match Instruction::decode(word) {
            Ok(instr) if addr + instr.opcode.width() <= cells.len() => {
                let params = &cells[addr + 1..addr + instr.opcode.width()];
                lines.push(format!("{addr:04}: {}", format_instruction(&instr, params)));
                addr += instr.opcode.width();
            }
            _ => {
                lines.push(format!("{addr:04}: DATA {word}"));
                addr += 1;
            }
        }
    }

    lines
}
